//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::derivable_impls)]

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::Error;

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub log_root: String,
    pub testcase_files: Vec<String>,
    pub ansible: Ansible,
    pub stability: Stability,
    pub logging: Logging,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ansible {
    pub vm_inventory: String,
    pub lab_inventory: String,
    pub password_file: String,
    pub testbed_cli: String,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Stability {
    pub dut_timeout: u64,
    pub dut_poll_interval: u64,
    pub ptf_timeout: u64,
    pub ptf_poll_interval: u64,
    pub ptf32_settle_time: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Logging {
    pub file: LoggingFile,
    pub stdout: LoggingStdout,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFile {
    pub enabled: bool,
    pub name: String,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingStdout {
    pub enabled: bool,
    #[serde(flatten)]
    pub fmt: LoggingFmt,
}

#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingFmt {
    pub style: LoggingFmtStyle,
    pub colors: bool,
    pub show_source: bool,
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoggingFmtStyle {
    Compact,
    Full,
    Json,
    Pretty,
}

// ===== impl Config =====

impl Config {
    const DFLT_FILEPATH: &'static str = "/etc/autotest.toml";

    pub fn load(config_file: Option<&str>) -> Result<Config, Error> {
        let config_file = config_file.unwrap_or(Config::DFLT_FILEPATH);

        match std::fs::read_to_string(config_file) {
            Ok(config_str) => toml::from_str(&config_str).map_err(|error| {
                Error::ConfigParse(Path::new(config_file).to_owned(), error)
            }),
            Err(err) => {
                eprintln!("Failed to load configuration file: {err}");
                eprintln!("Falling back to default configuration...");
                Ok(Config::default())
            }
        }
    }
}

impl Default for Config {
    fn default() -> Config {
        Config {
            log_root: "/tmp".to_owned(),
            testcase_files: vec!["roles/test/vars/testcases.yml".to_owned()],
            ansible: Default::default(),
            stability: Default::default(),
            logging: Default::default(),
        }
    }
}

// ===== impl Ansible =====

impl Default for Ansible {
    fn default() -> Ansible {
        Ansible {
            vm_inventory: "veos.vtb".to_owned(),
            lab_inventory: "lab".to_owned(),
            password_file: "password.txt".to_owned(),
            testbed_cli: "./testbed-cli.sh".to_owned(),
        }
    }
}

// ===== impl Stability =====

impl Stability {
    pub fn dut_timeout(&self) -> Duration {
        Duration::from_secs(self.dut_timeout)
    }

    pub fn dut_poll_interval(&self) -> Duration {
        Duration::from_secs(self.dut_poll_interval)
    }

    pub fn ptf_timeout(&self) -> Duration {
        Duration::from_secs(self.ptf_timeout)
    }

    pub fn ptf_poll_interval(&self) -> Duration {
        Duration::from_secs(self.ptf_poll_interval)
    }

    pub fn ptf32_settle_time(&self) -> Duration {
        Duration::from_secs(self.ptf32_settle_time)
    }
}

impl Default for Stability {
    fn default() -> Stability {
        Stability {
            dut_timeout: 1800,
            dut_poll_interval: 60,
            ptf_timeout: 100,
            ptf_poll_interval: 10,
            ptf32_settle_time: 30,
        }
    }
}

// ===== impl LoggingFile =====

impl Default for LoggingFile {
    fn default() -> LoggingFile {
        LoggingFile {
            enabled: true,
            name: "autotest.log".to_owned(),
            fmt: Default::default(),
        }
    }
}

// ===== impl LoggingStdout =====

impl Default for LoggingStdout {
    fn default() -> LoggingStdout {
        LoggingStdout {
            enabled: true,
            fmt: LoggingFmt {
                colors: true,
                ..Default::default()
            },
        }
    }
}

// ===== impl LoggingFmt =====

impl Default for LoggingFmt {
    fn default() -> LoggingFmt {
        LoggingFmt {
            style: LoggingFmtStyle::Full,
            colors: false,
            show_source: true,
        }
    }
}

// ===== unit tests =====
