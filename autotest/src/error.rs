//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;
use std::time::Duration;

use autotest_utils::error::with_source;
use tracing::error;

// Orchestrator errors.
//
// Every variant is fatal to the run.
#[derive(Debug)]
pub enum Error {
    Catalog(autotest_catalog::Error),
    Host(autotest_utils::Error),
    ConfigParse(PathBuf, toml::de::Error),
    LogDir(PathBuf, std::io::Error),
    TestbedNotFound(String),
    AttachFailed(String, i32),
    DetachFailed(String, i32),
    DeployFailed(String, i32),
    StabilizationTimeout(String, Duration),
    RebootFailed(String, i32),
    UpgradeFailed(String, i32),
    DeviceQuery(String, &'static str),
    DeviceConfig(String, serde_json::Error),
    HwskuDirNotFound(String, String),
    TestbedConfigMissing,
    TestbedConfigRead(PathBuf, std::io::Error),
    TestbedConfigParse(PathBuf, serde_yaml::Error),
    TestbedConfigField(String, &'static str),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Catalog(error) => {
                error.log();
            }
            Error::Host(error) => {
                error.log();
            }
            Error::ConfigParse(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::LogDir(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestbedNotFound(topo) => {
                error!(%topo, "{}", self);
            }
            Error::AttachFailed(conf_name, rc)
            | Error::DetachFailed(conf_name, rc)
            | Error::DeployFailed(conf_name, rc) => {
                error!(%conf_name, %rc, "{}", self);
            }
            Error::StabilizationTimeout(target, timeout) => {
                error!(%target, timeout = %timeout.as_secs(), "{}", self);
            }
            Error::RebootFailed(dut, rc) | Error::UpgradeFailed(dut, rc) => {
                error!(%dut, %rc, "{}", self);
            }
            Error::DeviceQuery(dut, _) => {
                error!(%dut, "{}", self);
            }
            Error::DeviceConfig(dut, error) => {
                error!(%dut, error = %with_source(error), "{}", self);
            }
            Error::HwskuDirNotFound(dut, path) => {
                error!(%dut, %path, "{}", self);
            }
            Error::TestbedConfigMissing => {
                error!("{}", self);
            }
            Error::TestbedConfigRead(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestbedConfigParse(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestbedConfigField(dut, field) => {
                error!(%dut, %field, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Catalog(error) => write!(f, "{}", error),
            Error::Host(error) => write!(f, "{}", error),
            Error::ConfigParse(..) => {
                write!(f, "failed to parse configuration file")
            }
            Error::LogDir(..) => {
                write!(f, "failed to create log directory")
            }
            Error::TestbedNotFound(topo) => {
                write!(f, "no testbed configured for topology {}", topo)
            }
            Error::AttachFailed(..) => {
                write!(f, "failed to add topology")
            }
            Error::DetachFailed(..) => {
                write!(f, "failed to remove topology")
            }
            Error::DeployFailed(..) => {
                write!(f, "failed to deploy DUT")
            }
            Error::StabilizationTimeout(target, timeout) => {
                write!(
                    f,
                    "timed out waiting for {} to be stable ({}s)",
                    target,
                    timeout.as_secs()
                )
            }
            Error::RebootFailed(..) => {
                write!(f, "failed to reboot DUT")
            }
            Error::UpgradeFailed(..) => {
                write!(f, "failed to upgrade DUT")
            }
            Error::DeviceQuery(_, what) => {
                write!(f, "failed to get DUT {}", what)
            }
            Error::DeviceConfig(..) => {
                write!(f, "failed to parse DUT configuration")
            }
            Error::HwskuDirNotFound(..) => {
                write!(f, "hwsku directory not found")
            }
            Error::TestbedConfigMissing => {
                write!(f, "testbed processing file required to set up a new image")
            }
            Error::TestbedConfigRead(..) => {
                write!(f, "failed to read testbed processing file")
            }
            Error::TestbedConfigParse(..) => {
                write!(f, "failed to parse testbed processing file")
            }
            Error::TestbedConfigField(_, field) => {
                write!(f, "testbed processing file missing {}", field)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Catalog(error) => Some(error),
            Error::Host(error) => Some(error),
            Error::ConfigParse(_, error) => Some(error),
            Error::LogDir(_, error) | Error::TestbedConfigRead(_, error) => {
                Some(error)
            }
            Error::DeviceConfig(_, error) => Some(error),
            Error::TestbedConfigParse(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<autotest_catalog::Error> for Error {
    fn from(error: autotest_catalog::Error) -> Error {
        Error::Catalog(error)
    }
}

impl From<autotest_utils::Error> for Error {
    fn from(error: autotest_utils::Error) -> Error {
        Error::Host(error)
    }
}
