//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Prints the platform and the testbed processing file assigned to a test
//! server.

use std::collections::BTreeMap;
use std::path::Path;

use autotest_utils::shell::{LocalShell, RunOpts, Shell};
use clap::{App, Arg};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;
use tracing::level_filters::LevelFilter;

// Prefix of the management network of the test servers.
const MGMT_PREFIX: &str = "192.168.11.0/24";

#[derive(Debug, Deserialize)]
struct Testbeds {
    testbed: BTreeMap<String, ServerTestbed>,
}

#[derive(Debug, Deserialize)]
struct ServerTestbed {
    tb_file: String,
    platform: String,
}

fn load_testbeds(path: &Path) -> Result<Testbeds, String> {
    let data = std::fs::read_to_string(path)
        .map_err(|error| format!("failed to read {}: {}", path.display(), error))?;
    serde_yaml::from_str(&data)
        .map_err(|error| format!("failed to parse {}: {}", path.display(), error))
}

// Source address used to reach the management network.
async fn server_ip() -> Result<String, String> {
    let shell = LocalShell::new(false);
    let cmd = format!("ip route get {}", MGMT_PREFIX);
    let output = shell
        .run(&cmd, RunOpts::FORCE_CAPTURE)
        .await
        .map_err(|error| error.to_string())?;
    if !output.success() {
        return Err(format!("'{}' failed with rc {}", cmd, output.rc));
    }
    debug!(stdout = %output.stdout.trim(), "route lookup");
    parse_src_addr(&output.stdout)
        .ok_or_else(|| format!("no source address in '{}'", output.stdout.trim()))
}

fn parse_src_addr(route: &str) -> Option<String> {
    let re = Regex::new(r"src ([\d.]+)").ok()?;
    re.captures(route)
        .and_then(|caps| caps.get(1))
        .map(|addr| addr.as_str().to_owned())
}

async fn run(
    testbed_file: &Path,
    server: Option<&str>,
    show_platform: bool,
    show_tb_file: bool,
) -> Result<(), String> {
    let testbeds = load_testbeds(testbed_file)?;
    let server = match server {
        Some(server) => server.to_owned(),
        None => server_ip().await?,
    };
    let testbed = testbeds.testbed.get(&server).ok_or_else(|| {
        format!("no testbed configuration file for server {}", server)
    })?;

    if show_platform {
        println!("{}", testbed.platform);
    }
    if show_tb_file {
        println!("{}", testbed.tb_file);
    }
    Ok(())
}

// ===== main =====

fn main() {
    // Parse command-line parameters.
    let matches = App::new("Testbed utility")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::with_name("platform")
                .short("p")
                .long("platform")
                .help("Print the platform of the server."),
        )
        .arg(
            Arg::with_name("tbcfgfile")
                .short("t")
                .long("tbcfgfile")
                .help("Print the testbed processing file of the server."),
        )
        .arg(
            Arg::with_name("debug")
                .short("d")
                .long("debug")
                .help("Enable debug logging."),
        )
        .arg(
            Arg::with_name("server-ip")
                .short("i")
                .long("server-ip")
                .value_name("address")
                .help("Server address to look up in the testbed file."),
        )
        .arg(
            Arg::with_name("testbed")
                .long("testbed")
                .value_name("file")
                .default_value("testbed.yml")
                .help("Testbed file of the test servers."),
        )
        .get_matches();

    let level = match matches.is_present("debug") {
        true => LevelFilter::DEBUG,
        false => LevelFilter::WARN,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let testbed_file = Path::new(matches.value_of("testbed").unwrap_or("testbed.yml"));
    let result = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime")
        .block_on(run(
            testbed_file,
            matches.value_of("server-ip"),
            matches.is_present("platform"),
            matches.is_present("tbcfgfile"),
        ));

    if let Err(error) = result {
        eprintln!("{}", error);
        std::process::exit(1);
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_src_addr() {
        let route = "192.168.11.0 via 192.168.13.254 dev ens160 src 192.168.13.82 uid 0\n    cache\n";
        assert_eq!(parse_src_addr(route).as_deref(), Some("192.168.13.82"));
        assert_eq!(parse_src_addr("unreachable"), None);
    }

    #[test]
    fn test_testbeds() {
        let testbeds: Testbeds = serde_yaml::from_str(
            "testbed:\n\
             \x20 192.168.13.82:\n\
             \x20   tb_file: testbed-topo1.yaml\n\
             \x20   platform: dut\n",
        )
        .unwrap();
        let testbed = &testbeds.testbed["192.168.13.82"];
        assert_eq!(testbed.tb_file, "testbed-topo1.yaml");
        assert_eq!(testbed.platform, "dut");
    }
}
