//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod common;

use std::path::Path;
use std::sync::Arc;

use autotest::config::Config;
use autotest::dut;
use autotest::error::Error;
use autotest_utils::host::{ModuleArgs, ModuleResult, ModuleStat};
use autotest_utils::testing::{FakeHost, FakeHostFactory, FakeShell};
use common::{DUT, context};
use tempfile::TempDir;

const PLATFORM: &str = "x86_64-dell_s6000_s1220-r0";

const TESTBED_CONFIG: &str = "\
devices:
  str-s6000-01:
    hwsku: Force10-S6000
    hwrev: R0A
topology:
  str-s6000-01:
    indices:
      0-3:
        Breakout: 4
      4-7:
        Breakout: disable
    interfaces:
      Ethernet0:
        MediaType: opt
        Bandwidth: 10000
";

const RUNNING_CONFIG: &str = r#"{
  "MGMT_INTERFACE": {"eth0|10.250.0.101/24": {"gwaddr": "10.250.0.1"}},
  "DEVICE_METADATA": {"localhost": {"hostname": "str-s6000-01", "hwsku": "Force10-S6000-Q32"}}
}"#;

const PRESET_CONFIG: &str = r#"{
  "DEVICE_METADATA": {"localhost": {"hwsku": "Force10-S6000", "type": "ToRRouter"}}
}"#;

// DUT answering the queries issued while setting up a new image.
fn device(paths: &'static [&'static str]) -> FakeHost {
    FakeHost::new(DUT).with_responder(move |module, args: &ModuleArgs| {
        let mut res = ModuleResult::default();
        match module {
            "stat" => {
                let path = args.get("path").unwrap_or_default();
                res.stat = Some(ModuleStat {
                    exists: paths.contains(&path),
                });
            }
            "shell" => {
                let cmd = args.as_free_form().unwrap_or_default();
                res.stdout = if cmd.ends_with("localhost.platform") {
                    PLATFORM.to_owned()
                } else if cmd.ends_with("localhost.hwsku") {
                    "Force10-S6000".to_owned()
                } else if cmd.ends_with("build_version") {
                    "master.123-abc\n".to_owned()
                } else if cmd.starts_with("sonic-cfggen -d --print-data") {
                    RUNNING_CONFIG.to_owned()
                } else if cmd.contains("--preset l2") {
                    PRESET_CONFIG.to_owned()
                } else {
                    String::new()
                };
            }
            _ => (),
        }
        res
    })
}

fn fixture(host: FakeHost) -> (Arc<FakeHost>, Arc<FakeShell>, autotest::Context) {
    let host = Arc::new(host);
    let factory = Arc::new(FakeHostFactory::default().with_host(host.clone()));
    let shell = Arc::new(FakeShell::new());
    let ctx = context(Config::default(), shell.clone(), factory, Path::new("/tmp"));
    (host, shell, ctx)
}

#[tokio::test]
async fn connected_topology() {
    let (_, _, ctx) = fixture(FakeHost::new(DUT).with_responder(|_, _| {
        ModuleResult {
            stdout: "t1-lag\n".to_owned(),
            ..Default::default()
        }
    }));
    assert_eq!(
        dut::connected_topo(&ctx, DUT).await.unwrap().as_deref(),
        Some("t1-lag")
    );

    let (_, _, ctx) = fixture(FakeHost::new(DUT));
    assert_eq!(dut::connected_topo(&ctx, DUT).await.unwrap(), None);

    let (_, _, ctx) = fixture(FakeHost::new(DUT).with_responder(|_, _| {
        ModuleResult {
            rc: 1,
            stderr: "No such file or directory".to_owned(),
            ..Default::default()
        }
    }));
    assert_eq!(dut::connected_topo(&ctx, DUT).await.unwrap(), None);
}

#[tokio::test]
async fn logrotate_control() {
    let (host, shell, ctx) = fixture(FakeHost::new(DUT));

    assert!(dut::disable_logrotate(&ctx, DUT).await.unwrap());
    assert!(dut::enable_logrotate(&ctx, DUT).await.unwrap());

    let calls = host.calls();
    assert_eq!(calls[0].1.get("dest"), Some("/etc/cron.d/logrotate"));
    assert_eq!(calls[0].1.get("regexp"), Some("^"));
    assert_eq!(calls[0].1.get("replace"), Some("#"));
    assert_eq!(calls[1].1.get("regexp"), Some("^#"));
    assert_eq!(calls[1].1.get("replace"), Some(""));
    assert_eq!(
        shell.commands(),
        ["for i in $(seq 1 5); do if (ansible -i lab str-s6000-01 -b -m shell -a '! ps -aux | grep logrotate | grep -v grep'); then break; fi; sleep 1; done"]
    );
}

#[tokio::test]
async fn upgrade_restores_topology_marker() {
    let (host, shell, ctx) =
        fixture(device(&["/etc/sonic/old_config/topo_marker"]));

    dut::upgrade(&ctx, DUT, "http://10.0.0.1/sonic-broadcom.bin")
        .await
        .unwrap();

    assert_eq!(
        shell.commands(),
        ["ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook upgrade_sonic.yml -i lab -l str-s6000-01 -vvv -e upgrade_type=sonic -e image_url=http://10.0.0.1/sonic-broadcom.bin"]
    );
    assert_eq!(
        host.shell_commands(),
        ["cp /etc/sonic/old_config/topo_marker /etc/sonic/."]
    );
}

#[tokio::test]
async fn upgrade_failure() {
    let host = Arc::new(device(&[]));
    let factory = Arc::new(FakeHostFactory::default().with_host(host.clone()));
    let shell = Arc::new(FakeShell::failing("upgrade_sonic.yml"));
    let ctx = context(Config::default(), shell, factory, Path::new("/tmp"));

    let result = dut::upgrade(&ctx, DUT, "sonic.bin").await;
    assert!(matches!(result, Err(Error::UpgradeFailed(..))));
    assert!(host.shell_commands().is_empty());
}

#[tokio::test]
async fn setup_after_install() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("testbed-topo1.yaml");
    std::fs::write(&path, TESTBED_CONFIG).unwrap();

    let (host, shell, ctx) = fixture(device(&[
        "/usr/share/sonic/device/x86_64-dell_s6000_s1220-r0/Force10-S6000-R0A",
    ]));
    dut::setup_after_install(&ctx, DUT, Some(&path)).await.unwrap();

    let device_dir = format!("/usr/share/sonic/device/{}", PLATFORM);
    assert_eq!(
        host.shell_commands(),
        [
            "sonic-cfggen -d -v DEVICE_METADATA.localhost.platform".to_owned(),
            format!("cp {0}/default_sku {0}/default_sku.origin", device_dir),
            format!("rm -rf {}/Force10-S6000", device_dir),
            format!("cp -r {0}/Force10-S6000-R0A {0}/Force10-S6000", device_dir),
            "port-breakout -0 breakout 0-3".to_owned(),
            "port-breakout -0 disable 4-7".to_owned(),
            "sonic-cfggen -y /etc/sonic/sonic_version.yml -v build_version".to_owned(),
            "rm /host/image-master.123-abc/platform/firsttime".to_owned(),
            "sonic-cfggen -d --print-data".to_owned(),
            "sonic-cfggen -k Force10-S6000 --preset l2".to_owned(),
            "sonic-cfggen -j /tmp/tmp_cfg --print-data > /etc/sonic/config_db.json"
                .to_owned(),
            "sfpdet config -p Ethernet0 -m opt".to_owned(),
            "sonic-cfggen -d -v DEVICE_METADATA.localhost.hwsku".to_owned(),
        ]
    );
    assert_eq!(shell.count("reboot_sonic.yml"), 1);

    // Preset configuration keeps the management settings of the DUT.
    let calls = host.calls();
    let (_, copy) = calls
        .iter()
        .find(|(module, _)| module == "copy")
        .unwrap();
    let content: serde_json::Value =
        serde_json::from_str(copy.get("content").unwrap()).unwrap();
    assert_eq!(content["DEVICE_METADATA"]["localhost"]["hwsku"], "Force10-S6000");
    assert_eq!(content["DEVICE_METADATA"]["localhost"]["hostname"], "str-s6000-01");
    assert!(content["MGMT_INTERFACE"].is_object());

    let (_, speed) = calls
        .iter()
        .find(|(module, _)| module == "lineinfile")
        .unwrap();
    assert_eq!(
        speed.get("dest"),
        Some(
            "/usr/share/sonic/device/x86_64-dell_s6000_s1220-r0/Force10-S6000/port_config.ini"
        )
    );
    assert!(speed.get("line").unwrap().contains("10000"));
}

#[tokio::test]
async fn setup_requires_testbed_config() {
    let (host, _, ctx) = fixture(device(&[]));

    let result = dut::setup_after_install(&ctx, DUT, None).await;
    assert!(matches!(result, Err(Error::TestbedConfigMissing)));
    assert!(host.calls().is_empty());
}

#[tokio::test]
async fn setup_missing_hwsku_dir() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("testbed-topo1.yaml");
    std::fs::write(&path, TESTBED_CONFIG).unwrap();

    let (_, _, ctx) = fixture(device(&[]));
    let result = dut::setup_after_install(&ctx, DUT, Some(&path)).await;
    assert!(matches!(result, Err(Error::HwskuDirNotFound(..))));
}
