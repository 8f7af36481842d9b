//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use autotest_catalog::error::Error;
use autotest_catalog::testcase::{RequiredVars, TestcaseCatalog};
use tempfile::TempDir;

const TESTCASES: &str = "\
testcases:
  fdb:
    topologies: [t0, t1-lag, ptf32]
    vir_platform: [vskvm]
    required_vars:
      ptf_host:
      testbed_type:
  vlan:
    topologies: [t0]
    sleep_for_reboot: 120
    reboot_after_test: true
    archive_logs:
      dut: [/var/log/frr/*]
  bgp_fact:
    topologies: [t1, t1-lag, t0]
    sudo: true
    extra_cmd_args: bgp_peers=4
";

const L2_TESTCASES: &str = "\
l2_testcases:
  l2_port:
    topologies: [t0]
    vir_platform: [vskvm]
    archive_logs_flag: false
";

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn load_testcases() {
    let dir = TempDir::new().unwrap();
    let files = [
        write(&dir, "testcases.yml", TESTCASES),
        write(&dir, "l2_testcases.yml", L2_TESTCASES),
    ];
    let catalog = TestcaseCatalog::load(&files).unwrap();

    assert_eq!(catalog.len(), 4);
    assert_eq!(catalog.candidates("t0"), ["fdb", "vlan", "bgp_fact", "l2_port"]);
    assert_eq!(catalog.candidates("t1-lag"), ["fdb", "bgp_fact"]);
    assert_eq!(catalog.candidates("t1"), ["bgp_fact"]);
    assert!(catalog.candidates("t1-64").is_empty());

    let fdb = catalog.get("fdb").unwrap();
    assert_eq!(fdb.vir_platform, ["vskvm"]);
    assert!(fdb.required_vars.ptf_host);
    assert!(fdb.required_vars.testbed_type);
    assert!(!fdb.required_vars.vm_hosts);
    assert!(fdb.archive_logs_flag);

    let vlan = catalog.get("vlan").unwrap();
    assert_eq!(vlan.required_vars, RequiredVars::default());
    assert_eq!(vlan.sleep_for_reboot, Some(120));
    assert!(vlan.reboot_after_test);
    assert_eq!(vlan.archive_logs.dut, ["/var/log/frr/*"]);
    assert!(vlan.archive_logs.ptf.is_empty());

    let bgp_fact = catalog.get("bgp_fact").unwrap();
    assert!(bgp_fact.sudo);
    assert_eq!(bgp_fact.extra_cmd_args.as_deref(), Some("bgp_peers=4"));

    assert!(!catalog.get("l2_port").unwrap().archive_logs_flag);
    assert!(!catalog.contains("l2_lag"));
}

#[test]
fn duplicate_testcase_across_files() {
    let dir = TempDir::new().unwrap();
    let files = [
        write(&dir, "testcases.yml", TESTCASES),
        write(
            &dir,
            "more_testcases.yml",
            "more_testcases:\n  vlan:\n    topologies: [t1]\n",
        ),
    ];
    let error = TestcaseCatalog::load(&files).unwrap_err();

    assert!(matches!(error, Error::DuplicateTestcase(_, name) if name == "vlan"));
}

#[test]
fn duplicate_testcase_across_groups() {
    let dir = TempDir::new().unwrap();
    let files = [write(
        &dir,
        "testcases.yml",
        "testcases:\n  vlan:\n    topologies: [t0]\n\
         l2_testcases:\n  vlan:\n    topologies: [t1]\n",
    )];
    let error = TestcaseCatalog::load(&files).unwrap_err();

    assert!(matches!(error, Error::DuplicateTestcase(_, name) if name == "vlan"));
}

#[test]
fn invalid_group() {
    let dir = TempDir::new().unwrap();
    let files = [write(
        &dir,
        "testcases.yml",
        "suites:\n  vlan:\n    topologies: [t0]\n",
    )];
    let error = TestcaseCatalog::load(&files).unwrap_err();

    assert!(matches!(error, Error::InvalidTestcaseGroup(_, group) if group == "suites"));
}

#[test]
fn missing_topologies() {
    let dir = TempDir::new().unwrap();
    let files = [write(
        &dir,
        "testcases.yml",
        "testcases:\n  vlan:\n    sudo: true\n",
    )];
    let error = TestcaseCatalog::load(&files).unwrap_err();

    assert!(matches!(error, Error::TestcaseMeta(_, name, _) if name == "vlan"));
}

#[test]
fn missing_file() {
    let error =
        TestcaseCatalog::load(&["/nonexistent/testcases.yml"]).unwrap_err();

    assert!(matches!(error, Error::FileRead(..)));
}
