//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use autotest::config::Config;
use autotest::context::Context;
use autotest::logdir::LogDir;
use autotest_catalog::TestbedEntry;
use autotest_utils::host::HostRegistry;
use autotest_utils::testing::{FakeHostFactory, FakeShell};

pub const DUT: &str = "str-s6000-01";

pub fn context(
    config: Config,
    shell: Arc<FakeShell>,
    factory: Arc<FakeHostFactory>,
    log_root: &Path,
) -> Context {
    let logdir = LogDir::new(log_root, Some("1"));
    Context::new(config, shell, HostRegistry::new(factory), logdir)
}

pub fn testbed(topo: &str) -> TestbedEntry {
    TestbedEntry {
        conf_name: format!("vms-{}", topo),
        group_name: "vms1-1".to_owned(),
        topo: topo.to_owned(),
        dut: DUT.to_owned(),
        vm_base: "VM0100".to_owned(),
        vm_base_ip: Some("10.250.0.51".parse().unwrap()),
        ptf_ip: Some("10.255.0.188/24".parse().unwrap()),
        extra: BTreeMap::new(),
    }
}
