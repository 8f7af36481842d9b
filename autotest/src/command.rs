//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

use autotest_catalog::{TestbedEntry, TestcaseMeta};
use autotest_utils::shell::quote;
use tracing::warn;

const TEST_PLAYBOOK: &str = "test_sonic.yml";
const DSCP_MODE_VARS: &str = "dscp_mode=pipe ecn_mode=copy_from_outer";

/// Argument passed to `ansible-playbook`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlaybookArg {
    // `-e name=value`
    Var(&'static str, String),
    // `-e "<raw>"`, possibly carrying several assignments.
    RawVars(String),
    Become,
}

/// Command line running a single test case playbook.
#[derive(Clone, Debug)]
pub struct TestCommand {
    inventory: String,
    dut: String,
    args: Vec<PlaybookArg>,
    log: Option<PathBuf>,
}

// ===== impl PlaybookArg =====

impl PlaybookArg {
    fn render(&self) -> String {
        match self {
            PlaybookArg::Var(name, value) => {
                format!("-e {}", quote(&format!("{}={}", name, value)))
            }
            PlaybookArg::RawVars(vars) => format!("-e {}", quote(vars)),
            PlaybookArg::Become => "-b".to_owned(),
        }
    }
}

// ===== impl TestCommand =====

impl TestCommand {
    pub fn new(inventory: &str, dut: &str) -> TestCommand {
        TestCommand {
            inventory: inventory.to_owned(),
            dut: dut.to_owned(),
            args: vec![],
            log: None,
        }
    }

    /// Builds the command of a test case run against the given testbed.
    pub fn for_testcase(
        inventory: &str,
        test: &str,
        meta: &TestcaseMeta,
        testbed: &TestbedEntry,
    ) -> TestCommand {
        let vars = &meta.required_vars;
        let mut cmd = TestCommand::new(inventory, &testbed.dut)
            .var("testcase_name", test)
            .var("testbed_name", &testbed.conf_name);

        if vars.testbed_type {
            cmd = cmd.var("testbed_type", &testbed.topo);
        }
        if vars.ptf_host {
            match testbed.ptf_addr() {
                Some(addr) => cmd = cmd.var("ptf_host", &addr.to_string()),
                None => {
                    warn!(%test, conf_name = %testbed.conf_name, "testbed has no ptf address");
                }
            }
        }
        if let Some(mtu) = vars.mtu() {
            cmd = cmd.var("mtu", &mtu.to_string());
        }
        if vars.dscp_mode {
            cmd = cmd.raw_vars(DSCP_MODE_VARS);
        }
        if vars.vm_hosts {
            cmd = cmd.var("vm", &testbed.vm_base);
        }
        if meta.sudo {
            cmd = cmd.arg(PlaybookArg::Become);
        }
        if let Some(extra) = meta.extra_cmd_args.as_deref()
            && !extra.is_empty()
        {
            cmd = cmd.raw_vars(extra);
        }

        cmd
    }

    pub fn arg(mut self, arg: PlaybookArg) -> TestCommand {
        self.args.push(arg);
        self
    }

    pub fn var(self, name: &'static str, value: &str) -> TestCommand {
        self.arg(PlaybookArg::Var(name, value.to_owned()))
    }

    pub fn raw_vars(self, vars: &str) -> TestCommand {
        self.arg(PlaybookArg::RawVars(vars.to_owned()))
    }

    pub fn log(mut self, path: &Path) -> TestCommand {
        self.log = Some(path.to_owned());
        self
    }

    pub fn args(&self) -> &[PlaybookArg] {
        &self.args
    }

    /// Renders the shell command line.
    pub fn render(&self) -> String {
        let mut line = format!(
            "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook -i {} -vvv --limit {} {}",
            quote(&self.inventory),
            quote(&self.dut),
            TEST_PLAYBOOK
        );
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.render());
        }
        if let Some(log) = &self.log {
            line.push_str(" > ");
            line.push_str(&quote(&log.to_string_lossy()));
        }
        line
    }
}

impl std::fmt::Display for TestCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.render())
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn testbed() -> TestbedEntry {
        TestbedEntry {
            conf_name: "vms-t0".to_owned(),
            group_name: "vms1-1".to_owned(),
            topo: "t0".to_owned(),
            dut: "vlab-01".to_owned(),
            vm_base: "VM0100".to_owned(),
            vm_base_ip: None,
            ptf_ip: Some("10.255.0.188/24".parse().unwrap()),
            extra: BTreeMap::new(),
        }
    }

    fn meta(yaml: &str) -> TestcaseMeta {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_command() {
        let meta = meta("topologies: [t0]");
        let cmd = TestCommand::for_testcase("lab", "bgp_fact", &meta, &testbed());
        assert_eq!(
            cmd.render(),
            "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook -i lab -vvv --limit vlab-01 test_sonic.yml -e testcase_name=bgp_fact -e testbed_name=vms-t0"
        );
    }

    #[test]
    fn test_required_vars() {
        let meta = self::meta(
            "topologies: [t0]\n\
             required_vars:\n\
             \x20 testbed_type:\n\
             \x20 ptf_host:\n\
             \x20 mtu:\n\
             \x20 dscp_mode:\n\
             \x20 vm_hosts:\n\
             sudo:\n\
             extra_cmd_args: \"fast_reboot=true\"\n",
        );
        let cmd = TestCommand::for_testcase("lab", "decap", &meta, &testbed())
            .log(Path::new("/tmp/1/t0/decap/decap_ansible.log"));

        assert_eq!(
            cmd.args(),
            [
                PlaybookArg::Var("testcase_name", "decap".to_owned()),
                PlaybookArg::Var("testbed_name", "vms-t0".to_owned()),
                PlaybookArg::Var("testbed_type", "t0".to_owned()),
                PlaybookArg::Var("ptf_host", "10.255.0.188".to_owned()),
                PlaybookArg::Var("mtu", "9000".to_owned()),
                PlaybookArg::RawVars(DSCP_MODE_VARS.to_owned()),
                PlaybookArg::Var("vm", "VM0100".to_owned()),
                PlaybookArg::Become,
                PlaybookArg::RawVars("fast_reboot=true".to_owned()),
            ]
        );
        assert!(cmd.render().ends_with(
            "-e 'dscp_mode=pipe ecn_mode=copy_from_outer' -e vm=VM0100 -b -e fast_reboot=true > /tmp/1/t0/decap/decap_ansible.log"
        ));
    }

    #[test]
    fn test_mtu_value() {
        let meta = meta("topologies: [t1]\nrequired_vars:\n  mtu: 1514\n");
        let cmd = TestCommand::for_testcase("lab", "mtu", &meta, &testbed());
        assert!(cmd.args().contains(&PlaybookArg::Var("mtu", "1514".to_owned())));
    }

    #[test]
    fn test_missing_ptf_addr() {
        let meta = meta("topologies: [t0]\nrequired_vars:\n  ptf_host:\n");
        let mut testbed = testbed();
        testbed.ptf_ip = None;
        let cmd = TestCommand::for_testcase("lab", "fib", &meta, &testbed);
        assert_eq!(cmd.args().len(), 2);
    }
}
