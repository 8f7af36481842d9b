//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::Error;
use crate::nullable;
use crate::selection::Platform;

/// Metadata of a single test case.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TestcaseMeta {
    pub topologies: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub required_vars: RequiredVars,
    #[serde(default, deserialize_with = "nullable")]
    pub vir_platform: Vec<String>,
    #[serde(default)]
    pub sleep_for_reboot: Option<u64>,
    #[serde(default, deserialize_with = "nullable")]
    pub reboot_after_test: bool,
    #[serde(default, deserialize_with = "flag")]
    pub sudo: bool,
    #[serde(default)]
    pub extra_cmd_args: Option<String>,
    #[serde(default = "default_archive_logs_flag")]
    pub archive_logs_flag: bool,
    #[serde(default, deserialize_with = "nullable")]
    pub archive_logs: ArchiveLogs,
}

/// Variables a test playbook expects on its command line.
///
/// Only the presence of a key matters, except for `mtu` which may carry a
/// value.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(from = "BTreeMap<String, Value>")]
pub struct RequiredVars {
    pub testbed_type: bool,
    pub ptf_host: bool,
    pub mtu: Option<u32>,
    pub dscp_mode: bool,
    pub vm_hosts: bool,
}

/// File patterns to archive after a test, per host.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ArchiveLogs {
    #[serde(default, deserialize_with = "nullable")]
    pub ptf: Vec<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub dut: Vec<String>,
}

/// Catalog of the test cases declared in the testcase files.
#[derive(Clone, Debug, Default)]
pub struct TestcaseCatalog {
    testcases: HashMap<String, TestcaseMeta>,
    topo_testcases: BTreeMap<String, Vec<String>>,
}

// ===== impl TestcaseMeta =====

impl TestcaseMeta {
    /// Returns whether the test case can run on the given platform.
    pub fn is_eligible(&self, platform: Platform) -> bool {
        match platform {
            Platform::Dut => true,
            _ => self
                .vir_platform
                .iter()
                .any(|name| *name == platform.to_string()),
        }
    }

    pub fn supports_topo(&self, topo: &str) -> bool {
        self.topologies.iter().any(|name| name == topo)
    }
}

// ===== impl RequiredVars =====

impl RequiredVars {
    pub const MTU_JUMBO: u32 = 9000;

    // MTU to pass to the playbook, if required.
    pub fn mtu(&self) -> Option<u32> {
        self.mtu
    }
}

impl From<BTreeMap<String, Value>> for RequiredVars {
    fn from(vars: BTreeMap<String, Value>) -> RequiredVars {
        let mtu = vars.get("mtu").map(|value| {
            value
                .as_u64()
                .and_then(|mtu| u32::try_from(mtu).ok())
                .filter(|mtu| *mtu != 0)
                .unwrap_or(RequiredVars::MTU_JUMBO)
        });

        RequiredVars {
            testbed_type: vars.contains_key("testbed_type"),
            ptf_host: vars.contains_key("ptf_host"),
            mtu,
            dscp_mode: vars.contains_key("dscp_mode"),
            vm_hosts: vars.contains_key("vm_hosts"),
        }
    }
}

// ===== impl TestcaseCatalog =====

impl TestcaseCatalog {
    const GROUP_MARKER: &'static str = "testcases";

    /// Loads the given testcase files, in order.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<TestcaseCatalog, Error> {
        let mut catalog = TestcaseCatalog::default();
        for path in paths {
            catalog.load_file(path.as_ref())?;
        }
        Ok(catalog)
    }

    fn load_file(&mut self, path: &Path) -> Result<(), Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|error| Error::FileRead(path.to_owned(), error))?;
        let groups: Option<Mapping> = serde_yaml::from_str(&data)
            .map_err(|error| Error::TestcaseParse(path.to_owned(), error))?;

        for (group, testcases) in groups.unwrap_or_default() {
            let group = yaml_key(&group);
            if !group.contains(Self::GROUP_MARKER) {
                return Err(Error::InvalidTestcaseGroup(path.to_owned(), group));
            }

            let testcases: Option<Mapping> = serde_yaml::from_value(testcases)
                .map_err(|error| Error::TestcaseParse(path.to_owned(), error))?;
            for (name, meta) in testcases.unwrap_or_default() {
                let name = yaml_key(&name);
                if self.testcases.contains_key(&name) {
                    return Err(Error::DuplicateTestcase(path.to_owned(), name));
                }
                let meta: TestcaseMeta = serde_yaml::from_value(meta)
                    .map_err(|error| {
                        Error::TestcaseMeta(path.to_owned(), name.clone(), error)
                    })?;

                debug!(%name, ?meta, "found testcase");
                for topo in &meta.topologies {
                    self.topo_testcases
                        .entry(topo.clone())
                        .or_default()
                        .push(name.clone());
                }
                self.testcases.insert(name, meta);
            }
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TestcaseMeta> {
        self.testcases.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.testcases.contains_key(name)
    }

    // Test cases declaring the given topology, in declaration order.
    pub fn candidates(&self, topo: &str) -> &[String] {
        self.topo_testcases
            .get(topo)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.testcases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.testcases.is_empty()
    }
}

// ===== helper functions =====

fn default_archive_logs_flag() -> bool {
    true
}

// A key that is present counts as set, whatever its value.
fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    serde::de::IgnoredAny::deserialize(deserializer).map(|_| true)
}

fn yaml_key(key: &Value) -> String {
    match key {
        Value::String(key) => key.clone(),
        key => serde_yaml::to_string(key)
            .map(|key| key.trim_end().to_owned())
            .unwrap_or_default(),
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(yaml: &str) -> TestcaseMeta {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_meta_defaults() {
        let meta = meta("topologies: [t0]");
        assert_eq!(meta.required_vars, RequiredVars::default());
        assert!(meta.vir_platform.is_empty());
        assert!(meta.archive_logs_flag);
        assert!(!meta.sudo);
        assert!(!meta.reboot_after_test);
        assert_eq!(meta.sleep_for_reboot, None);
    }

    #[test]
    fn test_meta_nulls() {
        let meta = meta(
            "topologies: [t0]\n\
             required_vars:\n\
             vir_platform:\n\
             archive_logs:\n\
             sudo:\n",
        );
        assert_eq!(meta.required_vars, RequiredVars::default());
        assert!(meta.vir_platform.is_empty());
        assert_eq!(meta.archive_logs, ArchiveLogs::default());
        assert!(meta.sudo);
    }

    #[test]
    fn test_sudo_presence() {
        assert!(meta("topologies: [t0]\nsudo: false\n").sudo);
        assert!(meta("topologies: [t0]\nsudo: yes\n").sudo);
        assert!(!meta("topologies: [t0]\n").sudo);
    }

    #[test]
    fn test_required_vars() {
        let meta = meta(
            "topologies: [t1]\n\
             required_vars:\n\
             \x20 ptf_host:\n\
             \x20 testbed_type:\n\
             \x20 mtu:\n",
        );
        assert_eq!(
            meta.required_vars,
            RequiredVars {
                testbed_type: true,
                ptf_host: true,
                mtu: Some(RequiredVars::MTU_JUMBO),
                dscp_mode: false,
                vm_hosts: false,
            }
        );

        let meta = self::meta(
            "topologies: [t1]\n\
             required_vars:\n\
             \x20 mtu: 1514\n",
        );
        assert_eq!(meta.required_vars.mtu(), Some(1514));
    }

    #[test]
    fn test_eligibility() {
        let meta = meta("topologies: [t0]\nvir_platform: [vskvm]\n");
        assert!(meta.is_eligible(Platform::Dut));
        assert!(meta.is_eligible(Platform::Vskvm));

        let meta = self::meta("topologies: [t0]\n");
        assert!(meta.is_eligible(Platform::Dut));
        assert!(!meta.is_eligible(Platform::Vskvm));
    }
}
