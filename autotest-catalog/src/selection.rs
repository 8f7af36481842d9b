//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, warn};

use crate::error::{Error, PlanViolation};
use crate::nullable;
use crate::testbed::TestbedCatalog;
use crate::testcase::TestcaseCatalog;

/// Topologies considered when no explicit selection is given.
pub const DEFAULT_TOPOLOGIES: [&str; 6] =
    ["ptf32", "t0", "t1", "t1-lag", "t1-6", "t1-9-lag"];

/// Platform the test run targets.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Vskvm,
    Dut,
}

/// Ordered mapping of topology names to the tests to run on them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ExecutionPlan {
    entries: Vec<(String, Vec<String>)>,
}

/// Contents of a user-supplied selection file.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserSelection {
    #[serde(deserialize_with = "nullable")]
    pub vskvm: ExecutionPlan,
    #[serde(deserialize_with = "nullable")]
    pub dut: ExecutionPlan,
    #[serde(deserialize_with = "nullable")]
    pub filter: Filter,
}

/// Exclusion rules applied on top of the selected plan.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Filter {
    #[serde(deserialize_with = "nullable")]
    pub topo: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub cases: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub topo_cases: BTreeMap<String, Vec<String>>,
}

/// Resolves the execution plan of a run from the loaded catalogs.
#[derive(Debug)]
pub struct Selection<'a> {
    testcases: &'a TestcaseCatalog,
    testbeds: &'a TestbedCatalog,
}

// ===== impl Platform =====

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Vskvm => write!(f, "vskvm"),
            Platform::Dut => write!(f, "dut"),
        }
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Platform, String> {
        match s {
            "vskvm" => Ok(Platform::Vskvm),
            "dut" => Ok(Platform::Dut),
            _ => Err(format!("unknown platform: {}", s)),
        }
    }
}

// ===== impl ExecutionPlan =====

impl ExecutionPlan {
    /// Sets the tests of a topology, keeping its position if already
    /// present.
    pub fn insert(&mut self, topo: String, tests: Vec<String>) {
        match self.entries.iter_mut().find(|(name, _)| *name == topo) {
            Some((_, entry)) => *entry = tests,
            None => self.entries.push((topo, tests)),
        }
    }

    pub fn get(&self, topo: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(name, _)| name == topo)
            .map(|(_, tests)| tests.as_slice())
    }

    pub fn topologies(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(topo, _)| topo.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(topo, tests)| (topo.as_str(), tests.as_slice()))
    }

    // Total number of scheduled tests.
    pub fn test_count(&self) -> usize {
        self.entries.iter().map(|(_, tests)| tests.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn retain_topologies<F>(&mut self, mut f: F)
    where
        F: FnMut(&str) -> bool,
    {
        self.entries.retain(|(topo, _)| f(topo));
    }

    fn retain_tests<F>(&mut self, mut f: F)
    where
        F: FnMut(&str, &str) -> bool,
    {
        for (topo, tests) in &mut self.entries {
            tests.retain(|test| f(topo, test));
        }
    }
}

impl FromIterator<(String, Vec<String>)> for ExecutionPlan {
    fn from_iter<I>(iter: I) -> ExecutionPlan
    where
        I: IntoIterator<Item = (String, Vec<String>)>,
    {
        let mut plan = ExecutionPlan::default();
        for (topo, tests) in iter {
            plan.insert(topo, tests);
        }
        plan
    }
}

impl Serialize for ExecutionPlan {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (topo, tests) in &self.entries {
            map.serialize_entry(topo, tests)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ExecutionPlan {
    fn deserialize<D>(deserializer: D) -> Result<ExecutionPlan, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct PlanVisitor;

        impl<'de> Visitor<'de> for PlanVisitor {
            type Value = ExecutionPlan;

            fn expecting(
                &self,
                f: &mut std::fmt::Formatter<'_>,
            ) -> std::fmt::Result {
                write!(f, "a map of topologies to test case lists")
            }

            fn visit_map<A>(self, mut access: A) -> Result<ExecutionPlan, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut plan = ExecutionPlan::default();
                while let Some((topo, tests)) =
                    access.next_entry::<String, Option<Vec<String>>>()?
                {
                    plan.insert(topo, tests.unwrap_or_default());
                }
                Ok(plan)
            }
        }

        deserializer.deserialize_map(PlanVisitor)
    }
}

// ===== impl UserSelection =====

impl UserSelection {
    pub fn load(path: &Path) -> Result<UserSelection, Error> {
        let data = std::fs::read_to_string(path)
            .map_err(|error| Error::FileRead(path.to_owned(), error))?;
        let selection: Option<UserSelection> = serde_yaml::from_str(&data)
            .map_err(|error| Error::SelectionParse(path.to_owned(), error))?;
        Ok(selection.unwrap_or_default())
    }

    pub fn bucket(&self, platform: Platform) -> &ExecutionPlan {
        match platform {
            Platform::Vskvm => &self.vskvm,
            Platform::Dut => &self.dut,
        }
    }
}

// ===== impl Filter =====

impl Filter {
    fn excludes_topo(&self, topo: &str) -> bool {
        self.topo.iter().any(|name| name == topo)
    }

    fn excludes_test(&self, topo: &str, test: &str) -> bool {
        self.cases.iter().any(|name| name == test)
            || self
                .topo_cases
                .get(topo)
                .is_some_and(|tests| tests.iter().any(|name| name == test))
    }

    fn apply(&self, plan: &mut ExecutionPlan) {
        plan.retain_topologies(|topo| {
            let excluded = self.excludes_topo(topo);
            if excluded {
                debug!(%topo, "topology filtered by user");
            }
            !excluded
        });
        plan.retain_tests(|topo, test| {
            let excluded = self.excludes_test(topo, test);
            if excluded {
                debug!(%topo, %test, "testcase filtered by user");
            }
            !excluded
        });
    }
}

// ===== impl Selection =====

impl<'a> Selection<'a> {
    pub fn new(
        testcases: &'a TestcaseCatalog,
        testbeds: &'a TestbedCatalog,
    ) -> Selection<'a> {
        Selection {
            testcases,
            testbeds,
        }
    }

    /// Resolves the plan to execute on the given platform.
    pub fn resolve(
        &self,
        user: Option<&UserSelection>,
        platform: Platform,
    ) -> Result<ExecutionPlan, Error> {
        let mut plan = match user.map(|user| user.bucket(platform)) {
            Some(bucket) if !bucket.is_empty() => bucket.clone(),
            _ => self.default_plan(platform),
        };

        if let Some(user) = user {
            user.filter.apply(&mut plan);
        }

        self.validate(&mut plan)?;
        Ok(plan)
    }

    // Every known candidate on the default topologies that is eligible on
    // the platform.
    fn default_plan(&self, platform: Platform) -> ExecutionPlan {
        DEFAULT_TOPOLOGIES
            .iter()
            .filter(|topo| !self.testcases.candidates(topo).is_empty())
            .map(|topo| {
                let tests = self
                    .testcases
                    .candidates(topo)
                    .iter()
                    .filter(|test| {
                        let eligible = self
                            .testcases
                            .get(test)
                            .is_some_and(|meta| meta.is_eligible(platform));
                        if !eligible {
                            debug!(%test, %platform, "testcase not eligible on platform");
                        }
                        eligible
                    })
                    .cloned()
                    .collect();
                (topo.to_string(), tests)
            })
            .collect()
    }

    fn validate(&self, plan: &mut ExecutionPlan) -> Result<(), Error> {
        plan.retain_topologies(|topo| {
            let valid = self.testbeds.is_valid_topo(topo);
            if !valid {
                warn!(%topo, "topology not supported on this testbed, skipping");
            }
            valid
        });

        let violations = plan
            .iter()
            .flat_map(|(topo, tests)| {
                tests.iter().filter_map(move |test| {
                    match self.testcases.get(test) {
                        None => Some(PlanViolation::UnknownTestcase {
                            topo: topo.to_owned(),
                            test: test.clone(),
                        }),
                        Some(meta) if !meta.supports_topo(topo) => {
                            Some(PlanViolation::UnsupportedTopology {
                                topo: topo.to_owned(),
                                test: test.clone(),
                            })
                        }
                        Some(_) => None,
                    }
                })
            })
            .collect::<Vec<_>>();
        if !violations.is_empty() {
            return Err(Error::PlanValidation(violations));
        }

        Ok(())
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_order() {
        let plan: ExecutionPlan = serde_yaml::from_str(
            "t1: [b, a]\n\
             t0: [c]\n\
             ptf32:\n",
        )
        .unwrap();
        assert_eq!(plan.topologies().collect::<Vec<_>>(), ["t1", "t0", "ptf32"]);
        assert_eq!(plan.get("ptf32"), Some(&[][..]));
        assert_eq!(plan.test_count(), 3);
    }

    #[test]
    fn test_plan_insert() {
        let mut plan = ExecutionPlan::default();
        plan.insert("t0".to_owned(), vec!["a".to_owned()]);
        plan.insert("t1".to_owned(), vec![]);
        plan.insert("t0".to_owned(), vec!["b".to_owned()]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.topologies().next(), Some("t0"));
        assert_eq!(plan.get("t0"), Some(&["b".to_owned()][..]));
    }

    #[test]
    fn test_platform() {
        assert_eq!("vskvm".parse::<Platform>(), Ok(Platform::Vskvm));
        assert_eq!("dut".parse::<Platform>(), Ok(Platform::Dut));
        assert!("kvm".parse::<Platform>().is_err());
        assert_eq!(Platform::Vskvm.to_string(), "vskvm");
    }

    #[test]
    fn test_filter() {
        let filter: Filter = serde_yaml::from_str(
            "topo: [t1]\n\
             cases: [fdb]\n\
             topo_cases:\n\
             \x20 t0: [vlan]\n",
        )
        .unwrap();
        let mut plan = ExecutionPlan::from_iter([
            ("t0".to_owned(), vec!["fdb".to_owned(), "vlan".to_owned(), "lag".to_owned()]),
            ("t1".to_owned(), vec!["bgp".to_owned()]),
            ("t1-lag".to_owned(), vec!["vlan".to_owned(), "fdb".to_owned()]),
        ]);
        filter.apply(&mut plan);

        assert_eq!(plan.topologies().collect::<Vec<_>>(), ["t0", "t1-lag"]);
        assert_eq!(plan.get("t0"), Some(&["lag".to_owned()][..]));
        assert_eq!(plan.get("t1-lag"), Some(&["vlan".to_owned()][..]));
    }
}
