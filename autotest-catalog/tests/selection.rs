//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use autotest_catalog::error::{Error, PlanViolation};
use autotest_catalog::selection::{
    ExecutionPlan, Platform, Selection, UserSelection,
};
use autotest_catalog::testbed::TestbedCatalog;
use autotest_catalog::testcase::TestcaseCatalog;
use autotest_utils::host::HostRegistry;
use autotest_utils::testing::FakeHostFactory;
use maplit::btreemap;
use tempfile::TempDir;

const TESTBED: &str = "\
# conf-name,group-name,topo,ptf_ip,vm_base,dut
vms-t1,vms1-1,t1,10.255.0.189/24,,str-s6000-01
vms-t0,vms1-1,t0,10.255.0.188/24,,str-s6000-01
";

const TESTCASES: &str = "\
testcases:
  fdb:
    topologies: [t0, t1-lag, ptf32]
    vir_platform: [vskvm]
  vlan:
    topologies: [t0]
  bgp_fact:
    topologies: [t1, t1-lag, t0]
    vir_platform: [vskvm]
  lag_2:
    topologies: [t1-lag, t0-116]
l2_testcases:
  l2_port:
    topologies: [t0]
    vir_platform: [vskvm]
";

struct Fixture {
    dir: TempDir,
    testcases: TestcaseCatalog,
    testbeds: TestbedCatalog,
}

impl Fixture {
    async fn new() -> Fixture {
        let dir = TempDir::new().unwrap();
        let testbed_path = dir.path().join("testbed.csv");
        std::fs::write(&testbed_path, TESTBED).unwrap();
        let testcases_path = dir.path().join("testcases.yml");
        std::fs::write(&testcases_path, TESTCASES).unwrap();

        let hosts = HostRegistry::new(FakeHostFactory::default());
        let testbeds =
            TestbedCatalog::load(&testbed_path, &hosts).await.unwrap();
        let testcases = TestcaseCatalog::load(&[testcases_path]).unwrap();

        Fixture {
            dir,
            testcases,
            testbeds,
        }
    }

    fn selection(&self) -> Selection<'_> {
        Selection::new(&self.testcases, &self.testbeds)
    }

    fn user_selection(&self, content: &str) -> UserSelection {
        let path: PathBuf = self.dir.path().join("user.yml");
        std::fs::write(&path, content).unwrap();
        UserSelection::load(&path).unwrap()
    }
}

fn plan(yaml: &str) -> ExecutionPlan {
    serde_yaml::from_str(yaml).unwrap()
}

#[tokio::test]
async fn default_plan_on_dut() {
    let fixture = Fixture::new().await;
    let plan = fixture.selection().resolve(None, Platform::Dut).unwrap();

    // Allow-list order, restricted to the topologies of the testbed.
    assert_eq!(
        plan,
        self::plan("{t0: [fdb, vlan, bgp_fact, l2_port], t1: [bgp_fact]}")
    );
}

#[tokio::test]
async fn default_plan_on_vskvm() {
    let fixture = Fixture::new().await;
    let plan = fixture.selection().resolve(None, Platform::Vskvm).unwrap();

    assert_eq!(
        plan,
        self::plan("{t0: [fdb, bgp_fact, l2_port], t1: [bgp_fact]}")
    );
}

#[tokio::test]
async fn user_bucket_used_verbatim() {
    let fixture = Fixture::new().await;
    let user = fixture.user_selection(
        "vskvm:\n\
         \x20 t1: [bgp_fact]\n\
         \x20 t0: [vlan, fdb]\n\
         \x20 t1-lag: [lag_2]\n",
    );
    let plan = fixture
        .selection()
        .resolve(Some(&user), Platform::Vskvm)
        .unwrap();

    // No platform filtering, unknown testbed topology dropped.
    assert_eq!(
        plan,
        self::plan("{t1: [bgp_fact], t0: [vlan, fdb]}")
    );
}

#[tokio::test]
async fn empty_user_bucket_falls_back() {
    let fixture = Fixture::new().await;
    let user = fixture.user_selection(
        "vskvm:\n\
         dut:\n\
         \x20 t0: [vlan]\n",
    );
    let plan = fixture
        .selection()
        .resolve(Some(&user), Platform::Vskvm)
        .unwrap();

    assert_eq!(
        plan,
        self::plan("{t0: [fdb, bgp_fact, l2_port], t1: [bgp_fact]}")
    );
}

#[tokio::test]
async fn user_filter() {
    let fixture = Fixture::new().await;
    let user = fixture.user_selection(
        "filter:\n\
         \x20 topo: [t1]\n\
         \x20 cases: [l2_port]\n\
         \x20 topo_cases:\n\
         \x20   t0: [fdb]\n",
    );
    let plan = fixture
        .selection()
        .resolve(Some(&user), Platform::Dut)
        .unwrap();

    assert_eq!(plan, self::plan("{t0: [vlan, bgp_fact]}"));
}

#[tokio::test]
async fn validation_collects_violations() {
    let fixture = Fixture::new().await;
    let user = fixture.user_selection(
        "dut:\n\
         \x20 t0: [vlan, ecmp, lag_2]\n\
         \x20 t1: [vlan]\n",
    );
    let error = fixture
        .selection()
        .resolve(Some(&user), Platform::Dut)
        .unwrap_err();

    let Error::PlanValidation(violations) = error else {
        panic!("expected a plan validation error");
    };
    assert_eq!(
        violations,
        [
            PlanViolation::UnknownTestcase {
                topo: "t0".to_owned(),
                test: "ecmp".to_owned(),
            },
            PlanViolation::UnsupportedTopology {
                topo: "t0".to_owned(),
                test: "lag_2".to_owned(),
            },
            PlanViolation::UnsupportedTopology {
                topo: "t1".to_owned(),
                test: "vlan".to_owned(),
            },
        ]
    );
}

#[tokio::test]
async fn plan_serializes_in_order() {
    let plan = plan("{t1: [bgp_fact], t0: [vlan]}");
    let yaml = serde_yaml::to_string(&plan).unwrap();

    assert_eq!(yaml, "t1:\n- bgp_fact\nt0:\n- vlan\n");
    assert_eq!(
        serde_yaml::from_str::<std::collections::BTreeMap<String, Vec<String>>>(&yaml)
            .unwrap(),
        btreemap! {
            "t0".to_owned() => vec!["vlan".to_owned()],
            "t1".to_owned() => vec!["bgp_fact".to_owned()],
        }
    );
}
