//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use autotest_catalog::{
    ExecutionPlan, Platform, Selection, TestbedCatalog, TestbedEntry,
    TestcaseCatalog, UserSelection,
};
use tracing::{Instrument, debug, debug_span, info, warn};

use crate::context::Context;
use crate::drift::DriftReport;
use crate::dut;
use crate::error::Error;
use crate::report::RunResults;
use crate::runner::TestRunner;
use crate::topology::{StabilityTarget, TopologyManager};

/// Inputs of a run, as given on the command line.
#[derive(Clone, Debug)]
pub struct RunOptions {
    pub platform: Platform,
    pub testbed_file: PathBuf,
    pub selection_file: Option<PathBuf>,
    pub image_url: Option<String>,
    pub testbed_config: Option<PathBuf>,
}

/// Outcome of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub results: RunResults,
    pub drift: DriftReport,
}

/// Drives a whole run: recovers the DUT, prepares each topology and runs
/// its test cases.
#[derive(Debug)]
pub struct Orchestrator<'a> {
    ctx: &'a Context,
    testbeds: TestbedCatalog,
    testcases: TestcaseCatalog,
    topologies: TopologyManager<'a>,
}

// ===== impl RunSummary =====

impl RunSummary {
    pub fn log(&self) {
        self.results.log_summary(&self.drift);
    }

    pub fn any_failed(&self) -> bool {
        self.results.any_failed()
    }
}

// ===== impl Orchestrator =====

impl<'a> Orchestrator<'a> {
    /// Loads the testbed and testcase catalogs.
    pub async fn load(
        ctx: &'a Context,
        opts: &RunOptions,
    ) -> Result<Orchestrator<'a>, Error> {
        info!("loading testcases");
        let testcases = TestcaseCatalog::load(&ctx.config.testcase_files)?;

        info!("loading testbeds");
        let testbeds = TestbedCatalog::load(&opts.testbed_file, &ctx.hosts).await?;
        info!(
            topologies = ?testbeds.topologies().collect::<Vec<_>>(),
            "available topologies"
        );

        Ok(Orchestrator {
            ctx,
            testbeds,
            testcases,
            topologies: TopologyManager::new(ctx),
        })
    }

    pub fn resolve_plan(&self, opts: &RunOptions) -> Result<ExecutionPlan, Error> {
        let user = opts
            .selection_file
            .as_deref()
            .map(UserSelection::load)
            .transpose()?;
        let plan = Selection::new(&self.testcases, &self.testbeds)
            .resolve(user.as_ref(), opts.platform)?;

        match serde_yaml::to_string(&plan) {
            Ok(yaml) => info!("topologies and testcases to run:\n{}", yaml),
            Err(error) => warn!(%error, "failed to serialize execution plan"),
        }
        Ok(plan)
    }

    pub async fn run(&mut self, opts: &RunOptions) -> Result<RunSummary, Error> {
        let plan = self.resolve_plan(opts)?;
        let mut summary = RunSummary::default();
        if plan.test_count() == 0 {
            info!("nothing to run");
            return Ok(summary);
        }

        // Every testbed shares the same DUT.
        let Some(dut) = plan
            .topologies()
            .find_map(|topo| self.testbeds.get_by_topo(topo))
            .map(|entry| entry.dut.clone())
        else {
            info!("nothing to run");
            return Ok(summary);
        };

        let connected = self.recover(&dut).await?;

        if let Some(image_url) = &opts.image_url {
            if opts.platform == Platform::Vskvm {
                warn!("image upgrade not supported on virtual platform, skipping");
            } else {
                self.upgrade(&dut, image_url, opts, connected.as_deref())
                    .await?;
            }
        }

        for (topo, tests) in plan.iter() {
            if tests.is_empty() {
                debug!(%topo, "no testcases, skipping topology");
                continue;
            }

            self.run_topology(topo, tests, &mut summary)
                .instrument(debug_span!("topology", name = %topo))
                .await?;
        }

        Ok(summary)
    }

    // Removes every topology when the DUT doesn't know which one it is
    // connected to.
    async fn recover(&mut self, dut: &str) -> Result<Option<String>, Error> {
        let connected = dut::connected_topo(self.ctx, dut).await?;
        if connected.is_none() {
            warn!(%dut, "no connected topology found, removing all topologies");
            let entries: Vec<TestbedEntry> = self.testbeds.iter().cloned().collect();
            for entry in &entries {
                self.topologies.detach(entry, true).await?;
            }
        }
        Ok(connected)
    }

    async fn upgrade(
        &mut self,
        dut: &str,
        image_url: &str,
        opts: &RunOptions,
        connected: Option<&str>,
    ) -> Result<(), Error> {
        dut::upgrade(self.ctx, dut, image_url).await?;
        dut::setup_after_install(self.ctx, dut, opts.testbed_config.as_deref())
            .await?;

        // Restore the configuration of the previously connected topology.
        if let Some(topo) = connected {
            match self.testbeds.get_by_topo(topo).cloned() {
                Some(entry) => self.topologies.deploy(&entry).await?,
                None => {
                    warn!(%topo, "connected topology not in testbed file, not redeploying");
                }
            }
        }
        Ok(())
    }

    async fn run_topology(
        &mut self,
        topo: &str,
        tests: &[String],
        summary: &mut RunSummary,
    ) -> Result<(), Error> {
        let entry = self
            .testbeds
            .get_by_topo(topo)
            .cloned()
            .ok_or_else(|| Error::TestbedNotFound(topo.to_owned()))?;

        self.connect(&entry).await?;

        let ctx = self.ctx;
        let logrotate_disabled = dut::disable_logrotate(ctx, &entry.dut).await?;

        let stability = &ctx.config.stability;
        let ptf_host = entry.ptf_host();
        self.topologies
            .wait_stable(
                StabilityTarget::Ptf { name: &ptf_host },
                stability.ptf_timeout(),
                stability.ptf_poll_interval(),
                true,
            )
            .await?;
        self.topologies
            .wait_stable(
                StabilityTarget::Dut {
                    name: &entry.dut,
                    topo: &entry.topo,
                },
                stability.dut_timeout(),
                stability.dut_poll_interval(),
                false,
            )
            .await?;

        let runner = TestRunner::new(ctx, &entry);
        let total = tests.len();
        for (idx, test) in tests.iter().enumerate() {
            info!("{} progress [{}/{}]", topo, idx + 1, total);

            let Some(meta) = self.testcases.get(test) else {
                // Plans are validated against the catalog.
                warn!(%test, "unknown testcase, skipping");
                continue;
            };
            let record = runner.run(test, meta, &mut summary.drift).await?;
            summary.results.record(topo, test, record);
        }

        if logrotate_disabled {
            dut::enable_logrotate(ctx, &entry.dut).await?;
        }

        info!("{} topology test finished", topo);
        Ok(())
    }

    // Makes the given topology the one connected to the DUT.
    async fn connect(&mut self, entry: &TestbedEntry) -> Result<(), Error> {
        let connected = dut::connected_topo(self.ctx, &entry.dut).await?;
        if connected.as_deref() == Some(entry.topo.as_str()) {
            info!(topo = %entry.topo, "topology already connected");
            self.topologies.assume_deployed(entry);
            return Ok(());
        }

        if let Some(connected) = &connected {
            info!(
                topo = %entry.topo,
                %connected,
                "removing currently connected topology"
            );
            match self.testbeds.get_by_topo(connected).cloned() {
                Some(current) => self.topologies.detach(&current, false).await?,
                None => {
                    warn!(%connected, "connected topology not in testbed file, not removing");
                }
            }
        }

        self.topologies.attach(entry).await?;
        self.topologies.deploy(entry).await?;
        Ok(())
    }

    pub fn topologies(&self) -> &TopologyManager<'a> {
        &self.topologies
    }
}
