//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use autotest_catalog::{TestbedEntry, TestcaseMeta};
use autotest_utils::shell::quote;
use autotest_utils::timer::Timer;
use itertools::Itertools;
use tracing::{Instrument, debug, debug_span, error, info, warn};

use crate::command::TestCommand;
use crate::context::Context;
use crate::debug::Debug;
use crate::drift::{self, DriftReport};
use crate::dut;
use crate::error::Error;
use crate::report::ResultRecord;

const ARCHIVE_PLAYBOOK: &str = "roles/test/files/tools/archive_logs.yml";
const DUT_COMMON_LOGS: [&str; 3] = [
    "/var/log/syslog",
    "/var/log/swss/sairedis.rec",
    "/var/log/swss/swss.rec",
];

/// Runs the test cases of one topology.
#[derive(Debug)]
pub struct TestRunner<'a> {
    ctx: &'a Context,
    testbed: &'a TestbedEntry,
}

// ===== impl TestRunner =====

impl<'a> TestRunner<'a> {
    pub fn new(ctx: &'a Context, testbed: &'a TestbedEntry) -> TestRunner<'a> {
        TestRunner { ctx, testbed }
    }

    /// Runs a test case through its pre, run and post phases.
    ///
    /// A failed test is a result, not an error.
    pub async fn run(
        &self,
        test: &str,
        meta: &TestcaseMeta,
        drift: &mut DriftReport,
    ) -> Result<ResultRecord, Error> {
        self.run_phases(test, meta, drift)
            .instrument(debug_span!("testcase", name = %test))
            .await
    }

    async fn run_phases(
        &self,
        test: &str,
        meta: &TestcaseMeta,
        drift: &mut DriftReport,
    ) -> Result<ResultRecord, Error> {
        let (log, pre) = timed(self.pre(test)).await;
        let log = log?;

        let host = self.ctx.host(&self.testbed.dut).await?;
        let (passed, run) = timed(drift::audit(host.as_ref(), test, drift, || {
            self.execute(test, meta, &log)
        }))
        .await;
        let passed = passed?;

        let ((), post) = timed(self.post(test, meta)).await;

        Ok(ResultRecord::new(passed, pre, run, post))
    }

    // Prepares the log directory of the test.
    async fn pre(&self, test: &str) -> Result<PathBuf, Error> {
        self.ctx.logdir.testcase_log(&self.testbed.topo, test)
    }

    async fn execute(
        &self,
        test: &str,
        meta: &TestcaseMeta,
        log: &Path,
    ) -> Result<bool, Error> {
        let topo = &self.testbed.topo;
        let dut = &self.testbed.dut;
        debug!(?meta, testbed = ?self.testbed, "test parameters");

        // Start the DUT logs afresh.
        dut::force_logrotate(self.ctx, dut).await?;

        let start_msg = format!("{} - {} start...", topo, test);
        info!("{}", start_msg);
        dut::log_to_dut(self.ctx, dut, &start_msg).await;

        let cmd = TestCommand::for_testcase(self.ctx.lab(), test, meta, self.testbed)
            .log(log)
            .render();
        Debug::CommandRendered(test, &cmd).log();
        let output = self.ctx.run(&cmd).await?;

        let passed = output.success();
        if passed {
            info!("{} - {} passed", topo, test);
        } else {
            error!(rc = %output.rc, "{} - {} failed", topo, test);
            self.ctx.logdir.copy_to_fail(topo, test);
        }

        if let Some(seconds) = meta.sleep_for_reboot.filter(|seconds| *seconds > 0) {
            self.ctx
                .sleep(Duration::from_secs(seconds), "sleep for DUT reboot")
                .await;
        }
        if meta.reboot_after_test {
            info!(%test, "rebooting DUT after test");
            if let Err(error) = dut::reboot(self.ctx, dut, true).await {
                error.log();
            }
        }

        let end_msg = format!("{} - {} end.", topo, test);
        info!("{}", end_msg);
        dut::log_to_dut(self.ctx, dut, &end_msg).await;

        Ok(passed)
    }

    // Archives the logs of the test from the PTF host and the DUT.
    async fn post(&self, test: &str, meta: &TestcaseMeta) {
        if !meta.archive_logs_flag {
            info!(%test, "skipping log archive");
            return;
        }

        let local_dir = self.ctx.logdir.testcase_dir(&self.testbed.topo, test);
        let patterns = &meta.archive_logs;
        if !patterns.ptf.is_empty() {
            let ptf_host = self.testbed.ptf_host();
            self.archive(&ptf_host, &local_dir, patterns.ptf.iter())
                .await;
        }

        let dut_patterns = DUT_COMMON_LOGS
            .iter()
            .copied()
            .chain(patterns.dut.iter().map(String::as_str));
        self.archive(&self.testbed.dut, &local_dir, dut_patterns).await;

        info!(%test, "archived logs");
    }

    async fn archive<I, S>(&self, host: &str, local_dir: &Path, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns.into_iter().map(|p| p.as_ref().to_owned()).join(",");
        let cmd = format!(
            "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook {} -i {} -vvv -e {} -e {} -e {}",
            ARCHIVE_PLAYBOOK,
            quote(self.ctx.lab()),
            quote(&format!("target={}", host)),
            quote(&format!("local_dir={}", local_dir.display())),
            quote(&format!("file_patterns={}", patterns))
        );

        match self.ctx.run(&cmd).await {
            Ok(output) if output.success() => {
                debug!(%host, %patterns, "archived logs");
            }
            Ok(output) => {
                warn!(%host, rc = %output.rc, "failed to archive logs");
            }
            Err(error) => {
                warn!(%host, %error, "failed to archive logs");
            }
        }
    }
}

// ===== helper functions =====

async fn timed<F: Future>(f: F) -> (F::Output, Duration) {
    let mut timer = Timer::default();
    let output = {
        let _scope = timer.scope();
        f.await
    };
    (output, timer.elapsed())
}
