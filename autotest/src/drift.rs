//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Detection of configuration left behind by test cases.

use std::future::Future;

use autotest_utils::host::RemoteHost;
use serde::Serialize;
use similar::{ChangeTag, TextDiff};
use tracing::{debug, error, warn};

use crate::debug::Debug;

/// Test cases that changed the DUT configuration, per configuration source.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct DriftReport {
    pub config_db: Vec<String>,
    pub bgp: Vec<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConfigSource {
    ConfigDb,
    Bgp,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Stage {
    Pre,
    Post,
}

/// DUT configuration at one point in time.
///
/// A source whose capture failed is left unset.
#[derive(Clone, Debug, Default)]
pub struct ConfigSnapshot {
    pub config_db: Option<String>,
    pub bgp: Option<String>,
}

// ===== impl DriftReport =====

impl DriftReport {
    pub fn record(&mut self, source: ConfigSource, test: &str) {
        let bucket = match source {
            ConfigSource::ConfigDb => &mut self.config_db,
            ConfigSource::Bgp => &mut self.bgp,
        };
        bucket.push(test.to_owned());
    }

    pub fn is_empty(&self) -> bool {
        self.config_db.is_empty() && self.bgp.is_empty()
    }

    // Compares two snapshots, recording the test under every source that
    // changed. Sources missing from either snapshot are skipped.
    pub fn compare(
        &mut self,
        test: &str,
        pre: &ConfigSnapshot,
        post: &ConfigSnapshot,
    ) {
        for source in [ConfigSource::ConfigDb, ConfigSource::Bgp] {
            let (Some(pre), Some(post)) = (pre.get(source), post.get(source))
            else {
                debug!(%test, ?source, "incomplete snapshots, skipping comparison");
                continue;
            };
            let Some(diff) = config_diff(source, pre, post) else {
                continue;
            };
            error!(%test, ?source, "configuration changed by test");
            debug!(%test, ?source, "configuration diff:\n{}", diff);
            self.record(source, test);
        }
    }
}

// ===== impl ConfigSource =====

impl ConfigSource {
    fn command(&self) -> &'static str {
        match self {
            ConfigSource::ConfigDb => "sonic-cfggen -d --print-data",
            ConfigSource::Bgp => "vtysh -c 'show run'",
        }
    }

    // File on the DUT holding the snapshot of the given stage.
    pub fn path(&self, stage: Stage) -> &'static str {
        match (self, stage) {
            (ConfigSource::ConfigDb, Stage::Pre) => "/tmp/pre_cfgdb",
            (ConfigSource::ConfigDb, Stage::Post) => "/tmp/post_cfgdb",
            (ConfigSource::Bgp, Stage::Pre) => "/tmp/pre_bgp_cfg",
            (ConfigSource::Bgp, Stage::Post) => "/tmp/post_bgp_cfg",
        }
    }
}

// ===== impl ConfigSnapshot =====

impl ConfigSnapshot {
    /// Captures every configuration source of the DUT.
    ///
    /// Each source is captured on its own; a failure only leaves that
    /// source unset.
    pub async fn capture(host: &dyn RemoteHost, stage: Stage) -> ConfigSnapshot {
        let mut snapshot = ConfigSnapshot::default();
        for source in [ConfigSource::ConfigDb, ConfigSource::Bgp] {
            let path = source.path(stage);
            let cmd = format!("{} | tee {}", source.command(), path);
            match host.shell_checked(&cmd).await {
                Ok(res) => {
                    Debug::SnapshotCaptured(
                        host.name(),
                        path,
                        res.stdout.lines().count(),
                    )
                    .log();
                    *snapshot.get_mut(source) = Some(res.stdout);
                }
                Err(error) => {
                    warn!(
                        dut = %host.name(),
                        ?source,
                        ?stage,
                        %error,
                        "failed to capture DUT configuration"
                    );
                }
            }
        }
        snapshot
    }

    fn get(&self, source: ConfigSource) -> Option<&str> {
        match source {
            ConfigSource::ConfigDb => self.config_db.as_deref(),
            ConfigSource::Bgp => self.bgp.as_deref(),
        }
    }

    fn get_mut(&mut self, source: ConfigSource) -> &mut Option<String> {
        match source {
            ConfigSource::ConfigDb => &mut self.config_db,
            ConfigSource::Bgp => &mut self.bgp,
        }
    }
}

// ===== global functions =====

/// Runs `f` between two configuration snapshots of the DUT, recording any
/// change in `report`.
///
/// A source that can't be captured is left out of the comparison but never
/// affects the wrapped run.
pub async fn audit<F, Fut, T>(
    host: &dyn RemoteHost,
    test: &str,
    report: &mut DriftReport,
    f: F,
) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    let pre = ConfigSnapshot::capture(host, Stage::Pre).await;
    let output = f().await;
    let post = ConfigSnapshot::capture(host, Stage::Post).await;

    report.compare(test, &pre, &post);

    output
}

// ===== helper functions =====

// Returns the unified diff of two configurations, if they differ.
fn config_diff(source: ConfigSource, pre: &str, post: &str) -> Option<String> {
    let diff = TextDiff::from_lines(pre, post);
    if diff
        .iter_all_changes()
        .all(|change| change.tag() == ChangeTag::Equal)
    {
        return None;
    }

    let diff = diff
        .unified_diff()
        .context_radius(3)
        .header(source.path(Stage::Pre), source.path(Stage::Post))
        .to_string();
    Some(diff)
}

// ===== unit tests =====
