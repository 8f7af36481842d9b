//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use derive_new::new;
use itertools::Itertools;
use tracing::{debug, debug_span, error, info};

use crate::drift::DriftReport;

/// Outcome of a single test case.
#[derive(Clone, Copy, Debug, new)]
pub struct ResultRecord {
    pub passed: bool,
    pub pre: Duration,
    pub run: Duration,
    pub post: Duration,
}

/// Results of every executed test case, per topology, in execution order.
#[derive(Debug, Default)]
pub struct RunResults {
    topologies: Vec<(String, Vec<(String, ResultRecord)>)>,
}

// ===== impl ResultRecord =====

impl ResultRecord {
    pub fn total(&self) -> Duration {
        self.pre + self.run + self.post
    }
}

// ===== impl RunResults =====

impl RunResults {
    pub fn record(&mut self, topo: &str, test: &str, record: ResultRecord) {
        let idx = match self.topologies.iter().position(|(name, _)| name == topo) {
            Some(idx) => idx,
            None => {
                self.topologies.push((topo.to_owned(), vec![]));
                self.topologies.len() - 1
            }
        };
        self.topologies[idx].1.push((test.to_owned(), record));
    }

    pub fn get(&self, topo: &str, test: &str) -> Option<&ResultRecord> {
        self.topologies
            .iter()
            .find(|(name, _)| name == topo)
            .and_then(|(_, results)| {
                results
                    .iter()
                    .find(|(name, _)| name == test)
                    .map(|(_, record)| record)
            })
    }

    pub fn total(&self) -> usize {
        self.topologies
            .iter()
            .map(|(_, results)| results.len())
            .sum()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.topologies.iter().flat_map(|(topo, results)| {
            results
                .iter()
                .filter(|(_, record)| !record.passed)
                .map(move |(test, _)| (topo.as_str(), test.as_str()))
        })
    }

    pub fn any_failed(&self) -> bool {
        self.failed().next().is_some()
    }

    /// Logs the summary of the run.
    pub fn log_summary(&self, drift: &DriftReport) {
        for (topo, results) in &self.topologies {
            let (passed, failed): (Vec<_>, Vec<_>) =
                results.iter().partition(|(_, record)| record.passed);
            info!(
                %topo,
                total = %results.len(),
                passed = %passed.len(),
                failed = %failed.len(),
                "Total: {}, Passed: {}, Failed: {}",
                results.len(),
                passed.len(),
                failed.len()
            );
            if !failed.is_empty() {
                let names = failed.iter().map(|(test, _)| test).join(", ");
                error!(%topo, failed = %names, "failed tests");
            }

            debug_span!("topology", name = %topo).in_scope(|| {
                for (test, record) in results {
                    debug!(
                        %test,
                        pre = %seconds(record.pre),
                        run = %seconds(record.run),
                        post = %seconds(record.post),
                        total = %seconds(record.total()),
                        "elapsed time"
                    );
                }
            });
        }

        match serde_yaml::to_string(drift) {
            Ok(yaml) => info!("configuration drift:\n{}", yaml),
            Err(error) => error!(%error, "failed to serialize drift report"),
        }
    }
}

// ===== helper functions =====

// Elapsed seconds, with two decimal places.
fn seconds(duration: Duration) -> String {
    format!("{:.2}", duration.as_secs_f64())
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    fn record(passed: bool, run: u64) -> ResultRecord {
        ResultRecord::new(
            passed,
            Duration::from_secs(1),
            Duration::from_secs(run),
            Duration::from_secs(2),
        )
    }

    #[test]
    fn test_results() {
        let mut results = RunResults::default();
        assert!(!results.any_failed());

        results.record("t0", "bgp_fact", record(true, 60));
        results.record("t1", "fib", record(false, 300));
        results.record("t0", "lldp", record(true, 30));

        assert_eq!(results.total(), 3);
        assert!(results.any_failed());
        assert_eq!(results.failed().collect::<Vec<_>>(), [("t1", "fib")]);
        assert_eq!(
            results.get("t0", "bgp_fact").unwrap().total(),
            Duration::from_secs(63)
        );
        assert!(results.get("t1", "lldp").is_none());
    }

    #[test]
    fn test_seconds() {
        assert_eq!(seconds(Duration::from_millis(250)), "0.25");
        assert_eq!(seconds(Duration::from_millis(61_004)), "61.00");
        assert_eq!(seconds(Duration::ZERO), "0.00");
    }
}
