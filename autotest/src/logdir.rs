//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::warn;

use crate::error::Error;

/// Log directory layout of a single run.
///
/// ```text
/// <root>/autotest.log
/// <root>/<topo>/<test>/<test>_ansible.log
/// <root>/fail/<topo>/<test>_ansible.log
/// ```
#[derive(Clone, Debug)]
pub struct LogDir {
    root: PathBuf,
}

// ===== impl LogDir =====

impl LogDir {
    const FAIL_DIR: &'static str = "fail";

    /// Returns the layout rooted at `<log_root>/<job>`, where the job name is
    /// the build number or the current local time.
    pub fn new(log_root: &Path, build_number: Option<&str>) -> LogDir {
        let job = match build_number {
            Some(build_number) => build_number.to_owned(),
            None => Local::now().format("%Y%m%d_%H%M%S").to_string(),
        };
        LogDir {
            root: log_root.join(job),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self) -> Result<(), Error> {
        create_dir(&self.root)
    }

    pub fn testcase_dir(&self, topo: &str, test: &str) -> PathBuf {
        self.root.join(topo).join(test)
    }

    // Per-test playbook log. The parent directory is created on demand.
    pub fn testcase_log(&self, topo: &str, test: &str) -> Result<PathBuf, Error> {
        let dir = self.testcase_dir(topo, test);
        create_dir(&dir)?;
        Ok(dir.join(ansible_log_name(test)))
    }

    pub fn fail_log(&self, topo: &str, test: &str) -> Result<PathBuf, Error> {
        let dir = self.root.join(Self::FAIL_DIR).join(topo);
        create_dir(&dir)?;
        Ok(dir.join(ansible_log_name(test)))
    }

    // Keeps a copy of the playbook log of a failed test.
    pub fn copy_to_fail(&self, topo: &str, test: &str) {
        let src = self.testcase_dir(topo, test).join(ansible_log_name(test));
        let result = self
            .fail_log(topo, test)
            .and_then(|dst| {
                std::fs::copy(&src, &dst)
                    .map_err(|error| Error::LogDir(dst, error))
            });
        if let Err(error) = result {
            warn!(%topo, %test, %error, "failed to copy playbook log");
        }
    }
}

// ===== helper functions =====

fn ansible_log_name(test: &str) -> String {
    format!("{}_ansible.log", test)
}

fn create_dir(path: &Path) -> Result<(), Error> {
    std::fs::create_dir_all(path)
        .map_err(|error| Error::LogDir(path.to_owned(), error))
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let logdir = LogDir::new(Path::new("/tmp"), Some("1234"));
        assert_eq!(logdir.root(), Path::new("/tmp/1234"));
        assert_eq!(
            logdir.testcase_dir("t0", "fdb"),
            Path::new("/tmp/1234/t0/fdb")
        );
    }

    #[test]
    fn test_timestamp_job() {
        let logdir = LogDir::new(Path::new("/tmp"), None);
        let job = logdir.root().file_name().unwrap().to_str().unwrap();
        assert_eq!(job.len(), "20260101_120000".len());
        assert_eq!(job.as_bytes()[8], b'_');
    }

    #[test]
    fn test_fail_copy() {
        let root = tempfile::tempdir().unwrap();
        let logdir = LogDir::new(root.path(), Some("42"));
        let log = logdir.testcase_log("t1", "bgp_fact").unwrap();
        std::fs::write(&log, "fatal: [dut]: FAILED!").unwrap();

        logdir.copy_to_fail("t1", "bgp_fact");

        let copy = root.path().join("42/fail/t1/bgp_fact_ansible.log");
        assert_eq!(
            std::fs::read_to_string(copy).unwrap(),
            "fatal: [dut]: FAILED!"
        );
    }
}
