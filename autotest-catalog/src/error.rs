//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::path::PathBuf;

use autotest_utils::error::with_source;
use tracing::error;

// Catalog loading and plan resolution errors.
#[derive(Debug)]
pub enum Error {
    Host(autotest_utils::Error),
    FileRead(PathBuf, std::io::Error),
    TestbedParse(PathBuf, csv::Error),
    TestbedMissingField(PathBuf, &'static str),
    DuplicateTopology(String),
    InvalidHostAddress(String, Option<String>),
    InvalidPtfAddress(String, String),
    TestcaseParse(PathBuf, serde_yaml::Error),
    TestcaseMeta(PathBuf, String, serde_yaml::Error),
    InvalidTestcaseGroup(PathBuf, String),
    DuplicateTestcase(PathBuf, String),
    SelectionParse(PathBuf, serde_yaml::Error),
    PlanValidation(Vec<PlanViolation>),
}

// Reasons an execution plan entry is rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PlanViolation {
    UnknownTestcase { topo: String, test: String },
    UnsupportedTopology { topo: String, test: String },
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::Host(error) => {
                error.log();
            }
            Error::FileRead(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestbedParse(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestbedMissingField(path, field) => {
                error!(path = %path.display(), %field, "{}", self);
            }
            Error::DuplicateTopology(topo) => {
                error!(%topo, "{}", self);
            }
            Error::InvalidHostAddress(host, value) => {
                error!(%host, value = ?value, "{}", self);
            }
            Error::InvalidPtfAddress(conf_name, value) => {
                error!(%conf_name, %value, "{}", self);
            }
            Error::TestcaseParse(path, error)
            | Error::SelectionParse(path, error) => {
                error!(path = %path.display(), error = %with_source(error), "{}", self);
            }
            Error::TestcaseMeta(path, name, error) => {
                error!(path = %path.display(), %name, error = %with_source(error), "{}", self);
            }
            Error::InvalidTestcaseGroup(path, group) => {
                error!(path = %path.display(), %group, "{}", self);
            }
            Error::DuplicateTestcase(path, name) => {
                error!(path = %path.display(), %name, "{}", self);
            }
            Error::PlanValidation(violations) => {
                for violation in violations {
                    violation.log();
                }
                error!("{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Host(error) => write!(f, "{}", error),
            Error::FileRead(..) => {
                write!(f, "failed to read catalog file")
            }
            Error::TestbedParse(..) => {
                write!(f, "failed to parse testbed file")
            }
            Error::TestbedMissingField(_, field) => {
                write!(f, "testbed entry missing required field: {}", field)
            }
            Error::DuplicateTopology(topo) => {
                write!(f, "topology declared by more than one testbed: {}", topo)
            }
            Error::InvalidHostAddress(host, _) => {
                write!(f, "invalid ansible_host address for {}", host)
            }
            Error::InvalidPtfAddress(conf_name, _) => {
                write!(f, "invalid ptf_ip for testbed {}", conf_name)
            }
            Error::TestcaseParse(..) => {
                write!(f, "failed to parse testcase file")
            }
            Error::TestcaseMeta(_, name, _) => {
                write!(f, "invalid testcase definition: {}", name)
            }
            Error::InvalidTestcaseGroup(_, group) => {
                write!(f, "invalid testcase group: {}", group)
            }
            Error::DuplicateTestcase(_, name) => {
                write!(f, "duplicate testcase: {}", name)
            }
            Error::SelectionParse(..) => {
                write!(f, "failed to parse testcase selection file")
            }
            Error::PlanValidation(..) => {
                write!(f, "testcase validation failed")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Host(error) => Some(error),
            Error::FileRead(_, error) => Some(error),
            Error::TestbedParse(_, error) => Some(error),
            Error::TestcaseParse(_, error)
            | Error::TestcaseMeta(_, _, error)
            | Error::SelectionParse(_, error) => Some(error),
            _ => None,
        }
    }
}

impl From<autotest_utils::Error> for Error {
    fn from(error: autotest_utils::Error) -> Error {
        Error::Host(error)
    }
}

// ===== impl PlanViolation =====

impl PlanViolation {
    pub fn log(&self) {
        match self {
            PlanViolation::UnknownTestcase { topo, test }
            | PlanViolation::UnsupportedTopology { topo, test } => {
                error!(%topo, %test, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for PlanViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanViolation::UnknownTestcase { .. } => {
                write!(f, "testcase not found")
            }
            PlanViolation::UnsupportedTopology { .. } => {
                write!(f, "testcase does not support topology")
            }
        }
    }
}
