//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use tracing::{error, warn};

// Shell and remote host errors.
#[derive(Debug)]
pub enum Error {
    ShellSpawn(String, std::io::Error),
    ShellIo(String, std::io::Error),
    HostNotFound(String),
    InventoryOutput(String, serde_json::Error),
    ModuleOutput(String, String, Option<serde_json::Error>),
    ModuleFailed(String, String, String),
}

// ===== impl Error =====

impl Error {
    pub fn log(&self) {
        match self {
            Error::ShellSpawn(cmd, error) | Error::ShellIo(cmd, error) => {
                error!(%cmd, error = %with_source(error), "{}", self);
            }
            Error::HostNotFound(host) => {
                error!(%host, "{}", self);
            }
            Error::InventoryOutput(host, error) => {
                error!(%host, error = %with_source(error), "{}", self);
            }
            Error::ModuleOutput(host, module, error) => match error {
                Some(error) => {
                    warn!(%host, %module, error = %with_source(error), "{}", self);
                }
                None => {
                    warn!(%host, %module, "{}", self);
                }
            },
            Error::ModuleFailed(host, module, msg) => {
                warn!(%host, %module, %msg, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ShellSpawn(..) => {
                write!(f, "failed to spawn shell command")
            }
            Error::ShellIo(..) => {
                write!(f, "failed to read shell command output")
            }
            Error::HostNotFound(host) => {
                write!(f, "ansible host not found: {}", host)
            }
            Error::InventoryOutput(..) => {
                write!(f, "failed to parse inventory variables")
            }
            Error::ModuleOutput(..) => {
                write!(f, "failed to parse module result")
            }
            Error::ModuleFailed(host, module, msg) => {
                write!(f, "module {} failed on {}: {}", module, host, msg)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::ShellSpawn(_, error) | Error::ShellIo(_, error) => {
                Some(error)
            }
            Error::InventoryOutput(_, error) => Some(error),
            Error::ModuleOutput(_, _, Some(error)) => Some(error),
            _ => None,
        }
    }
}

// ===== global functions =====

pub fn with_source<E: std::error::Error>(error: E) -> String {
    if let Some(source) = error.source() {
        format!("{} ({})", error, with_source(source))
    } else {
        error.to_string()
    }
}
