//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::SplitStream;
use tracing::debug;

use crate::error::Error;

/// Options controlling a single [`Shell::run`] invocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOpts {
    /// Accumulate the command output and hand it back to the caller.
    pub capture_stdout: bool,
    /// Execute the command even in dry-run mode. Used for read-only
    /// commands whose output the harness itself depends on.
    pub force_running: bool,
}

/// Exit status and (optionally) captured output of a shell command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CmdOutput {
    pub rc: i32,
    pub stdout: String,
}

/// Command executor.
///
/// All orchestrator side effects on local and remote hosts funnel through
/// this trait, which makes it the natural seam for dry runs and tests.
#[async_trait]
pub trait Shell: Send + Sync + std::fmt::Debug {
    // Runs a command line through the system shell.
    async fn run(&self, cmd: &str, opts: RunOpts) -> Result<CmdOutput, Error>;

    // Returns whether commands are skipped unless forced.
    fn dry_run(&self) -> bool;
}

/// [`Shell`] implementation backed by `/bin/sh`.
#[derive(Debug)]
pub struct LocalShell {
    dry_run: bool,
}

// ===== impl RunOpts =====

impl RunOpts {
    pub const CAPTURE: RunOpts = RunOpts {
        capture_stdout: true,
        force_running: false,
    };
    pub const FORCE_CAPTURE: RunOpts = RunOpts {
        capture_stdout: true,
        force_running: true,
    };
}

// ===== impl CmdOutput =====

impl CmdOutput {
    pub fn success(&self) -> bool {
        self.rc == 0
    }
}

// ===== impl LocalShell =====

impl LocalShell {
    const SHELL: &'static str = "/bin/sh";

    pub fn new(dry_run: bool) -> LocalShell {
        LocalShell { dry_run }
    }
}

#[async_trait]
impl Shell for LocalShell {
    async fn run(&self, cmd: &str, opts: RunOpts) -> Result<CmdOutput, Error> {
        debug!(%cmd, "running shell command");

        if self.dry_run && !opts.force_running {
            debug!("dry run");
            return Ok(CmdOutput::default());
        }

        let mut child = Command::new(Self::SHELL)
            .arg("-c")
            .arg(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|error| Error::ShellSpawn(cmd.to_owned(), error))?;

        // Drain both pipes concurrently, logging lines as they arrive.
        let mut output = String::new();
        if let (Some(stdout), Some(stderr)) =
            (child.stdout.take(), child.stderr.take())
        {
            let stdout = SplitStream::new(BufReader::new(stdout).split(b'\n'));
            let stderr = SplitStream::new(BufReader::new(stderr).split(b'\n'));
            let mut lines = stdout.merge(stderr);
            while let Some(line) = lines.next().await {
                let line = line
                    .map_err(|error| Error::ShellIo(cmd.to_owned(), error))?;
                let line = String::from_utf8_lossy(&line);
                debug!("{}", line.trim_end_matches('\r'));
                if opts.capture_stdout {
                    output.push_str(&line);
                    output.push('\n');
                }
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|error| Error::ShellIo(cmd.to_owned(), error))?;

        // Processes killed by a signal have no exit code.
        let rc = status.code().unwrap_or(-1);
        debug!(%rc, "shell command finished");

        Ok(CmdOutput { rc, stdout: output })
    }

    fn dry_run(&self) -> bool {
        self.dry_run
    }
}

// ===== global functions =====

/// Quotes a string for safe interpolation into a `/bin/sh` command line.
pub fn quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '-' | '.' | '/' | ':' | ',' | '@' | '%' | '+' | '=')
        });
    if safe {
        value.to_owned()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

// ===== unit tests =====

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote() {
        let cases = [
            ("vms-t0", "vms-t0"),
            ("/tmp/pre_cfgdb", "/tmp/pre_cfgdb"),
            ("", "''"),
            ("show run", "'show run'"),
            ("vtysh -c 'show run'", r"'vtysh -c '\''show run'\'''"),
            ("{\"path\":\"/etc\"}", "'{\"path\":\"/etc\"}'"),
        ];

        for (input, expected) in cases {
            assert_eq!(quote(input), expected, "Failed for input {:?}", input);
        }
    }
}
