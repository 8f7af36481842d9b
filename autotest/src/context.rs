//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::Arc;
use std::time::Duration;

use autotest_utils::host::{HostRegistry, RemoteHost};
use autotest_utils::shell::{CmdOutput, RunOpts, Shell};
use tracing::debug;

use crate::config::Config;
use crate::debug::Debug;
use crate::error::Error;
use crate::logdir::LogDir;

/// State shared by every stage of a run.
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub shell: Arc<dyn Shell>,
    pub hosts: HostRegistry,
    pub logdir: LogDir,
}

// ===== impl Context =====

impl Context {
    pub fn new(
        config: Config,
        shell: Arc<dyn Shell>,
        hosts: HostRegistry,
        logdir: LogDir,
    ) -> Context {
        Context {
            config,
            shell,
            hosts,
            logdir,
        }
    }

    pub fn dry_run(&self) -> bool {
        self.shell.dry_run()
    }

    // Inventory used by playbooks run against lab devices.
    pub fn lab(&self) -> &str {
        &self.config.ansible.lab_inventory
    }

    pub async fn run(&self, cmd: &str) -> Result<CmdOutput, Error> {
        let output = self.shell.run(cmd, RunOpts::default()).await?;
        Ok(output)
    }

    pub async fn host(&self, name: &str) -> Result<Arc<dyn RemoteHost>, Error> {
        let host = self.hosts.get(name).await?;
        Ok(host)
    }

    // Sleeps unless running dry.
    pub async fn sleep(&self, duration: Duration, comment: &str) {
        Debug::Sleep(&duration, comment).log();
        if self.dry_run() {
            debug!("dry run");
            return;
        }
        tokio::time::sleep(duration).await;
    }
}
