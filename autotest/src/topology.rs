//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Duration;

use autotest_catalog::TestbedEntry;
use autotest_utils::host::RemoteHost;
use autotest_utils::shell::quote;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::context::Context;
use crate::debug::Debug;
use crate::dut;
use crate::error::Error;

// Topology on which the DUT settles on its own.
const PTF32_TOPO: &str = "ptf32";
const DUT_STATUS_PLAYBOOK: &str = "./roles/test/files/tools/check_dut_status.yml";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopologyState {
    Detached,
    Attaching,
    AttachedNotDeployed,
    Deployed,
    Stabilizing,
    Stable,
    Failed,
}

/// Element whose readiness is polled after a deployment.
#[derive(Clone, Copy, Debug)]
pub enum StabilityTarget<'a> {
    Dut { name: &'a str, topo: &'a str },
    Ptf { name: &'a str },
}

/// Attaches, deploys and detaches topologies, keeping track of the state
/// of each one.
#[derive(Debug)]
pub struct TopologyManager<'a> {
    ctx: &'a Context,
    states: BTreeMap<String, TopologyState>,
}

// ===== impl StabilityTarget =====

impl std::fmt::Display for StabilityTarget<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StabilityTarget::Dut { name, topo } => {
                write!(f, "topo {} dut {}", topo, name)
            }
            StabilityTarget::Ptf { name } => write!(f, "ptf {}", name),
        }
    }
}

// ===== impl TopologyManager =====

impl<'a> TopologyManager<'a> {
    pub fn new(ctx: &'a Context) -> TopologyManager<'a> {
        TopologyManager {
            ctx,
            states: Default::default(),
        }
    }

    pub fn state(&self, topo: &str) -> TopologyState {
        self.states
            .get(topo)
            .copied()
            .unwrap_or(TopologyState::Detached)
    }

    fn transition(&mut self, topo: &str, new_state: TopologyState) {
        let old_state = self.state(topo);
        if old_state == new_state {
            return;
        }
        Debug::TopologyTransition(topo, &old_state, &new_state).log();
        self.states.insert(topo.to_owned(), new_state);
    }

    // Records a topology found already deployed on the DUT.
    pub fn assume_deployed(&mut self, entry: &TestbedEntry) {
        self.transition(&entry.topo, TopologyState::Deployed);
    }

    pub async fn attach(&mut self, entry: &TestbedEntry) -> Result<(), Error> {
        info!(topo = %entry.topo, conf_name = %entry.conf_name, "adding topology");
        self.transition(&entry.topo, TopologyState::Attaching);

        let cmd = format!("{} add-topo {} -vvvv", self.testbed_cli(), self.topo_args(entry));
        let output = self.ctx.run(&cmd).await?;
        if !output.success() {
            self.transition(&entry.topo, TopologyState::Failed);
            return Err(Error::AttachFailed(entry.conf_name.clone(), output.rc));
        }

        self.transition(&entry.topo, TopologyState::AttachedNotDeployed);
        Ok(())
    }

    pub async fn detach(
        &mut self,
        entry: &TestbedEntry,
        ignore_errors: bool,
    ) -> Result<(), Error> {
        info!(topo = %entry.topo, conf_name = %entry.conf_name, "removing topology");

        let cmd = format!(
            "{} remove-topo {} -e remove_sonic_vm=false -vvvv",
            self.testbed_cli(),
            self.topo_args(entry)
        );
        let output = self.ctx.run(&cmd).await?;
        if !output.success() {
            if !ignore_errors {
                self.transition(&entry.topo, TopologyState::Failed);
                return Err(Error::DetachFailed(entry.conf_name.clone(), output.rc));
            }
            warn!(conf_name = %entry.conf_name, rc = %output.rc, "failed to remove topology, ignoring");
        }

        self.transition(&entry.topo, TopologyState::Detached);
        Ok(())
    }

    pub async fn deploy(&mut self, entry: &TestbedEntry) -> Result<(), Error> {
        info!(topo = %entry.topo, dut = %entry.dut, "deploying DUT configuration");

        let cmd = format!(
            "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook -i {} config_sonic_basedon_testbed.yml -l {} -vvv -e vm_base={} -e topo={} -e testbed_name={} -e deploy=True -e local_minigraph=True -e save=True",
            quote(self.ctx.lab()),
            quote(&entry.dut),
            quote(&entry.vm_base),
            quote(&entry.topo),
            quote(&entry.conf_name)
        );
        let output = self.ctx.run(&cmd).await?;
        if !output.success() {
            self.transition(&entry.topo, TopologyState::Failed);
            return Err(Error::DeployFailed(entry.conf_name.clone(), output.rc));
        }

        self.transition(&entry.topo, TopologyState::Deployed);
        Ok(())
    }

    /// Polls the target until it is ready.
    ///
    /// Past half the timeout a DUT is restarted once. Returns `Ok(false)`
    /// on timeout when `ignore_error` is set.
    pub async fn wait_stable(
        &mut self,
        target: StabilityTarget<'_>,
        timeout: Duration,
        poll_interval: Duration,
        ignore_error: bool,
    ) -> Result<bool, Error> {
        info!(%target, "waiting for stability");
        if let StabilityTarget::Dut { topo, .. } = target {
            self.transition(topo, TopologyState::Stabilizing);
            if topo == PTF32_TOPO {
                let settle_time = self.ctx.config.stability.ptf32_settle_time();
                self.ctx.sleep(settle_time, "ptf32 settle time").await;
                self.transition(topo, TopologyState::Stable);
                return Ok(true);
            }
        }

        let start = Instant::now();
        let mut restarted = false;
        loop {
            let ready = self.probe(&target).await?;
            let elapsed = start.elapsed();
            Debug::StabilityProbe(&target, &elapsed, ready).log();
            if ready {
                if let StabilityTarget::Dut { topo, .. } = target {
                    self.transition(topo, TopologyState::Stable);
                }
                info!(%target, elapsed = %elapsed.as_secs(), "stable");
                return Ok(true);
            }

            if let StabilityTarget::Dut { name, .. } = target
                && !restarted
                && elapsed > timeout / 2
            {
                warn!(%target, "not stable after half the timeout, restarting DUT");
                restarted = true;
                if let Err(error) = dut::reboot(self.ctx, name, true).await {
                    error.log();
                }
            }

            if elapsed > timeout {
                if ignore_error {
                    warn!(%target, timeout = %timeout.as_secs(), "not stable, ignoring");
                    return Ok(false);
                }
                if let StabilityTarget::Dut { topo, .. } = target {
                    self.transition(topo, TopologyState::Failed);
                }
                return Err(Error::StabilizationTimeout(target.to_string(), timeout));
            }

            self.ctx.sleep(poll_interval, "stability poll").await;
        }
    }

    async fn probe(&self, target: &StabilityTarget<'_>) -> Result<bool, Error> {
        match target {
            StabilityTarget::Dut { name, .. } => {
                let cmd = format!(
                    "ANSIBLE_STDOUT_CALLBACK=yaml ansible-playbook -vvv -i {} -l {} {}",
                    quote(self.ctx.lab()),
                    quote(name),
                    DUT_STATUS_PLAYBOOK
                );
                let output = self.ctx.run(&cmd).await?;
                Ok(output.success())
            }
            StabilityTarget::Ptf { name } => {
                // A missing host handle is fatal, unlike a failed ping.
                let host = self.ctx.host(name).await?;
                match host.ping().await {
                    Ok(res) => Ok(!res.is_failed()),
                    Err(error) => {
                        warn!(%target, %error, "ping failed");
                        Ok(false)
                    }
                }
            }
        }
    }

    fn testbed_cli(&self) -> String {
        let ansible = &self.ctx.config.ansible;
        format!("{} -m {}", ansible.testbed_cli, quote(&ansible.vm_inventory))
    }

    fn topo_args(&self, entry: &TestbedEntry) -> String {
        format!(
            "{} {}",
            quote(&entry.conf_name),
            quote(&self.ctx.config.ansible.password_file)
        )
    }
}
