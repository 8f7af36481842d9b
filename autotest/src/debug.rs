//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use tracing::{debug, debug_span};

use crate::topology::{StabilityTarget, TopologyState};

// Orchestrator debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    Sleep(&'a Duration, &'a str),
    TopologyTransition(&'a str, &'a TopologyState, &'a TopologyState),
    ConnectedTopology(&'a str, Option<&'a str>),
    StabilityProbe(&'a StabilityTarget<'a>, &'a Duration, bool),
    CommandRendered(&'a str, &'a str),
    SnapshotCaptured(&'a str, &'a str, usize),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::Sleep(duration, comment) => {
                debug!(seconds = %duration.as_secs(), %comment, "{}", self);
            }
            Debug::TopologyTransition(topo, old_state, new_state) => {
                debug_span!("topology", name = %topo).in_scope(|| {
                    debug!(?old_state, ?new_state, "{}", self);
                });
            }
            Debug::ConnectedTopology(dut, topo) => {
                debug!(%dut, topo = ?topo, "{}", self);
            }
            Debug::StabilityProbe(target, elapsed, ready) => {
                debug!(%target, elapsed = %elapsed.as_secs(), %ready, "{}", self);
            }
            Debug::CommandRendered(test, cmd) => {
                debug_span!("testcase", name = %test).in_scope(|| {
                    debug!(%cmd, "{}", self);
                });
            }
            Debug::SnapshotCaptured(dut, path, lines) => {
                debug!(%dut, %path, %lines, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::Sleep(..) => {
                write!(f, "sleeping")
            }
            Debug::TopologyTransition(..) => {
                write!(f, "state transition")
            }
            Debug::ConnectedTopology(..) => {
                write!(f, "connected topology")
            }
            Debug::StabilityProbe(..) => {
                write!(f, "stability probe")
            }
            Debug::CommandRendered(..) => {
                write!(f, "test command")
            }
            Debug::SnapshotCaptured(..) => {
                write!(f, "configuration snapshot captured")
            }
        }
    }
}
