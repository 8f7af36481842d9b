//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod command;
pub mod config;
pub mod context;
pub mod debug;
pub mod drift;
pub mod dut;
pub mod error;
pub mod logdir;
pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod topology;

pub use crate::context::Context;
pub use crate::error::Error;
