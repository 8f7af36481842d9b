//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod error;
pub mod host;
pub mod shell;
#[cfg(feature = "testing")]
pub mod testing;
pub mod timer;

pub use error::Error;
