//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![warn(rust_2018_idioms)]

pub mod error;
pub mod selection;
pub mod testbed;
pub mod testcase;

use serde::{Deserialize, Deserializer};

pub use crate::error::Error;
pub use crate::selection::{ExecutionPlan, Platform, Selection, UserSelection};
pub use crate::testbed::{TestbedCatalog, TestbedEntry};
pub use crate::testcase::{TestcaseCatalog, TestcaseMeta};

// ===== helper functions =====

// Deserializes an explicit YAML null the same way as a missing key.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}
