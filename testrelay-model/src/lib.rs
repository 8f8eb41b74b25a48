// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Build the requests that a test-run reporting backend understands.
//!
//! A run is reported as one *launch*, which contains *items* (suites, tests
//! and steps) nested arbitrarily deep. Items carry a status once finished, and
//! logs may be attached to any item.

mod ids;
mod report;

pub use ids::*;
pub use report::*;
