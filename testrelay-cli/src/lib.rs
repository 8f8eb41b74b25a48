// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relays the results of a test run to a remote reporting backend.
//!
//! `testrelay report` reads lifecycle events from a test runner, either as
//! newline-delimited JSON or as the aggregate file written by `jest --json`,
//! and reports them as a launch containing suites, tests and steps.
//!
//! `testrelay show-config` prints the configuration a report would use.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod replay;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter, StderrStyles};
