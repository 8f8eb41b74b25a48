// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for testrelay, which relays the results of a test run to
//! a remote reporting backend.
//!
//! Test runners report results as a flat stream of per-file events. The
//! [`ReportingStateMachine`](reporter::ReportingStateMachine) rebuilds the
//! launch, suite, test and step hierarchy from that stream, creating each
//! remote entity exactly once, and waits for every call to settle before the
//! launch is finished.

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
mod helpers;
pub mod path;
pub mod registry;
pub mod reporter;
pub mod tracker;

pub use helpers::strip_ansi;
