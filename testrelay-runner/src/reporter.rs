// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconstructs the report hierarchy from test-runner events and reports it.
//!
//! The main structure in this module is [`ReportingStateMachine`].

mod imp;
pub mod objects;
mod step;

pub use imp::*;
pub use step::*;

/// The state of a run, as seen by a [`ReportingStateMachine`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RunState {
    /// No run-start event has been seen yet.
    NotStarted,

    /// The launch has been started and results are being reported.
    Running,

    /// The run is complete and outstanding calls are being awaited.
    Draining,

    /// The launch has been finished.
    Closed,
}

/// Statistics about a reported run, returned by
/// [`ReportingStateMachine::on_run_complete`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// The number of suites created.
    pub suites: usize,

    /// The number of nested tests created.
    pub tests: usize,

    /// The number of steps reported.
    pub steps: usize,

    /// The number of reporting calls that settled, including the launch finish.
    pub settled_operations: usize,

    /// The number of reporting calls that failed, including the launch finish.
    pub failed_operations: usize,
}

impl RunSummary {
    /// Returns true if every reporting call succeeded.
    pub fn is_success(&self) -> bool {
        self.failed_operations == 0
    }
}
