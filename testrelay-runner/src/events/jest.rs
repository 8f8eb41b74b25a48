// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{RunnerEvent, TestCaseResult, TestFileResult};
use serde::Deserialize;

/// The aggregated results written by `jest --json`.
///
/// Only the fields needed to replay a run are read.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestAggregatedResult {
    /// One entry per test file.
    #[serde(default)]
    pub test_results: Vec<JestFileResult>,
}

/// The results for one test file within a [`JestAggregatedResult`].
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JestFileResult {
    /// The absolute path to the test file.
    pub name: String,

    /// The results of each test in the file.
    #[serde(default)]
    pub assertion_results: Vec<TestCaseResult>,
}

impl JestAggregatedResult {
    /// Converts these results into the event sequence a live run would have produced.
    pub fn into_events(self) -> Vec<RunnerEvent> {
        std::iter::once(RunnerEvent::RunStarted)
            .chain(self.test_results.into_iter().map(|file| {
                RunnerEvent::TestFileResult(TestFileResult {
                    path: file.name,
                    test_results: file.assertion_results,
                })
            }))
            .chain(std::iter::once(RunnerEvent::RunComplete))
            .collect()
    }
}
