// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle events produced by a test runner.
//!
//! A run is a `run-started` event, any number of `test-file-result` events
//! (one per test file, in the order the runner finished them) and a final
//! `run-complete` event. Over the wire, events are newline-delimited JSON.

mod jest;

pub use jest::*;

use crate::errors::{EventParseError, ReadEventsError};
use serde::{Deserialize, Serialize};
use std::{fmt, io::BufRead};
use testrelay_model::Status;

/// A lifecycle event.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RunnerEvent {
    /// The run started.
    RunStarted,

    /// Every test in a test file has finished.
    TestFileResult(TestFileResult),

    /// The run is over.
    RunComplete,
}

/// The results for one test file.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestFileResult {
    /// The path to the test file, as reported by the runner.
    ///
    /// This is kept as a string because runners report native paths, which
    /// may use either separator.
    pub path: String,

    /// The results of every test in the file, in the order the runner reported them.
    #[serde(default)]
    pub test_results: Vec<TestCaseResult>,
}

/// The result of a single test.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    /// The title of the test itself.
    pub title: String,

    /// The titles of the enclosing describe blocks, outermost first.
    ///
    /// This does not include `title`.
    #[serde(default)]
    pub ancestor_titles: Vec<String>,

    /// The outcome.
    pub status: TestCaseStatus,

    /// Failure messages, possibly containing ANSI escape sequences.
    #[serde(default)]
    pub failure_messages: Vec<String>,

    /// The number of times the test was executed, if the runner retried it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invocations: Option<u32>,

    /// The duration of the last invocation in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl TestCaseResult {
    /// Creates a new result with no ancestors, failure messages or invocation count.
    pub fn new(title: impl Into<String>, status: TestCaseStatus) -> Self {
        Self {
            title: title.into(),
            ancestor_titles: Vec::new(),
            status,
            failure_messages: Vec::new(),
            invocations: None,
            duration: None,
        }
    }

    /// Returns the number of steps to report for this test.
    ///
    /// A missing count, or a count of zero, means the test ran once.
    pub fn invocation_count(&self) -> u32 {
        match self.invocations {
            None | Some(0) => 1,
            Some(count) => count,
        }
    }

    /// Returns true if the runner executed this test more than once.
    pub fn is_retried(&self) -> bool {
        self.invocation_count() != 1
    }

    /// Returns the first failure message, if any.
    pub fn first_failure_message(&self) -> Option<&str> {
        self.failure_messages.first().map(String::as_str)
    }
}

/// The outcome of a test, as reported by the runner.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestCaseStatus {
    /// The test passed.
    Passed,
    /// The test failed.
    Failed,
    /// The test was skipped with `.skip`, or filtered out.
    Pending,
    /// The test was skipped.
    Skipped,
    /// The test is a placeholder declared with `.todo`.
    Todo,
    /// The test was disabled.
    Disabled,
    /// The test was focused with `.only`.
    Focused,
    /// A status this version does not know about.
    Other(String),
}

impl TestCaseStatus {
    /// Maps this status to the status reported to the backend.
    ///
    /// Anything that is neither a pass nor a failure is reported as skipped.
    pub fn report_status(&self) -> Status {
        match self {
            Self::Passed => Status::Passed,
            Self::Failed => Status::Failed,
            Self::Pending
            | Self::Skipped
            | Self::Todo
            | Self::Disabled
            | Self::Focused
            | Self::Other(_) => Status::Skipped,
        }
    }

    /// Returns the string form of this status.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passed => "passed",
            Self::Failed => "failed",
            Self::Pending => "pending",
            Self::Skipped => "skipped",
            Self::Todo => "todo",
            Self::Disabled => "disabled",
            Self::Focused => "focused",
            Self::Other(other) => other,
        }
    }
}

impl From<String> for TestCaseStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "passed" => Self::Passed,
            "failed" => Self::Failed,
            "pending" => Self::Pending,
            "skipped" => Self::Skipped,
            "todo" => Self::Todo,
            "disabled" => Self::Disabled,
            "focused" => Self::Focused,
            _ => Self::Other(s),
        }
    }
}

impl From<TestCaseStatus> for String {
    fn from(status: TestCaseStatus) -> Self {
        status.as_str().to_owned()
    }
}

impl fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads newline-delimited events from a reader, one at a time.
///
/// Blank lines are skipped. Events are yielded as soon as their line is
/// complete, so this works with a live pipe from a running test runner.
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
    source_name: String,
    line: usize,
    buf: String,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a new `EventReader`. `source_name` is used in error messages.
    pub fn new(reader: R, source_name: impl Into<String>) -> Self {
        Self {
            reader,
            source_name: source_name.into(),
            line: 0,
            buf: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for EventReader<R> {
    type Item = Result<RunnerEvent, ReadEventsError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buf.clear();
            match self.reader.read_line(&mut self.buf) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(error) => {
                    return Some(Err(ReadEventsError::Io {
                        source_name: self.source_name.clone(),
                        error,
                    }));
                }
            }
            self.line += 1;

            let line = self.buf.trim();
            if line.is_empty() {
                continue;
            }

            return Some(serde_json::from_str(line).map_err(|error| {
                ReadEventsError::Event {
                    source_name: self.source_name.clone(),
                    error: EventParseError::new(self.line, error),
                }
            }));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn read_events() {
        let input = indoc! {r#"
            {"event": "run-started"}

            {"event": "test-file-result", "path": "/p/a.test.js", "testResults": [{"title": "t", "ancestorTitles": ["d"], "status": "failed", "failureMessages": ["boom"], "invocations": 2, "duration": 7}]}
            {"event": "run-complete"}
        "#};

        let events: Vec<_> = EventReader::new(input.as_bytes(), "test input")
            .collect::<Result<_, _>>()
            .unwrap();

        let mut result = TestCaseResult::new("t", TestCaseStatus::Failed);
        result.ancestor_titles = vec!["d".to_owned()];
        result.failure_messages = vec!["boom".to_owned()];
        result.invocations = Some(2);
        result.duration = Some(7);

        assert_eq!(
            events,
            vec![
                RunnerEvent::RunStarted,
                RunnerEvent::TestFileResult(TestFileResult {
                    path: "/p/a.test.js".to_owned(),
                    test_results: vec![result],
                }),
                RunnerEvent::RunComplete,
            ]
        );
    }

    #[test]
    fn read_events_reports_line_numbers() {
        let input = "{\"event\": \"run-started\"}\n\n{\"event\": \"bogus\"}\n";
        let mut reader = EventReader::new(input.as_bytes(), "test input");
        assert_eq!(reader.next().unwrap().unwrap(), RunnerEvent::RunStarted);
        match reader.next().unwrap() {
            Err(ReadEventsError::Event { error, .. }) => assert_eq!(error.line(), 3),
            other => panic!("expected an event parse error, found {other:?}"),
        }
    }

    #[test_case(None, 1, false ; "absent")]
    #[test_case(Some(0), 1, false ; "zero")]
    #[test_case(Some(1), 1, false ; "once")]
    #[test_case(Some(3), 3, true ; "retried")]
    fn invocations(invocations: Option<u32>, count: u32, retried: bool) {
        let mut result = TestCaseResult::new("t", TestCaseStatus::Passed);
        result.invocations = invocations;
        assert_eq!(result.invocation_count(), count);
        assert_eq!(result.is_retried(), retried);
    }

    #[test_case("passed", Status::Passed ; "passed")]
    #[test_case("failed", Status::Failed ; "failed")]
    #[test_case("pending", Status::Skipped ; "pending")]
    #[test_case("todo", Status::Skipped ; "todo")]
    #[test_case("something-new", Status::Skipped ; "unknown")]
    fn status_mapping(input: &str, expected: Status) {
        let status: TestCaseStatus = serde_json::from_value(input.into()).unwrap();
        assert_eq!(status.as_str(), input);
        assert_eq!(status.report_status(), expected);
    }
}
