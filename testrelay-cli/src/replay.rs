// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading input events and replaying them through the state machine.

use crate::{ExpectedError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use clap::ValueEnum;
use std::{
    fs::File,
    io::{self, BufRead, BufReader},
};
use testrelay_runner::{
    client::ReportingClient,
    errors::ReadEventsError,
    events::{EventReader, JestAggregatedResult, RunnerEvent},
    reporter::{ReportingStateMachine, RunState, RunSummary},
};
use tracing::{debug, warn};

/// The format of the input events.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
pub(crate) enum InputFormat {
    /// Newline-delimited lifecycle events, read as they arrive.
    #[default]
    Ndjson,

    /// The aggregated results file written by `jest --json`.
    JestJson,
}

type EventIter = Box<dyn Iterator<Item = Result<RunnerEvent, ReadEventsError>>>;

/// Opens the input at `path`, or standard input if `path` is `None` or `-`.
///
/// Returns the reader along with a description of it for error messages.
pub(crate) fn open_input(path: Option<&Utf8Path>) -> Result<(Box<dyn BufRead>, String)> {
    match path {
        None => Ok((Box::new(io::stdin().lock()), "standard input".to_owned())),
        Some(path) if path.as_str() == "-" => {
            Ok((Box::new(io::stdin().lock()), "standard input".to_owned()))
        }
        Some(path) => {
            let file = File::open(path).map_err(|error| ExpectedError::InputOpenFailed {
                path: path.to_owned(),
                error,
            })?;
            Ok((Box::new(BufReader::new(file)), format!("`{path}`")))
        }
    }
}

/// Returns the events in `reader`.
///
/// NDJSON input is read lazily. A Jest results file is read in full first.
pub(crate) fn read_events(
    reader: Box<dyn BufRead>,
    source_name: String,
    format: InputFormat,
) -> Result<EventIter, ReadEventsError> {
    match format {
        InputFormat::Ndjson => Ok(Box::new(EventReader::new(reader, source_name))),
        InputFormat::JestJson => {
            let aggregated: JestAggregatedResult = serde_json::from_reader(reader)
                .map_err(|error| ReadEventsError::Jest { source_name, error })?;
            debug!(
                "read Jest results for {} test files",
                aggregated.test_results.len()
            );
            Ok(Box::new(aggregated.into_events().into_iter().map(Ok)))
        }
    }
}

/// Replays `events` through `machine`, returning the summary of the run.
///
/// If the input ends without a run-complete event, the launch is finished
/// anyway. If the input is invalid, the launch is finished with whatever was
/// reported so far, and the input error is returned.
pub(crate) async fn replay<C: ReportingClient>(
    machine: &mut ReportingStateMachine<C>,
    events: impl IntoIterator<Item = Result<RunnerEvent, ReadEventsError>>,
) -> Result<RunSummary, ReadEventsError> {
    let mut summary = None;
    for event in events {
        let event = match event {
            Ok(event) => event,
            Err(error) => {
                if machine.state() == RunState::Running {
                    warn!("input is invalid, finishing the launch with the results read so far");
                    machine.on_run_complete().await;
                }
                return Err(error);
            }
        };
        if let Some(run_summary) = machine.on_event(&event).await {
            summary = Some(run_summary);
        }
    }

    match summary {
        Some(summary) => Ok(summary),
        None => {
            if machine.state() == RunState::Running {
                warn!("input ended without a run-complete event, finishing the launch");
            }
            Ok(machine.on_run_complete().await.unwrap_or_default())
        }
    }
}

/// Returns the directory code references are made relative to.
pub(crate) fn current_dir() -> Result<Utf8PathBuf> {
    let dir =
        std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    Utf8PathBuf::try_from(dir)
        .map_err(|error| ExpectedError::CurrentDirInvalidUtf8 {
            path: error.into_path_buf(),
        })
}
