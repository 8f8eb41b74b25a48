// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset};
use color_eyre::eyre::Result;
use futures::executor::block_on;
use testrelay_runner::{
    client::{RecordingClient, ReportingClient},
    config::{PartialConfig, ReporterConfig},
    events::RunnerEvent,
    path::PathResolver,
    reporter::{ReportingStateMachine, RunSummary},
};

pub(crate) const PROJECT_ROOT: &str = "/home/ci/project";

pub(crate) fn fixed_clock() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-05-01T12:00:00+00:00").expect("valid timestamp")
}

pub(crate) fn default_config() -> ReporterConfig {
    ReporterConfig::merge(
        PartialConfig::defaults(),
        PartialConfig::default(),
        PartialConfig::default(),
        PartialConfig::default(),
    )
}

pub(crate) fn state_machine<C: ReportingClient>(
    client: C,
    config: ReporterConfig,
) -> ReportingStateMachine<C> {
    ReportingStateMachine::new(client, config, PathResolver::new(PROJECT_ROOT))
        .with_clock(fixed_clock)
}

/// Replays `events` against a [`RecordingClient`], returning the summary of
/// the run and the client.
pub(crate) fn replay(
    config: ReporterConfig,
    events: impl IntoIterator<Item = Result<RunnerEvent>>,
) -> Result<(Option<RunSummary>, RecordingClient)> {
    let mut machine = state_machine(RecordingClient::new(), config);
    let mut summary = None;
    for event in events {
        if let Some(run_summary) = block_on(machine.on_event(&event?)) {
            summary = Some(run_summary);
        }
    }
    Ok((summary, machine.into_client()))
}
