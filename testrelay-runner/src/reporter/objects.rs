// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders for the requests sent to a [`ReportingClient`](crate::client::ReportingClient).

use crate::{config::ReporterConfig, helpers::strip_ansi};
use chrono::{DateTime, FixedOffset, TimeDelta};
use testrelay_model::{
    Attribute, FinishItem, Issue, ItemType, LogEntry, LogLevel, StartItem, StartLaunch, Status,
};

/// The value of the `agent` system attribute: `<name>|<version>`.
pub const AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "|", env!("CARGO_PKG_VERSION"));

/// Returns the system attributes attached to every launch.
pub fn system_attributes(skipped_issue: Option<bool>) -> Vec<Attribute> {
    let mut attributes = vec![Attribute::system("agent", AGENT)];
    if skipped_issue == Some(false) {
        attributes.push(Attribute::system("skippedIssue", "false"));
    }
    attributes
}

/// Builds the request that starts the launch.
pub fn launch_start(config: &ReporterConfig, now: DateTime<FixedOffset>) -> StartLaunch {
    let mut launch = StartLaunch::new(&config.testset, now);
    if let Some(description) = &config.description {
        launch.set_description(description);
    }
    launch
        .add_attributes(config.attributes.iter().cloned())
        .add_attributes(system_attributes(config.skipped_issue))
        .set_mode(config.mode)
        .set_rerun(config.rerun, config.rerun_of.clone());
    launch
}

/// Builds the request that starts a suite.
pub fn suite_start(name: &str, code_ref: &str, now: DateTime<FixedOffset>) -> StartItem {
    let mut item = StartItem::new(ItemType::Suite, name, now);
    item.set_code_ref(code_ref);
    item
}

/// Builds the request that starts a nested test.
pub fn test_start(name: &str, code_ref: &str, now: DateTime<FixedOffset>) -> StartItem {
    let mut item = StartItem::new(ItemType::Test, name, now);
    item.set_code_ref(code_ref);
    item
}

/// Builds the request that starts a step.
pub fn step_start(title: &str, retry: bool, code_ref: &str, now: DateTime<FixedOffset>) -> StartItem {
    let mut item = StartItem::new(ItemType::Step, title, now);
    item.set_code_ref(code_ref).set_retry(retry);
    item
}

/// Builds the request that finishes a step.
///
/// Skipped steps are marked as not being an issue if and only if
/// `skipped_issue` is `Some(false)`.
pub fn step_finish(
    status: Status,
    retry: bool,
    skipped_issue: Option<bool>,
    end_time: DateTime<FixedOffset>,
) -> FinishItem {
    let mut finish = FinishItem::new(end_time);
    finish.set_status(status).set_retry(retry);
    if status == Status::Skipped && skipped_issue == Some(false) {
        finish.set_issue(Issue::not_issue());
    }
    finish
}

/// Builds the request that finishes a suite or a nested test.
pub fn container_finish(end_time: DateTime<FixedOffset>) -> FinishItem {
    FinishItem::new(end_time)
}

/// Builds the log entry for a failure message, with ANSI escapes removed.
pub fn failure_log(message: &str, time: DateTime<FixedOffset>) -> LogEntry {
    LogEntry::new(LogLevel::Error, strip_ansi(message), time)
}

/// Returns the end time of a step that started at `start` and ran for
/// `duration_ms` milliseconds, or `start` if the duration is unknown.
pub fn step_end_time(start: DateTime<FixedOffset>, duration_ms: Option<u64>) -> DateTime<FixedOffset> {
    duration_ms
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|delta| start.checked_add_signed(delta))
        .unwrap_or(start)
}
