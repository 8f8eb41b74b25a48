// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::objects;
use crate::{client::ReportingClient, config::ListenerMode, tracker::CompletionTracker};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use testrelay_model::{FinishItem, ItemUuid, LaunchUuid, StartItem};
use tracing::debug;

/// A single step to report: one invocation of a test.
#[derive(Clone, Debug)]
pub struct StepReport<'a> {
    /// The launch the step belongs to.
    pub launch: LaunchUuid,

    /// The parent of the step, or `None` to attach it to the launch directly.
    pub parent: Option<ItemUuid>,

    /// The start request.
    pub start: StartItem,

    /// The finish request.
    pub finish: FinishItem,

    /// The failure message to attach, for failed steps.
    pub failure_message: Option<&'a str>,

    /// The time to attach to the failure log.
    pub log_time: DateTime<FixedOffset>,
}

/// A strategy for reporting steps.
///
/// Every completion produced is handed to the tracker.
pub trait StepReporter: fmt::Debug + Send + Sync {
    /// Reports `step`, returning the id of the created item.
    fn report_step(
        &self,
        client: &mut dyn ReportingClient,
        tracker: &mut CompletionTracker,
        step: StepReport<'_>,
    ) -> ItemUuid;
}

/// Returns the step reporter for `mode`.
pub fn step_reporter_for(mode: ListenerMode) -> Box<dyn StepReporter> {
    match mode {
        ListenerMode::Default => Box::new(TwoCallStepReporter),
        ListenerMode::Fast => Box::new(OneCallStepReporter),
    }
}

/// Starts and finishes each step with separate calls, sending the failure
/// message as an error log in between.
#[derive(Copy, Clone, Debug, Default)]
pub struct TwoCallStepReporter;

impl StepReporter for TwoCallStepReporter {
    fn report_step(
        &self,
        client: &mut dyn ReportingClient,
        tracker: &mut CompletionTracker,
        step: StepReport<'_>,
    ) -> ItemUuid {
        let handle = client.start_item(step.launch, step.parent, step.start);
        tracker.track(handle.completion);

        if let Some(message) = step.failure_message {
            let entry = objects::failure_log(message, step.log_time);
            tracker.track(client.send_log(step.launch, handle.id, entry));
        }

        tracker.track(client.finish_item(step.launch, handle.id, step.finish));
        handle.id
    }
}

/// Starts and finishes each step with a single call.
///
/// This halves the number of calls, at the cost of not sending failure logs.
#[derive(Copy, Clone, Debug, Default)]
pub struct OneCallStepReporter;

impl StepReporter for OneCallStepReporter {
    fn report_step(
        &self,
        client: &mut dyn ReportingClient,
        tracker: &mut CompletionTracker,
        step: StepReport<'_>,
    ) -> ItemUuid {
        if step.failure_message.is_some() {
            debug!(
                "not sending failure log for step `{}` in FAST listener mode",
                step.start.name
            );
        }
        let handle = client.start_and_finish_item(step.launch, step.parent, step.start, step.finish);
        tracker.track(handle.completion);
        handle.id
    }
}
