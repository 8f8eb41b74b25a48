// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    RunState, RunSummary,
    objects,
    step::{StepReport, StepReporter, step_reporter_for},
};
use crate::{
    client::ReportingClient,
    config::{ReporterConfig, SuiteLifetime},
    errors::DisplayErrorChain,
    events::{RunnerEvent, TestCaseResult, TestFileResult},
    path::{PathKey, PathLevel, PathResolver, fallback_suite_name},
    registry::EntityRegistry,
    tracker::CompletionTracker,
};
use chrono::{DateTime, FixedOffset, Local};
use testrelay_model::{FinishLaunch, ItemType, ItemUuid, LaunchUuid, Status};
use tracing::{debug, warn};

/// Returns the current time.
pub type Clock = fn() -> DateTime<FixedOffset>;

fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

/// Consumes the lifecycle events of a test run and reports them through a
/// [`ReportingClient`].
///
/// Lifecycle callbacks never fail: problems are logged, and the run carries
/// on. Calls to the client are fire-and-forget until
/// [`on_run_complete`](Self::on_run_complete), which waits for all of them to
/// settle before finishing the launch.
#[derive(Debug)]
pub struct ReportingStateMachine<C> {
    client: C,
    config: ReporterConfig,
    resolver: PathResolver,
    step_reporter: Box<dyn StepReporter>,
    registry: EntityRegistry,
    tracker: CompletionTracker,
    state: RunState,
    launch: Option<LaunchUuid>,
    summary: RunSummary,
    clock: Clock,
}

impl<C: ReportingClient> ReportingStateMachine<C> {
    /// Creates a new state machine. Code references are derived relative to
    /// the root of `resolver`.
    pub fn new(client: C, config: ReporterConfig, resolver: PathResolver) -> Self {
        let step_reporter = step_reporter_for(config.listener_mode);
        Self {
            client,
            config,
            resolver,
            step_reporter,
            registry: EntityRegistry::new(),
            tracker: CompletionTracker::new(),
            state: RunState::NotStarted,
            launch: None,
            summary: RunSummary::default(),
            clock: local_now,
        }
    }

    /// Replaces the clock used to timestamp requests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the current state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Returns the id of the launch, once started.
    pub fn launch(&self) -> Option<LaunchUuid> {
        self.launch
    }

    /// Returns the client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Consumes the state machine, returning the client.
    pub fn into_client(self) -> C {
        self.client
    }

    /// Handles a lifecycle event.
    ///
    /// Returns the summary of the run once it is complete.
    pub async fn on_event(&mut self, event: &RunnerEvent) -> Option<RunSummary> {
        match event {
            RunnerEvent::RunStarted => {
                self.on_run_start();
                None
            }
            RunnerEvent::TestFileResult(file) => {
                self.on_test_file_result(file);
                None
            }
            RunnerEvent::RunComplete => self.on_run_complete().await,
        }
    }

    /// Starts the launch.
    pub fn on_run_start(&mut self) {
        match self.state {
            RunState::NotStarted => {
                self.start_launch();
            }
            RunState::Running => {
                warn!("ignoring duplicate run-start event");
            }
            RunState::Draining | RunState::Closed => {
                warn!("ignoring run-start event after the run completed");
            }
        }
    }

    /// Reports the results of one test file.
    pub fn on_test_file_result(&mut self, file: &TestFileResult) {
        let launch = match (self.state, self.launch) {
            (RunState::Running, Some(launch)) => launch,
            (RunState::NotStarted, _) => {
                warn!(
                    "received results for `{}` before the run started, starting the launch now",
                    file.path
                );
                self.start_launch()
            }
            _ => {
                warn!(
                    "ignoring results for `{}` received after the run completed",
                    file.path
                );
                return;
            }
        };

        if file.test_results.is_empty() {
            debug!("no test results in `{}`", file.path);
            return;
        }

        let fallback_suite = file
            .test_results
            .iter()
            .find(|result| result.ancestor_titles.is_empty())
            .map(|result| fallback_suite_name(&result.title))
            .unwrap_or_default();

        let mut opened = Vec::new();
        for result in &file.test_results {
            self.report_result(launch, &file.path, result, &fallback_suite, &mut opened);
        }

        match self.config.suite_lifetime {
            SuiteLifetime::PerRun => {}
            SuiteLifetime::PerFile => self.finish_opened(launch, &opened),
        }
    }

    /// Finishes every open suite and test, waits for all outstanding calls to
    /// settle, then finishes the launch.
    ///
    /// Returns `None` if the run was already completed.
    pub async fn on_run_complete(&mut self) -> Option<RunSummary> {
        let launch = match (self.state, self.launch) {
            (RunState::Running, Some(launch)) => launch,
            (RunState::NotStarted, _) => {
                warn!("run completed before it started, nothing was reported");
                self.state = RunState::Closed;
                return Some(self.summary);
            }
            _ => {
                debug!("ignoring repeated run-complete event");
                return None;
            }
        };
        self.state = RunState::Draining;

        // Children were registered after their parents.
        let end_time = (self.clock)();
        for (path, entity) in self.registry.drain_newest_first() {
            debug!("finishing {} `{path}`", entity.kind);
            self.tracker.track(self.client.finish_item(
                launch,
                entity.id,
                objects::container_finish(end_time),
            ));
        }

        let drained = self.tracker.drain_all().await;
        self.summary.settled_operations += drained.settled;
        self.summary.failed_operations += drained.failed;

        let finish = self
            .client
            .finish_launch(launch, FinishLaunch::new((self.clock)()));
        self.summary.settled_operations += 1;
        match finish.await {
            Ok(()) => debug!("finished launch {launch}"),
            Err(error) => {
                warn!("failed to finish launch: {}", DisplayErrorChain::new(&error));
                self.summary.failed_operations += 1;
            }
        }

        self.state = RunState::Closed;
        Some(self.summary)
    }

    fn start_launch(&mut self) -> LaunchUuid {
        let request = objects::launch_start(&self.config, (self.clock)());
        let handle = self.client.start_launch(request);
        debug!("started launch {}", handle.id);
        self.tracker.track(handle.completion);
        self.state = RunState::Running;
        self.launch = Some(handle.id);
        handle.id
    }

    fn report_result(
        &mut self,
        launch: LaunchUuid,
        file_path: &str,
        result: &TestCaseResult,
        fallback_suite: &str,
        opened: &mut Vec<PathKey>,
    ) {
        let resolved = self.resolver.resolve(file_path, result, fallback_suite);

        let suite = self.ensure_item(launch, None, ItemType::Suite, &resolved.suite, opened);
        let mut chain = vec![&resolved.suite];
        for level in &resolved.nested {
            let parent = self.resolve_parent(&chain).unwrap_or(suite);
            self.ensure_item(launch, Some(parent), ItemType::Test, level, opened);
            chain.push(level);
        }
        let parent = self.resolve_parent(&chain);

        let status = result.status.report_status();
        let retry = result.is_retried();
        let failure_message = match status {
            Status::Failed => result.first_failure_message(),
            Status::Passed | Status::Skipped => None,
        };
        if retry {
            debug!(
                "`{}` ran {} times, reporting each invocation as a retry",
                resolved.step_code_ref,
                result.invocation_count()
            );
        }

        for _ in 0..result.invocation_count() {
            let start_time = (self.clock)();
            let end_time = objects::step_end_time(start_time, result.duration);
            let step = StepReport {
                launch,
                parent,
                start: objects::step_start(&result.title, retry, &resolved.step_code_ref, start_time),
                finish: objects::step_finish(status, retry, self.config.skipped_issue, end_time),
                failure_message,
                log_time: start_time,
            };
            self.step_reporter
                .report_step(&mut self.client, &mut self.tracker, step);
            self.summary.steps += 1;
        }
    }

    /// Returns the id for `level`, starting a new item if it isn't registered yet.
    fn ensure_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        kind: ItemType,
        level: &PathLevel,
        opened: &mut Vec<PathKey>,
    ) -> ItemUuid {
        if let Some(id) = self.registry.get(&level.key) {
            return id;
        }

        let now = (self.clock)();
        let request = match kind {
            ItemType::Suite => objects::suite_start(&level.name, &level.code_ref, now),
            ItemType::Test | ItemType::Step => {
                objects::test_start(&level.name, &level.code_ref, now)
            }
        };
        let handle = self.client.start_item(launch, parent, request);
        self.tracker.track(handle.completion);
        self.registry.put(level.key.clone(), handle.id, kind);
        opened.push(level.key.clone());
        debug!("started {kind} `{}` ({})", level.name, level.code_ref);

        match kind {
            ItemType::Suite => self.summary.suites += 1,
            ItemType::Test | ItemType::Step => self.summary.tests += 1,
        }
        handle.id
    }

    /// Returns the id of the deepest registered level in `chain`.
    ///
    /// If the deepest level is not registered, this falls back to the nearest
    /// registered ancestor, then to the launch (`None`), with a warning.
    fn resolve_parent(&self, chain: &[&PathLevel]) -> Option<ItemUuid> {
        let (deepest, ancestors) = chain.split_last()?;
        if let Some(id) = self.registry.get(&deepest.key) {
            return Some(id);
        }

        let fallback = ancestors
            .iter()
            .rev()
            .find_map(|level| self.registry.get(&level.key));
        warn!(
            "no item registered for `{}`, attaching its children to {}",
            deepest.key,
            if fallback.is_some() {
                "its nearest registered ancestor"
            } else {
                "the launch"
            }
        );
        fallback
    }

    /// Finishes and unregisters the items opened while reporting one file,
    /// children first.
    fn finish_opened(&mut self, launch: LaunchUuid, opened: &[PathKey]) {
        let end_time = (self.clock)();
        for path in opened.iter().rev() {
            if let Some(entity) = self.registry.remove(path) {
                debug!("finishing {} `{path}`", entity.kind);
                self.tracker.track(self.client.finish_item(
                    launch,
                    entity.id,
                    objects::container_finish(end_time),
                ));
            }
        }
    }
}
