// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use indoc::indoc;
use pretty_assertions::assert_eq;
use testrelay_model::{ItemType, Status};
use testrelay_runner::{
    client::RecordedCall,
    config::{ListenerMode, SuiteLifetime},
    events::EventReader,
};

static RUN: &str = indoc! {r#"
    {"event": "run-started"}
    {"event": "test-file-result", "path": "/home/ci/project/test/math.test.js", "testResults": [{"title": "adds", "ancestorTitles": ["math"], "status": "passed", "duration": 3}, {"title": "divides", "ancestorTitles": ["math", "division"], "status": "failed", "failureMessages": ["\u001b[31mexpected 2, received 3\u001b[39m"], "invocations": 2}, {"title": "later", "ancestorTitles": ["math", "division"], "status": "todo"}]}
    {"event": "test-file-result", "path": "/home/ci/project/sum.test.js", "testResults": [{"title": "sums", "ancestorTitles": [], "status": "passed"}, {"title": "sums again", "ancestorTitles": [], "status": "pending"}]}
    {"event": "test-file-result", "path": "/home/ci/project/test/math.test.js", "testResults": [{"title": "multiplies", "ancestorTitles": ["math"], "status": "passed"}]}
    {"event": "run-complete"}
"#};

fn run_events() -> impl Iterator<Item = Result<testrelay_runner::events::RunnerEvent>> {
    EventReader::new(RUN.as_bytes(), "run fixture").map(|event| event.map_err(Into::into))
}

#[test]
fn full_run() -> Result<()> {
    let (summary, client) = replay(default_config(), run_events())?;
    let summary = summary.expect("run completed");

    assert_eq!(summary.suites, 2);
    assert_eq!(summary.tests, 1);
    assert_eq!(summary.steps, 7);
    ensure!(summary.is_success(), "unexpected failures: {summary:?}");

    assert_eq!(
        client.render_tree(),
        indoc! {"
            launch: Unit Tests
              SUITE math
                STEP adds: passed
                TEST division
                  STEP divides: failed (retry)
                    [Error] expected 2, received 3
                  STEP divides: failed (retry)
                    [Error] expected 2, received 3
                  STEP later: skipped
                STEP multiplies: passed
              SUITE Suite sums
                STEP sums: passed
                STEP sums again: skipped
        "}
    );

    let code_refs: Vec<_> = client
        .started(ItemType::Suite)
        .chain(client.started(ItemType::Test))
        .filter_map(|item| item.code_ref.clone())
        .collect();
    assert_eq!(
        code_refs,
        vec![
            "test/math.test.js/math",
            "sum.test.js/Suite sums",
            "test/math.test.js/math/division",
        ]
    );
    Ok(())
}

#[test]
fn launch_is_finished_last() -> Result<()> {
    let (_, client) = replay(default_config(), run_events())?;
    let calls = client.calls();

    ensure!(
        matches!(calls.first(), Some(RecordedCall::StartLaunch { .. })),
        "first call should start the launch"
    );
    ensure!(
        matches!(calls.last(), Some(RecordedCall::FinishLaunch { .. })),
        "last call should finish the launch"
    );
    let launch_finishes = calls
        .iter()
        .filter(|call| matches!(call, RecordedCall::FinishLaunch { .. }))
        .count();
    assert_eq!(launch_finishes, 1);

    // Every item is started before it is finished, and finished exactly once.
    for (index, call) in calls.iter().enumerate() {
        if let RecordedCall::StartItem { id, .. } = call {
            let finishes: Vec<_> = calls
                .iter()
                .enumerate()
                .filter(|(_, call)| {
                    matches!(call, RecordedCall::FinishItem { id: finished, .. } if finished == id)
                })
                .map(|(finish_index, _)| finish_index)
                .collect();
            assert_eq!(finishes.len(), 1, "item {id} finished once");
            ensure!(finishes[0] > index, "item {id} finished after it started");
        }
    }
    Ok(())
}

#[test]
fn per_file_suites() -> Result<()> {
    let mut config = default_config();
    config.suite_lifetime = SuiteLifetime::PerFile;
    let (summary, client) = replay(config, run_events())?;
    let summary = summary.expect("run completed");

    // math.test.js is reported twice, so its suite is opened twice.
    assert_eq!(summary.suites, 3);
    let suites: Vec<_> = client
        .started(ItemType::Suite)
        .map(|item| item.name.clone())
        .collect();
    assert_eq!(suites, vec!["math", "Suite sums", "math"]);
    Ok(())
}

#[test]
fn fast_listener_mode() -> Result<()> {
    let mut config = default_config();
    config.listener_mode = ListenerMode::Fast;
    config.skipped_issue = Some(false);
    let (summary, client) = replay(config, run_events())?;
    assert_eq!(summary.expect("run completed").steps, 7);

    assert_eq!(client.logs().count(), 0);
    let skipped_with_issue = client
        .calls()
        .iter()
        .filter(|call| {
            matches!(
                call,
                RecordedCall::StartAndFinishItem { finish, .. }
                    if finish.status == Some(Status::Skipped) && finish.issue.is_some()
            )
        })
        .count();
    assert_eq!(skipped_with_issue, 2);
    Ok(())
}
