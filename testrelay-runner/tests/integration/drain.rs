// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The launch must not be finished before every other call has settled.

use crate::fixtures::*;
use futures::{
    FutureExt,
    channel::oneshot,
    executor::block_on,
    poll,
};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use testrelay_model::{
    FinishItem, FinishLaunch, ItemUuid, LaunchUuid, LogEntry, StartItem, StartLaunch,
};
use testrelay_runner::{
    client::{CallHandle, Completion, ReportingClient},
    errors::ClientError,
    events::{TestCaseResult, TestCaseStatus, TestFileResult},
};

/// A client whose completions only settle when the test says so.
#[derive(Debug, Default)]
struct GatedClient {
    state: Arc<Mutex<GateState>>,
}

#[derive(Debug, Default)]
struct GateState {
    calls: Vec<&'static str>,
    gates: Vec<Option<oneshot::Sender<Result<(), ClientError>>>>,
}

impl GatedClient {
    fn gate(&mut self, call: &'static str) -> Completion {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state.gates.push(Some(sender));
        receiver
            .map(|result| {
                result.unwrap_or(Err(ClientError::TaskCancelled {
                    entity: "gated call".to_owned(),
                }))
            })
            .boxed()
    }
}

impl ReportingClient for GatedClient {
    fn start_launch(&mut self, _launch: StartLaunch) -> CallHandle<LaunchUuid> {
        CallHandle {
            id: LaunchUuid::new_v4(),
            completion: self.gate("start-launch"),
        }
    }

    fn start_item(
        &mut self,
        _launch: LaunchUuid,
        _parent: Option<ItemUuid>,
        _item: StartItem,
    ) -> CallHandle<ItemUuid> {
        CallHandle {
            id: ItemUuid::new_v4(),
            completion: self.gate("start-item"),
        }
    }

    fn finish_item(
        &mut self,
        _launch: LaunchUuid,
        _item: ItemUuid,
        _finish: FinishItem,
    ) -> Completion {
        self.gate("finish-item")
    }

    fn start_and_finish_item(
        &mut self,
        _launch: LaunchUuid,
        _parent: Option<ItemUuid>,
        _start: StartItem,
        _finish: FinishItem,
    ) -> CallHandle<ItemUuid> {
        CallHandle {
            id: ItemUuid::new_v4(),
            completion: self.gate("start-and-finish-item"),
        }
    }

    fn send_log(&mut self, _launch: LaunchUuid, _item: ItemUuid, _entry: LogEntry) -> Completion {
        self.gate("send-log")
    }

    fn finish_launch(&mut self, _launch: LaunchUuid, _finish: FinishLaunch) -> Completion {
        self.state.lock().unwrap().calls.push("finish-launch");
        futures::future::ready(Ok(())).boxed()
    }
}

fn settle(state: &Mutex<GateState>, index: usize, result: Result<(), ClientError>) {
    let sender = state.lock().unwrap().gates[index]
        .take()
        .expect("each call is settled once");
    sender.send(result).expect("receiver is alive");
}

#[test]
fn launch_finish_waits_for_every_call() {
    let client = GatedClient::default();
    let state = client.state.clone();
    let mut machine = state_machine(client, default_config());

    machine.on_run_start();
    let mut result = TestCaseResult::new("adds", TestCaseStatus::Passed);
    result.ancestor_titles = vec!["math".to_owned()];
    machine.on_test_file_result(&TestFileResult {
        path: format!("{PROJECT_ROOT}/math.test.js"),
        test_results: vec![result],
    });

    let mut complete = Box::pin(machine.on_run_complete());
    assert!(block_on(async { poll!(complete.as_mut()) }).is_pending());

    // Launch, suite, step start, step finish and the suite finish from the sweep.
    assert_eq!(
        state.lock().unwrap().calls,
        vec![
            "start-launch",
            "start-item",
            "start-item",
            "finish-item",
            "finish-item",
        ]
    );

    // Settle every call but the last, with call #3 failing.
    for index in 0..4 {
        let result = if index == 2 {
            Err(ClientError::Injected { index })
        } else {
            Ok(())
        };
        settle(&state, index, result);
        assert!(block_on(async { poll!(complete.as_mut()) }).is_pending());
        assert!(
            !state.lock().unwrap().calls.contains(&"finish-launch"),
            "launch finished after settling call #{}, with calls still pending",
            index + 1
        );
    }

    settle(&state, 4, Ok(()));
    let summary = block_on(complete).expect("first run-complete returns a summary");
    assert_eq!(state.lock().unwrap().calls.last(), Some(&"finish-launch"));
    assert_eq!(summary.settled_operations, 6);
    assert_eq!(summary.failed_operations, 1);
}
