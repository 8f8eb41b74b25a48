// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{CallHandle, Completion, ReportingClient};
use crate::errors::ClientError;
use futures::FutureExt;
use std::{
    collections::{BTreeSet, HashMap, HashSet},
    fmt::Write as _,
};
use testrelay_model::{
    FinishItem, FinishLaunch, ItemType, ItemUuid, LaunchUuid, LogEntry, StartItem, StartLaunch,
};

/// A [`ReportingClient`] that records every call instead of sending it.
///
/// Completions settle immediately. Calls can be made to fail by index with
/// [`fail_call`](Self::fail_call), and calls that refer to ids this client
/// never handed out fail with [`ClientError::UnknownEntity`].
#[derive(Clone, Debug, Default)]
pub struct RecordingClient {
    calls: Vec<RecordedCall>,
    fail_at: BTreeSet<usize>,
    launches: HashSet<LaunchUuid>,
    items: HashSet<ItemUuid>,
}

/// A call made to a [`RecordingClient`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RecordedCall {
    /// [`ReportingClient::start_launch`].
    StartLaunch {
        /// The id handed out.
        id: LaunchUuid,
        /// The request.
        request: StartLaunch,
    },

    /// [`ReportingClient::start_item`].
    StartItem {
        /// The id handed out.
        id: ItemUuid,
        /// The launch.
        launch: LaunchUuid,
        /// The parent item, or `None` for an item directly under the launch.
        parent: Option<ItemUuid>,
        /// The request.
        request: StartItem,
    },

    /// [`ReportingClient::finish_item`].
    FinishItem {
        /// The item.
        id: ItemUuid,
        /// The request.
        request: FinishItem,
    },

    /// [`ReportingClient::start_and_finish_item`].
    StartAndFinishItem {
        /// The id handed out.
        id: ItemUuid,
        /// The launch.
        launch: LaunchUuid,
        /// The parent item, or `None` for an item directly under the launch.
        parent: Option<ItemUuid>,
        /// The start request.
        start: StartItem,
        /// The finish request.
        finish: FinishItem,
    },

    /// [`ReportingClient::send_log`].
    SendLog {
        /// The item the entry is attached to.
        item: ItemUuid,
        /// The entry.
        entry: LogEntry,
    },

    /// [`ReportingClient::finish_launch`].
    FinishLaunch {
        /// The launch.
        id: LaunchUuid,
        /// The request.
        request: FinishLaunch,
    },
}

impl RecordingClient {
    /// Creates a new `RecordingClient`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the call at `index` (0-based, in the order calls are made) fail.
    pub fn fail_call(&mut self, index: usize) -> &mut Self {
        self.fail_at.insert(index);
        self
    }

    /// Returns every call made so far, in order.
    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Returns the start requests for items of the given kind, in order.
    pub fn started(&self, kind: ItemType) -> impl Iterator<Item = &StartItem> + '_ {
        self.calls.iter().filter_map(move |call| match call {
            RecordedCall::StartItem { request, .. }
            | RecordedCall::StartAndFinishItem { start: request, .. }
                if request.item_type == kind =>
            {
                Some(request)
            }
            _ => None,
        })
    }

    /// Returns the finish requests for the given item.
    pub fn finishes_of(&self, item: ItemUuid) -> impl Iterator<Item = &FinishItem> + '_ {
        self.calls.iter().filter_map(move |call| match call {
            RecordedCall::FinishItem { id, request }
            | RecordedCall::StartAndFinishItem {
                id,
                finish: request,
                ..
            } if *id == item => Some(request),
            _ => None,
        })
    }

    /// Returns every log entry sent, with the item it was attached to.
    pub fn logs(&self) -> impl Iterator<Item = (ItemUuid, &LogEntry)> + '_ {
        self.calls.iter().filter_map(|call| match call {
            RecordedCall::SendLog { item, entry } => Some((*item, entry)),
            _ => None,
        })
    }

    /// Renders the recorded launch as an indented tree.
    ///
    /// Each item is shown with its kind and name; steps also show their status
    /// and whether they were retries, followed by their logs.
    pub fn render_tree(&self) -> String {
        let mut children: HashMap<Option<ItemUuid>, Vec<(ItemUuid, &StartItem)>> = HashMap::new();
        for call in &self.calls {
            match call {
                RecordedCall::StartItem {
                    id,
                    parent,
                    request,
                    ..
                }
                | RecordedCall::StartAndFinishItem {
                    id,
                    parent,
                    start: request,
                    ..
                } => children.entry(*parent).or_default().push((*id, request)),
                _ => {}
            }
        }

        let mut out = String::new();
        for call in &self.calls {
            if let RecordedCall::StartLaunch { request, .. } = call {
                _ = writeln!(out, "launch: {}", request.name);
            }
        }
        self.render_children(&children, None, 1, &mut out);
        out
    }

    fn render_children(
        &self,
        children: &HashMap<Option<ItemUuid>, Vec<(ItemUuid, &StartItem)>>,
        parent: Option<ItemUuid>,
        depth: usize,
        out: &mut String,
    ) {
        let Some(items) = children.get(&parent) else {
            return;
        };
        let indent = "  ".repeat(depth);
        for (id, request) in items {
            _ = write!(out, "{indent}{} {}", request.item_type, request.name);
            if let Some(status) = self.finishes_of(*id).find_map(|finish| finish.status) {
                _ = write!(out, ": {status}");
            }
            if request.retry {
                _ = write!(out, " (retry)");
            }
            out.push('\n');

            for (_, entry) in self.logs().filter(|(item, _)| item == id) {
                _ = writeln!(out, "{indent}  [{:?}] {}", entry.level, entry.message);
            }
            self.render_children(children, Some(*id), depth + 1, out);
        }
    }

    fn record(&mut self, call: RecordedCall) -> Result<(), ClientError> {
        let index = self.calls.len();
        self.calls.push(call);
        if self.fail_at.contains(&index) {
            Err(ClientError::Injected { index })
        } else {
            Ok(())
        }
    }

    fn check_launch(&self, launch: LaunchUuid) -> Result<(), ClientError> {
        if self.launches.contains(&launch) {
            Ok(())
        } else {
            Err(ClientError::UnknownEntity {
                kind: "launch",
                id: launch.to_string(),
            })
        }
    }

    fn check_item(&self, item: Option<ItemUuid>) -> Result<(), ClientError> {
        match item {
            Some(item) if !self.items.contains(&item) => Err(ClientError::UnknownEntity {
                kind: "item",
                id: item.to_string(),
            }),
            _ => Ok(()),
        }
    }
}

impl ReportingClient for RecordingClient {
    fn start_launch(&mut self, request: StartLaunch) -> CallHandle<LaunchUuid> {
        let id = LaunchUuid::new_v4();
        self.launches.insert(id);
        let result = self.record(RecordedCall::StartLaunch { id, request });
        CallHandle {
            id,
            completion: settled(result),
        }
    }

    fn start_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        request: StartItem,
    ) -> CallHandle<ItemUuid> {
        let id = ItemUuid::new_v4();
        let checked = self.check_launch(launch).and(self.check_item(parent));
        self.items.insert(id);
        let result = self.record(RecordedCall::StartItem {
            id,
            launch,
            parent,
            request,
        });
        CallHandle {
            id,
            completion: settled(checked.and(result)),
        }
    }

    fn finish_item(&mut self, launch: LaunchUuid, id: ItemUuid, request: FinishItem) -> Completion {
        let checked = self.check_launch(launch).and(self.check_item(Some(id)));
        let result = self.record(RecordedCall::FinishItem { id, request });
        settled(checked.and(result))
    }

    fn start_and_finish_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        start: StartItem,
        finish: FinishItem,
    ) -> CallHandle<ItemUuid> {
        let id = ItemUuid::new_v4();
        let checked = self.check_launch(launch).and(self.check_item(parent));
        self.items.insert(id);
        let result = self.record(RecordedCall::StartAndFinishItem {
            id,
            launch,
            parent,
            start,
            finish,
        });
        CallHandle {
            id,
            completion: settled(checked.and(result)),
        }
    }

    fn send_log(&mut self, launch: LaunchUuid, item: ItemUuid, entry: LogEntry) -> Completion {
        let checked = self.check_launch(launch).and(self.check_item(Some(item)));
        let result = self.record(RecordedCall::SendLog { item, entry });
        settled(checked.and(result))
    }

    fn finish_launch(&mut self, id: LaunchUuid, request: FinishLaunch) -> Completion {
        let checked = self.check_launch(id);
        let result = self.record(RecordedCall::FinishLaunch { id, request });
        settled(checked.and(result))
    }
}

fn settled(result: Result<(), ClientError>) -> Completion {
    futures::future::ready(result).boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use futures::executor::block_on;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use testrelay_model::{LogLevel, Status};

    #[test]
    fn render_tree() {
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+00:00").unwrap();
        let mut client = RecordingClient::new();
        let launch = client.start_launch(StartLaunch::new("Unit Tests", time)).id;
        let suite = client
            .start_item(launch, None, StartItem::new(ItemType::Suite, "math", time))
            .id;
        let test = client
            .start_item(launch, Some(suite), StartItem::new(ItemType::Test, "add", time))
            .id;

        let mut step = StartItem::new(ItemType::Step, "adds", time);
        step.set_retry(true);
        let step = client.start_item(launch, Some(test), step).id;
        let mut completions = vec![client.send_log(
            launch,
            step,
            LogEntry::new(LogLevel::Error, "boom", time),
        )];
        let mut finish = FinishItem::new(time);
        finish.set_status(Status::Failed).set_retry(true);
        completions.push(client.finish_item(launch, step, finish));

        let mut finish = FinishItem::new(time);
        finish.set_status(Status::Passed);
        let subtracts = client.start_and_finish_item(
            launch,
            Some(suite),
            StartItem::new(ItemType::Step, "subtracts", time),
            finish,
        );
        completions.push(subtracts.completion);
        completions.push(client.finish_item(launch, test, FinishItem::new(time)));
        completions.push(client.finish_item(launch, suite, FinishItem::new(time)));
        completions.push(client.finish_launch(launch, FinishLaunch::new(time)));
        for result in block_on(futures::future::join_all(completions)) {
            assert!(result.is_ok(), "call failed: {result:?}");
        }

        assert_eq!(
            client.render_tree(),
            indoc! {"
                launch: Unit Tests
                  SUITE math
                    TEST add
                      STEP adds: failed (retry)
                        [Error] boom
                    STEP subtracts: passed
            "}
        );
    }

    #[test]
    fn failures() {
        let time = DateTime::parse_from_rfc3339("2024-05-01T12:00:00+00:00").unwrap();
        let mut client = RecordingClient::new();
        client.fail_call(1);

        let launch = client.start_launch(StartLaunch::new("Unit Tests", time));
        assert!(block_on(launch.completion).is_ok());

        let suite = client.start_item(
            launch.id,
            None,
            StartItem::new(ItemType::Suite, "math", time),
        );
        assert!(matches!(
            block_on(suite.completion),
            Err(ClientError::Injected { index: 1 })
        ));

        let unknown = client.finish_item(launch.id, ItemUuid::new_v4(), FinishItem::new(time));
        assert!(matches!(
            block_on(unknown),
            Err(ClientError::UnknownEntity { kind: "item", .. })
        ));
        assert_eq!(client.calls().len(), 3);
    }
}
