// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clients for the remote reporting backend.
//!
//! Every call returns immediately. Create calls hand out a temporary id that
//! later calls may refer to right away, while the request itself is still in
//! flight; the outcome of each call is observed through its [`Completion`].

mod http;
mod recording;

pub use http::*;
pub use recording::*;

use crate::errors::ClientError;
use futures::future::BoxFuture;
use testrelay_model::{
    FinishItem, FinishLaunch, ItemUuid, LaunchUuid, LogEntry, StartItem, StartLaunch,
};

/// A future that settles once a reporting call has been acknowledged by the backend, or has failed.
pub type Completion = BoxFuture<'static, Result<(), ClientError>>;

/// The result of a create call: the temporary id of the new entity, and the
/// completion of the call that creates it.
pub struct CallHandle<Id> {
    /// The temporary id, usable immediately.
    pub id: Id,

    /// Settles once the entity has been created.
    pub completion: Completion,
}

impl<Id: std::fmt::Debug> std::fmt::Debug for CallHandle<Id> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// A client for a reporting backend.
///
/// Implementations must accept finish calls for different entities in any
/// order, and must accept calls that refer to an entity whose creation is
/// still in flight.
pub trait ReportingClient {
    /// Starts a launch.
    fn start_launch(&mut self, launch: StartLaunch) -> CallHandle<LaunchUuid>;

    /// Starts an item within `launch`, nested under `parent` or directly under
    /// the launch if `parent` is `None`.
    fn start_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        item: StartItem,
    ) -> CallHandle<ItemUuid>;

    /// Finishes an item.
    fn finish_item(&mut self, launch: LaunchUuid, item: ItemUuid, finish: FinishItem)
    -> Completion;

    /// Starts and immediately finishes an item, as a single call.
    fn start_and_finish_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        start: StartItem,
        finish: FinishItem,
    ) -> CallHandle<ItemUuid>;

    /// Attaches a log entry to an item.
    fn send_log(&mut self, launch: LaunchUuid, item: ItemUuid, entry: LogEntry) -> Completion;

    /// Finishes a launch.
    ///
    /// Callers must wait for every other call of the launch to settle first.
    fn finish_launch(&mut self, launch: LaunchUuid, finish: FinishLaunch) -> Completion;
}

impl<C: ReportingClient + ?Sized> ReportingClient for &mut C {
    fn start_launch(&mut self, launch: StartLaunch) -> CallHandle<LaunchUuid> {
        (**self).start_launch(launch)
    }

    fn start_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        item: StartItem,
    ) -> CallHandle<ItemUuid> {
        (**self).start_item(launch, parent, item)
    }

    fn finish_item(
        &mut self,
        launch: LaunchUuid,
        item: ItemUuid,
        finish: FinishItem,
    ) -> Completion {
        (**self).finish_item(launch, item, finish)
    }

    fn start_and_finish_item(
        &mut self,
        launch: LaunchUuid,
        parent: Option<ItemUuid>,
        start: StartItem,
        finish: FinishItem,
    ) -> CallHandle<ItemUuid> {
        (**self).start_and_finish_item(launch, parent, start, finish)
    }

    fn send_log(&mut self, launch: LaunchUuid, item: ItemUuid, entry: LogEntry) -> Completion {
        (**self).send_log(launch, item, entry)
    }

    fn finish_launch(&mut self, launch: LaunchUuid, finish: FinishLaunch) -> Completion {
        (**self).finish_launch(launch, finish)
    }
}
