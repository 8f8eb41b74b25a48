// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{client::Completion, errors::DisplayErrorChain};
use debug_ignore::DebugIgnore;
use futures::future::join_all;
use tracing::{debug, warn};

/// Collects the completions of every reporting call issued during a run.
///
/// Calls are fire-and-forget while a run is in progress. Before the launch is
/// finished, [`drain_all`](Self::drain_all) waits for all of them to settle.
#[derive(Debug, Default)]
pub struct CompletionTracker {
    pending: DebugIgnore<Vec<Completion>>,
}

impl CompletionTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a completion to the pending set.
    pub fn track(&mut self, completion: Completion) {
        self.pending.push(completion);
    }

    /// Returns the number of completions that have not been drained yet.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Waits for every pending completion to settle.
    ///
    /// A completion that fails does not stop the others from being awaited:
    /// the failure is logged and counted.
    pub async fn drain_all(&mut self) -> DrainSummary {
        let pending = std::mem::take(&mut *self.pending);
        debug!("waiting for {} reporting calls to settle", pending.len());

        let mut summary = DrainSummary::default();
        for result in join_all(pending).await {
            summary.settled += 1;
            if let Err(error) = result {
                warn!("reporting call failed: {}", DisplayErrorChain::new(&error));
                summary.failed += 1;
            }
        }
        summary
    }
}

/// The outcome of [`CompletionTracker::drain_all`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct DrainSummary {
    /// The number of completions that settled, successfully or not.
    pub settled: usize,

    /// The number of completions that failed.
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ClientError;
    use futures::{FutureExt, channel::oneshot, executor::block_on};

    #[test]
    fn drain_settles_everything() {
        let mut tracker = CompletionTracker::new();
        tracker.track(futures::future::ready(Ok(())).boxed());
        tracker.track(futures::future::ready(Err(ClientError::Injected { index: 1 })).boxed());
        tracker.track(futures::future::ready(Ok(())).boxed());
        assert_eq!(tracker.pending(), 3);

        let summary = block_on(tracker.drain_all());
        assert_eq!(
            summary,
            DrainSummary {
                settled: 3,
                failed: 1
            }
        );
        assert_eq!(tracker.pending(), 0);
    }

    #[test]
    fn drain_waits_for_late_completions() {
        let mut tracker = CompletionTracker::new();
        let (sender, receiver) = oneshot::channel::<()>();
        tracker.track(
            receiver
                .map(|_| Err(ClientError::Injected { index: 0 }))
                .boxed(),
        );

        let mut drain = Box::pin(tracker.drain_all());
        assert!(block_on(async { futures::poll!(drain.as_mut()) }).is_pending());

        sender.send(()).unwrap();
        let summary = block_on(drain);
        assert_eq!(summary.failed, 1);
    }
}
