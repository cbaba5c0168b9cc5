//! Bounded-lifetime watcher for elements inserted after the initial walk
//!
//! The watcher subscribes to insertions under the content root, drains them in
//! delivery order and walks each inserted element (the element itself, frames
//! inside it and shadow roots inside it). Siblings and ancestors are never
//! rescanned. Once [`MutationWatcher::stop`] returns, later insertions are not
//! seen.
//!
//! During a conversion the subscription is opened before the initial walk
//! (see [`InsertionSource::walk_observed`]) so nothing inserted mid-walk slips
//! through; [`MutationWatcher::attach`] then picks it up.

use crate::dom::{InsertionSource, ScopeKind};
use crate::selectors::ExclusionSet;
use crate::walker::{self, WalkOutcome};
use crate::Result;
use log::{debug, info, warn};
use serde::Serialize;
use std::time::{Duration, Instant};

/// What the watcher processed during its lifetime
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WatchSummary {
    /// Non-empty insertion batches drained
    pub batches: usize,
    /// Inserted element nodes processed
    pub inserted: usize,
    /// Per-node walk results, in processing order
    pub outcome: WalkOutcome,
}

/// An active insertion subscription.
pub struct MutationWatcher<'p> {
    patterns: &'p ExclusionSet,
    summary: WatchSummary,
}

impl<'p> MutationWatcher<'p> {
    /// Subscribe to insertions under the document's content root.
    pub fn start<D: InsertionSource>(dom: &mut D, patterns: &'p ExclusionSet) -> Result<Self> {
        let target = dom.content_root()?;
        dom.observe(&target)?;
        debug!("Watching {} for inserted elements", target);
        Ok(Self {
            patterns,
            summary: WatchSummary::default(),
        })
    }

    /// Take over a subscription that is already active, such as the one
    /// [`InsertionSource::walk_observed`] opens.
    pub fn attach(patterns: &'p ExclusionSet) -> Self {
        Self {
            patterns,
            summary: WatchSummary::default(),
        }
    }

    /// Drain insertions every `poll` until `window` has passed, then stop.
    ///
    /// A zero window still performs one final drain so nothing recorded
    /// before the call is lost.
    pub fn run_for<D: InsertionSource>(mut self, dom: &mut D, window: Duration, poll: Duration) -> Result<WatchSummary> {
        let deadline = Instant::now() + window;
        let poll = poll.max(Duration::from_millis(1));

        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep(poll.min(deadline - now));
            self.pump(dom)?;
        }

        let summary = self.stop(dom)?;
        if summary.inserted > 0 {
            info!(
                "Watcher handled {} inserted element(s), removed {}",
                summary.inserted,
                summary.outcome.total_removed()
            );
        }
        Ok(summary)
    }

    /// Process every insertion recorded so far. Returns how many nodes were
    /// handled.
    pub fn pump<D: InsertionSource>(&mut self, dom: &mut D) -> Result<usize> {
        let batch = dom.take_inserted()?;
        self.process(dom, batch)
    }

    /// End the subscription after processing what was still pending.
    pub fn stop<D: InsertionSource>(mut self, dom: &mut D) -> Result<WatchSummary> {
        let last = dom.disconnect()?;
        self.process(dom, last)?;
        Ok(self.summary)
    }

    fn process<D: InsertionSource>(&mut self, dom: &mut D, batch: Vec<D::Scope>) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        self.summary.batches += 1;
        let handled = batch.len();

        for node in batch {
            self.summary.inserted += 1;
            if let Err(e) = walker::walk_scope(dom, &node, ScopeKind::Inserted, self.patterns, &mut self.summary.outcome) {
                if e.aborts_walk() {
                    return Err(e);
                }
                warn!("Skipping inserted node {}: {}", node, e);
                self.summary.outcome.failed_scopes += 1;
            }
        }
        Ok(handled)
    }
}

/// Subscribe, then watch for `window`, draining insertions every `poll`.
pub fn watch_for<D: InsertionSource>(
    dom: &mut D,
    patterns: &ExclusionSet,
    window: Duration,
    poll: Duration,
) -> Result<WatchSummary> {
    MutationWatcher::start(dom, patterns)?.run_for(dom, window, poll)
}
