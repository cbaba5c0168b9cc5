//! Document tree abstraction used by the remover, walker and watcher
//!
//! Backends expose opaque scope handles: the top-level document, a frame's
//! inner document, a shadow root, or (for the watcher) an inserted element.
//! All traversal logic lives in this crate and only talks to backends through
//! these traits, so the same code runs against a live page over CDP and
//! against an in-memory document.

use crate::selectors::{ExclusionPattern, ExclusionSet};
use crate::walker::{self, WalkOutcome};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What kind of unit a scope handle refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// The top-level document
    Document,
    /// A same-origin document reached through a frame element
    Frame,
    /// An open shadow root attached to a host element
    Shadow,
    /// An element inserted after the initial walk
    Inserted,
}

/// Outcome of asking a frame element for its inner document.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameAccess<S> {
    /// The inner document can be traversed
    Accessible(S),
    /// Cross-origin or otherwise unavailable; the walker skips it
    Inaccessible { label: String, reason: String },
}

/// A document-like structure that exclusions can be applied to.
///
/// Scope handles implement `Display` so reports and logs can name them.
pub trait DocumentTree {
    type Scope: Clone + fmt::Debug + fmt::Display;

    /// Handle for the top-level document
    fn document(&mut self) -> Result<Self::Scope>;

    /// Detach every element in `scope` matching `pattern` and return how many
    /// were removed. Matching does not cross into frames or shadow roots. When
    /// the scope root is an element it is a candidate as well.
    fn remove_matching(&mut self, scope: &Self::Scope, pattern: &ExclusionPattern) -> Result<usize>;

    /// Frame elements found in `scope`, in document order
    fn frames(&mut self, scope: &Self::Scope) -> Result<Vec<FrameAccess<Self::Scope>>>;

    /// Shadow roots attached to elements in `scope` (including the scope root
    /// when it is an element), in document order
    fn shadow_roots(&mut self, scope: &Self::Scope) -> Result<Vec<Self::Scope>>;
}

/// A document that can report element insertions while a subscription is
/// active.
pub trait InsertionSource: DocumentTree {
    /// The primary content container (`body`), or the document when absent
    fn content_root(&mut self) -> Result<Self::Scope>;

    /// Begin recording element insertions anywhere below `target`.
    /// Replaces any earlier subscription.
    fn observe(&mut self, target: &Self::Scope) -> Result<()>;

    /// Drain recorded insertions in delivery order
    fn take_inserted(&mut self) -> Result<Vec<Self::Scope>>;

    /// End the subscription and return whatever was recorded but not yet
    /// drained. Insertions after this call are not reported.
    fn disconnect(&mut self) -> Result<Vec<Self::Scope>>;

    /// Subscribe to insertions under the content root, then run the initial
    /// walk. Anything inserted while the walk is in progress is left in the
    /// subscription for the watcher to drain.
    ///
    /// Backends that can run the whole walk atomically inside the document
    /// override this.
    fn walk_observed(&mut self, patterns: &ExclusionSet) -> Result<WalkOutcome>
    where
        Self: Sized,
    {
        let target = self.content_root()?;
        self.observe(&target)?;
        walker::walk(self, patterns)
    }
}
