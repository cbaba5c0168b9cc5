//! Recursive traversal over documents, frames and shadow roots

use crate::dom::{DocumentTree, FrameAccess, ScopeKind};
use crate::remover::{self, RemovalReport};
use crate::selectors::ExclusionSet;
use crate::Result;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Removal report for one visited scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeReport {
    pub kind: ScopeKind,
    /// Nesting depth below the scope the walk started from
    pub depth: usize,
    pub label: String,
    pub report: RemovalReport,
}

/// A frame the walk could not enter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFrame {
    pub label: String,
    pub reason: String,
}

/// Everything a walk observed, in visiting order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WalkOutcome {
    pub scopes: Vec<ScopeReport>,
    pub skipped_frames: Vec<SkippedFrame>,
    /// Nested scopes whose traversal failed and was abandoned
    pub failed_scopes: usize,
}

impl WalkOutcome {
    /// Elements removed across all visited scopes
    pub fn total_removed(&self) -> usize {
        self.scopes.iter().map(|s| s.report.total()).sum()
    }

    /// Removal counts for `pattern`, one entry per visited scope
    pub fn counts_for(&self, pattern: &str) -> Vec<usize> {
        self.scopes.iter().map(|s| s.report.count(pattern)).collect()
    }

    fn absorb(&mut self, other: WalkOutcome) {
        self.scopes.extend(other.scopes);
        self.skipped_frames.extend(other.skipped_frames);
        self.failed_scopes += other.failed_scopes;
    }
}

/// Apply `patterns` to the whole document: the top-level scope, then every
/// accessible frame and every shadow root, depth first, frames before shadow
/// roots.
///
/// Errors on the top-level document propagate. Errors in nested scopes are
/// logged and counted unless they must abort the walk (see
/// [`Error::aborts_walk`](crate::Error::aborts_walk)).
pub fn walk<D: DocumentTree>(dom: &mut D, patterns: &ExclusionSet) -> Result<WalkOutcome> {
    let root = dom.document()?;
    let mut outcome = WalkOutcome::default();
    visit(dom, &root, ScopeKind::Document, 0, patterns, &mut outcome)?;
    Ok(outcome)
}

/// Walk starting at an arbitrary scope. Used by the watcher for inserted
/// nodes, which are treated as depth-0 roots of kind `kind`.
pub fn walk_scope<D: DocumentTree>(
    dom: &mut D,
    scope: &D::Scope,
    kind: ScopeKind,
    patterns: &ExclusionSet,
    outcome: &mut WalkOutcome,
) -> Result<()> {
    visit(dom, scope, kind, 0, patterns, outcome)
}

fn visit<D: DocumentTree>(
    dom: &mut D,
    scope: &D::Scope,
    kind: ScopeKind,
    depth: usize,
    patterns: &ExclusionSet,
    outcome: &mut WalkOutcome,
) -> Result<()> {
    let report = remover::remove(dom, scope, patterns)?;
    outcome.scopes.push(ScopeReport {
        kind,
        depth,
        label: scope.to_string(),
        report,
    });

    for frame in dom.frames(scope)? {
        match frame {
            FrameAccess::Accessible(inner) => nested(dom, &inner, ScopeKind::Frame, depth + 1, patterns, outcome)?,
            FrameAccess::Inaccessible { label, reason } => {
                debug!("Skipping frame {}: {}", label, reason);
                outcome.skipped_frames.push(SkippedFrame { label, reason });
            }
        }
    }

    for shadow in dom.shadow_roots(scope)? {
        nested(dom, &shadow, ScopeKind::Shadow, depth + 1, patterns, outcome)?;
    }

    Ok(())
}

// Reports gathered before a nested failure are kept; the failure is counted.
fn nested<D: DocumentTree>(
    dom: &mut D,
    scope: &D::Scope,
    kind: ScopeKind,
    depth: usize,
    patterns: &ExclusionSet,
    outcome: &mut WalkOutcome,
) -> Result<()> {
    let mut local = WalkOutcome::default();
    match visit(dom, scope, kind, depth, patterns, &mut local) {
        Ok(()) => {
            outcome.absorb(local);
            Ok(())
        }
        Err(e) if e.aborts_walk() => Err(e),
        Err(e) => {
            warn!("Abandoning {:?} scope {}: {}", kind, scope, e);
            outcome.absorb(local);
            outcome.failed_scopes += 1;
            Ok(())
        }
    }
}
