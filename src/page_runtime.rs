//! In-page handle runtime used by the CDP backend
//!
//! The runtime is installed once per document via `Runtime.evaluate`. It keeps
//! a registry of numeric handles for documents, shadow roots and elements and
//! exposes the small set of primitives the traversal needs, plus
//! `walkAndObserve`, which arms the insertion observer and runs the whole
//! initial walk in one synchronous call so page scripts cannot interleave with
//! it. Every primitive returns a JSON string, either `{"ok": ...}` or
//! `{"error": ..., "kind": "selector" | "stale" | "script", "subject": ...}`,
//! so values survive CDP's by-reference object results.

use crate::dom::FrameAccess;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;

/// Global the runtime installs itself under
pub const RUNTIME_GLOBAL: &str = "__pagecut";

pub(crate) const RUNTIME_SCRIPT: &str = r#"(function () {
    if (window.__pagecut) { return JSON.stringify({ ok: true }); }

    const nodes = new Map();
    const ids = new WeakMap();
    let nextId = 1;
    let observer = null;
    let pending = [];

    function describe(el) {
        if (!el || !el.tagName) { return '#node'; }
        let text = el.tagName.toLowerCase();
        if (el.id) { text += '#' + el.id; }
        if (typeof el.className === 'string' && el.className.trim()) {
            text += '.' + el.className.trim().split(/\s+/).join('.');
        }
        return text;
    }

    function handle(node, label) {
        let id = ids.get(node);
        if (id === undefined) {
            id = nextId++;
            ids.set(node, id);
            nodes.set(id, node);
        }
        return { id: id, label: label };
    }

    function lookup(id) {
        const node = nodes.get(id);
        if (!node) { throw { kind: 'stale', message: 'unknown handle ' + id }; }
        return node;
    }

    function elementsIn(scope) {
        const found = Array.from(scope.querySelectorAll('*'));
        if (scope.nodeType === 1) { found.unshift(scope); }
        return found;
    }

    function reply(subject, fn) {
        try {
            return JSON.stringify({ ok: fn() });
        } catch (e) {
            if (e && e.kind) {
                const about = e.subject !== undefined ? e.subject : subject;
                return JSON.stringify({ error: e.message, kind: e.kind, subject: about });
            }
            const kind = e && e.name === 'SyntaxError' ? 'selector' : 'script';
            return JSON.stringify({ error: String((e && e.message) || e), kind: kind, subject: subject });
        }
    }

    function removeIn(scope, selector) {
        let matches;
        try {
            matches = Array.from(scope.querySelectorAll(selector));
            if (scope.nodeType === 1 && scope.matches(selector)) { matches.unshift(scope); }
        } catch (e) {
            throw { kind: 'selector', message: String((e && e.message) || e), subject: selector };
        }
        matches.forEach(function (el) { el.remove(); });
        return matches.length;
    }

    function frameList(scope) {
        return elementsIn(scope)
            .filter(function (el) { return el.tagName === 'IFRAME' || el.tagName === 'FRAME'; })
            .map(function (frame) {
                const src = frame.getAttribute('src');
                let doc = null;
                try { doc = frame.contentDocument; } catch (e) { doc = null; }
                return { doc: doc, label: describe(frame) + (src ? '[src=' + src + ']' : '') };
            });
    }

    function shadowList(scope) {
        return elementsIn(scope)
            .filter(function (el) { return !!el.shadowRoot; })
            .map(function (el) { return { root: el.shadowRoot, label: '#shadow-root(' + describe(el) + ')' }; });
    }

    function walkScope(scope, kind, depth, label, patterns, out) {
        const entries = patterns.map(function (p) { return [p, removeIn(scope, p)]; });
        out.scopes.push({ kind: kind, depth: depth, label: label, report: { entries: entries } });
        frameList(scope).forEach(function (f) {
            if (f.doc) {
                nested(f.doc, 'frame', depth + 1, f.label, patterns, out);
            } else {
                out.skipped_frames.push({ label: f.label, reason: 'content document is not accessible (cross-origin or not loaded)' });
            }
        });
        shadowList(scope).forEach(function (s) {
            nested(s.root, 'shadow', depth + 1, s.label, patterns, out);
        });
    }

    function nested(scope, kind, depth, label, patterns, out) {
        const local = { scopes: [], skipped_frames: [], failed_scopes: 0 };
        try {
            walkScope(scope, kind, depth, label, patterns, local);
        } catch (e) {
            if (e && e.kind === 'selector') { throw e; }
            local.failed_scopes += 1;
        }
        out.scopes = out.scopes.concat(local.scopes);
        out.skipped_frames = out.skipped_frames.concat(local.skipped_frames);
        out.failed_scopes += local.failed_scopes;
    }

    function startObserving(target) {
        if (observer) { observer.disconnect(); }
        pending = [];
        observer = new MutationObserver(collect);
        observer.observe(target, { childList: true, subtree: true });
    }

    function collect(records) {
        records.forEach(function (record) {
            record.addedNodes.forEach(function (node) {
                if (node.nodeType === 1) { pending.push(handle(node, describe(node))); }
            });
        });
    }

    window.__pagecut = {
        document: function () {
            return reply(null, function () { return handle(document, 'document'); });
        },
        contentRoot: function () {
            return reply(null, function () {
                return document.body ? handle(document.body, 'body') : handle(document, 'document');
            });
        },
        remove: function (id, selector) {
            return reply(selector, function () { return removeIn(lookup(id), selector); });
        },
        frames: function (id) {
            return reply(null, function () {
                return frameList(lookup(id)).map(function (f) {
                    if (f.doc) { return handle(f.doc, f.label); }
                    return { inaccessible: 'content document is not accessible (cross-origin or not loaded)', label: f.label };
                });
            });
        },
        shadowRoots: function (id) {
            return reply(null, function () {
                return shadowList(lookup(id)).map(function (s) { return handle(s.root, s.label); });
            });
        },
        observe: function (id) {
            return reply(null, function () {
                startObserving(lookup(id));
                return true;
            });
        },
        walkAndObserve: function (patterns) {
            return reply(null, function () {
                startObserving(document.body || document);
                const out = { scopes: [], skipped_frames: [], failed_scopes: 0 };
                walkScope(document, 'document', 0, 'document', patterns, out);
                return out;
            });
        },
        takeInserted: function () {
            return reply(null, function () {
                const batch = pending;
                pending = [];
                return batch;
            });
        },
        disconnect: function () {
            return reply(null, function () {
                if (observer) {
                    collect(observer.takeRecords());
                    observer.disconnect();
                    observer = null;
                }
                const batch = pending;
                pending = [];
                return batch;
            });
        }
    };
    return JSON.stringify({ ok: true });
})()"#;

/// Handle to a node registered in the page runtime
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageHandle {
    pub id: u64,
    pub label: String,
}

impl fmt::Display for PageHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum FrameReply {
    Open { id: u64, label: String },
    Blocked { inaccessible: String, label: String },
}

impl From<FrameReply> for FrameAccess<PageHandle> {
    fn from(reply: FrameReply) -> Self {
        match reply {
            FrameReply::Open { id, label } => FrameAccess::Accessible(PageHandle { id, label }),
            FrameReply::Blocked { inaccessible, label } => FrameAccess::Inaccessible {
                label,
                reason: inaccessible,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Ok {
        ok: T,
    },
    Err {
        error: String,
        kind: String,
        #[serde(default)]
        subject: Option<String>,
    },
}

/// Build `window.__pagecut.<method>(args...)` with JSON-encoded arguments.
pub(crate) fn call_expr(method: &str, args: &[serde_json::Value]) -> String {
    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
    format!("window.{}.{}({})", RUNTIME_GLOBAL, method, args.join(", "))
}

/// Decode a runtime reply into `T`, mapping in-page failures onto the crate
/// error taxonomy.
pub(crate) fn parse_reply<T: DeserializeOwned>(raw: &str) -> Result<T> {
    let reply: Reply<T> =
        serde_json::from_str(raw).map_err(|e| Error::Script(format!("Malformed runtime reply '{}': {}", raw, e)))?;
    match reply {
        Reply::Ok { ok } => Ok(ok),
        Reply::Err { error, kind, subject } => Err(match kind.as_str() {
            "selector" => Error::InvalidSelector {
                pattern: subject.unwrap_or_default(),
                reason: error,
            },
            "stale" => Error::Dom(error),
            _ => Error::Script(error),
        }),
    }
}
