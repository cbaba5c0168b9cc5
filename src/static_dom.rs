//! In-memory document backend built on `scraper`
//!
//! Applies exclusions to markup without a browser. Nested scopes follow the
//! browser model as closely as static HTML allows:
//!
//! - `<iframe srcdoc="...">` and blank frames are accessible nested documents,
//!   parsed on first access and cached per frame element;
//! - frames with any other `src` are reported as inaccessible, since nothing
//!   is fetched;
//! - `<template shadowrootmode="open|closed">` children form the shadow root of
//!   the template's parent element.
//!
//! Insertions are simulated with [`StaticDom::insert_html`], which feeds the
//! [`InsertionSource`] subscription the same way a mutation observer would.

use crate::dom::{DocumentTree, FrameAccess, InsertionSource};
use crate::selectors::ExclusionPattern;
use crate::{Error, Result};
use ego_tree::{NodeId, NodeRef, Tree};
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashMap;
use std::fmt;

/// Handle to a scope inside a [`StaticDom`]
#[derive(Debug, Clone, PartialEq)]
pub struct StaticScope {
    doc: usize,
    node: NodeId,
    label: String,
}

impl fmt::Display for StaticScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// A parsed document plus every frame document reached from it.
pub struct StaticDom {
    docs: Vec<Html>,
    frame_docs: HashMap<(usize, NodeId), usize>,
    watching: Option<(usize, NodeId)>,
    pending: Vec<StaticScope>,
}

impl StaticDom {
    pub fn parse(html: &str) -> Self {
        Self {
            docs: vec![Html::parse_document(html)],
            frame_docs: HashMap::new(),
            watching: None,
            pending: Vec::new(),
        }
    }

    /// Append `html` as children of `parent`. Returns a handle for each
    /// inserted element; these are also queued for an active subscription
    /// when `parent` lies inside the observed subtree.
    pub fn insert_html(&mut self, parent: &StaticScope, html: &str) -> Result<Vec<StaticScope>> {
        let fragment = Html::parse_fragment(html);
        let doc = self.doc_mut(parent.doc)?;

        let mut inserted = Vec::new();
        for child in fragment.root_element().children() {
            let id = graft(&mut doc.tree, parent.node, child)
                .ok_or_else(|| Error::Dom(format!("{} is not part of the document", parent)))?;
            if let Some(el) = child.value().as_element() {
                inserted.push(StaticScope {
                    doc: parent.doc,
                    node: id,
                    label: describe(el),
                });
            }
        }

        if let Some((doc_idx, target)) = self.watching {
            if doc_idx == parent.doc && self.is_within(parent.doc, parent.node, target) {
                self.pending.extend(inserted.iter().cloned());
            }
        }
        Ok(inserted)
    }

    /// First element in the top-level document matching `css`
    pub fn query_scope(&self, css: &str) -> Result<StaticScope> {
        let selector = parse_selector(css)?;
        let doc = &self.docs[0];
        doc.tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .find(|el| selector.matches(el))
            .map(|el| StaticScope {
                doc: 0,
                node: el.id(),
                label: describe(el.value()),
            })
            .ok_or_else(|| Error::Dom(format!("no element matches '{}'", css)))
    }

    /// Elements matching `css` across every reachable scope: the document,
    /// accessible frames and shadow roots.
    pub fn count_matching(&mut self, css: &str) -> Result<usize> {
        let selector = parse_selector(css)?;
        let mut stack = vec![self.document()?];
        let mut total = 0;

        while let Some(scope) = stack.pop() {
            total += self.matches_in(&scope, &selector)?.len();
            for frame in self.frames(&scope)? {
                if let FrameAccess::Accessible(inner) = frame {
                    stack.push(inner);
                }
            }
            stack.extend(self.shadow_roots(&scope)?);
        }
        Ok(total)
    }

    /// Text of the top-level document, shadow content included
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in self.docs[0].tree.root().descendants() {
            if let Some(text) = node.value().as_text() {
                out.push_str(text);
            }
        }
        out
    }

    /// Serialized markup of the top-level document
    pub fn html(&self) -> String {
        self.docs[0].root_element().html()
    }

    fn doc(&self, idx: usize) -> Result<&Html> {
        self.docs
            .get(idx)
            .ok_or_else(|| Error::Dom(format!("unknown document {}", idx)))
    }

    fn doc_mut(&mut self, idx: usize) -> Result<&mut Html> {
        self.docs
            .get_mut(idx)
            .ok_or_else(|| Error::Dom(format!("unknown document {}", idx)))
    }

    fn is_within(&self, doc: usize, node: NodeId, target: NodeId) -> bool {
        if node == target {
            return true;
        }
        match self.docs[doc].tree.get(node) {
            Some(n) => n.ancestors().any(|a| a.id() == target),
            None => false,
        }
    }

    fn matches_in(&self, scope: &StaticScope, selector: &Selector) -> Result<Vec<NodeId>> {
        let tree = &self.doc(scope.doc)?.tree;
        Ok(elements_in(tree, scope.node)
            .into_iter()
            .filter(|id| {
                tree.get(*id)
                    .and_then(ElementRef::wrap)
                    .map_or(false, |el| selector.matches(&el))
            })
            .collect())
    }

    fn frame_document(&mut self, key: (usize, NodeId), markup: &str) -> usize {
        if let Some(idx) = self.frame_docs.get(&key) {
            return *idx;
        }
        self.docs.push(Html::parse_document(markup));
        let idx = self.docs.len() - 1;
        self.frame_docs.insert(key, idx);
        idx
    }
}

impl DocumentTree for StaticDom {
    type Scope = StaticScope;

    fn document(&mut self) -> Result<StaticScope> {
        Ok(StaticScope {
            doc: 0,
            node: self.docs[0].tree.root().id(),
            label: "document".to_string(),
        })
    }

    fn remove_matching(&mut self, scope: &StaticScope, pattern: &ExclusionPattern) -> Result<usize> {
        let selector = parse_selector(pattern.as_str())?;
        let hits = self.matches_in(scope, &selector)?;
        let tree = &mut self.doc_mut(scope.doc)?.tree;
        for id in &hits {
            if let Some(mut node) = tree.get_mut(*id) {
                node.detach();
            }
        }
        Ok(hits.len())
    }

    fn frames(&mut self, scope: &StaticScope) -> Result<Vec<FrameAccess<StaticScope>>> {
        // Collect attributes first; parsing frame documents needs `&mut self`.
        let found: Vec<(NodeId, String, Option<String>, Option<String>)> = {
            let tree = &self.doc(scope.doc)?.tree;
            elements_in(tree, scope.node)
                .into_iter()
                .filter_map(|id| {
                    let node = tree.get(id)?;
                    let el = node.value().as_element()?;
                    if el.name() != "iframe" && el.name() != "frame" {
                        return None;
                    }
                    let label = match el.attr("src") {
                        Some(src) => format!("{}[src={}]", describe(el), src),
                        None => describe(el),
                    };
                    Some((id, label, el.attr("srcdoc").map(str::to_string), el.attr("src").map(str::to_string)))
                })
                .collect()
        };

        let mut out = Vec::with_capacity(found.len());
        for (id, label, srcdoc, src) in found {
            let markup = match (srcdoc, src.as_deref().map(str::trim)) {
                (Some(srcdoc), _) => srcdoc,
                (None, None | Some("") | Some("about:blank")) => String::new(),
                (None, Some(src)) => {
                    out.push(FrameAccess::Inaccessible {
                        reason: format!("external source '{}' is not loaded in a static document", src),
                        label,
                    });
                    continue;
                }
            };
            let idx = self.frame_document((scope.doc, id), &markup);
            out.push(FrameAccess::Accessible(StaticScope {
                doc: idx,
                node: self.docs[idx].tree.root().id(),
                label,
            }));
        }
        Ok(out)
    }

    fn shadow_roots(&mut self, scope: &StaticScope) -> Result<Vec<StaticScope>> {
        let tree = &self.doc(scope.doc)?.tree;
        let mut out = Vec::new();
        for id in elements_in(tree, scope.node) {
            let Some(host) = tree.get(id) else { continue };
            if let Some(root) = host.children().find(|c| is_shadow_template(*c)) {
                let label = match host.value().as_element() {
                    Some(el) => format!("#shadow-root({})", describe(el)),
                    None => "#shadow-root".to_string(),
                };
                out.push(StaticScope {
                    doc: scope.doc,
                    node: root.id(),
                    label,
                });
            }
        }
        Ok(out)
    }
}

impl InsertionSource for StaticDom {
    fn content_root(&mut self) -> Result<StaticScope> {
        let body = self.docs[0]
            .tree
            .root()
            .descendants()
            .find(|n| n.value().as_element().map_or(false, |el| el.name() == "body"))
            .map(|n| n.id());
        match body {
            Some(node) => Ok(StaticScope {
                doc: 0,
                node,
                label: "body".to_string(),
            }),
            None => self.document(),
        }
    }

    fn observe(&mut self, target: &StaticScope) -> Result<()> {
        self.watching = Some((target.doc, target.node));
        self.pending.clear();
        Ok(())
    }

    fn take_inserted(&mut self) -> Result<Vec<StaticScope>> {
        Ok(std::mem::take(&mut self.pending))
    }

    fn disconnect(&mut self) -> Result<Vec<StaticScope>> {
        self.watching = None;
        Ok(std::mem::take(&mut self.pending))
    }
}

fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::InvalidSelector {
        pattern: css.to_string(),
        reason: format!("{:?}", e),
    })
}

fn is_shadow_template(node: NodeRef<'_, Node>) -> bool {
    node.value().as_element().map_or(false, |el| {
        el.name() == "template" && (el.attr("shadowrootmode").is_some() || el.attr("shadowroot").is_some())
    })
}

/// Element ids inside one scope in document order. The root is included when
/// it is an element; shadow templates and inert template content are not
/// descended into, except when the root itself is the shadow template.
fn elements_in(tree: &Tree<Node>, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let Some(root_ref) = tree.get(root) else {
        return out;
    };

    let root_is_shadow = is_shadow_template(root_ref);
    if root_ref.value().is_element() && !root_is_shadow {
        out.push(root);
    }
    let root_is_inert = !root_is_shadow
        && root_ref
            .value()
            .as_element()
            .map_or(false, |el| el.name() == "template");
    if root_is_inert {
        return out;
    }

    let mut stack: Vec<NodeRef<'_, Node>> = root_ref.children().collect();
    stack.reverse();
    while let Some(node) = stack.pop() {
        if let Some(el) = node.value().as_element() {
            if el.name() == "template" {
                if !is_shadow_template(node) {
                    out.push(node.id());
                }
                continue;
            }
            out.push(node.id());
        }
        let mut kids: Vec<NodeRef<'_, Node>> = node.children().collect();
        kids.reverse();
        stack.extend(kids);
    }
    out
}

fn graft(tree: &mut Tree<Node>, parent: NodeId, src: NodeRef<'_, Node>) -> Option<NodeId> {
    let id = tree.get_mut(parent)?.append(src.value().clone()).id();
    for child in src.children() {
        graft(tree, id, child)?;
    }
    Some(id)
}

fn describe(el: &scraper::node::Element) -> String {
    let mut label = el.name().to_string();
    if let Some(id) = el.id() {
        label.push('#');
        label.push_str(id);
    }
    for class in el.classes() {
        label.push('.');
        label.push_str(class);
    }
    label
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selectors::ExclusionSet;
    use crate::walker;

    #[test]
    fn srcdoc_frames_are_nested_documents() {
        let mut dom = StaticDom::parse(
            r#"<body><div class="ad">A</div><iframe srcdoc="<div class='ad'>B</div>"></iframe></body>"#,
        );
        assert_eq!(dom.count_matching(".ad").unwrap(), 2);

        let outcome = walker::walk(&mut dom, &ExclusionSet::parse(".ad")).unwrap();
        assert_eq!(outcome.counts_for(".ad"), vec![1, 1]);
        assert_eq!(dom.count_matching(".ad").unwrap(), 0);
    }

    #[test]
    fn external_frames_are_inaccessible() {
        let mut dom = StaticDom::parse(r#"<body><iframe src="https://elsewhere.example/ad"></iframe></body>"#);
        let root = dom.document().unwrap();
        let frames = dom.frames(&root).unwrap();
        assert!(matches!(&frames[0], FrameAccess::Inaccessible { label, .. } if label.contains("elsewhere")));
    }

    #[test]
    fn frame_documents_are_parsed_once() {
        let mut dom = StaticDom::parse(r#"<body><iframe srcdoc="<p>x</p>"></iframe></body>"#);
        let root = dom.document().unwrap();
        let first = dom.frames(&root).unwrap();
        let second = dom.frames(&root).unwrap();
        assert_eq!(first, second);
        assert_eq!(dom.docs.len(), 2);
    }

    #[test]
    fn shadow_content_is_its_own_scope() {
        let mut dom = StaticDom::parse(
            r#"<body><x-host id="h"><template shadowrootmode="open"><b class="ad">shadowed</b></template></x-host></body>"#,
        );
        let root = dom.document().unwrap();
        let set = ExclusionSet::parse(".ad");
        let pattern = set.iter().next().unwrap().clone();

        assert_eq!(dom.remove_matching(&root, &pattern).unwrap(), 0);
        let shadows = dom.shadow_roots(&root).unwrap();
        assert_eq!(shadows.len(), 1);
        assert_eq!(shadows[0].to_string(), "#shadow-root(x-host#h)");
        assert_eq!(dom.remove_matching(&shadows[0], &pattern).unwrap(), 1);
        assert!(!dom.text().contains("shadowed"));
    }

    #[test]
    fn invalid_selectors_are_reported() {
        let mut dom = StaticDom::parse("<body></body>");
        let root = dom.document().unwrap();
        let set = ExclusionSet::parse("div[");
        let err = dom.remove_matching(&root, set.iter().next().unwrap()).unwrap_err();
        assert!(matches!(err, Error::InvalidSelector { .. }));
    }

    #[test]
    fn inserted_root_element_is_a_candidate() {
        let mut dom = StaticDom::parse("<body></body>");
        let body = dom.content_root().unwrap();
        let inserted = dom.insert_html(&body, r#"<div class="ad">x</div>"#).unwrap();
        let set = ExclusionSet::parse(".ad");
        let removed = dom.remove_matching(&inserted[0], set.iter().next().unwrap()).unwrap();
        assert_eq!(removed, 1);
        assert!(!dom.html().contains("class=\"ad\""));
    }
}
