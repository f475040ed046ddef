//! Live DOM store.
//!
//! A retained arena of element/text/comment records standing in for a host
//! document. The reconciliation walks are its only writers; everything else
//! observes through read accessors, ref targets, or [`crate::html`]
//! snapshots.
//!
//! # Identity
//!
//! Nodes are addressed by [`DomId`], an index into the arena. Slots are
//! never reused: a removed node's id stays dead forever, so a stale handle
//! is detectable instead of silently aliasing a newer node.
//!
//! # Instrumentation
//!
//! Every mutating op bumps a [`MutationStats`] counter. The patch
//! algorithm's observable contracts (skip unchanged text writes, one
//! physical move per relocated keyed node, exact removals) are asserted
//! against these counters in tests.

use std::fmt;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::error::{VdomError, VdomResult};
use crate::props::{EventHandler, Value};

// =============================================================================
// DomId
// =============================================================================

/// Handle to a node in the DOM store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct DomId(pub(crate) u32);

impl DomId {
    /// Create a handle from a raw index. Intended for tests and adapters
    /// that persist handles; prefer the ids returned by `create_*`.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw index value.
    #[inline]
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Node records
// =============================================================================

/// Payload of a live node.
#[derive(Debug)]
pub enum DomKind {
    Element {
        tag: CompactString,
        attrs: Vec<(CompactString, CompactString)>,
        children: Vec<DomId>,
        handlers: FxHashMap<CompactString, EventHandler>,
    },
    Text(CompactString),
    Comment(CompactString),
}

#[derive(Debug)]
struct DomNode {
    kind: DomKind,
    parent: Option<DomId>,
}

// =============================================================================
// MutationStats
// =============================================================================

/// Counters over the DOM write path.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MutationStats {
    /// Nodes created (not yet attached).
    pub nodes_created: usize,
    /// First-time attachments of a detached node.
    pub inserts: usize,
    /// Relocations of an already-attached node.
    pub moves: usize,
    /// Subtree removals (counted once per removed root).
    pub removals: usize,
    /// Text/comment content writes.
    pub text_writes: usize,
    /// Attribute sets and removals.
    pub attr_writes: usize,
    /// Handler table sets and removals.
    pub handler_writes: usize,
}

impl MutationStats {
    /// Total number of mutations of any kind.
    pub fn mutations(&self) -> usize {
        self.nodes_created
            + self.inserts
            + self.moves
            + self.removals
            + self.text_writes
            + self.attr_writes
            + self.handler_writes
    }

    /// Check that nothing was written.
    pub fn is_quiet(&self) -> bool {
        self.mutations() == 0
    }
}

// =============================================================================
// Dom
// =============================================================================

/// The arena of live nodes.
#[derive(Debug, Default)]
pub struct Dom {
    slots: Vec<Option<DomNode>>,
    stats: MutationStats,
}

impl Dom {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Creation
    // ─────────────────────────────────────────────────────────────────────────

    fn alloc(&mut self, kind: DomKind) -> DomId {
        let id = DomId(self.slots.len() as u32);
        self.slots.push(Some(DomNode { kind, parent: None }));
        self.stats.nodes_created += 1;
        id
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: impl Into<CompactString>) -> DomId {
        self.alloc(DomKind::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
            handlers: FxHashMap::default(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, content: impl Into<CompactString>) -> DomId {
        self.alloc(DomKind::Text(content.into()))
    }

    /// Create a detached comment node.
    pub fn create_comment(&mut self, content: impl Into<CompactString>) -> DomId {
        self.alloc(DomKind::Comment(content.into()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Access
    // ─────────────────────────────────────────────────────────────────────────

    fn node(&self, id: DomId) -> VdomResult<&DomNode> {
        self.slots
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(VdomError::DeadHandle(id))
    }

    fn node_mut(&mut self, id: DomId) -> VdomResult<&mut DomNode> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(VdomError::DeadHandle(id))
    }

    /// Check whether a handle points at a live node.
    pub fn is_live(&self, id: DomId) -> bool {
        matches!(self.slots.get(id.0 as usize), Some(Some(_)))
    }

    /// Check whether a handle points at a live element.
    pub fn is_element(&self, id: DomId) -> bool {
        matches!(
            self.slots.get(id.0 as usize),
            Some(Some(DomNode {
                kind: DomKind::Element { .. },
                ..
            }))
        )
    }

    /// Node payload.
    pub fn kind(&self, id: DomId) -> VdomResult<&DomKind> {
        Ok(&self.node(id)?.kind)
    }

    /// Element tag name.
    pub fn tag(&self, id: DomId) -> Option<&str> {
        match &self.node(id).ok()?.kind {
            DomKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    /// Text or comment content.
    pub fn text(&self, id: DomId) -> Option<&str> {
        match &self.node(id).ok()?.kind {
            DomKind::Text(s) | DomKind::Comment(s) => Some(s),
            _ => None,
        }
    }

    /// Attribute value on an element.
    pub fn attr(&self, id: DomId, name: &str) -> Option<&str> {
        match &self.node(id).ok()?.kind {
            DomKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    /// Child list of an element (empty for other kinds).
    pub fn children(&self, id: DomId) -> &[DomId] {
        match self.node(id).ok().map(|n| &n.kind) {
            Some(DomKind::Element { children, .. }) => children,
            _ => &[],
        }
    }

    /// Parent handle.
    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.node(id).ok()?.parent
    }

    /// The sibling immediately after `id` under its parent.
    pub fn next_sibling(&self, id: DomId) -> Option<DomId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        siblings.get(pos + 1).copied()
    }

    /// Mutation counters since the last reset.
    pub fn stats(&self) -> &MutationStats {
        &self.stats
    }

    /// Zero the mutation counters.
    pub fn reset_stats(&mut self) {
        self.stats = MutationStats::default();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mutation
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert `node` under `parent`, before `anchor` (append when `anchor`
    /// is `None`). A node that is already attached somewhere is detached
    /// first; that counts as a move, a first attach counts as an insert.
    pub fn insert_before(
        &mut self,
        parent: DomId,
        node: DomId,
        anchor: Option<DomId>,
    ) -> VdomResult<()> {
        if !self.is_element(parent) {
            return Err(VdomError::InvalidTarget(parent));
        }
        if !self.is_live(node) {
            return Err(VdomError::DeadHandle(node));
        }

        let was_attached = self.node(node)?.parent.is_some();
        if was_attached {
            self.detach(node)?;
        }

        let DomKind::Element { children, .. } = &mut self.node_mut(parent)?.kind else {
            return Err(VdomError::InvalidTarget(parent));
        };
        match anchor {
            Some(a) => {
                let pos = children
                    .iter()
                    .position(|&c| c == a)
                    .ok_or(VdomError::DeadHandle(a))?;
                children.insert(pos, node);
            }
            None => children.push(node),
        }
        self.node_mut(node)?.parent = Some(parent);

        if was_attached {
            self.stats.moves += 1;
        } else {
            self.stats.inserts += 1;
        }
        Ok(())
    }

    fn detach(&mut self, node: DomId) -> VdomResult<()> {
        let parent = self.node(node)?.parent;
        if let Some(p) = parent {
            if let DomKind::Element { children, .. } = &mut self.node_mut(p)?.kind {
                children.retain(|&c| c != node);
            }
            self.node_mut(node)?.parent = None;
        }
        Ok(())
    }

    /// Remove a subtree, freeing every node in it. The root's id and all
    /// descendant ids become dead.
    pub fn remove(&mut self, node: DomId) -> VdomResult<()> {
        self.detach(node)?;
        self.free_subtree(node);
        self.stats.removals += 1;
        Ok(())
    }

    fn free_subtree(&mut self, node: DomId) {
        let children = match self.slots.get(node.0 as usize).and_then(Option::as_ref) {
            Some(DomNode {
                kind: DomKind::Element { children, .. },
                ..
            }) => children.clone(),
            _ => Vec::new(),
        };
        for child in children {
            self.free_subtree(child);
        }
        self.slots[node.0 as usize] = None;
    }

    /// Overwrite the content of a text or comment node.
    pub fn set_text(&mut self, node: DomId, content: impl Into<CompactString>) -> VdomResult<()> {
        match &mut self.node_mut(node)?.kind {
            DomKind::Text(s) | DomKind::Comment(s) => {
                *s = content.into();
                self.stats.text_writes += 1;
                Ok(())
            }
            DomKind::Element { .. } => Err(VdomError::InvalidTarget(node)),
        }
    }

    /// Set an attribute on an element.
    pub fn set_attr(
        &mut self,
        node: DomId,
        name: impl Into<CompactString>,
        value: impl Into<CompactString>,
    ) -> VdomResult<()> {
        let DomKind::Element { attrs, .. } = &mut self.node_mut(node)?.kind else {
            return Err(VdomError::InvalidTarget(node));
        };
        let name = name.into();
        let value = value.into();
        if let Some(pair) = attrs.iter_mut().find(|(k, _)| *k == name) {
            pair.1 = value;
        } else {
            attrs.push((name, value));
        }
        self.stats.attr_writes += 1;
        Ok(())
    }

    /// Remove an attribute; a no-op (and no counted write) when absent.
    pub fn remove_attr(&mut self, node: DomId, name: &str) -> VdomResult<()> {
        let DomKind::Element { attrs, .. } = &mut self.node_mut(node)?.kind else {
            return Err(VdomError::InvalidTarget(node));
        };
        if let Some(pos) = attrs.iter().position(|(k, _)| k == name) {
            attrs.remove(pos);
            self.stats.attr_writes += 1;
        }
        Ok(())
    }

    /// Replace an element's handler for a named event.
    pub fn set_handler(
        &mut self,
        node: DomId,
        event: impl Into<CompactString>,
        handler: EventHandler,
    ) -> VdomResult<()> {
        let DomKind::Element { handlers, .. } = &mut self.node_mut(node)?.kind else {
            return Err(VdomError::InvalidTarget(node));
        };
        handlers.insert(event.into(), handler);
        self.stats.handler_writes += 1;
        Ok(())
    }

    /// Remove an element's handler; a no-op when absent.
    pub fn remove_handler(&mut self, node: DomId, event: &str) -> VdomResult<()> {
        let DomKind::Element { handlers, .. } = &mut self.node_mut(node)?.kind else {
            return Err(VdomError::InvalidTarget(node));
        };
        if handlers.remove(event).is_some() {
            self.stats.handler_writes += 1;
        }
        Ok(())
    }

    /// Fire the element's handler for `event`, if one is attached.
    /// Returns whether a handler ran.
    pub fn dispatch(&self, node: DomId, event: &str, payload: &Value) -> bool {
        let Ok(DomKind::Element { handlers, .. }) = self.kind(node) else {
            return false;
        };
        match handlers.get(event) {
            Some(h) => {
                let h = h.clone();
                h.call(payload);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_create_and_attach() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let child = dom.create_text("hi");

        dom.insert_before(root, child, None).unwrap();
        assert_eq!(dom.children(root), &[child]);
        assert_eq!(dom.parent(child), Some(root));
        assert_eq!(dom.stats().inserts, 1);
        assert_eq!(dom.stats().nodes_created, 2);
    }

    #[test]
    fn test_insert_before_anchor() {
        let mut dom = Dom::new();
        let root = dom.create_element("ul");
        let a = dom.create_element("li");
        let b = dom.create_element("li");
        let c = dom.create_element("li");
        dom.insert_before(root, a, None).unwrap();
        dom.insert_before(root, c, None).unwrap();
        dom.insert_before(root, b, Some(c)).unwrap();

        assert_eq!(dom.children(root), &[a, b, c]);
        assert_eq!(dom.next_sibling(a), Some(b));
        assert_eq!(dom.next_sibling(c), None);
    }

    #[test]
    fn test_reattach_counts_as_move() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let a = dom.create_element("span");
        let b = dom.create_element("span");
        dom.insert_before(root, a, None).unwrap();
        dom.insert_before(root, b, None).unwrap();
        dom.reset_stats();

        dom.insert_before(root, b, Some(a)).unwrap();
        assert_eq!(dom.children(root), &[b, a]);
        assert_eq!(dom.stats().moves, 1);
        assert_eq!(dom.stats().inserts, 0);
    }

    #[test]
    fn test_remove_kills_subtree() {
        let mut dom = Dom::new();
        let root = dom.create_element("div");
        let mid = dom.create_element("p");
        let leaf = dom.create_text("x");
        dom.insert_before(root, mid, None).unwrap();
        dom.insert_before(mid, leaf, None).unwrap();

        dom.remove(mid).unwrap();
        assert!(!dom.is_live(mid));
        assert!(!dom.is_live(leaf));
        assert!(dom.children(root).is_empty());
        assert_eq!(dom.stats().removals, 1);

        assert!(matches!(
            dom.set_text(leaf, "y"),
            Err(VdomError::DeadHandle(_))
        ));
    }

    #[test]
    fn test_attr_roundtrip() {
        let mut dom = Dom::new();
        let el = dom.create_element("a");
        dom.set_attr(el, "href", "/about").unwrap();
        assert_eq!(dom.attr(el, "href"), Some("/about"));

        dom.remove_attr(el, "href").unwrap();
        assert_eq!(dom.attr(el, "href"), None);
        assert_eq!(dom.stats().attr_writes, 2);

        // Removing an absent attribute is not a write.
        dom.remove_attr(el, "href").unwrap();
        assert_eq!(dom.stats().attr_writes, 2);
    }

    #[test]
    fn test_dispatch_runs_handler() {
        let mut dom = Dom::new();
        let el = dom.create_element("button");
        let hits = Rc::new(Cell::new(0));
        let hits2 = hits.clone();
        dom.set_handler(el, "click", EventHandler::new(move |_| hits2.set(hits2.get() + 1)))
            .unwrap();

        assert!(dom.dispatch(el, "click", &Value::Null));
        assert!(!dom.dispatch(el, "hover", &Value::Null));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_invalid_target() {
        let mut dom = Dom::new();
        let t = dom.create_text("x");
        let el = dom.create_element("div");
        assert!(matches!(
            dom.insert_before(t, el, None),
            Err(VdomError::InvalidTarget(_))
        ));
    }
}
