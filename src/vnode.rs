//! VNode model.
//!
//! A vnode is a lightweight description of one tree node, used to compute
//! and apply DOM changes. The kind is a closed tagged union — mount and
//! patch dispatch over the explicit discriminant, never over runtime type
//! probing.
//!
//! # Handles
//!
//! A mounted vnode carries the DOM handle it realized. Diffing merges the
//! old vnode's live handles onto the new vnode in place; the old vnode is
//! then discarded. A vnode is never touched by two reconciliation passes at
//! once.
//!
//! # Children classification
//!
//! A sibling sequence is *keyed* when every item carries a key and
//! *non-keyed* otherwise — mixed key sets fall back to positional diffing,
//! never partial key matching. The `Unknown` hint defers classification to
//! a runtime scan; an explicit hint is trusted. Duplicate keys in one list
//! are a diagnostic (`tracing::warn!`), not an error.

use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use tracing::warn;

use crate::component::{ComponentDef, InstanceId};
use crate::dom::DomId;
use crate::foreign::ForeignNode;
use crate::props::{EventHandler, Props, PropsExt, Value};
use crate::refs::Ref;

// =============================================================================
// Key
// =============================================================================

/// Caller-supplied identity for keyed diffing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Int(i64),
    Str(CompactString),
}

impl From<i64> for Key {
    fn from(v: i64) -> Self {
        Key::Int(v)
    }
}

impl From<i32> for Key {
    fn from(v: i32) -> Self {
        Key::Int(v as i64)
    }
}

impl From<&str> for Key {
    fn from(v: &str) -> Self {
        Key::Str(v.into())
    }
}

impl From<String> for Key {
    fn from(v: String) -> Self {
        Key::Str(v.into())
    }
}

// =============================================================================
// Children
// =============================================================================

/// Declared shape of an ordered child sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildrenKind {
    /// Every child carries a key; diff by identity with move detection.
    Keyed,
    /// At least one child lacks a key; diff by position.
    NonKeyed,
    /// Not yet classified; scan before diffing.
    Unknown,
}

/// Child slot of an element or fragment.
#[derive(Debug, Default)]
pub enum Children {
    /// No children.
    #[default]
    None,
    /// Exactly one child.
    One(Box<VNode>),
    /// Ordered sequence with a classification tag.
    Many(SmallVec<[VNode; 4]>, ChildrenKind),
}

impl Children {
    /// Number of direct children.
    pub fn len(&self) -> usize {
        match self {
            Children::None => 0,
            Children::One(_) => 1,
            Children::Many(nodes, _) => nodes.len(),
        }
    }

    /// Check for absence of children.
    pub fn is_empty(&self) -> bool {
        matches!(self, Children::None) || self.len() == 0
    }

    /// Iterate over children.
    pub fn iter(&self) -> impl Iterator<Item = &VNode> {
        let (one, many): (Option<&VNode>, &[VNode]) = match self {
            Children::None => (None, &[]),
            Children::One(node) => (Some(&**node), &[]),
            Children::Many(nodes, _) => (None, nodes),
        };
        one.into_iter().chain(many.iter())
    }

    /// Mutable view of the children as a slice.
    pub(crate) fn as_mut_slice(&mut self) -> &mut [VNode] {
        match self {
            Children::None => &mut [],
            Children::One(node) => std::slice::from_mut(&mut **node),
            Children::Many(nodes, _) => nodes,
        }
    }

    /// Classification of a `Many` sequence, resolving and caching an
    /// `Unknown` hint; an explicit hint is trusted as-is.
    pub(crate) fn resolved_kind(&mut self) -> ChildrenKind {
        match self {
            Children::None | Children::One(_) => ChildrenKind::NonKeyed,
            Children::Many(nodes, kind) => {
                if *kind == ChildrenKind::Unknown {
                    *kind = classify(nodes);
                }
                *kind
            }
        }
    }

    fn detached_clone(&self) -> Children {
        match self {
            Children::None => Children::None,
            Children::One(node) => Children::One(Box::new(node.detached_clone())),
            Children::Many(nodes, kind) => Children::Many(
                nodes.iter().map(VNode::detached_clone).collect(),
                *kind,
            ),
        }
    }
}

/// Scan a sibling sequence: keyed only when every item has a key.
/// Duplicate and mixed key sets are diagnostics, not errors.
pub(crate) fn classify(nodes: &[VNode]) -> ChildrenKind {
    let keyed = nodes.iter().filter(|n| n.key.is_some()).count();
    if keyed == nodes.len() && !nodes.is_empty() {
        let mut seen: FxHashSet<&Key> = FxHashSet::default();
        for node in nodes {
            if let Some(key) = &node.key {
                if !seen.insert(key) {
                    warn!(?key, "duplicate key in sibling list; diff may remount");
                }
            }
        }
        ChildrenKind::Keyed
    } else {
        if keyed > 0 {
            warn!(
                keyed,
                total = nodes.len(),
                "mixed key set in sibling list; falling back to positional diff"
            );
        }
        ChildrenKind::NonKeyed
    }
}

// =============================================================================
// Kind payloads
// =============================================================================

/// Payload of an element vnode.
#[derive(Debug)]
pub struct ElementData {
    pub tag: CompactString,
    pub children: Children,
}

/// Payload of a fragment vnode.
#[derive(Debug)]
pub struct FragmentData {
    pub children: Children,
}

/// Payload of a component vnode.
#[derive(Debug)]
pub struct ComponentData {
    pub def: &'static ComponentDef,
    /// Filled by mount; `None` until then.
    pub instance: Option<InstanceId>,
}

/// Payload of a foreign vnode: an opaque subtree owned by another runtime.
pub struct ForeignData {
    pub node: Rc<dyn ForeignNode>,
    pub payload: Value,
}

impl std::fmt::Debug for ForeignData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForeignData")
            .field("payload", &self.payload)
            .finish_non_exhaustive()
    }
}

/// Closed union of vnode kinds.
#[derive(Debug)]
pub enum VNodeKind {
    Element(Box<ElementData>),
    Text(CompactString),
    Comment(CompactString),
    Fragment(Box<FragmentData>),
    Component(Box<ComponentData>),
    Foreign(Box<ForeignData>),
}

// =============================================================================
// VNode
// =============================================================================

/// One node of a virtual tree.
#[derive(Debug)]
pub struct VNode {
    /// Kind discriminant and per-kind payload.
    pub kind: VNodeKind,
    /// Optional identity for keyed diffing.
    pub key: Option<Key>,
    /// Prop list, event handlers included.
    pub props: Props,
    /// Ref resolved on attach, cleared on teardown.
    pub node_ref: Option<Ref>,
    /// Realized DOM handle; `None` until mounted. For fragments this is the
    /// trailing anchor, for components the inner tree's first node or the
    /// empty anchor.
    pub dom: Option<DomId>,
}

impl VNode {
    fn with_kind(kind: VNodeKind) -> Self {
        Self {
            kind,
            key: None,
            props: Props::new(),
            node_ref: None,
            dom: None,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Constructors
    // ─────────────────────────────────────────────────────────────────────────

    /// Element vnode with no children.
    pub fn element(tag: impl Into<CompactString>) -> Self {
        Self::with_kind(VNodeKind::Element(Box::new(ElementData {
            tag: tag.into(),
            children: Children::None,
        })))
    }

    /// Text vnode.
    pub fn text(content: impl Into<CompactString>) -> Self {
        Self::with_kind(VNodeKind::Text(content.into()))
    }

    /// Comment vnode.
    pub fn comment(content: impl Into<CompactString>) -> Self {
        Self::with_kind(VNodeKind::Comment(content.into()))
    }

    /// Fragment vnode over an unclassified child sequence.
    pub fn fragment(children: impl IntoIterator<Item = VNode>) -> Self {
        Self::with_kind(VNodeKind::Fragment(Box::new(FragmentData {
            children: collect_children(children, ChildrenKind::Unknown),
        })))
    }

    /// Component vnode for a static definition.
    pub fn component(def: &'static ComponentDef) -> Self {
        Self::with_kind(VNodeKind::Component(Box::new(ComponentData {
            def,
            instance: None,
        })))
    }

    /// Foreign vnode: opaque payload handled through the adapter's three
    /// operations.
    pub fn foreign(node: Rc<dyn ForeignNode>, payload: impl Into<Value>) -> Self {
        Self::with_kind(VNodeKind::Foreign(Box::new(ForeignData {
            node,
            payload: payload.into(),
        })))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Builder methods
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the diff key.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set one prop.
    pub fn prop(mut self, name: impl Into<CompactString>, value: impl Into<Value>) -> Self {
        self.props.set_prop(name, value);
        self
    }

    /// Attach an event handler prop.
    pub fn on(mut self, event: impl Into<CompactString>, handler: impl Fn(&Value) + 'static) -> Self {
        self.props
            .set_prop(event, Value::Handler(EventHandler::new(handler)));
        self
    }

    /// Attach a ref.
    pub fn with_ref(mut self, r: impl Into<Ref>) -> Self {
        self.node_ref = Some(r.into());
        self
    }

    /// Append one child (element and fragment vnodes only).
    pub fn child(mut self, node: VNode) -> Self {
        let slot = self.children_slot();
        *slot = match std::mem::take(slot) {
            Children::None => Children::One(Box::new(node)),
            Children::One(first) => {
                let mut nodes: SmallVec<[VNode; 4]> = SmallVec::new();
                nodes.push(*first);
                nodes.push(node);
                Children::Many(nodes, ChildrenKind::Unknown)
            }
            Children::Many(mut nodes, _) => {
                nodes.push(node);
                Children::Many(nodes, ChildrenKind::Unknown)
            }
        };
        self
    }

    /// Replace children with an unclassified sequence.
    pub fn children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        *self.children_slot() = collect_children(nodes, ChildrenKind::Unknown);
        self
    }

    /// Replace children with a sequence declared keyed. The hint is
    /// trusted; every child must carry a key.
    pub fn keyed_children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        *self.children_slot() = collect_children(nodes, ChildrenKind::Keyed);
        self
    }

    /// Replace children with a sequence declared non-keyed.
    pub fn non_keyed_children(mut self, nodes: impl IntoIterator<Item = VNode>) -> Self {
        *self.children_slot() = collect_children(nodes, ChildrenKind::NonKeyed);
        self
    }

    /// Shorthand for a single text child.
    pub fn text_child(self, content: impl Into<CompactString>) -> Self {
        self.child(VNode::text(content))
    }

    fn children_slot(&mut self) -> &mut Children {
        match &mut self.kind {
            VNodeKind::Element(el) => &mut el.children,
            VNodeKind::Fragment(frag) => &mut frag.children,
            other => panic!("children on {} vnode", kind_name(other)),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Inspection
    // ─────────────────────────────────────────────────────────────────────────

    /// Realized DOM handle, if mounted.
    #[inline]
    pub fn dom(&self) -> Option<DomId> {
        self.dom
    }

    /// Component instance id, if this is a mounted component vnode.
    pub fn instance(&self) -> Option<InstanceId> {
        match &self.kind {
            VNodeKind::Component(c) => c.instance,
            _ => None,
        }
    }

    /// Whether this vnode (or a component instance under it) is mounted.
    pub fn is_mounted(&self) -> bool {
        self.dom.is_some() || self.instance().is_some()
    }

    /// Kind name for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        kind_name(&self.kind)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Cloning
    // ─────────────────────────────────────────────────────────────────────────

    /// Structural clone with no mounted state: DOM handles and instance ids
    /// are dropped, props/refs/foreign payloads are shared by reference.
    /// Mount applies this automatically when it meets a vnode that is
    /// already mounted (the same value referenced from two tree positions).
    pub fn detached_clone(&self) -> VNode {
        let kind = match &self.kind {
            VNodeKind::Element(el) => VNodeKind::Element(Box::new(ElementData {
                tag: el.tag.clone(),
                children: el.children.detached_clone(),
            })),
            VNodeKind::Text(s) => VNodeKind::Text(s.clone()),
            VNodeKind::Comment(s) => VNodeKind::Comment(s.clone()),
            VNodeKind::Fragment(frag) => VNodeKind::Fragment(Box::new(FragmentData {
                children: frag.children.detached_clone(),
            })),
            VNodeKind::Component(c) => VNodeKind::Component(Box::new(ComponentData {
                def: c.def,
                instance: None,
            })),
            VNodeKind::Foreign(f) => VNodeKind::Foreign(Box::new(ForeignData {
                node: f.node.clone(),
                payload: f.payload.clone(),
            })),
        };
        VNode {
            kind,
            key: self.key.clone(),
            props: self.props.clone(),
            node_ref: self.node_ref.clone(),
            dom: None,
        }
    }
}

fn kind_name(kind: &VNodeKind) -> &'static str {
    match kind {
        VNodeKind::Element(_) => "element",
        VNodeKind::Text(_) => "text",
        VNodeKind::Comment(_) => "comment",
        VNodeKind::Fragment(_) => "fragment",
        VNodeKind::Component(_) => "component",
        VNodeKind::Foreign(_) => "foreign",
    }
}

fn collect_children(nodes: impl IntoIterator<Item = VNode>, kind: ChildrenKind) -> Children {
    let nodes: SmallVec<[VNode; 4]> = nodes.into_iter().collect();
    if nodes.is_empty() {
        Children::None
    } else {
        Children::Many(nodes, kind)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use static_assertions::const_assert;

    use super::*;

    const_assert!(std::mem::size_of::<Option<DomId>>() <= 8);

    #[test]
    fn test_element_builder() {
        let node = VNode::element("div")
            .prop("class", "box")
            .child(VNode::element("span"))
            .text_child("hi");

        let VNodeKind::Element(el) = &node.kind else {
            panic!("expected element");
        };
        assert_eq!(&*el.tag, "div");
        assert_eq!(el.children.len(), 2);
        assert_eq!(node.props.get_prop("class"), Some(&Value::Str("box".into())));
        assert!(node.dom().is_none());
    }

    #[test]
    fn test_classify_keyed() {
        let nodes: Vec<VNode> = (0..3).map(|i| VNode::element("li").key(i)).collect();
        assert_eq!(classify(&nodes), ChildrenKind::Keyed);
    }

    #[test]
    fn test_classify_mixed_falls_back() {
        let nodes = vec![
            VNode::element("li").key(0),
            VNode::element("li"),
            VNode::element("li").key(2),
        ];
        assert_eq!(classify(&nodes), ChildrenKind::NonKeyed);
    }

    #[test]
    fn test_classify_duplicates_stay_keyed() {
        let nodes = vec![
            VNode::element("li").key("a"),
            VNode::element("li").key("a"),
        ];
        // Diagnostic only; the list still diffs by key.
        assert_eq!(classify(&nodes), ChildrenKind::Keyed);
    }

    #[test]
    fn test_resolved_kind_caches() {
        let mut children = collect_children(
            (0..2).map(|i| VNode::element("li").key(i)),
            ChildrenKind::Unknown,
        );
        assert_eq!(children.resolved_kind(), ChildrenKind::Keyed);
        let Children::Many(_, kind) = &children else {
            panic!("expected Many");
        };
        assert_eq!(*kind, ChildrenKind::Keyed);
    }

    #[test]
    fn test_detached_clone_drops_handles() {
        let mut node = VNode::element("div").text_child("x");
        node.dom = Some(DomId::from_raw(9));

        let clone = node.detached_clone();
        assert!(clone.dom.is_none());
        let VNodeKind::Element(el) = &clone.kind else {
            panic!("expected element");
        };
        assert_eq!(el.children.len(), 1);
    }

    #[test]
    fn test_declared_hint_is_trusted() {
        let mut node = VNode::element("ul")
            .non_keyed_children((0..2).map(|i| VNode::element("li").key(i)));
        let VNodeKind::Element(el) = &mut node.kind else {
            panic!("expected element");
        };
        assert_eq!(el.children.resolved_kind(), ChildrenKind::NonKeyed);
    }
}
