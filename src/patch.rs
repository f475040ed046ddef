//! Patch: reconcile an old vnode tree against a new one.
//!
//! Computes minimal DOM mutations for two trees occupying the same slot.
//! This is a pure walk over the two trees plus the DOM store; the old
//! vnode's live handles are merged onto the new vnode in place and the old
//! tree is discarded by the caller.
//!
//! # Strategy
//!
//! 1. Incompatible shapes (kind, tag, definition, or key differ): unmount
//!    the old subtree bottom-up, mount the new one at the same position.
//!    No DOM reuse across shapes.
//! 2. Matching elements: diff props key-by-key, then diff children by their
//!    declared classification — keyed lists get prefix/suffix skimming plus
//!    an LIS-driven middle that relocates only the nodes off the longest
//!    increasing subsequence; non-keyed lists pair by index.
//! 3. Matching components: merge props onto the instance and run the update
//!    transition through the lifecycle coordinator.
//! 4. Text/comment: write content only when it actually changed. The
//!    skipped write is an observable contract, checked through
//!    [`MutationStats`](crate::dom::MutationStats).

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::component::{ComponentDef, Hook, InstanceId, Lifecycle};
use crate::dom::{Dom, DomId};
use crate::error::{VdomError, VdomResult};
use crate::lis::longest_increasing_subsequence;
use crate::mount::{mount, mount_children, resolve_ref};
use crate::props::{props_equal, Props, PropsExt, Value};
use crate::queue::MountedQueue;
use crate::refs::RefTarget;
use crate::runtime::Runtime;
use crate::vnode::{Children, ChildrenKind, Key, VNode, VNodeKind};

// =============================================================================
// Entry
// =============================================================================

/// Patch `old` against `new` in the slot under `parent`.
pub(crate) fn patch(
    rt: &mut Runtime,
    old: &mut VNode,
    new: &mut VNode,
    parent: DomId,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    if !same_shape(old, new) {
        return replace(rt, old, new, parent, senior, queue);
    }

    if matches!(old.kind, VNodeKind::Component(_)) {
        patch_component(rt, old, new, parent, senior, queue)?;
        sync_ref(old, new);
        return Ok(());
    }

    let dom_id = old.dom.ok_or(VdomError::NotMounted)?;
    new.dom = Some(dom_id);

    match (&mut old.kind, &mut new.kind) {
        (VNodeKind::Text(a), VNodeKind::Text(b))
        | (VNodeKind::Comment(a), VNodeKind::Comment(b)) => {
            if a != b {
                rt.dom_mut().set_text(dom_id, b.clone())?;
            }
        }
        (VNodeKind::Element(a), VNodeKind::Element(b)) => {
            patch_props(rt.dom_mut(), dom_id, &old.props, &new.props)?;
            let old_kind = a.children.resolved_kind();
            let new_kind = b.children.resolved_kind();
            patch_children(
                rt,
                &mut a.children,
                &mut b.children,
                old_kind,
                new_kind,
                dom_id,
                None,
                senior,
                queue,
            )?;
        }
        (VNodeKind::Fragment(a), VNodeKind::Fragment(b)) => {
            // Fragment children live directly under `parent`, before the
            // fragment's trailing anchor.
            let old_kind = a.children.resolved_kind();
            let new_kind = b.children.resolved_kind();
            patch_children(
                rt,
                &mut a.children,
                &mut b.children,
                old_kind,
                new_kind,
                parent,
                Some(dom_id),
                senior,
                queue,
            )?;
        }
        (VNodeKind::Foreign(a), VNodeKind::Foreign(b)) => {
            let adapter = a.node.clone();
            let cross_senior = if adapter.transparent() { senior } else { None };
            adapter.patch(rt, &a.payload, &b.payload, dom_id, cross_senior)?;
        }
        _ => unreachable!("same_shape admitted mismatched kinds"),
    }

    sync_ref(old, new);
    Ok(())
}

/// Compatibility of two vnodes for in-place patching.
fn same_shape(old: &VNode, new: &VNode) -> bool {
    if old.key != new.key {
        return false;
    }
    match (&old.kind, &new.kind) {
        (VNodeKind::Element(a), VNodeKind::Element(b)) => a.tag == b.tag,
        (VNodeKind::Text(_), VNodeKind::Text(_))
        | (VNodeKind::Comment(_), VNodeKind::Comment(_))
        | (VNodeKind::Fragment(_), VNodeKind::Fragment(_)) => true,
        (VNodeKind::Component(a), VNodeKind::Component(b)) => ComponentDef::same(a.def, b.def),
        (VNodeKind::Foreign(a), VNodeKind::Foreign(b)) => std::rc::Rc::ptr_eq(&a.node, &b.node),
        _ => false,
    }
}

/// Unmount the old subtree and mount the new one at the same position.
fn replace(
    rt: &mut Runtime,
    old: &mut VNode,
    new: &mut VNode,
    parent: DomId,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let anchor = next_anchor_after(rt, old);
    remove_vnode(rt, old, queue)?;
    mount(rt, new, parent, anchor, senior, queue)
}

/// Carry the ref over: clear the old one, deliver the new one, skipping the
/// write when both slots hold the same ref.
fn sync_ref(old: &VNode, new: &VNode) {
    let target = new
        .instance()
        .map(RefTarget::Component)
        .or(new.dom.map(RefTarget::Dom));
    match (&old.node_ref, &new.node_ref) {
        (Some(o), Some(n)) if o.same(n) => {}
        (o, n) => {
            if let Some(o) = o {
                o.set(None);
            }
            if let Some(n) = n {
                n.set(target);
            }
        }
    }
}

// =============================================================================
// Props
// =============================================================================

/// Set/remove only changed keys. Handler values are swapped by reference.
fn patch_props(dom: &mut Dom, el: DomId, old: &Props, new: &Props) -> VdomResult<()> {
    for (name, value) in new {
        let prev = old.get_prop(name);
        if prev != Some(value) {
            write_prop(dom, el, name, prev, value)?;
        }
    }
    for (name, value) in old {
        if !new.has_prop(name) {
            clear_prop(dom, el, name, value)?;
        }
    }
    Ok(())
}

fn write_prop(
    dom: &mut Dom,
    el: DomId,
    name: &str,
    old: Option<&Value>,
    new: &Value,
) -> VdomResult<()> {
    if matches!(old, Some(Value::Handler(_))) && !new.is_handler() {
        dom.remove_handler(el, name)?;
    }
    match new {
        Value::Handler(h) => {
            if old.is_some_and(|v| v.to_attr().is_some()) {
                dom.remove_attr(el, name)?;
            }
            dom.set_handler(el, name, h.clone())?;
        }
        other => match other.to_attr() {
            Some(text) => dom.set_attr(el, name, text)?,
            None => dom.remove_attr(el, name)?,
        },
    }
    Ok(())
}

fn clear_prop(dom: &mut Dom, el: DomId, name: &str, old: &Value) -> VdomResult<()> {
    if old.is_handler() {
        dom.remove_handler(el, name)
    } else {
        dom.remove_attr(el, name)
    }
}

// =============================================================================
// Children
// =============================================================================

#[allow(clippy::too_many_arguments)]
fn patch_children(
    rt: &mut Runtime,
    old: &mut Children,
    new: &mut Children,
    old_kind: ChildrenKind,
    new_kind: ChildrenKind,
    parent: DomId,
    tail_anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    match (old.is_empty(), new.is_empty()) {
        (true, true) => Ok(()),
        (true, false) => mount_children(rt, new, parent, tail_anchor, senior, queue),
        (false, true) => {
            for child in old.as_mut_slice() {
                remove_vnode(rt, child, queue)?;
            }
            Ok(())
        }
        (false, false) => {
            let a = old.as_mut_slice();
            let b = new.as_mut_slice();
            if old_kind == ChildrenKind::Keyed && new_kind == ChildrenKind::Keyed {
                patch_keyed(rt, a, b, parent, tail_anchor, senior, queue)
            } else {
                patch_non_keyed(rt, a, b, parent, tail_anchor, senior, queue)
            }
        }
    }
}

/// Positional diff: pair by index, mount the new surplus, unmount the old.
fn patch_non_keyed(
    rt: &mut Runtime,
    a: &mut [VNode],
    b: &mut [VNode],
    parent: DomId,
    tail_anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let common = a.len().min(b.len());
    for i in 0..common {
        patch(rt, &mut a[i], &mut b[i], parent, senior, queue)?;
    }
    for node in &mut b[common..] {
        mount(rt, node, parent, tail_anchor, senior, queue)?;
    }
    for node in &mut a[common..] {
        remove_vnode(rt, node, queue)?;
    }
    Ok(())
}

/// Keyed diff: skim matching prefixes and suffixes, then reconcile the
/// middle by key with LIS-driven move minimization.
fn patch_keyed(
    rt: &mut Runtime,
    a: &mut [VNode],
    b: &mut [VNode],
    parent: DomId,
    tail_anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let mut a_start = 0;
    let mut b_start = 0;
    let mut a_end = a.len();
    let mut b_end = b.len();

    // Matching prefix: pure in-place updates.
    while a_start < a_end && b_start < b_end && a[a_start].key == b[b_start].key {
        patch(rt, &mut a[a_start], &mut b[b_start], parent, senior, queue)?;
        a_start += 1;
        b_start += 1;
    }
    // Matching suffix: append/remove at either end stays linear.
    while a_start < a_end && b_start < b_end && a[a_end - 1].key == b[b_end - 1].key {
        patch(rt, &mut a[a_end - 1], &mut b[b_end - 1], parent, senior, queue)?;
        a_end -= 1;
        b_end -= 1;
    }

    // Everything left mounts/moves before the first suffix node (or the
    // enclosing tail anchor when the suffix is empty).
    let next_anchor = if b_end < b.len() {
        first_dom(rt, &b[b_end])
    } else {
        tail_anchor
    };

    if a_start == a_end {
        // Old exhausted: pure insertion.
        for node in &mut b[b_start..b_end] {
            mount(rt, node, parent, next_anchor, senior, queue)?;
        }
        Ok(())
    } else if b_start == b_end {
        // New exhausted: pure removal.
        for node in &mut a[a_start..a_end] {
            remove_vnode(rt, node, queue)?;
        }
        Ok(())
    } else {
        patch_keyed_middle(
            rt,
            &mut a[a_start..a_end],
            &mut b[b_start..b_end],
            parent,
            next_anchor,
            senior,
            queue,
        )
    }
}

#[allow(clippy::too_many_arguments)]
fn patch_keyed_middle(
    rt: &mut Runtime,
    a: &mut [VNode],
    b: &mut [VNode],
    parent: DomId,
    next_anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let mut key_index: FxHashMap<Key, usize> =
        FxHashMap::with_capacity_and_hasher(b.len(), Default::default());
    for (j, node) in b.iter().enumerate() {
        if let Some(key) = &node.key {
            key_index.insert(key.clone(), j);
        }
    }

    // sources[j] = index the reused node had in the old middle, or MAX for
    // a fresh mount. `moved` flips once any reused node is out of order.
    let mut sources = vec![usize::MAX; b.len()];
    let mut moved = false;
    let mut last_placed = 0usize;

    for i in 0..a.len() {
        let target = a[i]
            .key
            .as_ref()
            .and_then(|k| key_index.get(k))
            .copied()
            .filter(|&j| sources[j] == usize::MAX);
        match target {
            Some(j) => {
                sources[j] = i;
                if j < last_placed {
                    moved = true;
                } else {
                    last_placed = j;
                }
                patch(rt, &mut a[i], &mut b[j], parent, senior, queue)?;
            }
            // Key absent from the new middle (or a duplicate already
            // claimed its slot): unmount.
            None => remove_vnode(rt, &mut a[i], queue)?,
        }
    }

    // Nodes on the longest increasing subsequence of old indices keep
    // their DOM position; everything else relocates before the next
    // already-placed node.
    let seq = if moved {
        longest_increasing_subsequence(&sources)
    } else {
        Vec::new()
    };
    let mut seq_iter = seq.iter().rev().peekable();
    let mut anchor = next_anchor;

    for j in (0..b.len()).rev() {
        if sources[j] == usize::MAX {
            mount(rt, &mut b[j], parent, anchor, senior, queue)?;
        } else if moved {
            if seq_iter.peek() == Some(&&j) {
                seq_iter.next();
            } else {
                move_tree(rt, &b[j], parent, anchor)?;
            }
        }
        anchor = first_dom(rt, &b[j]).or(anchor);
    }
    Ok(())
}

// =============================================================================
// Components
// =============================================================================

/// Same-definition component patch: merge props, notify, run the update
/// transition through the coordinator.
fn patch_component(
    rt: &mut Runtime,
    old: &mut VNode,
    new: &mut VNode,
    parent: DomId,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let id = {
        let VNodeKind::Component(c) = &old.kind else {
            unreachable!("patch_component on non-component");
        };
        c.instance.ok_or(VdomError::NotMounted)?
    };

    if !rt.has_instance(id) {
        // The old slot lost its instance (e.g. a rejected init); fall back
        // to a fresh mount.
        debug!(%id, "stale component instance in old tree; remounting");
        return mount(rt, new, parent, None, senior, queue);
    }

    {
        let VNodeKind::Component(c) = &mut new.kind else {
            unreachable!("same_shape admitted mismatched kinds");
        };
        c.instance = Some(id);
    }
    new.dom = old.dom;

    // An ancestor diff may have relocated this component; recompute links.
    rt.relink_instance(id, senior, parent);

    if rt.is_pending(id) {
        // Still waiting on init; remember the props for the eventual render.
        rt.replace_props(id, new.props.clone());
        return Ok(());
    }

    let changed = {
        let current = rt.props_of(id).ok_or(VdomError::DeadInstance(id))?;
        if props_equal(current, &new.props) {
            // Identical props: a pure render maps them to an identical
            // tree, so the whole update (and its hooks) is skipped.
            return Ok(());
        }
        let mut changed = Vec::new();
        for (name, value) in &new.props {
            let prev = current.get_prop(name);
            if prev != Some(value) {
                changed.push((
                    name.clone(),
                    value.clone(),
                    prev.cloned().unwrap_or(Value::Null),
                ));
            }
        }
        changed
    };

    rt.replace_props(id, new.props.clone());
    for (name, new_value, old_value) in changed {
        rt.emit(id, &format!("receive:{name}"), &[new_value, old_value]);
    }
    rt.perform_update(id, queue)
}

/// Reconcile a component's freshly rendered inner tree against its previous
/// one, maintaining the empty-anchor invariant for nothing-renders.
pub(crate) fn reconcile_inner(
    rt: &mut Runtime,
    id: InstanceId,
    inner: Option<VNode>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let parent = rt.parent_dom_of(id)?;
    let old = rt.take_rendered(id);
    match (old, inner) {
        (Some(mut old_tree), Some(mut new_tree)) => {
            patch(rt, &mut old_tree, &mut new_tree, parent, Some(id), queue)?;
            rt.put_rendered(id, new_tree);
        }
        (Some(mut old_tree), None) => {
            // Render went empty: leave a stable anchor where the tree was.
            let anchor = next_anchor_after(rt, &old_tree);
            remove_vnode(rt, &mut old_tree, queue)?;
            let ph = rt.dom_mut().create_comment("");
            rt.dom_mut().insert_before(parent, ph, anchor)?;
            rt.set_placeholder(id, Some(ph));
        }
        (None, Some(mut new_tree)) => {
            let ph = rt
                .placeholder_of(id)
                .ok_or(VdomError::NotMounted)?;
            mount(rt, &mut new_tree, parent, Some(ph), Some(id), queue)?;
            rt.dom_mut().remove(ph)?;
            rt.set_placeholder(id, None);
            rt.put_rendered(id, new_tree);
        }
        (None, None) => {}
    }
    Ok(())
}

// =============================================================================
// Removal
// =============================================================================

/// Full teardown of a mounted vnode: lifecycle first (before-unmount hooks,
/// foreign unmounts, ref clearing), then one DOM removal per subtree root,
/// then unmounted hooks in child-before-parent completion order.
pub(crate) fn remove_vnode(
    rt: &mut Runtime,
    vnode: &mut VNode,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let mut done: Vec<InstanceId> = Vec::new();
    let mut roots: Vec<DomId> = Vec::new();
    unmount_tree(rt, vnode, queue, &mut done, &mut roots, true)?;
    for root in roots {
        if rt.dom().is_live(root) {
            rt.dom_mut().remove(root)?;
        }
    }
    for id in done {
        rt.finish_unmount(id);
    }
    Ok(())
}

/// Lifecycle/ref teardown walk. `top` marks nodes whose DOM handles are
/// roots at the removal level (fragment children and component inner trees
/// share their owner's level).
fn unmount_tree(
    rt: &mut Runtime,
    vnode: &mut VNode,
    queue: &mut MountedQueue,
    done: &mut Vec<InstanceId>,
    roots: &mut Vec<DomId>,
    top: bool,
) -> VdomResult<()> {
    match &mut vnode.kind {
        VNodeKind::Element(el) => {
            if top {
                if let Some(dom) = vnode.dom {
                    roots.push(dom);
                }
            }
            for child in el.children.as_mut_slice() {
                unmount_tree(rt, child, queue, done, roots, false)?;
            }
        }
        VNodeKind::Text(_) | VNodeKind::Comment(_) => {
            if top {
                if let Some(dom) = vnode.dom {
                    roots.push(dom);
                }
            }
        }
        VNodeKind::Fragment(frag) => {
            for child in frag.children.as_mut_slice() {
                unmount_tree(rt, child, queue, done, roots, top)?;
            }
            if top {
                if let Some(anchor) = vnode.dom {
                    roots.push(anchor);
                }
            }
        }
        VNodeKind::Component(comp) => {
            if let Some(id) = comp.instance {
                if rt.has_instance(id) {
                    rt.set_state(id, Lifecycle::Unmounting);
                    rt.call_hook(id, queue, Hook::BeforeUnmount)?;
                    if let Some(mut inner) = rt.take_rendered(id) {
                        unmount_tree(rt, &mut inner, queue, done, roots, top)?;
                    }
                    if top {
                        if let Some(ph) = rt.placeholder_of(id) {
                            roots.push(ph);
                        }
                    }
                    done.push(id);
                }
            }
        }
        VNodeKind::Foreign(foreign) => {
            if let Some(handle) = vnode.dom {
                let adapter = foreign.node.clone();
                adapter.unmount(rt, handle)?;
                vnode.dom = None;
            }
        }
    }
    resolve_ref(&vnode.node_ref, None);
    Ok(())
}

// =============================================================================
// Position helpers
// =============================================================================

/// First live DOM handle realized by a vnode, looking through fragments and
/// component inner trees.
pub(crate) fn first_dom(rt: &Runtime, vnode: &VNode) -> Option<DomId> {
    match &vnode.kind {
        VNodeKind::Element(_)
        | VNodeKind::Text(_)
        | VNodeKind::Comment(_)
        | VNodeKind::Foreign(_) => vnode.dom,
        VNodeKind::Fragment(frag) => frag
            .children
            .iter()
            .find_map(|child| first_dom(rt, child))
            .or(vnode.dom),
        VNodeKind::Component(comp) => {
            let id = comp.instance?;
            match rt.rendered_of(id) {
                Some(inner) => first_dom(rt, inner),
                None => rt.placeholder_of(id),
            }
        }
    }
}

/// Top-level DOM handles a vnode occupies at its parent level (several for
/// fragments, none for a foreign subtree already torn down).
pub(crate) fn collect_dom_roots(rt: &Runtime, vnode: &VNode, out: &mut Vec<DomId>) {
    match &vnode.kind {
        VNodeKind::Element(_)
        | VNodeKind::Text(_)
        | VNodeKind::Comment(_)
        | VNodeKind::Foreign(_) => {
            if let Some(dom) = vnode.dom {
                out.push(dom);
            }
        }
        VNodeKind::Fragment(frag) => {
            for child in frag.children.iter() {
                collect_dom_roots(rt, child, out);
            }
            if let Some(anchor) = vnode.dom {
                out.push(anchor);
            }
        }
        VNodeKind::Component(comp) => {
            if let Some(id) = comp.instance {
                if let Some(inner) = rt.rendered_of(id) {
                    collect_dom_roots(rt, inner, out);
                } else if let Some(ph) = rt.placeholder_of(id) {
                    out.push(ph);
                }
            }
        }
    }
}

/// The DOM node right after a vnode's last root, used to keep the position
/// of a slot across replace/empty-render transitions.
pub(crate) fn next_anchor_after(rt: &Runtime, vnode: &VNode) -> Option<DomId> {
    let mut roots = Vec::new();
    collect_dom_roots(rt, vnode, &mut roots);
    roots.last().and_then(|&last| rt.dom().next_sibling(last))
}

/// Physically relocate a mounted vnode's roots before `anchor`.
fn move_tree(
    rt: &mut Runtime,
    vnode: &VNode,
    parent: DomId,
    anchor: Option<DomId>,
) -> VdomResult<()> {
    let mut roots = Vec::new();
    collect_dom_roots(rt, vnode, &mut roots);
    for root in roots {
        rt.dom_mut().insert_before(parent, root, anchor)?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
