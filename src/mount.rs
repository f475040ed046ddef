//! Mount: first-render walk.
//!
//! Turns a vnode tree into live DOM under a target element, recursively
//! mounting children and constructing component instances. Elements are
//! built detached — props written, children mounted inside — and attached
//! with a single insert, so the observable mutation count stays minimal.
//!
//! Component mounts run `init`; a `Pending` result reserves a stable
//! comment placeholder and suspends the subtree until the host calls
//! [`Runtime::resolve_init`], which completes the attach under a fresh
//! queue scope.
//!
//! A failed mount detaches whatever the failing subtree already attached
//! before the error propagates, so the caller never inherits an
//! undetectable partial attach.

use tracing::debug;

use crate::component::{Hook, InitResult, Instance, InstanceId, Lifecycle};
use crate::dom::{Dom, DomId};
use crate::error::{VdomError, VdomResult};
use crate::patch::{first_dom, remove_vnode};
use crate::props::{Props, Value};
use crate::queue::MountedQueue;
use crate::refs::{Ref, RefTarget};
use crate::runtime::Runtime;
use crate::vnode::{Children, VNode, VNodeKind};

/// Mount `vnode` under `parent`, before `anchor` (append when `None`).
///
/// A vnode that already carries mounted state is the same value referenced
/// from a second tree position; it is replaced by a detached clone first.
pub(crate) fn mount(
    rt: &mut Runtime,
    vnode: &mut VNode,
    parent: DomId,
    anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    if !rt.dom().is_element(parent) {
        return Err(VdomError::InvalidTarget(parent));
    }
    if vnode.is_mounted() {
        debug!(kind = vnode.kind_name(), "mounting a reused vnode; cloning");
        *vnode = vnode.detached_clone();
    }

    match &mut vnode.kind {
        VNodeKind::Element(el) => {
            let dom_id = rt.dom_mut().create_element(el.tag.clone());
            apply_props(rt.dom_mut(), dom_id, &vnode.props)?;
            el.children.resolved_kind();
            if let Err(e) = mount_children(rt, &mut el.children, dom_id, None, senior, queue) {
                let _ = rt.dom_mut().remove(dom_id);
                return Err(e);
            }
            rt.dom_mut().insert_before(parent, dom_id, anchor)?;
            vnode.dom = Some(dom_id);
            resolve_ref(&vnode.node_ref, Some(RefTarget::Dom(dom_id)));
        }
        VNodeKind::Text(content) => {
            let dom_id = rt.dom_mut().create_text(content.clone());
            rt.dom_mut().insert_before(parent, dom_id, anchor)?;
            vnode.dom = Some(dom_id);
            resolve_ref(&vnode.node_ref, Some(RefTarget::Dom(dom_id)));
        }
        VNodeKind::Comment(content) => {
            let dom_id = rt.dom_mut().create_comment(content.clone());
            rt.dom_mut().insert_before(parent, dom_id, anchor)?;
            vnode.dom = Some(dom_id);
            resolve_ref(&vnode.node_ref, Some(RefTarget::Dom(dom_id)));
        }
        VNodeKind::Fragment(frag) => {
            // Trailing anchor: keeps a stable insertion point even when the
            // child list empties out, and gives following siblings a fixed
            // position.
            let anchor_id = rt.dom_mut().create_comment("");
            rt.dom_mut().insert_before(parent, anchor_id, anchor)?;
            frag.children.resolved_kind();
            if let Err(e) =
                mount_children(rt, &mut frag.children, parent, Some(anchor_id), senior, queue)
            {
                let _ = rt.dom_mut().remove(anchor_id);
                return Err(e);
            }
            vnode.dom = Some(anchor_id);
            resolve_ref(&vnode.node_ref, Some(RefTarget::Dom(anchor_id)));
        }
        VNodeKind::Component(comp) => {
            let id = rt.register_instance(Instance::new(
                comp.def,
                vnode.props.clone(),
                senior,
                parent,
            ));
            comp.instance = Some(id);
            match mount_component(rt, id, parent, anchor, queue) {
                Ok(dom_id) => {
                    vnode.dom = Some(dom_id);
                    resolve_ref(&vnode.node_ref, Some(RefTarget::Component(id)));
                }
                Err(e) => {
                    rt.discard_instance(id);
                    comp.instance = None;
                    return Err(e);
                }
            }
        }
        VNodeKind::Foreign(foreign) => {
            let adapter = foreign.node.clone();
            let cross_senior = if adapter.transparent() { senior } else { None };
            let handle = adapter.mount(rt, &foreign.payload, parent, anchor, cross_senior)?;
            if !rt.dom().is_live(handle) {
                return Err(VdomError::ForeignHandle(handle));
            }
            vnode.dom = Some(handle);
            resolve_ref(&vnode.node_ref, Some(RefTarget::Dom(handle)));
        }
    }
    Ok(())
}

/// Mount every child in order. On failure the already-mounted prefix is
/// torn back down before the error propagates.
pub(crate) fn mount_children(
    rt: &mut Runtime,
    children: &mut Children,
    parent: DomId,
    anchor: Option<DomId>,
    senior: Option<InstanceId>,
    queue: &mut MountedQueue,
) -> VdomResult<()> {
    let nodes = children.as_mut_slice();
    let mut failed = None;
    for i in 0..nodes.len() {
        if let Err(e) = mount(rt, &mut nodes[i], parent, anchor, senior, queue) {
            failed = Some((i, e));
            break;
        }
    }
    if let Some((i, e)) = failed {
        for node in &mut nodes[..i] {
            let _ = remove_vnode(rt, node, queue);
        }
        return Err(e);
    }
    Ok(())
}

/// Component mount: instance is already registered; runs the lifecycle up
/// to `mounted` (or parks at a placeholder when init is pending). Returns
/// the vnode's realized DOM handle.
fn mount_component(
    rt: &mut Runtime,
    id: InstanceId,
    parent: DomId,
    anchor: Option<DomId>,
    queue: &mut MountedQueue,
) -> VdomResult<DomId> {
    rt.set_state(id, Lifecycle::Initializing);
    let init = rt.call_init(id, queue)?;

    if init == InitResult::Pending {
        let ph = rt.dom_mut().create_comment("");
        rt.dom_mut().insert_before(parent, ph, anchor)?;
        rt.mark_pending(id, ph);
        debug!(%id, "init pending; reserved placeholder");
        return Ok(ph);
    }

    rt.call_hook(id, queue, Hook::BeforeMount)?;
    let inner = rt.call_render(id, queue)?;
    let dom_id = attach_inner(rt, id, inner, parent, anchor, queue)?;

    rt.set_state(id, Lifecycle::Mounted);
    queue.push(move |rt| rt.hook_entry(id, Hook::Mounted));
    Ok(dom_id)
}

/// Attach a freshly rendered inner tree (or reserve the empty anchor when
/// the component renders nothing). Returns the subtree's first DOM handle.
pub(crate) fn attach_inner(
    rt: &mut Runtime,
    id: InstanceId,
    inner: Option<VNode>,
    parent: DomId,
    anchor: Option<DomId>,
    queue: &mut MountedQueue,
) -> VdomResult<DomId> {
    match inner {
        Some(mut tree) => {
            mount(rt, &mut tree, parent, anchor, Some(id), queue)?;
            let first = first_dom(rt, &tree).ok_or(VdomError::NotMounted)?;
            rt.put_rendered(id, tree);
            Ok(first)
        }
        None => {
            let ph = rt.dom_mut().create_comment("");
            rt.dom_mut().insert_before(parent, ph, anchor)?;
            rt.set_placeholder(id, Some(ph));
            Ok(ph)
        }
    }
}

/// Write initial props onto a fresh element.
fn apply_props(dom: &mut Dom, el: DomId, props: &Props) -> VdomResult<()> {
    for (name, value) in props {
        match value {
            Value::Handler(h) => dom.set_handler(el, name.clone(), h.clone())?,
            other => {
                if let Some(text) = other.to_attr() {
                    dom.set_attr(el, name.clone(), text)?;
                }
            }
        }
    }
    Ok(())
}

/// Deliver a ref target, if the vnode carries a ref.
pub(crate) fn resolve_ref(node_ref: &Option<Ref>, target: Option<RefTarget>) {
    if let Some(r) = node_ref {
        r.set(target);
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::html::inner_html;
    use crate::refs::create_ref;
    use crate::vnode::VNode;

    use super::*;

    fn setup() -> (Runtime, DomId) {
        let mut rt = Runtime::new();
        let container = rt.dom_mut().create_element("div");
        (rt, container)
    }

    #[test]
    fn test_mount_element_with_props_and_children() {
        let (mut rt, container) = setup();
        let vnode = VNode::element("div")
            .prop("class", "class-name")
            .prop("id", 1)
            .child(VNode::element("div"));

        rt.render(Some(vnode), container).unwrap();
        assert_eq!(
            inner_html(rt.dom(), container),
            "<div class=\"class-name\" id=\"1\"><div></div></div>"
        );
    }

    #[test]
    fn test_mount_text_vnode() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::text("test")), container).unwrap();
        assert_eq!(inner_html(rt.dom(), container), "test");
    }

    #[test]
    fn test_mount_comment_vnode() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::comment("comment")), container).unwrap();
        assert_eq!(inner_html(rt.dom(), container), "<!--comment-->");
    }

    #[test]
    fn test_mount_non_keyed_children() {
        let (mut rt, container) = setup();
        let vnode = VNode::element("div")
            .non_keyed_children([VNode::element("div"), VNode::element("div")]);

        rt.render(Some(vnode), container).unwrap();
        assert_eq!(
            inner_html(rt.dom(), container),
            "<div><div></div><div></div></div>"
        );
    }

    #[test]
    fn test_mount_reused_vnode_clones() {
        let (mut rt, container) = setup();
        let mut queue = MountedQueue::new();
        let mut child = VNode::element("i");

        mount(&mut rt, &mut child, container, None, None, &mut queue).unwrap();
        let first = child.dom.unwrap();

        // Same value mounted again: the walk clones it instead of sharing
        // the DOM handle.
        mount(&mut rt, &mut child, container, None, None, &mut queue).unwrap();
        assert_ne!(child.dom.unwrap(), first);
        assert_eq!(inner_html(rt.dom(), container), "<i></i><i></i>");
    }

    #[test]
    fn test_mount_fragment_children_before_anchor() {
        let (mut rt, container) = setup();
        let vnode = VNode::fragment([
            VNode::element("div"),
            VNode::text("text"),
            VNode::element("span"),
        ]);

        rt.render(Some(vnode), container).unwrap();
        assert_eq!(
            inner_html(rt.dom(), container),
            "<div></div>text<span></span><!---->"
        );
    }

    #[test]
    fn test_empty_fragment_mounts_stable_anchor() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::fragment([])), container).unwrap();

        // The invisible anchor keeps an insertion point for later diffs.
        assert_eq!(inner_html(rt.dom(), container), "<!---->");
        assert_eq!(rt.dom().children(container).len(), 1);
    }

    #[test]
    fn test_mount_ref_box() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::element("span").with_ref(r.clone())),
            container,
        )
        .unwrap();

        let target = r.get().and_then(RefTarget::dom).unwrap();
        assert_eq!(rt.dom().tag(target), Some("span"));
    }

    #[test]
    fn test_mount_ref_callback() {
        use std::cell::Cell;
        use std::rc::Rc;

        let (mut rt, container) = setup();
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        rt.render(
            Some(VNode::element("span").with_ref(crate::refs::Ref::from_fn(move |t| seen2.set(t)))),
            container,
        )
        .unwrap();

        assert!(matches!(seen.get(), Some(RefTarget::Dom(_))));
    }

    #[test]
    fn test_mount_into_dead_target_fails() {
        let (mut rt, container) = setup();
        let text = rt.dom_mut().create_text("x");

        assert!(matches!(
            rt.render(Some(VNode::element("div")), text),
            Err(VdomError::InvalidTarget(_))
        ));
        // Nothing was attached anywhere.
        assert_eq!(inner_html(rt.dom(), container), "");
    }

    #[test]
    fn test_single_insert_per_subtree() {
        let (mut rt, container) = setup();
        let vnode = VNode::element("div")
            .child(VNode::element("p").text_child("deep"));

        rt.reset_stats();
        rt.render(Some(vnode), container).unwrap();

        // Children attach into the detached parent; only the root insert
        // touches the live tree, the rest build up off-document.
        assert_eq!(rt.stats().moves, 0);
        assert_eq!(inner_html(rt.dom(), container), "<div><p>deep</p></div>");
    }
}
