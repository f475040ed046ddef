//! Runtime: the engine's single mutable world.
//!
//! Owns the DOM store, the component instance registry, and the root vnode
//! per render container. Every public entry point — `render`, `set`,
//! `force_update`, `trigger`, `resolve_init` — opens its own
//! [`MountedQueue`] scope, runs one synchronous walk, and flushes exactly
//! once before returning.
//!
//! Instance ids come from a monotone counter and are never reused, so every
//! stored id (senior links, pending-init handles, listener targets) is a
//! weak reference that reads as absent after unmount.

use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;
use tracing::{debug, error};

use crate::component::{
    Ctx, Hook, InitResult, Instance, InstanceId, Lifecycle, Listener, ListenerId, UpdateRequest,
};
use crate::dom::{Dom, DomId, MutationStats};
use crate::error::{VdomError, VdomResult};
use crate::mount::{attach_inner, mount};
use crate::patch::{patch, reconcile_inner, remove_vnode};
use crate::props::{Props, PropsExt, Value};
use crate::queue::MountedQueue;
use crate::vnode::VNode;

/// The reconciliation runtime. See the module docs.
#[derive(Default)]
pub struct Runtime {
    dom: Dom,
    instances: FxHashMap<InstanceId, Instance>,
    roots: FxHashMap<DomId, VNode>,
    next_instance: u64,
    next_listener: u64,
}

impl Runtime {
    /// Create an empty runtime with its own DOM store.
    pub fn new() -> Self {
        Self::default()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observation
    // ─────────────────────────────────────────────────────────────────────────

    /// Read access to the DOM store.
    pub fn dom(&self) -> &Dom {
        &self.dom
    }

    /// Write access to the DOM store. Intended for hosts creating
    /// containers and for adapters; mounted subtrees belong to the walks.
    pub fn dom_mut(&mut self) -> &mut Dom {
        &mut self.dom
    }

    /// Mutation counters of the DOM store.
    pub fn stats(&self) -> &MutationStats {
        self.dom.stats()
    }

    /// Zero the mutation counters.
    pub fn reset_stats(&mut self) {
        self.dom.reset_stats();
    }

    /// Number of live component instances.
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Current props of an instance.
    pub fn props_of(&self, id: InstanceId) -> Option<&Props> {
        self.instances.get(&id).map(|inst| &inst.props)
    }

    /// Nearest ancestor component of an instance, if still live.
    pub fn senior_of(&self, id: InstanceId) -> Option<InstanceId> {
        self.instances
            .get(&id)
            .and_then(|inst| inst.senior)
            .filter(|senior| self.instances.contains_key(senior))
    }

    /// Lifecycle state of an instance.
    pub fn lifecycle_of(&self, id: InstanceId) -> Option<Lifecycle> {
        self.instances.get(&id).map(|inst| inst.state)
    }

    /// The element an instance's inner tree mounts into.
    pub fn parent_dom_of(&self, id: InstanceId) -> VdomResult<DomId> {
        Ok(self.instance(id)?.parent_dom)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Render entry
    // ─────────────────────────────────────────────────────────────────────────

    /// Render `vnode` into `container`: mounts on first call, patches
    /// against the stored tree afterwards, unmounts on `None`.
    pub fn render(&mut self, vnode: Option<VNode>, container: DomId) -> VdomResult<()> {
        self.render_with_senior(vnode, container, None)
    }

    /// Render with an explicit senior for the subtree — the re-entry point
    /// for foreign adapters embedding engine content, and for any host that
    /// wants components inside `container` linked to an outer ancestry.
    pub fn render_with_senior(
        &mut self,
        vnode: Option<VNode>,
        container: DomId,
        senior: Option<InstanceId>,
    ) -> VdomResult<()> {
        if !self.dom.is_element(container) {
            return Err(VdomError::InvalidTarget(container));
        }
        let old = self.roots.remove(&container);
        let mut queue = MountedQueue::new();

        let result = match (old, vnode) {
            (None, None) => Ok(()),
            (None, Some(mut new)) => {
                let r = mount(self, &mut new, container, None, senior, &mut queue);
                if r.is_ok() {
                    self.roots.insert(container, new);
                }
                r
            }
            (Some(mut old_root), None) => remove_vnode(self, &mut old_root, &mut queue),
            (Some(mut old_root), Some(mut new)) => {
                let r = patch(self, &mut old_root, &mut new, container, senior, &mut queue);
                if r.is_ok() {
                    self.roots.insert(container, new);
                }
                r
            }
        };

        queue.flush(self);
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Imperative instance surface
    // ─────────────────────────────────────────────────────────────────────────

    /// Merge one prop into an instance, emit `change:<key>`, and run an
    /// update pass as its own entry point.
    pub fn set(
        &mut self,
        id: InstanceId,
        key: impl Into<CompactString>,
        value: impl Into<Value>,
    ) -> VdomResult<()> {
        if !self.has_instance(id) {
            return Err(VdomError::DeadInstance(id));
        }
        self.merge_own_prop(id, key.into(), value.into());
        self.update_entry(id)
    }

    /// Run an update pass without touching props.
    pub fn force_update(&mut self, id: InstanceId) -> VdomResult<()> {
        if !self.has_instance(id) {
            return Err(VdomError::DeadInstance(id));
        }
        self.update_entry(id)
    }

    /// Register an instance event listener.
    pub fn on(
        &mut self,
        id: InstanceId,
        event: impl Into<CompactString>,
        listener: impl Fn(&[Value]) + 'static,
    ) -> VdomResult<ListenerId> {
        if !self.has_instance(id) {
            return Err(VdomError::DeadInstance(id));
        }
        Ok(self.add_listener(id, event.into(), Rc::new(listener)))
    }

    /// Remove an instance event listener.
    pub fn off(&mut self, id: InstanceId, event: &str, listener: ListenerId) -> VdomResult<()> {
        if !self.has_instance(id) {
            return Err(VdomError::DeadInstance(id));
        }
        self.remove_listener(id, event, listener);
        Ok(())
    }

    /// Emit an event through an instance's listener table.
    pub fn trigger(&mut self, id: InstanceId, event: &str, args: &[Value]) -> VdomResult<()> {
        if !self.has_instance(id) {
            return Err(VdomError::DeadInstance(id));
        }
        self.emit(id, event, args);
        Ok(())
    }

    fn update_entry(&mut self, id: InstanceId) -> VdomResult<()> {
        let mut queue = MountedQueue::new();
        let result = self.perform_update(id, &mut queue);
        queue.flush(self);
        result
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Async init
    // ─────────────────────────────────────────────────────────────────────────

    /// Complete a pending init: runs before-mount and render, attaches the
    /// inner tree at the reserved placeholder, and flushes a fresh queue.
    /// A resolution for an instance that was unmounted meanwhile is a no-op.
    pub fn resolve_init(&mut self, id: InstanceId) -> VdomResult<()> {
        let Some(inst) = self.instances.get_mut(&id) else {
            debug!(%id, "init resolution for unmounted instance ignored");
            return Ok(());
        };
        if !inst.pending {
            return Err(VdomError::NotPending(id));
        }
        inst.pending = false;
        let placeholder = inst.placeholder.take().ok_or(VdomError::NotMounted)?;
        let parent = inst.parent_dom;

        let mut queue = MountedQueue::new();
        let result = self.finish_resolve(id, parent, placeholder, &mut queue);
        queue.flush(self);
        result
    }

    fn finish_resolve(
        &mut self,
        id: InstanceId,
        parent: DomId,
        placeholder: DomId,
        queue: &mut MountedQueue,
    ) -> VdomResult<()> {
        self.call_hook(id, queue, Hook::BeforeMount)?;
        let inner = self.call_render(id, queue)?;
        if inner.is_some() {
            attach_inner(self, id, inner, parent, Some(placeholder), queue)?;
            self.dom.remove(placeholder)?;
        } else {
            // Still rendering nothing: the reserved anchor stays.
            self.set_placeholder(id, Some(placeholder));
        }
        self.set_state(id, Lifecycle::Mounted);
        queue.push(move |rt| rt.hook_entry(id, Hook::Mounted));
        Ok(())
    }

    /// Reject a pending init: the instance is discarded, its placeholder
    /// removed, and the failure surfaces to the caller. The component never
    /// reaches `mounted`.
    pub fn reject_init(&mut self, id: InstanceId, reason: impl Into<String>) -> VdomResult<()> {
        let Some(inst) = self.instances.get(&id) else {
            debug!(%id, "init rejection for unmounted instance ignored");
            return Ok(());
        };
        if !inst.pending {
            return Err(VdomError::NotPending(id));
        }
        let name = inst.def.name;
        self.discard_instance(id);
        Err(VdomError::init_rejected(name, reason))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registry plumbing
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn register_instance(&mut self, inst: Instance) -> InstanceId {
        let id = InstanceId(self.next_instance);
        self.next_instance += 1;
        self.instances.insert(id, inst);
        id
    }

    /// Drop an instance that never completed its mount.
    pub(crate) fn discard_instance(&mut self, id: InstanceId) {
        if let Some(inst) = self.instances.remove(&id) {
            if let Some(ph) = inst.placeholder {
                let _ = self.dom.remove(ph);
            }
        }
    }

    pub(crate) fn has_instance(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    fn instance(&self, id: InstanceId) -> VdomResult<&Instance> {
        self.instances.get(&id).ok_or(VdomError::DeadInstance(id))
    }

    fn instance_mut(&mut self, id: InstanceId) -> VdomResult<&mut Instance> {
        self.instances
            .get_mut(&id)
            .ok_or(VdomError::DeadInstance(id))
    }

    pub(crate) fn set_state(&mut self, id: InstanceId, state: Lifecycle) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.state = state;
        }
    }

    pub(crate) fn mark_pending(&mut self, id: InstanceId, placeholder: DomId) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.pending = true;
            inst.placeholder = Some(placeholder);
        }
    }

    pub(crate) fn is_pending(&self, id: InstanceId) -> bool {
        self.instances.get(&id).is_some_and(|inst| inst.pending)
    }

    /// Refresh senior and parent links after the parent diff relocated the
    /// instance's slot.
    pub(crate) fn relink_instance(
        &mut self,
        id: InstanceId,
        senior: Option<InstanceId>,
        parent_dom: DomId,
    ) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.senior = senior;
            inst.parent_dom = parent_dom;
        }
    }

    pub(crate) fn replace_props(&mut self, id: InstanceId, props: Props) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.props = props;
        }
    }

    pub(crate) fn take_rendered(&mut self, id: InstanceId) -> Option<VNode> {
        self.instances.get_mut(&id).and_then(|inst| inst.rendered.take())
    }

    pub(crate) fn put_rendered(&mut self, id: InstanceId, tree: VNode) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.rendered = Some(tree);
        }
    }

    pub(crate) fn rendered_of(&self, id: InstanceId) -> Option<&VNode> {
        self.instances.get(&id).and_then(|inst| inst.rendered.as_ref())
    }

    pub(crate) fn placeholder_of(&self, id: InstanceId) -> Option<DomId> {
        self.instances.get(&id).and_then(|inst| inst.placeholder)
    }

    pub(crate) fn set_placeholder(&mut self, id: InstanceId, placeholder: Option<DomId>) {
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.placeholder = placeholder;
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn add_listener(
        &mut self,
        id: InstanceId,
        event: CompactString,
        listener: Listener,
    ) -> ListenerId {
        let lid = ListenerId(self.next_listener);
        self.next_listener += 1;
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.listeners.entry(event).or_default().push((lid, listener));
        }
        lid
    }

    pub(crate) fn remove_listener(&mut self, id: InstanceId, event: &str, lid: ListenerId) {
        if let Some(inst) = self.instances.get_mut(&id) {
            if let Some(list) = inst.listeners.get_mut(event) {
                list.retain(|(registered, _)| *registered != lid);
            }
        }
    }

    /// Call the instance's listeners for `event`, in registration order.
    pub(crate) fn emit(&self, id: InstanceId, event: &str, args: &[Value]) {
        let Some(inst) = self.instances.get(&id) else {
            return;
        };
        let Some(list) = inst.listeners.get(event) else {
            return;
        };
        let snapshot: Vec<Listener> = list.iter().map(|(_, l)| l.clone()).collect();
        for listener in snapshot {
            listener(args);
        }
    }

    /// Merge one key into own props and emit `change:<key>` with
    /// `[new, old]`.
    pub(crate) fn merge_own_prop(&mut self, id: InstanceId, key: CompactString, value: Value) {
        let Some(inst) = self.instances.get_mut(&id) else {
            return;
        };
        let old = inst
            .props
            .set_prop(key.clone(), value.clone())
            .unwrap_or(Value::Null);
        self.emit(id, &format!("change:{key}"), &[value, old]);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hook invocation
    // ─────────────────────────────────────────────────────────────────────────

    /// Check the behavior object out, run `f` with a hook context, check it
    /// back in. Reentry on the same instance is a structural error.
    fn with_behavior<R>(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
        f: impl FnOnce(&mut dyn crate::component::Component, &mut Ctx<'_>) -> R,
    ) -> VdomResult<R> {
        let inst = self.instance_mut(id)?;
        let mut behavior = inst.behavior.take().ok_or(VdomError::ReentrantHook(id))?;
        let mut cx = Ctx { rt: self, queue, id };
        let out = f(behavior.as_mut(), &mut cx);
        if let Some(inst) = self.instances.get_mut(&id) {
            inst.behavior = Some(behavior);
        }
        Ok(out)
    }

    pub(crate) fn call_init(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
    ) -> VdomResult<InitResult> {
        self.with_behavior(id, queue, |c, cx| c.init(cx))
    }

    pub(crate) fn call_render(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
    ) -> VdomResult<Option<VNode>> {
        self.with_behavior(id, queue, |c, cx| c.render(cx))
    }

    pub(crate) fn call_before_update(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
    ) -> VdomResult<UpdateRequest> {
        self.with_behavior(id, queue, |c, cx| c.before_update(cx))
    }

    pub(crate) fn call_hook(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
        hook: Hook,
    ) -> VdomResult<()> {
        self.with_behavior(id, queue, |c, cx| match hook {
            Hook::BeforeMount => c.before_mount(cx),
            Hook::Mounted => c.mounted(cx),
            Hook::Updated => c.updated(cx),
            Hook::BeforeUnmount => c.before_unmount(cx),
            Hook::Unmounted => c.unmounted(cx),
        })
    }

    /// Queued-hook entry: runs one lifecycle hook under its own queue scope.
    pub(crate) fn hook_entry(&mut self, id: InstanceId, hook: Hook) {
        if !self.has_instance(id) {
            debug!(%id, ?hook, "hook for unmounted instance skipped");
            return;
        }
        let mut queue = MountedQueue::new();
        if let Err(e) = self.call_hook(id, &mut queue, hook) {
            error!(%id, ?hook, error = %e, "lifecycle hook failed");
        }
        queue.flush(self);
    }

    /// Last step of teardown: state flip, unmounted hook, registry removal.
    pub(crate) fn finish_unmount(&mut self, id: InstanceId) {
        self.set_state(id, Lifecycle::Unmounted);
        let mut queue = MountedQueue::new();
        let _ = self.call_hook(id, &mut queue, Hook::Unmounted);
        queue.flush(self);
        self.instances.remove(&id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Update coordination
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the `mounted → updating → mounted` transition. The before-update
    /// hook may convert this into a queued job instead of inline work.
    pub(crate) fn perform_update(
        &mut self,
        id: InstanceId,
        queue: &mut MountedQueue,
    ) -> VdomResult<()> {
        let inst = self.instance(id)?;
        if inst.pending || inst.state != Lifecycle::Mounted {
            debug!(%id, state = ?inst.state, "update request outside mounted state skipped");
            return Ok(());
        }
        if inst.behavior.is_none() {
            // A hook of this instance is on the stack; rerun as its own
            // entry once the current pass settles.
            self.request_update(id, queue);
            return Ok(());
        }
        match self.call_before_update(id, queue)? {
            UpdateRequest::Run => self.do_update(id, queue),
            UpdateRequest::Defer => {
                self.schedule_deferred(id, queue);
                Ok(())
            }
        }
    }

    /// Queue a full update transition (used when the requester cannot run
    /// it inline). Coalesces with any update already queued.
    pub(crate) fn request_update(&mut self, id: InstanceId, queue: &mut MountedQueue) {
        let Some(inst) = self.instances.get_mut(&id) else {
            return;
        };
        if inst.deferred_update
            || matches!(inst.state, Lifecycle::Unmounting | Lifecycle::Unmounted)
        {
            return;
        }
        inst.deferred_update = true;
        queue.push(move |rt| rt.run_update_entry(id));
    }

    fn schedule_deferred(&mut self, id: InstanceId, queue: &mut MountedQueue) {
        let Some(inst) = self.instances.get_mut(&id) else {
            return;
        };
        if inst.deferred_update {
            return;
        }
        inst.deferred_update = true;
        queue.push(move |rt| rt.run_deferred_update(id));
    }

    /// Queued full update: own queue scope, flushed before returning to the
    /// outer flush.
    pub(crate) fn run_update_entry(&mut self, id: InstanceId) {
        let Some(inst) = self.instances.get_mut(&id) else {
            debug!(%id, "queued update for dead instance skipped");
            return;
        };
        inst.deferred_update = false;
        if inst.pending || inst.state != Lifecycle::Mounted || inst.behavior.is_none() {
            debug!(%id, "queued update skipped");
            return;
        }
        let mut queue = MountedQueue::new();
        let result = match self.call_before_update(id, &mut queue) {
            // This call is already the rescheduled work; a second Defer
            // collapses to running inline.
            Ok(UpdateRequest::Run) | Ok(UpdateRequest::Defer) => self.do_update(id, &mut queue),
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            error!(%id, error = %e, "queued update failed");
        }
        queue.flush(self);
    }

    /// Queued update whose before-update hook already ran and chose Defer.
    pub(crate) fn run_deferred_update(&mut self, id: InstanceId) {
        let Some(inst) = self.instances.get_mut(&id) else {
            debug!(%id, "deferred update for dead instance skipped");
            return;
        };
        inst.deferred_update = false;
        if inst.pending || inst.state != Lifecycle::Mounted || inst.behavior.is_none() {
            debug!(%id, "deferred update skipped");
            return;
        }
        let mut queue = MountedQueue::new();
        if let Err(e) = self.do_update(id, &mut queue) {
            error!(%id, error = %e, "deferred update failed");
        }
        queue.flush(self);
    }

    fn do_update(&mut self, id: InstanceId, queue: &mut MountedQueue) -> VdomResult<()> {
        self.set_state(id, Lifecycle::Updating);
        let inner = self.call_render(id, queue)?;
        reconcile_inner(self, id, inner, queue)?;
        self.set_state(id, Lifecycle::Mounted);
        queue.push(move |rt| rt.hook_entry(id, Hook::Updated));
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use crate::component::{Component, ComponentDef};
    use crate::foreign::ForeignNode;
    use crate::html::inner_html;
    use crate::refs::{create_ref, RefTarget};
    use crate::vnode::VNode;

    use super::*;

    thread_local! {
        static LOG: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
        static IDS: RefCell<FxHashMap<&'static str, InstanceId>> =
            RefCell::new(FxHashMap::default());
        static ADAPTER: RefCell<Option<Rc<dyn ForeignNode>>> = const { RefCell::new(None) };
        static SEEN_SENIOR: Cell<Option<Option<InstanceId>>> = const { Cell::new(None) };
    }

    fn log(entry: String) {
        LOG.with(|l| l.borrow_mut().push(entry));
    }

    fn take_log() -> Vec<String> {
        LOG.with(|l| std::mem::take(&mut *l.borrow_mut()))
    }

    fn record_id(name: &'static str, id: InstanceId) {
        IDS.with(|m| m.borrow_mut().insert(name, id));
    }

    fn id_of(name: &'static str) -> InstanceId {
        IDS.with(|m| m.borrow()[name])
    }

    fn setup() -> (Runtime, DomId) {
        take_log();
        let mut rt = Runtime::new();
        let container = rt.dom_mut().create_element("div");
        (rt, container)
    }

    fn int_prop(cx: &Ctx<'_>, name: &str) -> i64 {
        match cx.get(name) {
            Some(Value::Int(n)) => *n,
            _ => 0,
        }
    }

    // ── Label: renders its "label" prop into a span ─────────────────────────

    struct Label;
    impl Component for Label {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            let text = cx.get("label").and_then(Value::as_str).unwrap_or("").to_string();
            Some(VNode::element("span").text_child(text))
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            record_id("label", cx.id());
        }
    }
    fn label_new() -> Box<dyn Component> {
        Box::new(Label)
    }
    static LABEL: ComponentDef = ComponentDef::new("Label", label_new);

    // ── Host: forwards its "label" prop to a Label child ────────────────────

    struct Host;
    impl Component for Host {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            let label = cx.get("label").and_then(Value::as_str).unwrap_or("").to_string();
            Some(VNode::element("div").child(VNode::component(&LABEL).prop("label", label)))
        }
    }
    fn host_new() -> Box<dyn Component> {
        Box::new(Host)
    }
    static HOST: ComponentDef = ComponentDef::new("Host", host_new);

    // ── Probe: nests itself to "depth" 3, logging hooks ─────────────────────

    struct Probe;
    impl Component for Probe {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            let depth = int_prop(cx, "depth");
            if depth < 3 {
                Some(
                    VNode::element("div")
                        .child(VNode::component(&PROBE).prop("depth", depth + 1)),
                )
            } else {
                Some(VNode::element("span").text_child("leaf"))
            }
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            log(format!("mounted:{}", int_prop(cx, "depth")));
        }
        fn before_unmount(&mut self, cx: &mut Ctx<'_>) {
            log(format!("before_unmount:{}", int_prop(cx, "depth")));
        }
        fn unmounted(&mut self, cx: &mut Ctx<'_>) {
            log(format!("unmounted:{}", int_prop(cx, "depth")));
        }
    }
    fn probe_new() -> Box<dyn Component> {
        Box::new(Probe)
    }
    static PROBE: ComponentDef = ComponentDef::new("Probe", probe_new);

    #[test]
    fn test_component_renders_props() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&LABEL).prop("label", "hi")), container)
            .unwrap();
        assert_eq!(inner_html(rt.dom(), container), "<span>hi</span>");
        assert_eq!(rt.instance_count(), 1);
    }

    #[test]
    fn test_set_updates_dom() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&LABEL).prop("label", "a")), container)
            .unwrap();
        let id = id_of("label");

        rt.set(id, "label", "b").unwrap();
        assert_eq!(inner_html(rt.dom(), container), "<span>b</span>");
        assert_eq!(rt.lifecycle_of(id), Some(Lifecycle::Mounted));
    }

    #[test]
    fn test_mounted_hooks_deepest_first() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&PROBE).prop("depth", 1)), container)
            .unwrap();
        assert_eq!(take_log(), vec!["mounted:3", "mounted:2", "mounted:1"]);
    }

    #[test]
    fn test_teardown_order_child_before_parent() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&PROBE).prop("depth", 1)), container)
            .unwrap();
        take_log();

        rt.render(None, container).unwrap();
        assert_eq!(
            take_log(),
            vec![
                "before_unmount:1",
                "before_unmount:2",
                "before_unmount:3",
                "unmounted:3",
                "unmounted:2",
                "unmounted:1",
            ]
        );
        assert_eq!(inner_html(rt.dom(), container), "");
        assert_eq!(rt.instance_count(), 0);
    }

    #[test]
    fn test_identical_props_skip_update_hooks() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&PROBE).prop("depth", 1)), container)
            .unwrap();
        take_log();
        rt.reset_stats();

        rt.render(Some(VNode::component(&PROBE).prop("depth", 1)), container)
            .unwrap();
        assert!(take_log().is_empty());
        assert!(rt.stats().is_quiet());
    }

    // ── Priority bucket ─────────────────────────────────────────────────────

    struct Eager;
    impl Component for Eager {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            cx.enqueue_priority(|_| log("priority".into()));
            Some(VNode::element("span"))
        }
        fn mounted(&mut self, _cx: &mut Ctx<'_>) {
            log("mounted".into());
        }
    }
    fn eager_new() -> Box<dyn Component> {
        Box::new(Eager)
    }
    static EAGER: ComponentDef = ComponentDef::new("Eager", eager_new);

    #[test]
    fn test_priority_jobs_run_before_mounted_hooks() {
        let (mut rt, container) = setup();
        // The eager component sits *above* another component, so its
        // priority job still beats the deeper normal-bucket hook.
        rt.render(
            Some(VNode::element("div").children([
                VNode::component(&EAGER),
                VNode::component(&LABEL).prop("label", "x"),
            ])),
            container,
        )
        .unwrap();

        let entries = take_log();
        assert_eq!(entries[0], "priority");
        assert!(entries.contains(&"mounted".to_string()));
    }

    // ── Deferred updates ────────────────────────────────────────────────────

    struct DeferProbe;
    impl Component for DeferProbe {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            let name = cx.get("name").and_then(Value::as_str).unwrap_or("?").to_string();
            log(format!("render:{name}"));
            Some(VNode::element("i").text_child(name))
        }
        fn before_update(&mut self, cx: &mut Ctx<'_>) -> UpdateRequest {
            let name = cx.get("name").and_then(Value::as_str).unwrap_or("?");
            log(format!("before:{name}"));
            match cx.get("defer") {
                Some(Value::Bool(true)) => UpdateRequest::Defer,
                _ => UpdateRequest::Run,
            }
        }
        fn updated(&mut self, cx: &mut Ctx<'_>) {
            let name = cx.get("name").and_then(Value::as_str).unwrap_or("?");
            log(format!("updated:{name}"));
        }
    }
    fn defer_probe_new() -> Box<dyn Component> {
        Box::new(DeferProbe)
    }
    static DEFER_PROBE: ComponentDef = ComponentDef::new("DeferProbe", defer_probe_new);

    struct Pair;
    impl Component for Pair {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            let generation = int_prop(cx, "gen");
            Some(VNode::element("div").children([
                VNode::component(&DEFER_PROBE)
                    .prop("name", "A")
                    .prop("defer", true)
                    .prop("gen", generation),
                VNode::component(&DEFER_PROBE)
                    .prop("name", "B")
                    .prop("defer", false)
                    .prop("gen", generation),
            ]))
        }
    }
    fn pair_new() -> Box<dyn Component> {
        Box::new(Pair)
    }
    static PAIR: ComponentDef = ComponentDef::new("Pair", pair_new);

    #[test]
    fn test_before_update_defers_work_past_the_pass() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(Some(VNode::component(&PAIR).prop("gen", 0).with_ref(r.clone())), container)
            .unwrap();
        take_log();

        let pair_id = r.get().and_then(RefTarget::component).unwrap();
        rt.set(pair_id, "gen", 1).unwrap();

        // A defers: its render happens after the walk (B's render) and its
        // updated hook still precedes B's, inner entry before outer flush.
        assert_eq!(
            take_log(),
            vec![
                "before:A",
                "before:B",
                "render:B",
                "render:A",
                "updated:A",
                "updated:B",
            ]
        );
        let div = rt.dom().children(container)[0];
        assert_eq!(inner_html(rt.dom(), div), "<i>A</i><i>B</i>");
    }

    // ── Instance events ─────────────────────────────────────────────────────

    #[test]
    fn test_trigger_on_off() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&LABEL).prop("label", "x")), container)
            .unwrap();
        let id = id_of("label");

        let lid = rt
            .on(id, "ping", |args| {
                log(format!("ping:{}", args[0].as_str().unwrap_or("?")));
            })
            .unwrap();
        rt.trigger(id, "ping", &["one".into()]).unwrap();
        rt.off(id, "ping", lid).unwrap();
        rt.trigger(id, "ping", &["two".into()]).unwrap();

        assert_eq!(take_log(), vec!["ping:one"]);
    }

    #[test]
    fn test_set_emits_change_event() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&LABEL).prop("label", "a")), container)
            .unwrap();
        let id = id_of("label");

        rt.on(id, "change:label", |args| {
            log(format!(
                "change:{}<-{}",
                args[0].as_str().unwrap_or("?"),
                args[1].as_str().unwrap_or("?")
            ));
        })
        .unwrap();
        rt.set(id, "label", "b").unwrap();

        assert_eq!(take_log(), vec!["change:b<-a"]);
    }

    #[test]
    fn test_parent_diff_emits_receive_event() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::component(&HOST).prop("label", "a").with_ref(r.clone())),
            container,
        )
        .unwrap();
        let host_id = r.get().and_then(RefTarget::component).unwrap();
        let label_id = id_of("label");

        rt.on(label_id, "receive:label", |args| {
            log(format!("receive:{}", args[0].as_str().unwrap_or("?")));
        })
        .unwrap();
        rt.set(host_id, "label", "b").unwrap();

        assert!(take_log().contains(&"receive:b".to_string()));
        let div = rt.dom().children(container)[0];
        assert_eq!(inner_html(rt.dom(), div), "<span>b</span>");
    }

    // ── Senior linkage ──────────────────────────────────────────────────────

    struct SeniorC;
    impl Component for SeniorC {
        fn render(&mut self, _cx: &mut Ctx<'_>) -> Option<VNode> {
            Some(VNode::element("div").child(VNode::component(&SENIOR_E)))
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            record_id("C", cx.id());
        }
    }
    struct SeniorE;
    impl Component for SeniorE {
        fn render(&mut self, _cx: &mut Ctx<'_>) -> Option<VNode> {
            // D sits under plain markup; the chain skips the element and
            // the fragment but not the component boundary.
            Some(
                VNode::element("section").child(VNode::fragment([VNode::element("p")
                    .child(VNode::component(&SENIOR_D))])),
            )
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            record_id("E", cx.id());
        }
    }
    struct SeniorD;
    impl Component for SeniorD {
        fn render(&mut self, _cx: &mut Ctx<'_>) -> Option<VNode> {
            Some(VNode::element("span").text_child("d"))
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            record_id("D", cx.id());
        }
    }
    fn senior_c_new() -> Box<dyn Component> {
        Box::new(SeniorC)
    }
    fn senior_e_new() -> Box<dyn Component> {
        Box::new(SeniorE)
    }
    fn senior_d_new() -> Box<dyn Component> {
        Box::new(SeniorD)
    }
    static SENIOR_C: ComponentDef = ComponentDef::new("SeniorC", senior_c_new);
    static SENIOR_E: ComponentDef = ComponentDef::new("SeniorE", senior_e_new);
    static SENIOR_D: ComponentDef = ComponentDef::new("SeniorD", senior_d_new);

    #[test]
    fn test_senior_chain_skips_plain_markup() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&SENIOR_C)), container).unwrap();

        let (c, e, d) = (id_of("C"), id_of("E"), id_of("D"));
        assert_eq!(rt.senior_of(d), Some(e));
        assert_eq!(rt.senior_of(e), Some(c));
        assert_eq!(rt.senior_of(c), None);
    }

    #[test]
    fn test_senior_dangles_as_absent_after_teardown() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&SENIOR_C)), container).unwrap();
        let d = id_of("D");

        rt.render(None, container).unwrap();
        assert_eq!(rt.senior_of(d), None);
    }

    // ── Render-nothing components ───────────────────────────────────────────

    struct Toggler;
    impl Component for Toggler {
        fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode> {
            match cx.get("show") {
                Some(Value::Bool(true)) => Some(VNode::element("b").text_child("on")),
                _ => None,
            }
        }
    }
    fn toggler_new() -> Box<dyn Component> {
        Box::new(Toggler)
    }
    static TOGGLER: ComponentDef = ComponentDef::new("Toggler", toggler_new);

    #[test]
    fn test_nothing_render_keeps_stable_anchor() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::element("div").children([
                VNode::component(&TOGGLER).prop("show", false).with_ref(r.clone()),
                VNode::element("em").text_child("after"),
            ])),
            container,
        )
        .unwrap();
        let div = rt.dom().children(container)[0];
        assert_eq!(inner_html(rt.dom(), div), "<!----><em>after</em>");

        // The ref resolved even though nothing rendered.
        let id = r.get().and_then(RefTarget::component).unwrap();

        rt.set(id, "show", true).unwrap();
        assert_eq!(inner_html(rt.dom(), div), "<b>on</b><em>after</em>");

        rt.set(id, "show", false).unwrap();
        assert_eq!(inner_html(rt.dom(), div), "<!----><em>after</em>");
    }

    // ── Async init ──────────────────────────────────────────────────────────

    struct Loader;
    impl Component for Loader {
        fn init(&mut self, _cx: &mut Ctx<'_>) -> InitResult {
            InitResult::Pending
        }
        fn render(&mut self, _cx: &mut Ctx<'_>) -> Option<VNode> {
            Some(VNode::element("span").text_child("loaded"))
        }
        fn mounted(&mut self, _cx: &mut Ctx<'_>) {
            log("loader-mounted".into());
        }
    }
    fn loader_new() -> Box<dyn Component> {
        Box::new(Loader)
    }
    static LOADER: ComponentDef = ComponentDef::new("Loader", loader_new);

    #[test]
    fn test_pending_init_attaches_only_after_resolve() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::element("div").child(VNode::component(&LOADER).with_ref(r.clone()))),
            container,
        )
        .unwrap();
        let div = rt.dom().children(container)[0];

        // Placeholder reserved, nothing attached, no mounted hook.
        assert_eq!(inner_html(rt.dom(), div), "<!---->");
        assert!(take_log().is_empty());

        let id = r.get().and_then(RefTarget::component).unwrap();
        assert_eq!(rt.lifecycle_of(id), Some(Lifecycle::Initializing));

        rt.resolve_init(id).unwrap();
        assert_eq!(inner_html(rt.dom(), div), "<span>loaded</span>");
        assert_eq!(take_log(), vec!["loader-mounted"]);
        assert_eq!(rt.lifecycle_of(id), Some(Lifecycle::Mounted));

        // A second resolution has nothing pending to complete.
        assert!(matches!(
            rt.resolve_init(id),
            Err(VdomError::NotPending(_))
        ));
    }

    #[test]
    fn test_resolve_after_unmount_is_noop() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::element("div").child(VNode::component(&LOADER).with_ref(r.clone()))),
            container,
        )
        .unwrap();
        let id = r.get().and_then(RefTarget::component).unwrap();

        rt.render(None, container).unwrap();
        assert_eq!(rt.instance_count(), 0);

        rt.resolve_init(id).unwrap();
        assert_eq!(inner_html(rt.dom(), container), "");
        assert!(take_log().is_empty());
    }

    #[test]
    fn test_reject_init_surfaces_failure() {
        let (mut rt, container) = setup();
        let r = create_ref();
        rt.render(
            Some(VNode::element("div").child(VNode::component(&LOADER).with_ref(r.clone()))),
            container,
        )
        .unwrap();
        let id = r.get().and_then(RefTarget::component).unwrap();

        let err = rt.reject_init(id, "network down").unwrap_err();
        assert!(matches!(err, VdomError::InitRejected { .. }));

        let div = rt.dom().children(container)[0];
        assert_eq!(inner_html(rt.dom(), div), "");
        assert_eq!(rt.instance_count(), 0);
        assert!(take_log().is_empty());
    }

    // ── Foreign boundary ────────────────────────────────────────────────────

    struct Panel {
        transparent: bool,
    }
    impl ForeignNode for Panel {
        fn mount(
            &self,
            rt: &mut Runtime,
            payload: &Value,
            parent: DomId,
            anchor: Option<DomId>,
            senior: Option<InstanceId>,
        ) -> VdomResult<DomId> {
            SEEN_SENIOR.with(|s| s.set(Some(senior)));
            let el = rt.dom_mut().create_element("x-panel");
            if let Some(text) = payload.as_str() {
                rt.dom_mut().set_attr(el, "data", text)?;
            }
            rt.dom_mut().insert_before(parent, el, anchor)?;
            Ok(el)
        }

        fn patch(
            &self,
            rt: &mut Runtime,
            _old_payload: &Value,
            new_payload: &Value,
            handle: DomId,
            _senior: Option<InstanceId>,
        ) -> VdomResult<()> {
            rt.dom_mut()
                .set_attr(handle, "data", new_payload.as_str().unwrap_or(""))
        }

        fn unmount(&self, rt: &mut Runtime, handle: DomId) -> VdomResult<()> {
            log("foreign-unmount".into());
            rt.dom_mut().remove(handle)
        }

        fn transparent(&self) -> bool {
            self.transparent
        }
    }

    struct FHost;
    impl Component for FHost {
        fn render(&mut self, _cx: &mut Ctx<'_>) -> Option<VNode> {
            let adapter = ADAPTER.with(|a| a.borrow().clone()).expect("adapter set");
            Some(VNode::foreign(adapter, "p"))
        }
        fn mounted(&mut self, cx: &mut Ctx<'_>) {
            record_id("fhost", cx.id());
        }
    }
    fn fhost_new() -> Box<dyn Component> {
        Box::new(FHost)
    }
    static FHOST: ComponentDef = ComponentDef::new("FHost", fhost_new);

    #[test]
    fn test_foreign_mount_patch_unmount() {
        let (mut rt, container) = setup();
        let adapter: Rc<dyn ForeignNode> = Rc::new(Panel { transparent: false });

        rt.render(Some(VNode::foreign(adapter.clone(), "a")), container)
            .unwrap();
        let panel = rt.dom().children(container)[0];
        assert_eq!(rt.dom().attr(panel, "data"), Some("a"));

        // Same adapter: patched through the boundary, handle kept.
        rt.render(Some(VNode::foreign(adapter, "b")), container).unwrap();
        assert_eq!(rt.dom().children(container)[0], panel);
        assert_eq!(rt.dom().attr(panel, "data"), Some("b"));

        rt.render(None, container).unwrap();
        assert_eq!(take_log(), vec!["foreign-unmount"]);
        assert_eq!(inner_html(rt.dom(), container), "");
    }

    #[test]
    fn test_opaque_boundary_hides_senior() {
        let (mut rt, container) = setup();
        ADAPTER.with(|a| *a.borrow_mut() = Some(Rc::new(Panel { transparent: false })));

        rt.render(Some(VNode::component(&FHOST)), container).unwrap();
        assert_eq!(SEEN_SENIOR.with(Cell::get), Some(None));
    }

    #[test]
    fn test_transparent_boundary_passes_senior() {
        let (mut rt, container) = setup();
        ADAPTER.with(|a| *a.borrow_mut() = Some(Rc::new(Panel { transparent: true })));

        rt.render(Some(VNode::component(&FHOST)), container).unwrap();
        let host = id_of("fhost");
        assert_eq!(SEEN_SENIOR.with(Cell::get), Some(Some(host)));
    }

    // ── Definition identity ─────────────────────────────────────────────────

    #[test]
    fn test_different_definition_remounts() {
        let (mut rt, container) = setup();
        rt.render(Some(VNode::component(&PROBE).prop("depth", 3)), container)
            .unwrap();
        take_log();

        rt.render(Some(VNode::component(&LABEL).prop("label", "x")), container)
            .unwrap();

        let entries = take_log();
        assert!(entries.contains(&"unmounted:3".to_string()));
        assert_eq!(inner_html(rt.dom(), container), "<span>x</span>");
        assert_eq!(rt.instance_count(), 1);
    }
}
