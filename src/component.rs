//! Component model: behavior trait, lifecycle states, instance records.
//!
//! A component vnode carries a `&'static ComponentDef`; mounting it builds
//! an [`Instance`] in the runtime's registry and drives the behavior object
//! through the lifecycle state machine:
//!
//! ```text
//! constructed → initializing → mounted ⇄ updating → unmounting → unmounted
//! ```
//!
//! Hooks run with a [`Ctx`] that exposes the instance's props, state
//! mutation, the active mounted queue (normal and priority push), the
//! senior link, and the per-instance event surface.

use std::fmt;
use std::rc::Rc;

use compact_str::CompactString;
use rustc_hash::FxHashMap;

use crate::dom::{Dom, DomId};
use crate::error::VdomResult;
use crate::props::{Props, PropsExt, Value};
use crate::queue::MountedQueue;
use crate::runtime::Runtime;
use crate::vnode::VNode;

// =============================================================================
// Identity
// =============================================================================

/// Handle to a component instance in the runtime registry.
///
/// Allocated from a monotone counter and never reused, so a stored id is a
/// true weak reference: lookup after unmount simply fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    /// Raw counter value.
    #[inline]
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// Handle to a registered event listener, used with `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Instance event listener. Change/receive notifications pass
/// `[new, old]`; `trigger` passes whatever the caller supplies.
pub type Listener = Rc<dyn Fn(&[Value])>;

// =============================================================================
// ComponentDef
// =============================================================================

/// Static definition of a component kind: its display name and constructor.
///
/// Identity is pointer identity of the `&'static` definition — the diff
/// reuses an instance only when old and new vnodes point at the *same*
/// definition.
pub struct ComponentDef {
    /// Display name, used in diagnostics and errors.
    pub name: &'static str,
    /// Construct a fresh behavior object.
    pub create: fn() -> Box<dyn Component>,
}

impl ComponentDef {
    /// Define a component kind.
    pub const fn new(name: &'static str, create: fn() -> Box<dyn Component>) -> Self {
        Self { name, create }
    }

    /// Definition identity: same `&'static` allocation.
    #[inline]
    pub fn same(a: &'static ComponentDef, b: &'static ComponentDef) -> bool {
        std::ptr::eq(a, b)
    }
}

impl fmt::Debug for ComponentDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDef").field("name", &self.name).finish()
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

/// Lifecycle state of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Constructed,
    Initializing,
    Mounted,
    Updating,
    Unmounting,
    Unmounted,
}

/// What `init` reports back to the mount walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitResult {
    /// Proceed with render and attach inside the current walk.
    Ready,
    /// Reserve a placeholder; the host completes the mount later through
    /// [`Runtime::resolve_init`] under a fresh queue scope.
    Pending,
}

/// What `before_update` reports back to the coordinator: run the update
/// inline, or reschedule the actual work onto the active mounted queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateRequest {
    Run,
    Defer,
}

// =============================================================================
// Component trait
// =============================================================================

/// Behavior of a component kind. Every hook except `render` is optional.
///
/// `render` is the pure mapping from current props/state to an inner vnode
/// tree; returning `None` renders nothing and the instance keeps a stable
/// empty anchor in the DOM instead.
pub trait Component: 'static {
    /// Produce the inner vnode tree from current props/state.
    fn render(&mut self, cx: &mut Ctx<'_>) -> Option<VNode>;

    /// First hook after construction and prop assignment. Returning
    /// [`InitResult::Pending`] suspends the mount at a placeholder.
    fn init(&mut self, _cx: &mut Ctx<'_>) -> InitResult {
        InitResult::Ready
    }

    /// Runs right before the first render's subtree is mounted.
    fn before_mount(&mut self, _cx: &mut Ctx<'_>) {}

    /// Enqueued on the active mounted queue once the subtree is attached;
    /// runs at flush, descendants before ancestors.
    fn mounted(&mut self, _cx: &mut Ctx<'_>) {}

    /// Runs when an update is requested; may defer the actual work onto the
    /// mounted queue by returning [`UpdateRequest::Defer`].
    fn before_update(&mut self, _cx: &mut Ctx<'_>) -> UpdateRequest {
        UpdateRequest::Run
    }

    /// Enqueued once the inner diff completes; runs at flush.
    fn updated(&mut self, _cx: &mut Ctx<'_>) {}

    /// Runs before the instance's DOM is detached.
    fn before_unmount(&mut self, _cx: &mut Ctx<'_>) {}

    /// Runs after detach, once every descendant finished its own teardown.
    fn unmounted(&mut self, _cx: &mut Ctx<'_>) {}
}

/// Selector for the hooks the coordinator enqueues or fires directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    BeforeMount,
    Mounted,
    Updated,
    BeforeUnmount,
    Unmounted,
}

// =============================================================================
// Instance record
// =============================================================================

/// Registry record for one live component.
pub(crate) struct Instance {
    pub(crate) def: &'static ComponentDef,
    /// Behavior object; `None` while a hook has it checked out.
    pub(crate) behavior: Option<Box<dyn Component>>,
    pub(crate) props: Props,
    pub(crate) state: Lifecycle,
    /// Nearest ancestor component; dangles harmlessly once the senior
    /// unmounts (ids are never reused).
    pub(crate) senior: Option<InstanceId>,
    /// Rendered inner tree; `None` while pending or rendering nothing.
    pub(crate) rendered: Option<VNode>,
    /// Stable empty anchor reserved while pending or rendering nothing.
    pub(crate) placeholder: Option<DomId>,
    /// The DOM element the inner tree mounts into.
    pub(crate) parent_dom: DomId,
    /// Awaiting `resolve_init`.
    pub(crate) pending: bool,
    /// An update job is already sitting in a queue; coalesce further requests.
    pub(crate) deferred_update: bool,
    pub(crate) listeners: FxHashMap<CompactString, Vec<(ListenerId, Listener)>>,
}

impl Instance {
    pub(crate) fn new(
        def: &'static ComponentDef,
        props: Props,
        senior: Option<InstanceId>,
        parent_dom: DomId,
    ) -> Self {
        Self {
            def,
            behavior: Some((def.create)()),
            props,
            state: Lifecycle::Constructed,
            senior,
            rendered: None,
            placeholder: None,
            parent_dom,
            pending: false,
            deferred_update: false,
            listeners: FxHashMap::default(),
        }
    }
}

// =============================================================================
// Hook context
// =============================================================================

/// What a hook sees while it runs: its own instance, the active queue, and
/// read access to the DOM store.
pub struct Ctx<'a> {
    pub(crate) rt: &'a mut Runtime,
    pub(crate) queue: &'a mut MountedQueue,
    pub(crate) id: InstanceId,
}

impl Ctx<'_> {
    /// This instance's id.
    #[inline]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Current props.
    pub fn props(&self) -> &Props {
        self.rt
            .props_of(self.id)
            .expect("instance unregistered while its hook is running")
    }

    /// One prop by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.props().get_prop(name)
    }

    /// Merge one key into own props, emit `change:<key>`, and request an
    /// update pass. The update runs as its own entry point once the current
    /// hook returns.
    pub fn set(&mut self, key: impl Into<CompactString>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        self.rt.merge_own_prop(self.id, key, value);
        self.rt.request_update(self.id, self.queue);
    }

    /// Request an update pass without touching props.
    pub fn force_update(&mut self) {
        self.rt.request_update(self.id, self.queue);
    }

    /// Nearest ancestor component, if it is still live.
    pub fn senior(&self) -> Option<InstanceId> {
        self.rt.senior_of(self.id)
    }

    /// Register a listener on this instance. Returns the id used with
    /// [`Ctx::off`].
    pub fn on(&mut self, event: impl Into<CompactString>, listener: impl Fn(&[Value]) + 'static) -> ListenerId {
        self.rt.add_listener(self.id, event.into(), Rc::new(listener))
    }

    /// Remove a listener by registration id.
    pub fn off(&mut self, event: &str, listener: ListenerId) {
        self.rt.remove_listener(self.id, event, listener);
    }

    /// Emit an event through this instance's listener table.
    pub fn trigger(&mut self, event: &str, args: &[Value]) {
        self.rt.emit(self.id, event, args);
    }

    /// Push a callback onto the normal bucket of the active queue.
    pub fn enqueue(&mut self, job: impl FnOnce(&mut Runtime) + 'static) {
        self.queue.push(job);
    }

    /// Push a callback onto the priority bucket: it runs before every
    /// normal-bucket callback of this flush, regardless of depth.
    pub fn enqueue_priority(&mut self, job: impl FnOnce(&mut Runtime) + 'static) {
        self.queue.push_priority(job);
    }

    /// Read access to the DOM store.
    pub fn dom(&self) -> &Dom {
        self.rt.dom()
    }

    /// Mount-target element of this instance's inner tree.
    pub fn parent_dom(&self) -> VdomResult<DomId> {
        self.rt.parent_dom_of(self.id)
    }
}
