//! Refs: the only sanctioned way for external code to reach into a mounted
//! subtree.
//!
//! A ref is resolved by the walk right after the node it sits on is
//! attached, and cleared during teardown. Both flavors from the reference
//! surface are supported: a callback invoked with the target, and a ref box
//! the caller polls.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::component::InstanceId;
use crate::dom::DomId;

/// What a ref resolves to: a live DOM handle for element/text vnodes, a
/// component instance for component vnodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget {
    Dom(DomId),
    Component(InstanceId),
}

impl RefTarget {
    /// The DOM handle, if this ref points at a DOM node.
    pub fn dom(self) -> Option<DomId> {
        match self {
            RefTarget::Dom(id) => Some(id),
            RefTarget::Component(_) => None,
        }
    }

    /// The instance id, if this ref points at a component.
    pub fn component(self) -> Option<InstanceId> {
        match self {
            RefTarget::Component(id) => Some(id),
            RefTarget::Dom(_) => None,
        }
    }
}

/// Shared cell the walk writes the current target into.
///
/// Single-threaded by contract: walks are cooperative and never overlap, so
/// a plain `Rc<Cell>` is the whole synchronization story.
#[derive(Clone, Default)]
pub struct RefBox(Rc<Cell<Option<RefTarget>>>);

impl RefBox {
    /// Create an empty ref box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current target, `None` while unmounted.
    pub fn get(&self) -> Option<RefTarget> {
        self.0.get()
    }

    pub(crate) fn put(&self, target: Option<RefTarget>) {
        self.0.set(target);
    }
}

impl fmt::Debug for RefBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefBox({:?})", self.0.get())
    }
}

/// Create a ref box to hand into [`crate::vnode::VNode::with_ref`].
pub fn create_ref() -> RefBox {
    RefBox::new()
}

/// A ref as carried by a vnode: callback or box.
#[derive(Clone)]
pub enum Ref {
    Callback(Rc<dyn Fn(Option<RefTarget>)>),
    Box(RefBox),
}

impl Ref {
    /// Wrap a callback ref.
    pub fn from_fn(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Ref::Callback(Rc::new(f))
    }

    /// Deliver a target (or clear with `None`).
    pub(crate) fn set(&self, target: Option<RefTarget>) {
        match self {
            Ref::Callback(f) => f(target),
            Ref::Box(b) => b.put(target),
        }
    }

    /// Identity comparison: two refs are the same when they share the
    /// underlying allocation.
    pub(crate) fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Ref::Callback(a), Ref::Callback(b)) => Rc::ptr_eq(a, b),
            (Ref::Box(a), Ref::Box(b)) => Rc::ptr_eq(&a.0, &b.0),
            _ => false,
        }
    }
}

impl From<RefBox> for Ref {
    fn from(b: RefBox) -> Self {
        Ref::Box(b)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Callback(cb) => write!(f, "Ref::Callback({:p})", Rc::as_ptr(cb)),
            Ref::Box(b) => write!(f, "Ref::Box({b:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_box_roundtrip() {
        let r = create_ref();
        assert_eq!(r.get(), None);

        r.put(Some(RefTarget::Dom(DomId::from_raw(3))));
        assert_eq!(r.get().and_then(RefTarget::dom), Some(DomId::from_raw(3)));

        r.put(None);
        assert_eq!(r.get(), None);
    }

    #[test]
    fn test_callback_ref_delivery() {
        let seen = Rc::new(Cell::new(None));
        let seen2 = seen.clone();
        let r = Ref::from_fn(move |t| seen2.set(t));

        r.set(Some(RefTarget::Dom(DomId::from_raw(7))));
        assert_eq!(seen.get(), Some(RefTarget::Dom(DomId::from_raw(7))));
    }

    #[test]
    fn test_ref_identity() {
        let b = create_ref();
        let r1: Ref = b.clone().into();
        let r2: Ref = b.into();
        assert!(r1.same(&r2));

        let r3: Ref = create_ref().into();
        assert!(!r1.same(&r3));
    }
}
