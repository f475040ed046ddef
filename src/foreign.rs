//! Foreign boundary: subtrees owned by another rendering runtime.
//!
//! The core touches a foreign subtree through exactly three operations —
//! mount, patch, unmount — and never inspects the payload. The adapter owns
//! everything below the handle it returns, including removing it on
//! unmount.
//!
//! An adapter that re-enters the core (mounting engine components inside
//! its subtree) does so through [`Runtime::render_with_senior`], passing
//! along the senior it was handed. The core hands a senior across the
//! boundary only when the adapter declares itself transparent; an opaque
//! boundary starts a fresh ancestry.

use crate::component::InstanceId;
use crate::dom::DomId;
use crate::error::VdomResult;
use crate::props::Value;
use crate::runtime::Runtime;

/// Capability implemented by foreign-runtime adapters.
pub trait ForeignNode {
    /// Realize the payload under `parent`, before `anchor` (append when
    /// `None`). Returns the handle the core will track for this subtree.
    /// `senior` is the nearest enclosing engine component, present only for
    /// transparent boundaries.
    fn mount(
        &self,
        rt: &mut Runtime,
        payload: &Value,
        parent: DomId,
        anchor: Option<DomId>,
        senior: Option<InstanceId>,
    ) -> VdomResult<DomId>;

    /// Reconcile an old payload against a new one on the tracked handle.
    fn patch(
        &self,
        rt: &mut Runtime,
        old_payload: &Value,
        new_payload: &Value,
        handle: DomId,
        senior: Option<InstanceId>,
    ) -> VdomResult<()>;

    /// Tear down the subtree, detaching the handle from the DOM.
    fn unmount(&self, rt: &mut Runtime, handle: DomId) -> VdomResult<()>;

    /// Whether senior linkage passes through this boundary. Opaque by
    /// default.
    fn transparent(&self) -> bool {
        false
    }
}
