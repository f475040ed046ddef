//! Error types for weft-vdom.
//!
//! Structural faults abort the current walk and propagate to the entry-point
//! caller. Shape problems that reconciliation can work around (duplicate
//! sibling keys, mixed key sets) are not errors at all: they are reported
//! through `tracing::warn!` and diffing falls back to positional matching.

use thiserror::Error;

use crate::component::InstanceId;
use crate::dom::DomId;

/// Errors that abort a mount/patch walk.
#[derive(Debug, Error)]
pub enum VdomError {
    /// The render target is not a live element in the DOM store.
    #[error("mount target {0} is not a live element")]
    InvalidTarget(DomId),

    /// A vnode reached patch/removal without ever being mounted.
    #[error("vnode occupies a tree slot but carries no DOM handle")]
    NotMounted,

    /// A DOM handle points at a freed or out-of-range arena slot.
    #[error("dom handle {0} is dead")]
    DeadHandle(DomId),

    /// A component instance id that is no longer (or never was) registered.
    #[error("unknown component instance {0}")]
    DeadInstance(InstanceId),

    /// `resolve_init`/`reject_init` called for an instance with no pending init.
    #[error("component instance {0} has no pending init")]
    NotPending(InstanceId),

    /// A hook re-entered an instance whose behavior is already checked out.
    #[error("re-entrant hook call on component instance {0}")]
    ReentrantHook(InstanceId),

    /// A foreign adapter handed back a handle the DOM store does not own.
    #[error("foreign adapter returned dead handle {0}")]
    ForeignHandle(DomId),

    /// An asynchronous init was rejected by the host; the component never
    /// reaches `mounted`.
    #[error("init rejected for component `{component}`: {reason}")]
    InitRejected {
        /// Name from the component's definition.
        component: &'static str,
        /// Host-supplied rejection reason.
        reason: String,
    },
}

/// Result type alias for reconciliation operations.
pub type VdomResult<T> = Result<T, VdomError>;

impl VdomError {
    /// Create an `InitRejected` error with a message.
    pub fn init_rejected(component: &'static str, reason: impl Into<String>) -> Self {
        Self::InitRejected {
            component,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = VdomError::init_rejected("Loader", "network down");
        assert_eq!(
            err.to_string(),
            "init rejected for component `Loader`: network down"
        );

        let err = VdomError::NotMounted;
        assert_eq!(
            err.to_string(),
            "vnode occupies a tree slot but carries no DOM handle"
        );
    }
}
