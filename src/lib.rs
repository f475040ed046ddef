//! weft-vdom - Virtual DOM reconciliation engine
//!
//! ## Core Concepts
//!
//! **Vnode trees** describe what the UI should look like; the engine mounts
//! them into a retained DOM store and reconciles successive trees with
//! minimal mutation — keyed children diff with LIS-driven move
//! minimization, unchanged text writes skipped, props patched key-by-key.
//!
//! **Components** carry a behavior object through a deterministic
//! lifecycle (`init` → `before_mount` → `mounted` ⇄ `updated` →
//! `unmounted`), with mounted/updated callbacks buffered on a two-bucket
//! [`queue::MountedQueue`] flushed once per entry point, descendants
//! before ancestors.
//!
//! **Foreign subtrees** owned by other runtimes participate through a
//! three-operation boundary ([`foreign::ForeignNode`]); senior linkage
//! crosses it only when the boundary declares itself transparent.
//!
//! ## Modules
//! - `vnode`: vnode model, keys, children classification
//! - `props`: prop values and event handlers
//! - `refs`: ref callbacks and ref boxes
//! - `dom`: live-node arena with instrumented mutation ops
//! - `mount` / `patch`: the reconciliation walks
//! - `lis`: longest increasing subsequence
//! - `component`: behavior trait and lifecycle coordinator types
//! - `queue`: mounted queue
//! - `runtime`: instance registry and entry points
//! - `html`: HTML snapshots of the live DOM
//!
//! ## Usage
//!
//! ```
//! use weft_vdom::prelude::*;
//!
//! let mut rt = Runtime::new();
//! let container = rt.dom_mut().create_element("div");
//!
//! rt.render(Some(VNode::element("p").text_child("hello")), container)
//!     .unwrap();
//! assert_eq!(weft_vdom::html::inner_html(rt.dom(), container), "<p>hello</p>");
//!
//! rt.render(Some(VNode::element("p").text_child("world")), container)
//!     .unwrap();
//! assert_eq!(weft_vdom::html::inner_html(rt.dom(), container), "<p>world</p>");
//!
//! rt.render(None, container).unwrap();
//! assert_eq!(weft_vdom::html::inner_html(rt.dom(), container), "");
//! ```

// =============================================================================
// Modules
// =============================================================================

/// Vnode model: kinds, keys, children classification.
pub mod vnode;

/// Prop values, event handlers, prop-list operations.
pub mod props;

/// Ref callbacks and ref boxes.
pub mod refs;

/// Live DOM store with instrumented mutation ops.
pub mod dom;

/// First-render walk.
pub mod mount;

/// Reconciliation walk: props diff, keyed/non-keyed children, components.
pub mod patch;

/// Longest increasing subsequence.
pub mod lis;

/// Component behavior trait and lifecycle types.
pub mod component;

/// Mounted queue.
pub mod queue;

/// Foreign-runtime boundary.
pub mod foreign;

/// Instance registry and render entry points.
pub mod runtime;

/// HTML snapshots of the live DOM.
pub mod html;

/// Error types.
pub mod error;

/// Prelude for common imports.
pub mod prelude;

// =============================================================================
// Re-exports
// =============================================================================

// Vnode model
pub use vnode::{Children, ChildrenKind, Key, VNode, VNodeKind};

// Props
pub use props::{EventHandler, Props, PropsExt, Value};

// Refs
pub use refs::{create_ref, Ref, RefBox, RefTarget};

// DOM store
pub use dom::{Dom, DomId, MutationStats};

// Components
pub use component::{
    Component, ComponentDef, Ctx, InitResult, InstanceId, Lifecycle, ListenerId, UpdateRequest,
};

// Queue
pub use queue::MountedQueue;

// Foreign boundary
pub use foreign::ForeignNode;

// Runtime
pub use runtime::Runtime;

// Errors
pub use error::{VdomError, VdomResult};
