//! Prelude module for common imports.
//!
//! ```ignore
//! use weft_vdom::prelude::*;
//! ```

// Vnode model
pub use crate::vnode::{Children, ChildrenKind, Key, VNode, VNodeKind};

// Props
pub use crate::props::{EventHandler, Props, PropsExt, Value};

// Refs
pub use crate::refs::{create_ref, Ref, RefBox, RefTarget};

// DOM store
pub use crate::dom::{Dom, DomId, MutationStats};

// Components
pub use crate::component::{
    Component, ComponentDef, Ctx, InitResult, InstanceId, Lifecycle, ListenerId, UpdateRequest,
};

// Queue
pub use crate::queue::MountedQueue;

// Foreign boundary
pub use crate::foreign::ForeignNode;

// Runtime
pub use crate::runtime::Runtime;

// Snapshots
pub use crate::html::{inner_html, to_html};

// Errors
pub use crate::error::{VdomError, VdomResult};
