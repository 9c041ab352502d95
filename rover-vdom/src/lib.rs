//! Retained-mode virtual tree reconciler.
//!
//! A [`Reconciler`] keeps a mutable host tree (anything implementing
//! [`HostAdapter`]) in sync with successive [`VNode`] trees built with
//! [`h`], mounting and updating [`Component`] instances along the way.

mod attrs;
mod diff;
mod lifecycle;

pub mod component;
pub mod error;
pub mod host;
pub mod options;
pub mod queue;
pub mod reconciler;
pub mod recycler;
pub mod value;
pub mod vnode;

pub use component::{
    Component, ComponentId, ComponentKind, ComponentType, Context, Props, Scope, Snapshot, State,
    StatePatch, Updater,
};
pub use error::{HostError, ReconcileError, Result};
pub use host::{Event, HostAdapter, HostOp, MemoryHost, NodeId, NodeMeta};
pub use options::{Hooks, Options};
pub use queue::{RenderQueue, RenderScheduler, TickScheduler};
pub use reconciler::Reconciler;
pub use recycler::RecyclePool;
pub use value::{RefTarget, Value, ValueMap, map};
pub use vnode::{Child, Key, Renderable, Tag, VNode, clone_element, h, node_props};

pub use attrs::XLINK_NAMESPACE;
