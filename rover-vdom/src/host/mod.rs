mod memory;

pub use memory::{HostOp, MemoryHost};

use crate::component::{ComponentId, ComponentType};
use crate::error::HostError;
use crate::value::{Listener, Value, ValueMap};
use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Reconciler bookkeeping attached to every host node
#[derive(Default)]
pub struct NodeMeta {
    /// Last applied attribute set; `None` until the reconciler first
    /// touches the node
    pub attributes: Option<ValueMap>,
    /// Outermost component whose output is rooted at this node
    pub component: Option<ComponentId>,
    pub component_type: Option<ComponentType>,
    pub normalized_name: Option<SmartString>,
    /// Handlers by event name, shared by the capture and bubble variants
    pub listeners: BTreeMap<SmartString, Listener>,
}

/// Event delivered to a registered listener
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: SmartString,
    pub target: NodeId,
    pub value: Value,
}

impl Event {
    pub fn new(kind: &str, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            value: Value::Nil,
        }
    }

    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

/// Capabilities the reconciler needs from a mutable host tree.
///
/// Mutations aimed at unknown nodes are no-ops. Only node creation and
/// direct property writes report failure.
pub trait HostAdapter {
    fn create_element(&mut self, tag: &str, namespaced: bool) -> Result<NodeId, HostError>;
    fn create_text(&mut self, text: &str) -> Result<NodeId, HostError>;

    /// Detach `node` from its parent, if attached
    fn remove_node(&mut self, node: NodeId);

    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn child_count(&self, node: NodeId) -> usize;
    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId>;
    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.child_at(node, 0)
    }
    fn last_child(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling(&self, node: NodeId) -> Option<NodeId>;
    fn previous_sibling(&self, node: NodeId) -> Option<NodeId>;

    /// Append `child`, moving it out of its current parent
    fn append_child(&mut self, parent: NodeId, child: NodeId);
    /// Insert `child` before `reference`, or append when `reference` is `None`
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>);
    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId);

    /// Tag name of an element; `None` for text nodes
    fn node_name(&self, node: NodeId) -> Option<&str>;
    fn is_text(&self, node: NodeId) -> bool;
    fn text(&self, node: NodeId) -> Option<&str>;
    fn set_text(&mut self, node: NodeId, text: &str);
    /// Whether the node lives in the secondary (svg) namespace
    fn in_namespace(&self, node: NodeId) -> bool;

    /// Whether `name` is a native property of the node
    fn has_property(&self, node: NodeId, name: &str) -> bool;
    fn property(&self, node: NodeId, name: &str) -> Option<Value>;
    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), HostError>;
    fn set_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str, value: &str);
    fn remove_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str);

    fn set_class(&mut self, node: NodeId, class: &str);
    /// Replace the whole inline style
    fn set_style_text(&mut self, node: NodeId, css: &str);
    /// Set one style property; an empty value clears it
    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str);
    fn set_inner_html(&mut self, node: NodeId, html: &str);

    fn add_event_listener(&mut self, node: NodeId, event: &str, capture: bool);
    fn remove_event_listener(&mut self, node: NodeId, event: &str, capture: bool);

    fn meta(&self, node: NodeId) -> Option<&NodeMeta>;
    fn meta_mut(&mut self, node: NodeId) -> Option<&mut NodeMeta>;
}
