use super::{HostAdapter, NodeId, NodeMeta};
use crate::error::HostError;
use crate::value::Value;
use smallvec::SmallVec;
use smartstring::alias::String as SmartString;
use std::collections::{BTreeMap, BTreeSet};

/// Host mutation captured by [`MemoryHost`]
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    CreateElement {
        node: NodeId,
        tag: SmartString,
        namespaced: bool,
    },
    CreateText {
        node: NodeId,
        text: SmartString,
    },
    Remove {
        node: NodeId,
    },
    Append {
        parent: NodeId,
        child: NodeId,
    },
    InsertBefore {
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    },
    Replace {
        parent: NodeId,
        new_child: NodeId,
        old_child: NodeId,
    },
    SetText {
        node: NodeId,
        text: SmartString,
    },
    SetAttribute {
        node: NodeId,
        namespace: Option<SmartString>,
        name: SmartString,
        value: String,
    },
    RemoveAttribute {
        node: NodeId,
        namespace: Option<SmartString>,
        name: SmartString,
    },
    SetProperty {
        node: NodeId,
        name: SmartString,
        value: Value,
    },
    SetClass {
        node: NodeId,
        class: String,
    },
    SetStyleText {
        node: NodeId,
        css: String,
    },
    SetStyle {
        node: NodeId,
        name: SmartString,
        value: String,
    },
    SetInnerHtml {
        node: NodeId,
        html: String,
    },
    AddListener {
        node: NodeId,
        event: SmartString,
        capture: bool,
    },
    RemoveListener {
        node: NodeId,
        event: SmartString,
        capture: bool,
    },
}

impl HostOp {
    pub fn is_create(&self) -> bool {
        matches!(self, HostOp::CreateElement { .. } | HostOp::CreateText { .. })
    }

    /// Whether the op changes tree structure (create, remove, move)
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            HostOp::CreateElement { .. }
                | HostOp::CreateText { .. }
                | HostOp::Remove { .. }
                | HostOp::Append { .. }
                | HostOp::InsertBefore { .. }
                | HostOp::Replace { .. }
        )
    }
}

enum NodeKind {
    Element { tag: SmartString, namespaced: bool },
    Text(SmartString),
}

type AttrName = (Option<SmartString>, SmartString);

struct HostNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Position in the parent's child list while attached
    slot: usize,
    children: SmallVec<[NodeId; 4]>,
    attributes: BTreeMap<AttrName, String>,
    properties: BTreeMap<SmartString, Value>,
    class: String,
    style: BTreeMap<SmartString, String>,
    inner_html: Option<String>,
    listeners: BTreeSet<(SmartString, bool)>,
    meta: NodeMeta,
}

impl HostNode {
    fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            parent: None,
            slot: 0,
            children: SmallVec::new(),
            attributes: BTreeMap::new(),
            properties: BTreeMap::new(),
            class: String::new(),
            style: BTreeMap::new(),
            inner_html: None,
            listeners: BTreeSet::new(),
            meta: NodeMeta::default(),
        }
    }
}

const NATIVE_PROPERTIES: &[&str] = &[
    "value", "checked", "selected", "disabled", "id", "title", "tabIndex", "hidden",
];

/// In-memory host tree that records every mutation it receives.
///
/// Nodes are never freed; a removed node stays addressable so recycled
/// handles remain valid.
pub struct MemoryHost {
    nodes: Vec<HostNode>,
    ops: Vec<HostOp>,
    native_properties: BTreeSet<SmartString>,
    rejected_properties: BTreeSet<SmartString>,
    failing_tags: BTreeSet<SmartString>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            ops: Vec::new(),
            native_properties: NATIVE_PROPERTIES.iter().map(|&p| p.into()).collect(),
            rejected_properties: BTreeSet::new(),
            failing_tags: BTreeSet::new(),
        }
    }

    /// Create a detached root element to render into. Not recorded.
    pub fn container(&mut self) -> NodeId {
        self.push_node(NodeKind::Element {
            tag: "root".into(),
            namespaced: false,
        })
    }

    /// Treat `name` as a native property on every element
    pub fn with_native_property(mut self, name: &str) -> Self {
        self.native_properties.insert(name.into());
        self
    }

    /// Make writes of property `name` fail
    pub fn reject_property(&mut self, name: &str) {
        self.rejected_properties.insert(name.into());
    }

    /// Make creation of `<tag>` elements fail
    pub fn fail_creation_of(&mut self, tag: &str) {
        self.failing_tags.insert(tag.into());
    }

    pub fn ops(&self) -> &[HostOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<HostOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn created_count(&self) -> usize {
        self.ops.iter().filter(|op| op.is_create()).count()
    }

    pub fn removed_count(&self) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, HostOp::Remove { .. }))
            .count()
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.get(node)
            .map(|n| n.children.to_vec())
            .unwrap_or_default()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.namespaced_attribute(node, None, name)
    }

    pub fn namespaced_attribute(
        &self,
        node: NodeId,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<&str> {
        let key: AttrName = (namespace.map(Into::into), name.into());
        self.get(node)?.attributes.get(&key).map(String::as_str)
    }

    pub fn class(&self, node: NodeId) -> &str {
        self.get(node).map_or("", |n| n.class.as_str())
    }

    pub fn style_property(&self, node: NodeId, name: &str) -> Option<&str> {
        self.get(node)?.style.get(name).map(String::as_str)
    }

    /// Inline style as `name: value` pairs joined by `; `
    pub fn style(&self, node: NodeId) -> String {
        self.get(node)
            .map(|n| {
                n.style
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default()
    }

    pub fn inner_html(&self, node: NodeId) -> Option<&str> {
        self.get(node)?.inner_html.as_deref()
    }

    pub fn listens_to(&self, node: NodeId, event: &str, capture: bool) -> bool {
        self.get(node)
            .is_some_and(|n| n.listeners.contains(&(event.into(), capture)))
    }

    /// Serialize a subtree, for assertions
    pub fn to_markup(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(node, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.get(id) else {
            return;
        };
        match &node.kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { tag, .. } => {
                out.push('<');
                out.push_str(tag);
                if !node.class.is_empty() {
                    out.push_str(&format!(" class=\"{}\"", node.class));
                }
                if !node.style.is_empty() {
                    out.push_str(&format!(" style=\"{}\"", self.style(id)));
                }
                for ((namespace, name), value) in &node.attributes {
                    match namespace {
                        Some(_) => out.push_str(&format!(" xlink:{name}=\"{value}\"")),
                        None => out.push_str(&format!(" {name}=\"{value}\"")),
                    }
                }
                out.push('>');
                if let Some(html) = &node.inner_html {
                    out.push_str(html);
                }
                for &child in &node.children {
                    self.write_markup(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(HostNode::new(kind));
        id
    }

    fn get(&self, id: NodeId) -> Option<&HostNode> {
        self.nodes.get(id.0 as usize)
    }

    fn get_mut(&mut self, id: NodeId) -> Option<&mut HostNode> {
        self.nodes.get_mut(id.0 as usize)
    }

    fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.get(id).map(|n| &n.kind),
            Some(NodeKind::Element { .. })
        )
    }

    /// Unlink `child` from its parent without recording anything
    fn detach(&mut self, child: NodeId) {
        let Some((parent, slot)) = self.get(child).and_then(|n| Some((n.parent?, n.slot))) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            if p.children.get(slot) == Some(&child) {
                p.children.remove(slot);
            }
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = None;
        }
        self.reindex(parent, slot);
    }

    /// Refresh the cached slots of `parent`'s children from `from` onward
    fn reindex(&mut self, parent: NodeId, from: usize) {
        let mut index = from;
        while let Some(child) = self.child_at(parent, index) {
            if let Some(c) = self.get_mut(child) {
                c.slot = index;
            }
            index += 1;
        }
    }

    fn index_of(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        let node = self.get(child)?;
        (node.parent == Some(parent)).then_some(node.slot)
    }

    fn sibling(&self, node: NodeId, offset: isize) -> Option<NodeId> {
        let parent = self.get(node)?.parent?;
        let index = self.index_of(parent, node)? as isize + offset;
        if index < 0 {
            return None;
        }
        self.child_at(parent, index as usize)
    }

    fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        let mut current = Some(parent);
        while let Some(node) = current {
            if node == child {
                return true;
            }
            current = self.get(node).and_then(|n| n.parent);
        }
        false
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostAdapter for MemoryHost {
    fn create_element(&mut self, tag: &str, namespaced: bool) -> Result<NodeId, HostError> {
        if self.failing_tags.contains(tag) {
            return Err(HostError::CreationRefused { tag: tag.into() });
        }
        let node = self.push_node(NodeKind::Element {
            tag: tag.into(),
            namespaced,
        });
        self.ops.push(HostOp::CreateElement {
            node,
            tag: tag.into(),
            namespaced,
        });
        Ok(node)
    }

    fn create_text(&mut self, text: &str) -> Result<NodeId, HostError> {
        let node = self.push_node(NodeKind::Text(text.into()));
        self.ops.push(HostOp::CreateText {
            node,
            text: text.into(),
        });
        Ok(node)
    }

    fn remove_node(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            self.detach(node);
            self.ops.push(HostOp::Remove { node });
        }
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.parent
    }

    fn child_count(&self, node: NodeId) -> usize {
        self.get(node).map_or(0, |n| n.children.len())
    }

    fn child_at(&self, node: NodeId, index: usize) -> Option<NodeId> {
        self.get(node)?.children.get(index).copied()
    }

    fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.get(node)?.children.last().copied()
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, 1)
    }

    fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        self.sibling(node, -1)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_element(parent) || self.get(child).is_none() || self.would_cycle(parent, child) {
            return;
        }
        self.detach(child);
        let slot = self.child_count(parent);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
            c.slot = slot;
        }
        self.ops.push(HostOp::Append { parent, child });
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.is_element(parent) || self.get(child).is_none() || self.would_cycle(parent, child) {
            return;
        }
        if reference == Some(child) {
            return;
        }
        self.detach(child);
        let index = reference
            .and_then(|r| self.index_of(parent, r))
            .unwrap_or_else(|| self.child_count(parent));
        if let Some(p) = self.get_mut(parent) {
            p.children.insert(index, child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
        self.reindex(parent, index);
        self.ops.push(HostOp::InsertBefore {
            parent,
            child,
            reference,
        });
    }

    fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) {
        if new_child == old_child
            || self.parent(old_child) != Some(parent)
            || self.get(new_child).is_none()
            || self.would_cycle(parent, new_child)
        {
            return;
        }
        self.detach(new_child);
        let Some(index) = self.index_of(parent, old_child) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children[index] = new_child;
        }
        if let Some(c) = self.get_mut(new_child) {
            c.parent = Some(parent);
            c.slot = index;
        }
        if let Some(c) = self.get_mut(old_child) {
            c.parent = None;
        }
        self.ops.push(HostOp::Replace {
            parent,
            new_child,
            old_child,
        });
    }

    fn node_name(&self, node: NodeId) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    fn is_text(&self, node: NodeId) -> bool {
        matches!(self.get(node).map(|n| &n.kind), Some(NodeKind::Text(_)))
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.get(node)?.kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(NodeKind::Text(current)) = self.get_mut(node).map(|n| &mut n.kind) {
            *current = text.into();
            self.ops.push(HostOp::SetText {
                node,
                text: text.into(),
            });
        }
    }

    fn in_namespace(&self, node: NodeId) -> bool {
        matches!(
            self.get(node).map(|n| &n.kind),
            Some(NodeKind::Element {
                namespaced: true,
                ..
            })
        )
    }

    fn has_property(&self, node: NodeId, name: &str) -> bool {
        self.is_element(node) && self.native_properties.contains(name)
    }

    fn property(&self, node: NodeId, name: &str) -> Option<Value> {
        self.get(node)?.properties.get(name).cloned()
    }

    fn set_property(&mut self, node: NodeId, name: &str, value: &Value) -> Result<(), HostError> {
        if self.rejected_properties.contains(name) {
            return Err(HostError::PropertyRejected { name: name.into() });
        }
        let target = self.get_mut(node).ok_or(HostError::UnknownNode(node))?;
        target.properties.insert(name.into(), value.clone());
        self.ops.push(HostOp::SetProperty {
            node,
            name: name.into(),
            value: value.clone(),
        });
        Ok(())
    }

    fn set_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str, value: &str) {
        if let Some(target) = self.get_mut(node) {
            target
                .attributes
                .insert((namespace.map(Into::into), name.into()), value.to_string());
            self.ops.push(HostOp::SetAttribute {
                node,
                namespace: namespace.map(Into::into),
                name: name.into(),
                value: value.to_string(),
            });
        }
    }

    fn remove_attribute(&mut self, node: NodeId, namespace: Option<&str>, name: &str) {
        if let Some(target) = self.get_mut(node) {
            let key: AttrName = (namespace.map(Into::into), name.into());
            if target.attributes.remove(&key).is_some() {
                self.ops.push(HostOp::RemoveAttribute {
                    node,
                    namespace: namespace.map(Into::into),
                    name: name.into(),
                });
            }
        }
    }

    fn set_class(&mut self, node: NodeId, class: &str) {
        if let Some(target) = self.get_mut(node) {
            target.class = class.to_string();
            self.ops.push(HostOp::SetClass {
                node,
                class: class.to_string(),
            });
        }
    }

    fn set_style_text(&mut self, node: NodeId, css: &str) {
        if let Some(target) = self.get_mut(node) {
            target.style.clear();
            for declaration in css.split(';') {
                if let Some((name, value)) = declaration.split_once(':') {
                    let (name, value) = (name.trim(), value.trim());
                    if !name.is_empty() && !value.is_empty() {
                        target.style.insert(name.into(), value.to_string());
                    }
                }
            }
            self.ops.push(HostOp::SetStyleText {
                node,
                css: css.to_string(),
            });
        }
    }

    fn set_style_property(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(target) = self.get_mut(node) {
            if value.is_empty() {
                target.style.remove(name);
            } else {
                target.style.insert(name.into(), value.to_string());
            }
            self.ops.push(HostOp::SetStyle {
                node,
                name: name.into(),
                value: value.to_string(),
            });
        }
    }

    fn set_inner_html(&mut self, node: NodeId, html: &str) {
        if !self.is_element(node) {
            return;
        }
        let children = self
            .get_mut(node)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            if let Some(c) = self.get_mut(child) {
                c.parent = None;
            }
        }
        if let Some(target) = self.get_mut(node) {
            target.inner_html = Some(html.to_string());
        }
        self.ops.push(HostOp::SetInnerHtml {
            node,
            html: html.to_string(),
        });
    }

    fn add_event_listener(&mut self, node: NodeId, event: &str, capture: bool) {
        if let Some(target) = self.get_mut(node) {
            target.listeners.insert((event.into(), capture));
            self.ops.push(HostOp::AddListener {
                node,
                event: event.into(),
                capture,
            });
        }
    }

    fn remove_event_listener(&mut self, node: NodeId, event: &str, capture: bool) {
        if let Some(target) = self.get_mut(node) {
            target.listeners.remove(&(event.into(), capture));
            self.ops.push(HostOp::RemoveListener {
                node,
                event: event.into(),
                capture,
            });
        }
    }

    fn meta(&self, node: NodeId) -> Option<&NodeMeta> {
        self.get(node).map(|n| &n.meta)
    }

    fn meta_mut(&mut self, node: NodeId) -> Option<&mut NodeMeta> {
        self.get_mut(node).map(|n| &mut n.meta)
    }
}
