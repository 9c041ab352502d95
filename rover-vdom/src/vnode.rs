use crate::component::ComponentType;
use crate::value::{Value, ValueMap};
use smartstring::alias::String as SmartString;
use std::rc::Rc;

/// Identity hint used to match children across renders
pub type Key = SmartString;

/// What a virtual node describes: a host element or a component
#[derive(Debug, Clone)]
pub enum Tag {
    Element(SmartString),
    Component(ComponentType),
}

impl Tag {
    pub fn element_name(&self) -> Option<&str> {
        match self {
            Tag::Element(name) => Some(name),
            Tag::Component(_) => None,
        }
    }

    pub fn component_type(&self) -> Option<&ComponentType> {
        match self {
            Tag::Component(ty) => Some(ty),
            Tag::Element(_) => None,
        }
    }
}

impl From<&str> for Tag {
    fn from(name: &str) -> Self {
        Tag::Element(name.into())
    }
}

impl From<SmartString> for Tag {
    fn from(name: SmartString) -> Self {
        Tag::Element(name)
    }
}

impl From<ComponentType> for Tag {
    fn from(ty: ComponentType) -> Self {
        Tag::Component(ty)
    }
}

impl From<&ComponentType> for Tag {
    fn from(ty: &ComponentType) -> Self {
        Tag::Component(ty.clone())
    }
}

/// Immutable description of one node of the desired tree
#[derive(Debug, Clone)]
pub struct VNode {
    pub tag: Tag,
    pub attributes: Option<ValueMap>,
    pub children: Vec<Child>,
    pub key: Option<Key>,
}

impl VNode {
    pub fn is_component(&self) -> bool {
        matches!(self.tag, Tag::Component(_))
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref()?.get(name)
    }
}

/// A normalized child: either a nested node or a run of text
#[derive(Debug, Clone)]
pub enum Child {
    Node(VNode),
    Text(SmartString),
}

impl Child {
    /// What `null` and booleans render as
    pub fn empty() -> Self {
        Child::Text(SmartString::new())
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            Child::Node(node) => node.key.as_ref(),
            Child::Text(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&VNode> {
        match self {
            Child::Node(node) => Some(node),
            Child::Text(_) => None,
        }
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(text.into())
    }
}

/// Anything accepted as a child by [`h`] before normalization
#[derive(Debug, Clone)]
pub enum Renderable {
    Node(VNode),
    Text(SmartString),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    List(Vec<Renderable>),
}

impl From<VNode> for Renderable {
    fn from(node: VNode) -> Self {
        Renderable::Node(node)
    }
}

impl From<Child> for Renderable {
    fn from(child: Child) -> Self {
        match child {
            Child::Node(node) => Renderable::Node(node),
            Child::Text(text) => Renderable::Text(text),
        }
    }
}

impl From<&str> for Renderable {
    fn from(text: &str) -> Self {
        Renderable::Text(text.into())
    }
}

impl From<String> for Renderable {
    fn from(text: String) -> Self {
        Renderable::Text(text.into())
    }
}

impl From<SmartString> for Renderable {
    fn from(text: SmartString) -> Self {
        Renderable::Text(text)
    }
}

impl From<i32> for Renderable {
    fn from(i: i32) -> Self {
        Renderable::Int(i as i64)
    }
}

impl From<i64> for Renderable {
    fn from(i: i64) -> Self {
        Renderable::Int(i)
    }
}

impl From<f64> for Renderable {
    fn from(f: f64) -> Self {
        Renderable::Float(f)
    }
}

impl From<bool> for Renderable {
    fn from(b: bool) -> Self {
        Renderable::Bool(b)
    }
}

impl<T: Into<Renderable>> From<Option<T>> for Renderable {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Renderable::Nil)
    }
}

impl<T: Into<Renderable>> From<Vec<T>> for Renderable {
    fn from(items: Vec<T>) -> Self {
        Renderable::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Value> for Renderable {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Renderable::Text(s),
            Value::Int(i) => Renderable::Int(i),
            Value::Float(f) => Renderable::Float(f),
            Value::Bool(b) => Renderable::Bool(b),
            Value::Children(children) => Renderable::List(
                children.iter().cloned().map(Renderable::from).collect(),
            ),
            _ => Renderable::Nil,
        }
    }
}

/// Build a virtual node.
///
/// Children are flattened and normalized: `Nil` and booleans are dropped,
/// numbers become text and adjacent text runs are merged (for element tags
/// only). A `children` attribute is moved into the child list when no
/// explicit children are given. The `key` attribute is copied onto the node.
pub fn h(tag: impl Into<Tag>, attributes: Option<ValueMap>, children: Vec<Renderable>) -> VNode {
    let tag = tag.into();
    let mut attributes = attributes;
    let mut stack: Vec<Renderable> = children.into_iter().rev().collect();

    if let Some(attrs) = attributes.as_mut() {
        if let Some(value) = attrs.remove("children") {
            if stack.is_empty() {
                stack.push(Renderable::from(value));
            }
        }
    }

    let merge_text = matches!(tag, Tag::Element(_));
    let mut normalized: Vec<Child> = Vec::new();
    let mut last_was_text = false;

    while let Some(item) = stack.pop() {
        let text: SmartString = match item {
            Renderable::List(items) => {
                stack.extend(items.into_iter().rev());
                continue;
            }
            Renderable::Nil | Renderable::Bool(_) => continue,
            Renderable::Node(node) => {
                normalized.push(Child::Node(node));
                last_was_text = false;
                continue;
            }
            Renderable::Text(text) => text,
            Renderable::Int(i) => i.to_string().into(),
            Renderable::Float(f) => f.to_string().into(),
        };

        if merge_text && last_was_text {
            if let Some(Child::Text(previous)) = normalized.last_mut() {
                previous.push_str(&text);
                continue;
            }
        }
        normalized.push(Child::Text(text));
        last_was_text = true;
    }

    let key = attributes
        .as_ref()
        .and_then(|attrs| attrs.get("key"))
        .and_then(Value::as_key);

    VNode {
        tag,
        attributes,
        children: normalized,
        key,
    }
}

/// Copy a node, shallow-merging `props` over its attributes.
/// The original children are kept unless replacements are given.
pub fn clone_element(
    vnode: &VNode,
    props: Option<ValueMap>,
    children: Option<Vec<Renderable>>,
) -> VNode {
    let mut attributes = vnode.attributes.clone().unwrap_or_default();
    if let Some(props) = props {
        attributes.extend(props);
    }
    let children = children.unwrap_or_else(|| {
        vnode
            .children
            .iter()
            .cloned()
            .map(Renderable::from)
            .collect()
    });
    h(vnode.tag.clone(), Some(attributes), children)
}

/// Component props for a node: its attributes plus `children`, with
/// absent entries filled from the component type's default props.
pub fn node_props(vnode: &VNode) -> ValueMap {
    let mut props = vnode.attributes.clone().unwrap_or_default();
    props.insert(
        "children".into(),
        Value::Children(Rc::new(vnode.children.clone())),
    );

    if let Tag::Component(ty) = &vnode.tag {
        for (name, value) in ty.default_props() {
            props
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
    }

    props
}
