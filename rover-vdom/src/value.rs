use crate::component::ComponentId;
use crate::host::{Event, NodeId};
use crate::vnode::{Child, Key};
use smartstring::alias::String as SmartString;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Name -> value mapping used for attributes, props, state and context
pub type ValueMap = BTreeMap<SmartString, Value>;

/// Event handler stored under an `on*` attribute
pub type Listener = Rc<dyn Fn(&Event)>;

/// Callback stored under a `ref` attribute or prop
pub type RefCallback = Rc<dyn Fn(Option<RefTarget>)>;

/// What a ref callback is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefTarget {
    Node(NodeId),
    Component(ComponentId),
}

/// Dynamic value carried by attributes, props, state and context
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(SmartString),
    /// Nested mapping, e.g. a style object
    Map(Rc<ValueMap>),
    /// Raw markup for `dangerouslySetInnerHTML`
    Html(Rc<str>),
    Listener(Listener),
    Ref(RefCallback),
    /// Child list handed to components as `props.children`
    Children(Rc<Vec<Child>>),
}

impl Value {
    pub fn listener(f: impl Fn(&Event) + 'static) -> Self {
        Value::Listener(Rc::new(f))
    }

    pub fn node_ref(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Value::Ref(Rc::new(f))
    }

    pub fn html(markup: &str) -> Self {
        Value::Html(Rc::from(markup))
    }

    pub fn map<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<SmartString>,
        V: Into<Value>,
    {
        Value::Map(Rc::new(map(entries)))
    }

    /// Compare values for change detection
    /// Callbacks and child lists compare by reference, maps structurally
    pub fn eq_value(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => {
                if a.is_nan() && b.is_nan() {
                    true
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                Rc::ptr_eq(a, b)
                    || (a.len() == b.len()
                        && a.iter()
                            .zip(b.iter())
                            .all(|((ka, va), (kb, vb))| ka == kb && va.eq_value(vb)))
            }
            (Value::Html(a), Value::Html(b)) => a == b,
            (Value::Listener(a), Value::Listener(b)) => {
                std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
            }
            (Value::Ref(a), Value::Ref(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            (Value::Children(a), Value::Children(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Truthiness as seen by the attribute rules (empty strings and zero are falsy)
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// `null` or `false`: the values that remove an attribute
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Listener(_) | Value::Ref(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_html(&self) -> Option<&str> {
        match self {
            Value::Html(markup) => Some(markup),
            _ => None,
        }
    }

    pub fn as_listener(&self) -> Option<Listener> {
        match self {
            Value::Listener(listener) => Some(Rc::clone(listener)),
            _ => None,
        }
    }

    pub fn as_ref_callback(&self) -> Option<RefCallback> {
        match self {
            Value::Ref(callback) => Some(Rc::clone(callback)),
            _ => None,
        }
    }

    pub fn as_children(&self) -> Option<&[Child]> {
        match self {
            Value::Children(children) => Some(children),
            _ => None,
        }
    }

    /// Identity key derived from a `key` attribute
    pub fn as_key(&self) -> Option<Key> {
        match self {
            Value::String(s) => Some(s.clone()),
            Value::Int(i) => Some(i.to_string().into()),
            Value::Float(f) => Some(f.to_string().into()),
            Value::Bool(b) => Some(if *b { "true" } else { "false" }.into()),
            _ => None,
        }
    }

    /// Convert to the string written into a host attribute
    pub fn to_attr_string(&self) -> String {
        match self {
            Value::Nil => String::new(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => s.to_string(),
            Value::Html(markup) => markup.to_string(),
            Value::Map(_) => "[object]".to_string(),
            Value::Listener(_) | Value::Ref(_) => String::new(),
            Value::Children(_) => String::new(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.eq_value(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "Nil"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Html(markup) => write!(f, "Html({markup:?})"),
            Value::Listener(_) => write!(f, "Listener"),
            Value::Ref(_) => write!(f, "Ref"),
            Value::Children(children) => write!(f, "Children(len={})", children.len()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<SmartString> for Value {
    fn from(s: SmartString) -> Self {
        Value::String(s)
    }
}

impl From<ValueMap> for Value {
    fn from(map: ValueMap) -> Self {
        Value::Map(Rc::new(map))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// Build a [`ValueMap`] from key/value pairs
pub fn map<I, K, V>(entries: I) -> ValueMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<SmartString>,
    V: Into<Value>,
{
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
