use crate::host::{HostAdapter, NodeId};
use crate::reconciler::Reconciler;
use crate::value::{RefTarget, Value, ValueMap};
use regex::Regex;
use smartstring::alias::String as SmartString;
use std::sync::OnceLock;

pub const XLINK_NAMESPACE: &str = "http://www.w3.org/1999/xlink";

/// Style properties that take bare numbers
static UNITLESS: OnceLock<Regex> = OnceLock::new();

fn default_unitless() -> &'static Regex {
    UNITLESS.get_or_init(|| {
        Regex::new(r"(?i)acit|ex(?:s|g|n|p|$)|rph|ows|mnc|ntw|ine[ch]|zoo|^ord")
            .expect("unitless pattern is valid")
    })
}

impl<H: HostAdapter> Reconciler<H> {
    /// Converge the attributes of `dom` to `attrs`, using its cached
    /// attribute set as the baseline and updating that cache in place.
    pub(crate) fn diff_attributes(&mut self, dom: NodeId, attrs: Option<&ValueMap>) {
        let mut cache = self
            .host
            .meta_mut(dom)
            .and_then(|meta| meta.attributes.take())
            .unwrap_or_default();

        let stale: Vec<SmartString> = cache
            .iter()
            .filter(|(name, previous)| {
                let kept = attrs
                    .and_then(|a| a.get(name.as_str()))
                    .is_some_and(|value| !value.is_nil());
                !kept && !previous.is_nil()
            })
            .map(|(name, _)| name.clone())
            .collect();

        for name in stale {
            let previous = cache.insert(name.clone(), Value::Nil).unwrap_or(Value::Nil);
            self.set_accessor(dom, &name, &previous, &Value::Nil);
        }

        if let Some(attrs) = attrs {
            for (name, value) in attrs {
                if name == "children" || name == "innerHTML" {
                    continue;
                }
                let changed = match cache.get(name) {
                    None => true,
                    Some(previous) => {
                        let live = (name == "value" || name == "checked")
                            && self.host.has_property(dom, name);
                        if live {
                            let current = self.host.property(dom, name).unwrap_or(Value::Nil);
                            !value.eq_value(&current)
                        } else {
                            !value.eq_value(previous)
                        }
                    }
                };
                if changed {
                    let previous = cache.insert(name.clone(), value.clone()).unwrap_or(Value::Nil);
                    self.set_accessor(dom, name, &previous, value);
                }
            }
        }

        if let Some(meta) = self.host.meta_mut(dom) {
            meta.attributes = Some(cache);
        }
    }

    /// Apply one attribute change, honoring the reserved names
    pub(crate) fn set_accessor(&mut self, node: NodeId, name: &str, old: &Value, value: &Value) {
        let name = if name == "className" { "class" } else { name };
        let svg = self.pass.svg_mode;

        match name {
            "key" => {}
            "ref" => {
                if let Some(previous) = old.as_ref_callback() {
                    previous(None);
                }
                if let Some(callback) = value.as_ref_callback() {
                    callback(Some(RefTarget::Node(node)));
                }
            }
            "class" if !svg => {
                let class = if value.is_truthy() {
                    value.to_attr_string()
                } else {
                    String::new()
                };
                self.host.set_class(node, &class);
            }
            "style" => self.set_style(node, old, value),
            "dangerouslySetInnerHTML" => {
                if value.is_truthy() {
                    let html = value
                        .as_html()
                        .or_else(|| value.as_map()?.get("__html")?.as_str())
                        .unwrap_or("");
                    self.host.set_inner_html(node, html);
                }
            }
            _ if name.starts_with("on") => self.set_listener(node, name, old, value),
            _ if name != "list" && name != "type" && !svg && self.host.has_property(node, name) => {
                let assigned = if value.is_nil() {
                    Value::from("")
                } else {
                    value.clone()
                };
                if let Err(err) = self.host.set_property(node, name, &assigned) {
                    tracing::debug!(node = node.raw(), "ignoring property write: {}", err);
                }
                if value.is_absent() {
                    self.host.remove_attribute(node, None, name);
                }
            }
            _ => {
                let xlink = if svg {
                    name.strip_prefix("xlink")
                        .map(|rest| rest.strip_prefix(':').unwrap_or(rest).to_lowercase())
                } else {
                    None
                };
                let (namespace, attr) = match &xlink {
                    Some(local) => (Some(XLINK_NAMESPACE), local.as_str()),
                    None => (None, name),
                };
                if value.is_absent() {
                    self.host.remove_attribute(node, namespace, attr);
                } else if !value.is_callable() {
                    self.host.set_attribute(node, namespace, attr, &value.to_attr_string());
                }
            }
        }
    }

    fn set_style(&mut self, node: NodeId, old: &Value, value: &Value) {
        if !value.is_truthy() || value.as_str().is_some() || old.as_str().is_some() {
            let css = value.as_str().unwrap_or("");
            self.host.set_style_text(node, css);
        }

        let Some(style) = value.as_map() else {
            return;
        };
        if let Some(previous) = old.as_map() {
            for name in previous.keys() {
                if !style.contains_key(name) {
                    self.host.set_style_property(node, name, "");
                }
            }
        }
        for (name, entry) in style {
            let text = if entry.is_number() && !self.is_unitless(name) {
                format!("{}px", entry.to_attr_string())
            } else {
                entry.to_attr_string()
            };
            self.host.set_style_property(node, name, &text);
        }
    }

    fn is_unitless(&self, property: &str) -> bool {
        match &self.options.unitless {
            Some(pattern) => pattern.is_match(property),
            None => default_unitless().is_match(property),
        }
    }

    /// Attach or detach the host listener only when presence changes;
    /// the handler itself lives in the node metadata
    fn set_listener(&mut self, node: NodeId, name: &str, old: &Value, value: &Value) {
        let (base, capture) = match name.strip_suffix("Capture") {
            Some(base) => (base, true),
            None => (name, false),
        };
        let event: SmartString = base[2..].to_lowercase().into();

        if value.is_truthy() {
            if !old.is_truthy() {
                self.host.add_event_listener(node, &event, capture);
            }
        } else {
            self.host.remove_event_listener(node, &event, capture);
        }

        if let Some(meta) = self.host.meta_mut(node) {
            match value.as_listener() {
                Some(listener) => {
                    meta.listeners.insert(event, listener);
                }
                None => {
                    meta.listeners.remove(&event);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unitless_pattern() {
        let pattern = default_unitless();
        for property in ["opacity", "zIndex", "flexGrow", "lineHeight", "order", "zoom"] {
            assert!(pattern.is_match(property), "{property}");
        }
        for property in ["width", "marginTop", "fontSize", "borderRadius"] {
            assert!(!pattern.is_match(property), "{property}");
        }
    }
}
