use crate::component::Context;
use crate::error::Result;
use crate::host::{HostAdapter, NodeId};
use crate::reconciler::Reconciler;
use crate::value::{Value, ValueMap};
use crate::vnode::{Child, Key, Tag, VNode};
use std::collections::HashMap;

impl<H: HostAdapter> Reconciler<H> {
    /// Reconcile `vnode` against `dom` (or a fresh node) and return the
    /// resulting host node.
    ///
    /// The outermost call of a pass sets the namespace and hydration flags
    /// and, unless it is a component root, fires queued `did_mount` hooks
    /// on the way out.
    pub(crate) fn diff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &Child,
        context: &Context,
        mount_all: bool,
        parent: Option<NodeId>,
        component_root: bool,
    ) -> Result<NodeId> {
        let outermost = self.pass.depth == 0;
        self.pass.depth += 1;
        if outermost {
            self.pass.svg_mode = parent.is_some_and(|p| self.host.in_namespace(p));
            self.pass.hydrating = dom.is_some_and(|d| !self.has_attribute_cache(d));
            tracing::trace!(hydrating = self.pass.hydrating, "diff pass start");
        }

        let result = self.idiff(dom, vnode, context, mount_all, component_root);

        if let (Ok(out), Some(parent)) = (&result, parent) {
            if self.host.parent(*out) != Some(parent) {
                self.host.append_child(parent, *out);
            }
        }

        self.pass.depth -= 1;
        if self.pass.depth == 0 {
            self.pass.hydrating = false;
            if !component_root {
                self.flush_mounts();
            }
        }
        result
    }

    /// `diff` without the pass bookkeeping
    pub(crate) fn idiff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &Child,
        context: &Context,
        mount_all: bool,
        component_root: bool,
    ) -> Result<NodeId> {
        match vnode {
            Child::Text(text) => self.diff_text(dom, text, component_root),
            Child::Node(node) => match &node.tag {
                Tag::Component(_) => self.build_component_from_vnode(dom, node, context, mount_all),
                Tag::Element(name) => {
                    let previous_svg = self.pass.svg_mode;
                    self.pass.svg_mode = match name.as_str() {
                        "svg" => true,
                        "foreignObject" => false,
                        _ => previous_svg,
                    };
                    let result = self.diff_element(dom, node, name, context, mount_all);
                    self.pass.svg_mode = previous_svg;
                    result
                }
            },
        }
    }

    fn diff_text(&mut self, dom: Option<NodeId>, text: &str, component_root: bool) -> Result<NodeId> {
        if let Some(dom) = dom {
            let owned_elsewhere = self
                .host
                .meta(dom)
                .is_some_and(|meta| meta.component.is_some());
            if self.host.is_text(dom)
                && self.host.parent(dom).is_some()
                && (!owned_elsewhere || component_root)
            {
                if self.host.text(dom) != Some(text) {
                    self.host.set_text(dom, text);
                }
                self.mark_managed(dom);
                return Ok(dom);
            }
        }

        let out = self.host.create_text(text)?;
        if let Some(dom) = dom {
            if let Some(parent) = self.host.parent(dom) {
                self.host.replace_child(parent, out, dom);
            }
            self.recollect_node_tree(dom, true);
        }
        self.mark_managed(out);
        Ok(out)
    }

    fn diff_element(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        name: &str,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId> {
        let out = match dom {
            Some(existing) if self.is_named_node(existing, name) => existing,
            _ => {
                let created = self.create_node(name, self.pass.svg_mode)?;
                if let Some(old) = dom {
                    // Carry the old children over to the replacement
                    while let Some(child) = self.host.first_child(old) {
                        self.host.append_child(created, child);
                        if self.host.parent(child) == Some(old) {
                            break;
                        }
                    }
                    if let Some(parent) = self.host.parent(old) {
                        self.host.replace_child(parent, created, old);
                    }
                    self.recollect_node_tree(old, true);
                }
                created
            }
        };

        let inner_html = match self.host.meta_mut(out) {
            Some(meta) => meta
                .attributes
                .get_or_insert_with(ValueMap::new)
                .get("dangerouslySetInnerHTML")
                .is_some_and(|value| !value.is_nil()),
            None => false,
        };

        let first = self.host.first_child(out);
        let single_text = match vnode.children.as_slice() {
            [Child::Text(text)] => Some(text),
            _ => None,
        };

        let fast_path = match (single_text, first) {
            (Some(_), Some(fc)) => {
                !self.pass.hydrating && self.host.is_text(fc) && self.host.next_sibling(fc).is_none()
            }
            _ => false,
        };

        if fast_path {
            if let (Some(text), Some(fc)) = (single_text, first) {
                if self.host.text(fc) != Some(text.as_str()) {
                    self.host.set_text(fc, text);
                }
            }
        } else if !vnode.children.is_empty() || first.is_some() {
            let hydrating = self.pass.hydrating || inner_html;
            self.inner_diff_node(out, &vnode.children, context, mount_all, hydrating)?;
        }

        self.diff_attributes(out, vnode.attributes.as_ref());
        Ok(out)
    }

    /// Match `vchildren` against the children of `dom`.
    ///
    /// Keyed host children are looked up by key; the rest are matched by
    /// kind in one forward scan. Only nodes the reconciler created (or any
    /// node while hydrating) are eligible for reuse.
    fn inner_diff_node(
        &mut self,
        dom: NodeId,
        vchildren: &[Child],
        context: &Context,
        mount_all: bool,
        is_hydrating: bool,
    ) -> Result<()> {
        let len = self.host.child_count(dom);
        let vlen = vchildren.len();

        // Keyed nodes keep insertion order; a repeated key shadows the
        // earlier node, which is still released at the end
        let mut keyed: Vec<Option<NodeId>> = Vec::new();
        let mut keyed_index: HashMap<Key, usize> = HashMap::new();
        let mut children: Vec<Option<NodeId>> = Vec::new();

        for i in 0..len {
            let Some(child) = self.host.child_at(dom, i) else {
                continue;
            };
            let cached = self.has_attribute_cache(child);
            let key = if vlen > 0 && cached {
                self.node_key(child)
            } else {
                None
            };

            if let Some(key) = key {
                keyed_index.insert(key, keyed.len());
                keyed.push(Some(child));
            } else if cached || self.is_adoptable(child, is_hydrating) {
                children.push(Some(child));
            }
        }

        let mut min = 0;
        let mut children_len = children.len();

        for (i, vchild) in vchildren.iter().enumerate() {
            let mut candidate = None;

            if let Some(key) = vchild.key() {
                if let Some(slot) = keyed_index.remove(key) {
                    candidate = keyed[slot].take();
                }
            } else if min < children_len {
                for j in min..children_len {
                    let Some(c) = children[j] else {
                        continue;
                    };
                    if self.is_same_node_type(c, vchild, is_hydrating) {
                        candidate = Some(c);
                        children[j] = None;
                        if j + 1 == children_len {
                            children_len -= 1;
                        }
                        if j == min {
                            min += 1;
                        }
                        break;
                    }
                }
            }

            let child = self.idiff(candidate, vchild, context, mount_all, false)?;

            if child == dom {
                continue;
            }
            if i >= len {
                self.host.append_child(dom, child);
            } else {
                let current = self.host.child_at(dom, i);
                if current != Some(child) {
                    if self.host.child_at(dom, i + 1) == Some(child) {
                        if let Some(current) = current {
                            self.host.remove_node(current);
                        }
                    } else {
                        self.host.insert_before(dom, child, current);
                    }
                }
            }
        }

        for node in keyed.into_iter().flatten() {
            self.recollect_node_tree(node, false);
        }

        let mut end = children_len;
        loop {
            if let Some(Some(child)) = children.get(end) {
                self.recollect_node_tree(*child, false);
            }
            if end <= min {
                break;
            }
            end -= 1;
        }
        Ok(())
    }

    /// Release a node: unmount its owning component, or clear its ref,
    /// detach it (unless `unmount_only` and it is managed) and recurse.
    pub(crate) fn recollect_node_tree(&mut self, node: NodeId, unmount_only: bool) {
        if let Some(component) = self.live_owner(node) {
            self.unmount_component(component);
            return;
        }

        let (managed, ref_callback) = match self.host.meta(node).and_then(|m| m.attributes.as_ref()) {
            Some(cache) => (true, cache.get("ref").and_then(Value::as_ref_callback)),
            None => (false, None),
        };
        if let Some(callback) = ref_callback {
            callback(None);
        }
        if !unmount_only || !managed {
            self.host.remove_node(node);
        }
        self.remove_children(node);
    }

    /// Recollect every child, walking from the last one backwards
    pub(crate) fn remove_children(&mut self, node: NodeId) {
        let mut current = self.host.last_child(node);
        while let Some(child) = current {
            let previous = self.host.previous_sibling(child);
            self.recollect_node_tree(child, true);
            current = previous;
        }
    }

    pub(crate) fn create_node(&mut self, name: &str, namespaced: bool) -> Result<NodeId> {
        let node = self.host.create_element(name, namespaced)?;
        if let Some(meta) = self.host.meta_mut(node) {
            meta.normalized_name = Some(name.into());
        }
        Ok(node)
    }

    pub(crate) fn is_named_node(&self, node: NodeId, name: &str) -> bool {
        let normalized = self
            .host
            .meta(node)
            .and_then(|meta| meta.normalized_name.as_deref())
            == Some(name);
        normalized
            || self
                .host
                .node_name(node)
                .is_some_and(|actual| actual.eq_ignore_ascii_case(name))
    }

    fn is_same_node_type(&self, node: NodeId, vchild: &Child, hydrating: bool) -> bool {
        match vchild {
            Child::Text(_) => self.host.is_text(node),
            Child::Node(vnode) => match &vnode.tag {
                Tag::Element(name) => {
                    let rendered_by_component = self
                        .host
                        .meta(node)
                        .is_some_and(|meta| meta.component_type.is_some());
                    !rendered_by_component && self.is_named_node(node, name)
                }
                Tag::Component(ty) => {
                    hydrating
                        || self
                            .host
                            .meta(node)
                            .and_then(|meta| meta.component_type.as_ref())
                            .is_some_and(|owner| owner == ty)
                }
            },
        }
    }

    /// Unmanaged nodes may only be reused as text (or anything, when hydrating)
    fn is_adoptable(&self, node: NodeId, is_hydrating: bool) -> bool {
        if self.host.is_text(node) {
            !is_hydrating || self.host.text(node).is_some_and(|t| !t.trim().is_empty())
        } else {
            is_hydrating
        }
    }

    /// Key of a host child: its owning component's key, else the cached `key`
    fn node_key(&self, node: NodeId) -> Option<Key> {
        let meta = self.host.meta(node)?;
        match meta.component {
            Some(id) => self.components.get(id)?.key.clone(),
            None => meta.attributes.as_ref()?.get("key")?.as_key(),
        }
    }

    pub(crate) fn has_attribute_cache(&self, node: NodeId) -> bool {
        self.host
            .meta(node)
            .is_some_and(|meta| meta.attributes.is_some())
    }

    fn mark_managed(&mut self, node: NodeId) {
        if let Some(meta) = self.host.meta_mut(node) {
            meta.attributes.get_or_insert_with(ValueMap::new);
        }
    }
}
