use crate::component::{ComponentId, ComponentType, Context, Props, Scope, Snapshot};
use crate::error::{ReconcileError, Result};
use crate::host::{HostAdapter, NodeId};
use crate::reconciler::Reconciler;
use crate::value::{RefTarget, Value};
use crate::vnode::{Child, VNode, node_props};
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RenderMode {
    /// Apply props only
    NoRender,
    Sync,
    /// Synchronous, skipping `should_update`
    Force,
    /// Queued, or synchronous when the options say so
    Async,
}

impl<H: HostAdapter> Reconciler<H> {
    /// Give `id` new props and context, then render it as `mode` asks.
    /// Dropped silently while the instance is disabled.
    pub(crate) fn set_component_props(
        &mut self,
        id: ComponentId,
        mut props: Props,
        mode: RenderMode,
        context: Context,
        mount_all: bool,
    ) -> Result<()> {
        let sync_updates = self.options.sync_component_updates;
        let Some(inst) = self.components.get_mut(id) else {
            return Ok(());
        };
        if inst.disabled {
            return Ok(());
        }
        inst.disabled = true;

        inst.ref_callback = props.remove("ref").and_then(|r| r.as_ref_callback());
        inst.key = props.remove("key").and_then(|k| k.as_key());

        if inst.base.is_none() || mount_all {
            inst.call(|c, scope| c.will_mount(scope));
        } else {
            inst.call(|c, scope| c.will_receive_props(scope, &props, &context));
        }

        if !Rc::ptr_eq(&context, &inst.context) {
            if inst.prev_context.is_none() {
                inst.prev_context = Some(inst.context.clone());
            }
            inst.context = context;
        }

        let previous = std::mem::replace(&mut inst.props, props);
        if inst.prev_props.is_none() {
            inst.prev_props = Some(previous);
        }

        inst.disabled = false;
        let has_base = inst.base.is_some();
        let updater = inst.updater.clone();

        if mode != RenderMode::NoRender {
            if mode == RenderMode::Sync || sync_updates || !has_base {
                self.render_component(id, RenderMode::Sync, mount_all, false)?;
            } else {
                updater.enqueue();
            }
        }

        if let Some(callback) = self.components.get(id).and_then(|inst| inst.ref_callback.clone()) {
            callback(Some(RefTarget::Component(id)));
        }
        Ok(())
    }

    /// Render `id` and reconcile its output, handling delegation to a
    /// nested component and the post-render hooks.
    pub(crate) fn render_component(
        &mut self,
        id: ComponentId,
        mode: RenderMode,
        mount_all: bool,
        is_child: bool,
    ) -> Result<()> {
        let Some(inst) = self.components.get_mut(id) else {
            return Ok(());
        };
        if inst.disabled {
            return Ok(());
        }

        inst.apply_pending_state();

        let is_update = inst.base.is_some();
        let next_base = inst.next_base;
        let initial_base = inst.base.or(next_base);
        let initial_child = inst.child;
        let previous_props = inst.prev_props.take();
        let previous_state = inst.prev_state.take();
        let previous_context = inst.prev_context.take();
        let mut skip = false;

        if is_update {
            // Hooks see the values being replaced; the incoming ones are `next`
            let scope = Scope {
                props: previous_props.as_ref().unwrap_or(&inst.props),
                state: previous_state.as_ref().unwrap_or(&inst.state),
                context: previous_context.as_ref().unwrap_or(&inst.context),
                id,
                updater: &inst.updater,
            };
            let next = Snapshot {
                props: &inst.props,
                state: &inst.state,
                context: &inst.context,
            };
            if mode != RenderMode::Force && !inst.component.should_update(&scope, &next) {
                skip = true;
            } else {
                inst.component.will_update(&scope, &next);
            }
        }

        inst.next_base = None;
        inst.updater.mark_clean();
        let updater = inst.updater.clone();

        if !skip {
            let (rendered, context) = {
                let rendered = inst.call(|c, scope| c.render(scope));
                let context = match inst.call(|c, scope| c.child_context(scope)) {
                    Some(extra) => {
                        let mut merged = (*inst.context).clone();
                        merged.extend(extra);
                        Rc::new(merged)
                    }
                    None => inst.context.clone(),
                };
                (rendered, context)
            };
            let output = match rendered {
                Some(mut vnode) => {
                    self.options.hooks.apply_vnode(&mut vnode);
                    Child::Node(vnode)
                }
                None => Child::empty(),
            };

            let mut to_unmount = None;
            let mut new_child = None;
            let base;

            let delegate = match &output {
                Child::Node(vnode) => vnode.tag.component_type().map(|ty| (vnode, ty.clone())),
                Child::Text(_) => None,
            };

            if let Some((vnode, child_ty)) = delegate {
                let child_props = node_props(vnode);
                let child_key = child_props.get("key").and_then(Value::as_key);
                let reusable = initial_child.filter(|child| {
                    self.components
                        .get(*child)
                        .is_some_and(|c| c.ty == child_ty && c.key == child_key)
                });

                let child = match reusable {
                    Some(child) => {
                        self.set_component_props(child, child_props, RenderMode::Sync, context, false)?;
                        child
                    }
                    None => {
                        to_unmount = initial_child;
                        let child = self.create_component(&child_ty, child_props.clone(), context.clone());
                        if let Some(c) = self.components.get_mut(child) {
                            if c.next_base.is_none() {
                                c.next_base = next_base;
                            }
                            c.parent = Some(id);
                        }
                        if let Some(inst) = self.components.get_mut(id) {
                            inst.child = Some(child);
                        }
                        self.set_component_props(child, child_props, RenderMode::NoRender, context, false)?;
                        self.render_component(child, RenderMode::Sync, mount_all, true)?;
                        child
                    }
                };
                new_child = Some(child);
                base = self.components.get(child).and_then(|c| c.base);
            } else {
                let mut cbase = initial_base;
                to_unmount = initial_child;
                if to_unmount.is_some() {
                    cbase = None;
                    if let Some(inst) = self.components.get_mut(id) {
                        inst.child = None;
                    }
                }

                if initial_base.is_some() || matches!(mode, RenderMode::Sync | RenderMode::Force) {
                    if let Some(node) = cbase {
                        self.clear_owner(node);
                    }
                    let parent = initial_base.and_then(|node| self.host.parent(node));
                    base = Some(self.diff(cbase, &output, &context, mount_all || !is_update, parent, true)?);
                } else {
                    base = None;
                }
            }

            if let (Some(initial), Some(current)) = (initial_base, base) {
                if current != initial && new_child != initial_child {
                    if let Some(base_parent) = self.host.parent(initial) {
                        if current != base_parent {
                            self.host.replace_child(base_parent, current, initial);
                            if to_unmount.is_none() {
                                self.clear_owner(initial);
                                self.recollect_node_tree(initial, false);
                            }
                        }
                    }
                }
            }

            if let Some(old) = to_unmount {
                self.unmount_component(old);
            }

            if let Some(inst) = self.components.get_mut(id) {
                inst.base = base;
            }

            if let (Some(node), false) = (base, is_child) {
                self.claim_for_outermost(id, node);
            }
        }

        if !is_update || mount_all {
            self.mounts.push_back(id);
        } else if !skip {
            // Children finish mounting before the parent hears about its update
            self.flush_mounts();
            if let Some(inst) = self.components.get_mut(id) {
                let previous = Snapshot {
                    props: previous_props.as_ref().unwrap_or(&inst.props),
                    state: previous_state.as_ref().unwrap_or(&inst.state),
                    context: previous_context.as_ref().unwrap_or(&inst.context),
                };
                let scope = Scope {
                    props: &inst.props,
                    state: &inst.state,
                    context: &inst.context,
                    id,
                    updater: &inst.updater,
                };
                inst.component.did_update(&scope, &previous);
            }
            if let Some(hook) = self.options.hooks.after_update.clone() {
                hook(id);
            }
        }

        while let Some(callback) = updater.pop_callback() {
            callback();
        }

        if self.pass.depth == 0 && !is_child {
            self.flush_mounts();
        }

        // State set from should_update/will_update arrived while still dirty
        if updater.has_patches() && self.components.contains(id) {
            updater.enqueue();
        }
        Ok(())
    }

    /// Resolve a component-typed node against `dom`: update the owning
    /// instance when the type matches, otherwise mount a new one.
    pub(crate) fn build_component_from_vnode(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId> {
        let Some(ty) = vnode.tag.component_type() else {
            return self.idiff(dom, &Child::Node(vnode.clone()), context, mount_all, false);
        };

        let original = dom.and_then(|node| self.live_owner(node));
        let is_direct_owner = original.is_some()
            && dom
                .and_then(|node| self.host.meta(node))
                .and_then(|meta| meta.component_type.as_ref())
                .is_some_and(|owner| owner == ty);
        let props = node_props(vnode);

        let mut candidate = original;
        let mut is_owner = is_direct_owner;
        while let Some(current) = candidate {
            if is_owner {
                break;
            }
            candidate = self.components.get(current).and_then(|inst| inst.parent);
            if let Some(parent) = candidate {
                is_owner = self.components.get(parent).is_some_and(|inst| inst.ty == *ty);
            }
        }

        if let Some(owner) = candidate.filter(|_| is_owner) {
            let has_child = self
                .components
                .get(owner)
                .is_some_and(|inst| inst.child.is_some());
            if !mount_all || has_child {
                self.set_component_props(owner, props, RenderMode::Async, context.clone(), mount_all)?;
                return self
                    .components
                    .get(owner)
                    .and_then(|inst| inst.base)
                    .ok_or(ReconcileError::Detached(owner));
            }
        }

        let mut dom = dom;
        let mut old_dom = dom;
        if let Some(previous) = original {
            if !is_direct_owner {
                self.unmount_component(previous);
                dom = None;
                old_dom = None;
            }
        }

        let id = self.create_component(ty, props.clone(), context.clone());
        if let Some(node) = dom {
            if let Some(inst) = self.components.get_mut(id) {
                if inst.next_base.is_none() {
                    inst.next_base = Some(node);
                    old_dom = None;
                }
            }
        }
        self.set_component_props(id, props, RenderMode::Sync, context.clone(), mount_all)?;
        let base = self.components.get(id).and_then(|inst| inst.base);

        if let Some(old) = old_dom {
            if base != Some(old) {
                self.clear_owner(old);
                self.recollect_node_tree(old, false);
            }
        }

        base.ok_or(ReconcileError::Detached(id))
    }

    /// Tear down `id`: hooks, nested delegate, owned host node, refs.
    /// The instance leaves the arena; a node it owned goes to the pool.
    pub(crate) fn unmount_component(&mut self, id: ComponentId) {
        if !self.components.contains(id) {
            return;
        }
        if let Some(hook) = self.options.hooks.before_unmount.clone() {
            hook(id);
        }

        let Some(inst) = self.components.get_mut(id) else {
            return;
        };
        tracing::debug!(component = inst.ty.name(), "unmounting");
        let base = inst.base.take();
        inst.disabled = true;
        inst.call(|c, scope| c.will_unmount(scope));
        let inner = inst.child;
        let ref_callback = inst.ref_callback.take();

        if let Some(inner) = inner {
            self.unmount_component(inner);
        } else if let Some(node) = base {
            let node_ref = self
                .host
                .meta(node)
                .and_then(|meta| meta.attributes.as_ref())
                .and_then(|cache| cache.get("ref"))
                .and_then(Value::as_ref_callback);
            if let Some(callback) = node_ref {
                callback(None);
            }

            self.host.remove_node(node);
            if let Some(mut inst) = self.components.remove(id) {
                inst.next_base = Some(node);
                inst.updater.retire();
                self.pool.reclaim(inst);
            }
            self.remove_children(node);
        }

        if let Some(callback) = ref_callback {
            callback(None);
        }
        if let Some(inst) = self.components.remove(id) {
            inst.updater.retire();
        }
    }

    /// Fire `did_mount` for everything queued, in completion order
    pub(crate) fn flush_mounts(&mut self) {
        while let Some(id) = self.mounts.pop_front() {
            if !self.components.contains(id) {
                continue;
            }
            if let Some(hook) = self.options.hooks.after_mount.clone() {
                hook(id);
            }
            if let Some(inst) = self.components.get_mut(id) {
                inst.call(|c, scope| c.did_mount(scope));
            }
        }
    }

    /// Fresh instance of `ty`, inheriting a pooled host node if one exists
    pub(crate) fn create_component(&mut self, ty: &ComponentType, props: Props, context: Context) -> ComponentId {
        let queue = self.queue.clone();
        let pool = &mut self.pool;
        let id = self
            .components
            .insert_with(|id| pool.obtain(id, ty, props, context, queue));
        let recycled = self
            .components
            .get(id)
            .is_some_and(|inst| inst.next_base.is_some());
        tracing::debug!(component = ty.name(), recycled, "created component");
        id
    }

    /// Propagate `node` up the delegation chain and record the outermost
    /// component as the node's owner
    fn claim_for_outermost(&mut self, id: ComponentId, node: NodeId) {
        let mut top = id;
        let mut cursor = self.components.get(id).and_then(|inst| inst.parent);
        while let Some(parent) = cursor {
            let Some(inst) = self.components.get_mut(parent) else {
                break;
            };
            inst.base = Some(node);
            top = parent;
            cursor = inst.parent;
        }

        let ty = self.components.get(top).map(|inst| inst.ty.clone());
        if let Some(meta) = self.host.meta_mut(node) {
            meta.component = Some(top);
            meta.component_type = ty;
        }
    }

    fn clear_owner(&mut self, node: NodeId) {
        if let Some(meta) = self.host.meta_mut(node) {
            meta.component = None;
        }
    }
}
