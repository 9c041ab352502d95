use crate::component::{
    ComponentArena, ComponentId, Context, Props, State, StatePatch, Updater,
};
use crate::error::{ReconcileError, Result};
use crate::host::{Event, HostAdapter, NodeId};
use crate::lifecycle::RenderMode;
use crate::options::Options;
use crate::queue::{RenderQueue, TickScheduler};
use crate::recycler::RecyclePool;
use crate::value::ValueMap;
use crate::vnode::{Child, VNode};
use std::collections::VecDeque;
use std::rc::Rc;

/// Flags shared by every level of one reconciliation pass
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct DiffState {
    /// Nesting level of `diff`; 0 when idle
    pub(crate) depth: u32,
    /// Elements are created in the svg namespace
    pub(crate) svg_mode: bool,
    /// The pass started on a node the reconciler had never touched
    pub(crate) hydrating: bool,
}

/// Keeps a host tree in sync with virtual trees and owns the component
/// instances rendered into it.
///
/// Each reconciler has its own queue, pool and pass state, so several can
/// run side by side on different hosts.
pub struct Reconciler<H: HostAdapter> {
    pub(crate) host: H,
    pub(crate) components: ComponentArena,
    pub(crate) queue: RenderQueue,
    pub(crate) pool: RecyclePool,
    pub(crate) options: Options,
    pub(crate) pass: DiffState,
    /// Components awaiting `did_mount`, in completion order
    pub(crate) mounts: VecDeque<ComponentId>,
    ticker: Option<Rc<TickScheduler>>,
    root_context: Context,
}

impl<H: HostAdapter> Reconciler<H> {
    pub fn new(host: H) -> Self {
        Self::with_options(host, Options::default())
    }

    pub fn with_options(host: H, options: Options) -> Self {
        let (queue, ticker) = match options.scheduler.clone() {
            Some(scheduler) => (RenderQueue::new(scheduler), None),
            None => {
                let ticker = Rc::new(TickScheduler::new());
                (RenderQueue::new(ticker.clone()), Some(ticker))
            }
        };
        Self {
            host,
            components: ComponentArena::new(),
            queue,
            pool: RecyclePool::new(),
            options,
            pass: DiffState::default(),
            mounts: VecDeque::new(),
            ticker,
            root_context: Rc::new(ValueMap::new()),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Reconcile `vnode` into `parent`, morphing `merge` if given.
    /// Returns the host node now representing `vnode`.
    pub fn render(&mut self, vnode: VNode, parent: NodeId, merge: Option<NodeId>) -> Result<NodeId> {
        let mut vnode = vnode;
        self.options.hooks.apply_vnode(&mut vnode);
        let context = self.root_context.clone();
        tracing::trace!(parent = parent.raw(), "render");
        self.diff(merge, &Child::Node(vnode), &context, false, Some(parent), false)
    }

    /// Tear down the subtree rooted at `node`, unmounting its components
    pub fn unmount(&mut self, node: NodeId) {
        self.recollect_node_tree(node, false);
    }

    pub fn updater(&self, id: ComponentId) -> Option<Updater> {
        self.components.get(id).map(|inst| inst.updater.clone())
    }

    /// Queue a state change; the component re-renders on the next flush
    pub fn set_state(&mut self, id: ComponentId, patch: impl Into<StatePatch>) -> Result<()> {
        let updater = self.updater(id).ok_or(ReconcileError::Detached(id))?;
        updater.set_state(patch);
        Ok(())
    }

    pub fn set_state_with(
        &mut self,
        id: ComponentId,
        patch: impl Into<StatePatch>,
        callback: impl FnOnce() + 'static,
    ) -> Result<()> {
        let updater = self.updater(id).ok_or(ReconcileError::Detached(id))?;
        updater.set_state_with(patch, callback);
        Ok(())
    }

    /// Re-render synchronously, bypassing `should_update`
    pub fn force_update(&mut self, id: ComponentId) -> Result<()> {
        if !self.components.contains(id) {
            return Err(ReconcileError::Detached(id));
        }
        self.render_component(id, RenderMode::Force, false, false)
    }

    pub fn force_update_with(&mut self, id: ComponentId, callback: impl FnOnce() + 'static) -> Result<()> {
        let updater = self.updater(id).ok_or(ReconcileError::Detached(id))?;
        updater.push_callback(Box::new(callback));
        self.render_component(id, RenderMode::Force, false, false)
    }

    /// Flush the render queue. Components queued while flushing wait for
    /// the next call.
    ///
    /// A failing render does not stop the batch: every dirty instance is
    /// rendered and the first error is returned afterwards.
    pub fn rerender(&mut self) -> Result<()> {
        let batch = self.queue.take();
        if batch.is_empty() {
            return Ok(());
        }
        tracing::trace!(count = batch.len(), "flushing render queue");
        let mut first_error = None;
        for id in batch.into_iter().rev() {
            let dirty = self
                .components
                .get(id)
                .is_some_and(|inst| inst.updater.is_dirty());
            if !dirty {
                continue;
            }
            if let Err(err) = self.render_component(id, RenderMode::Async, false, false) {
                tracing::debug!(component = ?id, "queued render failed: {}", err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Flush if the built-in scheduler recorded a request.
    /// Returns whether a flush ran.
    pub fn tick(&mut self) -> Result<bool> {
        let requested = self
            .ticker
            .as_ref()
            .is_some_and(|ticker| ticker.take_request());
        if !requested {
            return Ok(false);
        }
        self.rerender()?;
        Ok(true)
    }

    pub fn needs_flush(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Deliver `event` to the listener registered on its target.
    /// Returns false when nothing is listening.
    pub fn dispatch(&self, event: Event) -> bool {
        let listener = self
            .host
            .meta(event.target)
            .and_then(|meta| meta.listeners.get(&event.kind))
            .cloned();
        let Some(listener) = listener else {
            return false;
        };
        let event = match &self.options.hooks.event {
            Some(hook) => hook(&event).unwrap_or(event),
            None => event,
        };
        listener(&event);
        true
    }

    pub fn is_mounted(&self, id: ComponentId) -> bool {
        self.components.contains(id)
    }

    pub fn is_dirty(&self, id: ComponentId) -> bool {
        self.components
            .get(id)
            .is_some_and(|inst| inst.updater.is_dirty())
    }

    pub fn component_base(&self, id: ComponentId) -> Option<NodeId> {
        self.components.get(id)?.base
    }

    /// Outermost live component rendered at `node`
    pub fn component_at(&self, node: NodeId) -> Option<ComponentId> {
        self.live_owner(node)
    }

    pub fn child_component(&self, id: ComponentId) -> Option<ComponentId> {
        self.components.get(id)?.child
    }

    pub fn parent_component(&self, id: ComponentId) -> Option<ComponentId> {
        self.components.get(id)?.parent
    }

    pub fn state(&self, id: ComponentId) -> Option<&State> {
        self.components.get(id).map(|inst| &inst.state)
    }

    pub fn props(&self, id: ComponentId) -> Option<&Props> {
        self.components.get(id).map(|inst| &inst.props)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Host nodes held by the recycling pool
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub(crate) fn live_owner(&self, node: NodeId) -> Option<ComponentId> {
        let id = self.host.meta(node)?.component?;
        self.components.contains(id).then_some(id)
    }
}
