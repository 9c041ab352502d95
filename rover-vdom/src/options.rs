use crate::component::ComponentId;
use crate::host::Event;
use crate::queue::RenderScheduler;
use crate::vnode::{Child, VNode};
use regex::Regex;
use std::rc::Rc;

pub type VNodeHook = Rc<dyn Fn(&mut VNode)>;
pub type ComponentHook = Rc<dyn Fn(ComponentId)>;
/// May return a replacement event to deliver instead
pub type EventHook = Rc<dyn Fn(&Event) -> Option<Event>>;

/// Optional observability callbacks. An unset hook is a no-op.
#[derive(Clone, Default)]
pub struct Hooks {
    /// Sees every virtual node before it is reconciled
    pub vnode: Option<VNodeHook>,
    pub after_mount: Option<ComponentHook>,
    pub after_update: Option<ComponentHook>,
    pub before_unmount: Option<ComponentHook>,
    pub event: Option<EventHook>,
}

impl Hooks {
    pub(crate) fn apply_vnode(&self, vnode: &mut VNode) {
        if let Some(hook) = &self.vnode {
            visit(hook.as_ref(), vnode);
        }
    }
}

fn visit(hook: &dyn Fn(&mut VNode), vnode: &mut VNode) {
    hook(vnode);
    for child in &mut vnode.children {
        if let Child::Node(node) = child {
            visit(hook, node);
        }
    }
}

/// Per-reconciler configuration
#[derive(Clone)]
pub struct Options {
    /// Re-render children synchronously when their props change.
    /// When false, prop changes on mounted children go through the queue.
    pub sync_component_updates: bool,
    /// Scheduler for deferred flushes; `None` uses the built-in
    /// [`TickScheduler`](crate::TickScheduler)
    pub scheduler: Option<Rc<dyn RenderScheduler>>,
    /// Style properties whose numeric values get no `px` suffix
    pub unitless: Option<Regex>,
    pub hooks: Hooks,
}

impl Options {
    pub fn new() -> Self {
        Self {
            sync_component_updates: true,
            scheduler: None,
            unitless: None,
            hooks: Hooks::default(),
        }
    }

    pub fn with_sync_component_updates(mut self, sync: bool) -> Self {
        self.sync_component_updates = sync;
        self
    }

    pub fn with_scheduler(mut self, scheduler: Rc<dyn RenderScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn with_unitless(mut self, pattern: Regex) -> Self {
        self.unitless = Some(pattern);
        self
    }

    pub fn with_vnode_hook(mut self, hook: impl Fn(&mut VNode) + 'static) -> Self {
        self.hooks.vnode = Some(Rc::new(hook));
        self
    }

    pub fn with_after_mount(mut self, hook: impl Fn(ComponentId) + 'static) -> Self {
        self.hooks.after_mount = Some(Rc::new(hook));
        self
    }

    pub fn with_after_update(mut self, hook: impl Fn(ComponentId) + 'static) -> Self {
        self.hooks.after_update = Some(Rc::new(hook));
        self
    }

    pub fn with_before_unmount(mut self, hook: impl Fn(ComponentId) + 'static) -> Self {
        self.hooks.before_unmount = Some(Rc::new(hook));
        self
    }

    pub fn with_event_hook(mut self, hook: impl Fn(&Event) -> Option<Event> + 'static) -> Self {
        self.hooks.event = Some(Rc::new(hook));
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Value, map};
    use crate::vnode::h;
    use std::cell::Cell;

    #[test]
    fn test_defaults() {
        let options = Options::default();
        assert!(options.sync_component_updates);
        assert!(options.scheduler.is_none());
        assert!(options.hooks.vnode.is_none());
    }

    #[test]
    fn test_vnode_hook_visits_tree() {
        let seen = Rc::new(Cell::new(0));
        let counter = seen.clone();
        let options = Options::new().with_vnode_hook(move |node| {
            counter.set(counter.get() + 1);
            node.attributes
                .get_or_insert_with(Default::default)
                .insert("seen".into(), Value::Bool(true));
        });

        let mut tree = h(
            "ul",
            None,
            vec![h("li", Some(map([("key", "a")])), vec![]).into(), "text".into()],
        );
        options.hooks.apply_vnode(&mut tree);

        assert_eq!(seen.get(), 2);
        let li = tree.children[0].as_node().unwrap();
        assert_eq!(li.attribute("seen"), Some(&Value::Bool(true)));
    }
}
