//! Integration tests for component lifecycle, the render queue and
//! instance recycling

use rover_vdom::{
    Component, ComponentType, MemoryHost, NodeId, Options, Props, ReconcileError,
    Reconciler, RefTarget, RenderScheduler, Scope, Snapshot, State, StatePatch, VNode, Value, h, map,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Log = Rc<RefCell<Vec<String>>>;

fn setup_with(options: Options) -> (Reconciler<MemoryHost>, NodeId) {
    let mut host = MemoryHost::new();
    let root = host.container();
    (Reconciler::with_options(host, options), root)
}

fn setup() -> (Reconciler<MemoryHost>, NodeId) {
    setup_with(Options::default())
}

fn count_of(state: &State) -> i64 {
    match state.get("count") {
        Some(Value::Int(n)) => *n,
        _ => 0,
    }
}

/// Renders `<span>{count}</span>` and records every render
struct Counter {
    renders: Rc<Cell<u32>>,
    allow_updates: bool,
}

impl Component for Counter {
    fn initial_state(&self, _props: &Props) -> State {
        map([("count", 0)])
    }

    fn render(&mut self, scope: &Scope<'_>) -> Option<VNode> {
        self.renders.set(self.renders.get() + 1);
        Some(h("span", None, vec![count_of(scope.state).into()]))
    }

    fn should_update(&mut self, _scope: &Scope<'_>, _next: &Snapshot<'_>) -> bool {
        self.allow_updates
    }
}

fn counter_type(renders: Rc<Cell<u32>>, allow_updates: bool) -> ComponentType {
    ComponentType::stateful("Counter", move |_, _| Counter {
        renders: renders.clone(),
        allow_updates,
    })
}

fn increment() -> StatePatch {
    StatePatch::update(|state, _| map([("count", count_of(state) + 1)]))
}

/// Renders a div around an optional nested component and logs hooks
struct Traced {
    name: &'static str,
    child: Option<ComponentType>,
    log: Log,
}

impl Component for Traced {
    fn render(&mut self, _scope: &Scope<'_>) -> Option<VNode> {
        let nested = self.child.as_ref().map(|ty| h(ty, None, vec![]));
        Some(h("div", None, vec![nested.into()]))
    }

    fn will_mount(&mut self, _scope: &Scope<'_>) {
        self.log.borrow_mut().push(format!("{} will_mount", self.name));
    }

    fn did_mount(&mut self, _scope: &Scope<'_>) {
        self.log.borrow_mut().push(format!("{} did_mount", self.name));
    }

    fn did_update(&mut self, _scope: &Scope<'_>, _previous: &Snapshot<'_>) {
        self.log.borrow_mut().push(format!("{} did_update", self.name));
    }

    fn will_unmount(&mut self, _scope: &Scope<'_>) {
        self.log.borrow_mut().push(format!("{} will_unmount", self.name));
    }
}

fn traced(name: &'static str, child: Option<ComponentType>, log: &Log) -> ComponentType {
    let log = log.clone();
    ComponentType::stateful(name, move |_, _| Traced {
        name,
        child: child.clone(),
        log: log.clone(),
    })
}

fn label_type(name: &str) -> ComponentType {
    ComponentType::function(name, |props, _| {
        let label = props.get("label").cloned().unwrap_or(Value::Nil);
        Some(h("span", None, vec![label.into()]))
    })
}

#[test]
fn test_function_component_renders() {
    let (mut r, root) = setup();
    let label = label_type("Label");

    let node = r
        .render(h(&label, Some(map([("label", "hello")])), vec![]), root, None)
        .unwrap();

    assert_eq!(r.host().to_markup(root), "<root><span>hello</span></root>");
    let id = r.component_at(node).unwrap();
    assert!(r.is_mounted(id));
    assert_eq!(r.component_base(id), Some(node));
    assert_eq!(r.props(id).and_then(|p| p.get("label")), Some(&Value::from("hello")));
}

#[test]
fn test_default_props_fill_missing() {
    let (mut r, root) = setup();
    let label = label_type("Label").with_default_props(map([("label", "fallback")]));

    let node = r.render(h(&label, None, vec![]), root, None).unwrap();
    assert_eq!(r.host().to_markup(node), "<span>fallback</span>");

    let other = r
        .render(h(&label, Some(map([("label", "given")])), vec![]), root, None)
        .unwrap();
    assert_eq!(r.host().to_markup(other), "<span>given</span>");
}

#[test]
fn test_children_prop() {
    let (mut r, root) = setup();
    let frame = ComponentType::function("Frame", |props, _| {
        let children = props.get("children").cloned().unwrap_or(Value::Nil);
        Some(h("section", None, vec![children.into()]))
    });

    let node = r
        .render(
            h(&frame, None, vec![h("b", None, vec!["x".into()]).into(), "y".into()]),
            root,
            None,
        )
        .unwrap();

    assert_eq!(r.host().to_markup(node), "<section><b>x</b>y</section>");
}

#[test]
fn test_batched_state_renders_once() {
    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders.clone(), true);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();
    assert_eq!(renders.get(), 1);

    r.set_state(id, increment()).unwrap();
    r.set_state(id, increment()).unwrap();
    assert!(r.is_dirty(id));
    assert!(r.needs_flush());
    assert_eq!(renders.get(), 1);

    assert!(r.tick().unwrap());
    assert_eq!(renders.get(), 2);
    assert_eq!(r.host().to_markup(node), "<span>2</span>");
    assert_eq!(r.state(id).map(count_of), Some(2));
    assert!(!r.is_dirty(id));
    assert!(!r.tick().unwrap());
}

#[test]
fn test_merge_patch_overwrites_keys() {
    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders, true);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    r.set_state(id, map([("count", 7), ("extra", 1)])).unwrap();
    r.rerender().unwrap();

    let state = r.state(id).unwrap();
    assert_eq!(count_of(state), 7);
    assert_eq!(state.get("extra"), Some(&Value::Int(1)));
    assert_eq!(r.host().to_markup(node), "<span>7</span>");
}

#[test]
fn test_should_update_false_still_runs_callbacks() {
    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders.clone(), false);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    let called = Rc::new(Cell::new(false));
    let flag = called.clone();
    r.set_state_with(id, increment(), move || flag.set(true)).unwrap();
    r.rerender().unwrap();

    assert!(called.get());
    assert_eq!(renders.get(), 1);
    assert_eq!(r.state(id).map(count_of), Some(1));
    assert_eq!(r.host().to_markup(node), "<span>0</span>");
}

#[test]
fn test_force_update_bypasses_should_update() {
    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders.clone(), false);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    let called = Rc::new(Cell::new(0));
    let counter = called.clone();
    r.force_update_with(id, move || counter.set(counter.get() + 1))
        .unwrap();

    assert_eq!(renders.get(), 2);
    assert_eq!(called.get(), 1);
}

#[test]
fn test_mount_order_is_children_first() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let c = traced("C", None, &log);
    let b = traced("B", Some(c), &log);
    let a = traced("A", Some(b), &log);
    let (mut r, root) = setup();

    r.render(h(&a, None, vec![]), root, None).unwrap();

    assert_eq!(
        *log.borrow(),
        vec![
            "A will_mount",
            "B will_mount",
            "C will_mount",
            "C did_mount",
            "B did_mount",
            "A did_mount",
        ]
    );
    assert_eq!(
        r.host().to_markup(root),
        "<root><div><div><div></div></div></div></root>"
    );
}

#[test]
fn test_update_notifies_after_children() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let b = traced("B", None, &log);
    let a = traced("A", Some(b), &log);
    let (mut r, root) = setup();
    let node = r.render(h(&a, None, vec![]), root, None).unwrap();
    log.borrow_mut().clear();

    r.render(h(&a, Some(map([("n", 1)])), vec![]), root, Some(node))
        .unwrap();

    assert_eq!(*log.borrow(), vec!["B did_update", "A did_update"]);
}

#[test]
fn test_lifecycle_hooks_in_options() {
    let events: Log = Rc::new(RefCell::new(Vec::new()));
    let (mounted, updated, unmounting) = (events.clone(), events.clone(), events.clone());
    let options = Options::new()
        .with_after_mount(move |_| mounted.borrow_mut().push("mount".into()))
        .with_after_update(move |_| updated.borrow_mut().push("update".into()))
        .with_before_unmount(move |_| unmounting.borrow_mut().push("unmount".into()));
    let (mut r, root) = setup_with(options);
    let label = label_type("Label");

    let node = r.render(h(&label, None, vec![]), root, None).unwrap();
    r.render(h(&label, Some(map([("label", "x")])), vec![]), root, Some(node))
        .unwrap();
    r.unmount(node);

    assert_eq!(*events.borrow(), vec!["mount", "update", "unmount"]);
}

#[test]
fn test_state_set_during_will_mount_applies_before_first_render() {
    struct Eager;

    impl Component for Eager {
        fn will_mount(&mut self, scope: &Scope<'_>) {
            scope.set_state(map([("ready", true)]));
        }

        fn render(&mut self, scope: &Scope<'_>) -> Option<VNode> {
            let ready = scope.state.get("ready").is_some_and(Value::is_truthy);
            Some(h("p", None, vec![(if ready { "ready" } else { "waiting" }).into()]))
        }
    }

    let (mut r, root) = setup();
    let ty = ComponentType::stateful("Eager", |_, _| Eager);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();

    assert_eq!(r.host().to_markup(node), "<p>ready</p>");
    assert!(!r.needs_flush());
}

#[test]
fn test_enqueue_during_flush_waits_for_next_batch() {
    struct Chained {
        fired: bool,
    }

    impl Component for Chained {
        fn render(&mut self, scope: &Scope<'_>) -> Option<VNode> {
            Some(h("i", None, vec![count_of(scope.state).into()]))
        }

        fn did_update(&mut self, scope: &Scope<'_>, _previous: &Snapshot<'_>) {
            if !self.fired {
                self.fired = true;
                scope.set_state(map([("count", 2)]));
            }
        }
    }

    let (mut r, root) = setup();
    let ty = ComponentType::stateful("Chained", |_, _| Chained { fired: false });
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    r.set_state(id, map([("count", 1)])).unwrap();
    assert!(r.tick().unwrap());
    assert_eq!(r.host().to_markup(node), "<i>1</i>");
    assert!(r.needs_flush());

    assert!(r.tick().unwrap());
    assert_eq!(r.host().to_markup(node), "<i>2</i>");
    assert!(!r.needs_flush());
}

#[test]
fn test_custom_scheduler_is_notified() {
    struct Frames(Cell<u32>);

    impl RenderScheduler for Frames {
        fn schedule_flush(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    let frames = Rc::new(Frames(Cell::new(0)));
    let (mut r, root) = setup_with(Options::new().with_scheduler(frames.clone()));
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders.clone(), true);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    r.set_state(id, increment()).unwrap();
    r.set_state(id, increment()).unwrap();
    assert_eq!(frames.0.get(), 1);

    // The built-in ticker is not in use
    assert!(!r.tick().unwrap());
    r.rerender().unwrap();
    assert_eq!(renders.get(), 2);
}

#[test]
fn test_failed_render_does_not_strand_rest_of_batch() {
    struct Switcher;

    impl Component for Switcher {
        fn render(&mut self, scope: &Scope<'_>) -> Option<VNode> {
            let tag = match scope.state.get("video") {
                Some(Value::Bool(true)) => "video",
                _ => "p",
            };
            Some(h(tag, None, vec![]))
        }
    }

    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let counter = counter_type(renders.clone(), true);
    let switcher = ComponentType::stateful("Switcher", |_, _| Switcher);
    let div = r
        .render(
            h("div", None, vec![h(&counter, None, vec![]).into(), h(&switcher, None, vec![]).into()]),
            root,
            None,
        )
        .unwrap();
    let children = r.host().children(div);
    let a = r.component_at(children[0]).unwrap();
    let b = r.component_at(children[1]).unwrap();

    r.host_mut().fail_creation_of("video");
    r.set_state(a, increment()).unwrap();
    r.set_state(b, map([("video", true)])).unwrap();

    // The batch runs last-queued first, so the failure comes before the counter
    assert!(r.rerender().is_err());
    assert_eq!(renders.get(), 2);
    assert!(!r.is_dirty(a));
    assert!(!r.is_dirty(b));
    assert_eq!(r.host().to_markup(div), "<div><span>1</span><p></p></div>");

    r.set_state(a, increment()).unwrap();
    assert!(r.needs_flush());
    r.rerender().unwrap();
    assert_eq!(renders.get(), 3);
    assert_eq!(r.state(a).map(count_of), Some(2));
}

#[test]
fn test_async_prop_updates_go_through_queue() {
    let (mut r, root) = setup_with(Options::new().with_sync_component_updates(false));
    let label = label_type("Label");
    let tree = |text: &str| h("div", None, vec![h(&label, Some(map([("label", text)])), vec![]).into()]);

    let div = r.render(tree("one"), root, None).unwrap();
    r.render(tree("two"), root, Some(div)).unwrap();

    assert_eq!(r.host().to_markup(div), "<div><span>one</span></div>");
    assert!(r.needs_flush());

    r.tick().unwrap();
    assert_eq!(r.host().to_markup(div), "<div><span>two</span></div>");
}

#[test]
fn test_context_flows_to_descendants() {
    struct Provider {
        consumer: ComponentType,
    }

    impl Component for Provider {
        fn render(&mut self, _scope: &Scope<'_>) -> Option<VNode> {
            Some(h("div", None, vec![h(&self.consumer, None, vec![]).into()]))
        }

        fn child_context(&self, _scope: &Scope<'_>) -> Option<rover_vdom::ValueMap> {
            Some(map([("theme", "dark")]))
        }
    }

    let consumer = ComponentType::function("Consumer", |_, context| {
        let theme = context.get("theme").cloned().unwrap_or(Value::Nil);
        Some(h("span", None, vec![theme.into()]))
    });
    let provider = ComponentType::stateful("Provider", move |_, _| Provider {
        consumer: consumer.clone(),
    });
    let (mut r, root) = setup();

    let node = r.render(h(&provider, None, vec![]), root, None).unwrap();

    assert_eq!(r.host().to_markup(node), "<div><span>dark</span></div>");
}

#[test]
fn test_higher_order_component_delegates() {
    let inner = label_type("Inner");
    let wrapped = inner.clone();
    let outer = ComponentType::function("Outer", move |props, _| {
        let label = props.get("label").cloned().unwrap_or(Value::Nil);
        Some(h(&wrapped, Some(map([("label", label)])), vec![]))
    });
    let (mut r, root) = setup();

    let node = r
        .render(h(&outer, Some(map([("label", "hi")])), vec![]), root, None)
        .unwrap();
    let outer_id = r.component_at(node).unwrap();
    let inner_id = r.child_component(outer_id).unwrap();

    assert_eq!(r.host().to_markup(root), "<root><span>hi</span></root>");
    assert_eq!(r.parent_component(inner_id), Some(outer_id));
    assert_eq!(r.component_base(inner_id), Some(node));
    assert_eq!(r.component_base(outer_id), Some(node));

    r.host_mut().clear_ops();
    let again = r
        .render(h(&outer, Some(map([("label", "bye")])), vec![]), root, Some(node))
        .unwrap();

    assert_eq!(again, node);
    assert_eq!(r.child_component(outer_id), Some(inner_id));
    assert_eq!(r.host().created_count(), 0);
    assert_eq!(r.host().to_markup(root), "<root><span>bye</span></root>");
}

#[test]
fn test_component_type_change_unmounts_previous() {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let first = traced("First", None, &log);
    let second = traced("Second", None, &log);
    let (mut r, root) = setup();

    let node = r.render(h(&first, None, vec![]), root, None).unwrap();
    let first_id = r.component_at(node).unwrap();

    let replaced = r.render(h(&second, None, vec![]), root, Some(node)).unwrap();

    assert!(!r.is_mounted(first_id));
    assert!(log.borrow().contains(&"First will_unmount".to_string()));
    assert_eq!(r.host().children(root), vec![replaced]);
    assert_eq!(r.component_count(), 1);
}

#[test]
fn test_unmounted_instance_is_recycled() {
    let (mut r, root) = setup();
    let item = ComponentType::function("Item", |_, _| Some(h("p", None, vec!["x".into()])));
    let with_item = |show: bool| {
        let child = show.then(|| h(&item, None, vec![]));
        h("div", None, vec![child.into()])
    };

    let div = r.render(with_item(true), root, None).unwrap();
    let p = r.host().children(div)[0];
    let id = r.component_at(p).unwrap();

    r.render(with_item(false), root, Some(div)).unwrap();
    assert!(!r.is_mounted(id));
    assert_eq!(r.component_count(), 0);
    assert_eq!(r.pool_len(), 1);
    assert!(r.host().children(div).is_empty());

    r.host_mut().clear_ops();
    r.render(with_item(true), root, Some(div)).unwrap();

    assert_eq!(r.host().children(div), vec![p]);
    assert_eq!(r.host().created_count(), 0);
    assert_eq!(r.pool_len(), 0);
    assert_eq!(r.host().to_markup(div), "<div><p>x</p></div>");
}

#[test]
fn test_unmount_calls_node_ref_once() {
    let nulls = Rc::new(Cell::new(0));
    let counter = nulls.clone();
    let node_ref = Value::node_ref(move |target| {
        if target.is_none() {
            counter.set(counter.get() + 1);
        }
    });
    let view = ComponentType::function("View", move |_, _| {
        Some(h("div", Some(map([("ref", node_ref.clone())])), vec![]))
    });
    let (mut r, root) = setup();
    let node = r.render(h(&view, None, vec![]), root, None).unwrap();

    r.unmount(node);

    assert_eq!(nulls.get(), 1);
    assert_eq!(r.component_count(), 0);
    assert!(r.host().children(root).is_empty());
}

#[test]
fn test_component_ref() {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let log = calls.clone();
    let (mut r, root) = setup();
    let label = label_type("Label");

    let node = r
        .render(
            h(&label, Some(map([("ref", Value::node_ref(move |t| log.borrow_mut().push(t)))])), vec![]),
            root,
            None,
        )
        .unwrap();
    let id = r.component_at(node).unwrap();
    assert_eq!(r.props(id).and_then(|p| p.get("ref")), None);

    r.unmount(node);
    assert_eq!(*calls.borrow(), vec![Some(RefTarget::Component(id)), None]);
}

#[test]
fn test_detached_component_errors() {
    let (mut r, root) = setup();
    let label = label_type("Label");
    let node = r.render(h(&label, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();
    r.unmount(node);

    assert!(matches!(r.set_state(id, map([("a", 1)])), Err(ReconcileError::Detached(_))));
    assert!(matches!(r.force_update(id), Err(ReconcileError::Detached(_))));
    assert!(r.updater(id).is_none());
}

#[test]
fn test_updater_outlives_hook() {
    let (mut r, root) = setup();
    let renders = Rc::new(Cell::new(0));
    let ty = counter_type(renders, true);
    let node = r.render(h(&ty, None, vec![]), root, None).unwrap();
    let id = r.component_at(node).unwrap();

    let updater = r.updater(id).unwrap();
    assert_eq!(updater.id(), id);
    updater.set_state(increment());
    r.tick().unwrap();

    assert_eq!(r.host().to_markup(node), "<span>1</span>");
}
