use crate::host::NodeId;
use crate::queue::RenderQueue;
use crate::value::{RefCallback, ValueMap};
use crate::vnode::{Key, VNode};
use smartstring::alias::String as SmartString;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

pub type Props = ValueMap;
pub type State = ValueMap;
pub type Context = Rc<ValueMap>;

/// Generational handle to a component instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComponentId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

/// Read-only view of an instance handed to lifecycle hooks
pub struct Scope<'a> {
    pub props: &'a Props,
    pub state: &'a State,
    pub context: &'a Context,
    pub(crate) id: ComponentId,
    pub(crate) updater: &'a Updater,
}

impl<'a> Scope<'a> {
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Handle that stays usable after the hook returns
    pub fn updater(&self) -> Updater {
        self.updater.clone()
    }

    pub fn set_state(&self, patch: impl Into<StatePatch>) {
        self.updater.set_state(patch);
    }
}

/// Props/state/context triple passed as "next" or "previous" values
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    pub props: &'a Props,
    pub state: &'a State,
    pub context: &'a Context,
}

/// A stateful unit that renders a virtual subtree.
///
/// Only `render` is required. While `will_receive_props`, `should_update`
/// and `will_update` run, the scope still shows the current values and the
/// incoming ones are passed separately.
pub trait Component {
    fn render(&mut self, scope: &Scope<'_>) -> Option<VNode>;

    fn initial_state(&self, _props: &Props) -> State {
        State::new()
    }

    fn will_mount(&mut self, _scope: &Scope<'_>) {}

    fn did_mount(&mut self, _scope: &Scope<'_>) {}

    fn will_receive_props(&mut self, _scope: &Scope<'_>, _next_props: &Props, _next_context: &Context) {}

    fn should_update(&mut self, _scope: &Scope<'_>, _next: &Snapshot<'_>) -> bool {
        true
    }

    fn will_update(&mut self, _scope: &Scope<'_>, _next: &Snapshot<'_>) {}

    fn did_update(&mut self, _scope: &Scope<'_>, _previous: &Snapshot<'_>) {}

    fn will_unmount(&mut self, _scope: &Scope<'_>) {}

    /// Entries merged over the inherited context for descendants
    fn child_context(&self, _scope: &Scope<'_>) -> Option<ValueMap> {
        None
    }
}

pub type RenderFn = Rc<dyn Fn(&Props, &Context) -> Option<VNode>>;
pub type Factory = Rc<dyn Fn(&Props, &Context) -> Box<dyn Component>>;

#[derive(Clone)]
pub enum ComponentKind {
    /// Stateless: rendering calls the function with props and context
    Function(RenderFn),
    Stateful(Factory),
}

#[derive(Clone)]
pub struct ComponentDef {
    name: SmartString,
    kind: ComponentKind,
    default_props: Props,
}

/// Declared component type. Identity is the shared definition, so clones
/// compare equal and two separately built types never do.
#[derive(Clone)]
pub struct ComponentType(Rc<ComponentDef>);

impl ComponentType {
    pub fn function(
        name: &str,
        render: impl Fn(&Props, &Context) -> Option<VNode> + 'static,
    ) -> Self {
        Self(Rc::new(ComponentDef {
            name: name.into(),
            kind: ComponentKind::Function(Rc::new(render)),
            default_props: Props::new(),
        }))
    }

    pub fn stateful<C, F>(name: &str, factory: F) -> Self
    where
        C: Component + 'static,
        F: Fn(&Props, &Context) -> C + 'static,
    {
        Self(Rc::new(ComponentDef {
            name: name.into(),
            kind: ComponentKind::Stateful(Rc::new(move |props, context| {
                Box::new(factory(props, context)) as Box<dyn Component>
            })),
            default_props: Props::new(),
        }))
    }

    /// Attach default props. Produces a new type identity, so call it
    /// while building the type, not on one already in use.
    pub fn with_default_props(self, default_props: Props) -> Self {
        let mut def = Rc::unwrap_or_clone(self.0);
        def.default_props = default_props;
        Self(Rc::new(def))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn kind(&self) -> &ComponentKind {
        &self.0.kind
    }

    pub fn default_props(&self) -> &Props {
        &self.0.default_props
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity used to shard the recycling pool
    pub(crate) fn type_key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Build the uniform instance shape for either kind
    pub(crate) fn instantiate(&self, props: &Props, context: &Context) -> Box<dyn Component> {
        match &self.0.kind {
            ComponentKind::Function(render) => Box::new(FunctionComponent {
                render: Rc::clone(render),
            }),
            ComponentKind::Stateful(factory) => factory(props, context),
        }
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.0.kind {
            ComponentKind::Function(_) => "function",
            ComponentKind::Stateful(_) => "stateful",
        };
        write!(f, "ComponentType({}, {})", self.0.name, kind)
    }
}

struct FunctionComponent {
    render: RenderFn,
}

impl Component for FunctionComponent {
    fn render(&mut self, scope: &Scope<'_>) -> Option<VNode> {
        (self.render)(scope.props, scope.context)
    }
}

type PatchFn = Box<dyn FnOnce(&State, &Props) -> State>;
pub type RenderCallback = Box<dyn FnOnce()>;

/// Pending state change, applied in order when the component next renders
pub enum StatePatch {
    Merge(State),
    Update(PatchFn),
}

impl StatePatch {
    pub fn update(f: impl FnOnce(&State, &Props) -> State + 'static) -> Self {
        StatePatch::Update(Box::new(f))
    }

    fn apply(self, state: &mut State, props: &Props) {
        let changes = match self {
            StatePatch::Merge(changes) => changes,
            StatePatch::Update(f) => f(state, props),
        };
        state.extend(changes);
    }
}

impl From<State> for StatePatch {
    fn from(changes: State) -> Self {
        StatePatch::Merge(changes)
    }
}

struct UpdaterInner {
    id: ComponentId,
    dirty: Cell<bool>,
    patches: RefCell<Vec<StatePatch>>,
    callbacks: RefCell<VecDeque<RenderCallback>>,
    queue: RenderQueue,
}

/// Cloneable handle for requesting deferred state updates from event
/// listeners and other code running outside the reconciler.
#[derive(Clone)]
pub struct Updater(Rc<UpdaterInner>);

impl Updater {
    pub(crate) fn new(id: ComponentId, queue: RenderQueue) -> Self {
        Self(Rc::new(UpdaterInner {
            id,
            // A fresh instance renders on mount; updates before that need no enqueue
            dirty: Cell::new(true),
            patches: RefCell::new(Vec::new()),
            callbacks: RefCell::new(VecDeque::new()),
            queue,
        }))
    }

    pub fn id(&self) -> ComponentId {
        self.0.id
    }

    pub fn set_state(&self, patch: impl Into<StatePatch>) {
        self.0.patches.borrow_mut().push(patch.into());
        self.0.queue.enqueue(self.0.id, &self.0.dirty);
    }

    pub fn set_state_with(&self, patch: impl Into<StatePatch>, callback: impl FnOnce() + 'static) {
        self.push_callback(Box::new(callback));
        self.set_state(patch);
    }

    pub fn is_dirty(&self) -> bool {
        self.0.dirty.get()
    }

    pub(crate) fn enqueue(&self) {
        self.0.queue.enqueue(self.0.id, &self.0.dirty);
    }

    pub(crate) fn mark_clean(&self) {
        self.0.dirty.set(false);
    }

    /// Block further enqueues once the instance is gone
    pub(crate) fn retire(&self) {
        self.0.dirty.set(true);
        self.0.patches.borrow_mut().clear();
        self.0.callbacks.borrow_mut().clear();
    }

    pub(crate) fn has_patches(&self) -> bool {
        !self.0.patches.borrow().is_empty()
    }

    pub(crate) fn take_patches(&self) -> Vec<StatePatch> {
        std::mem::take(&mut *self.0.patches.borrow_mut())
    }

    pub(crate) fn push_callback(&self, callback: RenderCallback) {
        self.0.callbacks.borrow_mut().push_back(callback);
    }

    pub(crate) fn pop_callback(&self) -> Option<RenderCallback> {
        self.0.callbacks.borrow_mut().pop_front()
    }
}

/// Reconciler-side record of one mounted (or mounting) component
pub(crate) struct Instance {
    pub(crate) id: ComponentId,
    pub(crate) ty: ComponentType,
    pub(crate) component: Box<dyn Component>,
    pub(crate) props: Props,
    pub(crate) state: State,
    pub(crate) context: Context,
    pub(crate) prev_props: Option<Props>,
    pub(crate) prev_state: Option<State>,
    pub(crate) prev_context: Option<Context>,
    pub(crate) updater: Updater,
    pub(crate) disabled: bool,
    /// Host node currently owned
    pub(crate) base: Option<NodeId>,
    /// Host node inherited from a recycled instance
    pub(crate) next_base: Option<NodeId>,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) child: Option<ComponentId>,
    pub(crate) key: Option<Key>,
    pub(crate) ref_callback: Option<RefCallback>,
}

impl Instance {
    pub(crate) fn new(
        id: ComponentId,
        ty: ComponentType,
        props: Props,
        context: Context,
        queue: RenderQueue,
    ) -> Self {
        let component = ty.instantiate(&props, &context);
        let state = component.initial_state(&props);
        Self {
            id,
            ty,
            component,
            props,
            state,
            context,
            prev_props: None,
            prev_state: None,
            prev_context: None,
            updater: Updater::new(id, queue),
            disabled: false,
            base: None,
            next_base: None,
            parent: None,
            child: None,
            key: None,
            ref_callback: None,
        }
    }

    /// Run a hook against the current props/state/context
    pub(crate) fn call<R>(&mut self, f: impl FnOnce(&mut dyn Component, &Scope<'_>) -> R) -> R {
        let scope = Scope {
            props: &self.props,
            state: &self.state,
            context: &self.context,
            id: self.id,
            updater: &self.updater,
        };
        f(self.component.as_mut(), &scope)
    }

    /// Fold queued state patches into `state`, snapshotting the previous
    /// state once per update
    pub(crate) fn apply_pending_state(&mut self) {
        if !self.updater.has_patches() {
            return;
        }
        if self.prev_state.is_none() {
            self.prev_state = Some(self.state.clone());
        }
        for patch in self.updater.take_patches() {
            patch.apply(&mut self.state, &self.props);
        }
    }
}

/// Generational arena of live instances
pub(crate) struct ComponentArena {
    slots: Vec<Option<Instance>>,
    generations: Vec<u32>,
    free_list: Vec<u32>,
}

impl ComponentArena {
    pub(crate) fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
        }
    }

    pub(crate) fn insert_with(&mut self, build: impl FnOnce(ComponentId) -> Instance) -> ComponentId {
        let index = if let Some(idx) = self.free_list.pop() {
            idx as usize
        } else {
            self.slots.push(None);
            self.generations.push(0);
            self.slots.len() - 1
        };

        let id = ComponentId {
            index: index as u32,
            generation: self.generations[index],
        };
        self.slots[index] = Some(build(id));
        id
    }

    pub(crate) fn get(&self, id: ComponentId) -> Option<&Instance> {
        if self.generations.get(id.index as usize) != Some(&id.generation) {
            return None;
        }
        self.slots.get(id.index as usize)?.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: ComponentId) -> Option<&mut Instance> {
        if self.generations.get(id.index as usize) != Some(&id.generation) {
            return None;
        }
        self.slots.get_mut(id.index as usize)?.as_mut()
    }

    pub(crate) fn contains(&self, id: ComponentId) -> bool {
        self.get(id).is_some()
    }

    /// Free the slot; outstanding ids for it become stale
    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<Instance> {
        let idx = id.index as usize;
        if self.generations.get(idx) != Some(&id.generation) {
            return None;
        }
        let instance = self.slots.get_mut(idx)?.take()?;
        self.generations[idx] = self.generations[idx].wrapping_add(1);
        self.free_list.push(id.index);
        Some(instance)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl Default for ComponentArena {
    fn default() -> Self {
        Self::new()
    }
}
