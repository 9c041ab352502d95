use crate::component::{ComponentId, ComponentType, Context, Instance, Props};
use crate::host::NodeId;
use crate::queue::RenderQueue;
use std::collections::HashMap;

struct Shard {
    // Held so the type's address (the shard key) cannot be reused
    _ty: ComponentType,
    free: Vec<NodeId>,
}

/// Pool of retired instances, sharded by component type.
///
/// Only the host node a retired instance last owned survives; its props,
/// state and hooks are dropped on reclaim.
///
/// The pool is unbounded. Nodes pooled for a type that is never mounted
/// again stay here until the reconciler is dropped.
#[derive(Default)]
pub struct RecyclePool {
    shards: HashMap<usize, Shard>,
}

impl RecyclePool {
    pub fn new() -> Self {
        Self {
            shards: HashMap::new(),
        }
    }

    pub(crate) fn reclaim(&mut self, instance: Instance) {
        let Some(next_base) = instance.next_base else {
            return;
        };
        tracing::debug!(component = instance.ty.name(), "recycling instance");
        self.shards
            .entry(instance.ty.type_key())
            .or_insert_with(|| Shard {
                _ty: instance.ty.clone(),
                free: Vec::new(),
            })
            .free
            .push(next_base);
    }

    /// Create an instance of `ty`, inheriting the pending host node of the
    /// most recently reclaimed instance of the same type.
    pub(crate) fn obtain(
        &mut self,
        id: ComponentId,
        ty: &ComponentType,
        props: Props,
        context: Context,
        queue: RenderQueue,
    ) -> Instance {
        let mut instance = Instance::new(id, ty.clone(), props, context, queue);
        if let Some(shard) = self.shards.get_mut(&ty.type_key()) {
            instance.next_base = shard.free.pop();
            if shard.free.is_empty() {
                self.shards.remove(&ty.type_key());
            }
        }
        instance
    }

    /// Number of pooled host nodes for `ty`
    pub fn available(&self, ty: &ComponentType) -> usize {
        self.shards
            .get(&ty.type_key())
            .map_or(0, |shard| shard.free.len())
    }

    pub fn len(&self) -> usize {
        self.shards.values().map(|shard| shard.free.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::TickScheduler;
    use crate::value::ValueMap;
    use std::rc::Rc;

    fn id(index: u32) -> ComponentId {
        ComponentId {
            index,
            generation: 0,
        }
    }

    fn queue() -> RenderQueue {
        RenderQueue::new(Rc::new(TickScheduler::new()))
    }

    fn context() -> Context {
        Rc::new(ValueMap::new())
    }

    #[test]
    fn test_obtain_inherits_latest_node() {
        let ty = ComponentType::function("Item", |_, _| None);
        let mut pool = RecyclePool::new();

        for (n, node) in [NodeId(3), NodeId(7)].into_iter().enumerate() {
            let mut retired = Instance::new(id(n as u32), ty.clone(), Props::new(), context(), queue());
            retired.next_base = Some(node);
            pool.reclaim(retired);
        }
        assert_eq!(pool.available(&ty), 2);

        let fresh = pool.obtain(id(9), &ty, Props::new(), context(), queue());
        assert_eq!(fresh.next_base, Some(NodeId(7)));
        assert_eq!(pool.available(&ty), 1);
    }

    #[test]
    fn test_shards_by_type() {
        let item = ComponentType::function("Item", |_, _| None);
        let other = ComponentType::function("Item", |_, _| None);
        let mut pool = RecyclePool::new();

        let mut retired = Instance::new(id(0), item.clone(), Props::new(), context(), queue());
        retired.next_base = Some(NodeId(1));
        pool.reclaim(retired);

        let fresh = pool.obtain(id(1), &other, Props::new(), context(), queue());
        assert_eq!(fresh.next_base, None);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_reclaim_without_node_is_dropped() {
        let ty = ComponentType::function("Item", |_, _| None);
        let mut pool = RecyclePool::new();
        pool.reclaim(Instance::new(id(0), ty, Props::new(), context(), queue()));
        assert!(pool.is_empty());
    }
}
