use crate::component::ComponentId;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Arranges for [`Reconciler::rerender`](crate::Reconciler::rerender) to be
/// called later, e.g. on the next frame or event-loop turn.
pub trait RenderScheduler {
    fn schedule_flush(&self);
}

/// Default scheduler: records the request so the host loop can flush on its
/// next [`Reconciler::tick`](crate::Reconciler::tick).
#[derive(Debug, Default)]
pub struct TickScheduler {
    requested: Cell<bool>,
}

impl TickScheduler {
    pub fn new() -> Self {
        Self {
            requested: Cell::new(false),
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.get()
    }

    /// Consume the pending request
    pub fn take_request(&self) -> bool {
        self.requested.replace(false)
    }
}

impl RenderScheduler for TickScheduler {
    fn schedule_flush(&self) {
        self.requested.set(true);
    }
}

struct QueueInner {
    items: RefCell<Vec<ComponentId>>,
    scheduler: Rc<dyn RenderScheduler>,
}

/// Deduplicating batch of dirty components.
///
/// Membership is tracked by each instance's dirty flag, so an instance is
/// queued at most once between flushes.
#[derive(Clone)]
pub struct RenderQueue(Rc<QueueInner>);

impl RenderQueue {
    pub fn new(scheduler: Rc<dyn RenderScheduler>) -> Self {
        Self(Rc::new(QueueInner {
            items: RefCell::new(Vec::new()),
            scheduler,
        }))
    }

    pub(crate) fn enqueue(&self, id: ComponentId, dirty: &Cell<bool>) {
        if dirty.replace(true) {
            return;
        }
        let first = {
            let mut items = self.0.items.borrow_mut();
            items.push(id);
            items.len() == 1
        };
        if first {
            tracing::trace!("render queue: scheduling flush");
            self.0.scheduler.schedule_flush();
        }
    }

    /// Swap out the pending batch. Enqueues that happen while the batch is
    /// being processed land in the next one.
    pub(crate) fn take(&self) -> Vec<ComponentId> {
        std::mem::take(&mut *self.0.items.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.items.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(Cell<u32>);

    impl RenderScheduler for Counting {
        fn schedule_flush(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    fn id(index: u32) -> ComponentId {
        ComponentId {
            index,
            generation: 0,
        }
    }

    #[test]
    fn test_enqueue_deduplicates() {
        let scheduler = Rc::new(Counting(Cell::new(0)));
        let queue = RenderQueue::new(scheduler.clone());
        let dirty = Cell::new(false);

        for _ in 0..5 {
            queue.enqueue(id(0), &dirty);
        }
        assert_eq!(queue.len(), 1);
        assert_eq!(scheduler.0.get(), 1);
    }

    #[test]
    fn test_schedules_once_per_batch() {
        let scheduler = Rc::new(Counting(Cell::new(0)));
        let queue = RenderQueue::new(scheduler.clone());
        let (a, b) = (Cell::new(false), Cell::new(false));

        queue.enqueue(id(0), &a);
        queue.enqueue(id(1), &b);
        assert_eq!(scheduler.0.get(), 1);

        assert_eq!(queue.take(), vec![id(0), id(1)]);
        assert!(queue.is_empty());

        a.set(false);
        queue.enqueue(id(0), &a);
        assert_eq!(scheduler.0.get(), 2);
    }

    #[test]
    fn test_tick_scheduler_request() {
        let scheduler = TickScheduler::new();
        assert!(!scheduler.is_requested());
        scheduler.schedule_flush();
        assert!(scheduler.take_request());
        assert!(!scheduler.take_request());
    }
}
