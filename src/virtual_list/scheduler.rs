//! Deadline-ordered task queue with cancellation handles.
//!
//! Debounced writes, throttle trailing edges and indicator dismissal are all
//! entries in one queue owned by the list instance. The platform layer arms a
//! single timer for `next_deadline()` and feeds `take_due()` back into the
//! engine, so teardown only has to call `cancel_all()` to stop every pending
//! piece of work.

use std::collections::BTreeMap;

/// Work the engine can schedule for later
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Trailing edge of the scroll persistence debounce
    PersistScroll,
    /// Trailing edge of the scroll/resize throttle
    ThrottledViewport,
    /// Hide the "position restored" indicator
    DismissRestoredIndicator,
    /// Re-check the load triggers once the rate limit has passed
    DeferredLoad,
}

/// Cancellation token for one scheduled task
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

#[derive(Clone, Copy, Debug)]
struct ScheduledTask {
    due_ms: u64,
    kind: TaskKind,
}

#[derive(Debug, Default)]
pub struct TaskScheduler {
    next_id: u64,
    tasks: BTreeMap<TaskHandle, ScheduledTask>,
}

impl TaskScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, kind: TaskKind, due_ms: u64) -> TaskHandle {
        self.next_id += 1;
        let handle = TaskHandle(self.next_id);
        self.tasks.insert(handle, ScheduledTask { due_ms, kind });
        handle
    }

    /// Cancels a task. Returns false if it already ran or was cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.tasks.remove(&handle).is_some()
    }

    pub fn cancel_all(&mut self) {
        if !self.tasks.is_empty() {
            log::debug!("Cancelling {} scheduled task(s)", self.tasks.len());
        }
        self.tasks.clear();
    }

    pub fn is_pending(&self, handle: TaskHandle) -> bool {
        self.tasks.contains_key(&handle)
    }

    /// Earliest deadline among pending tasks
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.values().map(|task| task.due_ms).min()
    }

    /// Removes and returns every task due at `now_ms`, earliest first.
    pub fn take_due(&mut self, now_ms: u64) -> Vec<(TaskHandle, TaskKind)> {
        let mut due: Vec<(TaskHandle, ScheduledTask)> = self
            .tasks
            .iter()
            .filter(|(_, task)| task.due_ms <= now_ms)
            .map(|(&handle, &task)| (handle, task))
            .collect();
        for (handle, _) in &due {
            self.tasks.remove(handle);
        }
        due.sort_by_key(|(handle, task)| (task.due_ms, *handle));
        due.into_iter().map(|(handle, task)| (handle, task.kind)).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_due_in_deadline_order() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(TaskKind::DismissRestoredIndicator, 300);
        scheduler.schedule(TaskKind::PersistScroll, 100);
        scheduler.schedule(TaskKind::ThrottledViewport, 900);

        assert_eq!(scheduler.next_deadline(), Some(100));

        let due: Vec<TaskKind> = scheduler.take_due(300).into_iter().map(|(_, kind)| kind).collect();
        assert_eq!(due, vec![TaskKind::PersistScroll, TaskKind::DismissRestoredIndicator]);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.next_deadline(), Some(900));
    }

    #[test]
    fn test_cancel() {
        let mut scheduler = TaskScheduler::new();
        let handle = scheduler.schedule(TaskKind::PersistScroll, 100);
        assert!(scheduler.is_pending(handle));

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.take_due(1000).is_empty());
    }

    #[test]
    fn test_cancel_all() {
        let mut scheduler = TaskScheduler::new();
        scheduler.schedule(TaskKind::PersistScroll, 100);
        scheduler.schedule(TaskKind::ThrottledViewport, 16);

        scheduler.cancel_all();
        assert!(scheduler.is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }
}
