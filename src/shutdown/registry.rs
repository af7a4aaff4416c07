//! Registry of pending cleanup tasks.
//!
//! Subsystems register tasks here without knowing about each other. The
//! coordinator takes a snapshot once shutdown starts, so registrations made
//! while shutdown is running never affect the in-flight pass.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

/// A zero-argument cleanup callable.
///
/// Identity is the `Arc` allocation: registering a clone of the same
/// `CleanupTask` twice has no additional effect.
pub type CleanupTask = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure into a [`CleanupTask`].
pub fn cleanup_task<F, Fut>(f: F) -> CleanupTask
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()) as BoxFuture<'static, anyhow::Result<()>>)
}

/// Set of cleanup tasks, in registration order.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<Vec<CleanupTask>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Registering an already registered task is a no-op.
    pub fn register(&self, task: &CleanupTask) {
        let mut tasks = self.tasks.lock();
        if !tasks.iter().any(|t| Arc::ptr_eq(t, task)) {
            tasks.push(Arc::clone(task));
        }
    }

    /// Remove a task if present.
    pub fn unregister(&self, task: &CleanupTask) {
        self.tasks.lock().retain(|t| !Arc::ptr_eq(t, task));
    }

    /// Copy of the current members, in registration order.
    pub fn snapshot(&self) -> Vec<CleanupTask> {
        self.tasks.lock().clone()
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Whether no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> CleanupTask {
        cleanup_task(|| async { Ok(()) })
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = TaskRegistry::new();
        let task = noop();

        registry.register(&task);
        registry.register(&task);
        registry.register(&Arc::clone(&task));

        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_tasks_are_distinct_members() {
        let registry = TaskRegistry::new();
        registry.register(&noop());
        registry.register(&noop());

        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unregister_removes_task() {
        let registry = TaskRegistry::new();
        let a = noop();
        let b = noop();
        registry.register(&a);
        registry.register(&b);

        registry.unregister(&a);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &b));
    }

    #[test]
    fn test_unregister_unknown_is_noop() {
        let registry = TaskRegistry::new();
        registry.register(&noop());

        registry.unregister(&noop());
        assert_eq!(registry.len(), 1);

        let empty = TaskRegistry::new();
        empty.unregister(&noop());
        assert!(empty.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let registry = TaskRegistry::new();
        let a = noop();
        registry.register(&a);

        let snapshot = registry.snapshot();
        registry.unregister(&a);
        registry.register(&noop());
        registry.register(&noop());

        assert_eq!(snapshot.len(), 1);
        assert!(Arc::ptr_eq(&snapshot[0], &a));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_snapshot_keeps_registration_order() {
        let registry = TaskRegistry::new();
        let tasks: Vec<CleanupTask> = (0..5).map(|_| noop()).collect();
        for task in &tasks {
            registry.register(task);
        }

        let snapshot = registry.snapshot();
        for (a, b) in snapshot.iter().zip(&tasks) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(TaskRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let task = noop();
                        registry.register(&task);
                        let _ = registry.snapshot();
                        registry.unregister(&task);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(registry.is_empty());
    }
}
