//! Worker registry: one handle per backend identity, with exclusive leases.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bigo_core::Backend;
use tracing::{debug, info};

use crate::worker::Worker;

struct Entry {
    worker: Arc<dyn Worker>,
    busy: Arc<AtomicBool>,
}

/// Mapping from backend identity to exactly one worker handle.
///
/// Populated during startup and read-only while runs are in flight; the busy
/// flags are the only state runs touch.
#[derive(Default)]
pub struct WorkerRegistry {
    entries: HashMap<Backend, Entry>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle. A second handle for the same backend replaces the
    /// first, which is returned.
    pub fn register(&mut self, worker: Arc<dyn Worker>) -> Option<Arc<dyn Worker>> {
        let backend = worker.backend();
        info!(backend = %backend, worker_id = %worker.id(), "Registering worker");
        self.entries
            .insert(
                backend,
                Entry {
                    worker,
                    busy: Arc::new(AtomicBool::new(false)),
                },
            )
            .map(|old| old.worker)
    }

    pub fn unregister(&mut self, backend: Backend) -> Option<Arc<dyn Worker>> {
        self.entries.remove(&backend).map(|e| e.worker)
    }

    pub fn get(&self, backend: Backend) -> Option<&Arc<dyn Worker>> {
        self.entries.get(&backend).map(|e| &e.worker)
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.entries.contains_key(&backend)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered backends in identity order.
    pub fn backends(&self) -> Vec<Backend> {
        let mut backends: Vec<Backend> = self.entries.keys().copied().collect();
        backends.sort();
        backends
    }

    /// Registered, reporting available, and not leased by another run.
    pub fn is_available(&self, backend: Backend) -> bool {
        self.entries
            .get(&backend)
            .map(|e| e.worker.available() && !e.busy.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Atomically claim the handle for `backend`.
    ///
    /// Returns `None` when the backend is unregistered, reports unavailable,
    /// or is already leased. The lease releases the handle on drop.
    pub fn try_acquire(&self, backend: Backend) -> Option<WorkerLease> {
        let entry = self.entries.get(&backend)?;
        if !entry.worker.available() {
            return None;
        }
        entry
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        debug!(backend = %backend, "Worker leased");
        Some(WorkerLease {
            worker: Arc::clone(&entry.worker),
            busy: Arc::clone(&entry.busy),
        })
    }
}

impl fmt::Debug for WorkerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRegistry")
            .field("backends", &self.backends())
            .finish()
    }
}

/// Exclusive claim on one worker handle for the duration of an execution.
pub struct WorkerLease {
    worker: Arc<dyn Worker>,
    busy: Arc<AtomicBool>,
}

impl WorkerLease {
    pub fn worker(&self) -> &dyn Worker {
        self.worker.as_ref()
    }

    pub fn backend(&self) -> Backend {
        self.worker.backend()
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        debug!(backend = %self.worker.backend(), "Worker released");
    }
}

impl fmt::Debug for WorkerLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLease")
            .field("backend", &self.backend())
            .field("worker_id", &self.worker.id())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::worker::WorkerError;
    use async_trait::async_trait;
    use bigo_core::{ExecutionResult, WorkItem};
    use tokio_util::sync::CancellationToken;

    /// Minimal handle for registry and resolver tests.
    pub(crate) struct StubWorker {
        id: String,
        backend: Backend,
        pub(crate) online: AtomicBool,
    }

    impl StubWorker {
        pub(crate) fn new(backend: Backend) -> Arc<Self> {
            Arc::new(Self {
                id: backend.as_str().replace(':', "-"),
                backend,
                online: AtomicBool::new(true),
            })
        }
    }

    #[async_trait]
    impl Worker for StubWorker {
        fn id(&self) -> &str {
            &self.id
        }

        fn backend(&self) -> Backend {
            self.backend
        }

        fn available(&self) -> bool {
            self.online.load(Ordering::SeqCst)
        }

        async fn execute(
            &self,
            _cancel: &CancellationToken,
            _item: &WorkItem,
        ) -> Result<ExecutionResult, WorkerError> {
            Ok(ExecutionResult::success("stub"))
        }

        async fn check_quota(&self, _cancel: &CancellationToken) -> Result<(), WorkerError> {
            Ok(())
        }
    }

    #[test]
    fn test_register_replaces_same_backend() {
        let mut registry = WorkerRegistry::new();
        assert!(registry.register(StubWorker::new(Backend::Ollama)).is_none());
        assert!(registry.register(StubWorker::new(Backend::Ollama)).is_some());
        registry.register(StubWorker::new(Backend::ClaudeOpus));
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.backends(),
            vec![Backend::Ollama, Backend::ClaudeOpus]
        );
    }

    #[test]
    fn test_lease_is_exclusive_and_released_on_drop() {
        let mut registry = WorkerRegistry::new();
        registry.register(StubWorker::new(Backend::Ollama));

        let lease = registry.try_acquire(Backend::Ollama).unwrap();
        assert_eq!(lease.backend(), Backend::Ollama);
        assert!(!registry.is_available(Backend::Ollama));
        assert!(registry.try_acquire(Backend::Ollama).is_none());

        drop(lease);
        assert!(registry.is_available(Backend::Ollama));
        assert!(registry.try_acquire(Backend::Ollama).is_some());
    }

    #[test]
    fn test_unavailable_worker_cannot_be_leased() {
        let mut registry = WorkerRegistry::new();
        let worker = StubWorker::new(Backend::GeminiPro);
        worker.online.store(false, Ordering::SeqCst);
        registry.register(worker);

        assert!(!registry.is_available(Backend::GeminiPro));
        assert!(registry.try_acquire(Backend::GeminiPro).is_none());
        assert!(registry.try_acquire(Backend::GeminiFlash).is_none());
    }

    #[test]
    fn test_unregister() {
        let mut registry = WorkerRegistry::new();
        registry.register(StubWorker::new(Backend::ClaudeHaiku));
        assert!(registry.unregister(Backend::ClaudeHaiku).is_some());
        assert!(registry.is_empty());
        assert!(!registry.contains(Backend::ClaudeHaiku));
    }

    #[tokio::test]
    async fn test_concurrent_acquire_yields_one_lease() {
        let mut registry = WorkerRegistry::new();
        registry.register(StubWorker::new(Backend::ClaudeSonnet));
        let registry = Arc::new(registry);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.try_acquire(Backend::ClaudeSonnet) })
            })
            .collect();

        let mut leases = Vec::new();
        for handle in handles {
            if let Some(lease) = handle.await.unwrap() {
                leases.push(lease);
            }
        }
        assert_eq!(leases.len(), 1);
    }
}
