//! Fast Task Service
//!
//! Cache-backed task execution. A submission whose `(kind, input)` was seen
//! before is answered from the result cache without running a handler.
//! Everything else goes through a bounded priority queue drained by a
//! dispatcher that keeps at most `max_concurrency` handlers in flight, each
//! under a timeout.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{Notify, Semaphore, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::queue::PriorityQueue;
use crate::cache::{CacheKey, ResultCache};
use crate::config::QueueConfig;
use crate::tasks::{
    HandlerTable, Task, TaskId, TaskKind, TaskOutput, TaskPriority, TaskSpec, TaskStatus,
    TaskStore,
};
use crate::{Error, Result};

/// Outcome of [`FastTaskService::add_task`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "submission", rename_all = "snake_case")]
pub enum Submission {
    /// Answered from the cache; no task was created
    Cached { output: TaskOutput },
    /// Queued for execution
    Accepted { task_id: TaskId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FastServiceStatus {
    pub is_running: bool,
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub processed_count: u64,
    pub cache_size: u64,
    pub uptime_secs: f64,
    pub tasks_per_second: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Tasks completed by a handler
    pub total_tasks: u64,
    pub average_processing_time_ms: f64,
    /// `hits / (hits + misses)` in `[0, 1]`
    pub cache_hit_rate: f64,
    pub tasks_per_second: f64,
    pub uptime_secs: f64,
    pub active_tasks: usize,
}

/// Slots in the completion signal ring; waiters that lag re-check the store
const SIGNAL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
enum Signal {
    Finished(TaskId),
    Stopped,
}

struct Shared {
    handlers: HandlerTable,
    cache: Arc<ResultCache>,
    tasks: TaskStore,
    queue: Mutex<PriorityQueue>,
    /// Wakes the dispatcher after a push
    queued: Notify,
    permits: Arc<Semaphore>,
    config: QueueConfig,
    running: AtomicBool,
    active: AtomicUsize,
    processed: AtomicU64,
    signals: broadcast::Sender<Signal>,
    started_at: Instant,
}

impl Shared {
    fn queue(&self) -> std::sync::MutexGuard<'_, PriorityQueue> {
        self.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn uptime_secs(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    fn tasks_per_second(&self) -> f64 {
        let uptime = self.uptime_secs();
        if uptime > 0.0 {
            self.processed.load(Ordering::Relaxed) as f64 / uptime
        } else {
            0.0
        }
    }

    /// Run one dequeued task to a terminal state
    async fn run(&self, task_id: TaskId) {
        if let Err(e) = self.execute(&task_id).await {
            error!(task = %task_id, "Task bookkeeping failed: {}", e);
        }
        let _ = self.signals.send(Signal::Finished(task_id));
    }

    async fn execute(&self, task_id: &TaskId) -> Result<()> {
        let task = self
            .tasks
            .update(task_id.as_str(), |t| t.start().map(|_| t.clone()))
            .await??;

        self.active.fetch_add(1, Ordering::SeqCst);
        let outcome =
            match tokio::time::timeout(self.config.task_timeout(), self.handlers.dispatch(&task))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(Error::TaskTimeout(task_id.to_string())),
            };
        self.active.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Ok(output) => {
                self.cache
                    .set(CacheKey::new(task.kind, &task.input), output.clone())
                    .await;
                let elapsed = self
                    .tasks
                    .update(task_id.as_str(), |t| {
                        t.complete(output).map(|_| t.processing_time_ms)
                    })
                    .await??;
                self.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    task = %task_id,
                    kind = %task.kind,
                    elapsed_ms = elapsed.unwrap_or(0),
                    "Fast task completed"
                );
            }
            Err(e) => {
                warn!(task = %task_id, kind = %task.kind, "Fast task failed: {}", e);
                self.tasks
                    .update(task_id.as_str(), |t| t.fail(e.to_string()))
                    .await??;
            }
        }

        Ok(())
    }
}

struct Dispatcher {
    shutdown: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Cache-backed task service with a bounded work queue
pub struct FastTaskService {
    shared: Arc<Shared>,
    dispatcher: tokio::sync::Mutex<Option<Dispatcher>>,
}

impl FastTaskService {
    pub fn new(handlers: HandlerTable, cache: Arc<ResultCache>, config: QueueConfig) -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        let shared = Shared {
            handlers,
            cache,
            tasks: TaskStore::new(),
            queue: Mutex::new(PriorityQueue::new(config.capacity)),
            queued: Notify::new(),
            permits: Arc::new(Semaphore::new(config.max_concurrency.max(1))),
            config,
            running: AtomicBool::new(false),
            active: AtomicUsize::new(0),
            processed: AtomicU64::new(0),
            signals,
            started_at: Instant::now(),
        };

        Self {
            shared: Arc::new(shared),
            dispatcher: tokio::sync::Mutex::new(None),
        }
    }

    /// Spawn the dispatcher. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut dispatcher = self.dispatcher.lock().await;
        if dispatcher.is_some() {
            return false;
        }

        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(dispatch_loop(self.shared.clone(), shutdown_rx));
        *dispatcher = Some(Dispatcher { shutdown, handle });
        self.shared.running.store(true, Ordering::SeqCst);

        info!(
            max_concurrency = self.shared.config.max_concurrency,
            capacity = self.shared.config.capacity,
            "Fast task service started"
        );
        true
    }

    /// Stop dispatching. In-flight tasks run to completion; queued tasks
    /// stay pending until the next `start`. Returns `false` if not running.
    pub async fn stop(&self) -> bool {
        let Some(dispatcher) = self.dispatcher.lock().await.take() else {
            return false;
        };

        self.shared.running.store(false, Ordering::SeqCst);
        let _ = dispatcher.shutdown.send(());
        if let Err(e) = dispatcher.handle.await {
            error!("Fast task dispatcher ended abnormally: {}", e);
        }
        let _ = self.shared.signals.send(Signal::Stopped);

        info!("Fast task service stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Submit work.
    ///
    /// Returns the cached output when an identical `(kind, input)` already
    /// completed; otherwise queues a new task.
    ///
    /// # Errors
    /// `QueueFull` when the queue is at capacity
    pub async fn add_task(
        &self,
        kind: TaskKind,
        input: Value,
        priority: TaskPriority,
    ) -> Result<Submission> {
        let key = CacheKey::new(kind, &input);
        if let Some(output) = self.shared.cache.get(&key).await {
            debug!(kind = %kind, "Cache hit");
            return Ok(Submission::Cached { output });
        }

        let capacity = self.shared.config.capacity;
        if self.shared.queue().is_full() {
            warn!(kind = %kind, capacity, "Fast task rejected: queue full");
            return Err(Error::QueueFull(capacity));
        }

        let spec = TaskSpec::new(kind, "")
            .with_priority(priority)
            .with_input(input);
        let task_id = self.shared.tasks.insert(Task::new(spec)).await;

        let pushed = self.shared.queue().push(task_id.clone(), priority);
        if let Err(e) = pushed {
            // Lost a race for the last slot
            self.shared.tasks.remove(task_id.as_str()).await;
            warn!(kind = %kind, capacity, "Fast task rejected: queue full");
            return Err(e);
        }
        self.shared.queued.notify_one();

        debug!(task = %task_id, kind = %kind, priority = priority.as_str(), "Fast task queued");
        Ok(Submission::Accepted { task_id })
    }

    /// Wait until a task reaches a terminal state
    ///
    /// # Errors
    /// - `TaskNotFound` for unknown ids
    /// - `ServiceStopped` if the task is still in the queue and the service
    ///   is not running
    pub async fn wait_for(&self, task_id: &TaskId) -> Result<Task> {
        // Subscribe before the first look so no completion slips through
        let mut signals = self.shared.signals.subscribe();

        loop {
            let task = self
                .shared
                .tasks
                .get(task_id.as_str())
                .await
                .ok_or_else(|| Error::TaskNotFound(task_id.to_string()))?;

            if task.is_finished() {
                return Ok(task);
            }
            // A pending task outside the queue was already handed to a worker
            if task.status == TaskStatus::Pending
                && !self.is_running()
                && self.shared.queue().contains(task_id)
            {
                return Err(Error::ServiceStopped);
            }

            loop {
                match signals.recv().await {
                    Ok(Signal::Finished(id)) if &id == task_id => break,
                    Ok(Signal::Finished(_)) => continue,
                    Ok(Signal::Stopped) | Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => return Err(Error::ServiceStopped),
                }
            }
        }
    }

    pub async fn get_task(&self, task_id: &str) -> Option<Task> {
        self.shared.tasks.get(task_id).await
    }

    pub async fn all_tasks(&self) -> Vec<Task> {
        self.shared.tasks.all().await
    }

    pub async fn clear_cache(&self) {
        self.shared.cache.clear().await;
        info!("Fast task cache cleared");
    }

    pub fn get_status(&self) -> FastServiceStatus {
        FastServiceStatus {
            is_running: self.is_running(),
            active_tasks: self.shared.active.load(Ordering::SeqCst),
            queued_tasks: self.shared.queue().len(),
            processed_count: self.shared.processed.load(Ordering::Relaxed),
            cache_size: self.shared.cache.len(),
            uptime_secs: self.shared.uptime_secs(),
            tasks_per_second: self.shared.tasks_per_second(),
        }
    }

    pub async fn performance_metrics(&self) -> PerformanceMetrics {
        PerformanceMetrics {
            total_tasks: self.shared.processed.load(Ordering::Relaxed),
            average_processing_time_ms: self.shared.tasks.average_processing_time_ms().await,
            cache_hit_rate: self.shared.cache.stats().hit_rate(),
            tasks_per_second: self.shared.tasks_per_second(),
            uptime_secs: self.shared.uptime_secs(),
            active_tasks: self.shared.active.load(Ordering::SeqCst),
        }
    }
}

impl std::fmt::Debug for FastTaskService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastTaskService")
            .field("is_running", &self.is_running())
            .field("handlers", &self.shared.handlers)
            .field("config", &self.shared.config)
            .finish_non_exhaustive()
    }
}

/// Pop tasks in priority order while permits are available
async fn dispatch_loop(shared: Arc<Shared>, mut shutdown: broadcast::Receiver<()>) {
    debug!("Fast task dispatcher running");

    'dispatch: loop {
        let permit = tokio::select! {
            _ = shutdown.recv() => break 'dispatch,
            permit = shared.permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break 'dispatch,
            },
        };

        let task_id = 'wait: loop {
            let next = shared.queue().pop();
            if let Some(task_id) = next {
                break 'wait task_id;
            }
            tokio::select! {
                _ = shutdown.recv() => break 'dispatch,
                _ = shared.queued.notified() => {}
            }
        };

        let worker = shared.clone();
        tokio::spawn(async move {
            let _permit = permit;
            worker.run(task_id).await;
        });
    }

    debug!("Fast task dispatcher exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::TaskHandler;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;

    /// Counts calls and optionally sleeps
    struct Counting {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl Counting {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TaskHandler for Counting {
        async fn handle(&self, task: &Task) -> Result<TaskOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(crate::tasks::CannedReport::report_for(task.kind))
        }
    }

    fn cache() -> Arc<ResultCache> {
        Arc::new(ResultCache::new(100, Duration::from_secs(60)))
    }

    fn config(capacity: usize, max_concurrency: usize, timeout_secs: u64) -> QueueConfig {
        QueueConfig {
            capacity,
            max_concurrency,
            task_timeout_secs: timeout_secs,
        }
    }

    fn accepted(submission: Submission) -> TaskId {
        match submission {
            Submission::Accepted { task_id } => task_id,
            other => panic!("expected accepted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_identical_submission_hits_cache() {
        let handler = Counting::new(Duration::ZERO);
        let handlers = HandlerTable::new().with(TaskKind::Testing, handler.clone());
        let service = FastTaskService::new(handlers, cache(), config(10, 2, 5));
        service.start().await;

        let input = json!({"suite": "unit", "files": ["a.rs", "b.rs"]});
        let first = service
            .add_task(TaskKind::Testing, input.clone(), TaskPriority::Medium)
            .await
            .unwrap();
        let task = service.wait_for(&accepted(first)).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        // Same input with keys in another order
        let second = service
            .add_task(
                TaskKind::Testing,
                json!({"files": ["a.rs", "b.rs"], "suite": "unit"}),
                TaskPriority::Medium,
            )
            .await
            .unwrap();

        match second {
            Submission::Cached { output } => assert_eq!(Some(output), task.result),
            other => panic!("expected cache hit, got {:?}", other),
        }
        assert_eq!(handler.calls(), 1);
        assert_eq!(service.all_tasks().await.len(), 1);

        let metrics = service.performance_metrics().await;
        assert_eq!(metrics.total_tasks, 1);
        assert_eq!(metrics.cache_hit_rate, 0.5);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_pipeline_handlers_end_to_end() {
        let service = FastTaskService::new(
            HandlerTable::fast_without_delays(),
            cache(),
            QueueConfig::default(),
        );
        service.start().await;

        let id = accepted(
            service
                .add_task(TaskKind::Optimization, json!({"count": 12}), TaskPriority::High)
                .await
                .unwrap(),
        );
        let task = service.wait_for(&id).await.unwrap();
        match task.result {
            Some(TaskOutput::OptimizationPipeline(p)) => {
                assert_eq!(p.images.target, 12);
                assert_eq!(p.database.target, 12);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let id = accepted(
            service
                .add_task(TaskKind::Franchise, Value::Null, TaskPriority::Low)
                .await
                .unwrap(),
        );
        let task = service.wait_for(&id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("unsupported task kind"));

        service.stop().await;
    }

    #[tokio::test]
    async fn test_queue_full_rejects_submission() {
        let handlers = HandlerTable::fast_without_delays();
        let service = FastTaskService::new(handlers, cache(), config(2, 1, 5));

        // Not started: nothing drains the queue
        for n in 0..2 {
            service
                .add_task(TaskKind::Monitoring, json!({ "n": n }), TaskPriority::Low)
                .await
                .unwrap();
        }
        let result = service
            .add_task(TaskKind::Monitoring, json!({"n": 99}), TaskPriority::Critical)
            .await;

        assert!(matches!(result, Err(Error::QueueFull(2))));
        assert_eq!(service.all_tasks().await.len(), 2);
        assert_eq!(service.get_status().queued_tasks, 2);
    }

    #[tokio::test]
    async fn test_queued_before_start_runs_by_priority() {
        let handler = Counting::new(Duration::ZERO);
        let handlers = HandlerTable::new().with(TaskKind::Seo, handler.clone());
        let service = FastTaskService::new(handlers, cache(), config(10, 1, 5));

        let low = accepted(service.add_task(TaskKind::Seo, json!(1), TaskPriority::Low).await.unwrap());
        let crit =
            accepted(service.add_task(TaskKind::Seo, json!(2), TaskPriority::Critical).await.unwrap());
        let med = accepted(service.add_task(TaskKind::Seo, json!(3), TaskPriority::Medium).await.unwrap());

        // Stopped service with queued work
        assert!(matches!(service.wait_for(&low).await, Err(Error::ServiceStopped)));

        service.start().await;
        let low = service.wait_for(&low).await.unwrap();
        let crit = service.wait_for(&crit).await.unwrap();
        let med = service.wait_for(&med).await.unwrap();

        assert!(crit.started_at <= med.started_at);
        assert!(med.started_at <= low.started_at);
        assert_eq!(handler.calls(), 3);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_concurrency_is_capped() {
        struct Gauge {
            current: AtomicUsize,
            peak: AtomicUsize,
        }

        #[async_trait]
        impl TaskHandler for Gauge {
            async fn handle(&self, task: &Task) -> Result<TaskOutput> {
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                Ok(crate::tasks::CannedReport::report_for(task.kind))
            }
        }

        let gauge = Arc::new(Gauge {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let handlers = HandlerTable::new().with(TaskKind::Testing, gauge.clone());
        let service = FastTaskService::new(handlers, cache(), config(32, 3, 5));
        service.start().await;

        let mut ids = Vec::new();
        for n in 0..12 {
            let submission = service
                .add_task(TaskKind::Testing, json!(n), TaskPriority::Medium)
                .await
                .unwrap();
            ids.push(accepted(submission));
        }
        for id in &ids {
            assert_eq!(service.wait_for(id).await.unwrap().status, TaskStatus::Completed);
        }

        assert!(gauge.peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(service.get_status().processed_count, 12);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_task_timeout() {
        let handler = Counting::new(Duration::from_secs(5));
        let handlers = HandlerTable::new().with(TaskKind::Deployment, handler.clone());
        // Zero timeout: every handler that has to wait times out
        let service = FastTaskService::new(handlers, cache(), config(4, 1, 0));
        service.start().await;

        let id = accepted(
            service
                .add_task(TaskKind::Deployment, Value::Null, TaskPriority::High)
                .await
                .unwrap(),
        );
        let task = service.wait_for(&id).await.unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.error.unwrap().contains("timed out"));
        // Failures are not cached
        service.shared.cache.sync().await;
        assert_eq!(service.get_status().cache_size, 0);

        service.stop().await;
    }

    #[tokio::test]
    async fn test_start_stop_and_clear_cache() {
        let service = FastTaskService::new(
            HandlerTable::fast_without_delays(),
            cache(),
            QueueConfig::default(),
        );
        assert!(service.start().await);
        assert!(!service.start().await);
        assert!(service.get_status().is_running);

        let id = accepted(
            service
                .add_task(TaskKind::Monitoring, Value::Null, TaskPriority::Medium)
                .await
                .unwrap(),
        );
        service.wait_for(&id).await.unwrap();

        service.clear_cache().await;
        assert_eq!(service.get_status().cache_size, 0);
        let again = service
            .add_task(TaskKind::Monitoring, Value::Null, TaskPriority::Medium)
            .await
            .unwrap();
        assert!(matches!(again, Submission::Accepted { .. }));

        assert!(service.stop().await);
        assert!(!service.stop().await);
        assert!(!service.get_status().is_running);
    }

    #[tokio::test]
    async fn test_panicking_handler_fails_task() {
        struct Panicking;

        #[async_trait]
        impl TaskHandler for Panicking {
            async fn handle(&self, _task: &Task) -> Result<TaskOutput> {
                panic!("pipeline crashed")
            }
        }

        let handlers = HandlerTable::new().with(TaskKind::Testing, Arc::new(Panicking));
        let service = FastTaskService::new(handlers, cache(), config(4, 1, 5));
        service.start().await;

        let id = accepted(
            service
                .add_task(TaskKind::Testing, json!({"suite": "unit"}), TaskPriority::High)
                .await
                .unwrap(),
        );
        let task = tokio::time::timeout(Duration::from_secs(2), service.wait_for(&id))
            .await
            .expect("wait_for must return once the handler panics")
            .unwrap();

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());
        assert!(task.error.unwrap().contains("handler panicked"));

        let status = service.get_status();
        assert_eq!(status.active_tasks, 0);
        assert_eq!(status.processed_count, 0);
        service.shared.cache.sync().await;
        assert_eq!(service.get_status().cache_size, 0);

        // The dispatcher survives and keeps serving
        assert!(service.is_running());
        service.stop().await;
    }

    #[tokio::test]
    async fn test_signal_ring_is_independent_of_queue_capacity() {
        let service = FastTaskService::new(HandlerTable::new(), cache(), config(1, 1, 5));
        let mut signals = service.shared.signals.subscribe();

        for n in 0..SIGNAL_CAPACITY {
            let _ = service
                .shared
                .signals
                .send(Signal::Finished(TaskId::new(format!("task_{}", n))));
        }

        for n in 0..SIGNAL_CAPACITY {
            match signals.recv().await {
                Ok(Signal::Finished(id)) => assert_eq!(id.as_str(), format!("task_{}", n)),
                other => panic!("signal {} lost: {:?}", n, other),
            }
        }
    }

    #[tokio::test]
    async fn test_wait_for_dequeued_task_after_stop() {
        let service = Arc::new(FastTaskService::new(
            HandlerTable::fast_without_delays(),
            cache(),
            config(4, 1, 5),
        ));
        let id = accepted(
            service
                .add_task(TaskKind::Testing, json!({"suite": "e2e"}), TaskPriority::Medium)
                .await
                .unwrap(),
        );

        // Popped by a dispatcher that has since stopped; the worker has not started it yet
        assert_eq!(service.shared.queue().pop().as_ref(), Some(&id));
        assert!(!service.is_running());

        let waiter = {
            let service = service.clone();
            let id = id.clone();
            tokio::spawn(async move { service.wait_for(&id).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        service.shared.run(id).await;
        let task = waiter.await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_wait_for_unknown_task() {
        let service = FastTaskService::new(HandlerTable::new(), cache(), QueueConfig::default());
        let result = service.wait_for(&TaskId::new("task_missing")).await;
        assert!(matches!(result, Err(Error::TaskNotFound(_))));
    }
}
