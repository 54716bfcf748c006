use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_queue::ArrayQueue;
use futures::future::{join_all, BoxFuture};
use graphmind_core::{AgentResult, GraphMindError, ReasoningConfig, Result, TaskType};
use sysinfo::System;
use tokio::sync::{oneshot, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::metrics::TaskMetrics;

/// A synchronous unit of CPU-bound work, dispatched onto the rayon pool.
pub type CpuJob = Box<dyn FnOnce() -> Result<serde_json::Value> + Send>;

/// An asynchronous unit of I/O-bound work, dispatched onto the
/// semaphore-bounded tokio pool.
pub type IoJob = BoxFuture<'static, Result<serde_json::Value>>;

/// A unit of schedulable work. The variant must match `task_type.is_io_bound()`
/// — `submit` rejects a mismatch as an internal invariant violation rather
/// than silently picking a pool.
pub enum TaskJob {
    Cpu(CpuJob),
    Io(IoJob),
}

/// Capacity of the main/CPU pool's bounded holding queue before
/// submissions fall back to running on the caller's own task.
const CPU_HOLDING_QUEUE_CAPACITY: usize = 100;

/// Capacity of the I/O pool's holding queue. Sized larger than the CPU
/// pool's since GRAPH_QUERY/EMBEDDING bursts (e.g. scoring every relation
/// at once during a traversal step) are wider than typical CPU fan-out.
const IO_HOLDING_QUEUE_CAPACITY: usize = 256;

type TaskOutcome = (Result<serde_json::Value>, Duration);

struct PendingIo {
    task_type: TaskType,
    future: IoJob,
    reply: oneshot::Sender<TaskOutcome>,
    enqueued_at: Instant,
    timeout: Option<Duration>,
}

struct PendingCpu {
    task_type: TaskType,
    job: CpuJob,
    reply: oneshot::Sender<TaskOutcome>,
    enqueued_at: Instant,
    timeout: Option<Duration>,
}

/// A task to run as part of a dependency-respecting batch.
pub struct DependentTask {
    pub id: String,
    pub task_type: TaskType,
    pub job: TaskJob,
    pub dependencies: Vec<String>,
    /// Per-task deadline. `None` means the task runs to completion
    /// unbounded, deferring entirely to its pool's own behavior.
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy)]
pub struct SchedulerLoad {
    pub active_tasks: usize,
    pub queued_tasks: usize,
    pub cpu_usage_percent: f32,
}

/// The dual-pool task scheduler: a rayon thread pool for CPU-bound work and
/// a `Semaphore`-bounded tokio pool for I/O-bound work, each fronted by a
/// bounded holding queue with a caller-runs backpressure policy for
/// submissions that arrive while the pool and its holding queue are both
/// saturated.
pub struct TaskScheduler {
    cpu_pool: rayon::ThreadPool,
    cpu_semaphore: Arc<Semaphore>,
    cpu_holding_queue: Arc<ArrayQueue<PendingCpu>>,
    io_semaphore: Arc<Semaphore>,
    io_holding_queue: Arc<ArrayQueue<PendingIo>>,
    metrics: Arc<TaskMetrics>,
    active: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    system: parking_lot::Mutex<System>,
    maintenance: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl TaskScheduler {
    pub fn new(config: &ReasoningConfig) -> Result<Arc<Self>> {
        let pool_size = config.thread_pool_size.max(1);
        let cpu_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(|i| format!("graphmind-cpu-{i}"))
            .build()
            .map_err(|e| GraphMindError::Internal(format!("failed to build CPU pool: {e}")))?;

        let scheduler = Arc::new(Self {
            cpu_pool,
            cpu_semaphore: Arc::new(Semaphore::new(pool_size)),
            cpu_holding_queue: Arc::new(ArrayQueue::new(CPU_HOLDING_QUEUE_CAPACITY)),
            io_semaphore: Arc::new(Semaphore::new(config.io_pool_size())),
            io_holding_queue: Arc::new(ArrayQueue::new(IO_HOLDING_QUEUE_CAPACITY)),
            metrics: Arc::new(TaskMetrics::new()),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown: CancellationToken::new(),
            system: parking_lot::Mutex::new(System::new()),
            maintenance: parking_lot::Mutex::new(None),
        });

        let handle = scheduler.clone().spawn_maintenance_loop();
        *scheduler.maintenance.lock() = Some(handle);
        Ok(scheduler)
    }

    fn spawn_maintenance_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(25));
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        self.drain_io_holding_queue();
                        self.drain_cpu_holding_queue();
                    }
                }
            }
        })
    }

    fn drain_io_holding_queue(&self) {
        while let Ok(permit) = self.io_semaphore.clone().try_acquire_owned() {
            match self.io_holding_queue.pop() {
                Some(pending) => {
                    let waited = pending.enqueued_at.elapsed();
                    debug!(task_type = %pending.task_type, waited_ms = waited.as_millis() as u64, "dequeued held I/O task");
                    self.spawn_io(permit, pending.task_type, pending.future, pending.reply, pending.timeout);
                }
                None => {
                    drop(permit);
                    break;
                }
            }
        }
    }

    fn drain_cpu_holding_queue(&self) {
        while let Ok(permit) = self.cpu_semaphore.clone().try_acquire_owned() {
            match self.cpu_holding_queue.pop() {
                Some(pending) => {
                    let waited = pending.enqueued_at.elapsed();
                    debug!(task_type = %pending.task_type, waited_ms = waited.as_millis() as u64, "dequeued held CPU task");
                    self.spawn_cpu(permit, pending.task_type, pending.job, pending.reply, pending.timeout);
                }
                None => {
                    drop(permit);
                    break;
                }
            }
        }
    }

    fn spawn_io(
        &self,
        permit: tokio::sync::OwnedSemaphorePermit,
        task_type: TaskType,
        future: IoJob,
        reply: oneshot::Sender<TaskOutcome>,
        timeout: Option<Duration>,
    ) {
        let active = self.active.clone();
        let metrics = self.metrics.clone();
        active.fetch_add(1, Ordering::SeqCst);
        tokio::spawn(async move {
            let _permit = permit;
            let start = Instant::now();
            // `tokio::time::timeout` drops `future` if the deadline elapses
            // first, which cancels whatever it was awaiting — the cooperative
            // cancellation the I/O pool promises for timed-out tasks.
            let outcome = match timeout {
                Some(d) => tokio::time::timeout(d, future).await.unwrap_or_else(|_| {
                    Err(GraphMindError::Timeout(format!("{task_type} exceeded {d:?}")))
                }),
                None => future.await,
            };
            let elapsed = start.elapsed();
            record_outcome(&metrics, task_type, elapsed, &outcome);
            active.fetch_sub(1, Ordering::SeqCst);
            let _ = reply.send((outcome, elapsed));
        });
    }

    fn spawn_cpu(
        &self,
        permit: tokio::sync::OwnedSemaphorePermit,
        task_type: TaskType,
        job: CpuJob,
        reply: oneshot::Sender<TaskOutcome>,
        timeout: Option<Duration>,
    ) {
        let active = self.active.clone();
        let metrics = self.metrics.clone();
        active.fetch_add(1, Ordering::SeqCst);
        self.cpu_pool.spawn(move || {
            let _permit = permit;
            let start = Instant::now();
            let outcome = job();
            let elapsed = start.elapsed();
            record_outcome(&metrics, task_type, elapsed, &outcome);
            active.fetch_sub(1, Ordering::SeqCst);
            let _ = reply.send((outcome, elapsed));
        });
        // Sync closures on the rayon pool cannot be preempted mid-execution;
        // a timeout here only bounds how long the caller waits for the
        // reply; the closure itself keeps running to completion.
        let _ = timeout;
    }

    /// Dispatches a task to the pool its `TaskType` belongs to, with no
    /// deadline. Equivalent to `submit_with_timeout(task_type, job, None)`.
    pub async fn submit(&self, task_type: TaskType, job: TaskJob) -> Result<AgentResult> {
        self.submit_with_timeout(task_type, job, None).await
    }

    /// Dispatches a task to the pool its `TaskType` belongs to. I/O tasks
    /// that find the I/O pool and its holding queue both saturated run
    /// directly on the caller's task instead of being dropped or blocking
    /// indefinitely (caller-runs backpressure policy); the main/CPU pool
    /// applies the same policy. `timeout`, if set, converts a still-running
    /// task into a `GraphMindError::Timeout` once the deadline elapses.
    pub async fn submit_with_timeout(
        &self,
        task_type: TaskType,
        job: TaskJob,
        timeout: Option<Duration>,
    ) -> Result<AgentResult> {
        if self.shutdown.is_cancelled() {
            return Err(GraphMindError::DependencyFailed("scheduler is shutting down".into()));
        }
        match (task_type.is_io_bound(), job) {
            (false, TaskJob::Cpu(job)) => self.run_cpu(task_type, job, timeout).await,
            (true, TaskJob::Io(future)) => self.run_io(task_type, future, timeout).await,
            _ => Err(GraphMindError::Internal(format!(
                "task type {task_type} submitted with a job of the wrong kind"
            ))),
        }
    }

    async fn run_cpu(&self, task_type: TaskType, job: CpuJob, timeout: Option<Duration>) -> Result<AgentResult> {
        if let Ok(permit) = self.cpu_semaphore.clone().try_acquire_owned() {
            let (tx, rx) = oneshot::channel();
            self.spawn_cpu(permit, task_type, job, tx, timeout);
            return Self::await_reply(rx, timeout, task_type).await;
        }

        let (tx, rx) = oneshot::channel();
        let pending = PendingCpu {
            task_type,
            job,
            reply: tx,
            enqueued_at: Instant::now(),
            timeout,
        };
        match self.cpu_holding_queue.push(pending) {
            Ok(()) => Self::await_reply(rx, timeout, task_type).await,
            Err(pending) => {
                warn!(%task_type, "CPU holding queue saturated, running task on caller");
                let start = Instant::now();
                let outcome = (pending.job)();
                let elapsed = start.elapsed();
                record_outcome(&self.metrics, task_type, elapsed, &outcome);
                Ok(to_agent_result(outcome, elapsed))
            }
        }
    }

    async fn run_io(&self, task_type: TaskType, future: IoJob, timeout: Option<Duration>) -> Result<AgentResult> {
        if let Ok(permit) = self.io_semaphore.clone().try_acquire_owned() {
            let (tx, rx) = oneshot::channel();
            self.spawn_io(permit, task_type, future, tx, timeout);
            return Self::await_reply(rx, timeout, task_type).await;
        }

        let (tx, rx) = oneshot::channel();
        let pending = PendingIo {
            task_type,
            future,
            reply: tx,
            enqueued_at: Instant::now(),
            timeout,
        };
        match self.io_holding_queue.push(pending) {
            Ok(()) => Self::await_reply(rx, timeout, task_type).await,
            Err(pending) => {
                warn!(%task_type, "I/O holding queue saturated, running task on caller");
                let start = Instant::now();
                let outcome = pending.future.await;
                let elapsed = start.elapsed();
                record_outcome(&self.metrics, task_type, elapsed, &outcome);
                Ok(to_agent_result(outcome, elapsed))
            }
        }
    }

    /// Waits for a dispatched task's reply, applying an outer deadline on
    /// top of whatever the dispatching closure already enforced — this is
    /// what bounds the wait for CPU tasks, which cannot be preempted once
    /// running on the rayon pool.
    async fn await_reply(
        rx: oneshot::Receiver<TaskOutcome>,
        timeout: Option<Duration>,
        task_type: TaskType,
    ) -> Result<AgentResult> {
        let received = match timeout {
            Some(d) => match tokio::time::timeout(d, rx).await {
                Ok(inner) => inner,
                Err(_) => return Err(GraphMindError::Timeout(format!("{task_type} exceeded {d:?}"))),
            },
            None => rx.await,
        };
        let (outcome, elapsed) = received
            .map_err(|_| GraphMindError::Internal("task dropped before completing".into()))?;
        Ok(to_agent_result(outcome, elapsed))
    }

    /// Submits a batch of independent tasks concurrently.
    pub async fn submit_batch(&self, tasks: Vec<(TaskType, TaskJob)>) -> Vec<Result<AgentResult>> {
        join_all(tasks.into_iter().map(|(task_type, job)| self.submit(task_type, job))).await
    }

    /// Submits a batch of tasks that may depend on each other's completion.
    /// Runs in dependency waves: everything whose dependencies are already
    /// complete runs concurrently, then the next wave, and so on. A
    /// dependency that never resolves (missing id, or a cycle) leaves the
    /// affected tasks unresolved, reported as `DependencyFailed`.
    pub async fn submit_dependent(
        &self,
        tasks: Vec<DependentTask>,
    ) -> HashMap<String, Result<AgentResult>> {
        let mut remaining: HashMap<String, DependentTask> =
            tasks.into_iter().map(|t| (t.id.clone(), t)).collect();
        let mut done: HashMap<String, Result<AgentResult>> = HashMap::new();

        loop {
            let ready_ids: Vec<String> = remaining
                .iter()
                .filter(|(_, task)| task.dependencies.iter().all(|d| done.contains_key(d)))
                .map(|(id, _)| id.clone())
                .collect();

            if ready_ids.is_empty() {
                break;
            }

            let ready: Vec<DependentTask> = ready_ids
                .iter()
                .map(|id| remaining.remove(id).expect("id came from remaining"))
                .collect();

            let results = join_all(ready.into_iter().map(|task| async move {
                let result = self.submit_with_timeout(task.task_type, task.job, task.timeout).await;
                (task.id, result)
            }))
            .await;

            for (id, result) in results {
                done.insert(id, result);
            }
        }

        for (id, task) in remaining {
            let missing: Vec<String> = task
                .dependencies
                .into_iter()
                .filter(|d| !done.contains_key(d))
                .collect();
            done.insert(
                id,
                Err(GraphMindError::DependencyFailed(format!(
                    "unresolved dependencies: {missing:?}"
                ))),
            );
        }

        done
    }

    /// Current load signal: active task count, held-but-not-running task
    /// count, and a point-in-time CPU utilization sample.
    pub fn load(&self) -> SchedulerLoad {
        let mut system = self.system.lock();
        system.refresh_cpu_usage();
        SchedulerLoad {
            active_tasks: self.active.load(Ordering::Relaxed),
            queued_tasks: self.io_holding_queue.len() + self.cpu_holding_queue.len(),
            cpu_usage_percent: system.global_cpu_usage(),
        }
    }

    pub fn metrics(&self) -> &TaskMetrics {
        &self.metrics
    }

    /// Signals shutdown and waits up to `grace` for in-flight tasks to
    /// drain; logs a warning and returns anyway if the grace period
    /// elapses with tasks still active.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        let deadline = Instant::now() + grace;
        while self.active.load(Ordering::SeqCst) > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let remaining = self.active.load(Ordering::SeqCst);
        if remaining > 0 {
            warn!(remaining, "scheduler shutdown grace period elapsed with tasks still active");
        }
        if let Some(handle) = self.maintenance.lock().take() {
            handle.abort();
        }
    }
}

fn record_outcome(
    metrics: &TaskMetrics,
    task_type: TaskType,
    elapsed: Duration,
    outcome: &Result<serde_json::Value>,
) {
    match outcome {
        Ok(_) => metrics.record_success(task_type, elapsed.as_secs_f64() * 1000.0),
        Err(_) => metrics.record_failure(task_type),
    }
}

fn to_agent_result(outcome: Result<serde_json::Value>, elapsed: Duration) -> AgentResult {
    match outcome {
        Ok(value) => AgentResult::ok(value, elapsed),
        Err(e) => AgentResult::failure(e.to_string(), elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn test_config(pool_size: usize) -> ReasoningConfig {
        ReasoningConfig {
            thread_pool_size: pool_size,
            ..ReasoningConfig::default()
        }
    }

    #[tokio::test]
    async fn cpu_task_dispatches_and_completes() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let result = scheduler
            .submit(
                TaskType::PathScoring,
                TaskJob::Cpu(Box::new(|| Ok(serde_json::json!({"ok": true})))),
            )
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn io_task_dispatches_and_completes() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let result = scheduler
            .submit(
                TaskType::GraphQuery,
                TaskJob::Io(Box::pin(async { Ok(serde_json::json!({"ok": true})) })),
            )
            .await
            .unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn mismatched_job_kind_is_rejected() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let result = scheduler
            .submit(
                TaskType::GraphQuery,
                TaskJob::Cpu(Box::new(|| Ok(serde_json::json!(1)))),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn io_task_exceeding_its_timeout_fails_with_timeout_kind() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let result = scheduler
            .submit_with_timeout(
                TaskType::GraphQuery,
                TaskJob::Io(Box::pin(async {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok(serde_json::json!(1))
                })),
                Some(Duration::from_millis(20)),
            )
            .await;
        assert_eq!(result.unwrap_err().kind(), "TIMEOUT");
    }

    #[tokio::test]
    async fn cpu_task_exceeding_its_timeout_fails_with_timeout_kind() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let result = scheduler
            .submit_with_timeout(
                TaskType::PathScoring,
                TaskJob::Cpu(Box::new(|| {
                    std::thread::sleep(Duration::from_millis(200));
                    Ok(serde_json::json!(1))
                })),
                Some(Duration::from_millis(20)),
            )
            .await;
        assert_eq!(result.unwrap_err().kind(), "TIMEOUT");
    }

    #[tokio::test]
    async fn stress_many_concurrent_io_tasks_all_complete() {
        let scheduler = TaskScheduler::new(&test_config(8)).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..200 {
            let counter = counter.clone();
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move {
                scheduler
                    .submit(
                        TaskType::Embedding,
                        TaskJob::Io(Box::pin(async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(serde_json::json!(1))
                        })),
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().success);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 200);
    }

    #[tokio::test]
    async fn stress_many_concurrent_cpu_tasks_all_complete() {
        let scheduler = TaskScheduler::new(&test_config(4)).unwrap();
        let counter = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..150 {
            let counter = counter.clone();
            let scheduler = scheduler.clone();
            handles.push(tokio::spawn(async move {
                scheduler
                    .submit(
                        TaskType::PathScoring,
                        TaskJob::Cpu(Box::new(move || {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Ok(serde_json::json!(1))
                        })),
                    )
                    .await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().success);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 150);
    }

    #[tokio::test]
    async fn submit_dependent_runs_in_dependency_order() {
        let scheduler = TaskScheduler::new(&test_config(4)).unwrap();
        let log: Arc<parking_lot::Mutex<Vec<String>>> = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let log_a = log.clone();
        let log_b = log.clone();
        let tasks = vec![
            DependentTask {
                id: "a".into(),
                task_type: TaskType::PathScoring,
                job: TaskJob::Cpu(Box::new(move || {
                    log_a.lock().push("a".into());
                    Ok(serde_json::json!(1))
                })),
                dependencies: vec![],
                timeout: None,
            },
            DependentTask {
                id: "b".into(),
                task_type: TaskType::PathScoring,
                job: TaskJob::Cpu(Box::new(move || {
                    log_b.lock().push("b".into());
                    Ok(serde_json::json!(2))
                })),
                dependencies: vec!["a".into()],
                timeout: None,
            },
        ];

        let results = scheduler.submit_dependent(tasks).await;
        assert!(results["a"].as_ref().unwrap().success);
        assert!(results["b"].as_ref().unwrap().success);
        assert_eq!(*log.lock(), vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn submit_dependent_reports_unresolved_dependency() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let tasks = vec![DependentTask {
            id: "a".into(),
            task_type: TaskType::PathScoring,
            job: TaskJob::Cpu(Box::new(|| Ok(serde_json::json!(1)))),
            dependencies: vec!["missing".into()],
            timeout: None,
        }];
        let results = scheduler.submit_dependent(tasks).await;
        assert!(results["a"].is_err());
    }

    #[tokio::test]
    async fn submit_dependent_honors_per_task_timeout() {
        let scheduler = TaskScheduler::new(&test_config(2)).unwrap();
        let tasks = vec![DependentTask {
            id: "slow".into(),
            task_type: TaskType::GraphQuery,
            job: TaskJob::Io(Box::pin(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(serde_json::json!(1))
            })),
            dependencies: vec![],
            timeout: Some(Duration::from_millis(20)),
        }];
        let results = scheduler.submit_dependent(tasks).await;
        assert_eq!(results["slow"].as_ref().unwrap_err().kind(), "TIMEOUT");
    }
}
