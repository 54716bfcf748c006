use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use graphmind_core::{ReasoningConfig, TaskType};
use graphmind_scheduler::{TaskJob, TaskScheduler};

/// 200 I/O-bound tasks, each holding its slot for 50ms, against an I/O pool
/// sized to 8 concurrent slots (`thread_pool_size` 16 halves to an I/O pool
/// of 8). Wall time should land near `200 / 8 * 50ms = 1.25s`, bounded above
/// by slack for the scheduler's 25ms holding-queue drain tick, and observed
/// concurrency should never exceed the pool size.
#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn io_pool_bounds_observed_concurrency_under_load() {
    let config = ReasoningConfig {
        thread_pool_size: 16,
        ..ReasoningConfig::default()
    };
    assert_eq!(config.io_pool_size(), 8);
    let scheduler = TaskScheduler::new(&config).unwrap();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let high_water = Arc::new(AtomicUsize::new(0));

    let start = Instant::now();
    let mut handles = Vec::with_capacity(200);
    for _ in 0..200 {
        let scheduler = scheduler.clone();
        let in_flight = in_flight.clone();
        let high_water = high_water.clone();
        handles.push(tokio::spawn(async move {
            scheduler
                .submit(
                    TaskType::GraphQuery,
                    TaskJob::Io(Box::pin(async move {
                        let current = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        high_water.fetch_max(current, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok(serde_json::json!({"ok": true}))
                    })),
                )
                .await
        }));
    }

    for handle in handles {
        assert!(handle.await.unwrap().unwrap().success);
    }
    let elapsed = start.elapsed();

    assert!(high_water.load(Ordering::SeqCst) <= 8, "observed concurrency exceeded the I/O pool size");
    assert!(elapsed >= Duration::from_millis(1250), "completed suspiciously fast: {elapsed:?}");
    assert!(elapsed <= Duration::from_millis(2000), "exceeded the expected wall-clock budget: {elapsed:?}");
}
