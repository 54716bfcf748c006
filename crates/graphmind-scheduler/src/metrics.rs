use std::collections::VecDeque;

use dashmap::DashMap;
use graphmind_core::TaskType;
use parking_lot::Mutex;

/// Ring buffer over the most recent `window_size` samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window_size: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size: window_size.max(1),
            values: VecDeque::with_capacity(window_size),
            sum: 0.0,
        }
    }

    pub fn add_value(&mut self, value: f64) {
        if self.values.len() >= self.window_size {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
    }

    pub fn average(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum / self.values.len() as f64
        }
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }
}

impl Default for MovingAverage {
    fn default() -> Self {
        Self::new(10)
    }
}

/// Per-task-type rolling latency and outcome counters.
#[derive(Debug, Default)]
pub struct TaskMetrics {
    averages: DashMap<TaskType, Mutex<MovingAverage>>,
    completed: DashMap<TaskType, u64>,
    failed: DashMap<TaskType, u64>,
}

impl TaskMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, task_type: TaskType, elapsed_ms: f64) {
        self.averages
            .entry(task_type)
            .or_insert_with(|| Mutex::new(MovingAverage::new(10)))
            .lock()
            .add_value(elapsed_ms);
        *self.completed.entry(task_type).or_insert(0) += 1;
    }

    pub fn record_failure(&self, task_type: TaskType) {
        *self.failed.entry(task_type).or_insert(0) += 1;
    }

    pub fn average_ms(&self, task_type: TaskType) -> f64 {
        self.averages
            .get(&task_type)
            .map(|entry| entry.lock().average())
            .unwrap_or(0.0)
    }

    pub fn completed(&self, task_type: TaskType) -> u64 {
        self.completed.get(&task_type).map(|v| *v).unwrap_or(0)
    }

    pub fn failed(&self, task_type: TaskType) -> u64 {
        self.failed.get(&task_type).map(|v| *v).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_average_drops_oldest_past_window() {
        let mut avg = MovingAverage::new(3);
        avg.add_value(1.0);
        avg.add_value(2.0);
        avg.add_value(3.0);
        assert!((avg.average() - 2.0).abs() < 1e-9);
        avg.add_value(9.0);
        // window now holds [2, 3, 9]
        assert!((avg.average() - (14.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn task_metrics_tracks_success_and_failure_counts() {
        let metrics = TaskMetrics::new();
        metrics.record_success(TaskType::GraphQuery, 10.0);
        metrics.record_success(TaskType::GraphQuery, 20.0);
        metrics.record_failure(TaskType::GraphQuery);
        assert_eq!(metrics.completed(TaskType::GraphQuery), 2);
        assert_eq!(metrics.failed(TaskType::GraphQuery), 1);
        assert!((metrics.average_ms(TaskType::GraphQuery) - 15.0).abs() < 1e-9);
    }
}
