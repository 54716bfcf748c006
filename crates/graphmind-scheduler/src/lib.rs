pub mod metrics;
pub mod scheduler;

pub use metrics::{MovingAverage, TaskMetrics};
pub use scheduler::{CpuJob, DependentTask, IoJob, SchedulerLoad, TaskJob, TaskScheduler};
