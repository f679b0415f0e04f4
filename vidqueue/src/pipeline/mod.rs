//! Job pipeline: records, the durable priority queue, workers and the manager.

mod dispatch;
mod job;
mod job_queue;
mod manager;
mod storage;
mod worker_pool;

pub use dispatch::{DispatchEntry, DispatchQueue};
pub use job::{
    Job, JobStatus, META_BACKEND_USED, META_FAILURE_KIND, META_LAST_BACKEND, META_OUTPUT_PATH,
    META_PROCESSING_TIME, Priority,
};
pub use job_queue::{
    JobQueue, JobQueueConfig, JobStats, MAX_RETRIES, QueueDepthStatus, SubmitRequest,
};
pub use manager::{JobManager, JobManagerConfig, QueueStats};
pub use storage::{JobSnapshot, JobStorage, JsonFileStorage, MemoryStorage};
pub use worker_pool::{WorkerPool, WorkerPoolConfig};
