//! End-to-end tests driving the public `JobManager` API with in-process backends.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use vidqueue::Result;
use vidqueue::backend::{Backend, BackendCatalog, BackendType, CommandOutput, Invocation};
use vidqueue::pipeline::{
    JobManager, JobManagerConfig, JobQueue, JobStatus, JsonFileStorage, MAX_RETRIES,
    META_BACKEND_USED, MemoryStorage, SubmitRequest, WorkerPoolConfig,
};

/// Backend that succeeds or fails on every run and records the inputs it saw.
struct FakeBackend {
    backend_type: BackendType,
    succeed: bool,
    runs: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn new(backend_type: BackendType, succeed: bool) -> Arc<Self> {
        Arc::new(Self {
            backend_type,
            succeed,
            runs: Mutex::new(Vec::new()),
        })
    }

    fn runs(&self) -> Vec<String> {
        self.runs.lock().clone()
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn backend_type(&self) -> BackendType {
        self.backend_type
    }

    fn probe(&self) -> Option<PathBuf> {
        Some(PathBuf::from(format!("/usr/local/bin/{}", self.backend_type)))
    }

    fn build_args(&self, invocation: &Invocation<'_>) -> Vec<String> {
        vec![invocation.input_file.to_string()]
    }

    async fn invoke(
        &self,
        _program: &Path,
        args: &[String],
        _timeout: Duration,
    ) -> Result<CommandOutput> {
        self.runs.lock().push(args[0].clone());
        if self.succeed {
            Ok(CommandOutput::success())
        } else {
            Ok(CommandOutput {
                exit_code: Some(1),
                stderr_tail: vec!["Conversion failed!".to_string()],
                ..Default::default()
            })
        }
    }
}

fn manager_config() -> JobManagerConfig {
    JobManagerConfig {
        worker_pool: WorkerPoolConfig {
            max_workers: 1,
            poll_interval_ms: 10,
        },
        ..Default::default()
    }
}

fn manager_with(backends: Vec<Arc<dyn Backend>>) -> JobManager {
    JobManager::new(
        manager_config(),
        Arc::new(MemoryStorage::new()),
        Arc::new(BackendCatalog::probe(backends)),
    )
}

async fn wait_for_terminal(manager: &JobManager, ids: &[String]) {
    for _ in 0..500 {
        let done = ids.iter().all(|id| {
            manager
                .get(id)
                .is_some_and(|job| job.status.is_terminal())
        });
        if done {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("jobs did not finish: {:?}", manager.list(None));
}

#[tokio::test]
async fn test_priority_dispatch_order() {
    let ffmpeg = FakeBackend::new(BackendType::Ffmpeg, true);
    let manager = manager_with(vec![ffmpeg.clone() as Arc<dyn Backend>]);

    let a = manager
        .submit(SubmitRequest::new("A.mp4", "A_out.mp4").with_priority("low"))
        .unwrap();
    let b = manager
        .submit(SubmitRequest::new("B.mp4", "B_out.mp4").with_priority("high"))
        .unwrap();
    let c = manager
        .submit(SubmitRequest::new("C.mp4", "C_out.mp4").with_priority("high"))
        .unwrap();

    manager.start(1).unwrap();
    wait_for_terminal(&manager, &[a, b, c]).await;
    manager.stop().await;

    assert_eq!(ffmpeg.runs(), vec!["B.mp4", "C.mp4", "A.mp4"]);
    assert_eq!(manager.stats().completed, 3);
}

#[tokio::test]
async fn test_requested_backend_falls_back() {
    let ffmpeg = FakeBackend::new(BackendType::Ffmpeg, true);
    let manager = manager_with(vec![ffmpeg.clone() as Arc<dyn Backend>]);

    let id = manager
        .submit(
            SubmitRequest::new("clip.mov", "clip_2x.mov")
                .with_preset("upscale_2x")
                .with_backend("topaz"),
        )
        .unwrap();

    manager.start(1).unwrap();
    wait_for_terminal(&manager, std::slice::from_ref(&id)).await;
    manager.stop().await;

    let job = manager.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.metadata[META_BACKEND_USED], "ffmpeg");
    assert_eq!(job.retry_count, 0);
    assert_eq!(ffmpeg.runs(), vec!["clip.mov"]);
}

#[tokio::test]
async fn test_no_backend_available() {
    let manager = manager_with(Vec::new());
    let stats = manager.stats();
    assert!(stats.backends.values().all(|available| !available));

    let id = manager.submit(SubmitRequest::new("in.mp4", "out.mp4")).unwrap();
    manager.start(1).unwrap();
    wait_for_terminal(&manager, std::slice::from_ref(&id)).await;
    manager.stop().await;

    let job = manager.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, 0);
    assert!(job.started_at.is_some());
    assert!(
        job.error_message
            .unwrap()
            .contains("No video processing backend available")
    );
}

#[tokio::test]
async fn test_failing_backend_exhausts_retries() {
    let handbrake = FakeBackend::new(BackendType::Handbrake, false);
    let manager = manager_with(vec![handbrake.clone() as Arc<dyn Backend>]);

    let id = manager
        .submit(SubmitRequest::new("broken.mkv", "out.mp4").with_priority("critical"))
        .unwrap();
    manager.start(1).unwrap();
    wait_for_terminal(&manager, std::slice::from_ref(&id)).await;
    manager.stop().await;

    let job = manager.get(&id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.retry_count, MAX_RETRIES);
    assert!(job.error_message.unwrap().contains("Conversion failed!"));
    assert_eq!(handbrake.runs().len(), MAX_RETRIES as usize);
}

#[tokio::test]
async fn test_cancelled_job_is_never_dispatched() {
    let ffmpeg = FakeBackend::new(BackendType::Ffmpeg, true);
    let manager = manager_with(vec![ffmpeg.clone() as Arc<dyn Backend>]);

    let cancelled = manager.submit(SubmitRequest::new("skip.mp4", "out.mp4")).unwrap();
    let kept = manager.submit(SubmitRequest::new("keep.mp4", "out.mp4")).unwrap();
    assert!(manager.cancel(&cancelled).unwrap());
    assert!(!manager.cancel(&cancelled).unwrap());

    manager.start(1).unwrap();
    wait_for_terminal(&manager, std::slice::from_ref(&kept)).await;
    manager.stop().await;

    assert_eq!(ffmpeg.runs(), vec!["keep.mp4"]);
    assert_eq!(manager.get(&cancelled).unwrap().status, JobStatus::Cancelled);
    assert!(!manager.cancel(&kept).unwrap());
    assert!(manager.cancel("no-such-job").is_err());
}

#[tokio::test]
async fn test_restart_recovers_interrupted_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let state_file = dir.path().join("video_queue.json");

    // First process: one job is claimed by a worker when the process dies.
    let (interrupted, waiting) = {
        let queue = JobQueue::new(Arc::new(JsonFileStorage::new(&state_file)));
        let interrupted = queue
            .submit(SubmitRequest::new("first.mp4", "first_out.mp4").with_priority("high"))
            .unwrap();
        let waiting = queue
            .submit(SubmitRequest::new("second.mp4", "second_out.mp4"))
            .unwrap();
        let claimed = queue.dequeue().unwrap().unwrap();
        assert_eq!(claimed.id, interrupted);
        (interrupted, waiting)
    };

    let raw = std::fs::read_to_string(&state_file).unwrap();
    let persisted: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(persisted["jobs"][&interrupted]["status"], "running");

    // Second process.
    let ffmpeg = FakeBackend::new(BackendType::Ffmpeg, true);
    let manager = JobManager::new(
        manager_config(),
        Arc::new(JsonFileStorage::new(&state_file)),
        Arc::new(BackendCatalog::probe(vec![ffmpeg.clone() as Arc<dyn Backend>])),
    );
    assert_eq!(manager.recover_jobs().unwrap(), 2);

    let job = manager.get(&interrupted).unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.retry_count, 0);

    manager.start(1).unwrap();
    wait_for_terminal(&manager, &[interrupted.clone(), waiting.clone()]).await;
    manager.stop().await;

    assert_eq!(ffmpeg.runs(), vec!["first.mp4", "second.mp4"]);

    // The final state is on disk too.
    let restarted = JobQueue::new(Arc::new(JsonFileStorage::new(&state_file)));
    assert_eq!(restarted.recover_jobs().unwrap(), 0);
    assert_eq!(restarted.stats().completed, 2);
}
