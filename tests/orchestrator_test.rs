//! End-to-end tests for the dispatcher, worker pool and retry policy
//!
//! Transfers are in-memory fakes; every wait is bounded by a timeout so a
//! stuck pool shows up as a failure instead of a hang.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use syncwatch::dispatcher::ChangeHandler;
use syncwatch::orchestrator::{OrchestratorOptions, SyncOrchestrator};
use syncwatch::transfer::Transfer;
use syncwatch::worker::{SyncWorker, WorkerOutcome, DEFAULT_MAX_RETRIES};
use syncwatch::{ChangeQueue, Config, Disposition, SyncError, SyncSession, SyncStatus};

// ============================================================================
// Fake transfers
// ============================================================================

/// Records every call and succeeds
#[derive(Default)]
struct Recording {
	calls: Mutex<Vec<(PathBuf, PathBuf)>>,
}

#[async_trait]
impl Transfer for Recording {
	async fn sync_file(&self, path: &Path, watch_root: &Path) -> Result<bool, SyncError> {
		self.calls.lock().unwrap().push((path.to_path_buf(), watch_root.to_path_buf()));
		Ok(true)
	}
}

/// Fails every call, alternating between `false` and an error
#[derive(Default)]
struct AlwaysFails {
	calls: AtomicUsize,
}

#[async_trait]
impl Transfer for AlwaysFails {
	async fn sync_file(&self, path: &Path, _watch_root: &Path) -> Result<bool, SyncError> {
		let n = self.calls.fetch_add(1, Ordering::SeqCst);
		if n % 2 == 0 {
			Ok(false)
		} else {
			Err(SyncError::Transfer { path: path.to_path_buf(), message: "connection reset".into() })
		}
	}
}

/// Blocks each call until the test releases it
struct Gated {
	gate: Arc<Semaphore>,
	started: AtomicUsize,
}

#[async_trait]
impl Transfer for Gated {
	async fn sync_file(&self, _path: &Path, _watch_root: &Path) -> Result<bool, SyncError> {
		self.started.fetch_add(1, Ordering::SeqCst);
		let permit = self.gate.acquire().await.map_err(|e| SyncError::Other {
			message: e.to_string(),
		})?;
		permit.forget();
		Ok(true)
	}
}

// ============================================================================
// Helper Functions
// ============================================================================

fn options(workers: usize) -> OrchestratorOptions {
	OrchestratorOptions {
		workers,
		poll_interval: Duration::from_millis(5),
		max_retries: DEFAULT_MAX_RETRIES,
	}
}

async fn wait_until<F: Fn() -> bool>(what: &str, condition: F) {
	let waited = timeout(Duration::from_secs(10), async {
		while !condition() {
			sleep(Duration::from_millis(5)).await;
		}
	})
	.await;
	assert!(waited.is_ok(), "timed out waiting for {}", what);
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_changes_are_synced_end_to_end() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let transfer = Arc::new(Recording::default());
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch"), PathBuf::from("/other")],
		transfer.clone(),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(3),
	);
	sync.start();

	for i in 0..20 {
		queue.add(format!("/watch/dir/{}.txt", i));
	}
	queue.add("/other/x.bin");

	wait_until("all transfers", || status.succeeded() == 21).await;
	wait_until("empty queue", || queue.pending_plus_reserved_size() == 0).await;
	assert_eq!(status.in_work(), 0);
	assert!(status.failed().is_empty());

	let calls = transfer.calls.lock().unwrap().clone();
	assert_eq!(calls.len(), 21);
	assert!(calls.contains(&(PathBuf::from("/other/x.bin"), PathBuf::from("/other"))));
	assert!(calls.contains(&(PathBuf::from("/watch/dir/7.txt"), PathBuf::from("/watch"))));

	sync.stop();
	assert!(sync.await_termination(Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn test_worker_retry_policy_until_permanent_failure() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let transfer: Arc<dyn Transfer> = Arc::new(AlwaysFails::default());
	queue.add("/watch/broken.txt");
	let in_work_before = status.in_work();

	let mut outcomes = Vec::new();
	while let Some(entry) = queue.reserve() {
		status.work_started();
		let worker = SyncWorker::new(
			entry,
			PathBuf::from("/watch"),
			Arc::clone(&transfer),
			Arc::clone(&queue),
			Arc::clone(&status),
			DEFAULT_MAX_RETRIES,
		);
		outcomes.push(worker.run().await);
	}

	assert_eq!(
		outcomes,
		vec![
			WorkerOutcome::Retrying { attempts: 1 },
			WorkerOutcome::Retrying { attempts: 2 },
			WorkerOutcome::Retrying { attempts: 3 },
			WorkerOutcome::Retrying { attempts: 4 },
			WorkerOutcome::Failed { attempts: 5 },
		]
	);
	assert_eq!(status.failed(), vec![PathBuf::from("/watch/broken.txt")]);
	assert_eq!(status.in_work(), in_work_before);
	assert_eq!(queue.pending_plus_reserved_size(), 0);
}

#[tokio::test]
async fn test_retry_bound_through_dispatcher() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let transfer = Arc::new(AlwaysFails::default());
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch")],
		transfer.clone(),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(2),
	);
	sync.start();
	queue.add("/watch/broken.txt");

	wait_until("permanent failure", || status.failed().len() == 1).await;
	wait_until("queue drained", || queue.pending_plus_reserved_size() == 0).await;
	wait_until("workers idle", || status.in_work() == 0).await;

	assert_eq!(transfer.calls.load(Ordering::SeqCst), 5);
	assert_eq!(status.failed(), vec![PathBuf::from("/watch/broken.txt")]);
	assert_eq!(status.succeeded(), 0);

	sync.stop();
	assert!(sync.await_termination(Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn test_saturated_pool_rejects_until_worker_frees() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let gate = Arc::new(Semaphore::new(0));
	let transfer = Arc::new(Gated { gate: Arc::clone(&gate), started: AtomicUsize::new(0) });
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch")],
		transfer.clone(),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(1),
	);

	queue.add("/watch/first.txt");
	queue.add("/watch/second.txt");
	let first = queue.reserve().unwrap();
	let second = queue.reserve().unwrap();

	assert_eq!(sync.handle(&first).unwrap(), Disposition::Accepted);
	wait_until("first transfer running", || transfer.started.load(Ordering::SeqCst) == 1).await;

	assert_eq!(sync.handle(&second).unwrap(), Disposition::Rejected);
	assert_eq!(sync.handle(&second).unwrap(), Disposition::Rejected);

	gate.add_permits(1);
	wait_until("worker freed", || sync.idle_workers() == 1).await;
	assert_eq!(sync.handle(&second).unwrap(), Disposition::Accepted);

	gate.add_permits(1);
	wait_until("both synced", || queue.pending_plus_reserved_size() == 0).await;
	assert_eq!(transfer.started.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_backpressure_never_exceeds_pool_size() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let gate = Arc::new(Semaphore::new(0));
	let transfer = Arc::new(Gated { gate: Arc::clone(&gate), started: AtomicUsize::new(0) });
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch")],
		transfer.clone(),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(2),
	);
	sync.start();

	for i in 0..6 {
		queue.add(format!("/watch/{}.txt", i));
	}

	wait_until("pool saturated", || transfer.started.load(Ordering::SeqCst) == 2).await;
	sleep(Duration::from_millis(50)).await;
	assert_eq!(transfer.started.load(Ordering::SeqCst), 2);
	assert_eq!(queue.pending_plus_reserved_size(), 6);
	assert_eq!(sync.idle_workers(), 0);

	gate.add_permits(6);
	wait_until("all synced", || status.succeeded() == 6).await;
	assert_eq!(status.in_work(), 0);

	sync.stop();
	assert!(sync.await_termination(Duration::from_secs(5)).await.unwrap());
}

#[tokio::test]
async fn test_stop_leaves_inflight_work_for_the_snapshot() {
	let temp_dir = tempfile::TempDir::new().unwrap();
	let config = Config {
		watch_roots: vec![PathBuf::from("/watch")],
		snapshot_path: Some(temp_dir.path().join("queue.json")),
		worker_count: 1,
		poll_interval_ms: 5,
		..Config::default()
	};
	let session = SyncSession::new(config.clone()).unwrap();
	let gate = Arc::new(Semaphore::new(0));
	let transfer = Arc::new(Gated { gate: Arc::clone(&gate), started: AtomicUsize::new(0) });
	let sync = session.orchestrator(transfer.clone());
	sync.start();

	session.notify_changed(Path::new("/watch/a.txt")).unwrap();
	session.notify_changed(Path::new("/watch/b.txt")).unwrap();
	wait_until("first transfer running", || transfer.started.load(Ordering::SeqCst) == 1).await;

	sync.stop();
	assert!(!sync.await_termination(Duration::from_millis(50)).await.unwrap());
	session.save_snapshot().unwrap();

	let restarted = SyncSession::new(config).unwrap();
	assert_eq!(restarted.restore_snapshot().unwrap(), 2);
	gate.close();
}

#[tokio::test]
async fn test_path_outside_roots_stops_dispatcher() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch")],
		Arc::new(Recording::default()),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(1),
	);
	sync.start();
	queue.add("/not-watched/x.txt");

	wait_until("dispatcher exit", || !sync.is_running()).await;
	let result = sync.await_termination(Duration::from_secs(5)).await;
	assert!(matches!(result, Err(SyncError::PathOutsideRoots { .. })));
}

#[tokio::test]
async fn test_fatal_error_survives_termination_timeout() {
	let queue = Arc::new(ChangeQueue::new());
	let status = Arc::new(SyncStatus::new());
	let gate = Arc::new(Semaphore::new(0));
	let transfer = Arc::new(Gated { gate: Arc::clone(&gate), started: AtomicUsize::new(0) });
	let sync = SyncOrchestrator::new(
		vec![PathBuf::from("/watch")],
		transfer.clone(),
		Arc::clone(&queue),
		Arc::clone(&status),
		options(2),
	);
	sync.start();

	queue.add("/watch/slow.txt");
	wait_until("slow transfer running", || transfer.started.load(Ordering::SeqCst) == 1).await;
	queue.add("/not-watched/x.txt");
	wait_until("dispatcher exit", || !sync.is_running()).await;

	// The slow worker outlives the deadline; the fatal error still comes back
	sync.stop();
	let result = sync.await_termination(Duration::from_millis(50)).await;
	assert!(matches!(result, Err(SyncError::PathOutsideRoots { .. })));
	gate.close();
}

#[tokio::test]
async fn test_restart_with_root_in_snapshot() {
	let temp_dir = tempfile::TempDir::new().unwrap();
	let snapshot = temp_dir.path().join("queue.json");
	let previous = ChangeQueue::new();
	previous.add("/srv/data");
	previous.add("/srv/data/a.txt");
	previous.add("/srv/data/b.txt");
	previous.snapshot(&snapshot).unwrap();

	let config = Config {
		watch_roots: vec![PathBuf::from("/srv/data")],
		snapshot_path: Some(snapshot),
		poll_interval_ms: 5,
		..Config::default()
	};
	let session = SyncSession::new(config).unwrap();
	assert_eq!(session.restore_snapshot().unwrap(), 2);

	let sync = session.orchestrator(Arc::new(Recording::default()));
	sync.start();
	wait_until("restored entries synced", || session.status().succeeded() == 2).await;
	assert!(sync.is_running());
	assert_eq!(session.queue().pending_plus_reserved_size(), 0);

	sync.stop();
	assert!(sync.await_termination(Duration::from_secs(5)).await.unwrap());
}

// vim: ts=4
