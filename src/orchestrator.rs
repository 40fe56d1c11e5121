//! Owns the dispatcher task and the bounded worker pool
//!
//! The pool has no waiting room: a submission either gets a free worker
//! right away or is rejected, and the dispatcher puts the entry back in the
//! queue. The pool size is therefore the hard limit on concurrent transfers.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::dispatcher::{ChangeDispatcher, ChangeHandler};
use crate::error::SyncError;
use crate::queue::ChangeQueue;
use crate::status::SyncStatus;
use crate::transfer::Transfer;
use crate::types::{ChangedEntry, Disposition};
use crate::worker::SyncWorker;

/// Tuning knobs for an orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
	pub workers: usize,
	pub poll_interval: Duration,
	pub max_retries: u32,
}

pub struct SyncOrchestrator {
	watch_roots: Vec<PathBuf>,
	transfer: Arc<dyn Transfer>,
	queue: Arc<ChangeQueue>,
	status: Arc<SyncStatus>,
	options: OrchestratorOptions,
	permits: Arc<Semaphore>,
	workers: TaskTracker,
	token: CancellationToken,
	dispatcher: Mutex<Option<JoinHandle<Result<(), SyncError>>>>,
}

impl SyncOrchestrator {
	pub fn new(
		watch_roots: Vec<PathBuf>,
		transfer: Arc<dyn Transfer>,
		queue: Arc<ChangeQueue>,
		status: Arc<SyncStatus>,
		options: OrchestratorOptions,
	) -> Arc<Self> {
		Arc::new(SyncOrchestrator {
			watch_roots,
			transfer,
			queue,
			status,
			permits: Arc::new(Semaphore::new(options.workers)),
			options,
			workers: TaskTracker::new(),
			token: CancellationToken::new(),
			dispatcher: Mutex::new(None),
		})
	}

	/// Launch the dispatcher task
	///
	/// Must be called from within a tokio runtime. Calling it again while a
	/// dispatcher is running has no effect.
	pub fn start(self: &Arc<Self>) {
		let mut slot = self.dispatcher.lock().unwrap_or_else(|e| e.into_inner());
		if slot.is_some() || self.token.is_cancelled() {
			return;
		}

		let handler: Arc<dyn ChangeHandler> = Arc::clone(self) as Arc<dyn ChangeHandler>;
		let dispatcher = ChangeDispatcher::new(
			Arc::clone(&self.queue),
			Arc::clone(&self.status),
			handler,
			self.options.poll_interval,
		);
		*slot = Some(tokio::spawn(dispatcher.run(self.token.clone())));
		info!(
			"Sync started: {} worker(s), {} watch root(s)",
			self.options.workers,
			self.watch_roots.len()
		);
	}

	/// Stop the dispatcher and close the pool to new work
	///
	/// Does not wait for running workers; see [`await_termination`](Self::await_termination).
	pub fn stop(&self) {
		if self.token.is_cancelled() {
			return;
		}
		debug!("Stopping sync orchestrator");
		self.token.cancel();
		self.permits.close();
		self.workers.close();
	}

	/// Wait until the dispatcher and all running workers have finished
	///
	/// Returns `Ok(false)` when `timeout` elapses first. A fatal dispatcher
	/// error is returned even when workers are still running at the deadline.
	pub async fn await_termination(&self, timeout: Duration) -> Result<bool, SyncError> {
		let deadline = Instant::now() + timeout;
		let dispatcher = self.dispatcher.lock().unwrap_or_else(|e| e.into_inner()).take();

		let result = match dispatcher {
			Some(mut handle) => match tokio::time::timeout_at(deadline, &mut handle).await {
				Ok(Ok(result)) => result,
				Ok(Err(e)) => Err(SyncError::Other {
					message: format!("Dispatcher task failed: {}", e),
				}),
				Err(_) => {
					warn!("Dispatcher still running after {:?}", timeout);
					*self.dispatcher.lock().unwrap_or_else(|e| e.into_inner()) = Some(handle);
					return Ok(false);
				}
			},
			None => Ok(()),
		};

		let drained = tokio::time::timeout_at(deadline, self.workers.wait()).await.is_ok();
		result?;
		if !drained {
			warn!("Workers still running after {:?}", timeout);
		}
		Ok(drained)
	}

	/// Whether the dispatcher is still polling the queue
	pub fn is_running(&self) -> bool {
		let slot = self.dispatcher.lock().unwrap_or_else(|e| e.into_inner());
		matches!(slot.as_ref(), Some(handle) if !handle.is_finished())
	}

	/// Number of workers currently free
	pub fn idle_workers(&self) -> usize {
		self.permits.available_permits()
	}

	/// Find the configured root that owns `path`
	pub fn watch_root_for(&self, path: &Path) -> Result<&Path, SyncError> {
		path.ancestors()
			.skip(1)
			.find_map(|dir| self.watch_roots.iter().find(|root| root.as_path() == dir))
			.map(|root| root.as_path())
			.ok_or_else(|| SyncError::PathOutsideRoots { path: path.to_path_buf() })
	}
}

impl ChangeHandler for SyncOrchestrator {
	fn handle(&self, entry: &ChangedEntry) -> Result<Disposition, SyncError> {
		let watch_root = self.watch_root_for(&entry.path)?.to_path_buf();

		let permit = match Arc::clone(&self.permits).try_acquire_owned() {
			Ok(permit) => permit,
			Err(_) => return Ok(Disposition::Rejected),
		};

		let worker = SyncWorker::new(
			entry.clone(),
			watch_root,
			Arc::clone(&self.transfer),
			Arc::clone(&self.queue),
			Arc::clone(&self.status),
			self.options.max_retries,
		);
		self.workers.spawn(async move {
			worker.run().await;
			drop(permit);
		});

		Ok(Disposition::Accepted)
	}
}

impl std::fmt::Debug for SyncOrchestrator {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SyncOrchestrator")
			.field("watch_roots", &self.watch_roots)
			.field("options", &self.options)
			.field("idle_workers", &self.idle_workers())
			.field("stopped", &self.token.is_cancelled())
			.finish()
	}
}


// vim: ts=4
