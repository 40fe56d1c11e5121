//! One-shot task that transfers a single entry and applies the retry policy

use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use futures::FutureExt;
use tracing::{error, info, warn};

use crate::queue::ChangeQueue;
use crate::status::SyncStatus;
use crate::transfer::Transfer;
use crate::types::{ChangedEntry, SyncSummary};

/// Failed attempts after which an entry is given up
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// What a worker run ended with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerOutcome {
	/// Transfer succeeded; the entry is done
	Synced,
	/// Attempt failed and the entry went back to the queue
	Retrying { attempts: u32 },
	/// Attempt failed and the retry budget is exhausted
	Failed { attempts: u32 },
}

pub struct SyncWorker {
	entry: ChangedEntry,
	watch_root: PathBuf,
	transfer: Arc<dyn Transfer>,
	queue: Arc<ChangeQueue>,
	status: Arc<SyncStatus>,
	max_retries: u32,
}

impl SyncWorker {
	pub fn new(
		entry: ChangedEntry,
		watch_root: PathBuf,
		transfer: Arc<dyn Transfer>,
		queue: Arc<ChangeQueue>,
		status: Arc<SyncStatus>,
		max_retries: u32,
	) -> Self {
		SyncWorker { entry, watch_root, transfer, queue, status, max_retries }
	}

	/// Transfer the entry; never fails, every problem becomes a retry or a failure record
	pub async fn run(self) -> WorkerOutcome {
		let started = SystemTime::now();
		let path = self.entry.path.clone();

		let attempt = AssertUnwindSafe(self.transfer.sync_file(&path, &self.watch_root))
			.catch_unwind()
			.await;
		let failure = match attempt {
			Ok(Ok(true)) => None,
			Ok(Ok(false)) => Some("transfer reported failure".to_string()),
			Ok(Err(e)) => Some(e.to_string()),
			Err(_) => Some("transfer panicked".to_string()),
		};

		let message = match failure {
			None => {
				info!("Synced {}", path.display());
				self.status.work_completed(SyncSummary::success(path, started));
				self.queue.remove(&self.entry);
				return WorkerOutcome::Synced;
			}
			Some(message) => message,
		};

		let attempts = self.entry.attempts + 1;
		if attempts < self.max_retries {
			warn!(
				"Attempt {}/{} for {} failed: {}",
				attempts,
				self.max_retries,
				path.display(),
				message
			);
			self.queue.requeue(&ChangedEntry::with_attempts(path, attempts));
			self.status.work_stopped();
			WorkerOutcome::Retrying { attempts }
		} else {
			error!("Giving up on {} after {} attempts: {}", path.display(), attempts, message);
			self.status.work_completed(SyncSummary::failure(
				path,
				started,
				format!("gave up after {} attempts: {}", attempts, message),
			));
			self.queue.remove(&self.entry);
			WorkerOutcome::Failed { attempts }
		}
	}
}


// vim: ts=4
