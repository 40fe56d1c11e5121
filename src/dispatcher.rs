//! Polling loop that hands reserved entries to a change handler

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::error::SyncError;
use crate::queue::ChangeQueue;
use crate::status::SyncStatus;
use crate::types::{ChangedEntry, Disposition};

/// Receives entries claimed by the dispatcher
///
/// `Rejected` means "no capacity right now" and sends the entry back to the
/// queue without consuming an attempt. An `Err` is fatal and stops the loop.
pub trait ChangeHandler: Send + Sync {
	fn handle(&self, entry: &ChangedEntry) -> Result<Disposition, SyncError>;
}

impl<F> ChangeHandler for F
where
	F: Fn(&ChangedEntry) -> Result<Disposition, SyncError> + Send + Sync,
{
	fn handle(&self, entry: &ChangedEntry) -> Result<Disposition, SyncError> {
		self(entry)
	}
}

pub struct ChangeDispatcher {
	queue: Arc<ChangeQueue>,
	status: Arc<SyncStatus>,
	handler: Arc<dyn ChangeHandler>,
	poll_interval: Duration,
}

impl ChangeDispatcher {
	pub fn new(
		queue: Arc<ChangeQueue>,
		status: Arc<SyncStatus>,
		handler: Arc<dyn ChangeHandler>,
		poll_interval: Duration,
	) -> Self {
		ChangeDispatcher { queue, status, handler, poll_interval }
	}

	/// Run until `token` is cancelled or the handler reports a fatal error
	pub async fn run(self, token: CancellationToken) -> Result<(), SyncError> {
		debug!("Dispatcher started (poll interval {:?})", self.poll_interval);

		while !token.is_cancelled() {
			if !self.dispatch_one()? {
				tokio::select! {
					_ = token.cancelled() => break,
					_ = tokio::time::sleep(self.poll_interval) => {}
				}
			}
		}

		debug!("Dispatcher stopped");
		Ok(())
	}

	/// Offer one entry to the handler; returns `false` when the loop should idle
	fn dispatch_one(&self) -> Result<bool, SyncError> {
		let entry = match self.queue.reserve() {
			Some(entry) => entry,
			None => return Ok(false),
		};

		// Counted before the hand-off so a fast worker cannot finish first
		self.status.work_started();

		match self.handler.handle(&entry) {
			Ok(Disposition::Accepted) => Ok(true),
			Ok(Disposition::Rejected) => {
				trace!("No capacity for {}, returning it to the queue", entry.path.display());
				self.status.work_stopped();
				self.queue.unreserve(&entry);
				Ok(false)
			}
			Err(e) => {
				error!("Dispatcher stopping: {}", e);
				self.status.work_stopped();
				Err(e)
			}
		}
	}
}


// vim: ts=4
