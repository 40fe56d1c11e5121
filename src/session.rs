//! A sync session: one queue, one status aggregator, one exclusion filter
//!
//! Nothing here is global. Several sessions can live in the same process,
//! each with its own configuration.

use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::error::SyncError;
use crate::exclusion::ExclusionFilter;
use crate::orchestrator::SyncOrchestrator;
use crate::queue::{is_under_root, ChangeQueue};
use crate::status::SyncStatus;
use crate::transfer::Transfer;

pub struct SyncSession {
	config: Config,
	queue: Arc<ChangeQueue>,
	status: Arc<SyncStatus>,
	exclusion: ExclusionFilter,
}

impl SyncSession {
	/// Validate the configuration and build the session state
	pub fn new(config: Config) -> Result<Self, SyncError> {
		config.validate()?;

		let exclusion = match &config.exclude_file {
			Some(file) => ExclusionFilter::from_file_and_patterns(file, &config.exclude_patterns)?,
			None => ExclusionFilter::new(&config.exclude_patterns)?,
		};
		debug!("Loaded {} exclusion pattern(s)", exclusion.patterns().len());

		Ok(SyncSession {
			queue: Arc::new(ChangeQueue::with_notify_capacity(config.notify_capacity)),
			status: Arc::new(SyncStatus::with_history_capacity(config.history_capacity)),
			exclusion,
			config,
		})
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn queue(&self) -> &Arc<ChangeQueue> {
		&self.queue
	}

	pub fn status(&self) -> &Arc<SyncStatus> {
		&self.status
	}

	pub fn exclusion(&self) -> &ExclusionFilter {
		&self.exclusion
	}

	/// Report a changed path from the detector
	///
	/// Returns `Ok(false)` when the path is excluded, and an error when it is
	/// not strictly inside a watch root.
	pub fn notify_changed(&self, path: &Path) -> Result<bool, SyncError> {
		let inside = self
			.config
			.watch_roots
			.iter()
			.any(|root| is_under_root(path, root));
		if !inside {
			return Err(SyncError::PathOutsideRoots { path: path.to_path_buf() });
		}

		if self.exclusion.is_excluded(path) {
			debug!("Ignoring excluded path {}", path.display());
			return Ok(false);
		}

		self.queue.add(path);
		Ok(true)
	}

	/// Load the configured snapshot, if any; a missing file is not an error
	pub fn restore_snapshot(&self) -> Result<usize, SyncError> {
		let path = match &self.config.snapshot_path {
			Some(path) if path.exists() => path,
			Some(path) => {
				info!("No queue snapshot at {}, starting empty", path.display());
				return Ok(0);
			}
			None => return Ok(0),
		};
		Ok(self.queue.restore(path, &self.config.watch_roots)?)
	}

	/// Write the configured snapshot, if any, returning the queue version saved
	pub fn save_snapshot(&self) -> Result<Option<u64>, SyncError> {
		match &self.config.snapshot_path {
			Some(path) => Ok(Some(self.queue.snapshot(path)?)),
			None => Ok(None),
		}
	}

	/// Build an orchestrator wired to this session's queue and status
	pub fn orchestrator(&self, transfer: Arc<dyn Transfer>) -> Arc<SyncOrchestrator> {
		SyncOrchestrator::new(
			self.config.watch_roots.clone(),
			transfer,
			Arc::clone(&self.queue),
			Arc::clone(&self.status),
			self.config.orchestrator_options(),
		)
	}

	pub fn report(&self) -> String {
		self.status.report(&self.queue)
	}
}


// vim: ts=4
