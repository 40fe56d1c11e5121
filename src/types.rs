//! Core value types shared by the queue, the workers and the status report

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// One pending filesystem path and the number of failed attempts so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedEntry {
	pub path: PathBuf,
	pub attempts: u32,
}

impl ChangedEntry {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		ChangedEntry { path: path.into(), attempts: 0 }
	}

	pub fn with_attempts(path: impl Into<PathBuf>, attempts: u32) -> Self {
		ChangedEntry { path: path.into(), attempts }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

/// Final outcome of one completed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
	Success,
	Failure,
}

impl fmt::Display for SummaryStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SummaryStatus::Success => write!(f, "ok"),
			SummaryStatus::Failure => write!(f, "FAILED"),
		}
	}
}

/// Immutable record of a finished transfer, kept in the status history
#[derive(Debug, Clone)]
pub struct SyncSummary {
	pub path: PathBuf,
	pub started: SystemTime,
	pub stopped: SystemTime,
	pub status: SummaryStatus,
	pub message: String,
}

impl SyncSummary {
	pub fn success(path: PathBuf, started: SystemTime) -> Self {
		SyncSummary {
			path,
			started,
			stopped: SystemTime::now(),
			status: SummaryStatus::Success,
			message: String::new(),
		}
	}

	pub fn failure(path: PathBuf, started: SystemTime, message: impl Into<String>) -> Self {
		SyncSummary {
			path,
			started,
			stopped: SystemTime::now(),
			status: SummaryStatus::Failure,
			message: message.into(),
		}
	}

	/// Wall-clock time the attempt took
	pub fn elapsed(&self) -> Duration {
		self.stopped.duration_since(self.started).unwrap_or_default()
	}
}

/// Answer of a change handler to an offered entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
	/// The entry was handed to a worker
	Accepted,
	/// No capacity right now; the entry goes back to pending
	Rejected,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_new_entry_has_no_attempts() {
		let entry = ChangedEntry::new("/watch/a.txt");
		assert_eq!(entry.attempts, 0);
		assert_eq!(entry.path(), Path::new("/watch/a.txt"));
	}

	#[test]
	fn test_summary_elapsed_never_negative() {
		let later = SystemTime::now() + Duration::from_secs(60);
		let summary = SyncSummary::success(PathBuf::from("/w/a"), later);
		assert_eq!(summary.elapsed(), Duration::ZERO);
	}
}

// vim: ts=4
