//! Process-wide sync counters and recent history
//!
//! The aggregator has its own lock, independent of the change queue, so
//! workers can report results without contending with the dispatcher.

use std::collections::VecDeque;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::queue::ChangeQueue;
use crate::types::{SummaryStatus, SyncSummary};

/// Default number of completed transfers kept in the history
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

/// How many history lines the text report shows
const REPORT_RECENT_LINES: usize = 10;

#[derive(Debug)]
struct StatusInner {
	in_work: usize,
	succeeded: u64,
	failed: Vec<PathBuf>,
	/// Newest first
	recent: VecDeque<SyncSummary>,
	started: Instant,
}

impl StatusInner {
	fn new() -> Self {
		StatusInner {
			in_work: 0,
			succeeded: 0,
			failed: Vec::new(),
			recent: VecDeque::new(),
			started: Instant::now(),
		}
	}
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
	pub in_work: usize,
	pub succeeded: u64,
	pub failed: Vec<PathBuf>,
	pub recent: Vec<SyncSummary>,
	pub uptime: Duration,
}

/// Counters and bounded history of completed work
#[derive(Debug)]
pub struct SyncStatus {
	inner: Mutex<StatusInner>,
	history_capacity: usize,
}

impl SyncStatus {
	pub fn new() -> Self {
		Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
	}

	pub fn with_history_capacity(history_capacity: usize) -> Self {
		SyncStatus { inner: Mutex::new(StatusInner::new()), history_capacity }
	}

	fn lock(&self) -> MutexGuard<'_, StatusInner> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// An entry was claimed for a worker
	pub fn work_started(&self) {
		self.lock().in_work += 1;
	}

	/// Work ended without a final result (handed back or queued for retry)
	pub fn work_stopped(&self) {
		let mut inner = self.lock();
		inner.in_work = inner.in_work.saturating_sub(1);
	}

	/// Work ended with a final result
	pub fn work_completed(&self, summary: SyncSummary) {
		let mut inner = self.lock();
		inner.in_work = inner.in_work.saturating_sub(1);
		match summary.status {
			SummaryStatus::Success => inner.succeeded += 1,
			SummaryStatus::Failure => inner.failed.push(summary.path.clone()),
		}

		if self.history_capacity > 0 {
			if inner.recent.len() >= self.history_capacity {
				inner.recent.pop_back();
			}
			inner.recent.push_front(summary);
		}
	}

	pub fn in_work(&self) -> usize {
		self.lock().in_work
	}

	pub fn succeeded(&self) -> u64 {
		self.lock().succeeded
	}

	pub fn failed(&self) -> Vec<PathBuf> {
		self.lock().failed.clone()
	}

	/// Completed transfers, newest first
	pub fn recent(&self) -> Vec<SyncSummary> {
		self.lock().recent.iter().cloned().collect()
	}

	pub fn snapshot(&self) -> StatusSnapshot {
		let inner = self.lock();
		StatusSnapshot {
			in_work: inner.in_work,
			succeeded: inner.succeeded,
			failed: inner.failed.clone(),
			recent: inner.recent.iter().cloned().collect(),
			uptime: inner.started.elapsed(),
		}
	}

	/// Zero all counters and restart the uptime clock
	pub fn reset(&self) {
		*self.lock() = StatusInner::new();
	}

	/// Human-readable multi-line status report
	pub fn report(&self, queue: &ChangeQueue) -> String {
		let queued = queue.pending_size();
		let status = self.snapshot();
		let mut out = String::new();

		let _ = writeln!(out, "Sync status (up {})", format_duration(status.uptime));
		let _ = writeln!(out, "  queued:    {}", queued);
		let _ = writeln!(out, "  in flight: {}", status.in_work);
		let _ = writeln!(out, "  succeeded: {}", status.succeeded);
		let _ = writeln!(out, "  failed:    {}", status.failed.len());
		for path in &status.failed {
			let _ = writeln!(out, "    {}", path.display());
		}

		if !status.recent.is_empty() {
			let _ = writeln!(out, "  recent:");
			for summary in status.recent.iter().take(REPORT_RECENT_LINES) {
				let _ = write!(
					out,
					"    [{}] {} ({} ms)",
					summary.status,
					summary.path.display(),
					summary.elapsed().as_millis()
				);
				if !summary.message.is_empty() {
					let _ = write!(out, ": {}", summary.message);
				}
				out.push('\n');
			}
		}

		out
	}
}

impl Default for SyncStatus {
	fn default() -> Self {
		Self::new()
	}
}

fn format_duration(d: Duration) -> String {
	let secs = d.as_secs();
	format!("{}h{:02}m{:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::SystemTime;

	#[test]
	fn test_counters() {
		let status = SyncStatus::new();
		status.work_started();
		status.work_started();
		assert_eq!(status.in_work(), 2);

		status.work_completed(SyncSummary::success(PathBuf::from("/w/a"), SystemTime::now()));
		status.work_stopped();
		assert_eq!(status.in_work(), 0);
		assert_eq!(status.succeeded(), 1);
		assert!(status.failed().is_empty());
	}

	#[test]
	fn test_in_work_never_underflows() {
		let status = SyncStatus::new();
		status.work_stopped();
		assert_eq!(status.in_work(), 0);
	}

	#[test]
	fn test_history_bounded_newest_first() {
		let status = SyncStatus::with_history_capacity(3);
		for i in 0..5 {
			status.work_started();
			status.work_completed(SyncSummary::success(
				PathBuf::from(format!("/w/{}", i)),
				SystemTime::now(),
			));
		}

		let recent: Vec<PathBuf> = status.recent().into_iter().map(|s| s.path).collect();
		assert_eq!(recent, vec![PathBuf::from("/w/4"), "/w/3".into(), "/w/2".into()]);
		assert_eq!(status.succeeded(), 5);
	}

	#[test]
	fn test_report_lists_failures() {
		let status = SyncStatus::new();
		let queue = ChangeQueue::new();
		queue.add("/w/pending");
		status.work_started();
		status.work_completed(SyncSummary::failure(
			PathBuf::from("/w/broken.txt"),
			SystemTime::now(),
			"gave up after 5 attempts",
		));

		let report = status.report(&queue);
		assert!(report.contains("queued:    1"));
		assert!(report.contains("failed:    1"));
		assert!(report.contains("/w/broken.txt"));
		assert!(report.contains("gave up after 5 attempts"));
	}

	#[test]
	fn test_reset() {
		let status = SyncStatus::new();
		status.work_started();
		status.work_completed(SyncSummary::failure(PathBuf::from("/w/x"), SystemTime::now(), ""));
		status.reset();

		let snapshot = status.snapshot();
		assert_eq!(snapshot.in_work, 0);
		assert_eq!(snapshot.succeeded, 0);
		assert!(snapshot.failed.is_empty());
		assert!(snapshot.recent.is_empty());
	}
}

// vim: ts=4
