//! Durable, thread-safe queue of changed paths
//!
//! Every path has at most one record, tagged either `Pending` or `Reserved`.
//! Pending records are served in first-in order; anything that comes back
//! from a worker (backpressure or a failed attempt) re-enters at the tail.
//! A change reported while a path is reserved does not create a second
//! record. It marks the reserved one so that it is queued again once the
//! in-flight transfer resolves.

mod snapshot;

pub use snapshot::{QueueSnapshot, SnapshotEntry, SNAPSHOT_FORMAT, SNAPSHOT_VERSION};

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::callbacks::{QueueEvent, QueueEventKind, QueueListener};
use crate::error::SnapshotError;
use crate::types::ChangedEntry;

/// Default capacity of the asynchronous notification channel
pub const DEFAULT_NOTIFY_CAPACITY: usize = 256;

type Listeners = Arc<RwLock<Vec<Arc<dyn QueueListener>>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
	Pending,
	Reserved,
}

#[derive(Debug)]
struct Record {
	state: EntryState,
	attempts: u32,
	seq: u64,
	changed_while_reserved: bool,
}

#[derive(Debug, Default)]
struct QueueInner {
	records: HashMap<PathBuf, Record>,
	/// Pending records by arrival sequence
	pending: BTreeMap<u64, PathBuf>,
	next_seq: u64,
	version: u64,
}

impl QueueInner {
	fn push_pending(&mut self, path: PathBuf, attempts: u32) {
		let seq = self.next_seq;
		self.next_seq += 1;
		self.pending.insert(seq, path.clone());
		self.records.insert(
			path,
			Record { state: EntryState::Pending, attempts, seq, changed_while_reserved: false },
		);
	}

	/// Move a reserved record to the pending tail
	fn reserved_to_pending(&mut self, path: &Path, attempts: u32) -> bool {
		let seq = self.next_seq;
		let record = match self.records.get_mut(path) {
			Some(record) if record.state == EntryState::Reserved => record,
			_ => return false,
		};

		record.attempts = if record.changed_while_reserved { 0 } else { attempts };
		record.changed_while_reserved = false;
		record.state = EntryState::Pending;
		record.seq = seq;
		self.next_seq += 1;
		self.pending.insert(seq, path.to_path_buf());
		true
	}

	fn pending_len(&self) -> usize {
		self.pending.len()
	}

	fn event(&mut self, kind: QueueEventKind) -> QueueEvent {
		self.version += 1;
		QueueEvent {
			kind,
			version: self.version,
			pending: self.pending.len(),
			total: self.records.len(),
		}
	}
}

/// Queue of changed paths shared by the detector, the dispatcher and the workers
pub struct ChangeQueue {
	inner: Mutex<QueueInner>,
	listeners: Listeners,
	notify_tx: mpsc::Sender<QueueEvent>,
	notify_rx: Mutex<Option<mpsc::Receiver<QueueEvent>>>,
}

impl ChangeQueue {
	pub fn new() -> Self {
		Self::with_notify_capacity(DEFAULT_NOTIFY_CAPACITY)
	}

	pub fn with_notify_capacity(capacity: usize) -> Self {
		let (notify_tx, notify_rx) = mpsc::channel(capacity.max(1));
		ChangeQueue {
			inner: Mutex::new(QueueInner::default()),
			listeners: Arc::new(RwLock::new(Vec::new())),
			notify_tx,
			notify_rx: Mutex::new(Some(notify_rx)),
		}
	}

	fn lock(&self) -> MutexGuard<'_, QueueInner> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}

	/// Register a listener for queue changes
	pub fn subscribe(&self, listener: Arc<dyn QueueListener>) {
		self.listeners.write().unwrap_or_else(|e| e.into_inner()).push(listener);
	}

	/// Start the task that delivers asynchronous notifications
	///
	/// Only the first call spawns a task; later calls return `None`. The task
	/// ends when the queue is dropped.
	pub fn spawn_notifier(&self) -> Option<JoinHandle<()>> {
		let mut rx = self.notify_rx.lock().unwrap_or_else(|e| e.into_inner()).take()?;
		let listeners = Arc::clone(&self.listeners);

		Some(tokio::spawn(async move {
			while let Some(event) = rx.recv().await {
				deliver(&listeners, &event);
			}
			trace!("Queue notifier finished");
		}))
	}

	fn notify_now(&self, event: QueueEvent) {
		deliver(&self.listeners, &event);
	}

	fn notify_later(&self, event: QueueEvent) {
		// Events carry the latest version; a full channel drops them
		if let Err(mpsc::error::TrySendError::Full(event)) = self.notify_tx.try_send(event) {
			trace!("Notification channel full, dropping {:?}", event.kind);
		}
	}

	/// Record a change for `path`
	///
	/// A pending path keeps its place and has its attempts reset. A reserved
	/// path is flagged so it gets queued again after the running transfer.
	pub fn add(&self, path: impl Into<PathBuf>) {
		let path = path.into();
		let event = {
			let mut inner = self.lock();
			match inner.records.get_mut(&path) {
				Some(record) if record.state == EntryState::Pending => {
					record.attempts = 0;
				}
				Some(record) => {
					debug!("{} changed while in flight", path.display());
					record.attempts = 0;
					record.changed_while_reserved = true;
				}
				None => inner.push_pending(path, 0),
			}
			inner.event(QueueEventKind::Added)
		};
		self.notify_now(event);
	}

	/// Claim the oldest pending entry
	pub fn reserve(&self) -> Option<ChangedEntry> {
		let (entry, event) = {
			let mut inner = self.lock();
			let (_, path) = inner.pending.pop_first()?;
			let record = match inner.records.get_mut(&path) {
				Some(record) => record,
				None => {
					debug_assert!(false, "pending path without a record");
					warn!("Dropping {}: pending without a record", path.display());
					return None;
				}
			};
			record.state = EntryState::Reserved;
			record.changed_while_reserved = false;
			let entry = ChangedEntry::with_attempts(path, record.attempts);
			(entry, inner.event(QueueEventKind::Reserved))
		};
		self.notify_later(event);
		Some(entry)
	}

	/// Give a declined entry back; it re-enters at the tail
	pub fn unreserve(&self, entry: &ChangedEntry) -> bool {
		self.back_to_pending(entry, QueueEventKind::Unreserved)
	}

	/// Queue a failed entry again, carrying its updated attempt count
	pub fn requeue(&self, entry: &ChangedEntry) -> bool {
		self.back_to_pending(entry, QueueEventKind::Requeued)
	}

	fn back_to_pending(&self, entry: &ChangedEntry, kind: QueueEventKind) -> bool {
		let event = {
			let mut inner = self.lock();
			if !inner.reserved_to_pending(&entry.path, entry.attempts) {
				return false;
			}
			inner.event(kind)
		};
		self.notify_later(event);
		true
	}

	/// Drop a resolved entry
	///
	/// If the path changed again while it was reserved it is queued again
	/// with fresh attempts instead.
	pub fn remove(&self, entry: &ChangedEntry) -> bool {
		let event = {
			let mut inner = self.lock();
			let changed_again = match inner.records.get(&entry.path) {
				Some(record) if record.state == EntryState::Reserved => {
					record.changed_while_reserved
				}
				_ => return false,
			};
			if changed_again {
				inner.reserved_to_pending(&entry.path, 0);
			} else {
				inner.records.remove(&entry.path);
			}
			inner.event(QueueEventKind::Removed)
		};
		self.notify_later(event);
		true
	}

	/// Forget everything
	pub fn clear(&self) {
		let event = {
			let mut inner = self.lock();
			inner.records.clear();
			inner.pending.clear();
			inner.event(QueueEventKind::Cleared)
		};
		self.notify_now(event);
	}

	pub fn pending_size(&self) -> usize {
		self.lock().pending_len()
	}

	pub fn reserved_size(&self) -> usize {
		let inner = self.lock();
		inner.records.len() - inner.pending_len()
	}

	pub fn pending_plus_reserved_size(&self) -> usize {
		self.lock().records.len()
	}

	pub fn version(&self) -> u64 {
		self.lock().version
	}

	/// State of a path, if the queue knows it
	pub fn state_of(&self, path: &Path) -> Option<EntryState> {
		self.lock().records.get(path).map(|r| r.state)
	}

	/// Up to `max_count` pending paths in the order they will be served
	pub fn peek(&self, max_count: usize) -> Vec<PathBuf> {
		self.lock().pending.values().take(max_count).cloned().collect()
	}

	/// Persist pending and reserved entries to `target`
	///
	/// The whole write happens under the queue lock. Returns the queue
	/// version the snapshot corresponds to.
	pub fn snapshot(&self, target: &Path) -> Result<u64, SnapshotError> {
		let (version, count) = {
			let inner = self.lock();
			let mut entries: Vec<SnapshotEntry> = inner
				.pending
				.values()
				.filter_map(|path| {
					inner
						.records
						.get(path)
						.map(|r| SnapshotEntry { path: path.clone(), attempts: r.attempts })
				})
				.collect();

			let mut reserved: Vec<(&PathBuf, &Record)> = inner
				.records
				.iter()
				.filter(|(_, r)| r.state == EntryState::Reserved)
				.collect();
			reserved.sort_by_key(|(_, r)| r.seq);
			entries.extend(
				reserved
					.into_iter()
					.map(|(path, r)| SnapshotEntry { path: path.clone(), attempts: r.attempts }),
			);

			let count = entries.len();
			let bytes = QueueSnapshot::new(entries).to_bytes(target)?;

			// Written under the lock so concurrent snapshots land in version order
			QueueSnapshot::write_bytes(target, &bytes)?;
			(inner.version, count)
		};

		info!("Wrote queue snapshot with {} entries to {}", count, target.display());
		Ok(version)
	}

	/// Load a snapshot into the pending set
	///
	/// When `watch_roots` is non-empty, only entries strictly inside a root
	/// are kept; a root itself is never a syncable path.
	/// Paths the queue already tracks are left alone. Returns the number of
	/// entries added.
	pub fn restore<P: AsRef<Path>>(
		&self,
		source: &Path,
		watch_roots: &[P],
	) -> Result<usize, SnapshotError> {
		let snapshot = QueueSnapshot::read(source)?;
		let total = snapshot.entries.len();

		let (added, event) = {
			let mut inner = self.lock();
			let mut added = 0;
			for entry in snapshot.entries {
				let in_roots = watch_roots.is_empty()
					|| watch_roots.iter().any(|root| is_under_root(&entry.path, root.as_ref()));
				if !in_roots {
					debug!("Dropping {} from snapshot: outside watch roots", entry.path.display());
					continue;
				}
				if inner.records.contains_key(&entry.path) {
					continue;
				}
				inner.push_pending(entry.path, entry.attempts);
				added += 1;
			}
			(added, inner.event(QueueEventKind::Restored))
		};

		info!("Restored {} of {} entries from {}", added, total, source.display());
		self.notify_now(event);
		Ok(added)
	}
}

impl Default for ChangeQueue {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Debug for ChangeQueue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let inner = self.lock();
		f.debug_struct("ChangeQueue")
			.field("pending", &inner.pending_len())
			.field("total", &inner.records.len())
			.field("version", &inner.version)
			.finish()
	}
}

fn deliver(listeners: &Listeners, event: &QueueEvent) {
	let listeners = listeners.read().unwrap_or_else(|e| e.into_inner()).clone();
	for listener in listeners {
		listener.on_queue_changed(event);
	}
}

/// Whether `path` lies strictly below `root`, compared by path component
pub fn is_under_root(path: &Path, root: &Path) -> bool {
	path != root && path.starts_with(root)
}


// vim: ts=4
