//! Listener traits for change-queue notifications

/// What happened to the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueEventKind {
	Added,
	Reserved,
	Unreserved,
	Requeued,
	Removed,
	Cleared,
	Restored,
}

/// Notification delivered to queue listeners
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEvent {
	pub kind: QueueEventKind,

	/// Queue version right after the change
	pub version: u64,

	/// Pending entries right after the change
	pub pending: usize,

	/// Pending plus reserved entries right after the change
	pub total: usize,
}

/// Callback for queue changes
///
/// `Added`, `Cleared` and `Restored` are delivered on the mutating caller's
/// thread. The other kinds come from the notifier task, so implementations
/// must not assume they run next to the caller.
pub trait QueueListener: Send + Sync {
	fn on_queue_changed(&self, event: &QueueEvent);
}

/// Adapter turning a closure into a listener
pub struct FnListener<F>(pub F);

impl<F> QueueListener for FnListener<F>
where
	F: Fn(&QueueEvent) + Send + Sync,
{
	fn on_queue_changed(&self, event: &QueueEvent) {
		(self.0)(event)
	}
}

// vim: ts=4
