//! # syncwatch - Continuous local-to-remote change synchronization
//!
//! syncwatch keeps a durable queue of paths that changed under one or more
//! watched directories and pushes each of them to a remote store through a
//! pluggable [`Transfer`](transfer::Transfer). A single dispatcher feeds a
//! bounded worker pool; failed transfers are retried a limited number of
//! times and permanent failures show up in the status report.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use syncwatch::{Config, SyncSession};
//! use syncwatch::transfer::CommandTransfer;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config { watch_roots: vec!["/srv/data".into()], ..Config::default() };
//!     let session = SyncSession::new(config)?;
//!     session.restore_snapshot()?;
//!
//!     let sync = session.orchestrator(Arc::new(CommandTransfer::parse("upload {path}")?));
//!     sync.start();
//!     session.notify_changed("/srv/data/report.pdf".as_ref())?;
//!
//!     // ...
//!     sync.stop();
//!     sync.await_termination(std::time::Duration::from_secs(30)).await?;
//!     session.save_snapshot()?;
//!     println!("{}", session.report());
//!     Ok(())
//! }
//! ```

pub mod callbacks;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod exclusion;
pub mod logging;
pub mod orchestrator;
pub mod queue;
pub mod session;
pub mod status;
pub mod transfer;
pub mod types;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use config::Config;
pub use error::{SnapshotError, SyncError};
pub use queue::ChangeQueue;
pub use session::SyncSession;
pub use status::SyncStatus;
pub use types::{ChangedEntry, Disposition, SummaryStatus, SyncSummary};

// vim: ts=4
