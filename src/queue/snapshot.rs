//! On-disk queue snapshot format
//!
//! The snapshot is a small self-describing JSON document:
//!
//! ```json
//! {"format":"syncwatch-queue","version":1,"entries":[{"path":"/w/a.txt","attempts":0}]}
//! ```

use crate::error::SnapshotError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

pub const SNAPSHOT_FORMAT: &str = "syncwatch-queue";
pub const SNAPSHOT_VERSION: u32 = 1;

/// Suffix of the temporary file written before the atomic rename
const TMP_SUFFIX: &str = ".SyNcW-TmP";

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
	pub path: PathBuf,
	#[serde(default)]
	pub attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueSnapshot {
	pub format: String,
	pub version: u32,
	pub entries: Vec<SnapshotEntry>,
}

impl QueueSnapshot {
	pub fn new(entries: Vec<SnapshotEntry>) -> Self {
		QueueSnapshot {
			format: SNAPSHOT_FORMAT.to_string(),
			version: SNAPSHOT_VERSION,
			entries,
		}
	}

	/// Serialize to bytes, ready for `write_bytes`
	pub fn to_bytes(&self, target: &Path) -> Result<Vec<u8>, SnapshotError> {
		serde_json::to_vec_pretty(self).map_err(|e| SnapshotError::WriteFailed {
			path: target.to_path_buf(),
			source: Box::new(e),
		})
	}

	/// Write serialized snapshot bytes atomically
	///
	/// The data lands in a sibling temp file first and is renamed over the
	/// target, so a crash never leaves a half-written snapshot behind.
	pub fn write_bytes(target: &Path, bytes: &[u8]) -> Result<(), SnapshotError> {
		let write_failed =
			|e: std::io::Error| SnapshotError::WriteFailed { path: target.to_path_buf(), source: Box::new(e) };

		if let Some(parent) = target.parent() {
			if !parent.as_os_str().is_empty() && !parent.exists() {
				fs::create_dir_all(parent).map_err(write_failed)?;
			}
		}

		// Unique per write, so writers sharing a target never touch each other's file
		let mut tmp_name = target.as_os_str().to_owned();
		tmp_name.push(format!(
			".{}.{}{}",
			std::process::id(),
			TMP_COUNTER.fetch_add(1, Ordering::Relaxed),
			TMP_SUFFIX
		));
		let tmp = PathBuf::from(tmp_name);

		if let Err(e) = fs::write(&tmp, bytes) {
			let _ = fs::remove_file(&tmp);
			return Err(write_failed(e));
		}
		fs::rename(&tmp, target).map_err(|e| {
			let _ = fs::remove_file(&tmp);
			write_failed(e)
		})
	}

	/// Read and validate a snapshot file
	pub fn read(source: &Path) -> Result<Self, SnapshotError> {
		let contents = fs::read(source)
			.map_err(|e| SnapshotError::ReadFailed { path: source.to_path_buf(), source: e })?;

		let snapshot: QueueSnapshot =
			serde_json::from_slice(&contents).map_err(|e| SnapshotError::Corrupted {
				path: source.to_path_buf(),
				message: format!("Failed to parse snapshot JSON: {}", e),
			})?;

		if snapshot.format != SNAPSHOT_FORMAT || snapshot.version != SNAPSHOT_VERSION {
			return Err(SnapshotError::UnsupportedFormat {
				format: snapshot.format,
				version: snapshot.version,
			});
		}

		Ok(snapshot)
	}
}


// vim: ts=4
