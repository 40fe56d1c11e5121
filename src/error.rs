//! Error types for syncwatch operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::exclusion::ExclusionError;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// I/O error
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// A changed path does not fall under any configured watch root
	PathOutsideRoots { path: PathBuf },

	/// The transfer collaborator failed for a path
	Transfer { path: PathBuf, message: String },

	/// Snapshot error (nested)
	Snapshot(SnapshotError),

	/// Exclusion error (nested)
	Exclusion(ExclusionError),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::PathOutsideRoots { path } => {
				write!(f, "Path {} is not under any configured watch root", path.display())
			}
			SyncError::Transfer { path, message } => {
				write!(f, "Transfer of {} failed: {}", path.display(), message)
			}
			SyncError::Snapshot(e) => write!(f, "Snapshot error: {}", e),
			SyncError::Exclusion(e) => write!(f, "Exclusion error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {
	fn source(&self) -> Option<&(dyn Error + 'static)> {
		match self {
			SyncError::Io(e) => Some(e),
			SyncError::Snapshot(e) => Some(e),
			SyncError::Exclusion(e) => Some(e),
			_ => None,
		}
	}
}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<SnapshotError> for SyncError {
	fn from(e: SnapshotError) -> Self {
		SyncError::Snapshot(e)
	}
}

impl From<ExclusionError> for SyncError {
	fn from(e: ExclusionError) -> Self {
		SyncError::Exclusion(e)
	}
}

/// Queue snapshot persistence errors
#[derive(Debug)]
pub enum SnapshotError {
	/// Failed to write the snapshot file
	WriteFailed { path: PathBuf, source: Box<dyn Error + Send + Sync> },

	/// Failed to read the snapshot file
	ReadFailed { path: PathBuf, source: io::Error },

	/// Snapshot contents could not be parsed
	Corrupted { path: PathBuf, message: String },

	/// Snapshot was written by an unknown format or schema version
	UnsupportedFormat { format: String, version: u32 },
}

impl fmt::Display for SnapshotError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SnapshotError::WriteFailed { path, source } => {
				write!(f, "Failed to write snapshot {}: {}", path.display(), source)
			}
			SnapshotError::ReadFailed { path, source } => {
				write!(f, "Failed to read snapshot {}: {}", path.display(), source)
			}
			SnapshotError::Corrupted { path, message } => {
				write!(f, "Snapshot {} corrupted: {}", path.display(), message)
			}
			SnapshotError::UnsupportedFormat { format, version } => {
				write!(f, "Unsupported snapshot format {} version {}", format, version)
			}
		}
	}
}

impl Error for SnapshotError {}


// vim: ts=4
