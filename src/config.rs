//! Configuration for syncwatch
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (`Config::default()`)
//! 2. Config file (`.toml`, `.json` or `.json5`)
//! 3. Environment variables (`SYNCWATCH_*` prefix)
//! 4. CLI flags (highest priority, applied by the binary)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::SyncError;
use crate::orchestrator::OrchestratorOptions;
use crate::queue::DEFAULT_NOTIFY_CAPACITY;
use crate::status::DEFAULT_HISTORY_CAPACITY;
use crate::worker::DEFAULT_MAX_RETRIES;

/// Prefix of the environment variables that override file settings
pub const ENV_PREFIX: &str = "SYNCWATCH_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// WATCHED TREES
	// ========================================================================
	/// Absolute directories under which every changed path must fall
	pub watch_roots: Vec<PathBuf>,

	/// Case-insensitive glob patterns matched against path names
	pub exclude_patterns: Vec<String>,

	/// File with one exclusion pattern per line
	pub exclude_file: Option<PathBuf>,

	// ========================================================================
	// WORKERS & RETRIES
	// ========================================================================
	/// Maximum number of concurrent transfers
	pub worker_count: usize,

	/// Idle sleep of the dispatcher when nothing could be dispatched
	pub poll_interval_ms: u64,

	/// Failed attempts before a path is reported as permanently failed
	pub max_retries: u32,

	/// Command run for each changed file (see `CommandTransfer`)
	pub transfer_command: Option<String>,

	// ========================================================================
	// PERSISTENCE
	// ========================================================================
	/// Where the queue snapshot is written and restored from
	pub snapshot_path: Option<PathBuf>,

	/// Periodic snapshot interval in seconds (0 = only at shutdown)
	pub snapshot_interval_secs: u64,

	// ========================================================================
	// STATUS & SHUTDOWN
	// ========================================================================
	/// Completed transfers kept for the status report
	pub history_capacity: usize,

	/// Capacity of the asynchronous queue-notification channel
	pub notify_capacity: usize,

	/// Interval between logged status reports in seconds (0 = never)
	pub status_interval_secs: u64,

	/// How long shutdown waits for running transfers
	pub shutdown_timeout_secs: u64,

	/// Log level used when `RUST_LOG` is unset
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			watch_roots: vec![],
			exclude_patterns: vec![],
			exclude_file: None,

			worker_count: 4,
			poll_interval_ms: 500,
			max_retries: DEFAULT_MAX_RETRIES,
			transfer_command: None,

			snapshot_path: None,
			snapshot_interval_secs: 0,

			history_capacity: DEFAULT_HISTORY_CAPACITY,
			notify_capacity: DEFAULT_NOTIFY_CAPACITY,
			status_interval_secs: 60,
			shutdown_timeout_secs: 30,
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load a config file; the format is picked from the extension
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		let contents = std::fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;
		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();
		Self::parse(&contents, &ext).map_err(|message| SyncError::InvalidConfig {
			message: format!("{}: {}", path.display(), message),
		})
	}

	/// Parse config text in the given format (`toml`, `json` or `json5`)
	pub fn parse(contents: &str, format: &str) -> Result<Self, String> {
		match format {
			"toml" => toml::from_str(contents).map_err(|e| e.to_string()),
			"json" | "json5" => json5::from_str(contents).map_err(|e| e.to_string()),
			other => Err(format!("unsupported config format '{}'", other)),
		}
	}

	/// Apply `SYNCWATCH_*` overrides from the process environment
	pub fn apply_env(&mut self) -> Result<(), SyncError> {
		self.apply_vars(std::env::vars())
	}

	/// Apply overrides from an arbitrary variable list
	pub fn apply_vars<I>(&mut self, vars: I) -> Result<(), SyncError>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		for (key, value) in vars {
			let name = match key.strip_prefix(ENV_PREFIX) {
				Some(name) => name,
				None => continue,
			};
			match name {
				"WATCH_ROOTS" => {
					self.watch_roots = std::env::split_paths(&value).collect();
				}
				"WORKERS" => self.worker_count = parse_var(&key, &value)?,
				"POLL_INTERVAL_MS" => self.poll_interval_ms = parse_var(&key, &value)?,
				"MAX_RETRIES" => self.max_retries = parse_var(&key, &value)?,
				"TRANSFER_COMMAND" => self.transfer_command = Some(value),
				"SNAPSHOT_PATH" => self.snapshot_path = Some(PathBuf::from(value)),
				"SNAPSHOT_INTERVAL_SECS" => {
					self.snapshot_interval_secs = parse_var(&key, &value)?
				}
				"EXCLUDE_FILE" => self.exclude_file = Some(PathBuf::from(value)),
				"STATUS_INTERVAL_SECS" => self.status_interval_secs = parse_var(&key, &value)?,
				"SHUTDOWN_TIMEOUT_SECS" => {
					self.shutdown_timeout_secs = parse_var(&key, &value)?
				}
				"LOG_LEVEL" => self.log_level = value,
				_ => {}
			}
		}
		Ok(())
	}

	/// Check the settings the engine depends on
	pub fn validate(&self) -> Result<(), SyncError> {
		if self.watch_roots.is_empty() {
			return Err(invalid("at least one watch root is required"));
		}
		for root in &self.watch_roots {
			if !root.is_absolute() {
				return Err(invalid(format!("watch root {} must be absolute", root.display())));
			}
		}
		if self.worker_count == 0 {
			return Err(invalid("workerCount must be greater than 0"));
		}
		if self.max_retries == 0 {
			return Err(invalid("maxRetries must be greater than 0"));
		}
		if self.poll_interval_ms == 0 {
			return Err(invalid("pollIntervalMs must be greater than 0"));
		}
		Ok(())
	}

	pub fn poll_interval(&self) -> Duration {
		Duration::from_millis(self.poll_interval_ms)
	}

	pub fn shutdown_timeout(&self) -> Duration {
		Duration::from_secs(self.shutdown_timeout_secs)
	}

	pub fn orchestrator_options(&self) -> OrchestratorOptions {
		OrchestratorOptions {
			workers: self.worker_count,
			poll_interval: self.poll_interval(),
			max_retries: self.max_retries,
		}
	}
}

fn invalid(message: impl Into<String>) -> SyncError {
	SyncError::InvalidConfig { message: message.into() }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SyncError> {
	value.trim().parse().map_err(|_| invalid(format!("{} has an invalid value '{}'", key, value)))
}


// vim: ts=4
