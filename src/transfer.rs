//! Transfer collaborators that push one changed file to the remote store

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tracing::debug;

use crate::error::SyncError;

/// Pushes a single changed path to the remote side
///
/// `Ok(false)` and `Err(_)` are both treated as a failed attempt.
#[async_trait]
pub trait Transfer: Send + Sync {
	async fn sync_file(&self, path: &Path, watch_root: &Path) -> Result<bool, SyncError>;
}

/// Runs an external command for every changed file
///
/// Arguments may contain `{path}`, `{root}` and `{relative}` placeholders.
/// When none of them appear the absolute path is appended as the last
/// argument. A zero exit status counts as success.
#[derive(Debug, Clone)]
pub struct CommandTransfer {
	program: String,
	args: Vec<String>,
}

impl CommandTransfer {
	pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
		CommandTransfer { program: program.into(), args }
	}

	/// Split a whitespace-separated command line
	pub fn parse(command: &str) -> Result<Self, SyncError> {
		let mut parts = command.split_whitespace().map(String::from);
		let program = parts.next().ok_or_else(|| SyncError::InvalidConfig {
			message: "transfer command is empty".to_string(),
		})?;
		Ok(Self::new(program, parts.collect()))
	}

	fn expand_args(&self, path: &Path, watch_root: &Path) -> Vec<String> {
		let path_str = path.to_string_lossy();
		let root_str = watch_root.to_string_lossy();
		let relative = path.strip_prefix(watch_root).unwrap_or(path);
		let relative_str = relative.to_string_lossy();

		let mut placeholder_seen = false;
		let mut args: Vec<String> = self
			.args
			.iter()
			.map(|arg| {
				if arg.contains("{path}") || arg.contains("{root}") || arg.contains("{relative}") {
					placeholder_seen = true;
				}
				arg.replace("{path}", &path_str)
					.replace("{root}", &root_str)
					.replace("{relative}", &relative_str)
			})
			.collect();

		if !placeholder_seen {
			args.push(path_str.into_owned());
		}
		args
	}
}

#[async_trait]
impl Transfer for CommandTransfer {
	async fn sync_file(&self, path: &Path, watch_root: &Path) -> Result<bool, SyncError> {
		let args = self.expand_args(path, watch_root);
		let output = tokio::process::Command::new(&self.program)
			.args(&args)
			.current_dir(watch_root)
			.stdin(Stdio::null())
			.stdout(Stdio::null())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.output()
			.await
			.map_err(|e| SyncError::Transfer {
				path: path.to_path_buf(),
				message: format!("Failed to spawn '{}': {}", self.program, e),
			})?;

		if !output.status.success() {
			debug!(
				"Transfer command for {} exited with {}: {}",
				path.display(),
				output.status,
				String::from_utf8_lossy(&output.stderr).trim()
			);
		}
		Ok(output.status.success())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_parse_empty_command() {
		assert!(matches!(CommandTransfer::parse("   "), Err(SyncError::InvalidConfig { .. })));
	}

	#[test]
	fn test_expand_placeholders() {
		let transfer = CommandTransfer::parse("rclone copyto {path} remote:bucket/{relative}").unwrap();
		let args = transfer.expand_args(Path::new("/srv/data/a/b.txt"), Path::new("/srv/data"));
		assert_eq!(args, vec!["copyto", "/srv/data/a/b.txt", "remote:bucket/a/b.txt"]);
	}

	#[test]
	fn test_path_appended_without_placeholders() {
		let transfer = CommandTransfer::parse("upload --quiet").unwrap();
		let args = transfer.expand_args(Path::new("/srv/data/x"), Path::new("/srv/data"));
		assert_eq!(args, vec!["--quiet", "/srv/data/x"]);
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_exit_status_maps_to_result() {
		let root = TempDir::new().unwrap();
		let file = root.path().join("a.txt");

		let ok = CommandTransfer::parse("true").unwrap();
		assert!(ok.sync_file(&file, root.path()).await.unwrap());

		let failing = CommandTransfer::parse("false").unwrap();
		assert!(!failing.sync_file(&file, root.path()).await.unwrap());
	}

	#[tokio::test]
	async fn test_missing_program_is_error() {
		let root = TempDir::new().unwrap();
		let transfer = CommandTransfer::parse("syncwatch-no-such-program-4711").unwrap();
		let result = transfer.sync_file(&root.path().join("a"), root.path()).await;
		assert!(matches!(result, Err(SyncError::Transfer { .. })));
	}
}

// vim: ts=4
