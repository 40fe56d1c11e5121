//! Exclusion filter
//!
//! A path is excluded when its own name, or the name of any of its ancestor
//! directories, matches one of the configured wildcard patterns. This lets a
//! single pattern such as `node_modules` drop a whole subtree.

mod patterns;

pub use patterns::PatternMatcher;

use std::fs;
use std::path::Path;

/// Evaluates changed paths against a set of case-insensitive glob patterns
#[derive(Debug, Clone)]
pub struct ExclusionFilter {
	matcher: PatternMatcher,
}

impl ExclusionFilter {
	/// Build a filter from patterns supplied directly
	pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExclusionError> {
		Ok(Self { matcher: PatternMatcher::new(patterns)? })
	}

	/// Filter that excludes nothing
	pub fn empty() -> Self {
		Self { matcher: PatternMatcher::empty() }
	}

	/// Load patterns from a file, one pattern per line
	///
	/// Lines are trimmed and blank lines are ignored.
	pub fn from_file(path: &Path) -> Result<Self, ExclusionError> {
		let contents = fs::read_to_string(path).map_err(|e| {
			ExclusionError::PatternFileError(format!("{}: {}", path.display(), e))
		})?;
		let lines: Vec<&str> = contents.lines().collect();
		Self::new(&lines)
	}

	/// Combine the patterns of a file with extra patterns
	pub fn from_file_and_patterns<S: AsRef<str>>(
		path: &Path,
		extra: &[S],
	) -> Result<Self, ExclusionError> {
		let from_file = Self::from_file(path)?;
		let mut all: Vec<String> = from_file.patterns().to_vec();
		all.extend(extra.iter().map(|p| p.as_ref().to_string()));
		Self::new(&all)
	}

	/// Check whether a path or any of its ancestors is excluded
	pub fn is_excluded(&self, path: &Path) -> bool {
		if self.matcher.is_empty() {
			return false;
		}

		for ancestor in path.ancestors() {
			if let Some(name) = ancestor.file_name() {
				if self.matcher.matches_name(name) {
					return true;
				}
			}
		}

		false
	}

	pub fn patterns(&self) -> &[String] {
		self.matcher.patterns()
	}
}

impl Default for ExclusionFilter {
	fn default() -> Self {
		Self::empty()
	}
}

/// Errors that can occur while building an exclusion filter
#[derive(Debug)]
pub enum ExclusionError {
	/// Failed to parse a glob pattern
	InvalidPattern(String),

	/// Failed to read the pattern file
	PatternFileError(String),
}

impl std::fmt::Display for ExclusionError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ExclusionError::InvalidPattern(msg) => {
				write!(f, "Invalid exclusion pattern: {}", msg)
			}
			ExclusionError::PatternFileError(msg) => {
				write!(f, "Exclusion file error: {}", msg)
			}
		}
	}
}

impl std::error::Error for ExclusionError {}


// vim: ts=4
