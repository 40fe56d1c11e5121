//! Case-insensitive wildcard matching of single path names

use super::ExclusionError;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::ffi::OsStr;

/// Compiled set of name patterns
#[derive(Debug, Clone)]
pub struct PatternMatcher {
	/// Original pattern strings, in load order
	patterns: Vec<String>,

	/// Compiled patterns
	set: GlobSet,
}

impl PatternMatcher {
	/// Compile a list of patterns; blank entries are skipped, others are trimmed
	pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExclusionError> {
		let mut builder = GlobSetBuilder::new();
		let mut kept = Vec::new();

		for pattern in patterns {
			let pattern = pattern.as_ref().trim();
			if pattern.is_empty() {
				continue;
			}

			let glob = GlobBuilder::new(pattern)
				.case_insensitive(true)
				.literal_separator(true)
				.build()
				.map_err(|e| ExclusionError::InvalidPattern(format!("{}: {}", pattern, e)))?;

			builder.add(glob);
			kept.push(pattern.to_string());
		}

		let set = builder.build().map_err(|e| {
			ExclusionError::InvalidPattern(format!("Failed to build pattern set: {}", e))
		})?;

		Ok(Self { patterns: kept, set })
	}

	pub fn empty() -> Self {
		Self { patterns: Vec::new(), set: GlobSet::empty() }
	}

	/// Check a single file or directory name against the set
	pub fn matches_name(&self, name: &OsStr) -> bool {
		self.set.is_match(name)
	}

	pub fn patterns(&self) -> &[String] {
		&self.patterns
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}
}


// vim: ts=4
