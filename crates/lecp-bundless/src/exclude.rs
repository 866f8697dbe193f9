//! Glob excludes applied to the entry directory.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};
use lecp_config::defaults::TEST_PATTERNS;

use crate::error::{Error, Result};

/// Built-in test excludelist plus user patterns, matched against paths
/// relative to the entry directory.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
}

impl ExcludeMatcher {
    pub fn new(user: &[String]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in TEST_PATTERNS.iter().copied().chain(user.iter().map(String::as_str)) {
            let glob = Glob::new(pattern).map_err(|e| Error::Pattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|e| Error::Pattern {
            pattern: "<set>".to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { set })
    }

    /// Whether `rel` or any of its parent directories is excluded.
    pub fn is_excluded(&self, rel: &Path) -> bool {
        rel.ancestors()
            .filter(|p| !p.as_os_str().is_empty())
            .any(|p| self.set.is_match(p))
    }
}
