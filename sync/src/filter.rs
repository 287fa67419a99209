//! Key filtering using globset

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::error::ConfigError;
use crate::item::Listing;

/// Include/exclude filter over item keys
#[derive(Debug, Clone, Default)]
pub struct KeyFilter {
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
}

impl KeyFilter {
    /// Compile include and exclude patterns. An empty include list admits every key.
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self, ConfigError> {
        let include_set = if include.is_empty() {
            None
        } else {
            Some(Self::build_globset(include)?)
        };

        let exclude_set = if exclude.is_empty() {
            None
        } else {
            Some(Self::build_globset(exclude)?)
        };

        Ok(Self {
            include_set,
            exclude_set,
        })
    }

    /// Check if a key passes the filter
    pub fn should_include(&self, key: &str) -> bool {
        if let Some(include_set) = &self.include_set {
            if !include_set.is_match(key) {
                return false;
            }
        }

        if let Some(exclude_set) = &self.exclude_set {
            if exclude_set.is_match(key) {
                return false;
            }
        }

        true
    }

    /// Drop every entry whose key does not pass
    pub fn apply(&self, listing: Listing) -> Listing {
        if self.include_set.is_none() && self.exclude_set.is_none() {
            return listing;
        }
        listing
            .into_iter()
            .filter(|(key, _)| self.should_include(key))
            .collect()
    }

    fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();

        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|e| ConfigError::FilterPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
            builder.add(glob);
        }

        builder.build().map_err(|e| ConfigError::FilterPattern {
            pattern: patterns.join(","),
            message: e.to_string(),
        })
    }
}
