//! Engine tuning knobs.

use chrono::TimeDelta;
use picstash_core::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};

/// Settings for [`crate::ImageLibrary`].
///
/// # Examples
///
/// ```
/// use picstash_library::LibraryConfig;
///
/// let config = LibraryConfig::builder()
///     .max_update_attempts(5u32)
///     .build()
///     .unwrap();
///
/// assert_eq!(*config.max_update_attempts(), 5);
/// assert_eq!(*config.default_page_size(), 25);
/// assert_eq!(config.orphan_grace_period().num_hours(), 1);
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_builder::Builder,
    derive_getters::Getters,
)]
#[builder(default, setter(into))]
#[serde(default)]
pub struct LibraryConfig {
    /// Read-check-write cycles attempted before a conditional update gives up
    max_update_attempts: u32,
    /// Page size seeded into queries built by the library
    default_page_size: usize,
    /// Largest page size a listing may request
    max_page_size: usize,
    /// Minimum age in seconds before the sweep may delete an unreferenced blob.
    /// Must exceed the longest gap between an upload's blob write and its
    /// record insert.
    orphan_grace_secs: u64,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            max_update_attempts: 3,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: 100,
            orphan_grace_secs: 3600,
        }
    }
}

impl LibraryConfig {
    /// Start building a config from the defaults.
    pub fn builder() -> LibraryConfigBuilder {
        LibraryConfigBuilder::default()
    }

    /// [`Self::orphan_grace_secs`] as a duration, saturating for huge values.
    pub fn orphan_grace_period(&self) -> TimeDelta {
        i64::try_from(self.orphan_grace_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX)
    }
}
