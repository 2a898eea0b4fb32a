//! Stage-specific configuration types
//!
//! One struct per pipeline stage, each with its own range validation.

use super::error::{ConfigError, ConfigResult};
use super::validation::Validatable;
use serde::{Deserialize, Serialize};

// ============================================================================
// Ingestion
// ============================================================================

/// History ingestion configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// Versions written per store call (1 = one append per version)
    pub batch_size: usize,

    /// Log a progress line every N versions
    pub progress_interval: u64,

    /// Sequence id given to the first emitted version
    pub first_sequence_id: i64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: 1,
            progress_interval: 1_000_000,
            first_sequence_id: 1,
        }
    }
}

impl IngestConfig {
    pub const MAX_BATCH_SIZE: usize = 100_000;

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    pub fn first_sequence_id(mut self, first: i64) -> Self {
        self.first_sequence_id = first;
        self
    }
}

impl Validatable for IngestConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.batch_size == 0 || self.batch_size > Self::MAX_BATCH_SIZE {
            return Err(ConfigError::range_with_hint(
                "ingest.batch_size",
                self.batch_size,
                1,
                Self::MAX_BATCH_SIZE,
                "Batches are held in memory until written; keep them small.",
            ));
        }
        if self.progress_interval == 0 {
            return Err(ConfigError::range_with_hint(
                "ingest.progress_interval",
                self.progress_interval,
                1,
                u64::MAX,
                "Use a large interval to silence progress logging.",
            ));
        }
        if self.first_sequence_id < 1 {
            return Err(ConfigError::range_with_hint(
                "ingest.first_sequence_id",
                self.first_sequence_id,
                1,
                i64::MAX,
                "Sequence ids start at 1.",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "IngestConfig"
    }
}

// ============================================================================
// Geometry change detection
// ============================================================================

/// What a comparison does when it meets a member pair it is already comparing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// The pair contributes no new information: treat it as unchanged
    #[default]
    AssumeUnchanged,
    /// Classify the whole comparison as a data error
    Flag,
}

/// Geometry change detector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DetectorConfig {
    /// Maximum relation nesting depth explored (1..=4096)
    pub max_depth: usize,

    /// Handling of reference cycles
    pub cycle_policy: CyclePolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            cycle_policy: CyclePolicy::AssumeUnchanged,
        }
    }
}

impl DetectorConfig {
    pub const MAX_DEPTH_LIMIT: usize = 4096;

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn cycle_policy(mut self, policy: CyclePolicy) -> Self {
        self.cycle_policy = policy;
        self
    }
}

impl Validatable for DetectorConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.max_depth == 0 || self.max_depth > Self::MAX_DEPTH_LIMIT {
            return Err(ConfigError::range_with_hint(
                "detector.max_depth",
                self.max_depth,
                1,
                Self::MAX_DEPTH_LIMIT,
                "Depth 1 compares direct members only.",
            ));
        }
        Ok(())
    }

    fn config_name(&self) -> &'static str {
        "DetectorConfig"
    }
}
