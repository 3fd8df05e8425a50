//! Transformation module.
//!
//! This module turns a raw academic export into platform tables:
//! - Normalize: source-specific filters and derived fields
//! - Roster: distinct class sections
//! - Partition: per-unit split of both tables
//! - Pipeline: one conversion request end to end

pub mod normalize;
pub mod partition;
pub mod pipeline;
pub mod roster;

pub use normalize::{normalize, Normalization, NormalizeParams, NormalizedTables};
pub use partition::{distinct_units, partition_by_unit, unit_column};
pub use pipeline::*;
pub use roster::build_roster;
