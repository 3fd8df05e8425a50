//! # Rosterload - academic export to Evolucional enrollment tables
//!
//! Rosterload converts a school's academic-system export (Lyceum) into the
//! enrollment table and class roster the Evolucional platform imports,
//! split per school unit.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │ XLSX / CSV  │──▶│   Parser    │──▶│  Validator  │──▶│  Transform  │──▶│   Export    │
//! │ (;  ,  ISO) │   │ (auto-enc)  │   │ (columns)   │   │ (filter,    │   │ (XLSX / ZIP │
//! └─────────────┘   └─────────────┘   └─────────────┘   │ roster,unit)│   │  per unit)  │
//!                                                       └─────────────┘   └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rosterload::{convert_bytes, ConversionRequest, DecodeOptions, SourceSystem};
//!
//! let bytes = std::fs::read("relatorio.xlsx").unwrap();
//! let request = ConversionRequest::new(SourceSystem::Lyceum, "senha123");
//! let outcome = convert_bytes(&bytes, &request, &DecodeOptions::default()).unwrap();
//! println!("{} students in {} files", outcome.records.len(), outcome.artifacts.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per stage
//! - [`models`] - Domain models (NormalizedRecord, RosterEntry, ExportArtifact)
//! - [`parser`] - Spreadsheet and CSV decoding with encoding detection
//! - [`validation`] - Required columns and output row schemas
//! - [`transform`] - Filtering, roster, partitioning and pipeline
//! - [`export`] - XLSX / CSV serialization and ZIP packaging
//! - [`api`] - Local HTTP API server

// Core modules
pub mod error;
pub mod models;

// Decoding
pub mod parser;

// Validation
pub mod validation;

// Transformation
pub mod transform;

// Packaging
pub mod export;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DecodeError, EmptyReason, ExportError, PipelineError, SchemaError, ServerError, TransformError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ArtifactRole, CourseType, ExportArtifact, NormalizedRecord, OutputFormat, Partition, RawTable,
    RosterEntry, SourceSystem,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{decode_bytes, decode_file, decode_workbook, detect_encoding, DecodeOptions};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{check_enrollment, check_rosters, validate_schema, CheckReport};

// =============================================================================
// Re-exports - Transform
// =============================================================================

pub use transform::{
    build_roster, normalize, partition_by_unit, Normalization,
    pipeline::{convert, convert_bytes, ConversionOutcome, ConversionRequest, DEFAULT_EMAIL_DOMAIN},
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{package, sanitize_file_token, unique_file_tokens, write_artifacts};

// =============================================================================
// Re-exports - API
// =============================================================================

pub use api::types::{ArtifactInfo, ConvertResponse};

// Server
pub mod server {
    pub use crate::api::server::start_server;
}
