//! Error types for the Rosterload conversion pipeline.
//!
//! One error type per stage, all convertible into [`PipelineError`]:
//!
//! - [`DecodeError`] - Reading the uploaded file
//! - [`SchemaError`] - Required columns missing for the selected system
//! - [`TransformError`] - Internal contract violations between stages
//! - [`ExportError`] - Serializing tables and building the archive
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::models::SourceSystem;

// =============================================================================
// Decode Errors
// =============================================================================

/// Errors while turning uploaded bytes into a raw table.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid CSV content.
    #[error("Invalid CSV at line {line}: {message}")]
    Malformed { line: u64, message: String },

    /// Empty file.
    #[error("File is empty")]
    EmptyFile,

    /// No header row.
    #[error("No headers found in file")]
    NoHeaders,

    /// Spreadsheet could not be opened or read.
    #[error("Invalid spreadsheet: {0}")]
    Workbook(#[from] calamine::Error),

    /// Delimiters must be a single ASCII character.
    #[error("Invalid delimiter '{0}': use a single ASCII character such as ';' or ','")]
    InvalidDelimiter(char),
}

impl From<csv::Error> for DecodeError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        DecodeError::Malformed {
            line,
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The raw table lacks columns the source system requires.
///
/// Always lists every missing column, in the order of the required schema.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("O seu relatório do {system} não possui as seguintes colunas: {}", .missing.join(", "))]
pub struct SchemaError {
    pub system: SourceSystem,
    pub missing: Vec<String>,
}

// =============================================================================
// Transformation Errors
// =============================================================================

/// Errors raised between transformation stages.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A column produced by an earlier stage is absent.
    #[error("A coluna '{0}' não foi encontrada no DataFrame filtrado.")]
    MissingField(String),
}

// =============================================================================
// Export Errors
// =============================================================================

/// Errors while packaging artifacts.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization failed.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// XLSX workbook could not be built.
    #[error("Workbook write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// Row could not be serialized.
    #[error("Row serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// ZIP archive could not be built.
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// IO error.
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl<W> From<csv::IntoInnerError<W>> for ExportError {
    fn from(err: csv::IntoInnerError<W>) -> Self {
        ExportError::Io(err.into_error())
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Why a conversion finished without anything to download.
#[derive(Debug, Clone, PartialEq)]
pub enum EmptyReason {
    /// Filtering removed every row.
    NoRecords,
    /// The selected source system is disabled.
    SystemUnavailable { system: SourceSystem, message: String },
}

impl std::fmt::Display for EmptyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EmptyReason::NoRecords => {
                write!(f, "Nenhum aluno restou após os filtros; nada para exportar")
            }
            EmptyReason::SystemUnavailable { message, .. } => write!(f, "{}", message),
        }
    }
}

/// Top-level pipeline orchestration errors.
///
/// This is the main error type returned by [`crate::transform::pipeline::convert`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input decoding error.
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Required columns missing.
    #[error("{0}")]
    Schema(#[from] SchemaError),

    /// Internal contract violation.
    #[error("Transform error: {0}")]
    Transform(#[from] TransformError),

    /// Packaging error.
    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    /// Nothing to export. Not a crash.
    #[error("{0}")]
    EmptyResult(EmptyReason),
}

impl PipelineError {
    /// True when the conversion simply produced nothing to download.
    pub fn is_empty_result(&self) -> bool {
        matches!(self, PipelineError::EmptyResult(_))
    }

    /// True when the user can fix the problem by correcting the input file.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::Decode(_) | PipelineError::Schema(_))
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Requested artifact does not exist in the conversion output.
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Failed to bind or serve.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let decode_err = DecodeError::EmptyFile;
        let pipeline_err: PipelineError = decode_err.into();
        assert!(pipeline_err.to_string().contains("empty"));
        assert!(pipeline_err.is_input_error());

        let transform_err = TransformError::MissingField("Ano/Série".into());
        let pipeline_err: PipelineError = transform_err.into();
        assert!(pipeline_err.to_string().contains("Ano/Série"));
        assert!(!pipeline_err.is_empty_result());
    }

    #[test]
    fn test_schema_error_lists_every_column() {
        let err = SchemaError {
            system: SourceSystem::Lyceum,
            missing: vec!["ALUNO".into(), "TURMA".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("Lyceum"));
        assert!(msg.contains("ALUNO"));
        assert!(msg.contains("TURMA"));
    }

    #[test]
    fn test_empty_result_is_distinct() {
        let err = PipelineError::EmptyResult(EmptyReason::SystemUnavailable {
            system: SourceSystem::Prime,
            message: "desativada".into(),
        });
        assert!(err.is_empty_result());
        assert!(!err.is_input_error());
        assert_eq!(err.to_string(), "desativada");
    }
}
