//! REST API types for the upload page.
//!
//! The conversion response carries previews and the artifact list; the
//! files themselves are fetched from the download endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::{ArtifactRole, ExportArtifact, NormalizedRecord, RosterEntry};
use crate::transform::pipeline::{ConversionOutcome, PartitionSummary};
use crate::validation::CheckReport;

/// Rows shown in each preview table.
pub const PREVIEW_ROWS: usize = 5;

/// Response sent after a conversion.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertResponse {
    /// Unique job identifier
    pub job_id: String,

    /// Status: "ready" or "warning"
    pub status: String,

    pub generated_at: DateTime<Utc>,

    /// First enrollment rows
    pub students_preview: Vec<NormalizedRecord>,

    /// First roster rows
    pub classes_preview: Vec<RosterEntry>,

    /// Files available from `/api/download`
    pub artifacts: Vec<ArtifactInfo>,

    pub metadata: ResponseMetadata,
}

/// Description of one downloadable file
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub name: String,
    pub role: ArtifactRole,
    pub partition: Option<String>,
    pub mime_type: String,
    pub size: usize,
}

impl From<&ExportArtifact> for ArtifactInfo {
    fn from(artifact: &ExportArtifact) -> Self {
        Self {
            name: artifact.name().to_string(),
            role: artifact.role(),
            partition: artifact.partition().map(String::from),
            mime_type: artifact.mime_type().to_string(),
            size: artifact.bytes().len(),
        }
    }
}

/// Metadata about the conversion
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_students: usize,
    pub total_classes: usize,
    pub dropped_rows: usize,
    pub partitions: Vec<PartitionSummary>,
    pub source: SourceMetadata,
    pub validation: ValidationStats,
}

/// Source file metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub encoding: String,
    pub delimiter: String,
    pub row_count: usize,
    pub columns: Vec<String>,
}

/// Validation statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStats {
    pub valid: usize,
    pub invalid: usize,
    pub errors: Vec<ValidationIssue>,
}

/// A row that failed validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub table: String,
    pub record_index: usize,
    pub errors: Vec<String>,
}

fn issues<'a>(table: &str, report: &'a CheckReport) -> impl Iterator<Item = ValidationIssue> + 'a {
    let table = table.to_string();
    report.errors.iter().map(move |(idx, errs)| ValidationIssue {
        table: table.clone(),
        record_index: *idx,
        errors: errs.clone(),
    })
}

impl From<&ConversionOutcome> for ConvertResponse {
    fn from(outcome: &ConversionOutcome) -> Self {
        let clean = outcome.enrollment_check.is_clean() && outcome.roster_check.is_clean();
        let validation = ValidationStats {
            valid: outcome.enrollment_check.valid + outcome.roster_check.valid,
            invalid: outcome.enrollment_check.invalid + outcome.roster_check.invalid,
            errors: issues("enrollment", &outcome.enrollment_check)
                .chain(issues("roster", &outcome.roster_check))
                .collect(),
        };

        ConvertResponse {
            job_id: Uuid::new_v4().to_string(),
            status: if clean { "ready" } else { "warning" }.to_string(),
            generated_at: Utc::now(),
            students_preview: outcome.records.iter().take(PREVIEW_ROWS).cloned().collect(),
            classes_preview: outcome.rosters.iter().take(PREVIEW_ROWS).cloned().collect(),
            artifacts: outcome.artifacts.iter().map(ArtifactInfo::from).collect(),
            metadata: ResponseMetadata {
                total_students: outcome.records.len(),
                total_classes: outcome.rosters.len(),
                dropped_rows: outcome.dropped,
                partitions: outcome.partitions.clone(),
                source: SourceMetadata {
                    encoding: outcome.source_info.encoding.clone(),
                    delimiter: outcome.source_info.delimiter.to_string(),
                    row_count: outcome.source_info.row_count,
                    columns: outcome.source_info.headers.clone(),
                },
                validation,
            },
        }
    }
}

/// Response for a conversion that produced nothing to download.
pub fn empty_response(message: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "empty",
        "message": message,
        "artifacts": [],
    })
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "artifacts": [],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_info() {
        let artifact = ExportArtifact::new(
            "Turmas_Centro.csv",
            ArtifactRole::Roster,
            Some("Centro".into()),
            b"UNIDADE;Ano/S\xC3\xA9rie;TURMA\n".to_vec(),
        );
        let info = ArtifactInfo::from(&artifact);
        assert_eq!(info.name, "Turmas_Centro.csv");
        assert_eq!(info.partition.as_deref(), Some("Centro"));
        assert_eq!(info.size, artifact.bytes().len());

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["role"], "roster");
        assert_eq!(json["mimeType"], "text/csv; charset=utf-8");
    }

    #[test]
    fn test_error_and_empty_shapes() {
        let err = error_response("boom");
        assert_eq!(err["status"], "error");
        assert_eq!(err["error"], "boom");

        let empty = empty_response("desativada");
        assert_eq!(empty["status"], "empty");
        assert!(empty["artifacts"].as_array().unwrap().is_empty());
    }
}
