//! Domain models for the Rosterload conversion pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`RawTable`] - Decoded source rows, one JSON object per row
//! - [`SourceSystem`] - Academic system that produced the export
//! - [`CourseType`] - Education track, drives the grade label template
//! - [`NormalizedRecord`] - One enrollment row for the platform
//! - [`RosterEntry`] - One class section (unit, grade label, class)
//! - [`Partition`] - Per-unit slice of both output tables
//! - [`ExportArtifact`] - A named, immutable file produced for download

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// Column names
// =============================================================================

/// Organizational unit column in Lyceum exports.
pub const COL_UNIT: &str = "UNIDADE";
/// Alternative spelling of the unit column seen in other exports.
pub const COL_UNIT_ALT: &str = "Unidade";
/// Student identifier (RA).
pub const COL_STUDENT: &str = "ALUNO";
/// Full student name.
pub const COL_FULL_NAME: &str = "NOME_COMPL";
/// Class name.
pub const COL_CLASS: &str = "TURMA";
/// Course type (education track).
pub const COL_COURSE: &str = "CURSO";
/// Grade / series code.
pub const COL_GRADE_CODE: &str = "CODSERIE";
/// Optional enrollment status.
pub const COL_STATUS: &str = "Status";
/// Derived grade label, appended to the filtered source table.
pub const COL_GRADE_LABEL: &str = "Ano/Série";

/// Sentinel partition name when the export has no unit column.
pub const ALL_UNITS: &str = "Todas";

// =============================================================================
// Raw table
// =============================================================================

/// A decoded source table.
///
/// Rows are JSON objects keyed by header; values are `String`, `Number` or `Null`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawTable {
    /// Column headers, in file order
    pub headers: Vec<String>,
    /// One JSON object per data row
    pub records: Vec<Value>,
    /// Detected text encoding, or the spreadsheet format (`xlsx`, `xls`)
    pub encoding: String,
    /// Field delimiter used to split rows
    pub delimiter: char,
}

impl RawTable {
    /// Build a table from already-decoded rows.
    pub fn new(headers: Vec<String>, records: Vec<Value>) -> Self {
        Self {
            headers,
            records,
            encoding: "utf-8".to_string(),
            delimiter: ';',
        }
    }

    /// Whether a column is part of the header.
    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Render a cell as text.
///
/// Integral numbers drop their fractional part (`5.0` → `5`), empty cells
/// render as an empty string.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
                    Some(f) => f.to_string(),
                    None => n.to_string(),
                }
            }
        }
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Text of a named field in a row, empty when absent.
pub fn field_text(row: &Value, column: &str) -> String {
    row.get(column).map(cell_text).unwrap_or_default()
}

// =============================================================================
// Source System
// =============================================================================

/// Academic system that produced the export.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SourceSystem {
    /// Lyceum - fully supported.
    Lyceum,
    /// Prime - disabled.
    Prime,
    /// GVDasa - disabled.
    #[serde(rename = "gvdasa")]
    GvDasa,
}

impl SourceSystem {
    /// All systems, in the order they are offered to the user.
    pub const ALL: [SourceSystem; 3] = [SourceSystem::Lyceum, SourceSystem::Prime, SourceSystem::GvDasa];

    /// Display name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            SourceSystem::Lyceum => "Lyceum",
            SourceSystem::Prime => "Prime",
            SourceSystem::GvDasa => "GVDasa",
        }
    }

    /// Whether conversion is implemented for this system.
    pub fn is_available(&self) -> bool {
        matches!(self, SourceSystem::Lyceum)
    }

    /// Columns the export must carry. Disabled systems require nothing.
    pub fn required_columns(&self) -> &'static [&'static str] {
        match self {
            SourceSystem::Lyceum => &[
                COL_UNIT,
                COL_STUDENT,
                COL_FULL_NAME,
                COL_CLASS,
                COL_COURSE,
                COL_GRADE_CODE,
            ],
            SourceSystem::Prime | SourceSystem::GvDasa => &[],
        }
    }
}

impl fmt::Display for SourceSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SourceSystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lyceum" => Ok(SourceSystem::Lyceum),
            "prime" => Ok(SourceSystem::Prime),
            "gvdasa" | "gv-dasa" | "gv_dasa" => Ok(SourceSystem::GvDasa),
            other => Err(format!(
                "Unknown academic system '{}' (expected lyceum, prime or gvdasa)",
                other
            )),
        }
    }
}

// =============================================================================
// Course Type / Grade Label
// =============================================================================

/// Education track recognized by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseType {
    /// "ENSINO FUNDAMENTAL"
    Fundamental,
    /// "ENSINO MÉDIO"
    Medio,
}

impl CourseType {
    /// Parse the exact course value from the export. Anything else is not a target track.
    pub fn from_course(value: &str) -> Option<Self> {
        match value {
            "ENSINO FUNDAMENTAL" => Some(CourseType::Fundamental),
            "ENSINO MÉDIO" => Some(CourseType::Medio),
            _ => None,
        }
    }

    /// Build the grade label for a grade code.
    pub fn grade_label(&self, grade_code: &str) -> String {
        match self {
            CourseType::Fundamental => format!("{}º ano do Ensino Fundamental", grade_code),
            CourseType::Medio => format!("{}ª série do Ensino Médio", grade_code),
        }
    }
}

// =============================================================================
// Normalized Record
// =============================================================================

/// One enrollment row in the platform import format.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedRecord {
    /// Student identifier (RA).
    #[serde(rename = "RA")]
    pub identifier: String,
    /// Full name.
    #[serde(rename = "Nome")]
    pub full_name: String,
    /// Generated login address.
    #[serde(rename = "E-mail")]
    pub email: String,
    /// Default credential chosen by the school.
    #[serde(rename = "Senha")]
    pub password: String,
    /// Grade label, e.g. "5º ano do Ensino Fundamental".
    #[serde(rename = "Ano/Série")]
    pub grade_label: String,
    /// Organizational unit. Partition key, not an export column.
    #[serde(skip)]
    pub unit: String,
    /// Class name.
    #[serde(rename = "Turma")]
    pub class_name: String,
}

/// Header row of the enrollment file.
pub const ENROLLMENT_HEADERS: [&str; 6] = ["RA", "Nome", "E-mail", "Senha", "Ano/Série", "Turma"];

// =============================================================================
// Roster Entry
// =============================================================================

/// One class section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RosterEntry {
    #[serde(rename = "UNIDADE")]
    pub unit: String,
    #[serde(rename = "Ano/Série")]
    pub grade_label: String,
    #[serde(rename = "TURMA")]
    pub class_name: String,
}

/// Header row of the roster file.
pub const ROSTER_HEADERS: [&str; 3] = ["UNIDADE", "Ano/Série", "TURMA"];

// =============================================================================
// Partition
// =============================================================================

/// Per-unit slice of both output tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    /// Unit value, or [`ALL_UNITS`].
    pub name: String,
    pub records: Vec<NormalizedRecord>,
    pub rosters: Vec<RosterEntry>,
}

// =============================================================================
// Export Artifact
// =============================================================================

/// File format of the per-unit tables.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Excel workbook, the format the platform import expects
    #[default]
    Xlsx,
    /// `;`-separated UTF-8 text
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            OutputFormat::Csv => "text/csv; charset=utf-8",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!("Unknown output format '{}' (expected xlsx or csv)", other)),
        }
    }
}

/// What an artifact contains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    /// Enrollment table (one row per student).
    Enrollment,
    /// Class roster table.
    Roster,
    /// ZIP bundle of every per-unit table.
    Archive,
}

/// A named file ready for download. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportArtifact {
    name: String,
    role: ArtifactRole,
    partition: Option<String>,
    bytes: Vec<u8>,
}

impl ExportArtifact {
    pub fn new(
        name: impl Into<String>,
        role: ArtifactRole,
        partition: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            role,
            partition,
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> ArtifactRole {
        self.role
    }

    /// Owning partition; `None` for the archive.
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MIME type for the download response, from the file extension.
    pub fn mime_type(&self) -> &'static str {
        if self.role == ArtifactRole::Archive {
            return "application/zip";
        }
        match self.name.rsplit('.').next() {
            Some("xlsx") => OutputFormat::Xlsx.mime_type(),
            _ => OutputFormat::Csv.mime_type(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
