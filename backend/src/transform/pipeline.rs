//! High-level pipeline API for one conversion request.
//!
//! Combines every step: schema check, filtering and normalization, roster
//! aggregation, row checks, unit partitioning and packaging.
//!
//! # Example
//!
//! ```rust,ignore
//! use rosterload::{convert_bytes, ConversionRequest, DecodeOptions, SourceSystem};
//!
//! let bytes = std::fs::read("relatorio.csv")?;
//! let request = ConversionRequest::new(SourceSystem::Lyceum, "senha123");
//! let outcome = convert_bytes(&bytes, &request, &DecodeOptions::default())?;
//!
//! for artifact in &outcome.artifacts {
//!     println!("{} ({} bytes)", artifact.name(), artifact.bytes().len());
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::normalize::{normalize, Normalization, NormalizeParams};
use super::partition::partition_by_unit;
use super::roster::build_roster;
use crate::api::logs::{log_error, log_info, log_info_indent, log_success, log_warning};
use crate::error::{EmptyReason, PipelineError, PipelineResult};
use crate::export::package;
use crate::models::{
    ExportArtifact, NormalizedRecord, OutputFormat, RawTable, RosterEntry, SourceSystem,
};
use crate::parser::{decode_bytes, DecodeOptions};
use crate::validation::{check_enrollment, check_rosters, validate_schema, CheckReport};

/// Institutional domain appended to student identifiers.
pub const DEFAULT_EMAIL_DOMAIN: &str = "maristabrasil.g12.br";

/// Environment variable overriding [`DEFAULT_EMAIL_DOMAIN`].
pub const EMAIL_DOMAIN_ENV: &str = "ROSTERLOAD_EMAIL_DOMAIN";

/// Parameters of one conversion. Nothing is kept between requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Academic system that produced the export
    pub system: SourceSystem,

    /// Password assigned to every student
    pub default_password: Option<String>,

    /// Domain of the generated login addresses
    pub email_domain: String,

    /// Format of the per-unit tables
    #[serde(default)]
    pub output_format: OutputFormat,
}

impl ConversionRequest {
    /// Request with the default domain (or the one from the environment).
    pub fn new(system: SourceSystem, default_password: impl Into<String>) -> Self {
        let password: String = default_password.into();
        Self {
            system,
            default_password: if password.is_empty() { None } else { Some(password) },
            email_domain: std::env::var(EMAIL_DOMAIN_ENV)
                .ok()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_EMAIL_DOMAIN.to_string()),
            output_format: OutputFormat::default(),
        }
    }

    pub fn with_email_domain(mut self, domain: impl Into<String>) -> Self {
        self.email_domain = domain.into();
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    fn normalize_params(&self) -> NormalizeParams<'_> {
        NormalizeParams {
            default_password: self.default_password.as_deref(),
            email_domain: self.email_domain.trim_start_matches('@'),
        }
    }
}

/// Source table information
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
}

/// Row counts of one partition
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSummary {
    pub name: String,
    pub students: usize,
    pub classes: usize,
}

/// Result of a complete conversion
#[derive(Debug, Clone)]
pub struct ConversionOutcome {
    /// Enrollment rows, one per surviving source row
    pub records: Vec<NormalizedRecord>,

    /// Distinct class sections
    pub rosters: Vec<RosterEntry>,

    /// Per-unit counts, in output order
    pub partitions: Vec<PartitionSummary>,

    /// Schema checks of the enrollment rows
    pub enrollment_check: CheckReport,

    /// Schema checks of the roster entries
    pub roster_check: CheckReport,

    /// Files for download
    pub artifacts: Vec<ExportArtifact>,

    /// Source table metadata
    pub source_info: SourceInfo,

    /// Rows removed by the filters
    pub dropped: usize,
}

impl ConversionOutcome {
    /// Find an artifact by file name.
    pub fn artifact(&self, name: &str) -> Option<&ExportArtifact> {
        self.artifacts.iter().find(|a| a.name() == name)
    }
}

/// Decode upload bytes, then convert.
pub fn convert_bytes(
    bytes: &[u8],
    request: &ConversionRequest,
    options: &DecodeOptions,
) -> PipelineResult<ConversionOutcome> {
    log_info("📖 Reading file...");
    let table = decode_bytes(bytes, options)?;
    log_success(format!("Detected encoding: {}", table.encoding));
    log_success(format!("Read {} rows", table.len()));
    convert(&table, request)
}

/// Run one conversion over an already-decoded table.
///
/// Steps:
/// 1. Check required columns
/// 2. Filter and normalize (source-specific)
/// 3. Build the class roster
/// 4. Check output rows against the embedded schemas
/// 5. Partition by unit
/// 6. Package artifacts
pub fn convert(table: &RawTable, request: &ConversionRequest) -> PipelineResult<ConversionOutcome> {
    let source_info = SourceInfo {
        encoding: table.encoding.clone(),
        delimiter: table.delimiter,
        headers: table.headers.clone(),
        row_count: table.len(),
    };

    // Step 1: schema
    log_info(format!("📋 Checking columns for {}...", request.system));
    if let Err(err) = validate_schema(table, request.system) {
        log_error(err.to_string());
        return Err(err.into());
    }
    log_success(format!("{} columns present", table.headers.len()));

    // Step 2: filter & normalize
    log_info("🔎 Filtering and normalizing rows...");
    let normalized = match normalize(table, request.system, request.normalize_params()) {
        Normalization::Ready(tables) => tables,
        Normalization::Unavailable { message } => {
            log_warning(message.clone());
            return Err(PipelineError::EmptyResult(EmptyReason::SystemUnavailable {
                system: request.system,
                message,
            }));
        }
    };
    let dropped = table.len() - normalized.records.len();
    log_success(format!(
        "{} students kept, {} rows dropped",
        normalized.records.len(),
        dropped
    ));

    if normalized.records.is_empty() {
        log_warning("No rows left after filtering");
        return Err(PipelineError::EmptyResult(EmptyReason::NoRecords));
    }

    // Step 3: roster
    log_info("📦 Grouping classes...");
    let rosters = build_roster(&normalized.filtered)?;
    log_success(format!("{} classes", rosters.len()));

    // Step 4: row checks
    log_info("✔️  Validating rows...");
    let enrollment_check = check_enrollment(&normalized.records);
    let roster_check = check_rosters(&rosters);
    report_check("enrollment rows", &enrollment_check);
    report_check("classes", &roster_check);

    // Step 5: partition
    log_info("🏫 Splitting by unit...");
    let partitions = partition_by_unit(table, &normalized.records, &rosters);
    for p in &partitions {
        log_info_indent(
            format!("{}: {} students, {} classes", p.name, p.records.len(), p.rosters.len()),
            1,
        );
    }

    // Step 6: package
    log_info(format!("💾 Packaging {} files...", request.output_format));
    let artifacts = package(&partitions, request.output_format)?;
    for a in &artifacts {
        log_success(format!("{} ({} bytes)", a.name(), a.bytes().len()));
    }

    let summaries = partitions
        .iter()
        .map(|p| PartitionSummary {
            name: p.name.clone(),
            students: p.records.len(),
            classes: p.rosters.len(),
        })
        .collect();

    Ok(ConversionOutcome {
        records: normalized.records,
        rosters,
        partitions: summaries,
        enrollment_check,
        roster_check,
        artifacts,
        source_info,
        dropped,
    })
}

fn report_check(what: &str, report: &CheckReport) {
    if report.is_clean() {
        log_success(format!("All {} {} valid", report.valid, what));
        return;
    }
    log_warning(format!("{} of {} {} failed validation", report.invalid, report.valid + report.invalid, what));
    for (row, errors) in report.errors.iter().take(3) {
        log_error(format!("Row {}: {}", row, errors.join(", ")));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArtifactRole;
    use serde_json::{json, Value};
    use std::io::Cursor;
    use zip::ZipArchive;

    const HEADERS: [&str; 7] = ["UNIDADE", "ALUNO", "NOME_COMPL", "TURMA", "CURSO", "CODSERIE", "Status"];

    fn row(unit: &str, aluno: i64, turma: &str, curso: &str, serie: i64) -> Value {
        json!({
            "UNIDADE": unit,
            "ALUNO": aluno,
            "NOME_COMPL": format!("Aluno {}", aluno),
            "TURMA": turma,
            "CURSO": curso,
            "CODSERIE": serie,
            "Status": "Ativo",
        })
    }

    fn table(rows: Vec<Value>) -> RawTable {
        RawTable::new(HEADERS.iter().map(|h| h.to_string()).collect(), rows)
    }

    fn request(system: SourceSystem) -> ConversionRequest {
        ConversionRequest::new(system, "senha123").with_email_domain(DEFAULT_EMAIL_DOMAIN)
    }

    #[test]
    fn test_end_to_end_two_units() {
        let t = table(vec![
            row("Centro", 1, "5A", "ENSINO FUNDAMENTAL", 5),
            row("Sul", 2, "2A", "ENSINO MÉDIO", 2),
            row("Sul", 3, "SEM TURMA", "ENSINO MÉDIO", 2),
            row("Centro", 4, "7P", "ENSINO FUNDAMENTAL", 7),
        ]);

        let outcome = convert(&t, &request(SourceSystem::Lyceum)).unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.dropped, 2);
        assert_eq!(outcome.rosters.len(), 2);
        assert!(outcome.rosters.iter().all(|r| r.class_name != "7P"));
        assert_eq!(outcome.partitions.len(), 2);
        assert!(outcome.enrollment_check.is_clean());

        assert_eq!(outcome.artifacts.len(), 1);
        let archive = outcome.artifact("cadastros_unidades.zip").unwrap();
        assert_eq!(archive.role(), ArtifactRole::Archive);
        let zip = ZipArchive::new(Cursor::new(archive.bytes().to_vec())).unwrap();
        assert_eq!(zip.len(), 4);
    }

    #[test]
    fn test_single_unit_gives_two_files() {
        let t = table(vec![
            row("Centro", 1, "5A", "ENSINO FUNDAMENTAL", 5),
            row("Centro", 2, "5A", "ENSINO FUNDAMENTAL", 5),
        ]);

        let outcome = convert(&t, &request(SourceSystem::Lyceum)).unwrap();
        let names: Vec<&str> = outcome.artifacts.iter().map(|a| a.name()).collect();
        assert_eq!(names, vec!["Cadastro_Centro.xlsx", "Turmas_Centro.xlsx"]);
        assert_eq!(outcome.rosters.len(), 1);
    }

    #[test]
    fn test_schema_error_before_filtering() {
        let t = RawTable::new(vec!["UNIDADE".into(), "TURMA".into()], vec![json!({ "UNIDADE": "Centro", "TURMA": "5A" })]);
        let err = convert(&t, &request(SourceSystem::Lyceum)).unwrap_err();
        match err {
            PipelineError::Schema(e) => {
                assert_eq!(e.missing, vec!["ALUNO", "NOME_COMPL", "CURSO", "CODSERIE"]);
            }
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_everything_filtered_is_empty_result() {
        let t = table(vec![row("Centro", 1, "SEM TURMA", "ENSINO FUNDAMENTAL", 5)]);
        let err = convert(&t, &request(SourceSystem::Lyceum)).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyResult(EmptyReason::NoRecords)));
    }

    #[test]
    fn test_disabled_system_is_empty_result() {
        let t = table(vec![row("Centro", 1, "5A", "ENSINO FUNDAMENTAL", 5)]);
        let err = convert(&t, &request(SourceSystem::GvDasa)).unwrap_err();
        assert!(err.is_empty_result());
        assert!(err.to_string().contains("GVDasa"));
    }

    #[test]
    fn test_convert_bytes_semicolon_csv() {
        let csv = "UNIDADE;ALUNO;NOME_COMPL;TURMA;CURSO;CODSERIE\n\
                   Centro;1001;Ana Souza;5A;ENSINO FUNDAMENTAL;5\n\
                   Centro;1002;Bruno Lima;6P;ENSINO FUNDAMENTAL;6\n";
        let req = request(SourceSystem::Lyceum).with_output_format(OutputFormat::Csv);
        let outcome = convert_bytes(csv.as_bytes(), &req, &DecodeOptions::default()).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].email, "1001@maristabrasil.g12.br");
        assert_eq!(outcome.source_info.row_count, 2);

        let enrollment = outcome.artifact("Cadastro_Centro.csv").unwrap();
        let text = String::from_utf8(enrollment.bytes().to_vec()).unwrap();
        assert!(text.contains("1001;Ana Souza;1001@maristabrasil.g12.br;senha123;5º ano do Ensino Fundamental;5A"));
    }

    #[test]
    fn test_domain_with_leading_at() {
        let t = table(vec![row("Centro", 9, "1A", "ENSINO MÉDIO", 1)]);
        let req = request(SourceSystem::Lyceum).with_email_domain("@escola.br");
        let outcome = convert(&t, &req).unwrap();
        assert_eq!(outcome.records[0].email, "9@escola.br");
    }

    #[test]
    fn test_workbook_upload_to_workbook_tables() {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        let rows: [[&str; 6]; 2] = [
            ["UNIDADE", "ALUNO", "NOME_COMPL", "TURMA", "CURSO", "CODSERIE"],
            ["Centro", "1001", "Ana Souza", "9B", "ENSINO FUNDAMENTAL", "9"],
        ];
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                sheet.write_string(r as u32, c as u16, *cell).unwrap();
            }
        }
        let bytes = book.save_to_buffer().unwrap();

        let outcome = convert_bytes(&bytes, &request(SourceSystem::Lyceum), &DecodeOptions::default()).unwrap();
        assert_eq!(outcome.source_info.encoding, "xlsx");
        assert_eq!(outcome.records[0].grade_label, "9º ano do Ensino Fundamental");
        assert!(outcome.artifact("Cadastro_Centro.xlsx").is_some());
    }
}
