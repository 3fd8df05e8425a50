//! Export packaging: per-unit tables, bundled into a ZIP when needed.
//!
//! ```text
//! 1 partition   →  Cadastro_<unit>.xlsx + Turmas_<unit>.xlsx   (two downloads)
//! N partitions  →  cadastros_unidades.zip                        (one download)
//!                  ├── Cadastro_<unit1>.xlsx
//!                  ├── Turmas_<unit1>.xlsx
//!                  └── ...
//! ```
//!
//! A single-unit school gets its files directly instead of an archive.
//! Tables are written as XLSX workbooks or, on request, `;`-separated CSV.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{ColNum, RowNum, Workbook};
use serde::Serialize;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::CompressionMethod;

use crate::error::ExportResult;
use crate::models::{
    field_text, ArtifactRole, ExportArtifact, OutputFormat, Partition, ENROLLMENT_HEADERS,
    ROSTER_HEADERS,
};

/// Name of the archive produced for multi-unit schools.
pub const ARCHIVE_NAME: &str = "cadastros_unidades.zip";

/// Field delimiter of the generated CSV tables.
pub const OUTPUT_DELIMITER: u8 = b';';

/// Worksheet holding the table in generated workbooks.
pub const SHEET_NAME: &str = "Sheet1";

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-_]").expect("valid regex"));
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip characters that are unsafe in file names.
///
/// Keeps word characters, whitespace, `-` and `_`, then collapses whitespace
/// runs into a single `_`.
pub fn sanitize_file_token(name: &str) -> String {
    let cleaned = UNSAFE_CHARS.replace_all(name, "");
    WHITESPACE_RUNS.replace_all(&cleaned, "_").into_owned()
}

/// File tokens for partition names, unique within one export.
///
/// Names that sanitize to the same token get `_2`, `_3`, ... in the order
/// they are given, skipping suffixes already taken by another name.
pub fn unique_file_tokens<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken = HashSet::new();
    let mut tokens = Vec::new();
    for name in names {
        let base = sanitize_file_token(name);
        let mut token = base.clone();
        let mut n = 1;
        while !taken.insert(token.clone()) {
            n += 1;
            token = format!("{}_{}", base, n);
        }
        tokens.push(token);
    }
    tokens
}

/// Enrollment file name for a partition token.
pub fn enrollment_file_name(token: &str, format: OutputFormat) -> String {
    format!("Cadastro_{}.{}", token, format.extension())
}

/// Roster file name for a partition token.
pub fn roster_file_name(token: &str, format: OutputFormat) -> String {
    format!("Turmas_{}.{}", token, format.extension())
}

/// Serialize rows as a `;`-separated CSV with a header row.
///
/// The header is written explicitly so that empty tables still carry it.
pub fn write_table<T: Serialize>(headers: &[&str], rows: &[T]) -> ExportResult<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(OUTPUT_DELIMITER)
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(headers)?;
    for row in rows {
        writer.serialize(row)?;
    }
    Ok(writer.into_inner()?)
}

/// Serialize rows into a single-sheet workbook with a header row.
///
/// Every cell is written as text so identifiers keep their digits.
pub fn write_workbook<T: Serialize>(headers: &[&str], rows: &[T]) -> ExportResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in headers.iter().enumerate() {
        sheet.write_string(0, col as ColNum, *header)?;
    }
    for (i, row) in rows.iter().enumerate() {
        let value = serde_json::to_value(row)?;
        let r = (i + 1) as RowNum;
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(r, col as ColNum, field_text(&value, header))?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}

fn encode_table<T: Serialize>(
    headers: &[&str],
    rows: &[T],
    format: OutputFormat,
) -> ExportResult<Vec<u8>> {
    match format {
        OutputFormat::Xlsx => write_workbook(headers, rows),
        OutputFormat::Csv => write_table(headers, rows),
    }
}

/// Serialize one partition into its two artifacts, named with `token`.
pub fn partition_artifacts(
    partition: &Partition,
    token: &str,
    format: OutputFormat,
) -> ExportResult<[ExportArtifact; 2]> {
    let enrollment = encode_table(&ENROLLMENT_HEADERS, &partition.records, format)?;
    let roster = encode_table(&ROSTER_HEADERS, &partition.rosters, format)?;

    Ok([
        ExportArtifact::new(
            enrollment_file_name(token, format),
            ArtifactRole::Enrollment,
            Some(partition.name.clone()),
            enrollment,
        ),
        ExportArtifact::new(
            roster_file_name(token, format),
            ArtifactRole::Roster,
            Some(partition.name.clone()),
            roster,
        ),
    ])
}

/// Bundle artifacts into one deflate-compressed ZIP.
pub fn build_archive(files: &[ExportArtifact]) -> ExportResult<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for file in files {
            zip.start_file(file.name(), options)?;
            zip.write_all(file.bytes())?;
        }
        zip.finish()?;
    }
    Ok(buf)
}

/// Package partitions into downloadable artifacts.
///
/// - no partition → no artifact
/// - one partition → its enrollment and roster files
/// - several partitions → a single archive holding every file
pub fn package(partitions: &[Partition], format: OutputFormat) -> ExportResult<Vec<ExportArtifact>> {
    let tokens = unique_file_tokens(partitions.iter().map(|p| p.name.as_str()));
    let mut files = Vec::with_capacity(partitions.len() * 2);
    for (partition, token) in partitions.iter().zip(&tokens) {
        files.extend(partition_artifacts(partition, token, format)?);
    }

    if partitions.len() <= 1 {
        return Ok(files);
    }

    let archive = build_archive(&files)?;
    Ok(vec![ExportArtifact::new(
        ARCHIVE_NAME,
        ArtifactRole::Archive,
        None,
        archive,
    )])
}

/// Write artifacts into a directory, returning the written paths.
pub fn write_artifacts(artifacts: &[ExportArtifact], dir: &Path) -> ExportResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(artifacts.len());
    for artifact in artifacts {
        let path = dir.join(artifact.name());
        std::fs::write(&path, artifact.bytes())?;
        written.push(path);
    }
    Ok(written)
}
