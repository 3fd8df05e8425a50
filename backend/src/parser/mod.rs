//! Decoding of academic-system exports into a [`RawTable`].
//!
//! Exports come out of Brazilian school systems either as spreadsheets
//! (`.xlsx`, `.xls`, `.ods`) or as `;`-separated text with comma decimals,
//! frequently in Latin-1. The format is sniffed from the leading bytes.
//! Each row becomes a JSON object keyed by header; numeric cells become
//! JSON numbers, empty cells `null`.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Number, Value};
use std::io::Cursor;
use std::path::Path;

use crate::error::{DecodeError, DecodeResult};
use crate::models::RawTable;

/// Locale conventions of the text export.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOptions {
    /// Field separator.
    pub delimiter: char,
    /// Decimal separator used in numeric cells.
    pub decimal: char,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            delimiter: ';',
            decimal: ',',
        }
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        // WHATWG maps the latin1 labels to Windows-1252
        "iso-8859-1" | "latin-1" | "latin1" | "windows-1252" | "cp1252" => {
            encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned()
        }
        _ => match std::str::from_utf8(bytes) {
            Ok(s) => s.to_string(),
            // Unknown single-byte charset: Windows-1252 is the usual culprit
            Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        },
    }
}

/// Convert one trimmed cell into a JSON scalar.
///
/// Only plain decimal literals become numbers (`12`, `-3`, `4,5` with a
/// comma decimal). Anything with letters, thousands separators or exponents
/// stays text, and so do integers too wide for an `i64`.
pub fn parse_cell(raw: &str, decimal: char) -> Value {
    let raw = raw.trim();
    if raw.is_empty() {
        return Value::Null;
    }

    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    let mut seen_decimal = false;
    let mut digits = 0;
    for c in unsigned.chars() {
        if c.is_ascii_digit() {
            digits += 1;
        } else if c == decimal && !seen_decimal {
            seen_decimal = true;
        } else {
            return Value::String(raw.to_string());
        }
    }
    if digits == 0 || unsigned.starts_with(decimal) || unsigned.ends_with(decimal) {
        return Value::String(raw.to_string());
    }

    let normalized = raw.replace(decimal, ".");
    if !seen_decimal {
        return match normalized.parse::<i64>() {
            Ok(i) => Value::Number(i.into()),
            Err(_) => Value::String(raw.to_string()),
        };
    }
    normalized
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Parse decoded text into a raw table.
pub fn parse_str(content: &str, options: &DecodeOptions, encoding: String) -> DecodeResult<RawTable> {
    if !options.delimiter.is_ascii() {
        return Err(DecodeError::InvalidDelimiter(options.delimiter));
    }
    if content.trim().is_empty() {
        return Err(DecodeError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter as u8)
        .flexible(true)
        .has_headers(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().trim_matches('"').to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(DecodeError::NoHeaders);
    }

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row
                .get(i)
                .map(|cell| parse_cell(cell, options.decimal))
                .unwrap_or(Value::Null);
            obj.insert(header.clone(), value);
        }
        records.push(Value::Object(obj));
    }

    Ok(RawTable {
        headers,
        records,
        encoding,
        delimiter: options.delimiter,
    })
}

/// Spreadsheet container recognised from its leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkbookKind {
    /// ZIP container (`.xlsx`, `.ods`)
    OpenXml,
    /// OLE2 compound file (legacy `.xls`)
    Legacy,
}

impl WorkbookKind {
    /// Sniff the container from magic bytes; `None` means delimited text.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"PK\x03\x04") {
            Some(WorkbookKind::OpenXml)
        } else if bytes.starts_with(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1") {
            Some(WorkbookKind::Legacy)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            WorkbookKind::OpenXml => "xlsx",
            WorkbookKind::Legacy => "xls",
        }
    }
}

/// Convert one spreadsheet cell into a JSON scalar.
fn workbook_cell(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Int(i) => Value::Number((*i).into()),
        Data::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        Data::Bool(b) => Value::Bool(*b),
        Data::String(s) => match s.trim() {
            "" => Value::Null,
            text => Value::String(text.to_string()),
        },
        other => Value::String(other.to_string()),
    }
}

/// Decode the first worksheet of a spreadsheet.
///
/// The first row holds the headers. Cells keep the types stored in the
/// workbook; text cells are not reinterpreted as numbers.
pub fn decode_workbook(bytes: &[u8], options: &DecodeOptions) -> DecodeResult<RawTable> {
    let kind = WorkbookKind::sniff(bytes).unwrap_or(WorkbookKind::OpenXml);
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook.worksheet_range_at(0).ok_or(DecodeError::EmptyFile)??;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row.iter().map(|cell| cell.to_string().trim().to_string()).collect(),
        None => return Err(DecodeError::EmptyFile),
    };
    if headers.iter().all(|h| h.is_empty()) {
        return Err(DecodeError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in rows {
        let values: Vec<Value> = row.iter().map(workbook_cell).collect();
        if values.iter().all(Value::is_null) {
            continue;
        }

        let mut obj = Map::new();
        for (i, header) in headers.iter().enumerate() {
            obj.insert(header.clone(), values.get(i).cloned().unwrap_or(Value::Null));
        }
        records.push(Value::Object(obj));
    }

    Ok(RawTable {
        headers,
        records,
        encoding: kind.label().to_string(),
        delimiter: options.delimiter,
    })
}

/// Decode raw upload bytes: spreadsheets through calamine, text with
/// encoding auto-detection.
pub fn decode_bytes(bytes: &[u8], options: &DecodeOptions) -> DecodeResult<RawTable> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyFile);
    }
    if WorkbookKind::sniff(bytes).is_some() {
        return decode_workbook(bytes, options);
    }
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    parse_str(&content, options, encoding)
}

/// Decode a file from disk.
pub fn decode_file<P: AsRef<Path>>(path: P, options: &DecodeOptions) -> DecodeResult<RawTable> {
    let bytes = std::fs::read(path.as_ref())?;
    decode_bytes(&bytes, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(content: &str) -> RawTable {
        parse_str(content, &DecodeOptions::default(), "utf-8".into()).unwrap()
    }

    #[test]
    fn test_semicolon_rows() {
        let table = parse("UNIDADE;ALUNO;TURMA\nCentro;123;5A\nSul;456;6B");

        assert_eq!(table.headers, vec!["UNIDADE", "ALUNO", "TURMA"]);
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0]["UNIDADE"], "Centro");
        assert_eq!(table.records[0]["ALUNO"], 123);
        assert_eq!(table.records[1]["TURMA"], "6B");
    }

    #[test]
    fn test_comma_decimal() {
        assert_eq!(parse_cell("4,5", ','), json!(4.5));
        assert_eq!(parse_cell("-2", ','), json!(-2));
        assert_eq!(parse_cell("5", ','), json!(5));
        assert_eq!(parse_cell("1.234,5", ','), json!("1.234,5"));
        assert_eq!(parse_cell("3P", ','), json!("3P"));
        assert_eq!(parse_cell("1E5", ','), json!("1E5"));
        assert_eq!(parse_cell(",", ','), json!(","));
        assert_eq!(parse_cell("  ", ','), Value::Null);
    }

    #[test]
    fn test_quoted_values() {
        let table = parse("NOME_COMPL;TURMA\n\"Silva; Ana\";\"7A\"");
        assert_eq!(table.records[0]["NOME_COMPL"], "Silva; Ana");
        assert_eq!(table.records[0]["TURMA"], "7A");
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = parse("a;b\n1;2\n\n;\n3;4\n");
        assert_eq!(table.records.len(), 2);
    }

    #[test]
    fn test_missing_and_extra_cells() {
        let table = parse("a;b;c\n1;;3\n4\n5;6;7;8");

        assert_eq!(table.records[0]["b"], Value::Null);
        assert_eq!(table.records[1]["b"], Value::Null);
        assert_eq!(table.records[1]["c"], Value::Null);
        assert_eq!(table.records[2]["c"], 7);
        assert!(table.records[2].get("d").is_none());
    }

    #[test]
    fn test_empty_input_error() {
        let result = parse_str("", &DecodeOptions::default(), "utf-8".into());
        assert!(matches!(result, Err(DecodeError::EmptyFile)));
        assert!(matches!(
            decode_bytes(b"", &DecodeOptions::default()),
            Err(DecodeError::EmptyFile)
        ));
    }

    #[test]
    fn test_latin1_decoding() {
        // "CURSO\nENSINO MÉDIO" in ISO-8859-1
        let mut bytes = b"CURSO\nENSINO M".to_vec();
        bytes.push(0xC9);
        bytes.extend_from_slice(b"DIO\n");
        let decoded = decode_content(&bytes, "iso-8859-1");
        assert!(decoded.contains("ENSINO MÉDIO"));
    }

    #[test]
    fn test_bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFALUNO;TURMA\n1;5A";
        let table = decode_bytes(bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(table.headers[0], "ALUNO");
    }

    #[test]
    fn test_latin1_uses_windows_1252_table() {
        let decoded = decode_content(b"pre\xA4o", "iso-8859-1");
        assert_eq!(decoded, "pre\u{A4}o");
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        let options = DecodeOptions {
            delimiter: '§',
            ..DecodeOptions::default()
        };
        let result = parse_str("a§b\n1§2", &options, "utf-8".into());
        assert!(matches!(result, Err(DecodeError::InvalidDelimiter('§'))));
    }

    #[test]
    fn test_wide_integer_keeps_digits() {
        assert_eq!(parse_cell("12345678901234567890", ','), json!("12345678901234567890"));
        let table = parse("ALUNO;TURMA\n12345678901234567890;5A");
        assert_eq!(
            crate::models::field_text(&table.records[0], "ALUNO"),
            "12345678901234567890"
        );
    }

    fn workbook(rows: &[&[&str]]) -> Vec<u8> {
        let mut book = rust_xlsxwriter::Workbook::new();
        let sheet = book.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                match cell.parse::<f64>() {
                    Ok(n) if r > 0 => sheet.write_number(r as u32, c as u16, n).unwrap(),
                    _ => sheet.write_string(r as u32, c as u16, *cell).unwrap(),
                };
            }
        }
        book.save_to_buffer().unwrap()
    }

    #[test]
    fn test_xlsx_workbook() {
        let bytes = workbook(&[
            &["UNIDADE", "ALUNO", "NOME_COMPL", "TURMA"],
            &["Centro", "1001", "Ana Souza", "5A"],
            &["", "", "", ""],
            &["Sul", "1002", " Bruno Lima ", "6B"],
        ]);
        assert_eq!(WorkbookKind::sniff(&bytes), Some(WorkbookKind::OpenXml));

        let table = decode_bytes(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(table.headers, vec!["UNIDADE", "ALUNO", "NOME_COMPL", "TURMA"]);
        assert_eq!(table.encoding, "xlsx");
        assert_eq!(table.records.len(), 2);
        assert_eq!(table.records[0]["UNIDADE"], "Centro");
        assert_eq!(crate::models::field_text(&table.records[0], "ALUNO"), "1001");
        assert_eq!(table.records[1]["NOME_COMPL"], "Bruno Lima");
    }

    #[test]
    fn test_text_is_not_sniffed_as_workbook() {
        assert_eq!(WorkbookKind::sniff(b"UNIDADE;ALUNO\n"), None);
        assert_eq!(
            WorkbookKind::sniff(b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1rest"),
            Some(WorkbookKind::Legacy)
        );
    }

    #[test]
    fn test_corrupt_workbook_is_decode_error() {
        let result = decode_bytes(b"PK\x03\x04 not really a zip", &DecodeOptions::default());
        assert!(matches!(result, Err(DecodeError::Workbook(_))));
    }
}
