//! Input schema checks and JSON Schema validation of output rows.
//!
//! Two kinds of checks live here:
//!
//! ## Required columns
//! [`validate_schema`] runs before any filtering. A missing column is
//! terminal for the conversion: a malformed export must never quietly turn
//! into an empty or partial result.
//!
//! ## Output rows
//! Enrollment rows and roster entries are checked against schemas embedded
//! at compile time from `schemas/`:
//! - `enrollment-record.json`
//! - `roster-entry.json`
//!
//! Row problems are reported, not fatal.

use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;

use crate::error::SchemaError;
use crate::models::{NormalizedRecord, RawTable, RosterEntry, SourceSystem};

/// Maximum number of row errors kept in a [`CheckReport`].
const MAX_REPORTED_ERRORS: usize = 10;

static ENROLLMENT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/enrollment-record.json"))
        .expect("Invalid embedded schema")
});

static ROSTER_SCHEMA: Lazy<Value> = Lazy::new(|| {
    serde_json::from_str(include_str!("../../schemas/roster-entry.json"))
        .expect("Invalid embedded schema")
});

static ENROLLMENT_VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&ENROLLMENT_SCHEMA).expect("Invalid embedded schema"));

static ROSTER_VALIDATOR: Lazy<Validator> =
    Lazy::new(|| jsonschema::draft7::new(&ROSTER_SCHEMA).expect("Invalid embedded schema"));

/// Check that every required column of `system` is present.
///
/// Returns the table unchanged, or a [`SchemaError`] listing all missing
/// columns in required-schema order.
pub fn validate_schema(table: &RawTable, system: SourceSystem) -> Result<&RawTable, SchemaError> {
    let missing: Vec<String> = system
        .required_columns()
        .iter()
        .filter(|col| !table.has_column(col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(table)
    } else {
        Err(SchemaError { system, missing })
    }
}

fn collect_errors(validator: &Validator, data: &Value) -> Result<(), Vec<String>> {
    let errors: Vec<String> = validator.iter_errors(data).map(|e| e.to_string()).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate one serialized enrollment row.
pub fn validate_enrollment_record(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&ENROLLMENT_VALIDATOR, data)
}

/// Validate one serialized roster entry.
pub fn validate_roster_entry(data: &Value) -> Result<(), Vec<String>> {
    collect_errors(&ROSTER_VALIDATOR, data)
}

/// Outcome of checking a batch of rows.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub valid: usize,
    pub invalid: usize,
    /// (row index, messages), capped at ten entries
    pub errors: Vec<(usize, Vec<String>)>,
}

impl CheckReport {
    pub fn is_clean(&self) -> bool {
        self.invalid == 0
    }
}

fn check_rows<T, F>(rows: &[T], check: F) -> CheckReport
where
    T: Serialize,
    F: Fn(&Value) -> Result<(), Vec<String>>,
{
    let mut report = CheckReport::default();

    for (i, row) in rows.iter().enumerate() {
        let outcome = serde_json::to_value(row)
            .map_err(|e| vec![e.to_string()])
            .and_then(|value| check(&value));
        match outcome {
            Ok(()) => report.valid += 1,
            Err(errs) => {
                report.invalid += 1;
                if report.errors.len() < MAX_REPORTED_ERRORS {
                    report.errors.push((i, errs));
                }
            }
        }
    }

    report
}

/// Check every enrollment row.
pub fn check_enrollment(records: &[NormalizedRecord]) -> CheckReport {
    check_rows(records, validate_enrollment_record)
}

/// Check every roster entry.
pub fn check_rosters(rosters: &[RosterEntry]) -> CheckReport {
    check_rows(rosters, validate_roster_entry)
}
