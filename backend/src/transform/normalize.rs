//! Source-specific filtering and normalization.
//!
//! Each [`SourceSystem`] dispatches to one strategy. Lyceum is the only
//! implemented one; the others report themselves unavailable instead of
//! failing, so the caller can show a notice rather than an error.
//!
//! # Lyceum rules
//!
//! ```text
//! Status == "Ativo"          (only when the column exists)
//! TURMA !~ "SEM TURMA"       (case-insensitive)
//! TURMA !~ "P"               (case-insensitive)
//! CURSO in {ENSINO FUNDAMENTAL, ENSINO MÉDIO}
//! ```

use serde_json::Value;

use crate::models::{
    cell_text, field_text, CourseType, NormalizedRecord, RawTable, SourceSystem, COL_CLASS,
    COL_COURSE, COL_FULL_NAME, COL_GRADE_CODE, COL_GRADE_LABEL, COL_STATUS, COL_STUDENT, COL_UNIT,
};

/// Marker Lyceum puts in the class column of students without a class.
pub const NO_CLASS_MARKER: &str = "SEM TURMA";

/// Lyceum marks non-target classes with a "P" in the class name.
///
/// NOTE: substring match, so any class whose name merely contains a "P"
/// is dropped as well. Kept literal until the real naming convention is
/// confirmed with the school.
pub const EXCLUDED_CLASS_LETTER: &str = "P";

/// Active enrollment status value.
pub const ACTIVE_STATUS: &str = "Ativo";

/// Parameters the normalizer needs from the request.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeParams<'a> {
    pub default_password: Option<&'a str>,
    pub email_domain: &'a str,
}

/// Output of a successful normalization.
#[derive(Debug, Clone)]
pub struct NormalizedTables {
    /// One enrollment row per surviving source row
    pub records: Vec<NormalizedRecord>,
    /// Surviving source rows, original columns plus [`COL_GRADE_LABEL`]
    pub filtered: RawTable,
}

/// What a strategy produced.
#[derive(Debug, Clone)]
pub enum Normalization {
    Ready(NormalizedTables),
    /// The system is disabled; `message` is shown to the user.
    Unavailable { message: String },
}

/// Run the strategy of `system` over a schema-checked table.
pub fn normalize(table: &RawTable, system: SourceSystem, params: NormalizeParams<'_>) -> Normalization {
    match system {
        SourceSystem::Lyceum => Normalization::Ready(normalize_lyceum(table, params)),
        SourceSystem::Prime | SourceSystem::GvDasa => unavailable(system),
    }
}

fn unavailable(system: SourceSystem) -> Normalization {
    Normalization::Unavailable {
        message: format!(
            "A funcionalidade para o sistema {} está desativada no momento.",
            system.display_name()
        ),
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_uppercase().contains(&needle.to_uppercase())
}

/// Whether a Lyceum row passes the class and course rules (status excluded).
pub fn lyceum_row_is_target(row: &Value) -> bool {
    let class_name = field_text(row, COL_CLASS);
    if contains_ignore_case(&class_name, NO_CLASS_MARKER) {
        return false;
    }
    if contains_ignore_case(&class_name, EXCLUDED_CLASS_LETTER) {
        return false;
    }
    CourseType::from_course(&field_text(row, COL_COURSE)).is_some()
}

/// Apply the Lyceum filters without computing derived fields.
pub fn filter_lyceum(table: &RawTable) -> RawTable {
    let check_status = table.has_column(COL_STATUS);

    let records = table
        .records
        .iter()
        .filter(|row| !check_status || row.get(COL_STATUS).map(cell_text).as_deref() == Some(ACTIVE_STATUS))
        .filter(|row| lyceum_row_is_target(row))
        .cloned()
        .collect();

    RawTable {
        headers: table.headers.clone(),
        records,
        encoding: table.encoding.clone(),
        delimiter: table.delimiter,
    }
}

fn normalize_lyceum(table: &RawTable, params: NormalizeParams<'_>) -> NormalizedTables {
    let mut filtered = filter_lyceum(table);
    let password = params.default_password.unwrap_or("").to_string();

    let mut records = Vec::with_capacity(filtered.records.len());
    for row in filtered.records.iter_mut() {
        // filter_lyceum kept only recognized courses
        let Some(course) = CourseType::from_course(&field_text(row, COL_COURSE)) else {
            continue;
        };
        let grade_label = course.grade_label(&field_text(row, COL_GRADE_CODE));
        let identifier = field_text(row, COL_STUDENT);

        records.push(NormalizedRecord {
            email: format!("{}@{}", identifier, params.email_domain),
            identifier,
            full_name: field_text(row, COL_FULL_NAME),
            password: password.clone(),
            grade_label: grade_label.clone(),
            unit: field_text(row, COL_UNIT),
            class_name: field_text(row, COL_CLASS),
        });

        if let Value::Object(obj) = row {
            obj.insert(COL_GRADE_LABEL.to_string(), Value::String(grade_label));
        }
    }

    if !filtered.has_column(COL_GRADE_LABEL) {
        filtered.headers.push(COL_GRADE_LABEL.to_string());
    }

    NormalizedTables { records, filtered }
}
