//! Group filtered student rows into class sections.
//!
//! # Architecture
//!
//! ```text
//! Filtered rows                            →  Roster
//! ┌──────────────────────────────────────┐    ┌──────────────────────────────┐
//! │ Centro, 5º ano..., 5A, aluno 1       │    │ Centro, 5º ano..., 5A        │
//! │ Centro, 5º ano..., 5A, aluno 2       │ →  │ Sul,    2ª série..., 2B      │
//! │ Sul,    2ª série..., 2B, aluno 3     │    └──────────────────────────────┘
//! └──────────────────────────────────────┘
//! ```
//!
//! Only the distinct (unit, grade label, class) keys survive; no counts.

use std::collections::BTreeSet;

use crate::error::TransformError;
use crate::models::{field_text, RawTable, RosterEntry, COL_CLASS, COL_GRADE_LABEL, COL_UNIT};

/// Build the class roster from the filtered source table.
///
/// The table must already carry the grade label column produced by the
/// normalizer. Entries come out sorted by (unit, grade label, class).
pub fn build_roster(filtered: &RawTable) -> Result<Vec<RosterEntry>, TransformError> {
    if !filtered.has_column(COL_GRADE_LABEL) {
        return Err(TransformError::MissingField(COL_GRADE_LABEL.to_string()));
    }

    let entries: BTreeSet<RosterEntry> = filtered
        .records
        .iter()
        .map(|row| RosterEntry {
            unit: field_text(row, COL_UNIT),
            grade_label: field_text(row, COL_GRADE_LABEL),
            class_name: field_text(row, COL_CLASS),
        })
        .collect();

    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn filtered(rows: Vec<Value>) -> RawTable {
        let headers = ["UNIDADE", "ALUNO", "TURMA", "Ano/Série"]
            .iter()
            .map(|h| h.to_string())
            .collect();
        RawTable::new(headers, rows)
    }

    #[test]
    fn test_duplicates_collapse() {
        let table = filtered(vec![
            json!({ "UNIDADE": "Centro", "ALUNO": 1, "TURMA": "5A", "Ano/Série": "5º ano do Ensino Fundamental" }),
            json!({ "UNIDADE": "Centro", "ALUNO": 2, "TURMA": "5A", "Ano/Série": "5º ano do Ensino Fundamental" }),
            json!({ "UNIDADE": "Centro", "ALUNO": 3, "TURMA": "5B", "Ano/Série": "5º ano do Ensino Fundamental" }),
        ]);

        let roster = build_roster(&table).unwrap();
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[0].class_name, "5A");
        assert_eq!(roster[1].class_name, "5B");
    }

    #[test]
    fn test_same_class_in_two_units() {
        let table = filtered(vec![
            json!({ "UNIDADE": "Sul", "ALUNO": 1, "TURMA": "1A", "Ano/Série": "1ª série do Ensino Médio" }),
            json!({ "UNIDADE": "Centro", "ALUNO": 2, "TURMA": "1A", "Ano/Série": "1ª série do Ensino Médio" }),
        ]);

        let roster = build_roster(&table).unwrap();
        assert_eq!(roster.len(), 2);
        // sorted by unit first
        assert_eq!(roster[0].unit, "Centro");
        assert_eq!(roster[1].unit, "Sul");
    }

    #[test]
    fn test_numeric_cells_render_as_text() {
        let table = filtered(vec![
            json!({ "UNIDADE": 12, "ALUNO": 1, "TURMA": 301, "Ano/Série": "3ª série do Ensino Médio" }),
        ]);

        let roster = build_roster(&table).unwrap();
        assert_eq!(roster[0].unit, "12");
        assert_eq!(roster[0].class_name, "301");
    }

    #[test]
    fn test_missing_grade_label_column() {
        let table = RawTable::new(vec!["UNIDADE".into(), "TURMA".into()], vec![]);
        let err = build_roster(&table).unwrap_err();
        assert!(matches!(err, TransformError::MissingField(ref f) if f == "Ano/Série"));
    }
}
