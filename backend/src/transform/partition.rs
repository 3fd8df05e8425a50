//! Split output tables into one partition per organizational unit.

use std::collections::HashSet;

use crate::models::{
    field_text, NormalizedRecord, Partition, RawTable, RosterEntry, ALL_UNITS, COL_UNIT, COL_UNIT_ALT,
};

/// Unit column of the source table, if any.
pub fn unit_column(source: &RawTable) -> Option<&'static str> {
    [COL_UNIT, COL_UNIT_ALT]
        .into_iter()
        .find(|col| source.has_column(col))
}

/// Distinct unit values of the source table, in first-appearance order.
///
/// `[ALL_UNITS]` when the table has no unit column.
pub fn distinct_units(source: &RawTable) -> Vec<String> {
    let Some(column) = unit_column(source) else {
        return vec![ALL_UNITS.to_string()];
    };

    let mut seen = HashSet::new();
    source
        .records
        .iter()
        .map(|row| field_text(row, column))
        .filter(|unit| seen.insert(unit.clone()))
        .collect()
}

/// Partition both tables by unit.
///
/// Units come from the *source* table so that every unit of the export is
/// considered; partitions left without enrollment rows are dropped.
pub fn partition_by_unit(
    source: &RawTable,
    records: &[NormalizedRecord],
    rosters: &[RosterEntry],
) -> Vec<Partition> {
    if unit_column(source).is_none() {
        if records.is_empty() {
            return Vec::new();
        }
        return vec![Partition {
            name: ALL_UNITS.to_string(),
            records: records.to_vec(),
            rosters: rosters.to_vec(),
        }];
    }

    distinct_units(source)
        .into_iter()
        .filter_map(|unit| {
            let unit_records: Vec<NormalizedRecord> =
                records.iter().filter(|r| r.unit == unit).cloned().collect();
            if unit_records.is_empty() {
                return None;
            }
            let unit_rosters = rosters.iter().filter(|r| r.unit == unit).cloned().collect();
            Some(Partition {
                name: unit,
                records: unit_records,
                rosters: unit_rosters,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn record(id: &str, unit: &str) -> NormalizedRecord {
        NormalizedRecord {
            identifier: id.into(),
            full_name: format!("Aluno {}", id),
            email: format!("{}@x.br", id),
            password: "p".into(),
            grade_label: "5º ano do Ensino Fundamental".into(),
            unit: unit.into(),
            class_name: "5A".into(),
        }
    }

    fn roster(unit: &str) -> RosterEntry {
        RosterEntry {
            unit: unit.into(),
            grade_label: "5º ano do Ensino Fundamental".into(),
            class_name: "5A".into(),
        }
    }

    fn source(column: &str, units: &[&str]) -> RawTable {
        let rows: Vec<Value> = units.iter().map(|u| json!({ column: u })).collect();
        RawTable::new(vec![column.to_string()], rows)
    }

    #[test]
    fn test_strict_partition() {
        let src = source("UNIDADE", &["Centro", "Sul", "Centro", "Sul"]);
        let records = vec![record("1", "Centro"), record("2", "Sul"), record("3", "Centro")];
        let rosters = vec![roster("Centro"), roster("Sul")];

        let parts = partition_by_unit(&src, &records, &rosters);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].name, "Centro");
        assert_eq!(parts[1].name, "Sul");

        let mut ids: Vec<String> = parts
            .iter()
            .flat_map(|p| p.records.iter().map(|r| r.identifier.clone()))
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(parts[0].rosters, vec![roster("Centro")]);
        assert_eq!(parts[1].rosters, vec![roster("Sul")]);
    }

    #[test]
    fn test_no_unit_column_gives_single_partition() {
        let src = RawTable::new(vec!["ALUNO".into()], vec![json!({ "ALUNO": 1 })]);
        let records = vec![record("1", ""), record("2", "")];
        let rosters = vec![roster("")];

        let parts = partition_by_unit(&src, &records, &rosters);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Todas");
        assert_eq!(parts[0].records.len(), 2);
        assert_eq!(parts[0].rosters.len(), 1);
    }

    #[test]
    fn test_empty_units_dropped() {
        // "Norte" only had rows removed by the filters
        let src = source("UNIDADE", &["Centro", "Norte"]);
        let parts = partition_by_unit(&src, &[record("1", "Centro")], &[roster("Centro")]);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].name, "Centro");
    }

    #[test]
    fn test_alternative_unit_column() {
        let src = source("Unidade", &["Leste"]);
        assert_eq!(unit_column(&src), Some("Unidade"));
        assert_eq!(distinct_units(&src), vec!["Leste"]);
    }
}
