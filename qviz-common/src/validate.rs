//! Schema validators: required columns and Likert value ranges
//!
//! All functions here are pure checks returning issue lists; callers decide
//! whether a non-empty list is a domain error.

use crate::dataset::Dataset;

/// Required columns for the HR dataset role
pub const HR_REQUIRED_COLUMNS: &[&str] = &["ID", "Sexe", "Age"];

/// Required columns for the survey dataset role
pub const SURVEY_REQUIRED_COLUMNS: &[&str] = &["ID"];

/// Inclusive bounds of the Likert response scale
pub const LIKERT_MIN: f64 = 1.0;
pub const LIKERT_MAX: f64 = 5.0;

fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Names from `required` that have no match in the dataset, compared after
/// trimming and uppercasing both sides. The returned names keep their
/// required-set spelling and are sorted for deterministic output.
pub fn missing_columns(dataset: &Dataset, required: &[&str]) -> Vec<String> {
    let present: Vec<String> = dataset.columns().iter().map(|c| normalize(c)).collect();
    let mut missing: Vec<String> = required
        .iter()
        .filter(|r| !present.contains(&normalize(r)))
        .map(|r| r.to_string())
        .collect();
    missing.sort();
    missing
}

/// Range check for Likert columns.
///
/// Values are coerced to numbers; non-numeric cells are ignored. Columns
/// with any coerced value outside `[1, 5]` produce a
/// `"<column> out of range 1-5 in <n> rows"` message; columns absent from
/// the dataset are reported by name.
pub fn check_likert_range(dataset: &Dataset, columns: &[String]) -> Vec<String> {
    let mut issues = Vec::new();
    for column in columns {
        let Some(values) = dataset.numeric_column(column) else {
            issues.push(column.clone());
            continue;
        };
        let out_of_range = values
            .iter()
            .filter(|v| matches!(v, Some(n) if *n < LIKERT_MIN || *n > LIKERT_MAX))
            .count();
        if out_of_range > 0 {
            issues.push(format!("{} out of range 1-5 in {} rows", column, out_of_range));
        }
    }
    issues
}

/// Report requested columns that are absent or contain no numeric values
pub fn ensure_numeric(dataset: &Dataset, columns: &[String]) -> Vec<String> {
    let mut issues = Vec::new();
    for column in columns {
        let Some(values) = dataset.numeric_column(column) else {
            issues.push(column.clone());
            continue;
        };
        if values.iter().all(Option::is_none) {
            issues.push(format!("{} not numeric", column));
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;

    fn dataset(columns: &[&str], rows: Vec<Vec<Cell>>) -> Dataset {
        Dataset::new("test", columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn missing_columns_is_case_and_whitespace_insensitive() {
        let ds = dataset(&[" id ", "SEXE", "age"], vec![]);
        assert!(missing_columns(&ds, &["ID", "Sexe", "Age"]).is_empty());

        let ds = dataset(&["ID", "Sexe"], vec![]);
        assert_eq!(missing_columns(&ds, &["ID", "Sexe", "Age"]), vec!["Age"]);
    }

    #[test]
    fn missing_columns_output_is_sorted() {
        let ds = dataset(&["ID"], vec![]);
        assert_eq!(
            missing_columns(&ds, &["Sexe", "Age"]),
            vec!["Age", "Sexe"]
        );
    }

    #[test]
    fn likert_range_counts_offending_rows_exactly() {
        let ds = dataset(
            &["PGC1", "PGC2"],
            vec![
                vec![Cell::Number(1.0), Cell::Number(6.0)],
                vec![Cell::Number(5.0), Cell::Number(0.0)],
                vec![Cell::Text("n/a".into()), Cell::Number(3.0)],
            ],
        );
        let issues = check_likert_range(&ds, &["PGC1".into(), "PGC2".into()]);
        // PGC1 fully in range (non-numeric ignored), PGC2 out of range twice
        assert_eq!(issues, vec!["PGC2 out of range 1-5 in 2 rows"]);
    }

    #[test]
    fn likert_range_reports_absent_columns_by_name() {
        let ds = dataset(&["PGC1"], vec![vec![Cell::Number(2.0)]]);
        let issues = check_likert_range(&ds, &["response_value".into()]);
        assert_eq!(issues, vec!["response_value"]);
    }

    #[test]
    fn ensure_numeric_flags_text_columns() {
        let ds = dataset(
            &["Age", "Commentaire"],
            vec![vec![Cell::Number(30.0), Cell::Text("ok".into())]],
        );
        let issues = ensure_numeric(&ds, &["Age".into(), "Commentaire".into(), "Inconnu".into()]);
        assert_eq!(issues, vec!["Commentaire not numeric", "Inconnu"]);
    }
}
