//! Per-respondent dimension scores
//!
//! A respondent's score on a dimension is the mean of their responses to
//! the items sharing that dimension's prefix, missing or non-numeric
//! responses excluded from the mean (never treated as zero).

use crate::dataset::Dataset;
use crate::error::{Error, Result};
use crate::survey::likert_prefix;

/// Wide-format Likert columns grouped by dimension prefix, in the prefix
/// table's declaration order; empty groups are dropped.
pub fn likert_columns_by_prefix(dataset: &Dataset) -> Vec<(String, Vec<String>)> {
    let mut groups: Vec<(String, Vec<String>)> = Vec::new();
    for column in dataset.columns() {
        let Some(prefix) = likert_prefix(column) else {
            continue;
        };
        match groups.iter_mut().find(|(p, _)| p == prefix) {
            Some((_, cols)) => cols.push(column.clone()),
            None => groups.push((prefix.to_string(), vec![column.clone()])),
        }
    }
    groups
}

/// Per-respondent mean score per dimension prefix, row-aligned with the
/// source dataset
#[derive(Debug, Clone)]
pub struct DimensionScores {
    prefixes: Vec<String>,
    rows: Vec<Vec<Option<f64>>>,
}

impl DimensionScores {
    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn score(&self, row: usize, prefix_idx: usize) -> Option<f64> {
        self.rows[row][prefix_idx]
    }

    pub fn prefix_index(&self, prefix: &str) -> Option<usize> {
        self.prefixes.iter().position(|p| p == prefix)
    }

    /// All scores of one dimension, row-aligned
    pub fn column(&self, prefix: &str) -> Option<Vec<Option<f64>>> {
        let idx = self.prefix_index(prefix)?;
        Some(self.rows.iter().map(|r| r[idx]).collect())
    }

    /// Row indexes where every dimension has a score
    pub fn complete_rows(&self) -> Vec<usize> {
        (0..self.rows.len())
            .filter(|&i| self.rows[i].iter().all(Option::is_some))
            .collect()
    }
}

/// Compute dimension scores for every respondent.
///
/// Fails when the dataset carries no recognizable Likert item columns.
pub fn dimension_scores(dataset: &Dataset) -> Result<DimensionScores> {
    let groups = likert_columns_by_prefix(dataset);
    if groups.is_empty() {
        return Err(Error::Chart(
            "No Likert columns found to compute dimension scores".to_string(),
        ));
    }

    let indexed: Vec<(String, Vec<usize>)> = groups
        .into_iter()
        .map(|(prefix, cols)| {
            let idxs = cols
                .iter()
                .filter_map(|c| dataset.column_index(c))
                .collect();
            (prefix, idxs)
        })
        .collect();

    let mut rows = Vec::with_capacity(dataset.row_count());
    for row in dataset.rows() {
        let scores = indexed
            .iter()
            .map(|(_, idxs)| {
                let values: Vec<f64> = idxs.iter().filter_map(|&i| row[i].as_number()).collect();
                if values.is_empty() {
                    None
                } else {
                    Some(values.iter().sum::<f64>() / values.len() as f64)
                }
            })
            .collect();
        rows.push(scores);
    }

    Ok(DimensionScores {
        prefixes: indexed.into_iter().map(|(p, _)| p).collect(),
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Cell;

    fn ds(columns: &[&str], rows: Vec<Vec<Cell>>) -> Dataset {
        Dataset::new("survey", columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn groups_columns_by_prefix() {
        let table = ds(&["ID", "PGC1", "PGC2", "EPUI1"], vec![]);
        let groups = likert_columns_by_prefix(&table);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "PGC");
        assert_eq!(groups[0].1, vec!["PGC1", "PGC2"]);
        assert_eq!(groups[1].0, "EPUI");
    }

    #[test]
    fn missing_values_are_excluded_from_the_mean() {
        let table = ds(
            &["PGC1", "PGC2"],
            vec![
                vec![Cell::Number(2.0), Cell::Number(4.0)],
                vec![Cell::Number(5.0), Cell::Empty],
                vec![Cell::Empty, Cell::Text("n/a".into())],
            ],
        );
        let scores = dimension_scores(&table).unwrap();
        assert_eq!(scores.prefixes(), &["PGC".to_string()]);
        assert_eq!(scores.score(0, 0), Some(3.0));
        assert_eq!(scores.score(1, 0), Some(5.0)); // not averaged with zero
        assert_eq!(scores.score(2, 0), None);
        assert_eq!(scores.complete_rows(), vec![0, 1]);
    }

    #[test]
    fn fails_without_likert_columns() {
        let table = ds(&["ID", "Sexe"], vec![]);
        assert!(dimension_scores(&table).is_err());
    }
}
