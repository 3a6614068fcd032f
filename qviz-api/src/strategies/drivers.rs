//! Shared leverage computation for the prioritization charts
//!
//! `action_priority_index`, `leverage_scatter` and
//! `importance_performance_matrix` all rank dimensions by the same logic:
//! correlate each dimension's per-respondent score with an outcome
//! dimension, keep only the actionable direction of the association, and
//! weight it by the room left to improve.

use std::collections::BTreeMap;

use qviz_common::metrics::dimension_scores;
use qviz_common::stats;
use qviz_common::survey::prefix_label;
use qviz_common::{Dataset, Error, Result};

/// Outcome dimension a driver analysis targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Emotional exhaustion: protective levers have negative correlation
    Epui,
    /// Work engagement: promoting levers have positive correlation
    Eng,
}

impl Outcome {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_uppercase().as_str() {
            "EPUI" => Ok(Outcome::Epui),
            "ENG" => Ok(Outcome::Eng),
            _ => Err(Error::Chart("outcome must be 'EPUI' or 'ENG'".to_string())),
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            Outcome::Epui => "EPUI",
            Outcome::Eng => "ENG",
        }
    }

    /// Directional leverage: only the actionable sign of the correlation
    pub fn leverage(&self, corr: f64) -> f64 {
        match self {
            Outcome::Epui => (-corr).max(0.0),
            Outcome::Eng => corr.max(0.0),
        }
    }
}

/// Correlation estimator used for the leverage proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrMethod {
    Pearson,
    Spearman,
}

impl CorrMethod {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "pearson" => Ok(CorrMethod::Pearson),
            "spearman" => Ok(CorrMethod::Spearman),
            _ => Err(Error::Chart("method must be 'pearson' or 'spearman'".to_string())),
        }
    }

    pub fn corr(&self, x: &[f64], y: &[f64]) -> Option<f64> {
        match self {
            CorrMethod::Pearson => stats::pearson(x, y),
            CorrMethod::Spearman => stats::spearman(x, y),
        }
    }
}

/// One (segment, dimension) driver result
#[derive(Debug, Clone)]
pub struct DriverRow {
    pub segment: String,
    pub prefix: String,
    pub label: String,
    pub mean_score: f64,
    pub gap_to_5: f64,
    pub corr: f64,
    pub leverage: f64,
    pub priority: f64,
    pub n: usize,
}

/// Compute driver rows per segment (or a single "Organisation" segment).
///
/// Cells with fewer than `min_n` pairwise-complete respondents are dropped;
/// an unavailable outcome dimension or an overall respondent count below
/// `min_n` is a chart error.
pub fn driver_rows(
    dataset: &Dataset,
    segment_field: Option<&str>,
    outcome: Outcome,
    method: CorrMethod,
    min_n: usize,
) -> Result<Vec<DriverRow>> {
    let scores = dimension_scores(dataset)?;
    let outcome_idx = scores.prefix_index(outcome.prefix()).ok_or_else(|| {
        Error::Chart(format!(
            "Outcome '{}' not available (no items with that prefix)",
            outcome.prefix()
        ))
    })?;

    let seg_idx = match segment_field {
        Some(field) => Some(dataset.column_index(field).ok_or_else(|| {
            Error::Chart(format!("segment_field '{}' not found in dataset", field))
        })?),
        None => None,
    };

    // Respondents with an outcome score and a usable segment value
    let mut segments: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for row in 0..scores.row_count() {
        if scores.score(row, outcome_idx).is_none() {
            continue;
        }
        let segment = match seg_idx {
            Some(idx) => {
                let display = dataset.cell(row, idx).display();
                if display.trim().is_empty() {
                    continue;
                }
                display
            }
            None => "Organisation".to_string(),
        };
        segments.entry(segment).or_default().push(row);
    }

    let total: usize = segments.values().map(Vec::len).sum();
    if total < min_n {
        return Err(Error::Chart(
            "Not enough respondents to compute robust priorities".to_string(),
        ));
    }

    let mut rows = Vec::new();
    for (segment, members) in &segments {
        if members.len() < min_n {
            continue;
        }
        for (dim_idx, prefix) in scores.prefixes().iter().enumerate() {
            if dim_idx == outcome_idx {
                continue;
            }
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for &row in members {
                if let (Some(x), Some(y)) =
                    (scores.score(row, dim_idx), scores.score(row, outcome_idx))
                {
                    xs.push(x);
                    ys.push(y);
                }
            }
            if xs.len() < min_n {
                continue;
            }
            let Some(corr) = method.corr(&xs, &ys) else {
                continue;
            };
            let mean_score = xs.iter().sum::<f64>() / xs.len() as f64;
            let gap_to_5 = 5.0 - mean_score;
            let leverage = outcome.leverage(corr);
            rows.push(DriverRow {
                segment: segment.clone(),
                prefix: prefix.clone(),
                label: prefix_label(prefix).to_string(),
                mean_score,
                gap_to_5,
                corr,
                leverage,
                priority: gap_to_5 * leverage,
                n: xs.len(),
            });
        }
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::Cell;

    /// Survey where COM strongly protects against EPUI and RECO does not
    fn synthetic_survey(n: usize) -> Dataset {
        let columns = vec!["ID".to_string(), "COM1".to_string(), "RECO1".to_string(), "EPUI1".to_string()];
        let rows = (0..n)
            .map(|i| {
                let com = 1.0 + (i % 5) as f64; // 1..5
                let epui = 6.0 - com; // perfectly inverse
                let reco = 3.0 + ((i % 2) as f64) * 0.001; // ~constant, tiny jitter
                vec![
                    Cell::Number(i as f64),
                    Cell::Number(com),
                    Cell::Number(reco),
                    Cell::Number(epui.clamp(1.0, 5.0)),
                ]
            })
            .collect();
        Dataset::new("survey", columns, rows)
    }

    #[test]
    fn leverage_keeps_only_the_actionable_direction() {
        assert_eq!(Outcome::Epui.leverage(-0.8), 0.8);
        assert_eq!(Outcome::Epui.leverage(0.8), 0.0);
        assert_eq!(Outcome::Eng.leverage(0.6), 0.6);
        assert_eq!(Outcome::Eng.leverage(-0.6), 0.0);
    }

    #[test]
    fn driver_rows_rank_the_protective_dimension_first() {
        let ds = synthetic_survey(40);
        let rows = driver_rows(&ds, None, Outcome::Epui, CorrMethod::Pearson, 30).unwrap();
        let com = rows.iter().find(|r| r.prefix == "COM").unwrap();
        let reco = rows.iter().find(|r| r.prefix == "RECO").unwrap();
        assert!(com.priority > reco.priority);
        assert!(com.leverage > 0.9);
    }

    #[test]
    fn too_few_respondents_is_a_chart_error() {
        let ds = synthetic_survey(10);
        assert!(driver_rows(&ds, None, Outcome::Epui, CorrMethod::Spearman, 30).is_err());
    }
}
