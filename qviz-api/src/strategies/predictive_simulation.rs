//! Regression-based driver weights for a target outcome
//!
//! Fits an ordinary least squares model of the outcome dimension on all
//! other practice dimensions and visualizes the coefficients as impact
//! weights. A collinear system is a domain error, never a silent fallback.

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::metrics::dimension_scores;
use qviz_common::stats;
use qviz_common::survey::prefix_label;
use qviz_common::{Error, Result};

use super::{cmp_f64, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `target`: outcome dimension prefix (default `ENG`, falling back to
///   `EPUI` when unavailable)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    target: Option<String>,
}

/// Outcome dimensions never used as predictors of another outcome
const KNOWN_OUTCOMES: &[&str] = &["ENG", "EPUI", "CSE"];

const MIN_COMPLETE_ROWS: usize = 10;

pub struct PredictiveSimulationStrategy;

impl ChartStrategy for PredictiveSimulationStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("predictive simulation")?;

        let scores = dimension_scores(survey)?;

        let requested = cfg
            .target
            .map(|t| t.trim().to_uppercase())
            .unwrap_or_else(|| "ENG".to_string());
        let target = if scores.prefix_index(&requested).is_some() {
            requested
        } else if scores.prefix_index("ENG").is_some() {
            "ENG".to_string()
        } else if scores.prefix_index("EPUI").is_some() {
            "EPUI".to_string()
        } else {
            return Err(Error::Chart(format!(
                "Target '{}' not found in scores and no fallback available",
                requested
            )));
        };
        let target_idx = scores.prefix_index(&target).unwrap();

        let feature_prefixes: Vec<(usize, String)> = scores
            .prefixes()
            .iter()
            .enumerate()
            .filter(|(idx, prefix)| {
                *idx != target_idx && !KNOWN_OUTCOMES.contains(&prefix.as_str())
            })
            .map(|(idx, prefix)| (idx, prefix.clone()))
            .collect();
        if feature_prefixes.is_empty() {
            return Err(Error::Chart("No feature dimensions available for prediction".to_string()));
        }

        // Complete rows across the target and every feature
        let mut features = Vec::new();
        let mut y = Vec::new();
        for row in 0..scores.row_count() {
            let Some(target_score) = scores.score(row, target_idx) else {
                continue;
            };
            let row_features: Option<Vec<f64>> = feature_prefixes
                .iter()
                .map(|(idx, _)| scores.score(row, *idx))
                .collect();
            if let Some(row_features) = row_features {
                features.push(row_features);
                y.push(target_score);
            }
        }

        if features.len() < MIN_COMPLETE_ROWS {
            return Err(Error::Chart(format!(
                "Not enough complete responses for regression (min {})",
                MIN_COMPLETE_ROWS
            )));
        }

        let coeffs = stats::ols(&features, &y).map_err(Error::Chart)?;

        let mut results: Vec<(String, f64)> = feature_prefixes
            .iter()
            .zip(coeffs.iter().skip(1)) // first coefficient is the intercept
            .map(|((_, prefix), coeff)| (prefix.clone(), *coeff))
            .collect();
        results.sort_by(|a, b| cmp_f64(b.1, a.1));

        let values: Vec<Value> = results
            .iter()
            .map(|(prefix, impact)| {
                json!({
                    "dimension": prefix,
                    "label": prefix_label(prefix),
                    "impact": impact,
                    "sign": if *impact > 0.0 { "Positif" } else { "Négatif" },
                })
            })
            .collect();

        let target_label = prefix_label(&target);
        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "title": format!("Drivers de : {}", target_label),
            "data": {"values": values},
            "mark": "bar",
            "encoding": {
                "x": {
                    "field": "impact",
                    "type": "quantitative",
                    "title": format!("Impact estimé sur {} (Coeff)", target_label)
                },
                "y": {
                    "field": "label",
                    "type": "nominal",
                    "sort": "-x",
                    "title": "Levier (Pratique)",
                    "axis": {"labelLimit": 200}
                },
                "color": {
                    "field": "sign",
                    "type": "nominal",
                    "title": "Effet",
                    "scale": {"domain": ["Positif", "Négatif"], "range": ["#10b981", "#ef4444"]}
                },
                "tooltip": [
                    {"field": "label", "type": "nominal", "title": "Dimension"},
                    {"field": "impact", "type": "quantitative", "format": ".3f", "title": "Impact"}
                ]
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    #[test]
    fn recovers_the_driving_dimension() {
        // ENG = COM (slope 1), RECO is noise-free but irrelevant
        let rows = (0..20)
            .map(|i| {
                let com = 1.0 + (i % 5) as f64;
                let reco = 1.0 + ((i / 5) % 4) as f64;
                vec![Cell::Number(com), Cell::Number(reco), Cell::Number(com)]
            })
            .collect();
        let ds = Dataset::new("survey", vec!["COM1".into(), "RECO1".into(), "ENG1".into()], rows);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = PredictiveSimulationStrategy.generate(&data, &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let com = values.iter().find(|v| v["dimension"] == "COM").unwrap();
        let reco = values.iter().find(|v| v["dimension"] == "RECO").unwrap();
        assert!((com["impact"].as_f64().unwrap() - 1.0).abs() < 1e-6);
        assert!(reco["impact"].as_f64().unwrap().abs() < 1e-6);
    }

    #[test]
    fn too_few_rows_is_a_chart_error() {
        let rows = (0..5)
            .map(|i| vec![Cell::Number(1.0 + (i % 5) as f64), Cell::Number(3.0)])
            .collect();
        let ds = Dataset::new("survey", vec!["COM1".into(), "ENG1".into()], rows);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        assert!(PredictiveSimulationStrategy.generate(&data, &JsonMap::new()).is_err());
    }
}
