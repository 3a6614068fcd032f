//! High-level QVT overview: mean score per dimension plus a decision status

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::prefix_label;
use qviz_common::{Error, Result};

use super::{melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `warn_threshold`: below this mean → "Alerte" (default 2.5)
/// - `good_threshold`: at or above → "Point fort" (default 3.5)
/// - `min_responses`: minimum responses per dimension (default 10)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    warn_threshold: f64,
    good_threshold: f64,
    min_responses: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            warn_threshold: 2.5,
            good_threshold: 3.5,
            min_responses: 10,
        }
    }
}

pub struct ExampleNewChartStrategy;

impl ChartStrategy for ExampleNewChartStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("the QVT overview")?;
        let long = melt_survey(survey, "the QVT overview", &[])?;

        let prefix_idx = long.column_index("dimension_prefix").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();

        let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            if let Some(value) = row[resp_idx].as_number() {
                groups.entry(row[prefix_idx].display()).or_default().push(value);
            }
        }

        let mut rows: Vec<(String, f64, f64, usize)> = groups
            .iter()
            .filter(|(_, responses)| responses.len() >= cfg.min_responses)
            .filter_map(|(prefix, responses)| {
                let mean = stats::mean(responses)?;
                let std = stats::sample_std(responses).unwrap_or(0.0);
                Some((prefix.clone(), mean, std, responses.len()))
            })
            .collect();

        if rows.is_empty() {
            return Err(Error::Chart(
                "Not enough responses per dimension to build a stable overview".to_string(),
            ));
        }

        // Worst first, so decision-makers see problems immediately
        rows.sort_by(|a, b| super::cmp_f64(a.1, b.1));

        let values: Vec<Value> = rows
            .iter()
            .map(|(prefix, mean, std, n)| {
                let status = if *mean < cfg.warn_threshold {
                    "Alerte"
                } else if *mean >= cfg.good_threshold {
                    "Point fort"
                } else {
                    "Vigilance"
                };
                json!({
                    "dimension_label": prefix_label(prefix),
                    "mean_score": mean,
                    "std_dev": std,
                    "responses": n,
                    "status": status,
                })
            })
            .collect();

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "height": {"step": 22},
            "padding": {"left": 120},
            "layer": [
                {
                    "data": {"values": values},
                    "mark": "bar",
                    "encoding": {
                        "y": {
                            "field": "dimension_label",
                            "type": "nominal",
                            "sort": null,
                            "title": "Dimension QVT",
                            "axis": {"labelLimit": 260, "labelPadding": 8}
                        },
                        "x": {
                            "field": "mean_score",
                            "type": "quantitative",
                            "title": "Score moyen (1-5)",
                            "scale": {"domain": [0, 5]}
                        },
                        "color": {
                            "field": "status",
                            "type": "nominal",
                            "title": "Statut",
                            "scale": {
                                "domain": ["Alerte", "Vigilance", "Point fort"],
                                "range": ["#ef4444", "#f59e0b", "#10b981"]
                            }
                        },
                        "tooltip": [
                            {"field": "dimension_label", "type": "nominal"},
                            {"field": "status", "type": "nominal"},
                            {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Moyenne"},
                            {"field": "std_dev", "type": "quantitative", "format": ".2f", "title": "Écart-type"},
                            {"field": "responses", "type": "quantitative", "title": "Réponses"}
                        ]
                    }
                },
                {
                    "data": {"values": [{"x": cfg.warn_threshold}]},
                    "mark": {"type": "rule", "color": "#ef4444", "strokeDash": [4, 4]},
                    "encoding": {"x": {"field": "x", "type": "quantitative"}}
                },
                {
                    "data": {"values": [{"x": cfg.good_threshold}]},
                    "mark": {"type": "rule", "color": "#10b981", "strokeDash": [4, 4]},
                    "encoding": {"x": {"field": "x", "type": "quantitative"}}
                }
            ]
        }))
    }
}
