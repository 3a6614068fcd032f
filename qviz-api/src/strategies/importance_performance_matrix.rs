//! Importance-performance matrix for survey dimensions
//!
//! Crosses performance (mean score) with importance (association with an
//! outcome) and classifies each dimension into one of four action
//! quadrants split at the per-segment medians.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::{Error, Result};

use super::drivers::{driver_rows, CorrMethod, Outcome};
use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `outcome`: `"EPUI"` (default) or `"ENG"`
/// - `method`: `"pearson"` or `"spearman"` (default)
/// - `min_n`: minimum respondents per correlation (default 5)
/// - `segment_field`: one matrix per segment with a dropdown selector
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    outcome: Option<String>,
    method: Option<String>,
    min_n: usize,
    segment_field: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            outcome: None,
            method: None,
            min_n: 5,
            segment_field: None,
        }
    }
}

const QUADRANT_PRIORITIZE: &str = "À prioriser";
const QUADRANT_MAINTAIN: &str = "À maintenir";
const QUADRANT_OVERINVESTED: &str = "Sur-investi";
const QUADRANT_SECONDARY: &str = "Secondaire";

pub struct ImportancePerformanceMatrixStrategy;

impl ChartStrategy for ImportancePerformanceMatrixStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("importance-performance matrix")?;
        ensure_not_empty(survey, "the importance-performance matrix")?;

        if qviz_common::survey::detect_likert_columns(survey).is_empty() {
            return Err(Error::Chart(
                "No Likert columns detected (wide survey format required)".to_string(),
            ));
        }

        let outcome = Outcome::parse(cfg.outcome.as_deref().unwrap_or("EPUI"))?;
        let method = CorrMethod::parse(cfg.method.as_deref().unwrap_or("spearman"))?;

        let rows = driver_rows(
            survey,
            cfg.segment_field.as_deref(),
            outcome,
            method,
            cfg.min_n,
        )?;
        if rows.is_empty() {
            return Err(Error::Chart(
                "No dimension meets the min_n criteria for the matrix".to_string(),
            ));
        }

        // Per-segment median cuts define the quadrants
        let mut per_segment: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for row in &rows {
            let entry = per_segment.entry(row.segment.clone()).or_default();
            entry.0.push(row.mean_score);
            entry.1.push(row.leverage);
        }
        let cuts: BTreeMap<String, (f64, f64)> = per_segment
            .iter()
            .map(|(segment, (means, importances))| {
                (
                    segment.clone(),
                    (
                        stats::median(means).unwrap_or(3.0),
                        stats::median(importances).unwrap_or(0.5),
                    ),
                )
            })
            .collect();

        let values: Vec<Value> = rows
            .iter()
            .map(|row| {
                let (x_cut, y_cut) = cuts[&row.segment];
                let quadrant = match (row.leverage >= y_cut, row.mean_score >= x_cut) {
                    (true, false) => QUADRANT_PRIORITIZE,
                    (true, true) => QUADRANT_MAINTAIN,
                    (false, true) => QUADRANT_OVERINVESTED,
                    (false, false) => QUADRANT_SECONDARY,
                };
                json!({
                    "segment": row.segment,
                    "dimension_prefix": row.prefix,
                    "dimension_label": row.label,
                    "mean_score": row.mean_score,
                    "gap_to_5": row.gap_to_5,
                    "corr_with_outcome": row.corr,
                    "importance": row.leverage,
                    "priority_index": row.priority,
                    "n": row.n,
                    "quadrant": quadrant,
                })
            })
            .collect();

        let cut_values: Vec<Value> = cuts
            .iter()
            .map(|(segment, (x_cut, y_cut))| {
                json!({"segment": segment, "x_cut": x_cut, "y_cut": y_cut})
            })
            .collect();

        // Quadrant captions positioned at the center of each region
        let mut label_values = Vec::new();
        for (segment, (x_cut, y_cut)) in &cuts {
            let left_x = (1.0 + x_cut) / 2.0;
            let right_x = (x_cut + 5.0) / 2.0;
            let bottom_y = y_cut / 2.0;
            let top_y = (y_cut + 1.0) / 2.0;
            for (x, y, label) in [
                (left_x, top_y, QUADRANT_PRIORITIZE),
                (right_x, top_y, QUADRANT_MAINTAIN),
                (right_x, bottom_y, QUADRANT_OVERINVESTED),
                (left_x, bottom_y, QUADRANT_SECONDARY),
            ] {
                label_values.push(json!({"segment": segment, "x": x, "y": y, "label": label}));
            }
        }

        let segments: Vec<&String> = cuts.keys().collect();
        let multi_segment = segments.len() > 1;

        let mut params = Vec::new();
        let segment_filter: Option<Value> = if multi_segment {
            let options: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
            params.push(json!({
                "name": "segment_select",
                "value": options[0],
                "bind": {
                    "input": "select",
                    "options": options,
                    "name": format!("{}: ", cfg.segment_field.as_deref().unwrap_or("Segment"))
                }
            }));
            Some(json!({"filter": "datum.segment == segment_select"}))
        } else {
            None
        };

        let title = match outcome {
            Outcome::Epui => "Matrice importance–performance (impact vs Épuisement)",
            Outcome::Eng => "Matrice importance–performance (impact vs Engagement)",
        };

        let attach_filter = |mut layer: Value| -> Value {
            if let Some(filter) = &segment_filter {
                layer["transform"] = json!([filter]);
            }
            layer
        };

        let points = attach_filter(json!({
            "data": {"values": values},
            "mark": {"type": "circle", "opacity": 0.9},
            "encoding": {
                "x": {
                    "field": "mean_score",
                    "type": "quantitative",
                    "title": "Performance (score moyen 1–5)",
                    "scale": {"domain": [1, 5]}
                },
                "y": {
                    "field": "importance",
                    "type": "quantitative",
                    "title": "Importance (impact)",
                    "scale": {"domain": [0, 1]}
                },
                "size": {
                    "field": "priority_index",
                    "type": "quantitative",
                    "title": "Priorité",
                    "scale": {"range": [60, 1200]}
                },
                "color": {
                    "field": "quadrant",
                    "type": "nominal",
                    "title": "Catégorie",
                    "scale": {
                        "domain": [QUADRANT_PRIORITIZE, QUADRANT_MAINTAIN, QUADRANT_OVERINVESTED, QUADRANT_SECONDARY],
                        "range": ["#DC2626", "#16A34A", "#F59E0B", "#9CA3AF"]
                    }
                },
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal", "title": "Dimension"},
                    {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Score moyen"},
                    {"field": "importance", "type": "quantitative", "format": ".2f", "title": "Importance"},
                    {"field": "corr_with_outcome", "type": "quantitative", "format": ".2f", "title": format!("Corr. avec {}", outcome.prefix())},
                    {"field": "priority_index", "type": "quantitative", "format": ".3f", "title": "Priorité"},
                    {"field": "n", "type": "quantitative", "title": "N"},
                    {"field": "segment", "type": "nominal"}
                ]
            }
        }));

        let dim_labels = attach_filter(json!({
            "data": {"values": values},
            "mark": {"type": "text", "dx": 8, "dy": -8, "fontSize": 11, "color": "#111827"},
            "encoding": {
                "x": {"field": "mean_score", "type": "quantitative"},
                "y": {"field": "importance", "type": "quantitative"},
                "text": {"field": "dimension_prefix", "type": "nominal"}
            }
        }));

        let v_rule = attach_filter(json!({
            "data": {"values": cut_values},
            "mark": {"type": "rule", "color": "#111827", "strokeDash": [4, 4]},
            "encoding": {"x": {"field": "x_cut", "type": "quantitative"}}
        }));
        let h_rule = attach_filter(json!({
            "data": {"values": cut_values},
            "mark": {"type": "rule", "color": "#111827", "strokeDash": [4, 4]},
            "encoding": {"y": {"field": "y_cut", "type": "quantitative"}}
        }));

        let quadrant_text = attach_filter(json!({
            "data": {"values": label_values},
            "mark": {"type": "text", "opacity": 0.35, "fontSize": 16, "fontWeight": "bold"},
            "encoding": {
                "x": {"field": "x", "type": "quantitative"},
                "y": {"field": "y", "type": "quantitative"},
                "text": {"field": "label", "type": "nominal"}
            }
        }));

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "title": title,
            "params": params,
            "layer": [points, dim_labels, v_rule, h_rule, quadrant_text],
        }))
    }
}
