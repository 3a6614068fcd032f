//! Bubble scatter per dimension: mean score versus dispersion
//!
//! High standard deviation at a middling mean flags a polarized dimension
//! that an average alone would hide.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::{prefix_label, recode_demographics};
use qviz_common::{Error, Result};

use super::{ensure_not_empty, melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `likert_domain`: X axis bounds (default `[1, 5]`)
/// - `min_responses`: minimum responses per dimension (default 5)
/// - `max_size`: largest bubble size (default 800)
/// - `color_scheme`: Vega scheme when unsegmented (default `"blues"`)
/// - `show_labels`: draw dimension labels next to the bubbles (default false)
/// - `segment_field`: optional segmentation column
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    likert_domain: Vec<f64>,
    min_responses: usize,
    max_size: u32,
    color_scheme: String,
    show_labels: bool,
    segment_field: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            likert_domain: vec![1.0, 5.0],
            min_responses: 5,
            max_size: 800,
            color_scheme: "blues".to_string(),
            show_labels: false,
            segment_field: None,
        }
    }
}

pub struct DimensionMeanStdScatterStrategy;

impl ChartStrategy for DimensionMeanStdScatterStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = recode_demographics(data.survey_for("dimension mean/std scatter")?);
        ensure_not_empty(&survey, "the mean/std scatter")?;

        if let Some(segment) = &cfg.segment_field {
            if !survey.has_column(segment) {
                return Err(Error::Chart(format!(
                    "Segment field '{}' not found in dataset",
                    segment
                )));
            }
        }

        let extra: Vec<String> = cfg.segment_field.iter().cloned().collect();
        let long = melt_survey(&survey, "dimension mean/std scatter", &extra)?;

        let prefix_idx = long.column_index("dimension_prefix").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();
        let seg_idx = cfg.segment_field.as_deref().and_then(|s| long.column_index(s));

        let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            let Some(value) = row[resp_idx].as_number() else {
                continue;
            };
            let label = prefix_label(&row[prefix_idx].display()).to_string();
            let segment = seg_idx.map(|i| row[i].display()).unwrap_or_default();
            groups.entry((label, segment)).or_default().push(value);
        }

        let mut values = Vec::new();
        for ((label, segment), responses) in &groups {
            if responses.len() < cfg.min_responses {
                continue;
            }
            let (Some(mean), Some(std)) = (stats::mean(responses), stats::sample_std(responses))
            else {
                continue;
            };
            values.push(json!({
                "dimension_label": label,
                "segment": if segment.is_empty() { Value::Null } else { Value::String(segment.clone()) },
                "mean_score": mean,
                "std_dev": std,
                "responses": responses.len(),
            }));
        }

        if values.is_empty() {
            return Err(Error::Chart(
                "No dimension reaches the minimum response threshold".to_string(),
            ));
        }

        let color: Value = if cfg.segment_field.is_some() {
            json!({"field": "segment", "type": "nominal", "title": cfg.segment_field})
        } else {
            json!({
                "field": "mean_score",
                "type": "quantitative",
                "title": "Score moyen",
                "scale": {"scheme": cfg.color_scheme}
            })
        };

        let points = json!({
            "mark": {"type": "circle", "opacity": 0.8},
            "encoding": {
                "x": {
                    "field": "mean_score",
                    "type": "quantitative",
                    "title": "Score moyen (1-5)",
                    "scale": {"domain": cfg.likert_domain}
                },
                "y": {
                    "field": "std_dev",
                    "type": "quantitative",
                    "title": "Écart-type (dispersion)",
                    "scale": {"zero": true}
                },
                "size": {
                    "field": "responses",
                    "type": "quantitative",
                    "title": "Effectif",
                    "scale": {"range": [50, cfg.max_size]}
                },
                "color": color,
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal"},
                    {"field": "segment", "type": "nominal"},
                    {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Moyenne"},
                    {"field": "std_dev", "type": "quantitative", "format": ".2f", "title": "Écart-type"},
                    {"field": "responses", "type": "quantitative", "title": "Réponses"}
                ]
            }
        });

        let mut layers = vec![points];
        if cfg.show_labels {
            layers.push(json!({
                "mark": {"type": "text", "dx": 8, "dy": -8, "fontSize": 11, "color": "#111827"},
                "encoding": {
                    "x": {"field": "mean_score", "type": "quantitative"},
                    "y": {"field": "std_dev", "type": "quantitative"},
                    "text": {"field": "dimension_label", "type": "nominal"}
                }
            }));
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "layer": layers,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    #[test]
    fn dispersion_is_sample_std() {
        let rows = (0..6)
            .map(|i| vec![Cell::Number(if i % 2 == 0 { 1.0 } else { 5.0 })])
            .collect();
        let ds = Dataset::new("survey", vec!["COM1".into()], rows);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = DimensionMeanStdScatterStrategy
            .generate(&data, &JsonMap::new())
            .unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        assert!((values[0]["mean_score"].as_f64().unwrap() - 3.0).abs() < 1e-9);
        assert!(values[0]["std_dev"].as_f64().unwrap() > 2.0);
    }
}
