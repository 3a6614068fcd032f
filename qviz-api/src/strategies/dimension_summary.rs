//! Average score per QVT practice dimension, optionally segmented

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::prefix_label;
use qviz_common::{Error, Result};

use super::{melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `segment_field`: demographic column used to split the bars
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    segment_field: Option<String>,
}

pub struct DimensionSummaryStrategy;

impl ChartStrategy for DimensionSummaryStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("practice summary")?;
        let long = melt_survey(survey, "practice summary", &[])?;

        if let Some(segment) = &cfg.segment_field {
            if !long.has_column(segment) {
                return Err(Error::Chart(format!(
                    "Segment field '{}' not found in dataset",
                    segment
                )));
            }
        }

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

        let values: Vec<Value> = groups
            .iter()
            .map(|((label, segment), responses)| {
                json!({
                    "dimension_label": label,
                    "segment": if segment.is_empty() { Value::Null } else { Value::String(segment.clone()) },
                    "mean_score": stats::mean(responses),
                    "responses": responses.len(),
                })
            })
            .collect();

        if values.is_empty() {
            return Err(Error::Chart("No usable Likert responses for practice summary".to_string()));
        }

        let color: Value = if cfg.segment_field.is_some() {
            json!({"field": "segment", "type": "nominal", "title": cfg.segment_field})
        } else {
            json!({"field": "mean_score", "type": "quantitative", "scale": {"scheme": "blues"}, "legend": null})
        };

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": "bar",
            "height": {"step": 22},
            "padding": {"left": 120},
            "encoding": {
                "y": {
                    "field": "dimension_label",
                    "type": "nominal",
                    "sort": "-x",
                    "title": "Dimension QVT",
                    "axis": {"labelLimit": 260, "labelPadding": 8}
                },
                "x": {
                    "field": "mean_score",
                    "type": "quantitative",
                    "title": "Score moyen (1-5)",
                    "scale": {"domain": [0, 5]}
                },
                "color": color,
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal"},
                    {"field": "segment", "type": "nominal"},
                    {"field": "mean_score", "type": "quantitative", "format": ".2f"},
                    {"field": "responses", "type": "quantitative"}
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

    fn survey() -> ChartData {
        let ds = Dataset::new(
            "survey",
            vec!["ID".into(), "Sexe".into(), "PGC1".into(), "COM1".into()],
            vec![
                vec![Cell::Number(1.0), Cell::Text("Homme".into()), Cell::Number(4.0), Cell::Number(2.0)],
                vec![Cell::Number(2.0), Cell::Text("Femme".into()), Cell::Number(2.0), Cell::Number(4.0)],
            ],
        );
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn aggregates_mean_per_dimension() {
        let spec = DimensionSummaryStrategy.generate(&survey(), &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        let pgc = values
            .iter()
            .find(|v| v["dimension_label"] == "Pratiques de gestion de carrière")
            .unwrap();
        assert!((pgc["mean_score"].as_f64().unwrap() - 3.0).abs() < 1e-9);
        assert_eq!(pgc["responses"], 2);
    }

    #[test]
    fn segmentation_splits_the_groups() {
        let config: JsonMap = serde_json::from_str(r#"{"segment_field": "Sexe"}"#).unwrap();
        let spec = DimensionSummaryStrategy.generate(&survey(), &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 4); // 2 dimensions x 2 segments
    }

    #[test]
    fn unknown_segment_field_fails() {
        let config: JsonMap = serde_json::from_str(r#"{"segment_field": "Service"}"#).unwrap();
        assert!(DimensionSummaryStrategy.generate(&survey(), &config).is_err());
    }
}
