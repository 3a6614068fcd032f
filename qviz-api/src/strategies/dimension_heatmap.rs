//! Heatmap of mean (or median) dimension scores per group

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::{available_demographics, prefix_label};
use qviz_common::{Error, Result};

use super::{ensure_not_empty, melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `group_field`: segmentation column (default: first available demographic)
/// - `stat`: `"mean"` (default) or `"median"`
/// - `likert_domain`: color scale bounds (default `[1, 5]`)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    group_field: Option<String>,
    stat: String,
    likert_domain: Vec<f64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            group_field: None,
            stat: "mean".to_string(),
            likert_domain: vec![1.0, 5.0],
        }
    }
}

pub struct DimensionHeatmapStrategy;

impl ChartStrategy for DimensionHeatmapStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("dimension heatmap")?;
        ensure_not_empty(survey, "the dimension heatmap")?;

        if cfg.stat != "mean" && cfg.stat != "median" {
            return Err(Error::Chart("stat must be 'mean' or 'median'".to_string()));
        }

        let long = melt_survey(survey, "dimension heatmap", &[])?;

        let group_field = match cfg.group_field {
            Some(field) => field,
            None => available_demographics(&long)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::Chart("No segmentation field available for the heatmap".to_string())
                })?,
        };
        let Some(group_idx) = long.column_index(&group_field) else {
            return Err(Error::Chart(format!(
                "Segment field '{}' not found in dataset",
                group_field
            )));
        };

        let prefix_idx = long.column_index("dimension_prefix").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();

        let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            let Some(value) = row[resp_idx].as_number() else {
                continue;
            };
            let group = row[group_idx].display();
            if group.trim().is_empty() {
                continue;
            }
            let label = prefix_label(&row[prefix_idx].display()).to_string();
            groups.entry((label, group)).or_default().push(value);
        }

        let values: Vec<Value> = groups
            .iter()
            .filter_map(|((label, group), responses)| {
                let score = match cfg.stat.as_str() {
                    "median" => stats::median(responses),
                    _ => stats::mean(responses),
                }?;
                Some(json!({
                    "dimension_label": label,
                    "group": group,
                    "score": score,
                }))
            })
            .collect();

        if values.is_empty() {
            return Err(Error::Chart("No aggregated data available for the heatmap".to_string()));
        }

        let score_title = format!("Score ({})", cfg.stat);
        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": "rect",
            "encoding": {
                "x": {"field": "group", "type": "nominal", "title": group_field},
                "y": {"field": "dimension_label", "type": "nominal", "sort": "-x", "title": "Dimension QVT"},
                "color": {
                    "field": "score",
                    "type": "quantitative",
                    "title": score_title,
                    "scale": {"domain": cfg.likert_domain, "scheme": "blues"}
                },
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal"},
                    {"field": "group", "type": "nominal"},
                    {"field": "score", "type": "quantitative", "format": ".2f", "title": score_title}
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
    fn median_stat_is_supported() {
        let ds = Dataset::new(
            "survey",
            vec!["Sexe".into(), "PGC1".into()],
            vec![
                vec![Cell::Text("Homme".into()), Cell::Number(1.0)],
                vec![Cell::Text("Homme".into()), Cell::Number(2.0)],
                vec![Cell::Text("Homme".into()), Cell::Number(5.0)],
            ],
        );
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let config: JsonMap = serde_json::from_str(r#"{"stat": "median"}"#).unwrap();
        let spec = DimensionHeatmapStrategy.generate(&data, &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values[0]["score"], 2.0);
    }

    #[test]
    fn invalid_stat_is_rejected() {
        let ds = Dataset::new("survey", vec!["PGC1".into()], vec![vec![Cell::Number(3.0)]]);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let config: JsonMap = serde_json::from_str(r#"{"stat": "mode"}"#).unwrap();
        assert!(DimensionHeatmapStrategy.generate(&data, &config).is_err());
    }
}
