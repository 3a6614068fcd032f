//! Boxplots of Likert distributions per dimension, split by a group column

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::survey::{available_demographics, prefix_label};
use qviz_common::{Error, Result};

use super::{ensure_not_empty, melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `group_field`: segmentation column (default: first available demographic)
/// - `dimensions`: restrict to these dimension prefixes (e.g. `["COM", "RECO"]`)
/// - `likert_domain`: axis bounds (default `[1, 5]`)
/// - `show_outliers`: render outlier points (default true)
/// - `min_per_group`: minimum responses per (group, dimension) pair (default 3)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    group_field: Option<String>,
    dimensions: Option<Vec<String>>,
    likert_domain: Vec<f64>,
    show_outliers: bool,
    min_per_group: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            group_field: None,
            dimensions: None,
            likert_domain: vec![1.0, 5.0],
            show_outliers: true,
            min_per_group: 3,
        }
    }
}

pub struct DimensionBoxplotStrategy;

impl ChartStrategy for DimensionBoxplotStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("dimension boxplot")?;
        ensure_not_empty(survey, "the dimension boxplots")?;

        let long = melt_survey(survey, "dimension boxplot", &[])?;

        let group_field = match cfg.group_field {
            Some(field) => field,
            None => available_demographics(&long)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::Chart("No segmentation field available for the boxplots".to_string())
                })?,
        };
        let Some(group_idx) = long.column_index(&group_field) else {
            return Err(Error::Chart(format!(
                "Segment field '{}' not found in dataset",
                group_field
            )));
        };

        let wanted: Option<Vec<String>> = cfg
            .dimensions
            .map(|dims| dims.iter().map(|d| d.to_uppercase()).collect());

        let prefix_idx = long.column_index("dimension_prefix").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();

        // (group, dimension label) -> responses
        let mut cells: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            let Some(value) = row[resp_idx].as_number() else {
                continue;
            };
            let prefix = row[prefix_idx].display();
            if let Some(wanted) = &wanted {
                if !wanted.contains(&prefix.to_uppercase()) {
                    continue;
                }
            }
            let group = row[group_idx].display();
            if group.trim().is_empty() {
                continue;
            }
            cells
                .entry((group, prefix_label(&prefix).to_string()))
                .or_default()
                .push(value);
        }

        let mut values = Vec::new();
        for ((group, label), responses) in &cells {
            if responses.len() < cfg.min_per_group {
                continue;
            }
            for value in responses {
                values.push(json!({
                    "group": group,
                    "dimension_label": label,
                    "response_value": value,
                }));
            }
        }

        if values.is_empty() {
            return Err(Error::Chart(
                "No group/dimension pair reaches the minimum response threshold".to_string(),
            ));
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": {"type": "boxplot", "extent": if cfg.show_outliers { json!(1.5) } else { json!("min-max") }},
            "encoding": {
                "x": {
                    "field": "response_value",
                    "type": "quantitative",
                    "title": "Réponse (1-5)",
                    "scale": {"domain": cfg.likert_domain}
                },
                "y": {"field": "dimension_label", "type": "nominal", "title": "Dimension QVT"},
                "color": {"field": "group", "type": "nominal", "title": group_field},
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal"},
                    {"field": "group", "type": "nominal"},
                    {"field": "response_value", "type": "quantitative", "format": ".2f", "title": "Valeur"}
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

    fn survey(rows: usize) -> ChartData {
        let data_rows = (0..rows)
            .map(|i| {
                vec![
                    Cell::Text("Homme".into()),
                    Cell::Number(1.0 + (i % 5) as f64),
                    Cell::Number(3.0),
                ]
            })
            .collect();
        let ds = Dataset::new(
            "survey",
            vec!["Sexe".into(), "PGC1".into(), "COM1".into()],
            data_rows,
        );
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn small_groups_are_dropped() {
        let data = survey(2); // below min_per_group
        assert!(DimensionBoxplotStrategy.generate(&data, &JsonMap::new()).is_err());
    }

    #[test]
    fn dimension_filter_restricts_output() {
        let data = survey(6);
        let config: JsonMap = serde_json::from_str(r#"{"dimensions": ["com"]}"#).unwrap();
        let spec = DimensionBoxplotStrategy.generate(&data, &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert!(values
            .iter()
            .all(|v| v["dimension_label"] == "Pratiques de communication"));
    }
}
