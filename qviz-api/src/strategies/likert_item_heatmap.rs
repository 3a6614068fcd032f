//! Heatmap of Likert items per group: mean score or % favorable

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::{available_demographics, prefix_label};
use qviz_common::{Error, Result};

use super::{cmp_f64, ensure_not_empty, melt_survey, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `group_field`: segmentation column (default: first available demographic)
/// - `stat`: `"mean"` (default) or `"percent_favorable"`
/// - `favorable_threshold`: responses at or above count as favorable (default 4)
/// - `likert_domain`: color bounds for the mean stat (default `[1, 5]`)
/// - `top_n`: keep only the N most discriminating items (by variance)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    group_field: Option<String>,
    stat: String,
    favorable_threshold: f64,
    likert_domain: Vec<f64>,
    top_n: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            group_field: None,
            stat: "mean".to_string(),
            favorable_threshold: 4.0,
            likert_domain: vec![1.0, 5.0],
            top_n: None,
        }
    }
}

pub struct LikertItemHeatmapStrategy;

impl ChartStrategy for LikertItemHeatmapStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("Likert item heatmap")?;
        ensure_not_empty(survey, "the item heatmap")?;

        if cfg.stat != "mean" && cfg.stat != "percent_favorable" {
            return Err(Error::Chart("stat must be 'mean' or 'percent_favorable'".to_string()));
        }

        let long = melt_survey(survey, "item heatmap", &[])?;

        let group_field = match cfg.group_field {
            Some(field) => field,
            None => available_demographics(&long)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::Chart("No segmentation field available for the item heatmap".to_string())
                })?,
        };
        let Some(group_idx) = long.column_index(&group_field) else {
            return Err(Error::Chart(format!(
                "Segment field '{}' not found in dataset",
                group_field
            )));
        };

        let label_idx = long.column_index("question_label").unwrap();
        let prefix_idx = long.column_index("dimension_prefix").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();

        // Responses per question, used for the variance-based top-N cut
        let mut per_question: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            if let Some(value) = row[resp_idx].as_number() {
                per_question
                    .entry(row[label_idx].display())
                    .or_default()
                    .push(value);
            }
        }
        let selected: Option<Vec<String>> = cfg.top_n.map(|top_n| {
            let mut ranked: Vec<(String, f64)> = per_question
                .iter()
                .map(|(q, vs)| {
                    let var = stats::sample_std(vs).map(|s| s * s).unwrap_or(0.0);
                    (q.clone(), var)
                })
                .collect();
            ranked.sort_by(|a, b| cmp_f64(b.1, a.1).then_with(|| a.0.cmp(&b.0)));
            ranked.into_iter().take(top_n).map(|(q, _)| q).collect()
        });

        let mut cells: BTreeMap<(String, String, String), Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            let Some(value) = row[resp_idx].as_number() else {
                continue;
            };
            let question = row[label_idx].display();
            if let Some(selected) = &selected {
                if !selected.contains(&question) {
                    continue;
                }
            }
            let group = row[group_idx].display();
            if group.trim().is_empty() {
                continue;
            }
            let dim_label = prefix_label(&row[prefix_idx].display()).to_string();
            cells.entry((group, question, dim_label)).or_default().push(value);
        }

        let favorable = cfg.stat == "percent_favorable";
        let values: Vec<Value> = cells
            .iter()
            .filter_map(|((group, question, dim_label), responses)| {
                let score = if favorable {
                    let favorable_count = responses
                        .iter()
                        .filter(|v| **v >= cfg.favorable_threshold)
                        .count();
                    Some(favorable_count as f64 / responses.len() as f64)
                } else {
                    stats::mean(responses)
                }?;
                Some(json!({
                    "group": group,
                    "question_label": question,
                    "dimension_label": dim_label,
                    "score": score,
                    "responses": responses.len(),
                }))
            })
            .collect();

        if values.is_empty() {
            return Err(Error::Chart("No aggregated data available for the item heatmap".to_string()));
        }

        let (score_title, scale, format) = if favorable {
            (
                format!("% favorable (≥{})", cfg.favorable_threshold),
                json!({"domain": [0, 1], "scheme": "blues"}),
                ".0%",
            )
        } else {
            (
                "Score moyen (1-5)".to_string(),
                json!({"domain": cfg.likert_domain, "scheme": "blues"}),
                ".2f",
            )
        };

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": "rect",
            "encoding": {
                "x": {"field": "group", "type": "nominal", "title": group_field},
                "y": {"field": "question_label", "type": "nominal", "sort": "x", "title": "Item"},
                "color": {"field": "score", "type": "quantitative", "title": score_title, "scale": scale},
                "tooltip": [
                    {"field": "question_label", "type": "nominal"},
                    {"field": "group", "type": "nominal"},
                    {"field": "score", "type": "quantitative", "title": score_title, "format": format},
                    {"field": "responses", "type": "quantitative"},
                    {"field": "dimension_label", "type": "nominal"}
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
        let rows = vec![
            vec![Cell::Text("Homme".into()), Cell::Number(5.0), Cell::Number(3.0)],
            vec![Cell::Text("Homme".into()), Cell::Number(4.0), Cell::Number(3.0)],
            vec![Cell::Text("Femme".into()), Cell::Number(1.0), Cell::Number(3.0)],
            vec![Cell::Text("Femme".into()), Cell::Number(2.0), Cell::Number(3.0)],
        ];
        let ds = Dataset::new("survey", vec!["Sexe".into(), "PGC1".into(), "COM1".into()], rows);
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn percent_favorable_counts_threshold_and_above() {
        let config: JsonMap = serde_json::from_str(r#"{"stat": "percent_favorable"}"#).unwrap();
        let spec = LikertItemHeatmapStrategy.generate(&survey(), &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let hommes_pgc = values
            .iter()
            .find(|v| v["group"] == "Homme" && v["question_label"].as_str().unwrap().starts_with("PGC1"))
            .unwrap();
        assert!((hommes_pgc["score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn top_n_keeps_the_most_varied_items() {
        let config: JsonMap = serde_json::from_str(r#"{"top_n": 1}"#).unwrap();
        let spec = LikertItemHeatmapStrategy.generate(&survey(), &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        // PGC1 varies, COM1 is constant; only PGC1 survives
        assert!(values
            .iter()
            .all(|v| v["question_label"].as_str().unwrap().starts_with("PGC1")));
    }
}
