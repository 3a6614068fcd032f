//! Group positioning on engagement versus exhaustion, with risk quadrants

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::available_demographics;
use qviz_common::{Dataset, Error, Result};

use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `x_field` / `y_field`: axis columns (defaults `EPUI` / `ENG`, computed
///   from the item columns when absent)
/// - `group_field`: segmentation column (default: first available demographic)
/// - `x_threshold` / `y_threshold`: quadrant cuts (default: global medians)
/// - `max_size`: largest point size (default 400)
/// - `show_labels`: draw group labels (default false)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    x_field: Option<String>,
    y_field: Option<String>,
    group_field: Option<String>,
    x_threshold: Option<f64>,
    y_threshold: Option<f64>,
    max_size: u32,
    show_labels: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            x_field: None,
            y_field: None,
            group_field: None,
            x_threshold: None,
            y_threshold: None,
            max_size: 400,
            show_labels: false,
        }
    }
}

/// Add a `<prefix>` column holding the row-wise mean of all `<prefix>*`
/// item columns, when absent
fn ensure_mean_column(dataset: &Dataset, prefix: &str) -> Result<Dataset> {
    if dataset.has_column(prefix) {
        return Ok(dataset.clone());
    }
    let item_idxs: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| c.starts_with(prefix))
        .map(|(i, _)| i)
        .collect();
    if item_idxs.is_empty() {
        return Err(Error::Chart(format!(
            "No {} columns found to compute mean",
            prefix
        )));
    }
    let values = dataset
        .rows()
        .map(|row| {
            let nums: Vec<f64> = item_idxs.iter().filter_map(|&i| row[i].as_number()).collect();
            match stats::mean(&nums) {
                Some(m) => qviz_common::Cell::Number(m),
                None => qviz_common::Cell::Empty,
            }
        })
        .collect();
    Ok(dataset.with_column(prefix, values))
}

pub struct EngEpuiQuadrantsStrategy;

impl ChartStrategy for EngEpuiQuadrantsStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("the ENG/EPUI quadrants")?;
        ensure_not_empty(survey, "the ENG/EPUI quadrants")?;

        let survey = ensure_mean_column(survey, "EPUI")?;
        let survey = ensure_mean_column(&survey, "ENG")?;

        let x_field = cfg.x_field.unwrap_or_else(|| "EPUI".to_string());
        let y_field = cfg.y_field.unwrap_or_else(|| "ENG".to_string());
        for (field, axis) in [(&x_field, "X"), (&y_field, "Y")] {
            if !survey.has_column(field) {
                return Err(Error::Chart(format!(
                    "Column '{}' not found for the {} axis",
                    field, axis
                )));
            }
        }

        let group_field = match cfg.group_field {
            Some(field) => field,
            None => available_demographics(&survey)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    Error::Chart("No segmentation field available for the quadrants".to_string())
                })?,
        };
        let Some(group_idx) = survey.column_index(&group_field) else {
            return Err(Error::Chart(format!(
                "Segment field '{}' not found in dataset",
                group_field
            )));
        };

        let x_idx = survey.column_index(&x_field).unwrap();
        let y_idx = survey.column_index(&y_field).unwrap();

        let mut groups: BTreeMap<String, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        let mut all_x = Vec::new();
        let mut all_y = Vec::new();
        for row in 0..survey.row_count() {
            let (Some(x), Some(y)) = (
                survey.cell(row, x_idx).as_number(),
                survey.cell(row, y_idx).as_number(),
            ) else {
                continue;
            };
            let group = survey.cell(row, group_idx).display();
            if group.trim().is_empty() {
                continue;
            }
            let entry = groups.entry(group).or_default();
            entry.0.push(x);
            entry.1.push(y);
            all_x.push(x);
            all_y.push(y);
        }

        if groups.is_empty() {
            return Err(Error::Chart(
                "No usable data for the ENG/EPUI quadrants after cleaning".to_string(),
            ));
        }

        let x_threshold = cfg
            .x_threshold
            .or_else(|| stats::median(&all_x))
            .unwrap_or(0.0);
        let y_threshold = cfg
            .y_threshold
            .or_else(|| stats::median(&all_y))
            .unwrap_or(0.0);

        let values: Vec<Value> = groups
            .iter()
            .filter_map(|(group, (xs, ys))| {
                let x_mean = stats::mean(xs)?;
                let y_mean = stats::mean(ys)?;
                let quadrant = match (x_mean >= x_threshold, y_mean >= y_threshold) {
                    (true, true) => "Épuisement élevé / Engagement élevé",
                    (true, false) => "Épuisement élevé / Engagement faible",
                    (false, true) => "Épuisement faible / Engagement élevé",
                    (false, false) => "Épuisement faible / Engagement faible",
                };
                Some(json!({
                    "group": group,
                    "x_mean": x_mean,
                    "y_mean": y_mean,
                    "n": xs.len(),
                    "quadrant": quadrant,
                }))
            })
            .collect();

        let mut layers = vec![json!({
            "mark": {"type": "circle", "opacity": 0.75},
            "encoding": {
                "x": {"field": "x_mean", "type": "quantitative", "title": x_field},
                "y": {"field": "y_mean", "type": "quantitative", "title": y_field},
                "color": {"field": "quadrant", "type": "nominal", "title": "Quadrant"},
                "size": {
                    "field": "n",
                    "type": "quantitative",
                    "title": "Effectif",
                    "scale": {"range": [50, cfg.max_size]}
                },
                "tooltip": [
                    {"field": "group", "type": "nominal", "title": group_field},
                    {"field": "x_mean", "type": "quantitative", "format": ".2f", "title": format!("{} (moy.)", x_field)},
                    {"field": "y_mean", "type": "quantitative", "format": ".2f", "title": format!("{} (moy.)", y_field)},
                    {"field": "n", "type": "quantitative", "title": "Effectif"},
                    {"field": "quadrant", "type": "nominal"}
                ]
            }
        })];

        layers.push(json!({
            "mark": {"type": "rule", "color": "#9ca3af", "strokeDash": [4, 4]},
            "encoding": {"x": {"datum": x_threshold}}
        }));
        layers.push(json!({
            "mark": {"type": "rule", "color": "#9ca3af", "strokeDash": [4, 4]},
            "encoding": {"y": {"datum": y_threshold}}
        }));

        if cfg.show_labels {
            layers.push(json!({
                "mark": {"type": "text", "dx": 8, "dy": -8, "fontSize": 11, "color": "#111827"},
                "encoding": {
                    "x": {"field": "x_mean", "type": "quantitative"},
                    "y": {"field": "y_mean", "type": "quantitative"},
                    "text": {"field": "group", "type": "nominal"}
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
    use qviz_common::Cell;
    use std::sync::Arc;

    #[test]
    fn computes_axis_means_from_item_columns() {
        let rows = vec![
            vec![Cell::Text("A".into()), Cell::Number(4.0), Cell::Number(5.0), Cell::Number(2.0)],
            vec![Cell::Text("A".into()), Cell::Number(4.0), Cell::Number(4.0), Cell::Number(2.0)],
            vec![Cell::Text("B".into()), Cell::Number(1.0), Cell::Number(2.0), Cell::Number(5.0)],
            vec![Cell::Text("B".into()), Cell::Number(2.0), Cell::Number(2.0), Cell::Number(4.0)],
        ];
        let ds = Dataset::new(
            "survey",
            vec!["Secteur".into(), "EPUI1".into(), "EPUI2".into(), "ENG1".into()],
            rows,
        );
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = EngEpuiQuadrantsStrategy.generate(&data, &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
        let a = values.iter().find(|v| v["group"] == "A").unwrap();
        let b = values.iter().find(|v| v["group"] == "B").unwrap();
        // A is exhausted and disengaged relative to B
        assert!(a["x_mean"].as_f64().unwrap() > b["x_mean"].as_f64().unwrap());
        assert!(a["y_mean"].as_f64().unwrap() < b["y_mean"].as_f64().unwrap());
        assert_ne!(a["quadrant"], b["quadrant"]);
    }
}
