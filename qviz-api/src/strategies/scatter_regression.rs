//! Scatter of two numeric fields with a declarative regression overlay

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::{Error, Result};

use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `x_field` / `y_field`: numeric columns (auto-picked from the numeric
///   columns when absent)
/// - `color_field`: categorical column coloring the points
/// - `regression`: overlay a regression line (default true)
/// - `method`: `"linear"` (default), `"poly"` or `"loess"`
/// - `order`: polynomial order when `method` is `"poly"`
/// - `ci`: add a confidence band around the regression (default false)
/// - `opacity`: point opacity (default 0.6)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    x_field: Option<String>,
    y_field: Option<String>,
    color_field: Option<String>,
    regression: bool,
    method: String,
    order: Option<u32>,
    ci: bool,
    opacity: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            x_field: None,
            y_field: None,
            color_field: None,
            regression: true,
            method: "linear".to_string(),
            order: None,
            ci: false,
            opacity: 0.6,
        }
    }
}

pub struct ScatterRegressionStrategy;

impl ChartStrategy for ScatterRegressionStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("scatter regression")?;
        ensure_not_empty(survey, "the scatter regression")?;

        let numeric_cols = survey.numeric_columns();

        let x_field = match cfg.x_field.filter(|f| survey.has_column(f)) {
            Some(field) => field,
            None => numeric_cols
                .first()
                .cloned()
                .ok_or_else(|| Error::Chart("No numeric column available for x_field".to_string()))?,
        };
        let y_field = match cfg.y_field.filter(|f| survey.has_column(f)) {
            Some(field) => field,
            None => numeric_cols
                .iter()
                .find(|c| **c != x_field)
                .or_else(|| numeric_cols.last())
                .cloned()
                .ok_or_else(|| Error::Chart("No numeric column available for y_field".to_string()))?,
        };

        let color_idx = match &cfg.color_field {
            Some(field) => Some(survey.column_index(field).ok_or_else(|| {
                Error::Chart(format!("color_field '{}' not found in dataset", field))
            })?),
            None => None,
        };

        let x_idx = survey.column_index(&x_field).unwrap();
        let y_idx = survey.column_index(&y_field).unwrap();
        let values: Vec<Value> = survey
            .rows()
            .filter_map(|row| {
                let x = row[x_idx].as_number()?;
                let y = row[y_idx].as_number()?;
                let mut point = json!({"x": x, "y": y});
                if let Some(c) = color_idx {
                    point["color"] = Value::String(row[c].display());
                }
                Some(point)
            })
            .collect();

        if values.is_empty() {
            return Err(Error::Chart(
                "No usable numeric data for the scatter regression".to_string(),
            ));
        }

        let x_enc = json!({"field": "x", "type": "quantitative", "title": x_field});
        let y_enc = json!({"field": "y", "type": "quantitative", "title": y_field});
        let color: Value = if color_idx.is_some() {
            json!({"field": "color", "type": "nominal", "title": cfg.color_field})
        } else {
            json!({"value": "#3B82F6"})
        };

        let mut tooltip = vec![
            json!({"field": "x", "type": "quantitative", "title": x_field}),
            json!({"field": "y", "type": "quantitative", "title": y_field}),
        ];
        if color_idx.is_some() {
            tooltip.push(json!({"field": "color", "type": "nominal"}));
        }

        let mut layers = vec![json!({
            "mark": {"type": "circle", "size": 70, "opacity": cfg.opacity},
            "encoding": {"x": x_enc, "y": y_enc, "color": color, "tooltip": tooltip}
        })];

        if cfg.regression {
            let mut regression = json!({"regression": "y", "on": "x", "method": cfg.method});
            if let Some(order) = cfg.order {
                regression["order"] = json!(order);
            }
            layers.push(json!({
                "transform": [regression.clone()],
                "mark": {"type": "line", "color": "#ef4444"},
                "encoding": {
                    "x": {"field": "x", "type": "quantitative"},
                    "y": {"field": "y", "type": "quantitative"}
                }
            }));
            if cfg.ci {
                layers.push(json!({
                    "transform": [regression],
                    "mark": {"type": "errorband", "color": "#ef4444", "opacity": 0.2},
                    "encoding": {
                        "x": {"field": "x", "type": "quantitative"},
                        "y": {"field": "y", "type": "quantitative"}
                    }
                }));
            }
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
    fn auto_picks_two_distinct_numeric_fields() {
        let ds = Dataset::new(
            "survey",
            vec!["Age".into(), "Ancienneté".into()],
            vec![
                vec![Cell::Number(30.0), Cell::Number(5.0)],
                vec![Cell::Number(40.0), Cell::Number(12.0)],
            ],
        );
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = ScatterRegressionStrategy.generate(&data, &JsonMap::new()).unwrap();
        assert_eq!(spec["layer"][0]["encoding"]["x"]["title"], "Age");
        assert_eq!(spec["layer"][0]["encoding"]["y"]["title"], "Ancienneté");
        assert_eq!(spec["layer"].as_array().unwrap().len(), 2); // points + regression
    }
}
