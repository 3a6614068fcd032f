//! Heatmap correlation matrix for numeric HR metrics

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use qviz_common::stats;
use qviz_common::{Error, Result};

use super::{parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `numeric_fields`: restrict the matrix to these columns; names missing
///   from the dataset are ignored (and logged). Default: all numeric columns.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    numeric_fields: Vec<String>,
}

pub struct CorrelationMatrixStrategy;

impl ChartStrategy for CorrelationMatrixStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let hr = data.hr.as_ref();

        let columns: Vec<String> = if cfg.numeric_fields.is_empty() {
            hr.numeric_columns()
        } else {
            let missing: Vec<&String> = cfg
                .numeric_fields
                .iter()
                .filter(|c| !hr.has_column(c))
                .collect();
            if !missing.is_empty() {
                debug!(?missing, "correlation matrix ignoring unknown fields");
            }
            cfg.numeric_fields
                .iter()
                .filter(|c| hr.has_column(c))
                .cloned()
                .collect()
        };

        if columns.is_empty() {
            return Err(Error::Chart(
                "No numeric columns available for correlation matrix".to_string(),
            ));
        }

        // Complete-case rows across all selected columns
        let coerced: Vec<Vec<Option<f64>>> = columns
            .iter()
            .map(|c| hr.numeric_column(c).unwrap_or_default())
            .collect();
        let complete: Vec<usize> = (0..hr.row_count())
            .filter(|&row| coerced.iter().all(|col| col[row].is_some()))
            .collect();

        let series: Vec<Vec<f64>> = coerced
            .iter()
            .map(|col| complete.iter().map(|&row| col[row].unwrap()).collect())
            .collect();

        let mut values = Vec::new();
        for (i, x_name) in columns.iter().enumerate() {
            for (j, y_name) in columns.iter().enumerate() {
                let correlation = if i == j {
                    Some(1.0)
                } else {
                    stats::pearson(&series[i], &series[j])
                };
                values.push(json!({
                    "metric_x": x_name,
                    "metric_y": y_name,
                    "correlation": correlation,
                }));
            }
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "layer": [
                {
                    "mark": "rect",
                    "encoding": {
                        "x": {"field": "metric_x", "type": "nominal"},
                        "y": {"field": "metric_y", "type": "nominal"},
                        "color": {
                            "field": "correlation",
                            "type": "quantitative",
                            "scale": {"scheme": "blueorange", "domain": [-1, 1]}
                        },
                        "tooltip": [
                            {"field": "metric_x", "type": "nominal"},
                            {"field": "metric_y", "type": "nominal"},
                            {"field": "correlation", "type": "quantitative", "format": ".2f"}
                        ]
                    }
                },
                {
                    "mark": "text",
                    "encoding": {
                        "x": {"field": "metric_x", "type": "nominal"},
                        "y": {"field": "metric_y", "type": "nominal"},
                        "text": {"field": "correlation", "type": "quantitative", "format": ".2f"},
                        "color": {
                            "condition": {"test": "datum.correlation > 0.5", "value": "white"},
                            "value": "black"
                        }
                    }
                }
            ]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    #[test]
    fn matrix_covers_all_numeric_pairs() {
        let hr = Dataset::new(
            "hr",
            vec!["a".into(), "b".into(), "nom".into()],
            vec![
                vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Text("x".into())],
                vec![Cell::Number(2.0), Cell::Number(4.0), Cell::Text("y".into())],
                vec![Cell::Number(3.0), Cell::Number(6.0), Cell::Text("z".into())],
            ],
        );
        let data = ChartData {
            hr: Arc::new(hr),
            survey: None,
        };
        let spec = CorrelationMatrixStrategy.generate(&data, &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 4); // 2 numeric columns -> 2x2
        let off_diag = values
            .iter()
            .find(|v| v["metric_x"] == "a" && v["metric_y"] == "b")
            .unwrap();
        assert!((off_diag["correlation"].as_f64().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_requested_fields_are_ignored() {
        let hr = Dataset::new(
            "hr",
            vec!["a".into()],
            vec![vec![Cell::Number(1.0)], vec![Cell::Number(2.0)]],
        );
        let data = ChartData {
            hr: Arc::new(hr),
            survey: None,
        };
        let config: JsonMap =
            serde_json::from_str(r#"{"numeric_fields": ["a", "missing"]}"#).unwrap();
        let spec = CorrelationMatrixStrategy.generate(&data, &config).unwrap();
        assert_eq!(spec["data"]["values"].as_array().unwrap().len(), 1);
    }
}
