//! Line chart of an HR indicator over time

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::{Error, Result};

use super::{parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `measure_field`: numeric column to plot (default: first numeric column)
/// - `time_field`: period column (default: a well-known time column if one
///   exists, the first column otherwise)
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    measure_field: Option<String>,
    time_field: Option<String>,
}

const PREFERRED_TIME_FIELDS: &[&str] = &[
    "year", "annee", "année", "date", "period", "periode", "période", "month", "mois", "id",
];

pub struct TimeSeriesStrategy;

impl ChartStrategy for TimeSeriesStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let hr = data.hr.as_ref();

        let metric = match cfg.measure_field.filter(|f| hr.has_column(f)) {
            Some(field) => field,
            None => hr
                .numeric_columns()
                .into_iter()
                .next()
                .ok_or_else(|| Error::Chart("No numeric metric available for time series".to_string()))?,
        };

        let time_field = cfg
            .time_field
            .filter(|f| hr.has_column(f))
            .or_else(|| {
                PREFERRED_TIME_FIELDS.iter().find_map(|preferred| {
                    hr.columns()
                        .iter()
                        .find(|c| c.trim().to_lowercase() == *preferred)
                        .cloned()
                })
            })
            .or_else(|| hr.columns().first().cloned())
            .ok_or_else(|| Error::Chart("Dataset has no columns for time series".to_string()))?;

        let t_idx = hr.column_index(&time_field).unwrap();
        let m_idx = hr.column_index(&metric).unwrap();
        let values: Vec<Value> = hr
            .rows()
            .filter_map(|row| {
                let value = row[m_idx].as_number()?;
                Some(json!({"period": row[t_idx].display(), "value": value}))
            })
            .collect();

        if values.is_empty() {
            return Err(Error::Chart(format!(
                "No numeric values in '{}' for time series",
                metric
            )));
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": {"type": "line", "point": true},
            "encoding": {
                "x": {"field": "period", "type": "ordinal", "title": "Période"},
                "y": {"field": "value", "type": "quantitative", "title": metric.replace('_', " ")},
                "tooltip": [
                    {"field": "period", "type": "ordinal", "title": time_field},
                    {"field": "value", "type": "quantitative", "title": metric}
                ]
            }
        }))
    }
}
