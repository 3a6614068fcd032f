//! Univariate distribution of a socio-demographic variable
//!
//! Numeric fields render as a binned histogram, categorical fields as
//! horizontal bars; both can be normalized to percentages. Binning and
//! counting stay declarative in the spec so the client can re-bin.

use serde_json::{json, Value};

use serde::Deserialize;

use qviz_common::survey::available_demographics;
use qviz_common::{Error, Result};

use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `field`: target column (default `Age`, else first detected demographic)
/// - `bin_size`: bin step for numeric fields
/// - `max_bins`: bin cap when no `bin_size` is given (default 10)
/// - `normalize`: percentage instead of head-count (default false)
/// - `sort`: `"alpha"`, `"count"` or absent, for categorical ordering
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    field: Option<String>,
    bin_size: Option<f64>,
    max_bins: u32,
    normalize: bool,
    sort: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            field: None,
            bin_size: None,
            max_bins: 10,
            normalize: false,
            sort: None,
        }
    }
}

pub struct DemographicDistributionStrategy;

impl ChartStrategy for DemographicDistributionStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let hr = data.hr.as_ref();
        ensure_not_empty(hr, "the demographic distribution")?;

        let field = match cfg.field {
            Some(field) => field,
            None if hr.has_column("Age") => "Age".to_string(),
            None => available_demographics(hr)
                .into_iter()
                .next()
                .ok_or_else(|| Error::Chart("No socio-demographic column detected".to_string()))?,
        };
        if !hr.has_column(&field) {
            return Err(Error::Chart(format!("Column '{}' not found in dataset", field)));
        }

        let numeric = hr.is_numeric_column(&field) || field.to_lowercase() == "age";
        let idx = hr.column_index(&field).unwrap();

        if numeric {
            let values: Vec<Value> = hr
                .rows()
                .filter_map(|row| row[idx].as_number())
                .map(|v| json!({"value": v}))
                .collect();
            if values.is_empty() {
                return Err(Error::Chart(format!(
                    "No usable numeric values for '{}'",
                    field
                )));
            }

            let bin: Value = match cfg.bin_size {
                Some(step) => json!({"step": step}),
                None => json!({"maxbins": cfg.max_bins}),
            };

            let mut spec = json!({
                "$schema": VEGA_SCHEMA,
                "data": {"values": values},
                "mark": "bar",
                "encoding": {
                    "x": {"field": "value", "type": "quantitative", "bin": bin, "title": field},
                    "y": {"aggregate": "count", "title": "Effectif"},
                    "tooltip": [
                        {"field": "value", "type": "quantitative", "bin": true},
                        {"aggregate": "count", "title": "Effectif"}
                    ]
                }
            });
            if cfg.normalize {
                spec["transform"] = json!([
                    {"joinaggregate": [{"op": "count", "as": "total"}]},
                    {"calculate": "1 / datum.total", "as": "pct"}
                ]);
                spec["encoding"]["y"] = json!({
                    "aggregate": "sum",
                    "field": "pct",
                    "title": "Pourcentage",
                    "axis": {"format": "%"}
                });
            }
            Ok(spec)
        } else {
            let values: Vec<Value> = hr
                .rows()
                .map(|row| row[idx].display())
                .filter(|v| !v.trim().is_empty())
                .map(|v| json!({"category": v}))
                .collect();
            if values.is_empty() {
                return Err(Error::Chart(format!(
                    "No usable categorical values for '{}'",
                    field
                )));
            }

            let sort: Value = match cfg.sort.as_deref() {
                Some("alpha") => json!("ascending"),
                Some("count") => json!("-x"),
                _ => Value::Null,
            };

            let mut spec = json!({
                "$schema": VEGA_SCHEMA,
                "data": {"values": values},
                "mark": "bar",
                "encoding": {
                    "y": {"field": "category", "type": "nominal", "sort": sort, "title": field},
                    "x": {"aggregate": "count", "title": "Effectif"},
                    "tooltip": [
                        {"field": "category", "type": "nominal", "title": field},
                        {"aggregate": "count", "title": "Effectif"}
                    ]
                }
            });
            if cfg.normalize {
                spec["transform"] = json!([
                    {"joinaggregate": [{"op": "count", "as": "total"}]},
                    {"calculate": "1 / datum.total", "as": "pct"}
                ]);
                spec["encoding"]["x"] = json!({
                    "aggregate": "sum",
                    "field": "pct",
                    "title": "Pourcentage",
                    "axis": {"format": "%"}
                });
            }
            Ok(spec)
        }
    }
}
