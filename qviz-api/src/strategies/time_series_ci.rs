//! Time series with a normal-approximation confidence band

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::{Error, Result};

use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `measure_field`: numeric column (default: first numeric column)
/// - `time_field`: period column (default: `ID` if present, else first column)
/// - `group_field`: optional segmentation for multi-line output
/// - `ci_z`: normal quantile for the band (default 1.96, i.e. 95%)
/// - `min_count`: minimum n per period to compute a band (default 2)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    measure_field: Option<String>,
    time_field: Option<String>,
    group_field: Option<String>,
    ci_z: f64,
    min_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            measure_field: None,
            time_field: None,
            group_field: None,
            ci_z: 1.96,
            min_count: 2,
        }
    }
}

pub struct TimeSeriesCiStrategy;

impl ChartStrategy for TimeSeriesCiStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let hr = data.hr.as_ref();
        ensure_not_empty(hr, "the confidence-band time series")?;

        let metric = match cfg.measure_field.filter(|f| hr.has_column(f)) {
            Some(field) => field,
            None => hr.numeric_columns().into_iter().next().ok_or_else(|| {
                Error::Chart("No numeric column available for the confidence-band time series".to_string())
            })?,
        };

        let time_field = cfg
            .time_field
            .filter(|f| hr.has_column(f))
            .or_else(|| hr.has_column("ID").then(|| "ID".to_string()))
            .or_else(|| hr.columns().first().cloned())
            .ok_or_else(|| Error::Chart("Dataset has no columns for the time series".to_string()))?;

        if let Some(group) = &cfg.group_field {
            if !hr.has_column(group) {
                return Err(Error::Chart(format!(
                    "Segment field '{}' not found in dataset",
                    group
                )));
            }
        }

        let t_idx = hr.column_index(&time_field).unwrap();
        let m_idx = hr.column_index(&metric).unwrap();
        let g_idx = cfg.group_field.as_deref().and_then(|g| hr.column_index(g));

        let mut groups: BTreeMap<(String, String), Vec<f64>> = BTreeMap::new();
        for row in hr.rows() {
            let Some(value) = row[m_idx].as_number() else {
                continue;
            };
            let period = row[t_idx].display();
            if period.trim().is_empty() {
                continue;
            }
            let segment = g_idx.map(|i| row[i].display()).unwrap_or_default();
            groups.entry((period, segment)).or_default().push(value);
        }

        if groups.is_empty() {
            return Err(Error::Chart(
                "No usable data for the confidence-band time series".to_string(),
            ));
        }

        let values: Vec<Value> = groups
            .iter()
            .map(|((period, segment), samples)| {
                let n = samples.len();
                let mean = stats::mean(samples).unwrap_or(0.0);
                let band = if n >= cfg.min_count {
                    stats::sample_std(samples).map(|std| cfg.ci_z * std / (n as f64).sqrt())
                } else {
                    None
                };
                json!({
                    "period": period,
                    "segment": if segment.is_empty() { Value::Null } else { Value::String(segment.clone()) },
                    "mean": mean,
                    "lower": band.map(|b| mean - b),
                    "upper": band.map(|b| mean + b),
                    "n": n,
                })
            })
            .collect();

        let color: Value = if g_idx.is_some() {
            json!({"field": "segment", "type": "nominal", "title": cfg.group_field})
        } else {
            json!({"value": "#2563EB"})
        };

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "layer": [
                {
                    "mark": {"type": "area", "opacity": 0.2},
                    "encoding": {
                        "x": {"field": "period", "type": "ordinal", "title": "Période"},
                        "y": {"field": "lower", "type": "quantitative", "title": ""},
                        "y2": {"field": "upper"},
                        "color": color,
                    }
                },
                {
                    "mark": {"type": "line", "point": true},
                    "encoding": {
                        "x": {"field": "period", "type": "ordinal", "title": "Période"},
                        "y": {"field": "mean", "type": "quantitative", "title": metric.replace('_', " ")},
                        "color": color,
                        "tooltip": [
                            {"field": "period", "type": "ordinal"},
                            {"field": "mean", "type": "quantitative", "format": ".2f", "title": "Moyenne"},
                            {"field": "n", "type": "quantitative", "title": "Effectif"},
                            {"field": "lower", "type": "quantitative", "format": ".2f", "title": "IC basse"},
                            {"field": "upper", "type": "quantitative", "format": ".2f", "title": "IC haute"}
                        ]
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
    fn band_needs_min_count_samples() {
        let hr = Dataset::new(
            "hr",
            vec!["periode".into(), "score".into()],
            vec![
                vec![Cell::Text("T1".into()), Cell::Number(3.0)],
                vec![Cell::Text("T1".into()), Cell::Number(4.0)],
                vec![Cell::Text("T2".into()), Cell::Number(2.0)],
            ],
        );
        let data = ChartData {
            hr: Arc::new(hr),
            survey: None,
        };
        let spec = TimeSeriesCiStrategy
            .generate(&data, &serde_json::from_str(r#"{"time_field": "periode"}"#).unwrap())
            .unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let t1 = values.iter().find(|v| v["period"] == "T1").unwrap();
        let t2 = values.iter().find(|v| v["period"] == "T2").unwrap();
        assert!(t1["lower"].is_number());
        assert!(t2["lower"].is_null()); // single sample, no band
    }
}
