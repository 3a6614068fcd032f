//! Bullet chart: organisation score versus benchmark and target

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use qviz_common::stats;
use qviz_common::{Dataset, Error, Result};

use super::{check_field, ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `metric_field`: organisation score column (auto-detected when absent)
/// - `benchmark_field`: external reference column (auto-detected when absent)
/// - `target_field`: internal objective column
/// - `group_field`: one bullet per category when given
/// - `normalize`: divide values by 100 (default false)
/// - `scale_domain`: explicit `[min, max]` for the X axis
/// - `max_groups`: cap on the number of bullets (default 50)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    metric_field: Option<String>,
    benchmark_field: Option<String>,
    target_field: Option<String>,
    group_field: Option<String>,
    normalize: bool,
    scale_domain: Option<Vec<f64>>,
    max_groups: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            metric_field: None,
            benchmark_field: None,
            target_field: None,
            group_field: None,
            normalize: false,
            scale_domain: None,
            max_groups: 50,
        }
    }
}

const METRIC_TOKENS: &[&str] = &["absentee", "absence", "rate", "score", "metric"];
const BENCHMARK_TOKENS: &[&str] = &["turnover", "benchmark", "target", "rate"];

fn detect_by_token(candidates: &[String], tokens: &[&str]) -> Option<String> {
    for token in tokens {
        for candidate in candidates {
            if candidate.to_lowercase().contains(token) {
                return Some(candidate.clone());
            }
        }
    }
    candidates.first().cloned()
}

pub struct BenchmarkBulletStrategy;

impl ChartStrategy for BenchmarkBulletStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let hr = data.hr.as_ref();
        ensure_not_empty(hr, "the bullet chart")?;

        let numeric_cols = hr.numeric_columns();

        let metric_field = match cfg.metric_field.filter(|f| hr.has_column(f)) {
            Some(field) => field,
            None => detect_by_token(&numeric_cols, METRIC_TOKENS).ok_or_else(|| {
                Error::Chart("metric_field is required and must exist in the dataset".to_string())
            })?,
        };

        let benchmark_field = match &cfg.benchmark_field {
            Some(field) => {
                check_field(hr, field, "Column")?;
                Some(field.clone())
            }
            None => {
                let remaining: Vec<String> = numeric_cols
                    .iter()
                    .filter(|c| **c != metric_field)
                    .cloned()
                    .collect();
                detect_by_token(&remaining, BENCHMARK_TOKENS)
            }
        };

        if let Some(target) = &cfg.target_field {
            check_field(hr, target, "Column")?;
        }
        if let Some(group) = &cfg.group_field {
            check_field(hr, group, "group_field")?;
        }

        debug!(
            metric = %metric_field,
            benchmark = ?benchmark_field,
            target = ?cfg.target_field,
            "bullet chart selected fields"
        );

        let scale = match &cfg.scale_domain {
            Some(domain) if domain.len() != 2 => {
                return Err(Error::Chart("scale_domain must be a [min, max] list".to_string()))
            }
            other => other.clone(),
        };

        let divisor = if cfg.normalize { 100.0 } else { 1.0 };
        let mean_of = |ds: &Dataset, field: &str, rows: &[usize]| -> Option<f64> {
            let idx = ds.column_index(field)?;
            let values: Vec<f64> = rows.iter().filter_map(|&r| ds.cell(r, idx).as_number()).collect();
            stats::mean(&values).map(|m| m / divisor)
        };

        // Rows with a usable metric value, grouped
        let metric_idx = hr.column_index(&metric_field).unwrap();
        let group_idx = cfg.group_field.as_deref().and_then(|g| hr.column_index(g));
        let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for row in 0..hr.row_count() {
            if hr.cell(row, metric_idx).as_number().is_none() {
                continue;
            }
            let key = group_idx
                .map(|i| hr.cell(row, i).display())
                .unwrap_or_else(|| "Organisation".to_string());
            groups.entry(key).or_default().push(row);
        }

        let mut values = Vec::new();
        for (group, rows) in groups.iter().take(cfg.max_groups) {
            let Some(metric) = mean_of(hr, &metric_field, rows) else {
                continue;
            };
            values.push(json!({
                "group": group,
                "metric": metric,
                "benchmark": benchmark_field.as_deref().and_then(|f| mean_of(hr, f, rows)),
                "target": cfg.target_field.as_deref().and_then(|f| mean_of(hr, f, rows)),
            }));
        }

        if values.is_empty() {
            return Err(Error::Chart("No aggregated data available for the bullet chart".to_string()));
        }

        let x_scale: Value = match scale {
            Some(domain) => json!({"domain": domain}),
            None => json!({}),
        };

        let mut layers = vec![json!({
            "mark": {"type": "bar", "height": 20, "color": "#3B82F6"},
            "encoding": {
                "x": {
                    "field": "metric",
                    "type": "quantitative",
                    "title": if cfg.normalize { "Score (%)" } else { "Score" },
                    "scale": x_scale,
                },
                "y": {"field": "group", "type": "nominal", "sort": "-x", "title": "Groupe"},
                "tooltip": [
                    {"field": "group", "type": "nominal"},
                    {"field": "metric", "type": "quantitative", "format": ".2f", "title": "Score"}
                ]
            }
        })];

        if benchmark_field.is_some() {
            layers.push(json!({
                "mark": {"type": "rule", "color": "#10B981", "strokeWidth": 2},
                "encoding": {
                    "x": {"field": "benchmark", "type": "quantitative"},
                    "y": {"field": "group", "type": "nominal", "sort": "-x"},
                    "tooltip": [
                        {"field": "group", "type": "nominal"},
                        {"field": "benchmark", "type": "quantitative", "format": ".2f", "title": "Benchmark"}
                    ]
                }
            }));
        }
        if cfg.target_field.is_some() {
            layers.push(json!({
                "mark": {"type": "rule", "color": "#F59E0B", "strokeDash": [4, 4], "strokeWidth": 2},
                "encoding": {
                    "x": {"field": "target", "type": "quantitative"},
                    "y": {"field": "group", "type": "nominal", "sort": "-x"},
                    "tooltip": [
                        {"field": "group", "type": "nominal"},
                        {"field": "target", "type": "quantitative", "format": ".2f", "title": "Cible"}
                    ]
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
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    #[test]
    fn detects_metric_by_token_and_aggregates() {
        let hr = Dataset::new(
            "hr",
            vec!["absence_rate".into(), "turnover_rate".into()],
            vec![
                vec![Cell::Number(4.0), Cell::Number(10.0)],
                vec![Cell::Number(6.0), Cell::Number(12.0)],
            ],
        );
        let data = ChartData {
            hr: Arc::new(hr),
            survey: None,
        };
        let spec = BenchmarkBulletStrategy.generate(&data, &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["group"], "Organisation");
        assert!((values[0]["metric"].as_f64().unwrap() - 5.0).abs() < 1e-9);
        assert!((values[0]["benchmark"].as_f64().unwrap() - 11.0).abs() < 1e-9);
    }
}
