//! Dimension mean scores with standard-deviation error bars

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::metrics::dimension_scores;
use qviz_common::stats;
use qviz_common::survey::{prefix_label, recode_demographics};
use qviz_common::{Error, Result};

use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `segment_field`: grouped bars per segment value
/// - `facet_field`: independent sub-chart per facet value
/// - `max_segments`: keep only the most frequent values of each (default 6)
/// - `likert_domain`: display bounds (default `[1, 5]`)
/// - `min_n`: flag cells below this respondent count (default 30)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    segment_field: Option<String>,
    facet_field: Option<String>,
    max_segments: usize,
    likert_domain: Vec<f64>,
    min_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            segment_field: None,
            facet_field: None,
            max_segments: 6,
            likert_domain: vec![1.0, 5.0],
            min_n: 30,
        }
    }
}

pub struct DimensionCiBarsStrategy;

impl ChartStrategy for DimensionCiBarsStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = recode_demographics(data.survey_for("dimension dispersion bars")?);
        ensure_not_empty(&survey, "the dispersion bars")?;

        for (field, role) in [(&cfg.segment_field, "Segment field"), (&cfg.facet_field, "Facet field")] {
            if let Some(field) = field {
                if !survey.has_column(field) {
                    return Err(Error::Chart(format!("{} '{}' not found in dataset", role, field)));
                }
            }
        }

        let (lo, hi) = match cfg.likert_domain.as_slice() {
            [lo, hi] => (*lo, *hi),
            _ => (1.0, 5.0),
        };

        let scores = dimension_scores(&survey)?;
        let seg_idx = cfg.segment_field.as_deref().and_then(|f| survey.column_index(f));
        let fac_idx = cfg.facet_field.as_deref().and_then(|f| survey.column_index(f));

        // (dimension, segment, facet) -> respondent-level dimension scores
        let mut cells: BTreeMap<(String, String, String), Vec<f64>> = BTreeMap::new();
        // Frequency of segment/facet values for the most-frequent cut
        let mut seg_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut fac_counts: BTreeMap<String, usize> = BTreeMap::new();

        for row in 0..scores.row_count() {
            let segment = seg_idx.map(|i| survey.cell(row, i).display()).unwrap_or_default();
            let facet = fac_idx.map(|i| survey.cell(row, i).display()).unwrap_or_default();
            for (dim_idx, prefix) in scores.prefixes().iter().enumerate() {
                let Some(score) = scores.score(row, dim_idx) else {
                    continue;
                };
                if seg_idx.is_some() && !segment.trim().is_empty() {
                    *seg_counts.entry(segment.clone()).or_default() += 1;
                }
                if fac_idx.is_some() && !facet.trim().is_empty() {
                    *fac_counts.entry(facet.clone()).or_default() += 1;
                }
                cells
                    .entry((prefix_label(prefix).to_string(), segment.clone(), facet.clone()))
                    .or_default()
                    .push(score);
            }
        }

        let keep_top = |counts: &BTreeMap<String, usize>| -> Vec<String> {
            let mut ranked: Vec<(&String, &usize)> = counts.iter().collect();
            ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            ranked.into_iter().take(cfg.max_segments).map(|(v, _)| v.clone()).collect()
        };
        let kept_segments = keep_top(&seg_counts);
        let kept_facets = keep_top(&fac_counts);

        // Overall mean per dimension drives the display ordering
        let mut overall: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for ((dimension, _, _), values) in &cells {
            overall.entry(dimension.clone()).or_default().extend(values);
        }

        let mut values = Vec::new();
        for ((dimension, segment, facet), scores) in &cells {
            if seg_idx.is_some() && !kept_segments.contains(segment) {
                continue;
            }
            if fac_idx.is_some() && !kept_facets.contains(facet) {
                continue;
            }
            let Some(mean) = stats::mean(scores) else {
                continue;
            };
            let std = stats::sample_std(scores).unwrap_or(0.0);
            let overall_mean = overall.get(dimension).and_then(|v| stats::mean(v)).unwrap_or(mean);
            values.push(json!({
                "dimension_label": dimension,
                "segment": if segment.is_empty() { Value::Null } else { Value::String(segment.clone()) },
                "facet": if facet.is_empty() { Value::Null } else { Value::String(facet.clone()) },
                "mean_score": mean,
                "std_score": std,
                "lower": (mean - std).clamp(lo, hi),
                "upper": (mean + std).clamp(lo, hi),
                "n": scores.len(),
                "low_n": scores.len() < cfg.min_n,
                "overall_mean": overall_mean,
            }));
        }

        if values.is_empty() {
            return Err(Error::Chart("No usable Likert data for dispersion computation".to_string()));
        }

        let x = json!({
            "field": "mean_score",
            "type": "quantitative",
            "title": "Score moyen (1-5)",
            "scale": {"domain": [lo, hi]}
        });
        let y = json!({
            "field": "dimension_label",
            "type": "nominal",
            "title": "Dimension QVCT",
            "sort": {"field": "overall_mean", "order": "descending"},
            "axis": {"labelLimit": 260, "labelPadding": 8}
        });
        let tooltip = json!([
            {"field": "dimension_label", "type": "nominal", "title": "Dimension"},
            {"field": "segment", "type": "nominal"},
            {"field": "facet", "type": "nominal"},
            {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Moyenne"},
            {"field": "std_score", "type": "quantitative", "format": ".2f", "title": "Écart-type"},
            {"field": "lower", "type": "quantitative", "format": ".2f", "title": "Moyenne - 1 SD"},
            {"field": "upper", "type": "quantitative", "format": ".2f", "title": "Moyenne + 1 SD"},
            {"field": "n", "type": "quantitative", "title": "Répondants"}
        ]);

        let chart = if cfg.segment_field.is_some() {
            json!({
                "layer": [
                    {
                        "mark": "bar",
                        "encoding": {
                            "y": y,
                            "yOffset": {"field": "segment", "type": "nominal"},
                            "x": x,
                            "color": {"field": "segment", "type": "nominal", "title": cfg.segment_field},
                            "tooltip": tooltip,
                        }
                    },
                    {
                        "mark": "errorbar",
                        "encoding": {
                            "y": y,
                            "yOffset": {"field": "segment", "type": "nominal"},
                            "x": {"field": "lower", "type": "quantitative", "scale": {"domain": [lo, hi]}},
                            "x2": {"field": "upper"},
                            "color": {"value": "black"},
                            "tooltip": tooltip,
                        }
                    }
                ],
                "height": {"step": 30}
            })
        } else {
            json!({
                "layer": [
                    {
                        "mark": "bar",
                        "encoding": {
                            "y": y,
                            "x": x,
                            "color": {
                                "field": "mean_score",
                                "type": "quantitative",
                                "scale": {"scheme": "blues"},
                                "legend": null
                            },
                            "tooltip": tooltip,
                        }
                    },
                    {
                        "mark": "errorbar",
                        "encoding": {
                            "y": y,
                            "x": {"field": "lower", "type": "quantitative", "scale": {"domain": [lo, hi]}},
                            "x2": {"field": "upper"},
                            "tooltip": tooltip,
                        }
                    }
                ],
                "height": {"step": 22}
            })
        };

        let mut spec = json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "padding": {"left": 120, "right": 40},
        });
        for (key, value) in chart.as_object().unwrap() {
            spec[key] = value.clone();
        }
        if cfg.facet_field.is_some() {
            let inner = spec["layer"].take();
            let height = spec["height"].take();
            spec.as_object_mut().unwrap().remove("layer");
            spec.as_object_mut().unwrap().remove("height");
            spec["facet"] = json!({"column": {"field": "facet", "type": "nominal", "title": cfg.facet_field}});
            spec["spec"] = json!({"layer": inner, "height": height});
        }
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    fn survey() -> ChartData {
        let rows = (0..8)
            .map(|i| {
                vec![
                    Cell::Number(if i % 2 == 0 { 1.0 } else { 2.0 }),
                    Cell::Number(2.0 + (i % 4) as f64),
                ]
            })
            .collect();
        let ds = Dataset::new("survey", vec!["Sexe".into(), "PGC1".into()], rows);
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn bars_carry_mean_and_dispersion_bounds() {
        let spec = DimensionCiBarsStrategy.generate(&survey(), &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        let row = &values[0];
        assert!(row["lower"].as_f64().unwrap() <= row["mean_score"].as_f64().unwrap());
        assert!(row["upper"].as_f64().unwrap() >= row["mean_score"].as_f64().unwrap());
        assert_eq!(row["low_n"], true);
    }

    #[test]
    fn segmentation_produces_one_row_per_segment() {
        let config: JsonMap = serde_json::from_str(r#"{"segment_field": "Sexe"}"#).unwrap();
        let spec = DimensionCiBarsStrategy.generate(&survey(), &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2);
    }
}
