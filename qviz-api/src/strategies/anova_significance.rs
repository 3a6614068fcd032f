//! Socio-demographic splits with significant dimension differences (ANOVA)

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::metrics::dimension_scores;
use qviz_common::stats;
use qviz_common::survey::{available_demographics, prefix_label, recode_demographics};
use qviz_common::{Error, Result};

use super::{cmp_f64, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `top_n`: keep the N most significant (dimension x demographic) pairs
///   (default 6)
/// - `columns`: sub-charts per row in the output grid (default 2)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    top_n: usize,
    columns: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config { top_n: 6, columns: 2 }
    }
}

/// Raw numeric demographics excluded from the grouping candidates; bands
/// carry the same information as ordered categories
const EXCLUDED_DEMOGRAPHICS: &[&str] = &["ID", "Age", "Ancienne", "Ancienneté"];

struct Combo {
    dimension_idx: usize,
    dimension_label: String,
    group_variable: String,
    p_value: f64,
    f_stat: f64,
    eta_squared: f64,
}

pub struct AnovaSignificanceStrategy;

impl ChartStrategy for AnovaSignificanceStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = recode_demographics(data.survey_for("ANOVA")?);

        let scores = dimension_scores(&survey)?;
        if scores.row_count() == 0 {
            return Err(Error::Chart("No Likert dimensions available for ANOVA".to_string()));
        }

        let demographics: Vec<String> = available_demographics(&survey)
            .into_iter()
            .filter(|d| !EXCLUDED_DEMOGRAPHICS.contains(&d.as_str()))
            .collect();

        let mut combos: Vec<Combo> = Vec::new();
        for (dim_idx, prefix) in scores.prefixes().iter().enumerate() {
            for demo in &demographics {
                let Some(demo_idx) = survey.column_index(demo) else {
                    continue;
                };

                let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
                for row in 0..scores.row_count() {
                    let Some(score) = scores.score(row, dim_idx) else {
                        continue;
                    };
                    let category = survey.cell(row, demo_idx).display();
                    if category.trim().is_empty() {
                        continue;
                    }
                    groups.entry(category).or_default().push(score);
                }

                let usable: Vec<Vec<f64>> = groups
                    .into_values()
                    .filter(|g| g.len() >= 2)
                    .collect();
                if usable.len() < 2 {
                    continue;
                }

                let Some(anova) = stats::one_way_anova(&usable) else {
                    continue;
                };
                combos.push(Combo {
                    dimension_idx: dim_idx,
                    dimension_label: prefix_label(prefix).to_string(),
                    group_variable: demo.clone(),
                    p_value: anova.p_value,
                    f_stat: anova.f_stat,
                    eta_squared: stats::eta_squared(&usable),
                });
            }
        }

        if combos.is_empty() {
            return Err(Error::Chart(
                "No significant dimension differences detected".to_string(),
            ));
        }

        combos.sort_by(|a, b| cmp_f64(a.p_value, b.p_value));
        combos.truncate(cfg.top_n);

        let mut charts = Vec::new();
        for combo in &combos {
            let demo_idx = survey.column_index(&combo.group_variable).unwrap();
            let mut groups: BTreeMap<String, Vec<f64>> = BTreeMap::new();
            for row in 0..scores.row_count() {
                let Some(score) = scores.score(row, combo.dimension_idx) else {
                    continue;
                };
                let category = survey.cell(row, demo_idx).display();
                if category.trim().is_empty() {
                    continue;
                }
                groups.entry(category).or_default().push(score);
            }

            let values: Vec<Value> = groups
                .iter()
                .filter_map(|(category, scores)| {
                    let n = scores.len();
                    let mean = stats::mean(scores)?;
                    let ci = if n > 1 {
                        stats::sample_std(scores)
                            .zip(stats::t_critical((n - 1) as f64, 0.95))
                            .map(|(std, t)| t * std / (n as f64).sqrt())
                            .unwrap_or(0.0)
                    } else {
                        0.0
                    };
                    Some(json!({
                        "group_value": category,
                        "mean": mean,
                        "lower": (mean - ci).max(1.0),
                        "upper": (mean + ci).min(5.0),
                        "n": n,
                        "p_value": combo.p_value,
                        "f_stat": combo.f_stat,
                        "eta_sq": combo.eta_squared,
                    }))
                })
                .collect();

            let title = format!(
                "{} (split: {}, p={:.3})",
                combo.dimension_label, combo.group_variable, combo.p_value
            );

            charts.push(json!({
                "title": title,
                "width": 250,
                "height": 180,
                "data": {"values": values},
                "layer": [
                    {
                        "mark": {"type": "bar", "opacity": 0.8},
                        "encoding": {
                            "x": {
                                "field": "group_value",
                                "type": "nominal",
                                "title": null,
                                "axis": {"labelAngle": -45, "labelLimit": 100}
                            },
                            "y": {
                                "field": "mean",
                                "type": "quantitative",
                                "title": "Moyenne (1-5)",
                                "scale": {"domain": [1, 5]}
                            },
                            "color": {
                                "field": "mean",
                                "type": "quantitative",
                                "scale": {"domain": [2.5, 3.5], "range": ["#EF4444", "#F59E0B", "#10B981"]},
                                "legend": null
                            },
                            "tooltip": [
                                {"field": "group_value", "type": "nominal", "title": "Groupe"},
                                {"field": "mean", "type": "quantitative", "format": ".2f", "title": "Moyenne"},
                                {"field": "lower", "type": "quantitative", "format": ".2f", "title": "CI Bas"},
                                {"field": "upper", "type": "quantitative", "format": ".2f", "title": "CI Haut"},
                                {"field": "n", "type": "quantitative", "title": "N"},
                                {"field": "p_value", "type": "quantitative", "format": ".3f", "title": "ANOVA p"},
                                {"field": "eta_sq", "type": "quantitative", "format": ".2f", "title": "Effet (η²)"}
                            ]
                        }
                    },
                    {
                        "mark": "errorbar",
                        "encoding": {
                            "x": {"field": "group_value", "type": "nominal"},
                            "y": {"field": "lower", "type": "quantitative", "title": ""},
                            "y2": {"field": "upper"}
                        }
                    }
                ]
            }));
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "concat": charts,
            "columns": cfg.columns,
            "resolve": {"scale": {"color": "independent"}},
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::{Cell, Dataset};
    use std::sync::Arc;

    #[test]
    fn distinct_groups_surface_as_significant() {
        // Men score COM low, women score it high
        let mut rows = Vec::new();
        for i in 0..12 {
            let (sexe, com) = if i % 2 == 0 { (1.0, 1.0 + (i % 3) as f64 * 0.1) } else { (2.0, 4.0 + (i % 3) as f64 * 0.1) };
            rows.push(vec![
                Cell::Number(i as f64),
                Cell::Number(sexe),
                Cell::Number(com),
            ]);
        }
        let ds = Dataset::new("survey", vec!["ID".into(), "Sexe".into(), "COM1".into()], rows);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = AnovaSignificanceStrategy.generate(&data, &JsonMap::new()).unwrap();
        let charts = spec["concat"].as_array().unwrap();
        assert!(!charts.is_empty());
        let values = charts[0]["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 2); // Homme / Femme
        let p = values[0]["p_value"].as_f64().unwrap();
        assert!(p < 0.05);
    }
}
