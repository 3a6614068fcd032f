//! Decision-aid ranking: which dimensions are the best action priorities
//!
//! For each dimension, the correlation between its per-respondent score and
//! an outcome score (exhaustion or engagement) gives a leverage proxy;
//! multiplied by the room left to improve it yields a heuristic priority
//! index, not causal proof.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::{Error, Result};

use super::drivers::{driver_rows, CorrMethod, Outcome};
use super::{cmp_f64, ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `outcome`: `"EPUI"` (default) or `"ENG"`
/// - `method`: `"pearson"` or `"spearman"` (default, robust to outliers)
/// - `min_n`: minimum respondents per correlation (default 30)
/// - `segment_field`: rank within a demographic segment
/// - `top_n`: displayed dimensions per segment (default 12)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    outcome: Option<String>,
    method: Option<String>,
    min_n: usize,
    segment_field: Option<String>,
    top_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            outcome: None,
            method: None,
            min_n: 30,
            segment_field: None,
            top_n: 12,
        }
    }
}

pub struct ActionPriorityIndexStrategy;

impl ChartStrategy for ActionPriorityIndexStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("action priority index")?;
        ensure_not_empty(survey, "the priority index")?;

        let outcome = Outcome::parse(cfg.outcome.as_deref().unwrap_or("EPUI"))?;
        let method = CorrMethod::parse(cfg.method.as_deref().unwrap_or("spearman"))?;

        let mut rows = driver_rows(
            survey,
            cfg.segment_field.as_deref(),
            outcome,
            method,
            cfg.min_n,
        )?;
        if rows.is_empty() {
            return Err(Error::Chart(
                "No dimension meets the min_n criteria for the priority index".to_string(),
            ));
        }

        // Top N per segment, highest priority first
        rows.sort_by(|a, b| {
            a.segment
                .cmp(&b.segment)
                .then_with(|| cmp_f64(b.priority, a.priority))
        });
        let mut kept_per_segment: BTreeMap<String, usize> = BTreeMap::new();
        rows.retain(|row| {
            let kept = kept_per_segment.entry(row.segment.clone()).or_default();
            *kept += 1;
            *kept <= cfg.top_n
        });

        let multi_segment = rows
            .iter()
            .any(|r| r.segment != rows[0].segment);

        let values: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
                    "segment": row.segment,
                    "dimension_prefix": row.prefix,
                    "dimension_label": row.label,
                    "mean_score": row.mean_score,
                    "gap_to_5": row.gap_to_5,
                    "corr_with_outcome": row.corr,
                    "leverage": row.leverage,
                    "priority_index": row.priority,
                    "n": row.n,
                })
            })
            .collect();

        let title = match outcome {
            Outcome::Epui => "Leviers de prévention de l'épuisement",
            Outcome::Eng => "Leviers de promotion de l'engagement",
        };
        let color: Value = if multi_segment {
            json!({"field": "segment", "type": "nominal", "title": "Segment", "legend": {"orient": "bottom"}})
        } else {
            json!({"value": "#4F46E5"})
        };

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "title": {"text": title, "anchor": "start", "fontSize": 14},
            "data": {"values": values},
            "mark": {"type": "bar", "cornerRadiusTopRight": 4, "cornerRadiusBottomRight": 4},
            "encoding": {
                "y": {
                    "field": "dimension_label",
                    "type": "nominal",
                    "sort": "-x",
                    "title": null,
                    "axis": {"labelLimit": 280, "labelPadding": 12, "labelFontSize": 10}
                },
                "x": {
                    "field": "priority_index",
                    "type": "quantitative",
                    "title": "Indice de Priorité (Heuristique)",
                    "scale": {"zero": true},
                    "axis": {"grid": true, "gridDash": [2, 2], "titleFontSize": 11}
                },
                "color": color,
                "tooltip": [
                    {"field": "dimension_label", "type": "nominal", "title": "Dimension"},
                    {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Score moyen"},
                    {"field": "gap_to_5", "type": "quantitative", "format": ".2f", "title": "Marge d'amélioration"},
                    {"field": "corr_with_outcome", "type": "quantitative", "format": ".2f", "title": format!("Impact sur {}", outcome.prefix())},
                    {"field": "priority_index", "type": "quantitative", "format": ".3f", "title": "Priorité relative"},
                    {"field": "n", "type": "quantitative", "title": "Effectif"}
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

    fn survey(n: usize) -> ChartData {
        let rows = (0..n)
            .map(|i| {
                let com = 1.0 + (i % 5) as f64;
                vec![
                    Cell::Number(i as f64),
                    Cell::Number(com),
                    Cell::Number((6.0 - com).clamp(1.0, 5.0)),
                ]
            })
            .collect();
        let ds = Dataset::new("survey", vec!["ID".into(), "COM1".into(), "EPUI1".into()], rows);
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn ranks_by_priority_index() {
        let spec = ActionPriorityIndexStrategy.generate(&survey(40), &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["dimension_prefix"], "COM");
        assert!(values[0]["priority_index"].as_f64().unwrap() > 0.0);
    }

    #[test]
    fn invalid_outcome_is_rejected() {
        let config: JsonMap = serde_json::from_str(r#"{"outcome": "FOO"}"#).unwrap();
        assert!(ActionPriorityIndexStrategy.generate(&survey(40), &config).is_err());
    }

    #[test]
    fn below_min_n_is_a_chart_error() {
        assert!(ActionPriorityIndexStrategy.generate(&survey(10), &JsonMap::new()).is_err());
    }
}
