//! Scatter of dimensions: mean score versus leverage on an outcome
//!
//! Complements the priority index by making trade-offs visible: a low
//! score only matters if the dimension is associated with the outcome.

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::{Error, Result};

use super::drivers::{driver_rows, CorrMethod, Outcome};
use super::{ensure_not_empty, parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `outcome`: `"EPUI"` (default) or `"ENG"`
/// - `method`: `"pearson"` or `"spearman"` (default)
/// - `min_n`: minimum respondents per correlation (default 30)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    outcome: Option<String>,
    method: Option<String>,
    min_n: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            outcome: None,
            method: None,
            min_n: 30,
        }
    }
}

pub struct LeverageScatterStrategy;

impl ChartStrategy for LeverageScatterStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("leverage scatter")?;
        ensure_not_empty(survey, "the leverage scatter")?;

        let outcome = Outcome::parse(cfg.outcome.as_deref().unwrap_or("EPUI"))?;
        let method = CorrMethod::parse(cfg.method.as_deref().unwrap_or("spearman"))?;

        let rows = driver_rows(survey, None, outcome, method, cfg.min_n)?;
        if rows.is_empty() {
            return Err(Error::Chart("No usable dimension for the leverage scatter".to_string()));
        }

        let values: Vec<Value> = rows
            .iter()
            .map(|row| {
                json!({
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
            Outcome::Epui => "Carte des leviers vs Épuisement",
            Outcome::Eng => "Carte des leviers vs Engagement",
        };

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "title": title,
            "data": {"values": values},
            "layer": [
                {
                    "mark": {"type": "circle", "opacity": 0.85},
                    "encoding": {
                        "x": {
                            "field": "mean_score",
                            "type": "quantitative",
                            "title": "Score moyen (1-5)",
                            "scale": {"domain": [1, 5]}
                        },
                        "y": {
                            "field": "leverage",
                            "type": "quantitative",
                            "title": "Levier (association)",
                            "scale": {"domain": [0, 1]}
                        },
                        "size": {
                            "field": "priority_index",
                            "type": "quantitative",
                            "title": "Priorité",
                            "scale": {"range": [50, 900]}
                        },
                        "color": {
                            "field": "priority_index",
                            "type": "quantitative",
                            "title": "Priorité",
                            "scale": {"scheme": "redyellowgreen"}
                        },
                        "tooltip": [
                            {"field": "dimension_label", "type": "nominal"},
                            {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Score moyen"},
                            {"field": "gap_to_5", "type": "quantitative", "format": ".2f", "title": "Écart à 5"},
                            {"field": "corr_with_outcome", "type": "quantitative", "format": ".2f", "title": format!("Corr. avec {}", outcome.prefix())},
                            {"field": "leverage", "type": "quantitative", "format": ".2f", "title": "Levier"},
                            {"field": "priority_index", "type": "quantitative", "format": ".3f", "title": "Priorité"},
                            {"field": "n", "type": "quantitative", "title": "N"}
                        ]
                    }
                },
                {
                    "mark": {"type": "text", "dx": 8, "dy": -8, "fontSize": 11, "color": "#111827"},
                    "encoding": {
                        "x": {"field": "mean_score", "type": "quantitative"},
                        "y": {"field": "leverage", "type": "quantitative"},
                        "text": {"field": "dimension_prefix", "type": "nominal"}
                    }
                }
            ]
        }))
    }
}
