//! Respondent segmentation by QVT profile (k-means)
//!
//! Clusters respondents on their standardized dimension-score vectors and
//! renders each cluster's average profile as a heatmap. When `k` is not
//! supplied, it is chosen with a relative distortion-reduction elbow over
//! k = 1 .. min(6, n/5).

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use qviz_common::metrics::dimension_scores;
use qviz_common::stats::{self, kmeans, whiten};
use qviz_common::survey::prefix_label;
use qviz_common::{Error, Result};

use super::{parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `k`: number of clusters; chosen automatically when absent
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Config {
    k: Option<usize>,
}

const MIN_RESPONDENTS: usize = 20;
const MAX_AUTO_K: usize = 6;
/// Stop growing k once the relative distortion gain falls below this
const ELBOW_GAIN: f64 = 0.15;
/// Fixed k-means seed: identical requests must produce identical specs
const KMEANS_SEED: u64 = 0x5eed;

fn auto_select_k(points: &[Vec<f64>]) -> usize {
    let max_k = MAX_AUTO_K.min(points.len() / 5).max(1);
    let mut previous: Option<f64> = None;
    let mut chosen = 1;
    for k in 1..=max_k {
        let Some(fit) = kmeans(points, k, KMEANS_SEED) else {
            break;
        };
        if let Some(prev) = previous {
            if prev <= 0.0 {
                break;
            }
            let gain = (prev - fit.distortion) / prev;
            if gain < ELBOW_GAIN {
                break;
            }
        }
        chosen = k;
        previous = Some(fit.distortion);
    }
    chosen
}

pub struct ClusteringProfileStrategy;

impl ChartStrategy for ClusteringProfileStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = data.survey_for("clustering")?;

        let scores = dimension_scores(survey)?;
        let complete = scores.complete_rows();
        if complete.len() < MIN_RESPONDENTS {
            return Err(Error::Chart(format!(
                "Not enough data for clustering (min {})",
                MIN_RESPONDENTS
            )));
        }

        let dims = scores.prefixes().to_vec();
        let points: Vec<Vec<f64>> = complete
            .iter()
            .map(|&row| {
                (0..dims.len())
                    .map(|d| scores.score(row, d).unwrap())
                    .collect()
            })
            .collect();
        let whitened = whiten(&points);

        let k = match cfg.k {
            Some(k) if k >= 1 => k,
            Some(_) => return Err(Error::Chart("k must be at least 1".to_string())),
            None => auto_select_k(&whitened),
        };
        debug!(k, respondents = complete.len(), "clustering profile fit");

        let fit = kmeans(&whitened, k, KMEANS_SEED)
            .ok_or_else(|| Error::Chart("Clustering failed: more clusters than respondents".to_string()))?;

        // Centroids on the original 1-5 scale for interpretability
        let mut values = Vec::new();
        for cluster in 0..k {
            let members: Vec<usize> = (0..points.len())
                .filter(|&i| fit.labels[i] == cluster)
                .collect();
            if members.is_empty() {
                continue;
            }
            let label = format!("Groupe {} (n={})", cluster + 1, members.len());
            for (d, prefix) in dims.iter().enumerate() {
                let mean = stats::mean(
                    &members.iter().map(|&i| points[i][d]).collect::<Vec<f64>>(),
                )
                .unwrap_or(0.0);
                values.push(json!({
                    "cluster_label": label,
                    "dimension": prefix,
                    "dimension_label": prefix_label(prefix),
                    "mean_score": mean,
                    "count": members.len(),
                }));
            }
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "title": "Profils Types (Clustering)",
            "data": {"values": values},
            "layer": [
                {
                    "mark": "rect",
                    "encoding": {
                        "x": {
                            "field": "dimension_label",
                            "type": "nominal",
                            "title": "Dimension",
                            "axis": {"labelAngle": -45}
                        },
                        "y": {"field": "cluster_label", "type": "nominal", "title": "Profil (Cluster)"},
                        "color": {
                            "field": "mean_score",
                            "type": "quantitative",
                            "title": "Score Moyen",
                            "scale": {"domain": [1, 5], "scheme": "redyellowgreen"}
                        },
                        "tooltip": [
                            {"field": "cluster_label", "type": "nominal", "title": "Groupe"},
                            {"field": "dimension_label", "type": "nominal", "title": "Dimension"},
                            {"field": "mean_score", "type": "quantitative", "format": ".2f", "title": "Score"}
                        ]
                    }
                },
                {
                    "mark": {"type": "text", "size": 10},
                    "encoding": {
                        "x": {"field": "dimension_label", "type": "nominal"},
                        "y": {"field": "cluster_label", "type": "nominal"},
                        "text": {"field": "mean_score", "type": "quantitative", "format": ".1f"},
                        "color": {
                            "condition": {
                                "test": "datum.mean_score < 2.5 || datum.mean_score > 4.0",
                                "value": "white"
                            },
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

    fn survey(n: usize) -> ChartData {
        // Two obvious profiles: satisfied versus exhausted
        let rows = (0..n)
            .map(|i| {
                let (com, epui) = if i % 2 == 0 { (4.5, 1.5) } else { (1.5, 4.5) };
                vec![Cell::Number(com), Cell::Number(epui)]
            })
            .collect();
        let ds = Dataset::new("survey", vec!["COM1".into(), "EPUI1".into()], rows);
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn needs_twenty_respondents() {
        assert!(ClusteringProfileStrategy.generate(&survey(10), &JsonMap::new()).is_err());
    }

    #[test]
    fn explicit_k_drives_the_cluster_count() {
        let config: JsonMap = serde_json::from_str(r#"{"k": 2}"#).unwrap();
        let spec = ClusteringProfileStrategy.generate(&survey(40), &config).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let clusters: std::collections::BTreeSet<&str> = values
            .iter()
            .map(|v| v["cluster_label"].as_str().unwrap())
            .collect();
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn auto_k_finds_the_two_profiles() {
        let spec = ClusteringProfileStrategy.generate(&survey(40), &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let clusters: std::collections::BTreeSet<&str> = values
            .iter()
            .map(|v| v["cluster_label"].as_str().unwrap())
            .collect();
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn repeated_runs_produce_identical_specs() {
        let a = ClusteringProfileStrategy.generate(&survey(40), &JsonMap::new()).unwrap();
        let b = ClusteringProfileStrategy.generate(&survey(40), &JsonMap::new()).unwrap();
        assert_eq!(a, b);
    }
}
