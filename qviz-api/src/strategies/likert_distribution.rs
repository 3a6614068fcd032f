//! Diverging stacked-bar distribution of Likert responses
//!
//! Supports survey data in wide format (one Likert item column per
//! question) or long format (`question_label` / `response_value`). The
//! produced spec carries every question plus one rollup row per dimension,
//! with dropdown parameters embedded so the client can drill into a
//! dimension without a new request.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Value};

use qviz_common::survey::{has_long_format, recode_demographics, to_likert_long, detect_likert_columns};
use qviz_common::{Dataset, Error, Result};

use super::{parse_config, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

/// Config:
/// - `focus`: `"lowest"` (default) or `"highest"` — which end of the
///   ordering metric reads first
/// - `sort`: `"net_agreement"` (default) or `"mean"` — the ordering metric
/// - `segment_field`: include a segment in the aggregation and expose a
///   dropdown for it
/// - `facet_field`: independent sub-chart per category
/// - `interactive_dimension`: dimension dropdown in the spec (default true)
#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    focus: String,
    sort: String,
    segment_field: Option<String>,
    facet_field: Option<String>,
    interactive_dimension: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            focus: "lowest".to_string(),
            sort: "net_agreement".to_string(),
            segment_field: None,
            facet_field: None,
            interactive_dimension: true,
        }
    }
}

/// Response counts for one aggregation cell
#[derive(Default, Clone)]
struct Counts([usize; 5]);

impl Counts {
    fn add(&mut self, response: usize) {
        self.0[response - 1] += 1;
    }

    fn total(&self) -> usize {
        self.0.iter().sum()
    }

    fn mean(&self) -> f64 {
        let total = self.total().max(1) as f64;
        self.0
            .iter()
            .enumerate()
            .map(|(i, c)| (i + 1) as f64 * *c as f64)
            .sum::<f64>()
            / total
    }

    fn net_agreement(&self) -> f64 {
        let total = self.total().max(1) as f64;
        ((self.0[3] + self.0[4]) as f64 - (self.0[0] + self.0[1]) as f64) / total
    }
}

/// Leading alphabetic run of a long-format question label
fn derive_prefix(label: &str) -> String {
    label
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_uppercase()
}

pub struct LikertDistributionStrategy;

impl ChartStrategy for LikertDistributionStrategy {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value> {
        let cfg: Config = parse_config(config)?;
        let survey = recode_demographics(data.survey_for("likert distribution")?);
        if survey.is_empty() {
            return Err(Error::Chart(
                "Empty dataset after filtering for the Likert distribution".to_string(),
            ));
        }

        if cfg.focus != "lowest" && cfg.focus != "highest" {
            return Err(Error::Chart("focus must be 'lowest' or 'highest'".to_string()));
        }
        if cfg.sort != "net_agreement" && cfg.sort != "mean" {
            return Err(Error::Chart("sort must be 'net_agreement' or 'mean'".to_string()));
        }
        for (field, role) in [(&cfg.segment_field, "segment_field"), (&cfg.facet_field, "facet_field")] {
            if let Some(field) = field {
                if !survey.has_column(field) {
                    return Err(Error::Chart(format!("{} '{}' not found in dataset", role, field)));
                }
            }
        }

        let long: Dataset = if has_long_format(&survey) {
            survey.clone()
        } else {
            let likert_cols = detect_likert_columns(&survey);
            if likert_cols.is_empty() {
                return Err(Error::Chart("No Likert columns detected for distribution".to_string()));
            }
            let extra: Vec<String> = cfg
                .segment_field
                .iter()
                .chain(cfg.facet_field.iter())
                .cloned()
                .collect();
            to_likert_long(&survey, &likert_cols, &extra)
        };

        let label_idx = long.column_index("question_label").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();
        let prefix_idx = long.column_index("dimension_prefix");
        let seg_idx = cfg.segment_field.as_deref().and_then(|f| long.column_index(f));
        let fac_idx = cfg.facet_field.as_deref().and_then(|f| long.column_index(f));

        // (question, prefix, segment, facet) -> counts, plus the dimension rollup
        let mut questions: BTreeMap<(String, String, String, String), Counts> = BTreeMap::new();
        let mut categories: BTreeMap<(String, String, String), Counts> = BTreeMap::new();
        for row in long.rows() {
            let Some(value) = row[resp_idx].as_number() else {
                continue;
            };
            let response = value as i64;
            if !(1..=5).contains(&response) {
                continue;
            }
            let question = row[label_idx].display();
            if question.trim().is_empty() {
                continue;
            }
            let prefix = match prefix_idx {
                Some(idx) => row[idx].display(),
                None => derive_prefix(&question),
            };
            let segment = seg_idx.map(|i| row[i].display()).unwrap_or_default();
            let facet = fac_idx.map(|i| row[i].display()).unwrap_or_default();

            questions
                .entry((question, prefix.clone(), segment.clone(), facet.clone()))
                .or_default()
                .add(response as usize);
            categories
                .entry((prefix, segment, facet))
                .or_default()
                .add(response as usize);
        }

        if questions.is_empty() {
            return Err(Error::Chart(
                "No Likert responses in range for the distribution".to_string(),
            ));
        }

        let sort_metric = |c: &Counts| -> f64 {
            if cfg.sort == "mean" {
                c.mean()
            } else {
                c.net_agreement()
            }
        };

        let mut values = Vec::new();
        let mut emit = |display_label: &str,
                        question_label: &str,
                        prefix: &str,
                        segment: &str,
                        facet: &str,
                        counts: &Counts,
                        is_category: bool| {
            let total = counts.total();
            if total == 0 {
                return;
            }
            for (i, count) in counts.0.iter().enumerate() {
                if *count == 0 {
                    continue;
                }
                values.push(json!({
                    "display_label": display_label,
                    "question_label": question_label,
                    "dimension_prefix": prefix,
                    "segment": if segment.is_empty() { Value::Null } else { Value::String(segment.to_string()) },
                    "facet": if facet.is_empty() { Value::Null } else { Value::String(facet.to_string()) },
                    "response_value": i + 1,
                    "count": count,
                    "total": total,
                    "share": *count as f64 / total as f64,
                    "mean": counts.mean(),
                    "net_agreement": counts.net_agreement(),
                    "sort_value": sort_metric(counts),
                    "is_category": if is_category { 1 } else { 0 },
                }));
            }
        };

        for ((prefix, segment, facet), counts) in &categories {
            emit(prefix, "Category Summary", prefix, segment, facet, counts, true);
        }
        for ((question, prefix, segment, facet), counts) in &questions {
            emit(question, question, prefix, segment, facet, counts, false);
        }

        let mut dims: Vec<String> = categories
            .keys()
            .map(|(prefix, _, _)| prefix.clone())
            .filter(|p| !p.trim().is_empty())
            .collect();
        dims.sort();
        dims.dedup();

        let mut params = Vec::new();
        let mut filters = Vec::new();

        if cfg.interactive_dimension && !dims.is_empty() {
            let mut options = vec!["All".to_string()];
            options.extend(dims);
            params.push(json!({
                "name": "dim_select",
                "value": "All",
                "bind": {"input": "select", "options": options, "name": "Dimension: "}
            }));
            filters.push(json!({
                "filter": "(dim_select == 'All' && datum.is_category == 1) || (dim_select != 'All' && datum.dimension_prefix == dim_select && datum.is_category == 0)"
            }));
        } else {
            filters.push(json!({"filter": "datum.is_category == 1"}));
        }

        if seg_idx.is_some() {
            let mut seg_values: Vec<String> = questions
                .keys()
                .map(|(_, _, segment, _)| segment.clone())
                .filter(|s| !s.is_empty())
                .collect();
            seg_values.sort();
            seg_values.dedup();
            let mut options = vec!["All".to_string()];
            options.extend(seg_values);
            params.push(json!({
                "name": "segment_select",
                "value": "All",
                "bind": {"input": "select", "options": options, "name": format!("{}: ", cfg.segment_field.as_deref().unwrap_or("Segment"))}
            }));
            filters.push(json!({
                "filter": "segment_select == 'All' || datum.segment == segment_select"
            }));
        }

        let encoding = json!({
            "y": {
                "field": "display_label",
                "type": "nominal",
                "title": "Catégorie / Question",
                "sort": {
                    "field": "sort_value",
                    "order": if cfg.focus == "lowest" { "ascending" } else { "descending" }
                },
                "axis": {"labelLimit": 350, "labelPadding": 8}
            },
            "x": {
                "field": "share",
                "type": "quantitative",
                "stack": "normalize",
                "axis": {"title": "Répartition des réponses", "format": "%"}
            },
            "color": {
                "field": "response_value",
                "type": "ordinal",
                "title": "Réponse (1–5)",
                "sort": [1, 2, 3, 4, 5],
                "scale": {
                    "domain": [1, 2, 3, 4, 5],
                    "range": ["#B91C1C", "#FCA5A5", "#D1D5DB", "#93C5FD", "#1D4ED8"]
                }
            },
            "tooltip": [
                {"field": "display_label", "type": "nominal", "title": "Label"},
                {"field": "dimension_prefix", "type": "nominal", "title": "Dimension"},
                {"field": "response_value", "type": "ordinal", "title": "Réponse"},
                {"field": "count", "type": "quantitative", "title": "N (segment)", "format": ".0f"},
                {"field": "share", "type": "quantitative", "title": "Part", "format": ".1%"},
                {"field": "mean", "type": "quantitative", "title": "Moyenne", "format": ".2f"},
                {"field": "net_agreement", "type": "quantitative", "title": "Net agreement", "format": ".1%"}
            ]
        });

        let mut spec = json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "transform": filters,
            "params": params,
        });

        if fac_idx.is_some() {
            spec["facet"] = json!({"column": {"field": "facet", "type": "nominal", "title": cfg.facet_field}});
            spec["spec"] = json!({"mark": "bar", "encoding": encoding});
            spec["resolve"] = json!({"scale": {"y": "independent"}});
            spec["title"] = json!(format!(
                "Distribution Likert par {}",
                cfg.facet_field.as_deref().unwrap_or("facette")
            ));
        } else {
            spec["mark"] = json!("bar");
            spec["encoding"] = encoding;
            spec["title"] = json!("Distribution des réponses (Likert)");
        }

        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qviz_common::Cell;
    use std::sync::Arc;

    fn survey() -> ChartData {
        let rows = vec![
            vec![Cell::Number(1.0), Cell::Number(1.0), Cell::Number(4.0)],
            vec![Cell::Number(2.0), Cell::Number(2.0), Cell::Number(4.0)],
            vec![Cell::Number(3.0), Cell::Number(1.0), Cell::Number(5.0)],
        ];
        let ds = Dataset::new("survey", vec!["ID".into(), "Sexe".into(), "PGC2".into()], rows);
        let arc = Arc::new(ds);
        ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        }
    }

    #[test]
    fn shares_sum_to_one_per_question() {
        let spec = LikertDistributionStrategy.generate(&survey(), &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        let question_share: f64 = values
            .iter()
            .filter(|v| v["is_category"] == 0)
            .map(|v| v["share"].as_f64().unwrap())
            .sum();
        assert!((question_share - 1.0).abs() < 1e-9);
        // Rollup row mirrors the single-question distribution
        assert!(values.iter().any(|v| v["is_category"] == 1 && v["display_label"] == "PGC"));
    }

    #[test]
    fn dimension_dropdown_is_embedded() {
        let spec = LikertDistributionStrategy.generate(&survey(), &JsonMap::new()).unwrap();
        let params = spec["params"].as_array().unwrap();
        assert_eq!(params[0]["name"], "dim_select");
        let options = params[0]["bind"]["options"].as_array().unwrap();
        assert!(options.contains(&json!("All")));
        assert!(options.contains(&json!("PGC")));
    }

    #[test]
    fn out_of_range_values_are_excluded() {
        let rows = vec![
            vec![Cell::Number(4.0)],
            vec![Cell::Number(9.0)], // filtered out
        ];
        let ds = Dataset::new("survey", vec!["COM1".into()], rows);
        let arc = Arc::new(ds);
        let data = ChartData {
            hr: arc.clone(),
            survey: Some(arc),
        };
        let spec = LikertDistributionStrategy.generate(&data, &JsonMap::new()).unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert!(values.iter().all(|v| v["response_value"] != 9));
        let q_row = values.iter().find(|v| v["is_category"] == 0).unwrap();
        assert_eq!(q_row["total"], 1);
    }

    #[test]
    fn invalid_focus_is_rejected() {
        let config: JsonMap = serde_json::from_str(r#"{"focus": "middle"}"#).unwrap();
        assert!(LikertDistributionStrategy.generate(&survey(), &config).is_err());
    }
}
