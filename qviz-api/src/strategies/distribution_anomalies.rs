//! Detects skewed or uniform Likert item distributions

use std::collections::BTreeMap;

use serde_json::{json, Value};

use qviz_common::stats;
use qviz_common::survey::{classify_distribution, DistributionShape};
use qviz_common::{Error, Result};

use super::{melt_survey, ChartData, ChartStrategy, JsonMap, VEGA_SCHEMA};

pub struct DistributionAnomaliesStrategy;

impl ChartStrategy for DistributionAnomaliesStrategy {
    fn generate(&self, data: &ChartData, _config: &JsonMap) -> Result<Value> {
        let survey = data.survey_for("distribution anomalies")?;
        let long = melt_survey(survey, "distribution anomalies", &[])?;

        let label_idx = long.column_index("question_label").unwrap();
        let resp_idx = long.column_index("response_value").unwrap();

        let mut questions: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for row in long.rows() {
            if let Some(value) = row[resp_idx].as_number() {
                questions
                    .entry(row[label_idx].display())
                    .or_default()
                    .push(value);
            }
        }

        let mut values = Vec::new();
        for (question, responses) in &questions {
            let shape = classify_distribution(responses);
            if shape == DistributionShape::InsufficientData {
                continue;
            }
            values.push(json!({
                "question_label": question,
                "skewness": stats::skewness(responses),
                "mean": stats::mean(responses),
                "std": stats::sample_std(responses),
                "classification": shape.as_str(),
            }));
        }

        if values.is_empty() {
            return Err(Error::Chart("No analyzable distributions found".to_string()));
        }

        Ok(json!({
            "$schema": VEGA_SCHEMA,
            "data": {"values": values},
            "mark": "bar",
            "width": "container",
            "encoding": {
                "y": {"field": "question_label", "type": "nominal", "sort": "-x", "title": "Question"},
                "x": {"field": "skewness", "type": "quantitative", "title": "Asymétrie (skew)"},
                "color": {"field": "classification", "type": "nominal", "title": "Profil"},
                "tooltip": [
                    {"field": "question_label", "type": "nominal"},
                    {"field": "skewness", "type": "quantitative", "format": ".2f"},
                    {"field": "mean", "type": "quantitative", "format": ".2f"},
                    {"field": "std", "type": "quantitative", "format": ".2f"},
                    {"field": "classification", "type": "nominal"}
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

    #[test]
    fn skewed_items_are_classified() {
        let mut rows = Vec::new();
        for _ in 0..20 {
            rows.push(vec![Cell::Number(1.0), Cell::Number(1.0)]);
        }
        for _ in 0..4 {
            rows.push(vec![Cell::Number(2.0), Cell::Number(5.0)]);
        }
        rows.push(vec![Cell::Number(5.0), Cell::Number(5.0)]);
        let survey = Dataset::new("survey", vec!["PGC1".into(), "ID".into()], rows);
        let data = ChartData {
            hr: Arc::new(survey.clone()),
            survey: Some(Arc::new(survey)),
        };
        let spec = DistributionAnomaliesStrategy
            .generate(&data, &JsonMap::new())
            .unwrap();
        let values = spec["data"]["values"].as_array().unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["classification"], "skew_right");
    }
}
