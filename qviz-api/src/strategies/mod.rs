//! Visualization strategies
//!
//! One module per chart. Every strategy is a stateless transformation from
//! the prepared datasets plus its own typed configuration into an opaque,
//! JSON-serializable Vega-Lite document. Filters are applied by the
//! orchestrator before dispatch, so strategies never see them and cannot
//! re-filter.
//!
//! To add a new chart: create a module here, implement `ChartStrategy`,
//! and register the key in `registry::default_registry`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use qviz_common::{Dataset, Error, Result};

pub mod action_priority_index;
pub mod anova_significance;
pub mod benchmark_bullet;
pub mod clustering_profile;
pub mod correlation_matrix;
pub mod demographic_distribution;
pub mod dimension_boxplot;
pub mod dimension_ci_bars;
pub mod dimension_heatmap;
pub mod dimension_mean_std_scatter;
pub mod dimension_summary;
pub mod distribution_anomalies;
mod drivers;
pub mod eng_epui_quadrants;
pub mod example_new_chart;
pub mod importance_performance_matrix;
pub mod leverage_scatter;
pub mod likert_distribution;
pub mod likert_item_heatmap;
pub mod predictive_simulation;
pub mod scatter_regression;
pub mod time_series;
pub mod time_series_ci;

/// Free-form configuration map as received past the transport boundary
pub type JsonMap = Map<String, Value>;

/// Vega-Lite schema identifier stamped on every produced spec
pub const VEGA_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// The two prepared tables handed to a strategy.
///
/// In single-file mode `survey` shares the HR table's allocation.
pub struct ChartData {
    pub hr: Arc<Dataset>,
    pub survey: Option<Arc<Dataset>>,
}

impl ChartData {
    /// The survey-role table, or a chart error naming the requesting chart
    pub fn survey_for(&self, what: &str) -> Result<&Dataset> {
        self.survey
            .as_deref()
            .ok_or_else(|| Error::Chart(format!("Survey data required for {}", what)))
    }
}

/// Strategy for producing a Vega-Lite spec from the prepared datasets
pub trait ChartStrategy: Send + Sync {
    fn generate(&self, data: &ChartData, config: &JsonMap) -> Result<Value>;
}

/// Deserialize the free-form config map into a strategy's typed config.
///
/// Unknown keys are ignored (the rewritten config may carry fields meant
/// for other charts); type mismatches surface as chart errors.
pub fn parse_config<T: DeserializeOwned + Default>(config: &JsonMap) -> Result<T> {
    if config.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_value(Value::Object(config.clone()))
        .map_err(|e| Error::Chart(format!("Invalid chart config: {}", e)))
}

/// Chart error when a configured field does not exist in the dataset
pub fn check_field(dataset: &Dataset, field: &str, role: &str) -> Result<()> {
    if dataset.has_column(field) {
        Ok(())
    } else {
        Err(Error::Chart(format!(
            "{} '{}' not found in dataset",
            role, field
        )))
    }
}

/// Chart error when nothing is left to visualize
pub fn ensure_not_empty(dataset: &Dataset, context: &str) -> Result<()> {
    if dataset.is_empty() {
        Err(Error::Chart(format!(
            "Empty dataset after filtering for {}",
            context
        )))
    } else {
        Ok(())
    }
}

/// Total-order comparison for sorting rows on a float key
pub fn cmp_f64(a: f64, b: f64) -> std::cmp::Ordering {
    a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal)
}

/// Melt a wide-format survey table to Likert long format, failing with a
/// chart error naming the requesting chart when no items are detected
pub(crate) fn melt_survey(survey: &Dataset, what: &str, extra_id_vars: &[String]) -> Result<Dataset> {
    let likert_cols = qviz_common::survey::detect_likert_columns(survey);
    if likert_cols.is_empty() {
        return Err(Error::Chart(format!(
            "No Likert columns detected for {}",
            what
        )));
    }
    Ok(qviz_common::survey::to_likert_long(
        survey,
        &likert_cols,
        extra_id_vars,
    ))
}
