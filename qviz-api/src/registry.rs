//! Strategy registry: key → visualization strategy
//!
//! Built once during application startup by `default_registry` and injected
//! into the request handler behind an `Arc`; read-only afterwards, so no
//! locking is needed on the request path.

use std::collections::HashMap;
use std::sync::Arc;

use crate::strategies::{
    action_priority_index::ActionPriorityIndexStrategy,
    anova_significance::AnovaSignificanceStrategy,
    benchmark_bullet::BenchmarkBulletStrategy,
    clustering_profile::ClusteringProfileStrategy,
    correlation_matrix::CorrelationMatrixStrategy,
    demographic_distribution::DemographicDistributionStrategy,
    dimension_boxplot::DimensionBoxplotStrategy,
    dimension_ci_bars::DimensionCiBarsStrategy,
    dimension_heatmap::DimensionHeatmapStrategy,
    dimension_mean_std_scatter::DimensionMeanStdScatterStrategy,
    dimension_summary::DimensionSummaryStrategy,
    distribution_anomalies::DistributionAnomaliesStrategy,
    eng_epui_quadrants::EngEpuiQuadrantsStrategy,
    example_new_chart::ExampleNewChartStrategy,
    importance_performance_matrix::ImportancePerformanceMatrixStrategy,
    leverage_scatter::LeverageScatterStrategy,
    likert_distribution::LikertDistributionStrategy,
    likert_item_heatmap::LikertItemHeatmapStrategy,
    predictive_simulation::PredictiveSimulationStrategy,
    scatter_regression::ScatterRegressionStrategy,
    time_series::TimeSeriesStrategy,
    time_series_ci::TimeSeriesCiStrategy,
    ChartStrategy,
};

/// Key → strategy lookup table
#[derive(Default)]
pub struct StrategyRegistry {
    strategies: HashMap<String, Arc<dyn ChartStrategy>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        StrategyRegistry {
            strategies: HashMap::new(),
        }
    }

    /// Register a strategy under a key; the last registration wins
    pub fn register(&mut self, key: impl Into<String>, strategy: Arc<dyn ChartStrategy>) {
        self.strategies.insert(key.into(), strategy);
    }

    /// Total lookup: `None` for unregistered keys, never panics
    pub fn get(&self, key: &str) -> Option<Arc<dyn ChartStrategy>> {
        self.strategies.get(key).cloned()
    }

    /// Sorted list of every registered key
    pub fn list_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.strategies.keys().cloned().collect();
        keys.sort();
        keys
    }
}

/// Build the registry with every default strategy
pub fn default_registry() -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    registry.register("time_series", Arc::new(TimeSeriesStrategy));
    registry.register("time_series_ci", Arc::new(TimeSeriesCiStrategy));
    registry.register("likert_distribution", Arc::new(LikertDistributionStrategy));
    registry.register("likert_item_heatmap", Arc::new(LikertItemHeatmapStrategy));
    registry.register("correlation_matrix", Arc::new(CorrelationMatrixStrategy));
    registry.register("distribution_anomalies", Arc::new(DistributionAnomaliesStrategy));
    registry.register("anova_significance", Arc::new(AnovaSignificanceStrategy));
    registry.register("dimension_summary", Arc::new(DimensionSummaryStrategy));
    registry.register("dimension_heatmap", Arc::new(DimensionHeatmapStrategy));
    registry.register("dimension_boxplot", Arc::new(DimensionBoxplotStrategy));
    registry.register("dimension_mean_std_scatter", Arc::new(DimensionMeanStdScatterStrategy));
    registry.register("dimension_ci_bars", Arc::new(DimensionCiBarsStrategy));
    registry.register("scatter_regression", Arc::new(ScatterRegressionStrategy));
    registry.register("eng_epui_quadrants", Arc::new(EngEpuiQuadrantsStrategy));
    registry.register("demographic_distribution", Arc::new(DemographicDistributionStrategy));
    registry.register("benchmark_bullet", Arc::new(BenchmarkBulletStrategy));
    registry.register("example_new_chart", Arc::new(ExampleNewChartStrategy));
    registry.register("action_priority_index", Arc::new(ActionPriorityIndexStrategy));
    registry.register("leverage_scatter", Arc::new(LeverageScatterStrategy));
    registry.register("importance_performance_matrix", Arc::new(ImportancePerformanceMatrixStrategy));
    registry.register("clustering_profile", Arc::new(ClusteringProfileStrategy));
    registry.register("predictive_simulation", Arc::new(PredictiveSimulationStrategy));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::{ChartData, JsonMap};
    use qviz_common::Result;
    use serde_json::{json, Value};

    struct Stub(&'static str);

    impl ChartStrategy for Stub {
        fn generate(&self, _data: &ChartData, _config: &JsonMap) -> Result<Value> {
            Ok(json!({"stub": self.0}))
        }
    }

    #[test]
    fn get_is_total_and_never_panics() {
        let registry = default_registry();
        assert!(registry.get("time_series").is_some());
        assert!(registry.get("").is_none());
        assert!(registry.get("not_a_real_key").is_none());
    }

    #[test]
    fn list_keys_is_sorted_and_complete() {
        let registry = default_registry();
        let keys = registry.list_keys();
        assert_eq!(keys.len(), 22);
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert!(keys.contains(&"likert_distribution".to_string()));
        assert!(keys.contains(&"predictive_simulation".to_string()));
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = StrategyRegistry::new();
        registry.register("chart", Arc::new(Stub("first")));
        registry.register("chart", Arc::new(Stub("second")));
        assert_eq!(registry.list_keys(), vec!["chart"]);

        let data = ChartData {
            hr: std::sync::Arc::new(qviz_common::Dataset::new("hr", vec![], vec![])),
            survey: None,
        };
        let spec = registry
            .get("chart")
            .unwrap()
            .generate(&data, &JsonMap::new())
            .unwrap();
        assert_eq!(spec["stub"], "second");
    }
}
