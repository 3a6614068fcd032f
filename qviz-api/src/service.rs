//! Request orchestrator
//!
//! One strictly linear pipeline per request: resolve the strategy, load and
//! validate both datasets, rewrite comparison filters into config fields,
//! consult the cache, range-check Likert values, apply the concrete
//! filters, dispatch the strategy and wrap the result in the response
//! envelope. Every step either feeds the next or terminates the request
//! with a domain error; nothing is retried.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use qviz_common::config::Settings;
use qviz_common::{dataset, survey, validate, Dataset, Error, Result};

use crate::cache::{fingerprint, ResultCache};
use crate::registry::StrategyRegistry;
use crate::strategies::{ChartData, JsonMap};

/// One uploaded file, already read off the wire
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

/// Chart keys that inherently need survey-shaped data
const SURVEY_REQUIRED_KEYS: &[&str] = &[
    "action_priority_index",
    "anova_significance",
    "clustering_profile",
    "dimension_boxplot",
    "dimension_ci_bars",
    "dimension_heatmap",
    "dimension_mean_std_scatter",
    "dimension_summary",
    "distribution_anomalies",
    "eng_epui_quadrants",
    "example_new_chart",
    "importance_performance_matrix",
    "leverage_scatter",
    "likert_distribution",
    "likert_item_heatmap",
    "predictive_simulation",
    "scatter_regression",
];

/// ISO-8601 UTC timestamp with a `Z` suffix
fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct ChartService {
    settings: Settings,
    registry: Arc<StrategyRegistry>,
    cache: ResultCache,
}

impl ChartService {
    pub fn new(settings: Settings, registry: Arc<StrategyRegistry>) -> Self {
        let cache = ResultCache::new(settings.cache_capacity);
        ChartService {
            settings,
            registry,
            cache,
        }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the full pipeline for one request
    pub fn generate_chart(
        &self,
        chart_key: &str,
        hr_file: Upload,
        survey_file: Option<Upload>,
        filters: Option<JsonMap>,
        config: Option<JsonMap>,
    ) -> Result<Value> {
        // Resolve the strategy before touching any dataset
        let strategy = self.registry.get(chart_key).ok_or_else(|| {
            warn!(chart_key = %chart_key, "unsupported chart key");
            Error::UnknownChartKey(format!("Unsupported chart key: {}", chart_key))
        })?;

        // HR: load, derive bands, check required columns
        let hr = self.load_dataset(&hr_file, "hr")?;
        let hr = survey::add_seniority_band(&survey::add_age_band(&hr));
        let missing = validate::missing_columns(&hr, validate::HR_REQUIRED_COLUMNS);
        if !missing.is_empty() {
            return Err(Error::MissingColumns {
                role: "HR".to_string(),
                details: missing,
            });
        }
        let hr = Arc::new(hr);

        // Survey: same steps when uploaded; otherwise single-file fallback
        // reuses the HR table (the same allocation, not a copy)
        let survey_ds: Option<Arc<Dataset>> = match survey_file {
            Some(upload) => {
                let ds = self.load_dataset(&upload, "survey")?;
                let ds = survey::add_seniority_band(&survey::add_age_band(&ds));
                let missing = validate::missing_columns(&ds, validate::SURVEY_REQUIRED_COLUMNS);
                if !missing.is_empty() {
                    return Err(Error::MissingColumns {
                        role: "survey".to_string(),
                        details: missing,
                    });
                }
                Some(Arc::new(ds))
            }
            None if !survey::detect_likert_columns(&hr).is_empty() || survey::has_long_format(&hr) => {
                debug!("single-file mode: reusing the HR table as survey data");
                Some(Arc::clone(&hr))
            }
            None => None,
        };

        // Survey-requirement gate
        if survey_ds.is_none() && SURVEY_REQUIRED_KEYS.contains(&chart_key) {
            return Err(Error::MissingColumns {
                role: "survey".to_string(),
                details: vec![
                    "No survey-shaped data available for this chart".to_string(),
                    "Upload a survey_file, or include Likert item columns (e.g. PGC1, COM2) \
                     or question_label/response_value columns in the HR file"
                        .to_string(),
                ],
            });
        }

        // Comparison filters become segment/facet config fields
        let (concrete, config) =
            rewrite_filters(filters.unwrap_or_default(), config.unwrap_or_default());

        // Cache lookup on the rewritten request
        let mut proxies: Vec<&Dataset> = vec![&hr];
        if let Some(survey_ds) = &survey_ds {
            proxies.push(survey_ds);
        }
        let fp = fingerprint(
            chart_key,
            &proxies,
            &config,
            &concrete,
            self.settings.cache_content_hash,
        );
        if let Some(mut envelope) = self.cache.get(&fp) {
            debug!(chart_key = %chart_key, "result cache hit");
            envelope["generated_at"] = json!(now_utc());
            return Ok(envelope);
        }

        // Likert range validation on whichever table serves as survey data
        if let Some(survey_ds) = &survey_ds {
            let columns = if survey::has_long_format(survey_ds) {
                vec!["response_value".to_string()]
            } else {
                survey::detect_likert_columns(survey_ds)
            };
            if !columns.is_empty() {
                let issues = validate::check_likert_range(survey_ds, &columns);
                if !issues.is_empty() {
                    return Err(Error::ValueRange(issues));
                }
            }
        }

        // Apply concrete filters; strategies receive pre-filtered tables
        let filtered_hr = Arc::new(apply_filters(&hr, &concrete));
        let filtered_survey = survey_ds.map(|ds| {
            if Arc::ptr_eq(&ds, &hr) {
                Arc::clone(&filtered_hr)
            } else {
                Arc::new(apply_filters(&ds, &concrete))
            }
        });

        // Dispatch; value-validation failures become payload errors with
        // the original message preserved in the details
        let data = ChartData {
            hr: filtered_hr,
            survey: filtered_survey,
        };
        let spec = strategy.generate(&data, &config).map_err(|err| match err {
            Error::Chart(message) => Error::Payload {
                message: "Chart generation failed".to_string(),
                details: vec![message],
            },
            other => other,
        })?;

        let envelope = json!({
            "chart_key": chart_key,
            "generated_at": now_utc(),
            "spec": spec,
        });
        self.cache.insert(fp, envelope.clone());
        info!(chart_key = %chart_key, "chart generated");
        Ok(envelope)
    }

    fn load_dataset(&self, upload: &Upload, role: &str) -> Result<Dataset> {
        dataset::load(
            &upload.bytes,
            upload.filename.as_deref(),
            role,
            self.settings.max_rows,
            self.settings.max_columns,
        )
    }
}

/// True for filter values that mean "use this key as a comparison axis":
/// null, empty/whitespace strings, or the literal string "null"
fn is_comparison_marker(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
        }
        _ => false,
    }
}

fn config_slot_is_unset(config: &JsonMap, key: &str) -> bool {
    match config.get(key) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        _ => false,
    }
}

/// Partition filters into concrete equality constraints and comparison
/// candidates; up to two candidates are consumed, in the input's key
/// order, into `segment_field` then `facet_field` where config left them
/// unset.
fn rewrite_filters(filters: JsonMap, mut config: JsonMap) -> (JsonMap, JsonMap) {
    let mut concrete = JsonMap::new();
    let mut candidates: Vec<String> = Vec::new();
    for (key, value) in filters {
        if is_comparison_marker(&value) {
            candidates.push(key);
        } else {
            concrete.insert(key, value);
        }
    }

    let open_slots: Vec<&str> = ["segment_field", "facet_field"]
        .into_iter()
        .filter(|slot| config_slot_is_unset(&config, slot))
        .collect();
    for (candidate, slot) in candidates.into_iter().zip(open_slots) {
        debug!(field = %candidate, slot = %slot, "comparison filter rewritten into config");
        config.insert(slot.to_string(), Value::String(candidate));
    }

    (concrete, config)
}

/// String-cast equality for a client-supplied filter value; integral
/// numbers render without a decimal point so `1` matches `"1"`
fn filter_value_display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) => dataset::format_number(f),
            None => n.to_string(),
        },
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Keep rows whose string-cast, trimmed cell value equals the string-cast,
/// trimmed filter value, for every filter key naming an existing column
fn apply_filters(dataset: &Dataset, filters: &JsonMap) -> Dataset {
    let mut out = dataset.clone();
    for (key, value) in filters {
        let Some(idx) = out.column_index(key) else {
            continue;
        };
        let wanted = filter_value_display(value).trim().to_string();
        out = out.filter_rows(|row| out.cell(row, idx).display().trim() == wanted);
    }
    out
}
