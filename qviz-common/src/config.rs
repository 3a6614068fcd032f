//! Environment-sourced service settings
//!
//! All knobs come from environment variables with a fixed `QVIZ_` prefix,
//! matched case-insensitively (`QVIZ_MAX_ROWS` and `qviz_max_rows` are the
//! same setting). Invalid values fall back to the default with a warning
//! rather than aborting startup.

use tracing::warn;

/// CORS origin policy: `*` or an explicit comma-separated list.
///
/// The wildcard disables credentials; an explicit list allows them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorsOrigins {
    Any,
    List(Vec<String>),
}

impl CorsOrigins {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed == "*" || trimmed.is_empty() {
            return CorsOrigins::Any;
        }
        CorsOrigins::List(
            trimmed
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        )
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum allowed rows per dataset
    pub max_rows: usize,
    /// Maximum allowed columns per dataset
    pub max_columns: usize,
    /// Timeout guard for request processing (advisory, not enforced)
    pub request_timeout_seconds: u64,
    /// Logging level used when RUST_LOG is not set
    pub log_level: String,
    /// Allowed CORS origins
    pub cors_origins: CorsOrigins,
    /// Listen address for the HTTP server
    pub bind: String,
    /// Result cache capacity (entries); the cache is cleared wholesale when
    /// an insert would exceed this
    pub cache_capacity: usize,
    /// When true, cache fingerprints hash dataset contents instead of the
    /// default shape/column identity proxy
    pub cache_content_hash: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            max_rows: 50_000,
            max_columns: 20,
            request_timeout_seconds: 5,
            log_level: "info".to_string(),
            cors_origins: CorsOrigins::Any,
            bind: "127.0.0.1:8000".to_string(),
            cache_capacity: 128,
            cache_content_hash: false,
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Self {
        let mut settings = Settings::default();

        if let Some(v) = env_lookup("QVIZ_MAX_ROWS") {
            parse_into(&mut settings.max_rows, "QVIZ_MAX_ROWS", &v);
        }
        if let Some(v) = env_lookup("QVIZ_MAX_COLUMNS") {
            parse_into(&mut settings.max_columns, "QVIZ_MAX_COLUMNS", &v);
        }
        if let Some(v) = env_lookup("QVIZ_REQUEST_TIMEOUT_SECONDS") {
            parse_into(&mut settings.request_timeout_seconds, "QVIZ_REQUEST_TIMEOUT_SECONDS", &v);
        }
        if let Some(v) = env_lookup("QVIZ_LOG_LEVEL") {
            settings.log_level = v;
        }
        if let Some(v) = env_lookup("QVIZ_CORS_ORIGINS") {
            settings.cors_origins = CorsOrigins::parse(&v);
        }
        if let Some(v) = env_lookup("QVIZ_BIND") {
            settings.bind = v;
        }
        if let Some(v) = env_lookup("QVIZ_CACHE_CAPACITY") {
            parse_into(&mut settings.cache_capacity, "QVIZ_CACHE_CAPACITY", &v);
        }
        if let Some(v) = env_lookup("QVIZ_CACHE_CONTENT_HASH") {
            match v.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => settings.cache_content_hash = true,
                "0" | "false" | "no" => settings.cache_content_hash = false,
                other => warn!("Ignoring invalid QVIZ_CACHE_CONTENT_HASH value: {}", other),
            }
        }

        settings
    }
}

/// Case-insensitive environment variable lookup
fn env_lookup(name: &str) -> Option<String> {
    std::env::vars()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn parse_into<T: std::str::FromStr>(slot: &mut T, name: &str, raw: &str) {
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!("Ignoring invalid {} value: {}", name, raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.max_rows, 50_000);
        assert_eq!(s.max_columns, 20);
        assert_eq!(s.cors_origins, CorsOrigins::Any);
    }

    #[test]
    fn cors_origin_list_parsing() {
        assert_eq!(CorsOrigins::parse("*"), CorsOrigins::Any);
        assert_eq!(
            CorsOrigins::parse("https://a.example, https://b.example"),
            CorsOrigins::List(vec![
                "https://a.example".to_string(),
                "https://b.example".to_string()
            ])
        );
    }
}
