//! # QVIZ Common Library
//!
//! Shared code for the QVIZ visualization service:
//! - Error types
//! - Environment-sourced settings
//! - The in-memory `Dataset` model and tabular loader
//! - Schema validators (required columns, Likert range)
//! - Survey normalization utilities (prefix grouping, recoding, banding,
//!   wide-to-long reshaping)
//! - Dimension score computation
//! - Statistics toolbox (correlation, ANOVA, OLS, k-means)

pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod stats;
pub mod survey;
pub mod validate;

pub use dataset::{Cell, Dataset};
pub use error::{Error, Result};
