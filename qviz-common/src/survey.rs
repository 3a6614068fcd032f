//! Survey normalization utilities
//!
//! The QVT survey export is wide format: one row per respondent, one column
//! per Likert item, item names carrying a dimension prefix (`PGC2`, `EPUI1`,
//! ...). Everything here is a pure function over a `Dataset`; empty groups
//! are simply omitted from outputs and it is up to the calling strategy to
//! decide when an empty result is an error.

use crate::dataset::{Cell, Dataset};
use crate::stats;

/// Socio-demographic columns expected in the POV survey export
pub const SOCIO_COLUMNS: &[&str] = &[
    "ID", "Sexe", "Age", "Contrat", "Temps", "Encadre", "Ancienne", "Secteur", "TailleOr",
];

/// Likert prefixes and their display labels, in match-priority order.
///
/// Prefix matching walks this table top to bottom and stops at the first
/// hit, so longer prefixes sharing a stem (PPD before PD) must come first.
pub const LIKERT_PREFIX_LABELS: &[(&str, &str)] = &[
    ("POV", "Pratiques organisationnelles vertueuses"),
    ("PGC", "Pratiques de gestion de carrière"),
    ("CSA", "Pratiques de santé et de sécurité"),
    ("CSE", "Pratiques de santé et de sécurité"),
    ("EVPVP", "Pratiques de conciliation entre la vie privée et la vie personnelle"),
    ("RECO", "Pratiques de reconnaissance"),
    ("COM", "Pratiques de communication"),
    ("DL", "Pratiques de dialogue social"),
    ("PPD", "Pratiques de participation à la prise de décision"),
    ("JUST", "Pratiques de justice organisationnelle"),
    ("PI", "Pratiques d'inclusion"),
    ("PD", "Pratiques de développement durable"),
    ("ENG", "Engagement au travail"),
    ("EPUI", "Epuisement émotionnel"),
];

/// Integer code → display label recodings for socio-demographic columns
pub const DEMO_VALUE_LABELS: &[(&str, &[(i64, &str)])] = &[
    ("Sexe", &[(1, "Homme"), (2, "Femme"), (3, "Autre")]),
    (
        "Encadre",
        &[
            (1, "Non"),
            (2, "Oui, en tant que cadre opérationnel"),
            (3, "Oui, en tant que cadre dirigeant"),
        ],
    ),
    ("Temps", &[(1, "Temps plein"), (2, "Temps partiel")]),
    ("Contrat", &[(1, "CDI"), (2, "CDD"), (3, "Intérim")]),
    ("Secteur", &[(1, "Privé"), (2, "Public"), (3, "Associatif")]),
    (
        "TailleOr",
        &[
            (1, "Moins de 10"),
            (2, "De 11 à 49"),
            (3, "De 50 à 249"),
            (4, "De 250 à 499"),
            (5, "500 et plus"),
        ],
    ),
];

/// Derived band column names
pub const AGE_BAND_COLUMN: &str = "AgeClasse";
pub const SENIORITY_BAND_COLUMN: &str = "AnciennetéClasse";

const AGE_BAND_EDGES: &[f64] = &[29.0, 39.0, 49.0, 59.0];
const AGE_BAND_LABELS: &[&str] = &[
    "Moins de 30 ans",
    "30-39 ans",
    "40-49 ans",
    "50-59 ans",
    "60 ans et plus",
];

const SENIORITY_BAND_EDGES: &[f64] = &[1.0, 5.0, 10.0, 20.0];
const SENIORITY_BAND_LABELS: &[&str] = &[
    "Moins d'un an",
    "1-5 ans",
    "6-10 ans",
    "11-20 ans",
    "Plus de 20 ans",
];

/// Trim a column name and undo the export's truncated `Ancienne` header
pub fn normalize_column_name(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.eq_ignore_ascii_case("ANCIENNE") {
        "Ancienneté".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The dimension prefix of a Likert item column, if it carries one
pub fn likert_prefix(column: &str) -> Option<&'static str> {
    let upper = normalize_column_name(column).to_uppercase();
    LIKERT_PREFIX_LABELS
        .iter()
        .find(|(prefix, _)| upper.starts_with(prefix))
        .map(|(prefix, _)| *prefix)
}

/// Display label for a dimension prefix, falling back to the prefix itself
pub fn prefix_label(prefix: &str) -> &str {
    LIKERT_PREFIX_LABELS
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, label)| *label)
        .unwrap_or(prefix)
}

/// `"<column> (<dimension label>)"` for Likert items, the raw name otherwise
pub fn friendly_question_label(column: &str) -> String {
    match likert_prefix(column) {
        Some(prefix) => format!("{} ({})", column, prefix_label(prefix)),
        None => column.to_string(),
    }
}

/// Columns that look like wide-format Likert items
pub fn detect_likert_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| likert_prefix(c).is_some())
        .cloned()
        .collect()
}

/// True when the dataset already carries the long-format column pair
pub fn has_long_format(dataset: &Dataset) -> bool {
    dataset.has_column("question_label") && dataset.has_column("response_value")
}

/// Socio-demographic columns present in the dataset, band columns included
pub fn available_demographics(dataset: &Dataset) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for socio in SOCIO_COLUMNS {
        if let Some(actual) = dataset
            .columns()
            .iter()
            .find(|c| normalize_column_name(c).to_uppercase() == socio.to_uppercase())
        {
            out.push(actual.clone());
        }
    }
    for band in [AGE_BAND_COLUMN, SENIORITY_BAND_COLUMN] {
        if dataset.has_column(band) && !out.iter().any(|c| c == band) {
            out.push(band.to_string());
        }
    }
    out
}

/// Recode integer demographic codes to display labels.
///
/// Non-destructive: unmapped values pass through unchanged.
pub fn recode_demographics(dataset: &Dataset) -> Dataset {
    let mut out = dataset.clone();
    for (column, mapping) in DEMO_VALUE_LABELS {
        let Some(idx) = out.column_index(column) else {
            continue;
        };
        let values: Vec<Cell> = out
            .rows()
            .map(|row| {
                let cell = &row[idx];
                match cell.as_number() {
                    Some(n) if n.fract() == 0.0 => mapping
                        .iter()
                        .find(|(code, _)| *code == n as i64)
                        .map(|(_, label)| Cell::Text(label.to_string()))
                        .unwrap_or_else(|| cell.clone()),
                    _ => cell.clone(),
                }
            })
            .collect();
        out = out.with_column(*column, values);
    }
    out
}

fn band_for(value: f64, edges: &[f64], labels: &[&'static str]) -> Option<&'static str> {
    // Bins are left-open like pandas cut: (0, e0], (e0, e1], ..., (eN, inf)
    if value <= 0.0 {
        return None;
    }
    for (i, edge) in edges.iter().enumerate() {
        if value <= *edge {
            return labels.get(i).copied();
        }
    }
    labels.last().copied()
}

fn add_band(
    dataset: &Dataset,
    source: &str,
    band_column: &str,
    edges: &[f64],
    labels: &[&'static str],
) -> Dataset {
    let Some(values) = dataset.numeric_column(source) else {
        return dataset.clone();
    };
    let bands: Vec<Cell> = values
        .iter()
        .map(|v| match v {
            Some(n) => band_for(*n, edges, labels)
                .map(|label| Cell::Text(label.to_string()))
                .unwrap_or(Cell::Empty),
            None => Cell::Empty,
        })
        .collect();
    dataset.with_column(band_column, bands)
}

/// Derive the ordinal age-band column; unchanged when `Age` is absent
pub fn add_age_band(dataset: &Dataset) -> Dataset {
    if !dataset.has_column("Age") {
        return dataset.clone();
    }
    add_band(dataset, "Age", AGE_BAND_COLUMN, AGE_BAND_EDGES, AGE_BAND_LABELS)
}

/// Derive the seniority-band column from `Ancienneté` (or the export's raw
/// `Ancienne`); unchanged when neither is present
pub fn add_seniority_band(dataset: &Dataset) -> Dataset {
    let source = if dataset.has_column("Ancienneté") {
        "Ancienneté"
    } else if dataset.has_column("Ancienne") {
        "Ancienne"
    } else {
        return dataset.clone();
    };
    add_band(
        dataset,
        source,
        SENIORITY_BAND_COLUMN,
        SENIORITY_BAND_EDGES,
        SENIORITY_BAND_LABELS,
    )
}

/// Melt wide-format Likert items into long format.
///
/// Output columns: the available demographics (plus `extra_id_vars` that
/// exist in the dataset), then `question_label` (decorated with the
/// dimension label), `response_value` and the raw `dimension_prefix` —
/// one row per (respondent, item) pair.
pub fn to_likert_long(
    dataset: &Dataset,
    likert_columns: &[String],
    extra_id_vars: &[String],
) -> Dataset {
    let mut id_vars = available_demographics(dataset);
    for extra in extra_id_vars {
        if dataset.has_column(extra) && !id_vars.iter().any(|c| c == extra) {
            id_vars.push(extra.clone());
        }
    }

    let id_indexes: Vec<usize> = id_vars
        .iter()
        .filter_map(|c| dataset.column_index(c))
        .collect();
    let item_indexes: Vec<(usize, String, String)> = likert_columns
        .iter()
        .filter_map(|c| {
            dataset.column_index(c).map(|idx| {
                let prefix = likert_prefix(c)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| fallback_prefix(c));
                (idx, friendly_question_label(c), prefix)
            })
        })
        .collect();

    let mut columns = id_vars.clone();
    columns.push("question_label".to_string());
    columns.push("response_value".to_string());
    columns.push("dimension_prefix".to_string());

    let mut rows = Vec::with_capacity(dataset.row_count() * item_indexes.len());
    for row in dataset.rows() {
        for (item_idx, label, prefix) in &item_indexes {
            let mut out_row: Vec<Cell> = id_indexes.iter().map(|i| row[*i].clone()).collect();
            out_row.push(Cell::Text(label.clone()));
            out_row.push(row[*item_idx].clone());
            out_row.push(Cell::Text(prefix.clone()));
            rows.push(out_row);
        }
    }

    Dataset::new(dataset.name(), columns, rows)
}

/// Uppercased column name with trailing digits stripped, for items outside
/// the known prefix table
fn fallback_prefix(column: &str) -> String {
    normalize_column_name(column)
        .to_uppercase()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .to_string()
}

/// Shape classification of a numeric response series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionShape {
    InsufficientData,
    Uniform,
    SkewRight,
    SkewLeft,
    Balanced,
}

impl DistributionShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionShape::InsufficientData => "insufficient_data",
            DistributionShape::Uniform => "uniform",
            DistributionShape::SkewRight => "skew_right",
            DistributionShape::SkewLeft => "skew_left",
            DistributionShape::Balanced => "balanced",
        }
    }
}

/// Heuristic anomaly detector: uniform when value frequencies are within
/// 0.1 of each other, skewed beyond |0.5| skewness, balanced otherwise
pub fn classify_distribution(values: &[f64]) -> DistributionShape {
    if values.is_empty() {
        return DistributionShape::InsufficientData;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len() as f64;
    let mut shares: Vec<f64> = Vec::new();
    let mut run = 1usize;
    for i in 1..sorted.len() {
        if sorted[i] == sorted[i - 1] {
            run += 1;
        } else {
            shares.push(run as f64 / n);
            run = 1;
        }
    }
    shares.push(run as f64 / n);

    let max_share = shares.iter().cloned().fold(f64::MIN, f64::max);
    let min_share = shares.iter().cloned().fold(f64::MAX, f64::min);
    if max_share - min_share < 0.1 {
        return DistributionShape::Uniform;
    }

    match stats::skewness(values) {
        Some(skew) if skew > 0.5 => DistributionShape::SkewRight,
        Some(skew) if skew < -0.5 => DistributionShape::SkewLeft,
        _ => DistributionShape::Balanced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ds(columns: &[&str], rows: Vec<Vec<Cell>>) -> Dataset {
        Dataset::new("survey", columns.iter().map(|c| c.to_string()).collect(), rows)
    }

    #[test]
    fn likert_prefix_respects_declaration_order() {
        assert_eq!(likert_prefix("PGC2"), Some("PGC"));
        assert_eq!(likert_prefix("PPD1"), Some("PPD"));
        assert_eq!(likert_prefix("PD3"), Some("PD"));
        assert_eq!(likert_prefix(" epui4 "), Some("EPUI"));
        assert_eq!(likert_prefix("Sexe"), None);
    }

    #[test]
    fn prefix_label_falls_back_to_raw_prefix() {
        assert_eq!(prefix_label("COM"), "Pratiques de communication");
        assert_eq!(prefix_label("XYZ"), "XYZ");
    }

    #[test]
    fn detect_likert_columns_skips_demographics() {
        let table = ds(&["ID", "Sexe", "PGC1", "EPUI2"], vec![]);
        assert_eq!(detect_likert_columns(&table), vec!["PGC1", "EPUI2"]);
    }

    #[test]
    fn age_banding_uses_left_open_bins() {
        let table = ds(
            &["Age"],
            vec![
                vec![Cell::Number(29.0)],
                vec![Cell::Number(30.0)],
                vec![Cell::Number(61.0)],
                vec![Cell::Text("n/a".into())],
            ],
        );
        let banded = add_age_band(&table);
        let bands = banded.column_cells(AGE_BAND_COLUMN).unwrap();
        assert_eq!(bands[0].display(), "Moins de 30 ans");
        assert_eq!(bands[1].display(), "30-39 ans");
        assert_eq!(bands[2].display(), "60 ans et plus");
        assert!(bands[3].is_empty());
    }

    #[test]
    fn banding_is_a_noop_without_source_column() {
        let table = ds(&["ID"], vec![vec![Cell::Number(1.0)]]);
        let banded = add_age_band(&table);
        assert!(!banded.has_column(AGE_BAND_COLUMN));
    }

    #[test]
    fn recoding_passes_unmapped_values_through() {
        let table = ds(
            &["Sexe"],
            vec![
                vec![Cell::Number(1.0)],
                vec![Cell::Number(9.0)],
                vec![Cell::Text("Femme".into())],
            ],
        );
        let recoded = recode_demographics(&table);
        let cells = recoded.column_cells("Sexe").unwrap();
        assert_eq!(cells[0].display(), "Homme");
        assert_eq!(cells[1].display(), "9");
        assert_eq!(cells[2].display(), "Femme");
    }

    #[test]
    fn melt_produces_one_row_per_respondent_item_pair() {
        let table = ds(
            &["ID", "Sexe", "PGC1", "COM1"],
            vec![
                vec![Cell::Number(1.0), Cell::Number(2.0), Cell::Number(4.0), Cell::Number(3.0)],
                vec![Cell::Number(2.0), Cell::Number(1.0), Cell::Number(5.0), Cell::Empty],
            ],
        );
        let long = to_likert_long(&table, &["PGC1".into(), "COM1".into()], &[]);
        assert_eq!(long.row_count(), 4);
        assert!(long.has_column("question_label"));
        assert!(long.has_column("response_value"));
        assert!(long.has_column("dimension_prefix"));

        let labels = long.column_cells("question_label").unwrap();
        assert_eq!(labels[0].display(), "PGC1 (Pratiques de gestion de carrière)");
        let prefixes = long.column_cells("dimension_prefix").unwrap();
        assert_eq!(prefixes[1].display(), "COM");
    }

    #[test]
    fn distribution_classification_heuristics() {
        assert_eq!(classify_distribution(&[]), DistributionShape::InsufficientData);
        assert_eq!(
            classify_distribution(&[1.0, 2.0, 3.0, 4.0, 5.0]),
            DistributionShape::Uniform
        );
        // Heavy right tail
        let right: Vec<f64> = [vec![1.0; 20], vec![2.0; 4], vec![5.0; 2]].concat();
        assert_eq!(classify_distribution(&right), DistributionShape::SkewRight);
        // Mirror image
        let left: Vec<f64> = [vec![5.0; 20], vec![4.0; 4], vec![1.0; 2]].concat();
        assert_eq!(classify_distribution(&left), DistributionShape::SkewLeft);
    }
}
