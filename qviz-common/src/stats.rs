//! Statistics toolbox shared by the visualization strategies
//!
//! Descriptive statistics follow the pandas conventions the consumers of
//! these charts are used to: sample standard deviation (ddof = 1), adjusted
//! Fisher-Pearson skewness, tie-averaged Spearman ranks. Distribution
//! lookups (Student-t, Fisher-Snedecor) come from `statrs`; the linear
//! least-squares solve uses `nalgebra`'s SVD.

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use statrs::distribution::{ContinuousCDF, FisherSnedecor, StudentsT};

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (ddof = 1); `None` below two values
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n as f64 - 1.0)).sqrt())
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Pearson correlation coefficient; `None` when either side is constant
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    let mx = mean(x)?;
    let my = mean(y)?;
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        cov += (a - mx) * (b - my);
        var_x += (a - mx) * (a - mx);
        var_y += (b - my) * (b - my);
    }
    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        return None;
    }
    Some(cov / denom)
}

/// Spearman rank correlation with tie-averaged ranks
pub fn spearman(x: &[f64], y: &[f64]) -> Option<f64> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }
    pearson(&average_ranks(x), &average_ranks(y))
}

/// Ranks (1-based) with ties receiving their average rank
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| {
        values[a]
            .partial_cmp(&values[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // Average of ranks i+1 ..= j+1
        let avg = (i + 1 + j + 1) as f64 / 2.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Adjusted Fisher-Pearson skewness (the pandas `skew`); `None` below
/// three values or for a constant series
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len() as f64;
    if values.len() < 3 {
        return None;
    }
    let m = mean(values)?;
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    if m2 == 0.0 {
        return None;
    }
    let g1 = m3 / m2.powf(1.5);
    Some((n * (n - 1.0)).sqrt() / (n - 2.0) * g1)
}

/// One-way ANOVA result
#[derive(Debug, Clone, Copy)]
pub struct Anova {
    pub f_stat: f64,
    pub p_value: f64,
}

/// One-way analysis of variance across groups.
///
/// `None` when fewer than two groups remain, when the within-group variance
/// is zero, or when the degrees of freedom run out.
pub fn one_way_anova(groups: &[Vec<f64>]) -> Option<Anova> {
    let k = groups.len();
    if k < 2 {
        return None;
    }
    let n: usize = groups.iter().map(Vec::len).sum();
    if n <= k {
        return None;
    }

    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let grand_mean = mean(&all)?;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let gm = mean(group)?;
        ss_between += group.len() as f64 * (gm - grand_mean).powi(2);
        ss_within += group.iter().map(|v| (v - gm).powi(2)).sum::<f64>();
    }

    let df1 = (k - 1) as f64;
    let df2 = (n - k) as f64;
    let ms_between = ss_between / df1;
    let ms_within = ss_within / df2;
    if ms_within <= 0.0 {
        return None;
    }

    let f_stat = ms_between / ms_within;
    let dist = FisherSnedecor::new(df1, df2).ok()?;
    let p_value = 1.0 - dist.cdf(f_stat);
    Some(Anova { f_stat, p_value })
}

/// Eta-squared effect size: between-group over total sum of squares,
/// zero when total variance is zero
pub fn eta_squared(groups: &[Vec<f64>]) -> f64 {
    let all: Vec<f64> = groups.iter().flatten().copied().collect();
    let Some(grand_mean) = mean(&all) else {
        return 0.0;
    };
    let ss_total: f64 = all.iter().map(|v| (v - grand_mean).powi(2)).sum();
    if ss_total <= 0.0 {
        return 0.0;
    }
    let ss_between: f64 = groups
        .iter()
        .filter_map(|g| mean(g).map(|gm| g.len() as f64 * (gm - grand_mean).powi(2)))
        .sum();
    ss_between / ss_total
}

/// Two-sided Student-t critical value for the given confidence level
pub fn t_critical(dof: f64, confidence: f64) -> Option<f64> {
    if dof < 1.0 {
        return None;
    }
    let dist = StudentsT::new(0.0, 1.0, dof).ok()?;
    Some(dist.inverse_cdf(1.0 - (1.0 - confidence) / 2.0))
}

/// Ordinary least squares with a bias term.
///
/// `rows` holds one feature vector per observation. Returns the intercept
/// followed by one coefficient per feature. A rank-deficient (collinear)
/// system is an error, not a silent degradation.
pub fn ols(rows: &[Vec<f64>], y: &[f64]) -> Result<Vec<f64>, String> {
    let n = rows.len();
    if n == 0 || n != y.len() {
        return Err("regression requires matching, non-empty inputs".to_string());
    }
    let p = rows[0].len();

    let a = DMatrix::from_fn(n, p + 1, |r, c| if c == 0 { 1.0 } else { rows[r][c - 1] });
    let b = DVector::from_column_slice(y);

    let svd = a.svd(true, true);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0f64, f64::max);
    let min_sv = svd
        .singular_values
        .iter()
        .cloned()
        .fold(f64::INFINITY, f64::min);
    if max_sv <= 0.0 || min_sv < 1e-10 * max_sv {
        return Err("singular matrix - cannot solve regression, check for collinearity".to_string());
    }

    let solution = svd
        .solve(&b, 1e-12)
        .map_err(|e| format!("least squares solve failed: {}", e))?;
    Ok(solution.iter().copied().collect())
}

/// K-means clustering fit
#[derive(Debug, Clone)]
pub struct KMeansFit {
    pub centroids: Vec<Vec<f64>>,
    pub labels: Vec<usize>,
    /// Mean distance of points to their assigned centroid
    pub distortion: f64,
}

/// Standardize features by dividing each one by its standard deviation
/// (population, matching `scipy.cluster.vq.whiten`); constant features are
/// left as-is instead of blowing up.
pub fn whiten(points: &[Vec<f64>]) -> Vec<Vec<f64>> {
    if points.is_empty() {
        return Vec::new();
    }
    let dims = points[0].len();
    let n = points.len() as f64;
    let mut divisors = vec![1.0; dims];
    for d in 0..dims {
        let col: Vec<f64> = points.iter().map(|p| p[d]).collect();
        let m = col.iter().sum::<f64>() / n;
        let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n;
        let std = var.sqrt();
        if std > 0.0 {
            divisors[d] = std;
        }
    }
    points
        .iter()
        .map(|p| p.iter().zip(&divisors).map(|(v, d)| v / d).collect())
        .collect()
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Lloyd's algorithm with centroids initialized from data points.
///
/// Deterministic for a fixed seed so identical requests produce identical
/// chart specs. `None` when `k` is zero or exceeds the number of points.
pub fn kmeans(points: &[Vec<f64>], k: usize, seed: u64) -> Option<KMeansFit> {
    let n = points.len();
    if k == 0 || k > n {
        return None;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut indexes: Vec<usize> = (0..n).collect();
    indexes.shuffle(&mut rng);

    // Initialize from data points, preferring distinct ones so duplicate
    // rows don't collapse two centroids onto each other
    let mut centroids: Vec<Vec<f64>> = Vec::with_capacity(k);
    for &i in &indexes {
        if centroids.len() == k {
            break;
        }
        if !centroids.contains(&points[i]) {
            centroids.push(points[i].clone());
        }
    }
    for &i in &indexes {
        if centroids.len() == k {
            break;
        }
        centroids.push(points[i].clone());
    }

    let mut labels = vec![0usize; n];
    for _ in 0..100 {
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let nearest = (0..k)
                .min_by(|&a, &b| {
                    squared_distance(point, &centroids[a])
                        .partial_cmp(&squared_distance(point, &centroids[b]))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(0);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Vec<f64>> = points
                .iter()
                .zip(&labels)
                .filter(|(_, &l)| l == c)
                .map(|(p, _)| p)
                .collect();
            if members.is_empty() {
                continue; // keep previous centroid
            }
            for d in 0..centroid.len() {
                centroid[d] = members.iter().map(|p| p[d]).sum::<f64>() / members.len() as f64;
            }
        }

        if !changed {
            break;
        }
    }

    let distortion = points
        .iter()
        .zip(&labels)
        .map(|(p, &l)| squared_distance(p, &centroids[l]).sqrt())
        .sum::<f64>()
        / n as f64;

    Some(KMeansFit {
        centroids,
        labels,
        distortion,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() < eps
    }

    #[test]
    fn descriptive_basics() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), Some(2.0));
        assert!(close(sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap(), 2.138, 1e-3));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(sample_std(&[1.0]), None);
    }

    #[test]
    fn pearson_perfect_correlations() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!(close(pearson(&x, &up).unwrap(), 1.0, 1e-12));
        assert!(close(pearson(&x, &down).unwrap(), -1.0, 1e-12));
        assert_eq!(pearson(&x, &[5.0, 5.0, 5.0, 5.0]), None);
    }

    #[test]
    fn spearman_is_rank_based() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 4.0, 9.0, 16.0, 25.0]; // monotone, nonlinear
        assert!(close(spearman(&x, &y).unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn ranks_average_ties() {
        assert_eq!(average_ranks(&[1.0, 2.0, 2.0, 3.0]), vec![1.0, 2.5, 2.5, 4.0]);
    }

    #[test]
    fn skewness_sign_follows_the_tail() {
        let right: Vec<f64> = [vec![1.0; 10], vec![5.0; 2]].concat();
        assert!(skewness(&right).unwrap() > 0.5);
        let left: Vec<f64> = [vec![5.0; 10], vec![1.0; 2]].concat();
        assert!(skewness(&left).unwrap() < -0.5);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), None);
    }

    #[test]
    fn anova_separates_distinct_groups() {
        let groups = vec![
            vec![1.0, 1.2, 0.9, 1.1],
            vec![3.0, 3.1, 2.9, 3.2],
            vec![5.0, 5.2, 4.8, 5.1],
        ];
        let result = one_way_anova(&groups).unwrap();
        assert!(result.f_stat > 10.0);
        assert!(result.p_value < 0.01);
        assert!(eta_squared(&groups) > 0.9);
    }

    #[test]
    fn anova_degenerate_cases() {
        assert!(one_way_anova(&[vec![1.0, 2.0]]).is_none());
        // Zero within-group variance
        assert!(one_way_anova(&[vec![1.0, 1.0], vec![2.0, 2.0]]).is_none());
    }

    #[test]
    fn t_critical_matches_table_values() {
        assert!(close(t_critical(10.0, 0.95).unwrap(), 2.228, 1e-3));
    }

    #[test]
    fn ols_recovers_linear_coefficients() {
        // y = 1 + 2a + 3b
        let rows = vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 1.0],
            vec![1.0, 1.0],
            vec![2.0, 1.0],
        ];
        let y: Vec<f64> = rows.iter().map(|r| 1.0 + 2.0 * r[0] + 3.0 * r[1]).collect();
        let coeffs = ols(&rows, &y).unwrap();
        assert!(close(coeffs[0], 1.0, 1e-8));
        assert!(close(coeffs[1], 2.0, 1e-8));
        assert!(close(coeffs[2], 3.0, 1e-8));
    }

    #[test]
    fn ols_rejects_collinear_features() {
        let rows = vec![
            vec![1.0, 2.0],
            vec![2.0, 4.0],
            vec![3.0, 6.0],
            vec![4.0, 8.0],
        ];
        let y = vec![1.0, 2.0, 3.0, 4.0];
        assert!(ols(&rows, &y).is_err());
    }

    #[test]
    fn kmeans_separates_obvious_clusters() {
        let mut points = Vec::new();
        for i in 0..10 {
            points.push(vec![0.0 + i as f64 * 0.01, 0.0]);
            points.push(vec![10.0 + i as f64 * 0.01, 10.0]);
        }
        let fit = kmeans(&points, 2, 42).unwrap();
        // Points of the same half share a label
        let first = fit.labels[0];
        assert!(points
            .iter()
            .zip(&fit.labels)
            .all(|(p, &l)| (p[1] < 5.0) == (l == first)));
        assert!(fit.distortion < 1.0);
    }

    #[test]
    fn kmeans_is_deterministic_for_a_seed() {
        let points: Vec<Vec<f64>> = (0..30).map(|i| vec![(i % 7) as f64, (i % 3) as f64]).collect();
        let a = kmeans(&points, 3, 7).unwrap();
        let b = kmeans(&points, 3, 7).unwrap();
        assert_eq!(a.labels, b.labels);
    }
}
