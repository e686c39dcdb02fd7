//! Isolation forest outlier model
//!
//! Each tree isolates points by recursive random axis-aligned splits on a
//! sub-sample of the training rows. Outliers sit on short paths. The average
//! path length over the ensemble is turned into a score in `[-1, 0)` (lower
//! is more anomalous) and shifted by an offset placed at the `contamination`
//! quantile of the training scores, so the decision function is negative
//! exactly for the expected share of outliers.

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Euler-Mascheroni constant, used for the harmonic number approximation
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Error, Debug, PartialEq)]
pub enum ForestError {
    #[error("training matrix is empty")]
    EmptyInput,

    #[error("training rows must have at least one feature")]
    NoFeatures,

    #[error("row {row} has {found} features, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("contamination must be in (0, 0.5], got {0}")]
    InvalidContamination(f64),

    #[error("{0} must be at least 1")]
    InvalidSize(&'static str),
}

/// Fit parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_samples: 256,
            contamination: 0.03,
            seed: 42,
        }
    }
}

impl ForestParams {
    pub fn validate(&self) -> Result<(), ForestError> {
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(ForestError::InvalidContamination(self.contamination));
        }
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidSize("n_estimators"));
        }
        if self.max_samples == 0 {
            return Err(ForestError::InvalidSize("max_samples"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn fit(data: &[Vec<f64>], indices: &mut [usize], max_depth: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(data, indices, 0, max_depth, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &[Vec<f64>],
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: indices.len(),
        });

        if depth >= max_depth || indices.len() <= 1 {
            return id;
        }

        // only features that still vary can split this node
        let n_features = data[indices[0]].len();
        let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(n_features);
        for feature in 0..n_features {
            let mut lo = f64::INFINITY;
            let mut hi = f64::NEG_INFINITY;
            for &i in indices.iter() {
                let v = data[i][feature];
                lo = lo.min(v);
                hi = hi.max(v);
            }
            if hi > lo {
                candidates.push((feature, lo, hi));
            }
        }
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.random_range(0..candidates.len())];
        let threshold = split_point(lo, hi, rng.random::<f64>());

        // partition in place: values <= threshold go left
        let mut mid = 0;
        for k in 0..indices.len() {
            if data[indices[k]][feature] <= threshold {
                indices.swap(k, mid);
                mid += 1;
            }
        }

        let (left_rows, right_rows) = indices.split_at_mut(mid);
        let left = self.grow(data, left_rows, depth + 1, max_depth, rng);
        let right = self.grow(data, right_rows, depth + 1, max_depth, rng);
        self.nodes[id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        id
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[node] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    depth += 1.0;
                    node = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

// point in [lo, hi) at fraction t; the span can overflow for extreme finite bounds
fn split_point(lo: f64, hi: f64, t: f64) -> f64 {
    let span = hi - lo;
    let x = if span.is_finite() {
        lo + t * span
    } else {
        lo * (1.0 - t) + hi * t
    };
    if x >= hi { lo } else { x.max(lo) }
}

/// Average path length of an unsuccessful search in a binary search tree of
/// `n` points; normalizes path lengths across sample sizes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated percentile of `values`, `q` in `[0, 1]`.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Fitted ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    sample_size: usize,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    pub fn fit(data: &[Vec<f64>], params: &ForestParams) -> Result<Self, ForestError> {
        params.validate()?;
        if data.is_empty() {
            return Err(ForestError::EmptyInput);
        }
        let n_features = data[0].len();
        if n_features == 0 {
            return Err(ForestError::NoFeatures);
        }
        check_dimensions(data, n_features)?;

        let n = data.len();
        let sample_size = params.max_samples.min(n);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let mut pool: Vec<usize> = (0..n).collect();
        let trees = (0..params.n_estimators)
            .map(|_| {
                // sub-sample without replacement
                for i in 0..sample_size {
                    let j = rng.random_range(i..n);
                    pool.swap(i, j);
                }
                let mut indices = pool[..sample_size].to_vec();
                IsolationTree::fit(data, &mut indices, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            n_features,
            sample_size,
            offset: 0.0,
            trees,
        };

        let train_scores: Vec<f64> = data.iter().map(|row| forest.score_row(row)).collect();
        forest.offset = quantile(&train_scores, params.contamination);
        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    // opposite of the anomaly score from the original paper: -1 is a clear outlier
    fn score_row(&self, row: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.path_length(row)).sum();
        let mean = total / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        if norm <= 0.0 {
            return -1.0;
        }
        -(2f64.powf(-mean / norm))
    }

    /// Raw scores, lower is more anomalous.
    pub fn score_samples(&self, data: &[Vec<f64>]) -> Result<Vec<f64>, ForestError> {
        check_dimensions(data, self.n_features)?;
        Ok(data.iter().map(|row| self.score_row(row)).collect())
    }

    /// Scores shifted by the contamination offset: negative means outlier.
    pub fn decision_function(&self, data: &[Vec<f64>]) -> Result<Vec<f64>, ForestError> {
        check_dimensions(data, self.n_features)?;
        Ok(data
            .iter()
            .map(|row| self.score_row(row) - self.offset)
            .collect())
    }

    /// Outlier labels alongside the decision scores they came from.
    pub fn predict(&self, data: &[Vec<f64>]) -> Result<Vec<(bool, f64)>, ForestError> {
        Ok(self
            .decision_function(data)?
            .into_iter()
            .map(|score| (score < 0.0, score))
            .collect())
    }
}

fn check_dimensions(data: &[Vec<f64>], expected: usize) -> Result<(), ForestError> {
    match data.iter().position(|row| row.len() != expected) {
        Some(row) => Err(ForestError::DimensionMismatch {
            row,
            expected,
            found: data[row].len(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // tight cluster around the origin plus a few far points
    fn clustered(n: usize, outliers: &[Vec<f64>]) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data: Vec<Vec<f64>> = (0..n)
            .map(|_| vec![rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)])
            .collect();
        data.extend(outliers.iter().cloned());
        data
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2447).abs() < 1e-3, "c(256) = {}", c256);
    }

    #[test]
    fn test_quantile_interpolates() {
        let values = [4.0, 1.0, 3.0, 2.0];
        assert_eq!(quantile(&values, 0.0), 1.0);
        assert_eq!(quantile(&values, 1.0), 4.0);
        assert!((quantile(&values, 0.5) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_outliers_score_lower() {
        let data = clustered(300, &[vec![8.0, 8.0], vec![-9.0, 7.5]]);
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.decision_function(&data).unwrap();

        let inlier_min = scores[..300].iter().cloned().fold(f64::INFINITY, f64::min);
        assert!(scores[300] < inlier_min);
        assert!(scores[301] < inlier_min);
        assert!(scores[300] < 0.0 && scores[301] < 0.0);
    }

    #[test]
    fn test_contamination_sets_outlier_share() {
        let data = clustered(500, &[]);
        let params = ForestParams {
            contamination: 0.1,
            ..Default::default()
        };
        let forest = IsolationForest::fit(&data, &params).unwrap();
        let flagged = forest
            .predict(&data)
            .unwrap()
            .iter()
            .filter(|(outlier, _)| *outlier)
            .count();
        // strictly below the offset, so ties at the quantile stay inliers
        assert!(flagged <= 50, "flagged {}", flagged);
        assert!(flagged >= 40, "flagged {}", flagged);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let data = clustered(200, &[vec![5.0, 5.0]]);
        let a = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let b = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        assert_eq!(a, b);

        let other = ForestParams {
            seed: 7,
            ..Default::default()
        };
        let c = IsolationForest::fit(&data, &other).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_constant_data_fits() {
        let data = vec![vec![1.0, 2.0]; 20];
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.decision_function(&data).unwrap();
        assert!(scores.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_single_row_fits() {
        let forest = IsolationForest::fit(&[vec![3.0]], &ForestParams::default()).unwrap();
        let scores = forest.decision_function(&[vec![3.0], vec![100.0]]).unwrap();
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_rejects_bad_input() {
        let params = ForestParams::default();
        assert_eq!(IsolationForest::fit(&[], &params), Err(ForestError::EmptyInput));
        assert_eq!(
            IsolationForest::fit(&[vec![]], &params),
            Err(ForestError::NoFeatures)
        );
        assert_eq!(
            IsolationForest::fit(&[vec![1.0, 2.0], vec![1.0]], &params),
            Err(ForestError::DimensionMismatch {
                row: 1,
                expected: 2,
                found: 1
            })
        );

        let bad = ForestParams {
            contamination: 0.7,
            ..Default::default()
        };
        assert_eq!(
            IsolationForest::fit(&[vec![1.0]], &bad),
            Err(ForestError::InvalidContamination(0.7))
        );
    }

    #[test]
    fn test_split_point_stays_in_range() {
        assert_eq!(split_point(0.0, 10.0, 0.25), 2.5);
        assert_eq!(split_point(1.0, 2.0, 0.0), 1.0);
        // rounding up to hi falls back to lo
        assert_eq!(split_point(1.0, 1.0 + f64::EPSILON, 0.999_999_999), 1.0);

        let x = split_point(-1.7e308, 1.7e308, 0.75);
        assert!(x.is_finite() && x > -1.7e308 && x < 1.7e308);
    }

    #[test]
    fn test_extreme_finite_values_fit() {
        let data = vec![vec![-1.7e308], vec![1.7e308], vec![0.0], vec![1.0], vec![2.0]];
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        let scores = forest.decision_function(&data).unwrap();
        assert!(scores.iter().all(|s| s.is_finite()));
    }

    #[test]
    fn test_predict_checks_width() {
        let data = clustered(50, &[]);
        let forest = IsolationForest::fit(&data, &ForestParams::default()).unwrap();
        assert!(forest.predict(&[vec![1.0, 2.0, 3.0]]).is_err());
    }
}
