//! CART regression tree.
//!
//! Nodes live in a flat vector; children are referenced by index. Splits are
//! chosen by maximum reduction in squared error, thresholds sit halfway between
//! adjacent distinct feature values and rows with `value <= threshold` go left.

use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

/// A node in a regression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Split {
        feature: u32,
        threshold: f64,
        left: u32,
        right: u32,
    },
    Leaf {
        value: f64,
    },
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    /// Features examined per split (already resolved to a count).
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

impl RegressionTree {
    /// Grow a tree on the given (possibly repeated) row indices of `x`.
    ///
    /// `rows` must be non-empty and every index must be `< x.nrows()`.
    pub fn fit(x: &DMatrix<f64>, y: &[f64], rows: Vec<usize>, params: &TreeParams, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, y, rows, 0, params, rng);
        tree
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    let v = row[*feature as usize];
                    idx = if v <= *threshold { *left as usize } else { *right as usize };
                }
            }
        }
    }

    /// Check a deserialized tree before it is used for prediction.
    ///
    /// Children must point forward (`grow` always appends them after their
    /// parent), which rules out cycles as well as out-of-range indices.
    pub fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("node {idx} has a non-finite leaf value"));
                    }
                }
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature as usize >= n_features {
                        return Err(format!("node {idx} splits on feature {feature} of {n_features}"));
                    }
                    if threshold.is_nan() {
                        return Err(format!("node {idx} has a NaN threshold"));
                    }
                    for child in [*left as usize, *right as usize] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} points at invalid child {child}"));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left as usize).max(walk(nodes, *right as usize)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    fn grow(
        &mut self,
        x: &DMatrix<f64>,
        y: &[f64],
        rows: Vec<usize>,
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> u32 {
        let idx = self.nodes.len() as u32;
        let n = rows.len() as f64;
        let value = rows.iter().map(|&r| y[r]).sum::<f64>() / n;
        self.nodes.push(Node::Leaf { value });

        if depth >= params.max_depth || rows.len() < params.min_samples_split.max(2) {
            return idx;
        }
        let first = y[rows[0]];
        if rows.iter().all(|&r| y[r] == first) {
            return idx;
        }

        let Some(best) = find_best_split(x, y, &rows, params.max_features, rng) else {
            return idx;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| x[(r, best.feature)] <= best.threshold);
        if left_rows.is_empty() || right_rows.is_empty() {
            return idx;
        }

        let left = self.grow(x, y, left_rows, depth + 1, params, rng);
        let right = self.grow(x, y, right_rows, depth + 1, params, rng);
        self.nodes[idx as usize] = Node::Split {
            feature: best.feature as u32,
            threshold: best.threshold,
            left,
            right,
        };
        idx
    }
}

fn find_best_split(
    x: &DMatrix<f64>,
    y: &[f64],
    rows: &[usize],
    max_features: usize,
    rng: &mut StdRng,
) -> Option<BestSplit> {
    let n_features = x.ncols();
    let k = max_features.clamp(1, n_features);
    let mut features: Vec<usize> = if k >= n_features {
        (0..n_features).collect()
    } else {
        sample(rng, n_features, k).into_vec()
    };
    // Deterministic scan order so ties resolve the same way on every run.
    features.sort_unstable();

    let n = rows.len();
    let total: f64 = rows.iter().map(|&r| y[r]).sum();
    // Score = sum_l^2/n_l + sum_r^2/n_r; maximizing it minimizes the child SSE.
    let parent_score = total * total / n as f64;

    let mut best: Option<BestSplit> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for f in features {
        pairs.clear();
        pairs.extend(rows.iter().map(|&r| (x[(r, f)], y[r])));
        pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

        if pairs[0].0 == pairs[n - 1].0 {
            continue;
        }

        let mut left_sum = 0.0;
        for i in 1..n {
            left_sum += pairs[i - 1].1;
            if pairs[i - 1].0 == pairs[i].0 {
                continue;
            }
            let nl = i as f64;
            let nr = (n - i) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / nl + right_sum * right_sum / nr;
            if best.is_none_or(|b| score > b.score) {
                best = Some(BestSplit {
                    feature: f,
                    threshold: pairs[i - 1].0 + (pairs[i].0 - pairs[i - 1].0) / 2.0,
                    score,
                });
            }
        }
    }

    best.filter(|b| b.score > parent_score + 1e-12 * parent_score.abs().max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(depth: usize) -> TreeParams {
        TreeParams {
            max_depth: depth,
            min_samples_split: 2,
            max_features: usize::MAX,
        }
    }

    #[test]
    fn step_function_is_learned_exactly() {
        let x = DMatrix::from_row_slice(6, 1, &[1.0, 2.0, 3.0, 10.0, 11.0, 12.0]);
        let y = [5.0, 5.0, 5.0, 20.0, 20.0, 20.0];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..6).collect(), &params(3), &mut rng);
        assert_eq!(tree.predict_row(&[2.5]), 5.0);
        assert_eq!(tree.predict_row(&[11.5]), 20.0);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.node_count(), 3);
    }

    #[test]
    fn depth_limit_is_respected() {
        let x = DMatrix::from_fn(32, 1, |i, _| i as f64);
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..32).collect(), &params(2), &mut rng);
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x = DMatrix::from_fn(5, 2, |i, j| (i + j) as f64);
        let y = [3.0; 5];
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..5).collect(), &params(5), &mut rng);
        assert_eq!(tree.node_count(), 1);
        assert_eq!(tree.predict_row(&[100.0, -1.0]), 3.0);
    }

    #[test]
    fn split_picks_informative_feature() {
        // Column 0 is noise-free signal, column 1 is constant.
        let x = DMatrix::from_fn(8, 2, |i, j| if j == 0 { i as f64 } else { 1.0 });
        let y: Vec<f64> = (0..8).map(|i| if i < 4 { 0.0 } else { 1.0 }).collect();
        let mut rng = StdRng::seed_from_u64(0);
        let tree = RegressionTree::fit(&x, &y, (0..8).collect(), &params(1), &mut rng);
        assert_eq!(tree.predict_row(&[0.0, 1.0]), 0.0);
        assert_eq!(tree.predict_row(&[7.0, 1.0]), 1.0);
    }

    #[test]
    fn fitted_tree_passes_validation() {
        let x = DMatrix::from_fn(20, 2, |i, j| (i * (j + 2)) as f64);
        let y: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let mut rng = StdRng::seed_from_u64(3);
        let tree = RegressionTree::fit(&x, &y, (0..20).collect(), &params(4), &mut rng);
        assert!(tree.validate(2).is_ok());
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn malformed_trees_fail_validation() {
        let cyclic = RegressionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 1,
                },
                Node::Leaf { value: 1.0 },
            ],
        };
        assert!(cyclic.validate(1).unwrap_err().contains("invalid child 0"));

        let dangling = RegressionTree {
            nodes: vec![Node::Split {
                feature: 0,
                threshold: 1.0,
                left: 1,
                right: 2,
            }],
        };
        assert!(dangling.validate(1).is_err());

        assert!(RegressionTree { nodes: Vec::new() }.validate(1).is_err());
        let nan_leaf = RegressionTree {
            nodes: vec![Node::Leaf { value: f64::NAN }],
        };
        assert!(nan_leaf.validate(1).is_err());
    }
}
