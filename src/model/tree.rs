//! Least-squares regression trees, the weak learners of [`crate::GradientBoostingRegressor`].

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

/// A fitted tree. `feature` indexes the columns of the full feature matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeNode {
    /// Fits a tree to `y` using only `rows` and the candidate `features` of `x`.
    pub(crate) fn fit(
        x: &Array2<f64>,
        y: &Array1<f64>,
        rows: &[usize],
        features: &[usize],
        params: TreeParams,
    ) -> TreeNode {
        build(x, y, rows, features, params, 0)
    }

    pub(crate) fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    #[cfg(test)]
    fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }
}

fn build(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    features: &[usize],
    params: TreeParams,
    depth: usize,
) -> TreeNode {
    let value = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|&i| y[i]).sum::<f64>() / rows.len() as f64
    };
    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || rows.len() < 2 * min_leaf {
        return TreeNode::Leaf { value };
    }
    let Some(split) = best_split(x, y, rows, features, min_leaf) else {
        return TreeNode::Leaf { value };
    };

    let (left, right): (Vec<usize>, Vec<usize>) = rows
        .iter()
        .partition(|&&i| x[[i, split.feature]] <= split.threshold);
    if left.is_empty() || right.is_empty() {
        return TreeNode::Leaf { value };
    }
    TreeNode::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(build(x, y, &left, features, params, depth + 1)),
        right: Box::new(build(x, y, &right, features, params, depth + 1)),
    }
}

/// Scans each candidate feature in sorted order with running sums. Maximizing
/// `sum_l^2 / n_l + sum_r^2 / n_r` is the same as minimizing the children's squared error.
fn best_split(
    x: &Array2<f64>,
    y: &Array1<f64>,
    rows: &[usize],
    features: &[usize],
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = rows.len();
    let total: f64 = rows.iter().map(|&i| y[i]).sum();
    let parent = total * total / n as f64;

    let mut best: Option<BestSplit> = None;
    let mut sorted: Vec<(f64, f64)> = Vec::with_capacity(n);
    for &feature in features {
        sorted.clear();
        sorted.extend(rows.iter().map(|&i| (x[[i, feature]], y[i])));
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += sorted[k].1;
            let n_left = k + 1;
            let n_right = n - n_left;
            if n_right < min_leaf {
                break;
            }
            if n_left < min_leaf || sorted[k].0 == sorted[k + 1].0 {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                - parent;
            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(BestSplit {
                    feature,
                    threshold: (sorted[k].0 + sorted[k + 1].0) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}
