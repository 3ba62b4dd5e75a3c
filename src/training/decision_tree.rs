//! Decision tree implementation

use super::models::{n_classes, Classifier};
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Decision tree node
#[derive(Debug, Clone)]
pub enum TreeNode {
    /// Leaf node with majority class
    Leaf {
        class_idx: usize,
        n_samples: usize,
        impurity: f64,
        counts: Vec<usize>,
    },
    /// Internal node with split `x[feature_idx] <= threshold` going left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
        counts: Vec<usize>,
    },
}

impl TreeNode {
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Leaf { n_samples, .. } | TreeNode::Split { n_samples, .. } => *n_samples,
        }
    }

    /// Gini impurity of the samples reaching this node
    pub fn impurity(&self) -> f64 {
        match self {
            TreeNode::Leaf { impurity, .. } | TreeNode::Split { impurity, .. } => *impurity,
        }
    }

    /// Per-class sample counts at this node
    pub fn counts(&self) -> &[usize] {
        match self {
            TreeNode::Leaf { counts, .. } | TreeNode::Split { counts, .. } => counts,
        }
    }

    /// Majority class; ties go to the lowest class index
    pub fn majority_class(&self) -> usize {
        match self {
            TreeNode::Leaf { class_idx, .. } => *class_idx,
            TreeNode::Split { counts, .. } => argmax(counts),
        }
    }
}

/// Candidate split of one node
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    weighted_impurity: f64,
}

/// CART classification tree with Gini impurity
#[derive(Debug, Clone)]
pub struct DecisionTree {
    /// Tree root
    root: Option<TreeNode>,
    /// Maximum depth
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Seed for the order in which features are visited
    pub random_state: u64,
    /// Number of features
    n_features: usize,
    /// Number of classes
    n_classes: usize,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    /// Create a new classifier tree
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            random_state: 42,
            n_features: 0,
            n_classes: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Seed the feature visiting order
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn root(&self) -> Option<&TreeNode> {
        self.root.as_ref()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> TreeNode {
        let n_samples = indices.len();
        let counts = self.class_counts(y, indices);
        let impurity = gini(&counts, n_samples);

        // Check stopping conditions
        let should_stop = n_samples < self.min_samples_split
            || n_samples < 2 * self.min_samples_leaf
            || self.max_depth.map_or(false, |d| depth >= d)
            || impurity <= 0.0;

        let best = if should_stop {
            None
        } else {
            let mut order: Vec<usize> = (0..self.n_features).collect();
            order.shuffle(rng);
            self.find_best_split(x, y, indices, &order)
        };

        let Some(best) = best else {
            return TreeNode::Leaf {
                class_idx: argmax(&counts),
                n_samples,
                impurity,
                counts,
            };
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, best.feature_idx]] <= best.threshold);

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, rng));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, rng));

        TreeNode::Split {
            feature_idx: best.feature_idx,
            threshold: best.threshold,
            left,
            right,
            n_samples,
            impurity,
            counts,
        }
    }

    /// Best split over `order`; on equal impurity the feature visited first wins
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        order: &[usize],
    ) -> Option<SplitCandidate> {
        // Each feature independently finds its best split
        let feature_results: Vec<Option<SplitCandidate>> = order
            .par_iter()
            .map(|&feature_idx| self.best_split_for_feature(x, y, indices, feature_idx))
            .collect();

        feature_results
            .into_iter()
            .flatten()
            .fold(None, |best: Option<SplitCandidate>, candidate| match best {
                Some(b) if b.weighted_impurity <= candidate.weighted_impurity => Some(b),
                _ => Some(candidate),
            })
    }

    /// Sorted sweep over one feature with midpoint thresholds
    fn best_split_for_feature(
        &self,
        x: &Array2<f64>,
        y: &Array1<usize>,
        indices: &[usize],
        feature_idx: usize,
    ) -> Option<SplitCandidate> {
        let mut sorted: Vec<(f64, usize)> = indices
            .iter()
            .map(|&i| (x[[i, feature_idx]], y[i]))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let n = sorted.len();
        let mut left_counts = vec![0usize; self.n_classes];
        let mut right_counts = vec![0usize; self.n_classes];
        for &(_, class) in &sorted {
            right_counts[class] += 1;
        }

        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n.saturating_sub(1) {
            let class = sorted[pos].1;
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let (value, next) = (sorted[pos].0, sorted[pos + 1].0);
            if next <= value {
                continue;
            }

            let left_count = pos + 1;
            let right_count = n - left_count;
            if left_count < self.min_samples_leaf || right_count < self.min_samples_leaf {
                continue;
            }

            let weighted_impurity = (left_count as f64 * gini(&left_counts, left_count)
                + right_count as f64 * gini(&right_counts, right_count))
                / n as f64;

            if best.map_or(true, |b| weighted_impurity < b.weighted_impurity) {
                let mut threshold = value / 2.0 + next / 2.0;
                // Keep the threshold strictly below `next`
                if threshold >= next {
                    threshold = value;
                }
                best = Some(SplitCandidate {
                    feature_idx,
                    threshold,
                    weighted_impurity,
                });
            }
        }

        best
    }

    fn class_counts(&self, y: &Array1<usize>, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }

    fn predict_sample(&self, node: &TreeNode, x: &Array2<f64>, row: usize) -> usize {
        match node {
            TreeNode::Leaf { class_idx, .. } => *class_idx,
            TreeNode::Split {
                feature_idx,
                threshold,
                left,
                right,
                ..
            } => {
                if x[[row, *feature_idx]] <= *threshold {
                    self.predict_sample(left, x, row)
                } else {
                    self.predict_sample(right, x, row)
                }
            }
        }
    }

    /// Get tree depth; a tree that is a single leaf has depth 0
    pub fn get_depth(&self) -> usize {
        self.root.as_ref().map_or(0, node_depth)
    }

    /// Get number of leaves
    pub fn get_n_leaves(&self) -> usize {
        self.root.as_ref().map_or(0, count_leaves)
    }
}

impl Classifier for DecisionTree {
    /// Fit the tree to training data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(PipelineError::ComputationError(format!(
                "x has {} rows but y has {} values",
                n_samples,
                y.len()
            )));
        }
        if n_samples == 0 {
            return Err(PipelineError::TrainingError(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }
        if let Some(depth) = self.max_depth.filter(|&d| d == 0) {
            return Err(PipelineError::invalid_parameter("max_depth", depth, "must be >= 1"));
        }

        self.n_features = x.ncols();
        self.n_classes = n_classes(y);

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let indices: Vec<usize> = (0..n_samples).collect();
        self.root = Some(self.build_tree(x, y, &indices, 0, &mut rng));

        Ok(())
    }

    /// Make predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| PipelineError::TrainingError("model is not fitted".to_string()))?;
        if x.ncols() != self.n_features {
            return Err(PipelineError::ComputationError(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        Ok((0..x.nrows())
            .map(|row| self.predict_sample(root, x, row))
            .collect())
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts
        .iter()
        .map(|&c| (c as f64 / n).powi(2))
        .sum::<f64>()
}

/// Index of the first maximum
fn argmax(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0
}

fn node_depth(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 0,
        TreeNode::Split { left, right, .. } => 1 + node_depth(left).max(node_depth(right)),
    }
}

fn count_leaves(node: &TreeNode) -> usize {
    match node {
        TreeNode::Leaf { .. } => 1,
        TreeNode::Split { left, right, .. } => count_leaves(left) + count_leaves(right),
    }
}
