//! Random forest ensembles for regression and binary classification
//!
//! Bagged CART trees grown on bootstrap samples. Regression splits maximise
//! the reduction of squared error; classification splits maximise the
//! reduction of Gini impurity. Each candidate feature is scanned in sorted
//! order with running weighted sums. Trees are fitted in parallel with rayon,
//! each from its own seed, so a fit is reproducible for a given configuration.
//!
//! The per-tree predictions double as an uncertainty estimate: their
//! standard deviation is used for forecast confidence intervals.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

use super::error::{DataError, DataResult};

/// Candidate features considered at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn count(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
        }
    }
}

/// Node impurity minimised by the split search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitCriterion {
    SquaredError,
    /// Targets must be 0.0 or 1.0
    Gini,
}

impl SplitCriterion {
    /// Weighted impurity of a node from its running sums: total weight `w`,
    /// weighted target sum `s` and weighted sum of squared targets `ss`
    fn node_cost(&self, w: f64, s: f64, ss: f64) -> f64 {
        if w <= 0.0 {
            return 0.0;
        }
        match self {
            SplitCriterion::SquaredError => (ss - s * s / w).max(0.0),
            // w * (1 - p^2 - (1-p)^2) with p = s / w
            SplitCriterion::Gini => (2.0 * s * (w - s) / w).max(0.0),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single decision tree stored as a flat node arena. Leaves hold the
/// weighted mean target, which for classification is the positive-class
/// probability.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

/// Rows, targets and per-row weights shared by every tree of a fit
struct TrainingSet<'a> {
    x: &'a [Vec<f64>],
    y: &'a [f64],
    weights: &'a [f64],
    criterion: SplitCriterion,
}

/// Best split of one node: (feature, threshold, impurity reduction)
type SplitCandidate = (usize, f64, f64);

/// Find the threshold on `feature` that most reduces the node impurity
fn find_best_split(
    data: &TrainingSet,
    indices: &[usize],
    feature: usize,
    min_samples_leaf: usize,
) -> Option<(f64, f64)> {
    let n = indices.len();
    if n < 2 * min_samples_leaf.max(1) {
        return None;
    }

    let mut sorted: Vec<(f64, f64, f64)> = indices
        .iter()
        .map(|&i| (data.x[i][feature], data.y[i], data.weights[i]))
        .collect();
    sorted.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let (mut total_w, mut total_s, mut total_ss) = (0.0, 0.0, 0.0);
    for &(_, t, w) in &sorted {
        total_w += w;
        total_s += w * t;
        total_ss += w * t * t;
    }
    let parent = data.criterion.node_cost(total_w, total_s, total_ss);

    let mut best_gain = 0.0;
    let mut best_threshold = None;
    let (mut left_w, mut left_s, mut left_ss) = (0.0, 0.0, 0.0);

    for i in 0..n - 1 {
        let (value, target, weight) = sorted[i];
        left_w += weight;
        left_s += weight * target;
        left_ss += weight * target * target;

        let left_count = i + 1;
        let right_count = n - left_count;
        if left_count < min_samples_leaf || right_count < min_samples_leaf {
            continue;
        }
        // Never split between equal values
        if (value - sorted[i + 1].0).abs() < 1e-12 {
            continue;
        }

        let children = data.criterion.node_cost(left_w, left_s, left_ss)
            + data
                .criterion
                .node_cost(total_w - left_w, total_s - left_s, total_ss - left_ss);
        let gain = parent - children;
        if gain > best_gain + 1e-12 {
            best_gain = gain;
            best_threshold = Some((value + sorted[i + 1].0) / 2.0);
        }
    }

    best_threshold.map(|t| (t, best_gain))
}

/// `n / (2 * n_class)` per row, so both classes carry equal total weight
pub fn balanced_class_weights(labels: &[bool]) -> Vec<f64> {
    let n = labels.len() as f64;
    let positives = labels.iter().filter(|l| **l).count() as f64;
    let negatives = n - positives;
    labels
        .iter()
        .map(|&l| {
            let class_count = if l { positives } else { negatives };
            n / (2.0 * class_count)
        })
        .collect()
}

impl DecisionTree {
    fn fit(data: &TrainingSet, sample: Vec<usize>, config: &ForestConfig, rng: &mut StdRng) -> Self {
        let n_features = data.x.first().map_or(0, |row| row.len());
        let mut tree = DecisionTree {
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        tree.grow(data, sample, 0, config, rng);
        tree
    }

    fn grow(
        &mut self,
        data: &TrainingSet,
        indices: Vec<usize>,
        depth: usize,
        config: &ForestConfig,
        rng: &mut StdRng,
    ) -> usize {
        let n = indices.len();
        let weight: f64 = indices.iter().map(|&i| data.weights[i]).sum();
        let weighted: f64 = indices.iter().map(|&i| data.weights[i] * data.y[i]).sum();
        let mean = if weight > 0.0 { weighted / weight } else { 0.0 };
        let node_id = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean });

        let depth_reached = config.max_depth.is_some_and(|d| depth >= d);
        if depth_reached || n < config.min_samples_split.max(2) {
            return node_id;
        }

        let n_features = self.importances.len();
        let k = config.max_features.count(n_features);
        let candidates: Vec<usize> = if k >= n_features {
            (0..n_features).collect()
        } else {
            rand::seq::index::sample(rng, n_features, k).into_vec()
        };

        let mut best: Option<SplitCandidate> = None;
        for feature in candidates {
            if let Some((threshold, gain)) =
                find_best_split(data, &indices, feature, config.min_samples_leaf)
            {
                if best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, threshold, gain));
                }
            }
        }

        let Some((feature, threshold, gain)) = best else {
            return node_id;
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) =
            indices.into_iter().partition(|&i| data.x[i][feature] <= threshold);
        self.importances[feature] += gain;

        let left = self.grow(data, left_idx, depth + 1, config, rng);
        let right = self.grow(data, right_idx, depth + 1, config, rng);
        self.nodes[node_id] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        node_id
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match &nodes[id] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            walk(&self.nodes, 0)
        }
    }
}

/// Mean and spread of the individual tree predictions for one row
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnsemblePrediction {
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    /// Fit a regression ensemble on a row-major feature matrix
    pub fn fit(x: &[Vec<f64>], y: &[f64], config: &ForestConfig) -> DataResult<Self> {
        let weights = vec![1.0; y.len()];
        Self::fit_with(x, y, &weights, SplitCriterion::SquaredError, config)
    }

    /// Fit a binary classifier with Gini splits and balanced class weights.
    /// [`RandomForest::predict`] then returns the positive-class probability.
    pub fn fit_classifier(x: &[Vec<f64>], labels: &[bool], config: &ForestConfig) -> DataResult<Self> {
        let positives = labels.iter().filter(|l| **l).count();
        if positives == 0 || positives == labels.len() {
            return Err(DataError::InsufficientData(
                "a classifier needs both classes in the training rows".to_string(),
            ));
        }
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let weights = balanced_class_weights(labels);
        Self::fit_with(x, &y, &weights, SplitCriterion::Gini, config)
    }

    fn fit_with(
        x: &[Vec<f64>],
        y: &[f64],
        weights: &[f64],
        criterion: SplitCriterion,
        config: &ForestConfig,
    ) -> DataResult<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(DataError::InsufficientData(format!(
                "cannot fit a forest on {} rows and {} targets",
                x.len(),
                y.len()
            )));
        }
        let n_features = x[0].len();
        if n_features == 0 || x.iter().any(|row| row.len() != n_features) {
            return Err(DataError::InsufficientData(
                "feature rows must be non-empty and of equal width".to_string(),
            ));
        }
        if config.n_trees == 0 {
            return Err(DataError::InsufficientData(
                "a forest needs at least one tree".to_string(),
            ));
        }

        let data = TrainingSet {
            x,
            y,
            weights,
            criterion,
        };
        let n = x.len();
        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(i as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(&data, sample, config, &mut rng)
            })
            .collect();

        tracing::debug!(
            trees = trees.len(),
            rows = n,
            features = n_features,
            ?criterion,
            "random forest fitted"
        );
        Ok(Self { trees, n_features })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn tree_predictions(&self, row: &[f64]) -> Vec<f64> {
        self.trees.iter().map(|t| t.predict(row)).collect()
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        self.predict_with_spread(row).mean
    }

    /// Ensemble mean with the population standard deviation across trees
    pub fn predict_with_spread(&self, row: &[f64]) -> EnsemblePrediction {
        let preds = self.tree_predictions(row);
        let n = preds.len() as f64;
        let mean = preds.iter().sum::<f64>() / n;
        let var = preds.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n;
        EnsemblePrediction {
            mean,
            std: var.sqrt(),
        }
    }

    /// Impurity-decrease importances, normalised to sum to 1
    pub fn feature_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            let tree_total: f64 = tree.importances.iter().sum();
            if tree_total > 0.0 {
                for (acc, imp) in totals.iter_mut().zip(&tree.importances) {
                    *acc += imp / tree_total;
                }
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|v| *v /= sum);
        }
        totals
    }

    pub fn max_depth(&self) -> usize {
        self.trees.iter().map(|t| t.depth()).max().unwrap_or(0)
    }
}

/// Mean absolute error, root mean squared error and R² of a prediction set
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegressionMetrics {
    pub mae: f64,
    pub rmse: f64,
    pub r2: f64,
}

pub fn regression_metrics(actual: &[f64], predicted: &[f64]) -> Option<RegressionMetrics> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let n = actual.len() as f64;
    let mae = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n;
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let mean = actual.iter().sum::<f64>() / n;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    Some(RegressionMetrics {
        mae,
        rmse: (ss_res / n).sqrt(),
        r2: if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_set<'a>(x: &'a [Vec<f64>], y: &'a [f64], w: &'a [f64], criterion: SplitCriterion) -> TrainingSet<'a> {
        TrainingSet {
            x,
            y,
            weights: w,
            criterion,
        }
    }

    #[test]
    fn test_find_best_split_separates_steps() {
        let x: Vec<Vec<f64>> = (0..10).map(|v| vec![v as f64]).collect();
        let y: Vec<f64> = (0..10).map(|v| if v < 5 { 1.0 } else { 10.0 }).collect();
        let w = vec![1.0; 10];
        let idx: Vec<usize> = (0..10).collect();
        let data = unit_set(&x, &y, &w, SplitCriterion::SquaredError);
        let (threshold, gain) = find_best_split(&data, &idx, 0, 1).unwrap();
        assert!((threshold - 4.5).abs() < 1e-12, "got {}", threshold);
        assert!(gain > 0.0);
    }

    #[test]
    fn test_find_best_split_constant_feature() {
        let x = vec![vec![1.0]; 6];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let w = vec![1.0; 6];
        let idx: Vec<usize> = (0..6).collect();
        let data = unit_set(&x, &y, &w, SplitCriterion::SquaredError);
        assert!(find_best_split(&data, &idx, 0, 1).is_none());
    }

    #[test]
    fn test_gini_split_isolates_the_minority_class() {
        // Positives at 8 and 9 only
        let x: Vec<Vec<f64>> = (0..10).map(|v| vec![v as f64]).collect();
        let labels: Vec<bool> = (0..10).map(|v| v >= 8).collect();
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let w = balanced_class_weights(&labels);
        let idx: Vec<usize> = (0..10).collect();
        let data = unit_set(&x, &y, &w, SplitCriterion::Gini);
        let (threshold, gain) = find_best_split(&data, &idx, 0, 1).unwrap();
        assert!((threshold - 7.5).abs() < 1e-12, "got {}", threshold);
        // Balanced weights give both classes total weight 5, so the parent
        // impurity is 2 * 5 * 5 / 10 and a pure split removes all of it
        assert!((gain - 5.0).abs() < 1e-9, "got {}", gain);
    }

    #[test]
    fn test_node_cost() {
        // values 1, 2, 3: mean 2, squared deviations 1 + 0 + 1
        assert!((SplitCriterion::SquaredError.node_cost(3.0, 6.0, 14.0) - 2.0).abs() < 1e-12);
        // 2 positives of 4: 4 * (1 - 0.25 - 0.25)
        assert!((SplitCriterion::Gini.node_cost(4.0, 2.0, 2.0) - 2.0).abs() < 1e-12);
        assert_eq!(SplitCriterion::Gini.node_cost(4.0, 4.0, 4.0), 0.0);
    }

    #[test]
    fn test_balanced_class_weights() {
        let w = balanced_class_weights(&[true, false, false, false]);
        assert_eq!(w, vec![2.0, 2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]);
        let positive: f64 = w[..1].iter().sum();
        let negative: f64 = w[1..].iter().sum();
        assert!((positive - negative).abs() < 1e-12);
    }

    #[test]
    fn test_metrics_perfect_fit() {
        let m = regression_metrics(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.r2, 1.0);
    }
}
