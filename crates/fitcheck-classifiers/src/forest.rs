//! Random forest classifier
//!
//! A bagged ensemble of CART trees split on Gini impurity. Each tree is grown
//! on a bootstrap sample and considers a random subset of features at every
//! split. Leaves keep the class distribution of the samples that reached them
//! and `predict_proba` averages those distributions across trees.
//!
//! Trees are stored as flat node arrays rather than boxed recursion so that
//! artifacts of any depth serialize and deserialize without hitting recursion
//! limits.

use crate::classifier::FitClassifier;
use fitcheck_core::{Error, Result};
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of features examined at each split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `ceil(sqrt(n_features))`
    Sqrt,
    /// `ceil(log2(n_features))`
    Log2,
    /// Every feature
    All,
    /// Fixed count, clamped to `1..=n_features`
    Count(usize),
}

impl MaxFeatures {
    /// Resolve against the actual feature count
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = n_features.max(1);
        let k = match self {
            Self::Sqrt => (n as f64).sqrt().ceil() as usize,
            Self::Log2 => (n as f64).log2().ceil() as usize,
            Self::All => n,
            Self::Count(k) => *k,
        };
        k.clamp(1, n)
    }
}

impl Default for MaxFeatures {
    fn default() -> Self {
        Self::Sqrt
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,

    /// Maximum tree depth (root is depth 0); unbounded when `None`
    pub max_depth: Option<usize>,

    /// Minimum samples required to split a node
    pub min_samples_split: usize,

    /// Minimum samples required on each side of a split
    pub min_samples_leaf: usize,

    /// Features considered per split
    pub max_features: MaxFeatures,

    /// Grow each tree on a bootstrap resample
    pub bootstrap: bool,

    /// Seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Set the number of trees
    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Set the maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set the features examined per split
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::config("n_estimators must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(Error::config("min_samples_split must be at least 2"));
        }
        if self.min_samples_leaf < 1 {
            return Err(Error::config("min_samples_leaf must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        distribution: Vec<f64>,
    },
}

/// Single CART tree in pre-allocated node order (root at index 0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

struct PendingNode {
    index: usize,
    samples: Vec<usize>,
    depth: usize,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

impl DecisionTree {
    fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        samples: Vec<usize>,
        n_classes: usize,
        params: &ForestParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map_or(0, Vec::len);
        let k = params.max_features.resolve(n_features);

        let mut nodes = vec![Node::Leaf {
            distribution: Vec::new(),
        }];
        let mut stack = vec![PendingNode {
            index: 0,
            samples,
            depth: 0,
        }];

        while let Some(pending) = stack.pop() {
            let counts = class_counts(y, &pending.samples, n_classes);
            let distinct = counts.iter().filter(|&&c| c > 0).count();
            let depth_reached = params.max_depth.is_some_and(|d| pending.depth >= d);

            if distinct <= 1 || depth_reached || pending.samples.len() < params.min_samples_split {
                nodes[pending.index] = leaf(&counts);
                continue;
            }

            let Some(split) = best_split(x, y, &pending.samples, n_classes, k, params, rng) else {
                nodes[pending.index] = leaf(&counts);
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = pending
                .samples
                .iter()
                .partition(|&&s| x[s][split.feature] <= split.threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            nodes[pending.index] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push(PendingNode {
                index: right,
                samples: right_samples,
                depth: pending.depth + 1,
            });
            stack.push(PendingNode {
                index: left,
                samples: left_samples,
                depth: pending.depth + 1,
            });
        }

        Self { nodes }
    }

    fn leaf_distribution(&self, features: &[f64]) -> Result<&[f64]> {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { distribution }) => return Ok(distribution),
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).ok_or_else(|| {
                        Error::prediction_failed(format!("split on missing feature {}", feature))
                    })?;
                    idx = if *value <= *threshold { *left } else { *right };
                }
                None => {
                    return Err(Error::prediction_failed(format!(
                        "tree references node {} of {}",
                        idx,
                        self.nodes.len()
                    )))
                }
            }
        }
    }

    /// Number of nodes in the tree
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

fn class_counts(y: &[usize], samples: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0; n_classes];
    for &s in samples {
        counts[y[s]] += 1;
    }
    counts
}

fn leaf(counts: &[usize]) -> Node {
    let total: usize = counts.iter().sum();
    let distribution = counts
        .iter()
        .map(|&c| if total == 0 { 0.0 } else { c as f64 / total as f64 })
        .collect();
    Node::Leaf { distribution }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / n;
            p * p
        })
        .sum::<f64>()
}

fn best_split(
    x: &[Vec<f64>],
    y: &[usize],
    samples: &[usize],
    n_classes: usize,
    k: usize,
    params: &ForestParams,
    rng: &mut StdRng,
) -> Option<Split> {
    let n_features = x[samples[0]].len();
    let mut candidates: Vec<usize> = (0..n_features).collect();
    candidates.shuffle(rng);
    candidates.truncate(k);

    let n = samples.len();
    let total_counts = class_counts(y, samples, n_classes);
    let mut best: Option<Split> = None;

    for feature in candidates {
        let mut sorted = samples.to_vec();
        sorted.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_counts = vec![0usize; n_classes];
        let mut right_counts = total_counts.clone();

        for i in 0..n - 1 {
            let class = y[sorted[i]];
            left_counts[class] += 1;
            right_counts[class] -= 1;

            let current = x[sorted[i]][feature];
            let next = x[sorted[i + 1]][feature];
            if current == next {
                continue;
            }

            let n_left = i + 1;
            let n_right = n - n_left;
            if n_left < params.min_samples_leaf || n_right < params.min_samples_leaf {
                continue;
            }

            let impurity = (n_left as f64 * gini(&left_counts, n_left)
                + n_right as f64 * gini(&right_counts, n_right))
                / n as f64;

            if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(Split {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
    }

    best
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    classes: Vec<String>,
    n_features: usize,
    params: ForestParams,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on row-major features and string labels.
    ///
    /// Classes are the sorted distinct labels.
    pub fn fit(params: &ForestParams, x: &[Vec<f64>], y: &[String]) -> Result<Self> {
        params.validate()?;

        if x.is_empty() {
            return Err(Error::training("cannot fit on zero samples"));
        }
        if x.len() != y.len() {
            return Err(Error::training(format!(
                "{} feature rows but {} labels",
                x.len(),
                y.len()
            )));
        }

        let n_features = x[0].len();
        if n_features == 0 {
            return Err(Error::training("feature rows are empty"));
        }
        for (i, row) in x.iter().enumerate() {
            if row.len() != n_features {
                return Err(Error::training(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
            if row.iter().any(|v| !v.is_finite()) {
                return Err(Error::training(format!("row {} has a non-finite value", i)));
            }
        }

        let mut classes: Vec<String> = y.to_vec();
        classes.sort();
        classes.dedup();

        let encoded: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let n = x.len();
        let trees = (0..params.n_estimators)
            .map(|_| {
                let samples: Vec<usize> = if params.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                DecisionTree::fit(x, &encoded, samples, classes.len(), params, &mut rng)
            })
            .collect();

        Ok(Self {
            classes,
            n_features,
            params: params.clone(),
            trees,
        })
    }

    /// Hyperparameters the forest was trained with
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Fraction of rows whose prediction matches the label
    pub fn accuracy(&self, x: &[Vec<f64>], y: &[String]) -> Result<f64> {
        if x.is_empty() || x.len() != y.len() {
            return Err(Error::training("accuracy needs equal, non-empty rows and labels"));
        }
        let mut correct = 0usize;
        for (row, label) in x.iter().zip(y) {
            if &self.predict(row)? == label {
                correct += 1;
            }
        }
        Ok(correct as f64 / x.len() as f64)
    }
}

impl FitClassifier for RandomForest {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(Error::prediction_failed(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(Error::prediction_failed("feature vector has a non-finite value"));
        }
        if self.trees.is_empty() {
            return Err(Error::prediction_failed("forest has no trees"));
        }

        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let distribution = tree.leaf_distribution(features)?;
            if distribution.len() != proba.len() {
                return Err(Error::prediction_failed("leaf distribution width mismatch"));
            }
            for (acc, p) in proba.iter_mut().zip(distribution) {
                *acc += p;
            }
        }

        let n_trees = self.trees.len() as f64;
        for p in &mut proba {
            *p /= n_trees;
        }
        Ok(proba)
    }
}
