//! Isolation-forest anomaly scorer.
//!
//! Rows that isolate at shallow tree depth are anomalous. Scores follow the
//! scikit-learn `score_samples` convention: more negative is more anomalous.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::ForestConfig;
use crate::error::{PipelineError, Result};
use crate::model::FEATURE_NAMES;

const MAGIC: &str = "BWIF1";

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf { size: usize, depth: usize },
    Internal { feature: usize, split: f64, left: Box<Node>, right: Box<Node> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForestModel {
    trees: Vec<Node>,
    n_features: usize,
    subsample_size: usize,
    threshold: f64,
}

fn harmonic(n: usize) -> f64 {
    (1..=n).map(|i| 1.0 / i as f64).sum()
}

/// Average BST unsuccessful-search path length for `n` points.
fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    2.0 * harmonic(n - 1) - (2.0 * (n as f64 - 1.0) / n as f64)
}

fn seed_for_estimator(random_state: u64, estimator_index: usize) -> u64 {
    // Deterministic per-estimator seed so tree structure does not depend on
    // n_estimators or estimator evaluation order.
    let mut h = random_state ^ 0x9E37_79B9_7F4A_7C15;
    h = h.wrapping_mul(0xBF58_476D_1CE4_E5B9).wrapping_add(estimator_index as u64);
    h ^= h >> 31;
    h
}

fn build_tree(rows: &[&[f64]], depth: usize, max_depth: usize, rng: &mut ChaCha8Rng) -> Node {
    if rows.len() <= 1 || depth >= max_depth {
        return Node::Leaf { size: rows.len(), depth };
    }

    let n_features = rows[0].len();
    // Try a handful of random features in case the first choices are constant
    // across this subsample.
    for _ in 0..n_features.max(1) {
        let feature = rng.gen_range(0..n_features);
        let mut min_v = f64::INFINITY;
        let mut max_v = f64::NEG_INFINITY;
        for row in rows {
            let v = row[feature];
            if v < min_v {
                min_v = v;
            }
            if v > max_v {
                max_v = v;
            }
        }
        if min_v == max_v {
            continue;
        }
        let split = rng.gen_range(min_v..max_v);
        let (left, right): (Vec<&[f64]>, Vec<&[f64]>) = rows.iter().partition(|r| r[feature] < split);
        if left.is_empty() || right.is_empty() {
            continue;
        }
        let left_node = build_tree(&left, depth + 1, max_depth, rng);
        let right_node = build_tree(&right, depth + 1, max_depth, rng);
        return Node::Internal {
            feature,
            split,
            left: Box::new(left_node),
            right: Box::new(right_node),
        };
    }

    // All sampled features were constant across this subsample: isolate here.
    Node::Leaf { size: rows.len(), depth }
}

fn path_length(node: &Node, row: &[f64]) -> f64 {
    match node {
        Node::Leaf { size, depth } => *depth as f64 + c_factor(*size),
        Node::Internal { feature, split, left, right } => {
            if row[*feature] < *split {
                path_length(left, row)
            } else {
                path_length(right, row)
            }
        }
    }
}

impl IsolationForestModel {
    pub fn fit(rows: &[[f64; FEATURE_NAMES.len()]], cfg: &ForestConfig) -> Self {
        let n = rows.len();
        let subsample_size = cfg.subsample_size.min(n.max(1));
        let max_depth = ((subsample_size.max(2) as f64).log2().ceil() as usize).max(1);

        let refs: Vec<&[f64]> = rows.iter().map(|r| r.as_slice()).collect();
        let mut trees = Vec::with_capacity(cfg.n_estimators);
        for i in 0..cfg.n_estimators {
            let mut rng = ChaCha8Rng::seed_from_u64(seed_for_estimator(cfg.random_state, i));
            let sample: Vec<&[f64]> = if refs.len() <= subsample_size {
                refs.clone()
            } else {
                refs.choose_multiple(&mut rng, subsample_size).cloned().collect()
            };
            trees.push(build_tree(&sample, 0, max_depth, &mut rng));
        }

        let mut model = Self {
            trees,
            n_features: FEATURE_NAMES.len(),
            subsample_size,
            threshold: 0.0,
        };

        let mut scores = model.score_samples(rows);
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let idx = ((cfg.contamination * scores.len() as f64).floor() as usize).min(scores.len().saturating_sub(1));
        model.threshold = scores.get(idx).copied().unwrap_or(0.0);
        model
    }

    /// More negative is more anomalous.
    pub fn score_samples(&self, rows: &[[f64; FEATURE_NAMES.len()]]) -> Vec<f64> {
        let c = c_factor(self.subsample_size);
        rows.iter()
            .map(|row| {
                let h_avg = self.trees.iter().map(|t| path_length(t, row)).sum::<f64>() / self.trees.len() as f64;
                if c == 0.0 {
                    -1.0
                } else {
                    -(2f64.powf(-h_avg / c))
                }
            })
            .collect()
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        #[derive(Serialize)]
        struct Artifact<'a> {
            magic: &'static str,
            n_features: usize,
            model: &'a IsolationForestModel,
        }
        let artifact = Artifact {
            magic: MAGIC,
            n_features: self.n_features,
            model: self,
        };
        let file = std::fs::File::create(path)?;
        serde_json::to_writer(file, &artifact)
            .map_err(|e| PipelineError::ModelArtifact(format!("failed to write {}: {e}", path.display())))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct Artifact {
            magic: String,
            n_features: usize,
            model: IsolationForestModel,
        }
        let file = std::fs::File::open(path)?;
        let artifact: Artifact = serde_json::from_reader(file)
            .map_err(|e| PipelineError::ModelArtifact(format!("failed to read {}: {e}", path.display())))?;
        if artifact.magic != MAGIC {
            return Err(PipelineError::ModelArtifact(format!(
                "bad magic header in {}: expected {MAGIC}, got {}",
                path.display(),
                artifact.magic
            )));
        }
        if artifact.n_features != FEATURE_NAMES.len() {
            return Err(PipelineError::ModelArtifact(format!(
                "feature count mismatch in {}: expected {}, got {}",
                path.display(),
                FEATURE_NAMES.len(),
                artifact.n_features
            )));
        }
        Ok(artifact.model)
    }
}
