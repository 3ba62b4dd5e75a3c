//! Train/test partitioning

use crate::data::{label_counts, Label};
use crate::error::{PipelineError, Result};
use ndarray::{Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Options of the partitioning stage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_size: f64,
    /// Seed of the row shuffle
    pub random_state: u64,
    /// Preserve class proportions when possible
    pub stratify: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            stratify: true,
        }
    }
}

impl SplitConfig {
    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_stratify(mut self, stratify: bool) -> Self {
        self.stratify = stratify;
        self
    }
}

/// Feature rows with their labels
#[derive(Debug, Clone)]
pub struct Partition {
    pub features: Array2<f64>,
    pub labels: Vec<Label>,
}

impl Partition {
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }
}

/// Result of [`train_test_split`]
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Partition,
    pub test: Partition,
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    /// Whether the split actually preserved class proportions
    pub stratified: bool,
    /// Why a requested stratification was not applied
    pub stratify_fallback: Option<String>,
}

/// Split rows into disjoint train and test partitions covering every row
pub fn train_test_split(
    x: &Array2<f64>,
    labels: &[Label],
    config: &SplitConfig,
) -> Result<TrainTestSplit> {
    let n = labels.len();
    if x.nrows() != n {
        return Err(PipelineError::ComputationError(format!(
            "feature matrix has {} rows but there are {} labels",
            x.nrows(),
            n
        )));
    }

    let test_size = config.test_size;
    if !(test_size.is_finite() && test_size > 0.0 && test_size < 1.0) {
        return Err(PipelineError::invalid_parameter(
            "test_size",
            test_size,
            "must be between 0 and 1 exclusive",
        ));
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test == 0 || n_train == 0 {
        return Err(PipelineError::invalid_parameter(
            "test_size",
            test_size,
            format!(
                "leaves {} train and {} test rows out of {}",
                n_train, n_test, n
            ),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(config.random_state);

    let fallback = if config.stratify {
        stratify_blocker(labels, n_train, n_test)
    } else {
        None
    };
    if let Some(reason) = &fallback {
        warn!(reason = %reason, "Stratified split not applicable, using a plain random split");
    }
    let stratified = config.stratify && fallback.is_none();

    let (mut train_indices, mut test_indices) = if stratified {
        stratified_indices(labels, n_test, &mut rng)
    } else {
        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let train = indices.split_off(n_test);
        (train, indices)
    };
    train_indices.shuffle(&mut rng);
    test_indices.shuffle(&mut rng);

    Ok(TrainTestSplit {
        train: take(x, labels, &train_indices),
        test: take(x, labels, &test_indices),
        train_indices,
        test_indices,
        stratified,
        stratify_fallback: fallback,
    })
}

/// Reason a stratified split cannot be drawn, if any
fn stratify_blocker(labels: &[Label], n_train: usize, n_test: usize) -> Option<String> {
    let counts = label_counts(labels);
    let n_classes = counts.len();
    if n_classes < 2 {
        return Some(format!("stratify needs at least 2 classes, found {}", n_classes));
    }
    if let Some((label, _)) = counts.iter().find(|(_, c)| **c < 2) {
        return Some(format!("class '{}' has fewer than 2 members", label));
    }
    if n_test < n_classes {
        return Some(format!(
            "test partition of {} rows cannot hold all {} classes",
            n_test, n_classes
        ));
    }
    if n_train < n_classes {
        return Some(format!(
            "train partition of {} rows cannot hold all {} classes",
            n_train, n_classes
        ));
    }
    None
}

/// Per-class test allocation by largest remainder, each class keeping a train row
fn stratified_indices(
    labels: &[Label],
    n_test: usize,
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<usize>) {
    let n = labels.len() as f64;
    let counts = label_counts(labels);

    let mut groups: Vec<(Label, Vec<usize>)> = counts
        .keys()
        .map(|label| {
            let members = labels
                .iter()
                .enumerate()
                .filter(|(_, l)| *l == label)
                .map(|(i, _)| i)
                .collect();
            (label.clone(), members)
        })
        .collect();

    let ideal: Vec<f64> = groups
        .iter()
        .map(|(_, members)| n_test as f64 * members.len() as f64 / n)
        .collect();
    let mut alloc: Vec<usize> = groups
        .iter()
        .zip(&ideal)
        .map(|((_, members), &share)| (share.floor() as usize).min(members.len() - 1))
        .collect();

    while alloc.iter().sum::<usize>() < n_test {
        let next = (0..groups.len())
            .filter(|&g| alloc[g] + 1 < groups[g].1.len())
            .fold(None, |best: Option<usize>, g| match best {
                Some(b) if ideal[b] - alloc[b] as f64 >= ideal[g] - alloc[g] as f64 => Some(b),
                _ => Some(g),
            });
        match next {
            Some(g) => alloc[g] += 1,
            None => break,
        }
    }

    let mut train = Vec::with_capacity(labels.len() - n_test);
    let mut test = Vec::with_capacity(n_test);
    for ((_, members), take_test) in groups.iter_mut().zip(alloc) {
        members.shuffle(rng);
        test.extend_from_slice(&members[..take_test]);
        train.extend_from_slice(&members[take_test..]);
    }
    (train, test)
}

fn take(x: &Array2<f64>, labels: &[Label], indices: &[usize]) -> Partition {
    Partition {
        features: x.select(Axis(0), indices),
        labels: indices.iter().map(|&i| labels[i].clone()).collect(),
    }
}
