//! Model training module
//!
//! Provides the two classifiers the pipeline can fit and everything around them:
//! - Logistic regression (multinomial, L2 regularized)
//! - Decision tree (CART, Gini impurity)
//! - Seeded, optionally stratified train/test splitting
//! - Accuracy, confusion matrix and per-class report

mod models;
pub mod decision_tree;
pub mod linear_models;
pub mod metrics;
pub mod split;

pub use decision_tree::{DecisionTree, TreeNode};
pub use linear_models::LogisticRegression;
pub use metrics::{accuracy_percent, confusion_matrix, ClassScores, ClassificationReport};
pub use models::{Classifier, LabelEncoder};
pub use split::{train_test_split, Partition, SplitConfig, TrainTestSplit};

use crate::data::Label;
use crate::error::{PipelineError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::debug;

/// Default inverse regularization strength of logistic regression
pub const DEFAULT_C: f64 = 1.0;
/// Default depth limit of the decision tree
pub const DEFAULT_MAX_DEPTH: usize = 5;
/// Seed of the tree's feature permutation
pub const TREE_RANDOM_STATE: u64 = 42;

/// Classifier family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Logistic,
    Tree,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::Logistic => "logistic",
            ModelKind::Tree => "tree",
        }
    }
}

impl FromStr for ModelKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "logistic" => Ok(ModelKind::Logistic),
            "tree" => Ok(ModelKind::Tree),
            other => Err(PipelineError::InvalidModelKind(other.to_string())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hyperparameters after coercion
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelParams {
    #[serde(rename = "C")]
    pub c: f64,
    pub max_depth: usize,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            c: DEFAULT_C,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ModelParams {
    /// Coerce a loosely typed parameter bag; unknown keys are ignored
    pub fn from_json(params: &Map<String, Value>) -> Result<Self> {
        let mut out = Self::default();
        if let Some(value) = params.get("C").filter(|v| !v.is_null()) {
            out.c = coerce_c(value)?;
        }
        if let Some(value) = params.get("max_depth").filter(|v| !v.is_null()) {
            out.max_depth = coerce_max_depth(value)?;
        }
        Ok(out)
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

fn coerce_c(value: &Value) -> Result<f64> {
    let invalid = || PipelineError::invalid_parameter("C", value, "must be a positive float");
    let c = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    if c.is_finite() && c > 0.0 {
        Ok(c)
    } else {
        Err(invalid())
    }
}

fn coerce_max_depth(value: &Value) -> Result<usize> {
    let invalid = || PipelineError::invalid_parameter("max_depth", value, "must be an integer >= 1");
    let depth = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(i),
            None => n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64),
        },
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(invalid)?;

    usize::try_from(depth)
        .ok()
        .filter(|&d| d >= 1)
        .ok_or_else(invalid)
}

/// A fitted classifier of either family
#[derive(Debug, Clone)]
pub enum TrainedModel {
    Logistic(LogisticRegression),
    Tree(DecisionTree),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::Logistic(_) => ModelKind::Logistic,
            TrainedModel::Tree(_) => ModelKind::Tree,
        }
    }

    fn classifier(&self) -> &dyn Classifier {
        match self {
            TrainedModel::Logistic(m) => m,
            TrainedModel::Tree(m) => m,
        }
    }
}

/// Test-partition evaluation of a fitted model
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Percentage in [0, 100], 2 decimals
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub report: ClassificationReport,
    /// Predicted labels in test-partition row order
    pub predictions: Vec<Label>,
}

/// Fits a classifier on raw labels, mapping them to dense class indices
#[derive(Debug, Clone)]
pub struct TrainEngine {
    kind: ModelKind,
    params: ModelParams,
    encoder: LabelEncoder,
    model: Option<TrainedModel>,
}

impl TrainEngine {
    pub fn new(kind: ModelKind, params: ModelParams) -> Self {
        Self {
            kind,
            params,
            encoder: LabelEncoder::default(),
            model: None,
        }
    }

    /// Fit the configured model on the train partition
    pub fn fit(&mut self, train: &Partition) -> Result<&mut Self> {
        let start = Instant::now();
        let encoder = LabelEncoder::fit(&train.labels);
        let y = encoder.transform(&train.labels)?;

        let model = match self.kind {
            ModelKind::Logistic => {
                let mut model = LogisticRegression::new().with_c(self.params.c);
                model.fit(&train.features, &y)?;
                debug!(iterations = model.n_iter, "Logistic regression fitted");
                TrainedModel::Logistic(model)
            }
            ModelKind::Tree => {
                let mut model = DecisionTree::new()
                    .with_max_depth(self.params.max_depth)
                    .with_random_state(TREE_RANDOM_STATE);
                model.fit(&train.features, &y)?;
                debug!(
                    depth = model.get_depth(),
                    leaves = model.get_n_leaves(),
                    "Decision tree fitted"
                );
                TrainedModel::Tree(model)
            }
        };

        debug!(
            model = %self.kind,
            samples = train.n_rows(),
            classes = encoder.classes().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Training finished"
        );

        self.encoder = encoder;
        self.model = Some(model);
        Ok(self)
    }

    /// Predict raw labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| PipelineError::TrainingError("model is not fitted".to_string()))?;
        let indices = model.classifier().predict(x)?;
        self.encoder.inverse_transform(&indices)
    }

    /// Score predictions on the test partition
    pub fn evaluate(&self, test: &Partition) -> Result<Evaluation> {
        let predictions = self.predict(&test.features)?;
        Ok(Evaluation {
            accuracy: accuracy_percent(&test.labels, &predictions),
            confusion_matrix: confusion_matrix(&test.labels, &predictions),
            report: ClassificationReport::compute(&test.labels, &predictions),
            predictions,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn params(&self) -> ModelParams {
        self.params
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    /// Sorted distinct training labels
    pub fn classes(&self) -> &[Label] {
        self.encoder.classes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use serde_json::json;

    fn params(value: Value) -> Result<ModelParams> {
        ModelParams::from_json(value.as_object().unwrap())
    }

    #[test]
    fn test_model_kind_parse() {
        assert_eq!("logistic".parse::<ModelKind>().unwrap(), ModelKind::Logistic);
        assert_eq!("tree".parse::<ModelKind>().unwrap(), ModelKind::Tree);
        let err = "svm".parse::<ModelKind>().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidModelKind(k) if k == "svm"));
    }

    #[test]
    fn test_param_defaults_and_coercion() {
        assert_eq!(params(json!({})).unwrap(), ModelParams::default());
        assert_eq!(params(json!({"C": "0.5"})).unwrap().c, 0.5);
        assert_eq!(params(json!({"C": 2})).unwrap().c, 2.0);
        assert_eq!(params(json!({"max_depth": 3.9})).unwrap().max_depth, 3);
        assert_eq!(params(json!({"max_depth": "7"})).unwrap().max_depth, 7);
        assert_eq!(params(json!({"max_depth": null})).unwrap().max_depth, 5);
    }

    #[test]
    fn test_param_rejections() {
        for bad in [
            json!({"C": 0}),
            json!({"C": -1.5}),
            json!({"C": "abc"}),
            json!({"C": true}),
            json!({"max_depth": 0}),
            json!({"max_depth": -2}),
            json!({"max_depth": "2.5"}),
            json!({"max_depth": [1]}),
        ] {
            let err = params(bad).unwrap_err();
            assert!(matches!(err, PipelineError::InvalidParameter { .. }));
        }
    }

    fn partition() -> Partition {
        Partition {
            features: array![[-6.0], [-5.0], [-4.0], [4.0], [5.0], [6.0]],
            labels: ["no", "no", "no", "yes", "yes", "yes"]
                .iter()
                .map(|s| Label::Text(s.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_engine_round_trips_labels() {
        for kind in [ModelKind::Logistic, ModelKind::Tree] {
            let mut engine = TrainEngine::new(kind, ModelParams::default());
            engine.fit(&partition()).unwrap();

            let eval = engine.evaluate(&partition()).unwrap();
            assert_eq!(eval.accuracy, 100.0);
            assert_eq!(eval.predictions, partition().labels);
            assert_eq!(eval.confusion_matrix, vec![vec![3, 0], vec![0, 3]]);
            assert_eq!(engine.model().unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_logistic_single_class_is_training_error() {
        let train = Partition {
            features: array![[0.0], [1.0]],
            labels: vec![Label::Int(1), Label::Int(1)],
        };
        let err = TrainEngine::new(ModelKind::Logistic, ModelParams::default())
            .fit(&train)
            .unwrap_err();
        assert!(matches!(err, PipelineError::TrainingError(_)));
    }

    #[test]
    fn test_predict_before_fit() {
        let engine = TrainEngine::new(ModelKind::Tree, ModelParams::default());
        assert!(engine.predict(&array![[1.0]]).is_err());
    }
}
