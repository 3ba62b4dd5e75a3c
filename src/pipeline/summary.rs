//! Stage results returned to callers

use crate::data::{Label, ParseMode};
use crate::training::ModelKind;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    /// At most the first 20 rows, missing values as `null`
    pub preview: Vec<Map<String, Value>>,
    pub numeric_columns: Vec<String>,
    pub suggested_target: Option<String>,
    pub parse_mode: ParseMode,
}

#[derive(Debug, Clone, Serialize)]
pub struct PreprocessSummary {
    pub samples: usize,
    pub dims: usize,
    pub feature_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitSummary {
    pub train: usize,
    pub test: usize,
    pub stratified: bool,
    pub stratify_fallback: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    /// Percentage in [0, 100], rounded to 2 decimals
    pub accuracy: f64,
    pub confusion_matrix: Vec<Vec<usize>>,
    pub report: Value,
    pub predictions: Vec<Label>,
    /// Present for trees only; `null` when rendering failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tree_svg: Option<Option<String>>,
}

/// Which stages have committed, for `GET /session`
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionStatus {
    pub has_dataset: bool,
    pub rows: Option<usize>,
    pub preprocessed: bool,
    pub samples: Option<usize>,
    pub dims: Option<usize>,
    pub target: Option<String>,
    pub features: Option<Vec<String>>,
    pub split: bool,
    pub train: Option<usize>,
    pub test: Option<usize>,
    pub trained: bool,
    pub model_type: Option<ModelKind>,
}
