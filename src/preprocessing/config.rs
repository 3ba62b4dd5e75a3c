//! Preprocessing configuration

use serde::{Deserialize, Serialize};
use super::{MissingStrategy, ScalerType};

/// Configuration for one preprocessing run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Column used as the label source
    pub target: String,

    /// Requested feature columns, in order; the target is removed if present
    pub features: Vec<String>,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// How rows or cells with missing values are handled
    pub missing_strategy: MissingStrategy,
}

impl PreprocessingConfig {
    /// Create a configuration with standard scaling and row dropping
    pub fn new(target: impl Into<String>, features: Vec<String>) -> Self {
        Self {
            target: target.into(),
            features,
            scaler_type: ScalerType::Standard,
            missing_strategy: MissingStrategy::Drop,
        }
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set the missing-value strategy
    pub fn with_missing(mut self, strategy: MissingStrategy) -> Self {
        self.missing_strategy = strategy;
        self
    }

    /// Requested features with the target filtered out
    pub fn feature_columns(&self) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| **f != self.target)
            .cloned()
            .collect()
    }
}
