//! OrangeFlow - a small, stateful ML pipeline backend
//!
//! A single session moves a tabular dataset through four stages:
//! upload → preprocess → split → train. Each stage is reachable from the
//! HTTP server and from the command line.
//!
//! # Modules
//!
//! - [`data`] - Dataset model and CSV/Excel ingestion
//! - [`preprocessing`] - Missing values, scaling, one-hot encoding
//! - [`training`] - Splitting, logistic regression, decision tree, metrics
//! - [`visualization`] - SVG rendering of fitted trees
//! - [`pipeline`] - The session state machine tying the stages together
//! - [`server`] - HTTP server with a JSON API
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;
pub mod training;
pub mod visualization;
pub mod pipeline;

pub mod server;
pub mod cli;

pub use error::{PipelineError, Result};
pub use pipeline::Session;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{PipelineError, Result};
    pub use crate::data::{DataLoader, Dataset, FileFormat, Label};
    pub use crate::preprocessing::{DataPreprocessor, MissingStrategy, PreprocessingConfig, ScalerType};
    pub use crate::training::{
        DecisionTree, LogisticRegression, ModelKind, ModelParams, SplitConfig, TrainEngine,
    };
    pub use crate::pipeline::Session;
    pub use crate::visualization::TreeSvgRenderer;
}
