//! The single-session pipeline state machine

use super::summary::{PreprocessSummary, SessionStatus, SplitSummary, TrainSummary, UploadSummary};
use crate::data::{DataLoader, Dataset, FileFormat};
use crate::error::{PipelineError, Result};
use crate::preprocessing::{DataPreprocessor, PreprocessedData, PreprocessingConfig};
use crate::training::{
    train_test_split, DecisionTree, ModelKind, ModelParams, Partition, SplitConfig, TrainEngine,
    TrainedModel,
};
use crate::visualization::TreeSvgRenderer;
use tracing::{info, warn};

/// Rows included in the upload preview
pub const PREVIEW_ROWS: usize = 20;

/// Train and test partitions of the current feature matrix
#[derive(Debug, Clone)]
pub struct Partitions {
    pub train: Partition,
    pub test: Partition,
}

/// Working set shared by the four pipeline stages.
///
/// Every stage validates its prerequisites and computes its result before
/// touching any field, so a failed call leaves the session as it was.
/// Committing a stage clears everything downstream of it.
#[derive(Debug, Default)]
pub struct Session {
    loader: DataLoader,
    dataset: Option<Dataset>,
    prepared: Option<PreprocessedData>,
    partitions: Option<Partitions>,
    model: Option<TrainEngine>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_loader(mut self, loader: DataLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Ingest an uploaded file and make it the session's dataset
    pub fn upload(&mut self, filename: &str, bytes: &[u8]) -> Result<UploadSummary> {
        let format = FileFormat::from_filename(filename)?;
        let (dataset, parse_mode) = self.loader.load_bytes(bytes, format)?;
        if dataset.n_rows() == 0 {
            return Err(PipelineError::EmptyDataset);
        }

        let summary = UploadSummary {
            rows: dataset.n_rows(),
            columns: dataset.column_names(),
            preview: dataset.preview(PREVIEW_ROWS),
            numeric_columns: dataset.numeric_column_names(),
            suggested_target: dataset.suggested_target(),
            parse_mode,
        };

        info!(
            filename = %filename,
            rows = summary.rows,
            columns = summary.columns.len(),
            parse_mode = ?parse_mode,
            "Dataset ingested"
        );

        self.dataset = Some(dataset);
        self.prepared = None;
        self.partitions = None;
        self.model = None;
        Ok(summary)
    }

    /// Build the feature matrix and label vector from the dataset
    pub fn preprocess(&mut self, config: PreprocessingConfig) -> Result<PreprocessSummary> {
        let dataset = self.dataset.as_ref().ok_or(PipelineError::NoDataset)?;
        let prepared = DataPreprocessor::with_config(config).fit_transform(dataset)?;

        let summary = PreprocessSummary {
            samples: prepared.n_samples(),
            dims: prepared.n_dims(),
            feature_names: prepared.feature_names.clone(),
        };

        info!(
            target = %prepared.target,
            samples = summary.samples,
            dims = summary.dims,
            "Preprocessing committed"
        );

        self.prepared = Some(prepared);
        self.partitions = None;
        self.model = None;
        Ok(summary)
    }

    /// Partition the feature matrix into train and test rows
    pub fn split(&mut self, config: &SplitConfig) -> Result<SplitSummary> {
        let prepared = self.prepared.as_ref().ok_or(PipelineError::NotPreprocessed)?;
        let split = train_test_split(&prepared.features, &prepared.labels, config)?;

        let summary = SplitSummary {
            train: split.train.n_rows(),
            test: split.test.n_rows(),
            stratified: split.stratified,
            stratify_fallback: split.stratify_fallback,
        };

        info!(
            train = summary.train,
            test = summary.test,
            stratified = summary.stratified,
            seed = config.random_state,
            "Split committed"
        );

        self.partitions = Some(Partitions {
            train: split.train,
            test: split.test,
        });
        self.model = None;
        Ok(summary)
    }

    /// Fit a classifier on the train partition and score it on the test partition
    pub fn train(&mut self, kind: ModelKind, params: ModelParams) -> Result<TrainSummary> {
        let partitions = self.partitions.as_ref().ok_or(PipelineError::NotSplit)?;

        let mut engine = TrainEngine::new(kind, params);
        engine.fit(&partitions.train)?;
        let evaluation = engine.evaluate(&partitions.test)?;

        let tree_svg = match engine.model() {
            Some(TrainedModel::Tree(tree)) => Some(self.render_tree(tree, &engine)),
            _ => None,
        };

        info!(
            model = %kind,
            accuracy = evaluation.accuracy,
            test = evaluation.predictions.len(),
            "Training committed"
        );

        let summary = TrainSummary {
            accuracy: evaluation.accuracy,
            confusion_matrix: evaluation.confusion_matrix,
            report: evaluation.report.to_json(),
            predictions: evaluation.predictions,
            tree_svg,
        };

        self.model = Some(engine);
        Ok(summary)
    }

    /// Rendering problems are logged and reported as a missing diagram
    fn render_tree(&self, tree: &DecisionTree, engine: &TrainEngine) -> Option<String> {
        let feature_names = self
            .prepared
            .as_ref()
            .map(|p| p.feature_names.clone())
            .unwrap_or_else(|| (0..tree.n_features()).map(|i| format!("f{}", i)).collect());
        let class_names: Vec<String> = engine.classes().iter().map(|c| c.to_string()).collect();

        match TreeSvgRenderer::new(&feature_names, &class_names).render(tree) {
            Ok(svg) => Some(svg),
            Err(e) => {
                warn!(error = %e, "Tree rendering failed");
                None
            }
        }
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn prepared(&self) -> Option<&PreprocessedData> {
        self.prepared.as_ref()
    }

    pub fn partitions(&self) -> Option<&Partitions> {
        self.partitions.as_ref()
    }

    pub fn model(&self) -> Option<&TrainEngine> {
        self.model.as_ref()
    }

    /// Read-only view of which stages have committed
    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            has_dataset: self.dataset.is_some(),
            rows: self.dataset.as_ref().map(Dataset::n_rows),
            preprocessed: self.prepared.is_some(),
            samples: self.prepared.as_ref().map(PreprocessedData::n_samples),
            dims: self.prepared.as_ref().map(PreprocessedData::n_dims),
            target: self.prepared.as_ref().map(|p| p.target.clone()),
            features: self.prepared.as_ref().map(|p| p.selected_features.clone()),
            split: self.partitions.is_some(),
            train: self.partitions.as_ref().map(|p| p.train.n_rows()),
            test: self.partitions.as_ref().map(|p| p.test.n_rows()),
            trained: self.model.is_some(),
            model_type: self.model.as_ref().map(TrainEngine::kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &[u8] = b"a,b,label\n1,2,x\n2,3,y\n3,4,x\n4,5,y\n5,6,x\n6,7,y\n7,8,x\n8,9,y\n9,10,x\n10,11,y\n";

    #[test]
    fn test_stage_gating() {
        let mut session = Session::new();
        let config = PreprocessingConfig::new("label", vec!["a".into()]);
        assert!(matches!(
            session.preprocess(config),
            Err(PipelineError::NoDataset)
        ));
        assert!(matches!(
            session.split(&SplitConfig::default()),
            Err(PipelineError::NotPreprocessed)
        ));
        assert!(matches!(
            session.train(ModelKind::Tree, ModelParams::default()),
            Err(PipelineError::NotSplit)
        ));
    }

    #[test]
    fn test_full_run_and_invalidation() {
        let mut session = Session::new();
        let upload = session.upload("data.csv", CSV).unwrap();
        assert_eq!(upload.rows, 10);
        assert_eq!(upload.suggested_target.as_deref(), Some("label"));

        session
            .preprocess(PreprocessingConfig::new("label", vec!["a".into(), "b".into()]))
            .unwrap();
        session.split(&SplitConfig::default()).unwrap();
        let trained = session.train(ModelKind::Tree, ModelParams::default()).unwrap();
        assert!(trained.tree_svg.is_some());
        assert!(session.status().trained);

        // Re-splitting drops the model, re-preprocessing drops the split
        session.split(&SplitConfig::default()).unwrap();
        assert!(session.model().is_none());
        session
            .preprocess(PreprocessingConfig::new("label", vec!["a".into()]))
            .unwrap();
        assert!(session.partitions().is_none());

        // A new upload clears everything downstream
        session.upload("data.csv", CSV).unwrap();
        let status = session.status();
        assert!(status.has_dataset);
        assert!(!status.preprocessed && !status.split && !status.trained);
    }

    #[test]
    fn test_failed_upload_keeps_previous_state() {
        let mut session = Session::new();
        session.upload("data.csv", CSV).unwrap();
        session
            .preprocess(PreprocessingConfig::new("label", vec!["a".into()]))
            .unwrap();

        assert!(matches!(
            session.upload("data.txt", CSV),
            Err(PipelineError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            session.upload("empty.csv", b"a,b\n"),
            Err(PipelineError::EmptyDataset)
        ));
        assert!(session.prepared().is_some());
        assert_eq!(session.dataset().map(Dataset::n_rows), Some(10));
    }

    #[test]
    fn test_failed_preprocess_keeps_split() {
        let mut session = Session::new();
        session.upload("data.csv", CSV).unwrap();
        session
            .preprocess(PreprocessingConfig::new("label", vec!["a".into()]))
            .unwrap();
        session.split(&SplitConfig::default()).unwrap();

        let err = session
            .preprocess(PreprocessingConfig::new("missing", vec!["a".into()]))
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidTarget(_)));
        assert!(session.partitions().is_some());
    }
}
