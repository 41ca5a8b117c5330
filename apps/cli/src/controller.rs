//! Top-level training controller.
//!
//! Owns the `Idle -> Loading -> {Fitting | CrossValidating | Predicting} ->
//! {Succeeded | Failed}` state machine and the output-file discipline: all
//! file output is staged into a private temporary directory inside the
//! output directory and renamed into place only on the Succeeded transition.
//! Every failure path drops the staging directory, so a failed run creates
//! zero files. No failure is retried; the caller may re-invoke.

use seqmodel_core::{FeatureExtractor, KmerFeatureExtractor, KmerPriorTable, Label, SequenceSet};
use seqmodel_training::{
    compute_weights, predict, CrossValidator, ModelArtifact, OptimizationConfig, OptimizationRun,
    Predictor, PriorCombine, TrainError, TrainResult, PREDICTIONS_FILENAME,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Loading,
    Fitting,
    CrossValidating,
    Predicting,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone)]
pub struct FitRequest {
    pub positives: PathBuf,
    pub negatives: PathBuf,
    pub output_dir: PathBuf,
    pub model_file: String,
    pub config: OptimizationConfig,
}

#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub positives: PathBuf,
    pub negatives: PathBuf,
    pub folds: usize,
    pub config: OptimizationConfig,
}

#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub input_file: PathBuf,
    pub model_file: String,
    pub output_dir: PathBuf,
}

pub struct TrainingController {
    state: ControllerState,
}

impl Default for TrainingController {
    fn default() -> Self {
        Self::new()
    }
}

impl TrainingController {
    #[must_use]
    pub fn new() -> Self {
        Self { state: ControllerState::Idle }
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Train a model and atomically commit exactly one artifact file.
    pub fn run_fit(&mut self, req: &FitRequest) -> TrainResult<()> {
        let result = self.fit_inner(req);
        self.state = if result.is_ok() { ControllerState::Succeeded } else { ControllerState::Failed };
        result
    }

    /// Cross-validate and print the report to standard output. Creates no
    /// files.
    pub fn run_estimate(&mut self, req: &EstimateRequest) -> TrainResult<()> {
        let result = self.estimate_inner(req);
        self.state = if result.is_ok() { ControllerState::Succeeded } else { ControllerState::Failed };
        result
    }

    /// Score a batch of sequences into `predictions.txt`.
    pub fn run_predict(&mut self, req: &PredictRequest) -> TrainResult<()> {
        let result = self.predict_inner(req);
        self.state = if result.is_ok() { ControllerState::Succeeded } else { ControllerState::Failed };
        result
    }

    fn fit_inner(&mut self, req: &FitRequest) -> TrainResult<()> {
        self.state = ControllerState::Loading;
        let loaded = load_training_inputs(&req.positives, &req.negatives, &req.config)?;

        self.state = ControllerState::Fitting;
        let model =
            OptimizationRun::new(&req.config).run(&loaded.features, &loaded.labels, &loaded.weights)?;

        let artifact = ModelArtifact::new(
            model,
            loaded.extractor,
            req.config.clone(),
            loaded.set.fingerprint(),
        );

        // stage privately, commit only on success
        std::fs::create_dir_all(&req.output_dir)?;
        let stage = staging_dir(&req.output_dir)?;
        let staged = stage.path().join(&req.model_file);
        artifact.save(&staged)?;
        std::fs::rename(&staged, req.output_dir.join(&req.model_file))?;

        info!(model = %req.output_dir.join(&req.model_file).display(), "fit complete");
        Ok(())
    }

    fn estimate_inner(&mut self, req: &EstimateRequest) -> TrainResult<()> {
        self.state = ControllerState::Loading;
        let loaded = load_training_inputs(&req.positives, &req.negatives, &req.config)?;

        self.state = ControllerState::CrossValidating;
        let report = CrossValidator::new(req.folds).run(
            &loaded.set,
            &loaded.weights,
            &req.config,
            &loaded.extractor,
        )?;

        println!("{report}");
        Ok(())
    }

    fn predict_inner(&mut self, req: &PredictRequest) -> TrainResult<()> {
        self.state = ControllerState::Loading;
        let model_path = resolve_model_path(&req.output_dir, &req.model_file);
        let artifact = ModelArtifact::load(&model_path)?;
        // the label is a placeholder: prediction ignores it
        let set = SequenceSet::from_fasta(&req.input_file, Label::Positive)?;

        self.state = ControllerState::Predicting;
        let predictor = Predictor::from_artifact(&artifact);
        let predictions = predictor.score_set(&set)?;

        std::fs::create_dir_all(&req.output_dir)?;
        let stage = staging_dir(&req.output_dir)?;
        let staged = stage.path().join(PREDICTIONS_FILENAME);
        let mut out = std::fs::File::create(&staged)?;
        predict::write_predictions(&mut out, &predictions)?;
        std::fs::rename(&staged, req.output_dir.join(PREDICTIONS_FILENAME))?;

        info!(count = predictions.len(), "predictions written");
        Ok(())
    }
}

struct TrainingInputs {
    set: SequenceSet,
    features: Vec<Vec<f64>>,
    labels: Vec<f64>,
    weights: Vec<f64>,
    extractor: KmerFeatureExtractor,
}

/// Load and validate everything a fit/estimate needs, before any optimizer
/// work: FASTA sets, optional prior table, example weights, features.
fn load_training_inputs(
    positives: &Path,
    negatives: &Path,
    config: &OptimizationConfig,
) -> TrainResult<TrainingInputs> {
    config.validate()?;

    let set = SequenceSet::merged(
        SequenceSet::from_fasta(positives, Label::Positive)?,
        SequenceSet::from_fasta(negatives, Label::Negative)?,
    );
    debug!(
        positives = set.count_label(Label::Positive),
        negatives = set.count_label(Label::Negative),
        "training set loaded"
    );

    let priors = match &config.kmer_probs_path {
        Some(path) => Some(KmerPriorTable::from_file(path)?),
        None => None,
    };
    let weights = compute_weights(&set, priors.as_ref(), config.kmer_weight, PriorCombine::Mean)?;

    let extractor = KmerFeatureExtractor::new(config.kmer_len, config.feature_dims);
    let features: Vec<Vec<f64>> = set
        .records()
        .iter()
        .map(|r| extractor.extract(&r.id, &r.sequence))
        .collect::<Result<_, _>>()
        .map_err(|e| TrainError::InvalidInput(e.to_string()))?;
    let labels: Vec<f64> = set.records().iter().map(|r| r.label.signed()).collect();

    Ok(TrainingInputs { set, features, labels, weights, extractor })
}

/// A model file name is resolved inside the output directory unless it
/// already names an existing file on its own.
fn resolve_model_path(output_dir: &Path, model_file: &str) -> PathBuf {
    let direct = PathBuf::from(model_file);
    if direct.is_file() {
        direct
    } else {
        output_dir.join(model_file)
    }
}

fn staging_dir(output_dir: &Path) -> TrainResult<tempfile::TempDir> {
    Ok(tempfile::Builder::new().prefix(".seqmodel-stage-").tempdir_in(output_dir)?)
}
