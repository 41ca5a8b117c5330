//! Seqmodel Training
//!
//! The training/optimization/validation core behind the `seqmodel-cli` tool:
//! - Prior-based example reweighting (`weights`)
//! - The weighted L2-SVM solver (`solver`)
//! - The outer/inner optimization loop (`optimize`)
//! - Stratified k-fold cross-validation (`crossval`)
//! - Versioned, atomically persisted model artifacts (`artifact`)
//! - Batch scoring of new sequences (`predict`)

pub mod artifact;
pub mod crossval;
pub mod error;
pub mod metrics;
pub mod optimize;
pub mod predict;
pub mod solver;
pub mod weights;

pub use artifact::{ModelArtifact, SCHEMA_VERSION};
pub use crossval::{CrossValidationReport, CrossValidator, FoldMetrics};
pub use error::{TrainError, TrainResult};
pub use optimize::{FittedModel, OptimizationConfig, OptimizationRun};
pub use predict::{Prediction, Predictor, PREDICTIONS_FILENAME};
pub use weights::{compute_weights, PriorCombine};
