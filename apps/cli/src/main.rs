//! seqmodel CLI - train, validate and apply k-mer sequence classifiers
//!
//! Three subcommands share one model lifecycle: `fit` trains a classifier
//! from positive/negative FASTA sets and writes a versioned model artifact,
//! `estimate` reports cross-validated performance to stdout, and `predict`
//! scores new sequences against a previously fitted artifact.

mod controller;

use clap::{ArgAction, Parser, Subcommand};
use controller::{EstimateRequest, FitRequest, PredictRequest, TrainingController};
use seqmodel_training::{OptimizationConfig, TrainError};
use std::path::PathBuf;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "seqmodel",
    version,
    about = "Binary sequence classifier from k-mer features",
    long_about = "Trains a binary sequence classifier (positive vs. negative FASTA sets) \
                  from hashed k-mer features, estimates its generalization performance via \
                  stratified cross-validation, and scores new sequences with a fitted model."
)]
struct Args {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from positive and negative sequence sets
    Fit {
        /// Positive class FASTA file
        #[arg(short = 'p', long)]
        positives: PathBuf,

        /// Negative class FASTA file
        #[arg(short = 'n', long)]
        negatives: PathBuf,

        /// Directory receiving the model artifact
        #[arg(long)]
        output_dir: PathBuf,

        /// Artifact filename inside the output directory
        #[arg(long)]
        model_file: String,

        /// Outer optimization iterations
        #[arg(long)]
        n_iter: usize,

        /// Inner regularization-estimation iterations per outer iteration
        #[arg(long, default_value_t = 10)]
        n_inner_iter_estimator: usize,

        /// K-mer prior probability table for example reweighting
        #[arg(long)]
        kmer_probs: Option<PathBuf>,

        /// Multiplier applied to prior mass during reweighting
        #[arg(long, default_value_t = 1.0)]
        kmer_weight: f64,

        /// K-mer length for feature extraction
        #[arg(long, default_value_t = 4)]
        kmer_len: usize,

        /// Hashed feature dimensions
        #[arg(long, default_value_t = 1024)]
        feature_dims: usize,

        /// Seed for deterministic procedures
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },

    /// Estimate generalization performance via cross-validation
    Estimate {
        /// Positive class FASTA file
        #[arg(short = 'p', long)]
        positives: PathBuf,

        /// Negative class FASTA file
        #[arg(short = 'n', long)]
        negatives: PathBuf,

        /// Output directory (left untouched; the report goes to stdout)
        #[arg(long)]
        output_dir: PathBuf,

        /// Model filename (accepted for interface parity with fit)
        #[arg(long)]
        model_file: String,

        /// Run k-fold cross-validation
        #[arg(long)]
        cross_validation: bool,

        /// Number of folds (capped at the smaller class size)
        #[arg(long, default_value_t = 10)]
        folds: usize,

        /// K-mer prior probability table for example reweighting
        #[arg(long)]
        kmer_probs: Option<PathBuf>,

        /// Multiplier applied to prior mass during reweighting
        #[arg(long, default_value_t = 1.0)]
        kmer_weight: f64,

        /// K-mer length for feature extraction
        #[arg(long, default_value_t = 4)]
        kmer_len: usize,

        /// Hashed feature dimensions
        #[arg(long, default_value_t = 1024)]
        feature_dims: usize,

        /// Seed for deterministic fold assignment
        #[arg(long, default_value_t = 1)]
        seed: u64,
    },

    /// Score sequences with a fitted model
    Predict {
        /// FASTA file with sequences to score
        #[arg(long)]
        input_file: PathBuf,

        /// Model artifact name (resolved inside the output directory)
        #[arg(long)]
        model_file: String,

        /// Directory receiving predictions.txt
        #[arg(long)]
        output_dir: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    // a second subscriber in the same process is fine to ignore
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn run(command: Command) -> Result<(), TrainError> {
    let mut controller = TrainingController::new();
    match command {
        Command::Fit {
            positives,
            negatives,
            output_dir,
            model_file,
            n_iter,
            n_inner_iter_estimator,
            kmer_probs,
            kmer_weight,
            kmer_len,
            feature_dims,
            seed,
        } => controller.run_fit(&FitRequest {
            positives,
            negatives,
            output_dir,
            model_file,
            config: OptimizationConfig {
                n_iter,
                n_inner_iter_estimator,
                kmer_weight,
                kmer_probs_path: kmer_probs,
                kmer_len,
                feature_dims,
                seed,
            },
        }),
        Command::Estimate {
            positives,
            negatives,
            output_dir: _,
            model_file: _,
            cross_validation,
            folds,
            kmer_probs,
            kmer_weight,
            kmer_len,
            feature_dims,
            seed,
        } => {
            if !cross_validation {
                return Err(TrainError::InvalidInput(
                    "estimate requires --cross-validation".to_string(),
                ));
            }
            controller.run_estimate(&EstimateRequest {
                positives,
                negatives,
                folds,
                config: OptimizationConfig {
                    kmer_weight,
                    kmer_probs_path: kmer_probs,
                    kmer_len,
                    feature_dims,
                    seed,
                    ..Default::default()
                },
            })
        }
        Command::Predict { input_file, model_file, output_dir } => {
            controller.run_predict(&PredictRequest { input_file, model_file, output_dir })
        }
    }
}

fn main() {
    // clap handles usage errors itself: usage message on stderr, exit code 2
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(args.command) {
        error!("{e}");
        std::process::exit(1);
    }
}
