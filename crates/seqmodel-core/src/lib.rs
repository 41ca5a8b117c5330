//! Seqmodel Core
//!
//! Sequence-level primitives shared by the training and prediction layers:
//! - Loading labeled/unlabeled sequence sets from FASTA (`SequenceSet`)
//! - Turning a sequence into a numeric feature vector (`FeatureExtractor`)
//! - External k-mer prior tables (`KmerPriorTable`)

pub mod dataset;
pub mod error;
pub mod features;
pub mod priors;

pub use dataset::{Label, SequenceRecord, SequenceSet};
pub use error::{CoreError, CoreResult};
pub use features::{FeatureExtractor, KmerFeatureExtractor};
pub use priors::KmerPriorTable;
