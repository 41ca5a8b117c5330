//! Externally supplied k-mer prior probabilities.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;
use tracing::debug;

/// Mapping from k-mer to prior probability in [0, 1]. Read-only after
/// construction.
///
/// Lookups for k-mers absent from the table return the table's minimum
/// prior: an unseen k-mer is treated as at least as rare as the rarest
/// known one, never as probability zero.
#[derive(Debug, Clone)]
pub struct KmerPriorTable {
    priors: HashMap<String, f64>,
    k: usize,
    default_prior: f64,
}

impl KmerPriorTable {
    /// Parse a whitespace-separated `kmer probability` text file.
    ///
    /// All k-mers must share one length; priors outside [0, 1] are rejected.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        if !path.is_file() {
            return Err(CoreError::InputNotFound(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file), &path.display().to_string())
    }

    fn parse<R: BufRead>(reader: R, source: &str) -> CoreResult<Self> {
        let mut priors = HashMap::new();
        let mut k = 0_usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(kmer), Some(prob)) = (fields.next(), fields.next()) else {
                return Err(CoreError::Parse(format!(
                    "{source}:{}: expected 'kmer probability'",
                    lineno + 1
                )));
            };
            let prob: f64 = prob.parse().map_err(|e| {
                CoreError::Parse(format!("{source}:{}: bad probability: {e}", lineno + 1))
            })?;
            if !(0.0..=1.0).contains(&prob) {
                return Err(CoreError::Parse(format!(
                    "{source}:{}: probability {prob} outside [0, 1]",
                    lineno + 1
                )));
            }

            let kmer = kmer.to_uppercase();
            if k == 0 {
                k = kmer.len();
            } else if kmer.len() != k {
                return Err(CoreError::Parse(format!(
                    "{source}:{}: k-mer '{kmer}' has length {}, expected {k}",
                    lineno + 1,
                    kmer.len()
                )));
            }
            priors.insert(kmer, prob);
        }

        if priors.is_empty() {
            return Err(CoreError::Parse(format!("{source}: prior table is empty")));
        }

        let default_prior = priors.values().copied().fold(f64::INFINITY, f64::min);
        debug!(source, entries = priors.len(), k, default_prior, "loaded k-mer prior table");
        Ok(Self { priors, k, default_prior })
    }

    /// Prior for a k-mer; unseen k-mers map to the minimum known prior.
    #[must_use]
    pub fn get(&self, kmer: &str) -> f64 {
        self.priors.get(kmer).copied().unwrap_or(self.default_prior)
    }

    #[must_use]
    pub fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub fn min_prior(&self) -> f64 {
        self.default_prior
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.priors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.priors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn table(text: &str) -> CoreResult<KmerPriorTable> {
        KmerPriorTable::parse(Cursor::new(text), "test")
    }

    #[test]
    fn test_parse_basic_table() {
        let t = table("ACGT 0.5\nGGGG\t0.001\n\n# comment\nTTTT 1.0\n").unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.k(), 4);
        assert_eq!(t.get("GGGG"), 0.001);
    }

    #[test]
    fn test_unseen_kmer_gets_minimum_prior() {
        let t = table("AAAA 0.2\nCCCC 0.05\n").unwrap();
        assert_eq!(t.get("GGGG"), 0.05);
        assert_eq!(t.min_prior(), 0.05);
    }

    #[test]
    fn test_mixed_kmer_lengths_rejected() {
        assert!(matches!(table("AAA 0.1\nCCCC 0.2\n"), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        assert!(matches!(table("AAAA 1.5\n"), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(matches!(table("# nothing here\n"), Err(CoreError::Parse(_))));
    }

    #[test]
    fn test_lowercase_kmers_normalized() {
        let t = table("acgt 0.25\n").unwrap();
        assert_eq!(t.get("ACGT"), 0.25);
    }
}
