//! Labeled sequence sets loaded from FASTA.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Positive,
    Negative,
}

impl Label {
    /// Signed representation used by the optimizer (+1 / -1).
    #[must_use]
    pub fn signed(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// A single input sequence. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
    pub label: Label,
}

/// An ordered collection of labeled sequence records.
#[derive(Debug, Clone, Default)]
pub struct SequenceSet {
    records: Vec<SequenceRecord>,
}

impl SequenceSet {
    /// Load all records of a FASTA file under a single label.
    ///
    /// Every record must carry a non-empty sequence; an empty sequence is an
    /// invalid-record error, not a silent skip.
    pub fn from_fasta(path: &Path, label: Label) -> CoreResult<Self> {
        if !path.is_file() {
            return Err(CoreError::InputNotFound(path.to_path_buf()));
        }

        let reader = bio::io::fasta::Reader::from_file(path)
            .map_err(|e| CoreError::Parse(format!("{}: {e}", path.display())))?;

        let mut records = Vec::new();
        for result in reader.records() {
            let rec = result.map_err(|e| CoreError::Parse(format!("{}: {e}", path.display())))?;
            let sequence = String::from_utf8_lossy(rec.seq()).to_uppercase();
            if sequence.is_empty() {
                return Err(CoreError::InvalidRecord(format!(
                    "record '{}' in {} has an empty sequence",
                    rec.id(),
                    path.display()
                )));
            }
            records.push(SequenceRecord { id: rec.id().to_string(), sequence, label });
        }

        debug!(file = %path.display(), count = records.len(), "loaded FASTA records");
        Ok(Self { records })
    }

    /// Concatenate a positive and a negative set, preserving input order
    /// within each class (positives first).
    #[must_use]
    pub fn merged(positives: Self, negatives: Self) -> Self {
        let mut records = positives.records;
        records.extend(negatives.records);
        Self { records }
    }

    #[must_use]
    pub fn records(&self) -> &[SequenceRecord] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn count_label(&self, label: Label) -> usize {
        self.records.iter().filter(|r| r.label == label).count()
    }

    /// Indices of records carrying the given label, in input order.
    #[must_use]
    pub fn indices_of(&self, label: Label) -> Vec<usize> {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| (r.label == label).then_some(i))
            .collect()
    }

    /// Stable content fingerprint over ids, sequences and labels.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for rec in &self.records {
            hasher.update(rec.id.as_bytes());
            hasher.update(b"\x1f");
            hasher.update(rec.sequence.as_bytes());
            hasher.update(if rec.label == Label::Positive { b"+" } else { b"-" });
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_fasta(dir: &TempDir, name: &str, entries: &[(&str, &str)]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for (id, seq) in entries {
            writeln!(f, ">{id}").unwrap();
            writeln!(f, "{seq}").unwrap();
        }
        path
    }

    #[test]
    fn test_from_fasta_loads_records_in_order() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, "pos.fa", &[("a", "ACGU"), ("b", "ggcc")]);

        let set = SequenceSet::from_fasta(&path, Label::Positive).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].id, "a");
        assert_eq!(set.records()[1].sequence, "GGCC");
        assert_eq!(set.count_label(Label::Positive), 2);
    }

    #[test]
    fn test_from_fasta_missing_file_is_input_not_found() {
        let err = SequenceSet::from_fasta(Path::new("/no/such/file.fa"), Label::Negative)
            .unwrap_err();
        assert!(matches!(err, CoreError::InputNotFound(_)));
    }

    #[test]
    fn test_merged_keeps_positives_first() {
        let dir = TempDir::new().unwrap();
        let pos = write_fasta(&dir, "p.fa", &[("p1", "AAAA")]);
        let neg = write_fasta(&dir, "n.fa", &[("n1", "CCCC")]);

        let merged = SequenceSet::merged(
            SequenceSet::from_fasta(&pos, Label::Positive).unwrap(),
            SequenceSet::from_fasta(&neg, Label::Negative).unwrap(),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.records()[0].label, Label::Positive);
        assert_eq!(merged.indices_of(Label::Negative), vec![1]);
    }

    #[test]
    fn test_fingerprint_stable_and_label_sensitive() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, "s.fa", &[("x", "ACGT")]);

        let a = SequenceSet::from_fasta(&path, Label::Positive).unwrap();
        let b = SequenceSet::from_fasta(&path, Label::Positive).unwrap();
        let c = SequenceSet::from_fasta(&path, Label::Negative).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }
}
