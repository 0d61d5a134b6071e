//! In-memory partial index with bounded residency.
//!
//! Postings accumulate as `bucket -> term -> doc_id -> raw weight`. Once more than
//! `threshold` documents are resident, every bucket is merged into its file on disk
//! (read-modify-write) and memory is cleared.

use crate::persist::{load_bucket, save_bucket, IndexPaths};
use crate::{Bucket, BucketTerms, DocId, DocTerms, Weight};
use anyhow::{bail, Result};
use std::collections::{BTreeMap, BTreeSet};

pub struct PartialIndex {
    paths: IndexPaths,
    threshold: usize,
    resident: BTreeMap<Bucket, BucketTerms>,
    processed: usize,
    flushed: BTreeSet<Bucket>,
    spills: usize,
}

impl PartialIndex {
    pub fn new(paths: IndexPaths, threshold: usize) -> Self {
        Self {
            paths,
            threshold,
            resident: BTreeMap::new(),
            processed: 0,
            flushed: BTreeSet::new(),
            spills: 0,
        }
    }

    /// Insert-or-update: a first touch starts from `delta`, later touches add to it.
    pub fn add(&mut self, bucket: Bucket, term: String, doc_id: DocId, delta: Weight) {
        *self
            .resident
            .entry(bucket)
            .or_default()
            .entry(term)
            .or_default()
            .entry(doc_id)
            .or_insert(0.0) += delta;
    }

    /// Merge one accepted document's weights, spilling if the threshold is exceeded.
    /// Returns whether a spill happened.
    pub fn add_document(&mut self, doc_id: DocId, terms: DocTerms) -> Result<bool> {
        for (bucket, weights) in terms {
            for (term, weight) in weights {
                self.add(bucket, term, doc_id, weight);
            }
        }
        self.processed += 1;
        if self.processed > self.threshold {
            self.spill()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// Write every resident bucket to disk, merging with what is already there.
    ///
    /// For a doc_id present both in memory and on disk the in-memory weight wins.
    pub fn spill(&mut self) -> Result<()> {
        let resident = std::mem::take(&mut self.resident);
        tracing::debug!(buckets = resident.len(), documents = self.processed, "spilling partial index");
        for (bucket, mut terms) in resident {
            let path = self.paths.bucket(bucket);
            if path.exists() {
                for (term, on_disk) in load_bucket(&path)? {
                    let postings = terms.entry(term).or_default();
                    for (doc_id, weight) in on_disk {
                        postings.entry(doc_id).or_insert(weight);
                    }
                }
            } else if self.flushed.contains(&bucket) {
                bail!("partial index file {} vanished between spills", path.display());
            }
            save_bucket(&path, &terms)?;
            self.flushed.insert(bucket);
        }
        self.processed = 0;
        self.spills += 1;
        Ok(())
    }

    /// Buckets that have a file on disk.
    pub fn flushed(&self) -> &BTreeSet<Bucket> {
        &self.flushed
    }

    pub fn resident_documents(&self) -> usize {
        self.processed
    }

    pub fn spills(&self) -> usize {
        self.spills
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn doc(term: &str, weight: Weight) -> DocTerms {
        let mut terms = DocTerms::new();
        terms.insert(Bucket::of(term), HashMap::from([(term.to_string(), weight)]));
        terms
    }

    #[test]
    fn add_accumulates() {
        let dir = tempdir().unwrap();
        let mut partial = PartialIndex::new(IndexPaths::new(dir.path()), 10);
        partial.add(Bucket::of("cat"), "cat".into(), 1, 1.0);
        partial.add(Bucket::of("cat"), "cat".into(), 1, 2.5);
        partial.spill().unwrap();
        let on_disk = load_bucket(&partial.paths().bucket(Bucket::of("cat"))).unwrap();
        assert_eq!(on_disk["cat"][&1], 3.5);
    }

    #[test]
    fn spills_once_threshold_is_exceeded() {
        let dir = tempdir().unwrap();
        let mut partial = PartialIndex::new(IndexPaths::new(dir.path()), 1);
        assert!(!partial.add_document(1, doc("cat", 1.0)).unwrap());
        assert_eq!(partial.resident_documents(), 1);
        assert!(partial.add_document(2, doc("cow", 1.0)).unwrap());
        assert_eq!(partial.resident_documents(), 0);
        assert_eq!(partial.spills(), 1);
        assert!(partial.flushed().contains(&Bucket::of("c")));
    }

    #[test]
    fn repeated_spills_union_postings() {
        let dir = tempdir().unwrap();
        let mut partial = PartialIndex::new(IndexPaths::new(dir.path()), 100);
        partial.add_document(1, doc("dog", 2.0)).unwrap();
        partial.spill().unwrap();
        partial.add_document(2, doc("dog", 3.0)).unwrap();
        partial.add_document(3, doc("duck", 1.0)).unwrap();
        partial.spill().unwrap();

        let on_disk = load_bucket(&partial.paths().bucket(Bucket::of("d"))).unwrap();
        let dog: Vec<_> = on_disk["dog"].iter().map(|(d, w)| (*d, *w)).collect();
        assert_eq!(dog, vec![(1, 2.0), (2, 3.0)]);
        assert_eq!(on_disk["duck"][&3], 1.0);
    }

    #[test]
    fn memory_wins_on_conflict() {
        let dir = tempdir().unwrap();
        let mut partial = PartialIndex::new(IndexPaths::new(dir.path()), 100);
        partial.add(Bucket::of("eel"), "eel".into(), 7, 1.0);
        partial.spill().unwrap();
        partial.add(Bucket::of("eel"), "eel".into(), 7, 9.0);
        partial.spill().unwrap();
        let on_disk = load_bucket(&partial.paths().bucket(Bucket::of("e"))).unwrap();
        assert_eq!(on_disk["eel"][&7], 9.0);
    }
}
