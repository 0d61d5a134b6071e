//! Ingestion coordinator.
//!
//! Owns every piece of state that must be updated in document order: the visited URL
//! set, the duplicate detector, the doc_id counter and the lookup table. Documents pass
//! through [`IndexBuilder::ingest`] one at a time; [`IndexBuilder::finish`] consumes the
//! builder, freezes the document count and runs the final merge.

use crate::config::IndexerConfig;
use crate::html::HtmlView;
use crate::merge;
use crate::partial::PartialIndex;
use crate::persist::{save_lookup, save_meta, save_offsets, IndexPaths, MetaFile, FORMAT_VERSION};
use crate::simhash::{DuplicateDetector, FINGERPRINT_BITS};
use crate::weigher::weigh;
use crate::{defragment, DocId};
use anyhow::{bail, Context, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;

/// What happened to one ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Indexed(DocId),
    /// The defragmented URL was already consumed.
    RepeatUrl,
    /// The text is within Hamming distance `k` of an earlier document.
    NearDuplicate,
}

#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub seen: usize,
    pub indexed: usize,
    pub repeat_urls: usize,
    pub near_duplicates: usize,
}

#[derive(Debug)]
pub struct IndexSummary {
    pub num_docs: u32,
    pub num_terms: usize,
    pub index_bytes: u64,
    pub stats: IngestStats,
}

pub struct IndexBuilder {
    paths: IndexPaths,
    config: IndexerConfig,
    next_doc_id: DocId,
    visited: HashSet<String>,
    lookup: BTreeMap<DocId, String>,
    detector: DuplicateDetector,
    partial: PartialIndex,
    stats: IngestStats,
}

impl IndexBuilder {
    pub fn new(paths: IndexPaths, config: IndexerConfig) -> Result<Self> {
        if config.hamming_distance >= FINGERPRINT_BITS {
            bail!("hamming distance must be below {FINGERPRINT_BITS}, got {}", config.hamming_distance);
        }
        fs::create_dir_all(&paths.root)?;
        // Bucket files only live between spills of one build. Leftovers from an
        // interrupted build hold doc_ids this build will reuse.
        let partial_dir = paths.partial_dir();
        if partial_dir.exists() {
            tracing::warn!(dir = %partial_dir.display(), "removing partial index left by an earlier build");
            fs::remove_dir_all(&partial_dir)
                .with_context(|| format!("removing {}", partial_dir.display()))?;
        }
        let detector = DuplicateDetector::new(config.hamming_distance, config.fingerprint_budget);
        let partial = PartialIndex::new(paths.clone(), config.spill_threshold);
        Ok(Self {
            paths,
            config,
            next_doc_id: 1,
            visited: HashSet::new(),
            lookup: BTreeMap::new(),
            detector,
            partial,
            stats: IngestStats::default(),
        })
    }

    /// Run one document through URL dedup, near-duplicate detection and weighting.
    pub fn ingest(&mut self, url: &str, markup: &str) -> Result<Ingest> {
        self.stats.seen += 1;
        let url = defragment(url);
        if !self.visited.insert(url.to_string()) {
            self.stats.repeat_urls += 1;
            return Ok(Ingest::RepeatUrl);
        }

        let view = HtmlView::parse(markup);
        let text = view.text();
        if self.detector.check(&text) {
            tracing::debug!(url, "near-duplicate, skipped");
            self.stats.near_duplicates += 1;
            return Ok(Ingest::NearDuplicate);
        }

        let terms = weigh(&text, |tag| view.tag_text(tag), &self.config.tag_groups);
        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;
        self.lookup.insert(doc_id, url.to_string());
        if self.partial.add_document(doc_id, terms)? {
            tracing::info!(doc_id, spills = self.partial.spills(), "partial index spilled to disk");
        }
        self.stats.indexed += 1;
        tracing::debug!(doc_id, url, "indexed");
        Ok(Ingest::Indexed(doc_id))
    }

    /// Number of documents accepted so far.
    pub fn accepted(&self) -> u32 {
        self.next_doc_id - 1
    }

    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Persist the lookup table, merge all postings into the final index and write the
    /// offset directory and metadata.
    pub fn finish(self) -> Result<IndexSummary> {
        let num_docs = self.accepted();
        tracing::info!(
            num_docs,
            seen = self.stats.seen,
            near_duplicates = self.stats.near_duplicates,
            fingerprints = self.detector.stored(),
            "ingestion complete, merging"
        );
        save_lookup(&self.paths, &self.lookup)?;

        let merged = merge::finalize(self.partial, num_docs)?;
        save_offsets(&self.paths, &merged.offsets)?;

        let meta = MetaFile {
            num_docs,
            num_terms: merged.offsets.len(),
            documents_seen: self.stats.seen,
            near_duplicates: self.stats.near_duplicates,
            created_at: time::OffsetDateTime::now_utc()
                .format(&time::format_description::well_known::Rfc3339)
                .unwrap_or_default(),
            version: FORMAT_VERSION,
            config: self.config,
        };
        save_meta(&self.paths, &meta)?;

        tracing::info!(num_docs, num_terms = meta.num_terms, index_bytes = merged.index_bytes, "index build complete");
        Ok(IndexSummary {
            num_docs,
            num_terms: meta.num_terms,
            index_bytes: merged.index_bytes,
            stats: self.stats,
        })
    }
}
