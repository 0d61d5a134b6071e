//! Phase 2: turn raw bucket files into the final tf-idf index.
//!
//! Only runs once the accepted-document count is frozen. Buckets are consumed in
//! `a`..`z`, `+` order; each term becomes one line of `index.txt` and its starting
//! byte offset goes into the offset directory.

use crate::partial::PartialIndex;
use crate::persist::{load_bucket, write_record};
use crate::{Bucket, DocId, Postings, Weight};
use anyhow::{bail, Context, Result};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};

pub struct MergeSummary {
    /// term -> byte offset of its record in the final index.
    pub offsets: BTreeMap<String, u64>,
    /// Size of the final index file after the merge.
    pub index_bytes: u64,
}

/// `(1 + ln(weight)) * ln(total_docs / df)`. A zero weight counts as 1.
pub fn tf_idf(weight: Weight, df: usize, total_docs: DocId) -> Weight {
    debug_assert!(df >= 1 && df <= total_docs as usize, "df {df} outside 1..={total_docs}");
    let weight = if weight == 0.0 { 1.0 } else { weight };
    let tf = 1.0 + weight.ln();
    let idf = (f64::from(total_docs) / df as f64).ln();
    tf * idf
}

fn score(raw: &Postings, total_docs: DocId) -> Postings {
    let df = raw.len();
    raw.iter().map(|(&doc_id, &weight)| (doc_id, tf_idf(weight, df, total_docs))).collect()
}

/// Spill whatever is still resident, then append every bucket's scored records to the
/// final index and delete the consumed bucket files.
pub fn finalize(mut partial: PartialIndex, total_docs: DocId) -> Result<MergeSummary> {
    partial.spill()?;
    let paths = partial.paths();

    let index_path = paths.index();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&index_path)
        .with_context(|| format!("opening {}", index_path.display()))?;
    let mut offset = file.metadata()?.len();
    let mut out = BufWriter::new(file);
    let mut offsets = BTreeMap::new();

    for bucket in Bucket::all() {
        if !partial.flushed().contains(&bucket) {
            continue;
        }
        let path = paths.bucket(bucket);
        if !path.exists() {
            bail!("bucket {bucket} was flushed but {} is missing", path.display());
        }
        let terms = load_bucket(&path)?;
        let count = terms.len();
        for (term, raw) in terms {
            let written = write_record(&mut out, &term, &score(&raw, total_docs))?;
            offsets.insert(term, offset);
            offset += written;
        }
        out.flush()?;
        fs::remove_file(&path)?;
        tracing::debug!(%bucket, terms = count, "merged bucket");
    }
    out.flush()?;

    if fs::read_dir(paths.partial_dir()).map(|mut d| d.next().is_none()).unwrap_or(false) {
        fs::remove_dir(paths.partial_dir())?;
    }
    Ok(MergeSummary { offsets, index_bytes: offset })
}
