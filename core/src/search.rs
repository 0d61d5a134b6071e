use crate::persist::{load_lookup, load_offsets, read_record, IndexPaths};
use crate::tokenizer::stems;
use crate::{DocId, Hit, Postings};
use anyhow::{bail, Context, Result};
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;

#[derive(Debug, Default)]
pub struct SearchResults {
    /// Documents matching every query term, before truncation.
    pub total_hits: usize,
    pub hits: Vec<Hit>,
}

/// Read-only view over a finished index.
///
/// The offset directory and lookup table are loaded once. Records are read by seeking
/// into the index file, whose handle is the only state behind a lock, so the engine can
/// be shared across threads.
pub struct QueryEngine {
    offsets: HashMap<String, u64>,
    lookup: HashMap<DocId, String>,
    index: Mutex<BufReader<File>>,
    limit: usize,
}

impl QueryEngine {
    pub fn open(paths: &IndexPaths, limit: usize) -> Result<Self> {
        let offsets = load_offsets(paths)?;
        let lookup = load_lookup(paths)?;
        let index_path = paths.index();
        let file = File::open(&index_path).with_context(|| format!("opening {}", index_path.display()))?;
        tracing::info!(terms = offsets.len(), docs = lookup.len(), "index loaded");
        Ok(Self { offsets, lookup, index: Mutex::new(BufReader::new(file)), limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn url(&self, doc_id: DocId) -> Option<&str> {
        self.lookup.get(&doc_id).map(String::as_str)
    }

    /// Scored postings of one stem, `None` if the index never saw it.
    pub fn postings(&self, term: &str) -> Result<Option<Postings>> {
        let Some(&offset) = self.offsets.get(term) else { return Ok(None) };
        let (found, postings) = read_record(&mut *self.index.lock(), offset)?;
        if found != term {
            bail!("offset {offset} for {term:?} points at the record of {found:?}");
        }
        Ok(Some(postings))
    }

    /// Top `limit` documents containing every query stem, by summed tf-idf.
    ///
    /// A stem repeated in the query counts once per repetition. Any unknown stem
    /// empties the result.
    pub fn search_scored(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let terms: Vec<String> = stems(query).collect();
        let mut resolved: HashMap<&str, Postings> = HashMap::new();
        for term in &terms {
            if resolved.contains_key(term.as_str()) {
                continue;
            }
            match self.postings(term)? {
                Some(postings) => {
                    resolved.insert(term.as_str(), postings);
                }
                None => {
                    tracing::debug!(term = term.as_str(), "term not in index");
                    return Ok(SearchResults::default());
                }
            }
        }

        let mut sets: Vec<&Postings> = resolved.values().collect();
        sets.sort_by_key(|p| p.len());
        let Some((smallest, rest)) = sets.split_first() else {
            return Ok(SearchResults::default());
        };

        let mut scored: Vec<(DocId, f64)> = smallest
            .keys()
            .filter(|doc_id| rest.iter().all(|p| p.contains_key(*doc_id)))
            .map(|&doc_id| {
                let total: f64 = terms.iter().map(|t| resolved[t.as_str()][&doc_id]).sum();
                (doc_id, total)
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));

        let total_hits = scored.len();
        let hits = scored
            .into_iter()
            .take(limit)
            .map(|(doc_id, score)| match self.lookup.get(&doc_id) {
                Some(url) => Ok(Hit { doc_id, score, url: url.clone() }),
                None => bail!("doc_id {doc_id} is missing from the lookup table"),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(SearchResults { total_hits, hits })
    }

    /// URLs of the top results, at most the configured limit.
    pub fn search(&self, query: &str) -> Result<Vec<String>> {
        let results = self.search_scored(query, self.limit)?;
        Ok(results.hits.into_iter().map(|h| h.url).collect())
    }
}
