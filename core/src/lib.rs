use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

pub mod builder;
pub mod config;
pub mod html;
pub mod merge;
pub mod partial;
pub mod persist;
pub mod search;
pub mod simhash;
pub mod tokenizer;
pub mod weigher;

pub type DocId = u32;

/// Raw accumulated weight before the final merge, tf-idf score after it.
pub type Weight = f64;

/// `doc_id -> weight` for a single term. Ordered so records serialize reproducibly.
pub type Postings = BTreeMap<DocId, Weight>;

/// `term -> postings` for every term in one bucket.
pub type BucketTerms = BTreeMap<String, Postings>;

/// Per-document `bucket -> stem -> raw weight`, produced by the term weigher.
pub type DocTerms = BTreeMap<Bucket, HashMap<String, Weight>>;

const BUCKET_SYMBOLS: &[u8; 27] = b"abcdefghijklmnopqrstuvwxyz+";

/// Storage partition keyed by a term's first character: `a`..`z`, then `+` for everything else.
///
/// Ordering follows the merge order (letters first, `+` last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Bucket(u8);

impl Bucket {
    pub const COUNT: usize = BUCKET_SYMBOLS.len();
    pub const OTHER: Bucket = Bucket(26);

    pub fn of(term: &str) -> Self {
        match term.chars().next() {
            Some(c) if c.is_ascii_lowercase() => Bucket(c as u8 - b'a'),
            Some(c) if c.is_ascii_uppercase() => Bucket(c.to_ascii_lowercase() as u8 - b'a'),
            _ => Self::OTHER,
        }
    }

    /// All buckets in merge order.
    pub fn all() -> impl Iterator<Item = Bucket> {
        (0..Self::COUNT as u8).map(Bucket)
    }

    pub fn symbol(self) -> char {
        BUCKET_SYMBOLS[self.0 as usize] as char
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A scored query hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: Weight,
    pub url: String,
}

/// The portion of a URL before any `#`.
pub fn defragment(url: &str) -> &str {
    match url.split_once('#') {
        Some((base, _)) => base,
        None => url,
    }
}
