//! Near-duplicate detection with 64-bit simhash fingerprints.
//!
//! A fingerprint is built from overlapping character shingles of the normalized text.
//! The [`FingerprintIndex`] splits each fingerprint into `k + 1` blocks; by pigeonhole,
//! two fingerprints within Hamming distance `k` agree exactly on at least one block,
//! so only fingerprints sharing a block are compared.

use crate::config::SHINGLE_WIDTH;
use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"[^\w]+").expect("valid regex");
}

pub const FINGERPRINT_BITS: u32 = u64::BITS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub u64);

impl Fingerprint {
    /// Fingerprint of `text` after lowercasing and dropping every non-word character.
    ///
    /// Text shorter than the shingle width is a single shingle.
    pub fn of_text(text: &str) -> Self {
        let normalized = NON_WORD.replace_all(&text.to_lowercase(), "").into_owned();
        let chars: Vec<char> = normalized.chars().collect();
        let shingles = chars.len().saturating_sub(SHINGLE_WIDTH) + 1;

        let mut counts: HashMap<String, i64> = HashMap::new();
        for start in 0..shingles {
            let end = (start + SHINGLE_WIDTH).min(chars.len());
            *counts.entry(chars[start..end].iter().collect()).or_insert(0) += 1;
        }
        Self::from_features(counts)
    }

    /// Weighted-majority combination of feature hashes.
    pub fn from_features<I, S>(features: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut tally = [0i64; FINGERPRINT_BITS as usize];
        for (feature, weight) in features {
            let h = feature_hash(feature.as_ref());
            for (bit, slot) in tally.iter_mut().enumerate() {
                if (h >> bit) & 1 == 1 {
                    *slot += weight;
                } else {
                    *slot -= weight;
                }
            }
        }
        let mut value = 0u64;
        for (bit, slot) in tally.iter().enumerate() {
            if *slot > 0 {
                value |= 1u64 << bit;
            }
        }
        Fingerprint(value)
    }

    pub fn distance(self, other: Fingerprint) -> u32 {
        (self.0 ^ other.0).count_ones()
    }
}

fn feature_hash(feature: &str) -> u64 {
    let digest = Sha1::digest(feature.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(head)
}

/// Block-permuted lookup of stored fingerprints.
pub struct FingerprintIndex {
    k: u32,
    /// `(shift, mask)` per block.
    blocks: Vec<(u32, u64)>,
    buckets: HashMap<(usize, u64), Vec<Fingerprint>>,
    len: usize,
}

impl FingerprintIndex {
    /// `k` must be below [`FINGERPRINT_BITS`].
    pub fn new(k: u32) -> Self {
        let parts = k + 1;
        let base = FINGERPRINT_BITS / parts;
        let extra = FINGERPRINT_BITS % parts;
        let mut blocks = Vec::with_capacity(parts as usize);
        let mut shift = 0;
        for i in 0..parts {
            let width = base + u32::from(i < extra);
            let mask = if width >= FINGERPRINT_BITS { u64::MAX } else { (1u64 << width) - 1 };
            blocks.push((shift, mask));
            shift += width;
        }
        Self { k, blocks, buckets: HashMap::new(), len: 0 }
    }

    fn keys(&self, fp: Fingerprint) -> impl Iterator<Item = (usize, u64)> + '_ {
        self.blocks
            .iter()
            .enumerate()
            .map(move |(i, &(shift, mask))| (i, (fp.0 >> shift) & mask))
    }

    /// Any stored fingerprint within distance `k` of `fp`.
    pub fn find_near(&self, fp: Fingerprint) -> Option<Fingerprint> {
        self.keys(fp)
            .filter_map(|key| self.buckets.get(&key))
            .flatten()
            .copied()
            .find(|stored| stored.distance(fp) <= self.k)
    }

    pub fn insert(&mut self, fp: Fingerprint) {
        let keys: Vec<_> = self.keys(fp).collect();
        for key in keys {
            self.buckets.entry(key).or_default().push(fp);
        }
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Gatekeeper deciding whether a document's text has been seen before.
///
/// Every checked document is registered, duplicates included, so near-duplicates
/// of a duplicate are caught too. The index only ever grows; `budget` caps it.
pub struct DuplicateDetector {
    index: FingerprintIndex,
    budget: Option<usize>,
    exhausted: bool,
}

impl DuplicateDetector {
    pub fn new(k: u32, budget: Option<usize>) -> Self {
        Self { index: FingerprintIndex::new(k), budget, exhausted: false }
    }

    /// Returns `true` if `text` is a near-duplicate of an earlier document.
    ///
    /// The fingerprint is registered after the lookup, so a document never matches itself.
    pub fn check(&mut self, text: &str) -> bool {
        self.check_fingerprint(Fingerprint::of_text(text))
    }

    pub fn check_fingerprint(&mut self, fp: Fingerprint) -> bool {
        let duplicate = self.index.find_near(fp).is_some();
        if self.budget.is_some_and(|b| self.index.len() >= b) {
            if !self.exhausted {
                tracing::warn!(
                    stored = self.index.len(),
                    "fingerprint budget reached, later documents are no longer registered"
                );
                self.exhausted = true;
            }
        } else {
            self.index.insert(fp);
        }
        duplicate
    }

    pub fn stored(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_text_has_identical_fingerprint() {
        let a = Fingerprint::of_text("The quick brown fox jumps over the lazy dog");
        let b = Fingerprint::of_text("the QUICK brown fox, jumps over the lazy dog!");
        assert_eq!(a, b);
    }

    #[test]
    fn short_text_is_one_shingle() {
        assert_eq!(Fingerprint::of_text("ab"), Fingerprint::of_text("a b"));
        assert_ne!(Fingerprint::of_text("ab"), Fingerprint::of_text("ba"));
    }

    #[test]
    fn finds_neighbors_across_blocks() {
        let mut index = FingerprintIndex::new(2);
        assert!(index.find_near(Fingerprint(0)).is_none());
        index.insert(Fingerprint(0));
        assert!(index.find_near(Fingerprint(0b11)).is_some());
        assert!(index.find_near(Fingerprint(1 | (1 << 63))).is_some());
        assert!(index.find_near(Fingerprint(0b111)).is_none());
        assert!(index.find_near(Fingerprint(u64::MAX)).is_none());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn detector_registers_every_document() {
        let mut detector = DuplicateDetector::new(2, None);
        assert!(!detector.check("completely unique text about rust"));
        assert!(detector.check("completely unique text about rust"));
        assert!(!detector.check("a very different page talking about gardening tools"));
        assert_eq!(detector.stored(), 3);
    }

    /// Odd normalized length (31 chars) repeated 40 times keeps every bit tally at least
    /// 38 away from zero, far more than a one-word edit can move it.
    fn long_page() -> String {
        vec!["Rust compiles to fast native code and"; 40].join(" ")
    }

    #[test]
    fn one_word_edits_stay_near() {
        let base = long_page();
        let appended = format!("{base} extra");
        let mut words: Vec<&str> = base.split(' ').collect();
        words[100] = "lean";
        let substituted = words.join(" ");

        let fp = Fingerprint::of_text(&base);
        assert_ne!(base, substituted);
        assert!(fp.distance(Fingerprint::of_text(&appended)) <= 2);
        assert!(fp.distance(Fingerprint::of_text(&substituted)) <= 2);

        let mut detector = DuplicateDetector::new(2, None);
        assert!(!detector.check(&base));
        assert!(detector.check(&appended));
        assert!(detector.check(&substituted));
        assert!(!detector.check("A dog barked while another dog watched the bird on the fence"));
    }

    #[test]
    fn detector_threshold_is_inclusive() {
        let mut detector = DuplicateDetector::new(2, None);
        assert!(!detector.check_fingerprint(Fingerprint(0)));
        // distance k
        assert!(detector.check_fingerprint(Fingerprint(0b11 << 40)));
        // distance k + 1 from the first, further from the rest
        assert!(!detector.check_fingerprint(Fingerprint(0b111 << 10)));
        assert!(!detector.check_fingerprint(Fingerprint(0b111 << 50)));
        assert_eq!(detector.stored(), 4);
    }

    #[test]
    fn budget_stops_registration() {
        let mut detector = DuplicateDetector::new(2, Some(1));
        assert!(!detector.check("first page about sailing boats"));
        assert!(!detector.check("second page on mountain climbing gear"));
        assert!(!detector.check("second page on mountain climbing gear"));
        assert!(detector.check("first page about sailing boats"));
        assert_eq!(detector.stored(), 1);
    }
}
