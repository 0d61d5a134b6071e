use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"[\p{L}\p{N}]+").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

/// Lazy stream of stems over NFKC-normalized, lowercased text.
pub struct Stems {
    text: String,
    pos: usize,
}

impl Iterator for Stems {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mat = RE.find_at(&self.text, self.pos)?;
        self.pos = mat.end();
        Some(STEMMER.stem(mat.as_str()).into_owned())
    }
}

/// Split text into alphanumeric words and stem each one (English Snowball).
///
/// Stopwords are kept: every word is a searchable term.
pub fn stems(text: &str) -> Stems {
    Stems { text: text.nfkc().collect::<String>().to_lowercase(), pos: 0 }
}
