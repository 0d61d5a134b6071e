use crate::config::TagGroup;
use crate::tokenizer::stems;
use crate::{Bucket, DocTerms};
use std::collections::HashSet;

/// Raw per-bucket term weights for one document.
///
/// Plain-text stems are counted first. Then each tag group, in increasing importance,
/// boosts the stems of its tags with `(weight + bonus) * multiplier`. A stem is boosted
/// at most once per document, by the first tag it turns up in.
pub fn weigh<F>(text: &str, tag_text: F, groups: &[TagGroup]) -> DocTerms
where
    F: Fn(&str) -> Option<String>,
{
    let mut terms = DocTerms::new();
    for stem in stems(text) {
        *terms.entry(Bucket::of(&stem)).or_default().entry(stem).or_insert(0.0) += 1.0;
    }

    let mut boosted: HashSet<String> = HashSet::new();
    for group in groups {
        for tag in &group.tags {
            let Some(excerpt) = tag_text(tag) else { continue };
            for stem in stems(&excerpt) {
                if !boosted.insert(stem.clone()) {
                    continue;
                }
                let weight = terms.entry(Bucket::of(&stem)).or_default().entry(stem).or_insert(0.0);
                *weight += group.bonus;
                *weight *= group.multiplier;
            }
        }
    }
    terms
}
