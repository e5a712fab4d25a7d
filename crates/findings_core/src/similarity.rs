//! Token-set Jaccard similarity used to spot duplicate findings across repositories.

use std::collections::HashSet;

/// Splits text into lowercase alphanumeric words longer than two characters.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}

/// `|a ∩ b| / |a ∪ b|`, or 0.0 when both sets are empty.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

/// Jaccard similarity of two free-text inputs.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    jaccard(&tokenize(a), &tokenize(b))
}
