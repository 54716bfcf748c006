use std::collections::HashSet;

/// Lowercase, whitespace-tokenize a string into a set of tokens.
pub fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Jaccard similarity over lowercase whitespace tokens, used as the
/// text-similarity fallback whenever embeddings are unavailable or
/// dimension-mismatched.
pub fn jaccard_similarity(a: &str, b: &str) -> f32 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count() as f32;
    let union = (ta.len() + tb.len()) as f32 - intersection;
    if union <= 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Normalize a query string for cache-key purposes: lowercased,
/// whitespace-collapsed.
pub fn normalize_query(query: &str) -> String {
    query.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}
