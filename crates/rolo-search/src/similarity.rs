//! Edit-distance similarity for names.
//!
//! Scores are `1 - distance / max_len` over lowercased, trimmed input,
//! counted in characters. Two empty strings are a perfect match, so
//! callers holding possibly-empty names must guard for that themselves.

use strsim::levenshtein;

/// Normalized edit-distance similarity in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Name-aware similarity: the better of whole-string similarity and a
/// token-wise score that tolerates reordered or misspelled name parts.
///
/// Each query token greedily takes its best unused candidate token, in query
/// order, with no backtracking. The summed token scores are divided by the
/// larger token count so extra or missing parts cost something.
pub fn name_similarity(query: &str, candidate: &str) -> f64 {
    let whole = similarity(query, candidate);

    let query_lower = query.to_lowercase();
    let candidate_lower = candidate.to_lowercase();
    let query_parts: Vec<&str> = query_lower.split_whitespace().collect();
    let candidate_parts: Vec<&str> = candidate_lower.split_whitespace().collect();
    if query_parts.is_empty() || candidate_parts.is_empty() {
        return whole;
    }

    let mut used = vec![false; candidate_parts.len()];
    let mut total = 0.0;
    for part in &query_parts {
        let mut best = 0.0;
        let mut best_idx = None;
        for (idx, other) in candidate_parts.iter().enumerate() {
            if used[idx] {
                continue;
            }
            let score = similarity(part, other);
            if score > best {
                best = score;
                best_idx = Some(idx);
            }
        }
        if let Some(idx) = best_idx {
            used[idx] = true;
        }
        total += best;
    }

    let parts = total / query_parts.len().max(candidate_parts.len()) as f64;
    whole.max(parts)
}
