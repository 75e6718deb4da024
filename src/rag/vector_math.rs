/// Cosine similarity in `[-1, 1]`.
///
/// Returns 0.0 for empty vectors, mismatched lengths, a zero magnitude, or
/// non-finite components.
pub fn cosine_similarity(query: &[f32], candidate: &[f32]) -> f32 {
    if query.is_empty() || query.len() != candidate.len() {
        return 0.0;
    }

    let (dot, query_sq, candidate_sq) = query.iter().zip(candidate.iter()).fold(
        (0.0f64, 0.0f64, 0.0f64),
        |(dot, qq, cc), (q, c)| {
            let (q, c) = (*q as f64, *c as f64);
            (dot + q * c, qq + q * q, cc + c * c)
        },
    );

    let denom = query_sq.sqrt() * candidate_sq.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }

    let similarity = dot / denom;
    if !similarity.is_finite() {
        return 0.0;
    }
    similarity.clamp(-1.0, 1.0) as f32
}

/// Scores every candidate and returns `(index, score)` pairs, best first.
/// Equal scores keep their input order.
pub fn rank_descending_by_cosine<'a, I>(query: &[f32], candidates: I) -> Vec<(usize, f32)>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scores: Vec<(usize, f32)> = candidates
        .into_iter()
        .enumerate()
        .map(|(idx, candidate)| (idx, cosine_similarity(query, candidate)))
        .collect();

    scores.sort_by(|left, right| right.1.total_cmp(&left.1));
    scores
}
