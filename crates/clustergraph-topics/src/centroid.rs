//! Group centroids and representative members.

use crate::similarity::{dot, mean_vector, normalize};

/// Unit-norm centroid of a group.
///
/// The mean of the member embeddings, renormalized. A zero-norm mean (for
/// example two opposite vectors) falls back to the first member's
/// embedding so the result stays unit-norm. Empty groups yield an empty
/// vector.
pub fn group_centroid(points: &[Vec<f32>], members: &[usize]) -> Vec<f32> {
    let Some(&first) = members.first() else {
        return Vec::new();
    };

    let mut centroid = mean_vector(points, members);
    if normalize(&mut centroid) > f32::EPSILON {
        return centroid;
    }

    let mut fallback = points[first].clone();
    normalize(&mut fallback);
    fallback
}

/// The `top_k` members most similar to `centroid`.
///
/// Ordered by similarity descending, ties by member order. Groups of at
/// most `top_k` members are returned unchanged.
pub fn top_representatives(
    points: &[Vec<f32>],
    members: &[usize],
    centroid: &[f32],
    top_k: usize,
) -> Vec<usize> {
    if members.len() <= top_k {
        return members.to_vec();
    }

    let mut scored: Vec<(usize, f32)> = members
        .iter()
        .map(|&m| (m, dot(&points[m], centroid)))
        .collect();
    // Stable sort keeps member order for equal scores
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));

    scored.into_iter().take(top_k).map(|(m, _)| m).collect()
}
