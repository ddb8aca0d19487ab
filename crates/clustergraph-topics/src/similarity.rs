//! Vector arithmetic over embedding rows.
//!
//! Embeddings are unit-norm, so cosine distance reduces to `1 - dot`.

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "dimension mismatch");
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

/// Cosine of the angle between `a` and `b`, in `[-1, 1]`.
///
/// Mismatched lengths and zero vectors give 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let scale = norm(a) * norm(b);
    if scale == 0.0 {
        0.0
    } else {
        dot(a, b) / scale
    }
}

/// Scale `v` to unit length and return its previous norm.
/// A zero vector is left as is.
pub fn normalize(v: &mut [f32]) -> f32 {
    let length = norm(v);
    if length > 0.0 {
        v.iter_mut().for_each(|x| *x /= length);
    }
    length
}

/// Arithmetic mean of `points[members]`, summed in f64. Empty when
/// `members` is.
pub fn mean_vector(points: &[Vec<f32>], members: &[usize]) -> Vec<f32> {
    let Some(&first) = members.first() else {
        return Vec::new();
    };
    let mut totals = vec![0.0f64; points[first].len()];
    for row in members.iter().map(|&m| &points[m]) {
        for (total, &x) in totals.iter_mut().zip(row) {
            *total += f64::from(x);
        }
    }
    let count = members.len() as f64;
    totals.iter().map(|&t| (t / count) as f32).collect()
}

/// Symmetric matrix of `max(0, 1 - dot)` with an exact-zero diagonal.
pub fn pairwise_distances(embeddings: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = embeddings.len();
    let mut matrix = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in i + 1..n {
            let d = (1.0 - f64::from(dot(&embeddings[i], &embeddings[j]))).max(0.0);
            matrix[i][j] = d;
            matrix[j][i] = d;
        }
    }
    matrix
}
