//! Ward hierarchical agglomeration.
//!
//! Builds a merge tree from a dense dissimilarity matrix using the
//! nearest-neighbour chain algorithm with Lance-Williams updates. Leaves
//! keep their input order; no leaf reordering is performed.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::TopicsError;

/// One agglomeration step.
///
/// Cluster ids below the leaf count are leaves; merge `i` creates cluster
/// `leaf_count + i`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Merge {
    /// Smaller of the two merged cluster ids
    pub left: usize,
    /// Larger of the two merged cluster ids
    pub right: usize,
    /// Linkage distance of this merge, non-decreasing along the tree
    pub height: f64,
    /// Number of leaves under the new cluster
    pub size: usize,
}

/// Merge tree over `leaf_count` items, merges ordered by height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dendrogram {
    leaf_count: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }
}

/// Ward linkage over a symmetric distance matrix.
///
/// Requires at least two items; callers handle the one-group case.
pub fn ward_linkage(distances: &[Vec<f64>]) -> Result<Dendrogram, TopicsError> {
    let n = distances.len();
    if n < 2 {
        return Err(TopicsError::InvalidInput(format!(
            "linkage needs at least 2 items, got {}",
            n
        )));
    }
    if let Some(row) = distances.iter().position(|r| r.len() != n) {
        return Err(TopicsError::InvalidInput(format!(
            "distance matrix row {} has {} columns, expected {}",
            row,
            distances[row].len(),
            n
        )));
    }

    let raw = nn_chain(distances)?;
    let merges = relabel(n, raw);

    debug!(
        leaves = n,
        top_height = merges.last().map(|m| m.height).unwrap_or(0.0),
        "Built Ward dendrogram"
    );

    Ok(Dendrogram {
        leaf_count: n,
        merges,
    })
}

/// Merge as found by the chain: slot indices, not cluster ids.
struct RawMerge {
    x: usize,
    y: usize,
    height: f64,
}

fn nn_chain(distances: &[Vec<f64>]) -> Result<Vec<RawMerge>, TopicsError> {
    let n = distances.len();
    let mut d: Vec<Vec<f64>> = distances.to_vec();
    let mut size = vec![1usize; n];
    let mut active = vec![true; n];
    let mut chain: Vec<usize> = Vec::with_capacity(n);
    let mut merges = Vec::with_capacity(n - 1);

    for _ in 0..n - 1 {
        if chain.is_empty() {
            // At least two slots stay active until the last merge
            let first = active.iter().position(|&a| a).ok_or_else(|| {
                TopicsError::Clustering("no active cluster left".to_string())
            })?;
            chain.push(first);
        }

        let (x, y, height) = loop {
            let x = chain[chain.len() - 1];
            let previous = (chain.len() > 1).then(|| chain[chain.len() - 2]);

            // Ties prefer the previous chain element, which ends the chain
            let (mut y, mut current_min) = match previous {
                Some(p) => (Some(p), d[x][p]),
                None => (None, f64::INFINITY),
            };
            for i in 0..n {
                if i != x && active[i] && d[x][i] < current_min {
                    current_min = d[x][i];
                    y = Some(i);
                }
            }

            let y = y.ok_or_else(|| {
                TopicsError::Clustering(format!("no finite distance from item {}", x))
            })?;

            if previous == Some(y) {
                chain.truncate(chain.len() - 2);
                break (x, y, current_min);
            }
            chain.push(y);
        };

        let (x, y) = if x < y { (x, y) } else { (y, x) };
        trace!(x, y, height, "Ward merge");
        merges.push(RawMerge { x, y, height });

        // New cluster lives in slot y
        let (nx, ny) = (size[x] as f64, size[y] as f64);
        let dxy = d[x][y];
        for k in 0..n {
            if !active[k] || k == x || k == y {
                continue;
            }
            let nk = size[k] as f64;
            let inner = ((nx + nk) * d[x][k].powi(2) + (ny + nk) * d[y][k].powi(2)
                - nk * dxy.powi(2))
                / (nx + ny + nk);
            let updated = inner.max(0.0).sqrt();
            d[y][k] = updated;
            d[k][y] = updated;
        }
        active[x] = false;
        size[y] += size[x];
        size[x] = 0;
    }

    Ok(merges)
}

/// Sort merges by height and convert slot indices to cluster ids.
fn relabel(n: usize, mut raw: Vec<RawMerge>) -> Vec<Merge> {
    // Stable sort; equal heights keep discovery order
    raw.sort_by(|a, b| a.height.total_cmp(&b.height));

    let mut parent: Vec<usize> = (0..2 * n - 1).collect();
    let mut sizes = vec![1usize; 2 * n - 1];
    let mut merges = Vec::with_capacity(raw.len());
    let mut floor = 0.0f64;

    for (i, m) in raw.into_iter().enumerate() {
        let a = find(&mut parent, m.x);
        let b = find(&mut parent, m.y);
        let (left, right) = if a < b { (a, b) } else { (b, a) };
        let id = n + i;

        parent[left] = id;
        parent[right] = id;
        sizes[id] = sizes[left] + sizes[right];

        floor = floor.max(m.height);
        merges.push(Merge {
            left,
            right,
            height: floor,
            size: sizes[id],
        });
    }

    merges
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    let mut root = x;
    while parent[root] != root {
        root = parent[root];
    }
    while parent[x] != root {
        let next = parent[x];
        parent[x] = root;
        x = next;
    }
    root
}
