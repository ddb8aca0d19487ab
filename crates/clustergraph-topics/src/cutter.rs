//! Flat-cluster cutting and minimum-size enforcement.
//!
//! A cut turns a dendrogram into one raw label per leaf. Raw labels are
//! numbered by ascending smallest member index. Minimum-size enforcement
//! then runs in two passes: sizes are counted per raw label, and a
//! [`LabelRemap`] table from raw to final labels is built and applied once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use clustergraph_types::SmallGroupPolicy;

use crate::linkage::Dendrogram;
use crate::similarity::{dot, mean_vector, normalize};

/// How to cut a dendrogram.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CutMode {
    /// Apply every merge with height `<= threshold`
    Distance(f64),
    /// Apply merges until exactly this many groups remain (clamped to 1..=n)
    Count(usize),
}

/// Cut a dendrogram into flat groups.
pub fn cut(dendrogram: &Dendrogram, mode: CutMode) -> Vec<usize> {
    let n = dendrogram.leaf_count();
    let merges = dendrogram.merges();

    let applied = match mode {
        CutMode::Distance(threshold) => merges.iter().take_while(|m| m.height <= threshold).count(),
        CutMode::Count(k) => n - k.clamp(1, n.max(1)),
    };

    // Leaf union-find; cluster id -> a representative leaf
    let mut parent: Vec<usize> = (0..n).collect();
    let mut representative: Vec<usize> = (0..n).collect();
    for merge in merges.iter().take(applied) {
        let a = find(&mut parent, representative[merge.left]);
        let b = find(&mut parent, representative[merge.right]);
        let root = a.min(b);
        parent[a.max(b)] = root;
        representative.push(root);
    }

    let mut labels = vec![0usize; n];
    let mut numbering: BTreeMap<usize, usize> = BTreeMap::new();
    for (leaf, label) in labels.iter_mut().enumerate() {
        let root = find(&mut parent, leaf);
        let next = numbering.len();
        *label = *numbering.entry(root).or_insert(next);
    }

    debug!(
        leaves = n,
        merges_applied = applied,
        groups = numbering.len(),
        "Cut dendrogram"
    );
    labels
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Number of groups in a label vector (labels are contiguous from 0).
pub fn group_count(labels: &[usize]) -> usize {
    labels.iter().max().map_or(0, |m| m + 1)
}

/// Members per label, ascending.
pub fn label_sizes(labels: &[usize]) -> BTreeMap<usize, usize> {
    let mut sizes = BTreeMap::new();
    for &label in labels {
        *sizes.entry(label).or_insert(0) += 1;
    }
    sizes
}

/// Raw label -> final label mapping produced by minimum-size enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRemap {
    /// Every raw label present in the input, mapped to its final label
    pub table: BTreeMap<usize, usize>,
    /// Number of final groups
    pub group_count: usize,
    /// No raw group met the minimum and everything collapsed into group 0
    pub degenerate: bool,
}

impl LabelRemap {
    /// Map raw labels to final labels.
    pub fn apply(&self, labels: &[usize]) -> Vec<usize> {
        labels
            .iter()
            .map(|label| self.table.get(label).copied().unwrap_or(0))
            .collect()
    }
}

/// Build the remap that enforces `min_size`.
///
/// Surviving labels are renumbered from 0 in ascending raw order. Members of
/// undersized groups go to the group chosen by `policy`; `points` (one row
/// per labelled item) is only read by `SmallGroupPolicy::NearestCentroid`.
pub fn enforce_min_size(
    labels: &[usize],
    min_size: usize,
    policy: SmallGroupPolicy,
    points: &[Vec<f32>],
) -> LabelRemap {
    // Pass 1: sizes of raw groups
    let sizes = label_sizes(labels);
    if sizes.is_empty() {
        return LabelRemap {
            table: BTreeMap::new(),
            group_count: 0,
            degenerate: false,
        };
    }

    let survivors: Vec<usize> = sizes
        .iter()
        .filter(|(_, &size)| size >= min_size)
        .map(|(&label, _)| label)
        .collect();

    if survivors.is_empty() {
        warn!(
            groups = sizes.len(),
            items = labels.len(),
            min_size,
            "No group meets the minimum size, collapsing into one group"
        );
        return LabelRemap {
            table: sizes.keys().map(|&label| (label, 0)).collect(),
            group_count: 1,
            degenerate: true,
        };
    }

    // Pass 2: raw -> final table
    let mut table: BTreeMap<usize, usize> = survivors
        .iter()
        .enumerate()
        .map(|(new, &old)| (old, new))
        .collect();

    let dissolved: Vec<usize> = sizes
        .keys()
        .copied()
        .filter(|label| !table.contains_key(label))
        .collect();

    match policy {
        SmallGroupPolicy::SmallestLabel => {
            for label in &dissolved {
                table.insert(*label, 0);
            }
        }
        SmallGroupPolicy::NearestCentroid => {
            let survivor_centroids: Vec<Vec<f32>> = survivors
                .iter()
                .map(|&label| label_centroid(labels, label, points))
                .collect();
            for &label in &dissolved {
                let centroid = label_centroid(labels, label, points);
                table.insert(label, nearest(&centroid, &survivor_centroids));
            }
        }
    }

    debug!(
        groups = sizes.len(),
        surviving = survivors.len(),
        dissolved = dissolved.len(),
        ?policy,
        "Enforced minimum group size"
    );

    LabelRemap {
        table,
        group_count: survivors.len(),
        degenerate: false,
    }
}

fn label_centroid(labels: &[usize], label: usize, points: &[Vec<f32>]) -> Vec<f32> {
    let members: Vec<usize> = labels
        .iter()
        .enumerate()
        .filter(|(_, &l)| l == label)
        .map(|(i, _)| i)
        .filter(|&i| i < points.len())
        .collect();
    let mut mean = mean_vector(points, &members);
    normalize(&mut mean);
    mean
}

/// Index of the most similar centroid; ties and empty vectors go to the lowest index.
fn nearest(centroid: &[f32], candidates: &[Vec<f32>]) -> usize {
    let mut best = 0;
    let mut best_sim = f32::NEG_INFINITY;
    for (i, candidate) in candidates.iter().enumerate() {
        let sim = if candidate.len() == centroid.len() {
            dot(centroid, candidate)
        } else {
            f32::NEG_INFINITY
        };
        if sim > best_sim {
            best = i;
            best_sim = sim;
        }
    }
    best
}
