//! Agglomerative (bottom-up) clustering cut at a fixed cluster count.
//!
//! The full merge tree is built with the nearest-neighbour chain algorithm
//! (O(n²) time and memory), merges are sorted by height, and the lowest
//! `n - k` merges are replayed through a union-find to produce exactly `k`
//! clusters. Ward, average, complete and single linkage are all reducible, so
//! the chain yields the same tree as the naive closest-pair loop. Equal merge
//! heights are ordered by discovery order of the chain; with exact ties the
//! cut can differ from another implementation's.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    /// Minimum increase of within-cluster variance.
    #[default]
    Ward,
    Average,
    Complete,
    Single,
}

/// One merge of the dendrogram: slots `a` and `b` joined at `height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Merge {
    pub a: usize,
    pub b: usize,
    pub height: f64,
}

/// Pairwise distances the linkage recurrences operate on.
fn initial_distances(data: ArrayView2<f64>, linkage: Linkage) -> Array2<f64> {
    let n = data.nrows();
    let mut dist = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in (i + 1)..n {
            let sq: f64 = data
                .row(i)
                .iter()
                .zip(data.row(j).iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum();
            let d = match linkage {
                Linkage::Ward => sq,
                _ => sq.sqrt(),
            };
            dist[[i, j]] = d;
            dist[[j, i]] = d;
        }
    }
    dist
}

/// Lance-Williams update: distance from `i ∪ j` to `m`.
fn updated_distance(
    linkage: Linkage,
    d_im: f64,
    d_jm: f64,
    d_ij: f64,
    n_i: f64,
    n_j: f64,
    n_m: f64,
) -> f64 {
    match linkage {
        Linkage::Single => d_im.min(d_jm),
        Linkage::Complete => d_im.max(d_jm),
        Linkage::Average => (n_i * d_im + n_j * d_jm) / (n_i + n_j),
        Linkage::Ward => {
            ((n_i + n_m) * d_im + (n_j + n_m) * d_jm - n_m * d_ij) / (n_i + n_j + n_m)
        }
    }
}

/// Build all `n - 1` merges of the dendrogram, in discovery order.
pub fn dendrogram(data: ArrayView2<f64>, linkage: Linkage) -> Vec<Merge> {
    let n = data.nrows();
    if n < 2 {
        return Vec::new();
    }
    let mut dist = initial_distances(data, linkage);
    let mut size = vec![1.0f64; n];
    let mut active = vec![true; n];
    let mut merges = Vec::with_capacity(n - 1);
    let mut chain: Vec<usize> = Vec::with_capacity(n);

    while merges.len() < n - 1 {
        if chain.is_empty() {
            if let Some(first) = active.iter().position(|&alive| alive) {
                chain.push(first);
            }
        }
        let (a, b) = loop {
            let Some(&tip) = chain.last() else {
                unreachable!("chain is seeded with an active slot");
            };
            let previous = chain.len().checked_sub(2).map(|idx| chain[idx]);
            // prefer the previous chain element on ties so the chain cannot cycle
            let mut best = previous;
            let mut best_d = previous.map_or(f64::INFINITY, |p| dist[[tip, p]]);
            for m in 0..n {
                if m != tip && active[m] && dist[[tip, m]] < best_d {
                    best = Some(m);
                    best_d = dist[[tip, m]];
                }
            }
            match best {
                Some(next) if Some(next) == previous => break (tip, next),
                Some(next) => chain.push(next),
                None => unreachable!("at least two slots stay active until the tree is done"),
            }
        };
        chain.truncate(chain.len() - 2);

        let (keep, gone) = if a < b { (a, b) } else { (b, a) };
        let d_ab = dist[[keep, gone]];
        for m in 0..n {
            if m == keep || m == gone || !active[m] {
                continue;
            }
            let d = updated_distance(
                linkage,
                dist[[keep, m]],
                dist[[gone, m]],
                d_ab,
                size[keep],
                size[gone],
                size[m],
            );
            dist[[keep, m]] = d;
            dist[[m, keep]] = d;
        }
        size[keep] += size[gone];
        active[gone] = false;
        merges.push(Merge {
            a: keep,
            b: gone,
            height: d_ab,
        });
    }
    merges
}

fn find(parent: &mut [usize], mut x: usize) -> usize {
    while parent[x] != x {
        parent[x] = parent[parent[x]];
        x = parent[x];
    }
    x
}

/// Cluster rows of `data` into exactly `k` groups.
///
/// Ids are numbered by first appearance in row order, so the output is
/// stable for a fixed input.
pub fn agglomerative(data: ArrayView2<f64>, k: usize, linkage: Linkage) -> Result<Vec<usize>> {
    let n = data.nrows();
    if k == 0 {
        return Err(PipelineError::validation("cluster count must be at least 1"));
    }
    if k > n {
        return Err(PipelineError::validation(format!(
            "cluster count {k} exceeds the {n} rows available"
        )));
    }
    if data.iter().any(|v| !v.is_finite()) {
        return Err(PipelineError::validation("embedding matrix contains non-finite values"));
    }

    let mut merges = dendrogram(data, linkage);
    merges.sort_by(|x, y| x.height.total_cmp(&y.height));

    let mut parent: Vec<usize> = (0..n).collect();
    for merge in merges.iter().take(n - k) {
        let ra = find(&mut parent, merge.a);
        let rb = find(&mut parent, merge.b);
        if ra != rb {
            parent[rb] = ra;
        }
    }

    let mut ids: Vec<Option<usize>> = vec![None; n];
    let mut next = 0;
    let mut labels = Vec::with_capacity(n);
    for row in 0..n {
        let root = find(&mut parent, row);
        let id = *ids[root].get_or_insert_with(|| {
            next += 1;
            next - 1
        });
        labels.push(id);
    }
    Ok(labels)
}

/// Cluster a batch where some rows carry no embedding.
///
/// Rows without a vector are left unassigned; the rest receive ids in `0..k`.
pub fn cluster_rows(
    rows: &[Option<Vec<f32>>],
    k: usize,
    linkage: Linkage,
) -> Result<Vec<Option<usize>>> {
    let valid: Vec<(usize, &Vec<f32>)> = rows
        .iter()
        .enumerate()
        .filter_map(|(idx, row)| row.as_ref().map(|v| (idx, v)))
        .collect();
    let dims = valid.first().map_or(0, |(_, v)| v.len());
    if let Some((idx, v)) = valid.iter().find(|(_, v)| v.len() != dims) {
        return Err(PipelineError::validation(format!(
            "row {idx} has {} dimensions, expected {dims}",
            v.len()
        )));
    }

    let mut matrix = Array2::<f64>::zeros((valid.len(), dims));
    for (r, (_, v)) in valid.iter().enumerate() {
        for (c, value) in v.iter().enumerate() {
            matrix[[r, c]] = f64::from(*value);
        }
    }
    let labels = agglomerative(matrix.view(), k, linkage)?;

    let mut out = vec![None; rows.len()];
    for ((idx, _), label) in valid.iter().zip(labels) {
        out[*idx] = Some(label);
    }
    Ok(out)
}
