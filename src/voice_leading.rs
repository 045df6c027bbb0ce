//! Assignment-cost voice-leading distance (indicator m, §4.6).
//!
//! The cost matrix mixes circular pitch-class distance with the TIS
//! distance between singleton chromas, then solves a minimum-cost
//! perfect assignment. Three solver strategies are conformant per §9;
//! this module picks brute-force permutation for small `n` and falls
//! back to a greedy nearest-cost matching above that, matching within
//! floating-point tolerance on any fixture where the assignment is
//! unique.

use crate::chroma::CHROMA_LEN;
use crate::tis::{chroma_bits_to_tis, euclidean_distance, tis_norm, DEFAULT_WEIGHTS};

/// Above this row count the brute-force permutation solver is replaced
/// by the greedy fallback (§9: brute force is conformant for `n <= 8`).
const BRUTE_FORCE_LIMIT: usize = 8;

/// Default padding multiplier for unmatched voices when `|A| != |B|`.
pub const DEFAULT_ADDITION_PENALTY: f64 = 4.0;

fn pitch_classes(bits: &[u8]) -> Vec<usize> {
    bits.iter()
        .enumerate()
        .filter(|&(_, &b)| b == 1)
        .map(|(i, _)| i)
        .collect()
}

fn circular_distance(a: usize, b: usize) -> f64 {
    let diff = (a as i64 - b as i64).unsigned_abs() as usize;
    diff.min(CHROMA_LEN - diff) as f64
}

fn singleton_tis_norm() -> f64 {
    let mut bits = [0u8; CHROMA_LEN];
    bits[0] = 1;
    let t = chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).expect("singleton chroma is valid");
    tis_norm(&t)
}

fn singleton_tis_distance(a: usize, b: usize) -> f64 {
    let mut bits_a = [0u8; CHROMA_LEN];
    bits_a[a] = 1;
    let mut bits_b = [0u8; CHROMA_LEN];
    bits_b[b] = 1;
    let ta = chroma_bits_to_tis(&bits_a, &DEFAULT_WEIGHTS).expect("singleton chroma is valid");
    let tb = chroma_bits_to_tis(&bits_b, &DEFAULT_WEIGHTS).expect("singleton chroma is valid");
    euclidean_distance(&ta, &tb)
}

/// Build the `n x n` cost matrix of §4.6 step 3, where `n = max(|A|, |B|)`.
fn build_cost_matrix(a: &[usize], b: &[usize], addition_penalty: f64) -> Vec<Vec<f64>> {
    let n = a.len().max(b.len());
    let pad_cost = addition_penalty * singleton_tis_norm();
    let mut cost = vec![vec![pad_cost; n]; n];
    for (i, &pa) in a.iter().enumerate() {
        for (j, &pb) in b.iter().enumerate() {
            cost[i][j] = circular_distance(pa, pb) * singleton_tis_distance(pa, pb);
        }
    }
    cost
}

/// Exact minimum-cost assignment by trying every permutation of columns.
fn solve_brute_force(cost: &[Vec<f64>]) -> Vec<f64> {
    let n = cost.len();
    let mut perm: Vec<usize> = (0..n).collect();
    let mut best_total = f64::INFINITY;
    let mut best: Vec<f64> = perm.iter().map(|&j| cost[0][j]).collect();

    permute(&mut perm, 0, &mut |p| {
        let total: f64 = p.iter().enumerate().map(|(i, &j)| cost[i][j]).sum();
        if total < best_total {
            best_total = total;
            best = p.iter().enumerate().map(|(i, &j)| cost[i][j]).collect();
        }
    });
    best
}

fn permute(perm: &mut [usize], k: usize, visit: &mut impl FnMut(&[usize])) {
    if k == perm.len() {
        visit(perm);
        return;
    }
    for i in k..perm.len() {
        perm.swap(k, i);
        permute(perm, k + 1, visit);
        perm.swap(k, i);
    }
}

/// Greedy nearest-cost matching: repeatedly pick the globally cheapest
/// unmatched (row, col) pair. `O(n^2 log n)` per §9.
fn solve_greedy(cost: &[Vec<f64>]) -> Vec<f64> {
    let n = cost.len();
    let mut candidates: Vec<(f64, usize, usize)> = Vec::with_capacity(n * n);
    for (i, row) in cost.iter().enumerate() {
        for (j, &c) in row.iter().enumerate() {
            candidates.push((c, i, j));
        }
    }
    candidates.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut row_used = vec![false; n];
    let mut col_used = vec![false; n];
    let mut chosen = vec![0.0; n];
    let mut filled = 0;

    for (c, i, j) in candidates {
        if filled == n {
            break;
        }
        if row_used[i] || col_used[j] {
            continue;
        }
        row_used[i] = true;
        col_used[j] = true;
        chosen[i] = c;
        filled += 1;
    }
    chosen
}

/// Solve the assignment and return the `n` chosen per-row costs.
fn solve_assignment(cost: &[Vec<f64>]) -> Vec<f64> {
    if cost.len() <= BRUTE_FORCE_LIMIT {
        solve_brute_force(cost)
    } else {
        solve_greedy(cost)
    }
}

/// Voice-leading tension `m` between two chroma sets (§4.6). `0` if
/// either chroma is empty.
pub fn voice_leading_tension(bits_a: &[u8], bits_b: &[u8], addition_penalty: f64) -> f64 {
    let a = pitch_classes(bits_a);
    let b = pitch_classes(bits_b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let cost = build_cost_matrix(&a, &b, addition_penalty);
    let chosen = solve_assignment(&cost);
    let stability: f64 = chosen.iter().map(|&c| (-0.05 * c).exp()).sum();
    -stability
}
