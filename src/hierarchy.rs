//! Hierarchical reduction tree (indicator h, §4.7).
//!
//! The tree is built over an arena of nodes addressed by index rather
//! than `Rc`/`RefCell`, since every node needs a parent pointer and the
//! merge rules only ever attach children downward.

use crate::key::Function;
use crate::tis::{euclidean_distance, TisVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Tonic,
    Subdominant,
    Dominant,
    Root,
}

impl Label {
    fn from_function(f: Function) -> Self {
        match f {
            Function::Tonic => Label::Tonic,
            Function::Subdominant => Label::Subdominant,
            Function::Dominant => Label::Dominant,
        }
    }

    fn function(self) -> Option<Function> {
        match self {
            Label::Tonic => Some(Function::Tonic),
            Label::Subdominant => Some(Function::Subdominant),
            Label::Dominant => Some(Function::Dominant),
            Label::Root => None,
        }
    }
}

struct Node {
    label: Label,
    /// Leaf index this node's head resolves to.
    head_pos: usize,
    /// `d2` of the leaf at `head_pos`, carried up for fallback-merge tiebreaks.
    head_d2: f64,
    parent: Option<usize>,
}

/// Arena-backed reduction tree. Leaves occupy indices `0..n` in
/// left-to-right progression order; every later index is an internal
/// node.
struct Arena {
    nodes: Vec<Node>,
}

impl Arena {
    fn push(&mut self, label: Label, head_pos: usize, head_d2: f64) -> usize {
        self.nodes.push(Node {
            label,
            head_pos,
            head_d2,
            parent: None,
        });
        self.nodes.len() - 1
    }

    fn merge(&mut self, left: usize, right: usize, label: Label, head_pos: usize) -> usize {
        let head_d2 = self.nodes[if head_pos == self.nodes[left].head_pos {
            left
        } else {
            right
        }]
        .head_d2;
        let idx = self.push(label, head_pos, head_d2);
        self.nodes[left].parent = Some(idx);
        self.nodes[right].parent = Some(idx);
        idx
    }
}

/// First adjacent pair that matches one of §4.7's three production
/// rules, scanning left to right.
fn find_production_match(arena: &Arena, live: &[usize]) -> Option<(usize, Label, usize)> {
    for w in live.windows(2) {
        let (l, r) = (w[0], w[1]);
        let (lf, rf) = (arena.nodes[l].label.function(), arena.nodes[r].label.function());
        match (lf, rf) {
            (Some(Function::Subdominant), Some(Function::Dominant)) => {
                return Some((l, Label::Dominant, arena.nodes[r].head_pos));
            }
            (Some(Function::Dominant), Some(Function::Tonic)) => {
                return Some((l, Label::Tonic, arena.nodes[r].head_pos));
            }
            (Some(Function::Tonic), Some(Function::Dominant)) => {
                return Some((l, Label::Tonic, arena.nodes[l].head_pos));
            }
            _ => {}
        }
    }
    None
}

fn position_of(live: &[usize], idx: usize) -> usize {
    live.iter().position(|&x| x == idx).expect("idx is live")
}

/// Higher-priority head per §4.7's fallback rule: lower `Function::priority()`
/// wins, ties broken by lower `d2`. Root nodes carry no function of their
/// own, so their priority is derived from the leaf at `head_pos` and is
/// frozen at merge time (the open question in §9 resolved this way: a
/// once-established head's priority/d2 travel with it through further
/// merges).
fn higher_priority_head(arena: &Arena, a: usize, b: usize, leaf_functions: &[Function]) -> usize {
    let fa = leaf_functions[arena.nodes[a].head_pos];
    let fb = leaf_functions[arena.nodes[b].head_pos];
    match fa.priority().cmp(&fb.priority()) {
        std::cmp::Ordering::Less => a,
        std::cmp::Ordering::Greater => b,
        std::cmp::Ordering::Equal => {
            if arena.nodes[a].head_d2 <= arena.nodes[b].head_d2 {
                a
            } else {
                b
            }
        }
    }
}

/// Build the reduction tree over a sequence of per-chord function labels
/// and `d2` values (one per progression position, candidate last).
/// Returns the arena and the root's index.
fn build_tree(functions: &[Function], d2: &[f64]) -> (Arena, usize) {
    let n = functions.len();
    let mut arena = Arena { nodes: Vec::with_capacity(2 * n) };
    let mut live: Vec<usize> = (0..n)
        .map(|i| arena.push(Label::from_function(functions[i]), i, d2[i]))
        .collect();

    while live.len() > 1 {
        if let Some((left_idx, new_label, head_pos)) = find_production_match(&arena, &live) {
            let pos = position_of(&live, left_idx);
            let (l, r) = (live[pos], live[pos + 1]);
            let merged = arena.merge(l, r, new_label, head_pos);
            live.splice(pos..=pos + 1, [merged]);
            continue;
        }

        let (l, r) = (live[0], live[1]);
        let head = higher_priority_head(&arena, l, r, functions);
        let head_pos = arena.nodes[head].head_pos;
        let merged = arena.merge(l, r, Label::Root, head_pos);
        live.splice(0..=1, [merged]);
    }

    (arena, live[0])
}

/// Walk parent pointers from the last leaf, collecting each strictly-new
/// parent `head_pos` that differs from `n - 1`, deduplicated consecutively.
fn collect_head_positions(arena: &Arena, last_leaf: usize, n: usize) -> Vec<usize> {
    let mut heads = Vec::new();
    let mut cur = arena.nodes[last_leaf].parent;
    while let Some(idx) = cur {
        let head_pos = arena.nodes[idx].head_pos;
        if head_pos != n - 1 && heads.last() != Some(&head_pos) {
            heads.push(head_pos);
        }
        cur = arena.nodes[idx].parent;
    }
    heads
}

/// Compute indicator `h` for a progression ending in the candidate.
/// `tis`, `functions`, and `d2` are parallel per-position arrays; `h` is
/// zero when the progression has fewer than two positions.
pub fn hierarchical_tension(tis: &[TisVector], functions: &[Function], d2: &[f64]) -> f64 {
    let n = tis.len();
    if n < 2 {
        return 0.0;
    }
    let (arena, _root) = build_tree(functions, d2);
    let last_leaf = n - 1;
    let heads = collect_head_positions(&arena, last_leaf, n);
    if heads.is_empty() {
        return 0.0;
    }
    let candidate = &tis[n - 1];
    let sum: f64 = heads.iter().map(|&pos| euclidean_distance(candidate, &tis[pos])).sum();
    sum / heads.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tis::{chroma_bits_to_tis, DEFAULT_WEIGHTS};
    use crate::chroma::CHROMA_LEN;

    fn triad(pcs: &[usize]) -> TisVector {
        let mut bits = [0u8; CHROMA_LEN];
        for &pc in pcs {
            bits[pc] = 1;
        }
        chroma_bits_to_tis(&bits, &DEFAULT_WEIGHTS).unwrap()
    }

    #[test]
    fn short_progression_is_zero() {
        let tis = vec![triad(&[0, 4, 7])];
        let functions = vec![Function::Tonic];
        let d2 = vec![0.0];
        assert_eq!(hierarchical_tension(&tis, &functions, &d2), 0.0);
    }

    #[test]
    fn dominant_resolution_picks_up_the_tonic_head() {
        // C(t) F(s) G7(d) C(t): S D -> D(head=D), then D T -> T(head=T, last leaf).
        let tis = vec![
            triad(&[0, 4, 7]),
            triad(&[5, 9, 0]),
            triad(&[7, 11, 2, 5]),
            triad(&[0, 4, 7]),
        ];
        let functions = vec![
            Function::Tonic,
            Function::Subdominant,
            Function::Dominant,
            Function::Tonic,
        ];
        let d2 = vec![0.0, 0.2, 0.3, 0.0];
        let h = hierarchical_tension(&tis, &functions, &d2);
        assert!(h.is_finite());
        assert!(h >= 0.0);
    }

    #[test]
    fn tonic_prolongation_keeps_left_head() {
        // T D, no S present: rule 3 fires, head stays at the left tonic.
        let tis = vec![triad(&[0, 4, 7]), triad(&[7, 11, 2, 5])];
        let functions = vec![Function::Tonic, Function::Dominant];
        let d2 = vec![0.0, 0.3];
        let h = hierarchical_tension(&tis, &functions, &d2);
        // head_pos for the single merge is leaf 0, which != n-1=1, so H = [0].
        let expected = euclidean_distance(&tis[1], &tis[0]);
        assert!((h - expected).abs() < 1e-9);
    }
}
