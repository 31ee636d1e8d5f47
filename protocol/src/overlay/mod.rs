//! # Overlay Builder
//!
//! Builds each peer's neighbor set from the authoritative peer list via
//! Zipf-weighted sampling without replacement. Deterministic given the same
//! `(peers, seed)` pair, so tests (and operators comparing runs) get
//! reproducible overlays — grounded on the teacher's own design note
//! calling for a seedable RNG rather than `thread_rng()`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::config::ZIPF_ALPHA;
use crate::identity::NodeId;

/// Neighbor count per spec: `k = min(floor(|P|/2)+1, |P|)`.
pub fn neighbor_count(peer_count: usize) -> usize {
    if peer_count == 0 {
        return 0;
    }
    std::cmp::min(peer_count / 2 + 1, peer_count)
}

/// Selects `k = neighbor_count(|peers|)` distinct neighbors from `peers`
/// (which must already exclude `self`) via Zipf-weighted sampling without
/// replacement, seeded by `seed` for reproducibility.
///
/// Steps, per spec: sort peers into a deterministic order, assign rank
/// weight `w_i = 1/(i+1)^alpha`, normalize to probabilities, then draw `k`
/// distinct indices with renormalization after each draw.
pub fn select_neighbors(peers: &[NodeId], seed: u64) -> Vec<NodeId> {
    if peers.is_empty() {
        return Vec::new();
    }

    let mut sorted: Vec<NodeId> = peers.to_vec();
    sorted.sort_by_key(|n| n.canonical());

    let k = neighbor_count(sorted.len());
    if k >= sorted.len() {
        return sorted;
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let weights: Vec<f64> = (0..sorted.len())
        .map(|i| 1.0 / ((i as f64 + 1.0).powf(ZIPF_ALPHA)))
        .collect();
    let mut remaining: Vec<usize> = (0..sorted.len()).collect();
    let mut chosen = Vec::with_capacity(k);

    for _ in 0..k {
        let total: f64 = remaining.iter().map(|&i| weights[i]).sum();
        let mut draw = rng.gen_range(0.0..total);
        let mut pick_pos = remaining.len() - 1;
        for (pos, &i) in remaining.iter().enumerate() {
            draw -= weights[i];
            if draw <= 0.0 {
                pick_pos = pos;
                break;
            }
        }
        let picked_index = remaining.remove(pick_pos);
        chosen.push(sorted[picked_index].clone());
        // Renormalization happens implicitly: `total` is recomputed from
        // `remaining` on the next draw, which no longer includes the
        // index just removed.
    }

    chosen
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(n: u16) -> Vec<NodeId> {
        (0..n).map(|i| NodeId::new("127.0.0.1", 7000 + i)).collect()
    }

    #[test]
    fn empty_peer_list_yields_empty_neighbors() {
        assert_eq!(select_neighbors(&[], 42), Vec::<NodeId>::new());
        assert_eq!(neighbor_count(0), 0);
    }

    #[test]
    fn single_peer_yields_that_one() {
        let p = peers(1);
        let result = select_neighbors(&p, 42);
        assert_eq!(result, p);
        assert_eq!(neighbor_count(1), 1);
    }

    #[test]
    fn k_greater_than_peer_count_returns_all_sorted() {
        // neighbor_count always satisfies k <= |P|, but exercise the
        // defensive "k >= len" branch by checking a small population
        // directly returns all of it.
        let p = peers(2);
        let mut result = select_neighbors(&p, 1);
        result.sort_by_key(|n| n.canonical());
        let mut expected = p.clone();
        expected.sort_by_key(|n| n.canonical());
        assert_eq!(result, expected);
    }

    #[test]
    fn neighbor_count_matches_formula() {
        assert_eq!(neighbor_count(1), 1);
        assert_eq!(neighbor_count(2), 2);
        assert_eq!(neighbor_count(3), 2);
        assert_eq!(neighbor_count(4), 3);
        assert_eq!(neighbor_count(5), 3);
        assert_eq!(neighbor_count(10), 6);
    }

    #[test]
    fn selection_has_no_duplicates() {
        let p = peers(20);
        let result = select_neighbors(&p, 7);
        let mut unique = result.clone();
        unique.sort_by_key(|n| n.canonical());
        unique.dedup();
        assert_eq!(unique.len(), result.len());
        assert_eq!(result.len(), neighbor_count(20));
    }

    #[test]
    fn selection_is_deterministic_for_same_seed() {
        let p = peers(15);
        let a = select_neighbors(&p, 99);
        let b = select_neighbors(&p, 99);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_can_yield_different_selections() {
        let p = peers(30);
        let a = select_neighbors(&p, 1);
        let b = select_neighbors(&p, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn all_chosen_neighbors_come_from_the_input_set() {
        let p = peers(12);
        let result = select_neighbors(&p, 5);
        for n in &result {
            assert!(p.contains(n));
        }
    }
}
