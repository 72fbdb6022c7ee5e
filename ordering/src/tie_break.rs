//! The documented instance of §4.5's "any deterministic scheme" tie-break:
//! round-from-`T` (minimum parent-hop count), then a per-level, per-`T`
//! creator permutation, then height, then unit hash.

use poset_dag::Poset;
use poset_hashes::{Hash, HasherBase, TieBreakNonceHash};
use poset_unit::{CreatorId, UnitId};
use std::collections::{HashMap, VecDeque};

/// Minimum number of parent hops from `t` to every ancestor of `t`
/// (including `t` itself, at distance 0). This is exactly the set
/// `below(_, t)`, computed once by a backward BFS instead of calling
/// `below` per candidate.
pub(crate) fn rounds_from(poset: &Poset, t: UnitId) -> HashMap<UnitId, u64> {
    let mut dist = HashMap::new();
    dist.insert(t, 0u64);
    let mut queue = VecDeque::from([t]);
    while let Some(u) = queue.pop_front() {
        let d = dist[&u];
        let Some(indexed) = poset.get(&u) else { continue };
        for &parent in indexed.unit.parents() {
            let better = dist.get(&parent).is_none_or(|&existing| existing > d + 1);
            if better {
                dist.insert(parent, d + 1);
                queue.push_back(parent);
            }
        }
    }
    dist
}

/// A pseudo-random permutation of `0..n_processes`, freshly derived per
/// `(level, t)` pair so no two timing decisions share a tie-break order.
pub(crate) fn creator_permutation(n_processes: usize, level: u64, t: UnitId) -> Vec<usize> {
    let mut ranked: Vec<(Hash, usize)> = (0..n_processes)
        .map(|c| {
            let mut hasher = TieBreakNonceHash::default();
            hasher.update(level.to_be_bytes());
            hasher.update(t.as_bytes());
            hasher.update((c as u16).to_be_bytes());
            (hasher.finalize(), c)
        })
        .collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.into_iter().map(|(_, c)| c).collect()
}

fn perm_rank(perm: &[usize], creator: CreatorId) -> usize {
    perm.iter().position(|&c| c == creator as usize).expect("creator is within committee range")
}

/// Sorts `pending` (units below `t` not yet linearly ordered) into the
/// deterministic order documented in §4.5 and appends their hashes to the
/// caller's linear order.
pub(crate) fn break_ties(poset: &Poset, level: u64, t: UnitId, mut pending: Vec<UnitId>) -> Vec<UnitId> {
    let dist = rounds_from(poset, t);
    let perm = creator_permutation(poset.n_processes(), level, t);

    pending.sort_by(|&a, &b| {
        let ia = poset.get(&a).expect("pending unit is in the poset");
        let ib = poset.get(&b).expect("pending unit is in the poset");
        let key_a = (dist.get(&a).copied().unwrap_or(u64::MAX), perm_rank(&perm, ia.unit.creator()), ia.height, *a.as_bytes());
        let key_b = (dist.get(&b).copied().unwrap_or(u64::MAX), perm_rank(&perm, ib.unit.creator()), ib.height, *b.as_bytes());
        key_a.cmp(&key_b)
    });
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use poset_crypto::SecretKey;
    use poset_unit::Unit;
    use std::str::FromStr;

    #[test]
    fn tie_break_is_deterministic_across_runs() {
        let keys: Vec<_> = (0..4u8).map(|i| SecretKey::from_str(&hex::encode([i; 32])).unwrap()).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        let mut poset = Poset::new(public_keys, false, 0);
        let mut dealing = Vec::new();
        for (c, k) in keys.iter().enumerate() {
            let u = Unit::dealing(c as u16, k);
            dealing.push(u.hash());
            poset.add(u).unwrap();
        }
        let t = dealing[0];
        let pending = dealing.clone();
        let a = break_ties(&poset, 0, t, pending.clone());
        let b = break_ties(&poset, 0, t, pending);
        assert_eq!(a, b);
    }

    #[test]
    fn rounds_from_self_is_zero() {
        let keys: Vec<_> = (0..4u8).map(|i| SecretKey::from_str(&hex::encode([i; 32])).unwrap()).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        let mut poset = Poset::new(public_keys, false, 0);
        let u = Unit::dealing(0, &keys[0]);
        let id = u.hash();
        poset.add(u).unwrap();
        let dist = rounds_from(&poset, id);
        assert_eq!(dist[&id], 0);
    }
}
