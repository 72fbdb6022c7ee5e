use crate::PublicKey;
use poset_hashes::{CrpSeedHash, Hash, Hasher, HasherBase};

/// Common Random Permutation: a deterministic per-level ordering of
/// creator ids, agreed by every correct node because it depends only on
/// `level` and the committee's public keys, never on local state.
pub struct Crp {
    public_keys: Vec<PublicKey>,
}

impl Crp {
    pub fn new(public_keys: Vec<PublicKey>) -> Self {
        Self { public_keys }
    }

    /// Permutation of `0..n_processes` for the given level. `sigma(level, _)`
    /// is the inverse view: `order[i]` is the creator id ranked `i`-th.
    pub fn order(&self, level: u64) -> Vec<usize> {
        let mut ranked: Vec<(Hash, usize)> = self
            .public_keys
            .iter()
            .enumerate()
            .map(|(pid, pk)| {
                let mut hasher = CrpSeedHash::default();
                hasher.update(level.to_be_bytes());
                hasher.update(pk.as_bytes());
                (hasher.finalize(), pid)
            })
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        ranked.into_iter().map(|(_, pid)| pid).collect()
    }

    /// `sigma(level, pid)`: the rank of `pid` within the level's permutation.
    pub fn sigma(&self, level: u64, pid: usize) -> usize {
        self.order(level).iter().position(|&p| p == pid).expect("pid is within committee range")
    }
}
