//! Peer selection for the sync dispatcher (§4.7): `uniform-random` picks any
//! peer but ourselves; `non-recent-random` restricts the pool to peers we
//! have not synced with in the last `N/3` dispatches, falling back to
//! uniform when that pool is empty.

use poset_config::GossipStrategy;
use poset_unit::CreatorId;
use rand::Rng;

pub struct PeerSelector {
    strategy: GossipStrategy,
    self_id: CreatorId,
    n_processes: usize,
    /// Dispatch id at which we last synced with each peer, indexed by
    /// process id.
    last_synced_dispatch: Vec<Option<u64>>,
    /// `N/3`, the recency window for `non-recent-random`.
    recency_threshold: u64,
}

impl PeerSelector {
    pub fn new(strategy: GossipStrategy, n_processes: usize, self_id: CreatorId) -> Self {
        Self {
            strategy,
            self_id,
            n_processes,
            last_synced_dispatch: vec![None; n_processes],
            recency_threshold: (n_processes / 3) as u64,
        }
    }

    /// Picks the peer to dispatch the next outbound sync to, or `None` if
    /// we are the only committee member.
    pub fn choose(&self, dispatch_id: u64, rng: &mut impl Rng) -> Option<CreatorId> {
        match self.strategy {
            GossipStrategy::UniformRandom => self.uniform(rng),
            GossipStrategy::NonRecentRandom => self.non_recent(dispatch_id, rng),
        }
    }

    pub fn record_sync(&mut self, peer: CreatorId, dispatch_id: u64) {
        if let Some(slot) = self.last_synced_dispatch.get_mut(peer as usize) {
            *slot = Some(dispatch_id);
        }
    }

    fn peers(&self) -> impl Iterator<Item = CreatorId> + '_ {
        (0..self.n_processes as CreatorId).filter(move |&p| p != self.self_id)
    }

    fn uniform(&self, rng: &mut impl Rng) -> Option<CreatorId> {
        let candidates: Vec<CreatorId> = self.peers().collect();
        (!candidates.is_empty()).then(|| candidates[rng.gen_range(0..candidates.len())])
    }

    fn non_recent(&self, dispatch_id: u64, rng: &mut impl Rng) -> Option<CreatorId> {
        let candidates: Vec<CreatorId> = self
            .peers()
            .filter(|&p| match self.last_synced_dispatch[p as usize] {
                None => true,
                Some(last) => dispatch_id.saturating_sub(last) > self.recency_threshold,
            })
            .collect();
        if candidates.is_empty() {
            self.uniform(rng)
        } else {
            Some(candidates[rng.gen_range(0..candidates.len())])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn uniform_random_never_picks_self() {
        let selector = PeerSelector::new(GossipStrategy::UniformRandom, 4, 1);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for dispatch_id in 0..50 {
            let peer = selector.choose(dispatch_id, &mut rng).unwrap();
            assert_ne!(peer, 1);
        }
    }

    #[test]
    fn solo_committee_has_no_peers() {
        let selector = PeerSelector::new(GossipStrategy::UniformRandom, 1, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(selector.choose(0, &mut rng).is_none());
    }

    #[test]
    fn non_recent_random_excludes_recently_synced_peers_until_the_window_passes() {
        let mut selector = PeerSelector::new(GossipStrategy::NonRecentRandom, 4, 0);
        // N/3 = 1, so a peer synced at dispatch 5 is excluded at dispatch 6
        // (delta 1, not > 1) but eligible again at dispatch 7 (delta 2).
        selector.record_sync(1, 5);
        selector.record_sync(2, 5);
        selector.record_sync(3, 5);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        // Every peer was just synced with, so the pool falls back to uniform.
        assert!(selector.choose(6, &mut rng).is_some());

        selector.record_sync(2, 6);
        selector.record_sync(3, 6);
        // Peer 1 (last synced at 5) is the only one outside the window at
        // dispatch 7; the non-recent pool must pick it.
        let peer = selector.choose(7, &mut rng).unwrap();
        assert_eq!(peer, 1);
    }
}
