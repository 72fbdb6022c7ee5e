//! Timing-unit election and linear order extension (§4.5): for each level at
//! or above `voting_start_level`, a deterministic voting procedure over prime
//! units elects one candidate as that level's timing unit; once elected, the
//! units below it that are not yet ordered are appended to `linear_order`
//! under a documented deterministic tie-break.

mod election;
mod node;
mod tie_break;

pub use election::{CoinStartDelta, OrderingConfig, OrderingOutcome, TimingEngine};
pub use node::OrderedPoset;

#[cfg(test)]
mod tests {
    use super::*;
    use poset_crypto::{Crp, FixedCommitteeCoin, SecretKey};
    use poset_dag::Poset;
    use poset_unit::Unit;
    use std::str::FromStr;

    fn committee(n: u16) -> Vec<SecretKey> {
        (0..n).map(|i| SecretKey::from_str(&hex::encode([i as u8; 32])).unwrap()).collect()
    }

    /// §8 scenario 3: N=4, n_correct=3. Four dealing units, then each of the
    /// four creators builds one unit parented by all four dealing units —
    /// every such unit is prime at level 1 and `level_reached` becomes 1.
    #[test]
    fn level_advances_to_one_once_n_correct_primes_are_visible() {
        let keys = committee(4);
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        let mut poset = Poset::new(public_keys, false, 0);

        let mut dealing = Vec::new();
        for (c, k) in keys.iter().enumerate() {
            let u = Unit::dealing(c as u16, k);
            dealing.push(u.hash());
            poset.add(u).unwrap();
        }

        for (c, k) in keys.iter().enumerate() {
            let mut parents = vec![dealing[c]];
            parents.extend(dealing.iter().copied().enumerate().filter(|&(i, _)| i != c).map(|(_, h)| h));
            let unit = Unit::sign(c as u16, parents, vec![], None, k);
            assert!(poset.get(&unit.hash()).is_none());
            poset.add(unit).unwrap();
        }

        assert_eq!(poset.level_reached(), 1);
        for (c, &d) in dealing.iter().enumerate() {
            let _ = d;
            assert!(poset.prime_units_by_level(1).len() <= 4);
            let _ = c;
        }
    }

    /// A minimal smoke test that the engine does not decide a level-3 timing
    /// unit before any level-3 prime units even exist.
    #[test]
    fn no_decision_before_candidates_exist() {
        let keys = committee(4);
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        let poset = Poset::new(public_keys.clone(), false, 0);
        let crp = Crp::new(public_keys);
        let coin = FixedCommitteeCoin;
        let mut engine = TimingEngine::new(OrderingConfig::default(), crp);
        let outcome = engine.on_unit_added(&poset, &coin);
        assert!(outcome.newly_ordered.is_empty());
        assert!(outcome.new_timing_units.is_empty());
    }
}
