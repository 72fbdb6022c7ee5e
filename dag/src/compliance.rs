use crate::error::{ComplianceError, CryptoError, PosetError};
use crate::index::{Poset, PreparedUnit};
use poset_unit::{CreatorId, Unit, UnitId};
use std::collections::HashSet;

/// Validates `unit` against every rule in this order: signature, parent
/// presence, distinct parent creators, self-predecessor, expand-primes,
/// forker-muting, threshold-coin share. Returns the unit's derived
/// attributes on success so the caller does not have to recompute them.
pub fn check(poset: &Poset, unit: &Unit, id: UnitId) -> Result<PreparedUnit, PosetError> {
    check_signature(poset, unit, id)?;
    check_parent_presence(poset, unit, id)?;
    check_distinct_parent_creators(poset, unit, id)?;
    check_self_predecessor(poset, unit, id)?;

    let prepared = poset.prepare(unit);

    check_expand_primes(poset, unit, id, &prepared)?;
    check_forker_muting(poset, unit, id)?;
    check_coin_share(poset, unit, id, &prepared)?;

    Ok(prepared)
}

fn check_signature(poset: &Poset, unit: &Unit, id: UnitId) -> Result<(), CryptoError> {
    let public_key = poset.public_key(unit.creator()).ok_or(CryptoError::UnknownCreator(unit.creator()))?;
    unit.verify_signature(public_key).map_err(|_| CryptoError::BadSignature(id))
}

fn check_parent_presence(poset: &Poset, unit: &Unit, id: UnitId) -> Result<(), ComplianceError> {
    for &parent in unit.parents() {
        if !poset.contains(&parent) {
            return Err(ComplianceError::ParentMissing { unit: id, parent });
        }
    }
    Ok(())
}

fn check_distinct_parent_creators(poset: &Poset, unit: &Unit, id: UnitId) -> Result<(), ComplianceError> {
    let mut seen = HashSet::new();
    for &parent in unit.parents() {
        let creator = poset.get(&parent).expect("presence checked above").unit.creator();
        if !seen.insert(creator) {
            return Err(ComplianceError::DuplicateParentCreator { unit: id, creator });
        }
    }
    Ok(())
}

fn check_self_predecessor(poset: &Poset, unit: &Unit, id: UnitId) -> Result<(), ComplianceError> {
    if unit.is_dealing() {
        return Ok(());
    }
    let first_parent = unit.parents()[0];
    let predecessor = poset.get(&first_parent).expect("presence checked above");
    if predecessor.unit.creator() != unit.creator() {
        return Err(ComplianceError::MissingSelfPredecessor {
            unit: id,
            creator: unit.creator(),
            height: predecessor.height.wrapping_add(1),
        });
    }
    // The first parent must currently be (or have been, for an
    // already-known forker) a maximal tip of this creator: it is the chain
    // position this unit extends.
    let tips = poset.maximal_units_per_process(unit.creator());
    if !tips.contains(&first_parent) && !poset.is_forker(unit.creator()) {
        return Err(ComplianceError::MissingSelfPredecessor { unit: id, creator: unit.creator(), height: predecessor.height + 1 });
    }
    Ok(())
}

/// Walking the parent list, each subsequent parent must introduce at least
/// one new visible prime unit at the running max parent level; switching to
/// a strictly higher parent level resets the visible set.
fn check_expand_primes(poset: &Poset, unit: &Unit, id: UnitId, prepared: &PreparedUnit) -> Result<(), ComplianceError> {
    let parents = unit.parents();
    if parents.len() <= 1 {
        return Ok(());
    }

    let mut running_level = poset.get(&parents[0]).expect("presence checked").level;
    let mut running_floor = poset.get(&parents[0]).expect("presence checked").floor.clone();
    let mut visible: HashSet<UnitId> = visible_primes_at(poset, running_level, &running_floor);

    for (index, &parent) in parents.iter().enumerate().skip(1) {
        let parent_unit = poset.get(&parent).expect("presence checked");
        if parent_unit.level > running_level {
            running_level = parent_unit.level;
            running_floor = parent_unit.floor.clone();
            visible = visible_primes_at(poset, running_level, &running_floor);
            if visible.is_empty() && !poset.prime_units_by_level(running_level).is_empty() {
                return Err(ComplianceError::ExpandPrimesViolation { unit: id, parent_index: index });
            }
            continue;
        }
        if parent_unit.level < running_level {
            return Err(ComplianceError::ExpandPrimesViolation { unit: id, parent_index: index });
        }
        // Same level: merge this parent's floor in and require it to have
        // contributed at least one previously-unseen prime at this level.
        let merged_floor = merge_floors(poset, &running_floor, &parent_unit.floor);
        let newly_visible = visible_primes_at(poset, running_level, &merged_floor);
        if newly_visible.difference(&visible).next().is_none() {
            return Err(ComplianceError::ExpandPrimesViolation { unit: id, parent_index: index });
        }
        visible = newly_visible;
        running_floor = merged_floor;
    }

    let _ = prepared;
    Ok(())
}

fn visible_primes_at(poset: &Poset, level: u64, floor: &[Vec<UnitId>]) -> HashSet<UnitId> {
    poset
        .prime_units_by_level(level)
        .iter()
        .copied()
        .filter(|&prime_id| {
            let creator = poset.get(&prime_id).expect("prime units are indexed").unit.creator();
            poset.is_ancestor_via_floor(prime_id, creator, floor)
        })
        .collect()
}

fn merge_floors(poset: &Poset, a: &[Vec<UnitId>], b: &[Vec<UnitId>]) -> Vec<Vec<UnitId>> {
    let n = a.len();
    let mut merged = vec![Vec::new(); n];
    for c in 0..n {
        let mut combined: Vec<UnitId> = a[c].iter().chain(b[c].iter()).copied().collect();
        combined.sort_by_key(|id| *id.as_bytes());
        combined.dedup();
        let maxima: Vec<UnitId> =
            combined.iter().copied().filter(|&x| !combined.iter().any(|&y| y != x && poset.below(x, y))).collect();
        merged[c] = maxima;
    }
    merged
}

/// A parent's creator is muted if the unit's own parents collectively carry
/// evidence (more than one maximal floor entry) that creator is a forker.
fn check_forker_muting(poset: &Poset, unit: &Unit, id: UnitId) -> Result<(), ComplianceError> {
    let mut combined = vec![Vec::new(); poset.n_processes()];
    for &parent in unit.parents() {
        let parent_unit = poset.get(&parent).expect("presence checked above");
        for (c, bucket) in parent_unit.floor.iter().enumerate() {
            combined[c].extend(bucket.iter().copied());
        }
    }
    let muted: HashSet<CreatorId> = combined
        .into_iter()
        .enumerate()
        .filter_map(|(c, bucket)| {
            let mut distinct = bucket;
            distinct.sort_by_key(|id| *id.as_bytes());
            distinct.dedup();
            (distinct.len() > 1).then_some(c as CreatorId)
        })
        .collect();

    for &parent in unit.parents() {
        let creator = poset.get(&parent).expect("presence checked above").unit.creator();
        if muted.contains(&creator) {
            return Err(ComplianceError::ForkerMuted { unit: id, parent, creator });
        }
    }
    Ok(())
}

fn check_coin_share(poset: &Poset, unit: &Unit, id: UnitId, prepared: &PreparedUnit) -> Result<(), ComplianceError> {
    if !poset.use_tcoin_required(prepared.level, prepared.is_prime) {
        return Ok(());
    }
    match unit.coin_share() {
        Some(share) if !share.0.is_empty() => Ok(()),
        _ => Err(ComplianceError::MissingCoinShare { unit: id, level: prepared.level }),
    }
}

/// Incremental mirror of [`check_expand_primes`], driven one candidate
/// parent at a time so a parent-selection search can test "would adding
/// this parent still expand the visible prime set" without re-assembling a
/// full parent list for every candidate. `poset-creator` is the only
/// consumer: it seeds a state from the forced self-predecessor parent, then
/// greedily calls `try_add` over the other maximal tips.
pub struct ExpandPrimesState {
    level: u64,
    floor: Vec<Vec<UnitId>>,
    visible: HashSet<UnitId>,
}

impl ExpandPrimesState {
    /// Seeds the state from the first parent, which is never itself subject
    /// to the expand-primes rule.
    pub fn start(poset: &Poset, first_parent: UnitId) -> Self {
        let first = poset.get(&first_parent).expect("first parent must already be indexed");
        let level = first.level;
        let floor = first.floor.clone();
        let visible = visible_primes_at(poset, level, &floor);
        Self { level, floor, visible }
    }

    /// Tests whether adding `candidate` as the next parent would still
    /// satisfy the expand-primes rule. If it does, the state is advanced to
    /// include `candidate`'s contribution and `true` is returned; otherwise
    /// the state is left untouched and `false` is returned, leaving the
    /// caller free to try a different candidate.
    pub fn try_add(&mut self, poset: &Poset, candidate: UnitId) -> bool {
        let candidate_unit = poset.get(&candidate).expect("candidate must already be indexed");

        if candidate_unit.level > self.level {
            let visible = visible_primes_at(poset, candidate_unit.level, &candidate_unit.floor);
            if visible.is_empty() && !poset.prime_units_by_level(candidate_unit.level).is_empty() {
                return false;
            }
            self.level = candidate_unit.level;
            self.floor = candidate_unit.floor.clone();
            self.visible = visible;
            return true;
        }
        if candidate_unit.level < self.level {
            return false;
        }

        let merged_floor = merge_floors(poset, &self.floor, &candidate_unit.floor);
        let newly_visible = visible_primes_at(poset, self.level, &merged_floor);
        if newly_visible.difference(&self.visible).next().is_none() {
            return false;
        }
        self.floor = merged_floor;
        self.visible = newly_visible;
        true
    }

    pub fn level(&self) -> u64 {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poset_crypto::SecretKey;

    fn secret_key(byte: u8) -> SecretKey {
        hex::encode([byte; 32]).parse().unwrap()
    }

    #[test]
    fn expand_primes_state_matches_full_check_on_a_simple_fan_in() {
        // Four dealing units, then a fifth unit from creator 0 taking all
        // four as parents (self-predecessor first). The full check accepts
        // it; driving ExpandPrimesState one candidate at a time over the
        // remaining three tips should agree parent-by-parent.
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        let mut dealing_ids = Vec::new();
        for (creator, key) in keys.iter().enumerate() {
            let unit = Unit::dealing(creator as CreatorId, key);
            let id = unit.hash();
            poset.add(unit).unwrap();
            dealing_ids.push(id);
        }

        let mut state = ExpandPrimesState::start(&poset, dealing_ids[0]);
        for &tip in &dealing_ids[1..] {
            assert!(state.try_add(&poset, tip));
        }

        let unit = Unit::sign(0, dealing_ids.clone(), vec![], None, &keys[0]);
        assert!(poset.add(unit).is_ok());
    }
}
