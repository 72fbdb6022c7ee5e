use crate::compliance;
use crate::error::PosetError;
use poset_crypto::PublicKey;
use poset_unit::{CreatorId, Unit, UnitId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// A unit together with the attributes derived when it was inserted.
#[derive(Clone, Debug)]
pub struct IndexedUnit {
    pub unit: Unit,
    pub id: UnitId,
    pub height: u64,
    pub level: u64,
    /// Per-creator list of maximal units of that creator below this one.
    /// Size 0 or 1 for a non-forking creator; possibly larger for a forker.
    pub floor: Vec<Vec<UnitId>>,
    pub is_prime: bool,
}

/// Derived attributes computed for a candidate unit before it is committed
/// to the index. Computing these once and handing them to both the
/// compliance checker and `Poset::add` avoids doing the work twice.
pub struct PreparedUnit {
    pub height: u64,
    pub level: u64,
    pub floor: Vec<Vec<UnitId>>,
    pub is_prime: bool,
}

pub enum AddOutcome {
    Inserted(UnitId),
    AlreadyPresent,
}

/// The local DAG index: units, per-process chains, maximal tips, the
/// prime-unit index by level, and the forker set.
pub struct Poset {
    pub(crate) n_processes: usize,
    pub(crate) public_keys: Vec<PublicKey>,
    pub(crate) use_tcoin: bool,
    pub(crate) threshold_start_level: u64,
    pub(crate) units: HashMap<UnitId, IndexedUnit>,
    /// creator -> height -> unit ids at that height (more than one entry
    /// marks that creator as a forker at that height).
    chains: Vec<BTreeMap<u64, Vec<UnitId>>>,
    maximal: Vec<Vec<UnitId>>,
    prime_by_level: BTreeMap<u64, Vec<UnitId>>,
    forkers: HashSet<CreatorId>,
    level_reached: u64,
}

impl Poset {
    pub fn new(public_keys: Vec<PublicKey>, use_tcoin: bool, threshold_start_level: u64) -> Self {
        let n_processes = public_keys.len();
        Self {
            n_processes,
            public_keys,
            use_tcoin,
            threshold_start_level,
            units: HashMap::new(),
            chains: vec![BTreeMap::new(); n_processes],
            maximal: vec![Vec::new(); n_processes],
            prime_by_level: BTreeMap::new(),
            forkers: HashSet::new(),
            level_reached: 0,
        }
    }

    pub fn n_processes(&self) -> usize {
        self.n_processes
    }

    /// `n_correct = N - f` where `f = (N-1)/3`.
    pub fn n_correct(&self) -> usize {
        self.n_processes - (self.n_processes.saturating_sub(1)) / 3
    }

    pub fn public_key(&self, creator: CreatorId) -> Option<&PublicKey> {
        self.public_keys.get(creator as usize)
    }

    pub fn level_reached(&self) -> u64 {
        self.level_reached
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.units.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// All stored units, in no particular order. Used by the debug dump
    /// (§6) and by tests that want to sweep the whole poset.
    pub fn iter(&self) -> impl Iterator<Item = &IndexedUnit> {
        self.units.values()
    }

    pub fn get(&self, id: &UnitId) -> Option<&IndexedUnit> {
        self.units.get(id)
    }

    pub fn forkers(&self) -> &HashSet<CreatorId> {
        &self.forkers
    }

    pub fn is_forker(&self, creator: CreatorId) -> bool {
        self.forkers.contains(&creator)
    }

    pub fn maximal_units_per_process(&self, creator: CreatorId) -> &[UnitId] {
        self.maximal.get(creator as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn prime_units_by_level(&self, level: u64) -> &[UnitId] {
        self.prime_by_level.get(&level).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Highest height known for `creator`, or `None` if we have no unit from
    /// them yet. Used by the gossip engine to build a tips summary (§4.7).
    pub fn tip_height(&self, creator: CreatorId) -> Option<u64> {
        self.chains.get(creator as usize).and_then(|heights| heights.keys().next_back().copied())
    }

    /// All units by `creator` stored at height `from_height` or above, in
    /// ascending height order (ties among a forker's branches in insertion
    /// order). Used by the gossip engine's responder side to find what a
    /// peer reporting a lower tip height is missing.
    pub fn units_by_creator_from_height(&self, creator: CreatorId, from_height: u64) -> Vec<UnitId> {
        let Some(heights) = self.chains.get(creator as usize) else { return Vec::new() };
        heights.range(from_height..).flat_map(|(_, ids)| ids.iter().copied()).collect()
    }

    /// Whether rule 7 (threshold-coin share) applies to a prime unit at
    /// `level`, per the `threshold_start_level` configuration.
    pub fn use_tcoin_required(&self, level: u64, is_prime: bool) -> bool {
        self.use_tcoin && is_prime && level >= self.threshold_start_level
    }

    pub fn is_prime(&self, id: &UnitId) -> bool {
        self.units.get(id).map(|u| u.is_prime).unwrap_or(false)
    }

    /// `below(V, W)`: true iff V is an ancestor of W or V==W.
    ///
    /// Same-creator pairs are resolved by walking W's self-predecessor
    /// chain rather than through `W.floor`: `floor[c]` for `c == W.creator`
    /// is always `[W]` itself (§4.2, §4.3), so consulting it here would
    /// just ask this same question again. The chain walk is the direct,
    /// terminating way to answer "is V one of W's own ancestors".
    pub fn below(&self, v: UnitId, w: UnitId) -> bool {
        if v == w {
            return true;
        }
        let Some(w_unit) = self.units.get(&w) else { return false };
        let Some(v_unit) = self.units.get(&v) else { return false };
        if v_unit.unit.creator() == w_unit.unit.creator() {
            return match w_unit.unit.self_predecessor() {
                Some(&pred) => pred == v || self.below(v, pred),
                None => false,
            };
        }
        self.is_ancestor_via_floor(v, v_unit.unit.creator(), &w_unit.floor)
    }

    /// Ancestry check against an arbitrary floor. Safe for same-creator
    /// queries as long as `floor` belongs to an already-committed unit (its
    /// own-creator bucket then self-references that committed id, and the
    /// recursive `below` calls this bottoms out on). For a floor still
    /// being prepared for a not-yet-committed candidate, use
    /// `is_visible_below_candidate` instead — that bucket self-references
    /// an id that isn't in the index yet, so this method only ever reports
    /// "not visible" for it, never recurses unsoundly.
    pub(crate) fn is_ancestor_via_floor(&self, v: UnitId, v_creator: CreatorId, floor: &[Vec<UnitId>]) -> bool {
        let Some(bucket) = floor.get(v_creator as usize) else { return false };
        bucket.iter().any(|&x| x == v || self.below(v, x))
    }

    pub fn floor(&self, id: &UnitId) -> Option<&[Vec<UnitId>]> {
        self.units.get(id).map(|u| u.floor.as_slice())
    }

    /// Computes height/level/floor/is_prime for a not-yet-inserted unit.
    /// Does not validate compliance; callers that need a validated unit
    /// should go through [`compliance::check`].
    pub fn prepare(&self, unit: &Unit) -> PreparedUnit {
        let height = match unit.self_predecessor() {
            Some(pred) => self.units.get(pred).map(|u| u.height + 1).unwrap_or(0),
            None => 0,
        };
        let floor = self.compute_floor(unit, unit.hash());
        let level = self.compute_level(unit, &floor);
        let is_prime = match unit.self_predecessor() {
            None => true,
            Some(pred) => self.units.get(pred).map(|u| u.level < level).unwrap_or(true),
        };
        PreparedUnit { height, level, floor, is_prime }
    }

    fn compute_floor(&self, unit: &Unit, id: UnitId) -> Vec<Vec<UnitId>> {
        let mut merged = vec![Vec::new(); self.n_processes];
        for &parent in unit.parents() {
            if let Some(parent_unit) = self.units.get(&parent) {
                for (c, bucket) in parent_unit.floor.iter().enumerate() {
                    merged[c].extend(bucket.iter().copied());
                }
            }
        }
        let own_creator = unit.creator() as usize;
        for (c, bucket) in merged.iter_mut().enumerate() {
            if c == own_creator {
                continue;
            }
            bucket.sort_by_key(hash_key);
            bucket.dedup();
            let maxima: Vec<UnitId> = bucket.iter().copied().filter(|&x| !bucket.iter().any(|&y| y != x && self.below(x, y))).collect();
            *bucket = maxima;
        }
        // `W` itself is always the maximal (indeed only) unit by its own
        // creator below `W` that matters here: any prior entry for our own
        // creator reached `merged` only via a parent, and every parent is
        // below this unit by construction, so it is strictly dominated by
        // `id` — merge_per_creator(parents' floors ∪ {W itself for c ==
        // W.creator}) collapses to `[id]` (§4.2).
        merged[own_creator] = vec![id];
        merged
    }

    fn compute_level(&self, unit: &Unit, floor: &[Vec<UnitId>]) -> u64 {
        if unit.is_dealing() {
            return 0;
        }
        let max_parent_level = unit.parents().iter().filter_map(|p| self.units.get(p)).map(|u| u.level).max().unwrap_or(0);
        let n_correct = self.n_correct();
        let mut creators_with_visible_prime = HashSet::new();
        for &prime_id in self.prime_units_by_level(max_parent_level) {
            if let Some(prime) = self.units.get(&prime_id) {
                if self.is_visible_below_candidate(prime_id, prime.unit.creator(), unit, floor) {
                    creators_with_visible_prime.insert(prime.unit.creator());
                }
            }
        }
        if creators_with_visible_prime.len() >= n_correct {
            max_parent_level + 1
        } else {
            max_parent_level
        }
    }

    /// Whether `v` (created by `v_creator`) is visible below `candidate`, a
    /// unit not yet committed to the index. `candidate.floor` cannot answer
    /// this for `candidate`'s own creator — that bucket is forward-looking,
    /// always `[candidate]` itself once committed — so that case is
    /// resolved directly off `candidate`'s self-predecessor chain instead;
    /// every other creator is answered from `floor` as usual.
    fn is_visible_below_candidate(&self, v: UnitId, v_creator: CreatorId, candidate: &Unit, floor: &[Vec<UnitId>]) -> bool {
        if v_creator == candidate.creator() {
            return match candidate.self_predecessor() {
                Some(&pred) => pred == v || self.below(v, pred),
                None => false,
            };
        }
        self.is_ancestor_via_floor(v, v_creator, floor)
    }

    /// Validates `unit` against every compliance rule, then inserts it.
    /// Idempotent: re-adding a known hash is a no-op.
    pub fn add(&mut self, unit: Unit) -> Result<AddOutcome, PosetError> {
        let id = unit.hash();
        if self.units.contains_key(&id) {
            return Ok(AddOutcome::AlreadyPresent);
        }
        let prepared = compliance::check(self, &unit, id)?;
        self.commit(unit, id, prepared);
        Ok(AddOutcome::Inserted(id))
    }

    fn commit(&mut self, unit: Unit, id: UnitId, prepared: PreparedUnit) {
        let creator = unit.creator();
        let PreparedUnit { height, level, floor, is_prime } = prepared;

        // Forker detection: a second unit at a height we've already seen
        // from this creator flags them for good.
        let existing_at_height = self.chains[creator as usize].entry(height).or_default();
        existing_at_height.push(id);
        if existing_at_height.len() > 1 {
            self.forkers.insert(creator);
        }

        // Maximal tip set: drop the self-predecessor (it is now dominated),
        // add the new unit.
        let tips = &mut self.maximal[creator as usize];
        if let Some(pred) = unit.self_predecessor() {
            tips.retain(|t| t != pred);
        }
        tips.push(id);

        if is_prime {
            self.prime_by_level.entry(level).or_default().push(id);
        }
        self.level_reached = self.level_reached.max(level);

        self.units.insert(id, IndexedUnit { unit, id, height, level, floor, is_prime });
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
    fn tip_height_tracks_the_latest_unit_per_creator() {
        let keys: Vec<_> = (0..3).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        assert_eq!(poset.tip_height(0), None);
        let dealing = Unit::dealing(0, &keys[0]);
        let dealing_id = dealing.hash();
        poset.add(dealing).unwrap();
        assert_eq!(poset.tip_height(0), Some(0));

        let child = Unit::sign(0, vec![dealing_id], vec![], None, &keys[0]);
        poset.add(child).unwrap();
        assert_eq!(poset.tip_height(0), Some(1));
    }

    #[test]
    fn units_by_creator_from_height_returns_only_units_at_or_above_the_floor() {
        let keys: Vec<_> = (0..2).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        let dealing = Unit::dealing(0, &keys[0]);
        let dealing_id = dealing.hash();
        poset.add(dealing).unwrap();
        let child = Unit::sign(0, vec![dealing_id], vec![], None, &keys[0]);
        let child_id = child.hash();
        poset.add(child).unwrap();

        assert_eq!(poset.units_by_creator_from_height(0, 0), vec![dealing_id, child_id]);
        assert_eq!(poset.units_by_creator_from_height(0, 1), vec![child_id]);
        assert_eq!(poset.units_by_creator_from_height(0, 2), Vec::<UnitId>::new());
    }

    #[test]
    fn own_creator_floor_bucket_is_self_not_empty() {
        // §4.2 dealing-unit boundary: floor[c] = [self] if c == creator.
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        let dealing = Unit::dealing(0, &keys[0]);
        let dealing_id = dealing.hash();
        poset.add(dealing).unwrap();

        let floor = poset.floor(&dealing_id).unwrap();
        assert_eq!(floor[0], vec![dealing_id]);
        assert!(floor[1].is_empty() && floor[2].is_empty() && floor[3].is_empty());
    }

    #[test]
    fn below_holds_for_every_parent_including_the_self_predecessor() {
        // §8: for every parent P of U, below(P, U) = true.
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        let mut dealing_ids = Vec::new();
        for (c, k) in keys.iter().enumerate() {
            let unit = Unit::dealing(c as u16, k);
            dealing_ids.push(unit.hash());
            poset.add(unit).unwrap();
        }

        let u01 = Unit::sign(0, vec![dealing_ids[0], dealing_ids[1]], vec![], None, &keys[0]);
        let u01_id = u01.hash();
        poset.add(u01).unwrap();

        assert!(poset.below(dealing_ids[0], u01_id), "self-predecessor must be below its successor");
        assert!(poset.below(dealing_ids[1], u01_id), "every parent must be below its child");
        assert!(poset.below(u01_id, u01_id));

        // The tower scenario from the spec (§8 scenario 2): U03.floor =
        // [[U03],[dealing1],[dealing2],[dealing3]], U02.floor[3] = [],
        // U01.floor[2] = [].
        let u02 = Unit::sign(0, vec![u01_id, dealing_ids[2]], vec![], None, &keys[0]);
        let u02_id = u02.hash();
        poset.add(u02).unwrap();
        let u03 = Unit::sign(0, vec![u02_id, dealing_ids[3]], vec![], None, &keys[0]);
        let u03_id = u03.hash();
        poset.add(u03).unwrap();

        assert_eq!(poset.floor(&u01_id).unwrap()[2], Vec::<UnitId>::new());
        assert_eq!(poset.floor(&u02_id).unwrap()[3], Vec::<UnitId>::new());
        assert_eq!(
            poset.floor(&u03_id).unwrap().to_vec(),
            vec![vec![u03_id], vec![dealing_ids[1]], vec![dealing_ids[2]], vec![dealing_ids[3]]]
        );
        assert!(poset.below(dealing_ids[0], u03_id), "ancestors further back than the direct parent must also be below");
    }

    #[test]
    fn level_advances_once_n_correct_distinct_creator_primes_are_visible() {
        // §8 scenario 3: N=4, n_correct=3. A unit built from all 4 dealing
        // units (one per creator, including its own) reaches level 1 and is
        // prime.
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys = keys.iter().map(|k| k.public_key()).collect();
        let mut poset = Poset::new(public_keys, false, 0);

        let mut dealing_ids = Vec::new();
        for (c, k) in keys.iter().enumerate() {
            let unit = Unit::dealing(c as u16, k);
            dealing_ids.push(unit.hash());
            poset.add(unit).unwrap();
        }

        let unit = Unit::sign(0, dealing_ids.clone(), vec![], None, &keys[0]);
        let id = unit.hash();
        poset.add(unit).unwrap();

        assert_eq!(poset.get(&id).unwrap().level, 1);
        assert!(poset.is_prime(&id));
        assert_eq!(poset.level_reached(), 1);
    }
}

fn hash_key(id: &UnitId) -> [u8; 32] {
    *id.as_bytes()
}
