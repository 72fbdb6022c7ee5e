//! The bidirectional unit-sync protocol (§4.7): both sides exchange a tips
//! summary, then each sends the other whatever it appears to be missing.
//! Received batches are ordered topologically against the local poset
//! before insertion; a batch that cannot be fully ordered (dangling parent
//! references that never arrive) is discarded whole, and any compliance
//! failure aborts the sync without blacklisting the peer (§7).

use crate::wire::{read_message, read_unit, write_end_of_stream, write_message, write_unit, TipsSummary};
use crate::SharedNode;
use poset_dag::Poset;
use poset_unit::{CreatorId, Unit, UnitId};
use std::collections::HashSet;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("I/O error during sync: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer's unit batch has unresolvable dangling parent references")]
    DanglingParentReferences,
    #[error("peer sent a unit that failed compliance: {0}")]
    Compliance(#[from] poset_dag::PosetError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    pub units_received: usize,
    pub units_sent: usize,
}

/// Initiator side (`I` in §4.7): send our tips, receive and apply whatever
/// the responder sends back, then send it everything it is missing from us.
pub async fn run_initiator<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, node: &SharedNode) -> Result<SyncOutcome, SyncError> {
    let my_summary = { let guard = node.lock(); TipsSummary::of(guard.poset()) };
    write_message(stream, &my_summary).await?;

    let their_summary: TipsSummary = read_message(stream).await?;
    let incoming = receive_unit_stream(stream).await?;
    let units_received = incoming.len();
    apply_batch(node, incoming)?;

    let outgoing = units_missing_for(node, &their_summary);
    let units_sent = outgoing.len();
    for unit in &outgoing {
        write_unit(stream, unit).await?;
    }
    write_end_of_stream(stream).await?;

    Ok(SyncOutcome { units_received, units_sent })
}

/// Responder side (`R` in §4.7): read the initiator's tips, reply with ours
/// plus everything it is missing, then receive and apply whatever it sends
/// back in turn.
pub async fn run_responder<S: AsyncRead + AsyncWrite + Unpin>(stream: &mut S, node: &SharedNode) -> Result<SyncOutcome, SyncError> {
    let their_summary: TipsSummary = read_message(stream).await?;

    let my_summary = { let guard = node.lock(); TipsSummary::of(guard.poset()) };
    write_message(stream, &my_summary).await?;

    let outgoing = units_missing_for(node, &their_summary);
    let units_sent = outgoing.len();
    for unit in &outgoing {
        write_unit(stream, unit).await?;
    }
    write_end_of_stream(stream).await?;

    let incoming = receive_unit_stream(stream).await?;
    let units_received = incoming.len();
    apply_batch(node, incoming)?;

    Ok(SyncOutcome { units_received, units_sent })
}

async fn receive_unit_stream<S: AsyncRead + Unpin>(stream: &mut S) -> Result<Vec<Unit>, SyncError> {
    let mut units = Vec::new();
    while let Some(unit) = read_unit(stream).await? {
        units.push(unit);
    }
    Ok(units)
}

/// Every unit we have that the peer's tips summary says it does not: for
/// each creator, everything we hold above the reported height.
fn units_missing_for(node: &SharedNode, their_summary: &TipsSummary) -> Vec<Unit> {
    let guard = node.lock();
    let poset = guard.poset();
    let mut missing = Vec::new();
    for creator in 0..poset.n_processes() as CreatorId {
        let from_height = their_summary.height_of(creator).map_or(0, |h| h + 1);
        for id in poset.units_by_creator_from_height(creator, from_height) {
            if let Some(indexed) = poset.get(&id) {
                missing.push(indexed.unit.clone());
            }
        }
    }
    missing
}

fn apply_batch(node: &SharedNode, units: Vec<Unit>) -> Result<(), SyncError> {
    if units.is_empty() {
        return Ok(());
    }
    let ordered = {
        let guard = node.lock();
        topological_order(guard.poset(), units)?
    };
    let mut guard = node.lock();
    for unit in ordered {
        guard.add_unit(unit)?;
    }
    Ok(())
}

/// Orders a received batch so every unit's parents precede it, counting
/// both units already in `poset` and units earlier in the batch as
/// satisfied. Units whose parents never resolve this way are dangling
/// references (§4.7): the whole batch is rejected rather than partially
/// applied.
fn topological_order(poset: &Poset, mut pending: Vec<Unit>) -> Result<Vec<Unit>, SyncError> {
    let mut ordered = Vec::with_capacity(pending.len());
    let mut resolved: HashSet<UnitId> = HashSet::new();
    loop {
        let mut progressed = false;
        let mut still_pending = Vec::new();
        for unit in pending {
            let ready = unit.parents().iter().all(|p| poset.contains(p) || resolved.contains(p));
            if ready {
                resolved.insert(unit.hash());
                ordered.push(unit);
                progressed = true;
            } else {
                still_pending.push(unit);
            }
        }
        pending = still_pending;
        if pending.is_empty() {
            return Ok(ordered);
        }
        if !progressed {
            return Err(SyncError::DanglingParentReferences);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use poset_crypto::{FixedCommitteeCoin, SecretKey};
    use poset_ordering::{OrderedPoset, OrderingConfig};
    use std::str::FromStr;
    use std::sync::Arc;

    fn committee(n: u16) -> Vec<SecretKey> {
        (0..n).map(|i| SecretKey::from_str(&hex::encode([i as u8; 32])).unwrap()).collect()
    }

    fn node(keys: &[SecretKey]) -> SharedNode {
        let public_keys = keys.iter().map(|k| k.public_key()).collect::<Vec<_>>();
        Arc::new(Mutex::new(OrderedPoset::new(public_keys, false, 0, OrderingConfig::default(), Box::new(FixedCommitteeCoin))))
    }

    #[tokio::test]
    async fn two_nodes_with_disjoint_dealing_units_converge_after_one_sync() {
        // §8 scenario 6, at level 0: node A only has its own dealing unit,
        // node B only has its own; after one sync both know both units.
        let keys = committee(2);
        let a = node(&keys);
        let b = node(&keys);

        let dealing_a = Unit::dealing(0, &keys[0]);
        a.lock().add_unit(dealing_a.clone()).unwrap();
        let dealing_b = Unit::dealing(1, &keys[1]);
        b.lock().add_unit(dealing_b.clone()).unwrap();

        let (mut stream_a, mut stream_b) = tokio::io::duplex(16 * 1024);
        let a2 = a.clone();
        let initiator = tokio::spawn(async move { run_initiator(&mut stream_a, &a2).await });
        let responder = tokio::spawn(async move { run_responder(&mut stream_b, &b).await });

        let (init_outcome, resp_outcome) = tokio::join!(initiator, responder);
        init_outcome.unwrap().unwrap();
        resp_outcome.unwrap().unwrap();

        assert!(a.lock().poset().contains(&dealing_b.hash()));
    }

    #[tokio::test]
    async fn a_unit_whose_parent_never_arrives_is_discarded_as_a_whole_batch() {
        let keys = committee(2);
        let poset_keys = keys.clone();
        let mut pending = vec![{
            let dangling_parent = Unit::dealing(0, &poset_keys[0]).hash();
            Unit::sign(1, vec![dangling_parent], vec![], None, &poset_keys[1])
        }];
        let empty_poset = Poset::new(keys.iter().map(|k| k.public_key()).collect(), false, 0);
        let err = topological_order(&empty_poset, std::mem::take(&mut pending)).unwrap_err();
        assert!(matches!(err, SyncError::DanglingParentReferences));
    }
}
