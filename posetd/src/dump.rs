//! Debug dump (§6): writes the poset to a line-oriented, non-protocol
//! artifact on termination. Grounded on `self.poset.dump_to_file` in
//! `original_source/aleph/process.py` — header line, then one record per
//! unit naming its short name, creator, parents, level, and whether it was
//! elected a timing unit.

use poset_network::SharedNode;
use std::collections::HashSet;
use std::io::{self, Write};
use std::path::Path;

const HEADER: &str = "format dump-nofork-level-timing";

pub fn write_dump(node: &SharedNode, path: &Path) -> io::Result<()> {
    let guard = node.lock();
    let poset = guard.poset();
    let timing_units: HashSet<_> = guard.timing().timing_units().iter().map(|&(_, id)| id).collect();

    let mut out = std::fs::File::create(path)?;
    writeln!(out, "{HEADER}")?;

    let mut units: Vec<_> = poset.iter().collect();
    units.sort_by_key(|u| (u.level, u.height, u.unit.creator()));

    for indexed in units {
        let parent_names: Vec<String> =
            indexed.unit.parents().iter().map(|p| poset.get(p).map(|pu| pu.unit.short_name()).unwrap_or_else(|| p.to_string())).collect();
        writeln!(
            out,
            "{} creator={} parents=[{}] level={} is_timing={}",
            indexed.unit.short_name(),
            indexed.unit.creator(),
            parent_names.join(","),
            indexed.level,
            timing_units.contains(&indexed.id),
        )?;
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use poset_crypto::{FixedCommitteeCoin, SecretKey};
    use poset_ordering::{OrderedPoset, OrderingConfig};
    use poset_unit::Unit;
    use std::str::FromStr;
    use std::sync::Arc;

    fn secret_key(byte: u8) -> SecretKey {
        SecretKey::from_str(&hex::encode([byte; 32])).unwrap()
    }

    #[test]
    fn dump_writes_a_header_and_one_line_per_unit() {
        let keys: Vec<_> = (0..4).map(secret_key).collect();
        let public_keys: Vec<_> = keys.iter().map(|k| k.public_key()).collect();
        let node: SharedNode = Arc::new(Mutex::new(OrderedPoset::new(public_keys, false, 0, OrderingConfig::default(), Box::new(FixedCommitteeCoin))));
        for (c, k) in keys.iter().enumerate() {
            node.lock().add_unit(Unit::dealing(c as u16, k)).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poset.dag");
        write_dump(&node, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(lines.next(), Some(HEADER));
        assert_eq!(lines.count(), 4);
    }
}
