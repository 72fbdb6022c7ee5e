//! Committee bootstrap (§6, §4.8): reads `signing_keys` (one hex private
//! key per line) and `ip_addresses` (one host per line), derives public
//! keys, re-sorts everything by ascending hex of public key — the sort that
//! fixes process-id assignment, per `original_source/aleph/main.py`'s
//! `_sort_and_get_my_pid` — then locates `my_ip`'s row post-sort to learn
//! this node's own process id.

use poset_crypto::{PublicKey, SecretKey};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
    #[error("malformed signing key on line {line}: {source}")]
    BadSigningKey { line: usize, #[source] source: poset_crypto::CryptoError },
    #[error("{signing_keys} has {keys} keys but {ip_addresses} has {hosts} hosts")]
    CommitteeSizeMismatch { signing_keys: String, ip_addresses: String, keys: usize, hosts: usize },
    #[error("my_ip {my_ip} is not present in {ip_addresses}")]
    UnknownSelf { my_ip: String, ip_addresses: String },
    #[error("TOML config at {path} is malformed: {source}")]
    BadToml { path: String, #[source] source: toml::de::Error },
}

/// The committee as seen by this process: its own process id, the full
/// sorted public-key list (indexed by process id), this node's secret key,
/// and each member's host.
pub struct Committee {
    pub process_id: u16,
    pub public_keys: Vec<PublicKey>,
    pub secret_key: SecretKey,
    pub hosts: Vec<String>,
}

impl Committee {
    pub fn n_processes(&self) -> usize {
        self.public_keys.len()
    }

    /// Reads the three bootstrap files and assembles a [`Committee`].
    pub fn bootstrap(signing_keys_path: &Path, ip_addresses_path: &Path, my_ip_path: &Path) -> Result<Committee, ConfigError> {
        let signing_keys = read_lines(signing_keys_path)?
            .iter()
            .enumerate()
            .map(|(i, line)| SecretKey::from_str(line).map_err(|source| ConfigError::BadSigningKey { line: i + 1, source }))
            .collect::<Result<Vec<_>, _>>()?;
        let hosts = read_lines(ip_addresses_path)?;

        if signing_keys.len() != hosts.len() {
            return Err(ConfigError::CommitteeSizeMismatch {
                signing_keys: signing_keys_path.display().to_string(),
                ip_addresses: ip_addresses_path.display().to_string(),
                keys: signing_keys.len(),
                hosts: hosts.len(),
            });
        }

        let my_ip = read_lines(my_ip_path)?.into_iter().next().unwrap_or_default();
        let my_index = hosts
            .iter()
            .position(|h| h == &my_ip)
            .ok_or_else(|| ConfigError::UnknownSelf { my_ip: my_ip.clone(), ip_addresses: ip_addresses_path.display().to_string() })?;
        let my_public_key = signing_keys[my_index].public_key();

        let mut order: Vec<usize> = (0..hosts.len()).collect();
        order.sort_by_key(|&i| signing_keys[i].public_key().to_hex());

        let public_keys: Vec<PublicKey> = order.iter().map(|&i| signing_keys[i].public_key()).collect();
        let sorted_hosts: Vec<String> = order.iter().map(|&i| hosts[i].clone()).collect();
        let process_id = public_keys.iter().position(|pk| *pk == my_public_key).expect("our own key is in the sorted list") as u16;
        let secret_key = signing_keys.into_iter().nth(my_index).expect("my_index is in range");

        Ok(Committee { process_id, public_keys, secret_key, hosts: sorted_hosts })
    }
}

fn read_lines(path: &Path) -> Result<Vec<String>, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
    Ok(contents.lines().map(|l| l.trim().to_string()).filter(|l| !l.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn bootstrap_sorts_committee_by_public_key_hex_and_finds_self() {
        let dir = tempfile::tempdir().unwrap();
        let signing_keys_lines: String =
            (0..4u8).map(|i| hex::encode([i; 32])).collect::<Vec<_>>().join("\n") + "\n";
        let ip_lines = "host0\nhost1\nhost2\nhost3\n";

        let signing_keys_path = write_file(&dir, "signing_keys", &signing_keys_lines);
        let ip_addresses_path = write_file(&dir, "ip_addresses", ip_lines);
        let my_ip_path = write_file(&dir, "my_ip", "host2\n");

        let committee = Committee::bootstrap(&signing_keys_path, &ip_addresses_path, &my_ip_path).unwrap();
        assert_eq!(committee.n_processes(), 4);
        assert_eq!(committee.public_keys[committee.process_id as usize], committee.secret_key.public_key());
        assert_eq!(committee.hosts[committee.process_id as usize], "host2");

        let mut sorted_hexes: Vec<String> = committee.public_keys.iter().map(|pk| pk.to_hex()).collect();
        let mut expected = sorted_hexes.clone();
        expected.sort();
        assert_eq!(sorted_hexes, expected);
        sorted_hexes.dedup();
        assert_eq!(sorted_hexes.len(), 4, "committee keys must stay distinct after sorting");
    }

    #[test]
    fn mismatched_file_lengths_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let signing_keys_path = write_file(&dir, "signing_keys", &format!("{}\n{}\n", hex::encode([1u8; 32]), hex::encode([2u8; 32])));
        let ip_addresses_path = write_file(&dir, "ip_addresses", "host0\n");
        let my_ip_path = write_file(&dir, "my_ip", "host0\n");

        let err = Committee::bootstrap(&signing_keys_path, &ip_addresses_path, &my_ip_path).unwrap_err();
        assert!(matches!(err, ConfigError::CommitteeSizeMismatch { .. }));
    }
}
