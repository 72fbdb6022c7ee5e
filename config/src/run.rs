//! Process-wide immutable run constants (§6), loaded from an optional TOML
//! file with field-for-field defaults matching the original's
//! `aleph/const.py`, and overridable by CLI flags at the call site.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

use crate::ConfigError;

/// Mirrors the original's `TX_SOURCE` switch (§4.9): a synthetic generator
/// with a seeded RNG, or a TCP listener accepting batches from an external
/// producer.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxSourceKind {
    Generator { batch_size: usize, txpu: usize, seed: u64 },
    Listener { address: Option<String> },
}

impl Default for TxSourceKind {
    fn default() -> Self {
        TxSourceKind::Generator { batch_size: 1000, txpu: 10, seed: 0 }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    /// Max parents a locally created unit may take, default `N` (capped to
    /// the committee size regardless of this value).
    pub n_parents: usize,
    /// Whether compliance rule 7 (threshold-coin share) is enforced.
    pub use_tcoin: bool,
    /// Level at or above which a prime unit must carry a coin share, when
    /// `use_tcoin` is set (§9 Open Question: configuration, not hardwired).
    pub threshold_start_level: u64,
    /// Lowest level at which a timing-unit election is attempted.
    pub voting_start_level: u64,
    /// `Delta` at or beyond which the common coin replaces a plain majority.
    pub coin_start_delta: u64,
    /// Seconds between locally created units (adaptively paced, §4.6).
    pub create_delay_secs: f64,
    /// Seconds between dispatched outbound syncs.
    pub sync_init_delay_secs: f64,
    /// Transactions bundled per created unit.
    pub txpu: usize,
    /// Stop creating once this level is reached; 0 disables the limit.
    pub level_limit: u64,
    /// Stop creating once this many units have been created; 0 disables.
    pub units_limit: u64,
    /// Stop dispatching once this many syncs have been started; 0 disables.
    pub syncs_limit: u64,
    /// `step` in the adaptive-delay rule (§4.6), default `0.1`.
    pub step_size: f64,
    pub adaptive_delay: bool,
    pub precompute_popularity: bool,
    pub tx_source: TxSourceKind,
    /// TCP port every committee member listens on for gossip syncs.
    pub gossip_port: u16,
    /// Gossip peer-selection strategy (§4.7).
    pub gossip_strategy: GossipStrategy,
    /// Where to write the optional `poset.dag` debug dump; `None` disables it.
    pub dump_path: Option<String>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GossipStrategy {
    #[default]
    UniformRandom,
    NonRecentRandom,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            n_parents: 0, // 0 means "committee size", resolved by the caller once n_processes is known
            use_tcoin: false,
            threshold_start_level: 0,
            voting_start_level: 3,
            coin_start_delta: 4,
            create_delay_secs: 2.0,
            sync_init_delay_secs: 1.0,
            txpu: 10,
            level_limit: 0,
            units_limit: 0,
            syncs_limit: 0,
            step_size: 0.1,
            adaptive_delay: true,
            precompute_popularity: true,
            tx_source: TxSourceKind::default(),
            gossip_port: 47_331,
            gossip_strategy: GossipStrategy::UniformRandom,
            dump_path: None,
        }
    }
}

impl RunConfig {
    /// Loads a config from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn load(path: &Path) -> Result<RunConfig, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        toml::from_str(&text).map_err(|source| ConfigError::BadToml { path: path.display().to_string(), source })
    }

    /// Resolves `n_parents == 0` ("use committee size") against the actual
    /// committee size, and caps it so a unit never requests more parents
    /// than there are committee members.
    pub fn resolved_n_parents(&self, n_processes: usize) -> usize {
        if self.n_parents == 0 {
            n_processes
        } else {
            self.n_parents.min(n_processes)
        }
    }

    pub fn create_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.create_delay_secs.max(0.0))
    }

    pub fn sync_init_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.sync_init_delay_secs.max(0.0))
    }

    /// §5's dispatcher shutdown grace period: `3*SYNC_INIT_DELAY + 2s`.
    pub fn dispatcher_grace_period(&self) -> std::time::Duration {
        self.sync_init_delay().mul_f64(3.0) + std::time::Duration::from_secs(2)
    }
}

pub fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, std::net::AddrParseError> {
    format!("{host}:{port}").parse()
}
