//! Ambient configuration: committee bootstrap from the three plain-text
//! files named in §6, and the process-wide run constants enumerated there,
//! loaded from an optional TOML file and overridable by CLI flags. Replaces
//! the original's bare module-global constants with an explicit record
//! passed to the node at construction (§9 redesign note).

mod committee;
mod run;

pub use committee::{Committee, ConfigError};
pub use run::{parse_socket_addr, GossipStrategy, RunConfig, TxSourceKind};
