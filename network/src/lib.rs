//! Gossip engine (§4.7): the bidirectional unit-sync wire protocol, a
//! listener pool handling inbound syncs, a dispatcher driving outbound
//! syncs on a timer, and the peer-selection policies between the two
//! configured strategies. Shares one `Arc<Mutex<OrderedPoset>>` with the
//! unit creator (§5): every unit, whether self-created or received over
//! gossip, goes through the same insertion path.

pub mod dispatcher;
pub mod listener;
pub mod peer_selection;
pub mod sync;
pub mod wire;

pub use dispatcher::{DispatcherConfig, SyncDispatcher};
pub use listener::ListenerPool;
pub use peer_selection::PeerSelector;
pub use sync::{run_initiator, run_responder, SyncError, SyncOutcome};
pub use wire::TipsSummary;

use parking_lot::Mutex;
use poset_ordering::OrderedPoset;
use std::sync::Arc;

pub type SharedNode = Arc<Mutex<OrderedPoset>>;
