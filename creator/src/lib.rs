//! The unit creator (§4.6): parent selection, adaptive pacing, and the
//! self-legalization loop (sign a candidate unit, validate it against the
//! very rules a received unit would face, then insert it) packaged as an
//! [`poset_core::task::service::AsyncService`] cooperative task.

mod pacing;
mod parent_selection;
mod service;

pub use pacing::AdaptiveDelay;
pub use parent_selection::select_parents;
pub use service::{CreatorConfig, CreatorService, SharedNode};
