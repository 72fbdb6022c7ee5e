//! The local DAG index over units: levels, floors, forker detection, the
//! prime-unit index, and the compliance rules a received unit must satisfy
//! before `Poset::add` will accept it.

pub mod compliance;
pub mod error;
pub mod index;

pub use compliance::ExpandPrimesState;
pub use error::{ComplianceError, CryptoError, PosetError};
pub use index::{AddOutcome, IndexedUnit, Poset, PreparedUnit};
