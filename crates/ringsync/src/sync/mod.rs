//! The per-ring synchronization engines.
//!
//! Every function here runs with exclusive access to its queue and never
//! touches adapter-wide state.

pub mod reclaim;
pub mod reset;
pub mod rx;
pub mod tx;

pub use reclaim::Reclaimed;
pub use rx::RxReport;
pub use tx::TxReport;
