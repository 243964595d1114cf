//! Synchronization between a consumer-visible shared packet ring and a
//! NIC's hardware descriptor rings.
//!
//! A driver hands its hardware rings to an [`Adapter`] and calls the three
//! entry points: [`Adapter::txsync`], [`Adapter::rxsync`] and
//! [`Adapter::set_mode`].

pub mod adapter;
pub mod builder;
pub mod config;
pub mod error;
pub mod kring;
pub mod mode;
pub mod poll;
pub mod queue;
pub mod sync;

#[cfg(feature = "simulator")]
pub mod simulator;

pub use adapter::Adapter;
pub use builder::AdapterBuilder;
pub use config::{AdapterConfig, LockMode, Poller, MAX_SLOTS};
pub use error::{DeviceError, RingFault, SyncError};
pub use kring::{Direction, KRing, RingId};
pub use mode::{Capabilities, Mode, ModeController, NicDevice};
pub use queue::{RingStats, RxQueue, TxQueue};
pub use sync::reset::{ResetEvent, ResetLog};
