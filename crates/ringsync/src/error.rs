use std::io;
use thiserror::Error;

use crate::kring::RingId;

/// Invariant violations found while synchronizing a ring. Each one is
/// answered with a ring reset.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingFault {
    #[error("index {index} out of range (lim {lim})")]
    InvalidIndex { index: u32, lim: u32 },

    #[error("slot {slot}: invalid buffer {buffer_id} or length {length}")]
    InvalidSlot { slot: u32, buffer_id: u32, length: u16 },

    #[error("availability {avail} exceeds capacity {lim}")]
    OverflowInvariant { avail: u32, lim: u32 },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("failed to stop port: {0}")]
    Stop(String),

    #[error("failed to start port: {0}")]
    Start(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    /// The ring was resynchronized from hardware state; the consumer sees a
    /// fresh `avail` on its next look.
    #[error("ring {ring} was reset: {fault}")]
    RingReset { ring: RingId, fault: RingFault },

    #[error("device busy: {0}")]
    DeviceBusy(#[source] DeviceError),

    #[error("ring {0} is not in synchronized mode")]
    NotSynchronized(RingId),

    #[error("no such ring {0}")]
    NoSuchRing(RingId),

    #[error("buffer pool exhausted")]
    OutOfBuffers,

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO Error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    pub fn is_reset(&self) -> bool {
        matches!(self, SyncError::RingReset { .. })
    }

    pub fn fault(&self) -> Option<RingFault> {
        match self {
            SyncError::RingReset { fault, .. } => Some(*fault),
            _ => None,
        }
    }
}
