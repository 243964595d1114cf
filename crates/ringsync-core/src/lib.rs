//! Low-level building blocks for shared-ring synchronization: the
//! memory-mapped ring shared with a packet consumer, the hardware-facing
//! descriptor arenas, doorbells and the packet buffer pool.
//!
//! Nothing in here makes policy decisions; the sync engines live in the
//! `ringsync` crate.

pub mod barrier;
pub mod buf;
pub mod hw;
pub mod ring;

pub use buf::{BufLayout, BufferAllocator, BufferPool, DmaDirection, DmaMapper, IdentityMapper};
pub use hw::{CompletionQueue, Cqe, Doorbell, HwRxRing, HwTxRing};
pub use ring::{RingIndexTranslator, SharedRing, Slot, SlotFlags};
