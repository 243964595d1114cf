pub mod index;
pub mod shared;
pub mod slot;

pub use index::RingIndexTranslator;
pub use shared::{RingHeader, SharedRing};
pub use slot::{Slot, SlotFlags};
