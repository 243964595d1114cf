use bitflags::bitflags;

bitflags! {
    /// Per-slot flags set by the consumer and cleared once acted upon.
    #[repr(transparent)]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SlotFlags: u16 {
        /// The buffer id changed since the last sync; reload its mapping.
        const BUF_CHANGED = 0x0001;
        /// Ask for a completion report on this slot.
        const REPORT = 0x0002;
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Slot {
    pub buffer_id: u32,
    pub length: u16,
    pub flags: u16,
}

impl Slot {
    pub fn new(buffer_id: u32, length: u16, flags: SlotFlags) -> Self {
        Self {
            buffer_id,
            length,
            flags: flags.bits(),
        }
    }

    #[inline]
    pub fn flags(&self) -> SlotFlags {
        SlotFlags::from_bits_retain(self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<Slot>(), 8);
        assert_eq!(std::mem::align_of::<Slot>(), 4);
    }

    #[test]
    fn unknown_flag_bits_survive() {
        let slot = Slot { buffer_id: 3, length: 60, flags: 0x8003 };
        let flags = slot.flags();
        assert!(flags.contains(SlotFlags::REPORT | SlotFlags::BUF_CHANGED));
        assert_eq!((flags - SlotFlags::REPORT).bits(), 0x8001);
    }
}
