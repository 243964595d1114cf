use std::io;
use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering};

use memmap2::MmapMut;

use crate::ring::slot::{Slot, SlotFlags};

/// Fixed header at the start of every shared ring mapping. The slot array
/// follows immediately.
#[repr(C)]
pub struct RingHeader {
    /// Written by the consumer.
    pub cur: AtomicU32,
    /// Written by the synchronizer, read-only for the consumer.
    pub avail: AtomicU32,
    /// Written by the consumer, receive rings only.
    pub reserved: AtomicU32,
}

pub const HEADER_SIZE: usize = mem::size_of::<RingHeader>();

/// The memory-mapped ring shared with an untrusted packet consumer.
///
/// Every consumer-written field is read with a single load per call site;
/// callers keep the returned snapshot instead of reading again.
pub struct SharedRing {
    map: MmapMut,
    header: *const RingHeader,
    slots: *mut Slot,
    num_slots: u32,
    mask: u32,
}

unsafe impl Send for SharedRing {}

impl SharedRing {
    pub fn layout_size(num_slots: u32) -> usize {
        HEADER_SIZE + num_slots as usize * mem::size_of::<Slot>()
    }

    /// Create a ring backed by an anonymous shared mapping.
    pub fn new_anon(num_slots: u32) -> io::Result<Self> {
        let map = MmapMut::map_anon(Self::layout_size(num_slots))?;
        Self::from_mmap(map, num_slots)
    }

    /// Wrap an existing mapping, e.g. one backed by a file handed to the
    /// consumer process.
    pub fn from_mmap(mut map: MmapMut, num_slots: u32) -> io::Result<Self> {
        if num_slots < 2 || !num_slots.is_power_of_two() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ring size must be a power of two",
            ));
        }
        if map.len() < Self::layout_size(num_slots) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "mapping too small for ring",
            ));
        }

        let base = map.as_mut_ptr();
        let header = base as *const RingHeader;
        let slots = unsafe { base.add(HEADER_SIZE) } as *mut Slot;

        Ok(Self {
            map,
            header,
            slots,
            num_slots,
            mask: num_slots - 1,
        })
    }

    #[inline]
    pub fn num_slots(&self) -> u32 {
        self.num_slots
    }

    #[inline]
    pub fn lim(&self) -> u32 {
        self.mask
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.map
    }

    #[inline]
    fn header(&self) -> &RingHeader {
        unsafe { &*self.header }
    }

    #[inline]
    pub fn load_cur(&self) -> u32 {
        self.header().cur.load(Ordering::Acquire)
    }

    #[inline]
    pub fn load_reserved(&self) -> u32 {
        self.header().reserved.load(Ordering::Acquire)
    }

    #[inline]
    pub fn load_avail(&self) -> u32 {
        self.header().avail.load(Ordering::Acquire)
    }

    #[inline]
    pub fn publish_avail(&self, avail: u32) {
        self.header().avail.store(avail, Ordering::Release);
    }

    #[inline]
    pub fn set_cur(&self, cur: u32) {
        self.header().cur.store(cur, Ordering::Release);
    }

    #[inline]
    pub fn set_reserved(&self, reserved: u32) {
        self.header().reserved.store(reserved, Ordering::Release);
    }

    /// Snapshot of one slot. The index is masked, so a hostile value can
    /// never reach outside the mapping.
    #[inline]
    pub fn read_slot(&self, idx: u32) -> Slot {
        let offset = (idx & self.mask) as usize;
        unsafe { ptr::read_volatile(self.slots.add(offset)) }
    }

    #[inline]
    pub fn write_slot(&mut self, idx: u32, slot: Slot) {
        let offset = (idx & self.mask) as usize;
        unsafe { ptr::write_volatile(self.slots.add(offset), slot) };
    }

    #[inline]
    pub fn store_flags(&mut self, idx: u32, flags: SlotFlags) {
        let offset = (idx & self.mask) as usize;
        unsafe {
            let slot = self.slots.add(offset);
            ptr::write_volatile(ptr::addr_of_mut!((*slot).flags), flags.bits());
        }
    }

    #[inline]
    pub fn store_len(&mut self, idx: u32, length: u16) {
        let offset = (idx & self.mask) as usize;
        unsafe {
            let slot = self.slots.add(offset);
            ptr::write_volatile(ptr::addr_of_mut!((*slot).length), length);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_stable() {
        assert_eq!(HEADER_SIZE, 12);
        assert_eq!(SharedRing::layout_size(8), 12 + 64);
    }

    #[test]
    fn rejects_non_power_of_two() {
        assert!(SharedRing::new_anon(6).is_err());
        assert!(SharedRing::new_anon(1).is_err());
    }

    #[test]
    fn slot_index_is_masked() {
        let mut ring = SharedRing::new_anon(8).expect("mmap");
        ring.write_slot(9, Slot::new(42, 64, SlotFlags::REPORT));
        assert_eq!(ring.read_slot(1).buffer_id, 42);
        assert_eq!(ring.read_slot(1).flags(), SlotFlags::REPORT);

        ring.store_flags(1, SlotFlags::empty());
        ring.store_len(1, 100);
        let slot = ring.read_slot(1);
        assert_eq!(slot.flags, 0);
        assert_eq!(slot.length, 100);
        assert_eq!(slot.buffer_id, 42);
    }

    #[test]
    fn header_fields_land_in_mapping() {
        let ring = SharedRing::new_anon(4).expect("mmap");
        ring.set_cur(3);
        ring.publish_avail(2);
        ring.set_reserved(1);
        let bytes = ring.as_bytes();
        let word = |i: usize| u32::from_ne_bytes(bytes[i * 4..i * 4 + 4].try_into().unwrap());
        assert_eq!((word(0), word(1), word(2)), (3, 2, 1));
        assert_eq!(ring.load_cur(), 3);
        assert_eq!(ring.load_avail(), 2);
        assert_eq!(ring.load_reserved(), 1);
    }
}
