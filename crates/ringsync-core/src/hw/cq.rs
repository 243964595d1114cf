use std::ptr;

use crate::barrier::rmb;

pub const CQE_OWNER_MASK: u8 = 0x80;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cqe {
    pub byte_cnt: u32,
    pub wqe_index: u16,
    pub checksum: u16,
    pub reserved: [u8; 3],
    pub owner_sr_opcode: u8,
}

impl Cqe {
    #[inline]
    pub fn owner(&self) -> bool {
        self.owner_sr_opcode & CQE_OWNER_MASK != 0
    }

    #[inline]
    pub fn wqe_index(&self) -> u16 {
        u16::from_be(self.wqe_index)
    }

    #[inline]
    pub fn byte_cnt(&self) -> u32 {
        u32::from_be(self.byte_cnt)
    }
}

/// Completion queue shared with the device.
///
/// An entry at consumer index `ci` is new when its owner bit equals the
/// parity bit `ci & size`, which flips on every pass around the queue.
pub struct CompletionQueue {
    entries: Box<[Cqe]>,
    size: u32,
    cons_index: u32,
    ci_record: u32,
    // Device-side producer; only the device (or a simulated one) moves it.
    produced: u32,
}

impl CompletionQueue {
    /// # Panics
    ///
    /// If `size` is not a power of two.
    pub fn new(size: u32) -> Self {
        assert!(size.is_power_of_two(), "completion queue size {size} is not a power of two");
        let mut cq = Self {
            entries: vec![Cqe::default(); size as usize].into_boxed_slice(),
            size,
            cons_index: 0,
            ci_record: 0,
            produced: 0,
        };
        cq.reinit();
        cq
    }

    /// Hand every entry back to hardware and rewind both indexes.
    pub fn reinit(&mut self) {
        self.entries.fill(Cqe {
            owner_sr_opcode: CQE_OWNER_MASK,
            ..Cqe::default()
        });
        self.cons_index = 0;
        self.ci_record = 0;
        self.produced = 0;
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn cons_index(&self) -> u32 {
        self.cons_index
    }

    /// Consumer index as last published to the device.
    #[inline]
    pub fn ci_record(&self) -> u32 {
        u32::from_be(self.ci_record)
    }

    /// Entry at `cons_index` if the device has written it. The entry body
    /// is only read after ownership is confirmed.
    #[inline]
    pub fn peek_at(&self, cons_index: u32) -> Option<Cqe> {
        let entry = &self.entries[(cons_index & (self.size - 1)) as usize];
        let owner = unsafe { ptr::read_volatile(&entry.owner_sr_opcode) } & CQE_OWNER_MASK != 0;
        let parity = cons_index & self.size != 0;
        if owner != parity {
            return None;
        }
        rmb();
        Some(unsafe { ptr::read_volatile(entry) })
    }

    /// Publish the consumer index to the device.
    #[inline]
    pub fn commit(&mut self, cons_index: u32) {
        self.cons_index = cons_index;
        self.ci_record = (cons_index & 0x00ff_ffff).to_be();
    }

    /// Device side: write the next completion entry. Returns false when the
    /// queue is full.
    pub fn hw_post(&mut self, wqe_index: u16, byte_cnt: u32) -> bool {
        if self.produced.wrapping_sub(self.cons_index) >= self.size {
            return false;
        }
        let owner = if self.produced & self.size != 0 {
            CQE_OWNER_MASK
        } else {
            0
        };
        let idx = (self.produced & (self.size - 1)) as usize;
        self.entries[idx] = Cqe {
            byte_cnt: byte_cnt.to_be(),
            wqe_index: wqe_index.to_be(),
            checksum: 0,
            reserved: [0; 3],
            owner_sr_opcode: owner,
        };
        self.produced = self.produced.wrapping_add(1);
        true
    }
}
