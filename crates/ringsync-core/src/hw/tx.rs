//! Hardware transmit ring: an arena of fixed-stride descriptors with a
//! producer cursor advanced by the driver and a consumer cursor advanced
//! by completion reclaim.

/// Descriptor stride. A descriptor occupies one or more basic blocks.
pub const TXBB_SIZE: u32 = 64;
pub const CTRL_SEG_SIZE: u32 = 16;
pub const DATA_SEG_SIZE: u32 = 16;
/// Bytes of a single-segment send descriptor.
pub const SEND_DESC_SIZE: u32 = CTRL_SEG_SIZE + DATA_SEG_SIZE;

pub const OPCODE_SEND: u32 = 0x0a;
pub const BIT_DESC_OWN: u32 = 0x8000_0000;
/// Ask the device for a completion entry on this descriptor.
pub const WQE_CTRL_CQ_UPDATE: u32 = 3 << 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CtrlSeg {
    pub owner_opcode: u32,
    pub vlan_tag: u16,
    pub ins_vlan: u8,
    pub fence_size: u8,
    pub srcrb_flags: u32,
    pub imm: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataSeg {
    pub byte_count: u32,
    pub lkey: u32,
    pub addr: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxDesc {
    pub ctrl: CtrlSeg,
    pub data: DataSeg,
    _pad: [u8; 32],
}

impl TxDesc {
    /// Single-segment send descriptor. Multi-byte fields are big-endian as
    /// the device reads them.
    pub fn send(addr: u64, len: u16, lkey: u32, owner: bool) -> Self {
        let owner_bit = if owner { BIT_DESC_OWN } else { 0 };
        Self {
            ctrl: CtrlSeg {
                owner_opcode: (OPCODE_SEND | owner_bit).to_be(),
                vlan_tag: 0,
                ins_vlan: 0,
                fence_size: ((len / 16) & 0x3f) as u8,
                srcrb_flags: WQE_CTRL_CQ_UPDATE.to_be(),
                imm: 0,
            },
            data: DataSeg {
                byte_count: u32::from(len).to_be(),
                lkey: lkey.to_be(),
                addr: addr.to_be(),
            },
            _pad: [0; 32],
        }
    }

    /// Blocks this descriptor spans. Send descriptors carry one data
    /// segment, so the span does not depend on the packet length.
    pub fn nr_txbb(&self) -> u32 {
        SEND_DESC_SIZE.div_ceil(TXBB_SIZE).max(1)
    }

    pub fn byte_count(&self) -> u32 {
        u32::from_be(self.data.byte_count)
    }

    pub fn addr(&self) -> u64 {
        u64::from_be(self.data.addr)
    }

    pub fn owned_by_hw(&self) -> bool {
        u32::from_be(self.ctrl.owner_opcode) & BIT_DESC_OWN != 0
    }

    pub fn wants_completion(&self) -> bool {
        u32::from_be(self.ctrl.srcrb_flags) & WQE_CTRL_CQ_UPDATE == WQE_CTRL_CQ_UPDATE
    }
}

pub struct HwTxRing {
    descs: Box<[TxDesc]>,
    nr_txbb: Box<[u32]>,
    size: u32,
    size_mask: u32,
    prod: u32,
    // Trails the first unreclaimed block by `last_nr_txbb`.
    cons: u32,
    last_nr_txbb: u32,
    doorbell_qpn: u32,
    lkey: u32,
    // Device-side send cursor; only the device (or a simulated one) moves it.
    sent: u32,
}

impl HwTxRing {
    /// # Panics
    ///
    /// If `size` is not a power of two.
    pub fn new(size: u32, doorbell_qpn: u32, lkey: u32) -> Self {
        assert!(size.is_power_of_two(), "tx ring size {size} is not a power of two");
        let mut ring = Self {
            descs: vec![TxDesc::default(); size as usize].into_boxed_slice(),
            nr_txbb: vec![1; size as usize].into_boxed_slice(),
            size,
            size_mask: size - 1,
            prod: 0,
            cons: 0,
            last_nr_txbb: 1,
            doorbell_qpn,
            lkey,
            sent: 0,
        };
        ring.reinit();
        ring
    }

    /// Return the ring to its activation state. Only valid while the port
    /// is quiesced.
    pub fn reinit(&mut self) {
        self.descs.fill(TxDesc::default());
        self.nr_txbb.fill(1);
        self.prod = 0;
        self.cons = u32::MAX;
        self.last_nr_txbb = 1;
        self.sent = 0;
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    #[inline]
    pub fn size_mask(&self) -> u32 {
        self.size_mask
    }

    #[inline]
    pub fn prod(&self) -> u32 {
        self.prod
    }

    #[inline]
    pub fn cons(&self) -> u32 {
        self.cons
    }

    #[inline]
    pub fn last_nr_txbb(&self) -> u32 {
        self.last_nr_txbb
    }

    #[inline]
    pub fn doorbell_qpn(&self) -> u32 {
        self.doorbell_qpn
    }

    #[inline]
    pub fn lkey(&self) -> u32 {
        self.lkey
    }

    /// Blocks posted and not yet reclaimed.
    #[inline]
    pub fn inflight_blocks(&self) -> u32 {
        self.prod
            .wrapping_sub(self.cons.wrapping_add(self.last_nr_txbb))
    }

    #[inline]
    pub fn desc(&self, idx: u32) -> &TxDesc {
        &self.descs[(idx & self.size_mask) as usize]
    }

    #[inline]
    pub fn nr_txbb_at(&self, idx: u32) -> u32 {
        self.nr_txbb[(idx & self.size_mask) as usize]
    }

    #[inline]
    pub fn write_desc(&mut self, idx: u32, desc: TxDesc) {
        let slot = (idx & self.size_mask) as usize;
        self.nr_txbb[slot] = desc.nr_txbb();
        self.descs[slot] = desc;
    }

    #[inline]
    pub fn advance_prod(&mut self, blocks: u32) {
        self.prod = self.prod.wrapping_add(blocks);
    }

    #[inline]
    pub fn advance_cons(&mut self, blocks: u32, last_nr_txbb: u32) {
        self.cons = self.cons.wrapping_add(blocks);
        self.last_nr_txbb = last_nr_txbb;
    }

    /// Device side: take the next posted descriptor off the wire. Returns
    /// its ring index.
    pub fn hw_take_sent(&mut self) -> Option<u32> {
        if self.sent == self.prod {
            return None;
        }
        let idx = self.sent & self.size_mask;
        self.sent = self.sent.wrapping_add(self.nr_txbb[idx as usize]);
        Some(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_is_one_block() {
        assert_eq!(std::mem::size_of::<TxDesc>(), TXBB_SIZE as usize);
        let desc = TxDesc::send(0x1000, 64, 7, false);
        assert_eq!(desc.nr_txbb(), 1);
        assert_eq!(desc.ctrl.fence_size, 4);
        assert_eq!(desc.byte_count(), 64);
        assert_eq!(desc.addr(), 0x1000);
        assert!(desc.wants_completion());
        assert!(!desc.owned_by_hw());
    }

    #[test]
    fn fence_size_follows_packet_length() {
        let small = TxDesc::send(0x1000, 60, 1, false);
        let mtu = TxDesc::send(0x1000, 1500, 1, false);
        let jumbo = TxDesc::send(0x1000, 9000, 1, false);
        assert_eq!(small.ctrl.fence_size, 3);
        assert_eq!(mtu.ctrl.fence_size, 29);
        assert_eq!(jumbo.ctrl.fence_size, (9000 / 16 & 0x3f) as u8);

        // Block span is fixed by the descriptor layout.
        for desc in [small, mtu, jumbo] {
            assert_eq!(desc.nr_txbb(), 1);
        }

        let mut ring = HwTxRing::new(4, 0, 1);
        ring.write_desc(2, mtu);
        assert_eq!(ring.nr_txbb_at(2), 1);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn zero_sized_ring_is_rejected() {
        let _ = HwTxRing::new(0, 0, 1);
    }

    #[test]
    fn fresh_ring_has_nothing_in_flight() {
        let mut ring = HwTxRing::new(8, 0x42, 1);
        assert_eq!(ring.inflight_blocks(), 0);
        ring.write_desc(0, TxDesc::send(0, 60, 1, false));
        ring.advance_prod(1);
        assert_eq!(ring.inflight_blocks(), 1);
        assert_eq!(ring.hw_take_sent(), Some(0));
        assert_eq!(ring.hw_take_sent(), None);
        ring.advance_cons(1, 1);
        assert_eq!(ring.inflight_blocks(), 0);
    }
}
