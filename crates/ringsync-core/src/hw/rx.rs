/// Receive descriptor: where the device may write the next packet.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RxDesc {
    pub byte_count: u32,
    pub lkey: u32,
    pub addr: u64,
}

impl RxDesc {
    pub fn new(addr: u64, buf_size: u32, lkey: u32) -> Self {
        Self {
            byte_count: buf_size.to_be(),
            lkey: lkey.to_be(),
            addr: addr.to_be(),
        }
    }

    pub fn addr(&self) -> u64 {
        u64::from_be(self.addr)
    }

    pub fn byte_count(&self) -> u32 {
        u32::from_be(self.byte_count)
    }
}

pub struct HwRxRing {
    descs: Box<[RxDesc]>,
    size: u32,
    size_mask: u32,
    prod: u32,
    cons: u32,
    db_record: u32,
    lkey: u32,
    // Device-side fill cursor; only the device (or a simulated one) moves it.
    filled: u32,
}

impl HwRxRing {
    /// # Panics
    ///
    /// If `size` is not a power of two.
    pub fn new(size: u32, lkey: u32) -> Self {
        assert!(size.is_power_of_two(), "rx ring size {size} is not a power of two");
        Self {
            descs: vec![RxDesc::default(); size as usize].into_boxed_slice(),
            size,
            size_mask: size - 1,
            prod: 0,
            cons: 0,
            db_record: 0,
            lkey,
            filled: 0,
        }
    }

    pub fn reinit(&mut self) {
        self.descs.fill(RxDesc::default());
        self.prod = 0;
        self.cons = 0;
        self.db_record = 0;
        self.filled = 0;
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

    /// Next descriptor the driver expects a completion for.
    #[inline]
    pub fn cons(&self) -> u32 {
        self.cons
    }

    #[inline]
    pub fn lkey(&self) -> u32 {
        self.lkey
    }

    /// Descriptors handed to the device and not yet imported.
    #[inline]
    pub fn posted(&self) -> u32 {
        self.prod.wrapping_sub(self.cons)
    }

    #[inline]
    pub fn desc(&self, idx: u32) -> &RxDesc {
        &self.descs[(idx & self.size_mask) as usize]
    }

    #[inline]
    pub fn write_desc(&mut self, idx: u32, desc: RxDesc) {
        self.descs[(idx & self.size_mask) as usize] = desc;
    }

    #[inline]
    pub fn advance_prod(&mut self, n: u32) {
        self.prod = self.prod.wrapping_add(n);
    }

    #[inline]
    pub fn advance_cons(&mut self, n: u32) {
        self.cons = self.cons.wrapping_add(n);
    }

    /// Tell the device how far it may fill.
    #[inline]
    pub fn update_db_record(&mut self) {
        self.db_record = (self.prod & 0xffff).to_be();
    }

    #[inline]
    pub fn db_record(&self) -> u32 {
        u32::from_be(self.db_record)
    }

    /// Device side: claim the next posted descriptor for an incoming
    /// packet. Only descriptors published through the doorbell record are
    /// visible.
    pub fn hw_take_posted(&mut self) -> Option<(u32, RxDesc)> {
        let published = self.db_record();
        if (self.filled & 0xffff) == published {
            return None;
        }
        let idx = self.filled & self.size_mask;
        self.filled = self.filled.wrapping_add(1);
        Some((idx, self.descs[idx as usize]))
    }
}
