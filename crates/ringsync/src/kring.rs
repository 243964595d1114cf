use std::fmt;

use ringsync_core::ring::RingIndexTranslator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Tx,
    Rx,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RingId {
    pub dir: Direction,
    pub index: u16,
}

impl RingId {
    pub fn tx(index: u16) -> Self {
        Self { dir: Direction::Tx, index }
    }

    pub fn rx(index: u16) -> Self {
        Self { dir: Direction::Rx, index }
    }
}

impl fmt::Display for RingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dir {
            Direction::Tx => write!(f, "tx{}", self.index),
            Direction::Rx => write!(f, "rx{}", self.index),
        }
    }
}

/// Synchronizer-private view of one ring. Never visible to the consumer;
/// `hw_avail` is mirrored into the shared ring only at the end of a sync.
#[derive(Debug, Clone)]
pub struct KRing {
    pub(crate) id: RingId,
    pub(crate) num_slots: u32,
    pub(crate) hw_cur: u32,
    pub(crate) hw_avail: u32,
    pub(crate) hwofs: u32,
    pub(crate) pending_intr: bool,
}

impl KRing {
    pub(crate) fn new(id: RingId, num_slots: u32) -> Self {
        Self {
            id,
            num_slots,
            hw_cur: 0,
            hw_avail: 0,
            hwofs: 0,
            pending_intr: false,
        }
    }

    pub fn id(&self) -> RingId {
        self.id
    }

    pub fn num_slots(&self) -> u32 {
        self.num_slots
    }

    /// Largest valid index, also the index mask.
    #[inline]
    pub fn lim(&self) -> u32 {
        self.num_slots - 1
    }

    pub fn hw_cur(&self) -> u32 {
        self.hw_cur
    }

    pub fn hw_avail(&self) -> u32 {
        self.hw_avail
    }

    pub fn hwofs(&self) -> u32 {
        self.hwofs
    }

    pub fn pending_intr(&self) -> bool {
        self.pending_intr
    }

    #[inline]
    pub fn translator(&self) -> RingIndexTranslator {
        RingIndexTranslator::new(self.hwofs, self.lim())
    }
}
