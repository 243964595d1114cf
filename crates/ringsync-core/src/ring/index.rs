//! Index arithmetic between the shared ring and a hardware ring.
//!
//! Both index spaces have the same power-of-two size. `hwofs` is the
//! distance from a shared index to the hardware index that backs it and
//! only changes when a ring is reset.

#[inline]
pub fn to_hw(shared_idx: u32, hwofs: u32, mask: u32) -> u32 {
    shared_idx.wrapping_add(hwofs) & mask
}

#[inline]
pub fn to_shared(hw_idx: u32, hwofs: u32, mask: u32) -> u32 {
    hw_idx.wrapping_sub(hwofs) & mask
}

/// Number of steps from `from` to `to` going forward around the ring.
#[inline]
pub fn distance(from: u32, to: u32, mask: u32) -> u32 {
    to.wrapping_sub(from) & mask
}

#[inline]
pub fn next(idx: u32, mask: u32) -> u32 {
    idx.wrapping_add(1) & mask
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingIndexTranslator {
    hwofs: u32,
    mask: u32,
}

impl RingIndexTranslator {
    pub fn new(hwofs: u32, mask: u32) -> Self {
        Self {
            hwofs: hwofs & mask,
            mask,
        }
    }

    /// Translator that maps `shared_idx` onto `hw_idx`.
    pub fn aligned(shared_idx: u32, hw_idx: u32, mask: u32) -> Self {
        Self::new(hw_idx.wrapping_sub(shared_idx), mask)
    }

    #[inline]
    pub fn hwofs(&self) -> u32 {
        self.hwofs
    }

    #[inline]
    pub fn to_hw(&self, shared_idx: u32) -> u32 {
        to_hw(shared_idx, self.hwofs, self.mask)
    }

    #[inline]
    pub fn to_shared(&self, hw_idx: u32) -> u32 {
        to_shared(hw_idx, self.hwofs, self.mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_at_mask() {
        assert_eq!(to_hw(6, 3, 7), 1);
        assert_eq!(to_shared(1, 3, 7), 6);
        assert_eq!(to_hw(7, 0, 7), 7);
    }

    #[test]
    fn bijection_for_every_offset() {
        let mask = 15;
        for ofs in 0..=mask {
            for idx in 0..=mask {
                assert_eq!(to_shared(to_hw(idx, ofs, mask), ofs, mask), idx);
            }
        }
    }

    #[test]
    fn aligned_maps_requested_pair() {
        let t = RingIndexTranslator::aligned(5, 2, 7);
        assert_eq!(t.to_hw(5), 2);
        assert_eq!(t.to_shared(2), 5);
        assert_eq!(t.to_hw(7), 4);
    }

    #[test]
    fn distance_wraps() {
        assert_eq!(distance(6, 1, 7), 3);
        assert_eq!(distance(3, 3, 7), 0);
        assert_eq!(next(7, 7), 0);
    }
}
