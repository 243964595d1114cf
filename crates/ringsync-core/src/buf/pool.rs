use std::io;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::MmapMut;

use crate::buf::layout::BufLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaDirection {
    ToDevice,
    FromDevice,
    Bidirectional,
}

/// Produces the device-visible address of a buffer. Called once per buffer
/// at pool creation and again whenever a slot reports a changed buffer.
pub trait DmaMapper: Send + Sync {
    fn map(&self, buffer_id: u32, vaddr: usize, len: u32, dir: DmaDirection) -> u64;
}

/// Device addresses equal virtual addresses (no IOMMU translation).
pub struct IdentityMapper;

impl DmaMapper for IdentityMapper {
    fn map(&self, _buffer_id: u32, vaddr: usize, _len: u32, _dir: DmaDirection) -> u64 {
        vaddr as u64
    }
}

/// Fixed-size packet buffers shared by every ring of an adapter.
pub struct BufferPool {
    // Keeps the mapping behind `base` alive.
    _region: MmapMut,
    base: *mut u8,
    layout: BufLayout,
    dma: Box<[AtomicU64]>,
    mapper: Box<dyn DmaMapper>,
}

unsafe impl Send for BufferPool {}
unsafe impl Sync for BufferPool {}

impl BufferPool {
    pub fn new(layout: BufLayout, mapper: Box<dyn DmaMapper>) -> io::Result<Self> {
        if layout.buf_size == 0 || layout.buf_count < 2 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer pool needs a non-zero buffer size and at least one usable buffer",
            ));
        }
        let mut region = MmapMut::map_anon(layout.size())?;
        let base = region.as_mut_ptr();

        let dma = (0..layout.buf_count)
            .map(|id| {
                let addr = match layout.id_to_offset(id) {
                    Some(off) => mapper.map(
                        id,
                        base as usize + off,
                        layout.buf_size,
                        DmaDirection::Bidirectional,
                    ),
                    None => 0,
                };
                AtomicU64::new(addr)
            })
            .collect();

        Ok(Self {
            _region: region,
            base,
            layout,
            dma,
            mapper,
        })
    }

    #[inline]
    pub fn layout(&self) -> BufLayout {
        self.layout
    }

    #[inline]
    pub fn buf_size(&self) -> u32 {
        self.layout.buf_size
    }

    #[inline]
    pub fn count(&self) -> u32 {
        self.layout.buf_count
    }

    /// Device address of `id`, or `None` for the sentinel and any id past
    /// the end of the pool.
    #[inline]
    pub fn resolve(&self, id: u32) -> Option<u64> {
        if !self.layout.is_valid(id) {
            return None;
        }
        Some(self.dma[id as usize].load(Ordering::Relaxed))
    }

    /// Recompute the device address of `id` after the consumer swapped it
    /// into a slot.
    pub fn reload_map(&self, id: u32, dir: DmaDirection) -> Option<u64> {
        let off = self.layout.id_to_offset(id)?;
        let addr = self
            .mapper
            .map(id, self.base as usize + off, self.layout.buf_size, dir);
        self.dma[id as usize].store(addr, Ordering::Relaxed);
        Some(addr)
    }

    /// Reverse lookup from a device address.
    pub fn id_for_dma(&self, addr: u64) -> Option<u32> {
        (0..self.layout.buf_count)
            .filter(|&id| self.layout.is_valid(id))
            .find(|&id| self.dma[id as usize].load(Ordering::Relaxed) == addr)
    }

    pub fn data(&self, id: u32) -> Option<&[u8]> {
        let off = self.layout.id_to_offset(id)?;
        Some(unsafe { slice::from_raw_parts(self.base.add(off), self.layout.buf_size as usize) })
    }

    /// Copy `data` into buffer `id`, truncated to the buffer size. Returns
    /// the number of bytes written.
    pub fn write(&self, id: u32, data: &[u8]) -> Option<usize> {
        let off = self.layout.id_to_offset(id)?;
        let len = data.len().min(self.layout.buf_size as usize);
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), self.base.add(off), len) };
        Some(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OffsetMapper;

    impl DmaMapper for OffsetMapper {
        fn map(&self, buffer_id: u32, _vaddr: usize, _len: u32, dir: DmaDirection) -> u64 {
            let bias = if dir == DmaDirection::ToDevice { 0x100 } else { 0 };
            0x1_0000_0000 + u64::from(buffer_id) * 0x1000 + bias
        }
    }

    #[test]
    fn resolve_rejects_sentinel() {
        let pool = BufferPool::new(BufLayout::new(2048, 4), Box::new(IdentityMapper)).expect("pool");
        assert!(pool.resolve(0).is_none());
        assert!(pool.resolve(4).is_none());
        let a1 = pool.resolve(1).expect("buffer 1");
        let a2 = pool.resolve(2).expect("buffer 2");
        assert_eq!(a2 - a1, 2048);
        assert_eq!(pool.id_for_dma(a2), Some(2));
    }

    #[test]
    fn reload_map_updates_cached_address() {
        let pool = BufferPool::new(BufLayout::new(512, 3), Box::new(OffsetMapper)).expect("pool");
        assert_eq!(pool.resolve(2), Some(0x1_0000_2000));
        assert_eq!(pool.reload_map(2, DmaDirection::ToDevice), Some(0x1_0000_2100));
        assert_eq!(pool.resolve(2), Some(0x1_0000_2100));
        assert_eq!(pool.reload_map(0, DmaDirection::ToDevice), None);
    }

    #[test]
    fn write_truncates_to_buffer() {
        let pool = BufferPool::new(BufLayout::new(4, 2), Box::new(IdentityMapper)).expect("pool");
        assert_eq!(pool.write(1, &[1, 2, 3, 4, 5, 6]), Some(4));
        assert_eq!(pool.data(1), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(pool.write(0, &[1]), None);
    }
}
