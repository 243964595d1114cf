/// Buffer id 0 never refers to a real buffer.
pub const INVALID_BUFFER: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufLayout {
    pub buf_size: u32,
    pub buf_count: u32,
}

impl BufLayout {
    pub fn new(buf_size: u32, buf_count: u32) -> Self {
        Self {
            buf_size,
            buf_count,
        }
    }

    pub fn size(&self) -> usize {
        (self.buf_size as usize) * (self.buf_count as usize)
    }

    #[inline]
    pub fn is_valid(&self, id: u32) -> bool {
        id != INVALID_BUFFER && id < self.buf_count
    }

    #[inline]
    pub fn id_to_offset(&self, id: u32) -> Option<usize> {
        if self.is_valid(id) {
            Some(id as usize * self.buf_size as usize)
        } else {
            None
        }
    }

    pub fn offset_to_id(&self, offset: usize) -> Option<u32> {
        let id = u32::try_from(offset / self.buf_size as usize).ok()?;
        if offset % self.buf_size as usize == 0 && self.is_valid(id) {
            Some(id)
        } else {
            None
        }
    }
}
