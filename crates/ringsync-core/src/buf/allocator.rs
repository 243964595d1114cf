use std::collections::VecDeque;

use crate::buf::layout::BufLayout;

/// Free list of buffer ids. The sentinel is never handed out.
pub struct BufferAllocator {
    free: VecDeque<u32>,
    layout: BufLayout,
}

impl BufferAllocator {
    pub fn new(layout: BufLayout) -> Self {
        let free = (0..layout.buf_count)
            .filter(|&id| layout.is_valid(id))
            .collect();
        Self { free, layout }
    }

    pub fn allocate(&mut self) -> Option<u32> {
        self.free.pop_front()
    }

    /// All `n` ids or none.
    pub fn allocate_n(&mut self, n: usize) -> Option<Vec<u32>> {
        if self.free.len() < n {
            return None;
        }
        Some(self.free.drain(..n).collect())
    }

    pub fn release(&mut self, id: u32) {
        if self.layout.is_valid(id) {
            self.free.push_back(id);
        }
    }

    pub fn release_all<I: IntoIterator<Item = u32>>(&mut self, ids: I) {
        for id in ids {
            self.release(id);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}
