pub mod allocator;
pub mod layout;
pub mod pool;

pub use allocator::BufferAllocator;
pub use layout::BufLayout;
pub use pool::{BufferPool, DmaDirection, DmaMapper, IdentityMapper};
