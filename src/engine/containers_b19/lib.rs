mod slot;
pub use slot::*;

mod chunk_allocator;
pub use chunk_allocator::*;
