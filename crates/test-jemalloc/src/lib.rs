//! Links jemalloc as the global allocator so the control-channel backend can be
//! tested against the real thing.

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Allocates `count` blocks of `size` bytes and keeps them alive.
pub fn hold(count: usize, size: usize) -> Vec<Vec<u8>> {
    (0..count).map(|i| vec![i as u8; size]).collect()
}
