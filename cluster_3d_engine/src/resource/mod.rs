/// Resource module - GPU memory ownership

pub mod gpu_allocator;

pub use gpu_allocator::*;
