//! Storage backends a volume can be mounted on

pub mod image;
pub mod memory;

pub use image::ImageBlockDevice;
pub use memory::MemoryBlockDevice;
