//! In-memory block device implementation

use crate::filesys::{BlockDevice, FsError};
use core::result::Result;

/// Block device that stores data in memory
pub struct MemoryBlockDevice {
    /// Blocks of data, each block_size bytes
    blocks: Vec<Vec<u8>>,

    /// Size of each block in bytes
    block_size: usize,
}

impl MemoryBlockDevice {
    /// Creates a new zero-filled memory block device with given size
    pub fn new(total_blocks: u64, block_size: usize) -> Self {
        let blocks = (0..total_blocks).map(|_| vec![0; block_size]).collect();
        Self { blocks, block_size }
    }

    /// Splits a flat image into blocks. A trailing partial block is dropped.
    pub fn from_bytes(image: &[u8], block_size: usize) -> Self {
        let blocks = image
            .chunks_exact(block_size)
            .map(|chunk| chunk.to_vec())
            .collect();
        Self { blocks, block_size }
    }

    /// Concatenates every block back into a flat image
    pub fn into_bytes(self) -> Vec<u8> {
        self.blocks.concat()
    }

    /// Validates block number is within bounds
    fn validate_block(&self, block_num: u64) -> Result<(), FsError> {
        if block_num >= self.blocks.len() as u64 {
            return Err(FsError::IoFault);
        }
        Ok(())
    }

    /// Validates buffer is correct block size
    fn validate_buffer(&self, buf: &[u8]) -> Result<(), FsError> {
        if buf.len() != self.block_size {
            return Err(FsError::IoFault);
        }
        Ok(())
    }
}

impl BlockDevice for MemoryBlockDevice {
    /// Reads block into buffer
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.validate_block(block_num)?;
        self.validate_buffer(buf)?;
        buf.copy_from_slice(&self.blocks[block_num as usize]);
        Ok(())
    }

    /// Writes buffer to block
    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        self.validate_block(block_num)?;
        self.validate_buffer(buf)?;
        self.blocks[block_num as usize].copy_from_slice(buf);
        Ok(())
    }

    /// Returns size of each block
    fn block_size(&self) -> usize {
        self.block_size
    }

    /// Returns total number of blocks
    fn total_blocks(&self) -> u64 {
        self.blocks.len() as u64
    }
}
