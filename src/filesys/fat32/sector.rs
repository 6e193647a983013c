//! Whole-sector access to the backing storage.
//!
//! This is the only place the driver touches the device; every layer above
//! resolves its addressing to whole sectors first.

use crate::filesys::{BlockDevice, FsError};
use log::trace;

/// Exclusive owner of the volume's backing storage
pub struct SectorIo<D> {
    device: D,
    bytes_per_sector: usize,
}

impl<D: BlockDevice> SectorIo<D> {
    /// Wraps a device whose block size must equal the volume's sector size
    pub fn new(device: D, bytes_per_sector: usize) -> Result<Self, FsError> {
        if device.block_size() != bytes_per_sector {
            return Err(FsError::NotSupported);
        }
        Ok(Self {
            device,
            bytes_per_sector,
        })
    }

    pub fn bytes_per_sector(&self) -> usize {
        self.bytes_per_sector
    }

    /// Number of sectors the device can address
    pub fn total_sectors(&self) -> u64 {
        self.device.total_blocks()
    }

    /// Fresh zeroed scratch buffer of one sector
    pub fn sector_buffer(&self) -> Vec<u8> {
        vec![0u8; self.bytes_per_sector]
    }

    pub fn read_sector(&self, sector: u64, buf: &mut [u8]) -> Result<(), FsError> {
        trace!("read sector {}", sector);
        self.device.read_block(sector, buf)
    }

    pub fn write_sector(&mut self, sector: u64, buf: &[u8]) -> Result<(), FsError> {
        trace!("write sector {}", sector);
        self.device.write_block(sector, buf)
    }

    pub fn sync(&mut self) -> Result<(), FsError> {
        self.device.flush()
    }

    /// Releases the device
    pub fn into_inner(self) -> D {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesys::block::MemoryBlockDevice;

    #[test]
    fn test_block_size_must_match() {
        let device = MemoryBlockDevice::new(8, 1024);
        assert!(matches!(
            SectorIo::new(device, 512),
            Err(FsError::NotSupported)
        ));
    }

    #[test]
    fn test_sector_round_trip() {
        let mut io = SectorIo::new(MemoryBlockDevice::new(8, 512), 512).unwrap();
        let mut buf = io.sector_buffer();
        buf[0] = 0x42;
        io.write_sector(7, &buf).unwrap();

        let mut read = io.sector_buffer();
        io.read_sector(7, &mut read).unwrap();
        assert_eq!(read[0], 0x42);
        assert_eq!(io.read_sector(8, &mut read), Err(FsError::IoFault));
    }
}
