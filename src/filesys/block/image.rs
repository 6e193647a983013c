//! Block device backed by a disk-image file on the host

use crate::filesys::{BlockDevice, FsError};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, error};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

/// Offset of the bytes-per-sector field in a FAT boot sector
const BYTES_PER_SECTOR_OFFSET: u64 = 11;

/// Disk image opened read/write, addressed in fixed-size blocks
pub struct ImageBlockDevice {
    file: File,
    path: PathBuf,
    block_size: usize,
    total_blocks: u64,
}

impl ImageBlockDevice {
    /// Opens an existing image with an explicit block size
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self, FsError> {
        let path = path.as_ref();
        if block_size == 0 {
            return Err(FsError::NotSupported);
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| {
                error!("cannot open image {}: {}", path.display(), e);
                FsError::NotFound
            })?;
        let len = file
            .metadata()
            .map_err(|e| {
                error!("cannot stat image {}: {}", path.display(), e);
                FsError::IoFault
            })?
            .len();

        let total_blocks = len / block_size as u64;
        debug!(
            "opened image {} ({} blocks of {} bytes)",
            path.display(),
            total_blocks,
            block_size
        );

        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size,
            total_blocks,
        })
    }

    /// Opens an image using the sector size recorded in its boot sector
    pub fn open_volume(path: impl AsRef<Path>) -> Result<Self, FsError> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            error!("cannot open image {}: {}", path.display(), e);
            FsError::NotFound
        })?;

        let mut field = [0u8; 2];
        file.seek(SeekFrom::Start(BYTES_PER_SECTOR_OFFSET))
            .and_then(|_| file.read_exact(&mut field))
            .map_err(|e| {
                error!("cannot read boot sector of {}: {}", path.display(), e);
                FsError::InvalidBootSector
            })?;

        let block_size = LittleEndian::read_u16(&field) as usize;
        if !(512..=4096).contains(&block_size) || !block_size.is_power_of_two() {
            return Err(FsError::InvalidBootSector);
        }

        Self::open(path, block_size)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn validate(&self, block_num: u64, len: usize) -> Result<u64, FsError> {
        if block_num >= self.total_blocks || len != self.block_size {
            return Err(FsError::IoFault);
        }
        Ok(block_num * self.block_size as u64)
    }
}

impl BlockDevice for ImageBlockDevice {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        let offset = self.validate(block_num, buf.len())?;
        // Positioned read: `&self` callers share no file cursor.
        self.file.read_exact_at(buf, offset).map_err(|e| {
            error!("read of block {} failed: {}", block_num, e);
            FsError::IoFault
        })
    }

    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        let offset = self.validate(block_num, buf.len())?;
        self.file.write_all_at(buf, offset).map_err(|e| {
            error!("write of block {} failed: {}", block_num, e);
            FsError::IoFault
        })
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    fn flush(&mut self) -> Result<(), FsError> {
        self.file.sync_data().map_err(|e| {
            error!("sync of {} failed: {}", self.path.display(), e);
            FsError::IoFault
        })
    }
}
