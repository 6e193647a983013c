use core::fmt;
use core::result::Result;

pub mod block;
pub mod fat32;

// Define error types for the filesystem operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Sector read/write failed, was short, or addressed past the device
    IoFault,
    /// Operation attempted with no volume open
    NotOpen,
    /// A volume is already open in this session
    AlreadyOpen,
    /// Name lookup miss, active or deleted
    NotFound,
    AlreadyExists,
    InvalidName,
    NotADirectory,
    IsADirectory,
    /// Requested byte offset at or beyond the file size
    Range,
    /// Cluster chain ended early or pointed outside the data region
    Chain,
    /// No free directory slot and growing the directory is unsupported
    DirectoryFull,
    /// FAT scan found no free cluster
    NoSpace,
    InvalidBootSector,
    NotSupported,
    FileTooLarge,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::IoFault => write!(f, "I/O fault on the volume image"),
            FsError::NotOpen => write!(f, "File system not open"),
            FsError::AlreadyOpen => write!(f, "File system image already open"),
            FsError::NotFound => write!(f, "File not found"),
            FsError::AlreadyExists => write!(f, "File already exists"),
            FsError::InvalidName => write!(f, "Invalid file name"),
            FsError::NotADirectory => write!(f, "Not a directory"),
            FsError::IsADirectory => write!(f, "Is a directory"),
            FsError::Range => write!(f, "Position outside file bounds"),
            FsError::Chain => write!(f, "Invalid cluster chain"),
            FsError::DirectoryFull => write!(f, "Directory full"),
            FsError::NoSpace => write!(f, "No free clusters available"),
            FsError::InvalidBootSector => write!(f, "Invalid FAT32 boot sector"),
            FsError::NotSupported => write!(f, "Operation not supported"),
            FsError::FileTooLarge => write!(f, "File too large for FAT32"),
        }
    }
}

impl std::error::Error for FsError {}

// Core traits for filesystem abstraction

/// Represents a block device that can be read from and written to
pub trait BlockDevice: Send + Sync {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError>;
    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError>;
    fn block_size(&self) -> usize;
    fn total_blocks(&self) -> u64;

    /// Pushes buffered writes down to the backing storage
    fn flush(&mut self) -> Result<(), FsError> {
        Ok(())
    }
}

impl<T: BlockDevice + ?Sized> BlockDevice for Box<T> {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        (**self).read_block(block_num, buf)
    }

    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        (**self).write_block(block_num, buf)
    }

    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn total_blocks(&self) -> u64 {
        (**self).total_blocks()
    }

    fn flush(&mut self) -> Result<(), FsError> {
        (**self).flush()
    }
}
