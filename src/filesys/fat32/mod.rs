//! FAT32 filesystem implementation

use super::{BlockDevice, FsError};
use log::{debug, info};
use std::io::{Read, Seek, Write};

mod allocator;
mod boot_sector;
mod chain;
pub mod constants;
mod dir_entry;
mod directory;
mod fat_entry;
mod file;
mod format;
mod import;
mod sector;
mod volume;

#[cfg(test)]
pub(crate) mod testing;

pub use allocator::{AllocatorKind, ClusterAllocator, LinearScanAllocator, NextFitAllocator};
pub use boot_sector::{BootSector, VolumeGeometry};
pub use chain::ClusterChain;
pub use dir_entry::{Attributes, DirEntry83, DisplayName, ShortName};
pub use directory::{DirListing, DirSlot, EntryLocation, Lookup};
pub use fat_entry::{FatEntry, FatTable};
pub use format::FormatOptions;
pub use sector::SectorIo;
pub use volume::Volume;

/// Run-time knobs for a mounted session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MountOptions {
    pub allocator: AllocatorKind,
}

/// FAT32 filesystem driver: a mounted volume plus the working directory
/// name-level operations resolve against
pub struct Fat32<D> {
    volume: Volume<D>,
    /// First cluster of the current working directory
    current_dir: u32,
    allocator: Box<dyn ClusterAllocator>,
}

impl<D: BlockDevice> Fat32<D> {
    pub fn mount(device: D) -> Result<Self, FsError> {
        Self::mount_with(device, MountOptions::default())
    }

    pub fn mount_with(device: D, options: MountOptions) -> Result<Self, FsError> {
        let volume = Volume::mount(device)?;
        Ok(Self::from_volume(volume, options))
    }

    /// Writes an empty volume onto `device` and mounts it
    pub fn format(device: D, options: &FormatOptions) -> Result<Self, FsError> {
        let volume = Volume::format(device, options)?;
        Ok(Self::from_volume(volume, MountOptions::default()))
    }

    fn from_volume(volume: Volume<D>, options: MountOptions) -> Self {
        let allocator = options.allocator.build();
        debug!("using {} cluster allocator", allocator.name());
        Self {
            current_dir: volume.geometry().root_cluster,
            volume,
            allocator,
        }
    }

    pub fn volume(&self) -> &Volume<D> {
        &self.volume
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        self.volume.geometry()
    }

    pub fn boot_sector(&self) -> &BootSector {
        self.volume.boot_sector()
    }

    pub fn current_dir(&self) -> u32 {
        self.current_dir
    }

    fn root_dir(&self) -> u32 {
        self.geometry().root_cluster
    }

    /// Parses a user-supplied name, refusing names that normalize to
    /// nothing
    fn short_name(name: &str) -> Result<ShortName, FsError> {
        let short = ShortName::parse(name);
        if short.is_blank() {
            return Err(FsError::InvalidName);
        }
        Ok(short)
    }

    /// Looks up a live entry of the current directory
    fn lookup(&self, name: &str) -> Result<DirSlot, FsError> {
        let short = Self::short_name(name)?;
        self.volume.find_entry(&short, self.current_dir)
    }

    fn lookup_file(&self, name: &str) -> Result<DirEntry83, FsError> {
        let slot = self.lookup(name)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory);
        }
        Ok(slot.entry)
    }

    /// Changes the working directory. `/` returns to the root, `.` stays,
    /// and `..` follows the directory's parent record, where cluster 0
    /// stands for the root.
    pub fn change_dir(&mut self, name: &str) -> Result<(), FsError> {
        let target = match name {
            "/" => self.root_dir(),
            "." => self.current_dir,
            ".." if self.current_dir == self.root_dir() => self.current_dir,
            ".." => {
                let parent = self.volume.find_entry(&ShortName::DOTDOT, self.current_dir)?;
                parent.entry.first_cluster()
            }
            _ => {
                let slot = self.lookup(name)?;
                if !slot.entry.is_directory() {
                    return Err(FsError::NotADirectory);
                }
                slot.entry.first_cluster()
            }
        };

        self.current_dir = if target == 0 { self.root_dir() } else { target };
        debug!("current directory is now cluster {}", self.current_dir);
        Ok(())
    }

    /// Entries of the current directory
    pub fn list(&self) -> Result<Vec<DirListing>, FsError> {
        self.volume.read_dir(self.current_dir)
    }

    /// Directory record of `name`, files and directories alike
    pub fn stat(&self, name: &str) -> Result<DirEntry83, FsError> {
        self.lookup(name).map(|slot| slot.entry)
    }

    /// Up to `length` bytes of file `name` from byte `offset`
    pub fn read(&self, name: &str, offset: u32, length: u32) -> Result<Vec<u8>, FsError> {
        let entry = self.lookup_file(name)?;
        self.volume.read_range(&entry, offset, length)
    }

    /// Copies the whole of file `name` into `sink`
    pub fn export<W: Write + ?Sized>(&self, name: &str, sink: &mut W) -> Result<u64, FsError> {
        let entry = self.lookup_file(name)?;
        self.volume.export(&entry, sink)
    }

    /// Creates file `name` in the current directory from `source`
    pub fn import<R: Read + Seek + ?Sized>(
        &mut self,
        name: &str,
        source: &mut R,
    ) -> Result<DirEntry83, FsError> {
        let short = Self::short_name(name)?;
        self.volume
            .import(self.current_dir, &short, source, self.allocator.as_mut())
    }

    pub fn delete(&mut self, name: &str) -> Result<(), FsError> {
        let short = Self::short_name(name)?;
        self.volume.delete_entry(&short, self.current_dir)?;
        Ok(())
    }

    /// Revives a deleted file. Its first character is taken from the
    /// supplied name, since the tombstone overwrote it.
    pub fn undelete(&mut self, name: &str) -> Result<DirEntry83, FsError> {
        let short = Self::short_name(name)?;
        let slot = self
            .volume
            .undelete_entry(&short, self.current_dir, short.first_byte())?;
        Ok(slot.entry)
    }

    /// Flushes the backing storage
    pub fn sync(&mut self) -> Result<(), FsError> {
        self.volume.sync()
    }

    /// Flushes and closes the session, handing the device back
    pub fn into_device(mut self) -> Result<D, FsError> {
        self.sync()?;
        info!("volume closed");
        Ok(self.volume.into_device())
    }
}
