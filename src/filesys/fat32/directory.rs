//! Directory entry store: searching, listing and mutating records in
//! directory cluster chains

use super::chain::ClusterChain;
use super::constants::*;
use super::dir_entry::{Attributes, DirEntry83, DisplayName, ShortName};
use super::volume::Volume;
use crate::filesys::{BlockDevice, FsError};
use core::ops::ControlFlow;
use log::info;

/// Where a directory record lives on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryLocation {
    /// Absolute sector holding the record
    pub sector: u64,
    /// Record index within that sector
    pub index: usize,
}

impl EntryLocation {
    /// Byte offset of the record within its sector
    pub fn offset(&self) -> usize {
        self.index * DIR_ENTRY_SIZE
    }
}

/// A decoded record together with its location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirSlot {
    pub entry: DirEntry83,
    pub location: EntryLocation,
}

/// What a directory search matches against
#[derive(Debug, Clone, Copy)]
pub enum Lookup<'a> {
    /// Live record whose full 11-byte name equals the target
    Active(&'a ShortName),
    /// Tombstoned record whose bytes 1..11 equal the target's
    Deleted(&'a ShortName),
}

impl Lookup<'_> {
    fn matches(&self, entry: &DirEntry83) -> bool {
        match self {
            Lookup::Active(name) => !entry.is_deleted() && entry.name == **name,
            Lookup::Deleted(name) => entry.is_deleted() && name.matches_tombstone(&entry.name),
        }
    }
}

/// One line of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirListing {
    pub name: DisplayName,
    pub is_dir: bool,
    pub attributes: Attributes,
    pub first_cluster: u32,
    pub size: u32,
}

impl<D: BlockDevice> Volume<D> {
    /// Visits every record of the directory starting at `dir_cluster`, in
    /// on-disk order, until `visit` breaks or the chain is exhausted.
    ///
    /// The end-of-directory record is passed to `visit` like any other; if
    /// `visit` continues past it the walk stops there, without reading the
    /// rest of that sector or any later cluster.
    pub fn walk_directory<T, F>(&self, dir_cluster: u32, mut visit: F) -> Result<Option<T>, FsError>
    where
        F: FnMut(&DirEntry83, EntryLocation) -> ControlFlow<T>,
    {
        let entries_per_sector = self.geometry().entries_per_sector();
        let mut sector_buffer = self.io.sector_buffer();
        let mut chain = ClusterChain::new(dir_cluster);

        while let Some(cluster) = chain.advance(self)? {
            for sector in self.cluster_sectors(cluster)? {
                self.io.read_sector(sector, &mut sector_buffer)?;

                for index in 0..entries_per_sector {
                    let offset = index * DIR_ENTRY_SIZE;
                    let entry = DirEntry83::decode(&sector_buffer[offset..offset + DIR_ENTRY_SIZE]);

                    if let ControlFlow::Break(found) = visit(&entry, EntryLocation { sector, index })
                    {
                        return Ok(Some(found));
                    }
                    if entry.is_end_of_directory() {
                        return Ok(None);
                    }
                }
            }
        }

        Ok(None)
    }

    /// Finds the first record matching `lookup`, stopping at the
    /// end-of-directory marker
    pub fn search(&self, dir_cluster: u32, lookup: Lookup<'_>) -> Result<DirSlot, FsError> {
        self.walk_directory(dir_cluster, |entry, location| {
            if !entry.is_end_of_directory() && lookup.matches(entry) {
                ControlFlow::Break(DirSlot {
                    entry: *entry,
                    location,
                })
            } else {
                ControlFlow::Continue(())
            }
        })?
        .ok_or(FsError::NotFound)
    }

    /// Exact search for a live entry
    pub fn find_entry(&self, name: &ShortName, dir_cluster: u32) -> Result<DirSlot, FsError> {
        self.search(dir_cluster, Lookup::Active(name))
    }

    /// Search for a tombstoned entry whose name matches `name` on every
    /// byte but the first
    pub fn find_deleted_entry(
        &self,
        name: &ShortName,
        dir_cluster: u32,
    ) -> Result<DirSlot, FsError> {
        self.search(dir_cluster, Lookup::Deleted(name))
    }

    /// First record that is unused or tombstoned. The directory is never
    /// grown; a chain with no such record fails with `DirectoryFull`.
    pub fn find_free_slot(&self, dir_cluster: u32) -> Result<EntryLocation, FsError> {
        self.walk_directory(dir_cluster, |entry, location| {
            if entry.is_free() {
                ControlFlow::Break(location)
            } else {
                ControlFlow::Continue(())
            }
        })?
        .ok_or(FsError::DirectoryFull)
    }

    /// Live entries of a directory, excluding deleted records, volume
    /// labels, long-name fragments and the dot entries
    pub fn read_dir(&self, dir_cluster: u32) -> Result<Vec<DirListing>, FsError> {
        let mut listing = Vec::new();
        self.walk_directory::<(), _>(dir_cluster, |entry, _| {
            if entry.is_free() || entry.is_volume_id() || entry.is_dot() {
                return ControlFlow::Continue(());
            }
            let name = entry.get_name();
            if !name.is_empty() {
                listing.push(DirListing {
                    name,
                    is_dir: entry.is_directory(),
                    attributes: entry.attributes,
                    first_cluster: entry.first_cluster(),
                    size: entry.file_size,
                });
            }
            ControlFlow::Continue(())
        })?;
        Ok(listing)
    }

    /// Overwrites the record at `location` and persists its sector
    pub fn write_entry(&mut self, location: EntryLocation, entry: &DirEntry83) -> Result<(), FsError> {
        let mut sector_buffer = self.io.sector_buffer();
        self.io.read_sector(location.sector, &mut sector_buffer)?;

        let offset = location.offset();
        entry.encode(&mut sector_buffer[offset..offset + DIR_ENTRY_SIZE]);

        self.io.write_sector(location.sector, &sector_buffer)
    }

    /// Replaces only the first name byte of the record at `location`
    pub fn set_name_marker(&mut self, location: EntryLocation, marker: u8) -> Result<(), FsError> {
        let mut sector_buffer = self.io.sector_buffer();
        self.io.read_sector(location.sector, &mut sector_buffer)?;
        sector_buffer[location.offset()] = marker;
        self.io.write_sector(location.sector, &sector_buffer)
    }

    /// Tombstones the live file `name` without releasing its clusters.
    /// Directories are refused.
    pub fn delete_entry(&mut self, name: &ShortName, dir_cluster: u32) -> Result<DirSlot, FsError> {
        let slot = self.find_entry(name, dir_cluster)?;
        if slot.entry.is_directory() {
            return Err(FsError::IsADirectory);
        }
        self.set_name_marker(slot.location, DELETED_ENTRY_MARKER)?;
        info!(
            "deleted {} (sector {}, slot {})",
            name, slot.location.sector, slot.location.index
        );
        Ok(slot)
    }

    /// Revives the first tombstone matching `name` on bytes 1..11, writing
    /// `restored` as its first byte. The original first character is gone;
    /// the caller has to supply it.
    pub fn undelete_entry(
        &mut self,
        name: &ShortName,
        dir_cluster: u32,
        restored: u8,
    ) -> Result<DirSlot, FsError> {
        if matches!(restored, END_OF_DIRECTORY_MARKER | DELETED_ENTRY_MARKER | b' ') {
            return Err(FsError::InvalidName);
        }

        let mut slot = self.find_deleted_entry(name, dir_cluster)?;
        self.set_name_marker(slot.location, restored)?;
        slot.entry.name = slot.entry.name.with_first_byte(restored);
        info!(
            "restored {} (sector {}, slot {})",
            slot.entry.name, slot.location.sector, slot.location.index
        );
        Ok(slot)
    }
}
