//! FAT32 file allocation table entries and the mirrored table they live in

use super::constants::*;
use super::volume::Volume;
use crate::filesys::{BlockDevice, FsError};
use byteorder::{ByteOrder, LittleEndian};
use log::warn;

/// Represents the 28 significant bits of a FAT entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FatEntry {
    /// Cluster number or special value (0=free, >=0x0FFFFFF8=end)
    pub cluster: u32,
}

impl FatEntry {
    /// Masks a raw on-disk word down to its significant bits
    pub fn from_raw(raw: u32) -> Self {
        Self {
            cluster: raw & FAT_ENTRY_MASK,
        }
    }

    /// Returns true if this entry marks the end of a cluster chain
    pub fn is_end_of_chain(&self) -> bool {
        self.cluster >= END_OF_CHAIN
    }

    /// Returns true if this cluster is unused/free
    pub fn is_free(&self) -> bool {
        self.cluster == FREE_CLUSTER
    }

    /// Successor cluster, or None at the end of the chain
    pub fn next_cluster(&self) -> Option<u32> {
        if self.is_end_of_chain() {
            None
        } else {
            Some(self.cluster)
        }
    }
}

/// Access to the allocation table of a volume
pub trait FatTable {
    /// Reads the entry of `cluster` from the primary FAT
    fn entry(&self, cluster: u32) -> Result<FatEntry, FsError>;

    /// Replaces the low 28 bits of `cluster`'s entry in every FAT copy
    fn set_entry(&mut self, cluster: u32, value: u32) -> Result<(), FsError>;

    /// One past the highest cluster number the table describes
    fn cluster_limit(&self) -> u32;
}

impl<D: BlockDevice> FatTable for Volume<D> {
    fn entry(&self, cluster: u32) -> Result<FatEntry, FsError> {
        let (sector, offset) = self.geometry().fat_sector_and_offset(cluster)?;

        let mut sector_data = self.io.sector_buffer();
        self.io.read_sector(sector, &mut sector_data)?;

        let raw = LittleEndian::read_u32(&sector_data[offset..offset + 4]);
        Ok(FatEntry::from_raw(raw))
    }

    fn set_entry(&mut self, cluster: u32, value: u32) -> Result<(), FsError> {
        let geometry = *self.geometry();
        let (sector, offset) = geometry.fat_sector_and_offset(cluster)?;

        let mut sector_data = self.io.sector_buffer();
        self.io.read_sector(sector, &mut sector_data)?;

        let word = &mut sector_data[offset..offset + 4];
        let raw = LittleEndian::read_u32(word);
        LittleEndian::write_u32(
            word,
            (raw & FAT_RESERVED_MASK) | (value & FAT_ENTRY_MASK),
        );

        self.io.write_sector(sector, &sector_data)?;

        // Mirrors are best effort; earlier copies are not rolled back.
        for copy in 1..geometry.fat_count {
            let mirror = geometry.fat_copy_sector(sector, copy);
            if let Err(e) = self.io.write_sector(mirror, &sector_data) {
                warn!(
                    "FAT copy {} not updated for cluster {} (sector {}): {}",
                    copy, cluster, mirror, e
                );
            }
        }

        Ok(())
    }

    fn cluster_limit(&self) -> u32 {
        self.geometry().cluster_limit()
    }
}
