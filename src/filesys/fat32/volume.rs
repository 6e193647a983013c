//! Mounted volume: storage plus the geometry every component addresses through

use super::boot_sector::{BootSector, VolumeGeometry};
use super::constants::BOOT_SECTOR_SIZE;
use super::sector::SectorIo;
use crate::filesys::{BlockDevice, FsError};
use core::ops::Range;
use log::info;

/// Backing storage together with the parsed boot sector.
///
/// The directory store, the FAT table, the content engine and the import
/// engine are all implemented as methods over this type, each in its own
/// module.
pub struct Volume<D> {
    pub(super) io: SectorIo<D>,
    boot_sector: BootSector,
    geometry: VolumeGeometry,
}

impl<D: BlockDevice> Volume<D> {
    /// Parses the boot sector and validates the layout
    pub fn mount(device: D) -> Result<Self, FsError> {
        if device.block_size() < BOOT_SECTOR_SIZE {
            return Err(FsError::NotSupported);
        }

        let mut first_block = vec![0u8; device.block_size()];
        device.read_block(0, &mut first_block)?;

        let boot_sector = BootSector::decode(&first_block)?;
        let geometry = boot_sector.geometry(device.total_blocks())?;
        let io = SectorIo::new(device, geometry.bytes_per_sector as usize)?;

        info!(
            "mounted FAT32 volume: {} sectors of {} bytes, {} per cluster, {} FAT(s) of {} sectors, root cluster {}",
            geometry.total_sectors,
            geometry.bytes_per_sector,
            geometry.sectors_per_cluster,
            geometry.fat_count,
            geometry.fat_size,
            geometry.root_cluster
        );

        Ok(Self {
            io,
            boot_sector,
            geometry,
        })
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    pub fn boot_sector(&self) -> &BootSector {
        &self.boot_sector
    }

    /// Absolute sectors making up `cluster`
    pub fn cluster_sectors(&self, cluster: u32) -> Result<Range<u64>, FsError> {
        let first = self.geometry.first_sector_of_cluster(cluster)?;
        Ok(first..first + self.geometry.sectors_per_cluster as u64)
    }

    pub fn sync(&mut self) -> Result<(), FsError> {
        self.io.sync()
    }

    /// Unmounts and hands the device back
    pub fn into_device(self) -> D {
        self.io.into_inner()
    }
}
