//! Creation of empty FAT32 volumes

use super::boot_sector::BootSector;
use super::constants::*;
use super::sector::SectorIo;
use super::volume::Volume;
use crate::filesys::{BlockDevice, FsError};
use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

/// Sector of the FS-info structure written by `format`
const FS_INFO_SECTOR: u16 = 1;

/// Sector of the backup boot sector, when the reserved area is large enough
const BACKUP_BOOT_SECTOR: u16 = 6;

/// Layout parameters for a new volume
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOptions {
    pub bytes_per_sector: u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors: u16,
    pub fat_count: u8,
    pub volume_label: [u8; 11],
    pub volume_id: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            fat_count: 2,
            volume_label: *b"NO NAME    ",
            volume_id: 0x1234_5678,
        }
    }
}

impl FormatOptions {
    fn validate(&self) -> Result<(), FsError> {
        let bps = self.bytes_per_sector;
        if !(512..=4096).contains(&bps) || !bps.is_power_of_two() {
            return Err(FsError::NotSupported);
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(FsError::NotSupported);
        }
        // Boot sector plus FS-info sector at minimum
        if self.fat_count == 0 || self.reserved_sectors <= FS_INFO_SECTOR {
            return Err(FsError::NotSupported);
        }
        Ok(())
    }

    /// Sectors per FAT copy so that every data cluster, plus the two
    /// reserved entries, has an entry
    fn fat_size(&self, total_sectors: u64) -> u64 {
        let spc = self.sectors_per_cluster as u64;
        let entries_per_sector = self.bytes_per_sector as u64 / FAT_ENTRY_SIZE;
        let numerator = total_sectors - self.reserved_sectors as u64 + 2 * spc;
        let denominator = spc * entries_per_sector + self.fat_count as u64;
        numerator.div_ceil(denominator)
    }
}

impl<D: BlockDevice> Volume<D> {
    /// Lays out an empty FAT32 volume over the whole device and mounts it.
    ///
    /// The device block size must equal `options.bytes_per_sector`. The
    /// root directory occupies cluster 2.
    pub fn format(device: D, options: &FormatOptions) -> Result<Self, FsError> {
        options.validate()?;

        let total_sectors = device.total_blocks();
        let total_sectors_32 = u32::try_from(total_sectors).map_err(|_| FsError::NotSupported)?;
        if total_sectors <= options.reserved_sectors as u64 {
            return Err(FsError::NoSpace);
        }
        let fat_size = options.fat_size(total_sectors);
        let spc = options.sectors_per_cluster as u64;
        let first_data_sector = options.reserved_sectors as u64 + options.fat_count as u64 * fat_size;
        if total_sectors < first_data_sector + spc {
            return Err(FsError::NoSpace);
        }
        let fat_size = u32::try_from(fat_size).map_err(|_| FsError::NotSupported)?;

        let mut io = SectorIo::new(device, options.bytes_per_sector as usize)?;

        let boot_sector = BootSector {
            jump_boot: [0xEB, 0x58, 0x90],
            oem_name: *b"FATIMG  ",
            bytes_per_sector: options.bytes_per_sector,
            sectors_per_cluster: options.sectors_per_cluster,
            reserved_sectors: options.reserved_sectors,
            fat_count: options.fat_count,
            root_dir_entries: 0,
            total_sectors_16: 0,
            media_type: MEDIA_FIXED_DISK,
            sectors_per_fat_16: 0,
            sectors_per_track: 32,
            head_count: 64,
            hidden_sectors: 0,
            total_sectors_32,
            sectors_per_fat_32: fat_size,
            extended_flags: 0,
            fs_version: 0,
            root_cluster: FIRST_DATA_CLUSTER,
            fs_info_sector: FS_INFO_SECTOR,
            backup_boot_sector: if options.reserved_sectors > BACKUP_BOOT_SECTOR {
                BACKUP_BOOT_SECTOR
            } else {
                0
            },
            reserved: [0; 12],
            drive_number: 0x80,
            reserved1: 0,
            boot_signature: EXTENDED_BOOT_SIGNATURE,
            volume_id: options.volume_id,
            volume_label: options.volume_label,
            fs_type: *b"FAT32   ",
        };

        let mut sector = io.sector_buffer();
        boot_sector.encode(&mut sector);
        io.write_sector(0, &sector)?;
        if boot_sector.backup_boot_sector != 0 {
            io.write_sector(boot_sector.backup_boot_sector as u64, &sector)?;
        }

        let mut fs_info = io.sector_buffer();
        LittleEndian::write_u32(&mut fs_info[0..4], FSINFO_LEAD_SIGNATURE);
        LittleEndian::write_u32(&mut fs_info[484..488], FSINFO_STRUCT_SIGNATURE);
        LittleEndian::write_u32(&mut fs_info[488..492], FSINFO_UNKNOWN);
        LittleEndian::write_u32(&mut fs_info[492..496], FSINFO_UNKNOWN);
        LittleEndian::write_u32(&mut fs_info[508..512], FSINFO_TRAIL_SIGNATURE);
        io.write_sector(FS_INFO_SECTOR as u64, &fs_info)?;

        // Every FAT copy starts empty apart from the two reserved entries
        // and the root directory's single-cluster chain.
        let zero = io.sector_buffer();
        let mut first_fat_sector = io.sector_buffer();
        LittleEndian::write_u32(&mut first_fat_sector[0..4], 0x0FFF_FF00 | MEDIA_FIXED_DISK as u32);
        LittleEndian::write_u32(&mut first_fat_sector[4..8], END_OF_CHAIN_MARK);
        LittleEndian::write_u32(&mut first_fat_sector[8..12], END_OF_CHAIN_MARK);

        for copy in 0..options.fat_count as u64 {
            let start = options.reserved_sectors as u64 + copy * fat_size as u64;
            io.write_sector(start, &first_fat_sector)?;
            for sector in start + 1..start + fat_size as u64 {
                io.write_sector(sector, &zero)?;
            }
        }

        for sector in first_data_sector..first_data_sector + spc {
            io.write_sector(sector, &zero)?;
        }
        io.sync()?;

        debug!(
            "formatted {} sectors: {} FAT(s) of {} sectors, data from sector {}",
            total_sectors, options.fat_count, fat_size, first_data_sector
        );
        info!("created FAT32 volume {:08X}", options.volume_id);

        Volume::mount(io.into_inner())
    }
}
