//! FAT32 boot sector codec and the volume geometry derived from it

use super::constants::*;
use crate::filesys::FsError;
use byteorder::{ByteOrder, LittleEndian};
use core::fmt;
use log::warn;

/// Represents the boot sector of a FAT32 filesystem.
///
/// Fields are decoded from fixed little-endian offsets; nothing here relies
/// on the in-memory layout of the struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootSector {
    /// Jump instruction to boot code
    pub jump_boot: [u8; 3],

    /// Name of the system that formatted the volume
    pub oem_name: [u8; 8],

    /// Number of bytes per sector
    pub bytes_per_sector: u16,

    /// Number of sectors per cluster
    pub sectors_per_cluster: u8,

    /// Number of reserved sectors at start of volume, including the boot sector
    pub reserved_sectors: u16,

    /// Number of FAT copies
    pub fat_count: u8,

    /// Root directory entries; zero on FAT32
    pub root_dir_entries: u16,

    /// Total number of sectors (16-bit), zero when total_sectors_32 is used
    pub total_sectors_16: u16,

    /// Media type descriptor
    pub media_type: u8,

    /// Sectors per FAT on FAT12/16; zero on FAT32
    pub sectors_per_fat_16: u16,

    pub sectors_per_track: u16,
    pub head_count: u16,
    pub hidden_sectors: u32,

    /// Total number of sectors (32-bit)
    pub total_sectors_32: u32,

    /// Size of each FAT copy in sectors
    pub sectors_per_fat_32: u32,

    /// Mirroring / active-FAT flags
    pub extended_flags: u16,

    pub fs_version: u16,

    /// First cluster of the root directory
    pub root_cluster: u32,

    /// Sector number of the FS-info structure
    pub fs_info_sector: u16,

    /// Sector number of the backup boot sector
    pub backup_boot_sector: u16,

    pub reserved: [u8; 12],
    pub drive_number: u8,
    pub reserved1: u8,
    pub boot_signature: u8,
    pub volume_id: u32,
    pub volume_label: [u8; 11],
    pub fs_type: [u8; 8],
}

impl BootSector {
    /// Decodes the BPB from the first sector of the volume
    pub fn decode(sector: &[u8]) -> Result<Self, FsError> {
        if sector.len() < BOOT_SECTOR_SIZE {
            return Err(FsError::InvalidBootSector);
        }
        if sector[510..512] != BOOT_SIGNATURE {
            return Err(FsError::InvalidBootSector);
        }

        let mut boot_sector = BootSector {
            jump_boot: [0; 3],
            oem_name: [0; 8],
            bytes_per_sector: LittleEndian::read_u16(&sector[11..13]),
            sectors_per_cluster: sector[13],
            reserved_sectors: LittleEndian::read_u16(&sector[14..16]),
            fat_count: sector[16],
            root_dir_entries: LittleEndian::read_u16(&sector[17..19]),
            total_sectors_16: LittleEndian::read_u16(&sector[19..21]),
            media_type: sector[21],
            sectors_per_fat_16: LittleEndian::read_u16(&sector[22..24]),
            sectors_per_track: LittleEndian::read_u16(&sector[24..26]),
            head_count: LittleEndian::read_u16(&sector[26..28]),
            hidden_sectors: LittleEndian::read_u32(&sector[28..32]),
            total_sectors_32: LittleEndian::read_u32(&sector[32..36]),
            sectors_per_fat_32: LittleEndian::read_u32(&sector[36..40]),
            extended_flags: LittleEndian::read_u16(&sector[40..42]),
            fs_version: LittleEndian::read_u16(&sector[42..44]),
            root_cluster: LittleEndian::read_u32(&sector[44..48]),
            fs_info_sector: LittleEndian::read_u16(&sector[48..50]),
            backup_boot_sector: LittleEndian::read_u16(&sector[50..52]),
            reserved: [0; 12],
            drive_number: sector[64],
            reserved1: sector[65],
            boot_signature: sector[66],
            volume_id: LittleEndian::read_u32(&sector[67..71]),
            volume_label: [0; 11],
            fs_type: [0; 8],
        };
        boot_sector.jump_boot.copy_from_slice(&sector[0..3]);
        boot_sector.oem_name.copy_from_slice(&sector[3..11]);
        boot_sector.reserved.copy_from_slice(&sector[52..64]);
        boot_sector.volume_label.copy_from_slice(&sector[71..82]);
        boot_sector.fs_type.copy_from_slice(&sector[82..90]);

        Ok(boot_sector)
    }

    /// Writes the BPB and the trailing signature into a sector buffer.
    /// Boot code bytes outside the BPB are left as they are.
    pub fn encode(&self, sector: &mut [u8]) {
        sector[0..3].copy_from_slice(&self.jump_boot);
        sector[3..11].copy_from_slice(&self.oem_name);
        LittleEndian::write_u16(&mut sector[11..13], self.bytes_per_sector);
        sector[13] = self.sectors_per_cluster;
        LittleEndian::write_u16(&mut sector[14..16], self.reserved_sectors);
        sector[16] = self.fat_count;
        LittleEndian::write_u16(&mut sector[17..19], self.root_dir_entries);
        LittleEndian::write_u16(&mut sector[19..21], self.total_sectors_16);
        sector[21] = self.media_type;
        LittleEndian::write_u16(&mut sector[22..24], self.sectors_per_fat_16);
        LittleEndian::write_u16(&mut sector[24..26], self.sectors_per_track);
        LittleEndian::write_u16(&mut sector[26..28], self.head_count);
        LittleEndian::write_u32(&mut sector[28..32], self.hidden_sectors);
        LittleEndian::write_u32(&mut sector[32..36], self.total_sectors_32);
        LittleEndian::write_u32(&mut sector[36..40], self.sectors_per_fat_32);
        LittleEndian::write_u16(&mut sector[40..42], self.extended_flags);
        LittleEndian::write_u16(&mut sector[42..44], self.fs_version);
        LittleEndian::write_u32(&mut sector[44..48], self.root_cluster);
        LittleEndian::write_u16(&mut sector[48..50], self.fs_info_sector);
        LittleEndian::write_u16(&mut sector[50..52], self.backup_boot_sector);
        sector[52..64].copy_from_slice(&self.reserved);
        sector[64] = self.drive_number;
        sector[65] = self.reserved1;
        sector[66] = self.boot_signature;
        LittleEndian::write_u32(&mut sector[67..71], self.volume_id);
        sector[71..82].copy_from_slice(&self.volume_label);
        sector[82..90].copy_from_slice(&self.fs_type);
        sector[510..512].copy_from_slice(&BOOT_SIGNATURE);
    }

    /// Validates the parameters and derives the addressing geometry.
    ///
    /// `device_sectors` bounds the volume when the boot sector claims more
    /// sectors than the backing storage holds.
    pub fn geometry(&self, device_sectors: u64) -> Result<VolumeGeometry, FsError> {
        let bytes_per_sector = self.bytes_per_sector as u32;
        if !(512..=4096).contains(&bytes_per_sector) || !bytes_per_sector.is_power_of_two() {
            return Err(FsError::InvalidBootSector);
        }
        if self.sectors_per_cluster == 0 || !self.sectors_per_cluster.is_power_of_two() {
            return Err(FsError::InvalidBootSector);
        }
        if self.fat_count == 0 || self.reserved_sectors == 0 {
            return Err(FsError::InvalidBootSector);
        }
        // FAT12/FAT16 keep a fixed root directory and a 16-bit FAT size.
        if self.sectors_per_fat_16 != 0 || self.root_dir_entries != 0 {
            return Err(FsError::NotSupported);
        }
        if self.sectors_per_fat_32 == 0 {
            return Err(FsError::InvalidBootSector);
        }

        let declared = match self.total_sectors_32 {
            0 => self.total_sectors_16 as u64,
            n => n as u64,
        };
        let total_sectors = if declared == 0 || declared > device_sectors {
            if declared > device_sectors {
                warn!(
                    "boot sector declares {} sectors but the image holds {}",
                    declared, device_sectors
                );
            }
            device_sectors
        } else {
            declared
        };

        let geometry = VolumeGeometry {
            bytes_per_sector,
            sectors_per_cluster: self.sectors_per_cluster as u32,
            reserved_sectors: self.reserved_sectors as u32,
            fat_count: self.fat_count as u32,
            fat_size: self.sectors_per_fat_32,
            root_cluster: self.root_cluster,
            total_sectors,
            extended_flags: self.extended_flags,
            fs_info_sector: self.fs_info_sector,
        };

        if total_sectors <= geometry.first_data_sector() {
            return Err(FsError::InvalidBootSector);
        }
        if self.root_cluster < FIRST_DATA_CLUSTER || self.root_cluster >= geometry.cluster_limit()
        {
            return Err(FsError::InvalidBootSector);
        }

        Ok(geometry)
    }
}

/// Addressing parameters of an open volume. Immutable once mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector: u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors: u32,
    pub fat_count: u32,
    /// Sectors per FAT copy
    pub fat_size: u32,
    pub root_cluster: u32,
    /// Sectors addressable on the volume
    pub total_sectors: u64,
    pub extended_flags: u16,
    pub fs_info_sector: u16,
}

impl VolumeGeometry {
    /// First sector after the reserved area and every FAT copy
    pub fn first_data_sector(&self) -> u64 {
        self.reserved_sectors as u64 + self.fat_count as u64 * self.fat_size as u64
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector * self.sectors_per_cluster
    }

    /// Directory records held by one sector
    pub fn entries_per_sector(&self) -> usize {
        self.bytes_per_sector as usize / DIR_ENTRY_SIZE
    }

    /// Entries one FAT copy can hold, reserved entries 0 and 1 included
    pub fn fat_entries(&self) -> u64 {
        self.fat_size as u64 * self.bytes_per_sector as u64 / FAT_ENTRY_SIZE
    }

    /// One past the highest cluster number that maps to storage and has a FAT entry
    pub fn cluster_limit(&self) -> u32 {
        let data_sectors = self.total_sectors.saturating_sub(self.first_data_sector());
        let data_clusters = data_sectors / self.sectors_per_cluster as u64;
        let limit = (data_clusters + FIRST_DATA_CLUSTER as u64).min(self.fat_entries());
        limit.min(END_OF_CHAIN as u64) as u32
    }

    /// Whether `cluster` names a data cluster of this volume
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= FIRST_DATA_CLUSTER && cluster < self.cluster_limit()
    }

    /// Converts cluster number to absolute sector number
    pub fn first_sector_of_cluster(&self, cluster: u32) -> Result<u64, FsError> {
        if !self.is_data_cluster(cluster) {
            return Err(FsError::Chain);
        }
        Ok(self.first_data_sector()
            + (cluster - FIRST_DATA_CLUSTER) as u64 * self.sectors_per_cluster as u64)
    }

    /// Sector of the primary FAT holding `cluster`'s entry, and the byte
    /// offset of the entry within that sector
    pub fn fat_sector_and_offset(&self, cluster: u32) -> Result<(u64, usize), FsError> {
        if cluster >= self.cluster_limit() {
            return Err(FsError::Chain);
        }
        let byte_offset = cluster as u64 * FAT_ENTRY_SIZE;
        let sector = self.reserved_sectors as u64 + byte_offset / self.bytes_per_sector as u64;
        let offset = (byte_offset % self.bytes_per_sector as u64) as usize;
        Ok((sector, offset))
    }

    /// Sector of FAT copy `copy` that mirrors `primary_sector`
    pub fn fat_copy_sector(&self, primary_sector: u64, copy: u32) -> u64 {
        primary_sector + copy as u64 * self.fat_size as u64
    }
}

impl fmt::Display for VolumeGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: [(&str, u64); 8] = [
            ("bytes per sector", self.bytes_per_sector as u64),
            ("sectors per cluster", self.sectors_per_cluster as u64),
            ("reserved sectors", self.reserved_sectors as u64),
            ("number of FATs", self.fat_count as u64),
            ("FAT size (sectors)", self.fat_size as u64),
            ("extended flags", self.extended_flags as u64),
            ("root cluster", self.root_cluster as u64),
            ("FS info sector", self.fs_info_sector as u64),
        ];
        for (label, value) in rows {
            writeln!(f, "{:<20} 0x{:X} ({})", label, value, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BootSector {
        BootSector {
            jump_boot: [0xEB, 0x58, 0x90],
            oem_name: *b"FATIMG  ",
            bytes_per_sector: 512,
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            fat_count: 2,
            root_dir_entries: 0,
            total_sectors_16: 0,
            media_type: MEDIA_FIXED_DISK,
            sectors_per_fat_16: 0,
            sectors_per_track: 63,
            head_count: 255,
            hidden_sectors: 0,
            total_sectors_32: 4096,
            sectors_per_fat_32: 32,
            extended_flags: 0,
            fs_version: 0,
            root_cluster: 2,
            fs_info_sector: 1,
            backup_boot_sector: 6,
            reserved: [0; 12],
            drive_number: 0x80,
            reserved1: 0,
            boot_signature: EXTENDED_BOOT_SIGNATURE,
            volume_id: 0x1234_5678,
            volume_label: *b"NO NAME    ",
            fs_type: *b"FAT32   ",
        }
    }

    #[test]
    fn test_encode_decode() {
        let boot_sector = sample();
        let mut sector = vec![0u8; 512];
        boot_sector.encode(&mut sector);

        assert_eq!(&sector[11..13], &[0x00, 0x02]);
        assert_eq!(&sector[44..48], &[2, 0, 0, 0]);
        assert_eq!(&sector[510..512], &BOOT_SIGNATURE);
        assert_eq!(BootSector::decode(&sector).unwrap(), boot_sector);
    }

    #[test]
    fn test_missing_signature() {
        let mut sector = vec![0u8; 512];
        sample().encode(&mut sector);
        sector[511] = 0;
        assert_eq!(BootSector::decode(&sector), Err(FsError::InvalidBootSector));
    }

    #[test]
    fn test_fat16_rejected() {
        let mut boot_sector = sample();
        boot_sector.sectors_per_fat_16 = 20;
        assert_eq!(boot_sector.geometry(4096), Err(FsError::NotSupported));
    }

    #[test]
    fn test_bad_cluster_size() {
        let mut boot_sector = sample();
        boot_sector.sectors_per_cluster = 3;
        assert_eq!(boot_sector.geometry(4096), Err(FsError::InvalidBootSector));
    }

    #[test]
    fn test_cluster_addressing() {
        let geometry = sample().geometry(4096).unwrap();
        assert_eq!(geometry.first_data_sector(), 32 + 2 * 32);
        assert_eq!(geometry.first_sector_of_cluster(2), Ok(96));
        assert_eq!(geometry.first_sector_of_cluster(3), Ok(97));
        assert_eq!(geometry.first_sector_of_cluster(0), Err(FsError::Chain));
        assert_eq!(geometry.first_sector_of_cluster(1), Err(FsError::Chain));

        // 4000 data sectors, but one FAT copy only holds 32 * 128 entries.
        assert_eq!(geometry.cluster_limit(), 4002);
        assert_eq!(geometry.first_sector_of_cluster(4001), Ok(4095));
        assert_eq!(geometry.first_sector_of_cluster(4002), Err(FsError::Chain));
    }

    #[test]
    fn test_first_sector_strictly_increasing() {
        let mut boot_sector = sample();
        boot_sector.sectors_per_cluster = 4;
        let geometry = boot_sector.geometry(4096).unwrap();

        let mut previous = None;
        for cluster in 2..geometry.cluster_limit() {
            let sector = geometry.first_sector_of_cluster(cluster).unwrap();
            assert!(sector >= geometry.first_data_sector());
            assert!(sector < geometry.total_sectors);
            if let Some(previous) = previous {
                assert!(sector > previous);
            }
            previous = Some(sector);
        }
    }

    #[test]
    fn test_fat_sector_and_offset() {
        let geometry = sample().geometry(4096).unwrap();
        assert_eq!(geometry.fat_sector_and_offset(0), Ok((32, 0)));
        assert_eq!(geometry.fat_sector_and_offset(5), Ok((32, 20)));
        assert_eq!(geometry.fat_sector_and_offset(128), Ok((33, 0)));
        assert_eq!(geometry.fat_sector_and_offset(300), Ok((34, 176)));
        assert_eq!(geometry.fat_copy_sector(34, 1), 66);
    }

    #[test]
    fn test_total_sectors_clamped_to_device() {
        let geometry = sample().geometry(2048).unwrap();
        assert_eq!(geometry.total_sectors, 2048);
        assert_eq!(geometry.cluster_limit(), 2048 - 96 + 2);
    }

    #[test]
    fn test_root_cluster_out_of_range() {
        let mut boot_sector = sample();
        boot_sector.root_cluster = 1;
        assert_eq!(boot_sector.geometry(4096), Err(FsError::InvalidBootSector));
        boot_sector.root_cluster = 9000;
        assert_eq!(boot_sector.geometry(4096), Err(FsError::InvalidBootSector));
    }
}
