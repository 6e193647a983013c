//! FAT32 on-disk constants

/// Size of FAT entry in bytes (32-bit)
pub const FAT_ENTRY_SIZE: u64 = 4;

/// Bits of a FAT entry that carry the successor cluster
pub const FAT_ENTRY_MASK: u32 = 0x0FFF_FFFF;

/// Reserved top nibble of a FAT entry, preserved on every update
pub const FAT_RESERVED_MASK: u32 = 0xF000_0000;

/// Any masked entry at or above this value ends a cluster chain
pub const END_OF_CHAIN: u32 = 0x0FFF_FFF8;

/// Value written when terminating a chain
pub const END_OF_CHAIN_MARK: u32 = 0x0FFF_FFFF;

/// FAT entry value of an unallocated cluster
pub const FREE_CLUSTER: u32 = 0;

/// Clusters 0 and 1 are reserved; data clusters start here
pub const FIRST_DATA_CLUSTER: u32 = 2;

/// Size of a directory record in bytes
pub const DIR_ENTRY_SIZE: usize = 32;

/// Maximum length of filename excluding extension
pub const MAX_FILENAME_LENGTH: usize = 8;

/// Maximum length of file extension
pub const MAX_EXTENSION_LENGTH: usize = 3;

/// Length of the fixed-field name stored in a directory record
pub const SHORT_NAME_LENGTH: usize = MAX_FILENAME_LENGTH + MAX_EXTENSION_LENGTH;

/// Marker for deleted directory entries
pub const DELETED_ENTRY_MARKER: u8 = 0xE5;

/// First name byte of the record that terminates a directory
pub const END_OF_DIRECTORY_MARKER: u8 = 0x00;

/// Smallest boot sector this driver can decode
pub const BOOT_SECTOR_SIZE: usize = 512;

/// Trailing signature of boot and FS-info sectors
pub const BOOT_SIGNATURE: [u8; 2] = [0x55, 0xAA];

/// Extended boot signature marking volume id, label and type as present
pub const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;

/// FS-info lead, structure and trail signatures
pub const FSINFO_LEAD_SIGNATURE: u32 = 0x4161_5252;
pub const FSINFO_STRUCT_SIGNATURE: u32 = 0x6141_7272;
pub const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA55_0000;

/// FS-info free-count / next-free value meaning "not known"
pub const FSINFO_UNKNOWN: u32 = 0xFFFF_FFFF;

/// Media descriptor for fixed disks
pub const MEDIA_FIXED_DISK: u8 = 0xF8;
