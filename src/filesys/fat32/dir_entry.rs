//! FAT32 directory entry structure and 8.3 short names

use super::constants::*;
use arrayvec::ArrayString;
use bitflags::bitflags;
use byteorder::{ByteOrder, LittleEndian};
use core::fmt;

bitflags! {
    /// Attribute byte of a directory entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN = 0x02;
        const SYSTEM = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        /// Combination marking a VFAT long-name fragment
        const LONG_NAME = 0x0F;
    }
}

impl fmt::Display for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let labels = [
            (Attributes::READ_ONLY, "READ_ONLY"),
            (Attributes::HIDDEN, "HIDDEN"),
            (Attributes::SYSTEM, "SYSTEM"),
            (Attributes::VOLUME_ID, "VOLUME_ID"),
            (Attributes::DIRECTORY, "DIRECTORY"),
            (Attributes::ARCHIVE, "ARCHIVE"),
        ];
        let mut first = true;
        for (flag, label) in labels {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(label)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Display form of a short name: at most 8 + '.' + 3 characters
pub type DisplayName = ArrayString<12>;

/// Fixed-field 11-byte name: 8 name bytes and 3 extension bytes, space padded
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortName([u8; SHORT_NAME_LENGTH]);

impl ShortName {
    /// The `.` entry at the start of every subdirectory
    pub const DOT: ShortName = ShortName(*b".          ");

    /// The `..` entry pointing at the parent directory
    pub const DOTDOT: ShortName = ShortName(*b"..         ");

    /// Converts a human file name into the fixed-field form.
    ///
    /// The first `.`-separated component becomes the name and the second
    /// the extension; each is truncated to its field width and upper-cased.
    /// Empty components are skipped, so `".profile"` names `PROFILE`.
    pub fn parse(name: &str) -> Self {
        let mut raw = [b' '; SHORT_NAME_LENGTH];
        let mut parts = name.split('.').filter(|part| !part.is_empty());

        if let Some(base) = parts.next() {
            for (i, b) in base.bytes().take(MAX_FILENAME_LENGTH).enumerate() {
                raw[i] = b;
            }
            if let Some(ext) = parts.next() {
                for (i, b) in ext.bytes().take(MAX_EXTENSION_LENGTH).enumerate() {
                    raw[MAX_FILENAME_LENGTH + i] = b;
                }
            }
        }

        ShortName(raw).normalized()
    }

    /// Wraps raw on-disk bytes unchanged
    pub fn from_raw(raw: [u8; SHORT_NAME_LENGTH]) -> Self {
        ShortName(raw)
    }

    /// Upper-cases every byte; a no-op on an already normalized name
    pub fn normalized(&self) -> Self {
        ShortName(self.0.map(|b| b.to_ascii_uppercase()))
    }

    pub fn as_bytes(&self) -> &[u8; SHORT_NAME_LENGTH] {
        &self.0
    }

    pub fn first_byte(&self) -> u8 {
        self.0[0]
    }

    /// Copy of this name with its first byte replaced
    pub fn with_first_byte(&self, first: u8) -> Self {
        let mut raw = self.0;
        raw[0] = first;
        ShortName(raw)
    }

    /// True when name and extension are both empty
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|&b| b == b' ')
    }

    /// Whether a tombstoned name could have been this one: every byte but
    /// the overwritten first one must match
    pub fn matches_tombstone(&self, tombstone: &ShortName) -> bool {
        self.0[1..] == tombstone.0[1..]
    }

    /// Reconstructs `NAME.EXT`, trimming padding and omitting the dot when
    /// the extension is blank
    pub fn display_name(&self) -> DisplayName {
        let mut out = DisplayName::new();
        let printable = |b: u8| {
            if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            }
        };

        let base = &self.0[..MAX_FILENAME_LENGTH];
        let base_end = base.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        for &b in &base[..base_end] {
            out.push(printable(b));
        }

        let ext = &self.0[MAX_FILENAME_LENGTH..];
        let ext_end = ext.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        if ext_end > 0 {
            out.push('.');
            for &b in &ext[..ext_end] {
                out.push(printable(b));
            }
        }
        out
    }
}

impl fmt::Debug for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShortName({:?})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for ShortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// 8.3 format directory entry (32 bytes on disk)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry83 {
    /// 8 character filename and 3 character extension
    pub name: ShortName,

    /// File attributes (read-only, directory, etc)
    pub attributes: Attributes,

    /// Reserved for Windows NT case information
    pub nt_reserved: u8,

    pub creation_time_tenths: u8,
    pub creation_time: u16,
    pub creation_date: u16,
    pub last_access_date: u16,

    /// High 16 bits of the first cluster number
    pub first_cluster_high: u16,

    /// Modification time
    pub write_time: u16,

    /// Modification date
    pub write_date: u16,

    /// Low 16 bits of the first cluster number
    pub first_cluster_low: u16,

    /// File size in bytes
    pub file_size: u32,
}

impl DirEntry83 {
    /// Creates a new archive-flagged file entry; timestamps are left zero
    pub fn new_file(name: ShortName, first_cluster: u32, file_size: u32) -> Self {
        let mut entry = Self {
            name,
            attributes: Attributes::ARCHIVE,
            nt_reserved: 0,
            creation_time_tenths: 0,
            creation_time: 0,
            creation_date: 0,
            last_access_date: 0,
            first_cluster_high: 0,
            write_time: 0,
            write_date: 0,
            first_cluster_low: 0,
            file_size,
        };
        entry.set_first_cluster(first_cluster);
        entry
    }

    /// Decodes one record from the first 32 bytes of `bytes`
    pub fn decode(bytes: &[u8]) -> Self {
        let mut name = [0u8; SHORT_NAME_LENGTH];
        name.copy_from_slice(&bytes[0..11]);

        Self {
            name: ShortName::from_raw(name),
            attributes: Attributes::from_bits_retain(bytes[11]),
            nt_reserved: bytes[12],
            creation_time_tenths: bytes[13],
            creation_time: LittleEndian::read_u16(&bytes[14..16]),
            creation_date: LittleEndian::read_u16(&bytes[16..18]),
            last_access_date: LittleEndian::read_u16(&bytes[18..20]),
            first_cluster_high: LittleEndian::read_u16(&bytes[20..22]),
            write_time: LittleEndian::read_u16(&bytes[22..24]),
            write_date: LittleEndian::read_u16(&bytes[24..26]),
            first_cluster_low: LittleEndian::read_u16(&bytes[26..28]),
            file_size: LittleEndian::read_u32(&bytes[28..32]),
        }
    }

    /// Encodes this record into the first 32 bytes of `bytes`
    pub fn encode(&self, bytes: &mut [u8]) {
        bytes[0..11].copy_from_slice(self.name.as_bytes());
        bytes[11] = self.attributes.bits();
        bytes[12] = self.nt_reserved;
        bytes[13] = self.creation_time_tenths;
        LittleEndian::write_u16(&mut bytes[14..16], self.creation_time);
        LittleEndian::write_u16(&mut bytes[16..18], self.creation_date);
        LittleEndian::write_u16(&mut bytes[18..20], self.last_access_date);
        LittleEndian::write_u16(&mut bytes[20..22], self.first_cluster_high);
        LittleEndian::write_u16(&mut bytes[22..24], self.write_time);
        LittleEndian::write_u16(&mut bytes[24..26], self.write_date);
        LittleEndian::write_u16(&mut bytes[26..28], self.first_cluster_low);
        LittleEndian::write_u32(&mut bytes[28..32], self.file_size);
    }

    /// Returns true if this record terminates the directory
    pub fn is_end_of_directory(&self) -> bool {
        self.name.first_byte() == END_OF_DIRECTORY_MARKER
    }

    /// Returns true if entry is marked as deleted
    pub fn is_deleted(&self) -> bool {
        self.name.first_byte() == DELETED_ENTRY_MARKER
    }

    /// Returns true if the slot can take a new entry
    pub fn is_free(&self) -> bool {
        self.is_end_of_directory() || self.is_deleted()
    }

    /// Returns true if entry is a directory
    pub fn is_directory(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    /// Volume labels and long-name fragments both carry the volume-id bit
    pub fn is_volume_id(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_ID)
    }

    /// `.` or `..`
    pub fn is_dot(&self) -> bool {
        self.name.first_byte() == b'.'
    }

    pub fn first_cluster(&self) -> u32 {
        ((self.first_cluster_high as u32) << 16) | self.first_cluster_low as u32
    }

    pub fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster_high = (cluster >> 16) as u16;
        self.first_cluster_low = (cluster & 0xFFFF) as u16;
    }

    /// Returns the filename as a string, including extension if present
    pub fn get_name(&self) -> DisplayName {
        self.name.display_name()
    }
}
