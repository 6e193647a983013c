//! Synthetic volumes and instrumented devices shared by the unit tests

use super::boot_sector::BootSector;
use super::constants::*;
use super::dir_entry::{Attributes, DirEntry83, ShortName};
use super::volume::Volume;
use super::Fat32;
use crate::filesys::block::MemoryBlockDevice;
use crate::filesys::{BlockDevice, FsError};
use byteorder::{ByteOrder, LittleEndian};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use spin::Mutex;
use std::io::{Cursor, Read, Write};
use std::ops::Range;
use std::sync::Arc;

const SECTOR: usize = 512;

/// Builds a directory record with the given raw 11-byte name
pub fn record(name: &[u8], attributes: Attributes, first_cluster: u32, size: u32) -> DirEntry83 {
    let mut raw = [b' '; SHORT_NAME_LENGTH];
    raw.copy_from_slice(name);
    let mut entry = DirEntry83::new_file(ShortName::from_raw(raw), first_cluster, size);
    entry.attributes = attributes;
    entry
}

/// Deterministic pseudo-random payload of `len` bytes
pub fn patterned(len: usize) -> Vec<u8> {
    let mut rng = SmallRng::seed_from_u64(len as u64);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Describes a small FAT32 image in memory: 512-byte sectors, a 32-sector
/// reserved area and a root directory at cluster 2 unless told otherwise
#[derive(Clone)]
pub struct ImageBuilder {
    sectors_per_cluster: u32,
    reserved_sectors: u32,
    fat_count: u32,
    fat_size: u32,
    total_sectors: u64,
    root_chain: Vec<u32>,
    root_records: Vec<DirEntry83>,
    cluster_records: Vec<(u32, Vec<DirEntry83>)>,
    contents: Vec<(Vec<u32>, Vec<u8>)>,
    raw_fat_words: Vec<(u32, u32)>,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self {
            sectors_per_cluster: 1,
            reserved_sectors: 32,
            fat_count: 1,
            fat_size: 16,
            total_sectors: 2048,
            root_chain: vec![FIRST_DATA_CLUSTER],
            root_records: Vec::new(),
            cluster_records: Vec::new(),
            contents: Vec::new(),
            raw_fat_words: Vec::new(),
        }
    }

    pub fn fat_count(mut self, fat_count: u32) -> Self {
        self.fat_count = fat_count;
        self
    }

    pub fn sectors_per_cluster(mut self, sectors_per_cluster: u32) -> Self {
        self.sectors_per_cluster = sectors_per_cluster;
        self
    }

    pub fn total_sectors(mut self, total_sectors: u64) -> Self {
        self.total_sectors = total_sectors;
        self
    }

    /// Spreads the root directory over `clusters`, linked in order
    pub fn root_chain(mut self, clusters: &[u32]) -> Self {
        self.root_chain = clusters.to_vec();
        self
    }

    /// Overrides a whole 32-bit FAT word, reserved bits included, in every copy
    pub fn raw_fat_word(mut self, cluster: u32, raw: u32) -> Self {
        self.raw_fat_words.push((cluster, raw));
        self
    }

    /// Appends a record to the root directory
    pub fn entry(mut self, entry: DirEntry83) -> Self {
        self.root_records.push(entry);
        self
    }

    /// Places `records` at the start of `cluster`, which becomes a
    /// one-cluster chain unless something else links it
    pub fn records_in(mut self, cluster: u32, records: Vec<DirEntry83>) -> Self {
        self.cluster_records.push((cluster, records));
        self
    }

    /// Adds a root directory file stored in consecutive clusters from
    /// `first_cluster`
    pub fn file(self, name: &[u8; SHORT_NAME_LENGTH], first_cluster: u32, contents: &[u8]) -> Self {
        let bytes_per_cluster = SECTOR * self.sectors_per_cluster as usize;
        let clusters = contents.len().div_ceil(bytes_per_cluster).max(1) as u32;
        let chain: Vec<u32> = (first_cluster..first_cluster + clusters).collect();
        self.file_chain(name, &chain, contents)
    }

    /// Adds a root directory file stored in the given clusters, in order
    pub fn file_chain(mut self, name: &[u8; SHORT_NAME_LENGTH], chain: &[u32], contents: &[u8]) -> Self {
        self.root_records
            .push(record(name, Attributes::ARCHIVE, chain[0], contents.len() as u32));
        self.contents.push((chain.to_vec(), contents.to_vec()));
        self
    }

    fn first_data_sector(&self) -> u64 {
        (self.reserved_sectors + self.fat_count * self.fat_size) as u64
    }

    fn cluster_offset(&self, cluster: u32) -> usize {
        let sector = self.first_data_sector()
            + (cluster - FIRST_DATA_CLUSTER) as u64 * self.sectors_per_cluster as u64;
        sector as usize * SECTOR
    }

    fn boot_sector(&self) -> BootSector {
        BootSector {
            jump_boot: [0xEB, 0x58, 0x90],
            oem_name: *b"TESTIMG ",
            bytes_per_sector: SECTOR as u16,
            sectors_per_cluster: self.sectors_per_cluster as u8,
            reserved_sectors: self.reserved_sectors as u16,
            fat_count: self.fat_count as u8,
            root_dir_entries: 0,
            total_sectors_16: 0,
            media_type: MEDIA_FIXED_DISK,
            sectors_per_fat_16: 0,
            sectors_per_track: 32,
            head_count: 64,
            hidden_sectors: 0,
            total_sectors_32: self.total_sectors as u32,
            sectors_per_fat_32: self.fat_size,
            extended_flags: 0,
            fs_version: 0,
            root_cluster: self.root_chain[0],
            fs_info_sector: 1,
            backup_boot_sector: 6,
            reserved: [0; 12],
            drive_number: 0x80,
            reserved1: 0,
            boot_signature: EXTENDED_BOOT_SIGNATURE,
            volume_id: 0xC0FF_EE00,
            volume_label: *b"TEST       ",
            fs_type: *b"FAT32   ",
        }
    }

    /// Renders the image bytes
    pub fn bytes(&self) -> Vec<u8> {
        let mut image = vec![0u8; self.total_sectors as usize * SECTOR];
        self.boot_sector().encode(&mut image[..SECTOR]);

        let mut fat = vec![0u32; self.fat_size as usize * SECTOR / 4];
        fat[0] = 0x0FFF_FF00 | MEDIA_FIXED_DISK as u32;
        fat[1] = END_OF_CHAIN_MARK;
        let mut link = |chain: &[u32]| {
            for pair in chain.windows(2) {
                fat[pair[0] as usize] = pair[1];
            }
            if let Some(&last) = chain.last() {
                fat[last as usize] = END_OF_CHAIN_MARK;
            }
        };
        link(&self.root_chain);
        for (chain, _) in &self.contents {
            link(chain);
        }
        for (cluster, _) in &self.cluster_records {
            if fat[*cluster as usize] == FREE_CLUSTER {
                fat[*cluster as usize] = END_OF_CHAIN_MARK;
            }
        }
        for &(cluster, raw) in &self.raw_fat_words {
            fat[cluster as usize] = raw;
        }

        for copy in 0..self.fat_count as usize {
            let start = (self.reserved_sectors as usize + copy * self.fat_size as usize) * SECTOR;
            for (i, word) in fat.iter().enumerate() {
                LittleEndian::write_u32(&mut image[start + i * 4..start + i * 4 + 4], *word);
            }
        }

        let bytes_per_cluster = SECTOR * self.sectors_per_cluster as usize;
        for (chain, contents) in &self.contents {
            for (cluster, chunk) in chain.iter().zip(contents.chunks(bytes_per_cluster)) {
                let offset = self.cluster_offset(*cluster);
                image[offset..offset + chunk.len()].copy_from_slice(chunk);
            }
        }

        let per_cluster = bytes_per_cluster / DIR_ENTRY_SIZE;
        for (i, entry) in self.root_records.iter().enumerate() {
            let offset = self.cluster_offset(self.root_chain[i / per_cluster])
                + (i % per_cluster) * DIR_ENTRY_SIZE;
            entry.encode(&mut image[offset..offset + DIR_ENTRY_SIZE]);
        }
        for (cluster, records) in &self.cluster_records {
            let base = self.cluster_offset(*cluster);
            for (i, entry) in records.iter().enumerate() {
                let offset = base + i * DIR_ENTRY_SIZE;
                entry.encode(&mut image[offset..offset + DIR_ENTRY_SIZE]);
            }
        }

        image
    }

    pub fn build(&self) -> MemoryBlockDevice {
        MemoryBlockDevice::from_bytes(&self.bytes(), SECTOR)
    }

    pub fn mount(&self) -> Volume<MemoryBlockDevice> {
        Volume::mount(self.build()).unwrap()
    }

    pub fn session(&self) -> Fat32<MemoryBlockDevice> {
        Fat32::mount(self.build()).unwrap()
    }

    /// Raw word of `cluster` in FAT copy `copy` of a rendered image
    pub fn fat_word(&self, image: &[u8], copy: u32, cluster: u32) -> u32 {
        let start = (self.reserved_sectors + copy * self.fat_size) as usize * SECTOR;
        let offset = start + cluster as usize * 4;
        LittleEndian::read_u32(&image[offset..offset + 4])
    }

    /// Sectors occupied by FAT copy `copy`
    pub fn fat_sectors(&self, copy: u32) -> Range<u64> {
        let start = (self.reserved_sectors + copy * self.fat_size) as u64;
        start..start + self.fat_size as u64
    }
}

/// Memory device that records every block it is asked to read
pub struct CountingDevice {
    inner: MemoryBlockDevice,
    reads: Arc<Mutex<Vec<u64>>>,
}

impl CountingDevice {
    pub fn new(inner: MemoryBlockDevice) -> Self {
        Self {
            inner,
            reads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Shared log of block numbers read so far
    pub fn reads(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.reads)
    }
}

impl BlockDevice for CountingDevice {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.reads.lock().push(block_num);
        self.inner.read_block(block_num, buf)
    }

    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        self.inner.write_block(block_num, buf)
    }

    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn total_blocks(&self) -> u64 {
        self.inner.total_blocks()
    }
}

/// Memory device whose writes to `failing` sectors report `IoFault`
pub struct FailingWriteDevice {
    inner: MemoryBlockDevice,
    failing: Range<u64>,
    fail_flush: bool,
}

impl FailingWriteDevice {
    pub fn new(inner: MemoryBlockDevice, failing: Range<u64>) -> Self {
        Self {
            inner,
            failing,
            fail_flush: false,
        }
    }

    /// Makes every flush report `IoFault` as well
    pub fn failing_flush(mut self) -> Self {
        self.fail_flush = true;
        self
    }

    pub fn into_inner(self) -> MemoryBlockDevice {
        self.inner
    }
}

impl BlockDevice for FailingWriteDevice {
    fn read_block(&self, block_num: u64, buf: &mut [u8]) -> Result<(), FsError> {
        self.inner.read_block(block_num, buf)
    }

    fn write_block(&mut self, block_num: u64, buf: &[u8]) -> Result<(), FsError> {
        if self.failing.contains(&block_num) {
            return Err(FsError::IoFault);
        }
        self.inner.write_block(block_num, buf)
    }

    fn block_size(&self) -> usize {
        self.inner.block_size()
    }

    fn total_blocks(&self) -> u64 {
        self.inner.total_blocks()
    }

    fn flush(&mut self) -> Result<(), FsError> {
        if self.fail_flush {
            return Err(FsError::IoFault);
        }
        self.inner.flush()
    }
}

/// Smallest image size for which `fatfs` picks FAT32 with 512-byte
/// clusters, rounded up
pub const FATFS_IMAGE_SIZE: usize = 40 * 1024 * 1024;

/// Formats a FAT32 image with the `fatfs` crate and stores `files` in its
/// root directory
pub fn fatfs_image(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut cursor = Cursor::new(vec![0u8; FATFS_IMAGE_SIZE]);
    fatfs::format_volume(
        &mut cursor,
        fatfs::FormatVolumeOptions::new().fat_type(fatfs::FatType::Fat32),
    )
    .unwrap();
    {
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).unwrap();
        for (name, contents) in files {
            let mut file = fs.root_dir().create_file(name).unwrap();
            file.truncate().unwrap();
            file.write_all(contents).unwrap();
        }
    }
    cursor.into_inner()
}

/// Reads a root directory file back through `fatfs`
pub fn fatfs_read(image: &mut Vec<u8>, name: &str) -> Vec<u8> {
    let mut cursor = Cursor::new(image);
    let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).unwrap();
    let mut file = fs.root_dir().open_file(name).unwrap();
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).unwrap();
    contents
}

/// Short names in the root directory as `fatfs` sees them
pub fn fatfs_list(image: &mut Vec<u8>) -> Vec<String> {
    let mut cursor = Cursor::new(image);
    let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).unwrap();
    let names = fs
        .root_dir()
        .iter()
        .map(|entry| entry.unwrap().short_file_name())
        .collect();
    names
}
