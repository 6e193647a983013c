//! File content engine: ranged reads and whole-file export

use super::chain::ClusterChain;
use super::dir_entry::DirEntry83;
use super::volume::Volume;
use crate::filesys::{BlockDevice, FsError};
use log::{debug, error};
use std::io::Write;

impl<D: BlockDevice> Volume<D> {
    /// Reads up to `length` bytes of `entry` starting at byte `offset`.
    ///
    /// The length is clamped to the end of the file. An offset at or past
    /// the file size fails with `FsError::Range` before any sector is
    /// touched. A chain that ends before the requested range is covered
    /// yields the bytes gathered so far.
    pub fn read_range(&self, entry: &DirEntry83, offset: u32, length: u32) -> Result<Vec<u8>, FsError> {
        if offset >= entry.file_size {
            return Err(FsError::Range);
        }

        let length = length.min(entry.file_size - offset) as usize;
        let mut data = Vec::with_capacity(length);
        if length == 0 {
            return Ok(data);
        }

        let bytes_per_cluster = self.geometry().bytes_per_cluster();
        let bytes_per_sector = self.geometry().bytes_per_sector as usize;

        let links = offset / bytes_per_cluster;
        let start_cluster = ClusterChain::skip(self, entry.first_cluster(), links)?;

        let mut chain = ClusterChain::new(start_cluster);
        let mut cluster_offset = (offset % bytes_per_cluster) as usize;
        let mut sector_buffer = self.io.sector_buffer();

        'chain: while let Some(cluster) = chain.advance(self)? {
            let skip_sectors = (cluster_offset / bytes_per_sector) as u64;
            let mut sector_offset = cluster_offset % bytes_per_sector;
            let sectors = self.cluster_sectors(cluster)?;

            for sector in (sectors.start + skip_sectors)..sectors.end {
                self.io.read_sector(sector, &mut sector_buffer)?;

                let wanted = (length - data.len()).min(bytes_per_sector - sector_offset);
                data.extend_from_slice(&sector_buffer[sector_offset..sector_offset + wanted]);
                sector_offset = 0;

                if data.len() == length {
                    break 'chain;
                }
            }
            cluster_offset = 0;
        }

        if data.len() < length {
            debug!(
                "chain of {} ended after {} of {} requested bytes",
                entry.name,
                data.len(),
                length
            );
        }

        Ok(data)
    }

    /// Streams exactly `file_size` bytes of `entry` into `sink`.
    ///
    /// Returns the number of bytes written. A chain too short for the
    /// recorded size fails with `FsError::Chain`; sink failures surface as
    /// `FsError::IoFault`.
    pub fn export<W: Write + ?Sized>(&self, entry: &DirEntry83, sink: &mut W) -> Result<u64, FsError> {
        let total = entry.file_size as u64;
        let mut remaining = total;
        if remaining == 0 {
            return Ok(0);
        }

        let bytes_per_sector = self.geometry().bytes_per_sector as u64;
        let mut sector_buffer = self.io.sector_buffer();
        let mut chain = ClusterChain::new(entry.first_cluster());

        while remaining > 0 {
            let cluster = chain.advance(self)?.ok_or(FsError::Chain)?;

            for sector in self.cluster_sectors(cluster)? {
                self.io.read_sector(sector, &mut sector_buffer)?;

                let chunk = remaining.min(bytes_per_sector) as usize;
                sink.write_all(&sector_buffer[..chunk]).map_err(|e| {
                    error!("export of {} failed: {}", entry.name, e);
                    FsError::IoFault
                })?;

                remaining -= chunk as u64;
                if remaining == 0 {
                    break;
                }
            }
        }

        sink.flush().map_err(|_| FsError::IoFault)?;
        Ok(total)
    }
}
