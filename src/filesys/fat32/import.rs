//! File import engine: builds a cluster chain from a byte stream and
//! commits the directory entry that names it

use super::allocator::ClusterAllocator;
use super::dir_entry::{DirEntry83, ShortName};
use super::fat_entry::FatTable;
use super::volume::Volume;
use crate::filesys::{BlockDevice, FsError};
use log::{debug, error, info};
use std::io::{Read, Seek, SeekFrom};

impl<D: BlockDevice> Volume<D> {
    /// Copies the whole of `source` into a new file `name` of the directory
    /// at `dir_cluster`.
    ///
    /// The directory slot is located before any cluster is allocated. There
    /// is no rollback: a failure after allocation has started leaves the
    /// clusters written so far linked in the FAT but unreferenced.
    pub fn import<R: Read + Seek + ?Sized>(
        &mut self,
        dir_cluster: u32,
        name: &ShortName,
        source: &mut R,
        allocator: &mut dyn ClusterAllocator,
    ) -> Result<DirEntry83, FsError> {
        let length = source
            .seek(SeekFrom::End(0))
            .and_then(|end| source.seek(SeekFrom::Start(0)).map(|_| end))
            .map_err(|e| {
                error!("cannot size import source: {}", e);
                FsError::IoFault
            })?;
        let file_size = u32::try_from(length).map_err(|_| FsError::FileTooLarge)?;

        match self.find_entry(name, dir_cluster) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }
        let slot = self.find_free_slot(dir_cluster)?;

        let first_cluster = if file_size == 0 {
            0
        } else {
            self.write_chain(source, file_size, allocator)?
        };

        let entry = DirEntry83::new_file(*name, first_cluster, file_size);
        self.write_entry(slot, &entry)?;

        info!(
            "imported {} ({} bytes, first cluster {}, sector {}, slot {})",
            name, file_size, first_cluster, slot.sector, slot.index
        );
        Ok(entry)
    }

    /// Streams `length` bytes into freshly allocated clusters and returns
    /// the first one. Every sector of a cluster is filled before the next
    /// cluster is linked; the tail of the last sector is zero padded.
    fn write_chain<R: Read + ?Sized>(
        &mut self,
        source: &mut R,
        length: u32,
        allocator: &mut dyn ClusterAllocator,
    ) -> Result<u32, FsError> {
        let bytes_per_sector = self.geometry().bytes_per_sector as usize;
        let mut remaining = length as usize;
        let mut sector_buffer = self.io.sector_buffer();

        let first_cluster = allocator.allocate(self)?;
        let mut cluster = first_cluster;

        loop {
            for sector in self.cluster_sectors(cluster)? {
                let chunk = remaining.min(bytes_per_sector);
                sector_buffer.fill(0);
                source.read_exact(&mut sector_buffer[..chunk]).map_err(|e| {
                    error!("import source ended early: {}", e);
                    FsError::IoFault
                })?;
                self.io.write_sector(sector, &sector_buffer)?;

                remaining -= chunk;
                if remaining == 0 {
                    break;
                }
            }

            if remaining == 0 {
                // The allocator already marked the last cluster end-of-chain.
                return Ok(first_cluster);
            }

            let next = allocator.allocate(self)?;
            self.set_entry(cluster, next)?;
            debug!("linked cluster {} -> {}", cluster, next);
            cluster = next;
        }
    }
}
