//! Lazy traversal of cluster chains through the FAT

use super::fat_entry::FatTable;
use crate::filesys::FsError;

#[derive(Debug, Clone, Copy)]
enum Position {
    /// Start cluster not yet yielded
    Start(u32),
    /// Last yielded cluster; its successor is read on the next step
    After(u32),
    Done,
}

/// Forward-only walk over a chain of clusters.
///
/// Each step reads at most one FAT entry, so a caller that stops early
/// never touches the rest of the chain. The walk does not detect cycles.
#[derive(Debug, Clone)]
pub struct ClusterChain {
    position: Position,
}

impl ClusterChain {
    pub fn new(start_cluster: u32) -> Self {
        Self {
            position: Position::Start(start_cluster),
        }
    }

    /// Yields the next cluster of the chain, or None once an end-of-chain
    /// entry has been reached. Links to clusters outside the data region
    /// fail with `FsError::Chain`.
    pub fn advance<F: FatTable + ?Sized>(&mut self, fat: &F) -> Result<Option<u32>, FsError> {
        let cluster = match self.position {
            Position::Done => return Ok(None),
            Position::Start(cluster) => cluster,
            Position::After(previous) => {
                let entry = fat.entry(previous)?;
                match entry.next_cluster() {
                    Some(next) => next,
                    None => {
                        self.position = Position::Done;
                        return Ok(None);
                    }
                }
            }
        };

        if cluster < super::constants::FIRST_DATA_CLUSTER || cluster >= fat.cluster_limit() {
            self.position = Position::Done;
            return Err(FsError::Chain);
        }

        self.position = Position::After(cluster);
        Ok(Some(cluster))
    }

    /// Follows `links` successors from `start_cluster`. Running off the
    /// end of the chain first fails with `FsError::Chain`.
    pub fn skip<F: FatTable + ?Sized>(
        fat: &F,
        start_cluster: u32,
        links: u32,
    ) -> Result<u32, FsError> {
        let mut chain = Self::new(start_cluster);
        let mut cluster = chain.advance(fat)?.ok_or(FsError::Chain)?;
        for _ in 0..links {
            cluster = chain.advance(fat)?.ok_or(FsError::Chain)?;
        }
        Ok(cluster)
    }

    /// Materializes the whole chain
    pub fn collect<F: FatTable + ?Sized>(fat: &F, start_cluster: u32) -> Result<Vec<u32>, FsError> {
        let mut chain = Self::new(start_cluster);
        let mut clusters = Vec::new();
        while let Some(cluster) = chain.advance(fat)? {
            clusters.push(cluster);
        }
        Ok(clusters)
    }
}
