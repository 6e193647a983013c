//! Free-cluster allocation policies

use super::constants::*;
use super::fat_entry::FatTable;
use crate::filesys::FsError;
use log::{debug, warn};

/// Picks a free cluster and reserves it.
///
/// A successful `allocate` has already written an end-of-chain mark into
/// the chosen cluster's entry, so two consecutive calls never return the
/// same cluster.
pub trait ClusterAllocator: Send + Sync {
    fn allocate(&mut self, fat: &mut dyn FatTable) -> Result<u32, FsError>;

    fn name(&self) -> &'static str;
}

/// Which allocation policy a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocatorKind {
    /// Every search restarts at cluster 2
    #[default]
    LinearScan,
    /// Searches resume after the last cluster handed out
    NextFit,
}

impl AllocatorKind {
    pub fn build(self) -> Box<dyn ClusterAllocator> {
        match self {
            AllocatorKind::LinearScan => Box::new(LinearScanAllocator),
            AllocatorKind::NextFit => Box::new(NextFitAllocator::default()),
        }
    }
}

fn claim(fat: &mut dyn FatTable, cluster: u32) -> Result<u32, FsError> {
    fat.set_entry(cluster, END_OF_CHAIN_MARK)?;
    debug!("allocated cluster {}", cluster);
    Ok(cluster)
}

fn scan(fat: &mut dyn FatTable, from: u32, to: u32) -> Result<Option<u32>, FsError> {
    for cluster in from..to {
        if fat.entry(cluster)?.is_free() {
            return claim(fat, cluster).map(Some);
        }
    }
    Ok(None)
}

/// First-fit scan of the whole table
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanAllocator;

impl ClusterAllocator for LinearScanAllocator {
    fn allocate(&mut self, fat: &mut dyn FatTable) -> Result<u32, FsError> {
        let limit = fat.cluster_limit();
        scan(fat, FIRST_DATA_CLUSTER, limit)?.ok_or_else(|| {
            warn!("no free cluster below {}", limit);
            FsError::NoSpace
        })
    }

    fn name(&self) -> &'static str {
        "linear-scan"
    }
}

/// Next-fit scan: resumes where the previous search succeeded and wraps
/// around once
#[derive(Debug, Clone, Copy)]
pub struct NextFitAllocator {
    cursor: u32,
}

impl Default for NextFitAllocator {
    fn default() -> Self {
        Self {
            cursor: FIRST_DATA_CLUSTER,
        }
    }
}

impl ClusterAllocator for NextFitAllocator {
    fn allocate(&mut self, fat: &mut dyn FatTable) -> Result<u32, FsError> {
        let limit = fat.cluster_limit();
        let start = if (FIRST_DATA_CLUSTER..limit).contains(&self.cursor) {
            self.cursor
        } else {
            FIRST_DATA_CLUSTER
        };

        let found = match scan(fat, start, limit)? {
            Some(cluster) => Some(cluster),
            None => scan(fat, FIRST_DATA_CLUSTER, start)?,
        };

        match found {
            Some(cluster) => {
                self.cursor = cluster + 1;
                Ok(cluster)
            }
            None => {
                warn!("no free cluster below {}", limit);
                Err(FsError::NoSpace)
            }
        }
    }

    fn name(&self) -> &'static str {
        "next-fit"
    }
}
