use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use sysinfo::Disks;

/// Free space needed per byte of input: the sorted chunks and the output exist next to the input
pub const SPACE_FACTOR: u64 = 3;

/// Decides up front whether a run has enough disk space to complete.
pub trait SpaceGuard: Send + Sync {
    /// Free bytes available to the run, `None` when unknown.
    fn available_space(&self) -> Result<Option<u64>, anyhow::Error>;

    /// Bytes needed to sort an input of `input_size` bytes
    fn required_space(&self, input_size: u64) -> u64 {
        input_size.saturating_mul(SPACE_FACTOR)
    }

    /// True when the available space covers [SpaceGuard::required_space]. An unknown amount of free
    /// space does not stop the run.
    fn has_sufficient_space(&self, input_size: u64) -> Result<bool, anyhow::Error> {
        match self.available_space()? {
            Some(available) => Ok(available >= self.required_space(input_size)),
            None => Ok(true),
        }
    }
}

/// Reads free space of the disk holding `dir`.
pub struct DiskSpaceGuard {
    dir: PathBuf,
}

impl DiskSpaceGuard {
    pub fn new(dir: PathBuf) -> DiskSpaceGuard {
        DiskSpaceGuard { dir }
    }

    /// The disk whose mount point is the longest prefix of `path`
    fn available_on(disks: &Disks, path: &Path) -> Option<u64> {
        disks
            .list()
            .iter()
            .filter(|disk| path.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().as_os_str().len())
            .map(|disk| disk.available_space())
    }
}

impl SpaceGuard for DiskSpaceGuard {
    fn available_space(&self) -> Result<Option<u64>, anyhow::Error> {
        let path = self.dir.canonicalize()
            .with_context(|| anyhow!("path: {}", self.dir.display()))?;
        let disks = Disks::new_with_refreshed_list();
        let available = Self::available_on(&disks, &path);
        if available.is_none() {
            log::warn!("Cannot determine free space for {}, skipping the space check", path.display());
        }
        Ok(available)
    }
}

/// A guard reporting a fixed amount of free space
pub struct FixedSpaceGuard {
    available: u64,
}

impl FixedSpaceGuard {
    pub fn new(available: u64) -> FixedSpaceGuard {
        FixedSpaceGuard { available }
    }
}

impl SpaceGuard for FixedSpaceGuard {
    fn available_space(&self) -> Result<Option<u64>, anyhow::Error> {
        Ok(Some(self.available))
    }
}
