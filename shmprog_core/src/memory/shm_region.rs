// SHMPROG Shared Memory Region - named files under the platform shm directory
use super::platform::{block_path, shm_base_dir};
use crate::error::{ProgressError, ProgressResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::{File, OpenOptions};
use std::io;

/// A named, memory-mapped region shared between processes on one host.
///
/// Dropping a region only unmaps it. Removing the name is an explicit
/// [`ShmRegion::unlink`] so that attach-only users can never release a
/// block they do not own.
#[derive(Debug)]
pub struct ShmRegion {
    mmap: MmapMut,
    size: usize,
    _file: File,
    name: String,
    owner: bool,
}

impl ShmRegion {
    /// Create a new zero-filled region. Fails if the name is already taken.
    pub fn create(name: &str, size: usize) -> ProgressResult<Self> {
        std::fs::create_dir_all(shm_base_dir()).map_err(|e| ProgressError::creation(name, e))?;

        let path = block_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| ProgressError::creation(name, e))?;

        let mapped = file
            .set_len(size as u64)
            .and_then(|_| unsafe { MmapOptions::new().len(size).map_mut(&file) });
        let mut mmap = match mapped {
            Ok(mmap) => mmap,
            Err(e) => {
                // Don't leave a half-made name behind
                let _ = std::fs::remove_file(&path);
                return Err(ProgressError::creation(name, e));
            }
        };
        mmap.fill(0);

        Ok(Self {
            mmap,
            size,
            _file: file,
            name: name.to_string(),
            owner: true,
        })
    }

    /// Open an existing region (no creation)
    pub fn open(name: &str) -> ProgressResult<Self> {
        let path = block_path(name);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&path)
            .map_err(|e| ProgressError::attach(name, e))?;

        let size = file
            .metadata()
            .map_err(|e| ProgressError::attach(name, e))?
            .len() as usize;
        if size == 0 {
            return Err(ProgressError::attach(
                name,
                io::Error::new(io::ErrorKind::InvalidData, "shared memory region is empty"),
            ));
        }

        let mmap = unsafe { MmapOptions::new().len(size).map_mut(&file) }
            .map_err(|e| ProgressError::attach(name, e))?;

        Ok(Self {
            mmap,
            size,
            _file: file,
            name: name.to_string(),
            owner: false,
        })
    }

    /// Remove a named region. Returns `false` when nothing was left to remove.
    ///
    /// Existing mappings stay valid until they are dropped.
    pub fn unlink(name: &str) -> io::Result<bool> {
        match std::fs::remove_file(block_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Whether a region with this name currently exists
    pub fn exists(name: &str) -> bool {
        block_path(name).exists()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.mmap.as_mut_ptr()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the handle that created the region
    pub fn is_owner(&self) -> bool {
        self.owner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::platform::generate_block_name;

    #[test]
    fn test_create_open_unlink() {
        let name = generate_block_name();
        let region = ShmRegion::create(&name, 64).unwrap();
        assert!(region.is_owner());
        assert_eq!(region.size(), 64);
        assert!(ShmRegion::exists(&name));

        let opened = ShmRegion::open(&name).unwrap();
        assert!(!opened.is_owner());
        assert_eq!(opened.size(), 64);

        assert!(ShmRegion::unlink(&name).unwrap());
        assert!(!ShmRegion::unlink(&name).unwrap());
        assert!(!ShmRegion::exists(&name));
    }

    #[test]
    fn test_create_rejects_taken_name() {
        let name = generate_block_name();
        let _region = ShmRegion::create(&name, 16).unwrap();
        let err = ShmRegion::create(&name, 16).unwrap_err();
        assert!(matches!(err, ProgressError::ResourceCreation { .. }));
        ShmRegion::unlink(&name).unwrap();
    }

    #[test]
    fn test_open_missing_fails() {
        let err = ShmRegion::open("psm_does_not_exist_0").unwrap_err();
        assert!(matches!(err, ProgressError::Attach { .. }));
    }
}
