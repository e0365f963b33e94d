//! Positioned, block-at-a-time I/O against the fixed-size disk image file.

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::Path;

use log::{debug, trace};

use crate::error::{FsError, FsResult};
use crate::layout::{Block, BLOCK_SIZE, DISK_BLOCKS, IMAGE_SIZE};

/// An open handle to the `.disk` image, read/written one 512-byte block at
/// a time. The file pointer is never relied on between calls: every access
/// seeks explicitly via `read_at`/`write_at`.
pub struct Disk {
    file: File,
}

impl Disk {
    /// Opens an existing image, or creates and zero-fills one of exactly
    /// `IMAGE_SIZE` bytes if `path` does not exist yet. This supplements the
    /// original's assumption of an externally `dd`'d image so the crate is
    /// self-contained.
    pub fn create_if_missing(path: &Path) -> FsResult<Self> {
        let existed = path.exists();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        if existed {
            let len = file.metadata()?.len();
            if len != IMAGE_SIZE {
                return Err(FsError::IoError(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "disk image {} has size {len}, expected {IMAGE_SIZE}",
                        path.display()
                    ),
                )));
            }
            debug!("opened existing disk image at {}", path.display());
        } else {
            file.set_len(IMAGE_SIZE)?;
            debug!(
                "created fresh {}-byte disk image at {}",
                IMAGE_SIZE,
                path.display()
            );
        }

        Ok(Self { file })
    }

    fn check_bounds(n: u64) -> FsResult<()> {
        if n >= DISK_BLOCKS {
            return Err(FsError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("block {n} is out of bounds (disk has {DISK_BLOCKS} blocks)"),
            )));
        }
        Ok(())
    }

    /// Reads block `n` into a fresh 512-byte buffer.
    pub fn read_block(&self, n: u64) -> FsResult<Block> {
        Self::check_bounds(n)?;
        trace!("read_block({n})");

        let mut buf = [0u8; BLOCK_SIZE];
        self.file.read_exact_at(&mut buf, n * BLOCK_SIZE as u64)?;
        Ok(buf)
    }

    /// Writes `bytes` to block `n`.
    pub fn write_block(&self, n: u64, bytes: &Block) -> FsResult<()> {
        Self::check_bounds(n)?;
        trace!("write_block({n})");

        self.file.write_all_at(bytes, n * BLOCK_SIZE as u64)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_if_missing_creates_exact_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");

        let _disk = Disk::create_if_missing(&path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), IMAGE_SIZE);
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");
        let disk = Disk::create_if_missing(&path).unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[..5].copy_from_slice(b"hello");
        disk.write_block(3, &block).unwrap();

        let read_back = disk.read_block(3).unwrap();
        assert_eq!(&read_back[..5], b"hello");
    }

    #[test]
    fn out_of_bounds_block_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");
        let disk = Disk::create_if_missing(&path).unwrap();

        assert!(disk.read_block(DISK_BLOCKS).is_err());
        assert!(disk.write_block(DISK_BLOCKS, &[0u8; BLOCK_SIZE]).is_err());
    }

    #[test]
    fn reopening_existing_image_preserves_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");

        {
            let disk = Disk::create_if_missing(&path).unwrap();
            let mut block = [0u8; BLOCK_SIZE];
            block[0] = 0xAB;
            disk.write_block(0, &block).unwrap();
        }

        let disk = Disk::create_if_missing(&path).unwrap();
        assert_eq!(disk.read_block(0).unwrap()[0], 0xAB);
    }
}
