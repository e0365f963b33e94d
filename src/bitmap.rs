//! The free-block bitmap: one bit per block of the image, persisted in the
//! last three blocks (10237–10239) and mirrored in memory for the lifetime
//! of the mount.

use log::trace;

use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::{BITMAP_BLOCKS, BITMAP_SIZE, BITMAP_START_BLOCK, BLOCK_SIZE, DISK_BLOCKS};

/// Bit `p` within a byte corresponds to this mask. Bit-ordering is
/// MSB-first: bit index 0 is the 128 bit, bit index 7 is the 1 bit. This is
/// part of the on-disk format, not an implementation detail.
const MASK: [u8; 8] = [128, 64, 32, 16, 8, 4, 2, 1];

/// In-memory mirror of the on-disk bitmap.
pub struct Bitmap {
    bits: [u8; BITMAP_SIZE],
}

impl Bitmap {
    /// Reads the three bitmap blocks from `disk`, then unconditionally sets
    /// bit 0 (root) and the final three bits of the buffer (the bitmap's
    /// own blocks). Idempotent: calling this again on an already-initialized
    /// bitmap changes nothing.
    pub fn init(disk: &Disk) -> FsResult<Self> {
        let mut bits = [0u8; BITMAP_SIZE];
        for i in 0..BITMAP_BLOCKS {
            let block = disk.read_block(BITMAP_START_BLOCK + i)?;
            bits[(i as usize) * BLOCK_SIZE..(i as usize + 1) * BLOCK_SIZE].copy_from_slice(&block);
        }

        let mut bitmap = Self { bits };
        bitmap.mark_bit(0);
        bitmap.mark_bit(BITMAP_SIZE as u64 * 8 - 3);
        bitmap.mark_bit(BITMAP_SIZE as u64 * 8 - 2);
        bitmap.mark_bit(BITMAP_SIZE as u64 * 8 - 1);
        Ok(bitmap)
    }

    fn mark_bit(&mut self, n: u64) {
        let byte = (n / 8) as usize;
        let bit = (n % 8) as usize;
        self.bits[byte] |= MASK[bit];
    }

    fn is_set(&self, n: u64) -> bool {
        let byte = (n / 8) as usize;
        let bit = (n % 8) as usize;
        self.bits[byte] & MASK[bit] != 0
    }

    /// Marks block `n` allocated. Rejects `n >= DISK_BLOCKS`.
    pub fn set_bit(&mut self, n: u64) -> FsResult<()> {
        if n >= DISK_BLOCKS {
            return Err(FsError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("block {n} is out of .disk bounds"),
            )));
        }
        trace!("set_bit({n})");
        self.mark_bit(n);
        Ok(())
    }

    /// Scans from byte 0, bit 0 upward, and returns the first clear bit's
    /// global index. Does **not** mark the bit allocated — callers must
    /// call `set_bit` once they've decided to use the block, so two
    /// consecutive calls without an intervening `set_bit` return the same
    /// block.
    pub fn find_free_block(&self) -> FsResult<u64> {
        for byte in 0..BITMAP_SIZE {
            if self.bits[byte] == 0xFF {
                continue;
            }
            for bit in 0..8 {
                if self.bits[byte] & MASK[bit] == 0 {
                    let block = (byte as u64) * 8 + bit as u64;
                    trace!("find_free_block -> {block}");
                    return Ok(block);
                }
            }
        }
        Err(FsError::NoSpace)
    }

    /// Persists the in-memory mirror back to blocks 10237–10239.
    pub fn flush(&self, disk: &Disk) -> FsResult<()> {
        for i in 0..BITMAP_BLOCKS {
            let mut block = [0u8; BLOCK_SIZE];
            let start = (i as usize) * BLOCK_SIZE;
            block.copy_from_slice(&self.bits[start..start + BLOCK_SIZE]);
            disk.write_block(BITMAP_START_BLOCK + i, &block)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_bitmap() -> (tempfile::TempDir, Disk, Bitmap) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");
        let disk = Disk::create_if_missing(&path).unwrap();
        let bitmap = Bitmap::init(&disk).unwrap();
        (dir, disk, bitmap)
    }

    #[test]
    fn init_marks_root_and_trailing_bits() {
        let (_dir, _disk, bitmap) = fresh_bitmap();
        assert!(bitmap.is_set(0));
        let top = BITMAP_SIZE as u64 * 8;
        assert!(bitmap.is_set(top - 1));
        assert!(bitmap.is_set(top - 2));
        assert!(bitmap.is_set(top - 3));
    }

    #[test]
    fn init_is_idempotent() {
        let (_dir, disk, bitmap) = fresh_bitmap();
        bitmap.flush(&disk).unwrap();
        let bitmap2 = Bitmap::init(&disk).unwrap();
        assert_eq!(bitmap.bits, bitmap2.bits);
    }

    #[test]
    fn find_free_block_skips_allocated_bit_zero() {
        let (_dir, _disk, bitmap) = fresh_bitmap();
        assert_eq!(bitmap.find_free_block().unwrap(), 1);
    }

    #[test]
    fn find_free_block_is_stable_without_set_bit() {
        let (_dir, _disk, bitmap) = fresh_bitmap();
        let a = bitmap.find_free_block().unwrap();
        let b = bitmap.find_free_block().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn set_bit_advances_find_free_block() {
        let (_dir, _disk, mut bitmap) = fresh_bitmap();
        let first = bitmap.find_free_block().unwrap();
        bitmap.set_bit(first).unwrap();
        let second = bitmap.find_free_block().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn set_bit_rejects_out_of_range() {
        let (_dir, _disk, mut bitmap) = fresh_bitmap();
        assert!(bitmap.set_bit(DISK_BLOCKS).is_err());
    }

    #[test]
    fn flush_and_reinit_round_trips() {
        let (_dir, disk, mut bitmap) = fresh_bitmap();
        bitmap.set_bit(5).unwrap();
        bitmap.flush(&disk).unwrap();

        let reloaded = Bitmap::init(&disk).unwrap();
        assert!(reloaded.is_set(5));
    }
}
