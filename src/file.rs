//! Positioned read/write over a file's index block and data blocks, with
//! on-demand growth on write.
//!
//! Both directions treat a block boundary identically: the running position
//! determines the current block and in-block offset, and a transfer never
//! crosses a block boundary in one copy — it's clamped to what remains in
//! the current block, then the position advances and the next iteration
//! picks up the next block. This mirrors the original's per-byte loop
//! (`offset % 512 == 0` advances to the next index entry) while working in
//! whole runs instead of one byte at a time.

use crate::bitmap::Bitmap;
use crate::dir::{self, ResolvedDir, ResolvedFile};
use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::{IndexBlock, BLOCK_SIZE, MAX_ENTRIES_IN_INDEX_BLOCK};

/// Reads up to `size` bytes starting at `offset`. Strictly length- and
/// size-bounded: never scans for an embedded NUL, and a read starting at or
/// past EOF returns an empty buffer rather than an error.
pub fn read(disk: &Disk, file: &ResolvedFile, offset: u64, size: usize) -> FsResult<Vec<u8>> {
    if offset >= file.fsize || size == 0 {
        return Ok(Vec::new());
    }

    let to_read = size.min((file.fsize - offset) as usize);
    let index_block = IndexBlock::from_block(disk.read_block(file.index_block)?);

    let mut out = Vec::with_capacity(to_read);
    let mut pos = offset;
    let end = offset + to_read as u64;

    while pos < end {
        let block_no_in_file = (pos / BLOCK_SIZE as u64) as usize;
        let in_block_offset = (pos % BLOCK_SIZE as u64) as usize;
        let run = (BLOCK_SIZE - in_block_offset).min((end - pos) as usize);

        let data_block_no = index_block.get(block_no_in_file);
        if data_block_no == 0 {
            break;
        }
        let block = disk.read_block(data_block_no)?;
        out.extend_from_slice(&block[in_block_offset..in_block_offset + run]);

        pos += run as u64;
    }

    Ok(out)
}

/// Writes `data` starting at `offset`, growing the file (allocating new data
/// blocks and extending its recorded size) as needed. The full block
/// requirement is validated against the index block's capacity before any
/// allocation happens, so a write that would overflow the index fails
/// cleanly with no partial allocation.
///
/// A zero-length write is rejected with `PermissionDenied` and a sparse
/// write starting past the current end of file is rejected with
/// `FileTooLarge` — appends exactly at `fsize` are the only way to grow a
/// file, matching the original's disallowance of holes.
pub fn write(
    disk: &Disk,
    bitmap: &mut Bitmap,
    dir_entry: ResolvedDir,
    file: &ResolvedFile,
    offset: u64,
    data: &[u8],
) -> FsResult<usize> {
    if data.is_empty() {
        return Err(FsError::PermissionDenied);
    }
    if offset > file.fsize {
        return Err(FsError::FileTooLarge);
    }

    let end = offset + data.len() as u64;
    let blocks_needed = end.div_ceil(BLOCK_SIZE as u64) as usize;
    if blocks_needed > MAX_ENTRIES_IN_INDEX_BLOCK {
        return Err(FsError::FileTooLarge);
    }

    let mut index_block = IndexBlock::from_block(disk.read_block(file.index_block)?);
    let blocks_allocated = (file.fsize as usize).div_ceil(BLOCK_SIZE).max(1);

    let mut index_dirty = false;
    for i in blocks_allocated..blocks_needed {
        let new_block = bitmap.find_free_block()?;
        bitmap.set_bit(new_block)?;
        disk.write_block(new_block, &[0u8; BLOCK_SIZE])?;
        index_block.set(i, new_block);
        index_dirty = true;
    }
    if index_dirty {
        disk.write_block(file.index_block, &index_block.0)?;
    }

    let mut pos = offset;
    let mut written = 0usize;
    while pos < end {
        let block_no_in_file = (pos / BLOCK_SIZE as u64) as usize;
        let in_block_offset = (pos % BLOCK_SIZE as u64) as usize;
        let run = (BLOCK_SIZE - in_block_offset).min((end - pos) as usize);

        let data_block_no = index_block.get(block_no_in_file);
        let mut block = if run == BLOCK_SIZE {
            [0u8; BLOCK_SIZE]
        } else {
            disk.read_block(data_block_no)?
        };
        block[in_block_offset..in_block_offset + run]
            .copy_from_slice(&data[written..written + run]);
        disk.write_block(data_block_no, &block)?;

        pos += run as u64;
        written += run;
    }

    if end > file.fsize {
        dir::set_file_size(disk, dir_entry, file.file_index, end)?;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::RootBlock;

    fn fresh() -> (tempfile::TempDir, Disk, Bitmap) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.disk");
        let disk = Disk::create_if_missing(&path).unwrap();
        let bitmap = Bitmap::init(&disk).unwrap();
        disk.write_block(crate::layout::ROOT_BLOCK, &RootBlock::zeroed().0)
            .unwrap();
        (dir, disk, bitmap)
    }

    #[test]
    fn write_then_read_round_trips_within_one_block() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();

        let n = write(&disk, &mut bitmap, resolved_dir, &file, 0, b"hello world").unwrap();
        assert_eq!(n, 11);

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        assert_eq!(file.fsize, 11);

        let got = read(&disk, &file, 0, 11).unwrap();
        assert_eq!(got, b"hello world");
    }

    #[test]
    fn write_spanning_block_boundary_grows_index() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();

        let data = vec![0xABu8; BLOCK_SIZE + 100];
        write(&disk, &mut bitmap, resolved_dir, &file, 0, &data).unwrap();

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        assert_eq!(file.fsize, (BLOCK_SIZE + 100) as u64);

        let got = read(&disk, &file, 0, BLOCK_SIZE + 100).unwrap();
        assert_eq!(got, data);
    }

    #[test]
    fn read_past_eof_returns_empty() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();
        write(&disk, &mut bitmap, resolved_dir, &file, 0, b"abc").unwrap();

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        let got = read(&disk, &file, 100, 10).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn read_clamps_to_available_bytes() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();
        write(&disk, &mut bitmap, resolved_dir, &file, 0, b"abcde").unwrap();

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        let got = read(&disk, &file, 2, 100).unwrap();
        assert_eq!(got, b"cde");
    }

    #[test]
    fn read_stops_at_zero_index_entry_before_exhausting_size() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();
        write(&disk, &mut bitmap, resolved_dir, &file, 0, &[0xAAu8; BLOCK_SIZE]).unwrap();

        // Simulate an `fsize` that claims a second block the index block does
        // not actually have an entry for (e.g. a stale/inconsistent record).
        let inconsistent = ResolvedFile {
            dir: resolved_dir,
            file_index: file.file_index,
            fsize: (BLOCK_SIZE + 100) as u64,
            index_block: file.index_block,
        };

        let got = read(&disk, &inconsistent, 0, BLOCK_SIZE + 100).unwrap();
        assert_eq!(got.len(), BLOCK_SIZE);
        assert_eq!(got, vec![0xAAu8; BLOCK_SIZE]);
    }

    #[test]
    fn write_exceeding_index_capacity_is_rejected() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();

        let too_big = vec![0u8; (MAX_ENTRIES_IN_INDEX_BLOCK + 1) * BLOCK_SIZE];
        assert!(matches!(
            write(&disk, &mut bitmap, resolved_dir, &file, 0, &too_big),
            Err(FsError::FileTooLarge)
        ));
    }

    #[test]
    fn overwrite_within_existing_bounds_preserves_surrounding_bytes() {
        let (_tmp, disk, mut bitmap) = fresh();
        let resolved_dir = dir::insert_dir(&disk, &mut bitmap, "alpha").unwrap();
        let file = dir::insert_file(&disk, &mut bitmap, resolved_dir, "hi", "txt").unwrap();
        write(&disk, &mut bitmap, resolved_dir, &file, 0, b"aaaaaaaaaa").unwrap();

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        write(&disk, &mut bitmap, resolved_dir, &file, 2, b"BB").unwrap();

        let file = dir::resolve_file(&disk, "alpha", "hi", "txt").unwrap();
        let got = read(&disk, &file, 0, 10).unwrap();
        assert_eq!(&got, b"aaBBaaaaaa");
    }
}
