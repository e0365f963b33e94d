//! The directory layer: lookup, insertion and enumeration over the root
//! directory (block 0, holding subdirectories) and subdirectory blocks
//! (holding files), each a fixed-capacity array of entries.

use crate::bitmap::Bitmap;
use crate::disk::Disk;
use crate::error::{FsError, FsResult};
use crate::layout::{RootBlock, SubDirBlock, MAX_DIRS_IN_ROOT, MAX_FILES_IN_DIR, ROOT_BLOCK};

/// A subdirectory resolved against the root: its array position (stable,
/// used for `ino` assignment — see `fuse_fs`) and the block it lives in.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDir {
    pub index: usize,
    pub start_block: u64,
}

/// A file resolved within its subdirectory.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedFile {
    pub dir: ResolvedDir,
    pub file_index: usize,
    pub fsize: u64,
    pub index_block: u64,
}

pub fn read_root(disk: &Disk) -> FsResult<RootBlock> {
    disk.read_block(ROOT_BLOCK).map(RootBlock::from_block)
}

fn write_root(disk: &Disk, root: &RootBlock) -> FsResult<()> {
    disk.write_block(ROOT_BLOCK, &root.0)
}

pub fn read_subdir(disk: &Disk, start_block: u64) -> FsResult<SubDirBlock> {
    disk.read_block(start_block).map(SubDirBlock::from_block)
}

fn write_subdir(disk: &Disk, start_block: u64, subdir: &SubDirBlock) -> FsResult<()> {
    disk.write_block(start_block, &subdir.0)
}

/// Linear scan of root's entries by name.
pub fn lookup_dir_in(root: &RootBlock, name: &str) -> Option<ResolvedDir> {
    (0..root.n_directories()).find_map(|i| {
        if root.entry_name(i) == name {
            Some(ResolvedDir {
                index: i,
                start_block: root.entry_start_block(i),
            })
        } else {
            None
        }
    })
}

pub fn resolve_dir(disk: &Disk, name: &str) -> FsResult<ResolvedDir> {
    let root = read_root(disk)?;
    lookup_dir_in(&root, name).ok_or(FsError::NotFound)
}

/// Linear scan of a subdirectory's entries by `(fname, fext)`.
pub fn lookup_file_in(subdir: &SubDirBlock, fname: &str, fext: &str) -> Option<usize> {
    (0..subdir.n_files())
        .find(|&i| subdir.entry_fname(i) == fname && subdir.entry_fext(i) == fext)
}

pub fn resolve_file(disk: &Disk, dir_name: &str, fname: &str, fext: &str) -> FsResult<ResolvedFile> {
    let dir = resolve_dir(disk, dir_name)?;
    let subdir = read_subdir(disk, dir.start_block)?;
    let file_index = lookup_file_in(&subdir, fname, fext).ok_or(FsError::NotFound)?;

    Ok(ResolvedFile {
        dir,
        file_index,
        fsize: subdir.entry_fsize(file_index),
        index_block: subdir.entry_index_block(file_index),
    })
}

/// Creates a new subdirectory under root (`mkdir`). Allocates and
/// zero-fills its block, then persists the updated root.
pub fn insert_dir(disk: &Disk, bitmap: &mut Bitmap, name: &str) -> FsResult<ResolvedDir> {
    let mut root = read_root(disk)?;

    if lookup_dir_in(&root, name).is_some() {
        return Err(FsError::Exists);
    }
    if root.n_directories() >= MAX_DIRS_IN_ROOT {
        return Err(FsError::NoSpace);
    }

    let start_block = bitmap.find_free_block()?;
    bitmap.set_bit(start_block)?;

    // Zero-fill the new block explicitly rather than depending on the image
    // having been pre-zeroed (see SPEC_FULL.md §9).
    disk.write_block(start_block, &SubDirBlock::zeroed().0)?;

    let index = root.n_directories();
    root.set_entry(index, name, start_block)?;
    root.set_n_directories(index + 1);
    write_root(disk, &root)?;

    Ok(ResolvedDir { index, start_block })
}

/// Creates a new file inside an existing subdirectory (`mknod`). Allocates
/// an index block and an initial (zeroed) data block, then persists the
/// index block, data block and subdirectory in that order.
pub fn insert_file(
    disk: &Disk,
    bitmap: &mut Bitmap,
    dir: ResolvedDir,
    fname: &str,
    fext: &str,
) -> FsResult<ResolvedFile> {
    let mut subdir = read_subdir(disk, dir.start_block)?;

    if lookup_file_in(&subdir, fname, fext).is_some() {
        return Err(FsError::Exists);
    }
    if subdir.n_files() >= MAX_FILES_IN_DIR {
        return Err(FsError::NoSpace);
    }

    let index_block_no = bitmap.find_free_block()?;
    bitmap.set_bit(index_block_no)?;
    let data_block_no = bitmap.find_free_block()?;
    bitmap.set_bit(data_block_no)?;

    let mut index_block = crate::layout::IndexBlock::zeroed();
    index_block.set(0, data_block_no);

    disk.write_block(index_block_no, &index_block.0)?;
    disk.write_block(data_block_no, &[0u8; crate::layout::BLOCK_SIZE])?;

    let file_index = subdir.n_files();
    subdir.set_entry(file_index, fname, fext, 0, index_block_no)?;
    subdir.set_n_files(file_index + 1);
    write_subdir(disk, dir.start_block, &subdir)?;

    Ok(ResolvedFile {
        dir,
        file_index,
        fsize: 0,
        index_block: index_block_no,
    })
}

/// Updates a file's recorded size in its subdirectory entry, called after a
/// write extends it.
pub fn set_file_size(disk: &Disk, dir: ResolvedDir, file_index: usize, new_size: u64) -> FsResult<()> {
    let mut subdir = read_subdir(disk, dir.start_block)?;
    subdir.set_entry_fsize(file_index, new_size);
    write_subdir(disk, dir.start_block, &subdir)
}
