//! On-disk layout constants and byte-level (de)serialization of the three
//! record types that live in a block: the root directory, a subdirectory,
//! and a file's index block.
//!
//! Every record is hand-serialized at explicit byte offsets into a reused
//! `[u8; BLOCK_SIZE]` buffer rather than defined as a `#[repr(C)]` struct —
//! a natural Rust struct layout would insert alignment padding the format
//! does not have (an 8-byte block number following a 9-byte name would be
//! padded to an 8-aligned offset, growing each root entry past its intended
//! 17 bytes). Byte slicing keeps the layout exact and host-independent.

use crate::error::{FsError, FsResult};

pub const BLOCK_SIZE: usize = 512;
pub type Block = [u8; BLOCK_SIZE];

pub const DISK_BLOCKS: u64 = 10240;
pub const IMAGE_SIZE: u64 = BLOCK_SIZE as u64 * DISK_BLOCKS;

pub const BITMAP_BLOCKS: u64 = 3;
pub const BITMAP_START_BLOCK: u64 = DISK_BLOCKS - BITMAP_BLOCKS;
pub const BITMAP_SIZE: usize = BLOCK_SIZE * BITMAP_BLOCKS as usize;

/// The root directory always lives at block 0.
pub const ROOT_BLOCK: u64 = 0;

pub const MAX_FILENAME: usize = 8;
pub const MAX_EXTENSION: usize = 3;

const NAME_FIELD: usize = MAX_FILENAME + 1;
const EXT_FIELD: usize = MAX_EXTENSION + 1;
const COUNT_FIELD: usize = size_of::<u32>();
const BLOCKNO_FIELD: usize = size_of::<u64>();

/// `name[9] + startBlock: u64`.
pub const ROOT_ENTRY_SIZE: usize = NAME_FIELD + BLOCKNO_FIELD;
/// `floor((512 - sizeof(u32)) / (9 + sizeof(u64)))`.
pub const MAX_DIRS_IN_ROOT: usize = (BLOCK_SIZE - COUNT_FIELD) / ROOT_ENTRY_SIZE;

/// `fname[9] + fext[4] + fsize: u64 + indexBlock: u64`.
pub const FILE_ENTRY_SIZE: usize = NAME_FIELD + EXT_FIELD + BLOCKNO_FIELD + BLOCKNO_FIELD;
/// `floor((512 - sizeof(u32)) / (9 + 4 + sizeof(u64) + sizeof(u64)))`.
pub const MAX_FILES_IN_DIR: usize = (BLOCK_SIZE - COUNT_FIELD) / FILE_ENTRY_SIZE;

/// `512 / sizeof(u64)`.
pub const MAX_ENTRIES_IN_INDEX_BLOCK: usize = BLOCK_SIZE / BLOCKNO_FIELD;

fn encode_field(field: &mut [u8], s: &str, limit: usize) -> FsResult<()> {
    let bytes = s.as_bytes();
    if bytes.len() > limit {
        return Err(FsError::NameTooLong);
    }
    field.fill(0);
    field[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn decode_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// The block at index 0: a count of subdirectories plus a fixed-capacity
/// array of `(name, start_block)` entries.
pub struct RootBlock(pub Block);

impl RootBlock {
    pub fn zeroed() -> Self {
        Self([0u8; BLOCK_SIZE])
    }

    pub fn from_block(block: Block) -> Self {
        Self(block)
    }

    pub fn n_directories(&self) -> usize {
        u32::from_le_bytes(self.0[0..4].try_into().unwrap()) as usize
    }

    pub fn set_n_directories(&mut self, n: usize) {
        self.0[0..4].copy_from_slice(&(n as u32).to_le_bytes());
    }

    fn entry_offset(i: usize) -> usize {
        COUNT_FIELD + i * ROOT_ENTRY_SIZE
    }

    pub fn entry_name(&self, i: usize) -> String {
        let off = Self::entry_offset(i);
        decode_field(&self.0[off..off + NAME_FIELD])
    }

    pub fn entry_start_block(&self, i: usize) -> u64 {
        let off = Self::entry_offset(i) + NAME_FIELD;
        u64::from_le_bytes(self.0[off..off + BLOCKNO_FIELD].try_into().unwrap())
    }

    pub fn set_entry(&mut self, i: usize, name: &str, start_block: u64) -> FsResult<()> {
        let off = Self::entry_offset(i);
        encode_field(&mut self.0[off..off + NAME_FIELD], name, MAX_FILENAME)?;
        let off = off + NAME_FIELD;
        self.0[off..off + BLOCKNO_FIELD].copy_from_slice(&start_block.to_le_bytes());
        Ok(())
    }
}

/// A subdirectory block: a count of files plus a fixed-capacity array of
/// `(fname, fext, fsize, index_block)` entries.
pub struct SubDirBlock(pub Block);

impl SubDirBlock {
    pub fn zeroed() -> Self {
        Self([0u8; BLOCK_SIZE])
    }

    pub fn from_block(block: Block) -> Self {
        Self(block)
    }

    pub fn n_files(&self) -> usize {
        u32::from_le_bytes(self.0[0..4].try_into().unwrap()) as usize
    }

    pub fn set_n_files(&mut self, n: usize) {
        self.0[0..4].copy_from_slice(&(n as u32).to_le_bytes());
    }

    fn entry_offset(i: usize) -> usize {
        COUNT_FIELD + i * FILE_ENTRY_SIZE
    }

    pub fn entry_fname(&self, i: usize) -> String {
        let off = Self::entry_offset(i);
        decode_field(&self.0[off..off + NAME_FIELD])
    }

    pub fn entry_fext(&self, i: usize) -> String {
        let off = Self::entry_offset(i) + NAME_FIELD;
        decode_field(&self.0[off..off + EXT_FIELD])
    }

    pub fn entry_fsize(&self, i: usize) -> u64 {
        let off = Self::entry_offset(i) + NAME_FIELD + EXT_FIELD;
        u64::from_le_bytes(self.0[off..off + BLOCKNO_FIELD].try_into().unwrap())
    }

    pub fn set_entry_fsize(&mut self, i: usize, fsize: u64) {
        let off = Self::entry_offset(i) + NAME_FIELD + EXT_FIELD;
        self.0[off..off + BLOCKNO_FIELD].copy_from_slice(&fsize.to_le_bytes());
    }

    pub fn entry_index_block(&self, i: usize) -> u64 {
        let off = Self::entry_offset(i) + NAME_FIELD + EXT_FIELD + BLOCKNO_FIELD;
        u64::from_le_bytes(self.0[off..off + BLOCKNO_FIELD].try_into().unwrap())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn set_entry(
        &mut self,
        i: usize,
        fname: &str,
        fext: &str,
        fsize: u64,
        index_block: u64,
    ) -> FsResult<()> {
        let off = Self::entry_offset(i);
        encode_field(&mut self.0[off..off + NAME_FIELD], fname, MAX_FILENAME)?;
        let off = off + NAME_FIELD;
        encode_field(&mut self.0[off..off + EXT_FIELD], fext, MAX_EXTENSION)?;
        let off = off + EXT_FIELD;
        self.0[off..off + BLOCKNO_FIELD].copy_from_slice(&fsize.to_le_bytes());
        let off = off + BLOCKNO_FIELD;
        self.0[off..off + BLOCKNO_FIELD].copy_from_slice(&index_block.to_le_bytes());
        Ok(())
    }
}

/// A file's index block: a flat array of data-block numbers. `0` means "no
/// entry" and terminates the logical file.
pub struct IndexBlock(pub Block);

impl IndexBlock {
    pub fn zeroed() -> Self {
        Self([0u8; BLOCK_SIZE])
    }

    pub fn from_block(block: Block) -> Self {
        Self(block)
    }

    pub fn get(&self, i: usize) -> u64 {
        let off = i * BLOCKNO_FIELD;
        u64::from_le_bytes(self.0[off..off + BLOCKNO_FIELD].try_into().unwrap())
    }

    pub fn set(&mut self, i: usize, block_no: u64) {
        let off = i * BLOCKNO_FIELD;
        self.0[off..off + BLOCKNO_FIELD].copy_from_slice(&block_no.to_le_bytes());
    }
}
