//! The `fuser::Filesystem` facade: translates inode-addressed FUSE calls
//! into the path/array-addressed operations of `dir` and `file`, and maps
//! `FsError` onto the raw errno each `Reply*::error()` expects.
//!
//! `fuser` addresses every entity by a 64-bit `ino`, resolved once via
//! `lookup` and cached by the kernel, where the on-disk format instead
//! addresses entities by array position within root/subdirectory blocks.
//! Rather than keep a separate inode table (for which the format has no
//! room), `ino` is computed deterministically from array position and
//! decomposed back on every call — see `resolve_ino` below. Entries are
//! only ever appended, so an entry's array index, and therefore its `ino`,
//! is stable for the mount's lifetime.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use log::{debug, warn};

use crate::bitmap::Bitmap;
use crate::dir::{self, ResolvedDir, ResolvedFile};
use crate::disk::Disk;
use crate::error::FsError;
use crate::layout::MAX_FILES_IN_DIR;
use crate::path::ParsedPath;

const ROOT_INO: u64 = 1;
const DIR_INO_BASE: u64 = 2;
const FILE_INO_BASE: u64 = DIR_INO_BASE + crate::layout::MAX_DIRS_IN_ROOT as u64;

const ATTR_TTL: Duration = Duration::from_secs(1);
const DIR_PERM: u16 = 0o755;
const FILE_PERM: u16 = 0o666;

fn dir_ino(index: usize) -> u64 {
    DIR_INO_BASE + index as u64
}

fn file_ino(dir_index: usize, file_index: usize) -> u64 {
    FILE_INO_BASE + dir_index as u64 * MAX_FILES_IN_DIR as u64 + file_index as u64
}

/// Runs a single FUSE path component (e.g. `"hi.txt"`) through the same
/// `sscanf`-equivalent parser the original full-path interface used,
/// by placing it where a full path's trailing segment would be. This
/// reuses `ParsedPath`'s token-splitting and length validation rather than
/// re-deriving them, even though `fuser` hands us components instead of
/// whole paths.
fn split_file_component(name: &str) -> Result<(String, String), FsError> {
    let synthetic = format!("/d/{name}");
    let parsed = ParsedPath::parse(&synthetic)?;
    Ok((
        parsed.fname.unwrap_or_default(),
        parsed.fext.unwrap_or_default(),
    ))
}

/// Validates a bare directory-name component the same way `ParsedPath`
/// would validate the first segment of a full path.
fn validate_dir_component(name: &str) -> Result<String, FsError> {
    let synthetic = format!("/{name}");
    let parsed = ParsedPath::parse(&synthetic)?;
    parsed.dir.ok_or(FsError::PermissionDenied)
}

/// What an `ino` resolved to.
enum Entity {
    Root,
    Dir(ResolvedDir),
    File(ResolvedFile),
}

fn resolve_ino(disk: &Disk, ino: u64) -> Result<Entity, FsError> {
    if ino == ROOT_INO {
        return Ok(Entity::Root);
    }

    if ino >= FILE_INO_BASE {
        let combined = ino - FILE_INO_BASE;
        let dir_index = (combined / MAX_FILES_IN_DIR as u64) as usize;
        let file_index = (combined % MAX_FILES_IN_DIR as u64) as usize;

        let root = dir::read_root(disk)?;
        if dir_index >= root.n_directories() {
            return Err(FsError::NotFound);
        }
        let start_block = root.entry_start_block(dir_index);
        let subdir = dir::read_subdir(disk, start_block)?;
        if file_index >= subdir.n_files() {
            return Err(FsError::NotFound);
        }

        return Ok(Entity::File(ResolvedFile {
            dir: ResolvedDir {
                index: dir_index,
                start_block,
            },
            file_index,
            fsize: subdir.entry_fsize(file_index),
            index_block: subdir.entry_index_block(file_index),
        }));
    }

    let dir_index = (ino - DIR_INO_BASE) as usize;
    let root = dir::read_root(disk)?;
    if dir_index >= root.n_directories() {
        return Err(FsError::NotFound);
    }
    Ok(Entity::Dir(ResolvedDir {
        index: dir_index,
        start_block: root.entry_start_block(dir_index),
    }))
}

fn dir_attr(ino: u64) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino,
        size: 0,
        blocks: 0,
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::Directory,
        perm: DIR_PERM,
        nlink: 2,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: crate::layout::BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn file_attr(ino: u64, size: u64) -> FileAttr {
    let now = SystemTime::now();
    FileAttr {
        ino,
        size,
        blocks: size.div_ceil(crate::layout::BLOCK_SIZE as u64),
        atime: now,
        mtime: now,
        ctime: now,
        crtime: now,
        kind: FileType::RegularFile,
        perm: FILE_PERM,
        nlink: 1,
        uid: 0,
        gid: 0,
        rdev: 0,
        blksize: crate::layout::BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn entity_attr(entity: &Entity, ino: u64) -> FileAttr {
    match entity {
        Entity::Root | Entity::Dir(_) => dir_attr(ino),
        Entity::File(f) => file_attr(ino, f.fsize),
    }
}

/// Bundles the open disk handle and in-memory bitmap for the lifetime of
/// the mount; owned exclusively by `TwoLevelFs` and threaded through every
/// call via `&mut self`.
pub struct FsContext {
    pub disk: Disk,
    pub bitmap: Bitmap,
}

pub struct TwoLevelFs {
    ctx: FsContext,
}

impl TwoLevelFs {
    pub fn new(disk: Disk, bitmap: Bitmap) -> Self {
        Self {
            ctx: FsContext { disk, bitmap },
        }
    }
}

impl Filesystem for TwoLevelFs {
    fn init(
        &mut self,
        _req: &Request<'_>,
        _config: &mut fuser::KernelConfig,
    ) -> Result<(), libc::c_int> {
        debug!("filesystem mounted");
        Ok(())
    }

    fn destroy(&mut self) {
        if let Err(e) = self.ctx.bitmap.flush(&self.ctx.disk) {
            warn!("failed to flush bitmap on destroy: {e}");
        } else {
            debug!("bitmap flushed on destroy");
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            return reply.error(libc::ENOENT);
        };

        let result = (|| -> Result<(u64, FileAttr), FsError> {
            match resolve_ino(&self.ctx.disk, parent)? {
                Entity::Root => {
                    let root = dir::read_root(&self.ctx.disk)?;
                    let resolved = dir::lookup_dir_in(&root, name).ok_or(FsError::NotFound)?;
                    let ino = dir_ino(resolved.index);
                    Ok((ino, dir_attr(ino)))
                }
                Entity::Dir(d) => {
                    let (fname, fext) = split_file_component(name)?;
                    let subdir = dir::read_subdir(&self.ctx.disk, d.start_block)?;
                    let file_index =
                        dir::lookup_file_in(&subdir, &fname, &fext).ok_or(FsError::NotFound)?;
                    let ino = file_ino(d.index, file_index);
                    Ok((ino, file_attr(ino, subdir.entry_fsize(file_index))))
                }
                Entity::File(_) => Err(FsError::NotFound),
            }
        })();

        match result {
            Ok((_, attr)) => reply.entry(&ATTR_TTL, &attr, 0),
            Err(e) => {
                warn!("lookup({parent}, {name:?}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match resolve_ino(&self.ctx.disk, ino) {
            Ok(entity) => reply.attr(&ATTR_TTL, &entity_attr(&entity, ino)),
            Err(e) => {
                warn!("getattr({ino}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    /// Stands in for the original's `truncate`: accepted and reported back
    /// unchanged, never actually shrinking or growing the file. Truncation
    /// is a deliberate non-goal.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match resolve_ino(&self.ctx.disk, ino) {
            Ok(entity) => reply.attr(&ATTR_TTL, &entity_attr(&entity, ino)),
            Err(e) => reply.error(e.as_errno()),
        }
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        if parent != ROOT_INO {
            return reply.error(FsError::PermissionDenied.as_errno());
        }
        let Some(name) = name.to_str() else {
            return reply.error(libc::ENOENT);
        };
        let name = match validate_dir_component(name) {
            Ok(name) => name,
            Err(e) => return reply.error(e.as_errno()),
        };

        match dir::insert_dir(&self.ctx.disk, &mut self.ctx.bitmap, &name) {
            Ok(resolved) => {
                let ino = dir_ino(resolved.index);
                reply.entry(&ATTR_TTL, &dir_attr(ino), 0)
            }
            Err(e) => {
                warn!("mkdir(/{name}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        let Some(name) = name.to_str() else {
            return reply.error(libc::ENOENT);
        };

        let dir_entry = match resolve_ino(&self.ctx.disk, parent) {
            Ok(Entity::Dir(d)) => d,
            Ok(_) => return reply.error(FsError::PermissionDenied.as_errno()),
            Err(e) => return reply.error(e.as_errno()),
        };

        let (fname, fext) = match split_file_component(name) {
            Ok(parts) => parts,
            Err(e) => return reply.error(e.as_errno()),
        };
        match dir::insert_file(&self.ctx.disk, &mut self.ctx.bitmap, dir_entry, &fname, &fext) {
            Ok(resolved) => {
                let ino = file_ino(dir_entry.index, resolved.file_index);
                reply.entry(&ATTR_TTL, &file_attr(ino, 0), 0)
            }
            Err(e) => {
                warn!("mknod({name}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let entity = match resolve_ino(&self.ctx.disk, ino) {
            Ok(e) => e,
            Err(e) => return reply.error(e.as_errno()),
        };

        let mut entries: Vec<(u64, FileType, String)> = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ROOT_INO, FileType::Directory, "..".to_string()),
        ];

        match entity {
            Entity::Root => {
                let root = match dir::read_root(&self.ctx.disk) {
                    Ok(r) => r,
                    Err(e) => return reply.error(e.as_errno()),
                };
                for i in 0..root.n_directories() {
                    entries.push((dir_ino(i), FileType::Directory, root.entry_name(i)));
                }
            }
            Entity::Dir(d) => {
                let subdir = match dir::read_subdir(&self.ctx.disk, d.start_block) {
                    Ok(s) => s,
                    Err(e) => return reply.error(e.as_errno()),
                };
                for j in 0..subdir.n_files() {
                    let name = format!("{}.{}", subdir.entry_fname(j), subdir.entry_fext(j));
                    entries.push((file_ino(d.index, j), FileType::RegularFile, name));
                }
            }
            Entity::File(_) => return reply.error(libc::ENOTDIR),
        }

        for (i, (entry_ino, kind, name)) in entries.into_iter().enumerate().skip(offset as usize) {
            if reply.add(entry_ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn open(&mut self, _req: &Request<'_>, _ino: u64, _flags: i32, reply: ReplyOpen) {
        reply.opened(0, 0);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let file = match resolve_ino(&self.ctx.disk, ino) {
            Ok(Entity::File(f)) => f,
            Ok(_) => return reply.error(FsError::IsDirectory.as_errno()),
            Err(e) => return reply.error(e.as_errno()),
        };

        match crate::file::read(&self.ctx.disk, &file, offset as u64, size as usize) {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => {
                warn!("read(ino={ino}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let file = match resolve_ino(&self.ctx.disk, ino) {
            Ok(Entity::File(f)) => f,
            Ok(_) => return reply.error(FsError::IsDirectory.as_errno()),
            Err(e) => return reply.error(e.as_errno()),
        };

        match crate::file::write(
            &self.ctx.disk,
            &mut self.ctx.bitmap,
            file.dir,
            &file,
            offset as u64,
            data,
        ) {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                warn!("write(ino={ino}) failed: {e}");
                reply.error(e.as_errno());
            }
        }
    }

    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    /// Non-goal: no blocks are ever freed, so the entry simply stays behind.
    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.ok();
    }

    /// Non-goal: no blocks are ever freed, so the entry simply stays behind.
    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, _name: &OsStr, reply: ReplyEmpty) {
        reply.ok();
    }
}
