//! A two-level 8.3 userspace filesystem over a fixed-size disk image,
//! mounted via FUSE. See `layout` for the on-disk format, `bitmap` for
//! block allocation, `dir`/`file` for the directory and I/O layers, and
//! `fuse_fs` for the kernel-facing facade.

pub mod bitmap;
pub mod dir;
pub mod disk;
pub mod error;
pub mod file;
pub mod fuse_fs;
pub mod layout;
pub mod path;
