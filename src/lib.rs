//! BWFS ("Black & White File System") core: a POSIX-style file system whose
//! on-disk substrate is a directory of fixed-size 1-bit blocks.
//!
//! This crate implements the on-disk layout and its invariants (superblock,
//! block bitmap, inodes, directory blocks), the worst-fit block allocator,
//! inode lifecycle and resize, directory entry management, path resolution,
//! the `FileOps` surface a mount daemon drives, and an offline consistency
//! checker (`fsck`). The mount daemon itself (`bin/mount_bwfs.rs`) is a thin
//! FUSE adapter over [`fileops::FileSystem`]; everything interesting lives
//! in the modules re-exported below.

pub mod alloc;
pub mod bitmap;
pub mod block_store;
pub mod dir;
pub mod error;
pub mod fileops;
pub mod fsck;
pub mod inode;
pub mod mkfs;
pub mod path;
pub mod superblock;
pub mod util;

pub use error::{Error, Result};
pub use fileops::FileSystem;
