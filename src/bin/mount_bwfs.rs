//! `mount.bwfs`: a FUSE adapter binding the kernel's file-system requests to
//! `bwfs::FileSystem`. Every BWFS core operation is stateless and re-resolves
//! by path, so this adapter's only job is bridging FUSE's inode-number
//! convention to BWFS paths: it keeps a small `fuse_ino -> path` table,
//! populated as `lookup`/`readdir` discover entries, and maps BWFS's own
//! block-id inode numbers onto FUSE inode numbers directly (block ids never
//! collide, except that FUSE reserves ino 1 for the root, which BWFS's root
//! inode normally is not — so root is special-cased).
//!
//! The adapter itself is not part of the BWFS core design (see spec.md §1,
//! "the mount daemon... is treated as an external adapter"); this is a
//! minimal, workable implementation of that adapter, not a specified
//! component.

use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::exit;
use std::time::{Duration, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyOpen, ReplyStatfs, ReplyWrite, Request,
};

use bwfs::block_store::{FileBlockStore, BYTES_PER_BLOCK};
use bwfs::error::Error;
use bwfs::inode::Inode;
use bwfs::log_error;
use bwfs::FileSystem;

/// FUSE reserves inode 1 for the mount root regardless of what the
/// underlying file system calls it.
const FUSE_ROOT_INO: u64 = 1;
const TTL: Duration = Duration::from_secs(1);

struct Adapter {
    fs: FileSystem,
    /// `fuse_ino -> BWFS path` for every inode the kernel currently holds a
    /// reference to.
    paths: HashMap<u64, String>,
    root_bwfs_ino: u32,
}

impl Adapter {
    fn new(fs: FileSystem, root_bwfs_ino: u32) -> Self {
        let mut paths = HashMap::new();
        paths.insert(FUSE_ROOT_INO, "/".to_string());
        Self {
            fs,
            paths,
            root_bwfs_ino,
        }
    }

    fn fuse_ino(&self, bwfs_ino: u32) -> u64 {
        if bwfs_ino == self.root_bwfs_ino {
            FUSE_ROOT_INO
        } else {
            bwfs_ino as u64
        }
    }

    fn path_of(&self, ino: u64) -> Option<&str> {
        self.paths.get(&ino).map(String::as_str)
    }

    fn child_path(parent: &str, name: &OsStr) -> String {
        let name = name.to_string_lossy();
        if parent == "/" {
            format!("/{name}")
        } else {
            format!("{parent}/{name}")
        }
    }

    fn attr_of(&self, inode: &Inode) -> FileAttr {
        let kind = if inode.is_dir() {
            FileType::Directory
        } else {
            FileType::RegularFile
        };
        let perm = if inode.is_dir() { 0o755 } else { 0o644 };
        let mtime = UNIX_EPOCH + Duration::from_secs(inode.mtime);
        let ctime = UNIX_EPOCH + Duration::from_secs(inode.ctime);
        FileAttr {
            ino: self.fuse_ino(inode.ino),
            size: inode.size,
            blocks: inode.block_count as u64,
            atime: mtime,
            mtime,
            ctime,
            crtime: ctime,
            kind,
            perm,
            nlink: inode.link_count,
            uid: 0,
            gid: 0,
            rdev: 0,
            blksize: BYTES_PER_BLOCK as u32,
            flags: 0,
        }
    }
}

impl Filesystem for Adapter {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let child_path = Self::child_path(&parent_path, name);
        match self.fs.getattr(&child_path) {
            Ok(inode) => {
                let attr = self.attr_of(&inode);
                self.paths.insert(attr.ino, child_path);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.path_of(ino).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        match self.fs.getattr(&path) {
            Ok(inode) => reply.attr(&TTL, &self.attr_of(&inode)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let Some(path) = self.path_of(ino).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let entries = match self.fs.readdir(&path) {
            Ok(e) => e,
            Err(e) => return reply.error(e.to_errno()),
        };

        for (i, (name, child_bwfs_ino, is_dir)) in entries.into_iter().enumerate().skip(offset as usize) {
            let fuse_child_ino = if name == "." {
                ino
            } else if name == ".." {
                self.fuse_ino(child_bwfs_ino)
            } else {
                let full = Self::child_path(&path, OsStr::new(&name));
                let child_fuse_ino = self.fuse_ino(child_bwfs_ino);
                self.paths.insert(child_fuse_ino, full);
                child_fuse_ino
            };
            let kind = if is_dir { FileType::Directory } else { FileType::RegularFile };
            if reply.add(fuse_child_ino, (i + 1) as i64, kind, name.as_str()) {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let child_path = Self::child_path(&parent_path, name);
        match self.fs.mkdir(&child_path) {
            Ok(inode) => {
                let attr = self.attr_of(&inode);
                self.paths.insert(attr.ino, child_path);
                reply.entry(&TTL, &attr, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let child_path = Self::child_path(&parent_path, name);
        match self.fs.rmdir(&child_path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let child_path = Self::child_path(&parent_path, name);
        match self.fs.create(&child_path) {
            Ok(inode) => {
                let attr = self.attr_of(&inode);
                self.paths.insert(attr.ino, child_path);
                reply.created(&TTL, &attr, 0, 0, 0);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let Some(parent_path) = self.path_of(parent).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        let child_path = Self::child_path(&parent_path, name);
        match self.fs.unlink(&child_path) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let (Some(parent_path), Some(newparent_path)) =
            (self.path_of(parent).map(str::to_owned), self.path_of(newparent).map(str::to_owned))
        else {
            return reply.error(Error::NotFound.to_errno());
        };
        let from = Self::child_path(&parent_path, name);
        let to = Self::child_path(&newparent_path, newname);
        match self.fs.rename(&from, &to) {
            Ok(()) => {
                let renamed_ino = self.paths.iter().find(|&(_, p)| *p == from).map(|(&ino, _)| ino);
                if let Some(ino) = renamed_ino {
                    self.paths.insert(ino, to);
                }
                reply.ok();
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        if self.path_of(ino).is_some() {
            reply.opened(0, 0);
        } else {
            reply.error(Error::NotFound.to_errno());
        }
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
        let Some(path) = self.path_of(ino).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        match self.fs.read(&path, offset.max(0) as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
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
        let Some(path) = self.path_of(ino).map(str::to_owned) else {
            return reply.error(Error::NotFound.to_errno());
        };
        match self.fs.write(&path, offset.max(0) as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        let stats = self.fs.statfs();
        reply.statfs(
            stats.total_blocks as u64,
            stats.free_blocks as u64,
            stats.free_blocks as u64,
            0,
            0,
            stats.block_size,
            255,
            stats.block_size,
        );
    }
}

fn usage(prog: &str) {
    eprintln!("Usage: {prog} <dir> <mountpoint>");
}

fn main() {
    let mut iter = std::env::args();
    let prog = iter.next().unwrap_or_else(|| "mount.bwfs".to_owned());
    let dir = iter.next().unwrap_or_else(|| {
        usage(&prog);
        exit(1);
    });
    let mountpoint = iter.next().unwrap_or_else(|| {
        usage(&prog);
        exit(1);
    });

    let dir = std::fs::canonicalize(PathBuf::from(dir)).unwrap_or_else(|e| {
        log_error!("{}", e);
        exit(1);
    });

    let store = FileBlockStore::new(&dir);
    let fs = FileSystem::mount(Box::new(store)).unwrap_or_else(|e| {
        log_error!("failed to mount {}: {}", dir.display(), e);
        exit(1);
    });
    let root_ino = match fs.getattr("/") {
        Ok(inode) => inode.ino,
        Err(e) => {
            log_error!("failed to read root inode: {}", e);
            exit(1);
        }
    };

    let options = vec![MountOption::FSName("bwfs".to_string()), MountOption::AutoUnmount];
    if let Err(e) = fuser::mount2(Adapter::new(fs, root_ino), &mountpoint, &options) {
        log_error!("mount failed: {}", e);
        exit(1);
    }
}
