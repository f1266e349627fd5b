//! File operations (C8): a `FileSystem` context binding a `Superblock`,
//! `Bitmap`, and backing `BlockStore` into the POSIX-shaped operations a
//! mount point needs. Every call re-resolves its path against the store —
//! no in-memory inode cache is kept between calls.

use crate::alloc;
use crate::bitmap::Bitmap;
use crate::block_store::{BlockStore, BYTES_PER_BLOCK};
use crate::dir;
use crate::error::{Error, Result};
use crate::inode::{self, Inode, Kind, DIRECT};
use crate::path;
use crate::superblock::Superblock;
use crate::util::ceil_div;

/// `lseek`'s whence argument. `Cur` is rejected: BWFS operations are
/// stateless and carry no current file position to seek relative to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statfs {
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub used_blocks: u32,
    pub block_size: u32,
}

/// Live filesystem handle: owns the in-memory superblock and bitmap, and a
/// handle to the block-level store backing them both.
pub struct FileSystem {
    store: Box<dyn BlockStore>,
    superblock: Superblock,
    bitmap: Bitmap,
}

impl FileSystem {
    /// Mounts an already-formatted filesystem: reads and validates the
    /// superblock, then loads the bitmap.
    pub fn mount(store: Box<dyn BlockStore>) -> Result<Self> {
        let superblock = Superblock::read(store.as_ref())?;
        let bitmap = Bitmap::read(store.as_ref(), superblock.total_blocks)?;
        Ok(Self {
            store,
            superblock,
            bitmap,
        })
    }

    fn root(&self) -> Result<Inode> {
        Inode::read(self.store.as_ref(), self.superblock.root_inode)
    }

    fn resolve(&self, path: &str) -> Result<Inode> {
        path::resolve(self.store.as_ref(), &self.root()?, path)
    }

    /// Frees every data block held by `inode` plus the block holding the
    /// inode itself.
    fn free_inode(&mut self, inode: &Inode) -> Result<()> {
        for i in 0..inode.block_count as usize {
            alloc::free(&mut self.bitmap, inode.blocks[i], 1);
        }
        alloc::free(&mut self.bitmap, inode.ino, 1);
        self.bitmap.write(self.store.as_ref())
    }

    /// Returns attributes for the inode at `path`.
    pub fn getattr(&self, path: &str) -> Result<Inode> {
        self.resolve(path)
    }

    /// Lists `path`'s entries, synthesizing "." and "..". The root's ".."
    /// points back to itself.
    pub fn readdir(&self, path: &str) -> Result<Vec<(String, u32, bool)>> {
        let target = self.resolve(path)?;
        if !target.is_dir() {
            return Err(Error::Inval);
        }

        let parent_ino = if path == "/" {
            target.ino
        } else {
            let (parent_path, _) = path::split(path)?;
            self.resolve(&parent_path)?.ino
        };

        let mut out = vec![(".".to_string(), target.ino, true), ("..".to_string(), parent_ino, true)];
        for (name, ino) in dir::list(self.store.as_ref(), &target)? {
            let child = Inode::read(self.store.as_ref(), ino)?;
            out.push((name, ino, child.is_dir()));
        }
        Ok(out)
    }

    /// Creates a directory at `path`. The parent must already exist.
    pub fn mkdir(&mut self, path: &str) -> Result<Inode> {
        self.make_entry(path, Kind::Dir)
    }

    /// Creates a regular file at `path`. The parent must already exist.
    pub fn create(&mut self, path: &str) -> Result<Inode> {
        self.make_entry(path, Kind::File)
    }

    fn make_entry(&mut self, path: &str, kind: Kind) -> Result<Inode> {
        let (parent_path, name) = path::split(path)?;
        let mut parent = self.resolve(&parent_path)?;
        if !parent.is_dir() {
            return Err(Error::Inval);
        }

        let new_inode = inode::create_inode(&mut self.bitmap, self.store.as_ref(), kind)?;
        if let Err(e) = dir::add(&mut self.bitmap, self.store.as_ref(), &mut parent, &name, new_inode.ino) {
            // Roll back the inode block created above; it was never linked.
            alloc::free(&mut self.bitmap, new_inode.ino, 1);
            let _ = self.bitmap.write(self.store.as_ref());
            return Err(e);
        }
        Ok(new_inode)
    }

    /// Stateless "open": re-resolves `path` and returns its inode.
    pub fn open(&self, path: &str) -> Result<Inode> {
        self.resolve(path)
    }

    /// Removes the empty directory at `path`.
    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        if path == "/" {
            return Err(Error::Inval);
        }
        let target = self.resolve(path)?;
        if !target.is_dir() {
            return Err(Error::Inval);
        }
        if target.size != 0 || dir::entry_count(self.store.as_ref(), &target)? != 0 {
            return Err(Error::Inval); // ENOTEMPTY, per the mount-layer errno mapping
        }

        let (parent_path, name) = path::split(path)?;
        let mut parent = self.resolve(&parent_path)?;
        dir::remove(&mut self.bitmap, self.store.as_ref(), &mut parent, &name)?;
        self.free_inode(&target)
    }

    /// Removes the regular file at `path`.
    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let target = self.resolve(path)?;
        if target.is_dir() {
            return Err(Error::Inval); // EISDIR
        }

        let (parent_path, name) = path::split(path)?;
        let mut parent = self.resolve(&parent_path)?;
        dir::remove(&mut self.bitmap, self.store.as_ref(), &mut parent, &name)?;
        self.free_inode(&target)
    }

    /// Reads up to `len` bytes starting at `offset`. Returns fewer bytes
    /// than requested (possibly zero) once `offset` reaches EOF; never
    /// errors on short reads.
    pub fn read(&self, path: &str, offset: u64, len: usize) -> Result<Vec<u8>> {
        let inode = self.resolve(path)?;
        if inode.is_dir() {
            return Err(Error::Inval);
        }
        if offset >= inode.size {
            return Ok(Vec::new());
        }

        let available = (inode.size - offset) as usize;
        let n = len.min(available);
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;
        let mut pos = offset;

        while remaining > 0 {
            let block_idx = (pos / BYTES_PER_BLOCK as u64) as usize;
            let in_block_off = (pos % BYTES_PER_BLOCK as u64) as usize;
            let take = remaining.min(BYTES_PER_BLOCK - in_block_off);

            let mut block_buf = vec![0u8; BYTES_PER_BLOCK];
            self.store.read(inode.blocks[block_idx], &mut block_buf)?;
            out.extend_from_slice(&block_buf[in_block_off..in_block_off + take]);

            pos += take as u64;
            remaining -= take;
        }
        Ok(out)
    }

    /// Writes `data` at `offset`, growing the file (and allocating blocks)
    /// as needed. Fails with `Error::FileTooBig` (mapped to EFBIG at the
    /// mount boundary) if the write would need more than `DIRECT` blocks —
    /// distinct from the `Error::Full` (ENOSPC) a plain allocator exhaustion
    /// would raise.
    pub fn write(&mut self, path: &str, offset: u64, data: &[u8]) -> Result<usize> {
        let mut inode = self.resolve(path)?;
        if inode.is_dir() {
            return Err(Error::Inval);
        }

        let end = offset + data.len() as u64;
        if ceil_div(end, BYTES_PER_BLOCK as u64) as usize > DIRECT {
            return Err(Error::FileTooBig);
        }
        if end > inode.size {
            inode::resize(&mut self.bitmap, self.store.as_ref(), &mut inode, end)?;
        }

        let mut remaining = data;
        let mut pos = offset;
        while !remaining.is_empty() {
            let block_idx = (pos / BYTES_PER_BLOCK as u64) as usize;
            let in_block_off = (pos % BYTES_PER_BLOCK as u64) as usize;
            let take = remaining.len().min(BYTES_PER_BLOCK - in_block_off);

            let mut block_buf = vec![0u8; BYTES_PER_BLOCK];
            self.store.read(inode.blocks[block_idx], &mut block_buf)?;
            block_buf[in_block_off..in_block_off + take].copy_from_slice(&remaining[..take]);
            self.store.write(inode.blocks[block_idx], &block_buf)?;

            pos += take as u64;
            remaining = &remaining[take..];
        }

        inode.mtime = crate::util::timestamp();
        inode.write(self.store.as_ref())?;
        Ok(data.len())
    }

    /// Renames `from` to `to`. Both must share the same parent directory —
    /// cross-directory rename is out of scope and reported as
    /// `Error::Inval` (mapped to EXDEV at the mount boundary). Checks that
    /// `to` does not already exist before touching `from`'s entry, so a
    /// failed rename never leaves `from` unlinked.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let (from_parent_path, from_name) = path::split(from)?;
        let (to_parent_path, to_name) = path::split(to)?;
        if from_parent_path != to_parent_path {
            return Err(Error::Inval); // EXDEV
        }

        let mut parent = self.resolve(&from_parent_path)?;
        let child_ino = dir::lookup(self.store.as_ref(), &parent, &from_name)?.ok_or(Error::NotFound)?;

        if dir::lookup(self.store.as_ref(), &parent, &to_name)?.is_some() {
            return Err(Error::Inval); // EEXIST, checked before any mutation
        }

        dir::remove(&mut self.bitmap, self.store.as_ref(), &mut parent, &from_name)?;
        if let Err(e) = dir::add(&mut self.bitmap, self.store.as_ref(), &mut parent, &to_name, child_ino) {
            // Put the old entry back; `to_name` failed to bind (directory full).
            let _ = dir::add(&mut self.bitmap, self.store.as_ref(), &mut parent, &from_name, child_ino);
            return Err(e);
        }
        Ok(())
    }

    /// Filesystem-wide occupancy summary.
    pub fn statfs(&self) -> Statfs {
        let used = self.bitmap.popcount();
        Statfs {
            total_blocks: self.superblock.total_blocks,
            free_blocks: self.superblock.total_blocks - used,
            used_blocks: used,
            block_size: crate::block_store::BYTES_PER_BLOCK as u32,
        }
    }

    /// Computes a new file offset for `whence`/`offset` against a file of
    /// `size` bytes. `Whence::Cur` is rejected since no position is
    /// tracked across calls. A negative result is `Error::Inval`.
    pub fn lseek(whence: Whence, offset: i64, size: u64) -> Result<u64> {
        let result = match whence {
            Whence::Set => offset,
            Whence::End => size as i64 + offset,
            Whence::Cur => return Err(Error::Inval),
        };
        if result < 0 {
            return Err(Error::Inval);
        }
        Ok(result as u64)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_store::FileBlockStore;
    use tempfile::tempdir;

    fn fresh_fs(dir: &std::path::Path) -> FileSystem {
        let store = FileBlockStore::new(dir);
        let mut sb = Superblock::init(64);
        let mut bm = Bitmap::new(64);
        bm.set(0, true);
        bm.set(1, true);
        let root = inode::create_inode(&mut bm, &store, Kind::Dir).unwrap();
        sb.root_inode = root.ino;
        sb.write(&store).unwrap();
        bm.write(&store).unwrap();
        FileSystem::mount(Box::new(store)).unwrap()
    }

    #[test]
    fn create_write_read_round_trip() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.create("/a.txt").unwrap();
        let n = fs.write("/a.txt", 0, b"hello world").unwrap();
        assert_eq!(n, 11);

        let data = fs.read("/a.txt", 0, 1024).unwrap();
        assert_eq!(&data, b"hello world");
    }

    #[test]
    fn write_past_eof_zero_fills_gap() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.create("/a.txt").unwrap();
        fs.write("/a.txt", 5, b"X").unwrap();

        let data = fs.read("/a.txt", 0, 6).unwrap();
        assert_eq!(data, vec![0, 0, 0, 0, 0, b'X']);
    }

    #[test]
    fn mkdir_and_readdir_synthesize_dot_entries() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.mkdir("/sub").unwrap();

        let entries = fs.readdir("/").unwrap();
        let names: Vec<_> = entries.iter().map(|(n, _, _)| n.as_str()).collect();
        assert!(names.contains(&"."));
        assert!(names.contains(&".."));
        assert!(names.contains(&"sub"));
    }

    #[test]
    fn rmdir_requires_empty() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.mkdir("/sub").unwrap();
        fs.create("/sub/f").unwrap();

        assert_eq!(fs.rmdir("/sub"), Err(Error::Inval));
        fs.unlink("/sub/f").unwrap();
        fs.rmdir("/sub").unwrap();
        assert_eq!(fs.getattr("/sub").unwrap_err(), Error::NotFound);
    }

    #[test]
    fn unlink_frees_blocks() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.create("/a.txt").unwrap();
        fs.write("/a.txt", 0, &vec![1u8; BYTES_PER_BLOCK * 2]).unwrap();

        let before = fs.statfs().free_blocks;
        fs.unlink("/a.txt").unwrap();
        let after = fs.statfs().free_blocks;
        assert_eq!(after, before + 3); // inode block + 2 data blocks
    }

    #[test]
    fn rename_within_same_directory() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.create("/a.txt").unwrap();
        fs.rename("/a.txt", "/b.txt").unwrap();

        assert_eq!(fs.getattr("/a.txt").unwrap_err(), Error::NotFound);
        assert!(fs.getattr("/b.txt").is_ok());
    }

    #[test]
    fn rename_cross_directory_is_rejected() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.mkdir("/sub").unwrap();
        fs.create("/a.txt").unwrap();

        assert_eq!(fs.rename("/a.txt", "/sub/a.txt"), Err(Error::Inval));
    }

    #[test]
    fn write_beyond_direct_capacity_is_file_too_big() {
        let tmp = tempdir().unwrap();
        let mut fs = fresh_fs(tmp.path());
        fs.create("/a.txt").unwrap();
        let huge = vec![0u8; BYTES_PER_BLOCK * (DIRECT + 1)];
        assert_eq!(fs.write("/a.txt", 0, &huge), Err(Error::FileTooBig));
    }

    #[test]
    fn lseek_set_and_end() {
        assert_eq!(FileSystem::lseek(Whence::Set, 10, 100).unwrap(), 10);
        assert_eq!(FileSystem::lseek(Whence::End, -5, 100).unwrap(), 95);
        assert_eq!(FileSystem::lseek(Whence::Cur, 0, 100), Err(Error::Inval));
        assert_eq!(FileSystem::lseek(Whence::Set, -1, 100), Err(Error::Inval));
    }
}
