//! Directory (C6): a directory's contents are a single fixed-capacity
//! block of `DirEntry` records. No multi-block directories — once the
//! block's capacity is exhausted, further `add` calls fail with
//! `Error::Full`.

use crate::alloc;
use crate::bitmap::Bitmap;
use crate::block_store::{BlockStore, BYTES_PER_BLOCK};
use crate::error::{Error, Result};
use crate::inode::Inode;

/// On-disk name field width, in bytes (NUL-terminated).
pub const NAME_LEN: usize = 256;

/// Max file name length, in bytes — one less than `NAME_LEN` so every
/// stored name leaves room for its terminating NUL.
pub const MAX_NAME_LEN: usize = NAME_LEN - 1;

const ENTRY_LEN: usize = 4 + NAME_LEN;

/// Number of `DirEntry` records that fit in one block.
pub const ENTRIES_PER_BLOCK: usize = BYTES_PER_BLOCK / ENTRY_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirEntry {
    ino: u32,
    name: [u8; NAME_LEN],
}

impl DirEntry {
    const EMPTY: DirEntry = DirEntry {
        ino: 0,
        name: [0u8; NAME_LEN],
    };

    fn is_empty(&self) -> bool {
        self.ino == 0
    }

    fn name_str(&self) -> &[u8] {
        let len = self.name.iter().position(|&b| b == 0).unwrap_or(NAME_LEN);
        &self.name[..len]
    }

    fn with_name(ino: u32, name: &str) -> Result<Self> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.len() > MAX_NAME_LEN {
            return Err(Error::Inval);
        }
        let mut buf = [0u8; NAME_LEN];
        buf[..bytes.len()].copy_from_slice(bytes);
        Ok(Self { ino, name: buf })
    }
}

fn decode_entries(buf: &[u8]) -> Vec<DirEntry> {
    let mut out = Vec::with_capacity(ENTRIES_PER_BLOCK);
    for i in 0..ENTRIES_PER_BLOCK {
        let off = i * ENTRY_LEN;
        let ino = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        let mut name = [0u8; NAME_LEN];
        name.copy_from_slice(&buf[off + 4..off + 4 + NAME_LEN]);
        out.push(DirEntry { ino, name });
    }
    out
}

fn encode_entries(entries: &[DirEntry]) -> Vec<u8> {
    let mut buf = vec![0u8; ENTRIES_PER_BLOCK * ENTRY_LEN];
    for (i, e) in entries.iter().enumerate() {
        let off = i * ENTRY_LEN;
        buf[off..off + 4].copy_from_slice(&e.ino.to_le_bytes());
        buf[off + 4..off + 4 + NAME_LEN].copy_from_slice(&e.name);
    }
    buf
}

fn load_entries(store: &dyn BlockStore, dir_inode: &Inode) -> Result<Vec<DirEntry>> {
    if dir_inode.block_count == 0 {
        return Ok(vec![DirEntry::EMPTY; ENTRIES_PER_BLOCK]);
    }
    let mut buf = vec![0u8; ENTRIES_PER_BLOCK * ENTRY_LEN];
    store.read(dir_inode.blocks[0], &mut buf)?;
    Ok(decode_entries(&buf))
}

/// Looks up `name` in `dir_inode`'s entries, returning its inode number if
/// present.
pub fn lookup(store: &dyn BlockStore, dir_inode: &Inode, name: &str) -> Result<Option<u32>> {
    let target = name.as_bytes();
    let entries = load_entries(store, dir_inode)?;
    for e in &entries {
        if !e.is_empty() && e.name_str() == target {
            return Ok(Some(e.ino));
        }
    }
    Ok(None)
}

/// Returns every non-empty entry as `(name, ino)` pairs.
pub fn list(store: &dyn BlockStore, dir_inode: &Inode) -> Result<Vec<(String, u32)>> {
    let entries = load_entries(store, dir_inode)?;
    Ok(entries
        .iter()
        .filter(|e| !e.is_empty())
        .map(|e| (String::from_utf8_lossy(e.name_str()).into_owned(), e.ino))
        .collect())
}

/// Adds `name -> child_ino` to `dir_inode`'s entry block, lazily allocating
/// the block on the first call. Fails with `Error::Full` if no empty slot
/// remains or the backing block can't be allocated, and with `Error::Inval`
/// if `name` already exists.
pub fn add(
    bitmap: &mut Bitmap,
    store: &dyn BlockStore,
    dir_inode: &mut Inode,
    name: &str,
    child_ino: u32,
) -> Result<()> {
    let new_entry = DirEntry::with_name(child_ino, name)?;

    if dir_inode.block_count == 0 {
        let blk = alloc::alloc(bitmap, 1).ok_or(Error::Full)?;
        if let Err(e) = store.create_empty(blk) {
            alloc::free(bitmap, blk, 1);
            return Err(e);
        }
        dir_inode.blocks[0] = blk;
        dir_inode.block_count = 1;
    }

    let mut entries = load_entries(store, dir_inode)?;
    if entries.iter().any(|e| !e.is_empty() && e.name_str() == name.as_bytes()) {
        return Err(Error::Inval);
    }
    let slot = entries.iter().position(|e| e.is_empty()).ok_or(Error::Full)?;
    entries[slot] = new_entry;

    store.write(dir_inode.blocks[0], &encode_entries(&entries))?;
    dir_inode.size = entries.iter().filter(|e| !e.is_empty()).count() as u64 * ENTRY_LEN as u64;
    bitmap.write(store)?;
    dir_inode.write(store)?;
    Ok(())
}

/// Removes `name` from `dir_inode`'s entries. Returns `Error::NotFound` if
/// absent.
pub fn remove(bitmap: &mut Bitmap, store: &dyn BlockStore, dir_inode: &mut Inode, name: &str) -> Result<()> {
    let mut entries = load_entries(store, dir_inode)?;
    let slot = entries
        .iter()
        .position(|e| !e.is_empty() && e.name_str() == name.as_bytes())
        .ok_or(Error::NotFound)?;
    entries[slot] = DirEntry::EMPTY;

    store.write(dir_inode.blocks[0], &encode_entries(&entries))?;
    dir_inode.size = entries.iter().filter(|e| !e.is_empty()).count() as u64 * ENTRY_LEN as u64;
    bitmap.write(store)?;
    dir_inode.write(store)?;
    Ok(())
}

/// Returns the number of occupied entries currently in `dir_inode`.
pub fn entry_count(store: &dyn BlockStore, dir_inode: &Inode) -> Result<usize> {
    Ok(list(store, dir_inode)?.len())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_store::FileBlockStore;
    use crate::inode::{create_inode, Kind};
    use tempfile::tempdir;

    #[test]
    fn add_lookup_remove_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(64);
        let mut dir_inode = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let child = create_inode(&mut bm, &store, Kind::File).unwrap();

        add(&mut bm, &store, &mut dir_inode, "hello.txt", child.ino).unwrap();
        assert_eq!(lookup(&store, &dir_inode, "hello.txt").unwrap(), Some(child.ino));
        assert_eq!(lookup(&store, &dir_inode, "nope").unwrap(), None);

        remove(&mut bm, &store, &mut dir_inode, "hello.txt").unwrap();
        assert_eq!(lookup(&store, &dir_inode, "hello.txt").unwrap(), None);
    }

    #[test]
    fn add_rejects_duplicate_name() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(64);
        let mut dir_inode = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let a = create_inode(&mut bm, &store, Kind::File).unwrap();
        let b = create_inode(&mut bm, &store, Kind::File).unwrap();

        add(&mut bm, &store, &mut dir_inode, "x", a.ino).unwrap();
        assert_eq!(add(&mut bm, &store, &mut dir_inode, "x", b.ino), Err(Error::Inval));
    }

    #[test]
    fn remove_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(64);
        let mut dir_inode = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        assert_eq!(remove(&mut bm, &store, &mut dir_inode, "ghost"), Err(Error::NotFound));
    }

    #[test]
    fn add_fails_when_block_full() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new((ENTRIES_PER_BLOCK as u32) + 8);
        let mut dir_inode = create_inode(&mut bm, &store, Kind::Dir).unwrap();

        for i in 0..ENTRIES_PER_BLOCK {
            let child = create_inode(&mut bm, &store, Kind::File).unwrap();
            add(&mut bm, &store, &mut dir_inode, &format!("f{i}"), child.ino).unwrap();
        }
        let overflow = create_inode(&mut bm, &store, Kind::File).unwrap();
        assert_eq!(
            add(&mut bm, &store, &mut dir_inode, "overflow", overflow.ino),
            Err(Error::Full)
        );
    }
}
