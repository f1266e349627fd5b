//! Inode (C5): per-file/directory metadata plus up to DIRECT direct block
//! pointers. No indirect blocks — files larger than `DIRECT` blocks are
//! out of scope.

use crate::alloc;
use crate::bitmap::Bitmap;
use crate::block_store::{BlockStore, BYTES_PER_BLOCK};
use crate::error::{Error, Result};
use crate::util::timestamp;

/// Direct block pointers per inode.
pub const DIRECT: usize = 10;

const INODE_RECORD_LEN: usize = 4 + 8 + 4 + 4 + 8 + 8 + 4 + DIRECT * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    File,
    Dir,
}

/// A single inode record: identity, size, and its direct block map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inode {
    pub ino: u32,
    pub size: u64,
    pub kind: Kind,
    pub link_count: u32,
    pub mtime: u64,
    pub ctime: u64,
    pub blocks: [u32; DIRECT],
    pub block_count: u32,
}

impl Inode {
    fn empty(ino: u32, kind: Kind) -> Self {
        let now = timestamp();
        Self {
            ino,
            size: 0,
            kind,
            link_count: 1,
            mtime: now,
            ctime: now,
            blocks: [0; DIRECT],
            block_count: 0,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.kind, Kind::Dir)
    }

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(INODE_RECORD_LEN);
        buf.extend_from_slice(&self.ino.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.push(if self.is_dir() { 1 } else { 0 });
        buf.extend_from_slice(&[0u8; 3]); // padding
        buf.extend_from_slice(&self.link_count.to_le_bytes());
        buf.extend_from_slice(&self.mtime.to_le_bytes());
        buf.extend_from_slice(&self.ctime.to_le_bytes());
        buf.extend_from_slice(&self.block_count.to_le_bytes());
        for b in &self.blocks {
            buf.extend_from_slice(&b.to_le_bytes());
        }
        buf
    }

    fn from_bytes(buf: &[u8]) -> Result<Self> {
        if buf.len() < INODE_RECORD_LEN {
            return Err(Error::Inval);
        }
        let ino = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let size = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        let kind = if buf[12] != 0 { Kind::Dir } else { Kind::File };
        let link_count = u32::from_le_bytes(buf[16..20].try_into().unwrap());
        let mtime = u64::from_le_bytes(buf[20..28].try_into().unwrap());
        let ctime = u64::from_le_bytes(buf[28..36].try_into().unwrap());
        let block_count = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let mut blocks = [0u32; DIRECT];
        for i in 0..DIRECT {
            let off = 40 + i * 4;
            blocks[i] = u32::from_le_bytes(buf[off..off + 4].try_into().unwrap());
        }
        Ok(Self {
            ino,
            size,
            kind,
            link_count,
            mtime,
            ctime,
            blocks,
            block_count,
        })
    }

    /// Writes this inode to its own block, id `self.ino`.
    pub fn write(&self, store: &dyn BlockStore) -> Result<()> {
        store.write(self.ino, &self.to_bytes())
    }

    /// Reads the inode stored at block `ino`.
    pub fn read(store: &dyn BlockStore, ino: u32) -> Result<Self> {
        let mut buf = vec![0u8; INODE_RECORD_LEN];
        store.read(ino, &mut buf)?;
        Self::from_bytes(&buf)
    }
}

/// Allocates one block for a new inode, initializes it, and persists both
/// the inode and the updated bitmap. On any failure after allocation the
/// freshly allocated block is rolled back and the bitmap left untouched.
pub fn create_inode(bitmap: &mut Bitmap, store: &dyn BlockStore, kind: Kind) -> Result<Inode> {
    let ino = alloc::alloc(bitmap, 1).ok_or(Error::Full)?;
    let inode = Inode::empty(ino, kind);

    if let Err(e) = inode.write(store) {
        alloc::free(bitmap, ino, 1);
        return Err(e);
    }
    if let Err(e) = bitmap.write(store) {
        alloc::free(bitmap, ino, 1);
        return Err(e);
    }
    Ok(inode)
}

/// Grows or shrinks `inode` to `new_size` bytes, (de)allocating direct
/// blocks as needed. Fails with `Error::Full` if the new size would need
/// more than `DIRECT` blocks; the bitmap and inode are unchanged in that
/// case. On expansion, if an intermediate block allocation fails, only the
/// blocks newly allocated during *this* call are rolled back.
pub fn resize(bitmap: &mut Bitmap, store: &dyn BlockStore, inode: &mut Inode, new_size: u64) -> Result<()> {
    let req_blocks = crate::util::ceil_div(new_size, BYTES_PER_BLOCK as u64) as u32;
    if req_blocks as usize > DIRECT {
        return Err(Error::Full);
    }

    if req_blocks > inode.block_count {
        let mut newly_allocated = Vec::new();
        for slot in inode.block_count..req_blocks {
            match alloc::alloc(bitmap, 1) {
                Some(blk) => {
                    inode.blocks[slot as usize] = blk;
                    newly_allocated.push(blk);
                }
                None => {
                    for blk in newly_allocated {
                        alloc::free(bitmap, blk, 1);
                    }
                    return Err(Error::Full);
                }
            }
        }
        for slot in inode.block_count..req_blocks {
            if let Err(e) = store.create_empty(inode.blocks[slot as usize]) {
                for blk in &newly_allocated {
                    alloc::free(bitmap, *blk, 1);
                }
                for s in inode.block_count..req_blocks {
                    inode.blocks[s as usize] = 0;
                }
                return Err(e);
            }
        }
        inode.block_count = req_blocks;
    } else if req_blocks < inode.block_count {
        for slot in req_blocks..inode.block_count {
            alloc::free(bitmap, inode.blocks[slot as usize], 1);
            inode.blocks[slot as usize] = 0;
        }
        inode.block_count = req_blocks;
    }

    inode.size = new_size;
    inode.mtime = timestamp();

    bitmap.write(store)?;
    inode.write(store)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_store::FileBlockStore;
    use tempfile::tempdir;

    #[test]
    fn create_and_read_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(32);
        let inode = create_inode(&mut bm, &store, Kind::File).unwrap();
        assert_eq!(inode.size, 0);
        assert_eq!(inode.block_count, 0);

        let loaded = Inode::read(&store, inode.ino).unwrap();
        assert_eq!(loaded, inode);
        assert!(bm.test(inode.ino));
    }

    #[test]
    fn resize_grows_and_shrinks() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(32);
        let mut inode = create_inode(&mut bm, &store, Kind::File).unwrap();

        resize(&mut bm, &store, &mut inode, (BYTES_PER_BLOCK * 2 + 10) as u64).unwrap();
        assert_eq!(inode.block_count, 3);
        assert_eq!(bm.popcount(), 1 + 3); // the inode's own block plus its 3 data blocks

        resize(&mut bm, &store, &mut inode, 5).unwrap();
        assert_eq!(inode.block_count, 1);
        assert_eq!(inode.blocks[1], 0);
        assert_eq!(inode.blocks[2], 0);
    }

    #[test]
    fn resize_rejects_too_large() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(32);
        let mut inode = create_inode(&mut bm, &store, Kind::File).unwrap();
        let too_big = (BYTES_PER_BLOCK as u64) * (DIRECT as u64 + 1);
        assert_eq!(resize(&mut bm, &store, &mut inode, too_big), Err(Error::Full));
        assert_eq!(inode.block_count, 0);
    }
}
