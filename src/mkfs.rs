//! Format logic shared by `mkfs.bwfs` and the end-to-end test suite: lays
//! down a fresh superblock, an empty bitmap, and the root directory's inode
//! over every block in `[0, total_blocks)`.

use crate::bitmap::Bitmap;
use crate::block_store::BlockStore;
use crate::error::Result;
use crate::inode::{self, Kind};
use crate::superblock::Superblock;

/// Formats `store` as a fresh BWFS instance of `total_blocks` blocks,
/// returning the root directory's inode (block) id. Every block in
/// `[0, total_blocks)` is created empty first, then blocks 0, 1, and the
/// root inode's block are overwritten with real content.
pub fn format(store: &dyn BlockStore, total_blocks: u32) -> Result<u32> {
    for id in 0..total_blocks {
        store.create_empty(id)?;
    }

    let mut bitmap = Bitmap::new(total_blocks);
    bitmap.set(0, true);
    bitmap.set(1, true);

    let root = inode::create_inode(&mut bitmap, store, Kind::Dir)?;

    let mut superblock = Superblock::init(total_blocks);
    superblock.root_inode = root.ino;
    superblock.write(store)?;
    bitmap.write(store)?;

    Ok(root.ino)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_store::FileBlockStore;
    use tempfile::tempdir;

    #[test]
    fn format_produces_valid_superblock_and_bitmap() {
        let tmp = tempdir().unwrap();
        let store = FileBlockStore::new(tmp.path());
        let root = format(&store, 16).unwrap();

        let sb = Superblock::read(&store).unwrap();
        assert_eq!(sb.magic, crate::superblock::MAGIC);
        assert_eq!(sb.total_blocks, 16);
        assert_eq!(sb.root_inode, root);

        let bm = Bitmap::read(&store, 16).unwrap();
        assert!(bm.test(0));
        assert!(bm.test(1));
        assert!(bm.test(root));
    }
}
