//! Filesystem checker (C9): walks the on-disk structures looking for
//! inconsistencies between what the directory tree actually references and
//! what the bitmap claims is allocated, offering to repair what it finds.

use crate::bitmap::Bitmap;
use crate::block_store::BlockStore;
use crate::dir;
use crate::inode::Inode;
use crate::superblock::Superblock;
use crate::util::prompt;

/// Directory-tree walk depth cap. Guards against a corrupted tree that
/// cycles back on itself (BWFS has no hard links to create a cycle
/// legitimately, but a damaged directory entry could still point upward).
const MAX_DEPTH: u32 = 100;

/// Controls whether `FsckContext` asks before repairing, and whether it
/// reports each step as it goes.
pub struct FsckOptions {
    /// Force a check even if the superblock looks consistent at a glance.
    pub force: bool,
    /// Auto-accept every repair prompt instead of asking interactively.
    pub yes: bool,
    /// Print each phase's findings as they're discovered.
    pub verbose: bool,
}

pub struct FsckContext<'a> {
    store: &'a dyn BlockStore,
    options: FsckOptions,
    pub errors_found: u32,
    pub errors_fixed: u32,
    pub warnings: u32,
}

/// Process exit code contract: 0 clean, 1 errors fixed, 4 errors left
/// unfixed, 8 an unrecoverable problem (bad superblock).
pub const EXIT_OK: i32 = 0;
pub const EXIT_FIXED: i32 = 1;
pub const EXIT_UNFIXED: i32 = 4;
pub const EXIT_FATAL: i32 = 8;

impl<'a> FsckContext<'a> {
    pub fn new(store: &'a dyn BlockStore, options: FsckOptions) -> Self {
        Self {
            store,
            options,
            errors_found: 0,
            errors_fixed: 0,
            warnings: 0,
        }
    }

    fn log(&self, msg: &str) {
        if self.options.verbose {
            crate::log_info!("{}", msg);
        }
    }

    fn confirm_repair(&self, msg: &str) -> bool {
        if self.options.yes {
            return true;
        }
        match prompt(&format!("{msg} [y/n] "), false) {
            Some(answer) => matches!(answer.trim(), "y" | "Y" | "yes"),
            None => false,
        }
    }

    /// Runs every check phase in order and returns the process exit code.
    pub fn run(&mut self) -> i32 {
        let superblock = match self.check_superblock() {
            Some(sb) => sb,
            None => return EXIT_FATAL,
        };

        let bitmap = match self.check_bitmap(&superblock) {
            Some(bm) => bm,
            None => return EXIT_FATAL,
        };

        let mut reachable = vec![false; superblock.total_blocks as usize];
        let mut really_used = vec![false; superblock.total_blocks as usize];
        really_used[crate::superblock::SUPERBLOCK_BLK as usize] = true;
        really_used[crate::superblock::BITMAP_BLK as usize] = true;

        self.walk_tree(superblock.root_inode, superblock.root_inode, 0, &mut reachable, &mut really_used);
        self.check_bitmap_consistency(&bitmap, &really_used);
        self.search_orphans(&superblock, &reachable);

        if self.errors_found == 0 {
            self.log("filesystem is clean");
            EXIT_OK
        } else if self.errors_fixed == self.errors_found {
            EXIT_FIXED
        } else {
            EXIT_UNFIXED
        }
    }

    /// Phase 1: superblock must parse and validate. There is no repair for
    /// a corrupt superblock short of reformatting, so a failure here is
    /// always fatal.
    fn check_superblock(&mut self) -> Option<Superblock> {
        match Superblock::read(self.store) {
            Ok(sb) => {
                self.log("superblock OK");
                Some(sb)
            }
            Err(_) => {
                crate::log_error!("superblock is missing or corrupt, cannot continue");
                self.errors_found += 1;
                None
            }
        }
    }

    /// Phase 2: bitmap must load, and the blocks that must always be
    /// allocated (superblock, bitmap, root inode) must be marked as such.
    fn check_bitmap(&mut self, superblock: &Superblock) -> Option<Bitmap> {
        let mut bitmap = match Bitmap::read(self.store, superblock.total_blocks) {
            Ok(bm) => bm,
            Err(_) => {
                crate::log_error!("bitmap is missing or corrupt, cannot continue");
                self.errors_found += 1;
                return None;
            }
        };

        for (label, blk) in [
            ("superblock", crate::superblock::SUPERBLOCK_BLK),
            ("bitmap", crate::superblock::BITMAP_BLK),
            ("root inode", superblock.root_inode),
        ] {
            if !bitmap.test(blk) {
                self.errors_found += 1;
                crate::log_error!("block {blk} ({label}) is not marked allocated");
                if self.confirm_repair(&format!("mark block {blk} allocated?")) {
                    bitmap.set(blk, true);
                    self.errors_fixed += 1;
                }
            }
        }
        let _ = bitmap.write(self.store);
        Some(bitmap)
    }

    /// Phase 3: recursively walks the directory tree from the root,
    /// validating each inode's self-consistency and marking every block it
    /// legitimately owns as reachable/really-used.
    fn walk_tree(&mut self, ino: u32, _parent_ino: u32, depth: u32, reachable: &mut [bool], really_used: &mut [bool]) {
        if depth > MAX_DEPTH {
            self.errors_found += 1;
            crate::log_error!("directory tree exceeds max depth {MAX_DEPTH} at inode {ino}, stopping descent");
            return;
        }

        let inode = match Inode::read(self.store, ino) {
            Ok(i) => i,
            Err(_) => {
                self.errors_found += 1;
                crate::log_error!("inode {ino} is unreadable");
                return;
            }
        };

        if inode.ino != ino {
            self.errors_found += 1;
            crate::log_error!("inode at block {ino} reports ino {}", inode.ino);
        }

        reachable[ino as usize] = true;
        really_used[ino as usize] = true;

        let expected_blocks = crate::util::ceil_div(inode.size, crate::block_store::BYTES_PER_BLOCK as u64) as u32;
        if expected_blocks != inode.block_count {
            self.errors_found += 1;
            crate::log_error!(
                "inode {ino} size {} implies {expected_blocks} blocks but block_count is {}",
                inode.size,
                inode.block_count
            );
        }

        for i in 0..inode.block_count as usize {
            let blk = inode.blocks[i];
            if (blk as usize) < really_used.len() {
                really_used[blk as usize] = true;
            }
        }

        if inode.is_dir() {
            if let Ok(entries) = dir::list(self.store, &inode) {
                for (_, child_ino) in entries {
                    self.walk_tree(child_ino, ino, depth + 1, reachable, really_used);
                }
            }
        }
    }

    /// Phase 4: cross-checks the bitmap against what the tree walk found
    /// really in use. A bit set but unused is a "leaked block" (a
    /// warning, safe to clear); a bit clear but really used is a
    /// "false-free" (an error — clearing the corresponding file data would
    /// otherwise happen on a future allocation).
    fn check_bitmap_consistency(&mut self, bitmap: &Bitmap, really_used: &[bool]) {
        let mut bitmap = bitmap.clone();
        let mut dirty = false;

        for blk in 0..really_used.len() as u32 {
            let marked = bitmap.test(blk);
            let used = really_used[blk as usize];
            if marked && !used {
                self.warnings += 1;
                crate::log_info!("block {blk} is allocated but not referenced (leaked)");
                if self.confirm_repair(&format!("clear leaked block {blk}?")) {
                    bitmap.set(blk, false);
                    dirty = true;
                }
            } else if !marked && used {
                self.errors_found += 1;
                crate::log_error!("block {blk} is referenced but not marked allocated");
                if self.confirm_repair(&format!("mark block {blk} allocated?")) {
                    bitmap.set(blk, true);
                    self.errors_fixed += 1;
                    dirty = true;
                }
            }
        }

        if dirty {
            let _ = bitmap.write(self.store);
        }
    }

    /// Phase 5: any inode in `[2, total_blocks)` that is allocated but was
    /// never reached from the root is an orphan — unreachable, but not
    /// necessarily harmful, so reported as a warning only.
    fn search_orphans(&mut self, superblock: &Superblock, reachable: &[bool]) {
        let bitmap = match Bitmap::read(self.store, superblock.total_blocks) {
            Ok(bm) => bm,
            Err(_) => return,
        };
        for ino in 2..superblock.total_blocks {
            if bitmap.test(ino) && !reachable[ino as usize] {
                if let Ok(inode) = Inode::read(self.store, ino) {
                    if inode.ino == ino {
                        self.warnings += 1;
                        crate::log_info!("inode {ino} is allocated but not reachable from the root (orphan)");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::block_store::FileBlockStore;
    use crate::inode::{self, Kind};
    use tempfile::tempdir;

    fn format(dir: &std::path::Path) -> FileBlockStore {
        let store = FileBlockStore::new(dir);
        let mut sb = Superblock::init(16);
        let mut bm = Bitmap::new(16);
        bm.set(0, true);
        bm.set(1, true);
        let root = inode::create_inode(&mut bm, &store, Kind::Dir).unwrap();
        sb.root_inode = root.ino;
        sb.write(&store).unwrap();
        bm.write(&store).unwrap();
        store
    }

    #[test]
    fn clean_filesystem_exits_ok() {
        let tmp = tempdir().unwrap();
        let store = format(tmp.path());
        let mut ctx = FsckContext::new(
            &store,
            FsckOptions {
                force: false,
                yes: true,
                verbose: false,
            },
        );
        assert_eq!(ctx.run(), EXIT_OK);
    }

    #[test]
    fn leaked_block_is_repaired_in_yes_mode() {
        let tmp = tempdir().unwrap();
        let store = format(tmp.path());
        let sb = Superblock::read(&store).unwrap();
        let mut bm = Bitmap::read(&store, sb.total_blocks).unwrap();
        bm.set(5, true); // allocated but referenced by nothing
        bm.write(&store).unwrap();

        let mut ctx = FsckContext::new(
            &store,
            FsckOptions {
                force: false,
                yes: true,
                verbose: false,
            },
        );
        let code = ctx.run();
        assert_eq!(code, EXIT_OK); // leaked block is a warning, not an error
        assert_eq!(ctx.warnings, 1);

        let repaired = Bitmap::read(&store, sb.total_blocks).unwrap();
        assert!(!repaired.test(5));
    }

    #[test]
    fn false_free_block_is_an_error_and_gets_fixed() {
        let tmp = tempdir().unwrap();
        let store = format(tmp.path());
        let sb = Superblock::read(&store).unwrap();
        let mut bm = Bitmap::read(&store, sb.total_blocks).unwrap();
        bm.set(sb.root_inode, false); // root inode block incorrectly marked free
        bm.write(&store).unwrap();

        let mut ctx = FsckContext::new(
            &store,
            FsckOptions {
                force: false,
                yes: true,
                verbose: false,
            },
        );
        let code = ctx.run();
        assert_eq!(code, EXIT_FIXED);
        assert!(ctx.errors_found >= 1);
        assert_eq!(ctx.errors_found, ctx.errors_fixed);
    }

    #[test]
    fn fatal_on_missing_superblock() {
        let tmp = tempdir().unwrap();
        let store = FileBlockStore::new(tmp.path());
        let mut ctx = FsckContext::new(
            &store,
            FsckOptions {
                force: false,
                yes: true,
                verbose: false,
            },
        );
        assert_eq!(ctx.run(), EXIT_FATAL);
    }
}
