//! `mkfs.bwfs`: formats a directory as a fresh BWFS instance.
//!
//! Writes a superblock, an empty bitmap with bits 0 and 1 pre-set, allocates
//! the root directory's inode, and creates every block file up front so
//! later reads never hit a missing file.

use std::env;
use std::path::PathBuf;
use std::process::exit;

use bwfs::block_store::FileBlockStore;
use bwfs::superblock::Superblock;
use bwfs::util::prompt;
use bwfs::{log_error, log_info};

/// Default total block count when `-b` is not given.
const DEFAULT_TOTAL_BLOCKS: u32 = 1024;

#[derive(Default)]
struct Args {
    prog: String,
    total_blocks: Option<u32>,
    dir: Option<PathBuf>,
    help: bool,
}

fn print_usage(prog: &str) {
    eprintln!("Usage: {prog} [-b total_blocks] <dir>");
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = env::args();
    args.prog = iter.next().unwrap_or_else(|| "mkfs.bwfs".to_owned());

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-h" | "--help" => args.help = true,
            "-b" => {
                let n = iter.next().unwrap_or_else(|| {
                    log_error!("-b requires an argument");
                    exit(1);
                });
                args.total_blocks = Some(n.parse().unwrap_or_else(|_| {
                    log_error!("invalid block count `{n}`");
                    exit(1);
                }));
            }
            _ => args.dir = Some(PathBuf::from(arg)),
        }
    }
    args
}

fn main() {
    let args = parse_args();
    if args.help {
        print_usage(&args.prog);
        exit(0);
    }

    let dir = args.dir.unwrap_or_else(|| {
        print_usage(&args.prog);
        exit(1);
    });
    let total_blocks = args.total_blocks.unwrap_or(DEFAULT_TOTAL_BLOCKS);
    if total_blocks < 3 {
        log_error!("total_blocks must be >= 3");
        exit(1);
    }

    if let Err(e) = std::fs::create_dir_all(&dir) {
        log_error!("{}: {}", dir.display(), e);
        exit(1);
    }

    let store = FileBlockStore::new(&dir);
    if Superblock::read(&store).is_ok() {
        println!("{} already holds a BWFS file system.", dir.display());
        let confirm = prompt("Proceed anyway and reformat? (y/N) ", false)
            .map(|s| s.trim().eq_ignore_ascii_case("y"))
            .unwrap_or(false);
        if !confirm {
            log_error!("aborted");
            exit(1);
        }
    }

    let root_ino = bwfs::mkfs::format(&store, total_blocks).unwrap_or_else(|e| {
        log_error!("failed to format {}: {}", dir.display(), e);
        exit(1);
    });

    log_info!(
        "formatted {} with {total_blocks} blocks, root inode at block {root_ino}",
        dir.display()
    );
}
