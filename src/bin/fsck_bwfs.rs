//! `fsck.bwfs`: offline consistency checker/repair tool.
//!
//! Exit codes follow the contract in `bwfs::fsck`: 0 clean, 1 errors found
//! and fully repaired, 4 errors found and left unfixed, 8 an operational
//! failure (bad superblock, unreadable bitmap).

use std::env;
use std::path::PathBuf;
use std::process::exit;

use bwfs::block_store::FileBlockStore;
use bwfs::fsck::{FsckContext, FsckOptions};
use bwfs::log_error;

#[derive(Default)]
struct Args {
    prog: String,
    force: bool,
    yes: bool,
    verbose: bool,
    dir: Option<PathBuf>,
}

fn print_usage(prog: &str) {
    eprintln!("Usage: {prog} [-f] [-y] [-v] <dir>");
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut iter = env::args();
    args.prog = iter.next().unwrap_or_else(|| "fsck.bwfs".to_owned());

    for arg in iter {
        match arg.as_str() {
            "-f" => args.force = true,
            "-y" => args.yes = true,
            "-v" => args.verbose = true,
            "-h" | "--help" => {
                print_usage(&args.prog);
                exit(0);
            }
            _ => args.dir = Some(PathBuf::from(arg)),
        }
    }
    args
}

fn main() {
    let args = parse_args();
    let dir = args.dir.unwrap_or_else(|| {
        print_usage(&args.prog);
        exit(8);
    });
    if !dir.is_dir() {
        log_error!("{}: not a directory", dir.display());
        exit(8);
    }

    let store = FileBlockStore::new(&dir);
    let mut ctx = FsckContext::new(
        &store,
        FsckOptions {
            force: args.force,
            yes: args.yes,
            verbose: args.verbose,
        },
    );
    let code = ctx.run();
    exit(code);
}
