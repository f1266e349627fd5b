//! Small utilities shared across BWFS's core and CLI layers.

use std::io::BufRead;
use std::io::Write;
use std::io;
use std::mem::MaybeUninit;
use std::time::{SystemTime, UNIX_EPOCH};

use libc::tcgetattr;
use libc::tcsetattr;
use libc::termios;
use libc::ECHO;
use libc::ECHOE;
use libc::ICANON;
use libc::STDIN_FILENO;
use libc::TCSANOW;
use libc::VMIN;

/// Prints an informational line to stdout, prefixed `[BWFS INFO]`.
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        println!("[BWFS INFO] {}", format_args!($($arg)*))
    };
}

/// Prints an error line to stderr, prefixed `[BWFS ERROR]`.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        eprintln!("[BWFS ERROR] {}", format_args!($($arg)*))
    };
}

/// Ceiling division for the block-count arithmetic used throughout the
/// allocator and inode resize path.
pub fn ceil_div(n: u64, d: u64) -> u64 {
    (n + d - 1) / d
}

/// Current time as seconds since the Unix epoch. Kept as a function (rather
/// than inlined at call sites) so tests can see where wall-clock time
/// enters the system.
pub fn timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_secs()
}

/// Builds the on-disk file name for a given block id.
///
/// Kept deliberately dumb (`block{id}.img`) — `BlockStore` implementations
/// own the interpretation of the file's contents, not its name.
pub fn block_file_name(block_id: u32) -> String {
    format!("block{block_id}.img")
}

/// Shows a prompt and returns what the user typed up to the next newline.
///
/// `hidden` disables terminal echo for the duration of the read (used by
/// fsck's repair y/n prompt is not hidden; kept for parity with the
/// teacher's prompt, which BWFS's `mkfs` reuses verbatim for its "proceed
/// anyway?" confirmation).
pub fn prompt(text: &str, hidden: bool) -> Option<String> {
    let saved_termios = unsafe {
        let mut t: termios = MaybeUninit::zeroed().assume_init();
        tcgetattr(STDIN_FILENO, &mut t);
        t
    };

    if hidden {
        let mut termios = saved_termios.clone();
        termios.c_lflag &= !(ICANON | ECHO | ECHOE);
        termios.c_cc[VMIN] = 1;
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &termios);
        }
    }

    print!("{text}");
    let _ = io::stdout().flush();

    let input = io::stdin().lock().lines().next()?.unwrap_or_default();

    if hidden {
        println!();
        unsafe {
            tcsetattr(STDIN_FILENO, TCSANOW, &saved_termios);
        }
    }

    Some(input)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ceil_div_basic() {
        assert_eq!(ceil_div(0, 4), 0);
        assert_eq!(ceil_div(1, 4), 1);
        assert_eq!(ceil_div(4, 4), 1);
        assert_eq!(ceil_div(5, 4), 2);
    }

    #[test]
    fn block_file_name_format() {
        assert_eq!(block_file_name(0), "block0.img");
        assert_eq!(block_file_name(42), "block42.img");
    }
}
