//! Error taxonomy shared by every BWFS core component.

use std::fmt;
use std::io;

/// A BWFS core error, per the taxonomy in the design doc: `Io`, `NoMem`,
/// `Full`, `NotFound`, `Inval`, `FileTooBig`.
///
/// Callers at the mount boundary that need a finer-grained POSIX errno
/// than this taxonomy offers (e.g. `EEXIST` vs `ENOSPC`, both raised here
/// as either `Full` or `Inval`) discriminate by the calling operation, not
/// by a dedicated variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A `BlockStore` read/write/create failed.
    Io,
    /// A buffer allocation was refused.
    NoMem,
    /// Space or block capacity exhausted: no free blocks, or a directory's
    /// single entry block has no empty slot left.
    Full,
    /// Used as a sentinel distinct from `Full` in directory lookup/remove
    /// and in path resolution.
    NotFound,
    /// A malformed path or path component, a name that already exists
    /// where a fresh name was required, a non-empty directory passed to
    /// `rmdir`, a directory used where a file was expected (or vice
    /// versa), a cross-directory `rename`, or an unsupported `lseek`
    /// whence.
    Inval,
    /// A write would need more direct blocks than `DIRECT` provides —
    /// distinct from `Full`, which covers space exhaustion on an
    /// otherwise-satisfiable request.
    FileTooBig,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Io => "I/O error",
            Error::NoMem => "out of memory",
            Error::Full => "no space left",
            Error::NotFound => "not found",
            Error::Inval => "invalid argument",
            Error::FileTooBig => "file too large",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(_: io::Error) -> Self {
        Error::Io
    }
}

impl Error {
    /// Maps the internal taxonomy onto a conventional POSIX errno, per §7 of
    /// the design doc. Every `Inval` collapses to `EINVAL` here regardless
    /// of which specific mount-layer condition (EISDIR, ENOTEMPTY, EXDEV,
    /// EEXIST) produced it — callers that need a finer errno than this
    /// taxonomy carries discriminate by the calling operation before
    /// reaching for this mapping, as noted at each call site in `fileops`.
    pub fn to_errno(self) -> i32 {
        match self {
            Error::Io => libc::EIO,
            Error::NoMem => libc::ENOMEM,
            Error::Full => libc::ENOSPC,
            Error::NotFound => libc::ENOENT,
            Error::Inval => libc::EINVAL,
            Error::FileTooBig => libc::EFBIG,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
