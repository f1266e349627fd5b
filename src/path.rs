//! Path resolution (C7): translates slash-separated paths into inodes by
//! walking directory entries from the root.

use crate::block_store::BlockStore;
use crate::dir;
use crate::error::{Error, Result};
use crate::inode::Inode;

/// Resolves `path` to its inode, starting from `root`. `path` must be
/// absolute ("/"-rooted); empty leading/trailing/double slashes are
/// tolerated and collapsed. Every non-final component must be a
/// directory; a non-directory encountered mid-path is `Error::Inval`. A
/// missing component is `Error::NotFound`.
pub fn resolve(store: &dyn BlockStore, root: &Inode, path: &str) -> Result<Inode> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(Error::Inval);
    }

    let mut current = root.clone();
    for component in path.split('/').filter(|c| !c.is_empty()) {
        if !current.is_dir() {
            return Err(Error::Inval);
        }
        let child_ino = dir::lookup(store, &current, component)?.ok_or(Error::NotFound)?;
        current = Inode::read(store, child_ino)?;
    }
    Ok(current)
}

/// Splits `path` into `(parent_path, basename)`. `Error::Inval` if the
/// basename is empty or exceeds the name-length limit, or if `path` is the
/// root itself (which has no parent).
pub fn split(path: &str) -> Result<(String, String)> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(Error::Inval);
    }
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::Inval); // "/" has no parent
    }
    let idx = trimmed.rfind('/').unwrap();
    let parent = if idx == 0 { "/".to_string() } else { trimmed[..idx].to_string() };
    let basename = trimmed[idx + 1..].to_string();

    if basename.is_empty() || basename.len() > dir::MAX_NAME_LEN {
        return Err(Error::Inval);
    }
    Ok((parent, basename))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::bitmap::Bitmap;
    use crate::block_store::FileBlockStore;
    use crate::inode::{create_inode, Kind};
    use tempfile::tempdir;

    #[test]
    fn resolve_root() {
        let dir = tempdir().unwrap();
        let store = FileBlockStore::new(dir.path());
        let mut bm = Bitmap::new(32);
        let root = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let resolved = resolve(&store, &root, "/").unwrap();
        assert_eq!(resolved.ino, root.ino);
    }

    #[test]
    fn resolve_nested_path() {
        let tmp = tempdir().unwrap();
        let store = FileBlockStore::new(tmp.path());
        let mut bm = Bitmap::new(32);
        let mut root = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let mut sub = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let file = create_inode(&mut bm, &store, Kind::File).unwrap();

        crate::dir::add(&mut bm, &store, &mut sub, "f.txt", file.ino).unwrap();
        crate::dir::add(&mut bm, &store, &mut root, "sub", sub.ino).unwrap();

        let resolved = resolve(&store, &root, "/sub/f.txt").unwrap();
        assert_eq!(resolved.ino, file.ino);
    }

    #[test]
    fn resolve_missing_component_not_found() {
        let tmp = tempdir().unwrap();
        let store = FileBlockStore::new(tmp.path());
        let mut bm = Bitmap::new(32);
        let root = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        assert_eq!(resolve(&store, &root, "/nope").unwrap_err(), Error::NotFound);
    }

    #[test]
    fn resolve_through_file_is_inval() {
        let tmp = tempdir().unwrap();
        let store = FileBlockStore::new(tmp.path());
        let mut bm = Bitmap::new(32);
        let mut root = create_inode(&mut bm, &store, Kind::Dir).unwrap();
        let file = create_inode(&mut bm, &store, Kind::File).unwrap();
        crate::dir::add(&mut bm, &store, &mut root, "f", file.ino).unwrap();

        assert_eq!(resolve(&store, &root, "/f/x").unwrap_err(), Error::Inval);
    }

    #[test]
    fn split_basic() {
        assert_eq!(split("/a/b").unwrap(), ("/a".to_string(), "b".to_string()));
        assert_eq!(split("/a").unwrap(), ("/".to_string(), "a".to_string()));
        assert_eq!(split("/a/").unwrap(), ("/".to_string(), "a".to_string()));
    }

    #[test]
    fn split_rejects_root() {
        assert_eq!(split("/").unwrap_err(), Error::Inval);
    }
}
