//! Path resolver (spec §4.7): absolute-path walk returning an inode number.

use crate::block::BlockDevice;
use crate::dirent::dir_find;
use crate::error::{FsError, FsResult};
use crate::layout::SuperBlock;

/// Resolve an absolute path to an inode number, starting the walk at
/// `start_ino` (typically the root, inode 0).
///
/// Empty segments from duplicated separators (`//`) and self segments
/// (`.`) are ordinary name lookups: every directory carries a `.` entry
/// pointing at itself (spec §3), so looking `.` up via `dir_find` is
/// equivalent to staying put.
pub fn resolve(dev: &mut BlockDevice, sb: &SuperBlock, path: &str, start_ino: u32) -> FsResult<u32> {
    if path == "/" {
        return Ok(start_ino);
    }

    let mut ino = start_ino;
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let entry = dir_find(dev, sb, ino, segment)?;
        ino = entry.ino;
    }
    Ok(ino)
}

/// Split an absolute path into `(parent_path, basename)`, matching
/// `dirname`/`basename` as used by `rufs.c`'s `mkdir`/`create`, but without
/// any owned/leaked buffers (spec §9's "path-splitting buffers" note):
/// both halves borrow from the input.
pub fn split_parent(path: &str) -> FsResult<(&str, &str)> {
    if path.is_empty() {
        return Err(FsError::EmptyPath);
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some(("", name)) => Ok(("/", name)),
        Some((parent, name)) => Ok((parent, name)),
        None => Ok(("/", trimmed)),
    }
}
