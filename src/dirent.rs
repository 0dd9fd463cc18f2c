//! Directory module (spec §4.6): entry lookup, entry insertion, and
//! allocation of new directory data blocks.

use std::mem::size_of;

use crate::alloc::alloc_block;
use crate::bitmap::BitmapBlock;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::inode::{read_inode, write_inode, Inode};
use crate::layout::{SuperBlock, DIRSIZ, INVALID_DBLOCK};

/// Fixed-size directory entry record, packed into B-sized data blocks.
#[derive(Clone, Copy, Debug)]
#[repr(C)]
pub struct DirEntry {
    pub valid: u32,
    pub ino: u32,
    pub name_len: u32,
    _pad: u32,
    name: [u8; DIRSIZ],
}

const _: () = assert!(BLOCK_SIZE % size_of::<DirEntry>() == 0);

pub const MAX_DIRENTS_PER_BLOCK: usize = BLOCK_SIZE / size_of::<DirEntry>();

impl DirEntry {
    fn empty() -> Self {
        Self {
            valid: 0,
            ino: 0,
            name_len: 0,
            _pad: 0,
            name: [0; DIRSIZ],
        }
    }

    fn new(ino: u32, name: &str) -> Self {
        let mut de = Self::empty();
        de.valid = 1;
        de.ino = ino;
        de.name_len = name.len() as u32;
        let bytes = name.as_bytes();
        de.name[..bytes.len()].copy_from_slice(bytes);
        de
    }

    pub fn name(&self) -> &str {
        std::str::from_utf8(&self.name[..self.name_len as usize]).unwrap_or("")
    }

    pub fn is_valid(&self) -> bool {
        self.valid != 0
    }
}

fn decode_dirent(block: &[u8; BLOCK_SIZE], slot: usize) -> DirEntry {
    let sz = size_of::<DirEntry>();
    let off = slot * sz;
    let mut de = DirEntry::empty();
    let raw = unsafe { std::slice::from_raw_parts_mut(&mut de as *mut DirEntry as *mut u8, sz) };
    raw.copy_from_slice(&block[off..off + sz]);
    de
}

fn encode_dirent(de: &DirEntry, block: &mut [u8; BLOCK_SIZE], slot: usize) {
    let sz = size_of::<DirEntry>();
    let off = slot * sz;
    let raw = unsafe { std::slice::from_raw_parts(de as *const DirEntry as *const u8, sz) };
    block[off..off + sz].copy_from_slice(raw);
}

/// Look up `name` in the directory `parent_ino` (spec §4.6): read the
/// parent inode, fail with `NotADirectory` if it isn't one, otherwise scan
/// its data blocks for a valid entry whose name matches.
pub fn dir_find(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    parent_ino: u32,
    name: &str,
) -> FsResult<DirEntry> {
    let dir_inode = read_inode(dev, sb, parent_ino)?;
    dir_find_entry(dev, sb, &dir_inode, name)
}

/// Search an already-loaded directory inode for `name`. Used when the
/// caller has already read the inode (e.g. `dir_add`, or the FUSE adapter
/// acting on a parent inode number handed to it directly by the kernel).
pub fn dir_find_entry(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    dir_inode: &Inode,
    name: &str,
) -> FsResult<DirEntry> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotADirectory);
    }

    let mut block = [0u8; BLOCK_SIZE];
    for k in 0..dir_inode.used_direct_ptrs() {
        let ptr = dir_inode.direct_ptr[k];
        dev.read(sb.d_start_blk as u64 + ptr as u64, &mut block)?;
        for slot in 0..MAX_DIRENTS_PER_BLOCK {
            let de = decode_dirent(&block, slot);
            if de.is_valid() && de.name() == name {
                return Ok(de);
            }
        }
    }
    Err(FsError::NotFound)
}

/// Insert `(child_ino, name)` into `parent_inode`'s data blocks (spec
/// §4.6). Updates the parent's link count and mtime and persists it.
/// `parent_inode` is updated in place to mirror what is written to disk.
pub fn dir_add(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    data_bitmap: &mut BitmapBlock,
    parent_ino: u32,
    parent_inode: &mut Inode,
    child_ino: u32,
    name: &str,
    now: i64,
) -> FsResult<()> {
    if name.len() > DIRSIZ {
        return Err(FsError::NameTooLong);
    }
    if dir_find_entry(dev, sb, parent_inode, name).is_ok() {
        return Err(FsError::Exists);
    }

    let used = parent_inode.used_direct_ptrs();
    let mut block = [0u8; BLOCK_SIZE];

    // Step 2: look for a free slot among already-allocated blocks.
    for k in 0..used {
        let ptr = parent_inode.direct_ptr[k];
        dev.read(sb.d_start_blk as u64 + ptr as u64, &mut block)?;
        for slot in 0..MAX_DIRENTS_PER_BLOCK {
            let de = decode_dirent(&block, slot);
            if !de.is_valid() {
                encode_dirent(&DirEntry::new(child_ino, name), &mut block, slot);
                dev.write(sb.d_start_blk as u64 + ptr as u64, &block)?;

                parent_inode.nlink += 1;
                parent_inode.mtime = now;
                write_inode(dev, sb, parent_ino, parent_inode)?;
                return Ok(());
            }
        }
    }

    // Step 3: all allocated blocks are full; grow into a new direct pointer
    // if one is still free.
    if used >= parent_inode.direct_ptr.len() {
        return Err(FsError::NoSpace);
    }

    let new_block = alloc_block(dev, sb, data_bitmap)?;
    let mut fresh = [0u8; BLOCK_SIZE];
    encode_dirent(&DirEntry::new(child_ino, name), &mut fresh, 0);
    dev.write(sb.d_start_blk as u64 + new_block as u64, &fresh)?;

    parent_inode.direct_ptr[used] = new_block;
    parent_inode.size += BLOCK_SIZE as u32;
    parent_inode.nlink += 1;
    parent_inode.mtime = now;
    write_inode(dev, sb, parent_ino, parent_inode)?;
    Ok(())
}

/// External-collaborator stub: removal is out of scope for this core.
pub fn dir_remove(
    _dev: &mut BlockDevice,
    _sb: &SuperBlock,
    _parent_inode: &Inode,
    _name: &str,
) -> FsResult<()> {
    Ok(())
}

/// Iterate the valid entries of a directory inode in on-disk order
/// (ascending block index, ascending slot), invoking `fill(name, ino)` for
/// each.
pub fn dir_iter(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    dir_inode: &Inode,
    mut fill: impl FnMut(&str, u32),
) -> FsResult<()> {
    if !dir_inode.is_dir() {
        return Err(FsError::NotADirectory);
    }

    let mut block = [0u8; BLOCK_SIZE];
    for k in 0..dir_inode.used_direct_ptrs() {
        let ptr = dir_inode.direct_ptr[k];
        dev.read(sb.d_start_blk as u64 + ptr as u64, &mut block)?;
        for slot in 0..MAX_DIRENTS_PER_BLOCK {
            let de = decode_dirent(&block, slot);
            if de.is_valid() {
                fill(de.name(), de.ino);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::S_IFDIR;
    use crate::layout::DEFAULT_TOTAL_BLOCKS;

    fn fresh_dev() -> (tempfile::TempDir, BlockDevice, SuperBlock) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let dev = BlockDevice::create(&path, DEFAULT_TOTAL_BLOCKS).unwrap();
        let sb = SuperBlock::for_capacity(DEFAULT_TOTAL_BLOCKS);
        (dir, dev, sb)
    }

    #[test]
    fn add_then_find_round_trips() {
        let (_d, mut dev, sb) = fresh_dev();
        let mut bitmap = BitmapBlock::zeroed();

        let mut parent = Inode::empty();
        parent.valid = 1;
        parent.kind = S_IFDIR;

        dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 7, "a", 0).unwrap();
        let found = dir_find_entry(&mut dev, &sb, &parent, "a").unwrap();
        assert_eq!(found.ino, 7);
        assert_eq!(parent.nlink, 1);
    }

    #[test]
    fn duplicate_name_rejected() {
        let (_d, mut dev, sb) = fresh_dev();
        let mut bitmap = BitmapBlock::zeroed();
        let mut parent = Inode::empty();
        parent.valid = 1;
        parent.kind = S_IFDIR;

        dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 7, "a", 0).unwrap();
        let err = dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 8, "a", 0).unwrap_err();
        assert!(matches!(err, FsError::Exists));
    }

    #[test]
    fn name_longer_than_dirsiz_is_rejected_cleanly() {
        let (_d, mut dev, sb) = fresh_dev();
        let mut bitmap = BitmapBlock::zeroed();
        let mut parent = Inode::empty();
        parent.valid = 1;
        parent.kind = S_IFDIR;

        let too_long = "x".repeat(DIRSIZ + 1);
        let err = dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 7, &too_long, 0).unwrap_err();
        assert!(matches!(err, FsError::NameTooLong));
        assert_eq!(parent.used_direct_ptrs(), 0, "rejected name must not allocate a block");
    }

    #[test]
    fn adding_past_one_block_allocates_a_second_block() {
        let (_d, mut dev, sb) = fresh_dev();
        let mut bitmap = BitmapBlock::zeroed();
        let mut parent = Inode::empty();
        parent.valid = 1;
        parent.kind = S_IFDIR;

        for i in 0..(MAX_DIRENTS_PER_BLOCK + 1) {
            let name = format!("f{i}");
            dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, i as u32, &name, 0).unwrap();
        }
        assert_eq!(parent.used_direct_ptrs(), 2);
    }

    #[test]
    fn iteration_visits_entries_in_on_disk_order() {
        let (_d, mut dev, sb) = fresh_dev();
        let mut bitmap = BitmapBlock::zeroed();
        let mut parent = Inode::empty();
        parent.valid = 1;
        parent.kind = S_IFDIR;

        dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 1, "a", 0).unwrap();
        dir_add(&mut dev, &sb, &mut bitmap, 0, &mut parent, 2, "b", 0).unwrap();

        let mut names = Vec::new();
        dir_iter(&mut dev, &sb, &parent, |name, _ino| names.push(name.to_string())).unwrap();
        assert_eq!(names, vec!["a", "b"]);
    }
}
