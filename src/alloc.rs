//! Allocator (spec §4.5): first-fit scan over the inode and data-block
//! bitmaps, tie-broken by always scanning from index 0.

use crate::bitmap::BitmapBlock;
use crate::block::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::layout::SuperBlock;

/// Allocate the first free inode number, mark it used in `bitmap`, and
/// write the bitmap block through to disk before returning.
pub fn alloc_inode(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    bitmap: &mut BitmapBlock,
) -> FsResult<u32> {
    let ino = bitmap
        .find_first_clear(sb.max_inum as usize)
        .ok_or(FsError::NoSpace)?;
    bitmap.set(ino);
    dev.write(sb.i_bitmap_blk as u64, &bitmap.0)?;
    Ok(ino as u32)
}

/// Allocate the first free data block, mark it used in `bitmap`, and write
/// the bitmap block through to disk. The returned index is relative to
/// `sb.d_start_blk`; callers must add `d_start_blk` before issuing block
/// I/O against it.
pub fn alloc_block(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    bitmap: &mut BitmapBlock,
) -> FsResult<u32> {
    let rel = bitmap
        .find_first_clear(sb.max_dnum as usize)
        .ok_or(FsError::NoSpace)?;
    bitmap.set(rel);
    dev.write(sb.d_bitmap_blk as u64, &bitmap.0)?;
    Ok(rel as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DEFAULT_TOTAL_BLOCKS;

    #[test]
    fn allocates_inodes_first_fit_from_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let mut dev = BlockDevice::create(&path, DEFAULT_TOTAL_BLOCKS).unwrap();
        let sb = SuperBlock::for_capacity(DEFAULT_TOTAL_BLOCKS);
        let mut bitmap = BitmapBlock::zeroed();

        assert_eq!(alloc_inode(&mut dev, &sb, &mut bitmap).unwrap(), 0);
        assert_eq!(alloc_inode(&mut dev, &sb, &mut bitmap).unwrap(), 1);
        bitmap.clear(0);
        assert_eq!(alloc_inode(&mut dev, &sb, &mut bitmap).unwrap(), 0);
    }

    #[test]
    fn reports_exhaustion_when_no_bit_is_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let mut dev = BlockDevice::create(&path, DEFAULT_TOTAL_BLOCKS).unwrap();
        let sb = SuperBlock::for_capacity(DEFAULT_TOTAL_BLOCKS);
        let mut bitmap = BitmapBlock::zeroed();
        for i in 0..sb.max_inum as usize {
            bitmap.set(i);
        }
        assert!(matches!(
            alloc_inode(&mut dev, &sb, &mut bitmap),
            Err(FsError::NoSpace)
        ));
    }
}
