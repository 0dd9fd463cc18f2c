//! File I/O engine (spec §4.8): byte-range read and write across direct
//! data blocks, with lazy block allocation and size extension on write.

use std::cmp::min;

use crate::alloc::alloc_block;
use crate::bitmap::BitmapBlock;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::error::{FsError, FsResult};
use crate::inode::{write_inode, Inode};
use crate::layout::{SuperBlock, INVALID_DBLOCK, N_DIRECT};

/// Read up to `size` bytes starting at `offset`. May return fewer bytes
/// than requested if the read range crosses `inode.size` (spec §9: short
/// reads are observable behavior, not an error) or runs off the packed
/// direct-pointer prefix.
pub fn read(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    inode: &Inode,
    offset: u64,
    size: usize,
) -> FsResult<Vec<u8>> {
    if offset > inode.size as u64 {
        return Err(FsError::BadOffset);
    }

    let first = (offset / BLOCK_SIZE as u64) as usize;
    let eof_block = (inode.size as u64 / BLOCK_SIZE as u64) as usize;

    let mut out = Vec::new();
    let mut remaining = size;
    let mut i = first;
    let mut block = [0u8; BLOCK_SIZE];

    while remaining > 0 && i < N_DIRECT && inode.direct_ptr[i] != INVALID_DBLOCK {
        let start = if i == first { (offset % BLOCK_SIZE as u64) as usize } else { 0 };
        let in_block = if i == eof_block {
            inode.size as usize % BLOCK_SIZE
        } else {
            BLOCK_SIZE
        };
        if in_block <= start {
            break;
        }
        let available = in_block - start;
        let n = min(remaining, available);

        dev.read(sb.d_start_blk as u64 + inode.direct_ptr[i] as u64, &mut block)?;
        out.extend_from_slice(&block[start..start + n]);

        remaining -= n;
        i += 1;
    }

    Ok(out)
}

/// Write `data` at `offset`, allocating new direct blocks as needed.
/// Sparse extension past the current end is rejected (`offset >
/// inode.size` fails with `BadOffset`, matching spec §4.8). Updates and
/// persists `inode` (size grows to `max(old size, offset + written)`, the
/// stricter of the two behaviors spec §9 leaves open — see DESIGN.md).
/// Returns the number of bytes actually written, which may be short of
/// `data.len()` if the allocator runs out of space mid-write.
pub fn write(
    dev: &mut BlockDevice,
    sb: &SuperBlock,
    data_bitmap: &mut BitmapBlock,
    ino: u32,
    inode: &mut Inode,
    offset: u64,
    data: &[u8],
) -> FsResult<usize> {
    if offset > inode.size as u64 {
        return Err(FsError::BadOffset);
    }

    let first = (offset / BLOCK_SIZE as u64) as usize;
    let last = ((offset + data.len() as u64) / BLOCK_SIZE as u64) as usize;

    let mut remaining = data.len();
    let mut i = first;
    let mut total = 0usize;
    let mut block = [0u8; BLOCK_SIZE];

    while remaining > 0 && i < N_DIRECT {
        let start = if i == first { (offset % BLOCK_SIZE as u64) as usize } else { 0 };
        let n = min(remaining, BLOCK_SIZE - start);

        if inode.direct_ptr[i] == INVALID_DBLOCK {
            let new_block = match alloc_block(dev, sb, data_bitmap) {
                Ok(b) => b,
                Err(FsError::NoSpace) => break,
                Err(e) => return Err(e),
            };
            inode.direct_ptr[i] = new_block;
            block = [0u8; BLOCK_SIZE];
        } else if i == first || i == last {
            dev.read(sb.d_start_blk as u64 + inode.direct_ptr[i] as u64, &mut block)?;
        }

        block[start..start + n].copy_from_slice(&data[total..total + n]);
        dev.write(sb.d_start_blk as u64 + inode.direct_ptr[i] as u64, &block)?;

        total += n;
        remaining -= n;
        i += 1;
    }

    inode.size = inode.size.max((offset + total as u64) as u32);
    write_inode(dev, sb, ino, inode)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inode::S_IFREG;
    use crate::layout::DEFAULT_TOTAL_BLOCKS;

    fn mounted() -> (tempfile::TempDir, BlockDevice, SuperBlock) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let dev = BlockDevice::create(&path, DEFAULT_TOTAL_BLOCKS).unwrap();
        let sb = SuperBlock::for_capacity(DEFAULT_TOTAL_BLOCKS);
        (dir, dev, sb)
    }

    fn fresh_file_inode() -> Inode {
        let mut inode = Inode::empty();
        inode.valid = 1;
        inode.kind = S_IFREG;
        inode
    }

    #[test]
    fn write_then_read_within_one_block() {
        let (_d, mut dev, sb) = mounted();
        let mut bitmap = BitmapBlock::zeroed();
        let mut inode = fresh_file_inode();

        let n = write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 0, b"hello").unwrap();
        assert_eq!(n, 5);
        assert_eq!(inode.size, 5);

        let data = read(&mut dev, &sb, &inode, 0, 5).unwrap();
        assert_eq!(data, b"hello");
    }

    #[test]
    fn write_spanning_two_blocks() {
        let (_d, mut dev, sb) = mounted();
        let mut bitmap = BitmapBlock::zeroed();
        let mut inode = fresh_file_inode();

        let buf: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let n = write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 0, &buf).unwrap();
        assert_eq!(n, 5000);
        assert_eq!(inode.direct_ptr[2], INVALID_DBLOCK);

        let tail = read(&mut dev, &sb, &inode, 4090, 20).unwrap();
        assert_eq!(tail, buf[4090..4110]);
    }

    #[test]
    fn write_past_current_size_is_rejected() {
        let (_d, mut dev, sb) = mounted();
        let mut bitmap = BitmapBlock::zeroed();
        let mut inode = fresh_file_inode();
        let err = write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 10, b"x").unwrap_err();
        assert!(matches!(err, FsError::BadOffset));
    }

    #[test]
    fn overwrite_in_the_middle_does_not_shrink_size() {
        let (_d, mut dev, sb) = mounted();
        let mut bitmap = BitmapBlock::zeroed();
        let mut inode = fresh_file_inode();

        write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 0, b"0123456789").unwrap();
        assert_eq!(inode.size, 10);

        write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 2, b"ab").unwrap();
        assert_eq!(inode.size, 10, "a short overwrite must not truncate size");

        let data = read(&mut dev, &sb, &inode, 0, 10).unwrap();
        assert_eq!(&data, b"01ab456789");
    }

    #[test]
    fn read_past_end_is_rejected_but_crossing_end_is_a_short_read() {
        let (_d, mut dev, sb) = mounted();
        let mut bitmap = BitmapBlock::zeroed();
        let mut inode = fresh_file_inode();
        write(&mut dev, &sb, &mut bitmap, 0, &mut inode, 0, b"hello").unwrap();

        assert!(read(&mut dev, &sb, &inode, 100, 5).is_err());

        let data = read(&mut dev, &sb, &inode, 3, 10).unwrap();
        assert_eq!(data, b"lo");
    }
}
