//! Mount context and dispatch glue (spec §4.9): the struct every entry
//! point (CLI, tests, FUSE adapter) drives. Ties the block device, the
//! superblock, and the two in-memory bitmaps together for the lifetime of
//! a mount.

use std::path::Path;

use log::{debug, info};

use crate::alloc::{alloc_block, alloc_inode};
use crate::bitmap::BitmapBlock;
use crate::block::{BlockDevice, BLOCK_SIZE};
use crate::dirent::{dir_add, dir_find, dir_find_entry, dir_iter};
use crate::error::{FsError, FsResult};
use crate::fileio;
use crate::inode::{read_inode, write_inode, Inode, S_IFDIR, S_IFREG};
use crate::layout::{SuperBlock, I_BITMAP_BLOCK, D_BITMAP_BLOCK};
use crate::path::{resolve, split_parent};

/// The subset of an inode the dispatch-glue callers need (spec §4.9's
/// `getattr`: "fill uid, gid, link count, size, mtime, and mode").
#[derive(Clone, Copy, Debug)]
pub struct Attr {
    pub ino: u32,
    pub kind: u32,
    pub mode: u32,
    pub nlink: u32,
    pub size: u64,
    pub uid: u32,
    pub gid: u32,
    pub mtime: i64,
}

impl Attr {
    fn from_inode(ino: u32, inode: &Inode) -> Self {
        let mode = if inode.is_dir() {
            inode.kind | 0o755
        } else {
            inode.kind | 0o644
        };
        Self {
            ino,
            kind: inode.kind,
            mode,
            nlink: inode.nlink,
            size: inode.size as u64,
            uid: inode.uid,
            gid: inode.gid,
            mtime: inode.mtime,
        }
    }
}

/// One entry as surfaced by `readdir` (spec §4.9).
pub struct DirListEntry {
    pub name: String,
    pub ino: u32,
}

/// The mount context (GLOSSARY): open block device, in-memory superblock,
/// in-memory inode and data-block bitmaps, held for the mount's lifetime.
pub struct MountContext {
    dev: BlockDevice,
    sb: SuperBlock,
    inode_bitmap: BitmapBlock,
    data_bitmap: BitmapBlock,
}

impl MountContext {
    /// Format a fresh diskfile at `path` with `total_blocks` blocks and the
    /// single root directory inode (spec §4.3): directory, link count 2,
    /// size one block, one valid `.` entry, no `..`.
    pub fn mkfs(path: &Path, total_blocks: u64, uid: u32, gid: u32, now: i64) -> FsResult<()> {
        info!("formatting {} with {} blocks", path.display(), total_blocks);

        let mut dev = BlockDevice::create(path, total_blocks)?;
        let sb = SuperBlock::for_capacity(total_blocks);
        dev.write(crate::layout::SB_BLOCK, &sb.to_block())?;

        let mut inode_bitmap = BitmapBlock::zeroed();
        let mut data_bitmap = BitmapBlock::zeroed();

        let root_ino = alloc_inode(&mut dev, &sb, &mut inode_bitmap)?;
        debug_assert_eq!(root_ino, 0, "root must be the first inode allocated");

        let root_block = alloc_block(&mut dev, &sb, &mut data_bitmap)?;

        let mut root = Inode::empty();
        root.valid = 1;
        root.kind = S_IFDIR;
        root.nlink = 2;
        root.size = BLOCK_SIZE as u32;
        root.uid = uid;
        root.gid = gid;
        root.mtime = now;
        root.direct_ptr[0] = root_block;
        write_inode(&mut dev, &sb, root_ino, &root)?;

        dir_add(&mut dev, &sb, &mut data_bitmap, root_ino, &mut root, root_ino, ".", now)?;

        dev.close()?;
        Ok(())
    }

    /// `init` (spec §4.9): open an existing diskfile, read back the
    /// superblock and both bitmap blocks into memory.
    pub fn init(path: &Path) -> FsResult<Self> {
        info!("mounting {}", path.display());
        let mut dev = BlockDevice::open(path)?;

        let mut sb_block = [0u8; BLOCK_SIZE];
        dev.read(crate::layout::SB_BLOCK, &mut sb_block)?;
        let sb = SuperBlock::from_block(&sb_block);
        if sb.magic != crate::layout::FS_MAGIC {
            return Err(FsError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "bad superblock magic",
            )));
        }

        let mut ib = [0u8; BLOCK_SIZE];
        dev.read(I_BITMAP_BLOCK, &mut ib)?;
        let mut db = [0u8; BLOCK_SIZE];
        dev.read(D_BITMAP_BLOCK, &mut db)?;

        Ok(Self {
            dev,
            sb,
            inode_bitmap: BitmapBlock::from_bytes(ib),
            data_bitmap: BitmapBlock::from_bytes(db),
        })
    }

    /// `destroy` (spec §4.9): flush and drop the block device.
    pub fn destroy(self) -> FsResult<()> {
        info!("unmounting");
        self.dev.close()?;
        Ok(())
    }

    pub fn root_ino(&self) -> u32 {
        0
    }

    /// `getattr` (spec §4.9), path-addressed.
    pub fn getattr(&mut self, path: &str) -> FsResult<Attr> {
        let ino = resolve(&mut self.dev, &self.sb, path, self.root_ino())?;
        self.getattr_ino(ino)
    }

    /// `getattr`, inode-addressed — the form the FUSE adapter calls
    /// directly once the kernel hands it an inode number.
    pub fn getattr_ino(&mut self, ino: u32) -> FsResult<Attr> {
        let inode = read_inode(&mut self.dev, &self.sb, ino)?;
        if inode.valid == 0 {
            return Err(FsError::NotFound);
        }
        Ok(Attr::from_inode(ino, &inode))
    }

    /// `lookup`: resolve `name` inside the directory `parent_ino`, the
    /// entry point FUSE's `lookup` calls directly (spec §4.9 supplement).
    pub fn lookup(&mut self, parent_ino: u32, name: &str) -> FsResult<Attr> {
        let entry = dir_find(&mut self.dev, &self.sb, parent_ino, name)?;
        self.getattr_ino(entry.ino)
    }

    /// `opendir` (spec §4.9): resolve the path and confirm it names a
    /// directory; there is no persistent file handle to hand back since
    /// this implementation keeps no open-file table (spec non-goal).
    pub fn opendir(&mut self, path: &str) -> FsResult<u32> {
        let ino = resolve(&mut self.dev, &self.sb, path, self.root_ino())?;
        let inode = read_inode(&mut self.dev, &self.sb, ino)?;
        if !inode.is_dir() {
            return Err(FsError::NotADirectory);
        }
        Ok(ino)
    }

    /// `readdir` (spec §4.9), path-addressed.
    pub fn readdir(&mut self, path: &str) -> FsResult<Vec<DirListEntry>> {
        let ino = resolve(&mut self.dev, &self.sb, path, self.root_ino())?;
        self.readdir_ino(ino)
    }

    /// `readdir`, inode-addressed.
    pub fn readdir_ino(&mut self, ino: u32) -> FsResult<Vec<DirListEntry>> {
        let inode = read_inode(&mut self.dev, &self.sb, ino)?;
        let mut out = Vec::new();
        dir_iter(&mut self.dev, &self.sb, &inode, |name, child_ino| {
            out.push(DirListEntry {
                name: name.to_string(),
                ino: child_ino,
            })
        })?;
        Ok(out)
    }

    /// `mkdir` (spec §4.9), path-addressed: split into parent + basename,
    /// resolve the parent, then delegate to the inode-addressed form.
    pub fn mkdir(&mut self, path: &str, uid: u32, gid: u32, now: i64) -> FsResult<Attr> {
        let (parent_path, name) = split_parent(path)?;
        let parent_ino = resolve(&mut self.dev, &self.sb, parent_path, self.root_ino())?;
        self.mkdir_at(parent_ino, name, uid, gid, now)
    }

    /// `mkdir`, inode-addressed: the form FUSE's `mkdir` calls directly
    /// with the kernel-resolved parent inode number (spec §4.9 supplement).
    /// New directory gets link count 2, one block, a `.` entry and a `..`
    /// entry pointing at the parent (spec §3).
    pub fn mkdir_at(&mut self, parent_ino: u32, name: &str, uid: u32, gid: u32, now: i64) -> FsResult<Attr> {
        let mut parent = read_inode(&mut self.dev, &self.sb, parent_ino)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if name.len() > crate::layout::DIRSIZ {
            return Err(FsError::NameTooLong);
        }
        if dir_find_entry(&mut self.dev, &self.sb, &parent, name).is_ok() {
            return Err(FsError::Exists);
        }

        let child_ino = alloc_inode(&mut self.dev, &self.sb, &mut self.inode_bitmap)?;
        let child_block = alloc_block(&mut self.dev, &self.sb, &mut self.data_bitmap)?;

        let mut child = Inode::empty();
        child.valid = 1;
        child.kind = S_IFDIR;
        child.nlink = 2;
        child.size = BLOCK_SIZE as u32;
        child.uid = uid;
        child.gid = gid;
        child.mtime = now;
        child.direct_ptr[0] = child_block;
        write_inode(&mut self.dev, &self.sb, child_ino, &child)?;

        dir_add(&mut self.dev, &self.sb, &mut self.data_bitmap, child_ino, &mut child, child_ino, ".", now)?;
        dir_add(&mut self.dev, &self.sb, &mut self.data_bitmap, child_ino, &mut child, parent_ino, "..", now)?;

        dir_add(&mut self.dev, &self.sb, &mut self.data_bitmap, parent_ino, &mut parent, child_ino, name, now)?;

        debug!("mkdir {name} under inode {parent_ino} -> inode {child_ino}");
        Ok(Attr::from_inode(child_ino, &child))
    }

    /// `create` (spec §4.9), path-addressed.
    pub fn create(&mut self, path: &str, uid: u32, gid: u32, now: i64) -> FsResult<Attr> {
        let (parent_path, name) = split_parent(path)?;
        let parent_ino = resolve(&mut self.dev, &self.sb, parent_path, self.root_ino())?;
        self.create_at(parent_ino, name, uid, gid, now)
    }

    /// `create`, inode-addressed (spec §4.9 supplement): a zero-length
    /// regular file with no data blocks allocated yet.
    pub fn create_at(&mut self, parent_ino: u32, name: &str, uid: u32, gid: u32, now: i64) -> FsResult<Attr> {
        let mut parent = read_inode(&mut self.dev, &self.sb, parent_ino)?;
        if !parent.is_dir() {
            return Err(FsError::NotADirectory);
        }
        if name.len() > crate::layout::DIRSIZ {
            return Err(FsError::NameTooLong);
        }
        if dir_find_entry(&mut self.dev, &self.sb, &parent, name).is_ok() {
            return Err(FsError::Exists);
        }

        let child_ino = alloc_inode(&mut self.dev, &self.sb, &mut self.inode_bitmap)?;
        let mut child = Inode::empty();
        child.valid = 1;
        child.kind = S_IFREG;
        child.nlink = 1;
        child.uid = uid;
        child.gid = gid;
        child.mtime = now;
        write_inode(&mut self.dev, &self.sb, child_ino, &child)?;

        dir_add(&mut self.dev, &self.sb, &mut self.data_bitmap, parent_ino, &mut parent, child_ino, name, now)?;

        debug!("create {name} under inode {parent_ino} -> inode {child_ino}");
        Ok(Attr::from_inode(child_ino, &child))
    }

    /// `open` (spec §4.9), path-addressed: resolve and confirm the node is
    /// a regular file. No file handle table is kept (spec non-goal).
    pub fn open(&mut self, path: &str) -> FsResult<u32> {
        let ino = resolve(&mut self.dev, &self.sb, path, self.root_ino())?;
        let inode = read_inode(&mut self.dev, &self.sb, ino)?;
        if !inode.is_reg() {
            return Err(FsError::NotARegularFile);
        }
        Ok(ino)
    }

    /// `read`, inode-addressed (spec §4.8/§4.9).
    pub fn read(&mut self, ino: u32, offset: u64, size: usize) -> FsResult<Vec<u8>> {
        let inode = read_inode(&mut self.dev, &self.sb, ino)?;
        fileio::read(&mut self.dev, &self.sb, &inode, offset, size)
    }

    /// `write`, inode-addressed (spec §4.8/§4.9).
    pub fn write(&mut self, ino: u32, offset: u64, data: &[u8]) -> FsResult<usize> {
        let mut inode = read_inode(&mut self.dev, &self.sb, ino)?;
        if !inode.is_reg() {
            return Err(FsError::NotARegularFile);
        }
        fileio::write(&mut self.dev, &self.sb, &mut self.data_bitmap, ino, &mut inode, offset, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::DEFAULT_TOTAL_BLOCKS;

    fn fresh_mount() -> (tempfile::TempDir, MountContext) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        MountContext::mkfs(&path, DEFAULT_TOTAL_BLOCKS, 1000, 1000, 0).unwrap();
        let ctx = MountContext::init(&path).unwrap();
        (dir, ctx)
    }

    #[test]
    fn mkfs_produces_a_root_with_a_single_dot_entry() {
        let (_d, mut ctx) = fresh_mount();
        let attr = ctx.getattr("/").unwrap();
        assert_eq!(attr.ino, 0);
        assert_eq!(attr.nlink, 2);

        let entries = ctx.readdir("/").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, ".");
        assert_eq!(entries[0].ino, 0);
    }

    #[test]
    fn mkdir_then_create_then_readdir() {
        let (_d, mut ctx) = fresh_mount();
        ctx.mkdir("/a", 1000, 1000, 1).unwrap();
        ctx.create("/a/f", 1000, 1000, 2).unwrap();

        let entries = ctx.readdir("/a").unwrap();
        let mut names: Vec<_> = entries.iter().map(|e| e.name.clone()).collect();
        names.sort();
        assert_eq!(names, vec!["..", ".", "f"]);

        let attr = ctx.getattr("/a/f").unwrap();
        assert_eq!(attr.size, 0);
        assert_eq!(attr.mode & 0o777, 0o644);
    }

    #[test]
    fn duplicate_mkdir_and_create_are_rejected() {
        let (_d, mut ctx) = fresh_mount();
        ctx.mkdir("/a", 0, 0, 0).unwrap();
        assert!(matches!(ctx.mkdir("/a", 0, 0, 0), Err(FsError::Exists)));

        ctx.create("/f", 0, 0, 0).unwrap();
        assert!(matches!(ctx.create("/f", 0, 0, 0), Err(FsError::Exists)));
    }

    #[test]
    fn write_and_read_round_trip_through_the_mount_context() {
        let (_d, mut ctx) = fresh_mount();
        ctx.create("/f", 0, 0, 0).unwrap();
        let ino = ctx.open("/f").unwrap();

        let n = ctx.write(ino, 0, b"hello tfs").unwrap();
        assert_eq!(n, 9);

        let data = ctx.read(ino, 0, 9).unwrap();
        assert_eq!(&data, b"hello tfs");

        let attr = ctx.getattr("/f").unwrap();
        assert_eq!(attr.size, 9);
    }

    #[test]
    fn opendir_on_a_regular_file_fails() {
        let (_d, mut ctx) = fresh_mount();
        ctx.create("/f", 0, 0, 0).unwrap();
        assert!(matches!(ctx.opendir("/f"), Err(FsError::NotADirectory)));
    }

    #[test]
    fn mkdir_and_create_reject_overlong_names_without_panicking() {
        let (_d, mut ctx) = fresh_mount();
        let too_long = "x".repeat(crate::layout::DIRSIZ + 1);

        assert!(matches!(
            ctx.mkdir(&format!("/{too_long}"), 0, 0, 0),
            Err(FsError::NameTooLong)
        ));
        assert!(matches!(
            ctx.create(&format!("/{too_long}"), 0, 0, 0),
            Err(FsError::NameTooLong)
        ));
    }
}
