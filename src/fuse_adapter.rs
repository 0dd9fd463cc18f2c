//! FUSE adapter (spec §4.9 supplement): the thin `fuser::Filesystem` impl
//! that is the concrete "Operation Dispatch Glue" for this kernel
//! protocol. Translates `fuser`'s inode-addressed, kernel-numbered calls
//! into `MountContext` calls; no filesystem logic lives here.
//!
//! FUSE reserves inode 1 for the mount root; on-disk inode numbers start
//! at 0 for the root (spec §3). This file is the only place the +1 offset
//! exists.
//!
//! `unlink`/`rmdir`/`release`/`flush`/`releasedir`/`setattr` are wired up
//! as explicit no-ops (spec §1): without them, `fuser`'s own defaults
//! would reply `ENOSYS` to the kernel, which is not the "stub endpoint"
//! contract the spec asks for.

use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, ReplyAttr, ReplyCreate, ReplyData, ReplyDirectory,
    ReplyEmpty, ReplyEntry, ReplyOpen, ReplyWrite, Request, TimeOrNow,
};
use log::{error, warn};

use crate::error::FsError;
use crate::inode::S_IFDIR;
use crate::mount::{Attr, MountContext};

const TTL: Duration = Duration::from_secs(1);

/// `fuse_ino = tfs_ino + 1` (spec §4.9 supplement).
fn to_fuse_ino(tfs_ino: u32) -> u64 {
    tfs_ino as u64 + 1
}

/// Inverse of [`to_fuse_ino`]. FUSE never hands back 0; the mount root is
/// always observed by its kernel number, 1.
fn to_tfs_ino(fuse_ino: u64) -> u32 {
    (fuse_ino - 1) as u32
}

fn file_attr(attr: &Attr) -> FileAttr {
    let kind = if attr.kind == S_IFDIR {
        FileType::Directory
    } else {
        FileType::RegularFile
    };
    let mtime = UNIX_EPOCH + Duration::from_secs(attr.mtime.max(0) as u64);
    FileAttr {
        ino: to_fuse_ino(attr.ino),
        size: attr.size,
        blocks: (attr.size + 511) / 512,
        atime: mtime,
        mtime,
        ctime: mtime,
        crtime: mtime,
        kind,
        perm: (attr.mode & 0o7777) as u16,
        nlink: attr.nlink,
        uid: attr.uid,
        gid: attr.gid,
        rdev: 0,
        blksize: crate::block::BLOCK_SIZE as u32,
        flags: 0,
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

pub struct FuseAdapter {
    ctx: MountContext,
}

impl FuseAdapter {
    pub fn new(ctx: MountContext) -> Self {
        Self { ctx }
    }
}

impl Filesystem for FuseAdapter {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> Result<(), i32> {
        Ok(())
    }

    fn destroy(&mut self) {}

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self.ctx.lookup(to_tfs_ino(parent), name) {
            Ok(attr) => reply.entry(&TTL, &file_attr(&attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, _fh: Option<u64>, reply: ReplyAttr) {
        match self.ctx.getattr_ino(to_tfs_ino(ino)) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn opendir(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.ctx.getattr_ino(to_tfs_ino(ino)) {
            Ok(attr) if attr.kind == S_IFDIR => reply.opened(0, 0),
            Ok(_) => reply.error(libc::ENOTDIR),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn readdir(&mut self, _req: &Request<'_>, ino: u64, _fh: u64, offset: i64, mut reply: ReplyDirectory) {
        let entries = match self.ctx.readdir_ino(to_tfs_ino(ino)) {
            Ok(entries) => entries,
            Err(e) => {
                reply.error(e.to_errno());
                return;
            }
        };

        for (i, entry) in entries.into_iter().enumerate().skip(offset as usize) {
            let kind = match self.ctx.getattr_ino(entry.ino) {
                Ok(a) if a.kind == S_IFDIR => FileType::Directory,
                Ok(_) => FileType::RegularFile,
                Err(e) => {
                    warn!("readdir: stat of {} failed: {e}", entry.name);
                    continue;
                }
            };
            let full = reply.add(to_fuse_ino(entry.ino), (i + 1) as i64, kind, &entry.name);
            if full {
                break;
            }
        }
        reply.ok();
    }

    fn mkdir(&mut self, req: &Request<'_>, parent: u64, name: &OsStr, _mode: u32, _umask: u32, reply: ReplyEntry) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self
            .ctx
            .mkdir_at(to_tfs_ino(parent), name, req.uid(), req.gid(), now_unix())
        {
            Ok(attr) => reply.entry(&TTL, &file_attr(&attr), 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn create(
        &mut self,
        req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let Some(name) = name.to_str() else {
            reply.error(libc::EINVAL);
            return;
        };
        match self
            .ctx
            .create_at(to_tfs_ino(parent), name, req.uid(), req.gid(), now_unix())
        {
            Ok(attr) => reply.created(&TTL, &file_attr(&attr), 0, 0, 0),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn open(&mut self, _req: &Request<'_>, ino: u64, _flags: i32, reply: ReplyOpen) {
        match self.ctx.getattr_ino(to_tfs_ino(ino)) {
            Ok(attr) if attr.kind != S_IFDIR => reply.opened(0, 0),
            Ok(_) => reply.error(libc::EISDIR),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.ctx.read(to_tfs_ino(ino), offset as u64, size as usize) {
            Ok(data) => reply.data(&data),
            Err(e) => reply.error(e.to_errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        if offset < 0 {
            reply.error(libc::EINVAL);
            return;
        }
        match self.ctx.write(to_tfs_ino(ino), offset as u64, data) {
            Ok(n) => reply.written(n as u32),
            Err(FsError::Io(e)) => {
                error!("write i/o error: {e}");
                reply.error(libc::EIO);
            }
            Err(e) => reply.error(e.to_errno()),
        }
    }

    /// No-op stub (spec §1): removal is out of scope for this core.
    fn unlink(&mut self, _req: &Request<'_>, _parent: u64, name: &OsStr, reply: ReplyEmpty) {
        warn!("unlink({:?}) is a no-op stub", name);
        reply.ok();
    }

    /// No-op stub (spec §1): removal is out of scope for this core.
    fn rmdir(&mut self, _req: &Request<'_>, _parent: u64, name: &OsStr, reply: ReplyEmpty) {
        warn!("rmdir({:?}) is a no-op stub", name);
        reply.ok();
    }

    /// No-op stub (spec §1): no per-request file-handle state to release.
    fn release(
        &mut self,
        _req: &Request<'_>,
        _ino: u64,
        _fh: u64,
        _flags: i32,
        _lock_owner: Option<u64>,
        _flush: bool,
        reply: ReplyEmpty,
    ) {
        reply.ok();
    }

    /// No-op stub (spec §1): every write is already write-through.
    fn flush(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _lock_owner: u64, reply: ReplyEmpty) {
        reply.ok();
    }

    /// No-op stub (spec §1): no per-request directory handle state.
    fn releasedir(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _flags: i32, reply: ReplyEmpty) {
        reply.ok();
    }

    /// No-op stub (spec §1): `truncate`/`utimens` both land here through
    /// FUSE's single `setattr` call; neither mutates on-disk state in this
    /// core, so the current attributes are simply reflected back.
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        _size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        match self.ctx.getattr_ino(to_tfs_ino(ino)) {
            Ok(attr) => reply.attr(&TTL, &file_attr(&attr)),
            Err(e) => reply.error(e.to_errno()),
        }
    }
}
