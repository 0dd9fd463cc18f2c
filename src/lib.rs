//! TFS core: a block-addressable, inode-based filesystem backed by a
//! single regular host file, exposed to the kernel through FUSE.

pub mod alloc;
pub mod bitmap;
pub mod block;
pub mod dirent;
pub mod error;
pub mod fileio;
pub mod fuse_adapter;
pub mod inode;
pub mod layout;
pub mod mount;
pub mod path;

pub use error::{FsError, FsResult};
pub use fuse_adapter::FuseAdapter;
pub use layout::{DEFAULT_TOTAL_BLOCKS, FS_MAGIC};
pub use mount::{Attr, DirListEntry, MountContext};
