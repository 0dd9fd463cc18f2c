//! Block device adapter.
//!
//! Wraps a single regular host file (the "diskfile") and exposes it as a
//! sequence of fixed-size blocks. Block numbers are absolute indices into
//! the diskfile. Reads and writes transfer exactly `BLOCK_SIZE` bytes and
//! are synchronous: the OS file cache provides the atomicity this module
//! assumes (spec §4.1).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Fixed block size for the whole filesystem (spec §3).
pub const BLOCK_SIZE: usize = 4096;

pub struct BlockDevice {
    file: File,
}

impl BlockDevice {
    /// Create a fresh, zero-initialized diskfile of `total_blocks` blocks.
    pub fn create(path: &Path, total_blocks: u64) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total_blocks * BLOCK_SIZE as u64)?;
        Ok(Self { file })
    }

    /// Open an existing diskfile.
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    pub fn read(&mut self, block_no: u64, buf: &mut [u8; BLOCK_SIZE]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(block_no * BLOCK_SIZE as u64))?;
        self.file.read_exact(buf)
    }

    pub fn write(&mut self, block_no: u64, buf: &[u8; BLOCK_SIZE]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(block_no * BLOCK_SIZE as u64))?;
        self.file.write_all(buf)
    }

    /// Flush and close. Consumes the adapter; the underlying `File` is
    /// dropped (and with it, closed) at the end of this call.
    pub fn close(self) -> std::io::Result<()> {
        self.file.sync_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_read_write_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        let mut dev = BlockDevice::create(&path, 8).unwrap();

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xab;
        block[BLOCK_SIZE - 1] = 0xcd;
        dev.write(3, &block).unwrap();

        let mut read_back = [0u8; BLOCK_SIZE];
        dev.read(3, &mut read_back).unwrap();
        assert_eq!(block, read_back);

        // Untouched blocks stay zeroed.
        let mut zero = [0u8; BLOCK_SIZE];
        dev.read(0, &mut zero).unwrap();
        assert_eq!(zero, [0u8; BLOCK_SIZE]);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("DISKFILE");
        assert!(BlockDevice::open(&path).is_err());
    }
}
