//! File backends handed out by archives.

use crate::delay::DelayGenerator;
use crate::error::{FsError, Result};
use crate::path::Mode;
use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use tracing::trace;

/// An open file inside an archive
pub trait FileBackend: fmt::Debug + Send {
    /// Read up to `buffer.len()` bytes at `offset`, returning the count read
    fn read(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize>;

    /// Write `buffer` at `offset`, returning the count written
    fn write(&mut self, offset: u64, buffer: &[u8], flush: bool) -> Result<usize>;

    fn size(&self) -> Result<u64>;

    /// Resize the file. Returns false when the backend does not allow it.
    fn set_size(&mut self, size: u64) -> bool;

    fn flush(&mut self) -> Result<()>;

    /// IPC delay for a read of `length` bytes
    fn read_delay_ns(&self, length: usize) -> u64;
}

/// A file backed directly by a host file
#[derive(Debug)]
pub struct DiskFile {
    file: File,
    mode: Mode,
    delay_generator: Box<dyn DelayGenerator>,
}

impl DiskFile {
    pub fn new(file: File, mode: Mode, delay_generator: Box<dyn DelayGenerator>) -> Self {
        Self {
            file,
            mode,
            delay_generator,
        }
    }
}

impl FileBackend for DiskFile {
    fn read(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        if !self.mode.contains(Mode::READ) {
            return Err(FsError::InvalidOpenFlags);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut total = 0;
        while total < buffer.len() {
            match self.file.read(&mut buffer[total..]) {
                Ok(0) => break,
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        trace!("DiskFile read: offset={:#X}, len={}", offset, total);
        Ok(total)
    }

    fn write(&mut self, offset: u64, buffer: &[u8], flush: bool) -> Result<usize> {
        if !self.mode.contains(Mode::WRITE) {
            return Err(FsError::InvalidOpenFlags);
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(buffer)?;
        if flush {
            self.file.flush()?;
        }
        trace!("DiskFile write: offset={:#X}, len={}", offset, buffer.len());
        Ok(buffer.len())
    }

    fn size(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn set_size(&mut self, size: u64) -> bool {
        self.file
            .set_len(size)
            .and_then(|()| self.file.sync_data())
            .is_ok()
    }

    fn flush(&mut self) -> Result<()> {
        self.file.flush()?;
        Ok(())
    }

    fn read_delay_ns(&self, length: usize) -> u64 {
        self.delay_generator.read_delay_ns(length)
    }
}

/// A disk file whose size is frozen when it is opened.
///
/// Used by ExtSaveData, where files are created with their final size.
/// Writes are clipped to the existing size and `set_size` is refused.
#[derive(Debug)]
pub struct FixSizeDiskFile {
    inner: DiskFile,
    size: u64,
}

impl FixSizeDiskFile {
    pub fn new(file: File, mode: Mode, delay_generator: Box<dyn DelayGenerator>) -> Result<Self> {
        let inner = DiskFile::new(file, mode, delay_generator);
        let size = inner.size()?;
        Ok(Self { inner, size })
    }
}

impl FileBackend for FixSizeDiskFile {
    fn read(&mut self, offset: u64, buffer: &mut [u8]) -> Result<usize> {
        self.inner.read(offset, buffer)
    }

    fn write(&mut self, offset: u64, buffer: &[u8], flush: bool) -> Result<usize> {
        if offset > self.size {
            return Err(FsError::WriteBeyondEnd);
        } else if offset == self.size {
            return Ok(0);
        }

        let room = self.size - offset;
        let length = (buffer.len() as u64).min(room) as usize;
        self.inner.write(offset, &buffer[..length], flush)
    }

    fn size(&self) -> Result<u64> {
        self.inner.size()
    }

    fn set_size(&mut self, _size: u64) -> bool {
        false
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn read_delay_ns(&self, length: usize) -> u64 {
        self.inner.read_delay_ns(length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct NoDelay;

    impl DelayGenerator for NoDelay {
        fn read_delay_ns(&self, _length: usize) -> u64 {
            0
        }

        fn open_delay_ns(&self) -> u64 {
            0
        }
    }

    fn host_file(contents: &[u8]) -> File {
        let mut file = tempfile::tempfile().unwrap();
        file.write_all(contents).unwrap();
        file
    }

    fn fixed(contents: &[u8]) -> FixSizeDiskFile {
        FixSizeDiskFile::new(host_file(contents), Mode::READ | Mode::WRITE, Box::new(NoDelay))
            .unwrap()
    }

    #[test]
    fn disk_file_enforces_mode() {
        let mut file = DiskFile::new(host_file(b"abc"), Mode::READ, Box::new(NoDelay));
        let mut buf = [0u8; 3];
        assert_eq!(file.read(0, &mut buf).unwrap(), 3);
        assert!(matches!(
            file.write(0, b"x", false),
            Err(FsError::InvalidOpenFlags)
        ));

        let mut file = DiskFile::new(host_file(b"abc"), Mode::WRITE, Box::new(NoDelay));
        assert!(matches!(
            file.read(0, &mut buf),
            Err(FsError::InvalidOpenFlags)
        ));
    }

    #[test]
    fn disk_file_reads_short_at_eof_and_resizes() {
        let mut file = DiskFile::new(
            host_file(b"hello"),
            Mode::READ | Mode::WRITE,
            Box::new(NoDelay),
        );
        let mut buf = [0u8; 8];
        assert_eq!(file.read(3, &mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"lo");
        assert_eq!(file.read(10, &mut buf).unwrap(), 0);

        assert!(file.set_size(2));
        assert_eq!(file.size().unwrap(), 2);
        assert_eq!(file.write(4, b"!", true).unwrap(), 1);
        assert_eq!(file.size().unwrap(), 5);
    }

    #[test]
    fn write_at_end_is_a_successful_no_op() {
        let mut file = fixed(&[0u8; 16]);
        for len in [0usize, 1, 64] {
            assert_eq!(file.write(16, &vec![7u8; len], false).unwrap(), 0);
        }
        assert_eq!(file.size().unwrap(), 16);
    }

    #[test]
    fn write_past_end_fails() {
        let mut file = fixed(&[0u8; 16]);
        assert!(matches!(
            file.write(17, b"x", false),
            Err(FsError::WriteBeyondEnd)
        ));
    }

    #[test]
    fn straddling_write_is_clipped() {
        let mut file = fixed(&[0u8; 16]);
        assert_eq!(file.write(11, &[0xAA; 10], true).unwrap(), 5);
        assert_eq!(file.size().unwrap(), 16);

        let mut buf = [0u8; 16];
        assert_eq!(file.read(0, &mut buf).unwrap(), 16);
        assert_eq!(&buf[..11], &[0u8; 11]);
        assert_eq!(&buf[11..], &[0xAA; 5]);
    }

    #[test]
    fn fixed_size_refuses_resize() {
        let mut file = fixed(&[1, 2, 3]);
        assert!(!file.set_size(100));
        assert!(!file.set_size(0));
        assert_eq!(file.size().unwrap(), 3);
    }
}
