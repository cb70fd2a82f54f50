//! Archive backends and the factories that open them.
//!
//! An archive is a guest-visible filesystem namespace mapped onto a host
//! directory. Each archive class supplies a factory (which locates or formats
//! archive instances) and a backend (which serves file and directory requests
//! inside one instance).
//!
//! # References
//! - <https://www.3dbrew.org/wiki/FS:OpenArchive>

use crate::directory::DirectoryBackend;
use crate::error::Result;
use crate::file::FileBackend;
use crate::path::{ArchivePath, Mode};
use std::fmt;

pub mod extsavedata;
pub mod savedata;

pub use extsavedata::{ExtSaveDataArchive, ExtSaveDataFactory, ExtSaveDataPath};
pub use savedata::SaveDataArchive;

/// Size of an encoded [`ArchiveFormatInfo`]
pub const FORMAT_INFO_SIZE: usize = 16;

/// Limits recorded when an archive is formatted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveFormatInfo {
    /// Total size of the archive in bytes
    pub total_size: u32,
    /// Maximum number of directories
    pub number_directories: u32,
    /// Maximum number of files
    pub number_files: u32,
    /// Whether the archive keeps a duplicate copy of its data
    pub duplicate_data: u8,
}

impl ArchiveFormatInfo {
    /// Encode as the on-disk `metadata` record. The last 3 bytes are padding.
    pub fn to_bytes(&self) -> [u8; FORMAT_INFO_SIZE] {
        let mut out = [0u8; FORMAT_INFO_SIZE];
        out[0x0..0x4].copy_from_slice(&self.total_size.to_le_bytes());
        out[0x4..0x8].copy_from_slice(&self.number_directories.to_le_bytes());
        out[0x8..0xC].copy_from_slice(&self.number_files.to_le_bytes());
        out[0xC] = self.duplicate_data;
        out
    }

    /// Decode a `metadata` record; `None` if it is too short
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < FORMAT_INFO_SIZE {
            return None;
        }
        let word = |at: usize| {
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        Some(Self {
            total_size: word(0x0),
            number_directories: word(0x4),
            number_files: word(0x8),
            duplicate_data: data[0xC],
        })
    }
}

/// Operations on one opened archive instance
pub trait ArchiveBackend: fmt::Debug + Send {
    /// Name used in log messages
    fn name(&self) -> String;

    fn open_file(&self, path: &ArchivePath, mode: Mode) -> Result<Box<dyn FileBackend>>;

    fn delete_file(&self, path: &ArchivePath) -> Result<()>;

    fn rename_file(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()>;

    /// Delete an empty directory
    fn delete_directory(&self, path: &ArchivePath) -> Result<()>;

    fn delete_directory_recursively(&self, path: &ArchivePath) -> Result<()>;

    /// Create a file of `size` bytes
    fn create_file(&self, path: &ArchivePath, size: u64) -> Result<()>;

    fn create_directory(&self, path: &ArchivePath) -> Result<()>;

    fn rename_directory(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()>;

    fn open_directory(&self, path: &ArchivePath) -> Result<Box<dyn DirectoryBackend>>;

    /// Free space reported to the guest
    fn free_bytes(&self) -> u64;

    /// IPC delay for opening a file in this archive
    fn open_delay_ns(&self) -> u64;
}

/// Locates, opens and formats instances of one archive class
pub trait ArchiveFactory: fmt::Debug + Send {
    fn name(&self) -> String;

    fn open(&self, path: &ArchivePath, program_id: u64) -> Result<Box<dyn ArchiveBackend>>;

    fn format(
        &self,
        path: &ArchivePath,
        format_info: &ArchiveFormatInfo,
        program_id: u64,
    ) -> Result<()>;

    fn format_info(&self, path: &ArchivePath, program_id: u64) -> Result<ArchiveFormatInfo>;

    /// Downcast for the operations only ExtSaveData supports
    fn as_ext_save_data(&self) -> Option<&ExtSaveDataFactory> {
        None
    }
}
