//! Archive manager: the entry point the FS service layer drives.
//!
//! Owns one factory per registered archive ID code and every archive the
//! guest currently has open. Requests are served synchronously; IPC delays
//! are returned to the caller rather than slept on here.

use crate::archive::{
    ArchiveBackend, ArchiveFactory, ArchiveFormatInfo, ExtSaveDataFactory, ExtSaveDataPath,
};
use crate::directory::DirectoryBackend;
use crate::error::{FsError, Result};
use crate::file::FileBackend;
use crate::path::{ArchivePath, Mode};
use oxidiz3ds_hw::fs::{ArchiveIdCode, MediaType};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Host directories backing the emulated storage media
#[derive(Debug, Clone)]
pub struct FsConfig {
    /// Emulated SD card root
    pub sdmc_dir: PathBuf,
    /// Emulated NAND root
    pub nand_dir: PathBuf,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            sdmc_dir: PathBuf::from("user/sdmc"),
            nand_dir: PathBuf::from("user/nand"),
        }
    }
}

/// Handle the guest uses to refer to an open archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveHandle(pub u64);

pub struct ArchiveManager {
    config: FsConfig,
    id_code_map: HashMap<ArchiveIdCode, Box<dyn ArchiveFactory>>,
    handle_map: HashMap<ArchiveHandle, Box<dyn ArchiveBackend>>,
    next_handle: u64,
}

impl ArchiveManager {
    /// Create a manager with the ExtSaveData archive types registered
    pub fn new(config: FsConfig) -> Self {
        let mut manager = Self {
            config,
            id_code_map: HashMap::new(),
            handle_map: HashMap::new(),
            next_handle: 1,
        };

        let sdmc = ExtSaveDataFactory::new(&manager.config.sdmc_dir, false);
        manager.register_archive_type(Box::new(sdmc), ArchiveIdCode::ExtSaveData);

        let nand = ExtSaveDataFactory::new(&manager.config.nand_dir, true);
        manager.register_archive_type(Box::new(nand), ArchiveIdCode::SharedExtSaveData);

        manager
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn register_archive_type(
        &mut self,
        factory: Box<dyn ArchiveFactory>,
        id_code: ArchiveIdCode,
    ) {
        info!("Registered archive {} with id code {:#010X}", factory.name(), id_code as u32);
        if self.id_code_map.insert(id_code, factory).is_some() {
            warn!("Replaced archive factory for id code {:#010X}", id_code as u32);
        }
    }

    fn factory(&self, id_code: ArchiveIdCode) -> Option<&dyn ArchiveFactory> {
        self.id_code_map.get(&id_code).map(|f| f.as_ref())
    }

    fn archive(&self, handle: ArchiveHandle) -> Result<&dyn ArchiveBackend> {
        self.handle_map
            .get(&handle)
            .map(|a| a.as_ref())
            .ok_or(FsError::InvalidArchiveHandle)
    }

    pub fn open_archive(
        &mut self,
        id_code: ArchiveIdCode,
        archive_path: &ArchivePath,
        program_id: u64,
    ) -> Result<ArchiveHandle> {
        debug!(
            "Opening archive {:#010X} path={}",
            id_code as u32,
            archive_path.debug_str()
        );

        let factory = self.factory(id_code).ok_or(FsError::NotFound)?;
        let backend = factory.open(archive_path, program_id)?;

        let handle = ArchiveHandle(self.next_handle);
        self.next_handle += 1;
        self.handle_map.insert(handle, backend);
        Ok(handle)
    }

    pub fn close_archive(&mut self, handle: ArchiveHandle) -> Result<()> {
        self.handle_map
            .remove(&handle)
            .map(|_| ())
            .ok_or(FsError::InvalidArchiveHandle)
    }

    /// Open a file, returning it along with the IPC open delay in nanoseconds.
    ///
    /// The delay is reported even when the open fails; it is 0 for an
    /// unknown handle.
    pub fn open_file_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
        mode: Mode,
    ) -> (Result<Box<dyn FileBackend>>, u64) {
        let archive = match self.archive(handle) {
            Ok(archive) => archive,
            Err(e) => return (Err(e), 0),
        };
        let open_delay_ns = archive.open_delay_ns();
        (archive.open_file(path, mode), open_delay_ns)
    }

    pub fn delete_file_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
    ) -> Result<()> {
        self.archive(handle)?.delete_file(path)
    }

    pub fn rename_file_between_archives(
        &self,
        src_handle: ArchiveHandle,
        src_path: &ArchivePath,
        dest_handle: ArchiveHandle,
        dest_path: &ArchivePath,
    ) -> Result<()> {
        let src_archive = self.archive(src_handle)?;
        self.archive(dest_handle)?;

        if src_handle != dest_handle {
            // Moving between archives is not supported
            return Err(FsError::Unimplemented);
        }
        src_archive.rename_file(src_path, dest_path)
    }

    pub fn delete_directory_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
    ) -> Result<()> {
        self.archive(handle)?.delete_directory(path)
    }

    pub fn delete_directory_recursively_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
    ) -> Result<()> {
        self.archive(handle)?.delete_directory_recursively(path)
    }

    pub fn create_file_in_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
        file_size: u64,
    ) -> Result<()> {
        self.archive(handle)?.create_file(path, file_size)
    }

    pub fn create_directory_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
    ) -> Result<()> {
        self.archive(handle)?.create_directory(path)
    }

    pub fn rename_directory_between_archives(
        &self,
        src_handle: ArchiveHandle,
        src_path: &ArchivePath,
        dest_handle: ArchiveHandle,
        dest_path: &ArchivePath,
    ) -> Result<()> {
        let src_archive = self.archive(src_handle)?;
        self.archive(dest_handle)?;

        if src_handle != dest_handle {
            return Err(FsError::Unimplemented);
        }
        src_archive.rename_directory(src_path, dest_path)
    }

    pub fn open_directory_from_archive(
        &self,
        handle: ArchiveHandle,
        path: &ArchivePath,
    ) -> Result<Box<dyn DirectoryBackend>> {
        self.archive(handle)?.open_directory(path)
    }

    pub fn archive_free_bytes(&self, handle: ArchiveHandle) -> Result<u64> {
        Ok(self.archive(handle)?.free_bytes())
    }

    pub fn format_archive(
        &self,
        id_code: ArchiveIdCode,
        format_info: &ArchiveFormatInfo,
        path: &ArchivePath,
        program_id: u64,
    ) -> Result<()> {
        let factory = self.factory(id_code).ok_or(FsError::Unimplemented)?;
        factory.format(path, format_info, program_id)
    }

    pub fn get_archive_format_info(
        &self,
        id_code: ArchiveIdCode,
        path: &ArchivePath,
        program_id: u64,
    ) -> Result<ArchiveFormatInfo> {
        let factory = self.factory(id_code).ok_or(FsError::Unimplemented)?;
        factory.format_info(path, program_id)
    }

    /// The ExtSaveData factory serving `media_type`: NAND uses the shared store
    fn ext_save_data_factory(&self, media_type: MediaType) -> Result<&ExtSaveDataFactory> {
        let id_code = match media_type {
            MediaType::Nand => ArchiveIdCode::SharedExtSaveData,
            MediaType::Sdmc | MediaType::GameCard => ArchiveIdCode::ExtSaveData,
        };
        self.factory(id_code)
            .and_then(|f| f.as_ext_save_data())
            .ok_or(FsError::Unimplemented)
    }

    /// Format a new ExtSaveData archive and store its icon
    pub fn create_ext_save_data(
        &self,
        media_type: MediaType,
        high: u32,
        low: u32,
        smdh_icon: &[u8],
        format_info: &ArchiveFormatInfo,
        program_id: u64,
    ) -> Result<()> {
        let path = ExtSaveDataPath::new(media_type as u32, high, low).encode();
        let factory = self.ext_save_data_factory(media_type)?;

        factory.format(&path, format_info, program_id)?;
        factory.write_icon(&path, smdh_icon);
        Ok(())
    }

    /// Remove an ExtSaveData archive with its `user/`, `boss/` and icon
    pub fn delete_ext_save_data(&self, media_type: MediaType, high: u32, low: u32) -> Result<()> {
        if !matches!(media_type, MediaType::Nand | MediaType::Sdmc) {
            warn!("Unsupported media type {:?}", media_type);
            return Err(FsError::UnsupportedMediaType(media_type as u32));
        }

        let path = ExtSaveDataPath::new(media_type as u32, high, low).encode();
        self.ext_save_data_factory(media_type)?.delete(&path)
    }
}
