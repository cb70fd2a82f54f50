//! Extended save data (ExtSaveData and SharedExtSaveData).
//!
//! Behaves like [`SaveDataArchive`] except that files keep the size they were
//! created with: zero-size creation and the create flag on open are refused,
//! and files are always opened read+write.
//!
//! Host layout under the factory's mount point:
//!
//! ```text
//! {high:08X}/{low:08X}/user/      archive contents
//! {high:08X}/{low:08X}/boss/      SpotPass data
//! {high:08X}/{low:08X}/metadata   ArchiveFormatInfo record
//! {high:08X}/{low:08X}/icon       SMDH icon
//! ```
//!
//! # References
//! - <https://www.3dbrew.org/wiki/Extdata>

use super::{
    ArchiveBackend, ArchiveFactory, ArchiveFormatInfo, SaveDataArchive, savedata::FREE_BYTES,
};
use crate::delay::{DelayGenerator, linear_read_delay};
use crate::directory::DirectoryBackend;
use crate::error::{FsError, Result};
use crate::file::{FileBackend, FixSizeDiskFile};
use crate::path::{ArchivePath, Mode};
use crate::path_parser::HostStatus;
use oxidiz3ds_hw::fs::{SDCARD_ID, SYSTEM_ID};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// The FS module rewrites the high ID of every SharedExtSaveData request to this
pub const SHARED_EXTDATA_HIGH: u32 = 0x0004_8000;

// Measured for save data reads; ExtSaveData reads have not been measured
pub const READ_DELAY_SLOPE_NS: u64 = 183;
pub const READ_DELAY_OFFSET_NS: u64 = 524_879;
pub const READ_DELAY_MINIMUM_NS: u64 = 631_826;

/// Average open latency measured on a New 3DS
pub const OPEN_DELAY_NS: u64 = 3_085_068;

/// Size of an encoded [`ExtSaveDataPath`]
pub const EXTSAVEDATA_PATH_SIZE: usize = 12;

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtSaveDataDelayGenerator;

impl DelayGenerator for ExtSaveDataDelayGenerator {
    fn read_delay_ns(&self, length: usize) -> u64 {
        linear_read_delay(
            length,
            READ_DELAY_SLOPE_NS,
            READ_DELAY_OFFSET_NS,
            READ_DELAY_MINIMUM_NS,
        )
    }

    fn open_delay_ns(&self) -> u64 {
        OPEN_DELAY_NS
    }
}

/// Binary archive path identifying one ExtSaveData instance.
///
/// Encoded as three little-endian words: media type, low ID, high ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtSaveDataPath {
    pub media_type: u32,
    pub save_high: u32,
    pub save_low: u32,
}

impl ExtSaveDataPath {
    pub fn new(media_type: u32, save_high: u32, save_low: u32) -> Self {
        Self {
            media_type,
            save_high,
            save_low,
        }
    }

    pub fn to_bytes(&self) -> [u8; EXTSAVEDATA_PATH_SIZE] {
        let mut out = [0u8; EXTSAVEDATA_PATH_SIZE];
        out[0x0..0x4].copy_from_slice(&self.media_type.to_le_bytes());
        out[0x4..0x8].copy_from_slice(&self.save_low.to_le_bytes());
        out[0x8..0xC].copy_from_slice(&self.save_high.to_le_bytes());
        out
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let data: &[u8; EXTSAVEDATA_PATH_SIZE] =
            data.try_into().map_err(|_| FsError::MalformedPath {
                expected: EXTSAVEDATA_PATH_SIZE,
                actual: data.len(),
            })?;
        let word = |at: usize| {
            u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
        };
        Ok(Self {
            media_type: word(0x0),
            save_low: word(0x4),
            save_high: word(0x8),
        })
    }

    /// Encode as a binary [`ArchivePath`]
    pub fn encode(&self) -> ArchivePath {
        ArchivePath::from_binary(self.to_bytes().to_vec())
    }

    /// Decode from an archive path whose binary form must be exactly 12 bytes
    pub fn decode(path: &ArchivePath) -> Result<Self> {
        Self::from_bytes(&path.as_binary())
    }
}

/// `{mount_point}/{high:08X}/{low:08X}` for the archive identified by `path`
pub fn extsavedata_path(mount_point: &Path, path: &ArchivePath) -> Result<PathBuf> {
    let id = ExtSaveDataPath::decode(path)?;
    Ok(mount_point
        .join(format!("{:08X}", id.save_high))
        .join(format!("{:08X}", id.save_low)))
}

/// Root of the extdata tree under a NAND (`shared`) or SD card directory
pub fn extdata_container_path(mount_location: &Path, shared: bool) -> PathBuf {
    if shared {
        mount_location.join("data").join(SYSTEM_ID).join("extdata")
    } else {
        mount_location
            .join("Nintendo 3DS")
            .join(SYSTEM_ID)
            .join(SDCARD_ID)
            .join("extdata")
    }
}

/// Archive backend for one ExtSaveData instance, rooted at its `user/` directory
#[derive(Debug)]
pub struct ExtSaveDataArchive {
    base: SaveDataArchive,
}

impl ExtSaveDataArchive {
    pub fn new(mount_point: impl Into<PathBuf>, delay_generator: Box<dyn DelayGenerator>) -> Self {
        Self {
            base: SaveDataArchive::with_delay_generator(mount_point, delay_generator),
        }
    }

    pub fn mount_point(&self) -> &Path {
        self.base.mount_point()
    }
}

impl ArchiveBackend for ExtSaveDataArchive {
    fn name(&self) -> String {
        format!("ExtSaveDataArchive: {}", self.mount_point().display())
    }

    fn open_file(&self, path: &ArchivePath, mode: Mode) -> Result<Box<dyn FileBackend>> {
        debug!("called path={} mode={:01X}", path.debug_str(), mode.bits());

        if mode.is_empty() {
            warn!("Empty open mode");
            return Err(FsError::UnsupportedOpenFlags);
        }

        if mode.contains(Mode::CREATE) {
            warn!("Create flag is not supported");
            return Err(FsError::UnsupportedOpenFlags);
        }

        let parser = self.base.parse(path)?;
        let mount_point = self.mount_point();
        let full_path = parser.build_host_path(mount_point);

        match parser.host_status(mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    mount_point.display()
                );
                return Err(FsError::FileNotFound);
            }
            HostStatus::PathNotFound => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::FileInPath | HostStatus::DirectoryFound => {
                warn!("Unexpected file or directory in {}", full_path.display());
                return Err(FsError::UnexpectedFileOrDirectory);
            }
            HostStatus::NotFound => {
                warn!("{} not found", full_path.display());
                return Err(FsError::FileNotFound);
            }
            HostStatus::FileFound => {}
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&full_path)
            .map_err(|e| {
                error!(
                    "(unreachable) Unknown error opening {}: {}",
                    full_path.display(),
                    e
                );
                FsError::FileNotFound
            })?;

        // Found files are always exposed read+write, whatever the guest asked for
        let file = FixSizeDiskFile::new(
            file,
            Mode::READ | Mode::WRITE,
            Box::new(ExtSaveDataDelayGenerator),
        )?;
        Ok(Box::new(file))
    }

    fn delete_file(&self, path: &ArchivePath) -> Result<()> {
        self.base.delete_file(path)
    }

    fn rename_file(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()> {
        self.base.rename_file(src_path, dest_path)
    }

    fn delete_directory(&self, path: &ArchivePath) -> Result<()> {
        self.base.delete_directory(path)
    }

    fn delete_directory_recursively(&self, path: &ArchivePath) -> Result<()> {
        self.base.delete_directory_recursively(path)
    }

    fn create_file(&self, path: &ArchivePath, size: u64) -> Result<()> {
        if size == 0 {
            warn!("Zero-size file is not supported");
            return Err(FsError::UnsupportedOpenFlags);
        }
        self.base.create_file(path, size)
    }

    fn create_directory(&self, path: &ArchivePath) -> Result<()> {
        self.base.create_directory(path)
    }

    fn rename_directory(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()> {
        self.base.rename_directory(src_path, dest_path)
    }

    fn open_directory(&self, path: &ArchivePath) -> Result<Box<dyn DirectoryBackend>> {
        self.base.open_directory(path)
    }

    fn free_bytes(&self) -> u64 {
        FREE_BYTES
    }

    fn open_delay_ns(&self) -> u64 {
        self.base.open_delay_ns()
    }
}

/// Opens and formats ExtSaveData archives below one NAND or SD card directory
#[derive(Debug)]
pub struct ExtSaveDataFactory {
    shared: bool,
    mount_point: PathBuf,
}

impl ExtSaveDataFactory {
    /// `mount_location` is the NAND directory for the shared store, the SD
    /// card directory otherwise
    pub fn new(mount_location: &Path, shared: bool) -> Self {
        let mount_point = extdata_container_path(mount_location, shared);
        debug!(
            "Directory {} set as base for ExtSaveData.",
            mount_point.display()
        );
        Self {
            shared,
            mount_point,
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// The path the FS module actually uses for `path`.
    ///
    /// Shared extdata aliases every request onto [`SHARED_EXTDATA_HIGH`].
    pub fn corrected_path(&self, path: &ArchivePath) -> Result<ArchivePath> {
        if !self.shared {
            return Ok(path.clone());
        }

        let mut id = ExtSaveDataPath::decode(path)?;
        id.save_high = SHARED_EXTDATA_HIGH;
        Ok(id.encode())
    }

    /// Host directory holding the archive identified by `path`
    fn archive_root(&self, path: &ArchivePath) -> Result<PathBuf> {
        extsavedata_path(&self.mount_point, &self.corrected_path(path)?)
    }

    /// Store the SMDH icon next to the archive. Failures are only logged.
    pub fn write_icon(&self, path: &ArchivePath, icon: &[u8]) {
        let icon_path = match self.archive_root(path) {
            Ok(root) => root.join("icon"),
            Err(e) => {
                warn!("Cannot write icon for {}: {}", path.debug_str(), e);
                return;
            }
        };

        if let Err(e) = fs::write(&icon_path, icon) {
            warn!("Failed to write icon {}: {}", icon_path.display(), e);
        }
    }

    /// Remove the archive identified by `path` and everything in it
    pub fn delete(&self, path: &ArchivePath) -> Result<()> {
        let root = self.archive_root(path)?;
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        Ok(())
    }
}

impl ArchiveFactory for ExtSaveDataFactory {
    fn name(&self) -> String {
        if self.is_shared() {
            "SharedExtSaveData".to_string()
        } else {
            "ExtSaveData".to_string()
        }
    }

    fn open(&self, path: &ArchivePath, _program_id: u64) -> Result<Box<dyn ArchiveBackend>> {
        let full_path = self.archive_root(path)?.join("user");
        if !full_path.exists() {
            warn!("ExtSaveData {} does not exist", full_path.display());
            // The shared store is provisioned by formatting, so absence reads
            // as "not formatted" rather than "not found"
            return Err(if self.shared {
                FsError::NotFormatted
            } else {
                FsError::NotFoundInvalidState
            });
        }

        Ok(Box::new(ExtSaveDataArchive::new(
            full_path,
            Box::new(ExtSaveDataDelayGenerator),
        )))
    }

    fn format(
        &self,
        path: &ArchivePath,
        format_info: &ArchiveFormatInfo,
        _program_id: u64,
    ) -> Result<()> {
        let root = self.archive_root(path)?;

        // Both are always present once the archive exists
        fs::create_dir_all(root.join("user"))?;
        fs::create_dir_all(root.join("boss"))?;

        let metadata_path = root.join("metadata");
        let mut file = File::create(&metadata_path).map_err(|e| {
            error!(
                "Could not create metadata {}: {}",
                metadata_path.display(),
                e
            );
            FsError::Io(e)
        })?;
        file.write_all(&format_info.to_bytes())?;
        Ok(())
    }

    fn format_info(&self, path: &ArchivePath, _program_id: u64) -> Result<ArchiveFormatInfo> {
        let metadata_path = self.archive_root(path)?.join("metadata");
        let data = fs::read(&metadata_path).map_err(|e| {
            warn!(
                "Could not open metadata information for archive {}: {}",
                metadata_path.display(),
                e
            );
            FsError::NotFormatted
        })?;

        ArchiveFormatInfo::from_bytes(&data).ok_or_else(|| {
            warn!("Truncated metadata {}", metadata_path.display());
            FsError::NotFormatted
        })
    }

    fn as_ext_save_data(&self) -> Option<&ExtSaveDataFactory> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::LowPathType;
    use oxidiz3ds_hw::result::RESULT_UNKNOWN;

    const INFO: ArchiveFormatInfo = ArchiveFormatInfo {
        total_size: 0x10_0000,
        number_directories: 10,
        number_files: 20,
        duplicate_data: 0,
    };

    fn id(high: u32, low: u32) -> ArchivePath {
        ExtSaveDataPath::new(1, high, low).encode()
    }

    #[test]
    fn path_codec_layout() {
        let path = ExtSaveDataPath::new(1, 0x0000_0002, 0x0000_0003);
        assert_eq!(path.to_bytes(), [1, 0, 0, 0, 3, 0, 0, 0, 2, 0, 0, 0]);

        for (m, h, l) in [(0, 0, 0), (1, 0x48000, 0xF000_000B), (u32::MAX, 7, u32::MAX)] {
            let original = ExtSaveDataPath::new(m, h, l);
            assert_eq!(ExtSaveDataPath::decode(&original.encode()).unwrap(), original);
        }
    }

    #[test]
    fn char_typed_archive_path_decodes() {
        let id = ExtSaveDataPath::new(0, SHARED_EXTDATA_HIGH, 0xF000_000B);
        let mut raw = id.to_bytes().to_vec();
        raw.push(0);

        let path = ArchivePath::new(LowPathType::Char, &raw);
        assert_eq!(ExtSaveDataPath::decode(&path).unwrap(), id);
    }

    #[test]
    fn decode_rejects_wrong_sizes() {
        for len in [0usize, 11, 13, 16] {
            let path = ArchivePath::from_binary(vec![0u8; len]);
            let err = ExtSaveDataPath::decode(&path).unwrap_err();
            assert!(matches!(
                err,
                FsError::MalformedPath { expected: 12, actual } if actual == len
            ));
        }
    }

    #[test]
    fn delay_constants() {
        let delay = ExtSaveDataDelayGenerator;
        assert_eq!(delay.read_delay_ns(0), 631_826);
        assert_eq!(delay.read_delay_ns(1_000), 1_000 * 183 + 524_879);
        assert_eq!(delay.open_delay_ns(), 3_085_068);
    }

    #[test]
    fn shared_path_is_aliased() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ExtSaveDataFactory::new(dir.path(), true);
        let per_title = ExtSaveDataFactory::new(dir.path(), false);

        for (m, h, l) in [(0, 0, 0xE0000000), (1, 0xFFFF_FFFF, 5)] {
            let original = ExtSaveDataPath::new(m, h, l).encode();
            let corrected = shared.corrected_path(&original).unwrap();
            let corrected = ExtSaveDataPath::decode(&corrected).unwrap();
            assert_eq!(corrected, ExtSaveDataPath::new(m, SHARED_EXTDATA_HIGH, l));
            assert_eq!(per_title.corrected_path(&original).unwrap(), original);
        }
    }

    #[test]
    fn container_paths() {
        let root = Path::new("/root");
        assert_eq!(
            extdata_container_path(root, true),
            PathBuf::from(format!("/root/data/{SYSTEM_ID}/extdata"))
        );
        assert_eq!(
            extdata_container_path(root, false),
            PathBuf::from(format!("/root/Nintendo 3DS/{SYSTEM_ID}/{SDCARD_ID}/extdata"))
        );
    }

    #[test]
    fn open_unformatted_archive() {
        let dir = tempfile::tempdir().unwrap();
        let shared = ExtSaveDataFactory::new(dir.path(), true);
        let per_title = ExtSaveDataFactory::new(dir.path(), false);

        assert!(matches!(
            per_title.open(&id(0, 0x1234), 0),
            Err(FsError::NotFoundInvalidState)
        ));
        assert!(matches!(
            shared.open(&id(0, 0x1234), 0),
            Err(FsError::NotFormatted)
        ));
        assert!(matches!(
            shared.format_info(&id(0, 0x1234), 0),
            Err(FsError::NotFormatted)
        ));
        assert_eq!(shared.name(), "SharedExtSaveData");
        assert_eq!(per_title.name(), "ExtSaveData");
    }

    #[test]
    fn format_creates_layout_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ExtSaveDataFactory::new(dir.path(), false);
        let path = id(0, 0x1234);

        factory.format(&path, &INFO, 0).unwrap();
        let root = factory.mount_point().join("00000000").join("00001234");
        assert!(root.join("user").is_dir());
        assert!(root.join("boss").is_dir());
        assert_eq!(fs::read(root.join("metadata")).unwrap(), INFO.to_bytes());
        assert_eq!(factory.format_info(&path, 0).unwrap(), INFO);

        factory.write_icon(&path, b"SMDH");
        assert_eq!(fs::read(root.join("icon")).unwrap(), b"SMDH");

        factory.delete(&path).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn unwritable_metadata_is_a_generic_failure() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ExtSaveDataFactory::new(dir.path(), false);
        let path = id(0, 0x77);
        let root = factory.mount_point().join("00000000").join("00000077");
        fs::create_dir_all(root.join("metadata")).unwrap();

        let err = factory.format(&path, &INFO, 0).unwrap_err();
        assert!(matches!(err, FsError::Io(_)));
        assert_eq!(err.result_code(), RESULT_UNKNOWN);
        assert!(root.join("user").is_dir());
    }

    #[test]
    fn archive_file_rules() {
        let dir = tempfile::tempdir().unwrap();
        let factory = ExtSaveDataFactory::new(dir.path(), false);
        let path = id(0, 0x1234);
        factory.format(&path, &INFO, 0).unwrap();
        let archive = factory.open(&path, 0).unwrap();
        assert!(archive.name().starts_with("ExtSaveDataArchive: "));
        assert_eq!(archive.open_delay_ns(), OPEN_DELAY_NS);

        let file = ArchivePath::from("/data.bin");
        assert!(matches!(
            archive.create_file(&file, 0),
            Err(FsError::UnsupportedOpenFlags)
        ));
        archive.create_file(&file, 1).unwrap();
        assert!(matches!(
            archive.open_file(&file, Mode::READ | Mode::WRITE | Mode::CREATE),
            Err(FsError::UnsupportedOpenFlags)
        ));
        assert!(matches!(
            archive.open_file(&ArchivePath::from("bogus"), Mode::CREATE),
            Err(FsError::UnsupportedOpenFlags)
        ));
        assert!(matches!(
            archive.open_file(&file, Mode::empty()),
            Err(FsError::UnsupportedOpenFlags)
        ));

        // Read-only request still yields a writable file
        let mut handle = archive.open_file(&file, Mode::READ).unwrap();
        assert_eq!(handle.write(0, b"xyz", true).unwrap(), 1);
        assert!(!handle.set_size(10));
        assert_eq!(handle.size().unwrap(), 1);
    }

    #[test]
    fn open_file_resolution_errors() {
        let dir = tempfile::tempdir().unwrap();
        let archive =
            ExtSaveDataArchive::new(dir.path(), Box::new(ExtSaveDataDelayGenerator));
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("f"), b"x").unwrap();

        let open = |s: &str| archive.open_file(&ArchivePath::from(s), Mode::READ);
        assert!(matches!(open("/missing"), Err(FsError::FileNotFound)));
        assert!(matches!(open("/nope/f"), Err(FsError::PathNotFound)));
        assert!(matches!(open("/sub"), Err(FsError::UnexpectedFileOrDirectory)));
        assert!(matches!(open("/f/x"), Err(FsError::UnexpectedFileOrDirectory)));
        assert!(matches!(open("no-slash"), Err(FsError::InvalidPath)));

        let gone = ExtSaveDataArchive::new(
            dir.path().join("gone"),
            Box::new(ExtSaveDataDelayGenerator),
        );
        assert!(matches!(
            gone.open_file(&ArchivePath::from("/f"), Mode::READ),
            Err(FsError::FileNotFound)
        ));
    }
}
