//! Generic save data archive: a directory tree on the host, one file per
//! guest file.

use super::ArchiveBackend;
use crate::delay::{DelayGenerator, linear_read_delay};
use crate::directory::{DirectoryBackend, DiskDirectory};
use crate::error::{FsError, Result};
use crate::file::{DiskFile, FileBackend};
use crate::path::{ArchivePath, Mode};
use crate::path_parser::{HostStatus, PathParser};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

// Measured on hardware for save data reads
pub const READ_DELAY_SLOPE_NS: u64 = 183;
pub const READ_DELAY_OFFSET_NS: u64 = 524_879;
pub const READ_DELAY_MINIMUM_NS: u64 = 631_826;

/// Measured on hardware for opening a save data file
pub const OPEN_DELAY_NS: u64 = 269_082;

/// Free space reported for every save data archive (1 GiB)
pub const FREE_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct SaveDataDelayGenerator;

impl DelayGenerator for SaveDataDelayGenerator {
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

/// Archive backend for save data style archives rooted at `mount_point`
#[derive(Debug)]
pub struct SaveDataArchive {
    mount_point: PathBuf,
    delay_generator: Box<dyn DelayGenerator>,
}

impl SaveDataArchive {
    pub fn new(mount_point: impl Into<PathBuf>) -> Self {
        Self::with_delay_generator(mount_point, Box::new(SaveDataDelayGenerator))
    }

    pub fn with_delay_generator(
        mount_point: impl Into<PathBuf>,
        delay_generator: Box<dyn DelayGenerator>,
    ) -> Self {
        Self {
            mount_point: mount_point.into(),
            delay_generator,
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Parse `path`, rejecting it if it is structurally invalid
    pub(crate) fn parse(&self, path: &ArchivePath) -> Result<PathParser> {
        let parser = PathParser::new(path);
        if !parser.is_valid() {
            warn!("Invalid path {}", path.debug_str());
            return Err(FsError::InvalidPath);
        }
        Ok(parser)
    }

    fn delete_directory_with(
        &self,
        path: &ArchivePath,
        deleter: impl FnOnce(&Path) -> io::Result<()>,
    ) -> Result<()> {
        let parser = self.parse(path)?;

        if parser.is_root_directory() {
            return Err(FsError::DirectoryNotEmpty);
        }

        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
                );
                return Err(FsError::PathNotFound);
            }
            HostStatus::PathNotFound | HostStatus::NotFound => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::FileInPath | HostStatus::FileFound => {
                warn!("Unexpected file in {}", full_path.display());
                return Err(FsError::UnexpectedFileOrDirectory);
            }
            HostStatus::DirectoryFound => {}
        }

        deleter(&full_path).map_err(|e| {
            warn!("Directory not empty {}: {}", full_path.display(), e);
            FsError::DirectoryNotEmpty
        })
    }

    fn rename(&self, kind: &str, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()> {
        let src = self.parse(src_path)?.build_host_path(&self.mount_point);
        let dest = self.parse(dest_path)?.build_host_path(&self.mount_point);

        fs::rename(&src, &dest).map_err(|e| {
            warn!(
                "Failed to rename {} {} to {}: {}",
                kind,
                src.display(),
                dest.display(),
                e
            );
            FsError::Canceled
        })
    }
}

impl ArchiveBackend for SaveDataArchive {
    fn name(&self) -> String {
        format!("SaveDataArchive: {}", self.mount_point.display())
    }

    fn open_file(&self, path: &ArchivePath, mode: Mode) -> Result<Box<dyn FileBackend>> {
        debug!("called path={} mode={:01X}", path.debug_str(), mode.bits());

        let parser = self.parse(path)?;

        if mode.is_empty() {
            warn!("Empty open mode");
            return Err(FsError::UnsupportedOpenFlags);
        }

        if mode.contains(Mode::CREATE) && !mode.contains(Mode::WRITE) {
            warn!("Create flag set but write flag not set");
            return Err(FsError::UnsupportedOpenFlags);
        }

        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
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
                if !mode.contains(Mode::CREATE) {
                    warn!(
                        "Non-existing file {} can't be opened without mode create",
                        full_path.display()
                    );
                    return Err(FsError::FileNotFound);
                }
                File::create(&full_path)?;
            }
            HostStatus::FileFound => {}
        }

        let file = OpenOptions::new()
            .read(true)
            .write(mode.contains(Mode::WRITE))
            .open(&full_path)
            .map_err(|e| {
                error!(
                    "(unreachable) Unknown error opening {}: {}",
                    full_path.display(),
                    e
                );
                FsError::FileNotFound
            })?;

        Ok(Box::new(DiskFile::new(
            file,
            mode,
            Box::new(SaveDataDelayGenerator),
        )))
    }

    fn delete_file(&self, path: &ArchivePath) -> Result<()> {
        let parser = self.parse(path)?;
        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
                );
                return Err(FsError::FileNotFound);
            }
            HostStatus::PathNotFound => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::FileInPath | HostStatus::NotFound => {
                warn!("File not found {}", full_path.display());
                return Err(FsError::FileNotFound);
            }
            HostStatus::DirectoryFound => {
                warn!("Unexpected directory {}", full_path.display());
                return Err(FsError::UnexpectedFileOrDirectory);
            }
            HostStatus::FileFound => {}
        }

        fs::remove_file(&full_path).map_err(|e| {
            error!(
                "(unreachable) Unknown error deleting {}: {}",
                full_path.display(),
                e
            );
            FsError::FileNotFound
        })
    }

    fn rename_file(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()> {
        self.rename("file", src_path, dest_path)
    }

    fn delete_directory(&self, path: &ArchivePath) -> Result<()> {
        self.delete_directory_with(path, |p| fs::remove_dir(p))
    }

    fn delete_directory_recursively(&self, path: &ArchivePath) -> Result<()> {
        self.delete_directory_with(path, |p| fs::remove_dir_all(p))
    }

    fn create_file(&self, path: &ArchivePath, size: u64) -> Result<()> {
        debug!("called path={} size={:#X}", path.debug_str(), size);

        let parser = self.parse(path)?;
        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
                );
                return Err(FsError::FileNotFound);
            }
            HostStatus::PathNotFound => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::FileInPath => {
                warn!("Unexpected file in path {}", full_path.display());
                return Err(FsError::UnexpectedFileOrDirectory);
            }
            HostStatus::DirectoryFound | HostStatus::FileFound => {
                warn!("{} already exists", full_path.display());
                return Err(FsError::FileAlreadyExists);
            }
            HostStatus::NotFound => {}
        }

        let file = File::create(&full_path)?;
        if size == 0 {
            return Ok(());
        }

        // Extending the length leaves a sparse file where the host supports it
        file.set_len(size).map_err(|e| {
            warn!("Too large file {} ({:#X} bytes): {}", full_path.display(), size, e);
            FsError::TooLarge
        })
    }

    fn create_directory(&self, path: &ArchivePath) -> Result<()> {
        let parser = self.parse(path)?;
        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
                );
                return Err(FsError::FileNotFound);
            }
            HostStatus::PathNotFound | HostStatus::FileInPath => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::DirectoryFound | HostStatus::FileFound => {
                warn!("{} already exists", full_path.display());
                return Err(FsError::DirectoryAlreadyExists);
            }
            HostStatus::NotFound => {}
        }

        fs::create_dir(&full_path).map_err(|e| {
            error!(
                "(unreachable) Unknown error creating {}: {}",
                full_path.display(),
                e
            );
            FsError::Canceled
        })
    }

    fn rename_directory(&self, src_path: &ArchivePath, dest_path: &ArchivePath) -> Result<()> {
        self.rename("directory", src_path, dest_path)
    }

    fn open_directory(&self, path: &ArchivePath) -> Result<Box<dyn DirectoryBackend>> {
        let parser = self.parse(path)?;
        let full_path = parser.build_host_path(&self.mount_point);

        match parser.host_status(&self.mount_point) {
            HostStatus::InvalidMountPoint => {
                error!(
                    "(unreachable) Invalid mount point {}",
                    self.mount_point.display()
                );
                return Err(FsError::FileNotFound);
            }
            HostStatus::PathNotFound | HostStatus::NotFound => {
                warn!("Path not found {}", full_path.display());
                return Err(FsError::PathNotFound);
            }
            HostStatus::FileInPath | HostStatus::FileFound => {
                warn!("Unexpected file in {}", full_path.display());
                return Err(FsError::UnexpectedFileOrDirectory);
            }
            HostStatus::DirectoryFound => {}
        }

        Ok(Box::new(DiskDirectory::open(&full_path)?))
    }

    fn free_bytes(&self) -> u64 {
        FREE_BYTES
    }

    fn open_delay_ns(&self) -> u64 {
        self.delay_generator.open_delay_ns()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive() -> (tempfile::TempDir, SaveDataArchive) {
        let dir = tempfile::tempdir().unwrap();
        let archive = SaveDataArchive::new(dir.path());
        (dir, archive)
    }

    fn p(s: &str) -> ArchivePath {
        ArchivePath::from(s)
    }

    #[test]
    fn create_file_makes_file_of_requested_size() {
        let (dir, archive) = archive();
        archive.create_file(&p("/empty"), 0).unwrap();
        archive.create_file(&p("/big"), 0x1000).unwrap();
        assert_eq!(fs::metadata(dir.path().join("empty")).unwrap().len(), 0);
        assert_eq!(fs::metadata(dir.path().join("big")).unwrap().len(), 0x1000);

        assert!(matches!(
            archive.create_file(&p("/big"), 1),
            Err(FsError::FileAlreadyExists)
        ));
        assert!(matches!(
            archive.create_file(&p("/missing/file"), 1),
            Err(FsError::PathNotFound)
        ));
        assert!(matches!(
            archive.create_file(&p("/big/file"), 1),
            Err(FsError::UnexpectedFileOrDirectory)
        ));
        assert!(matches!(
            archive.create_file(&p("relative"), 1),
            Err(FsError::InvalidPath)
        ));
    }

    #[test]
    fn open_file_mode_rules() {
        let (dir, archive) = archive();
        assert!(matches!(
            archive.open_file(&p("/a"), Mode::empty()),
            Err(FsError::UnsupportedOpenFlags)
        ));
        assert!(matches!(
            archive.open_file(&p("/a"), Mode::READ | Mode::CREATE),
            Err(FsError::UnsupportedOpenFlags)
        ));
        assert!(matches!(
            archive.open_file(&p("/a"), Mode::READ),
            Err(FsError::FileNotFound)
        ));

        let mut file = archive
            .open_file(&p("/a"), Mode::WRITE | Mode::CREATE)
            .unwrap();
        assert_eq!(file.write(0, b"data", true).unwrap(), 4);
        assert!(dir.path().join("a").is_file());

        let mut file = archive.open_file(&p("/a"), Mode::READ).unwrap();
        assert!(matches!(
            file.write(0, b"x", false),
            Err(FsError::InvalidOpenFlags)
        ));
        assert_eq!(file.read_delay_ns(0), READ_DELAY_MINIMUM_NS);
        assert_eq!(archive.open_delay_ns(), OPEN_DELAY_NS);
    }

    #[test]
    fn delete_file_distinguishes_entries() {
        let (dir, archive) = archive();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("f"), b"x").unwrap();

        assert!(matches!(
            archive.delete_file(&p("/sub")),
            Err(FsError::UnexpectedFileOrDirectory)
        ));
        assert!(matches!(
            archive.delete_file(&p("/nope")),
            Err(FsError::FileNotFound)
        ));
        assert!(matches!(
            archive.delete_file(&p("/nope/f")),
            Err(FsError::PathNotFound)
        ));
        archive.delete_file(&p("/f")).unwrap();
        assert!(!dir.path().join("f").exists());
    }

    #[test]
    fn directory_lifecycle() {
        let (dir, archive) = archive();
        archive.create_directory(&p("/d")).unwrap();
        assert!(matches!(
            archive.create_directory(&p("/d")),
            Err(FsError::DirectoryAlreadyExists)
        ));
        archive.create_file(&p("/d/f"), 4).unwrap();

        let mut listing = archive.open_directory(&p("/d")).unwrap();
        let entries = listing.read(8);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name(), "f");

        assert!(matches!(
            archive.delete_directory(&p("/d")),
            Err(FsError::DirectoryNotEmpty)
        ));
        assert!(matches!(
            archive.delete_directory(&p("/")),
            Err(FsError::DirectoryNotEmpty)
        ));
        archive.rename_directory(&p("/d"), &p("/e")).unwrap();
        archive.delete_directory_recursively(&p("/e")).unwrap();
        assert!(!dir.path().join("e").exists());
        assert!(matches!(
            archive.open_directory(&p("/e")),
            Err(FsError::PathNotFound)
        ));
    }

    #[test]
    fn rename_of_missing_file_is_canceled() {
        let (_dir, archive) = archive();
        assert!(matches!(
            archive.rename_file(&p("/a"), &p("/b")),
            Err(FsError::Canceled)
        ));
        assert_eq!(archive.free_bytes(), FREE_BYTES);
    }

    #[test]
    fn missing_mount_point_is_reported_as_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let archive = SaveDataArchive::new(dir.path().join("gone"));
        assert!(matches!(
            archive.open_file(&p("/a"), Mode::READ),
            Err(FsError::FileNotFound)
        ));
        assert!(archive.name().starts_with("SaveDataArchive: "));
    }
}
