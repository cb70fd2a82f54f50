pub mod archive;
pub mod args;
pub mod core;
pub mod delay;
pub mod directory;
pub mod error;
pub mod file;
pub mod path;
pub mod path_parser;

// Re-export commonly used types
pub use archive::{
    ArchiveBackend, ArchiveFactory, ArchiveFormatInfo, ExtSaveDataArchive, ExtSaveDataFactory,
    ExtSaveDataPath, SaveDataArchive,
};
pub use args::{Args, Command};
pub use core::{ArchiveHandle, ArchiveManager, FsConfig};
pub use delay::DelayGenerator;
pub use directory::{DirectoryBackend, Entry};
pub use error::{FsError, Result};
pub use file::FileBackend;
pub use path::{ArchivePath, LowPathType, Mode};
pub use path_parser::{HostStatus, PathParser};
