//! Errors returned by archive, file and directory backends.
//!
//! Every variant corresponds to a result code the FS service hands back to the
//! guest. Guest software branches on these, so two conditions that the console
//! reports differently must never share a variant.

use oxidiz3ds_hw::result::{self, ResultCode, fs as codes};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// A binary archive path did not have the size its archive class requires
    #[error("malformed archive path: expected {expected} bytes, got {actual}")]
    MalformedPath { expected: usize, actual: usize },

    #[error("invalid path")]
    InvalidPath,

    #[error("unsupported open flags")]
    UnsupportedOpenFlags,

    /// The file was opened without the permission the operation needs
    #[error("invalid open flags")]
    InvalidOpenFlags,

    #[error("file not found")]
    FileNotFound,

    #[error("path not found")]
    PathNotFound,

    #[error("not found")]
    NotFound,

    /// The archive does not exist and is not in a formattable state
    #[error("not found (invalid state)")]
    NotFoundInvalidState,

    #[error("unexpected file or directory")]
    UnexpectedFileOrDirectory,

    #[error("file already exists")]
    FileAlreadyExists,

    #[error("directory already exists")]
    DirectoryAlreadyExists,

    #[error("directory not empty")]
    DirectoryNotEmpty,

    #[error("archive not formatted")]
    NotFormatted,

    #[error("write beyond end of fixed-size file")]
    WriteBeyondEnd,

    #[error("file too large")]
    TooLarge,

    /// The host refused a rename or directory creation
    #[error("operation canceled")]
    Canceled,

    #[error("invalid archive handle")]
    InvalidArchiveHandle,

    #[error("operation not implemented for this archive")]
    Unimplemented,

    #[error("unsupported media type {0}")]
    UnsupportedMediaType(u32),

    #[error("host I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FsError {
    /// The console result code reported to the guest for this error
    pub fn result_code(&self) -> ResultCode {
        match self {
            FsError::MalformedPath { .. } | FsError::InvalidPath => codes::ERROR_INVALID_PATH,
            FsError::UnsupportedOpenFlags => codes::ERROR_UNSUPPORTED_OPEN_FLAGS,
            FsError::InvalidOpenFlags => codes::ERROR_INVALID_OPEN_FLAGS,
            FsError::FileNotFound => codes::ERROR_FILE_NOT_FOUND,
            FsError::PathNotFound => codes::ERROR_PATH_NOT_FOUND,
            FsError::NotFound => codes::ERROR_NOT_FOUND,
            FsError::NotFoundInvalidState => codes::ERROR_NOT_FOUND_INVALID_STATE,
            FsError::UnexpectedFileOrDirectory => codes::ERROR_UNEXPECTED_FILE_OR_DIRECTORY,
            FsError::FileAlreadyExists => codes::ERROR_FILE_ALREADY_EXISTS,
            FsError::DirectoryAlreadyExists => codes::ERROR_DIRECTORY_ALREADY_EXISTS,
            FsError::DirectoryNotEmpty => codes::ERROR_DIRECTORY_NOT_EMPTY,
            FsError::NotFormatted => codes::ERROR_NOT_FORMATTED,
            FsError::WriteBeyondEnd => codes::ERROR_WRITE_BEYOND_END,
            FsError::TooLarge => codes::ERROR_TOO_LARGE,
            FsError::Canceled => codes::ERROR_CANCELED,
            FsError::InvalidArchiveHandle => codes::ERROR_INVALID_ARCHIVE_HANDLE,
            FsError::Unimplemented => codes::ERROR_UNIMPLEMENTED,
            FsError::UnsupportedMediaType(_) | FsError::Io(_) => result::RESULT_UNKNOWN,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_failures_use_generic_code() {
        let err = FsError::from(std::io::Error::other("disk full"));
        assert_eq!(err.result_code(), result::RESULT_UNKNOWN);
        assert_eq!(FsError::UnsupportedMediaType(2).result_code().raw(), u32::MAX);
    }

    #[test]
    fn missing_archive_codes_differ_by_summary() {
        let not_found = FsError::NotFound.result_code();
        let invalid_state = FsError::NotFoundInvalidState.result_code();
        assert_eq!(not_found.description(), invalid_state.description());
        assert_ne!(not_found, invalid_state);
    }
}
