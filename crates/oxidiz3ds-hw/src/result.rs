//! Result codes returned by 3DS system services.
//!
//! A result code packs four fields into a single `u32`:
//!
//! | bits  | field       |
//! |-------|-------------|
//! | 0-9   | description |
//! | 10-17 | module      |
//! | 21-26 | summary     |
//! | 27-31 | level       |
//!
//! # References
//! - <https://www.3dbrew.org/wiki/Error_codes>

use std::fmt;

/// Module that produced a result code
pub mod module {
    pub const COMMON: u8 = 0;
    pub const KERNEL: u8 = 1;
    /// File server (FS)
    pub const FS: u8 = 17;
}

/// Broad classification of a failure
pub mod summary {
    pub const SUCCESS: u8 = 0;
    pub const NOTHING_HAPPENED: u8 = 1;
    pub const WOULD_BLOCK: u8 = 2;
    pub const OUT_OF_RESOURCE: u8 = 3;
    pub const NOT_FOUND: u8 = 4;
    pub const INVALID_STATE: u8 = 5;
    pub const NOT_SUPPORTED: u8 = 6;
    pub const INVALID_ARGUMENT: u8 = 7;
    pub const WRONG_ARGUMENT: u8 = 8;
    pub const CANCELED: u8 = 9;
    pub const STATUS_CHANGED: u8 = 10;
    pub const INTERNAL: u8 = 11;
}

/// Severity of a failure
pub mod level {
    pub const SUCCESS: u8 = 0;
    pub const INFO: u8 = 1;
    pub const STATUS: u8 = 25;
    pub const TEMPORARY: u8 = 26;
    pub const PERMANENT: u8 = 27;
    pub const USAGE: u8 = 28;
    pub const REINITIALIZE: u8 = 29;
    pub const RESET: u8 = 30;
    pub const FATAL: u8 = 31;
}

/// Description values used by the FS module
pub mod description {
    pub const SUCCESS: u16 = 0;
    pub const ARCHIVE_NOT_MOUNTED: u16 = 101;
    pub const FILE_NOT_FOUND: u16 = 112;
    pub const PATH_NOT_FOUND: u16 = 113;
    pub const NOT_FOUND: u16 = 120;
    pub const FILE_ALREADY_EXISTS: u16 = 180;
    pub const DIRECTORY_ALREADY_EXISTS: u16 = 185;
    pub const INVALID_OPEN_FLAGS: u16 = 230;
    pub const DIRECTORY_NOT_EMPTY: u16 = 240;
    pub const NOT_FORMATTED: u16 = 340;
    pub const INVALID_PATH: u16 = 702;
    pub const WRITE_BEYOND_END: u16 = 705;
    pub const UNSUPPORTED_OPEN_FLAGS: u16 = 760;
    pub const UNEXPECTED_FILE_OR_DIRECTORY: u16 = 770;

    // Common descriptions shared by every module
    pub const TOO_LARGE: u16 = 1001;
    pub const NO_DATA: u16 = 1007;
    pub const NOT_IMPLEMENTED: u16 = 1012;
}

/// A packed 3DS result code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResultCode(pub u32);

impl ResultCode {
    /// Pack a result code from its fields
    pub const fn new(description: u16, module: u8, summary: u8, level: u8) -> Self {
        Self(
            (description as u32 & 0x3FF)
                | ((module as u32) << 10)
                | ((summary as u32 & 0x3F) << 21)
                | ((level as u32 & 0x1F) << 27),
        )
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn description(self) -> u16 {
        (self.0 & 0x3FF) as u16
    }

    pub const fn module(self) -> u8 {
        ((self.0 >> 10) & 0xFF) as u8
    }

    pub const fn summary(self) -> u8 {
        ((self.0 >> 21) & 0x3F) as u8
    }

    pub const fn level(self) -> u8 {
        ((self.0 >> 27) & 0x1F) as u8
    }

    /// Result codes with the top bit set are failures
    pub const fn is_error(self) -> bool {
        (self.0 as i32) < 0
    }

    pub const fn is_success(self) -> bool {
        !self.is_error()
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010X}", self.0)
    }
}

pub const RESULT_SUCCESS: ResultCode = ResultCode(0);

/// Generic failure, used where no specific code is known
pub const RESULT_UNKNOWN: ResultCode = ResultCode(u32::MAX);

/// Result codes returned by the FS service
pub mod fs {
    use super::{ResultCode, description as d, level as l, module::FS, summary as s};

    pub const ERROR_INVALID_PATH: ResultCode =
        ResultCode::new(d::INVALID_PATH, FS, s::INVALID_ARGUMENT, l::USAGE);
    pub const ERROR_UNSUPPORTED_OPEN_FLAGS: ResultCode =
        ResultCode::new(d::UNSUPPORTED_OPEN_FLAGS, FS, s::NOT_SUPPORTED, l::USAGE);
    pub const ERROR_INVALID_OPEN_FLAGS: ResultCode =
        ResultCode::new(d::INVALID_OPEN_FLAGS, FS, s::CANCELED, l::STATUS);
    pub const ERROR_FILE_NOT_FOUND: ResultCode =
        ResultCode::new(d::FILE_NOT_FOUND, FS, s::NOT_FOUND, l::STATUS);
    pub const ERROR_PATH_NOT_FOUND: ResultCode =
        ResultCode::new(d::PATH_NOT_FOUND, FS, s::NOT_FOUND, l::STATUS);
    pub const ERROR_NOT_FOUND: ResultCode =
        ResultCode::new(d::NOT_FOUND, FS, s::NOT_FOUND, l::STATUS);
    pub const ERROR_UNEXPECTED_FILE_OR_DIRECTORY: ResultCode =
        ResultCode::new(d::UNEXPECTED_FILE_OR_DIRECTORY, FS, s::NOT_SUPPORTED, l::USAGE);
    pub const ERROR_DIRECTORY_ALREADY_EXISTS: ResultCode =
        ResultCode::new(d::DIRECTORY_ALREADY_EXISTS, FS, s::NOTHING_HAPPENED, l::STATUS);
    pub const ERROR_FILE_ALREADY_EXISTS: ResultCode =
        ResultCode::new(d::FILE_ALREADY_EXISTS, FS, s::NOTHING_HAPPENED, l::STATUS);
    pub const ERROR_DIRECTORY_NOT_EMPTY: ResultCode =
        ResultCode::new(d::DIRECTORY_NOT_EMPTY, FS, s::CANCELED, l::STATUS);
    pub const ERROR_WRITE_BEYOND_END: ResultCode =
        ResultCode::new(d::WRITE_BEYOND_END, FS, s::INVALID_ARGUMENT, l::USAGE);
    pub const ERROR_NOT_FORMATTED: ResultCode =
        ResultCode::new(d::NOT_FORMATTED, FS, s::INVALID_STATE, l::STATUS);
    pub const ERROR_NOT_FOUND_INVALID_STATE: ResultCode =
        ResultCode::new(d::NOT_FOUND, FS, s::INVALID_STATE, l::STATUS);
    pub const ERROR_INVALID_ARCHIVE_HANDLE: ResultCode =
        ResultCode::new(d::ARCHIVE_NOT_MOUNTED, FS, s::NOT_FOUND, l::PERMANENT);
    pub const ERROR_TOO_LARGE: ResultCode =
        ResultCode::new(d::TOO_LARGE, FS, s::OUT_OF_RESOURCE, l::INFO);
    pub const ERROR_CANCELED: ResultCode = ResultCode::new(d::NO_DATA, FS, s::CANCELED, l::STATUS);
    pub const ERROR_UNIMPLEMENTED: ResultCode =
        ResultCode::new(d::NOT_IMPLEMENTED, FS, s::NOT_SUPPORTED, l::PERMANENT);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_known_console_codes() {
        // Values as reported by retail hardware
        assert_eq!(fs::ERROR_FILE_NOT_FOUND.raw(), 0xC880_4470);
        assert_eq!(fs::ERROR_PATH_NOT_FOUND.raw(), 0xC880_4471);
        assert_eq!(fs::ERROR_NOT_FORMATTED.raw(), 0xC8A0_4554);
        assert_eq!(fs::ERROR_UNSUPPORTED_OPEN_FLAGS.raw(), 0xE0C0_46F8);
        assert_eq!(fs::ERROR_WRITE_BEYOND_END.raw(), 0xE0E0_46C1);
    }

    #[test]
    fn fields_survive_packing() {
        let code = fs::ERROR_NOT_FOUND_INVALID_STATE;
        assert_eq!(code.description(), description::NOT_FOUND);
        assert_eq!(code.module(), module::FS);
        assert_eq!(code.summary(), summary::INVALID_STATE);
        assert_eq!(code.level(), level::STATUS);
        assert!(code.is_error());
        assert!(RESULT_SUCCESS.is_success());
        assert!(RESULT_UNKNOWN.is_error());
    }
}
