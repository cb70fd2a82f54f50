//! Guest-supplied archive paths and file open modes.
//!
//! The FS service receives paths as a `(type, size, buffer)` triple. The same
//! type is used both for archive identities (binary paths such as the
//! ExtSaveData ID record) and for file paths inside an archive (ASCII or
//! UTF-16 strings).

use bitflags::bitflags;
use tracing::error;

/// Encoding of a guest path buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LowPathType {
    Invalid = 0,
    Empty = 1,
    Binary = 2,
    Char = 3,
    Wchar = 4,
}

impl LowPathType {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => Self::Empty,
            2 => Self::Binary,
            3 => Self::Char,
            4 => Self::Wchar,
            _ => Self::Invalid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathData {
    Invalid,
    Empty,
    Binary(Vec<u8>),
    Char(Vec<u8>),
    Wchar(Vec<u16>),
}

/// An archive-relative path as supplied by guest software
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivePath {
    data: PathData,
}

impl ArchivePath {
    /// Build a path from a raw guest buffer.
    ///
    /// String buffers carry a trailing NUL (one byte for `Char`, one UTF-16
    /// unit for `Wchar`) which is not part of the path.
    pub fn new(kind: LowPathType, raw: &[u8]) -> Self {
        let data = match kind {
            LowPathType::Invalid => PathData::Invalid,
            LowPathType::Empty => PathData::Empty,
            LowPathType::Binary => PathData::Binary(raw.to_vec()),
            LowPathType::Char => {
                let len = raw.len().saturating_sub(1);
                PathData::Char(raw[..len].to_vec())
            }
            LowPathType::Wchar => {
                let units = (raw.len() / 2).saturating_sub(1);
                PathData::Wchar(
                    raw.chunks_exact(2)
                        .take(units)
                        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                        .collect(),
                )
            }
        };
        Self { data }
    }

    pub fn empty() -> Self {
        Self {
            data: PathData::Empty,
        }
    }

    pub fn from_binary(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            data: PathData::Binary(bytes.into()),
        }
    }

    pub fn kind(&self) -> LowPathType {
        match self.data {
            PathData::Invalid => LowPathType::Invalid,
            PathData::Empty => LowPathType::Empty,
            PathData::Binary(_) => LowPathType::Binary,
            PathData::Char(_) => LowPathType::Char,
            PathData::Wchar(_) => LowPathType::Wchar,
        }
    }

    /// Human readable rendering for log messages
    pub fn debug_str(&self) -> String {
        match &self.data {
            PathData::Invalid => "[Invalid]".to_string(),
            PathData::Empty => "[Empty]".to_string(),
            PathData::Binary(bytes) => format!("[Binary: {}]", hex::encode(bytes)),
            PathData::Char(bytes) => format!("[Char: {}]", String::from_utf8_lossy(bytes)),
            PathData::Wchar(units) => format!("[Wchar: {}]", String::from_utf16_lossy(units)),
        }
    }

    /// The path as text. Only meaningful for string paths.
    pub fn as_string(&self) -> String {
        match &self.data {
            PathData::Char(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            PathData::Wchar(units) => String::from_utf16_lossy(units),
            PathData::Empty => String::new(),
            PathData::Invalid | PathData::Binary(_) => {
                error!("LowPathType cannot be converted to string!");
                String::new()
            }
        }
    }

    /// The path as raw bytes, without any string terminator
    pub fn as_binary(&self) -> Vec<u8> {
        match &self.data {
            PathData::Binary(bytes) => bytes.clone(),
            PathData::Char(bytes) => bytes.clone(),
            PathData::Wchar(units) => units.iter().flat_map(|u| u.to_le_bytes()).collect(),
            PathData::Empty => Vec::new(),
            PathData::Invalid => {
                error!("LowPathType cannot be converted to binary!");
                Vec::new()
            }
        }
    }
}

impl From<&str> for ArchivePath {
    fn from(s: &str) -> Self {
        Self {
            data: PathData::Char(s.as_bytes().to_vec()),
        }
    }
}

bitflags! {
    /// Access requested when opening a file
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Mode: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const CREATE = 1 << 2;
    }
}

impl Mode {
    /// Keep every bit the guest sent, including ones with no known meaning
    pub fn from_raw(raw: u32) -> Self {
        Self::from_bits_retain(raw)
    }
}
