//! Directory backends and the directory entry record returned to the guest.

use crate::error::Result;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::trace;

/// Maximum filename length in UTF-16 units, including the terminator
pub const FILENAME_LENGTH: usize = 0x106;

/// Size of an encoded [`Entry`]
pub const ENTRY_SIZE: usize = 0x228;

/// Characters dropped when deriving an 8.3 short name
const SHORT_NAME_FORBIDDEN: &[char] = &['.', '"', '/', '\\', '[', ']', ':', ';', '=', ',', ' '];

/// One directory entry as reported by `Directory::Read`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// UTF-16 name, NUL padded to [`FILENAME_LENGTH`]
    pub filename: [u16; FILENAME_LENGTH],
    /// 8.3 base name, space padded, NUL terminated
    pub short_name: [u8; 9],
    /// 8.3 extension, space padded, NUL terminated
    pub extension: [u8; 4],
    pub is_directory: bool,
    pub is_hidden: bool,
    pub is_archive: bool,
    pub is_read_only: bool,
    pub file_size: u64,
}

impl Entry {
    fn new(name: &str, is_directory: bool, file_size: u64) -> Self {
        let mut filename = [0u16; FILENAME_LENGTH];
        // Always leave room for the terminator
        for (slot, unit) in filename[..FILENAME_LENGTH - 1]
            .iter_mut()
            .zip(name.encode_utf16())
        {
            *slot = unit;
        }

        let (short_name, extension) = split_filename_83(name);
        Self {
            filename,
            short_name,
            extension,
            is_directory,
            is_hidden: name.starts_with('.'),
            // An SD card whose archive bit has never been cleared
            is_archive: !is_directory,
            is_read_only: false,
            file_size,
        }
    }

    /// The name without its NUL padding
    pub fn name(&self) -> String {
        let len = self
            .filename
            .iter()
            .position(|&u| u == 0)
            .unwrap_or(FILENAME_LENGTH);
        String::from_utf16_lossy(&self.filename[..len])
    }

    /// Encode in the guest layout
    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        for (i, unit) in self.filename.iter().enumerate() {
            out[i * 2..i * 2 + 2].copy_from_slice(&unit.to_le_bytes());
        }
        out[0x20C..0x215].copy_from_slice(&self.short_name);
        // 0x215: unknown
        out[0x216..0x21A].copy_from_slice(&self.extension);
        // 0x21A..0x21C: unknown
        out[0x21C] = self.is_directory as u8;
        out[0x21D] = self.is_hidden as u8;
        out[0x21E] = self.is_archive as u8;
        out[0x21F] = self.is_read_only as u8;
        out[0x220..0x228].copy_from_slice(&self.file_size.to_le_bytes());
        out
    }
}

/// Derive the FAT 8.3 short name and extension for `filename`.
///
/// Short names collide freely; every truncated name becomes `~1`.
pub fn split_filename_83(filename: &str) -> ([u8; 9], [u8; 4]) {
    let mut short_name = *b"        \0";
    let mut extension = *b"   \0";

    // A trailing dot does not start an extension
    let point = match filename.rfind('.') {
        Some(p) if p + 1 == filename.len() => filename[..p].rfind('.'),
        other => other,
    };

    let base = point.map_or(filename, |p| &filename[..p]);
    let mut j = 0;
    for letter in base.chars().filter(|c| !SHORT_NAME_FORBIDDEN.contains(c)) {
        if j == 8 {
            short_name[6] = b'~';
            short_name[7] = b'1';
            break;
        }
        short_name[j] = ascii_upper_byte(letter);
        j += 1;
    }

    if let Some(p) = point {
        for (slot, letter) in extension.iter_mut().zip(filename[p + 1..].chars().take(3)) {
            *slot = ascii_upper_byte(letter);
        }
    }

    (short_name, extension)
}

fn ascii_upper_byte(c: char) -> u8 {
    if c.is_ascii() {
        c.to_ascii_uppercase() as u8
    } else {
        b'_'
    }
}

/// An open directory inside an archive
pub trait DirectoryBackend: fmt::Debug + Send {
    /// Return up to `count` further entries
    fn read(&mut self, count: usize) -> Vec<Entry>;
}

/// A host directory whose children are captured when it is opened
#[derive(Debug)]
pub struct DiskDirectory {
    children: Vec<Entry>,
    position: usize,
}

impl DiskDirectory {
    pub fn open(path: &Path) -> Result<Self> {
        let mut children = Vec::new();
        for dir_entry in fs::read_dir(path)? {
            let dir_entry = dir_entry?;
            let metadata = dir_entry.metadata()?;
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            let size = if metadata.is_dir() { 0 } else { metadata.len() };
            children.push(Entry::new(&name, metadata.is_dir(), size));
        }
        children.sort_by_key(Entry::name);

        Ok(Self {
            children,
            position: 0,
        })
    }
}

impl DirectoryBackend for DiskDirectory {
    fn read(&mut self, count: usize) -> Vec<Entry> {
        let end = self.children.len().min(self.position.saturating_add(count));
        let batch = self.children[self.position..end].to_vec();
        for entry in &batch {
            trace!(
                "File {}: size={} dir={}",
                entry.name(),
                entry.file_size,
                entry.is_directory
            );
        }
        self.position = end;
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short(name: &str) -> (String, String) {
        let (s, e) = split_filename_83(name);
        (
            String::from_utf8_lossy(&s[..8]).into_owned(),
            String::from_utf8_lossy(&e[..3]).into_owned(),
        )
    }

    #[test]
    fn short_names() {
        assert_eq!(short("save.bin"), ("SAVE    ".into(), "BIN".into()));
        assert_eq!(short("longfilename.text"), ("LONGFI~1".into(), "TEX".into()));
        assert_eq!(short("noext"), ("NOEXT   ".into(), "   ".into()));
        assert_eq!(short("a b[c].dat"), ("ABC     ".into(), "DAT".into()));
        assert_eq!(short("trail.ing."), ("TRAIL   ".into(), "ING".into()));
    }

    #[test]
    fn entry_layout() {
        let entry = Entry::new(".hidden", false, 0x1122_3344_5566);
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[0..4], &[b'.', 0, b'h', 0]);
        assert_eq!(bytes[0x21C], 0);
        assert_eq!(bytes[0x21D], 1);
        assert_eq!(bytes[0x21E], 1);
        assert_eq!(&bytes[0x220..0x228], &0x1122_3344_5566u64.to_le_bytes());
        assert_eq!(entry.name(), ".hidden");
    }

    #[test]
    fn reads_in_batches() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.bin"), [0u8; 4]).unwrap();
        fs::write(dir.path().join("a.bin"), [0u8; 2]).unwrap();
        fs::create_dir(dir.path().join("c")).unwrap();

        let mut listing = DiskDirectory::open(dir.path()).unwrap();
        let first = listing.read(2);
        assert_eq!(
            first.iter().map(Entry::name).collect::<Vec<_>>(),
            ["a.bin", "b.bin"]
        );
        assert_eq!(first[1].file_size, 4);

        let rest = listing.read(10);
        assert_eq!(rest.len(), 1);
        assert!(rest[0].is_directory);
        assert!(!rest[0].is_archive);
        assert!(listing.read(10).is_empty());
    }
}
