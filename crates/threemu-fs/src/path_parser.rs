//! Validation of in-archive paths and their mapping onto the host filesystem.

use crate::path::{ArchivePath, LowPathType};
use std::path::{Path, PathBuf};

/// Characters rejected because the host filesystem may not accept them.
/// Some are legal on the console, but games do not use them.
const INVALID_CHARS: &[char] = &['<', '>', '\\', '|', ':', '"', '*', '?'];

/// Where a parsed path lands on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostStatus {
    /// The archive's own root directory is missing
    InvalidMountPoint,
    /// An intermediate directory is missing
    PathNotFound,
    /// An intermediate component is a file
    FileInPath,
    /// The full path names a directory
    DirectoryFound,
    /// Every parent exists but the final entry does not
    NotFound,
    /// The full path names a file
    FileFound,
}

/// A normalised sequence of path components
#[derive(Debug, Clone)]
pub struct PathParser {
    components: Vec<String>,
    is_valid: bool,
}

impl PathParser {
    pub fn new(path: &ArchivePath) -> Self {
        let invalid = Self {
            components: Vec::new(),
            is_valid: false,
        };

        if !matches!(path.kind(), LowPathType::Char | LowPathType::Wchar) {
            return invalid;
        }

        let text = path.as_string();
        if !text.starts_with('/') || text.contains(INVALID_CHARS) {
            return invalid;
        }

        let mut components: Vec<String> = Vec::new();
        for node in text.split('/') {
            match node {
                "" | "." => {}
                ".." => {
                    // Climbing out of the archive root
                    if components.pop().is_none() {
                        return invalid;
                    }
                }
                _ => components.push(node.to_string()),
            }
        }

        Self {
            components,
            is_valid: true,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn is_root_directory(&self) -> bool {
        self.components.is_empty()
    }

    /// Join the components onto `mount_point`. Never touches the filesystem.
    pub fn build_host_path(&self, mount_point: &Path) -> PathBuf {
        let mut host = mount_point.to_path_buf();
        host.extend(&self.components);
        host
    }

    /// Classify what currently exists on the host at this path
    pub fn host_status(&self, mount_point: &Path) -> HostStatus {
        if !mount_point.is_dir() {
            return HostStatus::InvalidMountPoint;
        }

        let Some((last, parents)) = self.components.split_last() else {
            return HostStatus::DirectoryFound;
        };

        let mut host = mount_point.to_path_buf();
        for node in parents {
            host.push(node);
            if !host.exists() {
                return HostStatus::PathNotFound;
            }
            if !host.is_dir() {
                return HostStatus::FileInPath;
            }
        }

        host.push(last);
        if !host.exists() {
            HostStatus::NotFound
        } else if host.is_dir() {
            HostStatus::DirectoryFound
        } else {
            HostStatus::FileFound
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn parse(s: &str) -> PathParser {
        PathParser::new(&ArchivePath::from(s))
    }

    #[test]
    fn rejects_non_string_and_relative_paths() {
        assert!(!PathParser::new(&ArchivePath::from_binary(b"/a".to_vec())).is_valid());
        assert!(!PathParser::new(&ArchivePath::empty()).is_valid());
        assert!(!parse("").is_valid());
        assert!(!parse("save.bin").is_valid());
    }

    #[test]
    fn rejects_host_hostile_characters() {
        for bad in ["/a<b", "/a:b", "/a\\b", "/a?", "/a*", "/a|b", "/\"q\""] {
            assert!(!parse(bad).is_valid(), "{bad} should be rejected");
        }
    }

    #[test]
    fn normalises_dots() {
        let parser = parse("/a/./b//../c/");
        assert!(parser.is_valid());
        assert_eq!(
            parser.build_host_path(Path::new("/mnt")),
            PathBuf::from("/mnt/a/c")
        );
        assert!(parse("/a/..").is_root_directory());
        assert!(!parse("/..").is_valid());
        assert!(!parse("/a/../..").is_valid());
    }

    #[test]
    fn classifies_host_entries() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir(root.join("dir")).unwrap();
        fs::write(root.join("file"), b"x").unwrap();
        fs::write(root.join("dir/inner"), b"y").unwrap();

        assert_eq!(parse("/").host_status(root), HostStatus::DirectoryFound);
        assert_eq!(parse("/dir").host_status(root), HostStatus::DirectoryFound);
        assert_eq!(parse("/dir/inner").host_status(root), HostStatus::FileFound);
        assert_eq!(parse("/dir/missing").host_status(root), HostStatus::NotFound);
        assert_eq!(parse("/nope/x").host_status(root), HostStatus::PathNotFound);
        assert_eq!(parse("/file/x").host_status(root), HostStatus::FileInPath);
        assert_eq!(
            parse("/file").host_status(&root.join("absent")),
            HostStatus::InvalidMountPoint
        );
    }
}
