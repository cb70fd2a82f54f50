use crate::core::FsConfig;
use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use oxidiz3ds_hw::fs::MediaType;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "threemu-fs", about = "Inspect and edit emulated 3DS extdata archives")]
pub struct Args {
    /// Host directory backing the emulated SD card
    #[arg(long, global = true)]
    pub sdmc_dir: Option<PathBuf>,

    /// Host directory backing the emulated NAND
    #[arg(long, global = true)]
    pub nand_dir: Option<PathBuf>,

    /// Program ID of the requesting title (hex: 0x1234 or decimal: 1234)
    #[arg(long, global = true, value_parser = parse_hex_or_dec, default_value = "0")]
    pub program_id: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaArg {
    Nand,
    Sdmc,
}

impl From<MediaArg> for MediaType {
    fn from(media: MediaArg) -> Self {
        match media {
            MediaArg::Nand => MediaType::Nand,
            MediaArg::Sdmc => MediaType::Sdmc,
        }
    }
}

/// Identifies one extdata archive
#[derive(ClapArgs, Debug, Clone)]
pub struct ArchiveArgs {
    #[arg(long, value_enum)]
    pub media: MediaArg,

    /// High word of the extdata ID
    #[arg(long, value_parser = parse_hex_or_dec_u32, default_value = "0")]
    pub high: u32,

    /// Low word of the extdata ID
    #[arg(long, value_parser = parse_hex_or_dec_u32)]
    pub low: u32,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create (or recreate) an extdata archive
    Format {
        #[command(flatten)]
        archive: ArchiveArgs,

        #[arg(long, value_parser = parse_hex_or_dec_u32, default_value = "0")]
        total_size: u32,

        #[arg(long, default_value_t = 0)]
        number_directories: u32,

        #[arg(long, default_value_t = 0)]
        number_files: u32,

        #[arg(long)]
        duplicate_data: bool,

        /// SMDH icon to store with the archive
        #[arg(long)]
        icon: Option<PathBuf>,
    },

    /// Print the format info recorded for an archive
    Info {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Delete an archive with its icon
    Delete {
        #[command(flatten)]
        archive: ArchiveArgs,
    },

    /// Create a fixed-size file inside an archive
    CreateFile {
        #[command(flatten)]
        archive: ArchiveArgs,

        /// Path inside the archive, e.g. /save.bin
        #[arg(long)]
        path: String,

        #[arg(long, value_parser = parse_hex_or_dec)]
        size: u64,
    },

    /// Write bytes into an existing file
    Write {
        #[command(flatten)]
        archive: ArchiveArgs,

        #[arg(long)]
        path: String,

        #[arg(long, value_parser = parse_hex_or_dec, default_value = "0")]
        offset: u64,

        /// Data to write, as hex
        #[arg(long)]
        data: String,
    },

    /// Read bytes from a file and print them as hex
    Read {
        #[command(flatten)]
        archive: ArchiveArgs,

        #[arg(long)]
        path: String,

        #[arg(long, value_parser = parse_hex_or_dec, default_value = "0")]
        offset: u64,

        #[arg(long, value_parser = parse_hex_or_dec)]
        length: Option<u64>,
    },

    /// List a directory inside an archive
    Ls {
        #[command(flatten)]
        archive: ArchiveArgs,

        #[arg(long, default_value = "/")]
        path: String,
    },
}

impl Command {
    pub fn archive(&self) -> &ArchiveArgs {
        match self {
            Command::Format { archive, .. }
            | Command::Info { archive }
            | Command::Delete { archive }
            | Command::CreateFile { archive, .. }
            | Command::Write { archive, .. }
            | Command::Read { archive, .. }
            | Command::Ls { archive, .. } => archive,
        }
    }
}

impl Args {
    /// Validate that the arguments are consistent
    pub fn validate(&self) -> Result<(), String> {
        match &self.command {
            Command::CreateFile { path, .. }
            | Command::Write { path, .. }
            | Command::Read { path, .. }
            | Command::Ls { path, .. } => {
                if !path.starts_with('/') {
                    return Err(format!("archive path {:?} must start with '/'", path));
                }
            }
            Command::Format { .. } | Command::Info { .. } | Command::Delete { .. } => {}
        }

        if let Command::Write { data, .. } = &self.command
            && hex::decode(data).is_err()
        {
            return Err(format!("--data {:?} is not valid hex", data));
        }

        Ok(())
    }

    /// Convert Args to FsConfig
    pub fn to_fs_config(&self) -> FsConfig {
        let defaults = FsConfig::default();
        FsConfig {
            sdmc_dir: self.sdmc_dir.clone().unwrap_or(defaults.sdmc_dir),
            nand_dir: self.nand_dir.clone().unwrap_or(defaults.nand_dir),
        }
    }
}

pub fn parse_hex_or_dec(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

pub fn parse_hex_or_dec_u32(s: &str) -> Result<u32, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}
