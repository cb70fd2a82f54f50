use clap::Parser;
use oxidiz3ds_hw::fs::{ArchiveIdCode, MediaType};
use threemu_fs::args::ArchiveArgs;
use threemu_fs::{
    ArchiveFormatInfo, ArchiveManager, ArchivePath, Args, Command, ExtSaveDataPath, FsError, Mode,
};
use tracing::info;

/// Number of entries fetched per directory read
const LS_BATCH: usize = 32;

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(2);
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut manager = ArchiveManager::new(args.to_fs_config());
    let config = manager.config();
    info!("SD card: {:?}, NAND: {:?}", config.sdmc_dir, config.nand_dir);

    let exit_code = match run(&mut manager, &args) {
        Ok(()) => 0,
        Err(CliError::Usage(msg)) => {
            eprintln!("Error: {}", msg);
            2
        }
        Err(CliError::Fs(e)) => {
            eprintln!("Error: {} (result code {})", e, e.result_code());
            1
        }
    };

    std::process::exit(exit_code);
}

enum CliError {
    Usage(String),
    Fs(FsError),
}

impl From<FsError> for CliError {
    fn from(e: FsError) -> Self {
        CliError::Fs(e)
    }
}

fn id_code(archive: &ArchiveArgs) -> ArchiveIdCode {
    match MediaType::from(archive.media) {
        MediaType::Nand => ArchiveIdCode::SharedExtSaveData,
        _ => ArchiveIdCode::ExtSaveData,
    }
}

fn archive_path(archive: &ArchiveArgs) -> ArchivePath {
    let media = MediaType::from(archive.media);
    ExtSaveDataPath::new(media as u32, archive.high, archive.low).encode()
}

fn run(manager: &mut ArchiveManager, args: &Args) -> Result<(), CliError> {
    let archive = args.command.archive();
    let media = MediaType::from(archive.media);

    match &args.command {
        Command::Format {
            total_size,
            number_directories,
            number_files,
            duplicate_data,
            icon,
            ..
        } => {
            let icon_data = match icon {
                Some(path) => std::fs::read(path)
                    .map_err(|e| CliError::Usage(format!("failed to read {:?}: {}", path, e)))?,
                None => Vec::new(),
            };
            let format_info = ArchiveFormatInfo {
                total_size: *total_size,
                number_directories: *number_directories,
                number_files: *number_files,
                duplicate_data: u8::from(*duplicate_data),
            };
            manager.create_ext_save_data(
                media,
                archive.high,
                archive.low,
                &icon_data,
                &format_info,
                args.program_id,
            )?;
            println!("Formatted {:08X}/{:08X}", archive.high, archive.low);
        }
        Command::Info { .. } => {
            let format_info = manager.get_archive_format_info(
                id_code(archive),
                &archive_path(archive),
                args.program_id,
            )?;
            println!("total_size: {:#X}", format_info.total_size);
            println!("number_directories: {}", format_info.number_directories);
            println!("number_files: {}", format_info.number_files);
            println!("duplicate_data: {}", format_info.duplicate_data != 0);
        }
        Command::Delete { .. } => {
            manager.delete_ext_save_data(media, archive.high, archive.low)?;
            println!("Deleted {:08X}/{:08X}", archive.high, archive.low);
        }
        Command::CreateFile { path, size, .. } => {
            let handle =
                manager.open_archive(id_code(archive), &archive_path(archive), args.program_id)?;
            manager.create_file_in_archive(handle, &ArchivePath::from(path.as_str()), *size)?;
        }
        Command::Write {
            path, offset, data, ..
        } => {
            let bytes = hex::decode(data).map_err(|e| CliError::Usage(e.to_string()))?;
            let handle =
                manager.open_archive(id_code(archive), &archive_path(archive), args.program_id)?;
            let (file, delay) = manager.open_file_from_archive(
                handle,
                &ArchivePath::from(path.as_str()),
                Mode::READ | Mode::WRITE,
            );
            info!("Open delay: {} ns", delay);
            let mut file = file?;
            let written = file.write(*offset, &bytes, true)?;
            println!("Wrote {} bytes", written);
        }
        Command::Read {
            path,
            offset,
            length,
            ..
        } => {
            let handle =
                manager.open_archive(id_code(archive), &archive_path(archive), args.program_id)?;
            let (file, delay) = manager.open_file_from_archive(
                handle,
                &ArchivePath::from(path.as_str()),
                Mode::READ,
            );
            info!("Open delay: {} ns", delay);
            let mut file = file?;
            let length = match length {
                Some(length) => *length,
                None => file.size()?.saturating_sub(*offset),
            };
            let length = usize::try_from(length).map_err(|_| CliError::Fs(FsError::TooLarge))?;
            let mut buffer = vec![0u8; length];
            let read = file.read(*offset, &mut buffer)?;
            info!("Read delay: {} ns", file.read_delay_ns(read));
            println!("{}", hex::encode(&buffer[..read]));
        }
        Command::Ls { path, .. } => {
            let handle =
                manager.open_archive(id_code(archive), &archive_path(archive), args.program_id)?;
            let mut directory =
                manager.open_directory_from_archive(handle, &ArchivePath::from(path.as_str()))?;
            loop {
                let entries = directory.read(LS_BATCH);
                if entries.is_empty() {
                    break;
                }
                for entry in entries {
                    if entry.is_directory {
                        println!("{}/", entry.name());
                    } else {
                        println!("{:>10} {}", entry.file_size, entry.name());
                    }
                }
            }
        }
    }

    Ok(())
}
