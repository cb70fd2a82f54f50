//! Archive identifiers and storage constants used by the FS service.
//!
//! # References
//! - <https://www.3dbrew.org/wiki/Filesystem_services>
//! - <https://www.3dbrew.org/wiki/Extdata>

/// Archive ID codes accepted by `FS:OpenArchive`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ArchiveIdCode {
    SelfNcch = 0x0000_0003,
    SaveData = 0x0000_0004,
    ExtSaveData = 0x0000_0006,
    SharedExtSaveData = 0x0000_0007,
    SystemSaveData = 0x0000_0008,
    Sdmc = 0x0000_0009,
    SdmcWriteOnly = 0x0000_000A,
    Ncch = 0x2345_678A,
    OtherSaveDataGeneral = 0x5678_90B2,
    OtherSaveDataPermitted = 0x5678_90B4,
}

impl ArchiveIdCode {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0x0000_0003 => Some(Self::SelfNcch),
            0x0000_0004 => Some(Self::SaveData),
            0x0000_0006 => Some(Self::ExtSaveData),
            0x0000_0007 => Some(Self::SharedExtSaveData),
            0x0000_0008 => Some(Self::SystemSaveData),
            0x0000_0009 => Some(Self::Sdmc),
            0x0000_000A => Some(Self::SdmcWriteOnly),
            0x2345_678A => Some(Self::Ncch),
            0x5678_90B2 => Some(Self::OtherSaveDataGeneral),
            0x5678_90B4 => Some(Self::OtherSaveDataPermitted),
            _ => None,
        }
    }
}

/// Storage medium an archive lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MediaType {
    Nand = 0,
    Sdmc = 1,
    GameCard = 2,
}

impl MediaType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Nand),
            1 => Some(Self::Sdmc),
            2 => Some(Self::GameCard),
            _ => None,
        }
    }
}

/// Console ID directory name used under `Nintendo 3DS/` and `data/`
pub const SYSTEM_ID: &str = "00000000000000000000000000000000";

/// SD card ID directory name used under `Nintendo 3DS/<SYSTEM_ID>/`
pub const SDCARD_ID: &str = "00000000000000000000000000000000";
