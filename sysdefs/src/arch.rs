use std::str::FromStr;

use strum_macros::{EnumIter, EnumString, IntoStaticStr};

use crate::partition_types;

/// Boot disk layout of a target machine. The layout decides which firmware
/// partitions precede `boot` and `root` on a boot disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, EnumString, EnumIter)]
pub enum BootLayout {
    /// 64-bit ARM
    #[strum(serialize = "aarch64")]
    Aarch64,

    /// 64-bit little-endian POWER
    #[strum(serialize = "ppc64le")]
    Ppc64le,

    /// IBM Z with ECKD DASD boot disks
    #[strum(serialize = "s390x-eckd")]
    S390xEckd,

    /// IBM Z under KVM
    #[strum(serialize = "s390x-virt")]
    S390xVirt,

    /// IBM Z with zFCP SCSI boot disks
    #[strum(serialize = "s390x-zfcp")]
    S390xZfcp,

    /// 64-bit x86
    #[strum(serialize = "x86_64")]
    X86_64,
}

/// A firmware partition placed before `boot` on every mirrored boot disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwarePartition {
    /// Label prefix; the mirror index is appended, e.g. `bios-1`.
    pub label_prefix: &'static str,
    pub size_mib: i64,
    pub type_guid: Option<&'static str>,
    /// Format of the filesystem created on the partition, if any.
    pub format: Option<&'static str>,
}

const BIOS: FirmwarePartition = FirmwarePartition {
    label_prefix: "bios",
    size_mib: 1,
    type_guid: Some(partition_types::BIOS_BOOT),
    format: None,
};

const ESP: FirmwarePartition = FirmwarePartition {
    label_prefix: "esp",
    size_mib: 127,
    type_guid: Some(partition_types::EFI_SYSTEM),
    format: Some("vfat"),
};

const PREP: FirmwarePartition = FirmwarePartition {
    label_prefix: "prep",
    size_mib: 4,
    type_guid: Some(partition_types::PREP_BOOT),
    format: None,
};

const RESERVED: FirmwarePartition = FirmwarePartition {
    label_prefix: "reserved",
    size_mib: 1,
    type_guid: None,
    format: None,
};

/// Size of the `boot` partition on every mirrored boot disk.
pub const BOOT_PARTITION_SIZE_MIB: i64 = 384;

impl BootLayout {
    /// Layout used when a config does not name one.
    pub const DEFAULT: BootLayout = BootLayout::X86_64;

    pub fn parse(layout: &str) -> Option<Self> {
        Self::from_str(layout).ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    pub fn is_s390x(self) -> bool {
        matches!(
            self,
            BootLayout::S390xEckd | BootLayout::S390xVirt | BootLayout::S390xZfcp
        )
    }

    /// Boot disks on these layouts cannot be mirrored.
    pub fn supports_mirroring(self) -> bool {
        !self.is_s390x()
    }

    /// These layouts have no partition labeled `root` to find, so an
    /// encrypted root needs an explicit device.
    pub fn requires_luks_device(self) -> bool {
        matches!(self, BootLayout::S390xEckd | BootLayout::S390xZfcp)
    }

    /// Firmware partitions preceding `boot` on each mirrored disk, in order.
    pub fn firmware_partitions(self) -> &'static [FirmwarePartition] {
        match self {
            BootLayout::X86_64 => &[BIOS, ESP],
            BootLayout::Aarch64 => &[RESERVED, ESP],
            BootLayout::Ppc64le => &[PREP, RESERVED],
            BootLayout::S390xEckd | BootLayout::S390xVirt | BootLayout::S390xZfcp => &[],
        }
    }
}
