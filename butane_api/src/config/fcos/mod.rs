//! Fedora CoreOS variant: the base schema plus boot disk and GRUB sugar.

use std::path::{Component, Path as FsPath};

use sysdefs::{arch::BootLayout, partition_types};

use crate::{
    config::base::v0_5::{Disk, Filesystem, Tang},
    error::SourceError,
    path::Path,
    report::Report,
};

pub mod v1_5;
pub mod v1_6;

/// Device the default boot disk is known by.
pub const BOOT_DISK: &str = "/dev/disk/by-id/coreos-boot-disk";

/// Read access to the LUKS section of `boot_device`, shared by every schema
/// version.
pub trait BootLuks {
    fn device(&self) -> Option<&str>;
    fn discard(&self) -> Option<bool>;
    fn tang(&self) -> &[Tang];
    fn threshold(&self) -> Option<i64>;
    fn tpm2(&self) -> Option<bool>;

    /// Whether the root volume is bound to an IBM Crypto Express card.
    fn cex(&self) -> Option<bool> {
        None
    }

    /// Whether any binding was requested, i.e. the root volume is encrypted.
    fn is_enabled(&self) -> bool {
        !self.tang().is_empty() || self.tpm2() == Some(true) || self.cex() == Some(true)
    }
}

/// Checks of `boot_device` that do not depend on the schema version.
pub(crate) fn validate_boot_device<B: BootLuks>(
    layout: Option<&str>,
    mirror_devices: &[String],
    luks: &B,
    c: &Path,
) -> Report {
    let mut r = Report::new();
    let layout = match layout {
        None => Some(BootLayout::DEFAULT),
        Some(name) => {
            let parsed = BootLayout::parse(name);
            if parsed.is_none() {
                r.add_error(c.append("layout"), SourceError::UnknownBootDeviceLayout);
            }
            parsed
        }
    };

    if mirror_devices.len() == 1 {
        r.add_error(
            c.append("mirror").append("devices"),
            SourceError::TooFewMirrorDevices,
        );
    }

    let Some(layout) = layout else {
        return r;
    };
    if !layout.supports_mirroring() && !mirror_devices.is_empty() {
        r.add_error(c.append("layout"), SourceError::MirrorNotSupported);
    }
    if layout.requires_luks_device()
        && luks.is_enabled()
        && luks.device().unwrap_or_default().is_empty()
    {
        r.add_error(
            c.append("luks").append("device"),
            SourceError::NoLuksBootDevice,
        );
    }
    if luks.cex() == Some(true) {
        if !layout.is_s390x() {
            r.add_error(c.append("layout"), SourceError::CexArchitectureMismatch);
        }
        if !luks.tang().is_empty() || luks.tpm2() == Some(true) {
            r.add_error(c.append("luks").append("cex"), SourceError::CexWithClevis);
        }
    }
    r
}

/// Mount units may only mount filesystems below `/etc` or `/var`; everything
/// else is set up before units run.
pub(crate) fn validate_mount_paths(filesystems: &[Filesystem], c: &Path) -> Report {
    let mut r = Report::new();
    for (i, fs) in filesystems.iter().enumerate() {
        if fs.with_mount_unit != Some(true) {
            continue;
        }
        let Some(path) = fs.path.as_deref() else {
            continue;
        };
        if !is_mountable(path) {
            r.add_error(c.append(i).append("path"), SourceError::MountPointForbidden);
        }
    }
    r
}

fn is_mountable(path: &str) -> bool {
    if FsPath::new(path)
        .components()
        .any(|component| component == Component::ParentDir)
    {
        return false;
    }
    let mut components = FsPath::new(path)
        .components()
        .filter(|component| !matches!(component, Component::CurDir));
    components.next() == Some(Component::RootDir)
        && matches!(
            components.next(),
            Some(Component::Normal(top)) if top == "etc" || top == "var"
        )
}

/// Warns about boot disk partitions that reuse a reserved label with a
/// different number; the agent would create a new partition instead of
/// modifying the existing one.
pub(crate) fn validate_boot_disk_partitions(disks: &[Disk], c: &Path) -> Report {
    let mut r = Report::new();
    for (i, disk) in disks.iter().enumerate() {
        if disk.device != BOOT_DISK {
            continue;
        }
        for (j, partition) in disk.partitions.iter().enumerate() {
            let (Some(label), Some(number)) = (partition.label.as_deref(), partition.number) else {
                continue;
            };
            if number == 0 {
                continue;
            }
            if partition_types::well_known_number(label).is_some_and(|known| known != number) {
                r.add_warn(
                    c.append(i).append("partitions").append(j).append("number"),
                    SourceError::WrongPartitionNumber,
                );
            }
        }
    }
    r
}
