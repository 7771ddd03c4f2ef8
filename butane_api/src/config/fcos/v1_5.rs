use serde::{Deserialize, Serialize};

use crate::{
    config::{
        base::v0_5::{
            Ignition, KernelArguments, Luks, Passwd, Storage, Systemd, Tang,
        },
        fcos::{self, BootLuks},
    },
    error::SourceError,
    path::Path,
    report::Report,
    validate::Validate,
};

/// Fedora CoreOS 1.5. `L` is the storage LUKS record and `B` the boot device
/// LUKS record; 1.6 swaps both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "L: Serialize, B: Serialize",
    deserialize = "L: Deserialize<'de>, B: Deserialize<'de> + Default"
))]
pub struct Config<L = Luks, B = BootDeviceLuks> {
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub ignition: Ignition,
    #[serde(default)]
    pub kernel_arguments: KernelArguments,
    #[serde(default)]
    pub passwd: Passwd,
    #[serde(default)]
    pub storage: Storage<L>,
    #[serde(default)]
    pub systemd: Systemd,
    #[serde(default)]
    pub boot_device: BootDevice<B>,
    #[serde(default)]
    pub grub: Grub,
}

/// Shorthand for a mirrored and/or encrypted boot disk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "B: Serialize",
    deserialize = "B: Deserialize<'de> + Default"
))]
pub struct BootDevice<B = BootDeviceLuks> {
    /// One of the names in [`sysdefs::arch::BootLayout`]; `x86_64` if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[serde(default)]
    pub luks: B,
    #[serde(default)]
    pub mirror: BootDeviceMirror,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootDeviceLuks {
    /// Device holding the root partition, for layouts without a labeled one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<bool>,
    #[serde(default)]
    pub tang: Vec<Tang>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm2: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootDeviceMirror {
    #[serde(default)]
    pub devices: Vec<String>,
}

/// GRUB superusers, written to the bootloader's user config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Grub {
    #[serde(default)]
    pub users: Vec<GrubUser>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrubUser {
    #[serde(default)]
    pub name: String,
    /// PBKDF2 hash as printed by `grub2-mkpasswd-pbkdf2`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
}

impl BootLuks for BootDeviceLuks {
    fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    fn discard(&self) -> Option<bool> {
        self.discard
    }

    fn tang(&self) -> &[Tang] {
        &self.tang
    }

    fn threshold(&self) -> Option<i64> {
        self.threshold
    }

    fn tpm2(&self) -> Option<bool> {
        self.tpm2
    }
}

impl<L: Validate, B: BootLuks> Validate for Config<L, B> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.ignition.validate(&c.append("ignition"));
        r.merge(self.storage.validate(&c.append("storage")));
        r.merge(self.systemd.validate(&c.append("systemd")));

        let storage = c.append("storage");
        r.merge(fcos::validate_boot_disk_partitions(
            &self.storage.disks,
            &storage.append("disks"),
        ));
        r.merge(fcos::validate_mount_paths(
            &self.storage.filesystems,
            &storage.append("filesystems"),
        ));
        r.merge(self.boot_device.validate(&c.append("boot_device")));
        r.merge(self.grub.validate(&c.append("grub")));
        r
    }
}

impl<B: BootLuks> Validate for BootDevice<B> {
    fn validate(&self, c: &Path) -> Report {
        fcos::validate_boot_device(self.layout.as_deref(), &self.mirror.devices, &self.luks, c)
    }
}

impl Validate for Grub {
    fn validate(&self, c: &Path) -> Report {
        self.users.validate(&c.append("users"))
    }
}

impl Validate for GrubUser {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), SourceError::GrubUserNameNotSpecified);
        }
        if self.password_hash.as_deref().unwrap_or_default().is_empty() {
            r.add_error(c.append("password_hash"), SourceError::GrubPasswordNotSpecified);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::path::YAML;

    fn errors(yaml: &str) -> Vec<(String, String)> {
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config
            .validate(&Path::root(YAML))
            .entries
            .iter()
            .map(|e| (e.context.to_string(), e.message.clone()))
            .collect()
    }

    #[test]
    fn test_boot_device_rules() {
        assert!(errors(indoc! {r#"
            variant: fcos
            version: 1.5.0
            boot_device:
              mirror:
                devices: [/dev/vda, /dev/vdb]
              luks:
                tpm2: true
        "#})
        .is_empty());

        assert_eq!(
            errors(indoc! {r#"
                boot_device:
                  layout: sparc
            "#}),
            vec![(
                "$.boot_device.layout".into(),
                SourceError::UnknownBootDeviceLayout.to_string()
            )]
        );

        assert_eq!(
            errors(indoc! {r#"
                boot_device:
                  mirror:
                    devices: [/dev/vda]
            "#}),
            vec![(
                "$.boot_device.mirror.devices".into(),
                SourceError::TooFewMirrorDevices.to_string()
            )]
        );

        assert_eq!(
            errors(indoc! {r#"
                boot_device:
                  layout: s390x-virt
                  mirror:
                    devices: [/dev/vda, /dev/vdb]
            "#}),
            vec![(
                "$.boot_device.layout".into(),
                SourceError::MirrorNotSupported.to_string()
            )]
        );

        assert_eq!(
            errors(indoc! {r#"
                boot_device:
                  layout: s390x-eckd
                  luks:
                    tang:
                      - url: http://tang.example.com
                        thumbprint: abc
            "#}),
            vec![(
                "$.boot_device.luks.device".into(),
                SourceError::NoLuksBootDevice.to_string()
            )]
        );
    }

    #[test]
    fn test_grub_users() {
        assert_eq!(
            errors(indoc! {r#"
                grub:
                  users:
                    - name: root
                      password_hash: grub.pbkdf2.sha512.10000.abc
                    - password_hash: grub.pbkdf2.sha512.10000.def
                    - name: admin
            "#}),
            vec![
                (
                    "$.grub.users.1.name".into(),
                    SourceError::GrubUserNameNotSpecified.to_string()
                ),
                (
                    "$.grub.users.2.password_hash".into(),
                    SourceError::GrubPasswordNotSpecified.to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_storage_rules() {
        let entries = errors(indoc! {r#"
            storage:
              disks:
                - device: /dev/disk/by-id/coreos-boot-disk
                  partitions:
                    - label: root
                      number: 4
                    - label: boot
                      number: 5
                - device: /dev/vdb
                  partitions:
                    - label: root
                      number: 1
              filesystems:
                - device: /dev/disk/by-label/data
                  format: xfs
                  path: /srv/data
                  with_mount_unit: true
                - device: /dev/disk/by-label/var
                  format: xfs
                  path: /var
                  with_mount_unit: true
        "#});
        assert_eq!(
            entries,
            vec![
                (
                    "$.storage.disks.0.partitions.1.number".into(),
                    SourceError::WrongPartitionNumber.to_string()
                ),
                (
                    "$.storage.filesystems.0.path".into(),
                    SourceError::MountPointForbidden.to_string()
                ),
            ]
        );
    }
}
