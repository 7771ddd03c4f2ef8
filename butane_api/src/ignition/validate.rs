//! Structural validation of generated Ignition configs.

use lazy_static::lazy_static;
use regex::Regex;
use semver::Version;
use sysdefs::filesystems::FilesystemFormat;
use url::Url;

use super::{
    decode_contents,
    v3_4::{
        Clevis, Config, Directory, Disk, Dropin, File, Filesystem, Ignition, KernelArguments,
        Link, Luks, Partition, Passwd, PasswdGroup, PasswdUser, Raid, Resource, Storage,
        Systemd, Tang, Unit,
    },
    v3_5,
};
use crate::{error::IgnitionError, path::Path, report::Report, validate::Validate};

const SCHEMES: &[&str] = &["http", "https", "tftp", "s3", "gs", "arn", "data"];

const RAID_LEVELS: &[&str] = &[
    "linear", "raid0", "0", "stripe", "raid1", "1", "mirror", "raid4", "4", "raid5", "5",
    "raid6", "6", "raid10", "10",
];

const UNIT_SUFFIXES: &[&str] = &[
    ".service",
    ".socket",
    ".device",
    ".mount",
    ".automount",
    ".swap",
    ".target",
    ".path",
    ".timer",
    ".snapshot",
    ".slice",
    ".scope",
];

const MAX_PARTITION_LABEL_LEN: usize = 36;

lazy_static! {
    static ref HASH: Regex = Regex::new(r"^([a-z0-9]+)-([0-9a-fA-F]*)$").unwrap();
}

impl<L: Validate> Validate for Config<L> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.ignition.validate(&c.append("ignition"));
        r.merge(
            self.kernel_arguments
                .validate(&c.append("kernelArguments")),
        );
        r.merge(self.passwd.validate(&c.append("passwd")));
        r.merge(self.storage.validate(&c.append("storage")));
        r.merge(self.systemd.validate(&c.append("systemd")));
        r
    }
}

impl Validate for Ignition {
    fn validate(&self, c: &Path) -> Report {
        let version = Version::parse(&self.version).ok();
        let config = c.append("config");
        let mut r = Report::new();
        for (i, resource) in self.config.merge.iter().enumerate() {
            let at = config.append("merge").append(i);
            r.merge(resource.validate(&at));
            check_nested_version(resource, version.as_ref(), &at, &mut r);
        }
        if self.config.replace != Resource::default() {
            let at = config.append("replace");
            r.merge(self.config.replace.validate(&at));
            check_nested_version(&self.config.replace, version.as_ref(), &at, &mut r);
        }
        r.merge(
            self.security
                .tls
                .certificate_authorities
                .validate(&c.append("security").append("tls").append("certificateAuthorities")),
        );
        r
    }
}

/// Warns when an embedded config declares a newer spec than the one being
/// generated.
fn check_nested_version(resource: &Resource, version: Option<&Version>, c: &Path, r: &mut Report) {
    let (Some(version), Some(source)) = (version, resource.source.as_deref()) else {
        return;
    };
    let Some(contents) = decode_contents(source, resource.compression.as_deref()) else {
        return;
    };
    let Ok(nested) = serde_json::from_slice::<serde_json::Value>(&contents) else {
        return;
    };
    let Some(nested_version) = nested
        .get("ignition")
        .and_then(|i| i.get("version"))
        .and_then(|v| v.as_str())
    else {
        return;
    };
    if Version::parse(nested_version).is_ok_and(|nested| nested > *version) {
        r.add_warn(
            c.append("source"),
            IgnitionError::UnknownIgnitionVersion {
                version: nested_version.to_string(),
            },
        );
    }
}

impl Validate for Resource {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if let Some(source) = self.source.as_deref() {
            match Url::parse(source) {
                Err(_) => r.add_error(c.append("source"), IgnitionError::InvalidUrl),
                Ok(url) if !SCHEMES.contains(&url.scheme()) => {
                    r.add_error(c.append("source"), IgnitionError::InvalidScheme)
                }
                Ok(url) if url.scheme() == "data" && super::decode_data_url(source).is_none() => {
                    r.add_error(c.append("source"), IgnitionError::InvalidDataUrl)
                }
                Ok(_) => {}
            }
        }
        if !matches!(self.compression.as_deref(), None | Some("") | Some("gzip")) {
            r.add_error(c.append("compression"), IgnitionError::CompressionInvalid);
        }
        if let Some(hash) = self.verification.hash.as_deref() {
            if let Some(err) = check_hash(hash) {
                r.add_error(c.append("verification").append("hash"), err);
            }
        }
        r
    }
}

fn check_hash(hash: &str) -> Option<IgnitionError> {
    let Some(captures) = HASH.captures(hash) else {
        return Some(IgnitionError::HashMalformed);
    };
    let expected = match &captures[1] {
        "sha256" => 64,
        "sha512" => 128,
        _ => return Some(IgnitionError::HashUnrecognized),
    };
    (captures[2].len() != expected).then_some(IgnitionError::HashWrongSize)
}

fn check_absolute(path: &str, c: &Path, r: &mut Report) {
    if !path.starts_with('/') {
        r.add_error(c.clone(), IgnitionError::PathRelative);
    }
}

fn check_node_mode(mode: Option<i32>, c: &Path, r: &mut Report) {
    if mode.is_some_and(|mode| !(0..=0o7777).contains(&mode)) {
        r.add_error(c.clone(), IgnitionError::IllegalFileMode);
    }
}

impl Validate for KernelArguments {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        for (i, arg) in self.should_not_exist.iter().enumerate() {
            if self.should_exist.contains(arg) {
                r.add_error(
                    c.append("shouldNotExist").append(i),
                    IgnitionError::KernelArgumentConflict,
                );
            }
        }
        r
    }
}

impl Validate for Passwd {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.users.validate(&c.append("users"));
        r.merge(self.groups.validate(&c.append("groups")));
        r
    }
}

impl Validate for PasswdUser {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), IgnitionError::NameRequired);
        }
        r
    }
}

impl Validate for PasswdGroup {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), IgnitionError::NameRequired);
        }
        r
    }
}

impl<L: Validate> Validate for Storage<L> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.directories.validate(&c.append("directories"));
        r.merge(self.disks.validate(&c.append("disks")));
        r.merge(self.files.validate(&c.append("files")));
        r.merge(self.filesystems.validate(&c.append("filesystems")));
        r.merge(self.links.validate(&c.append("links")));
        r.merge(self.luks.validate(&c.append("luks")));
        r.merge(self.raid.validate(&c.append("raid")));
        r
    }
}

impl Validate for Disk {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.device.is_empty() {
            r.add_error(c.append("device"), IgnitionError::DeviceRequired);
        } else {
            check_absolute(&self.device, &c.append("device"), &mut r);
        }
        r.merge(self.partitions.validate(&c.append("partitions")));
        r
    }
}

impl Validate for Partition {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self
            .label
            .as_deref()
            .is_some_and(|label| label.chars().count() > MAX_PARTITION_LABEL_LEN)
        {
            r.add_error(c.append("label"), IgnitionError::PartitionLabelTooLong);
        }
        r
    }
}

impl Validate for File {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        check_absolute(&self.path, &c.append("path"), &mut r);
        check_node_mode(self.mode, &c.append("mode"), &mut r);
        if self.overwrite == Some(true) && self.contents.source.is_none() {
            r.add_error(c.append("overwrite"), IgnitionError::OverwriteWithoutSource);
        }
        r.merge(self.contents.validate(&c.append("contents")));
        r.merge(self.append.validate(&c.append("append")));
        r
    }
}

impl Validate for Directory {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        check_absolute(&self.path, &c.append("path"), &mut r);
        check_node_mode(self.mode, &c.append("mode"), &mut r);
        r
    }
}

impl Validate for Link {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        check_absolute(&self.path, &c.append("path"), &mut r);
        if self.target.as_deref().unwrap_or_default().is_empty() {
            r.add_error(c.append("target"), IgnitionError::LinkTargetRequired);
        }
        r
    }
}

impl Validate for Filesystem {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.device.is_empty() {
            r.add_error(c.append("device"), IgnitionError::DeviceRequired);
        } else {
            check_absolute(&self.device, &c.append("device"), &mut r);
        }
        if let Some(path) = self.path.as_deref() {
            check_absolute(path, &c.append("path"), &mut r);
        }
        let format = match self.format.as_deref() {
            None | Some("") => None,
            Some(name) => {
                let parsed = FilesystemFormat::parse(name);
                if parsed.is_none() {
                    r.add_error(c.append("format"), IgnitionError::InvalidFilesystemFormat);
                }
                parsed
            }
        };
        if let (Some(format), Some(label)) = (format, self.label.as_deref()) {
            if let Some(max) = format.max_label_len() {
                if label.chars().count() > max {
                    r.add_error(
                        c.append("label"),
                        IgnitionError::FilesystemLabelTooLong {
                            format: format.name().to_string(),
                            max,
                        },
                    );
                }
            }
        }
        r
    }
}

impl Validate for Raid {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), IgnitionError::NameRequired);
        }
        match self.level.as_deref() {
            None | Some("") => r.add_error(c.append("level"), IgnitionError::RaidLevelRequired),
            Some(level) if !RAID_LEVELS.contains(&level) => {
                r.add_error(c.append("level"), IgnitionError::UnrecognizedRaidLevel)
            }
            Some(_) => {}
        }
        r
    }
}

fn validate_luks_common(
    name: &str,
    device: Option<&str>,
    key_file: &Resource,
    clevis: &Clevis,
    c: &Path,
) -> Report {
    let mut r = Report::new();
    if name.is_empty() {
        r.add_error(c.append("name"), IgnitionError::NameRequired);
    }
    match device {
        None | Some("") => r.add_error(c.append("device"), IgnitionError::DeviceRequired),
        Some(device) => check_absolute(device, &c.append("device"), &mut r),
    }
    r.merge(key_file.validate(&c.append("keyFile")));
    r.merge(
        clevis
            .tang
            .validate(&c.append("clevis").append("tang")),
    );
    r
}

impl Validate for Luks {
    fn validate(&self, c: &Path) -> Report {
        validate_luks_common(
            &self.name,
            self.device.as_deref(),
            &self.key_file,
            &self.clevis,
            c,
        )
    }
}

impl Validate for v3_5::Luks {
    fn validate(&self, c: &Path) -> Report {
        let mut r = validate_luks_common(
            &self.name,
            self.device.as_deref(),
            &self.key_file,
            &self.clevis,
            c,
        );
        if self.cex.enabled == Some(true) {
            if self.clevis != Clevis::default() {
                r.add_error(c.append("cex"), IgnitionError::CexWithClevis);
            }
            if self.key_file.source.is_some() {
                r.add_error(c.append("keyFile"), IgnitionError::CexWithKeyFile);
            }
        }
        r
    }
}

impl Validate for Tang {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.url.is_empty() {
            r.add_error(c.append("url"), IgnitionError::TangUrlRequired);
        } else if Url::parse(&self.url).is_err() {
            r.add_error(c.append("url"), IgnitionError::InvalidUrl);
        }
        if self.thumbprint.as_deref().unwrap_or_default().is_empty() {
            r.add_error(c.append("thumbprint"), IgnitionError::TangThumbprintRequired);
        }
        r
    }
}

impl Validate for Systemd {
    fn validate(&self, c: &Path) -> Report {
        self.units.validate(&c.append("units"))
    }
}

impl Validate for Unit {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), IgnitionError::NameRequired);
        } else if !UNIT_SUFFIXES
            .iter()
            .any(|suffix| self.name.ends_with(suffix))
        {
            r.add_error(c.append("name"), IgnitionError::InvalidUnitExtension);
        }
        r.merge(self.dropins.validate(&c.append("dropins")));
        r
    }
}

impl Validate for Dropin {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), IgnitionError::NameRequired);
        } else if !self.name.ends_with(".conf") {
            r.add_error(c.append("name"), IgnitionError::InvalidDropinExtension);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{ignition::v3_4, path::JSON};

    fn entries(config: serde_json::Value) -> Vec<(String, String)> {
        let config: v3_4::Config = serde_json::from_value(config).unwrap();
        config
            .validate(&Path::root(JSON))
            .entries
            .into_iter()
            .map(|e| (e.context.to_string(), e.message))
            .collect()
    }

    #[test]
    fn test_valid_config() {
        assert!(entries(json!({
            "ignition": {"version": "3.4.0"},
            "storage": {
                "files": [{"path": "/etc/motd", "mode": 420, "contents": {"source": "data:,hi"}}],
                "filesystems": [{"device": "/dev/vda4", "format": "xfs", "label": "root"}],
                "raid": [{"name": "md-boot", "level": "raid1", "devices": ["/dev/vda3"]}]
            },
            "systemd": {"units": [{"name": "a.service", "dropins": [{"name": "b.conf"}]}]}
        }))
        .is_empty());
    }

    #[test]
    fn test_structural_errors() {
        assert_eq!(
            entries(json!({
                "storage": {
                    "files": [{
                        "path": "etc/motd",
                        "mode": 0o17777,
                        "contents": {"source": "ftp://example.com/x", "compression": "xz"}
                    }],
                    "links": [{"path": "/a"}],
                    "filesystems": [{"device": "/dev/vda", "format": "vfat", "label": "much-too-long"}]
                },
                "systemd": {"units": [{"name": "foo.txt"}]}
            })),
            vec![
                ("$.storage.files.0.path".into(), IgnitionError::PathRelative.to_string()),
                ("$.storage.files.0.mode".into(), IgnitionError::IllegalFileMode.to_string()),
                (
                    "$.storage.files.0.contents.source".into(),
                    IgnitionError::InvalidScheme.to_string()
                ),
                (
                    "$.storage.files.0.contents.compression".into(),
                    IgnitionError::CompressionInvalid.to_string()
                ),
                (
                    "$.storage.filesystems.0.label".into(),
                    IgnitionError::FilesystemLabelTooLong {
                        format: "vfat".into(),
                        max: 11
                    }
                    .to_string()
                ),
                (
                    "$.storage.links.0.target".into(),
                    IgnitionError::LinkTargetRequired.to_string()
                ),
                (
                    "$.systemd.units.0.name".into(),
                    IgnitionError::InvalidUnitExtension.to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_hash() {
        assert_eq!(check_hash(&format!("sha512-{}", "a".repeat(128))), None);
        assert_eq!(check_hash(&format!("sha256-{}", "0".repeat(64))), None);
        assert_eq!(check_hash("sha512"), Some(IgnitionError::HashMalformed));
        assert_eq!(check_hash("md5-abc"), Some(IgnitionError::HashUnrecognized));
        assert_eq!(check_hash("sha256-abc"), Some(IgnitionError::HashWrongSize));
    }

    #[test]
    fn test_nested_version() {
        let nested = r#"{"ignition":{"version":"3.6.0"}}"#;
        let source = format!(
            "data:,{}",
            percent_encoding::utf8_percent_encode(nested, percent_encoding::NON_ALPHANUMERIC)
        );
        let r = entries(json!({
            "ignition": {"version": "3.4.0", "config": {"merge": [{"source": source}]}}
        }));
        assert_eq!(
            r,
            vec![(
                "$.ignition.config.merge.0.source".into(),
                IgnitionError::UnknownIgnitionVersion {
                    version: "3.6.0".into()
                }
                .to_string()
            )]
        );
    }

    #[test]
    fn test_cex() {
        let luks: v3_5::Luks = serde_json::from_value(json!({
            "name": "root",
            "device": "/dev/dasda2",
            "cex": {"enabled": true},
            "clevis": {"tpm2": true}
        }))
        .unwrap();
        let r = luks.validate(&path!(JSON, "storage", "luks", 0));
        assert_eq!(r.entries.len(), 1);
        assert_eq!(r.entries[0].message, IgnitionError::CexWithClevis.to_string());
    }
}
