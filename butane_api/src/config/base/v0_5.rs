use serde::{Deserialize, Serialize};

use crate::{
    config::mode,
    error::SourceError,
    path::Path,
    report::Report,
    validate::Validate,
};

/// Base schema 0.5. `L` is the LUKS volume record, which later schema
/// versions extend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config<L = Luks> {
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
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ignition {
    #[serde(default)]
    pub config: IgnitionConfig,
    #[serde(default)]
    pub proxy: Proxy,
    #[serde(default)]
    pub security: Security,
    #[serde(default)]
    pub timeouts: Timeouts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnitionConfig {
    /// Configs merged on top of this one by the provisioning agent.
    #[serde(default)]
    pub merge: Vec<Resource>,
    /// Config that replaces this one entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_proxy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_proxy: Option<String>,
    #[serde(default)]
    pub no_proxy: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Security {
    #[serde(default)]
    pub tls: Tls,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tls {
    #[serde(default)]
    pub certificate_authorities: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_response_headers: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_total: Option<i64>,
}

/// Contents for a file, a config, or a certificate authority. At most one of
/// `source`, `inline` and `local` may be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// URL of the contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Literal contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<String>,
    /// Path of a file under the files-dir whose contents are embedded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<String>,
    #[serde(default)]
    pub http_headers: Vec<HttpHeader>,
    #[serde(default)]
    pub verification: Verification,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KernelArguments {
    #[serde(default)]
    pub should_exist: Vec<String>,
    #[serde(default)]
    pub should_not_exist: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Passwd {
    #[serde(default)]
    pub users: Vec<PasswdUser>,
    #[serde(default)]
    pub groups: Vec<PasswdGroup>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswdUser {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default)]
    pub ssh_authorized_keys: Vec<String>,
    /// Files under the files-dir holding one authorized key per line.
    #[serde(default)]
    pub ssh_authorized_keys_local: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gecos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_create_home: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_group: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_user_group: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_log_init: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_exist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PasswdGroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gid: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_exist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "L: Serialize", deserialize = "L: Deserialize<'de>"))]
pub struct Storage<L = Luks> {
    #[serde(default)]
    pub directories: Vec<Directory>,
    #[serde(default)]
    pub disks: Vec<Disk>,
    #[serde(default)]
    pub files: Vec<File>,
    #[serde(default)]
    pub filesystems: Vec<Filesystem>,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub luks: Vec<L>,
    #[serde(default)]
    pub raid: Vec<Raid>,
    /// Local directories expanded into files, directories and links.
    #[serde(default)]
    pub trees: Vec<Tree>,
}

impl<L> Default for Storage<L> {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            disks: Vec::new(),
            files: Vec::new(),
            filesystems: Vec::new(),
            links: Vec::new(),
            luks: Vec::new(),
            raid: Vec::new(),
            trees: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_table: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Partition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resize: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_exist: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_mib: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_mib: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_guid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_partition_entry: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Raid {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default)]
    pub devices: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spares: Option<i64>,
    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filesystem {
    pub device: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub mount_options: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_filesystem: Option<bool>,
    /// Generate a systemd mount (or swap) unit for this filesystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_mount_unit: Option<bool>,
}

/// Owner of a filesystem node, by id or by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub user: Owner,
    #[serde(default)]
    pub group: Owner,
    #[serde(
        default,
        deserialize_with = "mode::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<i32>,
    #[serde(default)]
    pub contents: Resource,
    #[serde(default)]
    pub append: Vec<Resource>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Directory {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub user: Owner,
    #[serde(default)]
    pub group: Owner,
    #[serde(
        default,
        deserialize_with = "mode::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub user: Owner,
    #[serde(default)]
    pub group: Owner,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hard: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Luks {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub clevis: Clevis,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard: Option<bool>,
    #[serde(default)]
    pub key_file: Resource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub open_options: Vec<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wipe_volume: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Clevis {
    #[serde(default)]
    pub custom: ClevisCustom,
    #[serde(default)]
    pub tang: Vec<Tang>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tpm2: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClevisCustom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub needs_network: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tang {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertisement: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    /// Directory under the files-dir.
    #[serde(default)]
    pub local: String,
    /// Destination prefix; defaults to `/`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(
        default,
        deserialize_with = "mode::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_mode: Option<i32>,
    #[serde(
        default,
        deserialize_with = "mode::deserialize",
        skip_serializing_if = "Option::is_none"
    )]
    pub dir_mode: Option<i32>,
    #[serde(default)]
    pub user: Owner,
    #[serde(default)]
    pub group: Owner,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Systemd {
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    /// File under the files-dir holding the unit body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents_local: Option<String>,
    #[serde(default)]
    pub dropins: Vec<Dropin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dropin {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contents_local: Option<String>,
}

impl<L: Validate> Validate for Config<L> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.ignition.validate(&c.append("ignition"));
        r.merge(self.storage.validate(&c.append("storage")));
        r.merge(self.systemd.validate(&c.append("systemd")));
        r
    }
}

impl Validate for Ignition {
    fn validate(&self, c: &Path) -> Report {
        let config = c.append("config");
        let mut r = self.config.merge.validate(&config.append("merge"));
        r.merge(self.config.replace.validate(&config.append("replace")));
        r.merge(
            self.security
                .tls
                .certificate_authorities
                .validate(&c.append("security").append("tls").append("certificate_authorities")),
        );
        r
    }
}

impl Validate for Resource {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        let mut sources = 0;
        let mut field = "";
        if self.local.is_some() {
            sources += 1;
            field = "local";
        }
        if self.inline.is_some() {
            sources += 1;
            field = "inline";
        }
        if self.source.is_some() {
            sources += 1;
            field = "source";
        }
        if sources > 1 {
            r.add_error(c.append(field), SourceError::TooManyResourceSources);
        }
        r
    }
}

impl<L: Validate> Validate for Storage<L> {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.directories.validate(&c.append("directories"));
        r.merge(self.files.validate(&c.append("files")));
        r.merge(self.filesystems.validate(&c.append("filesystems")));
        r.merge(self.luks.validate(&c.append("luks")));
        r.merge(self.trees.validate(&c.append("trees")));
        r
    }
}

fn check_mode(mode: Option<i32>, c: &Path, r: &mut Report) {
    if mode.is_some_and(mode::is_probably_decimal) {
        r.add_warn(c.clone(), SourceError::DecimalMode);
    }
}

impl Validate for File {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        check_mode(self.mode, &c.append("mode"), &mut r);
        r.merge(self.contents.validate(&c.append("contents")));
        r.merge(self.append.validate(&c.append("append")));
        r
    }
}

impl Validate for Directory {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        check_mode(self.mode, &c.append("mode"), &mut r);
        r
    }
}

impl Validate for Filesystem {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.with_mount_unit != Some(true) {
            return r;
        }
        match self.format.as_deref() {
            None | Some("") => r.add_error(c.append("format"), SourceError::MountUnitNoFormat),
            Some("swap") => {}
            Some(_) => {
                if self.path.as_deref().unwrap_or_default().is_empty() {
                    r.add_error(c.append("path"), SourceError::MountUnitNoPath);
                }
            }
        }
        r
    }
}

impl Validate for Luks {
    fn validate(&self, c: &Path) -> Report {
        self.key_file.validate(&c.append("key_file"))
    }
}

impl Validate for Tree {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.local.is_empty() {
            r.add_error(c.append("local"), SourceError::TreeNoLocal);
        }
        check_mode(self.file_mode, &c.append("file_mode"), &mut r);
        check_mode(self.dir_mode, &c.append("dir_mode"), &mut r);
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
        if self.contents.is_some() && self.contents_local.is_some() {
            r.add_error(c.append("contents_local"), SourceError::TooManySystemdSources);
        }
        r.merge(self.dropins.validate(&c.append("dropins")));
        r
    }
}

impl Validate for Dropin {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.contents.is_some() && self.contents_local.is_some() {
            r.add_error(c.append("contents_local"), SourceError::TooManySystemdSources);
        }
        r
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::path::YAML;

    fn messages(r: &Report) -> Vec<(String, String)> {
        r.entries
            .iter()
            .map(|e| (e.context.to_string(), e.message.clone()))
            .collect()
    }

    #[test]
    fn test_resource_tie_break() {
        let resource = Resource {
            source: Some("data:,x".into()),
            inline: Some("x".into()),
            ..Default::default()
        };
        let r = resource.validate(&path!(YAML, "contents"));
        assert_eq!(
            messages(&r),
            vec![(
                "$.contents.source".into(),
                SourceError::TooManyResourceSources.to_string()
            )]
        );

        let resource = Resource {
            inline: Some("x".into()),
            local: Some("x".into()),
            ..Default::default()
        };
        let r = resource.validate(&path!(YAML, "contents"));
        assert_eq!(r.entries[0].context, path!(YAML, "contents", "inline"));

        let resource = Resource {
            local: Some("x".into()),
            ..Default::default()
        };
        assert!(resource.validate(&Path::root(YAML)).is_empty());
    }

    #[test]
    fn test_filesystem_mount_unit_requirements() {
        let c = path!(YAML, "storage", "filesystems", 0);
        let fs = Filesystem {
            device: "/dev/sda".into(),
            with_mount_unit: Some(true),
            ..Default::default()
        };
        assert_eq!(
            fs.validate(&c).entries[0].context,
            path!(YAML, "storage", "filesystems", 0, "format")
        );

        let fs = Filesystem {
            format: Some("ext4".into()),
            ..fs
        };
        assert_eq!(
            fs.validate(&c).entries[0].message,
            SourceError::MountUnitNoPath.to_string()
        );

        let swap = Filesystem {
            format: Some("swap".into()),
            ..fs.clone()
        };
        assert!(swap.validate(&c).is_empty());

        let without_unit = Filesystem {
            with_mount_unit: None,
            ..fs
        };
        assert!(without_unit.validate(&c).is_empty());
    }

    #[test]
    fn test_decode_and_validate() {
        let config: Config = serde_yaml::from_str(indoc! {r#"
            variant: fcos
            version: 1.5.0
            storage:
              files:
                - path: /etc/a
                  mode: 644
                  contents:
                    inline: hi
                    local: hi.txt
              trees:
                - path: /srv
            systemd:
              units:
                - name: a.service
                  contents: "[Unit]"
                  contents_local: a.service
        "#})
        .unwrap();
        assert_eq!(config.storage.files[0].mode, Some(644));

        let r = config.validate(&Path::root(YAML));
        assert_eq!(
            messages(&r),
            vec![
                (
                    "$.storage.files.0.mode".into(),
                    SourceError::DecimalMode.to_string()
                ),
                (
                    "$.storage.files.0.contents.inline".into(),
                    SourceError::TooManyResourceSources.to_string()
                ),
                (
                    "$.storage.trees.0.local".into(),
                    SourceError::TreeNoLocal.to_string()
                ),
                (
                    "$.systemd.units.0.contents_local".into(),
                    SourceError::TooManySystemdSources.to_string()
                ),
            ]
        );
        assert!(r.is_fatal());
    }
}
