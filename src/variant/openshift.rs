//! OpenShift: Fedora CoreOS 1.5 translation wrapped in a MachineConfig, with
//! the restrictions of the Machine Config Operator.

use anyhow::Context;
use butane_api::{
    config::{fcos::v1_5, openshift::v4_15},
    error::SupportError,
    ignition::{keys, v3_4},
    machine_config::{self, MachineConfig},
    path::{Path, JSON, YAML},
    validate::Validate,
    Report, TranslationSet,
};
use log::debug;

use crate::{
    error::TranslateError,
    options::TranslateBytesOptions,
    translate::Translation,
    variant::{
        fcos,
        filters::{self, Filter},
        Source, Target,
    },
};

const DEFAULT_FILE_MODE: i32 = 0o644;
const FIPS_CIPHER_OPTION: &str = "--cipher";
const FIPS_CIPHER: &str = "aes-cbc-essiv:sha256";

/// User fields besides name, password hash and SSH keys.
const MCO_USER_FIELDS: &[&str] = &[
    "passwd.users.*.gecos",
    "passwd.users.*.groups",
    "passwd.users.*.homeDir",
    "passwd.users.*.noCreateHome",
    "passwd.users.*.noLogInit",
    "passwd.users.*.noUserGroup",
    "passwd.users.*.primaryGroup",
    "passwd.users.*.shell",
    "passwd.users.*.shouldExist",
    "passwd.users.*.system",
    "passwd.users.*.uid",
];

fn has_special_mode(mode: &serde_json::Value) -> bool {
    mode.as_i64().is_some_and(|mode| mode & 0o7000 != 0)
}

fn is_not_data_url(source: &serde_json::Value) -> bool {
    source.as_str().is_some_and(|source| !source.starts_with("data:"))
}

fn is_not_core(name: &serde_json::Value) -> bool {
    name.as_str().is_some_and(|name| name != "core")
}

fn is_btrfs(format: &serde_json::Value) -> bool {
    format.as_str() == Some("btrfs")
}

fn is_none_format(format: &serde_json::Value) -> bool {
    format.as_str() == Some("none")
}

/// Features the Machine Config Operator does not apply.
fn mco_filters() -> Vec<Filter> {
    let mut filters = vec![
        Filter::present("storage.directories", SupportError::Directory),
        Filter::present("storage.files.*.append", SupportError::FileAppend),
        Filter::present("storage.links", SupportError::Link),
        Filter {
            pattern: "storage.files.*.contents.source",
            error: SupportError::FileSchemeNotData,
            check: is_not_data_url,
        },
        Filter {
            pattern: "storage.files.*.mode",
            error: SupportError::FileSpecialMode,
            check: has_special_mode,
        },
        Filter {
            pattern: "storage.filesystems.*.format",
            error: SupportError::Btrfs,
            check: is_btrfs,
        },
        Filter {
            pattern: "storage.filesystems.*.format",
            error: SupportError::FilesystemNone,
            check: is_none_format,
        },
        Filter {
            pattern: "passwd.users.*.name",
            error: SupportError::UserName,
            check: is_not_core,
        },
        Filter::present("passwd.groups", SupportError::Group),
    ];
    filters.extend(
        MCO_USER_FIELDS
            .iter()
            .map(|pattern| Filter::present(pattern, SupportError::UserField)),
    );
    filters
}

/// Output of the OpenShift variant: a MachineConfig, or in raw mode only the
/// Ignition config it would carry.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenShiftOutput {
    MachineConfig(MachineConfig),
    Raw(v3_4::Config),
}

impl Target for OpenShiftOutput {
    fn validate_target(&self) -> Result<Report, TranslateError> {
        match self {
            OpenShiftOutput::MachineConfig(mc) => {
                let c = Path::root(JSON).append("spec").append("config");
                let mut r = mc.spec.config.validate(&c);
                let value = serde_json::to_value(&mc.spec.config)
                    .context("Failed to serialize generated config")?;
                r.merge(keys::check_duplicates(&value, &c));
                Ok(r)
            }
            OpenShiftOutput::Raw(config) => config.validate_target(),
        }
    }

    fn encode(&self, pretty: bool) -> Result<Vec<u8>, TranslateError> {
        match self {
            OpenShiftOutput::MachineConfig(mc) => Ok(serde_yaml::to_string(mc)
                .context("Failed to encode MachineConfig")?
                .into_bytes()),
            OpenShiftOutput::Raw(config) => config.encode(pretty),
        }
    }
}

/// MCO requires every file to carry a mode.
fn default_file_modes(config: &mut v3_4::Config, ts: &mut TranslationSet) {
    let files = Path::root(JSON).append("storage").append("files");
    for (i, file) in config.storage.files.iter_mut().enumerate() {
        if file.mode.is_some() {
            continue;
        }
        file.mode = Some(DEFAULT_FILE_MODE);
        let at = files.append(i);
        if let Some(from) = ts.nearest(&at).map(|t| t.from.clone()) {
            ts.add(from, at.append("mode"));
        }
    }
}

/// Pins a FIPS-approved cipher on LUKS volumes that do not choose one.
fn fips_ciphers(config: &mut v3_4::Config, ts: &mut TranslationSet) {
    let fips = Path::root(YAML).append("openshift").append("fips");
    let volumes = Path::root(JSON).append("storage").append("luks");
    for (i, luks) in config.storage.luks.iter_mut().enumerate() {
        if luks
            .options
            .iter()
            .any(|option| option.starts_with(FIPS_CIPHER_OPTION))
        {
            continue;
        }
        debug!("Setting FIPS cipher on LUKS volume '{}'", luks.name);
        let options = volumes.append(i).append("options");
        if luks.options.is_empty() {
            ts.add(fips.clone(), options.clone());
        }
        for option in [FIPS_CIPHER_OPTION, FIPS_CIPHER] {
            ts.add(fips.clone(), options.append(luks.options.len()));
            luks.options.push(option.to_string());
        }
    }
}

/// Warns about MachineConfig-only fields that raw output drops.
fn elided_fields(openshift: &v4_15::OpenShift) -> Report {
    let c = Path::root(YAML).append("openshift");
    let mut r = Report::new();
    let fields = [
        ("extensions", !openshift.extensions.is_empty()),
        ("fips", openshift.fips == Some(true)),
        ("kernel_arguments", !openshift.kernel_arguments.is_empty()),
        (
            "kernel_type",
            openshift
                .kernel_type
                .as_deref()
                .is_some_and(|kernel_type| !matches!(kernel_type, "" | "default")),
        ),
    ];
    for (field, set) in fields {
        if set {
            r.add_warn(c.append(field), SupportError::FieldElided);
        }
    }
    r
}

/// Attributes the MachineConfig envelope to the source fields it comes from.
fn envelope_translations(metadata: &v4_15::Metadata, openshift: &v4_15::OpenShift) -> TranslationSet {
    let mut ts = TranslationSet::new(YAML, JSON);
    let version = Path::root(YAML).append("version");
    let spec = Path::root(JSON).append("spec");
    for to in ["apiVersion", "kind", "spec"] {
        ts.add(version.clone(), Path::root(JSON).append(to));
    }
    ts.add(version, spec.append("config"));

    let from = Path::root(YAML).append("metadata");
    let to = Path::root(JSON).append("metadata");
    ts.add(from.clone(), to.clone());
    ts.add(from.append("name"), to.append("name"));
    if !metadata.labels.is_empty() {
        ts.add(from.append("labels"), to.append("labels"));
        for key in metadata.labels.keys() {
            ts.add(
                from.append("labels").append(key),
                to.append("labels").append(key),
            );
        }
    }

    let from = Path::root(YAML).append("openshift");
    for (field, target, items) in [
        ("extensions", "extensions", openshift.extensions.len()),
        ("kernel_arguments", "kernelArguments", openshift.kernel_arguments.len()),
    ] {
        if items > 0 {
            ts.add(from.append(field), spec.append(target));
            for i in 0..items {
                ts.add(from.append(field).append(i), spec.append(target).append(i));
            }
        }
    }
    if openshift.fips.is_some() {
        ts.add(from.append("fips"), spec.append("fips"));
    }
    if openshift.kernel_type.is_some() {
        ts.add(from.append("kernel_type"), spec.append("kernelType"));
    }
    ts
}

impl Source for v4_15::Config {
    type Target = OpenShiftOutput;

    fn translate(
        self,
        options: &TranslateBytesOptions,
    ) -> Result<Translation<Self::Target>, TranslateError> {
        let v4_15::Config {
            variant,
            version,
            metadata,
            openshift,
            ignition,
            kernel_arguments,
            passwd,
            storage,
            systemd,
            boot_device,
        } = self;
        let coreos = v1_5::Config {
            variant,
            version,
            ignition,
            kernel_arguments,
            passwd,
            storage,
            systemd,
            boot_device,
            grub: Default::default(),
        };
        let (mut config, mut ts, mut r) =
            fcos::translate::<_, v3_4::Luks, _>(&coreos, &options.translate, v3_4::VERSION)?;

        default_file_modes(&mut config, &mut ts);
        if openshift.fips == Some(true) {
            fips_ciphers(&mut config, &mut ts);
        }
        r.merge(filters::apply(&mco_filters(), &config, &ts)?);

        if options.raw {
            r.merge(elided_fields(&openshift));
            return Ok((OpenShiftOutput::Raw(config), ts, r));
        }

        let mut mc_ts = ts.prefix(
            &Path::root(YAML),
            &Path::root(JSON).append("spec").append("config"),
        );
        mc_ts.merge(envelope_translations(&metadata, &openshift));
        let mc = MachineConfig {
            api_version: machine_config::API_VERSION.into(),
            kind: machine_config::KIND.into(),
            metadata: machine_config::Metadata {
                name: metadata.name,
                labels: metadata.labels,
            },
            spec: machine_config::Spec {
                config,
                extensions: openshift.extensions,
                fips: openshift.fips,
                kernel_arguments: openshift.kernel_arguments,
                kernel_type: openshift.kernel_type,
            },
        };
        Ok((OpenShiftOutput::MachineConfig(mc), mc_ts, r))
    }
}

#[cfg(test)]
mod tests {
    use butane_api::path;
    use indoc::indoc;
    use maplit::btreemap;
    use pretty_assertions::assert_eq;

    use super::*;

    fn source(yaml: &str) -> v4_15::Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    const BASE: &str = indoc! {r#"
        variant: openshift
        version: 4.15.0
        metadata:
          name: 99-worker-custom
          labels:
            machineconfiguration.openshift.io/role: worker
    "#};

    #[test]
    fn test_machine_config() {
        let config = source(&format!(
            "{BASE}{}",
            indoc! {r#"
                openshift:
                  kernel_arguments: [nosmt]
                  fips: true
                storage:
                  files:
                    - path: /etc/motd
                      contents:
                        inline: hi
                  luks:
                    - name: data
                      device: /dev/vdb
            "#}
        ));
        let (output, ts, r) = config
            .translate(&TranslateBytesOptions::default())
            .unwrap();
        assert!(r.is_empty(), "{r}");
        let OpenShiftOutput::MachineConfig(mc) = output else {
            panic!("expected a MachineConfig");
        };
        assert_eq!(mc.metadata.name, "99-worker-custom");
        assert_eq!(
            mc.metadata.labels,
            btreemap! {
                "machineconfiguration.openshift.io/role".to_string() => "worker".to_string()
            }
        );
        assert_eq!(mc.spec.kernel_arguments, vec!["nosmt"]);
        assert_eq!(mc.spec.config.ignition.version, "3.4.0");
        assert_eq!(mc.spec.config.storage.files[0].mode, Some(0o644));
        assert_eq!(
            mc.spec.config.storage.luks[0].options,
            vec!["--cipher", "aes-cbc-essiv:sha256"]
        );

        assert_eq!(
            ts.get(&path!(JSON, "spec", "config", "storage", "files", 0, "path"))
                .unwrap()
                .from,
            path!(YAML, "storage", "files", 0, "path")
        );
        assert_eq!(
            ts.get(&path!(JSON, "spec", "config", "storage", "luks", 0, "options", 1))
                .unwrap()
                .from,
            path!(YAML, "openshift", "fips")
        );
        assert_eq!(
            ts.get(&path!(JSON, "spec", "kernelArguments", 0)).unwrap().from,
            path!(YAML, "openshift", "kernel_arguments", 0)
        );
        ts.debug_verify_coverage(&serde_json::to_value(&mc).unwrap())
            .unwrap();

        let encoded = String::from_utf8(OpenShiftOutput::MachineConfig(mc).encode(false).unwrap())
            .unwrap();
        assert!(encoded.starts_with("apiVersion: machineconfiguration.openshift.io/v1\n"));
    }

    #[test]
    fn test_explicit_cipher_kept() {
        let mut config = v3_4::Config {
            storage: v3_4::Storage {
                luks: vec![v3_4::Luks {
                    name: "data".into(),
                    options: vec!["--cipher=aes-xts-plain64".into()],
                    ..Default::default()
                }],
                ..Default::default()
            },
            ..Default::default()
        };
        let mut ts = TranslationSet::new(YAML, JSON);
        fips_ciphers(&mut config, &mut ts);
        assert_eq!(config.storage.luks[0].options, vec!["--cipher=aes-xts-plain64"]);
        assert!(ts.is_empty());
    }

    #[test]
    fn test_raw() {
        let config = source(&format!(
            "{BASE}{}",
            indoc! {r#"
                openshift:
                  kernel_type: realtime
                  extensions: [usbguard]
            "#}
        ));
        let (output, _, r) = config
            .translate(&TranslateBytesOptions::default().with_raw(true))
            .unwrap();
        let OpenShiftOutput::Raw(ignition) = output else {
            panic!("expected a raw Ignition config");
        };
        assert_eq!(ignition.ignition.version, "3.4.0");
        let warnings: Vec<String> = r.entries.iter().map(|e| e.context.to_string()).collect();
        assert_eq!(
            warnings,
            vec!["$.openshift.extensions", "$.openshift.kernel_type"]
        );
        assert!(!r.is_fatal());
    }

    #[test]
    fn test_raw_default_values_not_elided() {
        let config = source(&format!(
            "{BASE}{}",
            indoc! {r#"
                openshift:
                  fips: false
                  kernel_type: default
            "#}
        ));
        let (_, _, r) = config
            .translate(&TranslateBytesOptions::default().with_raw(true))
            .unwrap();
        assert!(r.is_empty(), "{r}");

        let config = source(&format!(
            "{BASE}{}",
            indoc! {r#"
                openshift:
                  fips: true
                  kernel_type: ""
            "#}
        ));
        let (_, _, r) = config
            .translate(&TranslateBytesOptions::default().with_raw(true))
            .unwrap();
        let warnings: Vec<String> = r.entries.iter().map(|e| e.context.to_string()).collect();
        assert_eq!(warnings, vec!["$.openshift.fips"]);
    }

    #[test]
    fn test_mco_filters() {
        let config = source(&format!(
            "{BASE}{}",
            indoc! {r#"
                passwd:
                  users:
                    - name: core
                      ssh_authorized_keys: [ssh-ed25519 AAAA]
                    - name: bovik
                      shell: /bin/zsh
                storage:
                  directories:
                    - path: /etc/foo
                  files:
                    - path: /usr/local/bin/tool
                      mode: 04755
                      contents:
                        source: https://example.com/tool
                  filesystems:
                    - device: /dev/vdb
                      format: btrfs
            "#}
        ));
        let (_, _, r) = config
            .translate(&TranslateBytesOptions::default())
            .unwrap();
        let entries: Vec<(String, String)> = r
            .entries
            .iter()
            .map(|e| (e.context.to_string(), e.message.clone()))
            .collect();
        assert_eq!(
            entries,
            vec![
                (
                    "$.passwd.users.1.name".to_string(),
                    SupportError::UserName.to_string()
                ),
                (
                    "$.passwd.users.1.shell".to_string(),
                    SupportError::UserField.to_string()
                ),
                (
                    "$.storage.directories".to_string(),
                    SupportError::Directory.to_string()
                ),
                (
                    "$.storage.files.0.contents.source".to_string(),
                    SupportError::FileSchemeNotData.to_string()
                ),
                (
                    "$.storage.files.0.mode".to_string(),
                    SupportError::FileSpecialMode.to_string()
                ),
                (
                    "$.storage.filesystems.0.format".to_string(),
                    SupportError::Btrfs.to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_validate_target_paths() {
        let mc = MachineConfig {
            spec: machine_config::Spec {
                config: v3_4::Config {
                    storage: v3_4::Storage {
                        files: vec![v3_4::File {
                            path: "relative".into(),
                            ..Default::default()
                        }],
                        ..Default::default()
                    },
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let r = OpenShiftOutput::MachineConfig(mc).validate_target().unwrap();
        assert_eq!(
            r.entries[0].context,
            path!(JSON, "spec", "config", "storage", "files", 0, "path")
        );
    }
}
