use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::{
        base::v0_5::{Ignition, KernelArguments, Passwd, Storage, Systemd},
        fcos::{self, v1_5::BootDevice},
        openshift::ROLE_LABEL,
    },
    error::SourceError,
    path::Path,
    report::Report,
    validate::Validate,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub openshift: OpenShift,
    #[serde(default)]
    pub ignition: Ignition,
    #[serde(default)]
    pub kernel_arguments: KernelArguments,
    #[serde(default)]
    pub passwd: Passwd,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub systemd: Systemd,
    #[serde(default)]
    pub boot_device: BootDevice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Settings the Machine Config Operator applies outside of Ignition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpenShift {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fips: Option<bool>,
    #[serde(default)]
    pub kernel_arguments: Vec<String>,
    /// `default` or `realtime`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_type: Option<String>,
}

impl Validate for Config {
    fn validate(&self, c: &Path) -> Report {
        let mut r = self.metadata.validate(&c.append("metadata"));
        r.merge(self.openshift.validate(&c.append("openshift")));
        r.merge(self.ignition.validate(&c.append("ignition")));
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
        r
    }
}

impl Validate for Metadata {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if self.name.is_empty() {
            r.add_error(c.append("name"), SourceError::MissingMachineConfigName);
        }
        if self.labels.get(ROLE_LABEL).map_or(true, |role| role.is_empty()) {
            r.add_error(c.append("labels"), SourceError::MissingMachineConfigRole);
        }
        r
    }
}

impl Validate for OpenShift {
    fn validate(&self, c: &Path) -> Report {
        let mut r = Report::new();
        if !matches!(
            self.kernel_type.as_deref(),
            None | Some("") | Some("default") | Some("realtime")
        ) {
            r.add_error(c.append("kernel_type"), SourceError::InvalidKernelType);
        }
        r
    }
}
