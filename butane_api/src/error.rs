//! Catalog of diagnostics. Report entries carry these as their message text.

use serde::Serialize;

/// The document could not be routed to a registered schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoutingError {
    #[error("error parsing variant; must be specified")]
    NoVariant,
    #[error("error parsing version; must be a valid semver")]
    InvalidVersion { version: String },
    #[error("no translator exists for variant {variant} with version {version}")]
    UnknownVersion { variant: String, version: String },
}

/// The source document is not well-formed for its schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecodeError {
    #[error("config is not valid UTF-8")]
    InvalidUtf8,
    #[error("{message}")]
    Malformed { message: String },
    #[error("Unused key {key}")]
    UnusedKey { key: String },
}

/// Semantic problems in the source document found before translation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceError {
    #[error("only one of the following can be set: inline, local, source")]
    TooManyResourceSources,
    #[error("only one of the following can be set: contents, contents_local")]
    TooManySystemdSources,
    #[error("path is required if with_mount_unit is true and format is not swap")]
    MountUnitNoPath,
    #[error("format is required if with_mount_unit is true")]
    MountUnitNoFormat,
    #[error("path must be under /etc or /var if with_mount_unit is true")]
    MountPointForbidden,
    #[error("local is required")]
    TreeNoLocal,
    #[error("unreasonable mode would be reasonable if specified in octal; remember to add a leading zero")]
    DecimalMode,
    #[error("layout must be one of: aarch64, ppc64le, s390x-eckd, s390x-virt, s390x-zfcp, x86_64")]
    UnknownBootDeviceLayout,
    #[error("mirroring requires at least two devices")]
    TooFewMirrorDevices,
    #[error("mirroring not supported on layouts: s390x-eckd, s390x-zfcp, s390x-virt")]
    MirrorNotSupported,
    #[error("device is required for layouts: s390x-eckd, s390x-zfcp")]
    NoLuksBootDevice,
    #[error("when using cex the targeted architecture must match s390x")]
    CexArchitectureMismatch,
    #[error("cex cannot be combined with tang or tpm2")]
    CexWithClevis,
    #[error("field \"name\" is required")]
    GrubUserNameNotSpecified,
    #[error("field \"password_hash\" is required")]
    GrubPasswordNotSpecified,
    #[error("incorrect partition number; a new partition will be created using reserved label")]
    WrongPartitionNumber,
    #[error("metadata.name is required")]
    MissingMachineConfigName,
    #[error("metadata.labels.machineconfiguration.openshift.io/role is required")]
    MissingMachineConfigRole,
    #[error("must be empty, \"default\", or \"realtime\"")]
    InvalidKernelType,
}

/// Problems hit while translating, mostly while reading the files-dir.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TranslationError {
    #[error("local file paths are relative to a files directory that must be specified with -d/--files-dir")]
    NoFilesDir,
    #[error("local file path traverses outside the files directory")]
    FilesDirEscape,
    #[error("failed to read local file {path}: {reason}")]
    ReadLocal { path: String, reason: String },
    #[error("local file {path} is not valid UTF-8")]
    LocalNotUtf8 { path: String },
    #[error("root of tree must be a directory")]
    TreeNotDirectory,
    #[error("trees may only contain files, directories, and symlinks")]
    FileType,
    #[error("matching filesystem node has existing contents or different type")]
    NodeExists,
}

/// Structural problems in the generated target document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IgnitionError {
    #[error("duplicate entry defined")]
    Duplicate,
    #[error("path not absolute")]
    PathRelative,
    #[error("illegal file mode")]
    IllegalFileMode,
    #[error("invalid compression method")]
    CompressionInvalid,
    #[error("unable to parse url")]
    InvalidUrl,
    #[error("invalid url scheme")]
    InvalidScheme,
    #[error("invalid data url")]
    InvalidDataUrl,
    #[error("malformed hash specifier")]
    HashMalformed,
    #[error("unrecognized hash function")]
    HashUnrecognized,
    #[error("incorrect size for hash sum")]
    HashWrongSize,
    #[error("link target is required")]
    LinkTargetRequired,
    #[error("overwrite must be false if source is unspecified")]
    OverwriteWithoutSource,
    #[error("device is required")]
    DeviceRequired,
    #[error("name is required")]
    NameRequired,
    #[error("invalid filesystem format")]
    InvalidFilesystemFormat,
    #[error("partition labels may not exceed 36 characters")]
    PartitionLabelTooLong,
    #[error("filesystem labels cannot exceed {max} characters for {format}")]
    FilesystemLabelTooLong { format: String, max: usize },
    #[error("raid level is required")]
    RaidLevelRequired,
    #[error("unrecognized raid level")]
    UnrecognizedRaidLevel,
    #[error("url is required")]
    TangUrlRequired,
    #[error("thumbprint is required")]
    TangThumbprintRequired,
    #[error("cannot use cex with clevis")]
    CexWithClevis,
    #[error("cannot use key file with cex")]
    CexWithKeyFile,
    #[error("invalid systemd unit extension")]
    InvalidUnitExtension,
    #[error("invalid systemd drop-in extension")]
    InvalidDropinExtension,
    #[error("kernel argument cannot be both required and forbidden")]
    KernelArgumentConflict,
    #[error("unknown Ignition version {version}; the embedded config may not be understood")]
    UnknownIgnitionVersion { version: String },
}

/// Features the selected variant's downstream agent does not accept.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SupportError {
    #[error("directories are not supported in this spec version")]
    Directory,
    #[error("appending to files is not supported in this spec version")]
    FileAppend,
    #[error("links are not supported in this spec version")]
    Link,
    #[error("file contents source must be data URL in this spec version")]
    FileSchemeNotData,
    #[error("special mode bits are not supported in this spec version")]
    FileSpecialMode,
    #[error("users other than \"core\" are not supported in this spec version")]
    UserName,
    #[error("fields other than \"name\", \"ssh_authorized_keys\", and \"password_hash\" are not supported in this spec version")]
    UserField,
    #[error("groups are not supported in this spec version")]
    Group,
    #[error("btrfs is not supported in this spec version")]
    Btrfs,
    #[error("format \"none\" is not supported in this spec version")]
    FilesystemNone,
    #[error("disks are not supported in this spec version")]
    Disk,
    #[error("filesystems are not supported in this spec version")]
    Filesystem,
    #[error("luks is not supported in this spec version")]
    Luks,
    #[error("raid is not supported in this spec version")]
    Raid,
    #[error("field ignored in raw mode")]
    FieldElided,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            RoutingError::UnknownVersion {
                variant: "fcos".into(),
                version: "9.9.9".into()
            }
            .to_string(),
            "no translator exists for variant fcos with version 9.9.9"
        );
        assert_eq!(
            IgnitionError::FilesystemLabelTooLong {
                format: "xfs".into(),
                max: 12
            }
            .to_string(),
            "filesystem labels cannot exceed 12 characters for xfs"
        );
        assert_eq!(
            DecodeError::UnusedKey { key: "foo".into() }.to_string(),
            "Unused key foo"
        );
    }

    #[test]
    fn test_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&SourceError::TooManyResourceSources).unwrap(),
            "\"too-many-resource-sources\""
        );
    }
}
