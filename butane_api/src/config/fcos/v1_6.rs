//! Fedora CoreOS 1.6: adds IBM Crypto Express (CEX) binding for LUKS volumes
//! and for the boot device.

use serde::{Deserialize, Serialize};

pub use super::v1_5::{BootDeviceMirror, Grub, GrubUser};
use crate::config::{
    base::{
        v0_5::Tang,
        v0_6::{Cex, Luks},
    },
    fcos::BootLuks,
};

pub type Config = super::v1_5::Config<Luks, BootDeviceLuks>;
pub type BootDevice = super::v1_5::BootDevice<BootDeviceLuks>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BootDeviceLuks {
    #[serde(default)]
    pub cex: Cex,
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

    fn cex(&self) -> Option<bool> {
        self.cex.enabled
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::{
        error::SourceError,
        path::{Path, YAML},
        validate::Validate,
    };

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
    fn test_cex() {
        assert!(errors(indoc! {r#"
            boot_device:
              layout: s390x-eckd
              luks:
                device: /dev/dasda
                cex:
                  enabled: true
        "#})
        .is_empty());

        assert_eq!(
            errors(indoc! {r#"
                boot_device:
                  luks:
                    tpm2: true
                    cex:
                      enabled: true
            "#}),
            vec![
                (
                    "$.boot_device.layout".into(),
                    SourceError::CexArchitectureMismatch.to_string()
                ),
                (
                    "$.boot_device.luks.cex".into(),
                    SourceError::CexWithClevis.to_string()
                ),
            ]
        );
    }
}
