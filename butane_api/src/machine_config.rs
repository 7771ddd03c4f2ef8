//! OpenShift MachineConfig resource wrapping an Ignition config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ignition::v3_4;

pub const API_VERSION: &str = "machineconfiguration.openshift.io/v1";
pub const KIND: &str = "MachineConfig";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineConfig {
    pub api_version: String,
    pub kind: String,
    pub metadata: Metadata,
    pub spec: Spec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spec {
    pub config: v3_4::Config,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fips: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kernel_arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use maplit::btreemap;

    use super::*;

    #[test]
    fn test_serialize() {
        let mc = MachineConfig {
            api_version: API_VERSION.into(),
            kind: KIND.into(),
            metadata: Metadata {
                name: "99-worker-custom".into(),
                labels: btreemap! {
                    "machineconfiguration.openshift.io/role".to_string() => "worker".to_string(),
                },
            },
            spec: Spec {
                config: v3_4::Config {
                    ignition: v3_4::Ignition {
                        version: v3_4::VERSION.into(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
                kernel_type: Some("realtime".into()),
                ..Default::default()
            },
        };
        assert_eq!(
            serde_yaml::to_string(&mc).unwrap(),
            indoc::indoc! {r#"
                apiVersion: machineconfiguration.openshift.io/v1
                kind: MachineConfig
                metadata:
                  name: 99-worker-custom
                  labels:
                    machineconfiguration.openshift.io/role: worker
                spec:
                  config:
                    ignition:
                      version: 3.4.0
                  kernelType: realtime
            "#}
        );
    }
}
