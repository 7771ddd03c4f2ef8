//! OpenShift variant: Fedora CoreOS sugar wrapped in a MachineConfig.

pub mod v4_15;

/// Label naming the machine pool a MachineConfig applies to.
pub const ROLE_LABEL: &str = "machineconfiguration.openshift.io/role";
