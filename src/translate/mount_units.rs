//! Mount and swap units for filesystems declared `with_mount_unit`.

use butane_api::{
    config::base::v0_5,
    path::{Path, JSON, YAML},
    TranslationSet,
};
use log::debug;
use osutils::systemd::{escape_path, escape_unit_name, MOUNT_UNIT_SUFFIX, SWAP_UNIT_SUFFIX};
use serde_json::{json, Value};

const HEADER: &str = "# Generated by Butane\n";
const SWAP_FORMAT: &str = "swap";
const REMOTE_DEVICE_PREFIX: &str = "/dev/mapper/";

fn swap_unit(fs: &v0_5::Filesystem) -> String {
    let mut unit = format!("{HEADER}[Swap]\nWhat={}\n", fs.device);
    if !fs.mount_options.is_empty() {
        unit.push_str(&format!("Options={}\n", fs.mount_options.join(",")));
    }
    unit.push_str("\n[Install]\nRequiredBy=swap.target\n");
    unit
}

fn mount_unit(fs: &v0_5::Filesystem, path: &str, format: &str) -> String {
    let remote = fs.device.starts_with(REMOTE_DEVICE_PREFIX);
    let target = if remote {
        "remote-fs.target"
    } else {
        "local-fs.target"
    };
    let fsck = format!("systemd-fsck@{}.service", escape_path(&fs.device));

    let mut options = fs.mount_options.clone();
    if remote {
        options.push("_netdev".into());
    }

    let mut unit = format!("{HEADER}[Unit]\n");
    if remote {
        unit.push_str("DefaultDependencies=no\n");
    }
    unit.push_str(&format!(
        "Before={target}\nRequires={fsck}\nAfter={fsck}\n\n[Mount]\nWhere={path}\nWhat={}\nType={format}\n",
        fs.device
    ));
    if !options.is_empty() {
        unit.push_str(&format!("Options={}\n", options.join(",")));
    }
    unit.push_str(&format!("\n[Install]\nRequiredBy={target}\n"));
    unit
}

/// Builds a partial target holding a unit for every filesystem that asks for
/// one, or `None` if none do. Filesystems missing the fields their unit needs
/// have already been reported during validation and are passed over.
pub(crate) fn build(filesystems: &[v0_5::Filesystem]) -> Option<(Value, TranslationSet)> {
    let mut units = Vec::new();
    let mut ts = TranslationSet::new(YAML, JSON);
    let units_path = Path::root(JSON).append("systemd").append("units");

    for (i, fs) in filesystems.iter().enumerate() {
        if fs.with_mount_unit != Some(true) {
            continue;
        }
        let c = Path::root(YAML).append("storage").append("filesystems").append(i);
        let (name, contents, name_from) = match (fs.format.as_deref(), fs.path.as_deref()) {
            (Some(SWAP_FORMAT), _) => (
                escape_unit_name(&fs.device, SWAP_UNIT_SUFFIX),
                swap_unit(fs),
                c.append("device"),
            ),
            (Some(format), Some(path)) => (
                escape_unit_name(path, MOUNT_UNIT_SUFFIX),
                mount_unit(fs, path, format),
                c.append("path"),
            ),
            _ => continue,
        };
        debug!("Generating unit '{name}' for filesystem {}", fs.device);

        let to = units_path.append(units.len());
        let unit = json!({
            "contents": contents,
            "enabled": true,
            "name": name,
        });
        if ts.is_empty() {
            ts.add(c.clone(), Path::root(JSON).append("systemd"));
            ts.add(c.clone(), units_path.clone());
        }
        ts.add_from_common_source(&c, &to, &unit);
        ts.add(name_from, to.append("name"));
        units.push(unit);
    }

    if units.is_empty() {
        return None;
    }
    Some((json!({ "systemd": { "units": units } }), ts))
}

#[cfg(test)]
mod tests {
    use butane_api::path;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn filesystem(device: &str, format: &str, path: Option<&str>) -> v0_5::Filesystem {
        v0_5::Filesystem {
            device: device.into(),
            format: Some(format.into()),
            path: path.map(Into::into),
            with_mount_unit: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_mount_unit() {
        let filesystems = vec![
            v0_5::Filesystem {
                mount_options: vec!["ro".into()],
                ..filesystem("/dev/disk/by-label/var", "xfs", Some("/var"))
            },
            v0_5::Filesystem {
                with_mount_unit: None,
                ..filesystem("/dev/vdb", "ext4", Some("/var/skip"))
            },
        ];
        let (value, ts) = build(&filesystems).unwrap();
        let units = value["systemd"]["units"].as_array().unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0]["name"], "var.mount");
        assert_eq!(units[0]["enabled"], true);
        assert_eq!(
            units[0]["contents"],
            indoc! {"
                # Generated by Butane
                [Unit]
                Before=local-fs.target
                Requires=systemd-fsck@dev-disk-by\\x2dlabel-var.service
                After=systemd-fsck@dev-disk-by\\x2dlabel-var.service

                [Mount]
                Where=/var
                What=/dev/disk/by-label/var
                Type=xfs
                Options=ro

                [Install]
                RequiredBy=local-fs.target
            "}
        );
        assert_eq!(
            ts.get(&path!(JSON, "systemd", "units", 0, "name")).unwrap().from,
            path!(YAML, "storage", "filesystems", 0, "path")
        );
        assert_eq!(
            ts.get(&path!(JSON, "systemd", "units", 0, "contents"))
                .unwrap()
                .from,
            path!(YAML, "storage", "filesystems", 0)
        );
        ts.debug_verify_coverage(&value).unwrap();
    }

    #[test]
    fn test_remote_mount_unit() {
        let (value, _) =
            build(&[filesystem("/dev/mapper/data", "ext4", Some("/var/data"))]).unwrap();
        let unit = &value["systemd"]["units"][0];
        assert_eq!(unit["name"], "var-data.mount");
        assert_eq!(
            unit["contents"],
            indoc! {"
                # Generated by Butane
                [Unit]
                DefaultDependencies=no
                Before=remote-fs.target
                Requires=systemd-fsck@dev-mapper-data.service
                After=systemd-fsck@dev-mapper-data.service

                [Mount]
                Where=/var/data
                What=/dev/mapper/data
                Type=ext4
                Options=_netdev

                [Install]
                RequiredBy=remote-fs.target
            "}
        );
    }

    #[test]
    fn test_swap_unit() {
        let (value, ts) = build(&[filesystem("/dev/disk/by-label/swap", "swap", None)]).unwrap();
        let unit = &value["systemd"]["units"][0];
        assert_eq!(unit["name"], "dev-disk-by\\x2dlabel-swap.swap");
        assert_eq!(
            unit["contents"],
            indoc! {"
                # Generated by Butane
                [Swap]
                What=/dev/disk/by-label/swap

                [Install]
                RequiredBy=swap.target
            "}
        );
        assert_eq!(
            ts.get(&path!(JSON, "systemd", "units", 0, "name")).unwrap().from,
            path!(YAML, "storage", "filesystems", 0, "device")
        );
    }

    #[test]
    fn test_nothing_requested() {
        assert!(build(&[]).is_none());
        let mut fs = filesystem("/dev/vdb", "ext4", None);
        // reported by validation
        assert!(build(std::slice::from_ref(&fs)).is_none());
        fs.with_mount_unit = Some(false);
        assert!(build(&[fs]).is_none());
    }
}
