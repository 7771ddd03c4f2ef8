//! Expansion of `boot_device` into disks, RAID arrays, a LUKS volume and
//! filesystems.

use anyhow::Context;
use butane_api::{
    config::fcos::{v1_5::BootDevice, BootLuks},
    path::{Path, JSON, YAML},
    TranslationSet,
};
use log::debug;
use serde_json::{json, Map, Value};
use sysdefs::arch::{BootLayout, BOOT_PARTITION_SIZE_MIB};

use crate::error::TranslateError;

const MD_BOOT: &str = "/dev/md/md-boot";
const MD_ROOT: &str = "/dev/md/md-root";
const LUKS_ROOT: &str = "/dev/mapper/root";
const ROOT_PARTITION: &str = "/dev/disk/by-partlabel/root";

fn by_partlabel(label: &str) -> String {
    format!("/dev/disk/by-partlabel/{label}")
}

/// Builds the partial target `boot_device` describes, or `None` if it asks
/// for neither mirroring nor encryption.
pub(crate) fn build<B: BootLuks>(
    boot_device: &BootDevice<B>,
) -> Result<Option<(Value, TranslationSet)>, TranslateError> {
    let luks = &boot_device.luks;
    let devices = &boot_device.mirror.devices;
    let mirrored = !devices.is_empty();
    if !mirrored && !luks.is_enabled() {
        return Ok(None);
    }
    let layout = boot_device
        .layout
        .as_deref()
        .and_then(BootLayout::parse)
        .unwrap_or(BootLayout::DEFAULT);
    debug!(
        "Expanding boot device for layout '{}' across {} mirror device(s)",
        layout.name(),
        devices.len()
    );

    let c = Path::root(YAML).append("boot_device");
    let devices_c = c.append("mirror").append("devices");
    let luks_c = c.append("luks");
    let storage = Path::root(JSON).append("storage");
    let mut ts = TranslationSet::new(YAML, JSON);
    ts.add(c.clone(), storage.clone());

    let mut disks = Vec::new();
    let mut filesystems = Vec::new();
    let mut raid = Vec::new();
    let mut luks_volumes = Vec::new();

    if mirrored {
        let mut boot_devices = Vec::new();
        let mut root_devices = Vec::new();
        for (i, device) in devices.iter().enumerate() {
            let n = i + 1;
            let device_c = devices_c.append(i);
            let mut partitions = Vec::new();
            for firmware in layout.firmware_partitions() {
                let label = format!("{}-{n}", firmware.label_prefix);
                let mut partition = Map::new();
                partition.insert("label".into(), json!(label));
                partition.insert("sizeMiB".into(), json!(firmware.size_mib));
                if let Some(type_guid) = firmware.type_guid {
                    partition.insert("typeGuid".into(), json!(type_guid));
                }
                partitions.push(Value::Object(partition));

                if let Some(format) = firmware.format {
                    let fs = json!({
                        "device": by_partlabel(&label),
                        "format": format,
                        "label": label,
                        "wipeFilesystem": true,
                    });
                    ts.add_from_common_source(
                        &device_c,
                        &storage.append("filesystems").append(filesystems.len()),
                        &fs,
                    );
                    filesystems.push(fs);
                }
            }
            let boot_label = format!("boot-{n}");
            let root_label = format!("root-{n}");
            partitions.push(json!({ "label": boot_label, "sizeMiB": BOOT_PARTITION_SIZE_MIB }));
            partitions.push(json!({ "label": root_label }));
            boot_devices.push(by_partlabel(&boot_label));
            root_devices.push(by_partlabel(&root_label));

            let disk = json!({
                "device": device,
                "partitions": partitions,
                "wipeTable": true,
            });
            ts.add_from_common_source(&device_c, &storage.append("disks").append(i), &disk);
            disks.push(disk);
        }

        for (name, devices, options) in [
            ("md-boot", boot_devices, vec!["--metadata=1.0"]),
            ("md-root", root_devices, vec![]),
        ] {
            let mut array = json!({
                "devices": devices,
                "level": "raid1",
                "name": name,
            });
            if !options.is_empty() {
                array["options"] = json!(options);
            }
            ts.add_from_common_source(&devices_c, &storage.append("raid").append(raid.len()), &array);
            raid.push(array);
        }

        let boot = json!({
            "device": MD_BOOT,
            "format": "ext4",
            "label": "boot",
            "wipeFilesystem": true,
        });
        ts.add_from_common_source(
            &devices_c,
            &storage.append("filesystems").append(filesystems.len()),
            &boot,
        );
        filesystems.push(boot);
    }

    let root_device = if luks.is_enabled() {
        let device = match luks.device() {
            Some(device) if !device.is_empty() => device.to_string(),
            _ if mirrored => MD_ROOT.to_string(),
            _ => ROOT_PARTITION.to_string(),
        };
        let volume = luks_volume(luks, &device)?;
        let at = storage.append("luks").append(0);
        ts.add_from_common_source(&luks_c, &at, &volume);
        if luks.device().is_some_and(|device| !device.is_empty()) {
            ts.add(luks_c.append("device"), at.append("device"));
        }
        let clevis = at.append("clevis");
        for i in 0..luks.tang().len() {
            ts.add_from_common_source(
                &luks_c.append("tang").append(i),
                &clevis.append("tang").append(i),
                &volume["clevis"]["tang"][i],
            );
        }
        for field in ["threshold", "tpm2"] {
            if !volume["clevis"][field].is_null() {
                ts.add(luks_c.append(field), clevis.append(field));
            }
        }
        if !volume["discard"].is_null() {
            ts.add(luks_c.append("discard"), at.append("discard"));
        }
        if luks.cex() == Some(true) {
            ts.add(luks_c.append("cex"), at.append("cex"));
            ts.add(
                luks_c.append("cex").append("enabled"),
                at.append("cex").append("enabled"),
            );
        }
        luks_volumes.push(volume);
        LUKS_ROOT
    } else {
        MD_ROOT
    };

    let root = json!({
        "device": root_device,
        "format": "xfs",
        "label": "root",
        "wipeFilesystem": true,
    });
    let root_c = if luks.is_enabled() { &luks_c } else { &devices_c };
    ts.add_from_common_source(
        root_c,
        &storage.append("filesystems").append(filesystems.len()),
        &root,
    );
    filesystems.push(root);

    let mut parent = Map::new();
    for (key, list, list_c) in [
        ("disks", disks, &devices_c),
        ("raid", raid, &devices_c),
        ("luks", luks_volumes, &luks_c),
        ("filesystems", filesystems, &c),
    ] {
        if !list.is_empty() {
            ts.add(list_c.clone(), storage.append(key));
            parent.insert(key.into(), Value::Array(list));
        }
    }
    Ok(Some((json!({ "storage": parent }), ts)))
}

fn luks_volume<B: BootLuks>(luks: &B, device: &str) -> Result<Value, TranslateError> {
    let mut clevis = Map::new();
    if !luks.tang().is_empty() {
        let tang = serde_json::to_value(luks.tang()).context("Failed to serialize tang servers")?;
        clevis.insert("tang".into(), tang);
    }
    if let Some(threshold) = luks.threshold() {
        clevis.insert("threshold".into(), json!(threshold));
    }
    if let Some(tpm2) = luks.tpm2() {
        clevis.insert("tpm2".into(), json!(tpm2));
    }

    let mut volume = json!({
        "device": device,
        "label": "luks-root",
        "name": "root",
        "wipeVolume": true,
    });
    if !clevis.is_empty() {
        volume["clevis"] = Value::Object(clevis);
    }
    if let Some(discard) = luks.discard() {
        volume["discard"] = json!(discard);
    }
    if luks.cex() == Some(true) {
        volume["cex"] = json!({ "enabled": true });
    }
    Ok(volume)
}

#[cfg(test)]
mod tests {
    use butane_api::{
        config::{
            base::v0_5::Tang,
            fcos::{v1_5, v1_6},
        },
        path,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_nothing_requested() {
        assert!(build(&v1_5::BootDevice::<v1_5::BootDeviceLuks>::default()).unwrap().is_none());
    }

    #[test]
    fn test_mirror_with_tpm2() {
        let boot_device = v1_5::BootDevice {
            mirror: v1_5::BootDeviceMirror {
                devices: vec!["/dev/vda".into(), "/dev/vdb".into()],
            },
            luks: v1_5::BootDeviceLuks {
                tpm2: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let (value, ts) = build(&boot_device).unwrap().unwrap();
        let storage = &value["storage"];

        let labels: Vec<&str> = storage["disks"][1]["partitions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["label"].as_str().unwrap())
            .collect();
        assert_eq!(labels, vec!["bios-2", "esp-2", "boot-2", "root-2"]);
        assert_eq!(storage["disks"][1]["partitions"][2]["sizeMiB"], 384);
        assert_eq!(storage["disks"][0]["wipeTable"], true);

        assert_eq!(storage["raid"][0]["name"], "md-boot");
        assert_eq!(storage["raid"][0]["options"], json!(["--metadata=1.0"]));
        assert_eq!(
            storage["raid"][1]["devices"],
            json!(["/dev/disk/by-partlabel/root-1", "/dev/disk/by-partlabel/root-2"])
        );

        assert_eq!(
            storage["luks"],
            json!([{
                "clevis": { "tpm2": true },
                "device": "/dev/md/md-root",
                "label": "luks-root",
                "name": "root",
                "wipeVolume": true,
            }])
        );

        let filesystems: Vec<(&str, &str)> = storage["filesystems"]
            .as_array()
            .unwrap()
            .iter()
            .map(|fs| (fs["device"].as_str().unwrap(), fs["format"].as_str().unwrap()))
            .collect();
        assert_eq!(
            filesystems,
            vec![
                ("/dev/disk/by-partlabel/esp-1", "vfat"),
                ("/dev/disk/by-partlabel/esp-2", "vfat"),
                ("/dev/md/md-boot", "ext4"),
                ("/dev/mapper/root", "xfs"),
            ]
        );

        assert_eq!(
            ts.get(&path!(JSON, "storage", "disks", 1, "partitions", 0, "label"))
                .unwrap()
                .from,
            path!(YAML, "boot_device", "mirror", "devices", 1)
        );
        assert_eq!(
            ts.get(&path!(JSON, "storage", "luks", 0, "clevis", "tpm2"))
                .unwrap()
                .from,
            path!(YAML, "boot_device", "luks", "tpm2")
        );
        assert_eq!(
            ts.get(&path!(JSON, "storage", "filesystems", 3, "device"))
                .unwrap()
                .from,
            path!(YAML, "boot_device", "luks")
        );
        ts.debug_verify_coverage(&value).unwrap();
    }

    #[test]
    fn test_luks_only() {
        let boot_device = v1_5::BootDevice {
            luks: v1_5::BootDeviceLuks {
                tang: vec![Tang {
                    url: "https://tang.example.com".into(),
                    thumbprint: Some("REPLACE-THIS".into()),
                    advertisement: None,
                }],
                threshold: Some(1),
                discard: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let (value, ts) = build(&boot_device).unwrap().unwrap();
        let storage = &value["storage"];
        assert!(storage.get("disks").is_none());
        assert!(storage.get("raid").is_none());
        assert_eq!(storage["luks"][0]["device"], "/dev/disk/by-partlabel/root");
        assert_eq!(storage["luks"][0]["discard"], true);
        assert_eq!(
            storage["luks"][0]["clevis"]["tang"][0]["url"],
            "https://tang.example.com"
        );
        assert_eq!(storage["filesystems"][0]["device"], "/dev/mapper/root");
        assert_eq!(
            ts.get(&path!(JSON, "storage", "luks", 0, "clevis", "tang", 0, "url"))
                .unwrap()
                .from,
            path!(YAML, "boot_device", "luks", "tang", 0)
        );
        ts.debug_verify_coverage(&value).unwrap();
    }

    #[test]
    fn test_cex() {
        let boot_device = v1_6::BootDevice {
            layout: Some("s390x-eckd".into()),
            luks: v1_6::BootDeviceLuks {
                device: Some("/dev/dasda".into()),
                cex: butane_api::config::base::v0_6::Cex {
                    enabled: Some(true),
                },
                ..Default::default()
            },
            ..Default::default()
        };
        let (value, ts) = build(&boot_device).unwrap().unwrap();
        let luks = &value["storage"]["luks"][0];
        assert_eq!(luks["device"], "/dev/dasda");
        assert_eq!(luks["cex"], json!({ "enabled": true }));
        assert!(luks.get("clevis").is_none());
        assert_eq!(
            ts.get(&path!(JSON, "storage", "luks", 0, "device")).unwrap().from,
            path!(YAML, "boot_device", "luks", "device")
        );
        ts.debug_verify_coverage(&value).unwrap();
    }

    #[test]
    fn test_ppc64le_layout() {
        let boot_device: v1_5::BootDevice = v1_5::BootDevice {
            layout: Some("ppc64le".into()),
            mirror: v1_5::BootDeviceMirror {
                devices: vec!["/dev/sda".into(), "/dev/sdb".into()],
            },
            ..Default::default()
        };
        let (value, _) = build(&boot_device).unwrap().unwrap();
        let storage = &value["storage"];
        assert_eq!(storage["disks"][0]["partitions"][0]["label"], "prep-1");
        assert_eq!(storage["disks"][0]["partitions"][1]["label"], "reserved-1");
        assert!(storage.get("luks").is_none());
        // no ESP on ppc64le
        assert_eq!(storage["filesystems"].as_array().unwrap().len(), 2);
        assert_eq!(storage["filesystems"][1]["device"], "/dev/md/md-root");
    }
}
