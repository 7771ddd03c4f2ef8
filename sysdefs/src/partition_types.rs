//! GPT partition type GUIDs and the well-known partition labels of the
//! default boot disk.

/// BIOS boot partition, holds the GRUB core image on legacy x86 firmware.
pub const BIOS_BOOT: &str = "21686148-6449-6E6F-744E-656564454649";

/// EFI System Partition.
pub const EFI_SYSTEM: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";

/// PowerPC PReP boot partition.
pub const PREP_BOOT: &str = "9E1A2D38-C612-4316-AA26-8B49521E5A8B";

/// Labels of the partitions on the default boot disk and their numbers.
pub const WELL_KNOWN_PARTITIONS: &[(&str, i64)] = &[
    ("BIOS-BOOT", 1),
    ("PowerPC-PReP-boot", 1),
    ("EFI-SYSTEM", 2),
    ("boot", 3),
    ("root", 4),
];

/// Number of the default boot disk partition carrying `label`, if the label is
/// reserved.
pub fn well_known_number(label: &str) -> Option<i64> {
    WELL_KNOWN_PARTITIONS
        .iter()
        .find(|(known, _)| *known == label)
        .map(|(_, number)| *number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_known_number() {
        assert_eq!(well_known_number("root"), Some(4));
        assert_eq!(well_known_number("EFI-SYSTEM"), Some(2));
        assert_eq!(well_known_number("var"), None);
    }
}
