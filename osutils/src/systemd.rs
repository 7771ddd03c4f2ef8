/// Suffix of generated mount units.
pub const MOUNT_UNIT_SUFFIX: &str = "mount";

/// Suffix of generated swap units.
pub const SWAP_UNIT_SUFFIX: &str = "swap";

/// Escapes a path the way `systemd-escape --path` does.
///
/// Example:
///
/// - /mnt -> mnt
/// - /var/lib/containers -> var-lib-containers
/// - /dev/disk/by-label/foo -> dev-disk-by\x2dlabel-foo
pub fn escape_path(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                components.pop();
            }
            _ => components.push(component),
        }
    }
    if components.is_empty() {
        return "-".into();
    }

    let joined = components.join("/");
    let mut escaped = String::with_capacity(joined.len());
    for (i, byte) in joined.bytes().enumerate() {
        match byte {
            b'/' => escaped.push('-'),
            b'.' if i == 0 => escaped.push_str("\\x2e"),
            b if b.is_ascii_alphanumeric() || matches!(b, b':' | b'_' | b'.') => {
                escaped.push(b as char)
            }
            b => escaped.push_str(&format!("\\x{b:02x}")),
        }
    }
    escaped
}

/// Takes in a path and a suffix, and returns a systemd-escaped unit name.
///
/// Example:
///
/// - /mnt, mount -> mnt.mount
/// - /mnt/foo, mount -> mnt-foo.mount
pub fn escape_unit_name(path: &str, suffix: &str) -> String {
    format!("{}.{suffix}", escape_path(path))
}
