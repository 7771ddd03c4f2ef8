//! File mode handling for source documents.
//!
//! YAML 1.2 reads `0644` as the string "0644", so modes are accepted either as
//! integers or as octal strings with a leading `0` or `0o`.

use std::fmt;

use serde::{
    de::{self, Visitor},
    Deserializer,
};

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(ModeVisitor)
}

struct ModeVisitor;

impl<'de> Visitor<'de> for ModeVisitor {
    type Value = Option<i32>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a file mode as an integer or an octal string")
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(self)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        i32::try_from(v)
            .map(Some)
            .map_err(|_| E::custom(format!("mode {v} is out of range")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i32::try_from(v)
            .map(Some)
            .map_err(|_| E::custom(format!("mode {v} is out of range")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        parse(v).map(Some).map_err(E::custom)
    }
}

/// Parses a mode written as a string. A leading `0o` or `0` selects octal.
pub fn parse(s: &str) -> Result<i32, String> {
    let trimmed = s.trim();
    let (digits, radix) = if let Some(rest) = trimmed.strip_prefix("0o") {
        (rest, 8)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };
    i32::from_str_radix(digits, radix).map_err(|_| format!("invalid mode '{s}'"))
}

/// Whether `mode` looks like something a person would set on purpose: no
/// setuid/setgid/sticky bits, and the owner has every permission that group
/// or other have.
pub fn is_typical(mode: i32) -> bool {
    if !(0..=0o777).contains(&mode) {
        return false;
    }
    let user = (mode >> 6) & 0o7;
    let group = (mode >> 3) & 0o7;
    let other = mode & 0o7;
    user & group == group && user & other == other
}

/// Reads the decimal digits of `mode` as octal digits, e.g. 644 becomes 0o644.
fn decimal_as_octal(mode: i32) -> Option<i32> {
    if mode < 0 {
        return None;
    }
    i32::from_str_radix(&mode.to_string(), 8).ok()
}

/// True when `mode` is only reasonable if its digits were meant as octal.
pub fn is_probably_decimal(mode: i32) -> bool {
    !is_typical(mode) && decimal_as_octal(mode).is_some_and(is_typical)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Deserialize)]
    struct Node {
        #[serde(default, deserialize_with = "deserialize")]
        mode: Option<i32>,
    }

    fn mode_of(yaml: &str) -> Option<i32> {
        serde_yaml::from_str::<Node>(yaml).unwrap().mode
    }

    #[test]
    fn test_deserialize() {
        assert_eq!(mode_of("mode: 0644"), Some(0o644));
        assert_eq!(mode_of("mode: 0o755"), Some(0o755));
        assert_eq!(mode_of("mode: 420"), Some(420));
        assert_eq!(mode_of("mode: \"0600\""), Some(0o600));
        assert_eq!(mode_of("{}"), None);
        assert!(serde_yaml::from_str::<Node>("mode: 0999").is_err());
        assert!(serde_json::from_str::<Node>(r#"{"mode": 420}"#).is_ok());
    }

    #[test]
    fn test_is_typical() {
        assert!(is_typical(0o644));
        assert!(is_typical(0o755));
        assert!(is_typical(0o600));
        assert!(is_typical(0));
        assert!(!is_typical(0o4755));
        assert!(!is_typical(0o466));
        assert!(!is_typical(0o1204));
    }

    #[test]
    fn test_decimal_detection() {
        assert!(is_probably_decimal(644));
        assert!(is_probably_decimal(755));
        assert!(!is_probably_decimal(0o644));
        // not typical either way
        assert!(!is_probably_decimal(999));
    }
}
