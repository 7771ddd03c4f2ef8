use serde::{de::value::Error, forward_to_deserialize_any, Deserialize, Deserializer};
use strum_macros::IntoStaticStr;

/// Filesystem formats the provisioning agent knows how to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FilesystemFormat {
    Btrfs,
    Ext4,
    /// Leave the device unformatted.
    None,
    Swap,
    Vfat,
    Xfs,
}

impl FilesystemFormat {
    pub fn parse(format: &str) -> Option<Self> {
        Self::deserialize(&mut EnumDeserializer(format)).ok()
    }

    pub fn name(self) -> &'static str {
        self.into()
    }

    /// Longest label the format's tools accept.
    pub fn max_label_len(self) -> Option<usize> {
        match self {
            FilesystemFormat::Btrfs => Some(256),
            FilesystemFormat::Ext4 => Some(16),
            FilesystemFormat::Swap => Some(15),
            FilesystemFormat::Vfat => Some(11),
            FilesystemFormat::Xfs => Some(12),
            FilesystemFormat::None => None,
        }
    }
}

/// Simple deserializer to convert a &str into an enum using serde.
struct EnumDeserializer<'de>(&'de str);
impl<'de> Deserializer<'de> for &mut EnumDeserializer<'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Self::Error>
    where
        V: serde::de::Visitor<'de>,
    {
        visitor.visit_str(self.0)
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map struct enum identifier ignored_any
    }
}
