#[macro_use]
pub mod path;

pub mod config;
pub mod error;
pub mod ignition;
pub mod machine_config;
pub mod report;
pub mod translation;
pub mod validate;

pub use path::Path;
pub use report::Report;
pub use translation::TranslationSet;

/// Serde helper for `skip_serializing_if` on records that should disappear
/// from the output when empty.
pub fn is_default<T: Default + PartialEq>(t: &T) -> bool {
    *t == Default::default()
}
