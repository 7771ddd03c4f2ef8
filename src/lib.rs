//! Translates human-friendly YAML configs into machine-readable Ignition
//! configs.
//!
//! A document names its schema with `variant` and `version`. It is decoded
//! into that schema, validated, translated by the variant's passes and
//! validated again as Ignition. Every diagnostic on the way is reported at
//! the line of the YAML it comes from.

use butane_api::{
    error::{DecodeError, RoutingError},
    path::{Path, YAML},
    Report, TranslationSet,
};
use log::debug;
use semver::Version;

pub mod cli;
pub mod decode;
pub mod error;
pub mod options;
pub mod registry;
pub mod translate;
pub mod variant;

pub use error::{TranslateError, TranslateFailure};
pub use options::{TranslateBytesOptions, TranslateOptions};
pub use variant::{Source, Target};

use decode::{decode, decode_common, locate, Decoded};

pub const BUTANE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A successful translation.
#[derive(Debug)]
pub struct Translated {
    /// The encoded target document.
    pub output: Vec<u8>,
    /// Warnings and infos. Never fatal.
    pub report: Report,
    /// Where every node of the output came from.
    pub translations: TranslationSet,
}

/// Translates the YAML document `input` into the target of its variant and
/// version.
pub fn translate_bytes(
    input: &[u8],
    options: &TranslateBytesOptions,
) -> Result<Translated, TranslateFailure> {
    let Ok(input) = std::str::from_utf8(input) else {
        let mut r = Report::new();
        r.add_error(Path::root(YAML), DecodeError::InvalidUtf8);
        return Err(TranslateFailure::new(TranslateError::Decode, r));
    };
    let common =
        decode_common(input).map_err(|r| TranslateFailure::new(TranslateError::Decode, r))?;

    let routing_failure = |at: &str, error: RoutingError| {
        let mut r = Report::new();
        r.add_error(Path::root(YAML).append(at), &error);
        r.correlate(YAML, &locate(input));
        TranslateFailure::new(error, r)
    };
    if common.variant.is_empty() {
        return Err(routing_failure("variant", RoutingError::NoVariant));
    }
    let Ok(version) = Version::parse(&common.version) else {
        return Err(routing_failure(
            "version",
            RoutingError::InvalidVersion {
                version: common.version,
            },
        ));
    };
    let Some(entry) = registry::lookup(&common.variant, &version) else {
        return Err(routing_failure(
            "version",
            RoutingError::UnknownVersion {
                variant: common.variant,
                version: version.to_string(),
            },
        ));
    };

    debug!("Translating config as {entry}");
    entry.translate(input, options)
}

/// Runs the whole pipeline for the schema `S`.
pub(crate) fn run<S: Source>(
    input: &str,
    options: &TranslateBytesOptions,
) -> Result<Translated, TranslateFailure> {
    let Decoded {
        config,
        mut report,
        locations,
    } = decode::<S>(input, options.strict);
    let config = match config {
        Some(config) if !report.is_fatal() => config,
        _ => return Err(TranslateFailure::new(TranslateError::Decode, report)),
    };

    let mut validation = config.validate(&Path::root(YAML));
    validation.correlate(YAML, &locations);
    report.merge(validation);
    if report.is_fatal() {
        return Err(TranslateFailure::new(
            TranslateError::InvalidSourceConfig,
            report,
        ));
    }

    let (target, ts, translation) = match config.translate(options) {
        Ok(translated) => translated,
        Err(e) => return Err(TranslateFailure::new(e, report)),
    };
    let mut translation = ts.translate_report(translation);
    translation.correlate(YAML, &locations);
    report.merge(translation);
    if report.is_fatal() {
        return Err(TranslateFailure::new(
            TranslateError::InvalidSourceConfig,
            report,
        ));
    }

    if options.translate.debug_print_translations {
        debug!("Translations:\n{ts}");
    }

    let generated = match target.validate_target() {
        Ok(r) => r,
        Err(e) => return Err(TranslateFailure::new(e, report)),
    };
    let mut generated = ts.translate_report(generated);
    generated.correlate(YAML, &locations);
    report.merge(generated);
    if report.is_fatal() {
        return Err(TranslateFailure::new(
            TranslateError::InvalidGeneratedConfig,
            report,
        ));
    }

    match target.encode(options.pretty) {
        Ok(output) => Ok(Translated {
            output,
            report,
            translations: ts,
        }),
        Err(e) => Err(TranslateFailure::new(e, report)),
    }
}
