//! Embedding of inline and local contents as data URLs.

use std::io::{Read, Write};

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine};
use butane_api::{
    config::base::v0_5,
    error::TranslationError,
    ignition::v3_4,
    path::{Path, JSON, YAML},
    Report,
};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use log::trace;
use osutils::files_dir::{FilesDirError, LocalPath};
use percent_encoding::{percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    error::TranslateError,
    options::TranslateOptions,
    translate::{Translation, Translator},
};

/// Bytes left unescaped in data URLs: the RFC 3986 unreserved set plus the
/// marks RFC 2396 allowed.
const DATA_URL: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// An encoded resource: its data URL and the compression to declare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DataUrl {
    pub source: String,
    pub compression: Option<String>,
}

/// Plain `data:,` URL of `data`.
pub(crate) fn escaped_url(data: &[u8]) -> String {
    format!("data:,{}", percent_encode(data, DATA_URL))
}

fn base64_url(data: &[u8]) -> String {
    format!("data:;base64,{}", STANDARD.encode(data))
}

fn gzip(data: &[u8]) -> Result<Vec<u8>, TranslateError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).context("Failed to compress resource")?;
    Ok(encoder.finish().context("Failed to compress resource")?)
}

fn gunzip(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoded = Vec::new();
    GzDecoder::new(data).read_to_end(&mut decoded).ok()?;
    Some(decoded)
}

/// Picks the encoding of `data`. A compression chosen by the user is kept
/// and the data only escaped; otherwise gzip is used when it is smaller.
pub(crate) fn encode(
    data: &[u8],
    user_compression: Option<&str>,
    auto_compress: bool,
) -> Result<DataUrl, TranslateError> {
    if let Some(compression) = user_compression {
        return Ok(DataUrl {
            source: escaped_url(data),
            compression: Some(compression.to_string()),
        });
    }

    let escaped = escaped_url(data);
    if !auto_compress {
        return Ok(DataUrl {
            source: escaped,
            compression: Some(String::new()),
        });
    }

    let compressed = gzip(data)?;
    let compressed_url = base64_url(&compressed);
    if compressed_url.len() < escaped.len() && gunzip(&compressed).as_deref() == Some(data) {
        trace!(
            "Compressed {} bytes of resource data to {}",
            data.len(),
            compressed.len()
        );
        return Ok(DataUrl {
            source: compressed_url,
            compression: Some("gzip".into()),
        });
    }

    let source = if std::str::from_utf8(data).is_ok() {
        escaped
    } else {
        let encoded = base64_url(data);
        if encoded.len() < escaped.len() {
            encoded
        } else {
            escaped
        }
    };
    Ok(DataUrl {
        source,
        compression: Some(String::new()),
    })
}

/// Reads `local` from the files-dir. Problems are reported at `c`.
pub(crate) fn read_local(
    options: &TranslateOptions,
    local: &str,
    c: &Path,
    r: &mut Report,
) -> Option<Vec<u8>> {
    let Some(files_dir) = &options.files_dir else {
        r.add_error(c.clone(), TranslationError::NoFilesDir);
        return None;
    };
    let result = LocalPath::new(local).and_then(|path| files_dir.read(&path));
    match result {
        Ok(data) => Some(data),
        Err(FilesDirError::Escape) => {
            r.add_error(c.clone(), TranslationError::FilesDirEscape);
            None
        }
        Err(FilesDirError::Io(e)) => {
            r.add_error(
                c.clone(),
                TranslationError::ReadLocal {
                    path: local.to_string(),
                    reason: format!("{e:#}"),
                },
            );
            None
        }
    }
}

/// Translates a resource, embedding `inline` or `local` contents.
pub(crate) fn translate_resource(
    from: v0_5::Resource,
    options: &TranslateOptions,
) -> Result<Translation<v3_4::Resource>, TranslateError> {
    let mut r = Report::new();

    // headers, verification and compression map one to one
    let pass_through = v0_5::Resource {
        inline: None,
        local: None,
        ..from.clone()
    };
    let (mut to, mut ts, _) =
        Translator::new(options).translate::<_, v3_4::Resource>(&pass_through)?;

    let (field, data) = match (&from.inline, &from.local) {
        (Some(inline), _) => ("inline", Some(inline.clone().into_bytes())),
        (None, Some(local)) => (
            "local",
            read_local(options, local, &Path::root(YAML).append("local"), &mut r),
        ),
        (None, None) => return Ok((to, ts, r)),
    };
    if from.source.is_some() {
        // reported by validation
        return Ok((to, ts, r));
    }
    let Some(data) = data else {
        return Ok((to, ts, r));
    };

    let encoded = encode(
        &data,
        from.compression.as_deref(),
        !options.no_resource_auto_compression,
    )?;
    to.source = Some(encoded.source);
    to.compression = encoded.compression;

    let yaml = Path::root(YAML).append(field);
    ts.add(yaml.clone(), Path::root(JSON).append("source"));
    ts.add(yaml, Path::root(JSON).append("compression"));
    Ok((to, ts, r))
}

/// Registers the resource translator at every resource position of the base
/// schema.
pub(crate) fn register(translator: Translator<'_>) -> Translator<'_> {
    [
        "ignition.config.merge.*",
        "ignition.config.replace",
        "ignition.security.tls.certificate_authorities.*",
        "storage.files.*.contents",
        "storage.files.*.append.*",
        "storage.luks.*.key_file",
    ]
    .into_iter()
    .fold(translator, |translator, pattern| {
        translator.custom(pattern, translate_resource)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use butane_api::{ignition::decode_contents, path};
    use osutils::testutils::MemoryFilesDir;

    use super::*;

    fn inline(s: &str) -> v0_5::Resource {
        v0_5::Resource {
            inline: Some(s.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_escaped_url() {
        assert_eq!(escaped_url(b"hello world\n"), "data:,hello%20world%0A");
        assert_eq!(escaped_url(b"a-b_c.d!e~f*g'h(i)j"), "data:,a-b_c.d!e~f*g'h(i)j");
        assert_eq!(escaped_url(b"/#?"), "data:,%2F%23%3F");
    }

    #[test]
    fn test_encode_policy() {
        let text = "z".repeat(150);
        let encoded = encode(text.as_bytes(), None, true).unwrap();
        assert!(encoded.source.starts_with("data:;base64,H4sI"));
        assert_eq!(encoded.compression.as_deref(), Some("gzip"));
        assert_eq!(
            decode_contents(&encoded.source, encoded.compression.as_deref()).unwrap(),
            text.as_bytes()
        );

        // short data does not compress well
        let encoded = encode(b"hi", None, true).unwrap();
        assert_eq!(encoded.source, "data:,hi");
        assert_eq!(encoded.compression.as_deref(), Some(""));

        let encoded = encode(text.as_bytes(), None, false).unwrap();
        assert_eq!(encoded.source, format!("data:,{text}"));
        assert_eq!(encoded.compression.as_deref(), Some(""));

        let encoded = encode(b"already compressed", Some("gzip"), true).unwrap();
        assert_eq!(encoded.source, "data:,already%20compressed");
        assert_eq!(encoded.compression.as_deref(), Some("gzip"));

        let binary = [0xff, 0xfe, 0xfd, 0x00, 0x80, 0x81];
        let encoded = encode(&binary, None, true).unwrap();
        assert_eq!(encoded.source, "data:;base64,//79AICB");
    }

    #[test]
    fn test_translate_inline() {
        let options = TranslateOptions::default();
        let (to, ts, r) = translate_resource(inline("z".repeat(150).as_str()), &options).unwrap();
        assert!(r.is_empty());
        assert_eq!(to.compression.as_deref(), Some("gzip"));
        assert_eq!(ts.get(&path!(JSON, "source")).unwrap().from, path!(YAML, "inline"));
        assert_eq!(
            ts.get(&path!(JSON, "compression")).unwrap().from,
            path!(YAML, "inline")
        );
    }

    #[test]
    fn test_translate_source_passes_through() {
        let options = TranslateOptions::default();
        let from = v0_5::Resource {
            source: Some("https://example.com/motd".into()),
            compression: Some("gzip".into()),
            verification: v0_5::Verification {
                hash: Some("sha512-00".into()),
            },
            ..Default::default()
        };
        let (to, ts, r) = translate_resource(from, &options).unwrap();
        assert!(r.is_empty());
        assert_eq!(to.source.as_deref(), Some("https://example.com/motd"));
        assert_eq!(to.compression.as_deref(), Some("gzip"));
        assert_eq!(ts.get(&path!(JSON, "source")).unwrap().from, path!(YAML, "source"));
        assert_eq!(
            ts.get(&path!(JSON, "verification", "hash")).unwrap().from,
            path!(YAML, "verification", "hash")
        );
    }

    #[test]
    fn test_translate_local() {
        let local = v0_5::Resource {
            local: Some("motd".into()),
            ..Default::default()
        };

        let (_, _, r) = translate_resource(local.clone(), &TranslateOptions::default()).unwrap();
        assert_eq!(r.entries[0].message, TranslationError::NoFilesDir.to_string());
        assert_eq!(r.entries[0].context, path!(YAML, "local"));

        let options = TranslateOptions::default()
            .with_files_dir(Arc::new(MemoryFilesDir::new().file("motd", "hello", 0o644)));
        let (to, ts, r) = translate_resource(local, &options).unwrap();
        assert!(r.is_empty());
        assert_eq!(to.source.as_deref(), Some("data:,hello"));
        assert_eq!(ts.get(&path!(JSON, "source")).unwrap().from, path!(YAML, "local"));

        let escape = v0_5::Resource {
            local: Some("../etc/passwd".into()),
            ..Default::default()
        };
        let (to, _, r) = translate_resource(escape, &options).unwrap();
        assert_eq!(to.source, None);
        assert_eq!(r.entries[0].message, TranslationError::FilesDirEscape.to_string());

        let missing = v0_5::Resource {
            local: Some("nope".into()),
            ..Default::default()
        };
        let (_, _, r) = translate_resource(missing, &options).unwrap();
        assert!(r.entries[0].message.starts_with("failed to read local file nope"));
    }
}
