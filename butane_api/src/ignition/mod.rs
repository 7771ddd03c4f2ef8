//! Target document schemas: Ignition configs, with their structural
//! validation and merge semantics.

use std::io::Read;

use base64::{engine::general_purpose::STANDARD, Engine};
use flate2::read::GzDecoder;
use percent_encoding::percent_decode_str;

pub mod keys;
pub mod merge;
pub mod v3_4;
pub mod v3_5;

mod validate;

/// Decodes an RFC 2397 `data:` URL. Returns `None` when `url` is not a data
/// URL or its payload does not decode.
pub fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let rest = url.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let bytes: Vec<u8> = percent_decode_str(payload).collect();
    if header.ends_with(";base64") {
        let text = String::from_utf8(bytes).ok()?;
        STANDARD.decode(text.trim()).ok()
    } else {
        Some(bytes)
    }
}

/// Decodes resource contents given its data URL and compression.
pub fn decode_contents(source: &str, compression: Option<&str>) -> Option<Vec<u8>> {
    let raw = decode_data_url(source)?;
    match compression {
        None | Some("") => Some(raw),
        Some("gzip") => {
            let mut decoded = Vec::new();
            GzDecoder::new(raw.as_slice())
                .read_to_end(&mut decoded)
                .ok()?;
            Some(decoded)
        }
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url() {
        assert_eq!(decode_data_url("data:,hello%20world"), Some(b"hello world".to_vec()));
        assert_eq!(decode_data_url("data:;base64,aGk="), Some(b"hi".to_vec()));
        assert_eq!(
            decode_data_url("data:text/plain;charset=utf-8;base64,aGk="),
            Some(b"hi".to_vec())
        );
        assert_eq!(decode_data_url("data:,"), Some(Vec::new()));
        assert_eq!(decode_data_url("data:;base64,!!!"), None);
        assert_eq!(decode_data_url("data:hi"), None);
        assert_eq!(decode_data_url("https://example.com"), None);
    }

    #[test]
    fn test_decode_contents() {
        assert_eq!(decode_contents("data:,x", Some("")), Some(b"x".to_vec()));
        assert_eq!(decode_contents("data:,x", Some("zstd")), None);
        // gzip of "x"
        assert_eq!(
            decode_contents("data:;base64,H4sIAAAAAAACA6sAAIMW3IwBAAAA", Some("gzip")),
            Some(b"x".to_vec())
        );
    }
}
