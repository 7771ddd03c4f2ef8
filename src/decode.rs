//! YAML decoding into the typed source records, with source positions.

use butane_api::{
    config::Common,
    error::DecodeError,
    path::{Path, YAML},
    report::{LocationMap, Marker},
    Report,
};
use lazy_static::lazy_static;
use log::trace;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_path_to_error::Segment;
use yaml_rust2::{
    parser::{Event, MarkedEventReceiver, Parser},
    scanner::Marker as ScanMarker,
};

lazy_static! {
    /// serde_yaml's rendering of an error: an optional node path, the message
    /// and an optional position.
    static ref SERDE_YAML_ERROR: Regex =
        Regex::new(r"^(?:[^\s:]+: )?(?P<message>.*?)(?: at line \d+ column \d+)?$").unwrap();
}

/// The message of a serde_yaml error without the path and position it
/// embeds. Reports carry both on their own.
fn error_message(e: &serde_yaml::Error) -> String {
    let rendered = e.to_string();
    SERDE_YAML_ERROR
        .captures(&rendered)
        .and_then(|captures| captures.name("message"))
        .map(|message| message.as_str().to_string())
        .unwrap_or(rendered)
}

/// A decoded source document.
#[derive(Debug)]
pub struct Decoded<T> {
    /// `None` when decoding failed; the report then holds the reason.
    pub config: Option<T>,
    pub report: Report,
    pub locations: LocationMap,
}

/// Reads only the `variant` and `version` header, ignoring every other key.
pub fn decode_common(input: &str) -> Result<Common, Report> {
    serde_yaml::from_str::<Common>(input).map_err(|e| {
        let mut r = Report::new();
        r.add_error(
            Path::root(YAML),
            DecodeError::Malformed {
                message: error_message(&e),
            },
        );
        if let Some(location) = e.location() {
            r.entries[0].marker = Some(Marker {
                line: location.line(),
                column: location.column(),
            });
        }
        r
    })
}

/// Decodes `input` into `T`. Keys `T` does not know are reported as unused,
/// as warnings or, when `strict`, as errors.
pub fn decode<T: DeserializeOwned>(input: &str, strict: bool) -> Decoded<T> {
    let locations = locate(input);
    let mut report = Report::new();

    let mut unused = Vec::new();
    let deserializer = serde_yaml::Deserializer::from_str(input);
    let mut callback = |path: serde_ignored::Path| unused.push(ignored_path(&path));
    let ignored = serde_ignored::Deserializer::new(deserializer, &mut callback);
    let result: Result<T, _> = serde_path_to_error::deserialize(ignored);

    for path in unused {
        let key = path.last().map(ToString::to_string).unwrap_or_default();
        trace!("Unused key at {path}");
        if strict {
            report.add_error(path, DecodeError::UnusedKey { key });
        } else {
            report.add_warn(path, DecodeError::UnusedKey { key });
        }
    }

    let config = match result {
        Ok(config) => Some(config),
        Err(e) => {
            let mut path = Path::root(YAML);
            for segment in e.path().iter() {
                match segment {
                    Segment::Seq { index } => path = path.append(*index),
                    Segment::Map { key } => path = path.append(key.as_str()),
                    _ => {}
                }
            }
            let inner = e.inner();
            report.add_error(
                path,
                DecodeError::Malformed {
                    message: error_message(inner),
                },
            );
            if let Some(location) = inner.location() {
                if let Some(entry) = report.entries.last_mut() {
                    entry.marker = Some(Marker {
                        line: location.line(),
                        column: location.column(),
                    });
                }
            }
            None
        }
    };

    report.correlate(YAML, &locations);
    Decoded {
        config,
        report,
        locations,
    }
}

fn ignored_path(path: &serde_ignored::Path) -> Path {
    match path {
        serde_ignored::Path::Root => Path::root(YAML),
        serde_ignored::Path::Seq { parent, index } => ignored_path(parent).append(*index),
        serde_ignored::Path::Map { parent, key } => ignored_path(parent).append(key.as_str()),
        serde_ignored::Path::Some { parent }
        | serde_ignored::Path::NewtypeStruct { parent }
        | serde_ignored::Path::NewtypeVariant { parent } => ignored_path(parent),
    }
}

/// Builds the position of every node of the first document in `input`. Map
/// entries are located at their key, list items at the item itself.
pub fn locate(input: &str) -> LocationMap {
    let mut locator = Locator::default();
    let mut parser = Parser::new_from_str(input);
    if let Err(e) = parser.load(&mut locator, false) {
        // the decoder reports syntax errors with their own position
        trace!("Stopped locating nodes: {e}");
    }
    locator.locations
}

enum Frame {
    Map { path: Path, key: Option<String> },
    Seq { path: Path, next: usize },
}

#[derive(Default)]
struct Locator {
    stack: Vec<Frame>,
    locations: LocationMap,
}

impl Locator {
    /// Returns the path of a node that starts now, or `None` when the node is
    /// a mapping key.
    fn node_path(&mut self, event: &Event, mark: ScanMarker) -> Option<Path> {
        let marker = Marker {
            line: mark.line(),
            column: mark.col() + 1,
        };
        match self.stack.last_mut() {
            None => {
                let root = Path::root(YAML);
                self.locations.insert(&root, marker);
                Some(root)
            }
            Some(Frame::Seq { path, next }) => {
                let item = path.append(*next);
                *next += 1;
                self.locations.insert(&item, marker);
                Some(item)
            }
            Some(Frame::Map { path, key }) => match key.take() {
                Some(key) => Some(path.append(key)),
                None => {
                    let name = match event {
                        Event::Scalar(value, ..) => value.clone(),
                        _ => "?".to_string(),
                    };
                    self.locations.insert(&path.append(name.as_str()), marker);
                    *key = Some(name);
                    None
                }
            },
        }
    }
}

impl MarkedEventReceiver for Locator {
    fn on_event(&mut self, ev: Event, mark: ScanMarker) {
        match ev {
            Event::Scalar(..) | Event::Alias(..) => {
                self.node_path(&ev, mark);
            }
            Event::MappingStart(..) => {
                // complex keys are tracked under a placeholder path
                let path = self.node_path(&ev, mark).unwrap_or_else(|| Path::root(YAML));
                self.stack.push(Frame::Map { path, key: None });
            }
            Event::SequenceStart(..) => {
                let path = self.node_path(&ev, mark).unwrap_or_else(|| Path::root(YAML));
                self.stack.push(Frame::Seq { path, next: 0 });
            }
            Event::MappingEnd | Event::SequenceEnd => {
                self.stack.pop();
            }
            _ => {}
        }
    }
}
