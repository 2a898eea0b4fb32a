//! OSM history XML reader
//!
//! Pull-parses an `.osh` document with quick-xml and yields [`LogEntry`]
//! values in document order. One event buffer is reused for the whole file,
//! so memory does not grow with the size of the log.
//!
//! ```xml
//! <osm version="0.6">
//!   <node id="1" version="2" timestamp="2012-01-01T00:00:00Z" uid="7" lat="60.1" lon="24.9"/>
//!   <way id="10" version="1" timestamp="2012-01-02T00:00:00Z" uid="7">
//!     <nd ref="1"/>
//!     <tag k="highway" v="footway"/>
//!   </way>
//! </osm>
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use geomhist_storage::FeatureKind;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::attributes::ElementAttrs;
use super::element::{FeatureHeader, LogElement, LogEntry};
use crate::errors::{HistoryError, LogPosition, Result};

/// Streaming source of log elements read from OSM history XML
pub struct OsmXmlSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    elements_seen: u64,
    finished: bool,
}

impl OsmXmlSource<BufReader<File>> {
    /// Open a history file from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> OsmXmlSource<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            elements_seen: 0,
            finished: false,
        }
    }

    /// Number of XML elements read so far
    pub fn elements_seen(&self) -> u64 {
        self.elements_seen
    }
}

impl<R: BufRead> Iterator for OsmXmlSource<R> {
    type Item = Result<LogEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(source) => {
                    self.finished = true;
                    let position = LogPosition {
                        element: self.elements_seen,
                        byte_offset: self.reader.buffer_position() as u64,
                    };
                    return Some(Err(HistoryError::Xml { position, source }));
                }
            };

            match event {
                Event::Start(start) | Event::Empty(start) => {
                    self.elements_seen += 1;
                    let position = LogPosition {
                        element: self.elements_seen,
                        byte_offset: self.reader.buffer_position() as u64,
                    };
                    match decode_element(&start, position) {
                        Ok(Some(element)) => return Some(Ok(LogEntry::new(position, element))),
                        Ok(None) => continue,
                        Err(err) => {
                            self.finished = true;
                            return Some(Err(err));
                        }
                    }
                }
                Event::Eof => {
                    self.finished = true;
                    return None;
                }
                // End tags, text, comments, declarations
                _ => continue,
            }
        }
    }
}

/// Map one start/empty tag to a log element; `None` for wrapper elements
fn decode_element(start: &BytesStart<'_>, position: LogPosition) -> Result<Option<LogElement>> {
    let element = match start.name().as_ref() {
        b"node" => decode_feature(FeatureKind::Node, start, position)?,
        b"way" => decode_feature(FeatureKind::Way, start, position)?,
        b"relation" => decode_feature(FeatureKind::Relation, start, position)?,
        b"nd" => {
            let attrs = ElementAttrs::read("nd", start, position)?;
            LogElement::Member {
                reference: attrs.parse_required("ref")?,
            }
        }
        b"member" => {
            let attrs = ElementAttrs::read("member", start, position)?;
            LogElement::Member {
                reference: attrs.parse_required("ref")?,
            }
        }
        b"tag" => {
            let attrs = ElementAttrs::read("tag", start, position)?;
            LogElement::Tag {
                key: attrs.required("k")?.to_string(),
                value: attrs.required("v")?.to_string(),
            }
        }
        // <osm>, <bounds>, <changeset>, ...
        _ => return Ok(None),
    };
    Ok(Some(element))
}

fn decode_feature(kind: FeatureKind, start: &BytesStart<'_>, position: LogPosition) -> Result<LogElement> {
    let attrs = ElementAttrs::read(kind.as_str(), start, position)?;

    let version: i64 = attrs.parse_required("version")?;
    if version < 1 {
        return Err(attrs.invalid("version", version, "versions start at 1"));
    }

    let (lat, lon) = match kind {
        FeatureKind::Node => (attrs.coordinate("lat")?, attrs.coordinate("lon")?),
        FeatureKind::Way | FeatureKind::Relation => (None, None),
    };

    Ok(LogElement::Feature(FeatureHeader {
        feature_id: attrs.parse_required("id")?,
        kind,
        version,
        timestamp: attrs.parse_required::<DateTime<Utc>>("timestamp")?,
        editor_id: attrs.parse_required("uid")?,
        editor_name: attrs.optional("user").map(str::to_string),
        changeset_id: attrs.parse_optional("changeset")?,
        visible: attrs.parse_optional("visible")?,
        lat,
        lon,
    }))
}
