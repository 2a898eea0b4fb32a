//! OSM changeset dump reader
//!
//! Changeset dumps list one `<changeset>` per upload, with the uploader's
//! `<tag>` children nested inside:
//!
//! ```xml
//! <osm version="0.6">
//!   <changeset id="4711" created_at="2012-01-01T10:00:00Z" closed_at="2012-01-01T10:05:00Z"
//!              open="false" user="mapper" uid="7" min_lat="60.1" min_lon="24.7"
//!              max_lat="60.2" max_lon="24.9" num_changes="12" comments_count="0">
//!     <tag k="source" v="survey"/>
//!   </changeset>
//! </osm>
//! ```
//!
//! Every attribute but `id` is optional. Discussion threads are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::{DateTime, Utc};
use geomhist_storage::{BoundingBox, ChangesetRecord};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::attributes::ElementAttrs;
use crate::errors::{HistoryError, LogPosition, Result};

/// Streaming source of changesets read from a changeset dump
pub struct OsmChangesetSource<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    elements_seen: u64,
    state: FoldState,
    finished: bool,
}

/// Changeset being collected, kept apart from the event buffer it is read from
#[derive(Default)]
struct FoldState {
    current: Option<ChangesetRecord>,
    /// Depth of elements nested in the current changeset (discussion, comment, ...)
    nested: usize,
}

impl OsmChangesetSource<BufReader<File>> {
    /// Open a changeset dump from disk
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> OsmChangesetSource<R> {
    pub fn new(inner: R) -> Self {
        let mut reader = Reader::from_reader(inner);
        reader.config_mut().trim_text(true);
        Self {
            reader,
            buf: Vec::with_capacity(4096),
            elements_seen: 0,
            state: FoldState::default(),
            finished: false,
        }
    }

    /// Number of XML elements read so far
    pub fn elements_seen(&self) -> u64 {
        self.elements_seen
    }

    fn position(&self) -> LogPosition {
        LogPosition {
            element: self.elements_seen,
            byte_offset: self.reader.buffer_position() as u64,
        }
    }

    fn fail(&mut self, err: HistoryError) -> Option<Result<ChangesetRecord>> {
        self.finished = true;
        self.state = FoldState::default();
        Some(Err(err))
    }
}

impl FoldState {
    /// Fold one start tag into the parser state; `Some` when a changeset is complete
    fn on_start(
        &mut self,
        start: &BytesStart<'_>,
        is_empty: bool,
        position: LogPosition,
    ) -> Result<Option<ChangesetRecord>> {
        match start.name().as_ref() {
            b"changeset" => {
                if self.current.is_some() {
                    return Err(HistoryError::malformed(
                        position,
                        "changeset",
                        "changeset nested in another changeset",
                    ));
                }
                let changeset = decode_changeset(start, position)?;
                if is_empty {
                    return Ok(Some(changeset));
                }
                self.current = Some(changeset);
            }
            b"tag" if self.nested == 0 => {
                let (key, value) = decode_tag(start, position)?;
                let Some(current) = self.current.as_mut() else {
                    return Err(HistoryError::malformed(
                        position,
                        "tag",
                        "orphan child: no changeset announced yet",
                    ));
                };
                // First occurrence of a key wins
                current
                    .tags
                    .get_or_insert_with(Default::default)
                    .entry(key)
                    .or_insert(value);
            }
            _ => {
                if self.current.is_some() && !is_empty {
                    self.nested += 1;
                }
            }
        }
        Ok(None)
    }
}

impl<R: BufRead> Iterator for OsmChangesetSource<R> {
    type Item = Result<ChangesetRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(source) => {
                    let position = Self::position(self);
                    return self.fail(HistoryError::Xml { position, source });
                }
            };

            let (start, is_empty) = match event {
                Event::Start(start) => (start, false),
                Event::Empty(start) => (start, true),
                Event::End(end) => {
                    if end.name().as_ref() == b"changeset" {
                        if let Some(done) = self.state.current.take() {
                            return Some(Ok(done));
                        }
                    } else if self.state.current.is_some() {
                        self.state.nested = self.state.nested.saturating_sub(1);
                    }
                    continue;
                }
                Event::Eof => {
                    if self.state.current.is_some() {
                        let position = Self::position(self);
                        return self.fail(HistoryError::malformed(
                            position,
                            "changeset",
                            "input ended inside a changeset",
                        ));
                    }
                    self.finished = true;
                    return None;
                }
                // Text, comments, declarations
                _ => continue,
            };

            self.elements_seen += 1;
            let position = LogPosition {
                element: self.elements_seen,
                byte_offset: self.reader.buffer_position() as u64,
            };
            let step = self.state.on_start(&start, is_empty, position);
            drop(start);

            match step {
                Ok(Some(done)) => return Some(Ok(done)),
                Ok(None) => continue,
                Err(err) => return self.fail(err),
            }
        }
    }
}

impl<R: BufRead> std::iter::FusedIterator for OsmChangesetSource<R> {}

fn decode_changeset(start: &BytesStart<'_>, position: LogPosition) -> Result<ChangesetRecord> {
    let attrs = ElementAttrs::read("changeset", start, position)?;

    let corners = (
        attrs.coordinate("min_lat")?,
        attrs.coordinate("min_lon")?,
        attrs.coordinate("max_lat")?,
        attrs.coordinate("max_lon")?,
    );
    let bbox = match corners {
        (Some(min_lat), Some(min_lon), Some(max_lat), Some(max_lon)) => Some(BoundingBox {
            min_lat,
            min_lon,
            max_lat,
            max_lon,
        }),
        (None, None, None, None) => None,
        _ => {
            return Err(HistoryError::malformed(
                position,
                "changeset",
                "bounding box needs all of min_lat, min_lon, max_lat, max_lon",
            ))
        }
    };

    Ok(ChangesetRecord {
        changeset_id: attrs.parse_required("id")?,
        created_at: attrs.parse_optional::<DateTime<Utc>>("created_at")?,
        closed_at: attrs.parse_optional::<DateTime<Utc>>("closed_at")?,
        open: attrs.parse_optional("open")?,
        user: attrs.optional("user").map(str::to_string),
        uid: attrs.parse_optional("uid")?,
        bbox,
        num_changes: attrs.parse_optional("num_changes")?,
        comments_count: attrs.parse_optional("comments_count")?,
        tags: None,
    })
}

fn decode_tag(start: &BytesStart<'_>, position: LogPosition) -> Result<(String, String)> {
    let attrs = ElementAttrs::read("tag", start, position)?;
    Ok((attrs.required("k")?.to_string(), attrs.required("v")?.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn read_all(xml: &str) -> Result<Vec<ChangesetRecord>> {
        OsmChangesetSource::new(xml.as_bytes()).collect()
    }

    #[test]
    fn test_changeset_attributes_and_tags() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<osm version="0.6" generator="planet-dump-ng">
  <bound box="-90,-180,90,180" origin="http://www.openstreetmap.org/api/0.6"/>
  <changeset id="4711" created_at="2012-01-01T10:00:00Z" closed_at="2012-01-01T10:05:00Z" open="false" user="M&amp;M" uid="7" min_lat="60.1" min_lon="24.7" max_lat="60.2" max_lon="24.9" num_changes="12" comments_count="1">
    <tag k="source" v="survey"/>
    <tag k="comment" v="footpaths"/>
    <discussion>
      <comment uid="8" user="reviewer" date="2012-01-02T00:00:00Z">
        <text>thanks</text>
      </comment>
    </discussion>
  </changeset>
  <changeset id="4712" created_at="2012-01-01T11:00:00Z" open="true" uid="9" num_changes="0" comments_count="0"/>
</osm>"#;

        let changesets = read_all(xml).unwrap();
        assert_eq!(changesets.len(), 2);

        let first = &changesets[0];
        assert_eq!(first.changeset_id, 4711);
        assert_eq!(first.user.as_deref(), Some("M&M"));
        assert_eq!(first.uid, Some(7));
        assert_eq!(first.open, Some(false));
        assert_eq!(first.num_changes, Some(12));
        assert_eq!(first.comments_count, Some(1));
        assert_eq!(first.bbox.map(|b| b.max_lon), Some(24.9));
        assert_eq!(first.closed_at.map(|t| t.to_rfc3339()).as_deref(), Some("2012-01-01T10:05:00+00:00"));
        assert_eq!(first.source(), Some("survey"));
        assert_eq!(first.tags.as_ref().map(|t| t.len()), Some(2));

        let second = &changesets[1];
        assert_eq!(second.changeset_id, 4712);
        assert_eq!(second.open, Some(true));
        assert_eq!(second.closed_at, None);
        assert_eq!(second.bbox, None);
        assert_eq!(second.tags, None);
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let err = read_all(r#"<osm><changeset uid="1"/></osm>"#).unwrap_err();
        assert!(err.to_string().contains("missing required attribute 'id'"), "{}", err);
    }

    #[test]
    fn test_partial_bounding_box_is_malformed() {
        let err = read_all(r#"<osm><changeset id="1" min_lat="60.0"/></osm>"#).unwrap_err();
        assert!(err.to_string().contains("bounding box"), "{}", err);
    }

    #[test]
    fn test_orphan_tag_is_malformed() {
        let err = read_all(r#"<osm><tag k="source" v="Bing"/></osm>"#).unwrap_err();
        match err {
            HistoryError::MalformedElement { position, element, .. } => {
                assert_eq!(position.element, 2);
                assert_eq!(element, "tag");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_first_tag_value_wins() {
        let xml = r#"<osm><changeset id="1"><tag k="source" v="Bing"/><tag k="source" v="survey"/></changeset></osm>"#;
        let changesets = read_all(xml).unwrap();
        assert_eq!(changesets[0].source(), Some("Bing"));
    }

    #[test]
    fn test_source_is_fused_after_error() {
        let xml = r#"<osm><changeset id="x"/><changeset id="2"/></osm>"#;
        let mut source = OsmChangesetSource::new(xml.as_bytes());
        assert!(source.next().unwrap().is_err());
        assert!(source.next().is_none());
    }
}
