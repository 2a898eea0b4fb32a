//! Edit-log element model
//!
//! A history log is a document-ordered stream: a feature announcement is
//! followed by the child elements (member references, tags) that belong to
//! it. Children carry no feature id of their own.

use geomhist_storage::{FeatureId, FeatureKind, Timestamp};

use crate::errors::{LogPosition, Result};

/// Attributes announced once per feature version
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureHeader {
    pub feature_id: FeatureId,
    pub kind: FeatureKind,
    pub version: i64,
    pub timestamp: Timestamp,
    pub editor_id: i64,
    pub editor_name: Option<String>,
    pub changeset_id: Option<i64>,
    pub visible: Option<bool>,
    /// Nodes only
    pub lat: Option<f64>,
    /// Nodes only
    pub lon: Option<f64>,
}

impl FeatureHeader {
    pub fn new(feature_id: FeatureId, kind: FeatureKind, version: i64, timestamp: Timestamp) -> Self {
        Self {
            feature_id,
            kind,
            version,
            timestamp,
            editor_id: 0,
            editor_name: None,
            changeset_id: None,
            visible: None,
            lat: None,
            lon: None,
        }
    }

    pub fn at(mut self, lat: f64, lon: f64) -> Self {
        self.lat = Some(lat);
        self.lon = Some(lon);
        self
    }

    /// `(feature_id, version)` identity key
    pub fn key(&self) -> (FeatureId, i64) {
        (self.feature_id, self.version)
    }
}

/// One element of the edit log
#[derive(Debug, Clone, PartialEq)]
pub enum LogElement {
    /// A node, way or relation version starts
    Feature(FeatureHeader),
    /// Reference to another feature (`<nd>` or `<member>`)
    Member { reference: FeatureId },
    /// Free-form key/value pair
    Tag { key: String, value: String },
}

impl LogElement {
    pub fn member(reference: FeatureId) -> Self {
        LogElement::Member { reference }
    }

    pub fn tag(key: impl Into<String>, value: impl Into<String>) -> Self {
        LogElement::Tag {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LogElement::Feature(header) => header.kind.as_str(),
            LogElement::Member { .. } => "member",
            LogElement::Tag { .. } => "tag",
        }
    }
}

/// An element together with where it was read
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub position: LogPosition,
    pub element: LogElement,
}

impl LogEntry {
    pub fn new(position: LogPosition, element: LogElement) -> Self {
        Self { position, element }
    }
}

/// Turn in-memory elements into a log stream, numbering them 1, 2, 3, ...
pub fn from_elements(
    elements: impl IntoIterator<Item = LogElement>,
) -> impl Iterator<Item = Result<LogEntry>> {
    elements.into_iter().enumerate().map(|(idx, element)| {
        Ok(LogEntry::new(
            LogPosition {
                element: idx as u64 + 1,
                byte_offset: 0,
            },
            element,
        ))
    })
}
