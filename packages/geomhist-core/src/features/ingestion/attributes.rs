//! Attribute access for quick-xml start tags

use std::borrow::Cow;
use std::fmt::Display;
use std::str::FromStr;

use quick_xml::events::BytesStart;

use crate::errors::{HistoryError, LogPosition, Result};

/// Unescaped attributes of one element
pub(super) struct ElementAttrs {
    element: &'static str,
    position: LogPosition,
    values: Vec<(String, String)>,
}

impl ElementAttrs {
    pub(super) fn read(element: &'static str, start: &BytesStart<'_>, position: LogPosition) -> Result<Self> {
        let mut values = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| HistoryError::malformed(position, element, e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|e| {
                HistoryError::malformed(position, element, format!("attribute '{}': {}", key, e))
            })?;
            values.push((key, Cow::into_owned(value)));
        }
        Ok(Self {
            element,
            position,
            values,
        })
    }

    pub(super) fn optional(&self, key: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(super) fn required(&self, key: &str) -> Result<&str> {
        self.optional(key).ok_or_else(|| {
            HistoryError::malformed(
                self.position,
                self.element,
                format!("missing required attribute '{}'", key),
            )
        })
    }

    pub(super) fn parse_required<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: Display,
    {
        let raw = self.required(key)?;
        raw.parse().map_err(|e| self.invalid(key, raw, e))
    }

    pub(super) fn parse_optional<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: Display,
    {
        self.optional(key)
            .map(|raw| raw.parse().map_err(|e| self.invalid(key, raw, e)))
            .transpose()
    }

    /// Optional coordinate; `NaN` and infinities are rejected
    pub(super) fn coordinate(&self, key: &str) -> Result<Option<f64>> {
        match self.parse_optional::<f64>(key)? {
            Some(value) if !value.is_finite() => Err(self.invalid(key, value, "coordinate must be finite")),
            value => Ok(value),
        }
    }

    pub(super) fn invalid(&self, key: &str, raw: impl Display, reason: impl Display) -> HistoryError {
        HistoryError::malformed(
            self.position,
            self.element,
            format!("attribute '{}' = '{}': {}", key, raw, reason),
        )
    }
}
