//! Dot-delimited field paths.
//!
//! Form inputs name the leaf they edit with a flat identifier such as `name`,
//! `bloodPressure.value` or `medicalHistory.vaccination.range`. [`PathKey`] is the validated
//! form of such an identifier: one to three non-empty segments.
//!
//! A `PathKey` says nothing about whether the record actually has that leaf; see
//! [`FieldPath::resolve`](crate::FieldPath::resolve) for that step.

use crate::constants::{MAX_PATH_DEPTH, PATH_DELIMITER};
use crate::{FormError, FormResult};
use std::fmt;
use std::str::FromStr;

/// Why a raw identifier was rejected.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathRejection {
    #[error("segment {position} is empty")]
    EmptySegment { position: usize },
    #[error("{depth} segments exceed the maximum depth of {}", MAX_PATH_DEPTH)]
    TooDeep { depth: usize },
}

/// A validated field identifier of depth 1 to 3.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PathKey {
    segments: Vec<String>,
}

impl PathKey {
    /// Parses a dot-delimited identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidPath`] if the identifier has more than three segments or any
    /// segment is empty (including the empty string itself).
    pub fn parse(raw: &str) -> FormResult<Self> {
        Self::from_segments(raw.split(PATH_DELIMITER)).map_err(|reason| FormError::InvalidPath {
            path: raw.to_owned(),
            reason,
        })
    }

    fn from_segments<'a>(segments: impl Iterator<Item = &'a str>) -> Result<Self, PathRejection> {
        let segments: Vec<&str> = segments.collect();

        if segments.len() > MAX_PATH_DEPTH {
            return Err(PathRejection::TooDeep {
                depth: segments.len(),
            });
        }

        if let Some(position) = segments.iter().position(|s| s.is_empty()) {
            return Err(PathRejection::EmptySegment { position });
        }

        Ok(Self {
            segments: segments.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Builds a key from segments known to satisfy the grammar.
    pub(crate) fn from_known(segments: &[&str]) -> Self {
        debug_assert!((1..=MAX_PATH_DEPTH).contains(&segments.len()));
        Self {
            segments: segments.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{PATH_DELIMITER}")?;
            }
            f.write_str(segment)?;
        }
        Ok(())
    }
}

impl FromStr for PathKey {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for PathKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for PathKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PathKey::parse(&s).map_err(serde::de::Error::custom)
    }
}
