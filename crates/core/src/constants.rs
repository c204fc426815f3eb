//! Constants used throughout the form engine.
//!
//! Keeping the path grammar and wire keys in one place ensures the parser, the typed
//! field set and the record serialiser agree.

/// Separator between segments of a field path (`medicalHistory.vaccination.range`).
pub const PATH_DELIMITER: char = '.';

/// Deepest field path the record shape allows.
pub const MAX_PATH_DEPTH: usize = 3;

/// Top-level key of the medical history category.
pub const MEDICAL_HISTORY_KEY: &str = "medicalHistory";

/// Key the remote record store uses for its record identifier.
pub const RECORD_ID_KEY: &str = "_id";

/// Alternative identifier key accepted when hydrating.
pub const RECORD_ID_ALIAS: &str = "id";

/// Data URL some browsers produce when reading an empty file; stored as an empty attachment.
pub const EMPTY_DATA_URL: &str = "data:";

/// Whether `text` denotes an empty attachment leaf.
pub(crate) fn is_empty_attachment_text(text: &str) -> bool {
    text.is_empty() || text == EMPTY_DATA_URL
}
