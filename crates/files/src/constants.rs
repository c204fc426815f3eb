//! Constants shared by the attachment encoder.

/// Media type used when a source declares none and none can be detected.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Default upper bound on the size of a single attachment (10 MiB).
pub const DEFAULT_MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

pub(crate) const DATA_URL_PREFIX: &str = "data:";

pub(crate) const BASE64_MARKER: &str = ";base64";
