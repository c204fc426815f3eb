//! Asynchronous file-to-text encoding
//!
//! [`encode`] drains an [`AttachmentSource`] through tokio's async I/O, so a read in flight
//! never blocks the task driving the form. The bytes are then base64-encoded and paired with
//! a media type to form an [`EncodedAttachment`].
//!
//! # Media type resolution
//!
//! 1. The type declared by the source, if present and non-blank
//! 2. A content-based guess via `infer`, when [`EncodeOptions::sniff_media_type`] is set
//! 3. [`OCTET_STREAM`]
//!
//! Detection is best-effort and should not be considered authoritative.

use crate::constants::{BASE64_MARKER, DATA_URL_PREFIX, DEFAULT_MAX_ATTACHMENT_BYTES, OCTET_STREAM};
use crate::{AttachmentError, AttachmentResult};
use base64::{engine::general_purpose, Engine as _};
use std::fmt;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt};

/// A binary file rendered as portable text
///
/// `data` is the standard base64 encoding of the original bytes. Serialises as
/// `{ "mediaType": …, "data": … }`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedAttachment {
    media_type: String,
    data: String,
}

impl EncodedAttachment {
    /// Encodes raw bytes under the given media type.
    ///
    /// A blank media type is replaced by [`OCTET_STREAM`].
    pub fn from_bytes(media_type: impl AsRef<str>, bytes: &[u8]) -> Self {
        Self {
            media_type: normalise_media_type(media_type.as_ref()),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Builds an attachment from an already encoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Decode`] if `data` is not valid standard base64.
    pub fn from_parts(media_type: impl AsRef<str>, data: impl Into<String>) -> AttachmentResult<Self> {
        let data = data.into();
        general_purpose::STANDARD.decode(&data)?;
        Ok(Self {
            media_type: normalise_media_type(media_type.as_ref()),
            data,
        })
    }

    /// Parses a `data:<type>;base64,<payload>` URL.
    ///
    /// An empty type (`data:;base64,…`) resolves to [`OCTET_STREAM`]. Only base64 payloads are
    /// accepted.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::InvalidDataUrl`] if the scheme, separator or base64 marker is
    /// missing, or [`AttachmentError::Decode`] if the payload is not valid base64.
    pub fn from_data_url(url: &str) -> AttachmentResult<Self> {
        let rest = url
            .strip_prefix(DATA_URL_PREFIX)
            .ok_or_else(|| AttachmentError::InvalidDataUrl("missing `data:` scheme".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| AttachmentError::InvalidDataUrl("missing `,` separator".into()))?;
        let media_type = header.strip_suffix(BASE64_MARKER).ok_or_else(|| {
            AttachmentError::InvalidDataUrl("only base64 data URLs are supported".into())
        })?;

        Self::from_parts(media_type, payload)
    }

    /// Renders the attachment as a data URL.
    pub fn to_data_url(&self) -> String {
        format!(
            "{DATA_URL_PREFIX}{}{BASE64_MARKER},{}",
            self.media_type, self.data
        )
    }

    /// Decodes the payload back to the original bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Decode`] if the payload was tampered with after construction.
    pub fn decode(&self) -> AttachmentResult<Vec<u8>> {
        Ok(general_purpose::STANDARD.decode(&self.data)?)
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn data(&self) -> &str {
        &self.data
    }
}

/// Limits and detection settings applied by [`encode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Largest number of bytes accepted from a single source
    pub max_bytes: u64,

    /// Guess the media type from content when the source declares none
    pub sniff_media_type: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            sniff_media_type: true,
        }
    }
}

/// A file selected for upload, not yet read
///
/// Wraps any async byte stream together with a display name (for diagnostics) and the
/// media type the selection declared, if any.
pub struct AttachmentSource {
    name: String,
    declared_type: Option<String>,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl AttachmentSource {
    /// Opens a file on disk as an attachment source.
    ///
    /// The file name becomes the source name. No media type is declared; use
    /// [`Self::with_declared_type`] to supply one.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Unreadable`] if the file cannot be opened.
    pub async fn from_path(path: impl AsRef<Path>) -> AttachmentResult<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_owned)
            .unwrap_or_else(|| path.display().to_string());

        let file = tokio::fs::File::open(path)
            .await
            .map_err(|source| AttachmentError::Unreadable {
                name: name.clone(),
                source,
            })?;

        Ok(Self::from_reader(name, file))
    }

    /// Wraps bytes already held in memory.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, std::io::Cursor::new(bytes.into()))
    }

    /// Wraps an arbitrary async reader.
    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            name: name.into(),
            declared_type: None,
            reader: Box::new(reader),
        }
    }

    /// Sets the media type declared by the selection (for example from a file picker).
    pub fn with_declared_type(mut self, media_type: impl Into<String>) -> Self {
        self.declared_type = Some(media_type.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.declared_type.as_deref()
    }
}

impl fmt::Debug for AttachmentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentSource")
            .field("name", &self.name)
            .field("declared_type", &self.declared_type)
            .finish_non_exhaustive()
    }
}

/// Reads `source` to completion and encodes it.
///
/// Suspends until every byte has been read. Nothing is produced for a partially read source.
///
/// # Errors
///
/// Returns `AttachmentError` if:
/// - the stream fails before reaching end of file ([`AttachmentError::Unreadable`])
/// - the stream holds more than `options.max_bytes` bytes ([`AttachmentError::TooLarge`])
pub async fn encode(
    source: AttachmentSource,
    options: &EncodeOptions,
) -> AttachmentResult<EncodedAttachment> {
    let AttachmentSource {
        name,
        declared_type,
        reader,
    } = source;

    // One byte past the limit is enough to tell an oversized source apart.
    let mut limited = reader.take(options.max_bytes.saturating_add(1));
    let mut buffer = Vec::new();
    limited
        .read_to_end(&mut buffer)
        .await
        .map_err(|source| AttachmentError::Unreadable {
            name: name.clone(),
            source,
        })?;

    if buffer.len() as u64 > options.max_bytes {
        return Err(AttachmentError::TooLarge {
            name,
            limit: options.max_bytes,
        });
    }

    let media_type = resolve_media_type(declared_type.as_deref(), &buffer, options.sniff_media_type);
    tracing::debug!(
        attachment = %name,
        size_bytes = buffer.len(),
        media_type = %media_type,
        "attachment read"
    );

    Ok(EncodedAttachment::from_bytes(media_type, &buffer))
}

fn resolve_media_type(declared: Option<&str>, content: &[u8], sniff: bool) -> String {
    if let Some(declared) = declared.map(str::trim).filter(|t| !t.is_empty()) {
        return declared.to_owned();
    }

    if sniff {
        if let Some(kind) = infer::get(content) {
            return kind.mime_type().to_owned();
        }
    }

    OCTET_STREAM.to_owned()
}

fn normalise_media_type(media_type: &str) -> String {
    let trimmed = media_type.trim();
    if trimmed.is_empty() {
        OCTET_STREAM.to_owned()
    } else {
        trimmed.to_owned()
    }
}


/// Property-based tests using proptest
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(future)
    }

    proptest! {
        /// Any byte sequence survives encode then decode unchanged
        #[test]
        fn encode_decode_round_trip(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
            let source = AttachmentSource::from_bytes("blob.bin", bytes.clone());
            let encoded = block_on(encode(source, &EncodeOptions::default())).unwrap();

            prop_assert_eq!(encoded.decode().unwrap(), bytes);
        }

        /// The data URL form carries both the payload and the media type
        #[test]
        fn data_url_round_trip(
            bytes in prop::collection::vec(any::<u8>(), 0..4096),
            media_type in "(image|application|text)/[a-z0-9.+-]{1,20}",
        ) {
            let attachment = EncodedAttachment::from_bytes(&media_type, &bytes);

            let parsed = EncodedAttachment::from_data_url(&attachment.to_data_url()).unwrap();

            prop_assert_eq!(parsed.media_type(), media_type.as_str());
            prop_assert_eq!(parsed.decode().unwrap(), bytes);
            prop_assert_eq!(parsed, attachment);
        }
    }
}
