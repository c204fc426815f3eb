//! Patient Form Attachments
//!
//! This crate turns user-selected binary files into portable text payloads that can be
//! embedded in a patient record, and back again.
//!
//! ## Design Principles
//!
//! - A source is read asynchronously and completely before anything is produced
//! - Each selection yields one immutable [`EncodedAttachment`]; a new selection replaces it
//! - The payload is standard base64, safe inside a JSON string and byte-for-byte reversible
//! - The media type comes from the source's declared type, optionally sniffed from content,
//!   and otherwise defaults to [`OCTET_STREAM`]
//!
//! ## Data URLs
//!
//! Records exchanged with the remote record store carry attachments as data URLs:
//!
//! ```text
//! data:image/png;base64,iVBORw0KGgo…
//! ```
//!
//! [`EncodedAttachment::to_data_url`] and [`EncodedAttachment::from_data_url`] convert between
//! the two forms.
//!
//! ## Example Usage
//!
//! ```no_run
//! use pform_files::{encode, AttachmentSource, EncodeOptions};
//!
//! # async fn run() -> Result<(), pform_files::AttachmentError> {
//! let source = AttachmentSource::from_path("scan.pdf").await?;
//! let attachment = encode(source, &EncodeOptions::default()).await?;
//! println!("{} bytes of {}", attachment.data().len(), attachment.media_type());
//! # Ok(())
//! # }
//! ```

mod constants;
mod encoder;

pub use constants::{DEFAULT_MAX_ATTACHMENT_BYTES, OCTET_STREAM};
pub use encoder::{encode, AttachmentSource, EncodeOptions, EncodedAttachment};

/// Errors that can occur while encoding or decoding attachments
#[derive(Debug, thiserror::Error)]
pub enum AttachmentError {
    /// The byte stream could not be consumed to completion
    #[error("failed to read attachment {name}: {source}")]
    Unreadable {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The source holds more bytes than the configured limit
    #[error("attachment {name} exceeds the limit of {limit} bytes")]
    TooLarge { name: String, limit: u64 },

    /// Text is not a `data:<type>;base64,<payload>` URL
    #[error("invalid data URL: {0}")]
    InvalidDataUrl(String),

    /// Payload is not valid standard base64
    #[error("invalid base64 payload: {0}")]
    Decode(#[from] base64::DecodeError),
}

/// Type alias for Results that can fail with an [`AttachmentError`].
pub type AttachmentResult<T> = Result<T, AttachmentError>;
