use crate::fields::AttachmentSlot;
use crate::path::PathRejection;

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: PathRejection },
    #[error("unknown field `{path}`")]
    UnknownField { path: String },
    #[error("could not read {slot} attachment: {source}")]
    UnreadableFile {
        slot: AttachmentSlot,
        #[source]
        source: pform_files::AttachmentError,
    },
    #[error("`{path}` expects {expected}")]
    ValueMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration file: {0}")]
    ConfigRead(std::io::Error),
    #[error("translation error: {0}")]
    Translation(String),
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("session credential cannot be empty")]
    EmptyCredential,
}

pub type FormResult<T> = std::result::Result<T, FormError>;
