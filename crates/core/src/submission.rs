//! Hand-off to the transport collaborator.
//!
//! The form does not talk to the record store itself. On submit it packages the current
//! snapshot into a [`Submission`] together with the caller's [`SessionCredential`]; the
//! credential is supplied explicitly at the call site and never looked up from shared
//! state.

use crate::record::PatientRecord;
use crate::{FormError, FormResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Opaque credential authorising a submission.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredential(String);

impl SessionCredential {
    /// # Errors
    ///
    /// Returns [`FormError::EmptyCredential`] if `token` is empty or whitespace.
    pub fn new(token: impl Into<String>) -> FormResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(FormError::EmptyCredential);
        }
        Ok(Self(token))
    }

    /// The raw token, for the transport to attach to its request.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionCredential(<redacted>)")
    }
}

/// Whether the submission creates a record or updates an existing one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FormMode {
    Create,
    Update { id: String },
}

/// A snapshot ready for the transport collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub mode: FormMode,
    pub record: Arc<PatientRecord>,
    pub prepared_at: DateTime<Utc>,
    #[serde(skip)]
    pub credential: SessionCredential,
}

impl Submission {
    pub fn new(record: Arc<PatientRecord>, credential: SessionCredential) -> Self {
        let mode = match record.id() {
            Some(id) => FormMode::Update { id: id.to_owned() },
            None => FormMode::Create,
        };

        Self {
            mode,
            record,
            prepared_at: Utc::now(),
            credential,
        }
    }

    /// Serialises the payload (mode, record, timestamp) without the credential.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Serialization`] if serialisation fails.
    pub fn payload_json(&self) -> FormResult<String> {
        serde_json::to_string_pretty(self).map_err(FormError::Serialization)
    }
}
