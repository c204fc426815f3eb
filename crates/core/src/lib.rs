//! # Patient Form Core
//!
//! Core logic for the patient registration and update form.
//!
//! The form holds one nested patient record: demographic text fields, fifteen measurement
//! groups of `{value, range, unit}`, a `medicalHistory` category with three such groups, and
//! two file attachments. Every input names the leaf it edits with a dotted identifier:
//!
//! - [`PathKey`] parses and validates the identifier
//! - [`FieldPath`] resolves it to a typed record leaf
//! - [`patch`] replaces that leaf, copying only its ancestors
//! - [`FormStore`] holds the current snapshot, applies edits and attachment encodes, and
//!   answers completeness queries
//!
//! **No transport concerns**: the form never talks to the remote record store. A
//! [`Submission`] packages the snapshot with an explicit [`SessionCredential`] for whatever
//! transport the caller uses.
//!
//! ## Example Usage
//!
//! ```no_run
//! use pform_core::{FormConfig, FormStore};
//! use std::sync::Arc;
//!
//! # fn run() -> pform_core::FormResult<()> {
//! let store = FormStore::new(Arc::new(FormConfig::default()));
//! store.apply_edit("name", "Asha Rao")?;
//! store.apply_edit("bloodPressure.value", "120/80")?;
//! store.apply_edit("medicalHistory.vaccination.range", "5y")?;
//!
//! for missing in store.missing_configured() {
//!     println!("missing: {missing}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
mod error;
pub mod fields;
pub mod patch;
mod path;
pub mod record;
pub mod store;
pub mod submission;
mod wire;

pub use config::{AttachmentPolicy, FormConfig};
pub use error::{FormError, FormResult};
pub use fields::{
    AttachmentSlot, DemographicField, FieldPath, HistoryItem, MeasurementKind, MeasurementPart,
};
pub use patch::PatchValue;
pub use path::{PathKey, PathRejection};
pub use record::{AttachmentValue, Leaf, MeasurementField, MedicalHistory, PatientRecord, Text};
pub use store::{AttachmentOutcome, FormStore};
pub use submission::{FormMode, SessionCredential, Submission};

pub use pform_files::{AttachmentError, AttachmentSource, EncodeOptions, EncodedAttachment};
