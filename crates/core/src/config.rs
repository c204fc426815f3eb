//! Form runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into the form store. The store never reads environment variables or files while
//! edits are being applied.
//!
//! Configuration files are YAML:
//!
//! ```yaml
//! required:
//!   - name
//!   - bloodPressure.value
//!   - medicalHistory.vaccination.value
//! attachment_policy: last_selection_wins
//! max_attachment_bytes: 5242880
//! sniff_media_type: true
//! ```
//!
//! Every key is optional. Without `required`, every leaf of the record is required, matching
//! the registration form where each input is mandatory.

use crate::fields::FieldPath;
use crate::{FormError, FormResult, PathKey};
use pform_files::EncodeOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

/// How concurrent encodes for the same attachment leaf are reconciled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentPolicy {
    /// Every encode is applied as it resolves; the one resolving last wins.
    #[default]
    LastResolvedWins,
    /// Only the most recent selection for a leaf is applied; earlier in-flight encodes are
    /// discarded when they resolve.
    LastSelectionWins,
}

/// Form configuration resolved at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FormConfig {
    required: BTreeSet<PathKey>,
    attachment_policy: AttachmentPolicy,
    encode_options: EncodeOptions,
}

impl FormConfig {
    /// Create a new `FormConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidConfig`] if a required path does not name a record leaf or
    /// the attachment size limit is zero.
    pub fn new(
        required: impl IntoIterator<Item = PathKey>,
        attachment_policy: AttachmentPolicy,
        encode_options: EncodeOptions,
    ) -> FormResult<Self> {
        let required: BTreeSet<PathKey> = required.into_iter().collect();

        for path in &required {
            FieldPath::resolve(path).map_err(|e| {
                FormError::InvalidConfig(format!("required path is not a form field: {e}"))
            })?;
        }

        if encode_options.max_bytes == 0 {
            return Err(FormError::InvalidConfig(
                "max_attachment_bytes must be greater than zero".into(),
            ));
        }

        Ok(Self {
            required,
            attachment_policy,
            encode_options,
        })
    }

    /// Parses configuration from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::InvalidConfig`] naming the offending key if the YAML does not match
    /// the configuration schema, or if the parsed values fail [`Self::new`] validation.
    pub fn from_yaml_str(yaml_text: &str) -> FormResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let file = match serde_path_to_error::deserialize::<_, FormConfigFile>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FormError::InvalidConfig(format!(
                    "configuration mismatch at {path}: {source}"
                )));
            }
        };

        let defaults = EncodeOptions::default();
        let required = match file.required {
            Some(paths) => paths,
            None => all_leaves().collect(),
        };

        Self::new(
            required,
            file.attachment_policy.unwrap_or_default(),
            EncodeOptions {
                max_bytes: file.max_attachment_bytes.unwrap_or(defaults.max_bytes),
                sniff_media_type: file.sniff_media_type.unwrap_or(defaults.sniff_media_type),
            },
        )
    }

    /// Reads and parses a YAML configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::ConfigRead`] if the file cannot be read, otherwise as
    /// [`Self::from_yaml_str`].
    pub fn load(path: &Path) -> FormResult<Self> {
        let text = std::fs::read_to_string(path).map_err(FormError::ConfigRead)?;
        Self::from_yaml_str(&text)
    }

    /// Paths that must be non-empty before the form can be submitted.
    pub fn required(&self) -> &BTreeSet<PathKey> {
        &self.required
    }

    pub fn attachment_policy(&self) -> AttachmentPolicy {
        self.attachment_policy
    }

    pub fn encode_options(&self) -> &EncodeOptions {
        &self.encode_options
    }
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            required: all_leaves().collect(),
            attachment_policy: AttachmentPolicy::default(),
            encode_options: EncodeOptions::default(),
        }
    }
}

fn all_leaves() -> impl Iterator<Item = PathKey> {
    FieldPath::all().map(FieldPath::to_key)
}

/// On-disk shape of the configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormConfigFile {
    #[serde(default)]
    required: Option<Vec<PathKey>>,
    #[serde(default)]
    attachment_policy: Option<AttachmentPolicy>,
    #[serde(default)]
    max_attachment_bytes: Option<u64>,
    #[serde(default)]
    sniff_media_type: Option<bool>,
}
