//! JSON wire form of the patient record.
//!
//! The remote record store exchanges records as flat camelCase JSON objects:
//!
//! ```text
//! {
//!   "_id": "…",                                        (existing records only)
//!   "name": "…", "age": "…", …,
//!   "bloodPressure": { "value": "…", "range": "…", "unit": "…" }, …,
//!   "medicalHistory": { "vaccination": { "value": "…", … }, … },
//!   "photo": "data:image/png;base64,…",
//!   "documentFile": ""
//! }
//! ```
//!
//! Responsibilities:
//! - Serialise a [`PatientRecord`] in form order, attachments as data URLs
//! - Hydrate a record from store output, defaulting every absent leaf to empty
//! - Tolerate what the store adds or coerces: unknown keys are ignored, numbers and
//!   booleans in text leaves are kept as their JSON text, `null` is empty
//! - Report shape mismatches with the dotted path of the offending value

use crate::constants::{
    is_empty_attachment_text, MEDICAL_HISTORY_KEY, RECORD_ID_ALIAS, RECORD_ID_KEY,
};
use crate::fields::{AttachmentSlot, DemographicField, HistoryItem, MeasurementKind, MeasurementPart};
use crate::record::{empty_text, AttachmentValue, MeasurementField, MedicalHistory, PatientRecord, Text};
use crate::{FormError, FormResult};
use pform_files::EncodedAttachment;
use serde::ser::SerializeMap;
use serde_json::{Map, Value};
use std::sync::Arc;

impl PatientRecord {
    /// Parses a record from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Translation`] if the text is not JSON or does not have the record
    /// shape.
    pub fn from_json(text: &str) -> FormResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| FormError::Translation(format!("record is not valid JSON: {e}")))?;
        Self::from_value(value)
    }

    /// Converts a JSON value into a record, defaulting absent leaves.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Translation`] naming the first value whose shape does not match.
    pub fn from_value(value: Value) -> FormResult<Self> {
        let Value::Object(mut map) = value else {
            return Err(mismatch("<root>", "an object"));
        };

        let mut record = PatientRecord::empty();

        let id = map
            .remove(RECORD_ID_KEY)
            .or_else(|| map.remove(RECORD_ID_ALIAS));
        if let Some(id) = id {
            let id = text_leaf(id, RECORD_ID_KEY)?;
            record.id = (!id.is_empty()).then_some(id);
        }

        for &field in DemographicField::ALL {
            if let Some(value) = map.remove(field.as_str()) {
                record.demographics[field.index()] = text_leaf(value, field.as_str())?;
            }
        }

        for &kind in MeasurementKind::ALL {
            if let Some(value) = map.remove(kind.as_str()) {
                record.measurements[kind.index()] =
                    Arc::new(measurement_group(value, kind.as_str())?);
            }
        }

        if let Some(value) = map.remove(MEDICAL_HISTORY_KEY) {
            record.medical_history = Arc::new(medical_history(value)?);
        }

        for &slot in AttachmentSlot::ALL {
            if let Some(value) = map.remove(slot.as_str()) {
                record.attachments[slot.index()] = attachment_leaf(value, slot.as_str())?;
            }
        }

        if !map.is_empty() {
            tracing::debug!(
                ignored = ?map.keys().collect::<Vec<_>>(),
                "ignoring keys outside the record shape"
            );
        }

        Ok(record)
    }

    /// Serialises the record as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::Serialization`] if serialisation fails.
    pub fn to_json_pretty(&self) -> FormResult<String> {
        serde_json::to_string_pretty(self).map_err(FormError::Serialization)
    }
}

impl serde::Serialize for PatientRecord {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = self.id() {
            map.serialize_entry(RECORD_ID_KEY, id)?;
        }
        for &field in DemographicField::ALL {
            map.serialize_entry(field.as_str(), self.demographic(field))?;
        }
        for &kind in MeasurementKind::ALL {
            map.serialize_entry(kind.as_str(), &**self.measurement(kind))?;
        }
        map.serialize_entry(MEDICAL_HISTORY_KEY, &*self.medical_history)?;
        for &slot in AttachmentSlot::ALL {
            map.serialize_entry(slot.as_str(), self.attachment(slot))?;
        }
        map.end()
    }
}

impl<'de> serde::Deserialize<'de> for PatientRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        PatientRecord::from_value(value).map_err(serde::de::Error::custom)
    }
}

impl serde::Serialize for MedicalHistory {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(HistoryItem::COUNT))?;
        for &item in HistoryItem::ALL {
            map.serialize_entry(item.as_str(), &**self.item(item))?;
        }
        map.end()
    }
}

impl serde::Serialize for AttachmentValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            AttachmentValue::Empty => serializer.serialize_str(""),
            AttachmentValue::Encoded(attachment) => {
                serializer.serialize_str(&attachment.to_data_url())
            }
        }
    }
}

// ============================================================================
// Helper functions (internal)
// ============================================================================

fn mismatch(path: &str, expected: &str) -> FormError {
    FormError::Translation(format!("record schema mismatch at {path}: expected {expected}"))
}

fn text_leaf(value: Value, path: &str) -> FormResult<Text> {
    match value {
        Value::Null => Ok(empty_text()),
        Value::String(s) => Ok(Text::from(s)),
        Value::Number(n) => Ok(Text::from(n.to_string())),
        Value::Bool(b) => Ok(Text::from(b.to_string())),
        Value::Array(_) | Value::Object(_) => Err(mismatch(path, "text")),
    }
}

fn object_or_empty(value: Value, path: &str) -> FormResult<Map<String, Value>> {
    match value {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        _ => Err(mismatch(path, "an object")),
    }
}

fn measurement_group(value: Value, path: &str) -> FormResult<MeasurementField> {
    let mut map = object_or_empty(value, path)?;
    let mut take = |part: MeasurementPart| match map.remove(part.as_str()) {
        Some(value) => text_leaf(value, &format!("{path}.{part}")),
        None => Ok(empty_text()),
    };

    Ok(MeasurementField::new(
        take(MeasurementPart::Value)?,
        take(MeasurementPart::Range)?,
        take(MeasurementPart::Unit)?,
    ))
}

fn medical_history(value: Value) -> FormResult<MedicalHistory> {
    let mut map = object_or_empty(value, MEDICAL_HISTORY_KEY)?;
    let mut history = MedicalHistory::empty();

    for &item in HistoryItem::ALL {
        if let Some(value) = map.remove(item.as_str()) {
            let path = format!("{MEDICAL_HISTORY_KEY}.{item}");
            history.items[item.index()] = Arc::new(measurement_group(value, &path)?);
        }
    }

    Ok(history)
}

fn attachment_leaf(value: Value, path: &str) -> FormResult<AttachmentValue> {
    let attachment = match value {
        Value::Null => return Ok(AttachmentValue::Empty),
        Value::String(s) if is_empty_attachment_text(&s) => return Ok(AttachmentValue::Empty),
        Value::String(s) => EncodedAttachment::from_data_url(&s)
            .map_err(|e| FormError::Translation(format!("record schema mismatch at {path}: {e}")))?,
        value @ Value::Object(_) => {
            // `{ "mediaType": …, "data": … }`; the payload is validated after decoding.
            let parsed: EncodedAttachment = serde_path_to_error::deserialize(value).map_err(|e| {
                let inner = e.path().to_string();
                FormError::Translation(format!(
                    "record schema mismatch at {path}.{inner}: {}",
                    e.into_inner()
                ))
            })?;
            EncodedAttachment::from_parts(parsed.media_type(), parsed.data()).map_err(|e| {
                FormError::Translation(format!("record schema mismatch at {path}.data: {e}"))
            })?
        }
        _ => return Err(mismatch(path, "a data URL or attachment object")),
    };

    Ok(AttachmentValue::Encoded(Arc::new(attachment)))
}
