//! The nested patient record held by the form.
//!
//! A [`PatientRecord`] is an immutable snapshot. Measurement groups, the medical history
//! category and its items all live behind [`Arc`], and text leaves are `Arc<str>`, so
//! cloning a record copies pointers only. The patcher relies on this to copy just the
//! ancestors of the leaf it replaces and share every other subtree with the previous
//! snapshot.
//!
//! Records always have a value for every leaf. Wire input that omits a leaf is filled with
//! the same empty value [`PatientRecord::empty`] uses (see [`crate::wire`]).

use crate::fields::{
    AttachmentSlot, DemographicField, FieldPath, HistoryItem, MeasurementKind, MeasurementPart,
};
use pform_files::EncodedAttachment;
use std::sync::Arc;

/// Shared immutable text leaf.
pub type Text = Arc<str>;

pub(crate) fn empty_text() -> Text {
    Arc::from("")
}

/// One test or measurement: observed value, normal range and unit.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct MeasurementField {
    value: Text,
    range: Text,
    unit: Text,
}

impl MeasurementField {
    pub fn new(value: impl Into<Text>, range: impl Into<Text>, unit: impl Into<Text>) -> Self {
        Self {
            value: value.into(),
            range: range.into(),
            unit: unit.into(),
        }
    }

    pub fn empty() -> Self {
        Self {
            value: empty_text(),
            range: empty_text(),
            unit: empty_text(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn range(&self) -> &str {
        &self.range
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn part(&self, part: MeasurementPart) -> &str {
        match part {
            MeasurementPart::Value => &self.value,
            MeasurementPart::Range => &self.range,
            MeasurementPart::Unit => &self.unit,
        }
    }

    /// Copy of this group with one sub-field replaced.
    pub(crate) fn with_part(&self, part: MeasurementPart, text: Text) -> Self {
        let mut next = self.clone();
        match part {
            MeasurementPart::Value => next.value = text,
            MeasurementPart::Range => next.range = text,
            MeasurementPart::Unit => next.unit = text,
        }
        next
    }
}

impl Default for MeasurementField {
    fn default() -> Self {
        Self::empty()
    }
}

/// The `medicalHistory` category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MedicalHistory {
    pub(crate) items: [Arc<MeasurementField>; HistoryItem::COUNT],
}

impl MedicalHistory {
    pub fn empty() -> Self {
        Self {
            items: std::array::from_fn(|_| Arc::new(MeasurementField::empty())),
        }
    }

    pub fn item(&self, item: HistoryItem) -> &Arc<MeasurementField> {
        &self.items[item.index()]
    }
}

/// Value of an attachment leaf.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum AttachmentValue {
    #[default]
    Empty,
    Encoded(Arc<EncodedAttachment>),
}

impl AttachmentValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, AttachmentValue::Empty)
    }

    pub fn encoded(&self) -> Option<&EncodedAttachment> {
        match self {
            AttachmentValue::Empty => None,
            AttachmentValue::Encoded(attachment) => Some(attachment),
        }
    }
}

/// Borrowed view of a single leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Leaf<'a> {
    Text(&'a str),
    Attachment(&'a AttachmentValue),
}

impl Leaf<'_> {
    pub fn is_empty(&self) -> bool {
        match self {
            Leaf::Text(text) => text.is_empty(),
            Leaf::Attachment(value) => value.is_empty(),
        }
    }

    /// Text form of the leaf as an input would show it; attachments render as data URLs.
    pub fn to_text(&self) -> String {
        match self {
            Leaf::Text(text) => (*text).to_owned(),
            Leaf::Attachment(AttachmentValue::Empty) => String::new(),
            Leaf::Attachment(AttachmentValue::Encoded(attachment)) => attachment.to_data_url(),
        }
    }
}

/// One snapshot of the full patient record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientRecord {
    pub(crate) id: Option<Text>,
    pub(crate) demographics: [Text; DemographicField::COUNT],
    pub(crate) measurements: [Arc<MeasurementField>; MeasurementKind::COUNT],
    pub(crate) medical_history: Arc<MedicalHistory>,
    pub(crate) attachments: [AttachmentValue; AttachmentSlot::COUNT],
}

impl PatientRecord {
    /// A record with every text leaf empty, every measurement an empty triple and no
    /// attachments.
    pub fn empty() -> Self {
        Self {
            id: None,
            demographics: std::array::from_fn(|_| empty_text()),
            measurements: std::array::from_fn(|_| Arc::new(MeasurementField::empty())),
            medical_history: Arc::new(MedicalHistory::empty()),
            attachments: std::array::from_fn(|_| AttachmentValue::Empty),
        }
    }

    /// Identifier assigned by the remote record store, present for existing records.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn with_id(mut self, id: impl Into<Text>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn demographic(&self, field: DemographicField) -> &str {
        &self.demographics[field.index()]
    }

    pub fn measurement(&self, kind: MeasurementKind) -> &Arc<MeasurementField> {
        &self.measurements[kind.index()]
    }

    pub fn medical_history(&self) -> &Arc<MedicalHistory> {
        &self.medical_history
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> &AttachmentValue {
        &self.attachments[slot.index()]
    }

    /// Reads the leaf at `field`.
    pub fn leaf(&self, field: FieldPath) -> Leaf<'_> {
        match field {
            FieldPath::Demographic(field) => Leaf::Text(self.demographic(field)),
            FieldPath::Attachment(slot) => Leaf::Attachment(self.attachment(slot)),
            FieldPath::Measurement(kind, part) => Leaf::Text(self.measurement(kind).part(part)),
            FieldPath::History(item, part) => {
                Leaf::Text(self.medical_history.item(item).part(part))
            }
        }
    }
}

impl Default for PatientRecord {
    fn default() -> Self {
        Self::empty()
    }
}
