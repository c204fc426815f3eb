//! Immutable single-leaf updates.
//!
//! [`apply`] produces a new [`PatientRecord`] in which exactly one leaf differs. Only the
//! ancestors of that leaf are copied:
//!
//! - depth 1: the root
//! - depth 2: the root and one measurement group
//! - depth 3: the root, the medical history category and one history item
//!
//! Every other group is shared with the input by `Arc`, so a patch costs O(depth) pointer
//! copies regardless of how much data the record holds.

use crate::constants::is_empty_attachment_text;
use crate::fields::FieldPath;
use crate::record::{empty_text, AttachmentValue, Leaf, PatientRecord, Text};
use crate::{FormError, FormResult, PathKey};
use pform_files::EncodedAttachment;
use std::sync::Arc;

/// New content for a leaf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PatchValue {
    Text(Text),
    Attachment(Arc<EncodedAttachment>),
    /// Empties any leaf.
    Clear,
}

impl PatchValue {
    fn into_text(self, field: FieldPath) -> FormResult<Text> {
        match self {
            PatchValue::Text(text) => Ok(text),
            PatchValue::Clear => Ok(empty_text()),
            PatchValue::Attachment(_) => Err(FormError::ValueMismatch {
                path: field.to_key().to_string(),
                expected: "text",
            }),
        }
    }

    fn into_attachment(self, field: FieldPath) -> FormResult<AttachmentValue> {
        match self {
            PatchValue::Attachment(attachment) => Ok(AttachmentValue::Encoded(attachment)),
            PatchValue::Clear => Ok(AttachmentValue::Empty),
            PatchValue::Text(text) if is_empty_attachment_text(&text) => Ok(AttachmentValue::Empty),
            PatchValue::Text(text) => EncodedAttachment::from_data_url(&text)
                .map(|attachment| AttachmentValue::Encoded(Arc::new(attachment)))
                .map_err(|_| FormError::ValueMismatch {
                    path: field.to_key().to_string(),
                    expected: "an attachment or a base64 data URL",
                }),
        }
    }
}

impl From<&str> for PatchValue {
    fn from(value: &str) -> Self {
        PatchValue::Text(Text::from(value))
    }
}

impl From<String> for PatchValue {
    fn from(value: String) -> Self {
        PatchValue::Text(Text::from(value))
    }
}

impl From<EncodedAttachment> for PatchValue {
    fn from(value: EncodedAttachment) -> Self {
        PatchValue::Attachment(Arc::new(value))
    }
}

/// Replaces the leaf named by `path`.
///
/// # Errors
///
/// Returns `FormError` if:
/// - `path` does not name a leaf of the record ([`FormError::UnknownField`])
/// - `value` cannot be stored in that leaf ([`FormError::ValueMismatch`])
pub fn apply(record: &PatientRecord, path: &PathKey, value: PatchValue) -> FormResult<PatientRecord> {
    let field = FieldPath::resolve(path)?;
    apply_field(record, field, value)
}

/// Replaces the leaf at an already resolved `field`.
///
/// # Errors
///
/// Returns [`FormError::ValueMismatch`] if `value` cannot be stored in that leaf.
pub fn apply_field(
    record: &PatientRecord,
    field: FieldPath,
    value: PatchValue,
) -> FormResult<PatientRecord> {
    match field {
        FieldPath::Demographic(demographic) => {
            let text = value.into_text(field)?;
            let mut next = record.clone();
            next.demographics[demographic.index()] = text;
            Ok(next)
        }
        FieldPath::Attachment(slot) => {
            let attachment = value.into_attachment(field)?;
            let mut next = record.clone();
            next.attachments[slot.index()] = attachment;
            Ok(next)
        }
        FieldPath::Measurement(kind, part) => {
            let text = value.into_text(field)?;
            let group = record.measurement(kind).with_part(part, text);
            let mut next = record.clone();
            next.measurements[kind.index()] = Arc::new(group);
            Ok(next)
        }
        FieldPath::History(item, part) => {
            let text = value.into_text(field)?;
            let entry = record.medical_history.item(item).with_part(part, text);
            let mut history = (*record.medical_history).clone();
            history.items[item.index()] = Arc::new(entry);
            let mut next = record.clone();
            next.medical_history = Arc::new(history);
            Ok(next)
        }
    }
}

/// Reads the leaf named by `path`.
///
/// # Errors
///
/// Returns [`FormError::UnknownField`] if `path` does not name a leaf of the record.
pub fn read<'a>(record: &'a PatientRecord, path: &PathKey) -> FormResult<Leaf<'a>> {
    Ok(record.leaf(FieldPath::resolve(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{AttachmentSlot, DemographicField, HistoryItem, MeasurementKind};
    use crate::record::MeasurementField;

    fn key(raw: &str) -> PathKey {
        PathKey::parse(raw).expect("valid path")
    }

    fn patch(record: &PatientRecord, raw: &str, value: &str) -> PatientRecord {
        apply(record, &key(raw), value.into()).expect("patch should succeed")
    }

    fn sample_record() -> PatientRecord {
        let record = PatientRecord::empty();
        let record = patch(&record, "name", "Meera Iyer");
        let record = patch(&record, "bloodPressure.range", "90/60-120/80");
        let record = patch(&record, "bloodPressure.unit", "mmHg");
        let record = patch(&record, "weight.value", "58");
        patch(&record, "medicalHistory.currentMedication.value", "Levothyroxine")
    }

    #[test]
    fn replaces_only_the_addressed_measurement_part() {
        let before = sample_record();

        let after = patch(&before, "bloodPressure.value", "120/80");

        let bp = after.measurement(MeasurementKind::BloodPressure);
        assert_eq!(bp.value(), "120/80");
        assert_eq!(bp.range(), "90/60-120/80");
        assert_eq!(bp.unit(), "mmHg");
        assert_eq!(before.measurement(MeasurementKind::BloodPressure).value(), "");

        for other in FieldPath::all() {
            if other != FieldPath::resolve(&key("bloodPressure.value")).unwrap() {
                assert_eq!(before.leaf(other), after.leaf(other), "{}", other.to_key());
            }
        }
    }

    #[test]
    fn replaces_nested_history_leaf() {
        let before = sample_record();

        let after = patch(&before, "medicalHistory.vaccination.range", "5y");

        let history = after.medical_history();
        assert_eq!(history.item(HistoryItem::Vaccination).range(), "5y");
        assert_eq!(history.item(HistoryItem::Vaccination).value(), "");
        assert_eq!(
            history.item(HistoryItem::CurrentMedication).value(),
            "Levothyroxine"
        );
    }

    #[test]
    fn replaces_top_level_leaf() {
        let after = patch(&sample_record(), "name", "Meera R. Iyer");
        assert_eq!(after.demographic(DemographicField::Name), "Meera R. Iyer");
    }

    #[test]
    fn shares_every_untouched_subtree() {
        let before = sample_record();

        let after = patch(&before, "bloodPressure.value", "120/80");
        for &kind in MeasurementKind::ALL {
            let shared = Arc::ptr_eq(before.measurement(kind), after.measurement(kind));
            assert_eq!(shared, kind != MeasurementKind::BloodPressure, "{kind}");
        }
        assert!(Arc::ptr_eq(before.medical_history(), after.medical_history()));

        let after = patch(&before, "medicalHistory.vaccination.unit", "doses");
        assert!(!Arc::ptr_eq(before.medical_history(), after.medical_history()));
        for &item in HistoryItem::ALL {
            let shared = Arc::ptr_eq(
                before.medical_history().item(item),
                after.medical_history().item(item),
            );
            assert_eq!(shared, item != HistoryItem::Vaccination, "{item}");
        }
        for &kind in MeasurementKind::ALL {
            assert!(Arc::ptr_eq(before.measurement(kind), after.measurement(kind)));
        }

        let after = patch(&before, "city", "Chennai");
        assert!(Arc::ptr_eq(before.medical_history(), after.medical_history()));
        for &kind in MeasurementKind::ALL {
            assert!(Arc::ptr_eq(before.measurement(kind), after.measurement(kind)));
        }
    }

    #[test]
    fn applying_twice_equals_applying_once() {
        let record = sample_record();
        for (raw, value) in [
            ("age", "41"),
            ("tsh.unit", "mIU/L"),
            ("medicalHistory.previousCondition.value", "Asthma"),
        ] {
            let once = patch(&record, raw, value);
            let twice = patch(&once, raw, value);
            assert_eq!(once, twice, "{raw}");
        }
    }

    #[test]
    fn disjoint_patches_commute() {
        let record = sample_record();
        let pairs = [
            (("name", "A"), ("bloodPressure.value", "110/70")),
            (("bloodPressure.value", "110/70"), ("bloodPressure.unit", "kPa")),
            (
                ("medicalHistory.vaccination.value", "BCG"),
                ("medicalHistory.currentMedication.unit", "mcg"),
            ),
            (("hiv.value", "Negative"), ("medicalHistory.vaccination.range", "10y")),
        ];

        for ((p, v1), (q, v2)) in pairs {
            let pq = patch(&patch(&record, p, v1), q, v2);
            let qp = patch(&patch(&record, q, v2), p, v1);
            assert_eq!(pq, qp, "{p} / {q}");
        }
    }

    #[test]
    fn unknown_fields_are_reported() {
        let record = sample_record();
        for raw in ["nickname", "name.value", "bloodPressure", "medicalHistory.allergies.value"] {
            let err = apply(&record, &key(raw), "x".into()).expect_err("should fail");
            assert!(
                matches!(err, FormError::UnknownField { ref path } if path == raw),
                "{raw}: {err:?}"
            );
        }
    }

    #[test]
    fn attachment_leaf_accepts_attachments_and_clears() {
        let record = sample_record();
        let photo = key("photo");
        let attachment = EncodedAttachment::from_bytes("image/png", &[0x89, 0x50]);

        let with_photo = apply(&record, &photo, attachment.clone().into()).unwrap();
        assert_eq!(
            with_photo.attachment(AttachmentSlot::Photo).encoded(),
            Some(&attachment)
        );

        let cleared = apply(&with_photo, &photo, PatchValue::Clear).unwrap();
        assert!(cleared.attachment(AttachmentSlot::Photo).is_empty());

        let cleared_by_text = apply(&with_photo, &photo, "".into()).unwrap();
        assert_eq!(cleared, cleared_by_text);

        let from_url = apply(&record, &photo, attachment.to_data_url().into()).unwrap();
        assert_eq!(from_url, with_photo);

        let cleared_by_bare_url = apply(&with_photo, &photo, "data:".into()).unwrap();
        assert_eq!(cleared_by_bare_url, cleared);
    }

    #[test]
    fn mismatched_values_are_rejected() {
        let record = sample_record();

        let err = apply(&record, &key("photo"), "selfie.jpg".into()).expect_err("not a data URL");
        assert!(matches!(err, FormError::ValueMismatch { .. }));

        let attachment = EncodedAttachment::from_bytes("image/png", b"png");
        let err = apply(&record, &key("weight.unit"), attachment.into()).expect_err("not text");
        assert!(matches!(err, FormError::ValueMismatch { ref path, .. } if path == "weight.unit"));
    }

    #[test]
    fn clear_empties_text_leaf() {
        let record = sample_record();
        let cleared = apply(&record, &key("weight.value"), PatchValue::Clear).unwrap();
        assert_eq!(
            **cleared.measurement(MeasurementKind::Weight),
            MeasurementField::empty()
        );
    }

    #[test]
    fn read_resolves_paths() {
        let record = sample_record();

        assert_eq!(
            read(&record, &key("medicalHistory.currentMedication.value")).unwrap(),
            Leaf::Text("Levothyroxine")
        );
        assert!(read(&record, &key("photo")).unwrap().is_empty());
        assert!(matches!(
            read(&record, &key("bloodGroup.colour")),
            Err(FormError::UnknownField { .. })
        ));
    }
}

/// Property-based tests using proptest
#[cfg(test)]
mod proptest_tests {
    use super::*;
    use crate::fields::{HistoryItem, MeasurementKind};
    use proptest::prelude::*;

    fn any_field() -> impl Strategy<Value = FieldPath> {
        prop::sample::select(FieldPath::all().collect::<Vec<_>>())
    }

    /// A value every leaf of `field`'s kind accepts.
    fn value_for(field: FieldPath, text: &str) -> PatchValue {
        match field {
            FieldPath::Attachment(_) => {
                EncodedAttachment::from_bytes("application/octet-stream", text.as_bytes()).into()
            }
            _ => text.into(),
        }
    }

    /// A record with every leaf filled, so sharing is observable on non-empty groups.
    fn filled_record() -> PatientRecord {
        FieldPath::all().fold(PatientRecord::empty(), |record, field| {
            let text = field.to_key().to_string();
            apply_field(&record, field, value_for(field, &text)).unwrap()
        })
    }

    proptest! {
        #[test]
        fn applying_twice_equals_applying_once(field in any_field(), text in any::<String>()) {
            let record = filled_record();

            let once = apply_field(&record, field, value_for(field, &text)).unwrap();
            let twice = apply_field(&once, field, value_for(field, &text)).unwrap();

            prop_assert_eq!(once, twice);
        }

        #[test]
        fn disjoint_leaves_commute(
            p in any_field(),
            q in any_field(),
            v1 in any::<String>(),
            v2 in any::<String>(),
        ) {
            prop_assume!(p != q);
            let record = filled_record();

            let pq = apply_field(&record, p, value_for(p, &v1))
                .and_then(|r| apply_field(&r, q, value_for(q, &v2)))
                .unwrap();
            let qp = apply_field(&record, q, value_for(q, &v2))
                .and_then(|r| apply_field(&r, p, value_for(p, &v1)))
                .unwrap();

            prop_assert_eq!(pq, qp);
        }

        #[test]
        fn only_the_addressed_leaf_changes(field in any_field(), text in any::<String>()) {
            let before = filled_record();

            let after = apply_field(&before, field, value_for(field, &text)).unwrap();

            let expected = apply_field(&PatientRecord::empty(), field, value_for(field, &text))
                .unwrap();
            prop_assert_eq!(after.leaf(field), expected.leaf(field));
            for other in FieldPath::all().filter(|&other| other != field) {
                prop_assert_eq!(before.leaf(other), after.leaf(other));
            }
        }

        #[test]
        fn untouched_subtrees_are_shared(field in any_field(), text in any::<String>()) {
            let before = filled_record();

            let after = apply_field(&before, field, value_for(field, &text)).unwrap();

            for &kind in MeasurementKind::ALL {
                let touched = matches!(field, FieldPath::Measurement(k, _) if k == kind);
                prop_assert_eq!(
                    Arc::ptr_eq(before.measurement(kind), after.measurement(kind)),
                    !touched
                );
            }

            let history_touched = matches!(field, FieldPath::History(..));
            prop_assert_eq!(
                Arc::ptr_eq(before.medical_history(), after.medical_history()),
                !history_touched
            );
            for &item in HistoryItem::ALL {
                let touched = matches!(field, FieldPath::History(i, _) if i == item);
                prop_assert_eq!(
                    Arc::ptr_eq(
                        before.medical_history().item(item),
                        after.medical_history().item(item)
                    ),
                    !touched
                );
            }
        }
    }
}
