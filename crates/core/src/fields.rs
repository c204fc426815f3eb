//! The closed set of addressable record leaves.
//!
//! Every input on the patient form edits exactly one leaf, and every leaf is one of:
//!
//! | Depth | Shape | Example |
//! |-------|-------|---------|
//! | 1 | demographic text | `name` |
//! | 1 | attachment | `photo` |
//! | 2 | measurement sub-field | `bloodPressure.value` |
//! | 3 | medical history sub-field | `medicalHistory.vaccination.range` |
//!
//! [`FieldPath`] enumerates these as a typed value so that a path which names nothing is
//! rejected when it is resolved, rather than producing an undefined branch later.

use crate::constants::MEDICAL_HISTORY_KEY;
use crate::{FormError, FormResult, PathKey};

macro_rules! field_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $key:literal, $label:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub enum $name {
            $($variant,)+
        }

        impl $name {
            /// Every variant, in form order.
            pub const ALL: &'static [$name] = &[$($name::$variant,)+];

            pub const COUNT: usize = Self::ALL.len();

            /// Key used in field paths and on the wire.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $key,)+
                }
            }

            /// Human-readable label shown next to the input.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }

            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($key => Some($name::$variant),)+
                    _ => None,
                }
            }

            pub(crate) fn index(self) -> usize {
                self as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

field_enum! {
    /// Scalar demographic leaves at the top of the record.
    pub enum DemographicField {
        Name => "name", "Full Name";
        Age => "age", "Age";
        Mobile => "mobile", "Mobile Number";
        Address => "address", "Address";
        AddressLine1 => "addressLine1", "Address Line 1";
        Pincode => "pincode", "Pincode";
        Gender => "gender", "Gender";
        DateOfBirth => "dateOfBirth", "Date of Birth";
        AadharNumber => "aadharNumber", "Aadhar Number";
        City => "city", "City";
        District => "district", "District";
        State => "state", "State";
        Country => "country", "Country";
    }
}

field_enum! {
    /// Top-level leaves holding an encoded file.
    pub enum AttachmentSlot {
        Photo => "photo", "Photo";
        DocumentFile => "documentFile", "Medical Document";
    }
}

field_enum! {
    /// Named measurement groups at the top of the record.
    pub enum MeasurementKind {
        Hemoglobin => "hemoglobin", "Hemoglobin";
        BloodGroup => "bloodGroup", "Blood Group";
        BloodPressure => "bloodPressure", "Blood Pressure Range (B.P)";
        HeartRate => "heartRate", "Heart Rate/Pulse Rate";
        Weight => "weight", "Weight";
        FastingBloodSugar => "fastingBloodSugar", "Fasting Blood Sugar";
        Cbc => "cbc", "Blood CBC";
        Urinalysis => "urinalysis", "Urine";
        SerumElectrolytes => "serumElectrolytes", "Serum Electrolytes";
        LipidProfile => "lipidProfile", "Lipid Profile";
        Tsh => "tsh", "TSH";
        Sgpt => "sgpt", "SGPT";
        Platelet => "platelet", "Platelet";
        Hiv => "hiv", "HIV";
        ChronicDisease => "chronicDisease", "Chronic Disease";
    }
}

field_enum! {
    /// Measurement groups nested under `medicalHistory`.
    pub enum HistoryItem {
        CurrentMedication => "currentMedication", "Current Medication";
        PreviousCondition => "previousCondition", "Previous Condition";
        Vaccination => "vaccination", "Vaccination";
    }
}

field_enum! {
    /// Sub-fields of a measurement group.
    pub enum MeasurementPart {
        Value => "value", "Observed Value";
        Range => "range", "Normal Range";
        Unit => "unit", "Unit";
    }
}

/// A typed address of exactly one record leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldPath {
    Demographic(DemographicField),
    Attachment(AttachmentSlot),
    Measurement(MeasurementKind, MeasurementPart),
    History(HistoryItem, MeasurementPart),
}

impl FieldPath {
    /// Maps a well-formed path onto the leaf it names.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownField`] if any segment does not name a recognised field,
    /// group, category or sub-field at its depth.
    pub fn resolve(key: &PathKey) -> FormResult<Self> {
        let unknown = || FormError::UnknownField {
            path: key.to_string(),
        };

        match key.segments() {
            [top] => DemographicField::from_name(top)
                .map(FieldPath::Demographic)
                .or_else(|| AttachmentSlot::from_name(top).map(FieldPath::Attachment))
                .ok_or_else(unknown),
            [group, part] => {
                let kind = MeasurementKind::from_name(group).ok_or_else(unknown)?;
                let part = MeasurementPart::from_name(part).ok_or_else(unknown)?;
                Ok(FieldPath::Measurement(kind, part))
            }
            [category, item, part] if category == MEDICAL_HISTORY_KEY => {
                let item = HistoryItem::from_name(item).ok_or_else(unknown)?;
                let part = MeasurementPart::from_name(part).ok_or_else(unknown)?;
                Ok(FieldPath::History(item, part))
            }
            _ => Err(unknown()),
        }
    }

    /// Canonical path of this leaf.
    pub fn to_key(self) -> PathKey {
        match self {
            FieldPath::Demographic(field) => PathKey::from_known(&[field.as_str()]),
            FieldPath::Attachment(slot) => PathKey::from_known(&[slot.as_str()]),
            FieldPath::Measurement(kind, part) => {
                PathKey::from_known(&[kind.as_str(), part.as_str()])
            }
            FieldPath::History(item, part) => {
                PathKey::from_known(&[MEDICAL_HISTORY_KEY, item.as_str(), part.as_str()])
            }
        }
    }

    /// Label suitable for listing missing fields, e.g. `Vaccination (Normal Range)`.
    pub fn label(self) -> String {
        match self {
            FieldPath::Demographic(field) => field.label().to_owned(),
            FieldPath::Attachment(slot) => slot.label().to_owned(),
            FieldPath::Measurement(kind, part) => format!("{} ({})", kind.label(), part.label()),
            FieldPath::History(item, part) => format!("{} ({})", item.label(), part.label()),
        }
    }

    /// Every leaf of the record in form order.
    pub fn all() -> impl Iterator<Item = FieldPath> {
        let demographics = DemographicField::ALL
            .iter()
            .map(|&field| FieldPath::Demographic(field));
        let attachments = AttachmentSlot::ALL
            .iter()
            .map(|&slot| FieldPath::Attachment(slot));
        let measurements = MeasurementKind::ALL.iter().flat_map(|&kind| {
            MeasurementPart::ALL
                .iter()
                .map(move |&part| FieldPath::Measurement(kind, part))
        });
        let history = HistoryItem::ALL.iter().flat_map(|&item| {
            MeasurementPart::ALL
                .iter()
                .map(move |&part| FieldPath::History(item, part))
        });

        demographics
            .chain(attachments)
            .chain(measurements)
            .chain(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(raw: &str) -> FormResult<FieldPath> {
        FieldPath::resolve(&PathKey::parse(raw).expect("well-formed path"))
    }

    fn assert_unknown(raw: &str) {
        match resolve(raw) {
            Err(FormError::UnknownField { path }) => assert_eq!(path, raw),
            other => panic!("expected UnknownField for {raw}, got {other:?}"),
        }
    }

    #[test]
    fn resolves_each_depth() {
        assert_eq!(
            resolve("name").unwrap(),
            FieldPath::Demographic(DemographicField::Name)
        );
        assert_eq!(
            resolve("documentFile").unwrap(),
            FieldPath::Attachment(AttachmentSlot::DocumentFile)
        );
        assert_eq!(
            resolve("bloodPressure.value").unwrap(),
            FieldPath::Measurement(MeasurementKind::BloodPressure, MeasurementPart::Value)
        );
        assert_eq!(
            resolve("medicalHistory.vaccination.range").unwrap(),
            FieldPath::History(HistoryItem::Vaccination, MeasurementPart::Range)
        );
    }

    #[test]
    fn rejects_unknown_names_at_every_depth() {
        assert_unknown("nickname");
        assert_unknown("bloodPressure");
        assert_unknown("medicalHistory");
        assert_unknown("name.value");
        assert_unknown("bloodPressure.colour");
        assert_unknown("pulse.value");
        assert_unknown("medicalHistory.vaccination");
        assert_unknown("medicalHistory.allergies.value");
        assert_unknown("medicalHistory.vaccination.colour");
        assert_unknown("history.vaccination.range");
        assert_unknown("bloodPressure.value.extra");
    }

    #[test]
    fn every_leaf_round_trips_through_its_key() {
        for field in FieldPath::all() {
            let key = field.to_key();
            assert_eq!(FieldPath::resolve(&key).unwrap(), field, "{key}");
        }
    }

    #[test]
    fn all_covers_the_record_shape() {
        let expected = DemographicField::COUNT
            + AttachmentSlot::COUNT
            + (MeasurementKind::COUNT + HistoryItem::COUNT) * MeasurementPart::COUNT;
        assert_eq!(FieldPath::all().count(), expected);
        assert_eq!(expected, 13 + 2 + (15 + 3) * 3);
    }

    #[test]
    fn labels_read_naturally() {
        assert_eq!(
            FieldPath::History(HistoryItem::Vaccination, MeasurementPart::Range).label(),
            "Vaccination (Normal Range)"
        );
        assert_eq!(
            FieldPath::Demographic(DemographicField::AadharNumber).label(),
            "Aadhar Number"
        );
    }
}
