//! Required patient fields per checkout step.

use std::fmt;

use super::CheckoutStep;
use crate::api::PatientInfo;

/// A patient field the checkout can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Email,
    Phone,
    Dob,
    Gender,
    Relation,
    Address,
    City,
    State,
    Pincode,
    TimeSlot,
}

impl Field {
    /// Fields required to leave the patient step.
    pub const PATIENT_STEP: [Self; 6] = [
        Self::Name,
        Self::Email,
        Self::Phone,
        Self::Dob,
        Self::Gender,
        Self::Relation,
    ];

    /// Fields required to leave the address step.
    pub const ADDRESS_STEP: [Self; 5] = [
        Self::Address,
        Self::City,
        Self::State,
        Self::Pincode,
        Self::TimeSlot,
    ];

    /// Wire name of the field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Dob => "dob",
            Self::Gender => "gender",
            Self::Relation => "relation",
            Self::Address => "address",
            Self::City => "city",
            Self::State => "state",
            Self::Pincode => "pincode",
            Self::TimeSlot => "timeSlot",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Full name",
            Self::Email => "Email",
            Self::Phone => "Phone number",
            Self::Dob => "Date of birth",
            Self::Gender => "Gender",
            Self::Relation => "Relation",
            Self::Address => "Address",
            Self::City => "City",
            Self::State => "State",
            Self::Pincode => "Pincode",
            Self::TimeSlot => "Time slot",
        }
    }

    fn is_present(self, patient: &PatientInfo) -> bool {
        match self {
            Self::Name => filled(&patient.name),
            Self::Email => filled(&patient.email),
            Self::Phone => filled(&patient.phone),
            Self::Dob => patient.dob.is_some(),
            Self::Gender => patient.gender.is_some(),
            Self::Relation => patient.relation.is_some(),
            Self::Address => filled(&patient.address),
            Self::City => filled(&patient.city),
            Self::State => filled(&patient.state),
            Self::Pincode => filled(&patient.pincode),
            Self::TimeSlot => patient.time_slot.is_some(),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn filled(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Fields `step` requires that `patient` lacks, in form order.
///
/// Steps without field requirements always pass.
#[must_use]
pub fn missing_fields(step: CheckoutStep, patient: &PatientInfo) -> Vec<Field> {
    let required: &[Field] = match step {
        CheckoutStep::PatientInfo => &Field::PATIENT_STEP,
        CheckoutStep::AddressTime => &Field::ADDRESS_STEP,
        CheckoutStep::CartReview | CheckoutStep::Payment | CheckoutStep::Confirmation => &[],
    };
    required
        .iter()
        .copied()
        .filter(|field| !field.is_present(patient))
        .collect()
}

/// First step whose requirements `patient` does not meet, with what is
/// missing there.
#[must_use]
pub fn first_incomplete_step(patient: &PatientInfo) -> Option<(CheckoutStep, Vec<Field>)> {
    [CheckoutStep::PatientInfo, CheckoutStep::AddressTime]
        .into_iter()
        .map(|step| (step, missing_fields(step, patient)))
        .find(|(_, missing)| !missing.is_empty())
}

/// Comma-separated field keys.
#[must_use]
pub fn describe(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.key())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::NaiveDate;
    use medibook_core::{Gender, Relation, TimeSlot};

    use super::*;

    fn complete() -> PatientInfo {
        PatientInfo {
            name: "Jane Doe".into(),
            relation: Some(Relation::Myself),
            email: "jane@example.com".into(),
            phone: "9876543210".into(),
            dob: NaiveDate::from_ymd_opt(1990, 4, 12),
            gender: Some(Gender::Female),
            address: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "Karnataka".into(),
            pincode: "560001".into(),
            time_slot: Some(TimeSlot::LateMorning),
        }
    }

    #[test]
    fn test_complete_patient_passes_every_step() {
        let patient = complete();
        for step in CheckoutStep::ALL {
            assert!(missing_fields(step, &patient).is_empty());
        }
        assert!(first_incomplete_step(&patient).is_none());
    }

    #[test]
    fn test_blank_email_is_reported() {
        let patient = PatientInfo {
            email: String::new(),
            ..complete()
        };
        assert_eq!(
            missing_fields(CheckoutStep::PatientInfo, &patient),
            vec![Field::Email]
        );
        assert_eq!(Field::Email.to_string(), "email");
    }

    #[test]
    fn test_whitespace_counts_as_empty() {
        let patient = PatientInfo {
            pincode: "   ".into(),
            ..complete()
        };
        assert_eq!(
            missing_fields(CheckoutStep::AddressTime, &patient),
            vec![Field::Pincode]
        );
    }

    #[test]
    fn test_each_patient_field_is_required() {
        for field in Field::PATIENT_STEP {
            let mut patient = complete();
            match field {
                Field::Name => patient.name.clear(),
                Field::Email => patient.email.clear(),
                Field::Phone => patient.phone.clear(),
                Field::Dob => patient.dob = None,
                Field::Gender => patient.gender = None,
                Field::Relation => patient.relation = None,
                _ => unreachable!(),
            }
            assert_eq!(missing_fields(CheckoutStep::PatientInfo, &patient), vec![field]);
            assert!(missing_fields(CheckoutStep::AddressTime, &patient).is_empty());
        }
    }

    #[test]
    fn test_each_address_field_is_required() {
        for field in Field::ADDRESS_STEP {
            let mut patient = complete();
            match field {
                Field::Address => patient.address.clear(),
                Field::City => patient.city.clear(),
                Field::State => patient.state.clear(),
                Field::Pincode => patient.pincode.clear(),
                Field::TimeSlot => patient.time_slot = None,
                _ => unreachable!(),
            }
            assert_eq!(missing_fields(CheckoutStep::AddressTime, &patient), vec![field]);
        }
    }

    #[test]
    fn test_fresh_patient_fails_at_patient_step_first() {
        let (step, missing) = first_incomplete_step(&PatientInfo::default()).unwrap();
        assert_eq!(step, CheckoutStep::PatientInfo);
        assert_eq!(describe(&missing), "name, email, phone, dob, gender, relation");
    }
}
