use chrono::{Local, NaiveDate};
use thiserror::Error;
use validator::ValidationErrors;

use crate::forms::rule_violation;
use crate::models::{
    MedicalHistoryRequest, MedicalHistoryResponse, ProgressionStage, Surgery, UserDto,
};

pub const INSUFFICIENT_DATA_MESSAGE: &str =
    "At least Diagnosis, Diagnosis Date, and Progression Stage are required to create a medical history record.";

/// Lifecycle of the record-edit form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    Empty,
    Loading,
    /// Edit mode, loaded from an existing record.
    Populated,
    /// Create mode, blank fields.
    BlankReady,
    Submitting,
    Success,
    /// Submission failed; all field values are retained for correction.
    Failed,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The submit control is disabled while a request is outstanding.
    #[error("a submission is already in flight")]
    InFlight,

    #[error("{0}")]
    Validation(ValidationErrors),
}

/// A surgery row as edited; incomplete rows are dropped from the payload
/// at submit time instead of blocking the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SurgeryEntry {
    pub description: String,
    pub date: Option<NaiveDate>,
}

/// The record-edit form shared by create and edit flows. Field values stay
/// raw while editing; trimming and absent-field normalization happen when
/// the request payload is built.
#[derive(Debug, Clone)]
pub struct MedicalHistoryForm {
    phase: FormPhase,
    edit_mode: bool,
    pub patient_id: Option<i64>,
    pub diagnosis: String,
    pub diagnosis_date: Option<NaiveDate>,
    pub progression_stage: String,
    pub genetic_risk: String,
    pub family_history: String,
    pub environmental_factors: String,
    pub comorbidities: String,
    pub medication_allergies: String,
    pub environmental_allergies: String,
    pub food_allergies: String,
    pub surgeries: Vec<SurgeryEntry>,
    provider_names: Vec<String>,
    caregiver_names: Vec<String>,
}

impl MedicalHistoryForm {
    fn blank(phase: FormPhase, edit_mode: bool) -> Self {
        Self {
            phase,
            edit_mode,
            patient_id: None,
            diagnosis: String::new(),
            diagnosis_date: None,
            progression_stage: String::new(),
            genetic_risk: String::new(),
            family_history: String::new(),
            environmental_factors: String::new(),
            comorbidities: String::new(),
            medication_allergies: String::new(),
            environmental_allergies: String::new(),
            food_allergies: String::new(),
            surgeries: Vec::new(),
            provider_names: Vec::new(),
            caregiver_names: Vec::new(),
        }
    }

    /// Create mode: blank form, ready for input.
    pub fn new_create() -> Self {
        Self::blank(FormPhase::BlankReady, false)
    }

    /// Edit mode: the caller fetches the record and hands it to
    /// [`populate`](Self::populate).
    pub fn begin_load(patient_id: i64) -> Self {
        let mut form = Self::blank(FormPhase::Loading, true);
        form.patient_id = Some(patient_id);
        form
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    pub fn is_edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Patch every field from a fetched record.
    pub fn populate(&mut self, data: &MedicalHistoryResponse) {
        self.patient_id = Some(data.patient_id);
        self.diagnosis = data.diagnosis.clone().unwrap_or_default();
        self.diagnosis_date = data.diagnosis_date;
        self.progression_stage = data.progression_stage.clone().unwrap_or_default();
        self.genetic_risk = data.genetic_risk.clone().unwrap_or_default();
        self.family_history = data.family_history.clone().unwrap_or_default();
        self.environmental_factors = data.environmental_factors.clone().unwrap_or_default();
        self.comorbidities = data.comorbidities.clone().unwrap_or_default();
        self.medication_allergies = data.medication_allergies.clone().unwrap_or_default();
        self.environmental_allergies = data.environmental_allergies.clone().unwrap_or_default();
        self.food_allergies = data.food_allergies.clone().unwrap_or_default();
        self.surgeries = data
            .surgeries
            .iter()
            .map(|s| SurgeryEntry {
                description: s.description.clone(),
                date: Some(s.date),
            })
            .collect();
        self.provider_names = data.provider_names.clone();
        self.caregiver_names = data.caregiver_names.clone();
        self.phase = FormPhase::Populated;
    }

    pub fn add_surgery(&mut self) {
        self.surgeries.push(SurgeryEntry::default());
    }

    pub fn remove_surgery(&mut self, index: usize) {
        if index < self.surgeries.len() {
            self.surgeries.remove(index);
        }
    }

    // ---- checkbox selection over pick-lists ----

    /// Toggle an additional provider by full name. The list holds each
    /// name at most once, whatever order the toggles arrive in.
    pub fn toggle_provider(&mut self, provider: &UserDto) {
        toggle_name(&mut self.provider_names, provider.full_name());
    }

    pub fn is_provider_selected(&self, provider: &UserDto) -> bool {
        self.provider_names.contains(&provider.full_name())
    }

    /// Toggle an assigned caregiver by username.
    pub fn toggle_caregiver(&mut self, caregiver: &UserDto) {
        toggle_name(&mut self.caregiver_names, caregiver.username.clone());
    }

    pub fn is_caregiver_selected(&self, caregiver: &UserDto) -> bool {
        self.caregiver_names.contains(&caregiver.username)
    }

    pub fn provider_names(&self) -> &[String] {
        &self.provider_names
    }

    pub fn caregiver_names(&self) -> &[String] {
        &self.caregiver_names
    }

    /// Replace the provider selection wholesale; blanks and duplicates are
    /// dropped so the uniqueness invariant holds for loaded drafts too.
    pub fn set_provider_names(&mut self, names: Vec<String>) {
        self.provider_names = dedup_names(names);
    }

    pub fn set_caregiver_names(&mut self, names: Vec<String>) {
        self.caregiver_names = dedup_names(names);
    }

    // ---- validation ----

    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.validate_with_today(Local::now().date_naive())
    }

    /// The declarative rule set, evaluated in one pass into a structured
    /// error map. `today` is injected so day-granularity comparison is
    /// deterministic under test.
    pub fn validate_with_today(&self, today: NaiveDate) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.patient_id.is_none_or(|id| id <= 0) {
            errors.add(
                "patientId",
                rule_violation("required", "Patient is required."),
            );
        }

        let diagnosis = self.diagnosis.trim();
        if diagnosis.is_empty() {
            errors.add("diagnosis", rule_violation("required", "Diagnosis is required."));
        } else {
            let len = diagnosis.chars().count();
            if !(2..=255).contains(&len) {
                errors.add(
                    "diagnosis",
                    rule_violation("length", "Diagnosis must be between 2 and 255 characters."),
                );
            }
        }

        match self.diagnosis_date {
            None => errors.add(
                "diagnosisDate",
                rule_violation("required", "Diagnosis Date is required."),
            ),
            Some(date) if date > today => errors.add(
                "diagnosisDate",
                rule_violation(
                    "future_date_not_allowed",
                    "Diagnosis Date cannot be in the future.",
                ),
            ),
            Some(_) => {}
        }

        let stage = self.progression_stage.trim();
        if stage.is_empty() {
            errors.add(
                "progressionStage",
                rule_violation("required", "Progression Stage is required."),
            );
        } else if stage.chars().count() > 50 {
            errors.add(
                "progressionStage",
                rule_violation("length", "Progression Stage cannot exceed 50 characters."),
            );
        } else if stage.parse::<ProgressionStage>().is_err() {
            errors.add(
                "progressionStage",
                rule_violation(
                    "unknown_stage",
                    "Progression Stage must be MILD, MODERATE, or SEVERE.",
                ),
            );
        }

        let genetic_risk = self.genetic_risk.trim();
        if !genetic_risk.is_empty() {
            let len = genetic_risk.chars().count();
            if !(2..=255).contains(&len) {
                errors.add(
                    "geneticRisk",
                    rule_violation(
                        "length",
                        "Genetic Risk must be between 2 and 255 characters.",
                    ),
                );
            }
        }

        let capped: [(&'static str, &str, &'static str); 6] = [
            (
                "familyHistory",
                &self.family_history,
                "Family History cannot exceed 1000 characters.",
            ),
            (
                "environmentalFactors",
                &self.environmental_factors,
                "Environmental Factors cannot exceed 1000 characters.",
            ),
            (
                "comorbidities",
                &self.comorbidities,
                "Comorbidities cannot exceed 1000 characters.",
            ),
            (
                "medicationAllergies",
                &self.medication_allergies,
                "Medication Allergies cannot exceed 1000 characters.",
            ),
            (
                "environmentalAllergies",
                &self.environmental_allergies,
                "Environmental Allergies cannot exceed 1000 characters.",
            ),
            (
                "foodAllergies",
                &self.food_allergies,
                "Food Allergies cannot exceed 1000 characters.",
            ),
        ];
        for (field, value, message) in capped {
            if value.trim().chars().count() > 1000 {
                errors.add(field, rule_violation("length", message));
            }
        }

        // The clinical floor: a record without all three core facts is not
        // meaningful, whatever else is filled in.
        if diagnosis.is_empty() || self.diagnosis_date.is_none() || stage.is_empty() {
            errors.add(
                "__all__",
                rule_violation("insufficient_medical_data", INSUFFICIENT_DATA_MESSAGE),
            );
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    // ---- submission ----

    /// Validate and serialize. On success the form enters `Submitting`,
    /// which blocks further submits until [`finish_submit`](Self::finish_submit)
    /// is called from the completion handler.
    pub fn try_begin_submit(&mut self) -> Result<MedicalHistoryRequest, SubmitError> {
        self.try_begin_submit_with_today(Local::now().date_naive())
    }

    pub fn try_begin_submit_with_today(
        &mut self,
        today: NaiveDate,
    ) -> Result<MedicalHistoryRequest, SubmitError> {
        if self.phase == FormPhase::Submitting {
            return Err(SubmitError::InFlight);
        }
        self.validate_with_today(today)
            .map_err(SubmitError::Validation)?;
        self.phase = FormPhase::Submitting;
        Ok(self.to_request())
    }

    /// Record the completion of the in-flight request.
    pub fn finish_submit(&mut self, success: bool) {
        self.phase = if success {
            FormPhase::Success
        } else {
            FormPhase::Failed
        };
    }

    /// Serialize to the request DTO: optional text trimmed and normalized
    /// to absent when empty, incomplete surgeries and blank names dropped.
    fn to_request(&self) -> MedicalHistoryRequest {
        fn present(value: &str) -> Option<String> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }

        MedicalHistoryRequest {
            patient_id: self.patient_id.unwrap_or_default(),
            diagnosis: present(&self.diagnosis),
            diagnosis_date: self.diagnosis_date,
            progression_stage: self.progression_stage.trim().parse().ok(),
            genetic_risk: present(&self.genetic_risk),
            family_history: present(&self.family_history),
            environmental_factors: present(&self.environmental_factors),
            comorbidities: present(&self.comorbidities),
            medication_allergies: present(&self.medication_allergies),
            environmental_allergies: present(&self.environmental_allergies),
            food_allergies: present(&self.food_allergies),
            surgeries: self
                .surgeries
                .iter()
                .filter_map(|entry| {
                    let description = entry.description.trim();
                    if description.is_empty() {
                        return None;
                    }
                    entry.date.map(|date| Surgery {
                        description: description.to_string(),
                        date,
                    })
                })
                .collect(),
            provider_names: self
                .provider_names
                .iter()
                .filter_map(|name| present(name))
                .collect(),
            caregiver_names: self
                .caregiver_names
                .iter()
                .filter_map(|name| present(name))
                .collect(),
        }
    }
}

fn dedup_names(names: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for name in names {
        let trimmed = name.trim().to_string();
        if !trimmed.is_empty() && !out.contains(&trimmed) {
            out.push(trimmed);
        }
    }
    out
}

/// Insert the name if absent, remove it if present. Name-equality lookup
/// before insertion keeps each entry unique regardless of toggle races.
fn toggle_name(names: &mut Vec<String>, name: String) {
    match names.iter().position(|existing| *existing == name) {
        Some(index) => {
            names.remove(index);
        }
        None => names.push(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    fn valid_form() -> MedicalHistoryForm {
        let mut form = MedicalHistoryForm::new_create();
        form.patient_id = Some(12);
        form.diagnosis = "Early-stage dementia".to_string();
        form.diagnosis_date = Some(today() - Duration::days(30));
        form.progression_stage = "MILD".to_string();
        form
    }

    fn user(id: i64, first: &str, last: &str, username: &str) -> UserDto {
        UserDto {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            username: username.to_string(),
            email: None,
            role: None,
        }
    }

    #[test]
    fn test_valid_form_passes() {
        assert!(valid_form().validate_with_today(today()).is_ok());
    }

    #[test]
    fn test_diagnosis_rules() {
        let mut form = valid_form();
        form.diagnosis = "X".to_string();
        let errors = form.validate_with_today(today()).unwrap_err();
        assert!(errors.field_errors().contains_key("diagnosis"));

        form.diagnosis = "a".repeat(256);
        let errors = form.validate_with_today(today()).unwrap_err();
        assert!(errors.field_errors().contains_key("diagnosis"));
    }

    #[test]
    fn test_future_diagnosis_date_rejected() {
        let mut form = valid_form();
        form.diagnosis_date = Some(today() + Duration::days(1));
        let errors = form.validate_with_today(today()).unwrap_err();
        let field = errors.field_errors();
        let codes: Vec<_> = field["diagnosisDate"].iter().map(|e| e.code.as_ref()).collect();
        assert_eq!(codes, vec!["future_date_not_allowed"]);
    }

    #[test]
    fn test_today_is_not_a_future_date() {
        let mut form = valid_form();
        form.diagnosis_date = Some(today());
        assert!(form.validate_with_today(today()).is_ok());
    }

    #[test]
    fn test_insufficient_medical_data_floor() {
        // Any one of the three core facts missing rejects the record,
        // no matter how valid the rest is.
        for missing in 0..3 {
            let mut form = valid_form();
            form.family_history = "No relevant family history".to_string();
            match missing {
                0 => form.diagnosis.clear(),
                1 => form.diagnosis_date = None,
                _ => form.progression_stage.clear(),
            }
            let errors = form.validate_with_today(today()).unwrap_err();
            let has_floor_error = errors
                .field_errors()
                .get("__all__")
                .is_some_and(|list| list.iter().any(|e| e.code == "insufficient_medical_data"));
            assert!(has_floor_error, "missing field #{missing} must trip the floor");
        }
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let mut form = valid_form();
        form.progression_stage = "TERMINAL".to_string();
        let errors = form.validate_with_today(today()).unwrap_err();
        assert!(errors.field_errors().contains_key("progressionStage"));
    }

    #[test]
    fn test_optional_field_caps() {
        let mut form = valid_form();
        form.genetic_risk = "x".to_string();
        let errors = form.validate_with_today(today()).unwrap_err();
        assert!(errors.field_errors().contains_key("geneticRisk"));

        let mut form = valid_form();
        form.comorbidities = "c".repeat(1001);
        let errors = form.validate_with_today(today()).unwrap_err();
        assert!(errors.field_errors().contains_key("comorbidities"));

        // empty optional fields are fine
        assert!(valid_form().validate_with_today(today()).is_ok());
    }

    #[test]
    fn test_toggle_keeps_names_unique() {
        let mut form = valid_form();
        let chen = user(1, "Sarah", "Chen", "schen");
        let patel = user(2, "Anand", "Patel", "apatel");

        form.toggle_provider(&chen);
        form.toggle_provider(&patel);
        form.toggle_provider(&chen);
        form.toggle_provider(&chen);
        form.toggle_provider(&chen);

        assert_eq!(
            form.provider_names(),
            &["Anand Patel".to_string(), "Sarah Chen".to_string()]
        );
        assert!(form.is_provider_selected(&chen));
        assert!(form.is_provider_selected(&patel));
    }

    #[test]
    fn test_toggle_on_off_restores_prior_state() {
        let mut form = valid_form();
        form.toggle_caregiver(&user(1, "James", "Wilson", "jwilson"));
        let before = form.caregiver_names().to_vec();

        let maria = user(2, "Maria", "Lopez", "mlopez");
        form.toggle_caregiver(&maria);
        form.toggle_caregiver(&maria);

        assert_eq!(form.caregiver_names(), before.as_slice());
    }

    #[test]
    fn test_incomplete_surgeries_dropped_silently() {
        let mut form = valid_form();
        form.surgeries = vec![
            SurgeryEntry {
                description: "Appendectomy".to_string(),
                date: Some(NaiveDate::from_ymd_opt(2019, 5, 2).unwrap()),
            },
            SurgeryEntry {
                description: "   ".to_string(),
                date: Some(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()),
            },
            SurgeryEntry {
                description: "Knee replacement".to_string(),
                date: None,
            },
        ];

        let request = form.try_begin_submit_with_today(today()).unwrap();
        assert_eq!(request.surgeries.len(), 1);
        assert_eq!(request.surgeries[0].description, "Appendectomy");
    }

    #[test]
    fn test_submit_normalizes_payload() {
        let mut form = valid_form();
        form.diagnosis = "  Early-stage dementia  ".to_string();
        form.genetic_risk = "   ".to_string();
        form.family_history = " Mother affected ".to_string();

        let request = form.try_begin_submit_with_today(today()).unwrap();
        assert_eq!(request.diagnosis.as_deref(), Some("Early-stage dementia"));
        assert_eq!(request.genetic_risk, None, "blank text becomes absent");
        assert_eq!(request.family_history.as_deref(), Some("Mother affected"));
        assert_eq!(request.progression_stage, Some(ProgressionStage::Mild));
    }

    #[test]
    fn test_double_submit_blocked_while_in_flight() {
        let mut form = valid_form();
        form.try_begin_submit_with_today(today()).unwrap();
        assert_eq!(form.phase(), FormPhase::Submitting);
        assert!(matches!(
            form.try_begin_submit_with_today(today()),
            Err(SubmitError::InFlight)
        ));

        form.finish_submit(false);
        assert_eq!(form.phase(), FormPhase::Failed);
        // a failed submission keeps the values and can be retried
        assert!(form.try_begin_submit_with_today(today()).is_ok());
    }

    #[test]
    fn test_populate_enters_edit_state() {
        let response: MedicalHistoryResponse = serde_json::from_str(
            r#"{
                "id": 3, "patientId": 12, "patientName": "James Wilson",
                "diagnosis": "Dementia", "diagnosisDate": "2024-02-10",
                "progressionStage": "MODERATE",
                "surgeries": [{"description": "Biopsy", "date": "2023-11-01"}],
                "providerNames": ["Sarah Chen"], "caregiverNames": ["jwilson"]
            }"#,
        )
        .unwrap();

        let mut form = MedicalHistoryForm::begin_load(12);
        assert_eq!(form.phase(), FormPhase::Loading);
        form.populate(&response);

        assert_eq!(form.phase(), FormPhase::Populated);
        assert!(form.is_edit_mode());
        assert_eq!(form.diagnosis, "Dementia");
        assert_eq!(form.surgeries.len(), 1);
        assert_eq!(form.provider_names(), &["Sarah Chen".to_string()]);
        assert!(form.validate_with_today(today()).is_ok());
    }
}
