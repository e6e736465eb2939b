use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Disease progression stages accepted by the medical-history service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgressionStage {
    Mild,
    Moderate,
    Severe,
}

impl ProgressionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressionStage::Mild => "MILD",
            ProgressionStage::Moderate => "MODERATE",
            ProgressionStage::Severe => "SEVERE",
        }
    }
}

impl fmt::Display for ProgressionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressionStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MILD" => Ok(ProgressionStage::Mild),
            "MODERATE" => Ok(ProgressionStage::Moderate),
            "SEVERE" => Ok(ProgressionStage::Severe),
            other => Err(format!("unknown progression stage: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Surgery {
    pub description: String,
    pub date: NaiveDate,
}

/// File attached to a medical-history record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDto {
    pub id: i64,
    pub file_name: String,
    pub file_type: String,
    pub file_url: String,
    pub uploaded_at: NaiveDateTime,
}

/// Request DTO for create/update. Optional text fields are absent (not
/// serialized) when empty; collections are dropped entirely when empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryRequest {
    pub patient_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progression_stage: Option<ProgressionStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub genetic_risk: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family_history: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_factors: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comorbidities: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub medication_allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environmental_allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub food_allergies: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub surgeries: Vec<Surgery>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub provider_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub caregiver_names: Vec<String>,
}

/// Response DTO. Carries the denormalized name lists plus the numeric id
/// lists and attached files the request variant does not have.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalHistoryResponse {
    pub id: i64,
    pub patient_id: i64,
    pub patient_name: String,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub diagnosis_date: Option<NaiveDate>,
    #[serde(default)]
    pub progression_stage: Option<String>,
    #[serde(default)]
    pub genetic_risk: Option<String>,
    #[serde(default)]
    pub family_history: Option<String>,
    #[serde(default)]
    pub environmental_factors: Option<String>,
    #[serde(default)]
    pub comorbidities: Option<String>,
    #[serde(default)]
    pub medication_allergies: Option<String>,
    #[serde(default)]
    pub environmental_allergies: Option<String>,
    #[serde(default)]
    pub food_allergies: Option<String>,
    #[serde(default)]
    pub surgeries: Vec<Surgery>,
    #[serde(default)]
    pub provider_ids: Vec<i64>,
    #[serde(default)]
    pub provider_names: Vec<String>,
    #[serde(default)]
    pub caregiver_ids: Vec<i64>,
    #[serde(default)]
    pub caregiver_names: Vec<String>,
    #[serde(default)]
    pub files: Vec<FileDto>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
}
