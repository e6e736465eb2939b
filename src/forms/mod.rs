pub mod medical_history;
pub mod register;

use std::borrow::Cow;
use validator::ValidationError;

pub use medical_history::{FormPhase, MedicalHistoryForm, SubmitError};
pub use register::validate_registration;

pub(crate) fn rule_violation(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}
