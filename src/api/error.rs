use thiserror::Error;

/// Which identity field collided during registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Email,
    Username,
    Generic,
}

impl DuplicateField {
    pub fn message(&self) -> &'static str {
        match self {
            DuplicateField::Email => "Email already registered. Please use another or login.",
            DuplicateField::Username => "Username already taken. Please choose another.",
            DuplicateField::Generic => "An account with these details already exists.",
        }
    }
}

/// Domain error taxonomy. Every client method classifies raw transport
/// errors into one of these before they reach the caller.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Malformed credential token: {0}")]
    Credential(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{}", .field.message())]
    DuplicateAccount { field: DuplicateField },

    #[error("Cannot connect to the gateway: {0}")]
    NetworkUnavailable(String),

    #[error("Unauthorized: please log in again")]
    Unauthorized,

    #[error("Access forbidden: you do not have permission to access this resource")]
    AccessForbidden,

    #[error("Resource not found")]
    NotFound,

    #[error("Service unavailable: the medical history service is not reachable")]
    ServiceUnavailable,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid gateway configuration: {0}")]
    Configuration(String),

    #[error("File error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Error: {status} - {message}")]
    Unknown { status: u16, message: String },
}

/// Extract a server-supplied detail from a 400 body. The gateway answers
/// with a JSON object carrying `message` or `error` when it has one.
pub fn bad_request_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["message", "error"] {
            if let Some(detail) = value.get(key).and_then(|v| v.as_str()) {
                return detail.to_string();
            }
        }
    }
    "The data sent to the server is invalid.".to_string()
}

/// Classify a registration reply body. The user service reports collisions
/// as success-shaped text, so this runs on every reply regardless of status.
pub fn duplicate_field_in(body: &str) -> Option<DuplicateField> {
    let lower = body.to_lowercase();
    let mentions_username = lower.contains("username");
    let mentions_email = lower.contains("email") || lower.contains("user already exists");

    if lower.contains("already exists") || lower.contains("already registered") {
        if mentions_username {
            return Some(DuplicateField::Username);
        }
        if mentions_email {
            return Some(DuplicateField::Email);
        }
        return Some(DuplicateField::Generic);
    }
    if lower.contains("duplicate") || lower.contains("conflict") {
        if mentions_username {
            return Some(DuplicateField::Username);
        }
        if mentions_email {
            return Some(DuplicateField::Email);
        }
        return Some(DuplicateField::Generic);
    }
    None
}
