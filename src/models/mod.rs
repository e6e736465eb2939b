pub mod medical_history;
pub mod user;

pub use medical_history::{
    FileDto, MedicalHistoryRequest, MedicalHistoryResponse, ProgressionStage, Surgery,
};
pub use user::{Credentials, RegisterRequest, Role, UserDto};
