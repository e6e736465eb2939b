pub mod state;
pub mod store;
pub mod token;

pub use state::{Session, SessionState};
pub use store::TokenStore;
