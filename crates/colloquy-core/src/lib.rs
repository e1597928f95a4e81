pub mod config;
pub mod credentials;
pub mod error;
pub mod types;

pub use config::ColloquyConfig;
pub use credentials::ApiCredential;
pub use error::{ColloquyError, Result};
pub use types::*;
