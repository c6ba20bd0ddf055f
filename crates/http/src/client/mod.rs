//! ConsoleApp HTTP client

pub mod auth_typed;
pub mod config;
pub mod error;
pub mod typed;

pub use config::AuthEndpoints;
pub use error::ClientError;
pub use typed::{AuthenticatedConsoleClient, PublicConsoleClient, TypedClientBuilder};
