//! ConsoleApp HTTP module providing the typed authentication client
//!
//! The client speaks the `/api/auth/*` contract of the console backend and is
//! shared by native callers and the in-browser session guard (`wasm32`).

#[macro_use]
extern crate tracing;

pub mod client;
pub mod types;

pub use client::{
    AuthEndpoints, AuthenticatedConsoleClient, ClientError, PublicConsoleClient,
    TypedClientBuilder,
};
