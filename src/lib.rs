//! Fetch subsystem for HTTP inputs.
//!
//! Turns a declarative [`HttpInputSpec`] into a GET request, runs it through a
//! shared pooled engine and hands back the decoded JSON body. See
//! [`HttpInputClient`] for the entry point.

pub mod client;
pub mod config;
pub mod errors;
pub mod input;
pub mod net;

pub use client::{global, install, shutdown_global, HttpInputClient};
pub use config::{ClientConfig, Credentials, EngineConfig, SecureClientConfig, TrustStrategy};
pub use errors::FetchError;
pub use input::HttpInputSpec;
pub use net::{Response, ResponseMapping};
