//! REST client for the ViralScore analysis backend.
//!
//! This crate provides:
//! - `ApiClient` for job status reads and submissions
//! - Injected session credentials with a refreshing cache
//! - Error taxonomy separating transient transport failures from hard errors
//! - Share-link resolution with a sequential provider fallback

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod metrics;
pub mod resolve;

#[cfg(test)]
mod client_tests;

pub use client::{ApiClient, REQUEST_ID_HEADER};
pub use config::ClientConfig;
pub use credentials::{Anonymous, Credential, CredentialCache, CredentialProvider, EnvToken, StaticToken};
pub use error::{ClientError, ClientResult};
pub use resolve::{JsonEndpointProvider, RedirectProvider, ResolveProvider, UrlResolver};
