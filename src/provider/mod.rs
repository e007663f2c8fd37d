//! Managed identity provider integration.
//!
//! When AssayGate runs with the managed backend, account credentials live at
//! an external identity provider and this module is the only code that talks
//! to it. The [`ProviderClient`] trait mirrors the provider's operation set;
//! [`HttpProviderClient`] is the production JSON-over-HTTPS implementation.
//! Provider failures stay inside [`ProviderError`] until the auth backend
//! remaps them at its boundary, so provider wire details never leak past
//! this module.

pub mod client;
pub mod error;
pub mod http;

pub use client::{
    AuthFlowResponse, ProviderChallenge, ProviderClient, ProviderTokens, ProviderUser,
    SignUpResponse,
};
pub use error::{ProviderError, Result as ProviderResult};
pub use http::HttpProviderClient;
