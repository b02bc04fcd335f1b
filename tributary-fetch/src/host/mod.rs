//! Host APIs used by provider adapters.
//!
//! - [`keychain`] - Credential tokens from the OS keychain
//! - [`http`] - HTTP client with tracing and domain allowlist

pub mod http;
pub mod keychain;

// Re-export key types
pub use http::{Auth, HttpClient, ResponseExt};
pub use keychain::{KeychainApi, MemoryKeychain, SystemKeychain, service_name};
