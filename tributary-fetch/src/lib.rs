// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Tributary Fetch
//!
//! Network plumbing for the Tributary ingestion engine.
//!
//! ## Host APIs
//!
//! The [`host`] module provides abstractions for system interactions:
//!
//! - [`host::keychain`] - Credential tokens from the OS keychain
//! - [`host::http`] - HTTP client with tracing and domain allowlist
//!
//! ## Cache Layer
//!
//! [`cache::ResilientCache`] is a namespaced, fail-open facade over a
//! [`cache::CacheBackend`] (Redis in production). It never surfaces backend
//! failures to callers.
//!
//! ## Adapters and Page Fetching
//!
//! - [`adapter::ProviderAdapter`] - The per-provider paging + mapping contract
//! - [`page_fetcher::PageFetcher`] - Cache-first, retried page requests
//! - [`retry::RetryStrategy`] - Bounded exponential backoff with per-attempt timeouts
//! - [`context::FetchContext`] - Provides access to host APIs
//!
//! ## Example
//!
//! ```ignore
//! use tributary_fetch::{FetchContext, PageFetcher};
//!
//! let ctx = FetchContext::builder().cache(cache).build();
//! let fetcher = PageFetcher::from_context(&ctx);
//!
//! let outcome = fetcher.fetch(adapter.as_ref(), &ctx, &credential, None, 50).await;
//! let page = outcome.result?;
//! ```

// Core modules
pub mod adapter;
pub mod cache;
pub mod context;
pub mod error;
pub mod host;
pub mod page_fetcher;
pub mod retry;

// Re-export key types at crate root

// Errors
pub use error::{CacheError, FetchError, HttpError, KeychainError};

// Host APIs
pub use host::{
    http::{Auth, HttpClient},
    keychain::{KeychainApi, MemoryKeychain, SystemKeychain},
};

// Cache
pub use cache::{
    CacheBackend, CacheStats, CacheTtl, MemoryCacheBackend, RedisCacheBackend, ResilientCache,
    UnreachableCacheBackend,
};

// Adapters & fetching
pub use adapter::{AdapterInfo, Page, ProviderAdapter};
pub use context::{FetchContext, FetchContextBuilder, FetchSettings};
pub use page_fetcher::PageFetcher;
pub use retry::{FetchAttempt, RetryOutcome, RetryStrategy};
