//! Versioned offline cache for the tracker's app shell and third-party assets.
//!
//! [`OfflineCacheProxy`] decides per request whether to pass it through, go to
//! the network first, or answer from cache first, and manages the
//! install/activate lifecycle of one cache version.

pub mod fetcher;
pub mod proxy;
pub mod storage;

pub use fetcher::{Fetcher, HttpFetcher};
pub use proxy::{
    ActivationReport, FetchOutcome, FetchPolicy, OfflineCacheProxy, ProxySettings, ResponseSource,
    WorkerState,
};
pub use storage::{CacheStorage, MemoryCacheStorage, SqliteCacheStorage};
