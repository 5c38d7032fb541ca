//! Blob fetcher for wasm-devtools.
//!
//! Enumerates the keys of a remote storage map over JSON-RPC and downloads
//! the blob stored under each key into a local directory:
//!
//! - [`storage`]: Storage key derivation and value decoding
//! - [`rpc`]: JSON-RPC transports (WebSocket and HTTP)
//! - [`client`]: Typed storage queries and the [`BlobSource`] implementation
//! - [`store`]: Destination directory with write-then-rename persistence
//! - [`fetcher`]: The enumerate, skip-or-fetch, persist loop
//!
//! A blob whose file already exists is never fetched again, so a run can be
//! repeated or restarted after an interruption.

pub mod client;
pub mod fetcher;
pub mod rpc;
pub mod storage;
pub mod store;

pub use client::{StorageClient, StorageMapSource};
pub use fetcher::{BlobSource, FetchSummary, fetch_all, run_fetch};
pub use rpc::{HttpTransport, RpcTransport, WsTransport, connect};
pub use storage::BlobKey;
pub use store::BlobStore;
