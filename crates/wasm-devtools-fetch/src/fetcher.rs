//! The fetch loop.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use crate::client::{StorageClient, StorageMapSource};
use crate::rpc;
use crate::storage::BlobKey;
use crate::store::BlobStore;
use wasm_devtools_common::{FetchConfig, FetchError};

/// Where blobs come from.
#[async_trait]
pub trait BlobSource: Send {
    /// Enumerate every blob key. Order is whatever the source yields.
    async fn list_keys(&mut self) -> Result<Vec<BlobKey>, FetchError>;

    /// Fetch the blob for `key`, or `None` if the source has no value.
    async fn fetch(&mut self, key: &BlobKey) -> Result<Option<Vec<u8>>, FetchError>;
}

/// Counters for a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Keys enumerated on the source.
    pub listed: usize,
    /// Blobs downloaded and written.
    pub fetched: usize,
    /// Blobs already present locally.
    pub skipped: usize,
}

/// Download every blob of `source` that `store` does not have yet.
///
/// Keys are processed one at a time in enumeration order. The first error
/// aborts the run; blobs written before it stay in place.
///
/// # Errors
///
/// Returns [`FetchError::MissingData`] if an enumerated key has no value,
/// and propagates source and filesystem errors unchanged.
pub async fn fetch_all<S>(source: &mut S, store: &BlobStore) -> Result<FetchSummary, FetchError>
where
    S: BlobSource + ?Sized,
{
    let keys = source.list_keys().await?;
    info!(count = keys.len(), "Enumerated blob keys");

    store.ensure_dir().await?;

    let mut summary = FetchSummary {
        listed: keys.len(),
        ..FetchSummary::default()
    };

    for key in &keys {
        if store.contains(key).await? {
            debug!(hash = %key.hash, "Already present, skipping");
            summary.skipped += 1;
            continue;
        }

        let Some(bytes) = source.fetch(key).await? else {
            return Err(FetchError::MissingData {
                hash: key.hash.clone(),
            });
        };

        let path = store.persist(key, &bytes).await?;
        summary.fetched += 1;

        info!(
            hash = %key.hash,
            path = %path.display(),
            bytes_len = bytes.len(),
            "Fetched blob"
        );
    }

    Ok(summary)
}

/// Connect to the configured node and fetch every blob of the configured map.
#[instrument(skip_all, fields(
    endpoint = %config.endpoint,
    map = %format!("{}.{}", config.pallet, config.storage_map),
))]
pub async fn run_fetch(config: &FetchConfig) -> Result<FetchSummary, FetchError> {
    config.validate()?;
    let start = Instant::now();

    let transport = rpc::connect(&config.endpoint).await?;
    let client = StorageClient::new(transport).at_block(config.at_block.clone());
    let mut source = StorageMapSource::new(client, config);
    let store = BlobStore::new(&config.output_dir, &config.extension);

    let summary = fetch_all(&mut source, &store).await?;

    info!(
        listed = summary.listed,
        fetched = summary.fetched,
        skipped = summary.skipped,
        duration_ms = start.elapsed().as_millis(),
        dir = %store.dir().display(),
        "Fetch complete"
    );

    Ok(summary)
}
