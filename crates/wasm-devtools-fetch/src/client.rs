//! Typed storage queries over an [`RpcTransport`].
//!
//! [`StorageClient`] wraps the two state calls the fetcher needs.
//! [`StorageMapSource`] binds a client to one storage map and exposes it as
//! a [`BlobSource`].

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::fetcher::BlobSource;
use crate::rpc::RpcTransport;
use crate::storage::{self, BlobKey};
use wasm_devtools_common::{FetchConfig, FetchError, KeyHasherKind};

const GET_KEYS_PAGED: &str = "state_getKeysPaged";
const GET_STORAGE: &str = "state_getStorage";

/// Storage queries against one node, optionally pinned to a block.
pub struct StorageClient {
    transport: Box<dyn RpcTransport>,
    at: Option<String>,
}

impl StorageClient {
    /// Query the best block.
    pub fn new(transport: Box<dyn RpcTransport>) -> Self {
        Self {
            transport,
            at: None,
        }
    }

    /// Pin every query to block `at`.
    #[must_use]
    pub fn at_block(mut self, at: Option<String>) -> Self {
        self.at = at;
        self
    }

    fn with_at(&self, mut params: Vec<Value>) -> Value {
        if let Some(at) = &self.at {
            params.push(json!(at));
        }
        Value::Array(params)
    }

    /// One page of keys under `prefix`, strictly after `start_key`.
    ///
    /// Starting from the prefix itself yields the first page.
    pub async fn keys_paged(
        &mut self,
        prefix: &[u8],
        count: u32,
        start_key: &[u8],
    ) -> Result<Vec<Vec<u8>>, FetchError> {
        let params = self.with_at(vec![
            json!(storage::to_hex(prefix)),
            json!(count),
            json!(storage::to_hex(start_key)),
        ]);

        let keys = match self.transport.request(GET_KEYS_PAGED, params).await? {
            Value::Array(keys) => keys,
            other => {
                return Err(FetchError::query(
                    GET_KEYS_PAGED,
                    format!("expected an array of keys, got {other}"),
                ));
            }
        };

        keys.iter()
            .map(|key| {
                key.as_str()
                    .and_then(|s| storage::from_hex(s).ok())
                    .ok_or_else(|| FetchError::query(GET_KEYS_PAGED, format!("invalid key {key}")))
            })
            .collect()
    }

    /// Every key under `prefix`, fetched `page_size` keys at a time.
    #[instrument(skip(self, prefix), fields(prefix = %storage::to_hex(prefix)))]
    pub async fn keys(&mut self, prefix: &[u8], page_size: u32) -> Result<Vec<Vec<u8>>, FetchError> {
        let mut all = Vec::new();
        let mut start = prefix.to_vec();

        loop {
            let page = self.keys_paged(prefix, page_size, &start).await?;
            let len = page.len();

            debug!(page_len = len, total = all.len() + len, "Fetched key page");

            // The cursor must move forward or the node would be paged forever
            if let Some(last) = page.last() {
                if *last <= start {
                    return Err(FetchError::query(
                        GET_KEYS_PAGED,
                        format!("page did not advance past {}", storage::to_hex(&start)),
                    ));
                }
                start.clone_from(last);
            }
            all.extend(page);

            if len < page_size as usize {
                return Ok(all);
            }
        }
    }

    /// Raw value stored under `key`, or `None` if nothing is stored.
    pub async fn storage(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>, FetchError> {
        let params = self.with_at(vec![json!(storage::to_hex(key))]);

        match self.transport.request(GET_STORAGE, params).await? {
            Value::Null => Ok(None),
            Value::String(s) => storage::from_hex(&s)
                .map(Some)
                .map_err(|e| FetchError::query(GET_STORAGE, format!("invalid hex value: {e}"))),
            other => Err(FetchError::query(
                GET_STORAGE,
                format!("expected a hex string, got {other}"),
            )),
        }
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("at", &self.at)
            .finish_non_exhaustive()
    }
}

/// A storage map whose values are SCALE-encoded blobs.
#[derive(Debug)]
pub struct StorageMapSource {
    client: StorageClient,
    prefix: Vec<u8>,
    hasher: KeyHasherKind,
    page_size: u32,
}

impl StorageMapSource {
    /// Bind `client` to the map described by `config`.
    pub fn new(client: StorageClient, config: &FetchConfig) -> Self {
        Self {
            client,
            prefix: storage::storage_prefix(&config.pallet, &config.storage_map),
            hasher: config.key_hasher,
            page_size: config.page_size,
        }
    }
}

#[async_trait]
impl BlobSource for StorageMapSource {
    async fn list_keys(&mut self) -> Result<Vec<BlobKey>, FetchError> {
        let raw = self.client.keys(&self.prefix, self.page_size).await?;

        raw.into_iter()
            .map(|key| BlobKey::from_storage_key(&self.prefix, self.hasher, key))
            .collect()
    }

    async fn fetch(&mut self, key: &BlobKey) -> Result<Option<Vec<u8>>, FetchError> {
        match self.client.storage(&key.storage_key).await? {
            Some(value) => storage::decode_blob(&value).map(Some),
            None => Ok(None),
        }
    }
}
