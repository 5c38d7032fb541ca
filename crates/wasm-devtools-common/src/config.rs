//! Configuration structures for wasm-devtools.
//!
//! This module defines configuration options for both tools:
//! - [`ToolsConfig`]: Top-level configuration containing all settings
//! - [`EngineConfig`]: Wasmtime engine settings used by the smoke test
//! - [`SmokeConfig`]: Module path, export names and expected memory contents
//! - [`FetchConfig`]: RPC endpoint, storage map and destination directory
//!
//! Every default reproduces the stock behavior of the tools, so an empty
//! configuration is always valid.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{FetchError, SmokeError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Wasmtime engine configuration.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Module smoke test configuration.
    #[serde(default)]
    pub smoke: SmokeConfig,

    /// Blob fetcher configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Cranelift optimization level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    /// No optimizations.
    None,
    /// Optimize for speed.
    #[default]
    Speed,
    /// Optimize for speed and code size.
    SpeedAndSize,
}

/// Wasmtime engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineConfig {
    /// Use the pooling instance allocator instead of on-demand allocation.
    ///
    /// The smoke test only creates a single instance, so this is off by default.
    #[serde(default = "defaults::pooling_allocator")]
    pub pooling_allocator: bool,

    /// Memory per instance slot in megabytes.
    ///
    /// Only effective when `pooling_allocator` is enabled.
    #[serde(default = "defaults::instance_memory_mb")]
    pub instance_memory_mb: u32,

    /// Cranelift optimization level.
    #[serde(default)]
    pub opt_level: OptLevel,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pooling_allocator: defaults::pooling_allocator(),
            instance_memory_mb: defaults::instance_memory_mb(),
            opt_level: OptLevel::default(),
        }
    }
}

/// Module smoke test configuration.
///
/// The probed memory window is `probe_offset .. probe_offset + len` where
/// `len` is the length of the expected byte vectors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SmokeConfig {
    /// Path to the module, either binary Wasm or WAT text.
    #[serde(default = "defaults::module_path")]
    pub module_path: PathBuf,

    /// Name of the exported linear memory.
    #[serde(default = "defaults::memory_export")]
    pub memory_export: String,

    /// Name of the exported zero-argument function to invoke.
    #[serde(default = "defaults::entry_point")]
    pub entry_point: String,

    /// Offset of the probed window in linear memory.
    #[serde(default)]
    pub probe_offset: usize,

    /// Window contents expected right after instantiation.
    #[serde(default = "defaults::expected_before")]
    pub expected_before: Vec<u8>,

    /// Window contents expected after calling the entry point once.
    #[serde(default = "defaults::expected_after")]
    pub expected_after: Vec<u8>,
}

impl Default for SmokeConfig {
    fn default() -> Self {
        Self {
            module_path: defaults::module_path(),
            memory_export: defaults::memory_export(),
            entry_point: defaults::entry_point(),
            probe_offset: 0,
            expected_before: defaults::expected_before(),
            expected_after: defaults::expected_after(),
        }
    }
}

impl SmokeConfig {
    /// Length of the probed memory window.
    pub fn window_len(&self) -> usize {
        self.expected_before.len()
    }

    /// Check that the configuration describes a usable probe.
    pub fn validate(&self) -> Result<(), SmokeError> {
        if self.memory_export.is_empty() || self.entry_point.is_empty() {
            return Err(SmokeError::invalid_config("export names must not be empty"));
        }
        if self.expected_before.is_empty() {
            return Err(SmokeError::invalid_config(
                "expected memory window must not be empty",
            ));
        }
        if self.expected_before.len() != self.expected_after.len() {
            return Err(SmokeError::invalid_config(format!(
                "expected_before has {} bytes but expected_after has {}",
                self.expected_before.len(),
                self.expected_after.len()
            )));
        }
        Ok(())
    }
}

/// How a storage map hashes its key argument.
///
/// The key argument is appended to the map prefix after the hasher output,
/// so only the length of that output matters to recover it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyHasherKind {
    /// The key argument is stored as-is.
    #[default]
    Identity,
    /// 8-byte xxhash64 followed by the key argument.
    Twox64Concat,
    /// 16-byte blake2b-128 followed by the key argument.
    Blake2_128Concat,
}

impl KeyHasherKind {
    /// Number of hasher output bytes preceding the key argument.
    pub const fn hash_len(self) -> usize {
        match self {
            Self::Identity => 0,
            Self::Twox64Concat => 8,
            Self::Blake2_128Concat => 16,
        }
    }
}

/// Largest page a node answers for `state_getKeysPaged`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Blob fetcher configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchConfig {
    /// RPC endpoint (`ws://`, `wss://`, `http://` or `https://`).
    #[serde(default = "defaults::endpoint")]
    pub endpoint: String,

    /// Pallet owning the storage map.
    #[serde(default = "defaults::pallet")]
    pub pallet: String,

    /// Name of the storage map.
    #[serde(default = "defaults::storage_map")]
    pub storage_map: String,

    /// Hasher used by the storage map for its key.
    #[serde(default)]
    pub key_hasher: KeyHasherKind,

    /// Destination directory for downloaded blobs.
    #[serde(default = "defaults::output_dir")]
    pub output_dir: PathBuf,

    /// File extension of downloaded blobs, without the dot.
    #[serde(default = "defaults::extension")]
    pub extension: String,

    /// Number of keys requested per `state_getKeysPaged` call.
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,

    /// Block hash to query at. Uses the best block when unset.
    #[serde(default)]
    pub at_block: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            endpoint: defaults::endpoint(),
            pallet: defaults::pallet(),
            storage_map: defaults::storage_map(),
            key_hasher: KeyHasherKind::default(),
            output_dir: defaults::output_dir(),
            extension: defaults::extension(),
            page_size: defaults::page_size(),
            at_block: None,
        }
    }
}

impl FetchConfig {
    /// Check that the configuration is usable.
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.endpoint.is_empty() {
            return Err(FetchError::invalid_config("endpoint must not be empty"));
        }
        if self.pallet.is_empty() || self.storage_map.is_empty() {
            return Err(FetchError::invalid_config(
                "pallet and storage map names must not be empty",
            ));
        }
        if self.extension.is_empty() || self.extension.contains(['.', '/', '\\']) {
            return Err(FetchError::invalid_config(format!(
                "invalid file extension '{}'",
                self.extension
            )));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(FetchError::invalid_config(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        Ok(())
    }
}

/// Default value functions for serde.
mod defaults {
    use std::path::PathBuf;

    pub const fn pooling_allocator() -> bool {
        false
    }

    pub const fn instance_memory_mb() -> u32 {
        64
    }

    pub fn module_path() -> PathBuf {
        PathBuf::from("fixtures/smoke.wasm")
    }

    pub fn memory_export() -> String {
        "memory".to_string()
    }

    pub fn entry_point() -> String {
        "test".to_string()
    }

    pub fn expected_before() -> Vec<u8> {
        vec![0, 0, 0, 0]
    }

    pub fn expected_after() -> Vec<u8> {
        vec![1, 1, 1, 1]
    }

    pub fn endpoint() -> String {
        "wss://rpc.polkadot.io".to_string()
    }

    pub fn pallet() -> String {
        "Paras".to_string()
    }

    pub fn storage_map() -> String {
        "CodeByHash".to_string()
    }

    pub fn output_dir() -> PathBuf {
        PathBuf::from("wasm")
    }

    pub fn extension() -> String {
        "wasm".to_string()
    }

    pub const fn page_size() -> u32 {
        1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ToolsConfig::default();

        assert!(!config.engine.pooling_allocator);
        assert_eq!(config.engine.opt_level, OptLevel::Speed);

        assert_eq!(config.smoke.entry_point, "test");
        assert_eq!(config.smoke.memory_export, "memory");
        assert_eq!(config.smoke.expected_before, vec![0, 0, 0, 0]);
        assert_eq!(config.smoke.expected_after, vec![1, 1, 1, 1]);
        assert_eq!(config.smoke.window_len(), 4);

        assert_eq!(config.fetch.endpoint, "wss://rpc.polkadot.io");
        assert_eq!(config.fetch.pallet, "Paras");
        assert_eq!(config.fetch.storage_map, "CodeByHash");
        assert_eq!(config.fetch.key_hasher, KeyHasherKind::Identity);
        assert_eq!(config.fetch.extension, "wasm");
        assert!(config.fetch.at_block.is_none());
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = ToolsConfig::default();
        assert!(config.smoke.validate().is_ok());
        assert!(config.fetch.validate().is_ok());
    }

    #[test]
    fn test_partial_deserialization() {
        let json = r#"{"fetch": {"endpoint": "ws://127.0.0.1:9944", "key_hasher": "twox64_concat"}}"#;
        let config: ToolsConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.fetch.endpoint, "ws://127.0.0.1:9944");
        assert_eq!(config.fetch.key_hasher, KeyHasherKind::Twox64Concat);
        // Defaults for unspecified fields
        assert_eq!(config.fetch.page_size, 1000);
        assert_eq!(config.smoke.entry_point, "test");
    }

    #[test]
    fn test_smoke_validate_rejects_mismatched_windows() {
        let config = SmokeConfig {
            expected_after: vec![1, 1],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, SmokeError::InvalidConfig { .. }));

        let config = SmokeConfig {
            expected_before: vec![],
            expected_after: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fetch_validate() {
        let bad_ext = FetchConfig {
            extension: "tar.gz".into(),
            ..Default::default()
        };
        assert!(bad_ext.validate().is_err());

        let no_pages = FetchConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(no_pages.validate().is_err());

        let largest = FetchConfig {
            page_size: MAX_PAGE_SIZE,
            ..Default::default()
        };
        assert!(largest.validate().is_ok());

        let oversized = FetchConfig {
            page_size: MAX_PAGE_SIZE + 1,
            ..Default::default()
        };
        let err = oversized.validate().unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_hasher_lengths() {
        assert_eq!(KeyHasherKind::Identity.hash_len(), 0);
        assert_eq!(KeyHasherKind::Twox64Concat.hash_len(), 8);
        assert_eq!(KeyHasherKind::Blake2_128Concat.hash_len(), 16);
    }
}
