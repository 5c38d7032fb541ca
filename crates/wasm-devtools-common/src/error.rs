//! Error types for wasm-devtools.
//!
//! Each tool has its own flat error enum built with `thiserror`:
//! - [`SmokeError`]: Failures of the module smoke test
//! - [`FetchError`]: Failures of the blob fetcher
//!
//! Both tools fail fast: nothing here is retried or recovered locally.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors raised by the module smoke test.
#[derive(Error, Debug)]
pub enum SmokeError {
    /// The module file could not be read.
    #[error("Failed to read module '{}': {source}", path.display())]
    Io {
        /// Path of the module file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The bytes are not a valid WebAssembly module.
    #[error("Compilation failed: {reason}")]
    CompilationFailed {
        /// Description of the compilation failure.
        reason: String,
    },

    /// Instantiation failed, typically because of unsatisfied imports.
    #[error("Instantiation failed: {reason}")]
    InstantiationFailed {
        /// Description of the instantiation failure.
        reason: String,
    },

    /// An export the smoke test relies on is absent or has the wrong kind.
    #[error("Missing export '{name}': expected {expected}")]
    MissingExport {
        /// Name of the export.
        name: String,
        /// Human-readable description of the expected kind.
        expected: String,
    },

    /// The entry point trapped.
    #[error("Wasm trap: {message}")]
    Trap {
        /// Description of the trap.
        message: String,
    },

    /// The probed memory window lies outside the exported memory.
    #[error("Memory window {offset}..{offset}+{len} is out of bounds")]
    MemoryAccess {
        /// Start offset of the window.
        offset: usize,
        /// Length of the window.
        len: usize,
    },

    /// Observed memory contents differ from the expected contents.
    #[error("Assertion failed ({check}): expected {expected:?}, got {actual:?}")]
    AssertionFailed {
        /// Which check failed (e.g. "before call").
        check: String,
        /// Expected bytes.
        expected: Vec<u8>,
        /// Bytes actually read from memory.
        actual: Vec<u8>,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

/// Errors raised by the blob fetcher.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The RPC endpoint could not be reached.
    #[error("Connection to {endpoint} failed: {reason}")]
    Connection {
        /// Endpoint URL.
        endpoint: String,
        /// Description of the failure.
        reason: String,
    },

    /// An RPC call failed or returned a malformed response.
    #[error("Query {method} failed: {reason}")]
    Query {
        /// RPC method name.
        method: String,
        /// Description of the failure.
        reason: String,
    },

    /// A key that was just enumerated has no value on the remote.
    #[error("No data stored for enumerated key {hash}")]
    MissingData {
        /// Canonical hash string of the key.
        hash: String,
    },

    /// A filesystem operation failed.
    #[error("IO error at '{}': {source}", path.display())]
    Io {
        /// Path involved in the failed operation.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Invalid configuration was provided.
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the configuration error.
        reason: String,
    },
}

impl SmokeError {
    /// Create a new `Io` error.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new `CompilationFailed` error.
    pub fn compilation_failed(reason: impl Into<String>) -> Self {
        Self::CompilationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `InstantiationFailed` error.
    pub fn instantiation_failed(reason: impl Into<String>) -> Self {
        Self::InstantiationFailed {
            reason: reason.into(),
        }
    }

    /// Create a new `MissingExport` error.
    pub fn missing_export(name: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::MissingExport {
            name: name.into(),
            expected: expected.into(),
        }
    }

    /// Create a new `Trap` error.
    pub fn trap(message: impl Into<String>) -> Self {
        Self::Trap {
            message: message.into(),
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if observed memory did not match the expectation.
    pub fn is_assertion(&self) -> bool {
        matches!(self, Self::AssertionFailed { .. })
    }
}

impl FetchError {
    /// Create a new `Connection` error.
    pub fn connection(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Query` error.
    pub fn query(method: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Query {
            method: method.into(),
            reason: reason.into(),
        }
    }

    /// Create a new `Io` error.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Create a new `InvalidConfig` error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the error came from the remote node or the link to it.
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Query { .. })
    }
}
