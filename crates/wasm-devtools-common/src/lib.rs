//! Common types, errors, and configuration for wasm-devtools.
//!
//! This crate provides shared functionality used by both tools:
//! - Error types using `thiserror`, one enum per tool
//! - Configuration structures with defaults matching the stock setup
//! - TOML configuration file loading

pub mod config;
pub mod config_file;
pub mod error;

pub use config::{EngineConfig, FetchConfig, KeyHasherKind, OptLevel, SmokeConfig, ToolsConfig};
pub use config_file::{ConfigFile, ConfigFileError};
pub use error::{FetchError, SmokeError};
