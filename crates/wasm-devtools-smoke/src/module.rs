//! WebAssembly module loading and compilation.
//!
//! This module provides [`CompiledModule`], a wrapper around Wasmtime's [`Module`]
//! that remembers where the module came from and exposes its export listing.
//!
//! Modules can be loaded from binary `.wasm` files or from `.wat` text; the
//! text form is what the test fixtures use.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::Path;
use std::time::Instant;

use tracing::{debug, info, instrument};
use wasmtime::{Engine, ExternType, Module};

use wasm_devtools_common::SmokeError;

/// A compiled WebAssembly module.
#[derive(Clone)]
pub struct CompiledModule {
    /// The compiled Wasmtime module.
    inner: Module,

    /// Hash of the original bytes, for log correlation.
    content_hash: String,
}

/// Kind of an exported item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// An exported function.
    Function,
    /// An exported linear memory.
    Memory,
    /// An exported table.
    Table,
    /// An exported global.
    Global,
}

impl std::fmt::Display for ExportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportKind::Function => write!(f, "function"),
            ExportKind::Memory => write!(f, "memory"),
            ExportKind::Table => write!(f, "table"),
            ExportKind::Global => write!(f, "global"),
        }
    }
}

impl From<&ExternType> for ExportKind {
    fn from(ty: &ExternType) -> Self {
        match ty {
            ExternType::Func(_) => ExportKind::Function,
            ExternType::Memory(_) => ExportKind::Memory,
            ExternType::Table(_) => ExportKind::Table,
            ExternType::Global(_) => ExportKind::Global,
        }
    }
}

/// A named export of a compiled module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportInfo {
    /// Export name.
    pub name: String,
    /// Export kind.
    pub kind: ExportKind,
}

impl std::fmt::Display for ExportInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)
    }
}

impl CompiledModule {
    /// Read and compile a module from disk.
    ///
    /// Files with a `.wat` extension are parsed as WebAssembly text, anything
    /// else must be a binary module.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::Io`] if the file cannot be read and
    /// [`SmokeError::CompilationFailed`] if it is not a valid module.
    #[instrument(skip(engine, path), fields(path = %path.as_ref().display()))]
    pub async fn load(engine: &Engine, path: impl AsRef<Path>) -> Result<Self, SmokeError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| SmokeError::io(path, e))?;

        debug!(bytes_len = bytes.len(), "Module file read");

        if path.extension().is_some_and(|ext| ext == "wat") {
            let text = std::str::from_utf8(&bytes).map_err(|e| {
                SmokeError::compilation_failed(format!("WAT source is not UTF-8: {e}"))
            })?;
            Self::from_wat(engine, text)
        } else {
            Self::from_bytes(engine, &bytes)
        }
    }

    /// Compile a module from binary WebAssembly bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if compilation fails (e.g., invalid Wasm).
    #[instrument(skip(engine, bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(engine: &Engine, bytes: &[u8]) -> Result<Self, SmokeError> {
        let start = Instant::now();

        Self::validate_wasm_header(bytes)?;

        let module = Module::from_binary(engine, bytes).map_err(|e| {
            SmokeError::compilation_failed(format!("Module compilation failed: {e}"))
        })?;

        let content_hash = compute_hash(bytes);

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "Module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// Compile a module from WAT (WebAssembly Text Format).
    ///
    /// # Errors
    ///
    /// Returns an error if the text does not parse or does not validate.
    #[instrument(skip(engine, wat))]
    pub fn from_wat(engine: &Engine, wat: &str) -> Result<Self, SmokeError> {
        let start = Instant::now();

        let module = Module::new(engine, wat)
            .map_err(|e| SmokeError::compilation_failed(format!("WAT compilation failed: {e}")))?;

        let content_hash = compute_hash(wat.as_bytes());

        info!(
            content_hash = %content_hash,
            duration_ms = start.elapsed().as_millis(),
            "WAT module compiled"
        );

        Ok(Self {
            inner: module,
            content_hash,
        })
    }

    /// List the module's exports in declaration order.
    pub fn exports(&self) -> Vec<ExportInfo> {
        self.inner
            .exports()
            .map(|export| ExportInfo {
                name: export.name().to_string(),
                kind: ExportKind::from(&export.ty()),
            })
            .collect()
    }

    /// Get the content hash of the original bytes.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Get the inner Wasmtime module.
    pub fn inner(&self) -> &Module {
        &self.inner
    }

    /// Validate WebAssembly header (magic number).
    fn validate_wasm_header(bytes: &[u8]) -> Result<(), SmokeError> {
        if bytes.len() < 8 {
            return Err(SmokeError::compilation_failed(
                "Invalid Wasm: file too small",
            ));
        }

        if &bytes[0..4] != b"\0asm" {
            return Err(SmokeError::compilation_failed(
                "Invalid Wasm: bad magic number",
            ));
        }

        Ok(())
    }
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("content_hash", &self.content_hash)
            .finish_non_exhaustive()
    }
}

/// Compute a hash of the given bytes.
fn compute_hash(bytes: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}
