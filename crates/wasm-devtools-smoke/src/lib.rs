//! Module smoke test for wasm-devtools.
//!
//! The smoke test loads a WebAssembly module, instantiates it without any
//! imports, and checks that calling an exported function has the expected
//! effect on exported linear memory:
//!
//! - [`WasmEngine`]: Configured Wasmtime engine
//! - [`CompiledModule`]: Compiled module plus its export listing
//! - [`SmokeInstance`]: Instance whose export shape was validated up front
//! - [`run_smoke_test`]: The whole load, check, call, check sequence
//!
//! ```text
//!   read file ─► compile ─► list exports ─► instantiate
//!                                               │
//!        check after ◄── call entry ◄── check before
//! ```

pub mod engine;
pub mod instance;
pub mod module;
pub mod runner;

pub use engine::WasmEngine;
pub use instance::SmokeInstance;
pub use module::{CompiledModule, ExportInfo, ExportKind};
pub use runner::{SmokeReport, run_smoke_test};
