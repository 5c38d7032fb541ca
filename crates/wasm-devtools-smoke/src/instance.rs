//! Instantiation and export-shape validation.
//!
//! [`SmokeInstance`] owns the store and the single instance a smoke test
//! works with. The exports it needs are resolved and type-checked once,
//! right after instantiation:
//!
//! - a linear memory the host reads directly
//! - a `() -> ()` function the host calls
//!
//! Anything missing or of the wrong kind fails with
//! [`SmokeError::MissingExport`] before any memory is inspected.

use tracing::{debug, error, instrument};
use wasmtime::{Extern, Linker, Memory, Store, Trap, TypedFunc};

use crate::{CompiledModule, WasmEngine};
use wasm_devtools_common::SmokeError;

const ENTRY_SIGNATURE: &str = "function () -> ()";

/// An instantiated module with a validated export shape.
pub struct SmokeInstance {
    store: Store<()>,
    memory: Memory,
    entry: TypedFunc<(), ()>,
    entry_point: String,
}

impl SmokeInstance {
    /// Instantiate `module` with no imports and resolve its exports.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::InstantiationFailed`] if the module requires
    /// imports or its start function traps, and [`SmokeError::MissingExport`]
    /// if `memory_export` is not a memory or `entry_point` is not a
    /// `() -> ()` function.
    #[instrument(skip(engine, module), fields(content_hash = %module.content_hash()))]
    pub async fn instantiate(
        engine: &WasmEngine,
        module: &CompiledModule,
        memory_export: &str,
        entry_point: &str,
    ) -> Result<Self, SmokeError> {
        let mut store = Store::new(engine.inner(), ());

        // Nothing is provided to the guest.
        let linker: Linker<()> = Linker::new(engine.inner());

        let instance = linker
            .instantiate_async(&mut store, module.inner())
            .await
            .map_err(|e| SmokeError::instantiation_failed(e.to_string()))?;

        debug!("Module instantiated, resolving exports");

        // Memory export must be a memory, entry point a () -> () function
        let Some(Extern::Memory(memory)) = instance.get_export(&mut store, memory_export) else {
            return Err(SmokeError::missing_export(memory_export, "memory"));
        };

        let Some(Extern::Func(func)) = instance.get_export(&mut store, entry_point) else {
            return Err(SmokeError::missing_export(entry_point, ENTRY_SIGNATURE));
        };

        let entry = func
            .typed::<(), ()>(&store)
            .map_err(|_| SmokeError::missing_export(entry_point, ENTRY_SIGNATURE))?;

        Ok(Self {
            store,
            memory,
            entry,
            entry_point: entry_point.to_string(),
        })
    }

    /// Read `len` bytes of linear memory starting at `offset`.
    ///
    /// Memory is read afresh on every call.
    pub fn read_window(&self, offset: usize, len: usize) -> Result<Vec<u8>, SmokeError> {
        let data = self.memory.data(&self.store);

        offset
            .checked_add(len)
            .and_then(|end| data.get(offset..end))
            .map(<[u8]>::to_vec)
            .ok_or(SmokeError::MemoryAccess { offset, len })
    }

    /// Current size of the exported memory in bytes.
    pub fn memory_size(&self) -> usize {
        self.memory.data_size(&self.store)
    }

    /// Invoke the entry point once.
    ///
    /// # Errors
    ///
    /// Returns [`SmokeError::Trap`] if the call traps.
    #[instrument(skip(self), fields(entry_point = %self.entry_point))]
    pub async fn call_entry(&mut self) -> Result<(), SmokeError> {
        self.entry
            .call_async(&mut self.store, ())
            .await
            .map_err(|e| {
                let message = describe_trap(&e);
                error!(trap_message = %message, "Entry point trapped");
                SmokeError::trap(message)
            })
    }
}

/// Human-readable trap description, preferring the trap code when present.
fn describe_trap(error: &wasmtime::Error) -> String {
    match error.downcast_ref::<Trap>() {
        Some(trap) => format!("{trap} ({error})"),
        None => error.to_string(),
    }
}

impl std::fmt::Debug for SmokeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmokeInstance")
            .field("entry_point", &self.entry_point)
            .field("memory_size", &self.memory_size())
            .finish_non_exhaustive()
    }
}
