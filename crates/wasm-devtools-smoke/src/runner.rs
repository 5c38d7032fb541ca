//! The smoke test sequence.

use std::time::{Duration, Instant};

use tracing::{info, instrument};

use crate::{CompiledModule, ExportInfo, SmokeInstance, WasmEngine};
use wasm_devtools_common::{EngineConfig, SmokeConfig, SmokeError};

/// Outcome of a successful smoke test.
#[derive(Debug, Clone)]
pub struct SmokeReport {
    /// Exports of the module, in declaration order.
    pub exports: Vec<ExportInfo>,
    /// Memory window read right after instantiation.
    pub before: Vec<u8>,
    /// Memory window read after the entry point returned.
    pub after: Vec<u8>,
    /// Wall time of the whole run.
    pub duration: Duration,
}

/// Run the smoke test described by `config`.
///
/// Steps, each aborting the run on failure:
///
/// 1. Read and compile the module
/// 2. Report its exports
/// 3. Instantiate it and resolve the memory and entry point exports
/// 4. Check the memory window holds `expected_before`
/// 5. Call the entry point once
/// 6. Check the memory window now holds `expected_after`
#[instrument(skip_all, fields(module = %config.module_path.display()))]
pub async fn run_smoke_test(
    engine_config: &EngineConfig,
    config: &SmokeConfig,
) -> Result<SmokeReport, SmokeError> {
    config.validate()?;
    let start = Instant::now();

    // Compile
    let engine = WasmEngine::new(engine_config)?;
    let module = CompiledModule::load(engine.inner(), &config.module_path).await?;

    // Report exports
    let exports = module.exports();
    for export in &exports {
        info!(name = %export.name, kind = %export.kind, "Module export");
    }

    // Instantiate with no imports
    let mut instance =
        SmokeInstance::instantiate(&engine, &module, &config.memory_export, &config.entry_point)
            .await?;

    let offset = config.probe_offset;
    let len = config.window_len();

    // Freshly instantiated memory
    let before = instance.read_window(offset, len)?;
    check_window("before call", &config.expected_before, &before)?;

    // Side effect of the entry point
    instance.call_entry().await?;

    let after = instance.read_window(offset, len)?;
    check_window("after call", &config.expected_after, &after)?;

    let duration = start.elapsed();
    info!(
        duration_ms = duration.as_millis(),
        before = ?before,
        after = ?after,
        "Smoke test passed"
    );

    Ok(SmokeReport {
        exports,
        before,
        after,
        duration,
    })
}

fn check_window(check: &str, expected: &[u8], actual: &[u8]) -> Result<(), SmokeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(SmokeError::AssertionFailed {
            check: check.to_string(),
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        })
    }
}
