//! wasm-devtools CLI entry point.
//!
//! Two independent tools share this binary:
//! - `smoke-test`: load a Wasm module and check an exported function's
//!   effect on exported memory
//! - `fetch-blobs`: download every blob of a remote storage map
//!
//! This is the only place that turns failures into a process exit code.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wasm_devtools_common::{ConfigFile, ToolsConfig};
use wasm_devtools_fetch::run_fetch;
use wasm_devtools_smoke::run_smoke_test;

#[derive(Debug, Parser)]
#[command(name = "wasm-devtools", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, short, global = true, env = "WASM_DEVTOOLS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that a module's `test` export mutates exported memory as expected.
    SmokeTest {
        /// Module to load (binary `.wasm` or text `.wat`).
        #[arg(long)]
        module: Option<PathBuf>,
    },

    /// Download every blob referenced by a remote storage map.
    FetchBlobs {
        /// RPC endpoint of the node.
        #[arg(long, env = "WASM_DEVTOOLS_ENDPOINT")]
        endpoint: Option<String>,

        /// Destination directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Block hash to query at.
        #[arg(long)]
        at: Option<String>,
    },
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ToolsConfig> {
    match path {
        Some(path) => Ok(ConfigFile::from_file(path)?.into_config()),
        None => Ok(ToolsConfig::default()),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,wasm_devtools=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command line and load configuration
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::SmokeTest { module } => {
            // Command line overrides the config file
            if let Some(module) = module {
                config.smoke.module_path = module;
            }

            let report = run_smoke_test(&config.engine, &config.smoke)
                .await
                .with_context(|| {
                    format!("Smoke test of {} failed", config.smoke.module_path.display())
                })?;

            println!("Exports:");
            for export in &report.exports {
                println!("  {export}");
            }
            println!(
                "Smoke test passed: {:?} -> {:?}",
                report.before, report.after
            );
        }
        Command::FetchBlobs {
            endpoint,
            output_dir,
            at,
        } => {
            // Command line overrides the config file
            if let Some(endpoint) = endpoint {
                config.fetch.endpoint = endpoint;
            }
            if let Some(output_dir) = output_dir {
                config.fetch.output_dir = output_dir;
            }
            if at.is_some() {
                config.fetch.at_block = at;
            }

            info!(
                endpoint = %config.fetch.endpoint,
                output_dir = %config.fetch.output_dir.display(),
                "Configuration loaded"
            );

            let summary = run_fetch(&config.fetch)
                .await
                .with_context(|| format!("Fetching from {} failed", config.fetch.endpoint))?;

            println!(
                "Fetched {} blob(s), {} already present, {} listed",
                summary.fetched, summary.skipped, summary.listed
            );
        }
    }

    Ok(())
}
