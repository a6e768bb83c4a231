//! Command implementations for nexus CLI.
//!
//! Each submodule implements the logic for a command group.

pub mod ask;
pub mod chat;
pub mod memory;
pub mod observe;
pub mod sessions;
pub mod snapshot;

use anyhow::{Context, Result};
use nexus_sdk::{ModelOverrides, ModelRef, Nexus};

use crate::cli::ModelArgs;
use crate::config::Config;

/// Open the engine over the configured data directory.
pub(crate) async fn open_nexus(config: &Config) -> Result<Nexus> {
    config.ensure_dirs()?;
    Nexus::with_defaults(config.sdk_config())
        .await
        .context("Failed to open nexus data directory")
}

/// Per-request overrides from the model flags; role flags win over `--model`.
pub(crate) fn overrides(args: &ModelArgs) -> ModelOverrides {
    let mut overrides = args
        .model
        .as_ref()
        .map(|name| ModelOverrides::all(ModelRef::new(name)))
        .unwrap_or_default();

    let pick = |flag: &Option<String>, slot: &mut Option<ModelRef>| {
        if let Some(name) = flag {
            *slot = Some(ModelRef::new(name));
        }
    };
    pick(&args.router_model, &mut overrides.router);
    pick(&args.memory_model, &mut overrides.memory);
    pick(&args.code_model, &mut overrides.code);
    pick(&args.fallback_model, &mut overrides.fallback);
    overrides
}
