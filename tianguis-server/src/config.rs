//! Server configuration loading and service assembly.
//!
//! The TOML file named by `TIANGUIS_CONFIG` supplies every non-secret
//! setting (defaults apply when the variable is unset). Generation
//! credentials come from the environment only, through
//! [`KeyRotationPool::from_env`].

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::{info, warn};

use tianguis_core::config::TianguisConfig;
use tianguis_core::persistence::{
    MemoryProfileRepository, ProfileRepository, SqliteProfileRepository,
};
use tianguis_core::{ProgressStore, VendorCatalog};
use tianguis_llm::{GeminiBackend, GeminiSettings, GenerationClient, KeyRotationPool};

use crate::orchestrator::SessionOrchestrator;

/// Environment variable naming the TOML config file.
pub const CONFIG_ENV_VAR: &str = "TIANGUIS_CONFIG";

/// Load configuration from the file named by `TIANGUIS_CONFIG`, or defaults
/// when it is unset.
///
/// # Errors
///
/// Returns an error if the named file cannot be read or is invalid.
pub fn load_config<F>(lookup: F) -> anyhow::Result<TianguisConfig>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(CONFIG_ENV_VAR).filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let config = TianguisConfig::from_file(Path::new(path.trim()))
                .with_context(|| format!("loading config from {path}"))?;
            info!(path = %path, "Loaded configuration");
            Ok(config)
        }
        None => {
            let config = TianguisConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Build the vendor catalog, profile store and generation client described
/// by `config`, and wire them into an orchestrator.
///
/// # Errors
///
/// Fails fast when credentials are required but `pool` is empty, when the
/// vendor roster or database cannot be opened, or when the HTTP client
/// cannot be built.
pub fn build_orchestrator(
    config: &TianguisConfig,
    pool: KeyRotationPool,
) -> anyhow::Result<SessionOrchestrator> {
    if pool.is_empty() {
        if config.generation.require_credentials {
            bail!(
                "no generation credentials found (set GEMINI_API_KEY), \
                 or set generation.require_credentials = false to run on fallback replies"
            );
        }
        warn!("No generation credentials; every vendor reply will come from fallback tables");
    }

    let catalog = match &config.catalog.path {
        Some(path) => VendorCatalog::from_file(path)
            .with_context(|| format!("loading vendor roster from {}", path.display()))?,
        None => VendorCatalog::builtin(),
    };
    info!(vendors = catalog.len(), "Vendor catalog ready");

    let repository: Arc<dyn ProfileRepository> = match config.persistence.backend.as_str() {
        "memory" => {
            warn!("Using in-memory profile store; progress is lost on restart");
            Arc::new(MemoryProfileRepository::new())
        }
        _ => Arc::new(
            SqliteProfileRepository::open(&config.persistence.path, &config.persistence)
                .with_context(|| {
                    format!("opening database {}", config.persistence.path.display())
                })?,
        ),
    };

    let generation = &config.generation;
    let backend = GeminiBackend::new(GeminiSettings {
        base_url: generation.base_url.clone(),
        model: generation.model.clone(),
        temperature: generation.temperature,
        max_output_tokens: generation.max_output_tokens,
    })?;
    let generator = GenerationClient::new(
        Arc::new(backend),
        pool,
        Duration::from_millis(generation.request_timeout_ms),
    );

    Ok(SessionOrchestrator::new(
        Arc::new(catalog),
        Arc::new(generator),
        Arc::new(ProgressStore::with_capacity(
            repository,
            config.persistence.cache_capacity,
        )),
        &config.session,
        config.persistence.write_attempts,
    ))
}
