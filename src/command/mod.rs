mod convert;
mod digest;
mod strip_markers;

pub use convert::run_convert;
pub use digest::run_digest;
pub use strip_markers::run_strip_markers;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backend::SglangClient;
use crate::config::BackendConfig;

/// Build a client for `config` and make sure the runtime answers before any
/// work starts.
async fn connect(config: &BackendConfig) -> Result<SglangClient> {
    let client = SglangClient::new(config)?;
    let model = client
        .model_info()
        .await
        .with_context(|| format!("Generation runtime at {} is not reachable", config.base_url))?;

    info!(
        "Connected to {} (model: {})",
        client.base_url(),
        model.model_path.as_deref().unwrap_or("unknown")
    );
    if model.is_generation == Some(false) {
        warn!("The runtime reports a non-generation model; analyses will likely fail");
    }
    Ok(client)
}
