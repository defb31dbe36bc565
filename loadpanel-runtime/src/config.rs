use std::env;

use once_cell::sync::OnceCell;

use crate::{DEFAULT_SANDBOX_IMAGE, DEFAULT_SANDBOX_NETWORK};

/// Runtime configuration loaded once at startup from environment variables.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Image the sandbox container is created from.
    pub image: String,
    /// Docker network the sandbox joins; must be the network the targets
    /// are reachable on by their symbolic names.
    pub network: String,
    /// Explicit Docker daemon address; local defaults when unset.
    pub docker_host: Option<String>,
    /// Pull the sandbox image before first use.
    pub pull_image: bool,
}

static RUNTIME_CONFIG: OnceCell<RuntimeConfig> = OnceCell::new();

impl RuntimeConfig {
    /// Load configuration from environment variables.
    /// Cached after the first call — subsequent calls return the same config.
    pub fn load() -> &'static RuntimeConfig {
        RUNTIME_CONFIG.get_or_init(|| {
            let image =
                env::var("SANDBOX_IMAGE").unwrap_or_else(|_| DEFAULT_SANDBOX_IMAGE.to_string());
            let network =
                env::var("SANDBOX_NETWORK").unwrap_or_else(|_| DEFAULT_SANDBOX_NETWORK.to_string());
            let docker_host = env::var("DOCKER_HOST").ok();
            let pull_image = env::var("SANDBOX_PULL_IMAGE")
                .ok()
                .and_then(|v| v.parse::<bool>().ok())
                .unwrap_or(true);

            RuntimeConfig {
                image,
                network,
                docker_host,
                pull_image,
            }
        })
    }
}
