pub mod collective;
pub mod hello;
pub mod init;
pub mod probe;
pub mod rescue;
pub mod sensor;
pub mod status;

use std::path::PathBuf;
use std::time::Duration;

use agora_config::AppConfig;
use anyhow::Context;
use tracing::warn;

/// Flags shared by every command.
pub struct GlobalOpts {
    pub config: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl GlobalOpts {
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
    }

    /// Load the config file (or defaults) and apply command-line overrides.
    pub fn load_config(&self) -> anyhow::Result<AppConfig> {
        let path = self.config_path();
        let mut config = AppConfig::load_from(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?;
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        Ok(config)
    }
}

/// Sleep for `duration`, returning early on Ctrl-C.
pub async fn run_for(duration: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = tokio::signal::ctrl_c() => warn!("Interrupted by operator"),
    }
}
