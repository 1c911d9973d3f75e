use std::path::{Path, PathBuf};

use anyhow::Result;
use lander_core::{ConfigOverrides, RuntimeConfig};
use tracing::debug;

const CONFIG_FILE: &str = "config.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged overrides (user + project)
    pub fn load() -> Result<ConfigOverrides> {
        Self::load_from_paths(&Self::user_config_path(), &Self::project_config_path())
    }

    /// Effective runtime config: defaults with the merged overrides applied
    pub fn load_runtime() -> Result<RuntimeConfig> {
        Ok(RuntimeConfig::default().with_overrides(&Self::load()?))
    }

    /// Get user config path
    pub fn user_config_path() -> PathBuf {
        lander_paths::config_dir().join(CONFIG_FILE)
    }

    /// Get project config path
    /// Can be overridden with LANDER_PROJECT_CONFIG_DIR env var (useful for isolated e2e tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("LANDER_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join(CONFIG_FILE)
        } else {
            PathBuf::from(".lander").join(CONFIG_FILE)
        }
    }

    /// Layer the project file over the user file; missing files are skipped
    fn load_from_paths(user: &Path, project: &Path) -> Result<ConfigOverrides> {
        let mut merged = ConfigOverrides::default();

        for path in [user, project] {
            if path.exists() {
                debug!(path = %path.display(), "Loading config layer");
                let layer = ConfigOverrides::from_toml_file(path)?;
                merged = ConfigOverrides::merge(merged, layer);
            }
        }

        Ok(merged)
    }
}
