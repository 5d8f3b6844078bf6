use std::path::{Path, PathBuf};

use super::types::{AppConfig, LoggingConfig};

/// Get the default stackflow data directory: ~/.stackflow
pub fn get_stackflow_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".stackflow"))
}

impl LoggingConfig {
    /// The configured log directory, or ~/.stackflow/logs.
    pub fn log_dir(&self) -> anyhow::Result<PathBuf> {
        Ok(self.log_dir_in(&get_stackflow_data_dir()?))
    }

    fn log_dir_in(&self, data_dir: &Path) -> PathBuf {
        match self.directory.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => data_dir.join("logs"),
        }
    }
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    let data_dir = get_stackflow_data_dir()?;
    let mut cfg = load_from(&data_dir.join("config.toml"), Path::new("stackflow.config.toml"))?;

    cfg.logging.directory = Some(cfg.logging.log_dir_in(&data_dir).to_string_lossy().to_string());

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Priority 1: `user` (~/.stackflow/config.toml). Priority 2: `local`.
fn load_from(user: &Path, local: &Path) -> anyhow::Result<AppConfig> {
    let path = if user.exists() {
        user
    } else if local.exists() {
        local
    } else {
        return Ok(AppConfig::default());
    };

    let s = std::fs::read_to_string(path)?;
    toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}

fn apply_env_overrides<F>(cfg: &mut AppConfig, var: F) -> anyhow::Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = var("STACKFLOW_PARALLEL").filter(|v| !v.trim().is_empty()) {
        cfg.run.parallel = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("STACKFLOW_PARALLEL={v}: {e}"))?;
    }
    if let Some(v) = var("STACKFLOW_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
        cfg.logging.level = v;
    }
    Ok(())
}
