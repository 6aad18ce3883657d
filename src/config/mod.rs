// Configuration management: TOML settings, environment overrides and the
// interactive setup wizard

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    AppConfig, Config, ConfigError, EmbeddingConfig, ExternalSearchConfig, KnowledgeBaseConfig,
    ProviderKind, RetrievalConfig,
};

use std::path::{Path, PathBuf};

/// Resolve the configuration directory, preferring an explicit override
#[inline]
pub fn get_config_dir(override_dir: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match override_dir {
        Some(dir) => Ok(dir.to_path_buf()),
        None => Config::default_dir(),
    }
}
