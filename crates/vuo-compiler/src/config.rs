//! Compiler configuration
//!
//! Handles where node-class modules are found, which toolchain builds
//! specialized backings, and the defaults used when nodes are created.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::defaults;
use crate::error::{CompilerError, Result};

/// Configuration for a [`Compiler`](crate::compiler::Compiler)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompilerConfig {
    /// Directories scanned for node-class and type modules
    pub module_search_paths: Vec<PathBuf>,
    /// Toolchain executable used to build specialized modules
    pub clang_path: PathBuf,
    /// Extra header directories passed to the toolchain
    pub include_dirs: Vec<PathBuf>,
    /// Seconds a single toolchain invocation may run
    pub compile_timeout_secs: u64,
    /// Backing type for generic ports that are not yet specialized
    pub default_backing_type: String,
    /// Item count of a freshly attached "Make List" drawer
    pub default_make_list_item_count: usize,
    /// Directory for cached compiled modules (None = no on-disk cache)
    pub cache_dir: Option<PathBuf>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            module_search_paths: Vec::new(),
            clang_path: PathBuf::from(defaults::CLANG_PATH),
            include_dirs: Vec::new(),
            compile_timeout_secs: defaults::COMPILE_TIMEOUT_SECS,
            default_backing_type: defaults::BACKING_TYPE.to_string(),
            default_make_list_item_count: defaults::MAKE_LIST_ITEM_COUNT,
            cache_dir: None,
        }
    }
}

impl CompilerConfig {
    /// Parse a configuration from JSON; missing keys take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a directory, falling back to defaults if no file exists
    pub async fn load(config_dir: &Path) -> Result<Self> {
        let config_path = config_dir.join(defaults::CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("No compiler config at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;
        Self::from_json_str(&contents)
    }

    /// Save configuration into a directory
    pub async fn save(&self, config_dir: &Path) -> Result<()> {
        fs::create_dir_all(config_dir).await?;

        let config_path = config_dir.join(defaults::CONFIG_FILE_NAME);
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(&config_path, contents).await?;

        log::info!("Compiler configuration saved to {:?}", config_path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.default_backing_type.is_empty() {
            return Err(CompilerError::config("defaultBackingType must not be empty"));
        }
        if self.compile_timeout_secs == 0 {
            return Err(CompilerError::config("compileTimeoutSecs must be positive"));
        }
        if crate::generic::is_generic_type_name(&self.default_backing_type) {
            return Err(CompilerError::config(format!(
                "defaultBackingType '{}' must be a concrete type",
                self.default_backing_type
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = CompilerConfig::from_json_str(r#"{ "includeDirs": ["/opt/vuo/include"] }"#).unwrap();
        assert_eq!(config.include_dirs, vec![PathBuf::from("/opt/vuo/include")]);
        assert_eq!(config.default_backing_type, "VuoInteger");
        assert_eq!(config.default_make_list_item_count, 2);
        assert!(config.cache_dir.is_none());
    }

    #[test]
    fn test_generic_backing_type_rejected() {
        let err = CompilerConfig::from_json_str(r#"{ "defaultBackingType": "VuoGenericType1" }"#).unwrap_err();
        assert!(matches!(err, CompilerError::Config(_)));
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = CompilerConfig {
            default_make_list_item_count: 3,
            module_search_paths: vec![PathBuf::from("/opt/vuo/modules")],
            ..CompilerConfig::default()
        };

        config.save(dir.path()).await.unwrap();
        let loaded = CompilerConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn test_load_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = CompilerConfig::load(dir.path()).await.unwrap();
        assert_eq!(loaded, CompilerConfig::default());
    }
}
