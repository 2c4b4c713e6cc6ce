//! Generator configuration
//!
//! Values come from an optional TOML file and are overridden by command-line
//! flags. Names are validated here, before any generation starts.
//!
//! ```toml
//! backend = "socket"
//! generate_test_harness = true
//! sort_policy = "declaration"
//! error_hook = "report_ipc_error"
//! ```

use std::fs;
use std::path::Path;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::backend::{Backend, BackendKind};
use crate::error::ConfigError;
use crate::layout::SortPolicy;

/// Validated configuration consumed by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub backend: BackendKind,
    pub generate_test_harness: bool,
    /// Overrides the backend's fixed-region ordering
    pub sort_policy: Option<SortPolicy>,
    /// Function generated error paths call before their outcome
    pub error_hook: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: BackendKind::NativeV4,
            generate_test_harness: false,
            sort_policy: None,
            error_hook: None,
        }
    }
}

/// Configuration file contents, names not yet validated
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub backend: Option<String>,
    pub generate_test_harness: Option<bool>,
    pub sort_policy: Option<String>,
    pub error_hook: Option<String>,
}

impl ConfigFile {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        debug!("read configuration from {}", path.display());
        Self::from_toml_str(&text)
    }
}

/// Command-line values that take precedence over the file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub backend: Option<String>,
    /// Only ever switches the harness on
    pub generate_test_harness: bool,
    pub sort_policy: Option<String>,
    pub error_hook: Option<String>,
}

impl Config {
    /// Merge `file` and `overrides`, overrides winning.
    pub fn resolve(file: ConfigFile, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let backend = match overrides.backend.as_ref().or(file.backend.as_ref()) {
            Some(name) => name.parse()?,
            None => defaults.backend,
        };
        let sort_policy = overrides
            .sort_policy
            .as_ref()
            .or(file.sort_policy.as_ref())
            .map(|name| name.parse::<SortPolicy>())
            .transpose()?;
        let generate_test_harness =
            overrides.generate_test_harness || file.generate_test_harness.unwrap_or(defaults.generate_test_harness);
        let error_hook = overrides
            .error_hook
            .clone()
            .or(file.error_hook)
            .filter(|hook| !hook.is_empty());

        Ok(Config {
            backend,
            generate_test_harness,
            sort_policy,
            error_hook,
        })
    }

    /// Read `path` if given and merge `overrides` on top.
    pub fn load(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };
        Self::resolve(file, overrides)
    }

    /// Backend descriptor with the configured ordering applied
    pub fn backend_descriptor(&self) -> Backend {
        let backend = self.backend.descriptor();
        match self.sort_policy {
            Some(policy) => backend.with_sort_policy(policy),
            None => backend,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::resolve(ConfigFile::default(), &ConfigOverrides::default()).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.backend_descriptor(), BackendKind::NativeV4.descriptor());
    }

    #[test]
    fn test_file_values() {
        let file = ConfigFile::from_toml_str(
            r#"
            backend = "socket"
            generate_test_harness = true
            sort_policy = "descending-size"
            error_hook = "on_error"
            "#,
        )
        .unwrap();
        let config = Config::resolve(file, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.backend, BackendKind::Socket);
        assert!(config.generate_test_harness);
        assert_eq!(config.sort_policy, Some(SortPolicy::DescendingSize));
        assert_eq!(config.error_hook.as_deref(), Some("on_error"));
        assert_eq!(config.backend_descriptor().layout.sort_policy, SortPolicy::DescendingSize);
    }

    #[test]
    fn test_overrides_win() {
        let file = ConfigFile {
            backend: Some("socket".to_string()),
            error_hook: Some("from_file".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            backend: Some("v2".to_string()),
            error_hook: Some("from_cli".to_string()),
            ..Default::default()
        };
        let config = Config::resolve(file, &overrides).unwrap();
        assert_eq!(config.backend, BackendKind::NativeV2);
        assert_eq!(config.error_hook.as_deref(), Some("from_cli"));
    }

    #[test]
    fn test_unknown_names_are_fatal() {
        let file = ConfigFile {
            backend: Some("l4".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Config::resolve(file, &ConfigOverrides::default()),
            Err(ConfigError::UnknownBackend(name)) if name == "l4"
        ));

        let overrides = ConfigOverrides {
            sort_policy: Some("shuffle".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            Config::resolve(ConfigFile::default(), &overrides),
            Err(ConfigError::UnknownSortPolicy(_))
        ));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(matches!(
            ConfigFile::from_toml_str("backend = \"socket\"\nbackends = 2\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "backend = \"native-v2\"").unwrap();
        let config = Config::load(Some(file.path()), &ConfigOverrides::default()).unwrap();
        assert_eq!(config.backend, BackendKind::NativeV2);

        let missing = Config::load(Some(Path::new("/nonexistent/idlgen.toml")), &ConfigOverrides::default());
        assert!(matches!(missing, Err(ConfigError::Read { .. })));
    }
}
