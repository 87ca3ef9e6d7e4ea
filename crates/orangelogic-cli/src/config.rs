//! Application configuration.
//!
//! A TOML file holds API credentials and client settings. Credentials can be
//! overridden through environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use orangelogic_api::QuoteEscaping;
use serde::{Deserialize, Serialize};

/// Environment variable overriding `api.domain`.
const ENV_DOMAIN: &str = "ORANGELOGIC_DOMAIN";
/// Environment variable overriding `api.login`.
const ENV_LOGIN: &str = "ORANGELOGIC_LOGIN";
/// Environment variable overriding `api.password`.
const ENV_PASSWORD: &str = "ORANGELOGIC_PASSWORD";

/// Config file name, under `--dir` or the XDG config directory.
const CONFIG_FILE: &str = "config.toml";

/// Session ID used when the config names none.
const DEFAULT_SESSION_ID: &str = "default";

/// Top-level application configuration.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
#[allow(clippy::module_name_repetitions)]
pub struct AppConfig {
    /// API connection settings.
    #[serde(default)]
    pub api: ApiConfig,
    /// Session store settings.
    #[serde(default)]
    pub session: SessionConfig,
}

/// API connection settings. Unset values fall back to client defaults.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ApiConfig {
    /// Asset manager domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// API login ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login: Option<String>,
    /// API password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Verify TLS certificates (default: true).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Search page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count_per_page: Option<u32>,
    /// User-Agent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Quote handling inside query values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quote_escaping: Option<QuoteEscaping>,
}

/// Session store settings.
#[derive(Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Session ID the token is cached under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl AppConfig {
    /// Resolves the config file, applies environment overrides and returns
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns an error if no config location can be determined or the file
    /// is invalid.
    pub fn load_from(dir: Option<&Path>) -> Result<Self> {
        let lookup = |key: &str| std::env::var(key).ok();
        let path = Self::resolve_path(dir, lookup)?;
        tracing::debug!(path = %path.display(), "Loading config");
        let mut config = Self::load(&path)?;
        config.apply_env(lookup);
        Ok(config)
    }

    /// Returns `{dir}/config.toml` when `dir` is given, otherwise
    /// `$XDG_CONFIG_HOME/orangelogic/config.toml` with `$HOME/.config` as
    /// the fallback base.
    ///
    /// # Errors
    ///
    /// Returns an error if neither `XDG_CONFIG_HOME` nor `HOME` is set.
    pub fn resolve_path(
        dir: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<PathBuf> {
        if let Some(dir) = dir {
            return Ok(dir.join(CONFIG_FILE));
        }
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let base = match lookup("XDG_CONFIG_HOME") {
            Some(xdg) => PathBuf::from(xdg),
            None => lookup("HOME")
                .map(|home| PathBuf::from(home).join(".config"))
                .context("neither XDG_CONFIG_HOME nor HOME is set")?,
        };
        Ok(base.join("orangelogic").join(CONFIG_FILE))
    }

    /// Loads config from a TOML file. Returns default if file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Replaces credentials with non-empty values from `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());
        if let Some(domain) = lookup(ENV_DOMAIN) {
            self.api.domain = Some(domain);
        }
        if let Some(login) = lookup(ENV_LOGIN) {
            self.api.login = Some(login);
        }
        if let Some(password) = lookup(ENV_PASSWORD) {
            self.api.password = Some(password);
        }
    }

    /// Returns the session ID, falling back to `default`.
    pub fn session_id(&self) -> &str {
        self.session
            .id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or(DEFAULT_SESSION_ID)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_default_config() {
        // Arrange & Act
        let config = AppConfig::default();

        // Assert
        assert!(config.api.domain.is_none());
        assert_eq!(config.session_id(), "default");
    }

    #[test]
    fn test_load_full_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[api]
domain = "acme-dam.com"
login = "api-user"
password = "secret"
verify_tls = false
timeout_secs = 30
count_per_page = 50
quote_escaping = "backslash"

[session]
id = "nightly"
"#,
        )
        .unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config.api.domain.as_deref(), Some("acme-dam.com"));
        assert_eq!(config.api.verify_tls, Some(false));
        assert_eq!(config.api.timeout_secs, Some(30));
        assert_eq!(config.api.count_per_page, Some(50));
        assert_eq!(config.api.quote_escaping, Some(QuoteEscaping::Backslash));
        assert_eq!(config.session_id(), "nightly");
    }

    #[test]
    fn test_load_nonexistent_returns_default() {
        // Arrange
        let path = Path::new("/tmp/orangelogic_test_nonexistent_config.toml");

        // Act
        let config = AppConfig::load(path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_partial_config() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "").unwrap();

        // Act
        let config = AppConfig::load(&path).unwrap();

        // Assert
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_load_rejects_unknown_quote_escaping() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api]\nquote_escaping = \"html\"\n").unwrap();

        // Act
        let result = AppConfig::load(&path);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_path_prefers_dir() {
        // Arrange & Act
        let path =
            AppConfig::resolve_path(Some(Path::new("/srv/dam")), |_| Some(String::from("/x")))
                .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/srv/dam/config.toml"));
    }

    #[test]
    fn test_resolve_path_uses_xdg_config_home() {
        // Arrange & Act
        let path = AppConfig::resolve_path(None, |key| match key {
            "XDG_CONFIG_HOME" => Some(String::from("/xdg")),
            "HOME" => Some(String::from("/home/alice")),
            _ => None,
        })
        .unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/xdg/orangelogic/config.toml"));
    }

    #[test]
    fn test_resolve_path_falls_back_to_home() {
        // Arrange & Act
        let path = AppConfig::resolve_path(None, |key| match key {
            "XDG_CONFIG_HOME" => Some(String::new()),
            "HOME" => Some(String::from("/home/alice")),
            _ => None,
        })
        .unwrap();

        // Assert
        assert_eq!(
            path,
            PathBuf::from("/home/alice/.config/orangelogic/config.toml")
        );
    }

    #[test]
    fn test_resolve_path_without_home_fails() {
        // Arrange & Act
        let result = AppConfig::resolve_path(None, |_| None);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_dir_reads_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("config.toml"),
            "[session]\nid = \"batch\"\n",
        )
        .unwrap();

        // Act
        let config = AppConfig::load_from(Some(dir.path())).unwrap();

        // Assert
        assert_eq!(config.session_id(), "batch");
    }

    #[test]
    fn test_env_overrides_credentials() {
        // Arrange
        let mut config = AppConfig::default();
        config.api.domain = Some(String::from("old-dam.com"));
        config.api.login = Some(String::from("file-user"));

        // Act
        config.apply_env(|key| match key {
            "ORANGELOGIC_DOMAIN" => Some(String::from("acme-dam.com")),
            "ORANGELOGIC_LOGIN" => Some(String::new()),
            "ORANGELOGIC_PASSWORD" => Some(String::from("from-env")),
            _ => None,
        });

        // Assert
        assert_eq!(config.api.domain.as_deref(), Some("acme-dam.com"));
        assert_eq!(config.api.login.as_deref(), Some("file-user"));
        assert_eq!(config.api.password.as_deref(), Some("from-env"));
    }
}
