//! Configuration file support for commitcal.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `COMMITCAL_`, e.g., `COMMITCAL_DATABASE_URL`)
//! 3. Config file (~/.config/commitcal/config.toml or ./commitcal.toml)
//! 4. Built-in defaults
//!
//! The database URL defaults to `sqlite://~/.local/state/commitcal/commitcal.db` on
//! Linux (using the XDG state directory) if not explicitly configured.
//!
//! Example config file:
//! ```toml
//! [database]
//! url = "sqlite://~/.local/state/commitcal/commitcal.db"  # optional, this is the default
//!
//! [user]
//! id = "local"
//!
//! [github]
//! token = "ghp_..."  # or use COMMITCAL_GITHUB_TOKEN env var
//! requests_per_second = 10
//!
//! [sync]
//! months_back = 12
//! ttl_minutes = 30
//! concurrency = 3
//! window_months = 2
//! max_pages_per_window = 50
//! max_commits_per_repo = 5000
//! ```

use std::path::PathBuf;
use std::{fs, io};

use chrono::Duration;
use commitcal::sync::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_COMMITS_PER_REPO, DEFAULT_MAX_PAGES_PER_WINDOW,
    DEFAULT_MONTHS_BACK, DEFAULT_PAGE_SIZE, DEFAULT_TTL_MINUTES, DEFAULT_WINDOW_MONTHS,
    SyncOptions,
};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use serde::Deserialize;

const APP_NAME: &str = "commitcal";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub user: UserConfig,
    pub github: GitHubConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

/// Database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database connection URL.
    /// Defaults to `sqlite://~/.local/state/commitcal/commitcal.db` if not specified.
    pub url: Option<String>,
}

/// Whose repositories the CLI works on.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "local".to_string(),
        }
    }
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// GitHub API token.
    /// Can also be set via COMMITCAL_GITHUB_TOKEN environment variable.
    pub token: Option<String>,
    /// API root for GitHub Enterprise or a mirror.
    pub api_url: Option<String>,
    /// Proactive request pacing. Zero disables it.
    pub requests_per_second: u32,
    /// Fetch diffs to build per-file change summaries.
    pub fetch_diffs: bool,
    /// Fetch author profiles.
    pub fetch_author_profiles: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: None,
            requests_per_second: commitcal::rate_limits::GITHUB_DEFAULT_RPS,
            fetch_diffs: true,
            fetch_author_profiles: true,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// History covered when no range is given.
    pub months_back: u32,
    /// Minutes a sync stays fresh.
    pub ttl_minutes: i64,
    /// Repositories fetched concurrently.
    pub concurrency: usize,
    pub window_months: u32,
    pub page_size: u32,
    pub max_pages_per_window: u32,
    /// Zero disables the cap.
    pub max_commits_per_repo: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            months_back: DEFAULT_MONTHS_BACK,
            ttl_minutes: DEFAULT_TTL_MINUTES,
            concurrency: DEFAULT_CONCURRENCY,
            window_months: DEFAULT_WINDOW_MONTHS,
            page_size: DEFAULT_PAGE_SIZE,
            max_pages_per_window: DEFAULT_MAX_PAGES_PER_WINDOW,
            max_commits_per_repo: DEFAULT_MAX_COMMITS_PER_REPO,
        }
    }
}

impl SyncConfig {
    /// Library options with these defaults.
    pub fn to_options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size,
            max_pages_per_window: self.max_pages_per_window,
            max_commits_per_repo: (self.max_commits_per_repo > 0)
                .then_some(self.max_commits_per_repo),
            concurrency: self.concurrency,
            ttl: Duration::minutes(self.ttl_minutes),
            window_months: self.window_months,
            force_refresh: false,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/commitcal/config.toml)
    /// 3. Local config file (./commitcal.toml)
    /// 4. Environment variables with COMMITCAL_ prefix
    pub fn load() -> Self {
        let mut builder = ConfigBuilder::builder();

        if let Some(xdg_config) = Self::default_config_path()
            && xdg_config.exists()
        {
            tracing::debug!("Loading config from {:?}", xdg_config);
            builder = builder.add_source(
                File::from(xdg_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        let local_config = PathBuf::from("commitcal.toml");
        if local_config.exists() {
            tracing::debug!("Loading config from ./commitcal.toml");
            builder = builder.add_source(
                File::from(local_config)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., COMMITCAL_DATABASE_URL -> database.url
        builder = builder.add_source(
            Environment::with_prefix("COMMITCAL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );
        // Single-underscore aliases for the common settings.
        for (var, key) in [
            ("COMMITCAL_DATABASE_URL", "database.url"),
            ("COMMITCAL_GITHUB_TOKEN", "github.token"),
            ("COMMITCAL_USER_ID", "user.id"),
        ] {
            if let Ok(value) = std::env::var(var) {
                builder = match builder.set_override(key, value) {
                    Ok(b) => b,
                    Err(e) => {
                        tracing::warn!("Ignoring {}: {}", var, e);
                        return Config::default();
                    }
                };
            }
        }

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the database URL, falling back to the default state directory path.
    ///
    /// The `mode=rwc` parameter creates the file if it doesn't exist.
    pub fn database_url(&self) -> Option<String> {
        self.database.url.clone().or_else(|| {
            Self::default_state_dir().map(|state_dir| {
                let db_path = state_dir.join("commitcal.db");
                format!("sqlite://{}?mode=rwc", db_path.display())
            })
        })
    }

    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get the default state directory path.
    ///
    /// On Linux, this is `$XDG_STATE_HOME/commitcal` or `~/.local/state/commitcal`.
    /// On macOS/Windows, falls back to the data directory.
    pub fn default_state_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", APP_NAME).map(|dirs| {
            // state_dir() returns None on macOS/Windows
            dirs.state_dir()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| dirs.data_dir().to_path_buf())
        })
    }

    /// Save a GitHub token to the config file.
    ///
    /// Only the `[github]` section is touched; formatting, comments and other
    /// settings are preserved.
    pub fn save_github_token(token: &str) -> io::Result<PathBuf> {
        let config_path = Self::default_config_path().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config directory",
            )
        })?;

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = if config_path.exists() {
            fs::read_to_string(&config_path)?
        } else {
            String::new()
        };

        fs::write(&config_path, set_github_token(&content, token)?)?;
        Ok(config_path)
    }
}

/// Set `github.token` in a TOML document, keeping everything else intact.
fn set_github_token(content: &str, token: &str) -> io::Result<String> {
    use toml_edit::{DocumentMut, value};

    let mut doc: DocumentMut = content
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("Invalid TOML: {}", e)))?;

    if !doc.contains_key("github") {
        doc["github"] = toml_edit::table();
    }
    doc["github"]["token"] = value(token);
    Ok(doc.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_content: &str) -> Config {
        ConfigBuilder::builder()
            .add_source(config::File::from_str(toml_content, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.database.url.is_none());
        assert!(config.github.token.is_none());
        assert_eq!(config.user.id, "local");
        assert_eq!(config.sync.months_back, 12);
        assert_eq!(config.sync.ttl_minutes, 30);
        assert_eq!(config.sync.concurrency, 3);
        assert_eq!(config.sync.max_commits_per_repo, 5000);
    }

    #[test]
    fn test_sync_section_maps_to_options() {
        let config = parse(
            r#"
            [sync]
            ttl_minutes = 5
            concurrency = 8
            window_months = 1
            max_commits_per_repo = 0
            "#,
        );

        let options = config.sync.to_options();
        assert_eq!(options.ttl, Duration::minutes(5));
        assert_eq!(options.concurrency, 8);
        assert_eq!(options.window_months, 1);
        assert_eq!(options.max_commits_per_repo, None);
        assert!(!options.force_refresh);
    }

    #[test]
    fn test_config_partial_override() {
        let config = parse(
            r#"
            [github]
            token = "ghp_test123"

            [sync]
            months_back = 3
            "#,
        );

        assert_eq!(config.github_token(), Some("ghp_test123".to_string()));
        assert_eq!(config.sync.months_back, 3);
        assert_eq!(config.sync.concurrency, 3);
        assert!(config.github.fetch_diffs);
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let config = parse(
            r#"
            [github]
            token = "   "
            "#,
        );
        assert!(config.github_token().is_none());
    }

    #[test]
    fn test_database_url_defaults_to_state_dir() {
        let url = Config::default().database_url().unwrap();
        assert!(url.starts_with("sqlite://"));
        assert!(url.contains("commitcal.db"));
        assert!(url.ends_with("?mode=rwc"));
    }

    #[test]
    fn test_database_url_respects_configured_value() {
        let config = parse(
            r#"
            [database]
            url = "sqlite:///tmp/cal.db"
            "#,
        );
        assert_eq!(
            config.database_url(),
            Some("sqlite:///tmp/cal.db".to_string())
        );
    }

    #[test]
    fn test_config_invalid_toml() {
        let result = ConfigBuilder::builder()
            .add_source(config::File::from_str("[sync\nmonths_back = 1", FileFormat::Toml))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_set_github_token_preserves_other_settings() {
        let original = "# my settings\n[sync]\nconcurrency = 4 # tuned\n";
        let updated = set_github_token(original, "ghp_new").unwrap();

        assert!(updated.contains("# my settings"));
        assert!(updated.contains("concurrency = 4 # tuned"));
        assert!(updated.contains("[github]"));
        assert!(updated.contains("token = \"ghp_new\""));
    }

    #[test]
    fn test_set_github_token_replaces_existing_token() {
        let original = "[github]\ntoken = \"old\"\n";
        let updated = set_github_token(original, "new").unwrap();
        assert!(updated.contains("token = \"new\""));
        assert!(!updated.contains("old"));
    }

    #[test]
    fn test_set_github_token_rejects_invalid_toml() {
        let err = set_github_token("[github", "x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
