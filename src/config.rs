use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::scoring::weights::WeightPolicy;
use crate::scoring::Sector;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Sqlite,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoringConfig {
    #[serde(default)]
    pub default_sector: Sector,
    #[serde(default)]
    pub weight_policy: WeightPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub source_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/province-scores/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    /// A `--source-url` switches the source to HTTP; `--db` pins it to SQLite.
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
            self.source.kind = SourceKind::Sqlite;
        }
        if let Some(url) = overrides.source_url {
            self.source.url = url;
            self.source.kind = SourceKind::Http;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
# SQLite file holding imported scores
db_path = "~/.local/share/province-scores/scores.db"

[source]
# sqlite | http
kind = "sqlite"
url = ""

[scoring]
# public reads priority scores, private reads attractiveness scores
default_sector = "public"
# normalize | strict
weight_policy = "normalize"

[server]
host = "127.0.0.1"
port = 8080

[logging]
# overridden by RUST_LOG
filter = "info"
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/province-scores/scores.db".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_log_filter() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.source.kind, SourceKind::Sqlite);
        assert_eq!(parsed.scoring.default_sector, Sector::Public);
        assert_eq!(parsed.scoring.weight_policy, WeightPolicy::Normalize);
        assert_eq!(parsed.server.port, 8080);
        assert_eq!(parsed.storage.db_path, default_db_path());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[scoring]
default_sector = "private"
weight_policy = "strict"
"#,
        )
        .unwrap();
        assert_eq!(parsed.scoring.default_sector, Sector::Private);
        assert_eq!(parsed.scoring.weight_policy, WeightPolicy::Strict);
        assert_eq!(parsed.logging.filter, "info");
        assert_eq!(parsed.server.host, "127.0.0.1");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("province-scores-no-such-config.toml");
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.source.kind, SourceKind::Sqlite);
    }

    #[test]
    fn overrides_pick_the_source() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: None,
            source_url: Some("http://scores.local/api".to_string()),
        });
        assert_eq!(config.source.kind, SourceKind::Http);
        assert_eq!(config.source.url, "http://scores.local/api");

        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/scores.db".to_string()),
            source_url: None,
        });
        assert_eq!(config.source.kind, SourceKind::Sqlite);
        assert_eq!(config.resolved_db_path(), PathBuf::from("/tmp/scores.db"));
    }

    #[test]
    fn tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/a/b.db"), home.join("a/b.db"));
        }
        assert_eq!(expand_tilde("/abs/b.db"), PathBuf::from("/abs/b.db"));
    }
}
