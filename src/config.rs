use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "pos.toml";
pub const DEFAULT_LOG_FILTER: &str = "pos_lv2=debug,tower_http=debug";

/// Database file picked up when `DATABASE_URL` is unset, if it already exists.
const LEGACY_DB_FILE: &str = "./serendigo.db";
const DEV_DB_FILE: &str = "./dev.db";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("unsupported database url scheme {0:?} (only sqlite is supported)")]
    UnsupportedDatabase(String),
}

/// Top-level settings, loaded from `pos.toml` and then overridden by the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    /// SQLAlchemy-style URL (`sqlite:///./dev.db`) or a bare file path.
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Runtime worker threads.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workers: default_workers(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            allowed_origins: default_allowed_origins(),
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

fn default_app_name() -> String {
    "POS Lv2 API".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_workers() -> usize {
    4
}

impl Settings {
    /// Load settings from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: Settings = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("loaded config from {}", path.display());
        Ok(settings)
    }

    /// File config (path from `POS_CONFIG`) overlaid with process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("POS_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Self::load(&path)?;
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    /// Overlay values from an environment lookup. Blank variables are ignored,
    /// except `ALLOWED_ORIGINS`, where a blank value means no origins.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = get("APP_NAME") {
            self.app_name = name.trim().to_string();
        }
        if let Some(origins) = lookup("ALLOWED_ORIGINS") {
            self.allowed_origins = split_csv(&origins);
        }
        if let Some(url) = get("DATABASE_URL") {
            self.database.url = Some(url);
        }
        if let Some(host) = get("POS_HOST") {
            self.server.host = host.trim().to_string();
        }
        if let Some(port) = get("POS_PORT") {
            self.server.port = port.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "POS_PORT",
                value: port.clone(),
            })?;
        }
        if let Some((key, workers)) = get("POS_WORKERS")
            .map(|v| ("POS_WORKERS", v))
            .or_else(|| get("WEB_CONCURRENCY").map(|v| ("WEB_CONCURRENCY", v)))
        {
            self.server.workers = parse_workers(key, &workers)?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "server.workers",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn database_location(&self) -> Result<DbLocation, ConfigError> {
        resolve_database_path(self.database.url.as_deref(), |p| p.exists())
    }
}

fn parse_workers(key: &'static str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        }),
    }
}

/// Split a comma-separated list, dropping blank entries.
pub fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

impl fmt::Display for DbLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbLocation::File(path) => write!(f, "{}", path.display()),
            DbLocation::Memory => f.write_str(":memory:"),
        }
    }
}

/// Map a database URL onto a SQLite location.
///
/// An unset URL falls back to `./serendigo.db` when `exists` reports it present,
/// otherwise `./dev.db`. Async driver suffixes (`sqlite+aiosqlite`) are accepted
/// and treated as plain SQLite; any non-SQLite scheme is rejected.
pub fn resolve_database_path(
    url: Option<&str>,
    exists: impl Fn(&Path) -> bool,
) -> Result<DbLocation, ConfigError> {
    let url = url.map(str::trim).unwrap_or_default();
    if url.is_empty() {
        let legacy = Path::new(LEGACY_DB_FILE);
        if exists(legacy) {
            return Ok(DbLocation::File(legacy.to_path_buf()));
        }
        return Ok(DbLocation::File(PathBuf::from(DEV_DB_FILE)));
    }
    if url == ":memory:" {
        return Ok(DbLocation::Memory);
    }

    let Some((scheme, rest)) = url.split_once("://") else {
        return Ok(DbLocation::File(PathBuf::from(url)));
    };
    let driver = scheme.split('+').next().unwrap_or(scheme);
    if !driver.eq_ignore_ascii_case("sqlite") {
        return Err(ConfigError::UnsupportedDatabase(scheme.to_string()));
    }

    let rest = rest.split('?').next().unwrap_or_default();
    let path = rest.strip_prefix('/').unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        Ok(DbLocation::Memory)
    } else {
        Ok(DbLocation::File(PathBuf::from(path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_production_launch() {
        let s = Settings::default();
        assert_eq!(s.app_name, "POS Lv2 API");
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.port, 8000);
        assert_eq!(s.server.workers, 4);
        assert_eq!(s.allowed_origins, vec!["http://localhost:3000"]);
    }

    #[test]
    fn unset_url_prefers_existing_legacy_file() {
        let loc = resolve_database_path(None, |p| p == Path::new("./serendigo.db")).unwrap();
        assert_eq!(loc, DbLocation::File(PathBuf::from("./serendigo.db")));

        let loc = resolve_database_path(Some("  "), |_| false).unwrap();
        assert_eq!(loc, DbLocation::File(PathBuf::from("./dev.db")));
    }

    #[test]
    fn sqlite_urls_map_to_paths() {
        let none = |_: &Path| false;
        assert_eq!(
            resolve_database_path(Some("sqlite:///./pos.db"), none).unwrap(),
            DbLocation::File(PathBuf::from("./pos.db"))
        );
        assert_eq!(
            resolve_database_path(Some("sqlite+aiosqlite:///./pos.db"), none).unwrap(),
            DbLocation::File(PathBuf::from("./pos.db"))
        );
        assert_eq!(
            resolve_database_path(Some("sqlite:////var/lib/pos.db"), none).unwrap(),
            DbLocation::File(PathBuf::from("/var/lib/pos.db"))
        );
        assert_eq!(
            resolve_database_path(Some("sqlite://"), none).unwrap(),
            DbLocation::Memory
        );
        assert_eq!(
            resolve_database_path(Some("data/pos.db"), none).unwrap(),
            DbLocation::File(PathBuf::from("data/pos.db"))
        );
    }

    #[test]
    fn non_sqlite_url_is_rejected() {
        let err = resolve_database_path(Some("mysql+pymysql://u:p@db:3306/pos"), |_| false)
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedDatabase(s) if s == "mysql+pymysql"));
    }

    #[test]
    fn csv_drops_blank_entries() {
        assert_eq!(
            split_csv(" http://a.example , ,http://b.example,"),
            vec!["http://a.example", "http://b.example"]
        );
        assert!(split_csv("").is_empty());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut s = Settings::default();
        s.apply_env(env(&[
            ("ALLOWED_ORIGINS", "https://pos.example,https://admin.example"),
            ("POS_HOST", "127.0.0.1"),
            ("POS_PORT", "9000"),
            ("WEB_CONCURRENCY", "2"),
            ("DATABASE_URL", "sqlite:///./x.db"),
        ]))
        .unwrap();
        assert_eq!(s.allowed_origins.len(), 2);
        assert_eq!(s.server.host, "127.0.0.1");
        assert_eq!(s.server.port, 9000);
        assert_eq!(s.server.workers, 2);
        assert_eq!(s.database.url.as_deref(), Some("sqlite:///./x.db"));
    }

    #[test]
    fn blank_allowed_origins_clears_the_list() {
        let mut s = Settings::default();
        assert!(!s.allowed_origins.is_empty());
        s.apply_env(env(&[("ALLOWED_ORIGINS", ""), ("POS_HOST", "  ")]))
            .unwrap();
        assert!(s.allowed_origins.is_empty());
        assert_eq!(s.server.host, Settings::default().server.host);
    }

    #[test]
    fn pos_workers_wins_over_alias() {
        let mut s = Settings::default();
        s.apply_env(env(&[("POS_WORKERS", "8"), ("WEB_CONCURRENCY", "2")]))
            .unwrap();
        assert_eq!(s.server.workers, 8);
    }

    #[test]
    fn invalid_numbers_are_errors() {
        let mut s = Settings::default();
        assert!(s.apply_env(env(&[("POS_PORT", "eighty")])).is_err());
        let mut s = Settings::default();
        assert!(s.apply_env(env(&[("POS_WORKERS", "0")])).is_err());
    }

    #[test]
    fn parses_toml_sections() {
        let s: Settings = toml::from_str(
            r#"
            app_name = "Store 30"
            allowed_origins = ["https://pos.example"]

            [database]
            url = "sqlite:///./store.db"

            [server]
            port = 8080
            "#,
        )
        .unwrap();
        assert_eq!(s.app_name, "Store 30");
        assert_eq!(s.server.port, 8080);
        assert_eq!(s.server.host, "0.0.0.0");
        assert_eq!(s.server.workers, 4);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(s.server.port, 8000);
    }
}
