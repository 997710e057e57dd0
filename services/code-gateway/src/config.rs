//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file is
//! optional; a bare environment (`GEMINI_API_KEYS`, `PORT`) is enough to run.
//! API keys are only ever read from the environment, never from the TOML, so
//! the file can be committed without leaking secrets.

use common::Secret;
use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

/// Comma-separated list of API keys.
pub const KEYS_VAR: &str = "GEMINI_API_KEYS";

/// Single-key variable accepted when `GEMINI_API_KEYS` is unset.
pub const LEGACY_KEY_VAR: &str = "GEMINI_API_KEY";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub retry: RetryConfig,
    pub log: LogConfig,
    #[serde(skip)]
    pub api_keys: Vec<Secret<String>>,
}

/// HTTP listener settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            max_connections: 1000,
        }
    }
}

/// Backend settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: gemini_client::DEFAULT_BASE_URL.to_string(),
            model: gemini_client::DEFAULT_MODEL.to_string(),
            timeout_secs: 60,
        }
    }
}

/// Retry loop tuning
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per configured key; the ceiling is this times the pool size.
    pub attempts_per_key: usize,
    /// Flat delay before retrying after an overloaded response.
    pub overload_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts_per_key: 2,
            overload_backoff_ms: 1000,
        }
    }
}

/// Journal sink settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Append-only JSON-lines file; `None` keeps records on the console only.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("logs/gateway.log")),
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file, then overlay the
    /// process environment and validate.
    pub fn load(path: Option<&Path>) -> common::Result<Self> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)?;
                toml::from_str(&contents)?
            }
            None => Config::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment values read through `lookup`.
    ///
    /// Key resolution order:
    /// 1. GEMINI_API_KEYS (comma-separated)
    /// 2. GEMINI_API_KEY (single key)
    pub fn apply_env<F>(&mut self, lookup: F) -> common::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_keys = lookup(KEYS_VAR)
            .filter(|v| !v.trim().is_empty())
            .or_else(|| lookup(LEGACY_KEY_VAR));
        if let Some(raw) = raw_keys {
            self.api_keys = parse_keys(&raw);
        }

        if let Some(port) = lookup("PORT").filter(|v| !v.trim().is_empty()) {
            self.server.port = port.trim().parse().map_err(|e| common::Error::Env {
                var: "PORT".into(),
                reason: format!("{e}: {port:?}"),
            })?;
        }

        if let Some(model) = lookup("GEMINI_MODEL").filter(|v| !v.trim().is_empty()) {
            self.gemini.model = model.trim().to_string();
        }

        if let Some(base_url) = lookup("GEMINI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.gemini.base_url = base_url.trim().to_string();
        }

        if let Some(file) = lookup("LOG_FILE") {
            let file = file.trim();
            self.log.file = if file.is_empty() {
                None
            } else {
                Some(PathBuf::from(file))
            };
        }

        Ok(())
    }

    fn validate(&self) -> common::Result<()> {
        if !self.gemini.base_url.starts_with("http://")
            && !self.gemini.base_url.starts_with("https://")
        {
            return Err(common::Error::Config(format!(
                "gemini.base_url must start with http:// or https://, got: {}",
                self.gemini.base_url
            )));
        }

        if self.gemini.timeout_secs == 0 {
            return Err(common::Error::Config(
                "gemini.timeout_secs must be greater than 0".into(),
            ));
        }

        if self.server.max_connections == 0 {
            return Err(common::Error::Config(
                "server.max_connections must be greater than 0".into(),
            ));
        }

        if self.retry.attempts_per_key == 0 {
            return Err(common::Error::Config(
                "retry.attempts_per_key must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.server.host, self.server.port)
    }

    /// Resolve the config file path from CLI arg, CONFIG_PATH env var, or the
    /// default file name. The default is only used if the file exists.
    pub fn resolve_path(cli_path: Option<&str>) -> Option<PathBuf> {
        if let Some(p) = cli_path {
            return Some(PathBuf::from(p));
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return Some(PathBuf::from(p));
        }
        let default = PathBuf::from("code-gateway.toml");
        default.exists().then_some(default)
    }
}

/// Split a comma-separated key list, trimming entries and dropping empties.
pub fn parse_keys(raw: &str) -> Vec<Secret<String>> {
    raw.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(Secret::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mutex to serialize tests that mutate environment variables, preventing
    /// data races when tests run in parallel.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// SAFETY: Callers must hold ENV_MUTEX to prevent concurrent env mutation.
    unsafe fn set_env(key: &str, val: &str) {
        unsafe { std::env::set_var(key, val) };
    }

    unsafe fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) };
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn exposed(keys: &[Secret<String>]) -> Vec<&str> {
        keys.iter().map(|k| k.expose().as_str()).collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.retry.attempts_per_key, 2);
        assert_eq!(config.retry.overload_backoff_ms, 1000);
        assert_eq!(config.gemini.base_url, gemini_client::DEFAULT_BASE_URL);
        assert_eq!(config.log.file, Some(PathBuf::from("logs/gateway.log")));
        assert!(config.api_keys.is_empty());
        assert_eq!(config.listen_addr().to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn parse_keys_trims_and_drops_empty_entries() {
        let keys = parse_keys(" k1, k2 ,,k3 , ");
        assert_eq!(exposed(&keys), vec!["k1", "k2", "k3"]);
    }

    #[test]
    fn keys_from_plural_variable() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[(KEYS_VAR, "a,b"), (LEGACY_KEY_VAR, "legacy")]))
            .unwrap();
        assert_eq!(exposed(&config.api_keys), vec!["a", "b"]);
    }

    #[test]
    fn keys_fall_back_to_singular_variable() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[(LEGACY_KEY_VAR, "legacy")]))
            .unwrap();
        assert_eq!(exposed(&config.api_keys), vec!["legacy"]);
    }

    #[test]
    fn blank_plural_variable_falls_back_to_singular() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[(KEYS_VAR, "  "), (LEGACY_KEY_VAR, "legacy")]))
            .unwrap();
        assert_eq!(exposed(&config.api_keys), vec!["legacy"]);
    }

    #[test]
    fn no_key_variables_leaves_pool_empty() {
        let mut config = Config::default();
        config.apply_env(env_of(&[])).unwrap();
        assert!(config.api_keys.is_empty());
    }

    #[test]
    fn port_override() {
        let mut config = Config::default();
        config.apply_env(env_of(&[("PORT", "8088")])).unwrap();
        assert_eq!(config.server.port, 8088);
    }

    #[test]
    fn blank_port_keeps_default() {
        for blank in ["", "   "] {
            let mut config = Config::default();
            config.apply_env(env_of(&[("PORT", blank)])).unwrap();
            assert_eq!(config.server.port, 3000, "PORT={blank:?}");
        }
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut config = Config::default();
        let err = config
            .apply_env(env_of(&[("PORT", "eighty")]))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("PORT"), "got: {msg}");
        assert!(msg.contains("eighty"), "got: {msg}");
    }

    #[test]
    fn empty_log_file_disables_file_sink() {
        let mut config = Config::default();
        config.apply_env(env_of(&[("LOG_FILE", "")])).unwrap();
        assert!(config.log.file.is_none());

        config
            .apply_env(env_of(&[("LOG_FILE", "/var/log/gw.log")]))
            .unwrap();
        assert_eq!(config.log.file, Some(PathBuf::from("/var/log/gw.log")));
    }

    #[test]
    fn model_and_base_url_overrides() {
        let mut config = Config::default();
        config
            .apply_env(env_of(&[
                ("GEMINI_MODEL", "gemini-1.5-pro"),
                ("GEMINI_BASE_URL", "http://127.0.0.1:9999"),
            ]))
            .unwrap();
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert_eq!(config.gemini.base_url, "http://127.0.0.1:9999");
    }

    #[test]
    fn toml_file_sets_values_and_env_wins() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("code-gateway.toml");
        std::fs::write(
            &path,
            r#"
[server]
host = "127.0.0.1"
port = 4000
max_connections = 50

[gemini]
model = "gemini-from-file"
timeout_secs = 15

[retry]
overload_backoff_ms = 250
"#,
        )
        .unwrap();

        unsafe { set_env("PORT", "4100") };
        unsafe { set_env(KEYS_VAR, "file-test-key") };
        let config = Config::load(Some(&path)).unwrap();
        unsafe { remove_env("PORT") };
        unsafe { remove_env(KEYS_VAR) };

        assert_eq!(config.server.port, 4100, "PORT env must override file");
        assert_eq!(config.server.max_connections, 50);
        assert_eq!(config.gemini.model, "gemini-from-file");
        assert_eq!(config.gemini.timeout_secs, 15);
        assert_eq!(config.retry.overload_backoff_ms, 250);
        assert_eq!(config.retry.attempts_per_key, 2, "unset fields keep defaults");
        assert_eq!(exposed(&config.api_keys), vec!["file-test-key"]);
        assert_eq!(config.listen_addr().to_string(), "127.0.0.1:4100");
    }

    #[test]
    fn load_missing_file_is_error() {
        let result = Config::load(Some(Path::new("/nonexistent/code-gateway.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn load_invalid_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{{{ toml").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn invalid_base_url_rejected() {
        let mut config = Config::default();
        config.gemini.base_url = "generativelanguage.googleapis.com".into();
        let err = config.validate().unwrap_err();
        assert!(
            err.to_string().contains("base_url must start with http"),
            "got: {err}"
        );
    }

    #[test]
    fn zero_values_rejected() {
        let mut config = Config::default();
        config.gemini.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.retry.attempts_per_key = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_path_cli_overrides_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/should-lose.toml") };
        let path = Config::resolve_path(Some("/cli/wins.toml"));
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, Some(PathBuf::from("/cli/wins.toml")));
    }

    #[test]
    fn resolve_path_env_var() {
        let _lock = ENV_MUTEX.lock().unwrap();
        unsafe { set_env("CONFIG_PATH", "/env/path.toml") };
        let path = Config::resolve_path(None);
        unsafe { remove_env("CONFIG_PATH") };
        assert_eq!(path, Some(PathBuf::from("/env/path.toml")));
    }
}
