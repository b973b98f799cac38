//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.linebridge/config.json`) and environment.
//! Environment variables win over the file so deployments can keep secrets out of it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Yelp AI chat endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.yelp.com/ai/chat/v2";

/// LINE Messaging API base URL.
pub const DEFAULT_LINE_API_BASE: &str = "https://api.line.me";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// LINE channel credentials.
    #[serde(default)]
    pub line: LineConfig,

    /// Yelp AI search settings.
    #[serde(default)]
    pub search: SearchConfig,

    /// Append-only traffic log locations.
    #[serde(default)]
    pub logs: LogsConfig,
}

/// Listener bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port for the webhook endpoint (default 8000). Overridden by PORT env.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address (default "0.0.0.0").
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_port() -> u16 {
    8000
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

/// LINE channel config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineConfig {
    /// Channel secret used for X-Line-Signature. Overridden by LINE_CHANNEL_SECRET env.
    pub channel_secret: Option<String>,
    /// Channel access token for the reply API. Overridden by LINE_CHANNEL_ACCESS_TOKEN env.
    pub channel_access_token: Option<String>,
    /// Messaging API base URL (tests point this at a local fake).
    #[serde(default = "default_line_api_base")]
    pub api_base: String,
}

fn default_line_api_base() -> String {
    DEFAULT_LINE_API_BASE.to_string()
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            channel_secret: None,
            channel_access_token: None,
            api_base: default_line_api_base(),
        }
    }
}

/// Yelp AI search config. Latitude and longitude are kept as strings so that the
/// env and file forms share one validation path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchConfig {
    /// Bearer token. Overridden by YELP_API_KEY env. When absent, /yelp replies "not configured".
    pub api_key: Option<String>,
    /// e.g. "en_US". Overridden by YELP_LOCALE env.
    pub locale: Option<String>,
    /// Overridden by YELP_LATITUDE env.
    pub latitude: Option<String>,
    /// Overridden by YELP_LONGITUDE env.
    pub longitude: Option<String>,
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds (default 10).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_search_endpoint() -> String {
    DEFAULT_SEARCH_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            locale: None,
            latitude: None,
            longitude: None,
            endpoint: default_search_endpoint(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where the two append-only logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsConfig {
    /// Directory for both log files (default: working directory).
    #[serde(default = "default_logs_dir")]
    pub dir: PathBuf,
    /// Every inbound webhook body.
    #[serde(default = "default_events_file")]
    pub events_file: String,
    /// Every full search API response.
    #[serde(default = "default_search_file")]
    pub search_file: String,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_events_file() -> String {
    "events.log".to_string()
}

fn default_search_file() -> String {
    "yelp.log".to_string()
}

impl Default for LogsConfig {
    fn default() -> Self {
        Self {
            dir: default_logs_dir(),
            events_file: default_events_file(),
            search_file: default_search_file(),
        }
    }
}

impl LogsConfig {
    pub fn events_path(&self) -> PathBuf {
        self.dir.join(&self.events_file)
    }

    pub fn search_path(&self) -> PathBuf {
        self.dir.join(&self.search_file)
    }
}

/// Read a non-blank env var, trimmed.
fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Env value wins; otherwise the trimmed, non-blank config value.
fn env_or(key: &str, value: Option<&String>) -> Option<String> {
    env_non_empty(key).or_else(|| {
        value
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Apply environment overrides (LINE_*, YELP_*, PORT) on top of a loaded config.
pub fn apply_env_overrides(config: &mut Config) {
    config.line.channel_secret = env_or("LINE_CHANNEL_SECRET", config.line.channel_secret.as_ref());
    config.line.channel_access_token = env_or(
        "LINE_CHANNEL_ACCESS_TOKEN",
        config.line.channel_access_token.as_ref(),
    );
    config.search.api_key = env_or("YELP_API_KEY", config.search.api_key.as_ref());
    config.search.locale = env_or("YELP_LOCALE", config.search.locale.as_ref());
    config.search.latitude = env_or("YELP_LATITUDE", config.search.latitude.as_ref());
    config.search.longitude = env_or("YELP_LONGITUDE", config.search.longitude.as_ref());
    if let Some(p) = env_non_empty("PORT") {
        match p.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => log::warn!("ignoring invalid PORT value: {}", p),
        }
    }
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("LINEBRIDGE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".linebridge").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the given path (or the default). Missing file => default config.
/// Environment overrides are applied afterwards. Returns the config and the path used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let mut config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    apply_env_overrides(&mut config);
    Ok((config, path))
}

/// Write a default config file if none exists. Returns true when a file was created.
pub fn write_default_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(path, json)
        .with_context(|| format!("writing default config to {}", path.display()))?;
    log::info!("created default config at {}", path.display());
    Ok(true)
}

/// Validated startup settings. Construction fails when the LINE credentials are missing.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bind: String,
    pub port: u16,
    pub channel_secret: String,
    pub channel_access_token: String,
    pub line_api_base: String,
    pub search: SearchSettings,
    pub events_log: PathBuf,
    pub search_log: PathBuf,
}

/// Search settings after coordinate validation.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSettings {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub timeout: Duration,
    pub locale: Option<String>,
    /// Present only when both latitude and longitude parsed and are in range.
    pub coordinates: Option<(f64, f64)>,
}

impl SearchSettings {
    pub fn from_config(search: &SearchConfig) -> Self {
        let latitude = parse_coordinate("latitude", search.latitude.as_deref(), 90.0);
        let longitude = parse_coordinate("longitude", search.longitude.as_deref(), 180.0);
        let coordinates = match (latitude, longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            (Some(_), None) | (None, Some(_)) => {
                log::warn!("only one of latitude/longitude is usable; location context disabled");
                None
            }
            (None, None) => None,
        };
        Self {
            api_key: search
                .api_key
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            endpoint: search.endpoint.trim().to_string(),
            timeout: Duration::from_secs(search.timeout_secs.max(1)),
            locale: search
                .locale
                .as_ref()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            coordinates,
        }
    }
}

/// Parse a coordinate string; must be finite and within ±limit.
fn parse_coordinate(name: &str, raw: Option<&str>, limit: f64) -> Option<f64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.abs() <= limit => Some(v),
        _ => {
            log::warn!("ignoring invalid {}: {}", name, raw);
            None
        }
    }
}

impl Settings {
    /// Validate a loaded config. Missing channel secret or access token is fatal.
    pub fn resolve(config: &Config) -> Result<Self> {
        let channel_secret = config
            .line
            .channel_secret
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("LINE_CHANNEL_SECRET and LINE_CHANNEL_ACCESS_TOKEN must be set")?;
        let channel_access_token = config
            .line
            .channel_access_token
            .clone()
            .filter(|s| !s.trim().is_empty())
            .context("LINE_CHANNEL_SECRET and LINE_CHANNEL_ACCESS_TOKEN must be set")?;
        let search = SearchSettings::from_config(&config.search);
        if search.api_key.is_none() {
            log::warn!("YELP_API_KEY not set; /yelp queries will reply with a not-configured notice");
        }
        Ok(Self {
            bind: config.server.bind.trim().to_string(),
            port: config.server.port,
            channel_secret,
            channel_access_token,
            line_api_base: config.line.api_base.trim_end_matches('/').to_string(),
            search,
            events_log: config.logs.events_path(),
            search_log: config.logs.search_path(),
        })
    }
}

/// Mask a secret for display: first 4 + "***" + last 4 chars; short values are fully masked.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 11 {
        return "***".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}***{}", head, tail)
}
