//! Client configuration.
//!
//! Values are resolved in layers, later layers winning: built-in defaults, an
//! optional YAML file, the `JARVIS_API_URL` and `JARVIS_WS_URL` environment
//! variables, and finally command-line flags (see `chat::ChatArgs`).
//!
//! ```yaml
//! base_url: http://jarvis.local:8000/api/
//! timeout_secs: 30
//! reply_timeout_secs: 300
//! think_open: "<reasoning>"
//! think_close: "</reasoning>"
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::thought::{DEFAULT_CLOSE_MARKER, DEFAULT_OPEN_MARKER, ThoughtParser};

/// Default REST root of the backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/";

/// Environment variable overriding the REST root.
pub const API_URL_ENV: &str = "JARVIS_API_URL";

/// Environment variable overriding the websocket root.
pub const WS_URL_ENV: &str = "JARVIS_WS_URL";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_TURN_IDLE: Duration = Duration::from_secs(3);

/// Path of the chat channel below the REST root.
const CHAT_SOCKET_PATH: &str = "chat/ws/";

/// Resolved configuration for talking to a Jarvis backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// REST root; always ends in `/`.
    pub base_url: Url,

    /// Websocket root, when it is not derived from `base_url`.
    pub ws_url: Option<Url>,

    /// Per-request timeout for REST calls.
    pub timeout: Duration,

    /// Limit on the websocket handshake.
    pub connect_timeout: Duration,

    /// How long to wait for the first fragment of a reply.
    pub reply_timeout: Duration,

    /// Silence after which a streaming reply is treated as settled.
    pub turn_idle: Duration,

    /// Marker opening a reasoning span.
    pub think_open: String,

    /// Marker closing a reasoning span.
    pub think_close: String,
}

/// The on-disk shape of a configuration file.  Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// REST root.
    pub base_url: Option<String>,
    /// Websocket root.
    pub ws_url: Option<String>,
    /// REST timeout in seconds.
    pub timeout_secs: Option<f64>,
    /// Handshake timeout in seconds.
    pub connect_timeout_secs: Option<f64>,
    /// First-fragment timeout in seconds.
    pub reply_timeout_secs: Option<f64>,
    /// Reply settle time in seconds.
    pub turn_idle_secs: Option<f64>,
    /// Opening reasoning marker.
    pub think_open: Option<String>,
    /// Closing reasoning marker.
    pub think_close: Option<String>,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
            turn_idle: DEFAULT_TURN_IDLE,
            think_open: DEFAULT_OPEN_MARKER.to_string(),
            think_close: DEFAULT_CLOSE_MARKER.to_string(),
        }
    }

    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::new(),
        };
        config.with_env()
    }

    /// Reads a YAML configuration file over the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|err| {
            Error::io(format!("could not read {}", path.display()), err)
        })?;
        Self::from_yaml(&yaml)
    }

    /// Parses YAML configuration over the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: ConfigFile = serde_yaml::from_str(yaml)?;
        Self::new().merge(file)
    }

    /// Overlays the values present in `file`.
    pub fn merge(mut self, file: ConfigFile) -> Result<Self> {
        if let Some(base_url) = file.base_url {
            self.base_url = parse_root(&base_url)?;
        }
        if let Some(ws_url) = file.ws_url {
            self.ws_url = Some(parse_root(&ws_url)?);
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout = seconds("timeout_secs", secs)?;
        }
        if let Some(secs) = file.connect_timeout_secs {
            self.connect_timeout = seconds("connect_timeout_secs", secs)?;
        }
        if let Some(secs) = file.reply_timeout_secs {
            self.reply_timeout = seconds("reply_timeout_secs", secs)?;
        }
        if let Some(secs) = file.turn_idle_secs {
            self.turn_idle = seconds("turn_idle_secs", secs)?;
        }
        if let Some(open) = file.think_open {
            self.think_open = open;
        }
        if let Some(close) = file.think_close {
            self.think_close = close;
        }
        self.thought_parser()?;
        Ok(self)
    }

    /// Applies `JARVIS_API_URL` and `JARVIS_WS_URL` from the process environment.
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Applies environment overrides using `lookup` to read variables.
    pub fn with_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(base_url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.base_url = parse_root(&base_url)?;
        }
        if let Some(ws_url) = lookup(WS_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.ws_url = Some(parse_root(&ws_url)?);
        }
        Ok(self)
    }

    /// Sets the REST root.
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self> {
        self.base_url = parse_root(base_url)?;
        Ok(self)
    }

    /// Sets the websocket root.
    pub fn with_ws_url(mut self, ws_url: &str) -> Result<Self> {
        self.ws_url = Some(parse_root(ws_url)?);
        Ok(self)
    }

    /// Sets the REST timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the websocket handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long to wait for a reply to start.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    /// Sets how long a reply must be silent before it is considered settled.
    pub fn with_turn_idle(mut self, idle: Duration) -> Self {
        self.turn_idle = idle;
        self
    }

    /// Sets the reasoning markers.
    pub fn with_think_markers(mut self, open: impl Into<String>, close: impl Into<String>) -> Self {
        self.think_open = open.into();
        self.think_close = close.into();
        self
    }

    /// The root below which session channels live.
    ///
    /// Without an explicit `ws_url` this is `base_url` with `http` swapped for
    /// `ws` (or `https` for `wss`) and `chat/ws/` appended.
    pub fn websocket_root(&self) -> Result<Url> {
        if let Some(ws_url) = &self.ws_url {
            return Ok(ws_url.clone());
        }
        let mut root = self.base_url.join(CHAT_SOCKET_PATH)?;
        let scheme = match root.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" | "wss" => return Ok(root),
            other => {
                return Err(Error::config(format!(
                    "cannot derive a websocket address from a {other} URL"
                )));
            }
        };
        root.set_scheme(scheme)
            .map_err(|()| Error::config(format!("cannot switch {root} to {scheme}")))?;
        Ok(root)
    }

    /// Resolves `path` against the REST root.
    pub fn api_url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// A parser for the configured reasoning markers.
    pub fn thought_parser(&self) -> Result<ThoughtParser> {
        ThoughtParser::new(self.think_open.clone(), self.think_close.clone())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn default_base_url() -> Url {
    match Url::parse(DEFAULT_BASE_URL) {
        Ok(url) => url,
        Err(_) => unreachable!("default base URL is valid"),
    }
}

/// Parses a root URL, making sure relative joins land below it.
fn parse_root(value: &str) -> Result<Url> {
    let mut url = Url::parse(value.trim())?;
    if url.cannot_be_a_base() {
        return Err(Error::config(format!("{value} cannot be used as a base URL")));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn seconds(key: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .ok()
        .filter(|d| !d.is_zero())
        .ok_or_else(|| Error::config(format!("{key} must be a positive number of seconds")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ClientConfig::new();
        assert_eq!(config.base_url.as_str(), "http://localhost:8000/api/");
        assert!(config.ws_url.is_none());
        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.reply_timeout, Duration::from_secs(120));
        assert_eq!(config.turn_idle, Duration::from_secs(3));
        assert_eq!(config.think_open, "<think>");
        assert_eq!(config.think_close, "</think>");
    }

    #[test]
    fn websocket_root_is_derived_from_base_url() {
        let config = ClientConfig::new();
        assert_eq!(
            config.websocket_root().unwrap().as_str(),
            "ws://localhost:8000/api/chat/ws/"
        );

        let secure = ClientConfig::new()
            .with_base_url("https://jarvis.example.com/api")
            .unwrap();
        assert_eq!(
            secure.websocket_root().unwrap().as_str(),
            "wss://jarvis.example.com/api/chat/ws/"
        );
    }

    #[test]
    fn explicit_ws_url_wins() {
        let config = ClientConfig::new()
            .with_ws_url("ws://10.0.0.2:9000/socket")
            .unwrap();
        assert_eq!(
            config.websocket_root().unwrap().as_str(),
            "ws://10.0.0.2:9000/socket/"
        );
    }

    #[test]
    fn api_url_joins_below_root() {
        let config = ClientConfig::new();
        assert_eq!(
            config.api_url("/chat/sessions").unwrap().as_str(),
            "http://localhost:8000/api/chat/sessions"
        );
    }

    #[test]
    fn yaml_overrides_defaults() {
        let config = ClientConfig::from_yaml(
            "base_url: http://jarvis.local:8080/api\n\
             timeout_secs: 5\n\
             turn_idle_secs: 0.5\n\
             think_open: \"<reasoning>\"\n\
             think_close: \"</reasoning>\"\n",
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "http://jarvis.local:8080/api/");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.turn_idle, Duration::from_millis(500));
        assert_eq!(config.reply_timeout, Duration::from_secs(120));
        let parser = config.thought_parser().unwrap();
        assert_eq!(parser.open_marker(), "<reasoning>");
    }

    #[test]
    fn yaml_rejects_unknown_keys_and_bad_values() {
        assert!(ClientConfig::from_yaml("model: gpt\n").is_err());
        assert!(ClientConfig::from_yaml("timeout_secs: -1\n").unwrap_err().is_config());
        assert!(ClientConfig::from_yaml("think_open: \"\"\n").unwrap_err().is_config());
    }

    #[test]
    fn environment_overrides_file() {
        let config = ClientConfig::from_yaml("base_url: http://file:1/api/\n")
            .unwrap()
            .with_env_from(|key| match key {
                API_URL_ENV => Some("http://env:2/api".to_string()),
                WS_URL_ENV => Some(String::new()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.base_url.as_str(), "http://env:2/api/");
        assert!(config.ws_url.is_none());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ClientConfig::from_file("/nonexistent/jarvis.yaml").unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
