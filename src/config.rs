//! Process-wide configuration, read once from the environment at startup.

use std::time::Duration;

use tracing::warn;

/// Default per-call timeout applied to every upstream request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Base URLs of the upstream services the renderers talk to.
#[derive(Debug, Clone)]
pub struct Endpoints {
    /// YouTube Data API root, e.g. `https://www.googleapis.com`
    pub youtube_api: String,
    /// Twitter API root, e.g. `https://api.twitter.com`
    pub twitter_api: String,
    /// Steam store root, serving both the details API and store pages
    pub steam_store: String,
    /// Steam community root, serving workshop item pages
    pub steam_community: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            youtube_api: "https://www.googleapis.com".to_string(),
            twitter_api: "https://api.twitter.com".to_string(),
            steam_store: "https://store.steampowered.com".to_string(),
            steam_community: "https://steamcommunity.com".to_string(),
        }
    }
}

/// Static configuration shared read-only by every component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Key for the YouTube Data API v3. Video cards are disabled without it.
    pub youtube_api_key: Option<String>,
    /// Read-only bearer token for the Twitter API.
    pub twitter_bearer_token: Option<String>,
    /// Per-call timeout for upstream requests.
    pub http_timeout: Duration,
    /// Verbose logging.
    pub debug: bool,
    pub endpoints: Endpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            youtube_api_key: None,
            twitter_bearer_token: None,
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            debug: false,
            endpoints: Endpoints::default(),
        }
    }
}

impl Config {
    /// Builds the configuration from environment variables.
    ///
    /// - `YOUTUBE_API_KEY`: optional
    /// - `TWITTER_BEARER_TOKEN`: optional, tweet cards fall back without it
    /// - `CARD_HTTP_TIMEOUT_SECS`: optional, defaults to 10
    /// - `DEBUG`: anything other than `0` enables debug logging
    #[must_use]
    pub fn from_env() -> Self {
        let youtube_api_key = non_empty_var("YOUTUBE_API_KEY");
        let twitter_bearer_token = non_empty_var("TWITTER_BEARER_TOKEN");

        let http_timeout = match std::env::var("CARD_HTTP_TIMEOUT_SECS") {
            Ok(raw) => parse_timeout(&raw).unwrap_or_else(|| {
                warn!(
                    "Ignoring invalid CARD_HTTP_TIMEOUT_SECS={:?}, using {}s",
                    raw, DEFAULT_TIMEOUT_SECS
                );
                Duration::from_secs(DEFAULT_TIMEOUT_SECS)
            }),
            Err(_) => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let debug = debug_from_env();

        Self {
            youtube_api_key,
            twitter_bearer_token,
            http_timeout,
            debug,
            endpoints: Endpoints::default(),
        }
    }

    /// Emits warnings for renderers that will be unavailable.
    pub fn warn_missing_credentials(&self) {
        if self.youtube_api_key.is_none() {
            warn!("YOUTUBE_API_KEY not set - YouTube cards will fall back to page metadata");
        }
        if self.twitter_bearer_token.is_none() {
            warn!("TWITTER_BEARER_TOKEN not set - tweet cards will fall back to page metadata");
        }
    }
}

/// Whether `DEBUG` asks for verbose logging. Readable before logging starts.
#[must_use]
pub fn debug_from_env() -> bool {
    std::env::var("DEBUG").is_ok_and(|v| v != "0")
}

/// Whole seconds, at least one. A zero timeout would fail every request.
fn parse_timeout(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
