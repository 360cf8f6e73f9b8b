//! Error taxonomy for the link-to-card pipeline.

use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, CardError>;

/// Failures raised while resolving a link into a card.
#[derive(Debug, Error)]
pub enum CardError {
    /// Network failure, timeout or non-success HTTP status.
    #[error("failed to fetch {url}: {message}")]
    Fetch { url: String, message: String },

    /// Malformed image or JSON payload.
    #[error("failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// The initial connection could not be established at all.
    #[error("{url} is unreachable: {message}")]
    Unreachable { url: String, message: String },

    /// A credential a renderer requires is missing.
    #[error("missing configuration: {0}")]
    Configuration(String),

    /// A structured string did not follow its expected format.
    #[error("malformed {what}: {input:?}")]
    Format { what: String, input: String },
}

impl CardError {
    #[must_use]
    pub fn fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Fetch {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            what: what.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unreachable(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unreachable {
            url: url.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    #[must_use]
    pub fn format(what: impl Into<String>, input: impl Into<String>) -> Self {
        Self::Format {
            what: what.into(),
            input: input.into(),
        }
    }

    /// Maps a transport failure on an ordinary upstream call.
    #[must_use]
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        Self::fetch(url, err.to_string())
    }

    /// Maps a transport failure on the first request made for a link.
    ///
    /// Connection, timeout and request-builder failures mean the resource
    /// could not be reached at all.
    #[must_use]
    pub fn from_initial_request(url: &str, err: &reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() || err.is_builder() {
            Self::unreachable(url, err.to_string())
        } else {
            Self::from_reqwest(url, err)
        }
    }

    /// Returns whether a missing credential caused this error.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns whether the resource could not be reached.
    #[must_use]
    pub const fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_is_distinguishable() {
        let err = CardError::configuration("YOUTUBE_API_KEY is not set");
        assert!(err.is_configuration());
        assert!(!err.is_unreachable());
        assert_eq!(
            err.to_string(),
            "missing configuration: YOUTUBE_API_KEY is not set"
        );
    }

    #[test]
    fn test_format_message_quotes_input() {
        let err = CardError::format("duration", "1H2M");
        assert_eq!(err.to_string(), "malformed duration: \"1H2M\"");
    }
}
