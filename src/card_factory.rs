use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{CardError, Result};
use crate::metadata::MetadataExtractor;
use crate::models::LinkMetadata;
use crate::renderers::generic::{
    render_direct_image, render_failure, render_generic, render_unhandled_mime,
    video_thumbnail_url,
};
use crate::renderers::{SteamRenderer, TwitterRenderer, YouTubeRenderer};
use crate::thumbnails::{DIRECT_IMAGE_SIZE, ImageFetcher};
use crate::traits::SiteRenderer;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";

/// What a link points at, judged by its `Content-Type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    Image,
    Video,
    Html,
    /// Anything else; carries the MIME type for echoing back
    Other(String),
}

impl ContentKind {
    /// Classifies by MIME prefix. A missing header is treated as HTML so the
    /// metadata path still gets a chance.
    #[must_use]
    pub fn from_mime(mime: Option<&str>) -> Self {
        let Some(mime) = mime.map(str::trim).filter(|m| !m.is_empty()) else {
            return Self::Html;
        };
        let lower = mime.to_ascii_lowercase();

        if lower.starts_with("image/") {
            Self::Image
        } else if lower.starts_with("video/") {
            Self::Video
        } else if lower.starts_with("text/html") {
            Self::Html
        } else {
            Self::Other(mime.to_string())
        }
    }
}

/// Builds the shared HTTP client with the configured per-call timeout.
///
/// # Errors
/// Returns [`CardError::Configuration`] if the TLS backend cannot start.
pub fn http_client(config: &Config) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(config.http_timeout)
        .build()
        .map_err(|e| CardError::configuration(format!("failed to build HTTP client: {e}")))
}

/// Turns URLs into cards.
///
/// Renderers are consulted in order and the first to claim a page renders
/// it, so the Twitter renderer is registered ahead of the `site` checks.
pub struct CardFactory {
    client: Client,
    images: ImageFetcher,
    extractor: MetadataExtractor,
    renderers: Vec<Box<dyn SiteRenderer>>,
}

impl CardFactory {
    /// Creates a factory with the built-in renderers.
    ///
    /// # Errors
    /// Fails only if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = http_client(config)?;
        let images = ImageFetcher::new(client.clone());
        let renderers = default_renderers(&client, &images, config);
        Ok(Self::with_renderers(client, renderers))
    }

    /// Creates a factory with an explicit renderer list.
    #[must_use]
    pub fn with_renderers(client: Client, renderers: Vec<Box<dyn SiteRenderer>>) -> Self {
        let images = ImageFetcher::new(client.clone());
        let extractor = MetadataExtractor::new(client.clone(), images.clone());
        Self {
            client,
            images,
            extractor,
            renderers,
        }
    }

    /// Resolves `url` into a card. Never fails: when nothing could be
    /// rendered the result is a short failure notice.
    pub async fn create_card(&self, url: &str) -> String {
        match self.try_create_card(url).await {
            Ok(card) => card,
            Err(e) => {
                warn!("Could not create a card for {}: {}", url, e);
                render_failure(url, &e)
            }
        }
    }

    /// Resolves `url` into a card, surfacing failures that happen before any
    /// metadata is available.
    ///
    /// # Errors
    /// [`CardError::Unreachable`] when the link cannot be reached, or the
    /// image fetch error for direct image links.
    pub async fn try_create_card(&self, url: &str) -> Result<String> {
        let kind = self.classify(url).await?;
        info!("Classified {} as {:?}", url, kind);

        match kind {
            ContentKind::Image => self.card_for_image(url).await,
            ContentKind::Video => Ok(self.card_for_video(url).await),
            ContentKind::Html => self.card_for_html(url).await,
            ContentKind::Other(mime) => Ok(render_unhandled_mime(&mime)),
        }
    }

    async fn classify(&self, url: &str) -> Result<ContentKind> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| CardError::from_initial_request(url, &e))?;

        if !response.status().is_success() {
            debug!("HEAD {} returned {}", url, response.status());
        }

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        Ok(ContentKind::from_mime(mime))
    }

    async fn card_for_image(&self, url: &str) -> Result<String> {
        let data_uri = self
            .images
            .fetch_as_data_uri(Some(url), DIRECT_IMAGE_SIZE, false)
            .await?
            .unwrap_or_default();
        Ok(render_direct_image(url, &data_uri))
    }

    async fn card_for_video(&self, url: &str) -> String {
        let Some(thumbnail_url) = video_thumbnail_url(url) else {
            debug!("No thumbnail convention for video {}", url);
            return String::new();
        };

        match self
            .images
            .fetch_as_data_uri(Some(&thumbnail_url), DIRECT_IMAGE_SIZE, false)
            .await
        {
            Ok(Some(data_uri)) => render_direct_image(url, &data_uri),
            Ok(None) => String::new(),
            Err(e) => {
                warn!("Video thumbnail {} unavailable: {}", thumbnail_url, e);
                String::new()
            }
        }
    }

    async fn card_for_html(&self, url: &str) -> Result<String> {
        let meta = self.extractor.extract(url).await?;
        Ok(self.render_with_fallback(&meta).await)
    }

    /// Dispatches `meta` to the first renderer that claims it.
    ///
    /// This is the single recovery boundary: any renderer error degrades to
    /// the generic card built from `meta`.
    pub async fn render_with_fallback(&self, meta: &LinkMetadata) -> String {
        let Some(renderer) = self.renderers.iter().find(|r| r.claims(meta)) else {
            debug!("No site renderer for {} (site {:?})", meta.url, meta.site);
            return render_generic(meta);
        };

        info!("Rendering {} with the {} renderer", meta.url, renderer.name());
        match renderer.render(meta).await {
            Ok(card) => card,
            Err(e) if e.is_configuration() => {
                error!(
                    "{} renderer is misconfigured, using generic card: {}",
                    renderer.name(),
                    e
                );
                render_generic(meta)
            }
            Err(e) => {
                warn!(
                    "{} renderer failed for {}, using generic card: {}",
                    renderer.name(),
                    meta.url,
                    e
                );
                render_generic(meta)
            }
        }
    }
}

/// The built-in renderers in dispatch priority order.
#[must_use]
pub fn default_renderers(
    client: &Client,
    images: &ImageFetcher,
    config: &Config,
) -> Vec<Box<dyn SiteRenderer>> {
    vec![
        Box::new(TwitterRenderer::new(client.clone(), images.clone(), config)),
        Box::new(YouTubeRenderer::new(client.clone(), config)),
        Box::new(SteamRenderer::new(client.clone(), images.clone(), config)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_classification() {
        assert_eq!(ContentKind::from_mime(Some("image/png")), ContentKind::Image);
        assert_eq!(ContentKind::from_mime(Some("Image/JPEG")), ContentKind::Image);
        assert_eq!(ContentKind::from_mime(Some("video/webm")), ContentKind::Video);
        assert_eq!(
            ContentKind::from_mime(Some("text/html; charset=utf-8")),
            ContentKind::Html
        );
        assert_eq!(
            ContentKind::from_mime(Some("application/pdf")),
            ContentKind::Other("application/pdf".to_string())
        );
        assert_eq!(ContentKind::from_mime(None), ContentKind::Html);
    }

    #[test]
    fn test_twitter_claims_before_site_checks() {
        let config = Config::default();
        let client = Client::new();
        let images = ImageFetcher::new(client.clone());
        let renderers = default_renderers(&client, &images, &config);

        // A tweet that advertises a misleading site tag
        let mut meta = LinkMetadata::empty("https://twitter.com/a/status/1");
        meta.site = "@youtube".to_string();

        let first = renderers.iter().find(|r| r.claims(&meta)).unwrap();
        assert_eq!(first.name(), "Twitter");
    }

    #[test]
    fn test_site_dispatch() {
        let config = Config::default();
        let client = Client::new();
        let images = ImageFetcher::new(client.clone());
        let renderers = default_renderers(&client, &images, &config);
        let pick = |site: &str| {
            let mut meta = LinkMetadata::empty("https://example.com/page");
            meta.site = site.to_string();
            renderers.iter().find(|r| r.claims(&meta)).map(|r| r.name())
        };

        assert_eq!(pick("@youtube"), Some("YouTube"));
        assert_eq!(pick("@Steam"), Some("Steam"));
        assert_eq!(pick("YouTube"), None);
        assert_eq!(pick("Unknown"), None);
    }
}
