//! Page metadata extraction from Open Graph, Twitter Card, Dublin Core and
//! plain `<meta>` tags.

use std::collections::BTreeMap;

use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::error::{CardError, Result};
use crate::models::{LinkMetadata, NO_TITLE, UNKNOWN_SITE};
use crate::thumbnails::{DEFAULT_THUMBNAIL_SIZE, ImageFetcher};

/// Many sites only serve full metadata to known crawlers; this one gets the
/// richest results across the sites we care about.
pub const CRAWLER_USER_AGENT: &str = "Twitterbot/1.0";

// Keys are tried in order, site-specific card tags before generic fallbacks.
const TITLE_KEYS: &[&str] = &["twitter:title", "og:title", "DC.title", "dc.title", "title"];
const DESCRIPTION_KEYS: &[&str] = &[
    "twitter:description",
    "og:description",
    "DC.description",
    "dc.description",
    "description",
    "Description",
];
const SITE_KEYS: &[&str] = &["twitter:site", "og:site_name"];
const IMAGE_KEYS: &[&str] = &[
    "twitter:image",
    "twitter:image:src",
    "og:image",
    "og:image:url",
    "og:image:secure_url",
];
const VIDEO_KEYS: &[&str] = &[
    "og:video:url",
    "og:video:secure_url",
    "og:video",
    "twitter:player",
];
const URL_KEYS: &[&str] = &["og:url", "twitter:url"];

/// Tags and links pulled from one HTML document, before any network work.
#[derive(Debug, Default, Clone)]
pub struct PageTags {
    pub meta: BTreeMap<String, Vec<String>>,
    pub page_title: Option<String>,
    pub canonical: Option<String>,
    pub image_src: Option<String>,
}

impl PageTags {
    /// Parses every `<meta>` key/content pair plus the few `<link>`/`<title>`
    /// fallbacks we use.
    #[must_use]
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut tags = Self::default();

        if let Ok(meta_selector) = Selector::parse("meta[content]") {
            for el in document.select(&meta_selector) {
                let attrs = el.value();
                let Some(key) = attrs
                    .attr("property")
                    .or_else(|| attrs.attr("name"))
                    .or_else(|| attrs.attr("itemprop"))
                else {
                    continue;
                };
                let content = attrs.attr("content").unwrap_or_default().trim().to_string();
                tags.meta.entry(key.trim().to_string()).or_default().push(content);
            }
        }

        if let Ok(title_selector) = Selector::parse("title") {
            tags.page_title = document
                .select(&title_selector)
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|t| !t.is_empty());
        }

        tags.canonical = link_href(&document, r#"link[rel="canonical"]"#);
        tags.image_src = link_href(&document, r#"link[rel="image_src"]"#);

        tags
    }

    /// Absolute URL of the page's preview image, if it advertises one.
    #[must_use]
    pub fn thumbnail_url(&self, base: &Url) -> Option<String> {
        self.first(IMAGE_KEYS)
            .or(self.image_src.as_deref())
            .and_then(|href| absolutize(base, href))
    }

    /// First non-empty value among `keys`, in key order.
    #[must_use]
    pub fn first(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|key| self.meta.get(*key))
            .flatten()
            .map(String::as_str)
            .find(|v| !v.is_empty())
    }
}

fn link_href(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .map(str::trim)
        .find(|href| !href.is_empty())
        .map(str::to_string)
}

/// Resolves a possibly relative `href` against the page URL.
fn absolutize(base: &Url, href: &str) -> Option<String> {
    base.join(href).ok().map(|u| u.to_string())
}

/// Fetches pages and normalizes their metadata.
#[derive(Clone)]
pub struct MetadataExtractor {
    client: Client,
    images: ImageFetcher,
}

impl MetadataExtractor {
    #[must_use]
    pub const fn new(client: Client, images: ImageFetcher) -> Self {
        Self { client, images }
    }

    /// Fetches `url` as a crawler and extracts its [`LinkMetadata`].
    ///
    /// Per-field failures degrade to sentinel defaults.
    ///
    /// # Errors
    /// Only [`CardError::Unreachable`], when no connection can be made.
    pub async fn extract(&self, url: &str) -> Result<LinkMetadata> {
        info!("Extracting metadata from {}", url);

        let response = match self
            .client
            .get(url)
            .header(USER_AGENT, CRAWLER_USER_AGENT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                let err = CardError::from_initial_request(url, &e);
                if err.is_unreachable() {
                    return Err(err);
                }
                // Reachable but unusable (redirect loops, protocol errors)
                warn!("Metadata fetch for {} failed, using defaults: {}", url, err);
                return Ok(LinkMetadata::empty(url));
            }
        };

        let final_url = response.url().clone();
        if !response.status().is_success() {
            warn!(
                "Metadata fetch for {} returned {}, parsing whatever came back",
                url,
                response.status()
            );
        }

        let html = match response.text().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Failed to read body of {}: {}", url, e);
                String::new()
            }
        };

        let tags = PageTags::parse(&html);
        let thumbnail_url = tags.thumbnail_url(&final_url);
        let mut meta = build_metadata(url, &final_url, tags);

        meta.thumbnail_data_uri = match self
            .images
            .fetch_as_data_uri(thumbnail_url.as_deref(), DEFAULT_THUMBNAIL_SIZE, false)
            .await
        {
            Ok(uri) => uri,
            Err(e) => {
                warn!("Thumbnail for {} unavailable: {}", url, e);
                None
            }
        };

        debug!(
            "Metadata for {}: site={:?} title={:?}",
            url, meta.site, meta.title
        );
        Ok(meta)
    }
}

/// Builds the metadata record from parsed tags, without fetching the thumbnail.
#[must_use]
pub fn build_metadata(url: &str, final_url: &Url, tags: PageTags) -> LinkMetadata {
    let title = tags
        .first(TITLE_KEYS)
        .map(str::to_string)
        .or_else(|| tags.page_title.clone())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let description = tags
        .first(DESCRIPTION_KEYS)
        .map(str::to_string)
        .unwrap_or_default();

    let site = tags
        .first(SITE_KEYS)
        .map_or_else(|| UNKNOWN_SITE.to_string(), str::to_string);

    let discrete_url = tags
        .first(URL_KEYS)
        .map(str::to_string)
        .or_else(|| tags.canonical.clone())
        .and_then(|href| absolutize(final_url, &href))
        .unwrap_or_else(|| final_url.to_string());

    let embedded_video_url = tags
        .first(VIDEO_KEYS)
        .and_then(|href| absolutize(final_url, href));

    LinkMetadata {
        url: url.to_string(),
        discrete_url,
        title,
        description,
        site,
        thumbnail_data_uri: None,
        embedded_video_url,
        raw_meta: tags.meta,
    }
}
