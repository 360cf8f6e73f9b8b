//! Data models for link metadata and the site-specific entities behind cards

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder title used when a page exposes none.
pub const NO_TITLE: &str = "No title";

/// Placeholder site name used when a page exposes none.
pub const UNKNOWN_SITE: &str = "Unknown";

/// Normalized metadata extracted from a page's head and `<meta>` tags.
///
/// Text fields are never absent: missing values carry sentinel defaults so
/// downstream formatting stays total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkMetadata {
    /// The URL as it was requested
    pub url: String,
    /// Canonical URL advertised by the page, or the final fetched URL
    pub discrete_url: String,
    pub title: String,
    pub description: String,
    /// Canonical site identifier such as `@youtube` or `@steam`
    pub site: String,
    /// Page thumbnail, already inlined as a PNG data URI
    pub thumbnail_data_uri: Option<String>,
    /// Embedded player URL, e.g. `https://www.youtube.com/embed/<id>`
    pub embedded_video_url: Option<String>,
    /// Every `<meta>` key/content pair found on the page
    pub raw_meta: BTreeMap<String, Vec<String>>,
}

impl LinkMetadata {
    /// Metadata carrying only the URL and sentinel defaults.
    #[must_use]
    pub fn empty(url: &str) -> Self {
        Self {
            url: url.to_string(),
            discrete_url: url.to_string(),
            title: NO_TITLE.to_string(),
            description: String::new(),
            site: UNKNOWN_SITE.to_string(),
            thumbnail_data_uri: None,
            embedded_video_url: None,
            raw_meta: BTreeMap::new(),
        }
    }

    /// Returns the thumbnail data URI, or an empty string.
    #[must_use]
    pub fn thumbnail(&self) -> &str {
        self.thumbnail_data_uri.as_deref().unwrap_or_default()
    }
}

/// One review aggregate from a store page, e.g. `Recent Reviews: Mixed (10)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSummary {
    /// `Recent Reviews` or `All Reviews`
    pub kind: String,
    pub summary: String,
    pub count: String,
}

/// A Steam store application.
///
/// Constructed from its id alone and hydrated by an explicit `load` call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorefrontApp {
    pub app_id: u64,
    pub title: String,
    pub short_description: String,
    pub is_free: bool,
    /// Final price in cents; `None` when the app is unreleased or delisted
    pub price_cents: Option<u64>,
    pub discount_percent: u32,
    pub categories: Vec<String>,
    pub genres: Vec<String>,
    pub reviews: Vec<ReviewSummary>,
    pub coming_soon: bool,
    pub release_date: Option<String>,
    pub logo_url: Option<String>,
    /// Upstream fields not promoted to a named attribute
    pub extra: serde_json::Map<String, serde_json::Value>,
    pub loaded: bool,
}

impl StorefrontApp {
    #[must_use]
    pub fn new(app_id: u64) -> Self {
        Self {
            app_id,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_early_access(&self) -> bool {
        self.genres.iter().any(|g| g == "Early Access")
    }

    #[must_use]
    pub const fn is_unreleased(&self) -> bool {
        self.coming_soon
    }
}

/// A `label: value` tag from a workshop item page. Values may be comma lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkshopTag {
    pub label: String,
    pub value: String,
}

/// A Steam workshop item, hydrated entirely by scraping its page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkshopItem {
    pub item_id: u64,
    pub app_name: String,
    pub title: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub tags: Vec<WorkshopTag>,
    pub loaded: bool,
}

impl WorkshopItem {
    #[must_use]
    pub fn new(item_id: u64) -> Self {
        Self {
            item_id,
            ..Self::default()
        }
    }
}

/// Engagement counters of a social post.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostMetrics {
    pub replies: u64,
    pub retweets: u64,
    pub likes: u64,
    pub quotes: u64,
}

/// A link inside a post that the platform unfurled with a preview image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedLink {
    pub url: String,
    pub title: String,
    pub description: String,
    pub thumbnail_data_uri: Option<String>,
}

/// A photo or video attached to a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedMedia {
    /// Where clicking the thumbnail leads
    pub display_url: String,
    pub thumbnail_data_uri: Option<String>,
}

/// A single social-platform post with its author and media expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPost {
    pub post_id: String,
    pub author_name: String,
    pub author_handle: String,
    pub author_avatar_data_uri: Option<String>,
    /// Body text with the trailing generated short link removed
    pub body_text: String,
    pub created_at: DateTime<Utc>,
    pub embedded_links: Vec<EmbeddedLink>,
    pub attached_media: Vec<AttachedMedia>,
    pub metrics: PostMetrics,
}
