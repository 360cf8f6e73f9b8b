//! Steam store apps and workshop items.
//!
//! App details come from the store's `appdetails` API. Review aggregates are
//! scraped from the store page because the API has no recent-vs-all split.
//! Workshop items have no API and are scraped outright.

use std::collections::HashMap;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{CardError, Result};
use crate::format::{
    escape_html, format_discount, format_price, truncate_description, truncate_escaped_description,
};
use crate::models::{LinkMetadata, ReviewSummary, StorefrontApp, WorkshopItem, WorkshopTag};
use crate::renderers::generic::render_summary_table;
use crate::thumbnails::{DEFAULT_THUMBNAIL_SIZE, ImageFetcher};
use crate::traits::SiteRenderer;

/// Suffix of the `site` value Steam's pages advertise (`@steam`).
pub const STEAM_SITE_SUFFIX: &str = "steam";

static WORKSHOP_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://steamcommunity\.com/(?:sharedfiles|workshop)/filedetails/.*\?id=(?P<item_id>\d+)",
    )
    .expect("workshop item pattern is valid")
});

static APP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://store\.steampowered\.com/app/(?P<app_id>\d+)")
        .expect("app pattern is valid")
});

const REVIEW_CAPTIONS: [&str; 2] = ["Recent Reviews:", "All Reviews:"];

/// Which Steam entity a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SteamLink {
    App(u64),
    WorkshopItem(u64),
}

/// Classifies a Steam URL; workshop items are checked first.
#[must_use]
pub fn classify_steam_url(url: &str) -> Option<SteamLink> {
    if let Some(id) = WORKSHOP_ITEM_RE
        .captures(url)
        .and_then(|c| c["item_id"].parse().ok())
    {
        return Some(SteamLink::WorkshopItem(id));
    }

    APP_RE
        .captures(url)
        .and_then(|c| c["app_id"].parse().ok())
        .map(SteamLink::App)
}

/// Links open in the Steam client rather than the browser.
#[must_use]
pub fn open_with_steam(url: &str) -> String {
    format!("steam://openurl/{url}")
}

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    #[serde(default)]
    name: String,
    #[serde(default)]
    short_description: String,
    #[serde(default)]
    is_free: bool,
    price_overview: Option<PriceOverview>,
    #[serde(default)]
    categories: Vec<Described>,
    #[serde(default)]
    genres: Vec<Described>,
    release_date: Option<ReleaseDate>,
    header_image: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PriceOverview {
    #[serde(rename = "final")]
    final_cents: u64,
    #[serde(default)]
    discount_percent: u32,
}

#[derive(Debug, Deserialize)]
struct Described {
    description: String,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    #[serde(default)]
    coming_soon: bool,
    #[serde(default)]
    date: String,
}

/// HTTP access to the Steam store and community sites.
#[derive(Clone)]
pub struct SteamStore {
    client: Client,
    store_base: String,
    community_base: String,
}

impl SteamStore {
    #[must_use]
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            store_base: config.endpoints.steam_store.trim_end_matches('/').to_string(),
            community_base: config
                .endpoints
                .steam_community
                .trim_end_matches('/')
                .to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CardError::from_reqwest(url, &e))?;

        if !response.status().is_success() {
            return Err(CardError::fetch(
                url,
                format!("unexpected status {}", response.status()),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| CardError::from_reqwest(url, &e))
    }

    async fn app_details(&self, app_id: u64) -> Result<AppData> {
        let url = format!(
            "{}/api/appdetails/?appids={app_id}&cc=us&l=en&json=1",
            self.store_base
        );
        let body = self.get_text(&url).await?;

        let mut envelopes: HashMap<String, AppDetailsEnvelope> = serde_json::from_str(&body)
            .map_err(|e| CardError::decode("Steam app details", e.to_string()))?;

        match envelopes.remove(&app_id.to_string()) {
            Some(AppDetailsEnvelope {
                success: true,
                data: Some(data),
            }) => Ok(data),
            _ => Err(CardError::fetch(url, format!("no store data for app {app_id}"))),
        }
    }

    async fn app_reviews(&self, app_id: u64) -> Result<Vec<ReviewSummary>> {
        let html = self
            .get_text(&format!("{}/app/{app_id}", self.store_base))
            .await?;
        Ok(parse_review_summaries(&html))
    }

    async fn workshop_page(&self, item_id: u64) -> Result<String> {
        self.get_text(&format!(
            "{}/sharedfiles/filedetails/?id={item_id}",
            self.community_base
        ))
        .await
    }
}

impl StorefrontApp {
    /// Hydrates the app from the details API, then best-effort from the
    /// store page. Calling this on a loaded app is a no-op.
    ///
    /// # Errors
    /// Fails only when the details API fails; a failed review scrape leaves
    /// `reviews` empty.
    pub async fn load(mut self, store: &SteamStore) -> Result<Self> {
        if self.loaded {
            return Ok(self);
        }

        info!("Loading Steam app {}", self.app_id);
        let data = store.app_details(self.app_id).await?;

        self.title = data.name;
        self.short_description = data.short_description;
        self.is_free = data.is_free;
        self.price_cents = data.price_overview.as_ref().map(|p| p.final_cents);
        self.discount_percent = data.price_overview.map_or(0, |p| p.discount_percent);
        self.categories = data.categories.into_iter().map(|c| c.description).collect();
        self.genres = data.genres.into_iter().map(|g| g.description).collect();
        if let Some(release) = data.release_date {
            self.coming_soon = release.coming_soon;
            self.release_date = Some(release.date).filter(|d| !d.trim().is_empty());
        }
        self.logo_url = data.header_image;
        self.extra = data.extra;

        match store.app_reviews(self.app_id).await {
            Ok(reviews) => self.reviews = reviews,
            Err(e) => warn!("Review scrape for app {} failed: {}", self.app_id, e),
        }

        self.loaded = true;
        Ok(self)
    }

    /// `Free`, `Not Available` or the current price.
    #[must_use]
    pub fn price(&self) -> String {
        format_price(self.is_free, self.price_cents)
    }

    /// `-N%`, or empty when not discounted.
    #[must_use]
    pub fn discount(&self) -> String {
        format_discount(self.discount_percent)
    }
}

impl WorkshopItem {
    /// Hydrates the item by scraping its workshop page. Idempotent.
    ///
    /// # Errors
    /// Fails when the page cannot be fetched or lacks the item title,
    /// app name or description.
    pub async fn load(self, store: &SteamStore) -> Result<Self> {
        if self.loaded {
            return Ok(self);
        }

        info!("Loading workshop item {}", self.item_id);
        let html = store.workshop_page(self.item_id).await?;
        parse_workshop_page(self.item_id, &html)
    }
}

fn select_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Review aggregates from a store page, in page order.
#[must_use]
pub fn parse_review_summaries(html: &str) -> Vec<ReviewSummary> {
    let document = Html::parse_document(html);
    let (Ok(subtitle_sel), Ok(summary_sel), Ok(count_sel)) = (
        Selector::parse("div.subtitle"),
        Selector::parse("span.game_review_summary"),
        Selector::parse("span.responsive_hidden"),
    ) else {
        return Vec::new();
    };

    let mut reviews = Vec::new();
    for subtitle in document.select(&subtitle_sel) {
        let Some(caption) = subtitle
            .text()
            .map(str::trim)
            .find(|t| REVIEW_CAPTIONS.contains(t))
        else {
            continue;
        };
        let Some(row) = subtitle.parent().and_then(ElementRef::wrap) else {
            continue;
        };

        let summary = select_text(row, &summary_sel).filter(|s| !s.is_empty());
        let count = select_text(row, &count_sel).filter(|s| !s.is_empty());
        if let (Some(summary), Some(count)) = (summary, count) {
            reviews.push(ReviewSummary {
                kind: caption.trim_end_matches(':').to_string(),
                summary,
                count: count
                    .trim_start_matches('(')
                    .trim_end_matches(')')
                    .trim()
                    .to_string(),
            });
        }
    }

    debug!("Scraped {} review summaries", reviews.len());
    reviews
}

/// Builds a hydrated [`WorkshopItem`] from its page.
///
/// # Errors
/// Returns [`CardError::Decode`] when a required element is missing.
pub fn parse_workshop_page(item_id: u64, html: &str) -> Result<WorkshopItem> {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let required = |css: &str| -> Result<String> {
        let selector = Selector::parse(css)
            .map_err(|e| CardError::decode("workshop selector", format!("{e:?}")))?;
        select_text(root, &selector)
            .ok_or_else(|| CardError::decode("workshop page", format!("missing {css}")))
    };

    let app_name = required(".apphub_AppName")?;
    let title = required(".workshopItemTitle")?;
    let description = required(".workshopItemDescription")?;

    let logo_url = Selector::parse(r#"link[rel="image_src"]"#)
        .ok()
        .and_then(|sel| {
            root.select(&sel)
                .find_map(|el| el.value().attr("href").map(str::to_string))
        });

    let tags: Vec<WorkshopTag> = Selector::parse("div.workshopTags")
        .map(|sel| {
            root.select(&sel)
                .map(|el| parse_tag(&el.text().collect::<String>()))
                .collect()
        })
        .unwrap_or_default();

    Ok(WorkshopItem {
        item_id,
        app_name,
        title,
        description,
        logo_url,
        tags,
        loaded: true,
    })
}

/// Splits `Category:\u{a0}Game` into its label and value.
fn parse_tag(text: &str) -> WorkshopTag {
    let text = text.trim();
    let (label, value) = text
        .split_once(":\u{a0}")
        .or_else(|| text.split_once(": "))
        .unwrap_or((text, ""));

    WorkshopTag {
        label: label.trim().to_string(),
        value: value.trim().to_string(),
    }
}

/// Alternates tags into two columns: even indices left, odd indices right.
#[must_use]
pub fn split_tag_columns(tags: &[WorkshopTag]) -> (Vec<&WorkshopTag>, Vec<&WorkshopTag>) {
    let mut left = Vec::with_capacity(tags.len().div_ceil(2));
    let mut right = Vec::with_capacity(tags.len() / 2);
    for (i, tag) in tags.iter().enumerate() {
        if i % 2 == 0 {
            left.push(tag);
        } else {
            right.push(tag);
        }
    }
    (left, right)
}

/// Presentational release state of an app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseState {
    UnreleasedEarlyAccess,
    EarlyAccess,
    Unreleased,
    Released,
}

impl ReleaseState {
    #[must_use]
    pub fn of(app: &StorefrontApp) -> Self {
        match (app.is_early_access(), app.is_unreleased()) {
            (true, true) => Self::UnreleasedEarlyAccess,
            (true, false) => Self::EarlyAccess,
            (false, true) => Self::Unreleased,
            (false, false) => Self::Released,
        }
    }

    /// Warning banner copy; only early access apps get one.
    #[must_use]
    pub const fn banner(self) -> Option<&'static str> {
        match self {
            Self::UnreleasedEarlyAccess => Some("⚠️ Unreleased Early Access ⚠️"),
            Self::EarlyAccess => Some("⚠️ Early Access ⚠️"),
            Self::Unreleased | Self::Released => None,
        }
    }
}

/// The small grey line under the description: reviews once there are some,
/// release messaging until then.
#[must_use]
pub fn review_line(app: &StorefrontApp) -> String {
    if !app.is_unreleased() && !app.reviews.is_empty() {
        return app
            .reviews
            .iter()
            .map(|r| {
                format!(
                    "<b>{}:</b> {} ({})",
                    escape_html(&r.kind),
                    escape_html(&r.summary),
                    escape_html(&r.count)
                )
            })
            .collect::<Vec<_>>()
            .join(" · ");
    }

    match (&app.release_date, app.is_unreleased()) {
        (Some(date), true) => format!("<b>Releases:</b> {}", escape_html(date)),
        (None, true) => "<b>Releases:</b> TBA".to_string(),
        (Some(date), false) => format!("<b>Released:</b> {}", escape_html(date)),
        (None, false) => "<b>No release date</b>".to_string(),
    }
}

/// Price box; the discount cell only appears when there is a discount.
#[must_use]
pub fn render_price_box(app: &StorefrontApp) -> String {
    // Mumble's Qt renderer ignores most table CSS, hence the border attributes
    let discount = app.discount();
    let discount_cell = if discount.is_empty() {
        String::new()
    } else {
        format!(
            r#"<td style="font-size: large; background-color: #4c6b22; color: #a4d007">{discount}</td>"#
        )
    };

    format!(
        r#"
            <table border="2" style="border-color: #000000; border-style: solid" cellpadding="2" cellspacing="0">
                <tr>
                    {discount_cell}
                    <td style="background-color: #000000; color: #acdbf5">{price}</td>
                </tr>
            </table>
    "#,
        price = app.price()
    )
}

/// Card for a hydrated store app.
#[must_use]
pub fn render_app(meta: &LinkMetadata, app: &StorefrontApp, thumbnail: &str) -> String {
    let banner = ReleaseState::of(app).banner().map_or_else(String::new, |copy| {
        format!(
            r#"
            <table border="3" style="margin-top: 10px; border-style: solid; border-color: #000000" cellspacing="1">
                <tr>
                    <td style="background: #000000; color: #fc9403">{copy}</td>
                </tr>
            </table>
        "#
        )
    });

    format!(
        r#"
        <table>
            <tr>
                <td>
                    <a href="{url}"><img src="{thumbnail}" /></a>
                    {price_box}
                </td>
                <td>
                    <a href="{url}">{title}</a>
                    {banner}
                    <p>{description}</p>
                    <p style="font-size: small; color: #666666">
                        {small_text}
                    </p>
                </td>
            </tr>
        </table>
    "#,
        url = escape_html(&open_with_steam(&meta.url)),
        price_box = render_price_box(app),
        title = escape_html(&app.title),
        // The API already entity-escapes short descriptions
        description = truncate_escaped_description(&app.short_description),
        small_text = review_line(app),
    )
}

/// Card for a hydrated workshop item, tags in two balanced columns.
#[must_use]
pub fn render_workshop_item(meta: &LinkMetadata, item: &WorkshopItem, thumbnail: &str) -> String {
    let column = |tags: Vec<&WorkshopTag>| -> String {
        tags.into_iter()
            .map(|t| {
                format!(
                    "<br/><b>{}:</b> {}",
                    escape_html(&t.label),
                    escape_html(&t.value)
                )
            })
            .collect()
    };
    let (left, right) = split_tag_columns(&item.tags);

    format!(
        r#"
        <table>
            <tr>
                <td>
                    <a href="{url}"><img src="{thumbnail}" /></a>
                </td>
                <td>
                    <a href="{url}">{title}</a> for {app}
                    <p>{description}</p>
                </td>
            </tr>
        </table>
        <table>
            <tr>
                <td>
                    <p style="font-size: small; color:#666666">{tags_left}</p>
                </td>
                <td>
                    <p style="font-size: small; color:#666666">{tags_right}</p>
                </td>
            </tr>
        </table>
    "#,
        url = escape_html(&open_with_steam(&meta.url)),
        title = escape_html(&item.title),
        app = escape_html(&item.app_name),
        description = escape_html(&truncate_description(&item.description)),
        tags_left = column(left),
        tags_right = column(right),
    )
}

/// Any other Steam page: metadata card that opens in the Steam client.
#[must_use]
pub fn render_steam_page(meta: &LinkMetadata) -> String {
    render_summary_table(
        &escape_html(&open_with_steam(&meta.url)),
        meta.thumbnail(),
        &escape_html(&meta.title),
        &escape_html(&meta.description),
    )
}

/// Renders Steam store and community pages.
pub struct SteamRenderer {
    store: SteamStore,
    images: ImageFetcher,
}

impl SteamRenderer {
    #[must_use]
    pub fn new(client: Client, images: ImageFetcher, config: &Config) -> Self {
        Self {
            store: SteamStore::new(client, config),
            images,
        }
    }

    /// Page thumbnail if the metadata had one, otherwise the entity's logo.
    async fn thumbnail(&self, meta: &LinkMetadata, logo_url: Option<&str>) -> String {
        if let Some(uri) = &meta.thumbnail_data_uri {
            return uri.clone();
        }

        match self
            .images
            .fetch_as_data_uri(logo_url, DEFAULT_THUMBNAIL_SIZE, false)
            .await
        {
            Ok(uri) => uri.unwrap_or_default(),
            Err(e) => {
                warn!("Steam logo for {} unavailable: {}", meta.url, e);
                String::new()
            }
        }
    }
}

#[async_trait]
impl SiteRenderer for SteamRenderer {
    fn name(&self) -> &'static str {
        "Steam"
    }

    fn claims(&self, meta: &LinkMetadata) -> bool {
        meta.site.to_lowercase().ends_with(STEAM_SITE_SUFFIX)
    }

    async fn render(&self, meta: &LinkMetadata) -> Result<String> {
        match classify_steam_url(&meta.url) {
            Some(SteamLink::WorkshopItem(id)) => {
                let item = WorkshopItem::new(id).load(&self.store).await?;
                let thumbnail = self.thumbnail(meta, item.logo_url.as_deref()).await;
                Ok(render_workshop_item(meta, &item, &thumbnail))
            }
            Some(SteamLink::App(id)) => {
                let app = StorefrontApp::new(id).load(&self.store).await?;
                let thumbnail = self.thumbnail(meta, app.logo_url.as_deref()).await;
                Ok(render_app(meta, &app, &thumbnail))
            }
            None => Ok(render_steam_page(meta)),
        }
    }
}
