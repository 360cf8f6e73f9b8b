//! YouTube cards backed by the YouTube Data API v3.
//!
//! Uploaders' descriptions are mostly calls to subscribe, so the card swaps
//! them for a search-result style summary: channel, duration, views and
//! publish date.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::duration::{format_duration, parse_compact_duration};
use crate::error::{CardError, Result};
use crate::format::{escape_html, pretty_date, with_thousands};
use crate::models::LinkMetadata;
use crate::traits::SiteRenderer;

/// `site` value YouTube advertises in its card tags.
pub const YOUTUBE_SITE: &str = "@youtube";

const EMBED_MARKER: &str = "/embed/";

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    snippet: VideoSnippet,
    content_details: VideoContentDetails,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    published_at: DateTime<Utc>,
    channel_title: String,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    #[serde(default)]
    duration: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    // The API sends counters as strings
    view_count: Option<String>,
}

/// Renders YouTube video pages.
pub struct YouTubeRenderer {
    client: Client,
    api_key: Option<String>,
    api_base: String,
}

impl YouTubeRenderer {
    #[must_use]
    pub fn new(client: Client, config: &Config) -> Self {
        Self {
            client,
            api_key: config.youtube_api_key.clone(),
            api_base: config.endpoints.youtube_api.trim_end_matches('/').to_string(),
        }
    }

    /// Builds the summary shown under the title, or the page description
    /// when the page has no embeddable video.
    async fn video_description(&self, meta: &LinkMetadata, api_key: &str) -> Result<String> {
        let Some(video_id) = meta.embedded_video_url.as_deref().and_then(extract_video_id) else {
            debug!("No embed URL for {}, keeping page description", meta.url);
            return Ok(escape_html(&meta.description));
        };

        let api_url = format!(
            "{}/youtube/v3/videos?id={}&key={}&part=snippet,contentDetails,statistics,status",
            self.api_base,
            self.encode_param(video_id),
            self.encode_param(api_key),
        );

        info!("Fetching YouTube video {}", video_id);

        let response = self
            .client
            .get(&api_url)
            .send()
            .await
            .map_err(|e| CardError::from_reqwest(&meta.url, &e))?;

        if !response.status().is_success() {
            return Err(CardError::fetch(
                &meta.url,
                format!("YouTube API returned {}", response.status()),
            ));
        }

        let listing: VideoListResponse = response
            .json()
            .await
            .map_err(|e| CardError::decode("YouTube API response", e.to_string()))?;

        Ok(listing
            .items
            .first()
            .map(render_video_summary)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SiteRenderer for YouTubeRenderer {
    fn name(&self) -> &'static str {
        "YouTube"
    }

    fn claims(&self, meta: &LinkMetadata) -> bool {
        meta.site == YOUTUBE_SITE
    }

    async fn render(&self, meta: &LinkMetadata) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            CardError::configuration("YouTube cards require YOUTUBE_API_KEY for the Data API v3")
        })?;

        let description = self.video_description(meta, api_key).await?;

        Ok(format!(
            r#"
        <table>
            <tr>
                <td>
                    <a href="{url}"><img src="{thumbnail}" /></a>
                </td>
                <td>
                    <a href="{url}"><b>{title}</b></a>
                    <br/>
                    {description}
                </td>
            </tr>
        </table>
    "#,
            url = escape_html(&meta.url),
            thumbnail = meta.thumbnail(),
            title = escape_html(&meta.title),
        ))
    }
}

/// Video id from an embed URL such as `https://www.youtube.com/embed/pHKVSfcAO2g?list=x`.
#[must_use]
pub fn extract_video_id(embed_url: &str) -> Option<&str> {
    let start = embed_url.find(EMBED_MARKER)? + EMBED_MARKER.len();
    let id = &embed_url[start..];
    let id = id.split_once('?').map_or(id, |(id, _)| id);
    (!id.is_empty()).then_some(id)
}

fn render_video_summary(video: &VideoResource) -> String {
    // Live streams report a duration that is not a valid compact duration
    let duration = parse_compact_duration(&video.content_details.duration)
        .map_or_else(|_| "<b>Live</b>".to_string(), |d| format_duration(&d));

    let views = video
        .statistics
        .view_count
        .as_deref()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or_default();

    format!(
        r#"
        YouTube · {channel} · {duration}

        <p style="font-size: small; color: #666666">
            <b>{views}</b> Views · {date}
        </p>
    "#,
        channel = escape_html(&video.snippet.channel_title),
        views = with_thousands(views),
        date = pretty_date(&video.snippet.published_at),
    )
}
