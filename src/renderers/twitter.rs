//! Tweet cards via the Twitter API v2.
//!
//! Twitter serves almost no useful meta tags, so tweets are always fetched
//! from the API with the author and attached media expanded.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{CardError, Result};
use crate::format::{escape_html, nl2br, pretty_datetime, with_thousands};
use crate::models::{AttachedMedia, EmbeddedLink, LinkMetadata, PostMetrics, SocialPost};
use crate::thumbnails::{DEFAULT_THUMBNAIL_SIZE, ImageFetcher};
use crate::traits::SiteRenderer;

static TWEET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:www\.|mobile\.)?(?:twitter|x)\.com/(?:.*/)?status(?:es)?/(?P<id>\d+)",
    )
    .expect("tweet pattern is valid")
});

const AVATAR_SIZE: u32 = 64;
const SINGLE_MEDIA_SIZE: u32 = 256;
const GRID_MEDIA_SIZE: u32 = 128;

/// Tweet id of a status URL.
#[must_use]
pub fn tweet_id(url: &str) -> Option<&str> {
    TWEET_RE
        .captures(url)
        .and_then(|c| c.name("id"))
        .map(|m| m.as_str())
}

/// Usable link to any tweet; the username part of the path is ignored.
#[must_use]
pub fn link_to_tweet(tweet_id: &str) -> String {
    format!("https://twitter.com/twitter/status/{tweet_id}")
}

#[derive(Debug, Deserialize)]
struct TweetLookup {
    #[serde(default)]
    data: Vec<Tweet>,
    #[serde(default)]
    includes: Includes,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    public_metrics: PublicMetrics,
    entities: Option<Entities>,
}

#[derive(Debug, Default, Deserialize)]
struct PublicMetrics {
    #[serde(default)]
    reply_count: u64,
    #[serde(default)]
    retweet_count: u64,
    #[serde(default)]
    like_count: u64,
    #[serde(default)]
    quote_count: u64,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

#[derive(Debug, Clone, Deserialize)]
struct UrlEntity {
    #[serde(default)]
    start: usize,
    #[serde(default)]
    end: usize,
    url: String,
    expanded_url: Option<String>,
    unwound_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    #[serde(default)]
    images: Vec<EntityImage>,
}

#[derive(Debug, Clone, Deserialize)]
struct EntityImage {
    url: String,
}

#[derive(Debug, Default, Deserialize)]
struct Includes {
    #[serde(default)]
    users: Vec<User>,
    #[serde(default)]
    media: Vec<Media>,
}

#[derive(Debug, Deserialize)]
struct User {
    name: String,
    username: String,
    profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Media {
    url: Option<String>,
    preview_image_url: Option<String>,
}

/// Removes the short link Twitter appends for attached media and cards.
///
/// The trailing entity is located by its reported span rather than a fixed
/// character count; text without a trailing link is left untouched.
fn strip_trailing_link(text: &str, links: &[UrlEntity]) -> String {
    let Some(last) = links.iter().max_by_key(|e| e.end) else {
        return text.to_string();
    };

    let trimmed = text.trim_end();
    if !last.url.is_empty()
        && let Some(stripped) = trimmed.strip_suffix(last.url.as_str())
    {
        return stripped.trim_end().to_string();
    }

    let chars: Vec<char> = trimmed.chars().collect();
    if last.start < last.end && last.end == chars.len() {
        return chars[..last.start]
            .iter()
            .collect::<String>()
            .trim_end()
            .to_string();
    }

    text.to_string()
}

/// Renders tweets.
pub struct TwitterRenderer {
    client: Client,
    images: ImageFetcher,
    bearer_token: Option<String>,
    api_base: String,
}

impl TwitterRenderer {
    #[must_use]
    pub fn new(client: Client, images: ImageFetcher, config: &Config) -> Self {
        Self {
            client,
            images,
            bearer_token: config.twitter_bearer_token.clone(),
            api_base: config.endpoints.twitter_api.trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, id: &str, token: &str) -> Result<TweetLookup> {
        let url = format!(
            "{}/2/tweets?ids={}&tweet.fields=created_at,public_metrics,entities\
             &user.fields=verified,profile_image_url&media.fields=preview_image_url,url\
             &expansions=attachments.media_keys,author_id",
            self.api_base,
            self.encode_param(id),
        );

        info!("Fetching tweet {}", id);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CardError::from_reqwest(&url, &e))?;

        if !response.status().is_success() {
            return Err(CardError::fetch(
                &url,
                format!("Twitter API returned {}", response.status()),
            ));
        }

        response
            .json()
            .await
            .map_err(|e| CardError::decode("Twitter API response", e.to_string()))
    }

    /// Fetches one tweet and resolves every image it shows.
    ///
    /// # Errors
    /// Fails when the tweet or its author is missing from the response, or
    /// when any of its images cannot be fetched.
    pub async fn load_post(&self, id: &str) -> Result<SocialPost> {
        let token = self.bearer_token.as_deref().ok_or_else(|| {
            CardError::configuration("tweet cards require TWITTER_BEARER_TOKEN")
        })?;

        let TweetLookup {
            data,
            includes,
            errors,
        } = self.lookup(id, token).await?;

        let Some(tweet) = data.into_iter().next() else {
            let detail = errors
                .into_iter()
                .map(|e| e.detail)
                .find(|d| !d.is_empty())
                .unwrap_or_else(|| "tweet not found".to_string());
            return Err(CardError::fetch(link_to_tweet(id), detail));
        };
        let author = includes
            .users
            .first()
            .ok_or_else(|| CardError::decode("Twitter API response", "missing author"))?;

        let links = tweet.entities.map(|e| e.urls).unwrap_or_default();
        let body_text = strip_trailing_link(&tweet.text, &links);

        let author_avatar_data_uri = self
            .images
            .fetch_as_data_uri(author.profile_image_url.as_deref(), AVATAR_SIZE, true)
            .await?;

        let mut embedded_links = Vec::new();
        // Plain links without a preview image stay inline in the text
        for link in links.iter().filter(|l| !l.images.is_empty()) {
            let thumbnail_data_uri = self
                .images
                .fetch_as_data_uri(
                    link.images.first().map(|i| i.url.as_str()),
                    DEFAULT_THUMBNAIL_SIZE,
                    false,
                )
                .await?;
            embedded_links.push(EmbeddedLink {
                url: link
                    .unwound_url
                    .clone()
                    .or_else(|| link.expanded_url.clone())
                    .unwrap_or_else(|| link.url.clone()),
                title: link.title.clone().unwrap_or_default(),
                description: link.description.clone().unwrap_or_default(),
                thumbnail_data_uri,
            });
        }

        let size = if includes.media.len() > 1 {
            GRID_MEDIA_SIZE
        } else {
            SINGLE_MEDIA_SIZE
        };
        let mut attached_media = Vec::with_capacity(includes.media.len());
        for media in &includes.media {
            // Videos only expose a preview image, never a playable asset
            let source = media
                .preview_image_url
                .as_deref()
                .or(media.url.as_deref());
            let thumbnail_data_uri = self.images.fetch_as_data_uri(source, size, false).await?;
            attached_media.push(AttachedMedia {
                display_url: media.url.clone().unwrap_or_else(|| link_to_tweet(&tweet.id)),
                thumbnail_data_uri,
            });
        }

        debug!(
            "Tweet {} has {} embeds and {} media",
            tweet.id,
            embedded_links.len(),
            attached_media.len()
        );

        Ok(SocialPost {
            post_id: tweet.id,
            author_name: author.name.clone(),
            author_handle: author.username.clone(),
            author_avatar_data_uri,
            body_text,
            created_at: tweet.created_at,
            embedded_links,
            attached_media,
            metrics: PostMetrics {
                replies: tweet.public_metrics.reply_count,
                retweets: tweet.public_metrics.retweet_count,
                likes: tweet.public_metrics.like_count,
                quotes: tweet.public_metrics.quote_count,
            },
        })
    }
}

#[async_trait]
impl SiteRenderer for TwitterRenderer {
    fn name(&self) -> &'static str {
        "Twitter"
    }

    fn claims(&self, meta: &LinkMetadata) -> bool {
        tweet_id(&meta.url).is_some()
    }

    async fn render(&self, meta: &LinkMetadata) -> Result<String> {
        let id = tweet_id(&meta.url)
            .ok_or_else(|| CardError::format("tweet URL", meta.url.clone()))?;
        let post = self.load_post(id).await?;
        Ok(render_post(&post))
    }
}

fn render_embedded_link(link: &EmbeddedLink) -> String {
    format!(
        r#"
            <a href="{url}">
                <table>
                    <tr>
                        <td>
                            <img src="{thumbnail}" />
                        </td>
                        <td>
                            {title}

                            <p style="font-size: small; color:#666666">
                                {description}
                            </p>
                        </td>
                    </tr>
                </table>
            </a>
        "#,
        url = escape_html(&link.url),
        thumbnail = link.thumbnail_data_uri.as_deref().unwrap_or_default(),
        title = escape_html(&link.title),
        description = escape_html(&link.description),
    )
}

/// Qt rich-text compatible card for a tweet.
#[must_use]
pub fn render_post(post: &SocialPost) -> String {
    let embeds: String = post.embedded_links.iter().map(render_embedded_link).collect();
    let thumbnails: String = post
        .attached_media
        .iter()
        .map(|m| {
            format!(
                r#"<a href="{}"><img src="{}" /></a>"#,
                escape_html(&m.display_url),
                m.thumbnail_data_uri.as_deref().unwrap_or_default()
            )
        })
        .collect();

    format!(
        r#"
        <table>
            <tr>
                <td>
                    <a href="https://twitter.com/{username}">
                        <img src="{avatar}" />
                    </a>
                </td>
                <td>
                    <a href="https://twitter.com/{username}">
                        {name}
                        <br/>
                        <span style="color: #666666">@{username}</span>
                    </a>
                </td>
            </tr>
        </table>

        <p>{text}</p>
        {embeds}
        <p>{thumbnails}</p>

        <a href="{link}">
            <span style="font-size: small; color: #666666">
                {date} · <b>{retweets}</b> Retweets · <b>{likes}</b> Likes
            </span>
        </a>
    "#,
        username = escape_html(&post.author_handle),
        avatar = post.author_avatar_data_uri.as_deref().unwrap_or_default(),
        name = escape_html(&post.author_name),
        // Tweet text arrives entity-escaped already
        text = nl2br(&post.body_text),
        link = link_to_tweet(&post.post_id),
        date = pretty_datetime(&post.created_at),
        retweets = with_thousands(post.metrics.retweets),
        likes = with_thousands(post.metrics.likes),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entity(start: usize, end: usize, url: &str) -> UrlEntity {
        UrlEntity {
            start,
            end,
            url: url.to_string(),
            expanded_url: None,
            unwound_url: None,
            title: None,
            description: None,
            images: Vec::new(),
        }
    }

    #[test]
    fn test_tweet_id_patterns() {
        assert_eq!(
            tweet_id("https://twitter.com/SatisfactoryAF/status/1520043080950427649"),
            Some("1520043080950427649")
        );
        assert_eq!(
            tweet_id("https://x.com/a/status/1521198879294828550?s=20"),
            Some("1521198879294828550")
        );
        assert_eq!(
            tweet_id("https://mobile.twitter.com/i/web/status/42"),
            Some("42")
        );
        assert_eq!(tweet_id("https://twitter.com/SatisfactoryAF"), None);
        assert_eq!(tweet_id("https://nottwitter.com/a/status/1"), None);
    }

    #[test]
    fn test_strip_trailing_link_by_span() {
        let text = "Look at this https://t.co/abcdefghij";
        let links = [entity(13, 36, "https://t.co/abcdefghij")];
        assert_eq!(strip_trailing_link(text, &links), "Look at this");
    }

    #[test]
    fn test_strip_trailing_link_by_offsets_when_url_differs() {
        let text = "Look at this https://t.co/xyz";
        let links = [entity(13, 29, "https://t.co/other")];
        assert_eq!(strip_trailing_link(text, &links), "Look at this");
    }

    #[test]
    fn test_link_in_the_middle_is_kept() {
        let text = "See https://t.co/aaa for details";
        let links = [entity(4, 20, "https://t.co/aaa")];
        assert_eq!(strip_trailing_link(text, &links), text);
    }

    #[test]
    fn test_no_entities_keeps_text() {
        assert_eq!(strip_trailing_link("plain text", &[]), "plain text");
    }

    #[test]
    fn test_render_post() {
        let post = SocialPost {
            post_id: "99".to_string(),
            author_name: "Someone".to_string(),
            author_handle: "someone".to_string(),
            author_avatar_data_uri: Some("data:image/png;base64,AV".to_string()),
            body_text: "line one\nline two".to_string(),
            created_at: Utc.with_ymd_and_hms(2022, 5, 2, 18, 5, 0).unwrap(),
            embedded_links: vec![EmbeddedLink {
                url: "https://www.youtube.com/watch?v=x".to_string(),
                title: "A video".to_string(),
                description: "About things".to_string(),
                thumbnail_data_uri: Some("data:image/png;base64,EM".to_string()),
            }],
            attached_media: vec![AttachedMedia {
                display_url: link_to_tweet("99"),
                thumbnail_data_uri: Some("data:image/png;base64,MD".to_string()),
            }],
            metrics: PostMetrics {
                replies: 1,
                retweets: 1200,
                likes: 34_567,
                quotes: 0,
            },
        };

        let html = render_post(&post);
        assert!(html.contains("<p>line one<br/>line two</p>"));
        assert!(html.contains(r#"<span style="color: #666666">@someone</span>"#));
        assert!(html.contains("6:05 PM · May 2, 2022 · <b>1,200</b> Retweets · <b>34,567</b> Likes"));
        assert!(html.contains(r#"<img src="data:image/png;base64,EM" />"#));
        assert!(html.contains(
            r#"<a href="https://twitter.com/twitter/status/99"><img src="data:image/png;base64,MD" /></a>"#
        ));
        assert_eq!(html, render_post(&post));
    }
}
