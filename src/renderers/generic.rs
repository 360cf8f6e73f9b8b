//! Cards that need nothing beyond page metadata or the link itself.

use crate::error::CardError;
use crate::format::escape_html;
use crate::models::LinkMetadata;

/// Thumbnail, bold linked title and description, built from metadata alone.
#[must_use]
pub fn render_generic(meta: &LinkMetadata) -> String {
    render_summary_table(
        &escape_html(&meta.url),
        meta.thumbnail(),
        &escape_html(&meta.title),
        &escape_html(&meta.description),
    )
}

/// Shared two-cell layout; inputs must already be escaped.
#[must_use]
pub fn render_summary_table(href: &str, thumbnail: &str, title: &str, description: &str) -> String {
    format!(
        r#"
        <table>
            <tr>
                <td>
                    <a href="{href}"><img src="{thumbnail}" /></a>
                </td>
                <td>
                    <a href="{href}"><b>{title}</b></a>
                    <p>{description}</p>
                </td>
            </tr>
        </table>
    "#
    )
}

/// Linked inline image.
#[must_use]
pub fn render_direct_image(url: &str, data_uri: &str) -> String {
    format!(
        r#"<a href="{}"><img src="{data_uri}" /></a>"#,
        escape_html(url)
    )
}

/// Thumbnail URL for a direct video, where the CDN has a known convention.
///
/// `https://i.4cdn.org/wsg/1651135239075.webm` has its preview at
/// `https://i.4cdn.org/wsg/1651135239075s.jpg`.
#[must_use]
pub fn video_thumbnail_url(url: &str) -> Option<String> {
    if url.contains("4cdn.org") {
        url.strip_suffix(".webm").map(|stem| format!("{stem}s.jpg"))
    } else {
        None
    }
}

/// Plaintext echo of a content type we have no card for.
#[must_use]
pub fn render_unhandled_mime(mime: &str) -> String {
    escape_html(mime)
}

/// Short notice shown when no card at all could be produced.
#[must_use]
pub fn render_failure(url: &str, err: &CardError) -> String {
    format!(
        "Could not create a card for {}: {}",
        escape_html(url),
        escape_html(&err.to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> LinkMetadata {
        let mut meta = LinkMetadata::empty("https://example.com/a?b=1&c=2");
        meta.title = "Fish & Chips".to_string();
        meta.description = "A <great> meal".to_string();
        meta.thumbnail_data_uri = Some("data:image/png;base64,AAAA".to_string());
        meta
    }

    #[test]
    fn test_generic_card_is_pure() {
        let meta = sample();
        assert_eq!(render_generic(&meta), render_generic(&meta));
    }

    #[test]
    fn test_generic_card_escapes_metadata() {
        let html = render_generic(&sample());
        assert!(html.contains("<b>Fish &amp; Chips</b>"));
        assert!(html.contains("A &lt;great&gt; meal"));
        assert!(html.contains(r#"href="https://example.com/a?b=1&amp;c=2""#));
        assert!(html.contains(r#"<img src="data:image/png;base64,AAAA" />"#));
    }

    #[test]
    fn test_video_thumbnail_convention() {
        assert_eq!(
            video_thumbnail_url("https://i.4cdn.org/wsg/1651135239075.webm").as_deref(),
            Some("https://i.4cdn.org/wsg/1651135239075s.jpg")
        );
        assert_eq!(video_thumbnail_url("https://i.4cdn.org/wsg/1.mp4"), None);
        assert_eq!(video_thumbnail_url("https://example.com/clip.webm"), None);
    }

    #[test]
    fn test_failure_notice_is_never_empty() {
        let err = CardError::unreachable("x", "connection refused");
        let notice = render_failure("http://127.0.0.1:1/", &err);
        assert!(notice.starts_with("Could not create a card for http://127.0.0.1:1/"));
    }
}
