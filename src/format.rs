//! Small formatting helpers shared by the card renderers.

use chrono::{DateTime, TimeZone};

/// Longest description rendered on a card, in characters.
pub const DESCRIPTION_LIMIT: usize = 200;

const ELLIPSIS: &str = "...";

/// Trims `text` to [`DESCRIPTION_LIMIT`] characters, appending `...` when cut.
#[must_use]
pub fn truncate_description(text: &str) -> String {
    match text.char_indices().nth(DESCRIPTION_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &text[..cut]),
        None => text.to_string(),
    }
}

/// Like [`truncate_description`], for text that is already HTML-escaped.
/// A cut that would land inside an entity such as `&amp;` moves back to
/// before its `&`.
#[must_use]
pub fn truncate_escaped_description(text: &str) -> String {
    let Some((cut, _)) = text.char_indices().nth(DESCRIPTION_LIMIT) else {
        return text.to_string();
    };

    let kept = &text[..cut];
    let cut = match kept.rfind('&') {
        Some(amp) if is_entity_prefix(&kept[amp..]) && entity_len(&text[amp..]).is_some() => {
            amp
        }
        _ => cut,
    };
    format!("{}{ELLIPSIS}", &text[..cut])
}

/// `&`, then entity name characters only: no terminating `;` yet.
fn is_entity_prefix(fragment: &str) -> bool {
    fragment[1..]
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '#')
}

/// Byte length of the entity starting at `text`, if it is one.
fn entity_len(text: &str) -> Option<usize> {
    let end = text.find(';')?;
    let name = &text[1..end];
    (!name.is_empty()
        && name.len() <= 32
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '#'))
    .then_some(end + 1)
}

/// Human readable price: `Free`, `Not Available` or `$19.99`.
#[must_use]
pub fn format_price(is_free: bool, price_cents: Option<u64>) -> String {
    if is_free {
        return "Free".to_string();
    }

    price_cents.map_or_else(
        || "Not Available".to_string(),
        |cents| format!("${}.{:02}", with_thousands(cents / 100), cents % 100),
    )
}

/// `-50%`, or an empty string when there is no discount.
#[must_use]
pub fn format_discount(discount_percent: u32) -> String {
    if discount_percent == 0 {
        String::new()
    } else {
        format!("-{discount_percent}%")
    }
}

/// Groups digits with commas: `1234567` becomes `1,234,567`.
#[must_use]
pub fn with_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Escapes text for interpolation into HTML content or attribute values.
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Converts newlines to `<br/>`.
#[must_use]
pub fn nl2br(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "<br/>")
}

/// Twitter-style timestamp, e.g. `6:30 AM · May 2, 2022`.
#[must_use]
pub fn pretty_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%-I:%M %p · %B %-d, %Y").to_string()
}

/// Date only, e.g. `May 2, 2022`.
#[must_use]
pub fn pretty_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%B %-d, %Y").to_string()
}
