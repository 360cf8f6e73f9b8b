//! Traits and interfaces for site-specific card rendering

use async_trait::async_trait;

use crate::error::Result;
use crate::models::LinkMetadata;

/// A renderer that owns one site's upstream data and card layout.
///
/// The card factory asks renderers in registration order whether they claim
/// a page; the first that does renders it.
#[async_trait]
pub trait SiteRenderer: Send + Sync {
    /// Display name used in logs
    fn name(&self) -> &'static str;

    /// Whether this renderer handles the page described by `meta`
    fn claims(&self, meta: &LinkMetadata) -> bool;

    /// Fetches whatever the site needs and renders the card
    ///
    /// # Returns
    /// * `Result<String>` - HTML fragment or the failure that sends the
    ///   factory to its generic fallback
    async fn render(&self, meta: &LinkMetadata) -> Result<String>;

    /// Encodes a query value the way the site's endpoints expect
    fn encode_param(&self, value: &str) -> String {
        urlencoding::encode(value).into_owned()
    }
}
