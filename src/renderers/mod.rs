//! Site-specific card renderers plus the metadata-only layouts.

pub mod generic;
pub mod steam;
pub mod twitter;
pub mod youtube;

pub use steam::SteamRenderer;
pub use twitter::TwitterRenderer;
pub use youtube::YouTubeRenderer;
