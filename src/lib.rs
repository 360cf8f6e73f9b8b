//! Link cards for voice-chat servers.
//!
//! Watches chat text for URLs and answers with a small HTML card describing
//! the linked page, with dedicated layouts for YouTube, Twitter and Steam and
//! a metadata-driven card for everything else.

pub mod card_factory;
pub mod chat;
pub mod config;
pub mod duration;
pub mod error;
pub mod format;
pub mod metadata;
pub mod models;
pub mod renderers;
pub mod thumbnails;
pub mod traits;

pub use card_factory::{CardFactory, ContentKind};
pub use chat::{ChatMessage, ChatTransport, CommandRouter, ConsoleTransport, Destination, Reply};
pub use config::{Config, Endpoints};
pub use error::{CardError, Result};
pub use models::LinkMetadata;
