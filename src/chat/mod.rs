//! # Chat Command Routing
//!
//! Inbound chat messages are matched against registered command patterns and
//! the first matching command produces the reply. The link command is the one
//! that turns URLs into cards.
//!
//! ## Message Flow
//!
//! 1. The transport delivers a [`ChatMessage`] (raw text plus the channels or
//!    sessions it was addressed to)
//! 2. [`CommandRouter::publish`] finds the first command whose pattern matches
//! 3. The handler renders a card for the captured URL
//! 4. The [`Reply`] is addressed back to where the message came from and
//!    handed to a [`ChatTransport`]
//!
//! ## Links From The Voice Server
//!
//! The voice server rewrites links into anchors before delivering them, so a
//! message body looks like `<a href="https://example.com">https://example.com</a>`.
//! The URL pattern stops at quotes and angle brackets so both raw and
//! anchored links match, and `&amp;` from the anchor is decoded back.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::card_factory::CardFactory;
use crate::error::{CardError, Result};

/// Pattern of the built-in link command. Only the first URL is used.
pub const URL_PATTERN: &str = r#"(?P<url>https?://[^\s"<>]+)"#;

/// A text message as received from the chat server.
#[derive(Debug, Clone, Default)]
pub struct ChatMessage {
    /// Display name of the sender; `None` for server messages
    pub sender: Option<String>,
    /// Channels the message was sent to
    pub channels: Vec<u32>,
    /// Sessions (users) the message was sent to directly
    pub sessions: Vec<u32>,
    pub text: String,
}

impl ChatMessage {
    /// Message typed at the local console, addressed to the root channel.
    #[must_use]
    pub fn console(text: impl Into<String>) -> Self {
        Self {
            sender: Some("console".to_string()),
            channels: vec![0],
            sessions: Vec::new(),
            text: text.into(),
        }
    }
}

/// Where a reply goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Channels(Vec<u32>),
    Sessions(Vec<u32>),
}

impl Destination {
    /// Channel messages are answered in the channel, direct messages directly.
    #[must_use]
    pub fn reply_to(msg: &ChatMessage) -> Self {
        if msg.channels.is_empty() {
            Self::Sessions(msg.sessions.clone())
        } else {
            Self::Channels(msg.channels.clone())
        }
    }
}

/// A rendered reply and its destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub html: String,
    pub destination: Destination,
}

/// Handles one command once its pattern matched.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Produces the reply body, or `None` to stay silent.
    async fn handle(&self, msg: &ChatMessage, captures: &HashMap<String, String>)
    -> Option<String>;
}

struct Command {
    name: String,
    pattern: Regex,
    usage: Option<String>,
    handler: Arc<dyn CommandHandler>,
}

/// Ordered list of commands; first match wins.
#[derive(Default)]
pub struct CommandRouter {
    commands: Vec<Command>,
}

impl CommandRouter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a command. Patterns are case-insensitive. A second
    /// registration under the same name is ignored.
    ///
    /// # Errors
    /// Returns [`CardError::Format`] when `pattern` is not a valid regex.
    pub fn subscribe(
        &mut self,
        name: &str,
        pattern: &str,
        usage: Option<&str>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<()> {
        if self.commands.iter().any(|c| c.name == name) {
            debug!("Command {} already registered", name);
            return Ok(());
        }

        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|_| CardError::format("command pattern", pattern))?;

        self.commands.push(Command {
            name: name.to_string(),
            pattern,
            usage: usage.map(str::to_string),
            handler,
        });
        Ok(())
    }

    /// `(name, usage)` of every command that documents one.
    #[must_use]
    pub fn usage(&self) -> Vec<(&str, &str)> {
        self.commands
            .iter()
            .filter_map(|c| c.usage.as_deref().map(|u| (c.name.as_str(), u)))
            .collect()
    }

    /// Runs the first command whose pattern matches `msg`.
    pub async fn publish(&self, msg: &ChatMessage) -> Option<Reply> {
        let (command, captures) = self.commands.iter().find_map(|command| {
            let caps = command.pattern.captures(&msg.text)?;
            let named = command
                .pattern
                .capture_names()
                .flatten()
                .filter_map(|name| caps.name(name).map(|m| (name.to_string(), m.as_str().to_string())))
                .collect::<HashMap<_, _>>();
            Some((command, named))
        })?;

        debug!("Message matched command {}", command.name);
        let html = command.handler.handle(msg, &captures).await?;

        Some(Reply {
            html,
            destination: Destination::reply_to(msg),
        })
    }
}

/// Replies to any URL with a card for it.
pub struct LinkCardCommand {
    factory: Arc<CardFactory>,
}

impl LinkCardCommand {
    #[must_use]
    pub const fn new(factory: Arc<CardFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl CommandHandler for LinkCardCommand {
    async fn handle(
        &self,
        _msg: &ChatMessage,
        captures: &HashMap<String, String>,
    ) -> Option<String> {
        let url = captures.get("url")?.replace("&amp;", "&");
        info!("Creating card for {}", url);
        Some(self.factory.create_card(&url).await)
    }
}

/// Router with the link command registered.
///
/// # Errors
/// Only if the built-in pattern fails to compile.
pub fn link_router(factory: Arc<CardFactory>) -> Result<CommandRouter> {
    let mut router = CommandRouter::new();
    router.subscribe(
        "link",
        URL_PATTERN,
        Some("Paste any link to get a preview card"),
        Arc::new(LinkCardCommand::new(factory)),
    )?;
    Ok(router)
}

/// Delivers replies to the chat server.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends `reply` to its destination.
    async fn send(&self, reply: &Reply) -> anyhow::Result<()>;
}

/// Writes replies to stdout, one block per reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send(&self, reply: &Reply) -> anyhow::Result<()> {
        let target = match &reply.destination {
            Destination::Channels(ids) => format!("channels {ids:?}"),
            Destination::Sessions(ids) => format!("sessions {ids:?}"),
        };

        if reply.html.trim().is_empty() {
            warn!("Empty card for {}", target);
        }

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(format!("--> {target}\n{}\n", reply.html).as_bytes())
            .await?;
        stdout.flush().await?;
        Ok(())
    }
}

/// Drops message tasks that already finished, logging any that panicked.
/// Returns how many were collected.
pub fn reap_finished(tasks: &mut JoinSet<()>) -> usize {
    let mut reaped = 0;
    while let Some(joined) = tasks.try_join_next() {
        if let Err(e) = joined {
            error!("Message task panicked: {}", e);
        }
        reaped += 1;
    }
    reaped
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl CommandHandler for Echo {
        async fn handle(
            &self,
            _msg: &ChatMessage,
            captures: &HashMap<String, String>,
        ) -> Option<String> {
            Some(format!("{}:{}", self.0, captures.get("url").cloned().unwrap_or_default()))
        }
    }

    fn router() -> CommandRouter {
        let mut router = CommandRouter::new();
        router
            .subscribe("first", URL_PATTERN, Some("links"), Arc::new(Echo("first")))
            .unwrap();
        router
            .subscribe("second", r"(?P<url>.+)", None, Arc::new(Echo("second")))
            .unwrap();
        router
    }

    #[tokio::test]
    async fn test_first_url_in_anchor_wins() {
        let msg = ChatMessage::console(
            r#"<a href="https://a.example/x?y=1">link</a> and https://b.example"#,
        );
        let reply = router().publish(&msg).await.unwrap();
        assert_eq!(reply.html, "first:https://a.example/x?y=1");
        assert_eq!(reply.destination, Destination::Channels(vec![0]));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_command() {
        let msg = ChatMessage::console("no links here");
        let reply = router().publish(&msg).await.unwrap();
        assert_eq!(reply.html, "second:no links here");
    }

    #[tokio::test]
    async fn test_pattern_is_case_insensitive() {
        let msg = ChatMessage::console("HTTPS://LOUD.EXAMPLE");
        let reply = router().publish(&msg).await.unwrap();
        assert_eq!(reply.html, "first:HTTPS://LOUD.EXAMPLE");
    }

    #[tokio::test]
    async fn test_direct_messages_reply_to_sessions() {
        let msg = ChatMessage {
            sender: Some("alice".to_string()),
            channels: Vec::new(),
            sessions: vec![7],
            text: "https://example.com".to_string(),
        };
        let reply = router().publish(&msg).await.unwrap();
        assert_eq!(reply.destination, Destination::Sessions(vec![7]));
    }

    #[test]
    fn test_duplicate_names_are_ignored() {
        let mut router = router();
        router
            .subscribe("first", "x", Some("dupe"), Arc::new(Echo("dupe")))
            .unwrap();
        assert_eq!(router.usage(), vec![("first", "links")]);
    }

    #[test]
    fn test_invalid_pattern_is_format_error() {
        let mut router = CommandRouter::new();
        let err = router
            .subscribe("bad", "(", None, Arc::new(Echo("bad")))
            .unwrap_err();
        assert!(matches!(err, CardError::Format { .. }));
    }

    #[tokio::test]
    async fn test_finished_tasks_are_reaped() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async {});
        tasks.spawn(async { panic!("boom") });
        tasks.spawn(std::future::pending::<()>());

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        assert_eq!(reap_finished(&mut tasks), 2);
        assert_eq!(tasks.len(), 1);
        tasks.abort_all();
    }
}
