//! Boundary to the chat platform.
//!
//! Everything the cloner does remotely goes through [`Platform`], so the
//! structure and content passes can run against an in-memory fake.

mod discord;

use async_trait::async_trait;
use serenity::all::{ChannelId, CreateEmbed, GuildId, MessageId, WebhookId};

use crate::error::PlatformError;
use crate::models::{Author, ChannelKind, ChannelNode, SourceMessage};

pub use discord::SerenityPlatform;

/// Everything needed to create one category or channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChannel {
    pub name: String,
    pub kind: ChannelKind,
    pub parent: Option<ChannelId>,
    pub position: u16,
    pub topic: Option<String>,
    pub nsfw: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Display name and avatar used when posting through a webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub username: String,
    pub avatar_url: Option<String>,
}

/// Substrings webhook usernames may not contain, matched without case.
pub const RESERVED_NAMES: [&str; 2] = ["discord", "clyde"];
pub const MAX_USERNAME_CHARS: usize = 80;

impl From<&Author> for Persona {
    fn from(author: &Author) -> Self {
        Self {
            username: webhook_username(&author.name),
            avatar_url: author.avatar_url.clone(),
        }
    }
}

/// Makes a display name acceptable as a webhook username: reserved words are
/// broken up with an underscore, the result is capped at
/// [`MAX_USERNAME_CHARS`] and never empty.
pub fn webhook_username(name: &str) -> String {
    let mut username = name.trim().to_string();
    for word in RESERVED_NAMES {
        let mut from = 0;
        while let Some(found) = username[from..].to_ascii_lowercase().find(word) {
            let at = from + found;
            username.insert(at + 1, '_');
            from = at + word.len() + 1;
        }
    }

    let username: String = username.chars().take(MAX_USERNAME_CHARS).collect();
    if username.trim().is_empty() {
        "Unknown".to_string()
    } else {
        username
    }
}

/// One message to post into a target channel.
#[derive(Debug, Clone, Default)]
pub struct Outgoing {
    pub content: Option<String>,
    pub files: Vec<OutgoingFile>,
    pub embeds: Vec<CreateEmbed>,
    pub persona: Option<Persona>,
}

impl Outgoing {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WebhookHandle {
    pub id: WebhookId,
}

#[async_trait]
pub trait Platform: Send + Sync {
    /// Resolves a guild, returning its name.
    async fn guild_name(&self, guild: GuildId) -> Result<String, PlatformError>;

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelNode>, PlatformError>;

    async fn create_channel(&self, guild: GuildId, request: &NewChannel) -> Result<ChannelId, PlatformError>;

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError>;

    /// Up to `limit` messages strictly newer than `after` (or from the very
    /// beginning when `after` is `None`). Order within the page is whatever
    /// the platform returns.
    async fn fetch_page(
        &self,
        channel: ChannelId,
        after: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<SourceMessage>, PlatformError>;

    async fn send(&self, channel: ChannelId, message: Outgoing) -> Result<(), PlatformError>;

    async fn create_webhook(&self, channel: ChannelId, name: &str) -> Result<WebhookHandle, PlatformError>;

    async fn send_via_webhook(&self, hook: &WebhookHandle, message: Outgoing) -> Result<(), PlatformError>;

    /// Downloads an attachment, refusing bodies larger than `max_bytes`.
    async fn download(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, PlatformError>;
}

#[cfg(test)]
pub mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeState {
        pub guilds: HashMap<GuildId, String>,
        pub channels: Vec<(GuildId, ChannelNode)>,
        /// Ascending by id.
        pub messages: HashMap<ChannelId, Vec<SourceMessage>>,
        pub created: Vec<(GuildId, NewChannel)>,
        pub deleted: Vec<ChannelId>,
        pub fetches: Vec<(ChannelId, Option<MessageId>)>,
        pub sent: Vec<(ChannelId, Outgoing)>,
        pub webhook_sent: Vec<(WebhookId, Outgoing)>,
        pub webhooks: HashMap<WebhookId, ChannelId>,
        pub downloads: Vec<String>,
        pub fail_create: HashSet<String>,
        pub fail_send_content: HashSet<String>,
        pub fail_download: HashSet<String>,
        pub fail_fetches: u32,
        pub fail_webhooks: bool,
        pub fail_webhook_posts: bool,
        next_id: u64,
    }

    pub struct FakePlatform {
        pub state: Mutex<FakeState>,
    }

    impl FakePlatform {
        pub fn new(source: GuildId, target: GuildId) -> Self {
            let mut state = FakeState {
                next_id: 10_000,
                ..FakeState::default()
            };
            state.guilds.insert(source, "source".to_string());
            state.guilds.insert(target, "target".to_string());
            Self {
                state: Mutex::new(state),
            }
        }

        pub fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
            let mut state = self.state.lock().unwrap();
            f(&mut *state)
        }

        pub fn add_channel(&self, guild: GuildId, node: ChannelNode) {
            self.with(|s| s.channels.push((guild, node)));
        }

        pub fn add_messages(&self, channel: ChannelId, messages: Vec<SourceMessage>) {
            self.with(|s| {
                let list = s.messages.entry(channel).or_default();
                list.extend(messages);
                list.sort_by_key(|m| m.id);
            });
        }

        pub fn sent_to(&self, channel: ChannelId) -> Vec<Outgoing> {
            self.with(|s| {
                s.sent
                    .iter()
                    .filter(|(c, _)| *c == channel)
                    .map(|(_, o)| o.clone())
                    .collect()
            })
        }
    }

    pub fn node(id: u64, name: &str, kind: ChannelKind, parent: Option<u64>, position: u16) -> ChannelNode {
        ChannelNode {
            id: ChannelId::new(id),
            name: name.to_string(),
            kind,
            parent_id: parent.map(ChannelId::new),
            position,
            topic: None,
            nsfw: false,
        }
    }

    /// Whether the platform would refuse `username` for a webhook post.
    pub fn is_reserved_username(username: &str) -> bool {
        let lower = username.to_ascii_lowercase();
        RESERVED_NAMES.iter().any(|word| lower.contains(word))
    }

    pub fn message(id: u64, content: &str) -> SourceMessage {
        SourceMessage {
            id: MessageId::new(id),
            author: Author {
                name: "someone".to_string(),
                avatar_url: None,
                bot: false,
            },
            is_system: false,
            content: content.to_string(),
            attachments: Vec::new(),
            embeds: Vec::new(),
        }
    }

    #[async_trait]
    impl Platform for FakePlatform {
        async fn guild_name(&self, guild: GuildId) -> Result<String, PlatformError> {
            self.with(|s| s.guilds.get(&guild).cloned())
                .ok_or_else(|| PlatformError::Rejected(format!("unknown guild {guild}")))
        }

        async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelNode>, PlatformError> {
            Ok(self.with(|s| {
                s.channels
                    .iter()
                    .filter(|(g, _)| *g == guild)
                    .map(|(_, n)| n.clone())
                    .collect()
            }))
        }

        async fn create_channel(&self, guild: GuildId, request: &NewChannel) -> Result<ChannelId, PlatformError> {
            self.with(|s| {
                if s.fail_create.contains(&request.name) {
                    return Err(PlatformError::Rejected(format!("cannot create {}", request.name)));
                }
                s.next_id += 1;
                let id = ChannelId::new(s.next_id);
                s.channels.push((
                    guild,
                    ChannelNode {
                        id,
                        name: request.name.clone(),
                        kind: request.kind,
                        parent_id: request.parent,
                        position: request.position,
                        topic: request.topic.clone(),
                        nsfw: request.nsfw,
                    },
                ));
                s.created.push((guild, request.clone()));
                Ok(id)
            })
        }

        async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
            self.with(|s| {
                s.channels.retain(|(_, n)| n.id != channel);
                s.deleted.push(channel);
            });
            Ok(())
        }

        async fn fetch_page(
            &self,
            channel: ChannelId,
            after: Option<MessageId>,
            limit: u8,
        ) -> Result<Vec<SourceMessage>, PlatformError> {
            self.with(|s| {
                s.fetches.push((channel, after));
                if s.fail_fetches > 0 {
                    s.fail_fetches -= 1;
                    return Err(PlatformError::Rejected("fetch failed".to_string()));
                }
                let mut page: Vec<SourceMessage> = s
                    .messages
                    .get(&channel)
                    .map(|all| {
                        all.iter()
                            .filter(|m| after.is_none_or(|a| m.id > a))
                            .take(limit as usize)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                // Newest first, like the real API.
                page.reverse();
                Ok(page)
            })
        }

        async fn send(&self, channel: ChannelId, message: Outgoing) -> Result<(), PlatformError> {
            self.with(|s| {
                if let Some(content) = &message.content {
                    if s.fail_send_content.contains(content) {
                        return Err(PlatformError::Rejected("send failed".to_string()));
                    }
                }
                s.sent.push((channel, message));
                Ok(())
            })
        }

        async fn create_webhook(&self, channel: ChannelId, _name: &str) -> Result<WebhookHandle, PlatformError> {
            self.with(|s| {
                if s.fail_webhooks {
                    return Err(PlatformError::Rejected("missing permission".to_string()));
                }
                s.next_id += 1;
                let id = WebhookId::new(s.next_id);
                s.webhooks.insert(id, channel);
                Ok(WebhookHandle { id })
            })
        }

        async fn send_via_webhook(&self, hook: &WebhookHandle, message: Outgoing) -> Result<(), PlatformError> {
            self.with(|s| {
                if !s.webhooks.contains_key(&hook.id) {
                    return Err(PlatformError::UnknownWebhook(hook.id));
                }
                if s.fail_webhook_posts {
                    return Err(PlatformError::Rejected("webhook post failed".to_string()));
                }
                if let Some(persona) = &message.persona {
                    if is_reserved_username(&persona.username) {
                        return Err(PlatformError::Rejected(format!("invalid username {}", persona.username)));
                    }
                }
                s.webhook_sent.push((hook.id, message));
                Ok(())
            })
        }

        async fn download(&self, url: &str, _max_bytes: u64) -> Result<Vec<u8>, PlatformError> {
            self.with(|s| {
                s.downloads.push(url.to_string());
                if s.fail_download.contains(url) {
                    return Err(PlatformError::Rejected(format!("cannot download {url}")));
                }
                Ok(url.as_bytes().to_vec())
            })
        }
    }
}
