use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::all::{
    ChannelId, ChannelType, CreateAttachment, CreateChannel, CreateEmbed, CreateMessage, CreateWebhook,
    ExecuteWebhook, GetMessages, GuildChannel, GuildId, Http, Message, MessageId, MessageType, Webhook,
    WebhookId,
};
use tokio::sync::Mutex;

use super::{NewChannel, Outgoing, OutgoingFile, Platform, WebhookHandle};
use crate::error::PlatformError;
use crate::models::{AttachmentRef, Author, ChannelKind, ChannelNode, SourceMessage};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// [`Platform`] over the Discord REST API.
pub struct SerenityPlatform {
    http: Arc<Http>,
    client: reqwest::Client,
    webhooks: Mutex<HashMap<WebhookId, Webhook>>,
}

impl SerenityPlatform {
    pub fn new(token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self {
            http: Arc::new(Http::new(token)),
            client,
            webhooks: Mutex::new(HashMap::new()),
        }
    }
}

fn channel_kind(kind: ChannelType) -> Option<ChannelKind> {
    match kind {
        ChannelType::Category => Some(ChannelKind::Category),
        ChannelType::Text => Some(ChannelKind::Text),
        ChannelType::Voice => Some(ChannelKind::Voice),
        _ => None,
    }
}

fn channel_type(kind: ChannelKind) -> ChannelType {
    match kind {
        ChannelKind::Category => ChannelType::Category,
        ChannelKind::Text => ChannelType::Text,
        ChannelKind::Voice => ChannelType::Voice,
    }
}

fn channel_node(channel: &GuildChannel) -> Option<ChannelNode> {
    Some(ChannelNode {
        id: channel.id,
        name: channel.name.clone(),
        kind: channel_kind(channel.kind)?,
        parent_id: channel.parent_id,
        position: channel.position,
        topic: channel.topic.clone().filter(|t| !t.is_empty()),
        nsfw: channel.nsfw,
    })
}

fn source_message(msg: &Message) -> SourceMessage {
    SourceMessage {
        id: msg.id,
        author: Author {
            name: msg
                .author
                .global_name
                .clone()
                .unwrap_or_else(|| msg.author.name.clone()),
            avatar_url: msg.author.avatar_url(),
            bot: msg.author.bot,
        },
        is_system: !matches!(msg.kind, MessageType::Regular | MessageType::InlineReply),
        content: msg.content.clone(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| AttachmentRef {
                url: a.url.clone(),
                size: u64::from(a.size),
                filename: a.filename.clone(),
            })
            .collect(),
        embeds: msg.embeds.iter().cloned().map(CreateEmbed::from).collect(),
    }
}

fn attachments(files: Vec<OutgoingFile>) -> Vec<CreateAttachment> {
    files
        .into_iter()
        .map(|f| CreateAttachment::bytes(f.data, f.name))
        .collect()
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn guild_name(&self, guild: GuildId) -> Result<String, PlatformError> {
        Ok(self.http.get_guild(guild).await?.name)
    }

    async fn list_channels(&self, guild: GuildId) -> Result<Vec<ChannelNode>, PlatformError> {
        let channels = guild.channels(self.http.as_ref()).await?;
        let mut nodes: Vec<_> = channels.values().filter_map(channel_node).collect();
        // The API hands back a map; id order keeps the listing deterministic.
        nodes.sort_by_key(|n| n.id);
        Ok(nodes)
    }

    async fn create_channel(&self, guild: GuildId, request: &NewChannel) -> Result<ChannelId, PlatformError> {
        let mut builder = CreateChannel::new(request.name.clone())
            .kind(channel_type(request.kind))
            .position(request.position);
        if let Some(parent) = request.parent {
            builder = builder.category(parent);
        }
        if let Some(topic) = &request.topic {
            builder = builder.topic(topic.clone());
        }
        if request.nsfw {
            builder = builder.nsfw(true);
        }

        let created = guild.create_channel(self.http.as_ref(), builder).await?;
        Ok(created.id)
    }

    async fn delete_channel(&self, channel: ChannelId) -> Result<(), PlatformError> {
        channel.delete(self.http.as_ref()).await?;
        Ok(())
    }

    async fn fetch_page(
        &self,
        channel: ChannelId,
        after: Option<MessageId>,
        limit: u8,
    ) -> Result<Vec<SourceMessage>, PlatformError> {
        // Snowflake 1 predates every real message.
        let request = GetMessages::new()
            .after(after.unwrap_or(MessageId::new(1)))
            .limit(limit);

        let messages = channel.messages(self.http.as_ref(), request).await?;
        Ok(messages.iter().map(source_message).collect())
    }

    async fn send(&self, channel: ChannelId, message: Outgoing) -> Result<(), PlatformError> {
        let mut builder = CreateMessage::new();
        if let Some(content) = message.content {
            builder = builder.content(content);
        }
        if !message.embeds.is_empty() {
            builder = builder.embeds(message.embeds);
        }
        builder = builder.add_files(attachments(message.files));

        channel.send_message(self.http.as_ref(), builder).await?;
        Ok(())
    }

    async fn create_webhook(&self, channel: ChannelId, name: &str) -> Result<WebhookHandle, PlatformError> {
        let webhook = channel
            .create_webhook(self.http.as_ref(), CreateWebhook::new(name))
            .await?;
        let id = webhook.id;
        self.webhooks.lock().await.insert(id, webhook);
        Ok(WebhookHandle { id })
    }

    async fn send_via_webhook(&self, hook: &WebhookHandle, message: Outgoing) -> Result<(), PlatformError> {
        let webhook = self
            .webhooks
            .lock()
            .await
            .get(&hook.id)
            .cloned()
            .ok_or(PlatformError::UnknownWebhook(hook.id))?;

        let mut builder = ExecuteWebhook::new();
        if let Some(content) = message.content {
            builder = builder.content(content);
        }
        if !message.embeds.is_empty() {
            builder = builder.embeds(message.embeds);
        }
        if let Some(persona) = message.persona {
            builder = builder.username(persona.username);
            if let Some(avatar) = persona.avatar_url {
                builder = builder.avatar_url(avatar);
            }
        }
        builder = builder.add_files(attachments(message.files));

        webhook.execute(self.http.as_ref(), false, builder).await?;
        Ok(())
    }

    async fn download(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, PlatformError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        if let Some(size) = response.content_length().filter(|&len| len > max_bytes) {
            return Err(PlatformError::TooLarge { size, limit: max_bytes });
        }

        let bytes = response.bytes().await?;
        let size = bytes.len() as u64;
        if size > max_bytes {
            return Err(PlatformError::TooLarge { size, limit: max_bytes });
        }
        Ok(bytes.to_vec())
    }
}
