use serenity::all::{CreateEmbed, MessageId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub url: String,
    pub size: u64,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub name: String,
    pub avatar_url: Option<String>,
    pub bot: bool,
}

/// A message read from a source channel, reduced to what gets relayed.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: MessageId,
    pub author: Author,
    pub is_system: bool,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub embeds: Vec<CreateEmbed>,
}

impl SourceMessage {
    pub fn has_text(&self) -> bool {
        !self.content.trim().is_empty()
    }

    /// True when there is nothing to relay at all.
    pub fn is_empty(&self) -> bool {
        !self.has_text() && self.attachments.is_empty() && self.embeds.is_empty()
    }
}
