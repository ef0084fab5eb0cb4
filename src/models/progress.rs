//! Resumable bookkeeping for a clone run.
//!
//! The whole [`ProgressStore`] is rewritten to disk after every mutation, so
//! everything here is plain data plus small state transitions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serenity::all::{ChannelId, MessageId};

use super::channel::ChannelKind;
use super::snowflake;

pub const STATE_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMapping {
    #[serde(with = "snowflake")]
    pub target: u64,
    pub kind: ChannelKind,
}

impl ChannelMapping {
    pub fn target_id(&self) -> ChannelId {
        ChannelId::new(self.target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelProgress {
    #[serde(default)]
    pub copied: bool,
    #[serde(default, with = "snowflake::option")]
    pub last_seen_message_id: Option<u64>,
    #[serde(default)]
    pub message_count: u64,
}

impl ChannelProgress {
    pub fn cursor(&self) -> Option<MessageId> {
        self.last_seen_message_id.filter(|&id| id != 0).map(MessageId::new)
    }

    /// Moves the cursor forward to `id`. Older ids are ignored.
    pub fn advance(&mut self, id: MessageId) {
        if self.last_seen_message_id.is_none_or(|seen| id.get() > seen) {
            self.last_seen_message_id = Some(id.get());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    #[serde(default)]
    pub messages: u64,
    #[serde(default)]
    pub files: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressStore {
    pub version: u32,
    /// Source channel id to the channel created for it in the target server.
    #[serde(default)]
    pub mappings: BTreeMap<u64, ChannelMapping>,
    #[serde(default)]
    pub channels: BTreeMap<u64, ChannelProgress>,
    #[serde(default)]
    pub stats: Totals,
}

impl Default for ProgressStore {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            mappings: BTreeMap::new(),
            channels: BTreeMap::new(),
            stats: Totals::default(),
        }
    }
}

impl ProgressStore {
    /// Parses a state document, upgrading the legacy shape when there is no
    /// `version` field.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(document)?;
        if value.get("version").is_some() {
            serde_json::from_value(value)
        } else {
            upgrade_legacy(value)
        }
    }

    pub fn has_structure(&self) -> bool {
        !self.mappings.is_empty()
    }

    pub fn map_channel(&mut self, source: ChannelId, target: ChannelId, kind: ChannelKind) {
        self.mappings.entry(source.get()).or_insert(ChannelMapping {
            target: target.get(),
            kind,
        });
    }

    pub fn target_of(&self, source: ChannelId) -> Option<ChannelId> {
        self.mappings.get(&source.get()).map(ChannelMapping::target_id)
    }

    /// Progress for `source`, created on first visit.
    pub fn channel_mut(&mut self, source: ChannelId) -> &mut ChannelProgress {
        self.channels.entry(source.get()).or_default()
    }

    pub fn channel(&self, source: ChannelId) -> Option<&ChannelProgress> {
        self.channels.get(&source.get())
    }

    pub fn is_copied(&self, source: ChannelId) -> bool {
        self.channel(source).is_some_and(|p| p.copied)
    }

    /// Text mappings whose content has not been fully copied yet.
    pub fn pending_channels(&self) -> Vec<(ChannelId, ChannelId)> {
        self.mappings
            .iter()
            .filter(|(_, m)| m.kind == ChannelKind::Text && m.target != 0)
            .filter(|&(&source, _)| source != 0)
            .map(|(&source, m)| (ChannelId::new(source), m.target_id()))
            .filter(|(source, _)| !self.is_copied(*source))
            .collect()
    }

    pub fn text_channel_count(&self) -> usize {
        self.mappings
            .values()
            .filter(|m| m.kind == ChannelKind::Text)
            .count()
    }

    pub fn record_emitted(&mut self, source: ChannelId, id: MessageId, files: u64) {
        let progress = self.channel_mut(source);
        progress.advance(id);
        progress.message_count += 1;
        self.stats.messages += 1;
        self.stats.files += files;
    }

    /// Moves past a message that was filtered out without counting it.
    pub fn record_skipped(&mut self, source: ChannelId, id: MessageId) {
        self.channel_mut(source).advance(id);
    }

    pub fn mark_copied(&mut self, source: ChannelId) {
        self.channel_mut(source).copied = true;
    }
}

#[derive(Deserialize)]
struct LegacyDocument {
    #[serde(default)]
    channels: BTreeMap<u64, LegacyEntry>,
    #[serde(default)]
    stats: Totals,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyEntry {
    Target(#[serde(deserialize_with = "snowflake::deserialize")] u64),
    Progress {
        #[serde(default)]
        copied: bool,
        #[serde(default, rename = "lastId", deserialize_with = "snowflake::option::deserialize")]
        last_id: Option<u64>,
        #[serde(default)]
        count: u64,
        #[serde(
            default,
            rename = "targetId",
            alias = "target",
            deserialize_with = "snowflake::option::deserialize"
        )]
        target: Option<u64>,
    },
}

/// Converts the older single-map document, where a channel entry was either
/// a bare target id or a `{copied, lastId, count}` object, into the current
/// record. Entries pointing at id 0 are dropped.
///
/// The old cursor tracked the newest message seen, not the last one relayed,
/// so an unfinished channel may have a gap behind it. Unfinished entries keep
/// their count but restart from the beginning of the channel.
pub fn upgrade_legacy(value: Value) -> Result<ProgressStore, serde_json::Error> {
    let legacy: LegacyDocument = serde_json::from_value(value)?;
    let mut store = ProgressStore {
        stats: legacy.stats,
        ..ProgressStore::default()
    };

    for (source, entry) in legacy.channels {
        if source == 0 {
            continue;
        }
        match entry {
            LegacyEntry::Target(target) => {
                if target != 0 {
                    store.mappings.insert(source, ChannelMapping { target, kind: ChannelKind::Text });
                }
            }
            LegacyEntry::Progress {
                copied,
                last_id,
                count,
                target,
            } => {
                if let Some(target) = target.filter(|&t| t != 0) {
                    store.mappings.insert(source, ChannelMapping { target, kind: ChannelKind::Text });
                }
                store.channels.insert(
                    source,
                    ChannelProgress {
                        copied,
                        last_seen_message_id: last_id.filter(|&id| copied && id != 0),
                        message_count: count,
                    },
                );
            }
        }
    }

    Ok(store)
}
