//! Replays each mapped channel's history into its target, one message at a
//! time, with the cursor persisted after every relayed message.

use std::collections::{HashMap, HashSet};

use serenity::all::{ChannelId, MessageId};
use tracing::{error, info, warn};

use super::emit::{Route, compose, route_attachment};
use super::pagination::{is_eligible, is_last_page, next_cursor, order_page};
use crate::context::RunContext;
use crate::error::StoreError;
use crate::models::{ChannelNode, SourceMessage};
use crate::platform::{Outgoing, OutgoingFile, Persona};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub completed: usize,
    /// Stopped early after repeated fetch failures; resumable.
    pub interrupted: usize,
    pub already_copied: usize,
    /// Mapped but the source or target channel no longer exists.
    pub missing: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelOutcome {
    Completed,
    Interrupted,
}

pub async fn migrate_content(ctx: &mut RunContext, source: &[ChannelNode]) -> Result<MigrationReport, StoreError> {
    info!("📥 Copying messages...");
    let names: HashMap<ChannelId, &str> = source.iter().map(|n| (n.id, n.name.as_str())).collect();

    let targets: Option<HashSet<ChannelId>> = match ctx.platform.list_channels(ctx.config.target_guild).await {
        Ok(channels) => Some(channels.iter().map(|c| c.id).collect()),
        Err(e) => {
            warn!("⚠️ Could not list target channels, not checking them: {}", e);
            None
        }
    };

    let pending = ctx.progress.pending_channels();
    let mut report = MigrationReport {
        already_copied: ctx.progress.text_channel_count() - pending.len(),
        ..MigrationReport::default()
    };
    if report.already_copied > 0 {
        info!("⏭️ {} channels already copied", report.already_copied);
    }

    for (source_id, target_id) in pending {
        let Some(name) = names.get(&source_id) else {
            warn!("⚠️ Source channel {} no longer exists, skipping", source_id);
            report.missing += 1;
            continue;
        };
        if targets.as_ref().is_some_and(|t| !t.contains(&target_id)) {
            warn!("⚠️ Target for #{} ({}) no longer exists, skipping", name, target_id);
            report.missing += 1;
            continue;
        }

        match migrate_channel(ctx, source_id, target_id, name).await? {
            ChannelOutcome::Completed => report.completed += 1,
            ChannelOutcome::Interrupted => report.interrupted += 1,
        }
        ctx.pause(ctx.config.pacing.channel).await;
    }

    Ok(report)
}

pub async fn migrate_channel(
    ctx: &mut RunContext,
    source: ChannelId,
    target: ChannelId,
    name: &str,
) -> Result<ChannelOutcome, StoreError> {
    let mut cursor = ctx.progress.channel_mut(source).cursor();
    info!("📂 Copying #{}{}", name, cursor.map(|c| format!(" from {c}")).unwrap_or_default());

    loop {
        let Some(raw) = fetch_page(ctx, source, cursor).await else {
            error!("✗ Giving up on #{} for this run, will resume from {:?}", name, cursor);
            ctx.checkpoint()?;
            return Ok(ChannelOutcome::Interrupted);
        };

        let fetched = raw.len();
        let next = next_cursor(cursor, &raw);

        for message in order_page(raw) {
            if cursor.is_some_and(|c| message.id <= c) {
                continue;
            }

            if is_eligible(&message) {
                let files = relay_message(ctx, target, &message).await;
                ctx.progress.record_emitted(source, message.id, files);
                ctx.checkpoint()?;
                ctx.note_relayed().await;
                ctx.pause(ctx.config.pacing.message).await;
            } else {
                ctx.progress.record_skipped(source, message.id);
            }
            cursor = Some(message.id);
        }

        cursor = next;
        ctx.checkpoint()?;

        if is_last_page(fetched, ctx.config.page_size) {
            break;
        }
        info!("📥 Fetched {} messages from #{}", fetched, name);
        ctx.pause(ctx.config.pacing.page).await;
    }

    ctx.progress.mark_copied(source);
    ctx.checkpoint()?;
    ctx.sync_remote().await;

    let count = ctx.progress.channel(source).map_or(0, |p| p.message_count);
    info!("✅ Finished #{} ({} messages)", name, count);
    Ok(ChannelOutcome::Completed)
}

/// One page, retried with backoff. `None` once the retries are used up.
async fn fetch_page(ctx: &RunContext, channel: ChannelId, cursor: Option<MessageId>) -> Option<Vec<SourceMessage>> {
    let attempts = ctx.config.fetch_retries.max(1);
    for attempt in 1..=attempts {
        match ctx.platform.fetch_page(channel, cursor, ctx.config.page_size).await {
            Ok(page) => return Some(page),
            Err(e) => {
                warn!("⚠️ Error fetching messages in {} (attempt {}/{}): {}", channel, attempt, attempts, e);
                if attempt < attempts {
                    ctx.pause(ctx.config.pacing.backoff(attempt)).await;
                }
            }
        }
    }
    None
}

/// Posts one message into `target`. Returns how many files were uploaded.
///
/// A failed webhook post is retried as a plain send. Send failures are
/// logged and swallowed; the caller advances past the message either way.
async fn relay_message(ctx: &mut RunContext, target: ChannelId, message: &SourceMessage) -> u64 {
    let max_bytes = ctx.config.max_attachment_bytes;
    let mut files = Vec::new();
    let mut links = Vec::new();

    for (index, attachment) in message.attachments.iter().enumerate() {
        match route_attachment(attachment, max_bytes) {
            Route::Link => {
                info!(
                    "    ⚠️ Too heavy: {} ({:.2}MB), saving link",
                    attachment.filename,
                    attachment.size as f64 / 1_000_000.0
                );
                links.push(attachment.url.clone());
            }
            Route::Upload => match ctx.platform.download(&attachment.url, max_bytes).await {
                Ok(data) => files.push(OutgoingFile {
                    name: ctx.config.attachment_naming.file_name(&attachment.filename, message.id, index),
                    data,
                }),
                Err(e) => {
                    warn!("    ⚠️ Download failed: {} ({}), saving link", attachment.filename, e);
                    links.push(attachment.url.clone());
                }
            },
        }
    }

    let uploaded = files.len() as u64;
    let hook = if ctx.config.use_webhooks {
        ctx.webhook_for(target).await
    } else {
        None
    };

    let persona = Persona::from(&message.author);

    for outgoing in compose(message, files, links, max_bytes) {
        let result = match &hook {
            Some(hook) => {
                let posted = Outgoing {
                    persona: Some(persona.clone()),
                    ..outgoing.clone()
                };
                match ctx.platform.send_via_webhook(hook, posted).await {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        warn!("    ⚠️ Webhook post failed for {} ({}), sending directly", message.id, e);
                        ctx.platform.send(target, outgoing).await
                    }
                }
            }
            None => ctx.platform.send(target, outgoing).await,
        };
        if let Err(e) = result {
            warn!("    ✗ Could not relay message {}: {}", message.id, e);
            ctx.pause(ctx.config.pacing.error).await;
        }
        ctx.pause(ctx.config.pacing.call).await;
    }

    uploaded
}
