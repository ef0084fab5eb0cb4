//! Recreates the category/channel layout of the source server in the target.

use std::collections::HashMap;

use serenity::all::ChannelId;
use tracing::{info, warn};

use crate::context::RunContext;
use crate::error::{PlatformError, StoreError};
use crate::models::{ChannelKind, ChannelNode, siblings};
use crate::platform::NewChannel;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StructureReport {
    /// The target already had a recorded layout; nothing was touched.
    pub skipped: bool,
    pub deleted: usize,
    pub created: usize,
    pub failed: usize,
}

pub async fn mirror_structure(ctx: &mut RunContext, source: &[ChannelNode]) -> Result<StructureReport, StoreError> {
    let mut report = StructureReport::default();

    if ctx.progress.has_structure() {
        info!("⏭️ Structure already cloned ({} mappings), skipping", ctx.progress.mappings.len());
        report.skipped = true;
        return Ok(report);
    }

    if ctx.config.start_fresh {
        clear_target(ctx, &mut report).await;
    }

    info!("📁 Cloning structure...");
    let mut categories: HashMap<ChannelId, ChannelId> = HashMap::new();

    for category in siblings(source, ChannelKind::Category, None) {
        if let Some(created) = create(ctx, category, None, &mut report).await {
            ctx.progress.map_channel(category.id, created, ChannelKind::Category);
            categories.insert(category.id, created);
            info!("  ✓ Category: {}", category.name);
        }
    }

    for category in siblings(source, ChannelKind::Category, None) {
        // A category that failed to create takes its children with it.
        let Some(&parent) = categories.get(&category.id) else {
            continue;
        };
        mirror_children(ctx, source, Some(category.id), Some(parent), &mut report).await;
    }

    mirror_children(ctx, source, None, None, &mut report).await;

    ctx.checkpoint()?;
    info!(
        "✅ Structure cloned: {} created, {} failed",
        report.created, report.failed
    );
    Ok(report)
}

async fn mirror_children(
    ctx: &mut RunContext,
    source: &[ChannelNode],
    source_parent: Option<ChannelId>,
    target_parent: Option<ChannelId>,
    report: &mut StructureReport,
) {
    for channel in siblings(source, ChannelKind::Text, source_parent) {
        if let Some(created) = create(ctx, channel, target_parent, report).await {
            ctx.progress.map_channel(channel.id, created, ChannelKind::Text);
            info!("  ✓ Channel: {}", channel.name);
        }
    }

    // Content is never copied into voice channels, so they stay unmapped.
    for channel in siblings(source, ChannelKind::Voice, source_parent) {
        if create(ctx, channel, target_parent, report).await.is_some() {
            info!("  ✓ Voice: {}", channel.name);
        }
    }
}

fn new_channel(ctx: &RunContext, node: &ChannelNode, parent: Option<ChannelId>) -> NewChannel {
    let is_text = node.kind == ChannelKind::Text;
    NewChannel {
        name: node.name.clone(),
        kind: node.kind,
        parent,
        position: node.position,
        topic: node.topic.clone().filter(|t| is_text && !t.is_empty()),
        nsfw: is_text && ctx.config.mark_nsfw,
    }
}

async fn create(
    ctx: &RunContext,
    node: &ChannelNode,
    parent: Option<ChannelId>,
    report: &mut StructureReport,
) -> Option<ChannelId> {
    let request = new_channel(ctx, node, parent);
    let result: Result<ChannelId, PlatformError> = ctx.platform.create_channel(ctx.config.target_guild, &request).await;
    ctx.pause(ctx.config.pacing.call).await;

    match result {
        Ok(id) => {
            report.created += 1;
            Some(id)
        }
        Err(e) => {
            warn!("  ✗ Could not create {}: {}", node.name, e);
            report.failed += 1;
            None
        }
    }
}

async fn clear_target(ctx: &RunContext, report: &mut StructureReport) {
    info!("🗑️ Deleting old channels...");
    let existing = match ctx.platform.list_channels(ctx.config.target_guild).await {
        Ok(existing) => existing,
        Err(e) => {
            warn!("  ✗ Could not list target channels: {}", e);
            return;
        }
    };

    for channel in existing {
        match ctx.platform.delete_channel(channel.id).await {
            Ok(()) => {
                report.deleted += 1;
                info!("  ✓ Deleted: {}", channel.name);
            }
            Err(e) => warn!("  ✗ Could not delete {}: {}", channel.name, e),
        }
        ctx.pause(ctx.config.pacing.call).await;
    }

    ctx.pause(ctx.config.pacing.page).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::{SOURCE, TARGET, context, fake, saved};
    use crate::platform::fake::node;

    fn seed_source(platform: &crate::platform::fake::FakePlatform) {
        platform.add_channel(SOURCE, node(1, "general-cat", ChannelKind::Category, None, 1));
        platform.add_channel(SOURCE, node(2, "intro-cat", ChannelKind::Category, None, 0));
        platform.add_channel(SOURCE, node(10, "chat", ChannelKind::Text, Some(1), 1));
        platform.add_channel(SOURCE, node(11, "rules", ChannelKind::Text, Some(1), 0));
        platform.add_channel(SOURCE, node(12, "lounge", ChannelKind::Voice, Some(1), 0));
        platform.add_channel(SOURCE, node(20, "welcome", ChannelKind::Text, Some(2), 0));
        platform.add_channel(SOURCE, node(30, "loose", ChannelKind::Text, None, 5));
    }

    async fn source_nodes(platform: &crate::platform::fake::FakePlatform) -> Vec<ChannelNode> {
        use crate::platform::Platform;
        platform.list_channels(SOURCE).await.unwrap()
    }

    #[tokio::test]
    async fn recreates_hierarchy_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let platform = fake();
        seed_source(&platform);
        let mut ctx = context(&platform, dir.path());

        let report = mirror_structure(&mut ctx, &source_nodes(&platform).await).await.unwrap();
        assert_eq!(report.created, 7);
        assert_eq!(report.failed, 0);

        let created = platform.with(|s| s.created.clone());
        let names: Vec<&str> = created.iter().map(|(_, c)| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["intro-cat", "general-cat", "welcome", "rules", "chat", "lounge", "loose"]
        );
        assert!(created.iter().all(|(guild, _)| *guild == TARGET));

        let intro = ctx.progress.target_of(ChannelId::new(2)).unwrap();
        let welcome = &created[2].1;
        assert_eq!(welcome.parent, Some(intro));
        assert!(welcome.nsfw);
        assert!(!created[0].1.nsfw);
        assert_eq!(created[6].1.parent, None);

        // Text channels and categories are mapped, voice is not.
        assert!(ctx.progress.target_of(ChannelId::new(10)).is_some());
        assert!(ctx.progress.target_of(ChannelId::new(30)).is_some());
        assert!(ctx.progress.target_of(ChannelId::new(12)).is_none());
        assert_eq!(saved(dir.path()), ctx.progress);
    }

    #[tokio::test]
    async fn second_pass_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let platform = fake();
        seed_source(&platform);
        let mut ctx = context(&platform, dir.path());
        let nodes = source_nodes(&platform).await;

        mirror_structure(&mut ctx, &nodes).await.unwrap();
        let created_before = platform.with(|s| s.created.len());

        let report = mirror_structure(&mut ctx, &nodes).await.unwrap();
        assert!(report.skipped);
        assert_eq!(platform.with(|s| s.created.len()), created_before);
        assert!(platform.with(|s| s.deleted.is_empty()));
    }

    #[tokio::test]
    async fn start_fresh_clears_target_first() {
        let dir = tempfile::tempdir().unwrap();
        let platform = fake();
        seed_source(&platform);
        platform.add_channel(TARGET, node(500, "old", ChannelKind::Text, None, 0));
        platform.add_channel(TARGET, node(501, "older", ChannelKind::Category, None, 0));
        let mut ctx = context(&platform, dir.path());

        let report = mirror_structure(&mut ctx, &source_nodes(&platform).await).await.unwrap();
        assert_eq!(report.deleted, 2);
        assert_eq!(
            platform.with(|s| s.deleted.clone()),
            vec![ChannelId::new(500), ChannelId::new(501)]
        );
    }

    #[tokio::test]
    async fn failed_creations_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let platform = fake();
        seed_source(&platform);
        platform.with(|s| {
            s.fail_create.insert("general-cat".to_string());
            s.fail_create.insert("welcome".to_string());
        });
        let mut ctx = context(&platform, dir.path());
        ctx.config.start_fresh = false;

        let report = mirror_structure(&mut ctx, &source_nodes(&platform).await).await.unwrap();
        assert_eq!(report.failed, 2);
        // general-cat's children never get a parent, so they are not created.
        assert!(ctx.progress.target_of(ChannelId::new(1)).is_none());
        assert!(ctx.progress.target_of(ChannelId::new(10)).is_none());
        assert!(ctx.progress.target_of(ChannelId::new(20)).is_none());
        assert!(ctx.progress.target_of(ChannelId::new(2)).is_some());
        assert!(ctx.progress.target_of(ChannelId::new(30)).is_some());
    }
}
