mod channel;
mod emit;
mod pagination;
mod structure;

use tracing::info;

use crate::context::RunContext;
use crate::error::CloneError;

use channel::{MigrationReport, migrate_content};
use structure::{StructureReport, mirror_structure};

pub use emit::AttachmentNaming;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub structure: StructureReport,
    pub content: MigrationReport,
}

/// Structure pass, then content pass, against the same progress record.
pub async fn run(ctx: &mut RunContext) -> Result<RunReport, CloneError> {
    info!("🎯 CLONING SERVER");
    let source = ctx.platform.list_channels(ctx.config.source_guild).await?;
    info!("📊 Found {} channels in source", source.len());

    let structure = mirror_structure(ctx, &source).await?;
    let content = migrate_content(ctx, &source).await?;
    ctx.sync_remote().await;

    Ok(RunReport { structure, content })
}
