use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serenity::all::ChannelId;
use tracing::warn;

use crate::config::Config;
use crate::error::StoreError;
use crate::models::ProgressStore;
use crate::platform::{Platform, WebhookHandle};
use crate::store::StateStore;

const WEBHOOK_NAME: &str = "Guild Cloner";

/// Everything one invocation works with, built once in `main` and passed
/// by reference to each pass.
pub struct RunContext {
    pub config: Config,
    pub platform: Arc<dyn Platform>,
    pub progress: ProgressStore,
    store: StateStore,
    /// `None` records a failed creation so it is not retried for every message.
    webhooks: HashMap<ChannelId, Option<WebhookHandle>>,
    relayed_since_push: u64,
}

impl RunContext {
    pub fn new(config: Config, platform: Arc<dyn Platform>, store: StateStore, progress: ProgressStore) -> Self {
        Self {
            config,
            platform,
            progress,
            store,
            webhooks: HashMap::new(),
            relayed_since_push: 0,
        }
    }

    /// Flushes the progress record to disk.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        self.store.save(&self.progress)
    }

    pub async fn sync_remote(&mut self) {
        self.relayed_since_push = 0;
        self.store.push_remote(&self.progress).await;
    }

    /// Counts a relayed message and pushes to the mirror when due.
    pub async fn note_relayed(&mut self) {
        self.relayed_since_push += 1;
        if self.relayed_since_push >= self.config.mirror_every {
            self.sync_remote().await;
        }
    }

    pub async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub async fn webhook_for(&mut self, target: ChannelId) -> Option<WebhookHandle> {
        if let Some(hook) = self.webhooks.get(&target) {
            return *hook;
        }

        let hook = match self.platform.create_webhook(target, WEBHOOK_NAME).await {
            Ok(hook) => Some(hook),
            Err(e) => {
                warn!("⚠️ No webhook for {}, sending as the bot: {}", target, e);
                None
            }
        };
        self.webhooks.insert(target, hook);
        self.pause(self.config.pacing.call).await;
        hook
    }
}
