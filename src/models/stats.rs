use std::time::Instant;

use colorful::{Colorful, RGB};

use super::progress::ProgressStore;

/// End-of-run numbers printed to the console.
pub struct RunSummary {
    pub messages: u64,
    pub files: u64,
    pub channels_total: usize,
    pub channels_copied: usize,
    pub start_time: Instant,
}

impl RunSummary {
    pub fn from_progress(progress: &ProgressStore, start_time: Instant) -> Self {
        let channels_total = progress.text_channel_count();
        Self {
            messages: progress.stats.messages,
            files: progress.stats.files,
            channels_total,
            channels_copied: channels_total - progress.pending_channels().len(),
            start_time,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.channels_copied == self.channels_total
    }

    pub fn print_stats(&self) {
        let success = RGB::new(16, 185, 129);
        let warning = RGB::new(245, 158, 11);
        let info = RGB::new(59, 130, 246);
        let subtle = RGB::new(107, 114, 128);

        let banner = "═════════════════════════════════";
        println!("\n{}", banner.color(subtle));
        if self.is_complete() {
            println!("{}", "✅ CLONE COMPLETE!".color(success));
        } else {
            println!("{}", "⏸️  CLONE PAUSED (run again to resume)".color(warning));
        }
        println!("{}", banner.color(subtle));
        println!("📂 Channels: {}/{}",
            self.channels_copied.to_string().color(info),
            self.channels_total);
        println!("💬 Messages: {}", self.messages.to_string().color(success));
        println!("📁 Files: {}", self.files.to_string().color(success));
        println!("⏱️  Time taken: {:.2?}", self.start_time.elapsed());
        println!("{}", banner.color(subtle));
    }
}

#[cfg(test)]
mod tests {
    use serenity::all::ChannelId;

    use super::*;
    use crate::models::ChannelKind;

    #[test]
    fn summary_counts_copied_channels() {
        let mut progress = ProgressStore::default();
        progress.map_channel(ChannelId::new(1), ChannelId::new(11), ChannelKind::Text);
        progress.map_channel(ChannelId::new(2), ChannelId::new(12), ChannelKind::Text);
        progress.map_channel(ChannelId::new(3), ChannelId::new(13), ChannelKind::Voice);
        progress.mark_copied(ChannelId::new(1));
        progress.stats.messages = 7;

        let summary = RunSummary::from_progress(&progress, Instant::now());
        assert_eq!(summary.channels_total, 2);
        assert_eq!(summary.channels_copied, 1);
        assert_eq!(summary.messages, 7);
        assert!(!summary.is_complete());
    }
}
