mod channel;
mod message;
mod progress;
mod snowflake;
mod stats;

pub use channel::{ChannelKind, ChannelNode, siblings};
pub use message::{AttachmentRef, Author, SourceMessage};
pub use progress::ProgressStore;
pub use stats::RunSummary;
