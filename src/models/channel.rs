use serde::{Deserialize, Serialize};
use serenity::all::ChannelId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Category,
    Text,
    Voice,
}

/// Snapshot of one category or channel as listed by the platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNode {
    pub id: ChannelId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub position: u16,
    pub topic: Option<String>,
    pub nsfw: bool,
}

/// Nodes of `kind` whose parent is `parent`, in sibling order.
///
/// Position is the only key; the sort is stable so ties keep listing order.
pub fn siblings(nodes: &[ChannelNode], kind: ChannelKind, parent: Option<ChannelId>) -> Vec<&ChannelNode> {
    let mut selected: Vec<_> = nodes
        .iter()
        .filter(|n| n.kind == kind && n.parent_id == parent)
        .collect();
    selected.sort_by_key(|n| n.position);
    selected
}
