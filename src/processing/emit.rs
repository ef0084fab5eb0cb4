//! Turning one source message into the messages posted to the target.

use std::fmt;
use std::str::FromStr;

use serenity::all::MessageId;

use crate::models::{AttachmentRef, SourceMessage};
use crate::platform::{Outgoing, OutgoingFile};

pub const MAX_CONTENT_CHARS: usize = 2000;
pub const MAX_EMBEDS: usize = 10;
pub const MAX_FILES_PER_MESSAGE: usize = 10;

/// How re-uploaded attachments are named.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttachmentNaming {
    /// Keep the source filename.
    Original,
    /// `<stem>.<ext>` for every file.
    Fixed(String),
    /// `<stem>-<message id>-<index>.<ext>`
    Unique(String),
}

impl Default for AttachmentNaming {
    fn default() -> Self {
        AttachmentNaming::Fixed("attachment".to_string())
    }
}

impl AttachmentNaming {
    pub fn file_name(&self, original: &str, message: MessageId, index: usize) -> String {
        let stem = match self {
            AttachmentNaming::Original => return original.to_string(),
            AttachmentNaming::Fixed(stem) => stem.clone(),
            AttachmentNaming::Unique(stem) => format!("{stem}-{message}-{index}"),
        };
        match extension(original) {
            Some(ext) => format!("{stem}.{ext}"),
            None => stem,
        }
    }
}

impl FromStr for AttachmentNaming {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stem = |rest: &str| {
            let rest = rest.trim();
            if rest.is_empty() || rest.contains(['/', '\\']) {
                Err(format!("'{rest}' is not a usable file stem"))
            } else {
                Ok(rest.to_string())
            }
        };
        match s.split_once(':') {
            None if s.eq_ignore_ascii_case("original") => Ok(AttachmentNaming::Original),
            Some((mode, rest)) if mode.eq_ignore_ascii_case("fixed") => stem(rest).map(AttachmentNaming::Fixed),
            Some((mode, rest)) if mode.eq_ignore_ascii_case("unique") => stem(rest).map(AttachmentNaming::Unique),
            _ => Err(format!("expected original, fixed:<stem> or unique:<stem>, got '{s}'")),
        }
    }
}

impl fmt::Display for AttachmentNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentNaming::Original => write!(f, "original"),
            AttachmentNaming::Fixed(stem) => write!(f, "fixed:{stem}"),
            AttachmentNaming::Unique(stem) => write!(f, "unique:{stem}"),
        }
    }
}

fn extension(name: &str) -> Option<&str> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && !ext.contains(['/', '\\']))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Upload,
    Link,
}

/// Attachments above the ceiling are only ever linked.
pub fn route_attachment(attachment: &AttachmentRef, max_bytes: u64) -> Route {
    if attachment.size > max_bytes {
        Route::Link
    } else {
        Route::Upload
    }
}

pub fn truncate_content(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Builds the outgoing messages for `message` once its attachments have been
/// resolved into uploaded `files` and fallback `links`.
///
/// Files go first, in batches of at most [`MAX_FILES_PER_MESSAGE`] whose
/// combined size stays within `max_batch_bytes` (a single file larger than
/// that still goes alone), then one message per link. Embeds are forwarded
/// only when no file was uploaded. Text is forwarded only when neither a file
/// nor a link was produced.
pub fn compose(
    message: &SourceMessage,
    files: Vec<OutgoingFile>,
    links: Vec<String>,
    max_batch_bytes: u64,
) -> Vec<Outgoing> {
    let had_files = !files.is_empty();
    let send_text = !had_files && links.is_empty() && message.has_text();

    let mut outgoing: Vec<Outgoing> = batch_files(files, max_batch_bytes)
        .into_iter()
        .map(|files| Outgoing {
            files,
            ..Outgoing::default()
        })
        .collect();

    outgoing.extend(links.into_iter().map(Outgoing::text));

    let embeds: Vec<_> = if had_files {
        Vec::new()
    } else {
        message.embeds.iter().take(MAX_EMBEDS).cloned().collect()
    };

    if send_text || !embeds.is_empty() {
        outgoing.push(Outgoing {
            content: send_text.then(|| truncate_content(&message.content, MAX_CONTENT_CHARS).to_string()),
            embeds,
            ..Outgoing::default()
        });
    }

    outgoing
}

fn batch_files(files: Vec<OutgoingFile>, max_batch_bytes: u64) -> Vec<Vec<OutgoingFile>> {
    let mut batches: Vec<Vec<OutgoingFile>> = Vec::new();
    let mut batch_bytes = 0u64;

    for file in files {
        let size = file.data.len() as u64;
        let fits = batches.last().is_some_and(|batch| {
            batch.len() < MAX_FILES_PER_MESSAGE && batch_bytes.saturating_add(size) <= max_batch_bytes
        });
        match batches.last_mut() {
            Some(batch) if fits => {
                batch_bytes += size;
                batch.push(file);
            }
            _ => {
                batch_bytes = size;
                batches.push(vec![file]);
            }
        }
    }

    batches
}
