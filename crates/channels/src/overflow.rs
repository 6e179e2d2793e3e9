//! Overflow handling for long replies.
//!
//! Chat surfaces cap message length; a reply past the visible limit is
//! written to a text file and replaced inline with a short summary
//! pointing at the attachment. The attachment always carries the full
//! reply byte-for-byte.

use std::path::{Path, PathBuf};
use uuid::Uuid;

use confide_core::error::ChannelError;

pub const MAX_VISIBLE_CHARS: usize = 1800;
pub const SUMMARY_CHARS: usize = 400;

/// What to actually send for one reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedReply {
    pub display: String,
    pub attachment: Option<PathBuf>,
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

/// Split a reply into display text and an optional attachment under
/// `base_dir`. Short replies pass through untouched.
pub async fn prepare_overflow_text(
    text: &str,
    base_dir: &Path,
) -> Result<PreparedReply, ChannelError> {
    if text.chars().count() <= MAX_VISIBLE_CHARS {
        return Ok(PreparedReply {
            display: text.to_string(),
            attachment: None,
        });
    }

    tokio::fs::create_dir_all(base_dir)
        .await
        .map_err(|e| ChannelError::AttachmentFailed(e.to_string()))?;
    let file_name = format!("confide-overflow-{}.txt", Uuid::new_v4().simple());
    let path = base_dir.join(&file_name);
    tokio::fs::write(&path, text.as_bytes())
        .await
        .map_err(|e| ChannelError::AttachmentFailed(e.to_string()))?;

    let mut summary = truncate_chars(text, SUMMARY_CHARS);
    if text.chars().count() > SUMMARY_CHARS {
        summary.push('…');
    }
    let summary = summary.trim();
    let summary = if summary.is_empty() {
        "Response saved to attachment."
    } else {
        summary
    };

    let display = format!("{summary}\n\nFull response attached as {file_name}");
    Ok(PreparedReply {
        display: truncate_chars(&display, MAX_VISIBLE_CHARS),
        attachment: Some(path),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_replies_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let prepared = prepare_overflow_text("hello", dir.path()).await.unwrap();
        assert_eq!(prepared.display, "hello");
        assert!(prepared.attachment.is_none());
    }

    #[tokio::test]
    async fn boundary_length_is_not_attached() {
        let dir = tempfile::tempdir().unwrap();
        let text = "a".repeat(MAX_VISIBLE_CHARS);
        let prepared = prepare_overflow_text(&text, dir.path()).await.unwrap();
        assert!(prepared.attachment.is_none());
    }

    #[tokio::test]
    async fn long_replies_are_attached_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let text = "line of output\n".repeat(300);
        let prepared = prepare_overflow_text(&text, dir.path()).await.unwrap();

        let path = prepared.attachment.expect("attachment expected");
        let written = tokio::fs::read(&path).await.unwrap();
        assert_eq!(written, text.as_bytes());

        assert!(prepared.display.chars().count() <= MAX_VISIBLE_CHARS);
        assert!(prepared.display.contains("Full response attached as confide-overflow-"));
        assert!(prepared.display.starts_with("line of output"));
        assert!(prepared.display.contains('…'));
    }

    #[tokio::test]
    async fn multibyte_text_truncates_on_char_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let text = "éü".repeat(MAX_VISIBLE_CHARS);
        let prepared = prepare_overflow_text(&text, dir.path()).await.unwrap();
        assert!(prepared.attachment.is_some());
        assert!(prepared.display.chars().count() <= MAX_VISIBLE_CHARS);
    }
}
