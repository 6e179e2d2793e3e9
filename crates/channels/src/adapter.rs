//! The surface seam: anything that can deliver a reply.

use async_trait::async_trait;
use std::path::Path;

use confide_core::error::ChannelError;
use confide_core::scope::Scope;

use crate::overflow::prepare_overflow_text;

/// A chat surface the assistant can speak through. One implementation
/// per platform; the pipeline only sees this trait.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Send plain text into the given scope.
    async fn send_text(&self, scope: &Scope, text: &str) -> Result<(), ChannelError>;

    /// Send text accompanied by a file attachment.
    async fn send_file(
        &self,
        scope: &Scope,
        text: &str,
        attachment: &Path,
    ) -> Result<(), ChannelError>;
}

/// Deliver a reply through an adapter, splitting overly long text into a
/// summary plus attachment.
pub async fn deliver_reply(
    adapter: &dyn ChatAdapter,
    scope: &Scope,
    text: &str,
    overflow_dir: &Path,
) -> Result<(), ChannelError> {
    let prepared = prepare_overflow_text(text, overflow_dir).await?;
    match prepared.attachment {
        Some(path) => adapter.send_file(scope, &prepared.display, &path).await,
        None => adapter.send_text(scope, &prepared.display).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overflow::MAX_VISIBLE_CHARS;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingAdapter {
        sent: Mutex<Vec<(String, Option<PathBuf>)>>,
    }

    #[async_trait]
    impl ChatAdapter for RecordingAdapter {
        async fn send_text(&self, _scope: &Scope, text: &str) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push((text.to_string(), None));
            Ok(())
        }

        async fn send_file(
            &self,
            _scope: &Scope,
            text: &str,
            attachment: &Path,
        ) -> Result<(), ChannelError> {
            self.sent
                .lock()
                .unwrap()
                .push((text.to_string(), Some(attachment.to_path_buf())));
            Ok(())
        }
    }

    #[tokio::test]
    async fn short_replies_go_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RecordingAdapter::default();
        deliver_reply(&adapter, &Scope::direct(), "hi", dir.path()).await.unwrap();

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "hi");
        assert!(sent[0].1.is_none());
    }

    #[tokio::test]
    async fn long_replies_go_with_an_attachment() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = RecordingAdapter::default();
        let text = "x".repeat(MAX_VISIBLE_CHARS + 1);
        deliver_reply(&adapter, &Scope::direct(), &text, dir.path()).await.unwrap();

        let sent = adapter.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.is_some());
    }
}
