//! Consent and disclosure decisions.
//!
//! Three layers: a static payload classifier ([`classify_info`]), a
//! heuristic-then-LLM share-request classifier, and the async
//! human-in-the-loop consent capture ([`ConsentEngine::ensure_consent`]).
//! Every fallback here fails closed for disclosure (no consent means no
//! share) but fails open for classification (an unreachable classifier
//! must not wedge ordinary conversation).

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use async_trait::async_trait;

use confide_core::error::ChannelError;
use confide_core::llm::{ChatMessage, GenerateRequest, LlmService};
use confide_core::retry::retry;
use confide_memory::{MemoryStore, csv_set};

/// Keyword fragments that mark a field or request as sensitive enough to
/// require explicit consent.
pub const SENSITIVE_KEYS: [&str; 13] = [
    "email",
    "phone",
    "address",
    "password",
    "passport",
    "credit card",
    "social security",
    "medical",
    "health",
    "finance",
    "salary",
    "location",
    "token",
];

/// Phrases that mark content as private by origin.
pub const PRIVACY_MARKERS: [&str; 5] = ["private", "dm", "direct message", "secret", "confidential"];

/// Static classification of a stored payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoClass {
    Shareable,
    Private,
    ConsentRequired,
}

/// Classify a metadata payload: explicit tags win, then sensitive key
/// names, then shareable by default.
pub fn classify_info(payload: &Map<String, Value>) -> InfoClass {
    let tags: Vec<String> = csv_set(payload.get("tags"))
        .into_iter()
        .map(|t| t.to_lowercase())
        .collect();
    if tags.iter().any(|t| t == "private") {
        return InfoClass::Private;
    }
    if tags.iter().any(|t| t == "consent_required") {
        return InfoClass::ConsentRequired;
    }
    for key in payload.keys() {
        let key = key.to_lowercase();
        if SENSITIVE_KEYS.contains(&key.as_str()) {
            return InfoClass::ConsentRequired;
        }
    }
    InfoClass::Shareable
}

/// The scope rule for retrieval: same channel is always visible,
/// cross-channel only when the server toggle allows it.
pub fn can_share(same_channel: bool, cross_channel_toggle: bool) -> bool {
    same_channel || cross_channel_toggle
}

/// Verdict on a share request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareDecision {
    Safe,
    Blocked,
    NeedsConsent,
}

impl ShareDecision {
    pub fn as_label(&self) -> &'static str {
        match self {
            ShareDecision::Safe => "share_safe",
            ShareDecision::Blocked => "share_block",
            ShareDecision::NeedsConsent => "share_needs_consent",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "share_safe" => Some(ShareDecision::Safe),
            "share_block" => Some(ShareDecision::Blocked),
            "share_needs_consent" => Some(ShareDecision::NeedsConsent),
            _ => None,
        }
    }
}

/// How a consent request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentOutcome {
    Granted,
    Denied,
    TimedOut,
}

/// Delivers a consent question to the subject and waits for their answer.
/// Implementations are chat-surface specific (a DM with buttons, a CLI
/// prompt). The engine owns the timeout; implementations just wait.
#[async_trait]
pub trait ConsentPrompter: Send + Sync {
    async fn request_consent(
        &self,
        subject_user_id: &str,
        requester_name: &str,
        scope: &str,
        target: &str,
    ) -> Result<bool, ChannelError>;
}

/// Consent capture with a persistent decision cache.
pub struct ConsentEngine {
    memory: Arc<MemoryStore>,
    classifier: Option<Arc<dyn LlmService>>,
    classifier_model: String,
    timeout: Duration,
}

impl ConsentEngine {
    pub fn new(memory: Arc<MemoryStore>) -> Self {
        Self {
            memory,
            classifier: None,
            classifier_model: String::new(),
            timeout: Duration::from_secs(180),
        }
    }

    /// Attach the lightweight model used for ambiguous share requests.
    pub fn with_classifier(mut self, llm: Arc<dyn LlmService>, model: impl Into<String>) -> Self {
        self.classifier = Some(llm);
        self.classifier_model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Classify a request from `requester_id` to disclose something about
    /// `subject_id`. Heuristics run first; only then is the classifier
    /// model consulted, and any classifier failure falls back to safe.
    pub async fn classify_share_request(
        &self,
        request_text: &str,
        requester_id: &str,
        subject_id: &str,
        cross_channel_enabled: bool,
    ) -> ShareDecision {
        if requester_id == subject_id {
            return ShareDecision::Safe;
        }

        let text = request_text.to_lowercase();
        if !cross_channel_enabled
            && text
                .split_whitespace()
                .any(|token| token.contains('#') || token.contains("channel"))
        {
            return ShareDecision::Blocked;
        }
        if SENSITIVE_KEYS.iter().any(|phrase| text.contains(phrase)) {
            return ShareDecision::NeedsConsent;
        }
        if PRIVACY_MARKERS.iter().any(|phrase| text.contains(phrase)) {
            return ShareDecision::NeedsConsent;
        }

        let Some(classifier) = &self.classifier else {
            return ShareDecision::Safe;
        };

        let prompt = format!(
            "You act as a privacy classifier. Possible labels: share_safe, share_block, \
             share_needs_consent. Label the request below. If it demands sensitive data, choose \
             share_needs_consent; if it would violate scope/cross-channel, choose share_block. \
             Reply with just the label.\nRequest:{}",
            request_text.trim()
        );
        let request = GenerateRequest {
            model: self.classifier_model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            tools: Vec::new(),
            max_output_tokens: Some(16),
        };
        match retry("consent_classifier", || classifier.generate(request.clone())).await {
            Ok(response) => {
                let label = response.text_or_empty();
                match ShareDecision::from_label(label) {
                    Some(decision) => decision,
                    None => {
                        warn!(label = %label, "Unrecognized classifier label; treating as safe");
                        ShareDecision::Safe
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "Consent classifier unavailable; treating as safe");
                ShareDecision::Safe
            }
        }
    }

    /// Resolve consent for disclosing `target` about the subject within
    /// `scope`. Cached decisions return immediately; otherwise the subject
    /// is asked through `prompter` and only an explicit allow or deny is
    /// persisted. Timeouts and delivery failures resolve to denied for
    /// this turn but leave no cached record, so the subject is asked
    /// again next time.
    pub async fn ensure_consent(
        &self,
        subject_user_id: &str,
        scope: &str,
        target: &str,
        requester_name: &str,
        prompter: &dyn ConsentPrompter,
    ) -> bool {
        if let Some(cached) = self.memory.get_consent(subject_user_id, scope, target).await {
            return cached;
        }

        let outcome = match tokio::time::timeout(
            self.timeout,
            prompter.request_consent(subject_user_id, requester_name, scope, target),
        )
        .await
        {
            Ok(Ok(true)) => ConsentOutcome::Granted,
            Ok(Ok(false)) => ConsentOutcome::Denied,
            Ok(Err(e)) => {
                warn!(subject = subject_user_id, error = %e, "Consent prompt delivery failed");
                return false;
            }
            Err(_) => {
                warn!(subject = subject_user_id, scope, target, "Consent request timed out");
                ConsentOutcome::TimedOut
            }
        };

        match outcome {
            ConsentOutcome::Granted | ConsentOutcome::Denied => {
                let granted = outcome == ConsentOutcome::Granted;
                if let Err(e) = self
                    .memory
                    .set_consent(subject_user_id, scope, target, granted)
                    .await
                {
                    warn!(subject = subject_user_id, error = %e, "Failed to persist consent decision");
                }
                granted
            }
            ConsentOutcome::TimedOut => false,
        }
    }
}
