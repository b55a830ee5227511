use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DEFAULT_WEBHOOK_TIMEOUT_MS: u64 = 2_000;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Channel {
    /// Restricted operator channel; receives everything including the digest.
    Internal,
    /// Broader channel; receives change notifications only.
    Public,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Internal => "internal",
            Channel::Public => "public",
        }
    }
}

/// Best-effort message transport. Each send stands alone: a failure is
/// reported to the caller but implies nothing about other messages.
#[async_trait]
pub trait NotificationClient: Send + Sync {
    async fn send(&self, message: &str, channel: Channel) -> anyhow::Result<()>;
    /// Cycle-scoped accounting hook; the orchestrator resets the counter at
    /// the start of every cycle.
    fn reset_calls_count(&self);
    fn calls_count(&self) -> u64;
}

/// Discord webhook client with one webhook URL per logical channel.
pub struct DiscordClient {
    client: reqwest::Client,
    internal_url: Option<String>,
    public_url: Option<String>,
    calls: AtomicU64,
}

impl DiscordClient {
    pub fn new(internal_url: Option<String>, public_url: Option<String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            internal_url,
            public_url,
            calls: AtomicU64::new(0),
        }
    }

    /// Build from `DISCORD_INTERNAL_WEBHOOK_URL` / `DISCORD_PUBLIC_WEBHOOK_URL`.
    /// Returns `None` when neither is set, which degrades notification to a
    /// logged no-op in the orchestrator.
    pub fn from_env() -> Option<Self> {
        let internal_url = non_empty_env("DISCORD_INTERNAL_WEBHOOK_URL");
        let public_url = non_empty_env("DISCORD_PUBLIC_WEBHOOK_URL");
        if internal_url.is_none() && public_url.is_none() {
            return None;
        }
        let timeout_ms = std::env::var("WEBHOOK_TIMEOUT_MS")
            .ok()
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .map(|v| v.clamp(250, 15_000))
            .unwrap_or(DEFAULT_WEBHOOK_TIMEOUT_MS);
        Some(Self::new(internal_url, public_url, timeout_ms))
    }

    fn url_for(&self, channel: Channel) -> Option<&str> {
        match channel {
            Channel::Internal => self.internal_url.as_deref(),
            Channel::Public => self.public_url.as_deref(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl NotificationClient for DiscordClient {
    async fn send(&self, message: &str, channel: Channel) -> anyhow::Result<()> {
        let Some(url) = self.url_for(channel) else {
            tracing::warn!(
                channel = channel.as_str(),
                "[NOTIFY] no webhook configured for channel; message dropped"
            );
            return Ok(());
        };

        self.calls.fetch_add(1, Ordering::Relaxed);
        let payload = serde_json::json!({ "content": message });
        let response = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("webhook send failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("webhook rejected message: status {status}");
        }
        Ok(())
    }

    fn reset_calls_count(&self) {
        self.calls.store(0, Ordering::Relaxed);
    }

    fn calls_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}
