use crate::error::RpcError;
use alloy::primitives::{Address, B256, U256};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::transports::http::Http;
use reqwest::Client;
use std::borrow::Cow;
use std::sync::Arc;
use tokio::time::{sleep, Duration};

pub type HttpProvider = RootProvider<Http<Client>>;

const RETRY_BACKOFF_BASE_MS: u64 = 100;
const RETRY_BACKOFF_CAP_MS: u64 = 1_800;

pub fn build_http_provider(raw_url: &str) -> crate::error::Result<HttpProvider> {
    let url = raw_url.trim();
    if url.is_empty() {
        return Err(RpcError::InvalidUrl {
            url: raw_url.to_string(),
            reason: "empty".to_string(),
        }
        .into());
    }
    let parsed = url.parse::<reqwest::Url>().map_err(|err| RpcError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    Ok(ProviderBuilder::new().on_http(parsed))
}

fn block_tag(block_number: u64) -> String {
    format!("0x{block_number:x}")
}

fn retry_backoff_ms(attempt: usize) -> u64 {
    RETRY_BACKOFF_BASE_MS
        .checked_shl(attempt.min(16) as u32)
        .unwrap_or(RETRY_BACKOFF_CAP_MS)
        .min(RETRY_BACKOFF_CAP_MS)
}

pub async fn run_with_retry<T, Op, Fut>(
    retries: usize,
    context: &str,
    mut op: Op,
) -> anyhow::Result<T>
where
    Op: FnMut() -> Fut,
    Fut: std::future::Future<Output = anyhow::Result<T>>,
{
    let max_attempts = retries.saturating_add(1);
    let mut last_message = String::new();

    for attempt in 0..max_attempts {
        if attempt > 0 {
            sleep(Duration::from_millis(retry_backoff_ms(attempt - 1))).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => last_message = err.to_string(),
        }
    }

    Err(anyhow::anyhow!(
        "{} failed after {} attempt(s): {}",
        context,
        max_attempts,
        last_message
    ))
}

pub async fn get_block_number_with_retry(
    provider: Arc<HttpProvider>,
    retries: usize,
) -> anyhow::Result<u64> {
    run_with_retry(retries, "eth_blockNumber", || {
        let p = provider.clone();
        async move { p.get_block_number().await.map_err(anyhow::Error::from) }
    })
    .await
}

/// Read one storage slot pinned to a block so every read in a snapshot
/// observes the same chain state.
pub async fn get_storage_at_block_with_retry(
    provider: Arc<HttpProvider>,
    address: Address,
    slot: B256,
    block_number: u64,
    retries: usize,
) -> anyhow::Result<B256> {
    run_with_retry(
        retries,
        &format!(
            "eth_getStorageAt({address:#x}, {slot:#x}, {})",
            block_tag(block_number)
        ),
        || {
            let p = provider.clone();
            async move {
                let raw: String = p
                    .raw_request(
                        Cow::Borrowed("eth_getStorageAt"),
                        serde_json::json!([address, slot, block_tag(block_number)]),
                    )
                    .await
                    .map_err(anyhow::Error::from)?;
                let parsed = U256::from_str_radix(raw.trim_start_matches("0x"), 16)
                    .map_err(anyhow::Error::from)?;
                Ok(B256::from(parsed))
            }
        },
    )
    .await
}

pub async fn get_code_at_block_with_retry(
    provider: Arc<HttpProvider>,
    address: Address,
    block_number: u64,
    retries: usize,
) -> anyhow::Result<Vec<u8>> {
    run_with_retry(
        retries,
        &format!("eth_getCode({address:#x}, {})", block_tag(block_number)),
        || {
            let p = provider.clone();
            async move {
                let raw: String = p
                    .raw_request(
                        Cow::Borrowed("eth_getCode"),
                        serde_json::json!([address, block_tag(block_number)]),
                    )
                    .await
                    .map_err(anyhow::Error::from)?;
                hex::decode(raw.trim_start_matches("0x")).map_err(anyhow::Error::from)
            }
        },
    )
    .await
}

/// Chain-head resolver handed to the watch orchestrator.
pub struct RpcChainHead {
    provider: Arc<HttpProvider>,
    retries: usize,
}

impl RpcChainHead {
    pub fn new(provider: Arc<HttpProvider>, retries: usize) -> Self {
        Self { provider, retries }
    }
}

#[async_trait::async_trait]
impl crate::watcher::ChainHead for RpcChainHead {
    async fn block_number(&self) -> anyhow::Result<u64> {
        get_block_number_with_retry(self.provider.clone(), self.retries).await
    }
}
