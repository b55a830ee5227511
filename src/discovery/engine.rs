use crate::config::{ContractConfig, ProjectConfig};
use crate::discovery::snapshot::{ContractSnapshot, FieldSnapshot, Snapshot};
use crate::utils::error::compact_error_message;
use crate::utils::rpc::{
    get_code_at_block_with_retry, get_storage_at_block_with_retry, HttpProvider,
};
use alloy::primitives::{keccak256, Address, B256};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// EIP-1967 implementation storage slot (`keccak256("eip1967.proxy.implementation") - 1`).
pub const EIP1967_IMPL_SLOT: [u8; 32] = [
    0x36, 0x08, 0x94, 0xa1, 0x3b, 0xa1, 0xa3, 0x21, 0x06, 0x67, 0xc8, 0x28, 0x49, 0x2d, 0xb9,
    0x8d, 0xca, 0x3e, 0x20, 0x76, 0xcc, 0x37, 0x35, 0xa9, 0x20, 0xa3, 0xca, 0x50, 0x5d, 0x38,
    0x2b, 0xbc,
];

/// EIP-1967 admin storage slot (`keccak256("eip1967.proxy.admin") - 1`).
pub const EIP1967_ADMIN_SLOT: [u8; 32] = [
    0xb5, 0x31, 0x27, 0x68, 0x4a, 0x56, 0x8b, 0x31, 0x73, 0xae, 0x13, 0xb9, 0xf8, 0xa6, 0x01,
    0x6e, 0x24, 0x3e, 0x63, 0xb6, 0xe8, 0xee, 0x11, 0x78, 0xd6, 0xa7, 0x17, 0x85, 0x0b, 0x5d,
    0x61, 0x03,
];

pub const CODE_HASH_FIELD: &str = "code_hash";
pub const IMPLEMENTATION_FIELD: &str = "eip1967_implementation";
pub const ADMIN_FIELD: &str = "eip1967_admin";

/// Turns a project's declared configuration into a structured snapshot of its
/// on-chain contracts at a given block.
#[async_trait]
pub trait DiscoveryEngine: Send + Sync {
    async fn run(&self, config: &ProjectConfig, block_number: u64) -> anyhow::Result<Snapshot>;
}

/// Chain-backed engine. Every read is pinned to the cycle's block; a failed
/// read marks only that contract as errored and the remaining contracts are
/// still discovered.
pub struct ChainDiscoveryEngine {
    provider: Arc<HttpProvider>,
    retries: usize,
}

impl ChainDiscoveryEngine {
    pub fn new(provider: Arc<HttpProvider>, retries: usize) -> Self {
        Self { provider, retries }
    }

    async fn read_contract(
        &self,
        contract: &ContractConfig,
        block_number: u64,
    ) -> anyhow::Result<Vec<FieldSnapshot>> {
        let mut fields = Vec::new();

        let code = get_code_at_block_with_retry(
            self.provider.clone(),
            contract.address,
            block_number,
            self.retries,
        )
        .await?;
        fields.push(FieldSnapshot {
            name: CODE_HASH_FIELD.to_string(),
            value: if code.is_empty() {
                Value::String("(no code)".to_string())
            } else {
                Value::String(format!("{:#x}", keccak256(&code)))
            },
        });

        let implementation = self
            .read_slot(contract.address, B256::new(EIP1967_IMPL_SLOT), block_number)
            .await?;
        if let Some(address) = word_as_address(implementation) {
            fields.push(FieldSnapshot {
                name: IMPLEMENTATION_FIELD.to_string(),
                value: Value::String(format!("{address:#x}")),
            });
        }

        let admin = self
            .read_slot(contract.address, B256::new(EIP1967_ADMIN_SLOT), block_number)
            .await?;
        if let Some(address) = word_as_address(admin) {
            fields.push(FieldSnapshot {
                name: ADMIN_FIELD.to_string(),
                value: Value::String(format!("{address:#x}")),
            });
        }

        for slot in &contract.slots {
            let word = self.read_slot(contract.address, slot.slot, block_number).await?;
            fields.push(FieldSnapshot {
                name: slot.name.clone(),
                value: Value::String(format!("{word:#x}")),
            });
        }

        Ok(fields)
    }

    async fn read_slot(
        &self,
        address: Address,
        slot: B256,
        block_number: u64,
    ) -> anyhow::Result<B256> {
        get_storage_at_block_with_retry(
            self.provider.clone(),
            address,
            slot,
            block_number,
            self.retries,
        )
        .await
    }
}

#[async_trait]
impl DiscoveryEngine for ChainDiscoveryEngine {
    async fn run(&self, config: &ProjectConfig, block_number: u64) -> anyhow::Result<Snapshot> {
        let mut contracts = Vec::with_capacity(config.contracts().len());

        for contract in config.contracts() {
            let snapshot = match self.read_contract(contract, block_number).await {
                Ok(fields) => ContractSnapshot {
                    address: contract.address,
                    name: contract.name.clone(),
                    fields,
                    error: None,
                },
                Err(err) => ContractSnapshot {
                    address: contract.address,
                    name: contract.name.clone(),
                    fields: Vec::new(),
                    error: Some(compact_error_message(&err.to_string(), 260)),
                },
            };
            contracts.push(snapshot);
        }

        Ok(Snapshot {
            contracts,
            block_number,
            timestamp: unix_now(),
        })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// A proxy slot holds an address in its low 20 bytes; an all-zero word means
/// the slot is unset and the field is omitted from the snapshot.
fn word_as_address(word: B256) -> Option<Address> {
    if word == B256::ZERO {
        return None;
    }
    Some(Address::from_word(word))
}
