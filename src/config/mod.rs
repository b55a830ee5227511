//! Declared project configuration and the file-backed config source.
//!
//! A projects root directory holds one subdirectory per monitored project:
//!
//! ```text
//! projects/
//!   arbitrum/
//!     config.json      declared configuration (contracts, slots, ignores)
//!     discovered.json  committed baseline snapshot implied by the declaration
//! ```
//!
//! The config hash is a keccak256 over the raw bytes of `config.json`; any
//! edit to the declaration invalidates previously recorded observations.

use crate::discovery::snapshot::{IgnoreRules, Snapshot};
use crate::error::{ConfigError, Result};
use alloy::primitives::{keccak256, Address, B256};
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const COMMITTED_FILE: &str = "discovered.json";

/// One explicitly tracked storage slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedSlot {
    pub name: String,
    pub slot: B256,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractConfig {
    pub address: Address,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slots: Vec<NamedSlot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProjectConfig {
    name: String,
    #[serde(default)]
    contracts: Vec<ContractConfig>,
    #[serde(default)]
    ignore_in_watch: IgnoreRules,
}

/// Declared configuration for one monitored project, immutable for a cycle.
#[derive(Debug, Clone)]
pub struct ProjectConfig {
    name: String,
    hash: B256,
    contracts: Vec<ContractConfig>,
    ignore: IgnoreRules,
}

impl ProjectConfig {
    pub fn new(
        name: impl Into<String>,
        hash: B256,
        contracts: Vec<ContractConfig>,
        ignore: IgnoreRules,
    ) -> Self {
        Self {
            name: name.into(),
            hash,
            contracts,
            ignore,
        }
    }

    /// Parse a declaration from raw `config.json` bytes. The hash covers the
    /// bytes as stored, not the parsed form.
    pub fn from_raw_bytes(bytes: &[u8], path: &Path) -> Result<Self> {
        let raw: RawProjectConfig =
            serde_json::from_slice(bytes).map_err(|e| ConfigError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        if raw.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(format!(
                "project config `{}` has an empty name",
                path.display()
            ))
            .into());
        }
        Ok(Self {
            name: raw.name,
            hash: keccak256(bytes),
            contracts: raw.contracts,
            ignore: raw.ignore_in_watch,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    pub fn contracts(&self) -> &[ContractConfig] {
        &self.contracts
    }

    pub fn ignore_rules(&self) -> &IgnoreRules {
        &self.ignore
    }
}

/// Supplies declared configurations and committed baselines.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn read_all_configs(&self) -> anyhow::Result<Vec<ProjectConfig>>;
    async fn read_committed(&self, project: &str) -> anyhow::Result<Snapshot>;
}

/// Directory-backed [`ConfigSource`].
pub struct ConfigReader {
    root: PathBuf,
}

impl ConfigReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_project_dir(&self, dir: &Path) -> anyhow::Result<Option<ProjectConfig>> {
        let config_path = dir.join(CONFIG_FILE);
        if !config_path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config = ProjectConfig::from_raw_bytes(&bytes, &config_path)?;
        Ok(Some(config))
    }
}

#[async_trait]
impl ConfigSource for ConfigReader {
    async fn read_all_configs(&self) -> anyhow::Result<Vec<ProjectConfig>> {
        let entries = fs::read_dir(&self.root)
            .with_context(|| format!("failed to list projects dir {}", self.root.display()))?;

        let mut configs = Vec::new();
        for entry in entries {
            let entry = entry.context("failed to read projects dir entry")?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            if let Some(config) = self.read_project_dir(&path)? {
                configs.push(config);
            }
        }
        // Directory iteration order is platform-dependent; cycles must walk
        // projects in a stable order.
        configs.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(configs)
    }

    async fn read_committed(&self, project: &str) -> anyhow::Result<Snapshot> {
        let path = self.root.join(project).join(COMMITTED_FILE);
        let bytes = fs::read(&path)
            .with_context(|| format!("no committed baseline at {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("malformed committed baseline at {}", path.display()))?;
        Ok(snapshot)
    }
}
