//! Deployment manifests persisted between runs.
//!
//! A manifest is written to `<deployments_dir>/<network>/<scenario>.json` after
//! every run, including failed ones, so that a later run can resume from the
//! artifacts that were already confirmed.

use std::path::{Path, PathBuf};

use alloy_core::primitives::{Address, B256};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AddressTable, DeploymentRecord, DeploymentStatus};

/// One deployed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub contract: String,
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
}

/// Addresses deployed by one scenario on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    pub scenario: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// When the manifest was last written.
    pub deployed_at: DateTime<Utc>,
    /// Version of the tool that wrote the manifest.
    pub keeper_version: String,
    /// Deployed artifacts, in deployment order.
    pub entries: Vec<ManifestEntry>,
}

impl DeploymentManifest {
    /// Build a manifest from the records of a run. Only artifacts with a known
    /// address (confirmed or reused) are kept.
    pub fn from_records(
        scenario: impl Into<String>,
        network: impl Into<String>,
        chain_id: Option<u64>,
        records: &[DeploymentRecord],
    ) -> Self {
        let entries = records
            .iter()
            .filter(|record| {
                matches!(
                    record.status,
                    DeploymentStatus::Confirmed | DeploymentStatus::Reused
                )
            })
            .filter_map(|record| {
                record.address.map(|address| ManifestEntry {
                    name: record.name.clone(),
                    contract: record.contract.clone(),
                    address,
                    tx_hash: record.tx_hash,
                })
            })
            .collect();

        Self {
            scenario: scenario.into(),
            network: network.into(),
            chain_id,
            deployed_at: Utc::now(),
            keeper_version: env!("CARGO_PKG_VERSION").to_string(),
            entries,
        }
    }

    /// Where the manifest for `scenario` on `network` lives.
    pub fn path(deployments_dir: &Path, network: &str, scenario: &str) -> PathBuf {
        deployments_dir.join(network).join(format!("{scenario}.json"))
    }

    /// Known addresses, ready to preload into an orchestrator.
    pub fn to_table(&self) -> Result<AddressTable> {
        let mut table = AddressTable::new();
        for entry in &self.entries {
            table
                .insert(entry.name.clone(), entry.address)
                .with_context(|| format!("Manifest for `{}` is corrupted", self.scenario))?;
        }
        Ok(table)
    }

    /// Fail if the manifest was written against a different chain than `chain_id`.
    /// Manifests without a recorded chain id are accepted.
    pub fn ensure_chain(&self, chain_id: u64) -> Result<()> {
        match self.chain_id {
            Some(recorded) if recorded != chain_id => anyhow::bail!(
                "Manifest for `{}` on {} was recorded on chain {}, but the node reports chain {}",
                self.scenario,
                self.network,
                recorded,
                chain_id
            ),
            _ => Ok(()),
        }
    }

    /// Save the manifest as formatted JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployment manifest to {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            entries = self.entries.len(),
            "Deployment manifest saved"
        );
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment manifest does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment manifest from {}", path.display()))?;
        let manifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse deployment manifest {}", path.display()))?;

        Ok(manifest)
    }
}
