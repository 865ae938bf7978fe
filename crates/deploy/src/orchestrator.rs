//! Sequential deployment of a resolved artifact order.
//!
//! The orchestrator walks the order produced by [`resolve`](crate::resolve), submits
//! each artifact through a [`DeploymentBackend`], waits for confirmation and threads
//! confirmed addresses into later constructor arguments. A backend failure halts
//! the run. Nothing is retried, since a creation transaction is not safe to replay.

use std::collections::HashMap;

use alloy_core::primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::{
    ArgSpec, ArgValue, ArtifactDescriptor, DeployError, DeployRequest, DeploymentBackend,
    EnvSource,
};

/// Append-only mapping of artifact name to deployed address, in deployment order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressTable {
    entries: Vec<(String, Address)>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an address. A name can only be inserted once.
    pub fn insert(&mut self, name: impl Into<String>, address: Address) -> Result<(), DeployError> {
        let name = name.into();
        if self.contains(&name) {
            return Err(DeployError::Internal(format!(
                "address for `{name}` recorded twice"
            )));
        }
        self.entries.push((name, address));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, address)| *address)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.entries
            .iter()
            .map(|(name, address)| (name.as_str(), *address))
    }
}

/// Lifecycle of one artifact within a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Submitted, waiting for confirmation.
    Pending,
    Confirmed,
    Failed,
    /// Already deployed before this run; the known address was reused.
    Reused,
}

/// What happened to one artifact during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub name: String,
    pub contract: String,
    /// Constructor arguments as sent to the backend.
    pub args: Vec<ArgValue>,
    pub status: DeploymentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<u64>,
    /// Block the creation transaction was included in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeploymentRecord {
    fn pending(descriptor: &ArtifactDescriptor, args: Vec<ArgValue>) -> Self {
        Self {
            name: descriptor.name.clone(),
            contract: descriptor.contract_name().to_string(),
            args,
            status: DeploymentStatus::Pending,
            address: None,
            tx_hash: None,
            gas_used: None,
            block_number: None,
            error: None,
        }
    }

    fn reused(descriptor: &ArtifactDescriptor, address: Address) -> Self {
        Self {
            status: DeploymentStatus::Reused,
            address: Some(address),
            ..Self::pending(descriptor, Vec::new())
        }
    }
}

/// Drives one deployment run and owns its records and address table.
#[derive(Debug)]
pub struct Orchestrator {
    env: EnvSource,
    table: AddressTable,
    records: Vec<DeploymentRecord>,
}

impl Orchestrator {
    pub fn new(env: EnvSource) -> Self {
        Self::with_table(env, AddressTable::new())
    }

    /// Start from already known addresses. Artifacts present in `table` are
    /// not redeployed and their addresses feed later references.
    pub fn with_table(env: EnvSource, table: AddressTable) -> Self {
        Self {
            env,
            table,
            records: Vec::new(),
        }
    }

    /// Check that every environment value `order` needs is available, without
    /// deploying anything.
    pub fn preflight(&self, order: &[ArtifactDescriptor]) -> Result<(), DeployError> {
        self.resolve_env(order).map(|_| ())
    }

    /// Deploy `order` sequentially.
    ///
    /// `order` must be dependency-ordered, as returned by [`resolve`](crate::resolve).
    /// On failure, [`records`](Self::records) and [`table`](Self::table) still hold
    /// everything confirmed before the failing artifact.
    pub async fn run<B: DeploymentBackend>(
        &mut self,
        order: &[ArtifactDescriptor],
        backend: &mut B,
    ) -> Result<&AddressTable, DeployError> {
        let env_values = self.resolve_env(order)?;

        for descriptor in order {
            if let Some(address) = self.table.get(&descriptor.name) {
                tracing::info!(
                    artifact = %descriptor.name,
                    address = %address,
                    "Already deployed, reusing address"
                );
                self.records.push(DeploymentRecord::reused(descriptor, address));
                continue;
            }

            let args = self.resolve_args(descriptor, &env_values)?;
            self.deploy_one(descriptor, args, backend).await?;
        }

        tracing::info!(deployed = self.table.len(), "Deployment run complete");

        Ok(&self.table)
    }

    /// Read every environment-sourced argument up front so that a missing
    /// value aborts the run before anything is submitted.
    fn resolve_env(
        &self,
        order: &[ArtifactDescriptor],
    ) -> Result<HashMap<String, String>, DeployError> {
        let mut values = HashMap::new();

        for descriptor in order {
            if self.table.contains(&descriptor.name) {
                continue;
            }
            for variable in descriptor.env_variables() {
                if values.contains_key(variable) {
                    continue;
                }
                let value = self.env.require(variable).inspect_err(|_| {
                    tracing::error!(
                        artifact = %descriptor.name,
                        variable,
                        "Missing environment value"
                    );
                })?;
                values.insert(variable.to_string(), value.trim().to_string());
            }
        }

        Ok(values)
    }

    fn resolve_args(
        &self,
        descriptor: &ArtifactDescriptor,
        env_values: &HashMap<String, String>,
    ) -> Result<Vec<ArgValue>, DeployError> {
        descriptor
            .args
            .iter()
            .map(|arg| match arg {
                ArgSpec::Literal(value) => Ok(value.clone()),
                ArgSpec::Env(variable) => env_values
                    .get(variable)
                    .cloned()
                    .map(ArgValue::String)
                    .ok_or_else(|| DeployError::missing(variable.as_str())),
                ArgSpec::Ref(name) => self.table.get(name).map(ArgValue::Address).ok_or_else(|| {
                    DeployError::Internal(format!(
                        "`{}` was scheduled before its dependency `{}`",
                        descriptor.name, name
                    ))
                }),
            })
            .collect()
    }

    async fn deploy_one<B: DeploymentBackend>(
        &mut self,
        descriptor: &ArtifactDescriptor,
        args: Vec<ArgValue>,
        backend: &mut B,
    ) -> Result<(), DeployError> {
        let index = self.records.len();
        self.records.push(DeploymentRecord::pending(descriptor, args));

        tracing::info!(
            artifact = %descriptor.name,
            contract = descriptor.contract_name(),
            "Deploying..."
        );

        let request = DeployRequest {
            artifact: &descriptor.name,
            contract: descriptor.contract_name(),
            args: &self.records[index].args,
        };

        let outcome = match backend.submit(request).await {
            Ok(handle) => backend.confirm(handle).await,
            Err(e) => Err(e),
        };

        let record = &mut self.records[index];
        match outcome {
            Ok(confirmation) => {
                record.status = DeploymentStatus::Confirmed;
                record.address = Some(confirmation.address);
                record.tx_hash = confirmation.tx_hash;
                record.gas_used = confirmation.gas_used;
                record.block_number = confirmation.block_number;

                tracing::info!(
                    artifact = %descriptor.name,
                    address = %confirmation.address,
                    gas_used = ?confirmation.gas_used,
                    block_number = ?confirmation.block_number,
                    "Deployment confirmed"
                );

                self.table.insert(descriptor.name.clone(), confirmation.address)
            }
            Err(source) => {
                record.status = DeploymentStatus::Failed;
                record.error = Some(source.to_string());

                tracing::error!(
                    artifact = %descriptor.name,
                    error = %source,
                    "Deployment failed, halting run"
                );

                Err(DeployError::Chain {
                    artifact: descriptor.name.clone(),
                    source,
                })
            }
        }
    }

    /// Records for every artifact visited so far, in deployment order.
    pub fn records(&self) -> &[DeploymentRecord] {
        &self.records
    }

    pub fn table(&self) -> &AddressTable {
        &self.table
    }

    /// Hand the final records and table over once the run is finished.
    pub fn finish(self) -> (Vec<DeploymentRecord>, AddressTable) {
        (self.records, self.table)
    }
}
