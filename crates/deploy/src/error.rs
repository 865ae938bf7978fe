//! Error taxonomy for a deployment run.
//!
//! Static errors ([`DeployError::Configuration`], [`DeployError::InvalidDescriptor`],
//! [`DeployError::Cycle`], [`DeployError::UnknownReference`]) are raised before any
//! chain interaction. [`DeployError::Chain`] is raised mid-run and halts the
//! remaining deployments.

use std::time::Duration;

/// Errors reported by a [`DeploymentBackend`](crate::DeploymentBackend).
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The creation transaction was mined but reverted.
    #[error("deployment transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    /// The receipt did not carry a contract address.
    #[error("receipt for {tx_hash} has no contract address")]
    MissingContractAddress { tx_hash: String },

    /// No receipt was observed before the confirmation deadline.
    #[error("no receipt for {tx_hash} after {elapsed:?}")]
    Timeout { tx_hash: String, elapsed: Duration },

    /// The compiled artifact could not be loaded or the constructor arguments
    /// could not be encoded against its ABI.
    #[error("artifact error: {0:#}")]
    Artifact(anyhow::Error),

    /// Transport or node-side failure (insufficient funds, nonce errors, ...).
    #[error("rpc error: {0:#}")]
    Rpc(#[from] anyhow::Error),
}

/// Errors that abort a deployment run.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// A required environment value is missing or malformed.
    #[error("configuration error: {variable}: {reason}")]
    Configuration { variable: String, reason: String },

    /// A descriptor is malformed (empty or duplicated name).
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// The reference graph has a cycle.
    #[error("dependency cycle between artifacts: {}", artifacts.join(" -> "))]
    Cycle { artifacts: Vec<String> },

    /// An argument references an artifact that is not part of the run.
    #[error("artifact `{artifact}` references unknown artifact `{reference}`")]
    UnknownReference { artifact: String, reference: String },

    /// The backend failed to deploy an artifact.
    #[error("failed to deploy `{artifact}`: {source}")]
    Chain {
        artifact: String,
        #[source]
        source: ChainError,
    },

    /// An orchestration invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl DeployError {
    /// Build a [`DeployError::Configuration`] for a variable that is not set.
    pub fn missing(variable: impl Into<String>) -> Self {
        Self::Configuration {
            variable: variable.into(),
            reason: "required value is not set".to_string(),
        }
    }

    /// Whether the error was raised before any chain interaction.
    pub fn is_static(&self) -> bool {
        !matches!(self, Self::Chain { .. } | Self::Internal(_))
    }
}
