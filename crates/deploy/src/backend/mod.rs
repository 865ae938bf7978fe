//! The seam between the orchestrator and whatever actually puts contracts on chain.

mod artifacts;
mod evm;
mod rpc;
mod tx;

use std::future::Future;

use alloy_core::primitives::{Address, B256};

pub use artifacts::{HardhatArtifact, encode_constructor_args};
pub use evm::{EvmBackend, EvmSender, PendingDeployment};

use crate::{ArgValue, ChainError};

/// One contract-creation request.
#[derive(Debug, Clone, Copy)]
pub struct DeployRequest<'a> {
    /// Artifact name, as reported.
    pub artifact: &'a str,
    /// Compiled contract to instantiate.
    pub contract: &'a str,
    /// Fully resolved constructor arguments.
    pub args: &'a [ArgValue],
}

/// Outcome of a confirmed deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub address: Address,
    pub tx_hash: Option<B256>,
    pub gas_used: Option<u64>,
    pub block_number: Option<u64>,
}

/// Two-step deployment contract: submit a creation transaction, then wait
/// for it to be final.
pub trait DeploymentBackend {
    /// Handle to a submitted but unconfirmed deployment.
    type Handle: Send;

    /// Submit a contract-creation transaction.
    fn submit(
        &mut self,
        request: DeployRequest<'_>,
    ) -> impl Future<Output = Result<Self::Handle, ChainError>> + Send;

    /// Wait until the submission is final and return the deployed address.
    fn confirm(
        &mut self,
        handle: Self::Handle,
    ) -> impl Future<Output = Result<Confirmation, ChainError>> + Send;
}
