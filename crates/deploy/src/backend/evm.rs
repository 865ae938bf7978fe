//! Deployment backend talking to an EVM node over JSON-RPC.

use std::{path::PathBuf, time::Duration};

use alloy_core::primitives::{Address, B256, U64, U128, hex};
use alloy_signer_local::PrivateKeySigner;
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;

use super::{
    Confirmation, DeployRequest, DeploymentBackend, HardhatArtifact, rpc::RpcClient,
    tx::{creation_tx, sign_legacy},
};
use crate::{ChainError, ConfirmationConfig, EnvSource, NetworkConfig};

/// Who signs deployment transactions.
#[derive(Debug, Clone)]
pub enum EvmSender {
    /// An account unlocked on the node (`eth_sendTransaction`).
    /// `None` picks the node's first account.
    NodeAccount(Option<Address>),
    /// A local key; transactions are signed here and sent raw.
    LocalKey(PrivateKeySigner),
}

/// A creation transaction that has been accepted by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDeployment {
    pub artifact: String,
    pub tx_hash: B256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    block_number: U64,
    contract_address: Option<Address>,
    #[serde(default)]
    status: Option<U64>,
    gas_used: U64,
}

/// Error while polling for a receipt.
enum ReceiptPoll {
    Pending,
    Rpc(anyhow::Error),
}

/// [`DeploymentBackend`] that deploys Hardhat artifacts to an EVM chain.
#[derive(Debug)]
pub struct EvmBackend {
    rpc: RpcClient,
    chain_id: u64,
    sender: Address,
    signer: Option<PrivateKeySigner>,
    artifacts_dir: PathBuf,
    gas_price: Option<u64>,
    gas_multiplier_percent: u64,
    confirmation: ConfirmationConfig,
}

impl EvmBackend {
    /// Connect to the network, check its chain id and resolve the sender account.
    pub async fn connect(
        network: &NetworkConfig,
        env: &EnvSource,
        artifacts_dir: PathBuf,
        confirmation: ConfirmationConfig,
    ) -> anyhow::Result<Self> {
        let url = network.rpc_url(env)?;
        let sender = network.sender(env)?;
        let rpc = RpcClient::new(url)?;

        let chain_id = rpc
            .call::<U64>("eth_chainId", vec![])
            .await
            .with_context(|| format!("Failed to reach node at {}", rpc.url()))?
            .to::<u64>();

        if let Some(expected) = network.chain_id.filter(|&expected| expected != chain_id) {
            anyhow::bail!(
                "Node at {} reports chain id {}, expected {}",
                rpc.url(),
                chain_id,
                expected
            );
        }

        let (sender, signer) = match sender {
            EvmSender::LocalKey(signer) => (signer.address(), Some(signer)),
            EvmSender::NodeAccount(Some(address)) => (address, None),
            EvmSender::NodeAccount(None) => {
                let accounts: Vec<Address> = rpc.call("eth_accounts", vec![]).await?;
                let first = accounts
                    .first()
                    .copied()
                    .context("Node has no unlocked accounts; configure a private key")?;
                (first, None)
            }
        };

        tracing::info!(
            chain_id,
            sender = %sender,
            local_signing = signer.is_some(),
            "Connected to network"
        );

        Ok(Self {
            rpc,
            chain_id,
            sender,
            signer,
            artifacts_dir,
            gas_price: network.gas_price,
            gas_multiplier_percent: network.gas_multiplier_percent,
            confirmation,
        })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn estimate_gas(&self, data: &[u8]) -> anyhow::Result<u64> {
        let estimate = self
            .rpc
            .call::<U64>(
                "eth_estimateGas",
                vec![json!({ "from": self.sender, "data": hex::encode_prefixed(data) })],
            )
            .await?
            .to::<u64>();

        Ok(estimate.saturating_mul(self.gas_multiplier_percent) / 100)
    }

    async fn send_signed(
        &self,
        signer: &PrivateKeySigner,
        data: Vec<u8>,
        gas_limit: u64,
    ) -> anyhow::Result<B256> {
        let nonce = self
            .rpc
            .call::<U64>("eth_getTransactionCount", vec![json!(self.sender), json!("pending")])
            .await?
            .to::<u64>();

        let gas_price = match self.gas_price {
            Some(price) => u128::from(price),
            None => self.rpc.call::<U128>("eth_gasPrice", vec![]).await?.to::<u128>(),
        };

        let tx = creation_tx(self.chain_id, nonce, gas_price, gas_limit, data.into());
        let raw = sign_legacy(tx, signer)?;

        tracing::debug!(nonce, gas_price, gas_limit, "Sending signed creation transaction");

        self.rpc.call("eth_sendRawTransaction", vec![json!(raw)]).await
    }

    async fn send_unlocked(&self, data: Vec<u8>, gas_limit: u64) -> anyhow::Result<B256> {
        let mut tx = json!({
            "from": self.sender,
            "data": hex::encode_prefixed(&data),
            "gas": U64::from(gas_limit),
        });
        if let Some(price) = self.gas_price {
            tx["gasPrice"] = json!(U64::from(price));
        }

        self.rpc.call("eth_sendTransaction", vec![tx]).await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt, ChainError> {
        let poll_interval = Duration::from_millis(self.confirmation.poll_interval_ms.max(1));
        let timeout = Duration::from_secs(self.confirmation.timeout_secs);
        let max_polls = (timeout.as_millis() / poll_interval.as_millis()).max(1) as usize;
        let started = Instant::now();
        let rpc = &self.rpc;

        let poll = move || async move {
            match rpc
                .call::<Option<TransactionReceipt>>("eth_getTransactionReceipt", vec![json!(tx_hash)])
                .await
            {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(ReceiptPoll::Pending),
                Err(e) => Err(ReceiptPoll::Rpc(e)),
            }
        };

        poll.retry(
            ConstantBuilder::default()
                .with_delay(poll_interval)
                .with_max_times(max_polls),
        )
        .notify(|err, _| {
            if let ReceiptPoll::Rpc(e) = err {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "Receipt poll failed, retrying...");
            }
        })
        .await
        .map_err(|err| match err {
            ReceiptPoll::Pending => ChainError::Timeout {
                tx_hash: tx_hash.to_string(),
                elapsed: started.elapsed(),
            },
            ReceiptPoll::Rpc(e) => ChainError::Rpc(e),
        })
    }

    /// Wait until `block_number` has the configured number of confirmations.
    async fn wait_for_confirmations(&self, tx_hash: B256, block_number: u64) -> Result<(), ChainError> {
        if self.confirmation.confirmations <= 1 {
            return Ok(());
        }

        let target = block_number.saturating_add(self.confirmation.confirmations - 1);
        let poll_interval = Duration::from_millis(self.confirmation.poll_interval_ms.max(1));
        let deadline = Instant::now() + Duration::from_secs(self.confirmation.timeout_secs);
        let started = Instant::now();

        loop {
            let head = self.rpc.call::<U64>("eth_blockNumber", vec![]).await?.to::<u64>();
            if head >= target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ChainError::Timeout {
                    tx_hash: tx_hash.to_string(),
                    elapsed: started.elapsed(),
                });
            }

            tracing::trace!(head, target, "Waiting for confirmations...");
            tokio::time::sleep(poll_interval).await;
        }
    }
}

impl DeploymentBackend for EvmBackend {
    type Handle = PendingDeployment;

    async fn submit(&mut self, request: DeployRequest<'_>) -> Result<PendingDeployment, ChainError> {
        let artifact = HardhatArtifact::find(&self.artifacts_dir, request.contract)
            .map_err(ChainError::Artifact)?;
        let data = artifact
            .creation_code(request.args)
            .map_err(ChainError::Artifact)?
            .to_vec();

        let gas_limit = self.estimate_gas(&data).await?;

        let tx_hash = match &self.signer {
            Some(signer) => self.send_signed(signer, data, gas_limit).await?,
            None => self.send_unlocked(data, gas_limit).await?,
        };

        tracing::info!(
            artifact = request.artifact,
            contract = request.contract,
            tx_hash = %tx_hash,
            gas_limit,
            "Creation transaction sent"
        );

        Ok(PendingDeployment {
            artifact: request.artifact.to_string(),
            tx_hash,
        })
    }

    async fn confirm(&mut self, handle: PendingDeployment) -> Result<Confirmation, ChainError> {
        let receipt = self.wait_for_receipt(handle.tx_hash).await?;

        if receipt.status == Some(U64::ZERO) {
            return Err(ChainError::Reverted {
                tx_hash: handle.tx_hash.to_string(),
            });
        }

        let address = receipt
            .contract_address
            .ok_or_else(|| ChainError::MissingContractAddress {
                tx_hash: handle.tx_hash.to_string(),
            })?;

        let block_number = receipt.block_number.to::<u64>();
        self.wait_for_confirmations(handle.tx_hash, block_number).await?;

        Ok(Confirmation {
            address,
            tx_hash: Some(handle.tx_hash),
            gas_used: Some(receipt.gas_used.to::<u64>()),
            block_number: Some(block_number),
        })
    }
}
