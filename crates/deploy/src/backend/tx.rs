//! Locally signed EIP-155 creation transactions.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_core::primitives::{Bytes, TxKind, U256};
use alloy_eips::eip2718::Encodable2718;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;

/// Legacy contract-creation transaction replay-protected for `chain_id`.
pub(crate) fn creation_tx(
    chain_id: u64,
    nonce: u64,
    gas_price: u128,
    gas_limit: u64,
    init_code: Bytes,
) -> TxLegacy {
    TxLegacy {
        chain_id: Some(chain_id),
        nonce,
        gas_price,
        gas_limit,
        to: TxKind::Create,
        value: U256::ZERO,
        input: init_code,
    }
}

/// Sign `tx` and return the raw bytes for `eth_sendRawTransaction`.
pub(crate) fn sign_legacy(tx: TxLegacy, signer: &PrivateKeySigner) -> anyhow::Result<Bytes> {
    let signature = signer.sign_hash_sync(&tx.signature_hash())?;
    let envelope = TxEnvelope::from(tx.into_signed(signature));
    Ok(envelope.encoded_2718().into())
}
