//! L2 signing
//!
//! Two signatures travel with an L2 transaction: the zk signature by the
//! account's L2 key (behind [`SyncSigner`]) and an EIP-191 co-signature by
//! the base-chain key over a human-readable description of the operation.

use alloy::primitives::{keccak256, utils::format_units, U256};
use alloy::signers::SignerSync;
use eyre::{eyre, Result};

use super::types::{PubKeyHash, SyncTx, Token, TxEthSignature, TxSignature};
use crate::identity::Identity;

/// Message whose base-chain signature seeds the L2 key
pub const ACCOUNT_ACCESS_MESSAGE: &str =
    "Access zkSync account.\n\nOnly sign this message for a trusted client!";

const TRUSTED_CLIENT_FOOTER: &str = "Only sign this message for a trusted client!";

/// Holder of an account's L2 signing key
pub trait SyncSigner: Send + Sync {
    /// Hash of the public key, as registered by `ChangePubKey`
    fn pub_key_hash(&self) -> &PubKeyHash;

    /// zk signature over `tx`, or `None` when the operator does not require one
    fn sign_tx(&self, tx: &SyncTx) -> Result<Option<TxSignature>>;
}

/// L2 key derived from the identity's signature of [`ACCOUNT_ACCESS_MESSAGE`]
///
/// Only the key hash is derived; transactions go out without a zk signature,
/// which development operators accept.
#[derive(Debug, Clone)]
pub struct EthDerivedSigner {
    pub_key_hash: PubKeyHash,
}

impl EthDerivedSigner {
    pub fn from_identity(identity: &Identity) -> Result<Self> {
        let seed = identity
            .signer()
            .sign_message_sync(ACCOUNT_ACCESS_MESSAGE.as_bytes())
            .map_err(|e| eyre!("Failed to sign account access message: {}", e))?;

        let digest = keccak256(seed.as_bytes());
        let mut hash = [0u8; 20];
        hash.copy_from_slice(&digest[..20]);

        Ok(Self {
            pub_key_hash: PubKeyHash::from_bytes(hash),
        })
    }
}

impl SyncSigner for EthDerivedSigner {
    fn pub_key_hash(&self) -> &PubKeyHash {
        &self.pub_key_hash
    }

    fn sign_tx(&self, _tx: &SyncTx) -> Result<Option<TxSignature>> {
        Ok(None)
    }
}

fn human_amount(amount: U256, token: &Token) -> String {
    format_units(amount, token.decimals).unwrap_or_else(|_| amount.to_string())
}

/// Text the base-chain key co-signs for `tx`. `token` is the transferred or
/// fee token.
pub fn eth_message(tx: &SyncTx, token: &Token) -> String {
    match tx {
        SyncTx::Transfer(t) => format!(
            "Transfer {amount} {sym}\nTo: {to:#x}\nNonce: {nonce}\nFee: {fee} {sym}\nAccount Id: {id}",
            amount = human_amount(t.amount, token),
            sym = token.symbol,
            to = t.to,
            nonce = t.nonce,
            fee = human_amount(t.fee, token),
            id = t.account_id,
        ),
        SyncTx::Withdraw(w) => format!(
            "Withdraw {amount} {sym}\nTo: {to:#x}\nNonce: {nonce}\nFee: {fee} {sym}\nAccount Id: {id}",
            amount = human_amount(w.amount, token),
            sym = token.symbol,
            to = w.to,
            nonce = w.nonce,
            fee = human_amount(w.fee, token),
            id = w.account_id,
        ),
        SyncTx::ChangePubKey(c) => format!(
            "Register zkSync pubkey:\n\n{hash}\nnonce: 0x{nonce:08x}\naccount id: 0x{id:08x}\n\n{footer}",
            hash = c.new_pk_hash.hex(),
            nonce = c.nonce,
            id = c.account_id,
            footer = TRUSTED_CLIENT_FOOTER,
        ),
    }
}

/// EIP-191 signature of `message` by the identity's base-chain key
pub fn sign_eth_message(identity: &Identity, message: &str) -> Result<TxEthSignature> {
    let signature = identity
        .signer()
        .sign_message_sync(message.as_bytes())
        .map_err(|e| eyre!("Failed to sign L2 operation message: {}", e))?;

    Ok(TxEthSignature::EthereumSignature {
        signature: format!("0x{}", hex::encode(signature.as_bytes())),
    })
}
