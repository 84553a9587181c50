//! External chain RPC surface (§4.4, §10).
//!
//! [`ChainClient`] is the narrow async interface the `metadata`, `preprocess`,
//! and `submit` phases need from a live Solana RPC endpoint. It names exactly
//! the operations those phases call; the transport (JSON-RPC over HTTPS, or
//! an in-memory stub for tests) lives outside this crate.

use async_trait::async_trait;
use solana_pubkey::Pubkey;

use crate::construction::error::ConstructionError;

/// Parsed nonce-account state, as returned by `getAccountInfo` for a durable
/// nonce account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceAccountInfo {
    /// The account authorized to advance this nonce.
    pub authority: Pubkey,
    /// The durable nonce value currently stored in the account, usable in
    /// place of a recent blockhash.
    pub blockhash: [u8; 32],
    /// Lamports per signature under the fee schedule the nonce was stamped with.
    pub lamports_per_signature: u64,
}

/// One token account returned by `getTokenAccountsByOwner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountInfo {
    /// The token account's own address.
    pub address: Pubkey,
    /// The mint the account holds a balance of.
    pub mint: Pubkey,
}

/// Recent blockhash and the slot it was observed at, as returned by
/// `getLatestBlockhash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashStatus {
    /// 32-byte blockhash.
    pub blockhash: [u8; 32],
    /// Slot the blockhash was last valid at.
    pub slot: u64,
}

/// The chain operations the online construction phases depend on.
///
/// Implementors own retries, timeouts, and transport selection; every
/// method here is single-attempt from the pipeline's point of view (§7).
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Fetches and parses a durable nonce account's current state.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::BroadcastFailed`] if the RPC call fails,
    /// or [`ConstructionError::UnableToParseIntermediateResult`] if the
    /// account is not a valid nonce account.
    async fn get_nonce_account_info(&self, nonce_account: &Pubkey) -> Result<NonceAccountInfo, ConstructionError>;

    /// Lists the token accounts `owner` holds for `mint`.
    ///
    /// Returns an empty vector (never an error) if the owner has no token
    /// account for that mint yet — the builder treats that as "create one".
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::BroadcastFailed`] if the RPC call fails.
    async fn get_token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<TokenAccountInfo>, ConstructionError>;

    /// Fetches the cluster's latest blockhash and the slot it was observed at.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::BroadcastFailed`] if the RPC call fails.
    async fn get_latest_blockhash(&self) -> Result<BlockhashStatus, ConstructionError>;

    /// Submits a fully-signed, base58-encoded transaction to the cluster.
    ///
    /// Returns the transaction's first signature, base58-encoded.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::BroadcastFailed`] if the cluster rejects
    /// the transaction or the transport fails.
    async fn send_transaction(&self, signed_transaction_base58: &str) -> Result<String, ConstructionError>;

    /// Fetches the RPC node's reported software version string.
    ///
    /// Used only for liveness/compatibility checks; not on the hot path of
    /// any construction endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::BroadcastFailed`] if the RPC call fails.
    async fn get_version(&self) -> Result<String, ConstructionError>;
}
