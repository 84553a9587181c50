//! Wire and domain types for the transaction-construction API.
//!
//! These mirror the Rosetta-style construction vocabulary: an abstract,
//! chain-agnostic `Operation` list in, a signable Solana transaction out,
//! and back. Account addresses that cross the API boundary are base58
//! text; everything that stays inside the pipeline is a [`Pubkey`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use solana_pubkey::{Pubkey, pubkey};

/// System program.
pub const SYSTEM_PROGRAM_ID: Pubkey = pubkey!("11111111111111111111111111111111");
/// SPL Token program.
pub const TOKEN_PROGRAM_ID: Pubkey = pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
/// Associated Token Account program.
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey =
    pubkey!("ATokenGPvbdGVxr1b2hvZbsiqW5xWH25efTNsLJA8knL");
/// Stake program.
pub const STAKE_PROGRAM_ID: Pubkey = pubkey!("Stake11111111111111111111111111111111111111");
/// Compute Budget program.
pub const COMPUTE_BUDGET_PROGRAM_ID: Pubkey =
    pubkey!("ComputeBudget111111111111111111111111111111");
/// `RecentBlockhashes` sysvar.
pub const SYSVAR_RECENT_BLOCKHASHES_ID: Pubkey =
    pubkey!("SysvarRecentB1ockHashes11111111111111111111");
/// `Rent` sysvar.
pub const SYSVAR_RENT_ID: Pubkey = pubkey!("SysvarRent111111111111111111111111111111111");

/// Native currency symbol (SOL).
pub const NATIVE_SYMBOL: &str = "SOL";
/// Native currency decimals (lamports per SOL is 10^9).
pub const NATIVE_DECIMALS: i32 = 9;

/// Double-underscore separator used by the `Program__Operation` type vocabulary.
pub const TYPE_SEPARATOR: &str = "__";

/// A currency: either the native lamport denomination or an SPL token
/// identified by its mint address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Currency {
    /// `"SOL"` for native currency, or the mint address (base58) for SPL tokens.
    pub symbol: String,
    /// Number of decimal places; 9 for SOL, the mint's decimals for SPL tokens.
    pub decimals: i32,
}

impl Currency {
    /// The native SOL currency.
    #[must_use]
    pub fn native() -> Self {
        Self {
            symbol: NATIVE_SYMBOL.to_string(),
            decimals: NATIVE_DECIMALS,
        }
    }

    /// An SPL token currency for the given mint.
    #[must_use]
    pub fn spl_token(mint: impl Into<String>, decimals: i32) -> Self {
        Self {
            symbol: mint.into(),
            decimals,
        }
    }

    /// Whether this is the native currency.
    #[must_use]
    pub fn is_native(&self) -> bool {
        self.symbol == NATIVE_SYMBOL
    }
}

/// A signed decimal amount in a given currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Amount {
    /// Signed base-10 integer, e.g. `"-1000000000"`.
    pub value: String,
    /// Denomination of [`Amount::value`].
    pub currency: Currency,
}

impl Amount {
    /// Builds an amount from an unsigned magnitude and explicit sign.
    #[must_use]
    pub fn new(magnitude: u64, negative: bool, currency: Currency) -> Self {
        let value = if negative {
            format!("-{magnitude}")
        } else {
            magnitude.to_string()
        };
        Self { value, currency }
    }

    /// Splits [`Amount::value`] into `(is_negative, magnitude)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid base-10 integer.
    pub fn magnitude(&self) -> Result<(bool, u64), std::num::ParseIntError> {
        magnitude_and_sign(&self.value)
    }
}

/// Splits a signed base-10 string into `(is_negative, magnitude)`.
///
/// # Errors
///
/// Returns an error if `value` stripped of a leading `-` is not a valid `u64`.
pub fn magnitude_and_sign(value: &str) -> Result<(bool, u64), std::num::ParseIntError> {
    value.strip_prefix('-').map_or_else(
        || value.parse::<u64>().map(|m| (false, m)),
        |rest| rest.parse::<u64>().map(|m| (true, m)),
    )
}

/// A reference to an account by its base58 address, with optional extra metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AccountIdentifier {
    /// Base58-encoded public key.
    pub address: String,
    /// Extra account-identifier metadata (unused by this API, carried for compatibility).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AccountIdentifier {
    /// Builds an identifier from a bare address with no metadata.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            metadata: Map::new(),
        }
    }
}

/// The monotonically-assigned index of an [`Operation`] within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationIdentifier {
    /// Zero-based position within the operation list.
    pub index: i64,
}

/// An abstract, chain-agnostic description of one intended state change.
///
/// See the operation type vocabulary in [`crate::construction`] module docs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Unique, request-scoped identifier.
    pub operation_identifier: OperationIdentifier,
    /// One of the closed vocabulary of `Program__Operation` type strings.
    #[serde(rename = "type")]
    pub operation_type: String,
    /// The account this operation debits/credits, or carries as its primary subject.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountIdentifier>,
    /// The signed amount moved by this operation, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Amount>,
    /// Operation-family-specific fields (source, destination, mint, authority, ...).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Operation {
    /// Reads a metadata field as a string.
    #[must_use]
    pub fn meta_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Reads a metadata field as a `u64`.
    #[must_use]
    pub fn meta_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }

    /// Reads a metadata field as an `i64`.
    #[must_use]
    pub fn meta_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| {
            v.as_i64()
                .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
        })
    }

    /// The program half of this operation's `Program__Operation` type string.
    #[must_use]
    pub fn family(&self) -> &str {
        self.operation_type
            .split_once(TYPE_SEPARATOR)
            .map_or(self.operation_type.as_str(), |(family, _)| family)
    }
}

/// A pair of operations the matcher has determined represent one transfer:
/// equal type and currency, equal magnitude, opposite sign.
#[derive(Debug, Clone)]
pub struct TransferIntent {
    /// The operation carrying the negative amount.
    pub from: Operation,
    /// The operation carrying the positive amount.
    pub to: Operation,
}

/// The result of running the operation matcher over one request.
#[derive(Debug, Clone)]
pub enum MatchedOp {
    /// An operation with no expected counterpart (no amount, or a
    /// metadata-only family like `System__CreateNonceAccount`).
    Singleton(Operation),
    /// A paired debit/credit.
    Intent(TransferIntent),
}

/// One account reference within a wire-level [`Instruction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountMeta {
    /// The referenced account.
    pub pubkey: Pubkey,
    /// Whether this instruction requires the account to sign.
    pub is_signer: bool,
    /// Whether this instruction may mutate the account.
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable, signing account.
    #[must_use]
    pub const fn signer_writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: true,
        }
    }

    /// A read-only, signing account.
    #[must_use]
    pub const fn signer_readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: true,
            is_writable: false,
        }
    }

    /// A writable, non-signing account.
    #[must_use]
    pub const fn writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: true,
        }
    }

    /// A read-only, non-signing account.
    #[must_use]
    pub const fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_signer: false,
            is_writable: false,
        }
    }
}

/// A wire-level Solana instruction: a program id, its account list, and an
/// opaque, program-defined data payload.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// The program this instruction invokes.
    pub program_id: Pubkey,
    /// Ordered account references, with signer/writable flags.
    pub accounts: Vec<AccountMeta>,
    /// Little-endian-packed, program-defined payload (see the codec submodules).
    pub data: Vec<u8>,
}

/// An [`Instruction`] rewritten so its accounts reference a message's
/// canonical account table by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledInstruction {
    /// Index into [`Message::account_keys`] of the invoked program.
    pub program_id_index: u8,
    /// Indexes into [`Message::account_keys`] for each account, in order.
    pub account_indexes: Vec<u8>,
    /// The instruction's opaque data payload.
    pub data: Vec<u8>,
}

/// Signer/writable-partition counts for a [`Message`]'s account table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageHeader {
    /// Number of accounts that must sign the transaction; also the length of
    /// [`Transaction::signatures`].
    pub num_required_signatures: u8,
    /// Of the signing accounts, how many are read-only (trail the writable ones).
    pub num_readonly_signed_accounts: u8,
    /// Of the non-signing accounts, how many are read-only (trail the writable ones).
    pub num_readonly_unsigned_accounts: u8,
}

/// A canonical Solana message: header, deduplicated account table, recent
/// blockhash, and compiled instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Header partition counts.
    pub header: MessageHeader,
    /// Deduplicated accounts: signer-writable, signer-readonly,
    /// unsigned-writable, unsigned-readonly, in that order.
    pub account_keys: Vec<Pubkey>,
    /// 32-byte blockhash (or durable nonce value) this transaction is valid against.
    pub recent_blockhash: [u8; 32],
    /// Instructions, compiled against [`Message::account_keys`].
    pub instructions: Vec<CompiledInstruction>,
}

impl Message {
    /// The signer region of the account table: `accounts[0..num_required_signatures]`.
    #[must_use]
    pub fn signer_accounts(&self) -> &[Pubkey] {
        &self.account_keys[..self.header.num_required_signatures as usize]
    }
}

/// A 64-byte Ed25519 signature slot.
pub type SignatureBytes = [u8; 64];

/// A fully-addressed Solana transaction: one signature per required signer,
/// plus the message they signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// One slot per [`MessageHeader::num_required_signatures`], in account-table order.
    pub signatures: Vec<SignatureBytes>,
    /// The signed message.
    pub message: Message,
}

impl Transaction {
    /// Whether every signature slot is non-zero.
    #[must_use]
    pub fn is_fully_signed(&self) -> bool {
        self.signatures.iter().all(|sig| *sig != [0u8; 64])
    }
}

/// Durable-nonce transaction parameters: the nonce account and its current authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithNonce {
    /// The on-chain nonce account holding the replay-protection value.
    pub account: Pubkey,
    /// The account authorized to advance the nonce.
    pub authority: Pubkey,
}

/// A compute-unit price expressed in micro-lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PriorityFee {
    /// Micro-lamports per compute unit; zero means "no priority fee instruction".
    #[serde(default)]
    pub micro_lamports: u64,
}

/// A pair of token accounts (and their mint) the pipeline has resolved for
/// one `SplToken__TransferWithSystem` leg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplAccounts {
    /// Sender's token account (wallet address before resolution).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    /// Receiver's token account (wallet address before resolution).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,
    /// Mint shared by both token accounts.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub mint: String,
}

/// Fee-per-signature, as last observed from the chain (or the fixed default).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FeeCalculator {
    /// Lamports charged per required transaction signature.
    pub lamports_per_signature: u64,
}

/// The options blob returned by `preprocess` and consumed by `metadata`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionOptions {
    /// Durable-nonce parameters, if the request specified any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_nonce: Option<WithNonce>,
    /// Priority fee, if the request specified one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_fee: Option<PriorityFee>,
    /// Per-operation-index SPL account pairs awaiting ATA resolution,
    /// keyed by the sending operation's index rendered as base-10 text.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub spl_system_acc_map: HashMap<String, SplAccounts>,
}

/// The opaque envelope passed caller-to-server between `preprocess`,
/// `metadata`, and `payloads`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructionMetadata {
    /// Base58-encoded 32-byte blockhash (or durable nonce value).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub block_hash: String,
    /// Slot number the blockhash was observed at (not populated on the nonce path).
    #[serde(default)]
    pub block_number: u64,
    /// Fee-per-signature at construction time.
    #[serde(default)]
    pub fee_calculator: FeeCalculator,
    /// Durable-nonce parameters, carried through from [`ConstructionOptions`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_nonce: Option<WithNonce>,
    /// Priority fee, carried through from [`ConstructionOptions`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_fee: Option<PriorityFee>,
    /// Resolved (or empty, pending create-idempotent) token accounts per SPL transfer leg.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub spl_token_acc_map: HashMap<String, SplAccounts>,
}

/// Ed25519, the only signature algorithm this API supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignatureType {
    /// Ed25519 signatures over the serialized message bytes.
    #[serde(rename = "ed25519")]
    Ed25519,
}

/// One (address, message-bytes) pair the caller must produce a signature for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningPayload {
    /// The signer's base58 address.
    pub address: String,
    /// The exact bytes to sign (the serialized message, not the transaction).
    pub bytes: Vec<u8>,
    /// Always [`SignatureType::Ed25519`].
    pub signature_type: SignatureType,
}

/// A caller-supplied signature for one signer of an unsigned transaction.
#[derive(Debug, Clone)]
pub struct SignaturePair {
    /// The signer this signature belongs to.
    pub public_key: Pubkey,
    /// The 64-byte Ed25519 signature.
    pub signature: SignatureBytes,
}

/// Request for `derive`: the raw 32-byte public key to render as an address.
#[derive(Debug, Clone)]
pub struct DeriveRequest {
    /// The public key bytes.
    pub public_key: [u8; 32],
}

/// Response for `derive`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeriveResponse {
    /// Base58 rendering of the public key.
    pub address: String,
}

/// Request for `preprocess`.
#[derive(Debug, Clone)]
pub struct PreprocessRequest {
    /// The operations to translate.
    pub operations: Vec<Operation>,
    /// Caller-supplied hints: `withNonce` / `priorityFee`, if any.
    pub metadata: Map<String, Value>,
}

/// Response for `preprocess`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreprocessResponse {
    /// Options to forward verbatim into `metadata`.
    pub options: ConstructionOptions,
}

/// Request for `metadata`.
#[derive(Debug, Clone)]
pub struct MetadataRequest {
    /// Options produced by `preprocess`.
    pub options: ConstructionOptions,
}

/// Response for `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataResponse {
    /// Opaque envelope to forward verbatim into `payloads`.
    pub metadata: ConstructionMetadata,
    /// A single suggested fee amount in the native currency.
    pub suggested_fee: Vec<Amount>,
}

/// Request for `payloads`.
#[derive(Debug, Clone)]
pub struct PayloadsRequest {
    /// The same operations passed to `preprocess`.
    pub operations: Vec<Operation>,
    /// The envelope returned by `metadata`.
    pub metadata: ConstructionMetadata,
}

/// Response for `payloads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadsResponse {
    /// Base58-encoded transaction with zero-filled signature slots.
    pub unsigned_transaction: String,
    /// One signing payload per required signer.
    pub payloads: Vec<SigningPayload>,
}

/// Request for `combine`.
#[derive(Debug, Clone)]
pub struct CombineRequest {
    /// The `payloads` output.
    pub unsigned_transaction: String,
    /// Caller-collected signatures, one per signer (any order).
    pub signatures: Vec<SignaturePair>,
}

/// Response for `combine`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombineResponse {
    /// Base58-encoded, fully-signed transaction.
    pub signed_transaction: String,
}

/// Request for `parse`. Accepts either the unsigned or the signed wire form.
#[derive(Debug, Clone)]
pub struct ParseRequest {
    /// Base58 (or, on decode failure, hex) encoded transaction.
    pub transaction: String,
}

/// Response for `parse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResponse {
    /// The decompiled operation list.
    pub operations: Vec<Operation>,
    /// Base58 addresses of the transaction's unique signers, account-table order.
    pub account_identifier_signers: Vec<AccountIdentifier>,
}

/// Request for `hash`.
#[derive(Debug, Clone)]
pub struct HashRequest {
    /// Base58 (or hex) encoded, fully-signed transaction.
    pub signed_transaction: String,
}

/// Request for `submit`.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Base58 (or hex) encoded, fully-signed transaction.
    pub signed_transaction: String,
}

/// Response shared by `hash` and `submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionIdentifierResponse {
    /// Base58 of the transaction's first signature.
    pub transaction_hash: String,
}
