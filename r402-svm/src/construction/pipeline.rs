//! Construction pipeline (C4): the eight stateless endpoints that translate
//! between the operation vocabulary and signable Solana transactions (§4.4).
//!
//! `derive`, `payloads`, `combine`, `parse`, and `hash` are pure functions of
//! their input — no chain RPC, no [`PipelineConfig`]. `preprocess` reaches
//! out to a [`ChainClient`] only when a request names a durable nonce (to
//! resolve its current authority); `metadata` and `submit` always require
//! [`OfflineMode::Online`] and a live [`ChainClient`].

use std::collections::HashMap;

use serde_json::{Map, Value};
use solana_pubkey::Pubkey;

use crate::construction::client::ChainClient;
use crate::construction::codec::envelope;
use crate::construction::config::{OfflineMode, PipelineConfig};
use crate::construction::error::ConstructionError;
use crate::construction::intent::parse_pubkey;
use crate::construction::types::{
    Amount, CombineRequest, CombineResponse, ConstructionMetadata, ConstructionOptions, Currency, DeriveRequest,
    DeriveResponse, FeeCalculator, HashRequest, MetadataRequest, MetadataResponse, ParseRequest, ParseResponse,
    PayloadsRequest, PayloadsResponse, PreprocessRequest, PreprocessResponse, PriorityFee, SplAccounts, SubmitRequest,
    TransactionIdentifierResponse, WithNonce,
};
use crate::construction::{assembler, builder, decoder, matcher};

/// Renders a raw public key as its base58 address (§4.4 `derive`).
#[must_use]
pub fn derive(req: DeriveRequest) -> DeriveResponse {
    DeriveResponse { address: Pubkey::new_from_array(req.public_key).to_string() }
}

/// Resolves the request's hints, matches and dry-runs the operations to
/// surface shape errors early, and (if a durable nonce was named) fetches
/// its current authority.
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if the operations don't
/// match per §4.1, or if `withNonce`/`priorityFee` metadata is malformed.
/// Hard-errors (rather than falling back) if the nonce account's authority
/// can't be fetched (O1).
pub async fn preprocess<C: ChainClient>(req: PreprocessRequest, client: &C) -> Result<PreprocessResponse, ConstructionError> {
    #[cfg(feature = "telemetry")]
    tracing::debug!(operations = req.operations.len(), "construction preprocess started");

    let mut with_nonce = parse_with_nonce(&req.metadata)?;
    let priority_fee = parse_priority_fee(&req.metadata)?;

    if let Some(nonce) = with_nonce.as_mut() {
        let info = client.get_nonce_account_info(&nonce.account).await?;
        nonce.authority = info.authority;
    }

    let matched = matcher::match_operations(&req.operations)?;
    let spl_system_acc_map = matcher::spl_system_acc_map(&matched);

    // Dry-run the builder (no resolved ATAs yet) purely to surface shape
    // errors and count instructions for telemetry; the counts themselves
    // aren't part of the response (§4.4).
    let empty_map = HashMap::new();
    let ctx = builder::BuilderContext { priority_fee, spl_token_acc_map: &empty_map };
    let mut instruction_count = 0usize;
    for m in &matched {
        instruction_count += builder::build_instructions(m, &ctx)?.len();
    }

    #[cfg(feature = "telemetry")]
    tracing::debug!(instruction_count, with_nonce = with_nonce.is_some(), "construction preprocess complete");

    Ok(PreprocessResponse { options: ConstructionOptions { with_nonce, priority_fee, spl_system_acc_map } })
}

/// Resolves the envelope `payloads` will need: a blockhash (or the durable
/// nonce's current value), a fee calculator, and ATA resolution for every
/// pending `SplToken__TransferWithSystem` leg.
///
/// # Errors
///
/// Returns [`ConstructionError::UnavailableOffline`] if the pipeline is
/// configured offline. Returns [`ConstructionError::BroadcastFailed`] if the
/// chain RPC fails (O1: no silent fallback).
pub async fn metadata<C: ChainClient>(req: MetadataRequest, client: &C, config: &PipelineConfig) -> Result<MetadataResponse, ConstructionError> {
    if !config.is_online() {
        return Err(ConstructionError::UnavailableOffline);
    }

    #[cfg(feature = "telemetry")]
    tracing::debug!(with_nonce = req.options.with_nonce.is_some(), "construction metadata started");

    let (block_hash, block_number, fee_calculator) = if let Some(nonce) = &req.options.with_nonce {
        let info = client.get_nonce_account_info(&nonce.account).await?;
        (bs58::encode(info.blockhash).into_string(), 0, FeeCalculator { lamports_per_signature: info.lamports_per_signature })
    } else {
        let status = client.get_latest_blockhash().await?;
        (bs58::encode(status.blockhash).into_string(), status.slot, FeeCalculator { lamports_per_signature: config.default_lamports_per_signature })
    };

    let mut spl_token_acc_map = HashMap::new();
    for (index, pending) in &req.options.spl_system_acc_map {
        let mint = parse_pubkey(&pending.mint)?;
        let source_wallet = parse_pubkey(&pending.source)?;
        let destination_wallet = parse_pubkey(&pending.destination)?;

        // Both legs are filtered by mint (O3): an owner can hold many token
        // accounts, only the one for this exact mint is a valid resolution.
        let source = resolve_token_account(client, &source_wallet, &mint).await?;
        let destination = resolve_token_account(client, &destination_wallet, &mint).await?;
        spl_token_acc_map.insert(index.clone(), SplAccounts { source, destination, mint: pending.mint.clone() });
    }

    let suggested_fee = vec![Amount::new(fee_calculator.lamports_per_signature, false, Currency::native())];

    #[cfg(feature = "telemetry")]
    tracing::debug!(resolved_legs = spl_token_acc_map.len(), "construction metadata complete");

    Ok(MetadataResponse {
        metadata: ConstructionMetadata {
            block_hash,
            block_number,
            fee_calculator,
            with_nonce: req.options.with_nonce,
            priority_fee: req.options.priority_fee,
            spl_token_acc_map,
        },
        suggested_fee,
    })
}

async fn resolve_token_account<C: ChainClient>(client: &C, owner: &Pubkey, mint: &Pubkey) -> Result<String, ConstructionError> {
    let accounts = client.get_token_accounts_by_owner(owner, mint).await?;
    Ok(accounts.into_iter().next().map_or_else(String::new, |a| a.address.to_string()))
}

/// Builds the wire instructions, assembles the canonical message (prefixing
/// an `AdvanceNonceAccount` instruction if the request carries a durable
/// nonce), and allocates the zero-filled signature slots and signing
/// payloads (§4.4).
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if the operations don't
/// match or a builder rule fails. Returns
/// [`ConstructionError::UnableToParseIntermediateResult`] if
/// `metadata.blockHash` isn't valid base58/hex 32 bytes.
pub fn payloads(req: PayloadsRequest) -> Result<PayloadsResponse, ConstructionError> {
    #[cfg(feature = "telemetry")]
    tracing::debug!(operations = req.operations.len(), "construction payloads started");

    let matched = matcher::match_operations(&req.operations)?;
    let ctx = builder::BuilderContext { priority_fee: req.metadata.priority_fee, spl_token_acc_map: &req.metadata.spl_token_acc_map };

    let mut instructions = Vec::new();
    for m in &matched {
        instructions.extend(builder::build_instructions(m, &ctx)?);
    }

    // Fee payer precedence (§4.4): Stake__WithdrawStake's explicit override,
    // else the first signer among the pre-advance instructions.
    let fee_payer = match builder::fee_payer_override(&matched)? {
        Some(pk) => Some(pk),
        None => instructions.iter().find_map(|ix| ix.accounts.iter().find(|m| m.is_signer).map(|m| m.pubkey)),
    };

    if let Some(nonce) = &req.metadata.with_nonce {
        instructions.insert(0, crate::construction::codec::system::advance_nonce_account(nonce.account, nonce.authority));
    }

    let recent_blockhash = decode_blockhash(&req.metadata.block_hash)?;
    let message = assembler::assemble(&instructions, fee_payer, recent_blockhash)?;
    let (tx, signing_payloads) = assembler::build_payloads(&message);
    let unsigned_transaction = envelope::encode_base58(&tx);

    #[cfg(feature = "telemetry")]
    tracing::debug!(signers = signing_payloads.len(), instructions = message.instructions.len(), "construction payloads complete");

    Ok(PayloadsResponse { unsigned_transaction, payloads: signing_payloads })
}

fn decode_blockhash(encoded: &str) -> Result<[u8; 32], ConstructionError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .or_else(|_| hex::decode(encoded))
        .map_err(|_| ConstructionError::parse("blockHash is neither valid base58 nor hex"))?;
    bytes.try_into().map_err(|_| ConstructionError::parse("blockHash is not 32 bytes"))
}

/// Injects caller-collected signatures into their resolved signer-table
/// positions and reserializes the transaction (§4.4).
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// unsigned transaction doesn't decode, or a signature's public key is
/// outside the signer region (B2). Returns
/// [`ConstructionError::SignatureInvalid`] if the combined transaction fails
/// to reserialize.
pub fn combine(req: CombineRequest) -> Result<CombineResponse, ConstructionError> {
    let mut tx = envelope::decode_envelope(&req.unsigned_transaction)?;
    assembler::combine(&mut tx, &req.signatures)?;

    let signed_transaction = envelope::encode_base58(&tx);
    envelope::decode_envelope(&signed_transaction).map_err(|e| ConstructionError::SignatureInvalid(e.to_string()))?;

    #[cfg(feature = "telemetry")]
    tracing::debug!(signatures = req.signatures.len(), "construction combine complete");

    Ok(CombineResponse { signed_transaction })
}

/// Decompiles a transaction (unsigned or signed) back into its operation
/// list (§4.5, C6).
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// transaction doesn't decode.
pub fn parse(req: ParseRequest) -> Result<ParseResponse, ConstructionError> {
    let tx = envelope::decode_envelope(&req.transaction)?;
    let (operations, account_identifier_signers) = decoder::decode_transaction(&tx)?;

    #[cfg(feature = "telemetry")]
    tracing::debug!(operations = operations.len(), "construction parse complete");

    Ok(ParseResponse { operations, account_identifier_signers })
}

/// Computes a signed transaction's identifier: the base58 of its first
/// signature (§4.4).
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// transaction doesn't decode or carries no signatures.
pub fn hash(req: HashRequest) -> Result<TransactionIdentifierResponse, ConstructionError> {
    let tx = envelope::decode_envelope(&req.signed_transaction)?;
    let signature = tx.signatures.first().ok_or_else(|| ConstructionError::parse("transaction has no signature slots"))?;
    Ok(TransactionIdentifierResponse { transaction_hash: bs58::encode(signature).into_string() })
}

/// Forwards a fully-signed transaction to the chain (§4.4).
///
/// # Errors
///
/// Returns [`ConstructionError::UnavailableOffline`] if the pipeline is
/// configured offline. Returns [`ConstructionError::UnableToParseIntermediateResult`]
/// if the transaction doesn't decode. Returns
/// [`ConstructionError::BroadcastFailed`] if the chain RPC rejects it.
pub async fn submit<C: ChainClient>(req: SubmitRequest, client: &C, config: &PipelineConfig) -> Result<TransactionIdentifierResponse, ConstructionError> {
    if !config.is_online() {
        return Err(ConstructionError::UnavailableOffline);
    }

    let tx = envelope::decode_envelope(&req.signed_transaction)?;
    let canonical = envelope::encode_base58(&tx);
    let transaction_hash = client.send_transaction(&canonical).await?;

    #[cfg(feature = "telemetry")]
    tracing::debug!(%transaction_hash, "construction submit complete");

    Ok(TransactionIdentifierResponse { transaction_hash })
}

fn parse_with_nonce(metadata: &Map<String, Value>) -> Result<Option<WithNonce>, ConstructionError> {
    let Some(value) = metadata.get("withNonce").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let account = value
        .get("account")
        .and_then(Value::as_str)
        .ok_or_else(|| ConstructionError::intent("withNonce.account is required"))
        .and_then(parse_pubkey)?;
    let authority = value
        .get("authority")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| Ok(Pubkey::new_from_array([0; 32])), parse_pubkey)?;
    Ok(Some(WithNonce { account, authority }))
}

fn parse_priority_fee(metadata: &Map<String, Value>) -> Result<Option<PriorityFee>, ConstructionError> {
    let Some(value) = metadata.get("priorityFee").filter(|v| !v.is_null()) else {
        return Ok(None);
    };
    let micro_lamports = value.get("microLamports").and_then(Value::as_u64).unwrap_or(0);
    Ok(Some(PriorityFee { micro_lamports }))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use solana_keypair::Keypair;
    use solana_signer::Signer;

    use super::*;
    use crate::construction::client::{BlockhashStatus, NonceAccountInfo, TokenAccountInfo};
    use crate::construction::types::{AccountIdentifier, Operation, OperationIdentifier, SignatureBytes, SignaturePair, SYSTEM_PROGRAM_ID};

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    /// An in-memory [`ChainClient`] stub for pipeline tests: a fixed
    /// blockhash/fee schedule, an optional nonce account, and a log of
    /// submitted transactions.
    #[derive(Default)]
    struct StubClient {
        blockhash: [u8; 32],
        nonce_authority: Option<Pubkey>,
        token_accounts: Vec<TokenAccountInfo>,
        submitted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ChainClient for StubClient {
        async fn get_nonce_account_info(&self, _nonce_account: &Pubkey) -> Result<NonceAccountInfo, ConstructionError> {
            let authority = self.nonce_authority.ok_or_else(|| ConstructionError::BroadcastFailed("no nonce account configured".into()))?;
            Ok(NonceAccountInfo { authority, blockhash: self.blockhash, lamports_per_signature: 5000 })
        }

        async fn get_token_accounts_by_owner(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Vec<TokenAccountInfo>, ConstructionError> {
            Ok(self.token_accounts.iter().copied().filter(|a| a.mint == *mint && a.address != *owner).collect())
        }

        async fn get_latest_blockhash(&self) -> Result<BlockhashStatus, ConstructionError> {
            Ok(BlockhashStatus { blockhash: self.blockhash, slot: 42 })
        }

        async fn send_transaction(&self, signed_transaction_base58: &str) -> Result<String, ConstructionError> {
            self.submitted.lock().unwrap().push(signed_transaction_base58.to_string());
            Ok("5VERySignatureAsABase58StringPlaceholder111".to_string())
        }

        async fn get_version(&self) -> Result<String, ConstructionError> {
            Ok("1.18.0".to_string())
        }
    }

    fn transfer_ops(from: Pubkey, to: Pubkey, lamports: u64) -> Vec<Operation> {
        vec![
            Operation {
                operation_identifier: OperationIdentifier { index: 0 },
                operation_type: "System__Transfer".to_string(),
                account: Some(AccountIdentifier::new(from.to_string())),
                amount: Some(Amount::new(lamports, true, Currency::native())),
                metadata: Map::new(),
            },
            Operation {
                operation_identifier: OperationIdentifier { index: 1 },
                operation_type: "System__Transfer".to_string(),
                account: Some(AccountIdentifier::new(to.to_string())),
                amount: Some(Amount::new(lamports, false, Currency::native())),
                metadata: Map::new(),
            },
        ]
    }

    #[tokio::test]
    async fn full_pipeline_round_trips_a_native_transfer() {
        let payer = Keypair::new();
        let from = payer.pubkey();
        let to = pk(2);
        let ops = transfer_ops(from, to, 1_000_000_000);
        let client = StubClient { blockhash: [7; 32], ..Default::default() };
        let config = PipelineConfig::default();

        let preprocessed = preprocess(PreprocessRequest { operations: ops.clone(), metadata: Map::new() }, &client).await.unwrap();
        let meta = metadata(MetadataRequest { options: preprocessed.options }, &client, &config).await.unwrap();
        assert_eq!(meta.suggested_fee[0].value, "5000");

        let built = payloads(PayloadsRequest { operations: ops, metadata: meta.metadata }).unwrap();
        assert_eq!(built.payloads.len(), 1);
        assert_eq!(built.payloads[0].address, from.to_string());

        let signature_bytes: SignatureBytes = payer.sign_message(&built.payloads[0].bytes).into();
        let combined = combine(CombineRequest {
            unsigned_transaction: built.unsigned_transaction,
            signatures: vec![SignaturePair { public_key: from, signature: signature_bytes }],
        })
        .unwrap();

        let parsed = parse(ParseRequest { transaction: combined.signed_transaction.clone() }).unwrap();
        assert_eq!(parsed.operations.len(), 2);
        assert_eq!(parsed.operations[0].operation_type, "System__Transfer");
        assert_eq!(parsed.operations[0].amount.as_ref().unwrap().value, "-1000000000");

        let hashed = hash(HashRequest { signed_transaction: combined.signed_transaction.clone() }).unwrap();
        assert!(!hashed.transaction_hash.is_empty());

        let submitted = submit(SubmitRequest { signed_transaction: combined.signed_transaction }, &client, &config).await.unwrap();
        assert!(!submitted.transaction_hash.is_empty());
        assert_eq!(client.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn metadata_rejects_when_offline() {
        let client = StubClient { blockhash: [1; 32], ..Default::default() };
        let config = PipelineConfig { mode: OfflineMode::Offline, ..PipelineConfig::default() };
        let err = metadata(MetadataRequest { options: ConstructionOptions::default() }, &client, &config).await.unwrap_err();
        assert!(matches!(err, ConstructionError::UnavailableOffline));
    }

    #[tokio::test]
    async fn preprocess_hard_errors_when_nonce_authority_lookup_fails() {
        let client = StubClient { blockhash: [1; 32], nonce_authority: None, ..Default::default() };
        let ops = transfer_ops(pk(1), pk(2), 10);
        let metadata_hint = Map::from_iter([("withNonce".to_string(), json!({ "account": pk(9).to_string(), "authority": "" }))]);
        let err = preprocess(PreprocessRequest { operations: ops, metadata: metadata_hint }, &client).await.unwrap_err();
        assert!(matches!(err, ConstructionError::BroadcastFailed(_)));
    }

    #[tokio::test]
    async fn durable_nonce_transfer_prepends_advance_nonce_instruction() {
        let payer = Keypair::new();
        let from = payer.pubkey();
        let nonce_account = pk(5);
        let client = StubClient { blockhash: [3; 32], nonce_authority: Some(from), ..Default::default() };
        let config = PipelineConfig::default();
        let ops = transfer_ops(from, pk(2), 500);
        let metadata_hint = Map::from_iter([("withNonce".to_string(), json!({ "account": nonce_account.to_string(), "authority": "" }))]);

        let preprocessed = preprocess(PreprocessRequest { operations: ops.clone(), metadata: metadata_hint }, &client).await.unwrap();
        assert!(preprocessed.options.with_nonce.is_some());
        let meta = metadata(MetadataRequest { options: preprocessed.options }, &client, &config).await.unwrap();
        let built = payloads(PayloadsRequest { operations: ops, metadata: meta.metadata }).unwrap();

        let tx = envelope::decode_envelope(&built.unsigned_transaction).unwrap();
        assert_eq!(tx.message.instructions.len(), 2);
        assert_eq!(tx.message.account_keys[tx.message.instructions[0].program_id_index as usize], SYSTEM_PROGRAM_ID);
    }
}
