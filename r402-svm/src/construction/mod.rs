//! Blockchain-agnostic transaction construction for Solana.
//!
//! This module implements a Rosetta-style construction API: a closed
//! vocabulary of abstract `Program__Operation` entries, an eight-endpoint
//! pipeline that expands them into a signable Solana transaction and back,
//! and a reverse decoder that recovers the vocabulary from arbitrary wire
//! transactions.
//!
//! # Operation type vocabulary
//!
//! Every operation's `type` field is one of the following closed strings
//! (any other string is rejected with [`error::ConstructionError::UnclearIntent`]):
//!
//! - `System__{Transfer, CreateAccount, Assign, CreateNonceAccount, AdvanceNonce,
//!   WithdrawFromNonce, AuthorizeNonce, Allocate}`
//! - `SplToken__{Transfer, TransferChecked, TransferNew, TransferWithSystem,
//!   CreateAccount, InitializeMint, InitializeAccount, CreateToken, Approve,
//!   Revoke, MintTo, Burn, CloseAccount, FreezeAccount}`
//! - `SplAssociatedTokenAccount__Create`
//! - `Stake__{CreateStakeAccount, DelegateStake, CreateStakeAndDelegate,
//!   DeactivateStake, WithdrawStake, Merge, Split, Authorize}`
//! - `Unknown` (decode-only: a recognized program whose instruction has no
//!   vocabulary counterpart, or an unrecognized program entirely)
//!
//! Of these, [`builder`] only has expansion rules for the families listed in
//! §4.2: the `InitializeMint`, `Approve`, `Revoke`, `MintTo`, `Burn`,
//! `CloseAccount`, and `FreezeAccount` SPL-token operations, and `CreateToken`,
//! are decode-only — [`decoder`] can recognize them on the way back out of a
//! transaction, but a construction request naming one is rejected.
//!
//! # The eight endpoints
//!
//! [`pipeline`] exposes the pipeline as eight free functions, mirroring the
//! construction API's offline/online split:
//!
//! 1. [`pipeline::derive`] - raw public key to base58 address. Pure.
//! 2. [`pipeline::preprocess`] - match operations, resolve nonce hints. Reaches
//!    a [`client::ChainClient`] only if a durable nonce was named.
//! 3. [`pipeline::metadata`] - resolve a blockhash/fee and any pending ATA
//!    addresses. Always online.
//! 4. [`pipeline::payloads`] - build instructions, assemble the message,
//!    allocate signing payloads. Pure.
//! 5. [`pipeline::combine`] - inject caller-collected signatures. Pure.
//! 6. [`pipeline::parse`] - decompile a transaction back into operations. Pure.
//! 7. [`pipeline::hash`] - a signed transaction's identifier. Pure.
//! 8. [`pipeline::submit`] - broadcast a signed transaction. Always online.

pub mod assembler;
pub mod builder;
pub mod client;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod intent;
pub mod matcher;
pub mod pipeline;
pub mod types;
