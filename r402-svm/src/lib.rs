#![cfg_attr(docsrs, feature(doc_auto_cfg))]

//! Solana transaction-construction support for the x402 payment protocol.
//!
//! This crate implements the construction half of a blockchain-agnostic
//! transaction-construction API for the Solana ledger: an offline/online
//! pair of stateless endpoints that, given a list of abstract `Operation`
//! entries describing intended state changes, produces a correctly
//! assembled, canonically encoded, signable Solana transaction, and
//! conversely parses arbitrary serialized transactions back into the same
//! operation vocabulary.
//!
//! # Architecture
//!
//! - [`construction`] - Operation/instruction translation, transaction
//!   assembly and signing-slot discipline, and instruction decoding. See
//!   that module's docs for the full operation type vocabulary and the
//!   eight-endpoint pipeline.
//!
//! # Feature Flags
//!
//! - `construction` - Operation/instruction translation and transaction
//!   assembly API (this crate's sole feature).
//! - `telemetry` - `OpenTelemetry`/`tracing` instrumentation of the
//!   construction pipeline's phase boundaries.

#[cfg(feature = "construction")]
pub mod construction;
