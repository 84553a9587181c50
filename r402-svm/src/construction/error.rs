//! Error types for the Solana transaction-construction API.

/// Errors surfaced at the construction pipeline's API boundary.
///
/// Every variant corresponds to one of the stable, caller-visible error
/// kinds the construction endpoints are allowed to return. There is no
/// local retry: the chain RPC is single-attempt and callers own their own
/// retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ConstructionError {
    /// An online-only phase (`metadata`, `submit`) was invoked while the
    /// pipeline is configured for offline mode.
    #[error("construction endpoint unavailable in offline mode")]
    UnavailableOffline,

    /// A transaction, message, or metadata blob could not be parsed:
    /// invalid base58/hex, truncated wire data, or a signer missing from
    /// the account table.
    #[error("unable to parse intermediate result: {0}")]
    UnableToParseIntermediateResult(String),

    /// The request is internally inconsistent: an unpaired amount, an
    /// operation type unknown to the builder, or a matched-pair invariant
    /// violation.
    #[error("unclear intent: {0}")]
    UnclearIntent(String),

    /// `combine` produced a transaction that fails to re-serialize.
    #[error("invalid signature: {0}")]
    SignatureInvalid(String),

    /// The chain RPC rejected `submit`, or the transport failed.
    #[error("broadcast failed: {0}")]
    BroadcastFailed(String),
}

impl ConstructionError {
    /// Builds an [`ConstructionError::UnableToParseIntermediateResult`] from any displayable cause.
    pub fn parse(cause: impl std::fmt::Display) -> Self {
        Self::UnableToParseIntermediateResult(cause.to_string())
    }

    /// Builds an [`ConstructionError::UnclearIntent`] from any displayable cause.
    pub fn intent(cause: impl std::fmt::Display) -> Self {
        Self::UnclearIntent(cause.to_string())
    }
}
