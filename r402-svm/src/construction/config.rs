//! Configuration for the transaction-construction pipeline.

use serde::{Deserialize, Serialize};

/// Whether the pipeline may reach out to a live chain RPC.
///
/// `derive`, `payloads`, `combine`, `parse`, and `hash` never perform
/// network I/O and run identically in either mode. `metadata` and
/// `submit` require [`OfflineMode::Online`] and return
/// [`super::error::ConstructionError::UnavailableOffline`] otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfflineMode {
    /// Network-backed phases are permitted.
    Online,
    /// Network-backed phases are rejected up front.
    Offline,
}

impl Default for OfflineMode {
    fn default() -> Self {
        Self::Online
    }
}

/// Configuration shared by every phase of the construction pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Gates the `metadata` and `submit` endpoints.
    #[serde(default)]
    pub mode: OfflineMode,

    /// Lamports charged per required signature when no live fee calculator
    /// is available. The upstream Solana RPC no longer exposes a
    /// per-blockhash fee calculator (`getFees` was deprecated), so this
    /// constant is always what `metadata` reports absent a durable nonce.
    #[serde(default = "default_lamports_per_signature")]
    pub default_lamports_per_signature: u64,
}

/// Lamports charged per transaction signature under the current fee schedule.
pub const DEFAULT_LAMPORTS_PER_SIGNATURE: u64 = 5000;

const fn default_lamports_per_signature() -> u64 {
    DEFAULT_LAMPORTS_PER_SIGNATURE
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: OfflineMode::default(),
            default_lamports_per_signature: default_lamports_per_signature(),
        }
    }
}

impl PipelineConfig {
    /// Returns whether online-only phases are currently permitted.
    #[must_use]
    pub const fn is_online(&self) -> bool {
        matches!(self.mode, OfflineMode::Online)
    }
}
