//! Little-endian wire codec for the five Solana programs this API speaks,
//! plus the base58/hex transaction envelope.
//!
//! Every `encode_*` / `decode_*` pair in the program submodules is the
//! identity on the typed record (R3): encoding then decoding an
//! instruction reproduces its fields exactly.

pub mod associated_token_account;
pub mod compute_budget;
pub mod envelope;
pub mod stake;
pub mod system;
pub mod token;

/// A cursor over a little-endian-packed byte slice.
///
/// Every `read_*` method advances the cursor and returns `None` on
/// truncated input rather than panicking; callers turn that into a
/// [`super::error::ConstructionError`] at the decode call site.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wraps `data` for sequential little-endian reads starting at offset 0.
    #[must_use]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(self.pos..self.pos + 4)?.try_into().ok()?;
        self.pos += 4;
        Some(u32::from_le_bytes(bytes))
    }

    /// Reads a little-endian `u64`.
    pub fn read_u64(&mut self) -> Option<u64> {
        let bytes: [u8; 8] = self.data.get(self.pos..self.pos + 8)?.try_into().ok()?;
        self.pos += 8;
        Some(u64::from_le_bytes(bytes))
    }

    /// Reads a little-endian `i64`.
    pub fn read_i64(&mut self) -> Option<i64> {
        self.read_u64().map(|v| v as i64)
    }

    /// Reads exactly 32 bytes.
    pub fn read_pubkey(&mut self) -> Option<solana_pubkey::Pubkey> {
        let bytes: [u8; 32] = self.data.get(self.pos..self.pos + 32)?.try_into().ok()?;
        self.pos += 32;
        Some(solana_pubkey::Pubkey::new_from_array(bytes))
    }

    /// Reads a `u64`-length-prefixed UTF-8 string (the System-program seed encoding).
    pub fn read_seed_string(&mut self) -> Option<String> {
        let len = self.read_u64()? as usize;
        let bytes = self.data.get(self.pos..self.pos + len)?;
        self.pos += len;
        String::from_utf8(bytes.to_vec()).ok()
    }

    /// Reads all remaining bytes.
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Reads exactly `len` bytes, or `None` if fewer remain.
    pub fn remaining_slice(&mut self, len: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos + len)?;
        self.pos += len;
        Some(slice)
    }
}

/// Appends a `u64`-length-prefixed UTF-8 string (the System-program seed encoding).
pub fn push_seed_string(buf: &mut Vec<u8>, seed: &str) {
    buf.extend_from_slice(&(seed.len() as u64).to_le_bytes());
    buf.extend_from_slice(seed.as_bytes());
}

/// The result of decoding one program-specific instruction payload: a
/// human-readable instruction type name plus its typed fields, erased to
/// a JSON object so the reverse decoder (C6) can project them uniformly
/// into operation metadata.
#[derive(Debug, Clone)]
pub struct DecodedInstruction {
    /// Lower camelCase instruction name (e.g. `"transfer"`, `"advanceNonce"`).
    pub instruction_type: &'static str,
    /// Field name to value, exactly as the builder-facing structs name them.
    pub info: serde_json::Map<String, serde_json::Value>,
}

impl DecodedInstruction {
    /// Builds a decoded instruction from a name and an already-built field map.
    #[must_use]
    pub const fn new(instruction_type: &'static str, info: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { instruction_type, info }
    }
}
