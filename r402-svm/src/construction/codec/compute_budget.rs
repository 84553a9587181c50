//! Compute Budget program instruction encode/decode.
//!
//! Discriminant is a single `u8` matching `ComputeBudgetInstruction`
//! ordinals. This crate builds only `SetComputeUnitPrice` (the priority-fee
//! prefix, P1); it additionally decodes `SetComputeUnitLimit` and
//! `RequestHeapFrame` so a transaction carrying the usual compute-budget
//! pair never falls back to `Unknown` on the limit half.

use serde_json::{Map, json};

use super::{DecodedInstruction, Reader};
use crate::construction::error::ConstructionError;
use crate::construction::types::{COMPUTE_BUDGET_PROGRAM_ID, Instruction};

const REQUEST_HEAP_FRAME: u8 = 1;
const SET_COMPUTE_UNIT_LIMIT: u8 = 2;
const SET_COMPUTE_UNIT_PRICE: u8 = 3;

/// `ComputeBudget::SetComputeUnitPrice(micro_lamports)`. No account metas.
#[must_use]
pub fn set_compute_unit_price(micro_lamports: u64) -> Instruction {
    let mut data = vec![SET_COMPUTE_UNIT_PRICE];
    data.extend_from_slice(&micro_lamports.to_le_bytes());
    Instruction {
        program_id: COMPUTE_BUDGET_PROGRAM_ID,
        accounts: Vec::new(),
        data,
    }
}

/// Decodes a Compute-Budget instruction payload.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// data is truncated for its discriminant, or the discriminant is unrecognized.
pub fn decode(data: &[u8]) -> Result<DecodedInstruction, ConstructionError> {
    let mut reader = Reader::new(data);
    let discriminant = reader
        .read_u8()
        .ok_or_else(|| ConstructionError::parse("truncated compute budget instruction discriminant"))?;
    let mut info = Map::new();

    let instruction_type = match discriminant {
        REQUEST_HEAP_FRAME => {
            let bytes = reader.read_u32().ok_or_else(|| ConstructionError::parse("requestHeapFrame"))?;
            info.insert("bytes".into(), json!(bytes));
            "requestHeapFrame"
        }
        SET_COMPUTE_UNIT_LIMIT => {
            let units = reader.read_u32().ok_or_else(|| ConstructionError::parse("setComputeUnitLimit"))?;
            info.insert("units".into(), json!(units));
            "setComputeUnitLimit"
        }
        SET_COMPUTE_UNIT_PRICE => {
            let micro_lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("setComputeUnitPrice"))?;
            info.insert("microLamports".into(), json!(micro_lamports));
            "setComputeUnitPrice"
        }
        other => return Err(ConstructionError::parse(format!("unknown compute budget discriminant {other}"))),
    };

    Ok(DecodedInstruction::new(instruction_type, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_set_compute_unit_price_round_trips() {
        let ix = set_compute_unit_price(1_000);
        let decoded = decode(&ix.data).unwrap();
        assert_eq!(decoded.instruction_type, "setComputeUnitPrice");
        assert_eq!(decoded.info["microLamports"], json!(1_000u64));
    }

    #[test]
    fn decode_rejects_unknown_discriminant() {
        assert!(decode(&[250]).is_err());
    }
}
