//! SPL Token program instruction encode/decode.
//!
//! Discriminant is a single `u8` matching `spl_token::instruction::TokenInstruction`
//! ordinals. This crate builds `InitializeAccount`, `Transfer`, and
//! `TransferChecked`; it additionally decodes `InitializeMint`, `Approve`,
//! `Revoke`, `MintTo`, `Burn`, `CloseAccount`, `FreezeAccount`, and
//! `ThawAccount` so ordinary token traffic this crate doesn't build never
//! falls back to `Unknown`.

use serde_json::{Map, json};
use solana_pubkey::Pubkey;

use super::{DecodedInstruction, Reader};
use crate::construction::error::ConstructionError;
use crate::construction::types::{AccountMeta, Instruction, TOKEN_PROGRAM_ID};

/// On-wire size of a token mint account.
pub const MINT_ACCOUNT_SIZE: u64 = 82;
/// On-wire size of a token account.
pub const TOKEN_ACCOUNT_SIZE: u64 = 165;

const INITIALIZE_MINT: u8 = 0;
const INITIALIZE_ACCOUNT: u8 = 1;
const TRANSFER: u8 = 3;
const APPROVE: u8 = 4;
const REVOKE: u8 = 5;
const MINT_TO: u8 = 7;
const BURN: u8 = 8;
const CLOSE_ACCOUNT: u8 = 9;
const FREEZE_ACCOUNT: u8 = 10;
const THAW_ACCOUNT: u8 = 11;
const TRANSFER_CHECKED: u8 = 12;

/// `SysvarRent` used by `InitializeAccount`/`InitializeMint`.
const SYSVAR_RENT_ID: Pubkey = crate::construction::types::SYSVAR_RENT_ID;

/// `Token::InitializeAccount(account, mint, owner)`.
#[must_use]
pub fn initialize_account(account: Pubkey, mint: Pubkey, owner: Pubkey) -> Instruction {
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(account),
            AccountMeta::readonly(mint),
            AccountMeta::readonly(owner),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ],
        data: vec![INITIALIZE_ACCOUNT],
    }
}

/// `Token::Transfer(source, destination, authority, amount)`. No multisig support.
#[must_use]
pub fn transfer(source: Pubkey, destination: Pubkey, authority: Pubkey, amount: u64) -> Instruction {
    let mut data = vec![TRANSFER];
    data.extend_from_slice(&amount.to_le_bytes());
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(source),
            AccountMeta::writable(destination),
            AccountMeta::signer_readonly(authority),
        ],
        data,
    }
}

/// `Token::TransferChecked(source, mint, destination, authority, amount, decimals)`.
/// No multisig support.
#[must_use]
pub fn transfer_checked(
    source: Pubkey,
    mint: Pubkey,
    destination: Pubkey,
    authority: Pubkey,
    amount: u64,
    decimals: u8,
) -> Instruction {
    let mut data = vec![TRANSFER_CHECKED];
    data.extend_from_slice(&amount.to_le_bytes());
    data.push(decimals);
    Instruction {
        program_id: TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(source),
            AccountMeta::readonly(mint),
            AccountMeta::writable(destination),
            AccountMeta::signer_readonly(authority),
        ],
        data,
    }
}

/// Decodes an SPL Token instruction payload given its resolved account keys.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// data is truncated for its discriminant, or the discriminant is unrecognized.
pub fn decode(data: &[u8], accounts: &[Pubkey]) -> Result<DecodedInstruction, ConstructionError> {
    let mut reader = Reader::new(data);
    let discriminant = reader
        .read_u8()
        .ok_or_else(|| ConstructionError::parse("truncated token instruction discriminant"))?;
    let acc = |i: usize| accounts.get(i).copied().map(|p| p.to_string());
    let mut info = Map::new();

    let instruction_type = match discriminant {
        INITIALIZE_MINT => {
            let decimals = reader.read_u8().ok_or_else(|| ConstructionError::parse("initializeMint"))?;
            let authority = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("initializeMint"))?;
            let has_freeze = reader.read_u8().ok_or_else(|| ConstructionError::parse("initializeMint"))?;
            let freeze_authority = if has_freeze == 1 {
                reader.read_pubkey().map(|p| p.to_string())
            } else {
                None
            };
            info.insert("mint".into(), json!(acc(0)));
            info.insert("decimals".into(), json!(decimals));
            info.insert("authority".into(), json!(authority.to_string()));
            if let Some(freeze) = freeze_authority {
                info.insert("freezeAuthority".into(), json!(freeze));
            }
            "initializeMint"
        }
        INITIALIZE_ACCOUNT => {
            info.insert("destination".into(), json!(acc(0)));
            info.insert("mint".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            "initializeAccount"
        }
        TRANSFER => {
            let amount = reader.read_u64().ok_or_else(|| ConstructionError::parse("transfer"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            info.insert("amount".into(), json!(amount));
            "transfer"
        }
        APPROVE => {
            let amount = reader.read_u64().ok_or_else(|| ConstructionError::parse("approve"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            info.insert("amount".into(), json!(amount));
            "approve"
        }
        REVOKE => {
            info.insert("source".into(), json!(acc(0)));
            info.insert("authority".into(), json!(acc(1)));
            "revoke"
        }
        MINT_TO => {
            let amount = reader.read_u64().ok_or_else(|| ConstructionError::parse("mintTo"))?;
            info.insert("mint".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            info.insert("amount".into(), json!(amount));
            "mintTo"
        }
        BURN => {
            let amount = reader.read_u64().ok_or_else(|| ConstructionError::parse("burn"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("mint".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            info.insert("amount".into(), json!(amount));
            "burn"
        }
        CLOSE_ACCOUNT => {
            info.insert("source".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            "closeAccount"
        }
        FREEZE_ACCOUNT => {
            info.insert("source".into(), json!(acc(0)));
            info.insert("mint".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            "freezeAccount"
        }
        THAW_ACCOUNT => {
            info.insert("source".into(), json!(acc(0)));
            info.insert("mint".into(), json!(acc(1)));
            info.insert("authority".into(), json!(acc(2)));
            "thawAccount"
        }
        TRANSFER_CHECKED => {
            let amount = reader.read_u64().ok_or_else(|| ConstructionError::parse("transferChecked"))?;
            let decimals = reader.read_u8().ok_or_else(|| ConstructionError::parse("transferChecked"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("mint".into(), json!(acc(1)));
            info.insert("destination".into(), json!(acc(2)));
            info.insert("authority".into(), json!(acc(3)));
            info.insert("amount".into(), json!(amount));
            info.insert("decimals".into(), json!(decimals));
            "transferChecked"
        }
        other => return Err(ConstructionError::parse(format!("unknown token discriminant {other}"))),
    };

    Ok(DecodedInstruction::new(instruction_type, info))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    #[test]
    fn decode_transfer_checked_round_trips() {
        let ix = transfer_checked(pk(1), pk(2), pk(3), pk(4), 100, 6);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "transferChecked");
        assert_eq!(decoded.info["mint"], json!(pk(2).to_string()));
        assert_eq!(decoded.info["amount"], json!(100u64));
        assert_eq!(decoded.info["decimals"], json!(6u8));
    }

    #[test]
    fn decode_transfer_unchecked_has_no_mint_field() {
        let ix = transfer(pk(1), pk(2), pk(4), 100);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "transfer");
        assert!(!decoded.info.contains_key("mint"));
    }

    #[test]
    fn decode_rejects_unknown_discriminant() {
        assert!(decode(&[250], &[]).is_err());
    }
}
