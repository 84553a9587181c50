//! System-program instruction encode/decode.
//!
//! Discriminant is a little-endian `u32` matching the on-chain
//! `SystemInstruction` enum ordinals. This crate builds 0, 1, 2, 4, 5, 6,
//! 7, 8; it additionally decodes 3, 9, 10, 11 (`*WithSeed` variants) so a
//! transaction containing ordinary System-program traffic this crate
//! doesn't build never parses as a bare `Unknown`.

use serde_json::{Map, json};
use solana_pubkey::Pubkey;

use super::{DecodedInstruction, Reader, push_seed_string};
use crate::construction::error::ConstructionError;
use crate::construction::types::{AccountMeta, Instruction, SYSTEM_PROGRAM_ID, SYSVAR_RECENT_BLOCKHASHES_ID, SYSVAR_RENT_ID};

const CREATE_ACCOUNT: u32 = 0;
const ASSIGN: u32 = 1;
const TRANSFER: u32 = 2;
const CREATE_ACCOUNT_WITH_SEED: u32 = 3;
const ADVANCE_NONCE_ACCOUNT: u32 = 4;
const WITHDRAW_NONCE_ACCOUNT: u32 = 5;
const INITIALIZE_NONCE_ACCOUNT: u32 = 6;
const AUTHORIZE_NONCE_ACCOUNT: u32 = 7;
const ALLOCATE: u32 = 8;
const ALLOCATE_WITH_SEED: u32 = 9;
const ASSIGN_WITH_SEED: u32 = 10;
const TRANSFER_WITH_SEED: u32 = 11;

fn header(discriminant: u32) -> Vec<u8> {
    discriminant.to_le_bytes().to_vec()
}

/// `System::CreateAccount(from, new, lamports, space, owner)`.
#[must_use]
pub fn create_account(from: Pubkey, new: Pubkey, owner: Pubkey, lamports: u64, space: u64) -> Instruction {
    let mut data = header(CREATE_ACCOUNT);
    data.extend_from_slice(&lamports.to_le_bytes());
    data.extend_from_slice(&space.to_le_bytes());
    data.extend_from_slice(&owner.to_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::signer_writable(from), AccountMeta::signer_writable(new)],
        data,
    }
}

/// `System::Assign(account, owner)`.
#[must_use]
pub fn assign(account: Pubkey, owner: Pubkey) -> Instruction {
    let mut data = header(ASSIGN);
    data.extend_from_slice(&owner.to_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::signer_writable(account)],
        data,
    }
}

/// `System::Transfer(source, destination, lamports)`.
#[must_use]
pub fn transfer(source: Pubkey, destination: Pubkey, lamports: u64) -> Instruction {
    let mut data = header(TRANSFER);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::signer_writable(source), AccountMeta::writable(destination)],
        data,
    }
}

/// `System::AdvanceNonceAccount(nonce, authority)`.
#[must_use]
pub fn advance_nonce_account(nonce: Pubkey, authority: Pubkey) -> Instruction {
    let data = header(ADVANCE_NONCE_ACCOUNT);
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(nonce),
            AccountMeta::readonly(SYSVAR_RECENT_BLOCKHASHES_ID),
            AccountMeta::signer_readonly(authority),
        ],
        data,
    }
}

/// `System::WithdrawNonceAccount(nonce, authority, destination, lamports)`.
#[must_use]
pub fn withdraw_nonce_account(nonce: Pubkey, authority: Pubkey, destination: Pubkey, lamports: u64) -> Instruction {
    let mut data = header(WITHDRAW_NONCE_ACCOUNT);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(nonce),
            AccountMeta::writable(destination),
            AccountMeta::readonly(SYSVAR_RECENT_BLOCKHASHES_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
            AccountMeta::signer_readonly(authority),
        ],
        data,
    }
}

/// `System::InitializeNonceAccount(nonce, authority)`.
#[must_use]
pub fn initialize_nonce_account(nonce: Pubkey, authority: Pubkey) -> Instruction {
    let mut data = header(INITIALIZE_NONCE_ACCOUNT);
    data.extend_from_slice(&authority.to_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(nonce),
            AccountMeta::readonly(SYSVAR_RECENT_BLOCKHASHES_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ],
        data,
    }
}

/// `System::AuthorizeNonceAccount(nonce, authority, new_authority)`.
#[must_use]
pub fn authorize_nonce_account(nonce: Pubkey, authority: Pubkey, new_authority: Pubkey) -> Instruction {
    let mut data = header(AUTHORIZE_NONCE_ACCOUNT);
    data.extend_from_slice(&new_authority.to_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(nonce), AccountMeta::signer_readonly(authority)],
        data,
    }
}

/// `System::Allocate(account, space)`.
#[must_use]
pub fn allocate(account: Pubkey, space: u64) -> Instruction {
    let mut data = header(ALLOCATE);
    data.extend_from_slice(&space.to_le_bytes());
    Instruction {
        program_id: SYSTEM_PROGRAM_ID,
        accounts: vec![AccountMeta::signer_writable(account)],
        data,
    }
}

/// Decodes a System-program instruction payload given its resolved account keys.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// data is truncated for its discriminant, or the discriminant is unrecognized.
pub fn decode(data: &[u8], accounts: &[Pubkey]) -> Result<DecodedInstruction, ConstructionError> {
    let mut reader = Reader::new(data);
    let discriminant = reader
        .read_u32()
        .ok_or_else(|| ConstructionError::parse("truncated system instruction discriminant"))?;
    let acc = |i: usize| accounts.get(i).copied().map(|p| p.to_string());
    let mut info = Map::new();

    let instruction_type = match discriminant {
        CREATE_ACCOUNT => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("createAccount"))?;
            let space = reader.read_u64().ok_or_else(|| ConstructionError::parse("createAccount"))?;
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("createAccount"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("newAccount".into(), json!(acc(1)));
            info.insert("lamports".into(), json!(lamports));
            info.insert("space".into(), json!(space));
            info.insert("owner".into(), json!(owner.to_string()));
            "createAccount"
        }
        ASSIGN => {
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("assign"))?;
            info.insert("account".into(), json!(acc(0)));
            info.insert("owner".into(), json!(owner.to_string()));
            "assign"
        }
        TRANSFER => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("transfer"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("lamports".into(), json!(lamports));
            "transfer"
        }
        CREATE_ACCOUNT_WITH_SEED => {
            let base = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("createAccountWithSeed"))?;
            let seed = reader.read_seed_string().ok_or_else(|| ConstructionError::parse("createAccountWithSeed"))?;
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("createAccountWithSeed"))?;
            let space = reader.read_u64().ok_or_else(|| ConstructionError::parse("createAccountWithSeed"))?;
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("createAccountWithSeed"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("newAccount".into(), json!(acc(1)));
            info.insert("base".into(), json!(base.to_string()));
            info.insert("seed".into(), json!(seed));
            info.insert("lamports".into(), json!(lamports));
            info.insert("space".into(), json!(space));
            info.insert("owner".into(), json!(owner.to_string()));
            "createAccountWithSeed"
        }
        ADVANCE_NONCE_ACCOUNT => {
            info.insert("nonceAccount".into(), json!(acc(0)));
            info.insert("recentBlockhashesSysvar".into(), json!(acc(1)));
            info.insert("nonceAuthority".into(), json!(acc(2)));
            "advanceNonce"
        }
        WITHDRAW_NONCE_ACCOUNT => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("withdrawFromNonce"))?;
            info.insert("nonceAccount".into(), json!(acc(0)));
            info.insert("destination".into(), json!(acc(1)));
            info.insert("recentBlockhashesSysvar".into(), json!(acc(2)));
            info.insert("rentSysvar".into(), json!(acc(3)));
            info.insert("nonceAuthority".into(), json!(acc(4)));
            info.insert("lamports".into(), json!(lamports));
            "withdrawFromNonce"
        }
        INITIALIZE_NONCE_ACCOUNT => {
            let authority = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("initializeNonce"))?;
            info.insert("nonceAccount".into(), json!(acc(0)));
            info.insert("recentBlockhashesSysvar".into(), json!(acc(1)));
            info.insert("rentSysvar".into(), json!(acc(2)));
            info.insert("nonceAuthority".into(), json!(authority.to_string()));
            "initializeNonce"
        }
        AUTHORIZE_NONCE_ACCOUNT => {
            let new_authority = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("authorizeNonce"))?;
            info.insert("nonceAccount".into(), json!(acc(0)));
            info.insert("nonceAuthority".into(), json!(acc(1)));
            info.insert("newAuthorized".into(), json!(new_authority.to_string()));
            "authorizeNonce"
        }
        ALLOCATE => {
            let space = reader.read_u64().ok_or_else(|| ConstructionError::parse("allocate"))?;
            info.insert("account".into(), json!(acc(0)));
            info.insert("space".into(), json!(space));
            "allocate"
        }
        ALLOCATE_WITH_SEED => {
            let base = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("allocateWithSeed"))?;
            let seed = reader.read_seed_string().ok_or_else(|| ConstructionError::parse("allocateWithSeed"))?;
            let space = reader.read_u64().ok_or_else(|| ConstructionError::parse("allocateWithSeed"))?;
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("allocateWithSeed"))?;
            info.insert("account".into(), json!(acc(0)));
            info.insert("base".into(), json!(base.to_string()));
            info.insert("seed".into(), json!(seed));
            info.insert("space".into(), json!(space));
            info.insert("owner".into(), json!(owner.to_string()));
            "allocateWithSeed"
        }
        ASSIGN_WITH_SEED => {
            let base = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("assignWithSeed"))?;
            let seed = reader.read_seed_string().ok_or_else(|| ConstructionError::parse("assignWithSeed"))?;
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("assignWithSeed"))?;
            info.insert("account".into(), json!(acc(0)));
            info.insert("base".into(), json!(base.to_string()));
            info.insert("seed".into(), json!(seed));
            info.insert("owner".into(), json!(owner.to_string()));
            "assignWithSeed"
        }
        TRANSFER_WITH_SEED => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("transferWithSeed"))?;
            let seed = reader.read_seed_string().ok_or_else(|| ConstructionError::parse("transferWithSeed"))?;
            let owner = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("transferWithSeed"))?;
            info.insert("source".into(), json!(acc(0)));
            info.insert("sourceBase".into(), json!(acc(1)));
            info.insert("destination".into(), json!(acc(2)));
            info.insert("lamports".into(), json!(lamports));
            info.insert("sourceSeed".into(), json!(seed));
            info.insert("sourceOwner".into(), json!(owner.to_string()));
            "transferWithSeed"
        }
        other => return Err(ConstructionError::parse(format!("unknown system discriminant {other}"))),
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
    fn decode_transfer_round_trips_lamports() {
        let ix = transfer(pk(1), pk(2), 1_000_000_000);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "transfer");
        assert_eq!(decoded.info["source"], json!(pk(1).to_string()));
        assert_eq!(decoded.info["destination"], json!(pk(2).to_string()));
        assert_eq!(decoded.info["lamports"], json!(1_000_000_000u64));
    }

    #[test]
    fn transfer_wire_layout_matches_spec_fixture() {
        // §8 E2E scenario 1: discriminant 2, lamports 1_000_000_000 LE.
        let ix = transfer(pk(1), pk(2), 1_000_000_000);
        assert_eq!(&ix.data[0..4], &2u32.to_le_bytes());
        assert_eq!(&ix.data[4..12], &1_000_000_000u64.to_le_bytes());
    }

    #[test]
    fn decode_create_account_round_trips() {
        let ix = create_account(pk(1), pk(2), pk(3), 500, 0);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "createAccount");
        assert_eq!(decoded.info["owner"], json!(pk(3).to_string()));
        assert_eq!(decoded.info["lamports"], json!(500u64));
    }

    #[test]
    fn decode_accepts_with_seed_variants_it_does_not_build() {
        let mut data = CREATE_ACCOUNT_WITH_SEED.to_le_bytes().to_vec();
        data.extend_from_slice(&pk(9).to_bytes());
        push_seed_string(&mut data, "seed");
        data.extend_from_slice(&10u64.to_le_bytes());
        data.extend_from_slice(&0u64.to_le_bytes());
        data.extend_from_slice(&pk(4).to_bytes());
        let decoded = decode(&data, &[pk(1), pk(2)]).unwrap();
        assert_eq!(decoded.instruction_type, "createAccountWithSeed");
    }

    #[test]
    fn decode_rejects_unknown_discriminant() {
        let data = 255u32.to_le_bytes().to_vec();
        assert!(decode(&data, &[]).is_err());
    }
}
