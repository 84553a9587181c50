//! Associated Token Account (ATA) program instruction encode/decode, plus
//! the program-derived-address (PDA) derivation every SPL token leg needs.

use serde_json::{Map, json};
use solana_pubkey::Pubkey;

use super::DecodedInstruction;
use crate::construction::error::ConstructionError;
use crate::construction::types::{
    AccountMeta, ASSOCIATED_TOKEN_PROGRAM_ID, Instruction, SYSTEM_PROGRAM_ID, SYSVAR_RENT_ID, TOKEN_PROGRAM_ID,
};

const CREATE_IDEMPOTENT: u8 = 1;
const RECOVER_NESTED: u8 = 2;

/// Derives the associated token account address for `(owner, mint)`.
///
/// This is a deterministic PDA off the Associated Token Account program,
/// seeded by `[owner, token_program, mint]` — the same derivation every
/// Solana client uses to locate a wallet's token account for a given mint.
#[must_use]
pub fn derive(owner: &Pubkey, mint: &Pubkey) -> Pubkey {
    let (address, _bump) = Pubkey::find_program_address(
        &[owner.as_ref(), TOKEN_PROGRAM_ID.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    );
    address
}

/// `AssociatedTokenAccount::Create(funder, owner, mint)`: creates the
/// account at [`derive`]'s address. No instruction discriminant byte.
#[must_use]
pub fn create(funder: Pubkey, owner: Pubkey, mint: Pubkey) -> Instruction {
    build(funder, owner, mint, Vec::new())
}

/// `AssociatedTokenAccount::CreateIdempotent(funder, owner, mint)`: as
/// [`create`], but succeeds as a no-op if the account already exists.
#[must_use]
pub fn create_idempotent(funder: Pubkey, owner: Pubkey, mint: Pubkey) -> Instruction {
    build(funder, owner, mint, vec![CREATE_IDEMPOTENT])
}

fn build(funder: Pubkey, owner: Pubkey, mint: Pubkey, data: Vec<u8>) -> Instruction {
    let associated_account = derive(&owner, &mint);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::signer_writable(funder),
            AccountMeta::writable(associated_account),
            AccountMeta::readonly(owner),
            AccountMeta::readonly(mint),
            AccountMeta::readonly(SYSTEM_PROGRAM_ID),
            AccountMeta::readonly(TOKEN_PROGRAM_ID),
            AccountMeta::readonly(SYSVAR_RENT_ID),
        ],
        data,
    }
}

/// Decodes an ATA-program instruction payload given its resolved account keys.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] for an
/// unrecognized discriminant.
pub fn decode(data: &[u8], accounts: &[Pubkey]) -> Result<DecodedInstruction, ConstructionError> {
    let acc = |i: usize| accounts.get(i).copied().map(|p| p.to_string());
    let mut info = Map::new();

    let instruction_type = match data.first().copied() {
        None => {
            info.insert("funder".into(), json!(acc(0)));
            info.insert("associatedAccount".into(), json!(acc(1)));
            info.insert("owner".into(), json!(acc(2)));
            info.insert("mint".into(), json!(acc(3)));
            "create"
        }
        Some(CREATE_IDEMPOTENT) => {
            info.insert("funder".into(), json!(acc(0)));
            info.insert("associatedAccount".into(), json!(acc(1)));
            info.insert("owner".into(), json!(acc(2)));
            info.insert("mint".into(), json!(acc(3)));
            "createIdempotent"
        }
        Some(RECOVER_NESTED) => {
            info.insert("nestedAccount".into(), json!(acc(0)));
            info.insert("nestedMint".into(), json!(acc(1)));
            info.insert("destination".into(), json!(acc(2)));
            info.insert("ownerAccount".into(), json!(acc(3)));
            info.insert("ownerMint".into(), json!(acc(4)));
            info.insert("wallet".into(), json!(acc(5)));
            "recoverNested"
        }
        Some(other) => return Err(ConstructionError::parse(format!("unknown associated-token-account discriminant {other}"))),
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
    fn derive_is_deterministic_per_owner_mint_pair() {
        let a = derive(&pk(1), &pk(2));
        let b = derive(&pk(1), &pk(2));
        let c = derive(&pk(1), &pk(3));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn decode_create_idempotent_round_trips() {
        let ix = create_idempotent(pk(1), pk(2), pk(3));
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "createIdempotent");
        assert_eq!(decoded.info["owner"], json!(pk(2).to_string()));
        assert_eq!(decoded.info["mint"], json!(pk(3).to_string()));
    }

    #[test]
    fn decode_plain_create_has_no_discriminant_byte() {
        let ix = create(pk(1), pk(2), pk(3));
        assert!(ix.data.is_empty());
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "create");
    }
}
