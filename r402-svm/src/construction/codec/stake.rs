//! Stake program instruction encode/decode.
//!
//! Discriminant is a little-endian `u32` matching `StakeInstruction`
//! ordinals. This crate builds and decodes the subset the original
//! implementation's `StakeOperationMetadata` supported: `Initialize`,
//! `Authorize`, `DelegateStake`, `Split`, `Withdraw`, `Deactivate`, `Merge`.

use serde_json::{Map, json};
use solana_pubkey::{Pubkey, pubkey};

use super::{DecodedInstruction, Reader};
use crate::construction::error::ConstructionError;
use crate::construction::types::{AccountMeta, Instruction, STAKE_PROGRAM_ID, SYSVAR_RENT_ID};

const INITIALIZE: u32 = 0;
const AUTHORIZE: u32 = 1;
const DELEGATE_STAKE: u32 = 2;
const SPLIT: u32 = 3;
const WITHDRAW: u32 = 4;
const DEACTIVATE: u32 = 5;
const MERGE: u32 = 7;

const SYSVAR_CLOCK_ID: Pubkey = pubkey!("SysvarC1ock11111111111111111111111111111111");
const SYSVAR_STAKE_HISTORY_ID: Pubkey = pubkey!("SysvarStakeHistory1111111111111111111111111");
const STAKE_CONFIG_ID: Pubkey = pubkey!("StakeConfig11111111111111111111111111111111");

fn header(discriminant: u32) -> Vec<u8> {
    discriminant.to_le_bytes().to_vec()
}

/// `Stake::Initialize(stake, staker, withdrawer, lockup)`.
///
/// `lockup_unix_timestamp` is the only lockup field the operation
/// vocabulary exposes (`metadata.lockupUnixTimestamp`); epoch and custodian
/// are always zeroed.
#[must_use]
pub fn initialize(stake: Pubkey, staker: Pubkey, withdrawer: Pubkey, lockup_unix_timestamp: i64) -> Instruction {
    let mut data = header(INITIALIZE);
    data.extend_from_slice(&staker.to_bytes());
    data.extend_from_slice(&withdrawer.to_bytes());
    data.extend_from_slice(&lockup_unix_timestamp.to_le_bytes());
    data.extend_from_slice(&0u64.to_le_bytes()); // lockup.epoch
    data.extend_from_slice(&Pubkey::default().to_bytes()); // lockup.custodian
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![AccountMeta::writable(stake), AccountMeta::readonly(SYSVAR_RENT_ID)],
        data,
    }
}

/// `Stake::Authorize(stake, authority, new_authority, stake_authorize)`.
///
/// `stake_authorize` is `0` for staker, `1` for withdrawer.
#[must_use]
pub fn authorize(stake: Pubkey, authority: Pubkey, new_authority: Pubkey, stake_authorize: u32) -> Instruction {
    let mut data = header(AUTHORIZE);
    data.extend_from_slice(&new_authority.to_bytes());
    data.extend_from_slice(&stake_authorize.to_le_bytes());
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(stake),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::signer_readonly(authority),
        ],
        data,
    }
}

/// `Stake::DelegateStake(stake, vote_account, staker)`.
#[must_use]
pub fn delegate_stake(stake: Pubkey, vote_account: Pubkey, staker: Pubkey) -> Instruction {
    let data = header(DELEGATE_STAKE);
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(stake),
            AccountMeta::readonly(vote_account),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_STAKE_HISTORY_ID),
            AccountMeta::readonly(STAKE_CONFIG_ID),
            AccountMeta::signer_readonly(staker),
        ],
        data,
    }
}

/// `Stake::Split(stake, new_stake, staker, lamports)`.
#[must_use]
pub fn split(stake: Pubkey, new_stake: Pubkey, staker: Pubkey, lamports: u64) -> Instruction {
    let mut data = header(SPLIT);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(stake),
            AccountMeta::writable(new_stake),
            AccountMeta::signer_readonly(staker),
        ],
        data,
    }
}

/// `Stake::Withdraw(stake, destination, withdrawer, lamports)`. No lockup custodian.
#[must_use]
pub fn withdraw(stake: Pubkey, destination: Pubkey, withdrawer: Pubkey, lamports: u64) -> Instruction {
    let mut data = header(WITHDRAW);
    data.extend_from_slice(&lamports.to_le_bytes());
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(stake),
            AccountMeta::writable(destination),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_STAKE_HISTORY_ID),
            AccountMeta::signer_readonly(withdrawer),
        ],
        data,
    }
}

/// `Stake::Deactivate(stake, staker)`.
#[must_use]
pub fn deactivate(stake: Pubkey, staker: Pubkey) -> Instruction {
    let data = header(DEACTIVATE);
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(stake),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::signer_readonly(staker),
        ],
        data,
    }
}

/// `Stake::Merge(destination, source, staker)`.
#[must_use]
pub fn merge(destination: Pubkey, source: Pubkey, staker: Pubkey) -> Instruction {
    let data = header(MERGE);
    Instruction {
        program_id: STAKE_PROGRAM_ID,
        accounts: vec![
            AccountMeta::writable(destination),
            AccountMeta::writable(source),
            AccountMeta::readonly(SYSVAR_CLOCK_ID),
            AccountMeta::readonly(SYSVAR_STAKE_HISTORY_ID),
            AccountMeta::signer_readonly(staker),
        ],
        data,
    }
}

/// Decodes a Stake-program instruction payload given its resolved account keys.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if the
/// data is truncated for its discriminant, or the discriminant is unrecognized
/// or not in the buildable subset.
pub fn decode(data: &[u8], accounts: &[Pubkey]) -> Result<DecodedInstruction, ConstructionError> {
    let mut reader = Reader::new(data);
    let discriminant = reader
        .read_u32()
        .ok_or_else(|| ConstructionError::parse("truncated stake instruction discriminant"))?;
    let acc = |i: usize| accounts.get(i).copied().map(|p| p.to_string());
    let mut info = Map::new();

    let instruction_type = match discriminant {
        INITIALIZE => {
            let staker = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("initializeStake"))?;
            let withdrawer = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("initializeStake"))?;
            let lockup_unix_timestamp = reader.read_i64().ok_or_else(|| ConstructionError::parse("initializeStake"))?;
            let lockup_epoch = reader.read_u64().ok_or_else(|| ConstructionError::parse("initializeStake"))?;
            let lockup_custodian = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("initializeStake"))?;
            info.insert("stake".into(), json!(acc(0)));
            info.insert("staker".into(), json!(staker.to_string()));
            info.insert("withdrawer".into(), json!(withdrawer.to_string()));
            info.insert("lockupUnixTimestamp".into(), json!(lockup_unix_timestamp));
            info.insert("lockupEpoch".into(), json!(lockup_epoch));
            info.insert("lockupCustodian".into(), json!(lockup_custodian.to_string()));
            "initializeStake"
        }
        AUTHORIZE => {
            let new_authority = reader.read_pubkey().ok_or_else(|| ConstructionError::parse("authorizeStake"))?;
            let stake_authorization_type = reader.read_u32().ok_or_else(|| ConstructionError::parse("authorizeStake"))?;
            info.insert("stake".into(), json!(acc(0)));
            info.insert("authority".into(), json!(acc(2)));
            info.insert("newAuthority".into(), json!(new_authority.to_string()));
            info.insert("stakeAuthorizationType".into(), json!(stake_authorization_type));
            "authorizeStake"
        }
        DELEGATE_STAKE => {
            info.insert("stake".into(), json!(acc(0)));
            info.insert("voteAccount".into(), json!(acc(1)));
            info.insert("staker".into(), json!(acc(5)));
            "delegateStake"
        }
        SPLIT => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("splitStake"))?;
            info.insert("stake".into(), json!(acc(0)));
            info.insert("splitDestination".into(), json!(acc(1)));
            info.insert("staker".into(), json!(acc(2)));
            info.insert("lamports".into(), json!(lamports));
            "splitStake"
        }
        WITHDRAW => {
            let lamports = reader.read_u64().ok_or_else(|| ConstructionError::parse("withdrawStake"))?;
            info.insert("stake".into(), json!(acc(0)));
            info.insert("withdrawDestination".into(), json!(acc(1)));
            info.insert("withdrawer".into(), json!(acc(4)));
            info.insert("lamports".into(), json!(lamports));
            "withdrawStake"
        }
        DEACTIVATE => {
            info.insert("stake".into(), json!(acc(0)));
            info.insert("staker".into(), json!(acc(2)));
            "deactivateStake"
        }
        MERGE => {
            info.insert("mergeDestination".into(), json!(acc(0)));
            info.insert("stake".into(), json!(acc(1)));
            info.insert("staker".into(), json!(acc(4)));
            "mergeStake"
        }
        other => return Err(ConstructionError::parse(format!("unknown stake discriminant {other}"))),
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
    fn decode_initialize_round_trips_fields() {
        let ix = initialize(pk(1), pk(2), pk(3), 42);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "initializeStake");
        assert_eq!(decoded.info["staker"], json!(pk(2).to_string()));
        assert_eq!(decoded.info["withdrawer"], json!(pk(3).to_string()));
        assert_eq!(decoded.info["lockupUnixTimestamp"], json!(42));
    }

    #[test]
    fn decode_withdraw_round_trips_lamports() {
        let ix = withdraw(pk(1), pk(2), pk(3), 2_000_000_000);
        let accounts: Vec<Pubkey> = ix.accounts.iter().map(|m| m.pubkey).collect();
        let decoded = decode(&ix.data, &accounts).unwrap();
        assert_eq!(decoded.instruction_type, "withdrawStake");
        assert_eq!(decoded.info["lamports"], json!(2_000_000_000u64));
        assert_eq!(decoded.info["withdrawer"], json!(pk(3).to_string()));
    }

    #[test]
    fn decode_rejects_unknown_discriminant() {
        let data = 99u32.to_le_bytes().to_vec();
        assert!(decode(&data, &[]).is_err());
    }

    #[test]
    fn decode_rejects_truncated_payload() {
        assert!(decode(&[1, 0], &[]).is_err());
    }
}
