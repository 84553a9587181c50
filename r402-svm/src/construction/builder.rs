//! Instruction builder (C2): one pure expansion function per
//! `Program__Operation` family (§4.2).
//!
//! Dispatch is a two-level match: [`Family::from_op_type`] picks the
//! program (compile-time exhaustive per the Design Notes' tagged-variant
//! recommendation), then a per-family function expands the operation's
//! canonicalized fields into wire instructions. Families the vocabulary lists as decode-only (§6) — `InitializeMint`,
//! `Approve`, `Revoke`, `MintTo`, `Burn`, `CloseAccount`, `FreezeAccount`,
//! `CreateToken` — have no builder: a request naming one fails with
//! [`ConstructionError::UnclearIntent`], since §4.2 only enumerates
//! expansion rules for the families below.

use std::collections::HashMap;

use solana_pubkey::Pubkey;

use crate::construction::codec::associated_token_account as ata;
use crate::construction::codec::token::TOKEN_ACCOUNT_SIZE;
use crate::construction::codec::{compute_budget, stake, system, token};
use crate::construction::error::ConstructionError;
use crate::construction::intent::{CanonicalFields, canonical_fields, parse_pubkey};
use crate::construction::types::{Instruction, MatchedOp, PriorityFee, SplAccounts, STAKE_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID};

/// On-wire size of a `Stake` program account (`StakeStateV2`).
const STAKE_ACCOUNT_SIZE: u64 = 200;

/// Inputs the builder needs beyond the operation itself: the request's
/// priority fee, and the ATA resolutions `metadata` computed for
/// `SplToken__TransferWithSystem` legs.
#[derive(Debug, Clone, Copy)]
pub struct BuilderContext<'a> {
    /// Compute-unit price to prepend to System/Stake expansions (P1).
    pub priority_fee: Option<PriorityFee>,
    /// Resolved (or empty) token accounts, keyed by sender operation index.
    pub spl_token_acc_map: &'a HashMap<String, SplAccounts>,
}

/// The program a `Program__Operation` type string dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    System,
    SplToken,
    AssociatedToken,
    Stake,
}

impl Family {
    fn from_op_type(op_type: &str) -> Option<Self> {
        match op_type.split_once(crate::construction::types::TYPE_SEPARATOR)?.0 {
            "System" => Some(Self::System),
            "SplToken" => Some(Self::SplToken),
            "SplAssociatedTokenAccount" => Some(Self::AssociatedToken),
            "Stake" => Some(Self::Stake),
            _ => None,
        }
    }

    /// Whether P1's priority-fee prefix applies to this family's expansion.
    fn takes_priority_fee(self) -> bool {
        matches!(self, Self::System | Self::Stake)
    }
}

/// Builds the wire instructions for one matched operation.
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if the operation's type is
/// outside the closed vocabulary, is decode-only (no builder rule in
/// §4.2), or its required fields fail to resolve.
pub fn build_instructions(matched: &MatchedOp, ctx: &BuilderContext<'_>) -> Result<Vec<Instruction>, ConstructionError> {
    let fields = canonical_fields(matched)?;
    let Some(family) = Family::from_op_type(&fields.op_type) else {
        return Err(ConstructionError::intent(format!("unknown operation type {:?}", fields.op_type)));
    };

    let suffix = fields.op_type.split_once(crate::construction::types::TYPE_SEPARATOR).map_or("", |(_, s)| s);
    let mut instructions = match family {
        Family::System => build_system(suffix, &fields)?,
        Family::SplToken => build_spl_token(suffix, &fields, ctx)?,
        Family::AssociatedToken => build_associated_token(suffix, &fields)?,
        Family::Stake => build_stake(suffix, &fields)?,
    };

    if family.takes_priority_fee() {
        if let Some(fee) = ctx.priority_fee {
            if fee.micro_lamports > 0 {
                instructions.insert(0, compute_budget::set_compute_unit_price(fee.micro_lamports));
            }
        }
    }

    Ok(instructions)
}

/// Extracts `WithdrawStake`'s caller-supplied fee payer override, if any
/// matched operation named one (§4.2, §4.4).
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if `metadata.feePayer` is
/// present but not a valid base58 public key.
pub fn fee_payer_override(matched: &[MatchedOp]) -> Result<Option<Pubkey>, ConstructionError> {
    for m in matched {
        let fields = canonical_fields(m)?;
        if fields.op_type == "Stake__WithdrawStake" {
            if let Some(pk) = fields.fee_payer()? {
                return Ok(Some(pk));
            }
        }
    }
    Ok(None)
}

fn build_system(suffix: &str, f: &CanonicalFields) -> Result<Vec<Instruction>, ConstructionError> {
    match suffix {
        "Transfer" => Ok(vec![system::transfer(f.source()?, f.destination()?, f.amount_u64()?)]),
        "CreateAccount" => {
            let owner = f.field_str("owner").map_or(Ok(SYSTEM_PROGRAM_ID), |s| parse_pubkey(&s))?;
            let new_account = f.destination().or_else(|_| f.field_str("newAccount").map_or_else(|| Err(ConstructionError::intent("missing newAccount")), |s| parse_pubkey(&s)))?;
            Ok(vec![system::create_account(f.source()?, new_account, owner, f.field_u64("lamports").unwrap_or_default(), f.space())])
        }
        "Assign" => Ok(vec![system::assign(f.source()?, parse_pubkey(&f.field_str("owner").ok_or_else(|| ConstructionError::intent("missing owner"))?)?)]),
        "CreateNonceAccount" => {
            let source = f.source()?;
            let nonce = f.field_str("destination").map_or_else(|| f.destination(), |s| parse_pubkey(&s))?;
            let authority = f.authority()?;
            let lamports = f.field_u64("lamports").ok_or_else(|| ConstructionError::intent("missing lamports"))?;
            Ok(vec![
                system::create_account(source, nonce, SYSTEM_PROGRAM_ID, lamports, NONCE_ACCOUNT_SIZE),
                system::initialize_nonce_account(nonce, authority),
            ])
        }
        "AdvanceNonce" => Ok(vec![system::advance_nonce_account(f.source()?, f.authority()?)]),
        "WithdrawFromNonce" => {
            let nonce = f.source()?;
            let destination = f.field_str("destination").map_or_else(|| f.destination(), |s| parse_pubkey(&s))?;
            let authority = f.authority()?;
            let lamports = f.amount_u64()?;
            Ok(vec![system::withdraw_nonce_account(nonce, authority, destination, lamports)])
        }
        "AuthorizeNonce" => {
            let nonce = f.source()?;
            let authority = f.authority()?;
            let new_authority = f
                .field_str("newAuthority")
                .or_else(|| f.field_str("new_authority"))
                .ok_or_else(|| ConstructionError::intent("missing newAuthority"))
                .and_then(|s| parse_pubkey(&s))?;
            Ok(vec![system::authorize_nonce_account(nonce, authority, new_authority)])
        }
        "Allocate" => Ok(vec![system::allocate(f.source()?, f.space())]),
        other => Err(ConstructionError::intent(format!("System__{other} has no builder rule"))),
    }
}

fn build_spl_token(suffix: &str, f: &CanonicalFields, ctx: &BuilderContext<'_>) -> Result<Vec<Instruction>, ConstructionError> {
    match suffix {
        "Transfer" => Ok(vec![token::transfer(f.source()?, f.destination()?, f.authority()?, f.amount_u64()?)]),
        "TransferChecked" => {
            Ok(vec![token::transfer_checked(f.source()?, f.mint()?, f.destination()?, f.authority()?, f.amount_u64()?, f.decimals())])
        }
        "TransferNew" => {
            let source = f.source()?;
            let wallet = f.wallet()?;
            let mint = f.mint()?;
            let authority = f.authority()?;
            let derived = ata::derive(&wallet, &mint);
            Ok(vec![
                ata::create(authority, wallet, mint),
                token::transfer_checked(source, mint, derived, authority, f.amount_u64()?, f.decimals()),
            ])
        }
        "TransferWithSystem" => build_spl_transfer_with_system(f, ctx),
        "CreateAccount" => {
            let mint = f.mint()?;
            let authority = f.authority()?;
            let new_account = f.destination()?;
            let lamports = f.field_u64("lamports").ok_or_else(|| ConstructionError::intent("missing lamports"))?;
            Ok(vec![
                system::create_account(f.source()?, new_account, TOKEN_PROGRAM_ID, lamports, TOKEN_ACCOUNT_SIZE),
                token::initialize_account(new_account, mint, authority),
            ])
        }
        other => Err(ConstructionError::intent(format!("SplToken__{other} has no builder rule"))),
    }
}

fn build_spl_transfer_with_system(f: &CanonicalFields, ctx: &BuilderContext<'_>) -> Result<Vec<Instruction>, ConstructionError> {
    let wallet_source = f.source()?;
    let wallet_destination = f.destination()?;
    let mint = f.mint()?;
    let authority = f.authority()?;
    let decimals = f.decimals();
    let amount = f.amount_u64()?;

    let resolved = ctx.spl_token_acc_map.get(&f.index.to_string());
    let mut instructions = Vec::new();

    let mut resolve = |wallet: Pubkey, resolved_address: Option<&str>| -> Result<Pubkey, ConstructionError> {
        match resolved_address.filter(|s| !s.is_empty()) {
            Some(addr) => parse_pubkey(addr),
            None => {
                instructions.push(ata::create_idempotent(authority, wallet, mint));
                Ok(ata::derive(&wallet, &mint))
            }
        }
    };

    let source_ata = resolve(wallet_source, resolved.map(|s| s.source.as_str()))?;
    let destination_ata = resolve(wallet_destination, resolved.map(|s| s.destination.as_str()))?;

    instructions.push(token::transfer_checked(source_ata, mint, destination_ata, authority, amount, decimals));
    Ok(instructions)
}

fn build_associated_token(suffix: &str, f: &CanonicalFields) -> Result<Vec<Instruction>, ConstructionError> {
    match suffix {
        "Create" => Ok(vec![ata::create(f.source()?, f.wallet()?, f.mint()?)]),
        other => Err(ConstructionError::intent(format!("SplAssociatedTokenAccount__{other} has no builder rule"))),
    }
}

fn build_stake(suffix: &str, f: &CanonicalFields) -> Result<Vec<Instruction>, ConstructionError> {
    match suffix {
        "CreateStakeAccount" => build_stake_create_account(f),
        "DelegateStake" => Ok(vec![build_stake_delegate(f)?]),
        "CreateStakeAndDelegate" => {
            let mut ixs = build_stake_create_account(f)?;
            ixs.push(build_stake_delegate(f)?);
            Ok(ixs)
        }
        "DeactivateStake" => {
            let stake_acc = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
            Ok(vec![stake::deactivate(stake_acc, f.authority()?)])
        }
        "WithdrawStake" => {
            let stake_acc = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
            let withdrawer = f
                .field_str("withdrawer")
                .map_or_else(|| f.authority(), |s| parse_pubkey(&s))?;
            Ok(vec![stake::withdraw(stake_acc, f.destination()?, withdrawer, f.amount_u64()?)])
        }
        "Split" => {
            let stake_acc = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
            let staker = f.field_str("staker").map_or_else(|| f.authority(), |s| parse_pubkey(&s))?;
            let split_destination = f
                .field_str("splitDestination")
                .map_or_else(|| f.destination(), |s| parse_pubkey(&s))?;
            Ok(vec![stake::split(stake_acc, split_destination, staker, f.amount_u64()?)])
        }
        "Merge" => {
            let destination = f.field_str("mergeDestination").map_or_else(|| f.destination(), |s| parse_pubkey(&s))?;
            let source = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
            let staker = f.field_str("staker").map_or_else(|| f.authority(), |s| parse_pubkey(&s))?;
            Ok(vec![stake::merge(destination, source, staker)])
        }
        "Authorize" => {
            let stake_acc = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
            let authority = f.authority()?;
            let new_authority = f
                .field_str("newAuthority")
                .ok_or_else(|| ConstructionError::intent("missing newAuthority"))
                .and_then(|s| parse_pubkey(&s))?;
            let authorization_type = f.field_u64("stakeAuthorizationType").unwrap_or(0) as u32;
            Ok(vec![stake::authorize(stake_acc, authority, new_authority, authorization_type)])
        }
        other => Err(ConstructionError::intent(format!("Stake__{other} has no builder rule"))),
    }
}

fn build_stake_create_account(f: &CanonicalFields) -> Result<Vec<Instruction>, ConstructionError> {
    let source = f.source()?;
    let stake_acc = f.field_str("stake").map_or_else(|| f.destination(), |s| parse_pubkey(&s))?;
    let staker = f.field_str("staker").map_or_else(|| f.authority(), |s| parse_pubkey(&s))?;
    let withdrawer = f.field_str("withdrawer").map_or_else(|| Ok(staker), |s| parse_pubkey(&s))?;
    let lamports = f.field_u64("lamports").or(f.amount).ok_or_else(|| ConstructionError::intent("missing lamports"))?;
    let lockup = f.field_i64("lockupUnixTimestamp").unwrap_or(0);
    Ok(vec![
        system::create_account(source, stake_acc, STAKE_PROGRAM_ID, lamports, STAKE_ACCOUNT_SIZE),
        stake::initialize(stake_acc, staker, withdrawer, lockup),
    ])
}

fn build_stake_delegate(f: &CanonicalFields) -> Result<Instruction, ConstructionError> {
    let stake_acc = f.field_str("stake").map_or_else(|| f.source(), |s| parse_pubkey(&s))?;
    let staker = f.field_str("staker").map_or_else(|| f.authority(), |s| parse_pubkey(&s))?;
    let vote = f
        .field_str("voteAccount")
        .or_else(|| f.field_str("vote"))
        .ok_or_else(|| ConstructionError::intent("missing voteAccount"))
        .and_then(|s| parse_pubkey(&s))?;
    Ok(stake::delegate_stake(stake_acc, vote, staker))
}

/// On-wire size of a `System::InitializeNonceAccount` target account.
const NONCE_ACCOUNT_SIZE: u64 = 80;

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value};

    use super::*;
    use crate::construction::types::{AccountIdentifier, Amount, COMPUTE_BUDGET_PROGRAM_ID, Currency, Operation, OperationIdentifier, TransferIntent};

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn transfer_intent(from: Pubkey, to: Pubkey, magnitude: u64) -> MatchedOp {
        let from_op = Operation {
            operation_identifier: OperationIdentifier { index: 0 },
            operation_type: "System__Transfer".to_string(),
            account: Some(AccountIdentifier::new(from.to_string())),
            amount: Some(Amount::new(magnitude, true, Currency::native())),
            metadata: Map::new(),
        };
        let to_op = Operation {
            operation_identifier: OperationIdentifier { index: 1 },
            operation_type: "System__Transfer".to_string(),
            account: Some(AccountIdentifier::new(to.to_string())),
            amount: Some(Amount::new(magnitude, false, Currency::native())),
            metadata: Map::new(),
        };
        MatchedOp::Intent(TransferIntent { from: from_op, to: to_op })
    }

    fn empty_ctx() -> HashMap<String, SplAccounts> {
        HashMap::new()
    }

    #[test]
    fn system_transfer_matches_spec_wire_fixture() {
        let matched = transfer_intent(pk(1), pk(2), 1_000_000_000);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: None, spl_token_acc_map: &map };
        let ixs = build_instructions(&matched, &ctx).unwrap();
        assert_eq!(ixs.len(), 1);
        assert_eq!(ixs[0].program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(&ixs[0].data[0..4], &2u32.to_le_bytes());
        assert_eq!(&ixs[0].data[4..12], &1_000_000_000u64.to_le_bytes());
    }

    #[test]
    fn priority_fee_prepends_exactly_one_instruction_p4() {
        let matched = transfer_intent(pk(1), pk(2), 1_000_000_000);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: Some(PriorityFee { micro_lamports: 1_000 }), spl_token_acc_map: &map };
        let ixs = build_instructions(&matched, &ctx).unwrap();
        assert_eq!(ixs.len(), 2);
        assert_eq!(ixs[0].program_id, COMPUTE_BUDGET_PROGRAM_ID);
        assert_eq!(ixs[1].program_id, SYSTEM_PROGRAM_ID);
    }

    #[test]
    fn zero_priority_fee_injects_nothing() {
        let matched = transfer_intent(pk(1), pk(2), 1_000_000_000);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: Some(PriorityFee { micro_lamports: 0 }), spl_token_acc_map: &map };
        let ixs = build_instructions(&matched, &ctx).unwrap();
        assert_eq!(ixs.len(), 1);
    }

    #[test]
    fn stake_create_and_delegate_emits_three_instructions() {
        let mut metadata = Map::new();
        metadata.insert("stake".into(), Value::String(pk(2).to_string()));
        metadata.insert("staker".into(), Value::String(pk(1).to_string()));
        metadata.insert("withdrawer".into(), Value::String(pk(1).to_string()));
        metadata.insert("voteAccount".into(), Value::String(pk(3).to_string()));
        metadata.insert("lamports".into(), Value::from(2_000_000_000u64));
        let op = Operation {
            operation_identifier: OperationIdentifier { index: 0 },
            operation_type: "Stake__CreateStakeAndDelegate".to_string(),
            account: Some(AccountIdentifier::new(pk(1).to_string())),
            amount: None,
            metadata,
        };
        let matched = MatchedOp::Singleton(op);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: None, spl_token_acc_map: &map };
        let ixs = build_instructions(&matched, &ctx).unwrap();
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, SYSTEM_PROGRAM_ID);
        assert_eq!(ixs[1].program_id, STAKE_PROGRAM_ID);
        assert_eq!(ixs[2].program_id, STAKE_PROGRAM_ID);
    }

    #[test]
    fn transfer_with_system_creates_idempotent_atas_for_unresolved_legs() {
        let matched = transfer_intent_spl(pk(1), pk(2), pk(9), 100, 6);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: None, spl_token_acc_map: &map };
        let ixs = build_instructions(&matched, &ctx).unwrap();
        assert_eq!(ixs.len(), 3);
        assert_eq!(ixs[0].program_id, crate::construction::types::ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ixs[1].program_id, crate::construction::types::ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ixs[2].program_id, TOKEN_PROGRAM_ID);
    }

    fn transfer_intent_spl(from: Pubkey, to: Pubkey, mint: Pubkey, magnitude: u64, decimals: i32) -> MatchedOp {
        let currency = Currency::spl_token(mint.to_string(), decimals);
        let from_op = Operation {
            operation_identifier: OperationIdentifier { index: 0 },
            operation_type: "SplToken__TransferWithSystem".to_string(),
            account: Some(AccountIdentifier::new(from.to_string())),
            amount: Some(Amount::new(magnitude, true, currency.clone())),
            metadata: Map::new(),
        };
        let to_op = Operation {
            operation_identifier: OperationIdentifier { index: 1 },
            operation_type: "SplToken__TransferWithSystem".to_string(),
            account: Some(AccountIdentifier::new(to.to_string())),
            amount: Some(Amount::new(magnitude, false, currency)),
            metadata: Map::new(),
        };
        MatchedOp::Intent(TransferIntent { from: from_op, to: to_op })
    }

    #[test]
    fn unbuildable_vocabulary_entries_are_rejected() {
        let op = Operation {
            operation_identifier: OperationIdentifier { index: 0 },
            operation_type: "SplToken__MintTo".to_string(),
            account: Some(AccountIdentifier::new(pk(1).to_string())),
            amount: None,
            metadata: Map::new(),
        };
        let matched = MatchedOp::Singleton(op);
        let map = empty_ctx();
        let ctx = BuilderContext { priority_fee: None, spl_token_acc_map: &map };
        assert!(build_instructions(&matched, &ctx).is_err());
    }
}
