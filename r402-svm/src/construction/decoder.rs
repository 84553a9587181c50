//! Reverse decoder (C6): decompiles a wire [`Transaction`] back into the
//! operation vocabulary (§4.5).
//!
//! Decoding is per-instruction and stateless: each instruction is decoded by
//! its program's codec, the wire instruction name is mapped onto its
//! `Program__Operation` vocabulary entry (if any), and balance-changing
//! families are expanded into a debit/credit operation pair. Composite
//! builder expansions (`CreateNonceAccount`, `CreateStakeAccount`,
//! `TransferNew`, `TransferWithSystem`, SPL `CreateAccount`) do not have a
//! matching composite decode: each wire instruction that made them up
//! decodes on its own, so round-tripping one of these families through
//! `payloads` then `parse` yields a different (but equivalent) operation
//! list rather than the original — the same asymmetry the vocabulary
//! already accepts for `TransferWithSystem` canonicalizing to
//! `TransferChecked`.

use serde_json::{Map, Value};
use solana_pubkey::Pubkey;

use crate::construction::codec::{associated_token_account as ata, compute_budget, stake, system, token};
use crate::construction::error::ConstructionError;
use crate::construction::types::{
    AccountIdentifier, Amount, Currency, Operation, OperationIdentifier, Transaction, ASSOCIATED_TOKEN_PROGRAM_ID,
    COMPUTE_BUDGET_PROGRAM_ID, STAKE_PROGRAM_ID, SYSTEM_PROGRAM_ID, TOKEN_PROGRAM_ID, TYPE_SEPARATOR,
};

/// Decodes `tx` into its operation list and signer identities (§4.5).
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if an
/// instruction references an account index outside the message's account
/// table.
pub fn decode_transaction(tx: &Transaction) -> Result<(Vec<Operation>, Vec<AccountIdentifier>), ConstructionError> {
    let account_keys = &tx.message.account_keys;
    let mut operations = Vec::new();
    let mut next_index: i64 = 0;

    for ix in &tx.message.instructions {
        let program_id = *account_keys
            .get(ix.program_id_index as usize)
            .ok_or_else(|| ConstructionError::parse("instruction references an out-of-range program id index"))?;
        let mut ix_accounts = Vec::with_capacity(ix.account_indexes.len());
        for &idx in &ix.account_indexes {
            let key = account_keys.get(idx as usize).ok_or_else(|| ConstructionError::parse("instruction references an out-of-range account index"))?;
            ix_accounts.push(*key);
        }

        let wire = decode_wire_instruction(program_id, &ix.data, &ix_accounts);
        append_operations(&mut operations, &mut next_index, wire);
    }

    let account_identifier_signers = tx.message.signer_accounts().iter().map(|pk| AccountIdentifier::new(pk.to_string())).collect();

    Ok((operations, account_identifier_signers))
}

/// One instruction's program-codec decode result, lifted to the level this
/// module needs: a program label, an optional instruction name (absent if
/// the program id is unrecognized or the discriminant itself didn't parse),
/// and the field map.
struct WireDecoded {
    program_label: &'static str,
    instruction_type: Option<&'static str>,
    info: Map<String, Value>,
}

fn decode_wire_instruction(program_id: Pubkey, data: &[u8], accounts: &[Pubkey]) -> WireDecoded {
    let (program_label, decoded) = if program_id == SYSTEM_PROGRAM_ID {
        ("System", system::decode(data, accounts))
    } else if program_id == TOKEN_PROGRAM_ID {
        ("SplToken", token::decode(data, accounts))
    } else if program_id == ASSOCIATED_TOKEN_PROGRAM_ID {
        ("SplAssociatedTokenAccount", ata::decode(data, accounts))
    } else if program_id == STAKE_PROGRAM_ID {
        ("Stake", stake::decode(data, accounts))
    } else if program_id == COMPUTE_BUDGET_PROGRAM_ID {
        ("ComputeBudget", compute_budget::decode(data))
    } else {
        let mut info = Map::new();
        info.insert("programId".into(), Value::String(program_id.to_string()));
        info.insert("data".into(), Value::String(hex::encode(data)));
        return WireDecoded { program_label: "Unknown", instruction_type: None, info };
    };

    match decoded {
        Ok(d) => WireDecoded { program_label, instruction_type: Some(d.instruction_type), info: d.info },
        Err(_) => {
            let mut info = Map::new();
            info.insert("data".into(), Value::String(hex::encode(data)));
            WireDecoded { program_label, instruction_type: None, info }
        }
    }
}

/// Maps a wire instruction name onto its vocabulary suffix, per program.
/// `None` means the instruction has no counterpart in the closed operation
/// vocabulary (§6) — usually because it's one leg of a composite expansion
/// this crate only ever builds, never decodes, as a single family.
fn vocabulary_suffix(program_label: &str, instruction_type: &str) -> Option<&'static str> {
    match (program_label, instruction_type) {
        ("System", "createAccount") => Some("CreateAccount"),
        ("System", "assign") => Some("Assign"),
        ("System", "transfer") => Some("Transfer"),
        ("System", "advanceNonce") => Some("AdvanceNonce"),
        ("System", "withdrawFromNonce") => Some("WithdrawFromNonce"),
        ("System", "authorizeNonce") => Some("AuthorizeNonce"),
        ("System", "allocate") => Some("Allocate"),
        ("SplToken", "transfer") => Some("Transfer"),
        ("SplToken", "transferChecked") => Some("TransferChecked"),
        ("SplToken", "initializeMint") => Some("InitializeMint"),
        ("SplToken", "initializeAccount") => Some("InitializeAccount"),
        ("SplToken", "approve") => Some("Approve"),
        ("SplToken", "revoke") => Some("Revoke"),
        ("SplToken", "mintTo") => Some("MintTo"),
        ("SplToken", "burn") => Some("Burn"),
        ("SplToken", "closeAccount") => Some("CloseAccount"),
        ("SplToken", "freezeAccount") => Some("FreezeAccount"),
        // `create` and `createIdempotent` both canonicalize to the single
        // `Create` operation the vocabulary names (O4-style canonicalization).
        ("SplAssociatedTokenAccount", "create" | "createIdempotent") => Some("Create"),
        ("Stake", "delegateStake") => Some("DelegateStake"),
        ("Stake", "deactivateStake") => Some("DeactivateStake"),
        ("Stake", "withdrawStake") => Some("WithdrawStake"),
        ("Stake", "splitStake") => Some("Split"),
        ("Stake", "mergeStake") => Some("Merge"),
        ("Stake", "authorizeStake") => Some("Authorize"),
        _ => None,
    }
}

/// Field-name preference lists the single-operation fallback (§4.5 step 3)
/// and the balance-changing pair (step 2) both draw from, since different
/// programs name the moving account differently.
const SOURCE_FIELDS: &[&str] = &["source", "owner", "account", "stake", "nonceAccount"];
const DESTINATION_FIELDS: &[&str] = &["destination", "newAccount", "withdrawDestination", "splitDestination", "mergeDestination"];

/// The `Program__Operation` families this decoder expands into a
/// balance-changing sender/receiver pair (§4.5 step 2), rather than emitting
/// as a single metadata-only operation (step 3).
///
/// This is a superset of `matcher::BALANCE_CHANGING_FAMILIES`: the matcher
/// only needs to know which *construction-request* operation types always
/// carry an amount and must be paired (I2), while a decoded transaction can
/// also contain `System__CreateAccount` (an initial lamports transfer into
/// the new account) and `System__WithdrawFromNonce` (a lamports transfer out
/// of the nonce account), neither of which a caller ever submits as a
/// balance-changing construction-request operation.
const DECODED_BALANCE_CHANGING_FAMILIES: &[&str] = &[
    "System__Transfer",
    "System__CreateAccount",
    "System__WithdrawFromNonce",
    "SplToken__Transfer",
    "SplToken__TransferChecked",
    "SplToken__TransferNew",
    "SplToken__TransferWithSystem",
    "Stake__Split",
    "Stake__WithdrawStake",
];

fn is_decoded_balance_changing(op_type: &str) -> bool {
    DECODED_BALANCE_CHANGING_FAMILIES.contains(&op_type)
}

fn resolve_field(info: &Map<String, Value>, candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|key| info.get(*key).and_then(Value::as_str).map(str::to_string))
}

fn resolve_amount(info: &Map<String, Value>) -> Option<u64> {
    info.get("amount").or_else(|| info.get("lamports")).and_then(Value::as_u64)
}

fn resolve_currency(info: &Map<String, Value>) -> Currency {
    info.get("mint").and_then(Value::as_str).map_or_else(Currency::native, |mint| {
        let decimals = info.get("decimals").and_then(Value::as_i64).unwrap_or(9) as i32;
        Currency::spl_token(mint, decimals)
    })
}

/// Appends the operation(s) produced by one decoded instruction, assigning
/// sequential identifiers from `next_index`.
fn append_operations(operations: &mut Vec<Operation>, next_index: &mut i64, wire: WireDecoded) {
    let Some(instruction_type) = wire.instruction_type else {
        operations.push(unknown_operation(next_index, wire.program_label, None, wire.info));
        return;
    };

    let Some(suffix) = vocabulary_suffix(wire.program_label, instruction_type) else {
        operations.push(unknown_operation(next_index, wire.program_label, Some(instruction_type), wire.info));
        return;
    };

    let op_type = format!("{}{TYPE_SEPARATOR}{suffix}", wire.program_label);

    if is_decoded_balance_changing(&op_type) {
        let source = resolve_field(&wire.info, SOURCE_FIELDS);
        let destination = resolve_field(&wire.info, DESTINATION_FIELDS);
        let magnitude = resolve_amount(&wire.info).unwrap_or(0);
        let currency = resolve_currency(&wire.info);

        let mut shared_metadata = wire.info.clone();
        for key in ["amount", "lamports", "source", "destination"] {
            shared_metadata.remove(key);
        }

        operations.push(Operation {
            operation_identifier: OperationIdentifier { index: *next_index },
            operation_type: op_type.clone(),
            account: source.map(AccountIdentifier::new),
            amount: Some(Amount::new(magnitude, true, currency.clone())),
            metadata: shared_metadata.clone(),
        });
        *next_index += 1;

        operations.push(Operation {
            operation_identifier: OperationIdentifier { index: *next_index },
            operation_type: op_type,
            account: destination.map(AccountIdentifier::new),
            amount: Some(Amount::new(magnitude, false, currency)),
            metadata: shared_metadata,
        });
        *next_index += 1;
        return;
    }

    let account = resolve_field(&wire.info, SOURCE_FIELDS);
    operations.push(Operation {
        operation_identifier: OperationIdentifier { index: *next_index },
        operation_type: op_type,
        account: account.map(AccountIdentifier::new),
        amount: None,
        metadata: wire.info,
    });
    *next_index += 1;
}

fn unknown_operation(next_index: &mut i64, program_label: &str, instruction_type: Option<&str>, mut info: Map<String, Value>) -> Operation {
    info.insert("program".into(), Value::String(program_label.to_string()));
    info.insert("instructionType".into(), instruction_type.map_or(Value::Null, |t| Value::String(t.to_string())));
    let op = Operation {
        operation_identifier: OperationIdentifier { index: *next_index },
        operation_type: "Unknown".to_string(),
        account: None,
        amount: None,
        metadata: info,
    };
    *next_index += 1;
    op
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::assembler;
    use crate::construction::types::AccountMeta;

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn tx_for(instructions: &[crate::construction::types::Instruction]) -> Transaction {
        let message = assembler::assemble(instructions, None, [1u8; 32]).unwrap();
        let (tx, _payloads) = assembler::build_payloads(&message);
        tx
    }

    #[test]
    fn decodes_a_plain_transfer_into_a_balance_changing_pair() {
        let ix = system::transfer(pk(1), pk(2), 1_000_000_000);
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, signers) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_type, "System__Transfer");
        assert_eq!(ops[0].account.as_ref().unwrap().address, pk(1).to_string());
        assert_eq!(ops[0].amount.as_ref().unwrap().value, "-1000000000");
        assert_eq!(ops[1].account.as_ref().unwrap().address, pk(2).to_string());
        assert_eq!(ops[1].amount.as_ref().unwrap().value, "1000000000");
        assert!(!ops[0].metadata.contains_key("lamports"));
        assert_eq!(signers, vec![AccountIdentifier::new(pk(1).to_string())]);
    }

    #[test]
    fn decodes_advance_nonce_as_a_singleton() {
        let ix = system::advance_nonce_account(pk(1), pk(2));
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, "System__AdvanceNonce");
        assert!(ops[0].amount.is_none());
    }

    #[test]
    fn unrecognized_program_decodes_as_unknown() {
        let ix = crate::construction::types::Instruction {
            program_id: pk(250),
            accounts: vec![AccountMeta::readonly(pk(1))],
            data: vec![9, 9, 9],
        };
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, "Unknown");
        assert_eq!(ops[0].metadata["program"], Value::String("Unknown".into()));
    }

    #[test]
    fn compute_budget_instructions_are_never_named_operations() {
        let ix = compute_budget::set_compute_unit_price(1_000);
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, "Unknown");
        assert_eq!(ops[0].metadata["program"], Value::String("ComputeBudget".into()));
    }

    #[test]
    fn transfer_checked_decodes_with_spl_currency() {
        let ix = token::transfer_checked(pk(1), pk(9), pk(2), pk(3), 500, 6);
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_type, "SplToken__TransferChecked");
        assert_eq!(ops[0].amount.as_ref().unwrap().currency.symbol, pk(9).to_string());
        assert_eq!(ops[0].amount.as_ref().unwrap().currency.decimals, 6);
    }

    #[test]
    fn decodes_create_account_as_a_balance_changing_pair() {
        let ix = system::create_account(pk(1), pk(2), pk(3), 2_039_280, 0);
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_type, "System__CreateAccount");
        assert_eq!(ops[0].account.as_ref().unwrap().address, pk(1).to_string());
        assert_eq!(ops[0].amount.as_ref().unwrap().value, "-2039280");
        assert_eq!(ops[1].account.as_ref().unwrap().address, pk(2).to_string());
        assert_eq!(ops[1].amount.as_ref().unwrap().value, "2039280");
    }

    #[test]
    fn decodes_withdraw_from_nonce_as_a_balance_changing_pair() {
        let ix = system::withdraw_nonce_account(pk(1), pk(2), pk(3), 500_000);
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operation_type, "System__WithdrawFromNonce");
        assert_eq!(ops[0].account.as_ref().unwrap().address, pk(1).to_string());
        assert_eq!(ops[0].amount.as_ref().unwrap().value, "-500000");
        assert_eq!(ops[1].account.as_ref().unwrap().address, pk(3).to_string());
        assert_eq!(ops[1].amount.as_ref().unwrap().value, "500000");
    }

    #[test]
    fn create_idempotent_canonicalizes_to_the_single_ata_create_op() {
        let ix = ata::create_idempotent(pk(1), pk(2), pk(3));
        let tx = tx_for(std::slice::from_ref(&ix));
        let (ops, _) = decode_transaction(&tx).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].operation_type, "SplAssociatedTokenAccount__Create");
    }
}
