//! Message assembler (C5): canonical account table, header counts,
//! instruction compaction, signing payloads, and signer-slot resolution.
//!
//! See §4.3. The account table is a deterministic function of instruction
//! emission order (§5), so identical requests produce byte-identical
//! messages modulo the blockhash (P5).

use solana_pubkey::Pubkey;

use crate::construction::codec::envelope;
use crate::construction::error::ConstructionError;
use crate::construction::types::{
    CompiledInstruction, Instruction, Message, MessageHeader, SignaturePair, SignatureType, SigningPayload, Transaction,
};

/// One entry in the account table being assembled, before partitioning.
#[derive(Clone, Copy)]
struct Entry {
    pubkey: Pubkey,
    is_signer: bool,
    is_writable: bool,
}

/// Builds the canonical [`Message`] for `instructions`.
///
/// `fee_payer`, if given, is forced to account-table position 0 as a
/// writable signer regardless of whether any instruction already
/// references it that way. If omitted, the first signer encountered while
/// walking `instructions` in order is used.
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if no fee payer is given
/// and no instruction has a signer, or if the account table would exceed
/// 256 entries (the wire format indexes accounts with a single byte).
pub fn assemble(instructions: &[Instruction], fee_payer: Option<Pubkey>, recent_blockhash: [u8; 32]) -> Result<Message, ConstructionError> {
    let fee_payer = match fee_payer {
        Some(pk) => pk,
        None => first_signer(instructions).ok_or_else(|| ConstructionError::intent("no signer found to act as fee payer"))?,
    };

    let mut table: Vec<Entry> = vec![Entry { pubkey: fee_payer, is_signer: true, is_writable: true }];
    for ix in instructions {
        for meta in &ix.accounts {
            upsert(&mut table, meta.pubkey, meta.is_signer, meta.is_writable);
        }
        upsert(&mut table, ix.program_id, false, false);
    }

    if table.len() > 256 {
        return Err(ConstructionError::intent("account table exceeds 256 entries"));
    }

    // Stable four-way partition: signer-writable, signer-readonly,
    // non-signer-writable, non-signer-readonly (I3). `sort_by_key` is
    // stable, so insertion order is preserved within each bucket and the
    // fee payer — inserted first — stays at index 0.
    table.sort_by_key(|e| partition_key(e));

    let num_required_signatures = table.iter().filter(|e| e.is_signer).count() as u8;
    let num_readonly_signed_accounts = table.iter().filter(|e| e.is_signer && !e.is_writable).count() as u8;
    let num_readonly_unsigned_accounts = table.iter().filter(|e| !e.is_signer && !e.is_writable).count() as u8;

    let account_keys: Vec<Pubkey> = table.iter().map(|e| e.pubkey).collect();
    let index_of = |pk: Pubkey| -> Result<u8, ConstructionError> {
        account_keys
            .iter()
            .position(|k| *k == pk)
            .map(|i| i as u8)
            .ok_or_else(|| ConstructionError::intent("account missing from compiled table"))
    };

    let mut compiled = Vec::with_capacity(instructions.len());
    for ix in instructions {
        let account_indexes = ix.accounts.iter().map(|m| index_of(m.pubkey)).collect::<Result<Vec<_>, _>>()?;
        compiled.push(CompiledInstruction {
            program_id_index: index_of(ix.program_id)?,
            account_indexes,
            data: ix.data.clone(),
        });
    }

    Ok(Message {
        header: MessageHeader { num_required_signatures, num_readonly_signed_accounts, num_readonly_unsigned_accounts },
        account_keys,
        recent_blockhash,
        instructions: compiled,
    })
}

fn partition_key(e: &Entry) -> u8 {
    match (e.is_signer, e.is_writable) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

fn upsert(table: &mut Vec<Entry>, pubkey: Pubkey, is_signer: bool, is_writable: bool) {
    if let Some(entry) = table.iter_mut().find(|e| e.pubkey == pubkey) {
        entry.is_signer |= is_signer;
        entry.is_writable |= is_writable;
    } else {
        table.push(Entry { pubkey, is_signer, is_writable });
    }
}

fn first_signer(instructions: &[Instruction]) -> Option<Pubkey> {
    instructions.iter().find_map(|ix| ix.accounts.iter().find(|m| m.is_signer).map(|m| m.pubkey))
}

/// Allocates a zero-signed [`Transaction`] for `message` and returns the
/// per-signer [`SigningPayload`]s (the serialized message bytes, shared
/// across every signer).
#[must_use]
pub fn build_payloads(message: &Message) -> (Transaction, Vec<SigningPayload>) {
    let bytes = envelope::serialize_message(message);
    let signatures = vec![[0u8; 64]; message.header.num_required_signatures as usize];
    let payloads = message
        .signer_accounts()
        .iter()
        .map(|pk| SigningPayload { address: pk.to_string(), bytes: bytes.clone(), signature_type: SignatureType::Ed25519 })
        .collect();
    (Transaction { signatures, message: message.clone() }, payloads)
}

/// Resolves each caller-supplied signature to its account-table position
/// within the signer region and writes it into `tx.signatures`.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if a
/// signature's public key is not in the signer region (B2).
pub fn combine(tx: &mut Transaction, signatures: &[SignaturePair]) -> Result<(), ConstructionError> {
    let signer_region = tx.message.signer_accounts().to_vec();
    for pair in signatures {
        let position = signer_region
            .iter()
            .position(|pk| *pk == pair.public_key)
            .ok_or_else(|| ConstructionError::parse(format!("signer {} is not in the signer region", pair.public_key)))?;
        tx.signatures[position] = pair.signature;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::types::AccountMeta;

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn ix(program: Pubkey, accounts: Vec<AccountMeta>) -> Instruction {
        Instruction { program_id: program, accounts, data: vec![] }
    }

    #[test]
    fn fee_payer_defaults_to_first_signer_and_lands_at_index_zero() {
        let instructions = vec![ix(pk(99), vec![AccountMeta::signer_writable(pk(1)), AccountMeta::writable(pk(2))])];
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        assert_eq!(message.account_keys[0], pk(1));
        assert_eq!(message.header.num_required_signatures, 1);
    }

    #[test]
    fn duplicate_accounts_are_deduplicated_with_or_merged_flags_p2() {
        let instructions = vec![
            ix(pk(99), vec![AccountMeta::signer_readonly(pk(1)), AccountMeta::writable(pk(2))]),
            ix(pk(99), vec![AccountMeta::writable(pk(1))]),
        ];
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        let count = message.account_keys.iter().filter(|k| **k == pk(1)).count();
        assert_eq!(count, 1);
        assert_eq!(message.account_keys[0], pk(1));
        assert_eq!(message.header.num_required_signatures, 1);
        assert_eq!(message.header.num_readonly_signed_accounts, 0); // promoted to writable by the OR-merge
    }

    #[test]
    fn required_signatures_equals_unique_signer_count_p1() {
        let instructions = vec![ix(
            pk(99),
            vec![AccountMeta::signer_writable(pk(1)), AccountMeta::signer_readonly(pk(2)), AccountMeta::writable(pk(3))],
        )];
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        assert_eq!(message.header.num_required_signatures, 2);
    }

    #[test]
    fn explicit_fee_payer_overrides_first_signer() {
        let instructions = vec![ix(pk(99), vec![AccountMeta::signer_writable(pk(1)), AccountMeta::writable(pk(2))])];
        let message = assemble(&instructions, Some(pk(2)), [0; 32]).unwrap();
        assert_eq!(message.account_keys[0], pk(2));
        assert!(message.header.num_required_signatures >= 1);
    }

    #[test]
    fn build_payloads_allocates_one_payload_per_required_signer() {
        let instructions = vec![ix(pk(99), vec![AccountMeta::signer_writable(pk(1))])];
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        let (tx, payloads) = build_payloads(&message);
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].address, pk(1).to_string());
    }

    #[test]
    fn combine_rejects_signature_outside_signer_region_b2() {
        let instructions = vec![ix(pk(99), vec![AccountMeta::signer_writable(pk(1))])];
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        let (mut tx, _) = build_payloads(&message);
        let err = combine(&mut tx, &[SignaturePair { public_key: pk(77), signature: [9; 64] }]).unwrap_err();
        assert!(matches!(err, ConstructionError::UnableToParseIntermediateResult(_)));
    }

    #[test]
    fn combine_writes_signature_into_resolved_position() {
        let instructions = vec![ix(
            pk(99),
            vec![AccountMeta::signer_writable(pk(2)), AccountMeta::signer_writable(pk(1))],
        )];
        // pk(1) is the default fee payer candidate only if it's first; here
        // pk(2) appears first in the instruction so it becomes the fee payer.
        let message = assemble(&instructions, None, [0; 32]).unwrap();
        let (mut tx, _) = build_payloads(&message);
        let pos = message.account_keys.iter().position(|k| *k == pk(1)).unwrap();
        combine(&mut tx, &[SignaturePair { public_key: pk(1), signature: [5; 64] }]).unwrap();
        assert_eq!(tx.signatures[pos], [5; 64]);
    }
}
