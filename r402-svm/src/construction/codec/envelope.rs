//! Message/transaction binary layout and the base58/hex transaction envelope.
//!
//! Wire format is Solana's legacy `Message` encoding (§6): header (3×u8) ∥
//! compact-u16 account count ∥ accounts ∥ 32-byte blockhash ∥ compact-u16
//! instruction count ∥ instructions, each `{u8 program_id_index, compact-u16
//! account count, account indexes, compact-u16 data length, data}`.
//! Transactions prefix that with a compact-u16 signature count and the
//! 64-byte signature slots.

use solana_pubkey::Pubkey;

use super::Reader;
use crate::construction::error::ConstructionError;
use crate::construction::types::{CompiledInstruction, Message, MessageHeader, SignatureBytes, Transaction};

/// Appends `value` in Solana's "compact-u16" (shortvec) encoding: 7 data
/// bits per byte, continuation in the high bit, little-endian group order.
pub fn write_compact_u16(buf: &mut Vec<u8>, value: u16) {
    let mut rest = value;
    loop {
        let mut byte = (rest & 0x7f) as u8;
        rest >>= 7;
        if rest == 0 {
            buf.push(byte);
            break;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Reads a compact-u16 value, advancing the cursor.
pub fn read_compact_u16(reader: &mut Reader) -> Option<u16> {
    let mut value: u32 = 0;
    let mut shift = 0;
    loop {
        let byte = reader.read_u8()?;
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift > 14 {
            return None;
        }
    }
    u16::try_from(value).ok()
}

/// Serializes a [`Message`] to its canonical wire bytes.
#[must_use]
pub fn serialize_message(message: &Message) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(message.header.num_required_signatures);
    buf.push(message.header.num_readonly_signed_accounts);
    buf.push(message.header.num_readonly_unsigned_accounts);

    write_compact_u16(&mut buf, message.account_keys.len() as u16);
    for key in &message.account_keys {
        buf.extend_from_slice(key.as_ref());
    }

    buf.extend_from_slice(&message.recent_blockhash);

    write_compact_u16(&mut buf, message.instructions.len() as u16);
    for ix in &message.instructions {
        buf.push(ix.program_id_index);
        write_compact_u16(&mut buf, ix.account_indexes.len() as u16);
        buf.extend_from_slice(&ix.account_indexes);
        write_compact_u16(&mut buf, ix.data.len() as u16);
        buf.extend_from_slice(&ix.data);
    }
    buf
}

/// Parses a [`Message`] from its canonical wire bytes.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] on
/// truncated input.
pub fn deserialize_message(data: &[u8]) -> Result<Message, ConstructionError> {
    let mut reader = Reader::new(data);
    let num_required_signatures = reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated message header"))?;
    let num_readonly_signed_accounts = reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated message header"))?;
    let num_readonly_unsigned_accounts = reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated message header"))?;

    let account_count = read_compact_u16(&mut reader).ok_or_else(|| ConstructionError::parse("truncated account count"))?;
    let mut account_keys = Vec::with_capacity(account_count as usize);
    for _ in 0..account_count {
        account_keys.push(reader.read_pubkey().ok_or_else(|| ConstructionError::parse("truncated account key"))?);
    }

    let blockhash_bytes = {
        let mut bytes = [0u8; 32];
        for b in &mut bytes {
            *b = reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated blockhash"))?;
        }
        bytes
    };

    let instruction_count = read_compact_u16(&mut reader).ok_or_else(|| ConstructionError::parse("truncated instruction count"))?;
    let mut instructions = Vec::with_capacity(instruction_count as usize);
    for _ in 0..instruction_count {
        let program_id_index = reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated instruction"))?;
        let account_index_count = read_compact_u16(&mut reader).ok_or_else(|| ConstructionError::parse("truncated instruction accounts"))?;
        let mut account_indexes = Vec::with_capacity(account_index_count as usize);
        for _ in 0..account_index_count {
            account_indexes.push(reader.read_u8().ok_or_else(|| ConstructionError::parse("truncated instruction account index"))?);
        }
        let data_len = read_compact_u16(&mut reader).ok_or_else(|| ConstructionError::parse("truncated instruction data length"))?;
        let data = reader
            .remaining_slice(data_len as usize)
            .ok_or_else(|| ConstructionError::parse("truncated instruction data"))?
            .to_vec();
        instructions.push(CompiledInstruction {
            program_id_index,
            account_indexes,
            data,
        });
    }

    Ok(Message {
        header: MessageHeader {
            num_required_signatures,
            num_readonly_signed_accounts,
            num_readonly_unsigned_accounts,
        },
        account_keys,
        recent_blockhash: blockhash_bytes,
        instructions,
    })
}

/// Serializes a [`Transaction`]: compact-u16 signature count ∥ 64-byte
/// slots ∥ serialized message.
#[must_use]
pub fn serialize_transaction(tx: &Transaction) -> Vec<u8> {
    let mut buf = Vec::new();
    write_compact_u16(&mut buf, tx.signatures.len() as u16);
    for sig in &tx.signatures {
        buf.extend_from_slice(sig);
    }
    buf.extend_from_slice(&serialize_message(&tx.message));
    buf
}

/// Parses a [`Transaction`] from its wire bytes.
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] on
/// truncated input, or if `signatures.len()` disagrees with the message
/// header's `num_required_signatures` (I4).
pub fn deserialize_transaction(data: &[u8]) -> Result<Transaction, ConstructionError> {
    let mut reader = Reader::new(data);
    let sig_count = read_compact_u16(&mut reader).ok_or_else(|| ConstructionError::parse("truncated signature count"))?;
    let mut signatures = Vec::with_capacity(sig_count as usize);
    for _ in 0..sig_count {
        let sig: SignatureBytes = reader
            .remaining_slice(64)
            .ok_or_else(|| ConstructionError::parse("truncated signature"))?
            .try_into()
            .map_err(|_| ConstructionError::parse("malformed signature"))?;
        signatures.push(sig);
    }
    let message = deserialize_message(reader.read_rest())?;
    if signatures.len() != message.header.num_required_signatures as usize {
        return Err(ConstructionError::parse(format!(
            "signature count {} disagrees with header.num_required_signatures {}",
            signatures.len(),
            message.header.num_required_signatures
        )));
    }
    Ok(Transaction { signatures, message })
}

/// Base58-encodes a serialized transaction.
#[must_use]
pub fn encode_base58(tx: &Transaction) -> String {
    bs58::encode(serialize_transaction(tx)).into_string()
}

/// Decodes a transaction envelope: base58 first, falling back to hex if
/// base58 decoding fails (R2, §6).
///
/// # Errors
///
/// Returns [`ConstructionError::UnableToParseIntermediateResult`] if
/// neither base58 nor hex decoding produces a parseable transaction.
pub fn decode_envelope(encoded: &str) -> Result<Transaction, ConstructionError> {
    let bytes = bs58::decode(encoded)
        .into_vec()
        .or_else(|_| hex::decode(encoded))
        .map_err(|_| ConstructionError::parse("transaction is neither valid base58 nor hex"))?;
    deserialize_transaction(&bytes)
}

/// Renders a [`Pubkey`] as its base58 address — the canonical text form (§3).
#[must_use]
pub fn pubkey_to_address(pubkey: &Pubkey) -> String {
    pubkey.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::types::{AccountMeta, Instruction};
    use crate::construction::{assembler, types::SYSTEM_PROGRAM_ID};

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn sample_transaction() -> Transaction {
        let ix = Instruction {
            program_id: SYSTEM_PROGRAM_ID,
            accounts: vec![AccountMeta::signer_writable(pk(1)), AccountMeta::writable(pk(2))],
            data: vec![2, 0, 0, 0, 0, 202, 154, 59, 0, 0, 0, 0],
        };
        let message = assembler::assemble(std::slice::from_ref(&ix), None, [7u8; 32]).unwrap();
        let (tx, _payloads) = assembler::build_payloads(&message);
        tx
    }

    #[test]
    fn compact_u16_round_trips_across_encoding_widths() {
        for value in [0u16, 1, 127, 128, 16_383, 16_384, 65_535] {
            let mut buf = Vec::new();
            write_compact_u16(&mut buf, value);
            let mut reader = Reader::new(&buf);
            assert_eq!(read_compact_u16(&mut reader), Some(value));
        }
    }

    #[test]
    fn transaction_round_trips_through_serialize_deserialize() {
        let tx = sample_transaction();
        let bytes = serialize_transaction(&tx);
        let decoded = deserialize_transaction(&bytes).unwrap();
        assert_eq!(decoded, tx);
    }

    #[test]
    fn base58_round_trips_and_hex_is_a_working_fallback() {
        let tx = sample_transaction();
        let b58 = encode_base58(&tx);
        assert_eq!(decode_envelope(&b58).unwrap(), tx);

        let hex_encoded = hex::encode(serialize_transaction(&tx));
        assert_eq!(decode_envelope(&hex_encoded).unwrap(), tx);
    }

    #[test]
    fn rejects_signature_count_mismatch() {
        let tx = sample_transaction();
        let mut bytes = serialize_transaction(&tx);
        bytes[0] = 0; // claim zero signatures while the message still wants one
        assert!(deserialize_transaction(&bytes).is_err());
    }
}
