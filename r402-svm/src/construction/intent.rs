//! Canonicalizes a [`MatchedOp`] into a flat, typed field set the builder
//! reads from (§9 "Dynamic `metadata` maps" / "Copy-on-write of matched
//! operations").
//!
//! A [`MatchedOp::Intent`] never reaches the builder as two mutated
//! operations: it is projected once, here, into [`CanonicalFields`], and
//! every builder function reads from that rather than touching `Operation`
//! metadata directly.

use serde_json::{Map, Value};
use solana_pubkey::Pubkey;

use crate::construction::error::ConstructionError;
use crate::construction::types::{Currency, MatchedOp};

/// The flattened, request-scoped fields a builder function needs,
/// regardless of whether the source was a singleton or a matched pair.
#[derive(Debug, Clone)]
pub struct CanonicalFields {
    /// Full `Program__Operation` type string.
    pub op_type: String,
    /// The driving operation's index (the `from` side for an intent).
    pub index: i64,
    /// Singleton's account, or the intent's debited (`from`) account.
    pub source: Option<String>,
    /// The intent's credited (`to`) account; `None` for singletons.
    pub destination: Option<String>,
    /// Transfer magnitude, if the source carried an amount.
    pub amount: Option<u64>,
    /// The amount's currency, if any.
    pub currency: Option<Currency>,
    /// Merged metadata: the driving operation's keys, with the
    /// counterpart's keys filling any gaps.
    pub metadata: Map<String, Value>,
}

/// Projects a [`MatchedOp`] into [`CanonicalFields`].
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if a matched intent's
/// amount is not a valid base-10 magnitude.
pub fn canonical_fields(matched: &MatchedOp) -> Result<CanonicalFields, ConstructionError> {
    match matched {
        MatchedOp::Singleton(op) => Ok(CanonicalFields {
            op_type: op.operation_type.clone(),
            index: op.operation_identifier.index,
            source: op.account.as_ref().map(|a| a.address.clone()),
            destination: None,
            amount: None,
            currency: None,
            metadata: op.metadata.clone(),
        }),
        MatchedOp::Intent(intent) => {
            let amount = intent
                .from
                .amount
                .as_ref()
                .ok_or_else(|| ConstructionError::intent("matched intent's from-operation has no amount"))?;
            let (_, magnitude) = amount.magnitude().map_err(ConstructionError::intent)?;

            let mut metadata = intent.from.metadata.clone();
            for (key, value) in &intent.to.metadata {
                metadata.entry(key.clone()).or_insert_with(|| value.clone());
            }

            Ok(CanonicalFields {
                op_type: intent.from.operation_type.clone(),
                index: intent.from.operation_identifier.index,
                source: intent.from.account.as_ref().map(|a| a.address.clone()),
                destination: intent.to.account.as_ref().map(|a| a.address.clone()),
                amount: Some(magnitude),
                currency: Some(amount.currency.clone()),
                metadata,
            })
        }
    }
}

impl CanonicalFields {
    /// Reads a string-valued metadata field.
    #[must_use]
    pub fn field_str(&self, key: &str) -> Option<String> {
        self.metadata.get(key).and_then(Value::as_str).map(str::to_string)
    }

    /// Reads a `u64`-valued metadata field, accepting either a JSON number
    /// or a base-10 string.
    #[must_use]
    pub fn field_u64(&self, key: &str) -> Option<u64> {
        self.metadata.get(key).and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
    }

    /// Reads an `i64`-valued metadata field, accepting either a JSON number
    /// or a base-10 string.
    #[must_use]
    pub fn field_i64(&self, key: &str) -> Option<i64> {
        self.metadata.get(key).and_then(|v| v.as_i64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
    }

    /// `metadata.source`, defaulting to the canonicalized source account.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnclearIntent`] if neither is present,
    /// or if the resolved address is not a valid base58 public key.
    pub fn source(&self) -> Result<Pubkey, ConstructionError> {
        self.field_str("source")
            .or_else(|| self.source.clone())
            .ok_or_else(|| ConstructionError::intent("missing source account"))
            .and_then(|s| parse_pubkey(&s))
    }

    /// `metadata.destination`, defaulting to the matched counterpart's
    /// account.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnclearIntent`] if neither is present,
    /// or if the resolved address is not a valid base58 public key.
    pub fn destination(&self) -> Result<Pubkey, ConstructionError> {
        self.field_str("destination")
            .or_else(|| self.destination.clone())
            .ok_or_else(|| ConstructionError::intent("missing destination account"))
            .and_then(|s| parse_pubkey(&s))
    }

    /// `metadata.authority`, defaulting to [`Self::source`].
    ///
    /// # Errors
    ///
    /// Propagates [`Self::source`]'s errors when `authority` is absent.
    pub fn authority(&self) -> Result<Pubkey, ConstructionError> {
        match self.field_str("authority") {
            Some(s) => parse_pubkey(&s),
            None => self.source(),
        }
    }

    /// `metadata.wallet`, defaulting to [`Self::destination`].
    ///
    /// # Errors
    ///
    /// Propagates [`Self::destination`]'s errors when `wallet` is absent.
    pub fn wallet(&self) -> Result<Pubkey, ConstructionError> {
        match self.field_str("wallet") {
            Some(s) => parse_pubkey(&s),
            None => self.destination(),
        }
    }

    /// `metadata.mint`, defaulting to the amount's currency symbol.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnclearIntent`] if neither is present.
    pub fn mint(&self) -> Result<Pubkey, ConstructionError> {
        match self.field_str("mint") {
            Some(s) => parse_pubkey(&s),
            None => self
                .currency
                .as_ref()
                .map(|c| c.symbol.clone())
                .ok_or_else(|| ConstructionError::intent("missing mint"))
                .and_then(|s| parse_pubkey(&s)),
        }
    }

    /// `metadata.decimals`, defaulting to the currency's decimals, then 9.
    #[must_use]
    pub fn decimals(&self) -> u8 {
        self.field_i64("decimals").map_or_else(|| self.currency.as_ref().map_or(9, |c| c.decimals), |v| v) as u8
    }

    /// The matched magnitude, or `metadata.amount`/`metadata.lamports`.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnclearIntent`] if none are present.
    pub fn amount_u64(&self) -> Result<u64, ConstructionError> {
        self.amount
            .or_else(|| self.field_u64("amount"))
            .or_else(|| self.field_u64("lamports"))
            .ok_or_else(|| ConstructionError::intent("missing amount"))
    }

    /// `metadata.space`, defaulting to zero.
    #[must_use]
    pub fn space(&self) -> u64 {
        self.field_u64("space").unwrap_or(0)
    }

    /// `metadata.feePayer`, if the request named an explicit fee payer.
    ///
    /// # Errors
    ///
    /// Returns [`ConstructionError::UnclearIntent`] if present but not a
    /// valid base58 public key.
    pub fn fee_payer(&self) -> Result<Option<Pubkey>, ConstructionError> {
        self.field_str("feePayer").filter(|s| !s.is_empty()).map(|s| parse_pubkey(&s)).transpose()
    }
}

/// Parses `s` as a base58-encoded 32-byte public key.
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if `s` is not valid base58
/// or does not decode to exactly 32 bytes.
pub fn parse_pubkey(s: &str) -> Result<Pubkey, ConstructionError> {
    s.parse::<Pubkey>().map_err(|e| ConstructionError::intent(format!("invalid public key {s:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::construction::types::{AccountIdentifier, Amount, Operation, OperationIdentifier, TransferIntent};

    fn pk(seed: u8) -> Pubkey {
        Pubkey::new_from_array([seed; 32])
    }

    fn op(index: i64, account: Pubkey, amount: Option<&str>) -> Operation {
        Operation {
            operation_identifier: OperationIdentifier { index },
            operation_type: "System__Transfer".to_string(),
            account: Some(AccountIdentifier::new(account.to_string())),
            amount: amount.map(|v| Amount { value: v.to_string(), currency: Currency::native() }),
            metadata: Map::new(),
        }
    }

    #[test]
    fn intent_source_is_the_negative_side() {
        let matched = MatchedOp::Intent(TransferIntent { from: op(0, pk(1), Some("-5")), to: op(1, pk(2), Some("5")) });
        let fields = canonical_fields(&matched).unwrap();
        assert_eq!(fields.source, Some(pk(1).to_string()));
        assert_eq!(fields.destination, Some(pk(2).to_string()));
        assert_eq!(fields.amount, Some(5));
    }

    #[test]
    fn metadata_merge_fills_gaps_from_counterpart() {
        let mut from = op(0, pk(1), Some("-5"));
        from.metadata.insert("authority".into(), Value::String(pk(9).to_string()));
        let mut to = op(1, pk(2), Some("5"));
        to.metadata.insert("note".into(), Value::String("Y".into()));
        let matched = MatchedOp::Intent(TransferIntent { from, to });
        let fields = canonical_fields(&matched).unwrap();
        assert_eq!(fields.field_str("authority"), Some(pk(9).to_string()));
        assert_eq!(fields.field_str("note"), Some("Y".to_string()));
    }

    #[test]
    fn authority_defaults_to_source_when_absent() {
        let matched = MatchedOp::Intent(TransferIntent { from: op(0, pk(1), Some("-5")), to: op(1, pk(2), Some("5")) });
        let fields = canonical_fields(&matched).unwrap();
        assert_eq!(fields.authority().unwrap(), fields.source().unwrap());
    }
}
