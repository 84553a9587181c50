//! Operation matcher (C3): pairs debit/credit operations into transfer
//! intents by equal type, equal currency, equal magnitude, opposite sign.
//!
//! See §4.1. Pairing is deterministic — first eligible counterpart in
//! index order wins — so identical requests always match identically.

use std::collections::HashMap;

use crate::construction::error::ConstructionError;
use crate::construction::types::{MatchedOp, Operation, SplAccounts, TransferIntent};

/// The `Program__Operation` families the matcher treats as balance-changing
/// (§3 I2): every operation of these types must find a counterpart.
const BALANCE_CHANGING_FAMILIES: &[&str] = &[
    "System__Transfer",
    "SplToken__Transfer",
    "SplToken__TransferChecked",
    "SplToken__TransferNew",
    "SplToken__TransferWithSystem",
    "Stake__Split",
    "Stake__WithdrawStake",
];

/// Runs the matcher over one request's operations.
///
/// # Errors
///
/// Returns [`ConstructionError::UnclearIntent`] if an operation carrying
/// an amount has no eligible counterpart (I2).
pub fn match_operations(ops: &[Operation]) -> Result<Vec<MatchedOp>, ConstructionError> {
    let mut consumed = vec![false; ops.len()];
    let mut result = Vec::with_capacity(ops.len());

    for (i, op) in ops.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        let Some(counterpart) = find_counterpart(ops, &consumed, i, op) else {
            if op.amount.is_some() {
                return Err(ConstructionError::intent(format!(
                    "operation {} has an amount but no matching counterpart",
                    op.operation_identifier.index
                )));
            }
            consumed[i] = true;
            result.push(MatchedOp::Singleton(op.clone()));
            continue;
        };

        consumed[i] = true;
        consumed[counterpart] = true;

        let (from, to) = if is_negative(op) { (op.clone(), ops[counterpart].clone()) } else { (ops[counterpart].clone(), op.clone()) };
        result.push(MatchedOp::Intent(TransferIntent { from, to }));
    }

    Ok(result)
}

/// Returns the index of the first eligible counterpart of `op`, scanning
/// `ops` in index order and skipping already-consumed or self indexes.
fn find_counterpart(ops: &[Operation], consumed: &[bool], i: usize, op: &Operation) -> Option<usize> {
    ops.iter().enumerate().find_map(|(j, candidate)| {
        if j == i || consumed[j] || candidate.operation_type != op.operation_type {
            return None;
        }
        match (&op.amount, &candidate.amount) {
            (Some(a), Some(b)) => {
                let (a_neg, a_mag) = a.magnitude().ok()?;
                let (b_neg, b_mag) = b.magnitude().ok()?;
                (a.currency == b.currency && a_mag == b_mag && a_neg != b_neg).then_some(j)
            }
            _ => None,
        }
    })
}

fn is_negative(op: &Operation) -> bool {
    op.amount.as_ref().and_then(|a| a.magnitude().ok()).is_some_and(|(neg, _)| neg)
}

/// Whether `op_type` belongs to the closed set of balance-changing
/// families that require a matched counterpart (I2).
#[must_use]
pub fn is_balance_changing(op_type: &str) -> bool {
    BALANCE_CHANGING_FAMILIES.contains(&op_type)
}

/// Extracts the `SplAccounts{source, destination, mint}` preprocess map for
/// every matched `SplToken__TransferWithSystem` intent, keyed by the
/// sender operation's index rendered as base-10 text (§4.1).
#[must_use]
pub fn spl_system_acc_map(matched: &[MatchedOp]) -> HashMap<String, SplAccounts> {
    let mut map = HashMap::new();
    for m in matched {
        let MatchedOp::Intent(intent) = m else { continue };
        if intent.from.operation_type != "SplToken__TransferWithSystem" {
            continue;
        }
        let Some(source) = intent.from.account.as_ref().map(|a| a.address.clone()) else { continue };
        let Some(destination) = intent.to.account.as_ref().map(|a| a.address.clone()) else { continue };
        let Some(mint) = intent.from.amount.as_ref().map(|a| a.currency.symbol.clone()) else { continue };
        map.insert(intent.from.operation_identifier.index.to_string(), SplAccounts { source, destination, mint });
    }
    map
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::construction::types::{AccountIdentifier, Amount, Currency, OperationIdentifier};

    fn op(index: i64, op_type: &str, account: &str, amount: Option<&str>, currency: Currency) -> Operation {
        Operation {
            operation_identifier: OperationIdentifier { index },
            operation_type: op_type.to_string(),
            account: Some(AccountIdentifier::new(account)),
            amount: amount.map(|v| Amount { value: v.to_string(), currency }),
            metadata: Map::new(),
        }
    }

    #[test]
    fn pairs_opposite_signed_operations_of_equal_magnitude() {
        let ops = vec![
            op(0, "System__Transfer", "A", Some("-1000000000"), Currency::native()),
            op(1, "System__Transfer", "B", Some("1000000000"), Currency::native()),
        ];
        let matched = match_operations(&ops).unwrap();
        assert_eq!(matched.len(), 1);
        let MatchedOp::Intent(intent) = &matched[0] else { panic!("expected intent") };
        assert_eq!(intent.from.account.as_ref().unwrap().address, "A");
        assert_eq!(intent.to.account.as_ref().unwrap().address, "B");
    }

    #[test]
    fn same_sign_operations_do_not_pair_b1() {
        let ops = vec![
            op(0, "System__Transfer", "A", Some("1000000000"), Currency::native()),
            op(1, "System__Transfer", "B", Some("1000000000"), Currency::native()),
        ];
        assert!(match_operations(&ops).is_err());
    }

    #[test]
    fn unpaired_amount_is_unclear_intent() {
        let ops = vec![op(0, "System__Transfer", "A", Some("-5"), Currency::native())];
        let err = match_operations(&ops).unwrap_err();
        assert!(matches!(err, ConstructionError::UnclearIntent(_)));
    }

    #[test]
    fn amountless_operations_are_singletons() {
        let ops = vec![op(0, "System__CreateNonceAccount", "A", None, Currency::native())];
        let matched = match_operations(&ops).unwrap();
        assert_eq!(matched.len(), 1);
        assert!(matches!(matched[0], MatchedOp::Singleton(_)));
    }

    #[test]
    fn pairing_is_deterministic_first_eligible_wins() {
        // X(+5) has two eligible -5 partners (B, C); B comes first in index
        // order and must win, leaving C to pair with the later Y(+5).
        let ops = vec![
            op(0, "System__Transfer", "X", Some("5"), Currency::native()),
            op(1, "System__Transfer", "B", Some("-5"), Currency::native()),
            op(2, "System__Transfer", "C", Some("-5"), Currency::native()),
            op(3, "System__Transfer", "Y", Some("5"), Currency::native()),
        ];
        let matched = match_operations(&ops).unwrap();
        assert_eq!(matched.len(), 2);
        let MatchedOp::Intent(first) = &matched[0] else { panic!("expected intent") };
        assert_eq!(first.from.account.as_ref().unwrap().address, "B");
        assert_eq!(first.to.account.as_ref().unwrap().address, "X");
        let MatchedOp::Intent(second) = &matched[1] else { panic!("expected intent") };
        assert_eq!(second.from.account.as_ref().unwrap().address, "C");
        assert_eq!(second.to.account.as_ref().unwrap().address, "Y");
    }
}
