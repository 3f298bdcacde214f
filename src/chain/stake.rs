//! Structural classification of stake-tree transactions.
//!
//! The index only needs to tell the transaction kinds apart well enough to
//! know which inputs carry no previous output and which outputs activate
//! ticket commitment extraction, so classification is purely structural:
//! tag opcodes on outputs and the null outpoint on inputs.

use crate::chain::script::{OP_RETURN, OP_SSTX, OP_TADD, OP_TSPEND};
use crate::chain::types::{Transaction, TxIn};

/// A stakebase input references no previous output, like a coinbase.
pub fn is_stake_base(txin: &TxIn) -> bool {
    txin.previous_outpoint.is_null()
}

/// Ticket purchases tag their first output with OP_SSTX.
pub fn is_ticket(tx: &Transaction) -> bool {
    tx.outputs.first().is_some_and(|out| out.pk_script.first() == Some(&OP_SSTX))
}

/// Votes consume a stakebase plus the ticket being voted and lead with a
/// null-data block reference output.
pub fn is_vote(tx: &Transaction) -> bool {
    tx.inputs.len() >= 2
        && is_stake_base(&tx.inputs[0])
        && tx.outputs.first().is_some_and(|out| out.pk_script.first() == Some(&OP_RETURN))
}

/// Treasury bases mint into the treasury: a single stakebase input and a
/// bare OP_TADD first output.
pub fn is_treasury_base(tx: &Transaction) -> bool {
    tx.inputs.len() == 1
        && is_stake_base(&tx.inputs[0])
        && tx.inputs[0].signature_script.is_empty()
        && tx.outputs.first().is_some_and(|out| out.pk_script.as_slice() == [OP_TADD])
}

/// Treasury spends carry a single input with no previous output whose
/// signature script ends in OP_TSPEND.
pub fn is_treasury_spend(tx: &Transaction) -> bool {
    tx.inputs.len() == 1
        && tx.inputs[0].previous_outpoint.is_null()
        && tx.inputs[0].signature_script.last() == Some(&OP_TSPEND)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::types::{OutPoint, TxHash, TxOut, TxTree};

    fn bare_tx(inputs: Vec<TxIn>, outputs: Vec<TxOut>) -> Transaction {
        Transaction { version: 1, inputs, outputs, lock_time: 0, expiry: 0 }
    }

    fn stake_base_input(signature_script: Vec<u8>) -> TxIn {
        TxIn { previous_outpoint: OutPoint::null(), sequence: u32::MAX, signature_script }
    }

    fn regular_input() -> TxIn {
        TxIn {
            previous_outpoint: OutPoint {
                hash: TxHash([1; 32]),
                index: 0,
                tree: TxTree::Regular,
            },
            sequence: u32::MAX,
            signature_script: Vec::new(),
        }
    }

    fn output(script: Vec<u8>) -> TxOut {
        TxOut { value: 0, version: 0, pk_script: script }
    }

    #[test]
    fn recognises_tickets() {
        let ticket = bare_tx(vec![regular_input()], vec![output(vec![OP_SSTX, 0x76])]);
        assert!(is_ticket(&ticket));
        assert!(!is_vote(&ticket));

        let plain = bare_tx(vec![regular_input()], vec![output(vec![0x76])]);
        assert!(!is_ticket(&plain));
    }

    #[test]
    fn recognises_votes() {
        let vote = bare_tx(
            vec![stake_base_input(vec![0, 0]), regular_input()],
            vec![output(vec![OP_RETURN, 0x04, 1, 2, 3, 4])],
        );
        assert!(is_vote(&vote));
        assert!(!is_treasury_base(&vote));
        assert!(!is_treasury_spend(&vote));

        // A single-input transaction cannot be a vote.
        let not_vote =
            bare_tx(vec![stake_base_input(Vec::new())], vec![output(vec![OP_RETURN])]);
        assert!(!is_vote(&not_vote));
    }

    #[test]
    fn recognises_treasury_base() {
        let tbase = bare_tx(
            vec![stake_base_input(Vec::new())],
            vec![output(vec![OP_TADD]), output(vec![OP_RETURN, 0x0c])],
        );
        assert!(is_treasury_base(&tbase));
        assert!(!is_vote(&tbase));
        assert!(!is_treasury_spend(&tbase));
    }

    #[test]
    fn recognises_treasury_spend() {
        let tspend = bare_tx(
            vec![stake_base_input(vec![0x40, OP_TSPEND])],
            vec![output(vec![OP_RETURN, 0x20])],
        );
        assert!(is_treasury_spend(&tspend));
        assert!(!is_treasury_base(&tspend));
        assert!(!is_vote(&tspend));
    }
}
