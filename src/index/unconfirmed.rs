//! Memory-only index of unconfirmed transactions.
//!
//! Mirrors the durable index for transactions still in the memory pool:
//! one map from address key to the transactions touching it, and the
//! reverse map from transaction hash to the involved address keys, which
//! makes removal cheap when a transaction confirms or is evicted.  Nothing
//! here persists; the maps live and die with the process.

use crate::chain::script::{commitment_addr_from_ticket_output, extract_script_addrs, ScriptClass};
use crate::chain::stake;
use crate::chain::types::{Transaction, TxHash};
use crate::index::block_scan::PrevScripter;
use crate::index::key::{addr_to_key, AddrKey};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

#[derive(Default)]
struct UnconfirmedMaps {
    txns_by_addr: HashMap<AddrKey, HashMap<TxHash, Arc<Transaction>>>,
    addrs_by_tx: HashMap<TxHash, HashSet<AddrKey>>,
}

/// The unconfirmed half of the address index.  All operations are safe
/// for concurrent access; mutations take the write side of one lock and
/// queries the read side.
#[derive(Default)]
pub struct UnconfirmedIndex {
    maps: RwLock<UnconfirmedMaps>,
}

impl UnconfirmedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the addresses encoded by one script against the
    /// transaction in both directions.
    fn index_unconfirmed_addresses(
        &self,
        script_version: u16,
        pk_script: &[u8],
        tx_hash: TxHash,
        tx: &Arc<Transaction>,
        is_ticket_output: bool,
        treasury_enabled: bool,
    ) {
        let (class, mut addrs) = extract_script_addrs(script_version, pk_script, treasury_enabled);
        if is_ticket_output && class == ScriptClass::NullData {
            if let Some(addr) = commitment_addr_from_ticket_output(pk_script) {
                addrs.push(addr);
            }
        }

        let mut maps = self.maps.write().expect("unconfirmed index lock poisoned");
        for addr in addrs {
            // Unsupported address types are skipped.
            let Ok(addr_key) = addr_to_key(&addr) else {
                continue;
            };

            maps.txns_by_addr.entry(addr_key).or_default().insert(tx_hash, Arc::clone(tx));
            maps.addrs_by_tx.entry(tx_hash).or_default().insert(addr_key);
        }
    }

    /// Adds all addresses related to the transaction to the index.  The
    /// transaction must already have been accepted by the memory pool, so
    /// every input is expected to resolve through `prev_scripts`; missing
    /// entries are silently skipped.
    pub fn add_unconfirmed_tx(
        &self,
        tx: Arc<Transaction>,
        prev_scripts: &dyn PrevScripter,
        treasury_enabled: bool,
    ) {
        let tx_hash = tx.hash();

        let is_vote = stake::is_vote(&tx);
        for (input_idx, txin) in tx.inputs.iter().enumerate() {
            // Skip stakebases.
            if input_idx == 0 && is_vote {
                continue;
            }

            let Some((version, pk_script)) = prev_scripts.prev_script(&txin.previous_outpoint)
            else {
                continue;
            };
            self.index_unconfirmed_addresses(
                version,
                &pk_script,
                tx_hash,
                &tx,
                false,
                treasury_enabled,
            );
        }

        let is_ticket = stake::is_ticket(&tx);
        for txout in &tx.outputs {
            self.index_unconfirmed_addresses(
                txout.version,
                &txout.pk_script,
                tx_hash,
                &tx,
                is_ticket,
                treasury_enabled,
            );
        }
    }

    /// Removes every trace of the transaction from the index.
    pub fn remove_unconfirmed_tx(&self, tx_hash: &TxHash) {
        let mut maps = self.maps.write().expect("unconfirmed index lock poisoned");

        let UnconfirmedMaps { txns_by_addr, addrs_by_tx } = &mut *maps;
        if let Some(addr_keys) = addrs_by_tx.remove(tx_hash) {
            for addr_key in addr_keys {
                if let Some(txns) = txns_by_addr.get_mut(&addr_key) {
                    txns.remove(tx_hash);
                    if txns.is_empty() {
                        txns_by_addr.remove(&addr_key);
                    }
                }
            }
        }
    }

    /// Returns the unconfirmed transactions involving the address.  The
    /// result is a fresh vector (in unspecified order) so callers never
    /// observe later mutations; unsupported address types yield nothing.
    pub fn unconfirmed_txns_for_address(
        &self,
        addr: &crate::chain::address::Address,
    ) -> Vec<Arc<Transaction>> {
        let Ok(addr_key) = addr_to_key(addr) else {
            return Vec::new();
        };

        let maps = self.maps.read().expect("unconfirmed index lock poisoned");
        match maps.txns_by_addr.get(&addr_key) {
            Some(txns) => txns.values().cloned().collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::address::Address;
    use crate::test_utils::{MockChain, TestBlockBuilder};

    #[test]
    fn add_query_remove_round_trip() {
        let mut chain = MockChain::new();
        let payee = [0x10; 20];
        let funding = TestBlockBuilder::new(1).pay_to(payee, 900).build();
        chain.register(&funding);
        let funding_tx = &funding.transactions[1];

        let change = [0x20; 20];
        let spend = Arc::new(TestBlockBuilder::spend_tx(funding_tx, 0, change));
        let spend_hash = spend.hash();

        let index = UnconfirmedIndex::new();
        index.add_unconfirmed_tx(Arc::clone(&spend), &chain, false);

        // Visible both through the spent address and the new output.
        let by_input = index.unconfirmed_txns_for_address(&Address::PubKeyHashEcdsa(payee));
        assert_eq!(by_input.len(), 1);
        assert_eq!(by_input[0].hash(), spend_hash);

        let by_output = index.unconfirmed_txns_for_address(&Address::PubKeyHashEcdsa(change));
        assert_eq!(by_output.len(), 1);

        index.remove_unconfirmed_tx(&spend_hash);
        assert!(index.unconfirmed_txns_for_address(&Address::PubKeyHashEcdsa(payee)).is_empty());
        assert!(index.unconfirmed_txns_for_address(&Address::PubKeyHashEcdsa(change)).is_empty());
    }

    #[test]
    fn removal_keeps_other_transactions() {
        let mut chain = MockChain::new();
        let payee = [0x30; 20];
        let funding = TestBlockBuilder::new(1).pay_to(payee, 500).pay_to(payee, 700).build();
        chain.register(&funding);

        let spend_a = Arc::new(TestBlockBuilder::spend_tx(&funding.transactions[1], 0, [0x41; 20]));
        let spend_b = Arc::new(TestBlockBuilder::spend_tx(&funding.transactions[2], 0, [0x42; 20]));

        let index = UnconfirmedIndex::new();
        index.add_unconfirmed_tx(Arc::clone(&spend_a), &chain, false);
        index.add_unconfirmed_tx(Arc::clone(&spend_b), &chain, false);

        let addr = Address::PubKeyHashEcdsa(payee);
        assert_eq!(index.unconfirmed_txns_for_address(&addr).len(), 2);

        index.remove_unconfirmed_tx(&spend_a.hash());
        let remaining = index.unconfirmed_txns_for_address(&addr);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].hash(), spend_b.hash());
    }

    #[test]
    fn query_returns_fresh_copies() {
        let mut chain = MockChain::new();
        let payee = [0x50; 20];
        let funding = TestBlockBuilder::new(1).pay_to(payee, 100).build();
        chain.register(&funding);

        let spend = Arc::new(TestBlockBuilder::spend_tx(&funding.transactions[1], 0, [0x51; 20]));
        let index = UnconfirmedIndex::new();
        index.add_unconfirmed_tx(Arc::clone(&spend), &chain, false);

        let addr = Address::PubKeyHashEcdsa(payee);
        let snapshot = index.unconfirmed_txns_for_address(&addr);
        index.remove_unconfirmed_tx(&spend.hash());

        // The earlier snapshot is unaffected by the removal.
        assert_eq!(snapshot.len(), 1);
        assert!(index.unconfirmed_txns_for_address(&addr).is_empty());
    }

    #[test]
    fn unsupported_addresses_index_nothing() {
        let index = UnconfirmedIndex::new();
        assert!(index.unconfirmed_txns_for_address(&Address::Other).is_empty());
    }
}
