//! Per-block address extraction.
//!
//! Walks both transaction trees of a block and maps every address key to
//! the ordered list of transaction ordinals that reference it, either by
//! spending a previous output paying the address or by creating a new one.
//! Stake ordinals continue after the regular tree, so `tx_idx` indexes the
//! logical sequence `regular ++ stake`.

use crate::chain::script::{commitment_addr_from_ticket_output, extract_script_addrs, ScriptClass};
use crate::chain::stake;
use crate::chain::types::{Block, OutPoint};
use crate::index::key::{addr_to_key, AddrKey};
use std::collections::HashMap;
use tracing::warn;

/// Source of previous output scripts for the inputs of indexed
/// transactions.
pub trait PrevScripter {
    /// Returns the script version and public key script of the referenced
    /// output, or `None` when the output is unknown.
    fn prev_script(&self, outpoint: &OutPoint) -> Option<(u16, Vec<u8>)>;
}

/// Address index data for one block: each address mapped to the ordered
/// transaction ordinals that involve it.
pub type WriteIndexData = HashMap<AddrKey, Vec<usize>>;

/// Extracts all standard addresses from the script and records `tx_idx`
/// against each.  Ticket outputs additionally yield the commitment
/// address hidden in their null-data outputs.
fn index_pk_script(
    data: &mut WriteIndexData,
    script_version: u16,
    pk_script: &[u8],
    tx_idx: usize,
    is_ticket_output: bool,
    treasury_enabled: bool,
) {
    let (class, mut addrs) = extract_script_addrs(script_version, pk_script, treasury_enabled);

    if is_ticket_output && class == ScriptClass::NullData {
        if let Some(addr) = commitment_addr_from_ticket_output(pk_script) {
            addrs.push(addr);
        }
    }

    if addrs.is_empty() {
        return;
    }

    for addr in addrs {
        // Unsupported address types are skipped, not errors.
        let Ok(addr_key) = addr_to_key(&addr) else {
            continue;
        };

        // Transactions are visited in order, so a transaction touching
        // the same address twice produces adjacent duplicates; checking
        // the most recent entry is enough to avoid them.
        let indexed_txns = data.entry(addr_key).or_default();
        if indexed_txns.last() == Some(&tx_idx) {
            continue;
        }
        indexed_txns.push(tx_idx);
    }
}

/// Builds the address index data for every transaction in the block.
///
/// Missing previous scripts are tolerated: the index contract requires
/// them, but a gap is logged and skipped rather than failing the block.
pub fn index_block(
    data: &mut WriteIndexData,
    block: &Block,
    prev_scripts: &dyn PrevScripter,
    treasury_enabled: bool,
) {
    let regular_count = block.transactions.len();
    let block_hash = block.hash();

    for (tx_idx, tx) in block.transactions.iter().enumerate() {
        // The coinbase references no inputs; the block has been fully
        // validated by the time it reaches the index, so position alone
        // identifies it.
        if tx_idx != 0 {
            for txin in &tx.inputs {
                let origin = &txin.previous_outpoint;
                let Some((version, pk_script)) = prev_scripts.prev_script(origin) else {
                    warn!(
                        block = %block_hash,
                        height = block.header.height,
                        "missing input {}:{} for tx {} while indexing block",
                        origin.hash,
                        origin.index,
                        tx.hash()
                    );
                    continue;
                };
                index_pk_script(data, version, &pk_script, tx_idx, false, treasury_enabled);
            }
        }

        for txout in &tx.outputs {
            index_pk_script(data, txout.version, &txout.pk_script, tx_idx, false, treasury_enabled);
        }
    }

    for (stake_idx, tx) in block.stake_transactions.iter().enumerate() {
        let tx_idx = regular_count + stake_idx;

        let is_vote = stake::is_vote(tx);
        let mut is_treasury_base = false;
        let mut is_treasury_spend = false;
        if treasury_enabled {
            // Short circuit the more expensive structural checks.
            is_treasury_base = !is_vote && stake::is_treasury_base(tx);
            is_treasury_spend = !is_treasury_base && stake::is_treasury_spend(tx);
        }

        for (input_idx, txin) in tx.inputs.iter().enumerate() {
            // Stakebases reference no previous output.
            if is_vote && input_idx == 0 {
                continue;
            }

            // Treasury bases and spends have no real inputs either.
            if is_treasury_base || is_treasury_spend {
                continue;
            }

            let origin = &txin.previous_outpoint;
            let Some((version, pk_script)) = prev_scripts.prev_script(origin) else {
                warn!(
                    block = %block_hash,
                    height = block.header.height,
                    "missing stake input {}:{} for tx {} while indexing block",
                    origin.hash,
                    origin.index,
                    tx.hash()
                );
                continue;
            };
            index_pk_script(data, version, &pk_script, tx_idx, false, treasury_enabled);
        }

        let is_ticket = stake::is_ticket(tx);
        for txout in &tx.outputs {
            index_pk_script(
                data,
                txout.version,
                &txout.pk_script,
                tx_idx,
                is_ticket,
                treasury_enabled,
            );
        }
    }
}
