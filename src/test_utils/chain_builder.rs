//! Builder for test blocks with addressed outputs on both trees.

use crate::chain::address::HASH160_SIZE;
use crate::chain::script::{
    OP_CHECKSIG, OP_DATA_20, OP_DATA_30, OP_DUP, OP_EQUALVERIFY, OP_HASH160, OP_RETURN, OP_SSGEN,
    OP_SSTX, OP_SSTXCHANGE,
};
use crate::chain::types::{
    Block, BlockHash, BlockHeader, OutPoint, Transaction, TxHash, TxIn, TxOut, TxTree, HASH_SIZE,
};

/// Standard pay-to-pubkey-hash script for the given hash.
pub fn p2pkh_script(hash: [u8; HASH160_SIZE]) -> Vec<u8> {
    let mut script = vec![OP_DUP, OP_HASH160, OP_DATA_20];
    script.extend_from_slice(&hash);
    script.push(OP_EQUALVERIFY);
    script.push(OP_CHECKSIG);
    script
}

/// A stake-tagged pay-to-pubkey-hash script (`tag` is one of the OP_SS*
/// or OP_TGEN opcodes).
pub fn stake_tagged_script(tag: u8, hash: [u8; HASH160_SIZE]) -> Vec<u8> {
    let mut script = vec![tag];
    script.extend_from_slice(&p2pkh_script(hash));
    script
}

/// Ticket commitment null-data script committing to `hash`.
pub fn commitment_script(hash: [u8; HASH160_SIZE], p2sh: bool) -> Vec<u8> {
    let mut script = vec![OP_RETURN, OP_DATA_30];
    script.extend_from_slice(&hash);
    let mut amount = 20_000u64;
    if p2sh {
        amount |= 1 << 63;
    }
    script.extend_from_slice(&amount.to_le_bytes());
    script.extend_from_slice(&[0, 0]);
    script
}

// Deterministic per-block fake outpoint hashes so generated inputs never
// collide across builders.
fn synthetic_hash(height: u32, ordinal: u32) -> TxHash {
    let mut hash = [0u8; HASH_SIZE];
    hash[0..4].copy_from_slice(&height.to_le_bytes());
    hash[4..8].copy_from_slice(&ordinal.to_le_bytes());
    hash[8] = 0x5a;
    TxHash(hash)
}

/// Builds one block at a time: a coinbase is always present, regular and
/// stake transactions are appended through the helper methods.
pub struct TestBlockBuilder {
    header: BlockHeader,
    transactions: Vec<Transaction>,
    stake_transactions: Vec<Transaction>,
    synthetic_inputs: u32,
}

impl TestBlockBuilder {
    /// Address every generated coinbase pays to.
    pub const COINBASE_PAYEE: [u8; HASH160_SIZE] = [0xee; HASH160_SIZE];

    pub fn new(height: u32) -> Self {
        let coinbase = Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_outpoint: OutPoint::null(),
                sequence: u32::MAX,
                signature_script: height.to_le_bytes().to_vec(),
            }],
            outputs: vec![TxOut {
                value: 50_0000_0000,
                version: 0,
                pk_script: p2pkh_script(Self::COINBASE_PAYEE),
            }],
            lock_time: 0,
            expiry: 0,
        };

        Self {
            header: BlockHeader {
                version: 1,
                prev_block: BlockHash::default(),
                merkle_root: [0; HASH_SIZE],
                timestamp: 1_600_000_000 + height,
                bits: 0x1d00_ffff,
                nonce: height,
                height,
            },
            transactions: vec![coinbase],
            stake_transactions: Vec::new(),
            synthetic_inputs: 0,
        }
    }

    pub fn prev_block(mut self, hash: BlockHash) -> Self {
        self.header.prev_block = hash;
        self
    }

    fn next_synthetic_input(&mut self) -> TxIn {
        self.synthetic_inputs += 1;
        TxIn {
            previous_outpoint: OutPoint {
                hash: synthetic_hash(self.header.height, self.synthetic_inputs),
                index: 0,
                tree: TxTree::Regular,
            },
            sequence: u32::MAX,
            signature_script: Vec::new(),
        }
    }

    /// Appends a regular transaction with one (unresolvable) input and a
    /// single output paying `payee`.
    pub fn pay_to(mut self, payee: [u8; HASH160_SIZE], value: i64) -> Self {
        let input = self.next_synthetic_input();
        self.transactions.push(Transaction {
            version: 1,
            inputs: vec![input],
            outputs: vec![TxOut { value, version: 0, pk_script: p2pkh_script(payee) }],
            lock_time: 0,
            expiry: 0,
        });
        self
    }

    /// Adds one more output to the most recently added regular
    /// transaction.
    pub fn pay_to_same_tx(mut self, payee: [u8; HASH160_SIZE], value: i64) -> Self {
        let tx = self
            .transactions
            .last_mut()
            .expect("builder always has at least the coinbase");
        tx.outputs.push(TxOut { value, version: 0, pk_script: p2pkh_script(payee) });
        self
    }

    /// Builds a transaction spending output `vout` of `funding` into a
    /// single output paying `payee`.
    pub fn spend_tx(
        funding: &Transaction,
        vout: u32,
        payee: [u8; HASH160_SIZE],
    ) -> Transaction {
        let value = funding.outputs[vout as usize].value;
        Transaction {
            version: 1,
            inputs: vec![TxIn {
                previous_outpoint: OutPoint {
                    hash: funding.hash(),
                    index: vout,
                    tree: TxTree::Regular,
                },
                sequence: u32::MAX,
                signature_script: vec![0x51],
            }],
            outputs: vec![TxOut { value, version: 0, pk_script: p2pkh_script(payee) }],
            lock_time: 0,
            expiry: 0,
        }
    }

    /// Appends a regular transaction spending output `vout` of `funding`.
    pub fn spend(mut self, funding: &Transaction, vout: u32, payee: [u8; HASH160_SIZE]) -> Self {
        self.transactions.push(Self::spend_tx(funding, vout, payee));
        self
    }

    /// Appends a stake-tree vote whose reward output pays `payee`.
    pub fn vote_paying(mut self, payee: [u8; HASH160_SIZE]) -> Self {
        let ticket_input = self.next_synthetic_input();
        self.stake_transactions.push(Transaction {
            version: 1,
            inputs: vec![
                TxIn {
                    previous_outpoint: OutPoint::null(),
                    sequence: u32::MAX,
                    signature_script: vec![0x00, 0x00],
                },
                ticket_input,
            ],
            outputs: vec![
                // Block reference commitment.
                TxOut {
                    value: 0,
                    version: 0,
                    pk_script: vec![OP_RETURN, 0x06, 1, 2, 3, 4, 5, 6],
                },
                TxOut {
                    value: 1_0000_0000,
                    version: 0,
                    pk_script: stake_tagged_script(OP_SSGEN, payee),
                },
            ],
            lock_time: 0,
            expiry: 0,
        });
        self
    }

    /// Appends a stake-tree ticket purchase committing to `commit`.
    pub fn ticket_committing(mut self, commit: [u8; HASH160_SIZE]) -> Self {
        let input = self.next_synthetic_input();
        self.stake_transactions.push(Transaction {
            version: 1,
            inputs: vec![input],
            outputs: vec![
                TxOut {
                    value: 2_0000_0000,
                    version: 0,
                    pk_script: stake_tagged_script(OP_SSTX, [0xcc; HASH160_SIZE]),
                },
                TxOut { value: 0, version: 0, pk_script: commitment_script(commit, false) },
                TxOut {
                    value: 0,
                    version: 0,
                    pk_script: stake_tagged_script(OP_SSTXCHANGE, [0xdd; HASH160_SIZE]),
                },
            ],
            lock_time: 0,
            expiry: 0,
        });
        self
    }

    /// Appends an arbitrary stake transaction.
    pub fn stake_tx(mut self, tx: Transaction) -> Self {
        self.stake_transactions.push(tx);
        self
    }

    pub fn build(self) -> Block {
        Block {
            header: self.header,
            transactions: self.transactions,
            stake_transactions: self.stake_transactions,
        }
    }
}
