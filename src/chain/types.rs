use sha2::{Digest, Sha256};
use std::fmt;

/// Size of block and transaction hashes in bytes.
pub const HASH_SIZE: usize = 32;

/// Serialized size of a block header.
pub const BLOCK_HEADER_SIZE: usize = 4 + HASH_SIZE + HASH_SIZE + 4 + 4 + 4 + 4;

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash(pub [u8; HASH_SIZE]);

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TxHash(pub [u8; HASH_SIZE]);

impl BlockHash {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl TxHash {
    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_SIZE]
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", hex::encode(self.0))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", hex::encode(self.0))
    }
}

/// Which of the two transaction trees of a block an outpoint refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum TxTree {
    Regular,
    Stake,
}

impl TxTree {
    fn as_byte(self) -> u8 {
        match self {
            TxTree::Regular => 0,
            TxTree::Stake => 1,
        }
    }
}

/// Reference to a specific output of a previous transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OutPoint {
    pub hash: TxHash,
    pub index: u32,
    pub tree: TxTree,
}

impl OutPoint {
    /// The null outpoint used by coinbase, stakebase and treasury inputs.
    pub fn null() -> Self {
        OutPoint { hash: TxHash::default(), index: u32::MAX, tree: TxTree::Regular }
    }

    pub fn is_null(&self) -> bool {
        self.index == u32::MAX && self.hash.is_zero()
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxIn {
    pub previous_outpoint: OutPoint,
    pub sequence: u32,
    pub signature_script: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TxOut {
    pub value: i64,
    pub version: u16,
    pub pk_script: Vec<u8>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Transaction {
    pub version: u16,
    pub inputs: Vec<TxIn>,
    pub outputs: Vec<TxOut>,
    pub lock_time: u32,
    pub expiry: u32,
}

/// Byte offset and length of a serialized transaction within its block.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TxLoc {
    pub tx_start: usize,
    pub tx_len: usize,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_block: BlockHash,
    pub merkle_root: [u8; HASH_SIZE],
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub height: u32,
}

/// A block with its two transaction trees.  The regular tree carries the
/// value transfers (the first entry is the coinbase); the stake tree
/// carries tickets, votes, revocations and treasury transactions.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub stake_transactions: Vec<Transaction>,
}

fn write_compact_size(buf: &mut Vec<u8>, n: u64) {
    match n {
        0..=0xfc => buf.push(n as u8),
        0xfd..=0xffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(n as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(0xfe);
            buf.extend_from_slice(&(n as u32).to_le_bytes());
        }
        _ => {
            buf.push(0xff);
            buf.extend_from_slice(&n.to_le_bytes());
        }
    }
}

fn compact_size_len(n: u64) -> usize {
    match n {
        0..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn sha256d(data: &[u8]) -> [u8; HASH_SIZE] {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    second.into()
}

impl Transaction {
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        buf.extend_from_slice(&self.version.to_le_bytes());
        write_compact_size(&mut buf, self.inputs.len() as u64);
        for txin in &self.inputs {
            buf.extend_from_slice(txin.previous_outpoint.hash.as_bytes());
            buf.extend_from_slice(&txin.previous_outpoint.index.to_le_bytes());
            buf.push(txin.previous_outpoint.tree.as_byte());
            write_compact_size(&mut buf, txin.signature_script.len() as u64);
            buf.extend_from_slice(&txin.signature_script);
            buf.extend_from_slice(&txin.sequence.to_le_bytes());
        }
        write_compact_size(&mut buf, self.outputs.len() as u64);
        for txout in &self.outputs {
            buf.extend_from_slice(&txout.value.to_le_bytes());
            buf.extend_from_slice(&txout.version.to_le_bytes());
            write_compact_size(&mut buf, txout.pk_script.len() as u64);
            buf.extend_from_slice(&txout.pk_script);
        }
        buf.extend_from_slice(&self.lock_time.to_le_bytes());
        buf.extend_from_slice(&self.expiry.to_le_bytes());
        buf
    }

    pub fn serialized_size(&self) -> usize {
        let mut size = 2 + compact_size_len(self.inputs.len() as u64);
        for txin in &self.inputs {
            size += HASH_SIZE
                + 4
                + 1
                + compact_size_len(txin.signature_script.len() as u64)
                + txin.signature_script.len()
                + 4;
        }
        size += compact_size_len(self.outputs.len() as u64);
        for txout in &self.outputs {
            size += 8 + 2 + compact_size_len(txout.pk_script.len() as u64) + txout.pk_script.len();
        }
        size + 4 + 4
    }

    pub fn hash(&self) -> TxHash {
        TxHash(sha256d(&self.serialize()))
    }
}

impl BlockHeader {
    pub fn serialize(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.version.to_le_bytes());
        buf[4..36].copy_from_slice(self.prev_block.as_bytes());
        buf[36..68].copy_from_slice(&self.merkle_root);
        buf[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[72..76].copy_from_slice(&self.bits.to_le_bytes());
        buf[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        buf[80..84].copy_from_slice(&self.height.to_le_bytes());
        buf
    }
}

impl Block {
    pub fn hash(&self) -> BlockHash {
        BlockHash(sha256d(&self.header.serialize()))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&self.header.serialize());
        write_compact_size(&mut buf, self.transactions.len() as u64);
        for tx in &self.transactions {
            buf.extend_from_slice(&tx.serialize());
        }
        write_compact_size(&mut buf, self.stake_transactions.len() as u64);
        for tx in &self.stake_transactions {
            buf.extend_from_slice(&tx.serialize());
        }
        buf
    }

    /// Returns the byte offset and length of every transaction within the
    /// serialized block, split per tree.  Offsets follow the layout used by
    /// `serialize`: header, regular-tree count and transactions, then the
    /// stake-tree count and transactions.
    pub fn tx_loc(&self) -> (Vec<TxLoc>, Vec<TxLoc>) {
        let mut offset = BLOCK_HEADER_SIZE + compact_size_len(self.transactions.len() as u64);
        let mut tx_locs = Vec::with_capacity(self.transactions.len());
        for tx in &self.transactions {
            let tx_len = tx.serialized_size();
            tx_locs.push(TxLoc { tx_start: offset, tx_len });
            offset += tx_len;
        }

        offset += compact_size_len(self.stake_transactions.len() as u64);
        let mut stake_tx_locs = Vec::with_capacity(self.stake_transactions.len());
        for tx in &self.stake_transactions {
            let tx_len = tx.serialized_size();
            stake_tx_locs.push(TxLoc { tx_start: offset, tx_len });
            offset += tx_len;
        }

        (tx_locs, stake_tx_locs)
    }
}
