//! Key layout for the address index bucket.
//!
//! An address key is 1 type byte followed by the 20-byte hash160; a level
//! key appends the level byte, giving 22 bytes total.  Pay-to-pubkey
//! addresses are stored under their pubkey-hash form, so both spend paths
//! of the same key land on the same index entry.

use crate::chain::address::{Address, HASH160_SIZE};
use crate::error::{IndexError, Result};
use std::fmt;

/// Number of bytes an address key consumes: 1 type byte + 20-byte hash160.
pub const ADDR_KEY_SIZE: usize = 1 + HASH160_SIZE;

/// Number of bytes a level key consumes: the address key + 1 level byte.
pub const LEVEL_KEY_SIZE: usize = ADDR_KEY_SIZE + 1;

// Offset of the level byte within a level key; the sole level
// discriminator, shared by every caller.
const LEVEL_OFFSET: usize = LEVEL_KEY_SIZE - 1;

/// Address type for secp256k1 ECDSA pubkey-hash addresses (raw pubkey
/// addresses fold into this type).
pub const ADDR_KEY_TYPE_PUBKEY_HASH: u8 = 0;

/// Address type for Ed25519 pubkey-hash addresses.
pub const ADDR_KEY_TYPE_PUBKEY_HASH_ED25519: u8 = 1;

/// Address type for secp256k1 Schnorr pubkey-hash addresses.
pub const ADDR_KEY_TYPE_PUBKEY_HASH_SCHNORR: u8 = 2;

/// Address type for pay-to-script-hash addresses.  Kept distinct because a
/// script hash may collide with a pubkey hash.
pub const ADDR_KEY_TYPE_SCRIPT_HASH: u8 = 3;

/// Canonical 21-byte key an address is indexed under.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AddrKey([u8; ADDR_KEY_SIZE]);

impl AddrKey {
    fn new(addr_type: u8, hash: &[u8; HASH160_SIZE]) -> Self {
        let mut key = [0u8; ADDR_KEY_SIZE];
        key[0] = addr_type;
        key[1..].copy_from_slice(hash);
        AddrKey(key)
    }

    pub fn as_bytes(&self) -> &[u8; ADDR_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for AddrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AddrKey({})", hex::encode(self.0))
    }
}

impl fmt::Display for AddrKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Converts a supported address to its index key.  Raw pubkey variants are
/// first projected to their pubkey-hash form.
pub fn addr_to_key(addr: &Address) -> Result<AddrKey> {
    // Convert public key addresses to public key hash variants.
    let projected;
    let addr = match addr.to_pubkey_hash() {
        Some(pkh) => {
            projected = pkh;
            &projected
        }
        None => addr,
    };

    match addr {
        Address::PubKeyHashEcdsa(hash) => Ok(AddrKey::new(ADDR_KEY_TYPE_PUBKEY_HASH, hash)),
        Address::PubKeyHashEd25519(hash) => {
            Ok(AddrKey::new(ADDR_KEY_TYPE_PUBKEY_HASH_ED25519, hash))
        }
        Address::PubKeyHashSchnorr(hash) => {
            Ok(AddrKey::new(ADDR_KEY_TYPE_PUBKEY_HASH_SCHNORR, hash))
        }
        Address::ScriptHash(hash) => Ok(AddrKey::new(ADDR_KEY_TYPE_SCRIPT_HASH, hash)),
        _ => Err(IndexError::UnsupportedAddress),
    }
}

/// Builds the bucket key for one level of an address.
pub fn key_for_level(addr_key: &AddrKey, level: u8) -> [u8; LEVEL_KEY_SIZE] {
    let mut key = [0u8; LEVEL_KEY_SIZE];
    key[..ADDR_KEY_SIZE].copy_from_slice(addr_key.as_bytes());
    key[LEVEL_OFFSET] = level;
    key
}
