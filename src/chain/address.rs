use ripemd::Ripemd160;
use sha2::{Digest, Sha256};

/// Size of the short hash that identifies pubkey-hash and script-hash
/// addresses.
pub const HASH160_SIZE: usize = 20;

/// A decoded address.  Raw public key variants keep the key material so
/// they can be projected onto their pubkey-hash form.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Address {
    PubKeyHashEcdsa([u8; HASH160_SIZE]),
    PubKeyHashEd25519([u8; HASH160_SIZE]),
    PubKeyHashSchnorr([u8; HASH160_SIZE]),
    ScriptHash([u8; HASH160_SIZE]),
    PubKeyEcdsa(Vec<u8>),
    PubKeyEd25519(Vec<u8>),
    PubKeySchnorr(Vec<u8>),
    /// Address kinds the chain layer can represent but the index cannot
    /// classify (future script versions and signature suites).
    Other,
}

impl Address {
    /// Projects a raw public key address onto the matching pubkey-hash
    /// variant.  Returns `None` for addresses that have no pubkey-hash
    /// form (already-hashed variants and script hashes).
    pub fn to_pubkey_hash(&self) -> Option<Address> {
        match self {
            Address::PubKeyEcdsa(key) => Some(Address::PubKeyHashEcdsa(hash160(key))),
            Address::PubKeyEd25519(key) => Some(Address::PubKeyHashEd25519(hash160(key))),
            Address::PubKeySchnorr(key) => Some(Address::PubKeyHashSchnorr(hash160(key))),
            _ => None,
        }
    }
}

/// RIPEMD160(SHA256(data)), the short hash backing pubkey-hash and
/// script-hash addresses.
pub fn hash160(data: &[u8]) -> [u8; HASH160_SIZE] {
    let sha = Sha256::digest(data);
    let ripe = Ripemd160::digest(sha);
    ripe.into()
}
