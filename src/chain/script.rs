use crate::chain::address::{Address, HASH160_SIZE};

// Script opcodes referenced by the index.  Only the opcodes that appear in
// version-0 standard scripts and stake tags are listed.
pub const OP_RETURN: u8 = 0x6a;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_SSTX: u8 = 0xba;
pub const OP_SSGEN: u8 = 0xbb;
pub const OP_SSRTX: u8 = 0xbc;
pub const OP_SSTXCHANGE: u8 = 0xbd;
pub const OP_CHECKSIGALT: u8 = 0xbe;
pub const OP_TADD: u8 = 0xc1;
pub const OP_TSPEND: u8 = 0xc2;
pub const OP_TGEN: u8 = 0xc3;

pub const OP_DATA_20: u8 = 0x14;
pub const OP_DATA_30: u8 = 0x1e;
pub const OP_DATA_33: u8 = 0x21;
pub const OP_DATA_65: u8 = 0x41;
pub const OP_1: u8 = 0x51;
pub const OP_2: u8 = 0x52;

/// Size of the data push carried by a ticket commitment output: a 20-byte
/// hash, an 8-byte amount (bit 63 flags a script hash) and 2 bytes of fee
/// limits.
const COMMITMENT_PUSH_SIZE: usize = 30;

/// Classification of a version-0 public key script.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ScriptClass {
    NonStandard,
    PubKey,
    PubKeyEd25519,
    PubKeySchnorr,
    PubKeyHash,
    PubKeyHashEd25519,
    PubKeyHashSchnorr,
    ScriptHash,
    StakeSubmission,
    StakeGen,
    StakeRevocation,
    StakeChange,
    TreasuryAdd,
    TreasuryGen,
    NullData,
}

// Alternative signature suites selected by the small-int push that
// precedes OP_CHECKSIGALT.
fn alt_sig_suite(opcode: u8) -> Option<AltSuite> {
    match opcode {
        OP_1 => Some(AltSuite::Ed25519),
        OP_2 => Some(AltSuite::Schnorr),
        _ => None,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum AltSuite {
    Ed25519,
    Schnorr,
}

fn hash160_at(script: &[u8], offset: usize) -> [u8; HASH160_SIZE] {
    let mut hash = [0u8; HASH160_SIZE];
    hash.copy_from_slice(&script[offset..offset + HASH160_SIZE]);
    hash
}

/// Strips the stake tag opcode off a tagged output script, returning the
/// tag class and the remaining payment script.  Tagged outputs wrap a
/// plain pubkey-hash or script-hash payment.
fn strip_stake_tag(script: &[u8], treasury_enabled: bool) -> Option<(ScriptClass, &[u8])> {
    let (&tag, rest) = script.split_first()?;
    let class = match tag {
        OP_SSTX => ScriptClass::StakeSubmission,
        OP_SSGEN => ScriptClass::StakeGen,
        OP_SSRTX => ScriptClass::StakeRevocation,
        OP_SSTXCHANGE => ScriptClass::StakeChange,
        OP_TGEN if treasury_enabled => ScriptClass::TreasuryGen,
        _ => return None,
    };
    Some((class, rest))
}

fn extract_untagged(script: &[u8]) -> (ScriptClass, Vec<Address>) {
    // Provably unspendable data carrier.  Checked first so null-data
    // payloads never collide with the payment patterns below.
    if !script.is_empty() && script[0] == OP_RETURN {
        return (ScriptClass::NullData, Vec::new());
    }

    // Pay-to-pubkey-hash:
    //   OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY OP_CHECKSIG
    if script.len() == 25
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_DATA_20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
    {
        let addr = Address::PubKeyHashEcdsa(hash160_at(script, 3));
        return (ScriptClass::PubKeyHash, vec![addr]);
    }

    // Pay-to-pubkey-hash for an alternative signature suite:
    //   OP_DUP OP_HASH160 <20-byte hash> OP_EQUALVERIFY <suite> OP_CHECKSIGALT
    if script.len() == 26
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_DATA_20
        && script[23] == OP_EQUALVERIFY
        && script[25] == OP_CHECKSIGALT
    {
        if let Some(suite) = alt_sig_suite(script[24]) {
            let hash = hash160_at(script, 3);
            return match suite {
                AltSuite::Ed25519 => {
                    (ScriptClass::PubKeyHashEd25519, vec![Address::PubKeyHashEd25519(hash)])
                }
                AltSuite::Schnorr => {
                    (ScriptClass::PubKeyHashSchnorr, vec![Address::PubKeyHashSchnorr(hash)])
                }
            };
        }
        return (ScriptClass::NonStandard, Vec::new());
    }

    // Pay-to-script-hash:  OP_HASH160 <20-byte hash> OP_EQUAL
    if script.len() == 23
        && script[0] == OP_HASH160
        && script[1] == OP_DATA_20
        && script[22] == OP_EQUAL
    {
        let addr = Address::ScriptHash(hash160_at(script, 2));
        return (ScriptClass::ScriptHash, vec![addr]);
    }

    // Pay-to-pubkey:  <33- or 65-byte pubkey> OP_CHECKSIG
    if (script.len() == 35 && script[0] == OP_DATA_33 || script.len() == 67 && script[0] == OP_DATA_65)
        && script[script.len() - 1] == OP_CHECKSIG
    {
        let key = script[1..script.len() - 1].to_vec();
        return (ScriptClass::PubKey, vec![Address::PubKeyEcdsa(key)]);
    }

    // Pay-to-pubkey for an alternative signature suite:
    //   <pubkey> <suite> OP_CHECKSIGALT
    if script.len() > 3 && script[script.len() - 1] == OP_CHECKSIGALT {
        if let Some(suite) = alt_sig_suite(script[script.len() - 2]) {
            let push_len = script[0] as usize;
            if push_len + 3 == script.len() {
                let key = script[1..1 + push_len].to_vec();
                return match suite {
                    AltSuite::Ed25519 => {
                        (ScriptClass::PubKeyEd25519, vec![Address::PubKeyEd25519(key)])
                    }
                    AltSuite::Schnorr => {
                        (ScriptClass::PubKeySchnorr, vec![Address::PubKeySchnorr(key)])
                    }
                };
            }
        }
        return (ScriptClass::NonStandard, Vec::new());
    }

    // Treasury add outputs carry no address.
    if script.len() == 1 && script[0] == OP_TADD {
        return (ScriptClass::TreasuryAdd, Vec::new());
    }

    (ScriptClass::NonStandard, Vec::new())
}

/// Classifies a public key script and extracts the addresses it pays to.
/// Non-standard scripts and unknown script versions yield no addresses.
pub fn extract_script_addrs(
    script_version: u16,
    pk_script: &[u8],
    treasury_enabled: bool,
) -> (ScriptClass, Vec<Address>) {
    // Only version 0 scripts are standard.
    if script_version != 0 {
        return (ScriptClass::NonStandard, Vec::new());
    }

    if let Some((tag_class, payment)) = strip_stake_tag(pk_script, treasury_enabled) {
        let (inner_class, addrs) = extract_untagged(payment);
        // A stake tag must wrap a plain payment script.
        return match inner_class {
            ScriptClass::PubKeyHash | ScriptClass::ScriptHash => (tag_class, addrs),
            _ => (ScriptClass::NonStandard, Vec::new()),
        };
    }

    extract_untagged(pk_script)
}

/// Decodes the address committed to by a ticket commitment output.  The
/// commitment is a null-data script pushing 30 bytes: the 20-byte hash,
/// an 8-byte little-endian amount whose top bit selects a script-hash
/// destination, and 2 bytes of fee limits.
pub fn commitment_addr_from_ticket_output(pk_script: &[u8]) -> Option<Address> {
    if pk_script.len() != 2 + COMMITMENT_PUSH_SIZE
        || pk_script[0] != OP_RETURN
        || pk_script[1] != OP_DATA_30
    {
        return None;
    }

    let hash = hash160_at(pk_script, 2);
    let mut amount_bytes = [0u8; 8];
    amount_bytes.copy_from_slice(&pk_script[2 + HASH160_SIZE..2 + HASH160_SIZE + 8]);
    let amount = u64::from_le_bytes(amount_bytes);

    const P2SH_FLAG: u64 = 1 << 63;
    if amount & P2SH_FLAG != 0 {
        Some(Address::ScriptHash(hash))
    } else {
        Some(Address::PubKeyHashEcdsa(hash))
    }
}
