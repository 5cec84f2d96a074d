use sha2::{Digest, Sha256};

use crate::value::{AsHashableValue, Value};

/// SHA-256 hash bytes.
pub type Hash = [u8; 32];

/// The error type for representation-independent hashing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The value cannot be hashed in the position it appeared in. The only
    /// inhabitant of this case is [`Value::Absent`] outside a map entry;
    /// the offending value is carried for diagnostics.
    #[error("value cannot be hashed in this position: {value:?}")]
    UnsupportedValue {
        /// The value that could not be hashed.
        value: Value,
    },
}

/// Produces the representation-independent hash of a value.
///
/// Two structurally equal values hash identically: map entry order does not
/// matter, absent entries are dropped, and tagged wrappers hash as their
/// contents.
pub fn hash_value(value: &Value) -> Result<Hash, HashError> {
    match value {
        Value::Absent => Err(HashError::UnsupportedValue {
            value: value.clone(),
        }),
        Value::Tagged(_, inner) => hash_value(inner),
        Value::Text(s) => Ok(sha256(s.as_bytes())),
        Value::Nat(n) => {
            let mut buf = Vec::new();
            leb128::write::unsigned(&mut buf, *n).expect("writing to a Vec cannot fail");
            Ok(sha256(&buf))
        }
        Value::BigNat(n) => Ok(sha256(&leb128_of_le_bytes(&n.0.to_bytes_le()))),
        Value::Bytes(b) => Ok(sha256(b)),
        Value::Array(values) => {
            let mut h = Sha256::new();
            for v in values {
                h.update(hash_value(v)?);
            }
            Ok(h.finalize().into())
        }
        Value::Principal(p) => Ok(sha256(p.as_slice())),
        Value::Map(entries) => hash_map_entries(entries),
    }
}

/// Produces the representation-independent hash of anything that projects
/// into the [`Value`] universe.
pub fn hash_of(value: &impl AsHashableValue) -> Result<Hash, HashError> {
    hash_value(&value.as_hashable())
}

/// Hashes a set of map entries: present entries reduce to sorted
/// `(H(key), H(value))` pairs whose concatenation is hashed.
pub(crate) fn hash_map_entries(entries: &[(String, Value)]) -> Result<Hash, HashError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (key, value) in entries {
        if let Value::Absent = value {
            continue;
        }
        pairs.push((sha256(key.as_bytes()), hash_value(value)?));
    }
    // Sorting the full pair keeps duplicate keys deterministic as well.
    pairs.sort_unstable();
    let mut h = Sha256::new();
    for (key_hash, value_hash) in pairs {
        h.update(key_hash);
        h.update(value_hash);
    }
    Ok(h.finalize().into())
}

fn sha256(data: &[u8]) -> Hash {
    Sha256::digest(data).into()
}

/// Minimal unsigned LEB128 of a little-endian byte string, repacking 8-bit
/// groups into 7-bit groups. Zero encodes as a single `0x00`.
fn leb128_of_le_bytes(le: &[u8]) -> Vec<u8> {
    if le.is_empty() {
        return vec![0];
    }
    let mut len = le.len();
    while len > 1 && le[len - 1] == 0 {
        len -= 1;
    }
    let le = &le[..len];
    let nbits = len * 8;
    let mut out = Vec::with_capacity(nbits / 7 + 1);
    let mut pos = 0;
    while pos < nbits {
        let idx = pos / 8;
        let off = pos % 8;
        let mut group = (le[idx] >> off) as u16;
        // A group needs 7 bits but the current byte only holds 8 - off.
        if off > 1 && idx + 1 < le.len() {
            group |= (le[idx + 1] as u16) << (8 - off);
        }
        out.push((group & 0x7f) as u8);
        pos += 7;
    }
    while out.len() > 1 && *out.last().unwrap() == 0 {
        out.pop();
    }
    let last = out.len() - 1;
    for byte in &mut out[..last] {
        *byte |= 0x80;
    }
    out
}
