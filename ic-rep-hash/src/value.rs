use candid::{Nat, Principal};

/// A value in the representation-independent hashing universe.
///
/// The universe is tree-shaped by construction: every variant owns its
/// children, so a value can neither alias nor cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// An explicitly unset entry. Legal only as a map entry value, where it
    /// is dropped before hashing; in any other position hashing fails.
    Absent,
    /// UTF-8 text, hashed as its encoded bytes.
    Text(String),
    /// An unsigned integer, hashed as its minimal LEB128 encoding.
    Nat(u64),
    /// An arbitrary-precision unsigned integer; takes the same LEB128 path
    /// as [`Value::Nat`].
    BigNat(Nat),
    /// A raw byte string.
    Bytes(Vec<u8>),
    /// An ordered, heterogeneous sequence of values.
    Array(Vec<Value>),
    /// A finite mapping from text keys to values. Entry order is
    /// irrelevant to the hash.
    Map(Vec<(String, Value)>),
    /// A principal, hashed as its canonical byte form.
    Principal(Principal),
    /// A tagged wrapper. Hashing unwraps the inner value; the tag carries
    /// no hash weight.
    Tagged(String, Box<Value>),
}

impl Value {
    /// Shorthand for building a text value.
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Shorthand for building a byte-string value.
    pub fn bytes(b: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(b.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Nat(n)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<Principal> for Value {
    fn from(p: Principal) -> Self {
        Value::Principal(p)
    }
}

/// Implemented by types whose canonical hashable form differs from their
/// in-memory representation, e.g. an expiry carried as an instant but
/// hashed as a nanosecond count.
///
/// The hashing engine re-enters itself on the projection, so a projection
/// may produce any [`Value`], including nested maps.
pub trait AsHashableValue {
    /// Returns the value this type hashes as.
    fn as_hashable(&self) -> Value;
}

impl AsHashableValue for Value {
    fn as_hashable(&self) -> Value {
        self.clone()
    }
}
