use std::fmt;
use std::ops::Deref;

use crate::hash::{Hash, HashError, hash_map_entries};
use crate::value::Value;

/// The id of an ingress request: the representation-independent hash of its
/// content map.
///
/// Structurally this is 32 bytes, but it is deliberately a distinct type so
/// that an arbitrary byte string cannot be passed where a request id is
/// expected.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId([u8; 32]);

impl RequestId {
    /// Wraps an already-computed content hash.
    pub const fn new(hash: Hash) -> Self {
        RequestId(hash)
    }

    /// The id as a byte slice.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for RequestId {
    type Target = [u8; 32];

    fn deref(&self) -> &[u8; 32] {
        &self.0
    }
}

impl AsRef<[u8]> for RequestId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<RequestId> for [u8; 32] {
    fn from(id: RequestId) -> Self {
        id.0
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId(")?;
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Derives the request id of a request from its content map.
///
/// Entries with [`Value::Absent`] values are dropped, so an unset optional
/// field (e.g. a nonce) does not change the id.
pub fn request_id(content: &[(String, Value)]) -> Result<RequestId, HashError> {
    hash_map_entries(content).map(RequestId)
}
