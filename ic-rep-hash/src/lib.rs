//! Representation-independent hashing of Internet Computer values.
//!
//! The IC addresses ingress messages by the hash of their content map, and
//! reconstructs certified state from hashes of structured values. Both uses
//! require a canonical reduction from structure to bytes: two structurally
//! equal values must hash identically in every implementation, regardless of
//! entry order or in-memory representation.
//!
//! [`Value`] is the closed universe of hashable values, [`hash_value`] the
//! reduction, and [`request_id`] the specialization that derives a
//! [`RequestId`] from a request content map.

#![warn(
    elided_lifetimes_in_paths,
    missing_debug_implementations,
    missing_docs,
    unsafe_op_in_unsafe_fn,
    clippy::undocumented_unsafe_blocks,
    clippy::missing_safety_doc
)]

mod hash;
mod request_id;
mod value;

pub use hash::{Hash, HashError, hash_of, hash_value};
pub use request_id::{RequestId, request_id};
pub use value::{AsHashableValue, Value};
