//! Certified state reads from the Internet Computer.
//!
//! The IC proves the authenticity of state reads with a
//! [certificate](https://internetcomputer.org/docs/current/references/ic-interface-spec#certification):
//! a pruned hash tree over the replicated state, a BLS signature over the
//! tree's root hash, and optionally a delegation transferring signing
//! authority from the root key to a subnet key for a bounded range of
//! canister ids.
//!
//! [`HashTree`] models the tree and recomputes its root hash,
//! [`lookup_path`] resolves labeled paths under pruning with a tri-valued
//! answer, and [`Certificate::verify`] runs the full verification pipeline.
//! A [`Certificate`] value exists only after verification has succeeded.

#![warn(
    elided_lifetimes_in_paths,
    missing_debug_implementations,
    missing_docs,
    unsafe_op_in_unsafe_fn,
    clippy::undocumented_unsafe_blocks,
    clippy::missing_safety_doc
)]

mod bls;
mod certificate;
mod error;
mod lookup;
mod tree;

pub use bls::{BlsVerifier, verify_bls_signature};
pub use certificate::{
    Certificate, CertificateData, DER_PREFIX, Delegation, IC_ROOT_KEY_DER, VerifyParams,
    check_canister_ranges, check_time, decode_time, extract_der,
};
pub use error::CertificationError;
pub use lookup::{
    LabelLookupResult, LookupResult, SubtreeLookupResult, find_label, lookup_path, lookup_subtree,
};
pub use tree::{
    Hash, HashTree, flatten_forks, fork, fork_hash, labeled, labeled_hash, leaf, leaf_hash, pruned,
};
