use candid::Principal;

/// The error type for certificate decoding and verification.
///
/// Variants carry enough context to reconstruct the offending input; none
/// of them is recovered from inside this crate.
#[derive(thiserror::Error, Debug)]
pub enum CertificationError {
    /// The certificate bytes are not valid CBOR for the expected shape.
    #[error("failed to decode certificate: {0}")]
    MalformedCertificate(#[from] serde_cbor::Error),

    /// The decoded tree does not have the shape a lookup requires.
    #[error("malformed hash tree: {reason}")]
    MalformedTree {
        /// What was found instead of the expected shape.
        reason: String,
    },

    /// A BLS public key was not in the expected DER envelope.
    #[error("not a DER-wrapped BLS12-381 G2 key ({length} bytes, expected 133 with the fixed prefix)")]
    MalformedDer {
        /// Length of the rejected key.
        length: usize,
    },

    /// A delegation certificate itself carried a delegation.
    #[error("the delegation certificate carries a further delegation")]
    NestedDelegation,

    /// The delegation's subnet is not authorized to certify for this
    /// canister.
    #[error("canister {canister_id} is not within the ranges of subnet 0x{}", hex::encode(.subnet_id))]
    CanisterOutOfRange {
        /// The canister the outer certificate was requested for.
        canister_id: Principal,
        /// The subnet the delegation names.
        subnet_id: Vec<u8>,
    },

    /// The delegation tree does not contain the subnet's canister ranges.
    #[error("no canister ranges for subnet 0x{}", hex::encode(.subnet_id))]
    MissingCanisterRanges {
        /// The subnet the delegation names.
        subnet_id: Vec<u8>,
    },

    /// The subnet's canister ranges could not be decoded.
    #[error("malformed canister ranges for subnet 0x{}", hex::encode(.subnet_id))]
    MalformedCanisterRanges {
        /// The subnet the delegation names.
        subnet_id: Vec<u8>,
    },

    /// The delegation tree does not contain the subnet's public key.
    #[error("no public key for subnet 0x{}", hex::encode(.subnet_id))]
    MissingSubnetKey {
        /// The subnet the delegation names.
        subnet_id: Vec<u8>,
    },

    /// The certificate has no `time` path.
    #[error("the certificate carries no time")]
    MissingTime,

    /// The certificate's `time` leaf is not a LEB128 timestamp.
    #[error("malformed certificate time: {reason}")]
    MalformedTime {
        /// Why the leaf could not be decoded.
        reason: String,
    },

    /// The certificate is older than the caller's freshness window.
    #[error("certificate time {certificate_time_ns} ns is before the accepted window starting at {allowed_after_ns} ns")]
    CertificateTooOld {
        /// Timestamp carried by the certificate, nanoseconds since the epoch.
        certificate_time_ns: u64,
        /// Oldest accepted timestamp.
        allowed_after_ns: u64,
    },

    /// The certificate claims a time further ahead than clock skew allows.
    #[error("certificate time {certificate_time_ns} ns is after the accepted window ending at {allowed_before_ns} ns")]
    CertificateTooNew {
        /// Timestamp carried by the certificate, nanoseconds since the epoch.
        certificate_time_ns: u64,
        /// Newest accepted timestamp.
        allowed_before_ns: u64,
    },

    /// The BLS signature does not verify against the resolved public key.
    #[error("certificate signature does not verify")]
    SignatureInvalid,
}
