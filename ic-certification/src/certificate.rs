use std::time::{Duration, SystemTime, UNIX_EPOCH};

use candid::Principal;
use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

use crate::bls::{self, BlsVerifier};
use crate::error::CertificationError;
use crate::lookup::{
    LabelLookupResult, LookupResult, SubtreeLookupResult, find_label, lookup_path, lookup_subtree,
};
use crate::tree::{Hash, HashTree};

/// DER envelope of a BLS12-381 G2 public key: a SEQUENCE carrying the
/// algorithm OID and a BIT STRING tag, followed by the raw 96-byte key.
pub const DER_PREFIX: &[u8; 37] = b"\x30\x81\x82\x30\x1d\x06\x0d\x2b\x06\x01\x04\x01\x82\xdc\x7c\x05\x03\x01\x02\x01\x06\x0c\x2b\x06\x01\x04\x01\x82\xdc\x7c\x05\x03\x02\x01\x03\x61\x00";

/// The root public key of the IC mainnet, DER-wrapped.
pub const IC_ROOT_KEY_DER: &[u8; 133] = b"\x30\x81\x82\x30\x1d\x06\x0d\x2b\x06\x01\x04\x01\x82\xdc\x7c\x05\x03\x01\x02\x01\x06\x0c\x2b\x06\x01\x04\x01\x82\xdc\x7c\x05\x03\x02\x01\x03\x61\x00\x81\x4c\x0e\x6e\xc7\x1f\xab\x58\x3b\x08\xbd\x81\x37\x3c\x25\x5c\x3c\x37\x1b\x2e\x84\x86\x3c\x98\xa4\xf1\xe0\x8b\x74\x23\x5d\x14\xfb\x5d\x9c\x0c\xd5\x46\xd9\x68\x5f\x91\x3a\x0c\x0b\x2c\xc5\x34\x15\x83\xbf\x4b\x43\x92\xe4\x67\xdb\x96\xd6\x5b\x9b\xb4\xcb\x71\x71\x12\xf8\x47\x2e\x0d\x5a\x4d\x14\x50\x5f\xfd\x74\x84\xb0\x12\x91\x09\x1c\x5f\x87\xb9\x88\x83\x46\x3f\x98\x09\x1a\x0b\xaa\xae";

const DER_KEY_LENGTH: usize = 133;
const RAW_KEY_LENGTH: usize = 96;

/// How far ahead of the local clock a certificate time may claim to be.
const MAX_CLOCK_SKEW: Duration = Duration::from_secs(5 * 60);

/// Default freshness window for certificate verification.
const DEFAULT_MAX_AGE: Duration = Duration::from_secs(5 * 60);

/// Decoded wire form of a certificate, prior to any verification.
///
/// This type can be freely constructed and re-encoded (fixtures, tooling),
/// but carries no verification capability: lookups live on [`Certificate`],
/// which can only be obtained through [`Certificate::verify`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateData {
    /// The certified state tree.
    pub tree: HashTree,
    /// BLS signature over the domain-separated root hash of `tree`.
    pub signature: ByteBuf,
    /// Delegation from the root key to the signing subnet, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegation: Option<Delegation>,
}

/// A signed attestation that a subnet key speaks for a range of canisters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delegation {
    /// The subnet the signing authority is delegated to.
    pub subnet_id: ByteBuf,
    /// A full certificate, in wire form, attesting to the subnet's key.
    pub certificate: ByteBuf,
}

impl CertificateData {
    /// Decodes a certificate from its CBOR wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, CertificationError> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

/// Inputs to certificate verification.
///
/// Defaults: five-minute freshness window, time verification enabled, and
/// the built-in [`verify_bls_signature`](crate::verify_bls_signature)
/// backend.
#[derive(Debug, Clone, Copy)]
pub struct VerifyParams<'a> {
    certificate: &'a [u8],
    root_key: &'a [u8],
    canister_id: Principal,
    max_age: Option<Duration>,
    disable_time_check: bool,
    bls_verifier: BlsVerifier,
}

impl<'a> VerifyParams<'a> {
    /// Parameters for verifying `certificate` against a pinned DER-wrapped
    /// `root_key`, on behalf of a read concerning `canister_id`.
    pub fn new(certificate: &'a [u8], root_key: &'a [u8], canister_id: Principal) -> Self {
        Self {
            certificate,
            root_key,
            canister_id,
            max_age: Some(DEFAULT_MAX_AGE),
            disable_time_check: false,
            bls_verifier: bls::verify_bls_signature,
        }
    }

    /// Sets the maximum accepted certificate age.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Accepts arbitrarily old certificates. The upper clock-skew bound
    /// still applies.
    pub fn with_unbounded_age(mut self) -> Self {
        self.max_age = None;
        self
    }

    /// Skips time verification entirely.
    pub fn without_time_check(mut self) -> Self {
        self.disable_time_check = true;
        self
    }

    /// Replaces the BLS backend. Meant for tests and for callers that
    /// bring their own pairing implementation.
    pub fn with_bls_verifier(mut self, bls_verifier: BlsVerifier) -> Self {
        self.bls_verifier = bls_verifier;
        self
    }
}

/// A certificate whose signature, freshness and (if present) delegation
/// have been verified.
///
/// Holding a value of this type is proof that verification succeeded; the
/// only public constructor is [`Certificate::verify`]. The certificate is
/// immutable afterwards and supports only lookups.
#[derive(Debug, Clone)]
pub struct Certificate {
    tree: HashTree,
    root_hash: Hash,
}

impl Certificate {
    /// Decodes and fully verifies a certificate.
    ///
    /// The pipeline, in order: reconstruct the root hash, resolve the
    /// signing key (through the delegation if present), unwrap its DER
    /// envelope, check freshness, and verify the BLS signature over the
    /// domain-separated root hash.
    pub fn verify(params: VerifyParams<'_>) -> Result<Self, CertificationError> {
        tracing::debug!(canister = %params.canister_id, "verifying certificate");
        let data = CertificateData::decode(params.certificate)?;
        Self::verify_data(data, &params, params.max_age, false)
    }

    fn verify_data(
        data: CertificateData,
        params: &VerifyParams<'_>,
        max_age: Option<Duration>,
        is_delegation: bool,
    ) -> Result<Self, CertificationError> {
        let root_hash = data.tree.reconstruct();

        let der_key = match &data.delegation {
            None => params.root_key.to_vec(),
            Some(delegation) => {
                if is_delegation {
                    return Err(CertificationError::NestedDelegation);
                }
                Self::verify_delegation(delegation, params)?
            }
        };
        let public_key = extract_der(&der_key)?;

        if !params.disable_time_check {
            let time_path: [&[u8]; 1] = [b"time"];
            let certificate_time_ns = match lookup_path(&time_path, &data.tree) {
                LookupResult::Found(bytes) => decode_time(bytes)?,
                LookupResult::NoValue => {
                    return Err(CertificationError::MalformedTree {
                        reason: "time is not a leaf".to_string(),
                    });
                }
                LookupResult::Absent | LookupResult::Unknown => {
                    return Err(CertificationError::MissingTime);
                }
            };
            check_time(certificate_time_ns, now_nanos(), max_age)?;
        }

        let message = signed_message(&root_hash);
        if !(params.bls_verifier)(&public_key, &data.signature, &message) {
            tracing::warn!(canister = %params.canister_id, "certificate signature does not verify");
            return Err(CertificationError::SignatureInvalid);
        }

        Ok(Certificate {
            tree: data.tree,
            root_hash,
        })
    }

    /// Verifies the delegation's inner certificate and extracts the
    /// DER-wrapped subnet key it attests to.
    fn verify_delegation(
        delegation: &Delegation,
        params: &VerifyParams<'_>,
    ) -> Result<Vec<u8>, CertificationError> {
        tracing::debug!(
            subnet = %hex::encode(&delegation.subnet_id),
            "verifying delegation certificate"
        );
        let inner = CertificateData::decode(&delegation.certificate)?;
        // Delegations outlive the five-minute window of the certificates
        // signed under them, so no lower freshness bound here.
        let inner = Self::verify_data(inner, params, None, true)?;

        if params.canister_id != Principal::management_canister()
            && !check_canister_ranges(&params.canister_id, &delegation.subnet_id, inner.tree())?
        {
            return Err(CertificationError::CanisterOutOfRange {
                canister_id: params.canister_id,
                subnet_id: delegation.subnet_id.to_vec(),
            });
        }

        let key_path: [&[u8]; 3] = [b"subnet", &delegation.subnet_id, b"public_key"];
        match lookup_path(&key_path, inner.tree()) {
            LookupResult::Found(der_key) => Ok(der_key.to_vec()),
            LookupResult::NoValue => Err(CertificationError::MalformedTree {
                reason: "subnet public_key is not a leaf".to_string(),
            }),
            LookupResult::Absent | LookupResult::Unknown => {
                Err(CertificationError::MissingSubnetKey {
                    subnet_id: delegation.subnet_id.to_vec(),
                })
            }
        }
    }

    /// The verified state tree.
    pub fn tree(&self) -> &HashTree {
        &self.tree
    }

    /// The reconstructed root hash the signature was verified over.
    pub fn root_hash(&self) -> Hash {
        self.root_hash
    }

    /// Resolves a path to a leaf value in the verified tree.
    pub fn lookup(&self, path: &[impl AsRef<[u8]>]) -> LookupResult<'_> {
        lookup_path(path, &self.tree)
    }

    /// Resolves a path to a subtree of the verified tree.
    pub fn lookup_subtree(&self, path: &[impl AsRef<[u8]>]) -> SubtreeLookupResult<'_> {
        lookup_subtree(path, &self.tree)
    }

    /// Searches the verified tree's top level for a label.
    pub fn lookup_label(&self, label: &[u8]) -> LabelLookupResult<'_> {
        find_label(label, &self.tree)
    }
}

/// Strips the DER envelope off a BLS12-381 G2 public key.
///
/// The envelope is the fixed 37-byte prefix in [`DER_PREFIX`]; anything
/// other than that prefix followed by exactly 96 key bytes is rejected.
pub fn extract_der(der_key: &[u8]) -> Result<[u8; RAW_KEY_LENGTH], CertificationError> {
    if der_key.len() != DER_KEY_LENGTH || !der_key.starts_with(DER_PREFIX) {
        return Err(CertificationError::MalformedDer {
            length: der_key.len(),
        });
    }
    let mut key = [0u8; RAW_KEY_LENGTH];
    key.copy_from_slice(&der_key[DER_PREFIX.len()..]);
    Ok(key)
}

/// Decodes a `time` leaf: a LEB128 nanosecond timestamp.
pub fn decode_time(mut bytes: &[u8]) -> Result<u64, CertificationError> {
    leb128::read::unsigned(&mut bytes).map_err(|e| CertificationError::MalformedTime {
        reason: e.to_string(),
    })
}

/// Checks a certificate time against the local clock.
///
/// Bounds are inclusive: a certificate is acceptable from `now - max_age`
/// through `now + 5 minutes` of forward clock skew. `max_age = None`
/// disables the lower bound only.
pub fn check_time(
    certificate_time_ns: u64,
    now_ns: u64,
    max_age: Option<Duration>,
) -> Result<(), CertificationError> {
    if let Some(max_age) = max_age {
        let allowed_after_ns = now_ns.saturating_sub(max_age.as_nanos() as u64);
        if certificate_time_ns < allowed_after_ns {
            return Err(CertificationError::CertificateTooOld {
                certificate_time_ns,
                allowed_after_ns,
            });
        }
    }
    let allowed_before_ns = now_ns.saturating_add(MAX_CLOCK_SKEW.as_nanos() as u64);
    if certificate_time_ns > allowed_before_ns {
        return Err(CertificationError::CertificateTooNew {
            certificate_time_ns,
            allowed_before_ns,
        });
    }
    Ok(())
}

/// Decodes the `canister_ranges` leaf for `subnet_id` in a delegation tree
/// and reports whether `canister_id` falls within any of the ranges.
pub fn check_canister_ranges(
    canister_id: &Principal,
    subnet_id: &[u8],
    tree: &HashTree,
) -> Result<bool, CertificationError> {
    let ranges_path: [&[u8]; 3] = [b"subnet", subnet_id, b"canister_ranges"];
    let leaf = match lookup_path(&ranges_path, tree) {
        LookupResult::Found(bytes) => bytes,
        LookupResult::NoValue => {
            return Err(CertificationError::MalformedTree {
                reason: "canister_ranges is not a leaf".to_string(),
            });
        }
        LookupResult::Absent | LookupResult::Unknown => {
            return Err(CertificationError::MissingCanisterRanges {
                subnet_id: subnet_id.to_vec(),
            });
        }
    };
    let ranges: Vec<(ByteBuf, ByteBuf)> =
        serde_cbor::from_slice(leaf).map_err(|_| CertificationError::MalformedCanisterRanges {
            subnet_id: subnet_id.to_vec(),
        })?;
    // Principal order is unsigned byte-lex with ties broken by length.
    Ok(ranges.iter().any(|(low, high)| {
        low.as_slice() <= canister_id.as_slice() && canister_id.as_slice() <= high.as_slice()
    }))
}

/// The message a state root signature covers: the domain-separated root
/// hash.
fn signed_message(root_hash: &Hash) -> Vec<u8> {
    const TAG: &[u8] = b"ic-state-root";
    let mut message = Vec::with_capacity(1 + TAG.len() + root_hash.len());
    message.push(TAG.len() as u8);
    message.extend_from_slice(TAG);
    message.extend_from_slice(root_hash);
    message
}

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos() as u64)
}
