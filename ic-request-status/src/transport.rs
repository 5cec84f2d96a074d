use async_trait::async_trait;
use candid::Principal;

/// Boxed error carried across the transport and strategy seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A pre-signed `read_state` envelope.
///
/// Signing happens once; the poller resubmits the same envelope on every
/// retry so a slow call does not outrun the signature's expiry handling in
/// the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedReadState {
    /// The serialized, signed request, ready for submission.
    pub envelope: Vec<u8>,
}

/// The certified response to a `read_state` request.
#[derive(Debug, Clone)]
pub struct ReadStateResponse {
    /// The raw CBOR-encoded certificate.
    pub certificate: Vec<u8>,
}

/// The seam to a replica or boundary node.
///
/// Implementations own HTTP, identity and request signing; the poller only
/// needs the pinned root key and the two read-state operations. Paths are
/// lists of byte-string labels, exactly as they appear in the certified
/// state tree.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The DER-wrapped BLS root public key this transport pins.
    fn root_key(&self) -> &[u8];

    /// Creates and signs a `read_state` request for the given paths.
    async fn create_read_state_request(
        &self,
        paths: &[Vec<Vec<u8>>],
    ) -> Result<SignedReadState, BoxError>;

    /// Submits a pre-signed `read_state` request.
    async fn read_state(
        &self,
        effective_canister_id: Principal,
        request: &SignedReadState,
    ) -> Result<ReadStateResponse, BoxError>;
}
