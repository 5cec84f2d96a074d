use std::fmt;

use candid::Principal;
use ic_certification::{BlsVerifier, Certificate, CertificationError, LookupResult, VerifyParams};
use ic_rep_hash::RequestId;

use crate::strategy::PollStrategy;
use crate::transport::{BoxError, SignedReadState, Transport};

/// Status of an in-flight request, as certified by its subnet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// The request was received but not yet scheduled.
    Received,
    /// The request is being executed.
    Processing,
    /// The request finished with a reply. Terminal.
    Replied,
    /// The request was rejected. Terminal.
    Rejected,
    /// The request finished, but its reply has been evicted. Terminal.
    Done,
    /// The state tree does not (yet) prove any status.
    Unknown,
}

impl RequestStatus {
    /// Parses the wire form found in the `status` leaf.
    pub fn parse(status: &str) -> Option<Self> {
        match status {
            "received" => Some(Self::Received),
            "processing" => Some(Self::Processing),
            "replied" => Some(Self::Replied),
            "rejected" => Some(Self::Rejected),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Replied => "replied",
            Self::Rejected => "rejected",
            Self::Done => "done",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// A finalized call: the certificate that proved the terminal status, and
/// the reply it carried.
#[derive(Debug)]
pub struct PollResult {
    /// The verified certificate containing the terminal status.
    pub certificate: Certificate,
    /// The reply blob, when the certificate carried one.
    pub reply: Option<Vec<u8>>,
}

/// The error type for request-status polling.
#[derive(thiserror::Error, Debug)]
pub enum PollError {
    /// A response failed certificate verification.
    #[error(transparent)]
    Certification(#[from] CertificationError),

    /// The canister or the system rejected the call.
    #[error("call rejected: code {code}, {message:?}")]
    CallRejected {
        /// The reject code.
        code: u8,
        /// The reject message.
        message: String,
    },

    /// The request reached `done` before its reply was observed.
    #[error("request {request_id} is done; its reply was evicted before it could be read")]
    DoneWithoutReply {
        /// The request that finished without an observable reply.
        request_id: RequestId,
    },

    /// The transport failed to create or submit a request.
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),

    /// The poll strategy gave up or was cancelled.
    #[error("poll strategy aborted: {0}")]
    Strategy(#[source] BoxError),

    /// The certified status subtree has an unexpected shape.
    #[error("malformed request status: {reason}")]
    MalformedStatus {
        /// What was found instead of the expected shape.
        reason: String,
    },
}

/// Polls the certified status of `request_id` until it is terminal.
///
/// Each round submits a `read_state` for `['request_status', request_id]`,
/// verifies the response against the transport's pinned root key, and
/// dispatches on the certified status: `replied` returns the certificate
/// and reply, `rejected` and `done` fail with their typed errors, and
/// everything else awaits `strategy` before the next round.
///
/// A caller that already holds a pre-signed read-state envelope passes it
/// as `request`; it is reused across every retry. `bls_verifier` overrides
/// the signature backend for all certificates seen during the poll.
pub async fn poll_for_response<T>(
    transport: &T,
    canister_id: Principal,
    request_id: RequestId,
    strategy: &mut dyn PollStrategy,
    request: Option<SignedReadState>,
    bls_verifier: Option<BlsVerifier>,
) -> Result<PollResult, PollError>
where
    T: Transport + ?Sized,
{
    let status_path: Vec<Vec<u8>> = vec![b"request_status".to_vec(), request_id.to_vec()];
    let request = match request {
        Some(request) => request,
        None => transport
            .create_read_state_request(std::slice::from_ref(&status_path))
            .await
            .map_err(PollError::Transport)?,
    };

    loop {
        let response = transport
            .read_state(canister_id, &request)
            .await
            .map_err(PollError::Transport)?;

        let mut params = VerifyParams::new(&response.certificate, transport.root_key(), canister_id);
        if let Some(bls_verifier) = bls_verifier {
            params = params.with_bls_verifier(bls_verifier);
        }
        let certificate = Certificate::verify(params)?;

        let status = read_status(&certificate, &status_path)?;
        tracing::debug!(%request_id, %status, "polled request status");

        match status {
            RequestStatus::Replied => {
                let reply = match certificate.lookup(&path_with(&status_path, b"reply")) {
                    LookupResult::Found(bytes) => Some(bytes.to_vec()),
                    _ => None,
                };
                return Ok(PollResult { certificate, reply });
            }
            RequestStatus::Received | RequestStatus::Processing | RequestStatus::Unknown => {
                strategy
                    .wait(canister_id, &request_id, &status)
                    .await
                    .map_err(PollError::Strategy)?;
            }
            RequestStatus::Rejected => return Err(read_rejection(&certificate, &status_path)),
            RequestStatus::Done => return Err(PollError::DoneWithoutReply { request_id }),
        }
    }
}

fn read_status(
    certificate: &Certificate,
    status_path: &[Vec<u8>],
) -> Result<RequestStatus, PollError> {
    match certificate.lookup(&path_with(status_path, b"status")) {
        LookupResult::Found(bytes) => {
            let status =
                std::str::from_utf8(bytes).map_err(|e| PollError::MalformedStatus {
                    reason: format!("status is not UTF-8: {e}"),
                })?;
            RequestStatus::parse(status).ok_or_else(|| PollError::MalformedStatus {
                reason: format!("unrecognized status {status:?}"),
            })
        }
        // The subnet has not recorded the request (yet), or the branch was
        // pruned away; both poll again.
        LookupResult::Absent | LookupResult::Unknown => Ok(RequestStatus::Unknown),
        LookupResult::NoValue => Err(PollError::MalformedStatus {
            reason: "status is not a leaf".to_string(),
        }),
    }
}

fn read_rejection(certificate: &Certificate, status_path: &[Vec<u8>]) -> PollError {
    let code = match certificate.lookup(&path_with(status_path, b"reject_code")) {
        LookupResult::Found([code, ..]) => *code,
        _ => {
            return PollError::MalformedStatus {
                reason: "rejected without a reject_code leaf".to_string(),
            };
        }
    };
    let message = match certificate.lookup(&path_with(status_path, b"reject_message")) {
        LookupResult::Found(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        _ => String::new(),
    };
    PollError::CallRejected { code, message }
}

fn path_with(prefix: &[Vec<u8>], label: &[u8]) -> Vec<Vec<u8>> {
    let mut path = prefix.to_vec();
    path.push(label.to_vec());
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ReadStateResponse;
    use async_trait::async_trait;
    use ic_certification::{DER_PREFIX, HashTree, fork, labeled, leaf};
    use serde_bytes::ByteBuf;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn ok_bls(_public_key: &[u8], _signature: &[u8], _message: &[u8]) -> bool {
        true
    }

    fn request_id() -> RequestId {
        RequestId::new([0x42; 32])
    }

    fn canister() -> Principal {
        Principal::from_slice(&[0, 0, 0, 0, 0, 0, 4, 0xd2])
    }

    fn time_leaf() -> HashTree {
        let now_ns = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64;
        let mut buf = Vec::new();
        leb128::write::unsigned(&mut buf, now_ns).unwrap();
        leaf(buf)
    }

    /// A certificate whose `request_status/<rid>` subtree holds the given
    /// entries, which must already be sorted by label.
    fn certificate_with(entries: &[(&[u8], &[u8])]) -> Vec<u8> {
        let mut status_tree: Option<HashTree> = None;
        for (label, value) in entries.iter().rev() {
            let node = labeled(label.to_vec(), leaf(value.to_vec()));
            status_tree = Some(match status_tree {
                None => node,
                Some(right) => fork(node, right),
            });
        }
        let rid_tree = labeled(
            request_id().to_vec(),
            status_tree.unwrap_or(HashTree::Empty),
        );
        let tree = fork(
            labeled(*b"request_status", rid_tree),
            labeled(*b"time", time_leaf()),
        );
        let data = ic_certification::CertificateData {
            tree,
            signature: ByteBuf::from(vec![1; 48]),
            delegation: None,
        };
        serde_cbor::to_vec(&data).unwrap()
    }

    struct SequenceTransport {
        root_key: Vec<u8>,
        responses: Mutex<VecDeque<Vec<u8>>>,
        requests_created: AtomicUsize,
    }

    impl SequenceTransport {
        fn new(responses: Vec<Vec<u8>>) -> Self {
            Self {
                root_key: [DER_PREFIX.as_slice(), &[0u8; 96]].concat(),
                responses: Mutex::new(responses.into()),
                requests_created: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Transport for SequenceTransport {
        fn root_key(&self) -> &[u8] {
            &self.root_key
        }

        async fn create_read_state_request(
            &self,
            _paths: &[Vec<Vec<u8>>],
        ) -> Result<SignedReadState, BoxError> {
            self.requests_created.fetch_add(1, Ordering::SeqCst);
            Ok(SignedReadState {
                envelope: b"signed-envelope".to_vec(),
            })
        }

        async fn read_state(
            &self,
            _effective_canister_id: Principal,
            _request: &SignedReadState,
        ) -> Result<ReadStateResponse, BoxError> {
            let certificate = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or("transport ran out of responses")?;
            Ok(ReadStateResponse { certificate })
        }
    }

    struct CountingStrategy {
        waits: u32,
    }

    #[async_trait]
    impl PollStrategy for CountingStrategy {
        async fn wait(
            &mut self,
            _canister_id: Principal,
            _request_id: &RequestId,
            _status: &RequestStatus,
        ) -> Result<(), BoxError> {
            self.waits += 1;
            Ok(())
        }
    }

    #[tokio::test]
    async fn replied_after_two_processing_rounds() {
        let transport = SequenceTransport::new(vec![
            certificate_with(&[(b"status", b"processing")]),
            certificate_with(&[(b"status", b"processing")]),
            certificate_with(&[(b"reply", &[0xaa, 0xbb]), (b"status", b"replied")]),
        ]);
        let mut strategy = CountingStrategy { waits: 0 };

        let result = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            None,
            Some(ok_bls),
        )
        .await
        .unwrap();

        assert_eq!(result.reply.as_deref(), Some([0xaa, 0xbb].as_slice()));
        assert_eq!(strategy.waits, 2);
        assert_eq!(transport.requests_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_status_polls_again() {
        let transport = SequenceTransport::new(vec![
            certificate_with(&[]),
            certificate_with(&[(b"reply", &[0x01]), (b"status", b"replied")]),
        ]);
        let mut strategy = CountingStrategy { waits: 0 };

        let result = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            None,
            Some(ok_bls),
        )
        .await
        .unwrap();

        assert_eq!(result.reply.as_deref(), Some([0x01].as_slice()));
        assert_eq!(strategy.waits, 1);
    }

    #[tokio::test]
    async fn rejection_carries_code_and_message() {
        let transport = SequenceTransport::new(vec![certificate_with(&[
            (b"reject_code", &[4]),
            (b"reject_message", b"canister not found"),
            (b"status", b"rejected"),
        ])]);
        let mut strategy = CountingStrategy { waits: 0 };

        let err = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            None,
            Some(ok_bls),
        )
        .await
        .unwrap_err();

        match err {
            PollError::CallRejected { code, message } => {
                assert_eq!(code, 4);
                assert_eq!(message, "canister not found");
            }
            other => panic!("expected CallRejected, got {other:?}"),
        }
        assert_eq!(strategy.waits, 0);
    }

    #[tokio::test]
    async fn done_without_reply_is_an_error() {
        let transport =
            SequenceTransport::new(vec![certificate_with(&[(b"status", b"done")])]);
        let mut strategy = CountingStrategy { waits: 0 };

        let err = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            None,
            Some(ok_bls),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PollError::DoneWithoutReply { request_id: rid } if rid == request_id()
        ));
    }

    #[tokio::test]
    async fn a_pre_signed_request_is_reused() {
        let transport = SequenceTransport::new(vec![certificate_with(&[(
            b"status",
            b"replied",
        )])]);
        let mut strategy = CountingStrategy { waits: 0 };

        poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            Some(SignedReadState {
                envelope: b"caller-signed".to_vec(),
            }),
            Some(ok_bls),
        )
        .await
        .unwrap();

        assert_eq!(transport.requests_created.load(Ordering::SeqCst), 0);
    }

    struct FailingStrategy;

    #[async_trait]
    impl PollStrategy for FailingStrategy {
        async fn wait(
            &mut self,
            _canister_id: Principal,
            _request_id: &RequestId,
            _status: &RequestStatus,
        ) -> Result<(), BoxError> {
            Err("deadline exceeded".into())
        }
    }

    #[tokio::test]
    async fn a_failing_strategy_terminates_the_poll() {
        let transport = SequenceTransport::new(vec![certificate_with(&[(
            b"status",
            b"processing",
        )])]);

        let err = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut FailingStrategy,
            None,
            Some(ok_bls),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PollError::Strategy(_)));
    }

    #[tokio::test]
    async fn an_unverifiable_certificate_fails_the_poll() {
        let transport =
            SequenceTransport::new(vec![certificate_with(&[(b"status", b"processing")])]);
        let mut strategy = CountingStrategy { waits: 0 };

        // No BLS override: the all-ones signature cannot verify.
        let err = poll_for_response(
            &transport,
            canister(),
            request_id(),
            &mut strategy,
            None,
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            PollError::Certification(CertificationError::SignatureInvalid)
        ));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in [
            RequestStatus::Received,
            RequestStatus::Processing,
            RequestStatus::Replied,
            RequestStatus::Rejected,
            RequestStatus::Done,
        ] {
            assert_eq!(RequestStatus::parse(&status.to_string()), Some(status));
        }
        assert_eq!(RequestStatus::parse("unknown"), None);
        assert_eq!(RequestStatus::parse(""), None);
    }
}
