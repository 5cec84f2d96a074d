//! Certified polling of Internet Computer request statuses.
//!
//! Submitting a call to the IC is fire-and-forget; its outcome is learned
//! by reading the certified `request_status` subtree for the request id
//! until a terminal status (`replied`, `rejected`, or `done`) appears.
//! [`poll_for_response`] drives that loop: each round trips through the
//! injected [`Transport`], is verified as a certificate against the
//! transport's pinned root key, and non-terminal statuses hand control to a
//! [`PollStrategy`] that decides how long to wait before the next read.

#![warn(
    elided_lifetimes_in_paths,
    missing_debug_implementations,
    missing_docs,
    unsafe_op_in_unsafe_fn,
    clippy::undocumented_unsafe_blocks,
    clippy::missing_safety_doc
)]

mod poll;
mod strategy;
mod transport;

pub use poll::{PollError, PollResult, RequestStatus, poll_for_response};
pub use strategy::{ExponentialBackoff, PollStrategy, RetryLimitExceeded};
pub use transport::{BoxError, ReadStateResponse, SignedReadState, Transport};
