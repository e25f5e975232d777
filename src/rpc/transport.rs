//! The seam between outbound calls and the network.

use std::fmt::Debug;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::common::Command;

/// What the network reported back for a single request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The peer answered with these response frames.
    Response(Vec<Bytes>),
    /// The peer answered with a protocol error message.
    Rejected { code: i32, description: String },
    /// No answer before the request timeout, or the request could not be sent.
    NoResponse,
}

/// Invoked exactly once per [Transport::send], on the transport's thread.
pub type Completion = Box<dyn FnOnce(TransportOutcome) + Send>;

/// Message transport that delivers requests to peers.
pub trait Transport: Debug + Send + Sync {
    /// Send `command` with `args` to `address`, and invoke `completion`
    /// with the outcome once known.
    fn send(&self, address: SocketAddr, command: Command, args: Vec<Bytes>, completion: Completion);
}
