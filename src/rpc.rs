//! Outbound side of the market protocol and the UDP transport.

mod caller;
mod config;
mod liveness;
mod socket;
mod transport;
mod udp;

pub use caller::{Call, CallOutcome, CallState, OutboundCaller};
pub use config::Config;
pub use liveness::RoutingLivenessTracker;
pub use socket::{DEFAULT_PORT, DEFAULT_REQUEST_TIMEOUT};
pub use transport::{Completion, Transport, TransportOutcome};
pub use udp::{TransportWasShutdown, UdpTransport};

#[cfg(test)]
pub(crate) mod mock {
    //! In-process transports.

    use std::fmt::{self, Debug, Formatter};
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};

    use bytes::Bytes;

    use crate::common::{Command, Node};
    use crate::server::Server;

    use super::{Completion, Transport, TransportOutcome};

    #[derive(Debug)]
    /// Dispatches every request synchronously to a [Server].
    pub struct LoopbackTransport {
        server: Arc<dyn Server>,
        requester: Node,
    }

    impl LoopbackTransport {
        pub fn new(server: Arc<dyn Server>, requester: Node) -> Self {
            Self { server, requester }
        }
    }

    impl Transport for LoopbackTransport {
        fn send(&self, _: SocketAddr, command: Command, args: Vec<Bytes>, completion: Completion) {
            let result = self.server.handle_request(&self.requester, command, &args);

            completion(TransportOutcome::Response(result.to_frames()));
        }
    }

    #[derive(Debug)]
    /// Never gets an answer.
    pub struct SilentTransport;

    impl Transport for SilentTransport {
        fn send(&self, _: SocketAddr, _: Command, _: Vec<Bytes>, completion: Completion) {
            completion(TransportOutcome::NoResponse);
        }
    }

    #[derive(Clone, Default)]
    /// Holds completions until the test decides the outcome.
    pub struct ManualTransport {
        pending: Arc<Mutex<Vec<Completion>>>,
    }

    impl Debug for ManualTransport {
        fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
            write!(f, "ManualTransport({})", self.pending.lock().unwrap().len())
        }
    }

    impl ManualTransport {
        /// Complete the oldest pending request.
        pub fn complete(&self, outcome: TransportOutcome) {
            let completion = self.pending.lock().unwrap().remove(0);

            completion(outcome);
        }

        /// Drop every pending completion without invoking it.
        pub fn drop_pending(&self) {
            self.pending.lock().unwrap().clear();
        }
    }

    impl Transport for ManualTransport {
        fn send(&self, _: SocketAddr, _: Command, _: Vec<Bytes>, completion: Completion) {
            self.pending.lock().unwrap().push(completion);
        }
    }
}
