//! UDP socket layer managing incoming/outgoing requests and responses.

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::common::{
    malformed_request_transaction_id, ErrorSpecific, Message, MessageType, RequestSpecific,
    ResponseSpecific, PROTOCOL_ERROR_CODE,
};

use crate::Error;

use super::config::Config;

/// Largest payload of a single UDP datagram over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
const RECV_BUFFER_SIZE: usize = 65_535;

pub const DEFAULT_PORT: u16 = 18467;
/// Default request timeout before abandoning an inflight request to a non-responding node.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(2000); // 2 seconds
/// The maximum duration to backoff checking the [UdpSocket] buffer after it is empty.
/// Lower values increases CPU usage, but reduces latency.
pub const MAX_THREAD_BLOCK_DURATION: Duration = Duration::from_millis(10);

/// A UdpSocket wrapper that formats and correlates market requests and responses.
#[derive(Debug)]
pub struct RpcSocket {
    next_tid: u16,
    socket: UdpSocket,
    local_addr: SocketAddr,
    request_timeout: Duration,
    inflight_requests: HashMap<u16, InflightRequest>,
}

#[derive(Debug, Clone)]
pub struct InflightRequest {
    to: SocketAddr,
    sent_at: Instant,
}

impl RpcSocket {
    pub(crate) fn new(config: &Config) -> Result<Self, std::io::Error> {
        let socket = if let Some(port) = config.port {
            UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], port)))?
        } else {
            match UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))) {
                Ok(socket) => Ok(socket),
                Err(_) => UdpSocket::bind(SocketAddr::from(([0, 0, 0, 0], 0))),
            }?
        };

        let local_addr = socket.local_addr()?;

        socket.set_nonblocking(true)?;

        Ok(Self {
            socket,
            next_tid: 0,
            local_addr,
            request_timeout: config.request_timeout,
            inflight_requests: HashMap::new(),
        })
    }

    #[cfg(test)]
    pub(crate) fn ephemeral() -> Result<Self, std::io::Error> {
        Self::new(&Config {
            port: Some(0),
            ..Default::default()
        })
    }

    // === Getters ===

    /// Returns the address the socket is listening to.
    #[inline]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    // === Public Methods ===

    /// Returns true if this transaction_id is still inflight
    #[cfg(test)]
    pub fn inflight(&self, transaction_id: &u16) -> bool {
        self.inflight_requests
            .get(transaction_id)
            .map(|request| request.sent_at.elapsed() < self.request_timeout)
            .unwrap_or(false)
    }

    /// Send a request to the given address and return the transaction_id
    pub fn request(&mut self, address: SocketAddr, request: RequestSpecific) -> u16 {
        let tid = self.tid();
        let message = Message {
            transaction_id: tid,
            message_type: MessageType::Request(request),
        };

        self.inflight_requests.insert(
            tid,
            InflightRequest {
                to: address,
                sent_at: Instant::now(),
            },
        );
        let _ = self.send(address, message).map_err(|e| {
            debug!(?e, "Error sending request message");
        });

        tid
    }

    /// Send a response to the given address.
    ///
    /// Returns [Error::DatagramTooLarge] without sending anything if the
    /// encoded response does not fit in a single datagram.
    pub fn response(
        &mut self,
        address: SocketAddr,
        transaction_id: u16,
        response: ResponseSpecific,
    ) -> Result<(), Error> {
        let message = Message {
            transaction_id,
            message_type: MessageType::Response(response),
        };

        match self.send(address, message) {
            Err(Error::DatagramTooLarge(size)) => Err(Error::DatagramTooLarge(size)),
            Err(e) => {
                debug!(?e, "Error sending response message");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    /// Send an error to the given address.
    pub fn error(&mut self, address: SocketAddr, transaction_id: u16, error: ErrorSpecific) {
        let message = Message {
            transaction_id,
            message_type: MessageType::Error(error),
        };
        let _ = self.send(address, message).map_err(|e| {
            debug!(?e, "Error sending error message");
        });
    }

    /// Remove and return the transaction ids of requests that timed out.
    pub fn expire(&mut self) -> Vec<u16> {
        let request_timeout = self.request_timeout;
        let expired: Vec<u16> = self
            .inflight_requests
            .iter()
            .filter(|(_, request)| request.sent_at.elapsed() >= request_timeout)
            .map(|(tid, _)| *tid)
            .collect();

        for tid in &expired {
            self.inflight_requests.remove(tid);
        }

        expired
    }

    /// Receives a single message on the socket.
    /// On success, returns the message and the origin.
    ///
    /// Responses and errors are only returned if they answer an inflight
    /// request and come from the address it was sent to.
    pub fn recv_from(&mut self) -> Option<(Message, SocketAddr)> {
        let mut buf = [0u8; RECV_BUFFER_SIZE];

        match self.socket.recv_from(&mut buf) {
            Ok((amt, from)) => {
                let bytes = &buf[..amt];

                if from.port() == 0 {
                    trace!(
                        context = "socket_validation",
                        message = "Response from port 0"
                    );
                    return None;
                }

                match Message::from_bytes(bytes) {
                    Ok(message) => {
                        let should_return = match message.message_type {
                            MessageType::Request(_) => {
                                trace!(
                                    context = "socket_message_receiving",
                                    ?message,
                                    ?from,
                                    "Received request message"
                                );
                                true
                            }
                            MessageType::Response(_) | MessageType::Error(_) => {
                                trace!(
                                    context = "socket_message_receiving",
                                    ?message,
                                    ?from,
                                    "Received response message"
                                );
                                self.is_expected_response(&message, &from)
                            }
                        };

                        if should_return {
                            return Some((message, from));
                        }
                    }
                    Err(error) => {
                        trace!(
                            context = "socket_error",
                            ?error,
                            ?from,
                            message = ?String::from_utf8_lossy(bytes),
                            "Received invalid Bencode message."
                        );

                        if let Some(transaction_id) = malformed_request_transaction_id(bytes) {
                            self.error(
                                from,
                                transaction_id,
                                ErrorSpecific {
                                    code: PROTOCOL_ERROR_CODE,
                                    description: error.to_string(),
                                },
                            );
                        }
                    }
                }
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(MAX_THREAD_BLOCK_DURATION);
            }
            Err(e) => {
                trace!(
                    context = "socket_error",
                    ?e,
                    "recv_from failed unexpectedly"
                );
            }
        }

        None
    }

    // === Private Methods ===

    fn is_expected_response(&mut self, message: &Message, from: &SocketAddr) -> bool {
        let Some(request) = self.inflight_requests.get(&message.transaction_id) else {
            trace!(
                context = "socket_validation",
                message = "Unexpected response id"
            );
            return false;
        };

        if !compare_socket_addr(&request.to, from) {
            trace!(
                context = "socket_validation",
                message = "Response from wrong address"
            );
            return false;
        }

        self.inflight_requests.remove(&message.transaction_id);

        true
    }

    /// Increments self.next_tid and returns the previous value.
    fn tid(&mut self) -> u16 {
        // Skip ids still waiting for a response, wrapping around.
        loop {
            let tid = self.next_tid;
            self.next_tid = self.next_tid.wrapping_add(1);

            if !self.inflight_requests.contains_key(&tid) {
                return tid;
            }
        }
    }

    /// Send a raw message
    fn send(&mut self, address: SocketAddr, message: Message) -> Result<(), Error> {
        let bytes = message.to_bytes()?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(Error::DatagramTooLarge(bytes.len()));
        }

        self.socket.send_to(&bytes, address)?;
        trace!(context = "socket_message_sending", message = ?message);
        Ok(())
    }
}

// Same as SocketAddr::eq but ignores the ip if it is unspecified for testing reasons.
fn compare_socket_addr(a: &SocketAddr, b: &SocketAddr) -> bool {
    if a.port() != b.port() {
        return false;
    }

    if a.ip().is_unspecified() {
        return true;
    }

    a.ip() == b.ip()
}

#[cfg(test)]
mod test {
    use std::thread;

    use bytes::Bytes;

    use crate::common::{Command, Id, Node};

    use super::*;

    fn loopback(socket: &RpcSocket) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], socket.local_addr().port()))
    }

    fn request() -> RequestSpecific {
        let requester = Node::from_public_key([1; 32], SocketAddr::from(([127, 0, 0, 1], 1)));

        RequestSpecific::new(
            &requester,
            Command::GetContract,
            vec![Bytes::copy_from_slice(Id::random().as_bytes())],
        )
    }

    #[test]
    fn tid() {
        let mut socket = RpcSocket::ephemeral().unwrap();

        assert_eq!(socket.tid(), 0);
        assert_eq!(socket.tid(), 1);
        assert_eq!(socket.tid(), 2);

        socket.next_tid = u16::MAX;

        assert_eq!(socket.tid(), 65535);
        assert_eq!(socket.tid(), 0);
    }

    #[test]
    fn tid_skips_inflight() {
        let mut socket = RpcSocket::ephemeral().unwrap();

        socket.inflight_requests.insert(
            0,
            InflightRequest {
                to: SocketAddr::from(([127, 0, 0, 1], 1)),
                sent_at: Instant::now(),
            },
        );

        assert_eq!(socket.tid(), 1);
    }

    #[test]
    fn recv_request() {
        let mut server = RpcSocket::ephemeral().unwrap();
        let server_address = loopback(&server);

        let mut client = RpcSocket::ephemeral().unwrap();
        client.next_tid = 120;

        let client_port = client.local_addr().port();
        let request = request();

        let expected_request = request.clone();

        let server_thread = thread::spawn(move || loop {
            if let Some((message, from)) = server.recv_from() {
                assert_eq!(from.port(), client_port);
                assert_eq!(message.transaction_id, 120);
                assert_eq!(message.message_type, MessageType::Request(expected_request));
                break;
            }
        });

        client.request(server_address, request);
        assert!(client.inflight(&120));

        server_thread.join().unwrap();
    }

    #[test]
    fn recv_response() {
        let (tx, rx) = flume::bounded(1);

        let mut client = RpcSocket::ephemeral().unwrap();
        let client_address = loopback(&client);

        let response = ResponseSpecific {
            frames: vec![Bytes::from("None")],
        };
        let expected = response.clone();

        let server_thread = thread::spawn(move || {
            let mut server = RpcSocket::ephemeral().unwrap();
            tx.send(loopback(&server)).unwrap();

            // Expect the response
            server.inflight_requests.insert(
                8,
                InflightRequest {
                    to: client_address,
                    sent_at: Instant::now(),
                },
            );

            loop {
                if let Some((message, from)) = server.recv_from() {
                    assert_eq!(from.port(), client_address.port());
                    assert_eq!(message.transaction_id, 8);
                    assert_eq!(message.message_type, MessageType::Response(expected));
                    assert!(
                        server.inflight_requests.is_empty(),
                        "receiving removes the inflight request"
                    );
                    break;
                }
            }
        });

        let server_address = rx.recv().unwrap();

        client.response(server_address, 8, response).unwrap();

        server_thread.join().unwrap();
    }

    #[test]
    fn inflight_request_timeout() {
        let mut socket = RpcSocket::new(&Config {
            port: Some(0),
            request_timeout: Duration::from_millis(50),
        })
        .unwrap();

        socket.inflight_requests.insert(
            8,
            InflightRequest {
                to: SocketAddr::from(([127, 0, 0, 1], 1)),
                sent_at: Instant::now(),
            },
        );
        assert!(socket.inflight(&8));
        assert!(socket.expire().is_empty());

        thread::sleep(Duration::from_millis(60));

        assert!(!socket.inflight(&8));
        assert_eq!(socket.expire(), vec![8]);
        assert!(socket.expire().is_empty());
    }

    #[test]
    fn ignore_response_from_wrong_address() {
        let mut server = RpcSocket::ephemeral().unwrap();
        let server_address = loopback(&server);

        let mut client = RpcSocket::ephemeral().unwrap();
        let client_port = client.local_addr().port();

        server.inflight_requests.insert(
            8,
            InflightRequest {
                to: SocketAddr::from(([127, 0, 0, 1], client_port.wrapping_add(1))),
                sent_at: Instant::now(),
            },
        );

        client
            .response(
                server_address,
                8,
                ResponseSpecific {
                    frames: vec![Bytes::from("True")],
                },
            )
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        for _ in 0..3 {
            assert!(
                server.recv_from().is_none(),
                "Should not receive a response from wrong address"
            );
        }
        assert!(server.inflight(&8), "request is still waiting");
    }
}
