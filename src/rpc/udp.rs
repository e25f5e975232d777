//! [Transport] over a UDP socket owned by an actor thread.

use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use bytes::Bytes;
use flume::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, trace, warn};

use crate::common::{
    Command, ErrorSpecific, Id, Message, MessageType, RequestSpecific, ResponseSpecific,
    RpcResult, METHOD_UNKNOWN_CODE,
};
use crate::server::Server;
use crate::Error;

use super::config::Config;
use super::socket::RpcSocket;
use super::{Completion, Transport, TransportOutcome};

#[derive(Debug, Clone)]
/// Handle to the transport actor thread.
///
/// The thread keeps running until [UdpTransport::shutdown] is called
/// or every clone of this handle is dropped.
pub struct UdpTransport {
    sender: Sender<ActorMessage>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind the socket and spawn the actor thread.
    ///
    /// Every outbound request advertises `id` and `public_key` as the
    /// requester, and inbound requests are answered by `server`.
    pub fn new(
        config: &Config,
        id: Id,
        public_key: [u8; 32],
        server: Arc<dyn Server>,
    ) -> Result<Self, std::io::Error> {
        let socket = RpcSocket::new(config)?;
        let local_addr = socket.local_addr();

        let (sender, receiver) = flume::unbounded();

        let actor = Actor {
            socket,
            server,
            id,
            public_key,
            pending: HashMap::new(),
        };

        thread::Builder::new()
            .name("market-transport".to_string())
            .spawn(move || actor.run(receiver))?;

        info!(?local_addr, ?id, "Market node listening");

        Ok(Self { sender, local_addr })
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop the actor thread, dropping every pending call.
    ///
    /// Blocks until the thread acknowledged the shutdown.
    pub fn shutdown(&self) -> Result<(), TransportWasShutdown> {
        let (sender, receiver) = flume::bounded::<()>(1);

        self.sender
            .send(ActorMessage::Shutdown(sender))
            .map_err(|_| TransportWasShutdown)?;

        receiver.recv().map_err(|_| TransportWasShutdown)
    }
}

impl Transport for UdpTransport {
    fn send(
        &self,
        address: SocketAddr,
        command: Command,
        args: Vec<Bytes>,
        completion: Completion,
    ) {
        let message = ActorMessage::Request {
            address,
            command,
            args,
            completion,
        };

        if let Err(flume::SendError(ActorMessage::Request { completion, .. })) =
            self.sender.send(message)
        {
            debug!(?address, ?command, "Transport was shutdown, dropping request");
            completion(TransportOutcome::NoResponse);
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("The transport actor thread was shutdown")]
/// The actor thread is no longer running.
pub struct TransportWasShutdown;

enum ActorMessage {
    Request {
        address: SocketAddr,
        command: Command,
        args: Vec<Bytes>,
        completion: Completion,
    },
    Shutdown(Sender<()>),
}

impl Debug for ActorMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ActorMessage::Request {
                address, command, ..
            } => write!(f, "Request({command}, {address})"),
            ActorMessage::Shutdown(_) => write!(f, "Shutdown"),
        }
    }
}

struct PendingCall {
    command: Command,
    completion: Completion,
}

struct Actor {
    socket: RpcSocket,
    server: Arc<dyn Server>,
    id: Id,
    public_key: [u8; 32],
    pending: HashMap<u16, PendingCall>,
}

impl Actor {
    fn run(mut self, receiver: Receiver<ActorMessage>) {
        loop {
            loop {
                match receiver.try_recv() {
                    Ok(ActorMessage::Request {
                        address,
                        command,
                        args,
                        completion,
                    }) => self.request(address, command, args, completion),
                    Ok(ActorMessage::Shutdown(sender)) => {
                        debug!(pending = self.pending.len(), "Market transport shutdown");
                        // Requests sent from now on fail immediately.
                        drop(receiver);
                        let _ = sender.send(());
                        return;
                    }
                    Err(TryRecvError::Disconnected) => {
                        debug!("Market transport was shutdown after Drop.");
                        return;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            for transaction_id in self.socket.expire() {
                if let Some(PendingCall {
                    command,
                    completion,
                }) = self.pending.remove(&transaction_id)
                {
                    trace!(?command, transaction_id, "Request timed out");
                    completion(TransportOutcome::NoResponse);
                }
            }

            if let Some((message, from)) = self.socket.recv_from() {
                self.handle_message(message, from);
            }
        }
    }

    fn request(
        &mut self,
        address: SocketAddr,
        command: Command,
        args: Vec<Bytes>,
        completion: Completion,
    ) {
        let request = RequestSpecific {
            requester_id: self.id,
            requester_key: self.public_key,
            method: command.as_str().to_string(),
            args,
        };

        let transaction_id = self.socket.request(address, request);

        self.pending.insert(
            transaction_id,
            PendingCall {
                command,
                completion,
            },
        );
    }

    fn handle_message(&mut self, message: Message, from: SocketAddr) {
        let transaction_id = message.transaction_id;

        match message.message_type {
            MessageType::Request(request) => self.handle_request(transaction_id, from, request),
            MessageType::Response(ResponseSpecific { frames }) => {
                self.complete(transaction_id, TransportOutcome::Response(frames))
            }
            MessageType::Error(ErrorSpecific { code, description }) => self.complete(
                transaction_id,
                TransportOutcome::Rejected { code, description },
            ),
        }
    }

    fn handle_request(&mut self, transaction_id: u16, from: SocketAddr, request: RequestSpecific) {
        let command = match request.command() {
            Ok(command) if self.server.handled_commands().contains(&command) => command,
            _ => {
                debug!(method = %request.method, ?from, "Method Unknown");

                self.socket.error(
                    from,
                    transaction_id,
                    ErrorSpecific {
                        code: METHOD_UNKNOWN_CODE,
                        description: "Method Unknown".to_string(),
                    },
                );
                return;
            }
        };

        let sender = request.requester(from);
        let result = self.server.handle_request(&sender, command, &request.args);

        let response = ResponseSpecific {
            frames: result.to_frames(),
        };

        if let Err(Error::DatagramTooLarge(size)) =
            self.socket.response(from, transaction_id, response)
        {
            warn!(?command, size, ?from, "Response does not fit in a datagram");

            let failure = ResponseSpecific {
                frames: RpcResult::failure(command.family()).to_frames(),
            };
            let _ = self.socket.response(from, transaction_id, failure);
        }
    }

    fn complete(&mut self, transaction_id: u16, outcome: TransportOutcome) {
        match self.pending.remove(&transaction_id) {
            Some(PendingCall { completion, .. }) => completion(outcome),
            None => trace!(transaction_id, "Response to an unknown request"),
        }
    }
}
