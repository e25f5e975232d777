//! Serialize and deserialize market rpc messages.

mod internal;

use std::net::SocketAddr;
use std::str::FromStr;

use bytes::Bytes;
use serde_bytes::ByteBuf;

use crate::common::{Command, Id, Node};
use crate::{Error, Result};

/// Protocol error: malformed request arguments.
pub const PROTOCOL_ERROR_CODE: i32 = 203;
/// Method Unknown.
pub const METHOD_UNKNOWN_CODE: i32 = 204;

#[derive(Debug, PartialEq, Clone)]
pub struct Message {
    pub transaction_id: u16,

    pub message_type: MessageType,
}

#[derive(Debug, PartialEq, Clone)]
pub enum MessageType {
    Request(RequestSpecific),

    Response(ResponseSpecific),

    Error(ErrorSpecific),
}

#[derive(Debug, PartialEq, Clone)]
pub struct ErrorSpecific {
    pub code: i32,
    pub description: String,
}

#[derive(Debug, PartialEq, Clone)]
pub struct RequestSpecific {
    pub requester_id: Id,
    pub requester_key: [u8; 32],
    /// Raw command identifier, see [Command::as_str].
    pub method: String,
    pub args: Vec<Bytes>,
}

#[derive(Debug, PartialEq, Clone)]
pub struct ResponseSpecific {
    pub frames: Vec<Bytes>,
}

impl RequestSpecific {
    pub fn new(requester: &Node, command: Command, args: Vec<Bytes>) -> Self {
        RequestSpecific {
            requester_id: *requester.id(),
            requester_key: *requester.public_key(),
            method: command.as_str().to_string(),
            args,
        }
    }

    /// Parse the requested command.
    pub fn command(&self) -> Result<Command> {
        Command::from_str(&self.method)
    }

    /// The contact of the requester, reachable at the address the request came from.
    pub fn requester(&self, from: SocketAddr) -> Node {
        Node::new(self.requester_id, from, self.requester_key)
    }
}

impl Message {
    fn into_serde_message(self) -> internal::MarketMessage {
        internal::MarketMessage {
            transaction_id: self.transaction_id.to_be_bytes().to_vec(),
            variant: match self.message_type {
                MessageType::Request(RequestSpecific {
                    requester_id,
                    requester_key,
                    method,
                    args,
                }) => internal::MarketMessageVariant::Request {
                    method,
                    arguments: internal::MarketRequestArguments {
                        id: requester_id.to_vec(),
                        k: requester_key.to_vec(),
                        args: args.iter().map(|arg| ByteBuf::from(arg.to_vec())).collect(),
                    },
                },
                MessageType::Response(ResponseSpecific { frames }) => {
                    internal::MarketMessageVariant::Response {
                        frames: frames
                            .iter()
                            .map(|frame| ByteBuf::from(frame.to_vec()))
                            .collect(),
                    }
                }
                MessageType::Error(ErrorSpecific { code, description }) => {
                    internal::MarketMessageVariant::Error {
                        error_info: (code, description),
                    }
                }
            },
        }
    }

    fn from_serde_message(msg: internal::MarketMessage) -> Result<Message> {
        Ok(Message {
            transaction_id: transaction_id(msg.transaction_id)?,
            message_type: match msg.variant {
                internal::MarketMessageVariant::Request { method, arguments } => {
                    let requester_key: [u8; 32] = arguments
                        .k
                        .as_slice()
                        .try_into()
                        .map_err(|_| Error::InvalidPublicKeySize(arguments.k.len()))?;

                    MessageType::Request(RequestSpecific {
                        requester_id: Id::from_bytes(&arguments.id)?,
                        requester_key,
                        method,
                        args: arguments
                            .args
                            .into_iter()
                            .map(|arg| Bytes::from(arg.into_vec()))
                            .collect(),
                    })
                }
                internal::MarketMessageVariant::Response { frames } => {
                    MessageType::Response(ResponseSpecific {
                        frames: frames
                            .into_iter()
                            .map(|frame| Bytes::from(frame.into_vec()))
                            .collect(),
                    })
                }
                internal::MarketMessageVariant::Error {
                    error_info: (code, description),
                } => MessageType::Error(ErrorSpecific { code, description }),
            },
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.clone().into_serde_message().to_bytes()?)
    }

    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Message> {
        Message::from_serde_message(internal::MarketMessage::from_bytes(bytes.as_ref())?)
    }
}

/// Returns the transaction id of a well formed request whose requester
/// arguments are invalid, so it can be answered with [PROTOCOL_ERROR_CODE].
pub fn malformed_request_transaction_id(bytes: &[u8]) -> Option<u16> {
    let message = internal::MarketMessage::from_bytes(bytes).ok()?;

    match message.variant {
        internal::MarketMessageVariant::Request { .. } => {
            transaction_id(message.transaction_id).ok()
        }
        _ => None,
    }
}

// Return the transaction Id as a u16
pub fn transaction_id(bytes: Vec<u8>) -> Result<u16> {
    if bytes.len() == 2 {
        return Ok(((bytes[0] as u16) << 8) | (bytes[1] as u16));
    } else if bytes.len() == 1 {
        return Ok(bytes[0] as u16);
    }

    Err(Error::InvalidTransactionId(bytes))
}
