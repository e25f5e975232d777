//! Discriminated result of a command, and its legacy wire encoding.

use bytes::Bytes;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use tracing::debug;

use super::{Command, CommandFamily};

/// Size of the detached ed25519 signature attached to disclosure responses.
pub const SIGNATURE_SIZE: usize = 64;

/// Frame marking "no data" on the wire.
pub const NONE_FRAME: &[u8] = b"None";
/// Frame marking a successful relationship command.
pub const TRUE_FRAME: &[u8] = b"True";
/// Frame marking a failed relationship command.
pub const FALSE_FRAME: &[u8] = b"False";

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of a single command, as produced by a handler or decoded from a response.
pub enum RpcResult {
    /// Unsigned payload: a content blob, a directory listing or `"True"`.
    Ok(Bytes),
    /// Serialized payload with a detached signature over exactly that payload.
    OkSigned {
        payload: Bytes,
        signature: [u8; SIGNATURE_SIZE],
    },
    NotFound,
    AuthFailed,
}

impl RpcResult {
    /// Successful follow or unfollow.
    pub fn success() -> Self {
        RpcResult::Ok(Bytes::from_static(TRUE_FRAME))
    }

    /// The result a command of this family reports on any failure.
    pub fn failure(family: CommandFamily) -> Self {
        match family {
            CommandFamily::Relationship => RpcResult::AuthFailed,
            _ => RpcResult::NotFound,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, RpcResult::Ok(_) | RpcResult::OkSigned { .. })
    }

    /// Returns the payload of a successful result.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            RpcResult::Ok(payload) | RpcResult::OkSigned { payload, .. } => Some(payload),
            _ => None,
        }
    }

    /// Returns `true` if this is an [RpcResult::OkSigned] whose signature
    /// verifies with `public_key`.
    pub fn verify(&self, public_key: &[u8; 32]) -> bool {
        match self {
            RpcResult::OkSigned { payload, signature } => {
                verify_signature(public_key, payload, signature)
            }
            _ => false,
        }
    }

    /// Encode as the ordered sequence of byte strings sent to the requester.
    pub fn to_frames(&self) -> Vec<Bytes> {
        match self {
            RpcResult::Ok(payload) => vec![payload.clone()],
            RpcResult::OkSigned { payload, signature } => {
                vec![payload.clone(), Bytes::copy_from_slice(signature)]
            }
            RpcResult::NotFound => vec![Bytes::from_static(NONE_FRAME)],
            RpcResult::AuthFailed => vec![Bytes::from_static(FALSE_FRAME)],
        }
    }

    /// Decode the frames of a response to `command`.
    ///
    /// Frames that don't have the shape `command` answers with decode to the
    /// failure of its [CommandFamily].
    pub fn from_frames(command: Command, frames: Vec<Bytes>) -> Self {
        let family = command.family();

        if let [frame] = frames.as_slice() {
            if frame.as_ref() == NONE_FRAME || frame.as_ref() == FALSE_FRAME {
                return RpcResult::failure(family);
            }
        }

        match (family, frames.as_slice()) {
            (CommandFamily::Relationship, [frame]) if frame.as_ref() == TRUE_FRAME => {
                RpcResult::success()
            }
            (CommandFamily::Content | CommandFamily::Directory, [payload]) => {
                RpcResult::Ok(payload.clone())
            }
            (CommandFamily::Disclosure, [payload, signature]) => {
                match <[u8; SIGNATURE_SIZE]>::try_from(signature.as_ref()) {
                    Ok(signature) => RpcResult::OkSigned {
                        payload: payload.clone(),
                        signature,
                    },
                    Err(_) => {
                        debug!(
                            ?command,
                            size = signature.len(),
                            "Invalid signature size in response"
                        );
                        RpcResult::failure(family)
                    }
                }
            }
            _ => {
                debug!(?command, frames = frames.len(), "Unexpected response shape");
                RpcResult::failure(family)
            }
        }
    }
}

/// Verify an ed25519 `signature` over `message` with a raw `public_key`.
pub fn verify_signature(public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    key.verify(message, &signature).is_ok()
}
