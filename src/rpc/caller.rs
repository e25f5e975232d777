//! Outbound calls to remote peers, one per [Command].

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, TryRecvError};
use tracing::debug;

use crate::common::{Command, Id, Node, RpcResult, SIGNATURE_SIZE};

use super::{RoutingLivenessTracker, Transport, TransportOutcome};

/// Final outcome of an outbound call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The peer responded, whatever the result says.
    Answered(RpcResult),
    /// The peer did not respond before the transport gave up.
    Unanswered,
}

impl CallOutcome {
    /// Returns the decoded result if the peer answered.
    pub fn result(&self) -> Option<&RpcResult> {
        match self {
            CallOutcome::Answered(result) => Some(result),
            CallOutcome::Unanswered => None,
        }
    }

    pub fn into_result(self) -> Option<RpcResult> {
        match self {
            CallOutcome::Answered(result) => Some(result),
            CallOutcome::Unanswered => None,
        }
    }
}

/// Observable state of a [Call].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Pending,
    Answered(RpcResult),
    Unanswered,
}

impl From<CallOutcome> for CallState {
    fn from(outcome: CallOutcome) -> Self {
        match outcome {
            CallOutcome::Answered(result) => CallState::Answered(result),
            CallOutcome::Unanswered => CallState::Unanswered,
        }
    }
}

/// Handle to a single outbound call.
///
/// The routing table is updated whether or not this handle is kept around.
#[derive(Debug)]
pub struct Call {
    target: Node,
    command: Command,
    receiver: Receiver<CallOutcome>,
    outcome: Option<CallOutcome>,
}

impl Call {
    fn new(target: Node, command: Command, receiver: Receiver<CallOutcome>) -> Self {
        Self {
            target,
            command,
            receiver,
            outcome: None,
        }
    }

    // === Getters ===

    pub fn target(&self) -> &Node {
        &self.target
    }

    pub fn command(&self) -> Command {
        self.command
    }

    // === Public Methods ===

    /// Returns the current state without blocking.
    pub fn state(&mut self) -> CallState {
        if self.outcome.is_none() {
            match self.receiver.try_recv() {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(TryRecvError::Disconnected) => self.outcome = Some(CallOutcome::Unanswered),
                Err(TryRecvError::Empty) => return CallState::Pending,
            }
        }

        self.state_from_outcome()
    }

    /// Block until the call completes, or `timeout` elapses.
    pub fn wait_timeout(&mut self, timeout: Duration) -> CallState {
        if self.outcome.is_none() {
            match self.receiver.recv_timeout(timeout) {
                Ok(outcome) => self.outcome = Some(outcome),
                Err(RecvTimeoutError::Disconnected) => {
                    self.outcome = Some(CallOutcome::Unanswered)
                }
                Err(RecvTimeoutError::Timeout) => return CallState::Pending,
            }
        }

        self.state_from_outcome()
    }

    /// Block until the call completes.
    pub fn wait(mut self) -> CallOutcome {
        match self.outcome.take() {
            Some(outcome) => outcome,
            // A dropped completion never reached the peer.
            None => self.receiver.recv().unwrap_or(CallOutcome::Unanswered),
        }
    }

    /// Await the call completion.
    #[cfg(feature = "async")]
    pub async fn recv_async(mut self) -> CallOutcome {
        match self.outcome.take() {
            Some(outcome) => outcome,
            None => self
                .receiver
                .recv_async()
                .await
                .unwrap_or(CallOutcome::Unanswered),
        }
    }

    fn state_from_outcome(&self) -> CallState {
        self.outcome
            .clone()
            .map(CallState::from)
            .unwrap_or(CallState::Pending)
    }
}

#[derive(Debug, Clone)]
/// Issues each [Command] toward a remote peer, feeding every outcome to
/// the [RoutingLivenessTracker].
pub struct OutboundCaller {
    transport: Arc<dyn Transport>,
    tracker: RoutingLivenessTracker,
}

impl OutboundCaller {
    pub fn new(transport: Arc<dyn Transport>, tracker: RoutingLivenessTracker) -> Self {
        Self { transport, tracker }
    }

    pub fn call_get_contract(&self, target: &Node, contract_hash: &Id) -> Call {
        self.call(target, Command::GetContract, vec![hash_arg(contract_hash)])
    }

    pub fn call_get_image(&self, target: &Node, image_hash: &Id) -> Call {
        self.call(target, Command::GetImage, vec![hash_arg(image_hash)])
    }

    pub fn call_get_profile(&self, target: &Node) -> Call {
        self.call(target, Command::GetProfile, vec![])
    }

    pub fn call_get_user_metadata(&self, target: &Node) -> Call {
        self.call(target, Command::GetUserMetadata, vec![])
    }

    pub fn call_get_listings(&self, target: &Node) -> Call {
        self.call(target, Command::GetListings, vec![])
    }

    pub fn call_get_contract_metadata(&self, target: &Node, contract_hash: &Id) -> Call {
        self.call(
            target,
            Command::GetContractMetadata,
            vec![hash_arg(contract_hash)],
        )
    }

    /// `signature` must be made over [crate::encode_follow_signable] with
    /// [crate::FollowAction::Follow], from this node to `target`.
    pub fn call_follow(&self, target: &Node, signature: &[u8; SIGNATURE_SIZE]) -> Call {
        self.call(
            target,
            Command::Follow,
            vec![Bytes::copy_from_slice(signature)],
        )
    }

    /// `signature` must be made over [crate::encode_follow_signable] with
    /// [crate::FollowAction::Unfollow], from this node to `target`.
    pub fn call_unfollow(&self, target: &Node, signature: &[u8; SIGNATURE_SIZE]) -> Call {
        self.call(
            target,
            Command::Unfollow,
            vec![Bytes::copy_from_slice(signature)],
        )
    }

    pub fn call_get_followers(&self, target: &Node) -> Call {
        self.call(target, Command::GetFollowers, vec![])
    }

    pub fn call_get_following(&self, target: &Node) -> Call {
        self.call(target, Command::GetFollowing, vec![])
    }

    fn call(&self, target: &Node, command: Command, args: Vec<Bytes>) -> Call {
        let (sender, receiver) = flume::bounded(1);

        let tracker = self.tracker.clone();
        let contact = target.clone();

        self.transport.send(
            target.address(),
            command,
            args,
            Box::new(move |outcome| {
                let outcome = match outcome {
                    TransportOutcome::Response(frames) => {
                        CallOutcome::Answered(RpcResult::from_frames(command, frames))
                    }
                    TransportOutcome::Rejected { code, description } => {
                        debug!(
                            ?command,
                            code,
                            %description,
                            peer = ?contact.id(),
                            "Request rejected"
                        );
                        CallOutcome::Answered(RpcResult::failure(command.family()))
                    }
                    TransportOutcome::NoResponse => CallOutcome::Unanswered,
                };

                tracker.record(&contact, &outcome);

                // The handle may have been dropped.
                let _ = sender.send(outcome);
            }),
        );

        Call::new(target.clone(), command, receiver)
    }
}

fn hash_arg(hash: &Id) -> Bytes {
    Bytes::copy_from_slice(hash.as_bytes())
}
