//! Routing table maintenance from the outcome of outbound calls.

use std::sync::Arc;

use tracing::trace;

use crate::common::{Node, Router};

use super::CallOutcome;

#[derive(Debug, Clone)]
/// The only path through which outbound calls change routing table membership.
///
/// Reachability is all that counts: a peer that answers with
/// [crate::RpcResult::NotFound] or [crate::RpcResult::AuthFailed] is alive.
pub struct RoutingLivenessTracker {
    router: Arc<dyn Router>,
}

impl RoutingLivenessTracker {
    pub fn new(router: Arc<dyn Router>) -> Self {
        Self { router }
    }

    /// Add `target` to the routing table if it answered, remove it otherwise.
    ///
    /// Safe to call concurrently, and any number of times for the same outcome.
    pub fn record(&self, target: &Node, outcome: &CallOutcome) {
        match outcome {
            CallOutcome::Answered(_) => {
                trace!(peer = ?target.id(), "Peer answered");
                self.router.add_contact(target.seen_now());
            }
            CallOutcome::Unanswered => {
                trace!(peer = ?target.id(), "Peer did not answer");
                self.router.remove_contact(target);
            }
        }
    }
}
