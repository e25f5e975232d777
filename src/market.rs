//! Market node: the inbound server and outbound caller wired to a UDP transport.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use ed25519_dalek::SigningKey;
use tracing::debug;

use crate::common::{
    encode_follow_signable, FollowAction, FollowRecord, Id, Node, Router, RpcResult,
    SharedRoutingTable,
};
use crate::rpc::{
    CallOutcome, Config, OutboundCaller, RoutingLivenessTracker, TransportWasShutdown,
    UdpTransport,
};
use crate::server::MarketServer;
use crate::store::{
    ContentStore, Ed25519KeyStore, FollowStore, KeyStore, MemoryContentStore, MemoryFollowStore,
    MemoryProfileStore, ProfileStore, StoreError,
};

#[derive(Debug, Clone)]
/// Market node.
///
/// Answers every [crate::Command] from its stores, and calls remote peers
/// through [MarketNode::caller].
pub struct MarketNode {
    keys: Arc<dyn KeyStore>,
    router: Arc<dyn Router>,
    follows: Arc<dyn FollowStore>,
    transport: UdpTransport,
    caller: OutboundCaller,
}

impl MarketNode {
    /// Returns a builder to edit settings before creating a MarketNode.
    pub fn builder() -> MarketNodeBuilder {
        MarketNodeBuilder::default()
    }

    /// Create a new node with default settings, a random identity and empty in-memory stores.
    pub fn new() -> Result<Self, std::io::Error> {
        Self::builder().build()
    }

    // === Getters ===

    /// Returns the id of this node, bound to its public key.
    pub fn id(&self) -> Id {
        self.keys.id()
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keys.public_key()
    }

    /// Returns the address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }

    /// Contact of this node, as reachable from the same host.
    pub fn contact(&self) -> Node {
        let mut address = self.local_addr();

        if address.ip().is_unspecified() {
            address.set_ip(Ipv4Addr::LOCALHOST.into());
        }

        Node::from_public_key(self.public_key(), address)
    }

    /// The routing table updated by inbound requests and outbound calls.
    pub fn router(&self) -> &Arc<dyn Router> {
        &self.router
    }

    /// Issue any command to a remote peer.
    pub fn caller(&self) -> &OutboundCaller {
        &self.caller
    }

    // === Public Methods ===

    /// Follow `target`, and record it in the following list if it accepted.
    ///
    /// Blocks until the call completes.
    pub fn follow(&self, target: &Node) -> Result<CallOutcome, StoreError> {
        let follower = self.id();
        let signature = self.keys.sign(&encode_follow_signable(
            FollowAction::Follow,
            &follower,
            target.id(),
        ));

        let outcome = self.caller.call_follow(target, &signature).wait();

        if let CallOutcome::Answered(RpcResult::Ok(_)) = outcome {
            self.follows.set_following(FollowRecord {
                follower,
                following: *target.id(),
                signature,
            })?;

            debug!(following = ?target.id(), "Followed");
        }

        Ok(outcome)
    }

    /// Unfollow `target`, and remove it from the following list if it accepted.
    ///
    /// Blocks until the call completes.
    pub fn unfollow(&self, target: &Node) -> Result<CallOutcome, StoreError> {
        let signature = self.keys.sign(&encode_follow_signable(
            FollowAction::Unfollow,
            &self.id(),
            target.id(),
        ));

        let outcome = self.caller.call_unfollow(target, &signature).wait();

        if let CallOutcome::Answered(RpcResult::Ok(_)) = outcome {
            self.follows.delete_following(target.id())?;

            debug!(following = ?target.id(), "Unfollowed");
        }

        Ok(outcome)
    }

    /// Shutdown the transport thread. Pending calls complete as unanswered
    /// without touching the routing table.
    pub fn shutdown(&self) -> Result<(), TransportWasShutdown> {
        self.transport.shutdown()
    }
}

#[derive(Debug, Default, Clone)]
/// Create a [MarketNode] with custom settings.
pub struct MarketNodeBuilder {
    config: Config,
    signing_key: Option<SigningKey>,
    key_store: Option<Arc<dyn KeyStore>>,
    router: Option<Arc<dyn Router>>,
    content_store: Option<Arc<dyn ContentStore>>,
    profile_store: Option<Arc<dyn ProfileStore>>,
    follow_store: Option<Arc<dyn FollowStore>>,
}

impl MarketNodeBuilder {
    /// Explicit port to listen on.
    pub fn port(&mut self, port: u16) -> &mut Self {
        self.config.port = Some(port);

        self
    }

    /// Duration after which an unanswered call is abandoned and the
    /// peer removed from the routing table.
    ///
    /// Defaults to [crate::rpc::DEFAULT_REQUEST_TIMEOUT]
    pub fn request_timeout(&mut self, request_timeout: Duration) -> &mut Self {
        self.config.request_timeout = request_timeout;

        self
    }

    /// Sign responses and follows with this key.
    ///
    /// Defaults to a random key. Ignored if [Self::key_store] is set.
    pub fn signing_key(&mut self, signing_key: SigningKey) -> &mut Self {
        self.signing_key = Some(signing_key);

        self
    }

    /// Custom [KeyStore].
    pub fn key_store(&mut self, key_store: Arc<dyn KeyStore>) -> &mut Self {
        self.key_store = Some(key_store);

        self
    }

    /// Custom [Router].
    ///
    /// Defaults to a [SharedRoutingTable] around this node's id.
    pub fn router(&mut self, router: Arc<dyn Router>) -> &mut Self {
        self.router = Some(router);

        self
    }

    /// Defaults to an empty [MemoryContentStore].
    pub fn content_store(&mut self, content_store: Arc<dyn ContentStore>) -> &mut Self {
        self.content_store = Some(content_store);

        self
    }

    /// Defaults to an empty [MemoryProfileStore].
    pub fn profile_store(&mut self, profile_store: Arc<dyn ProfileStore>) -> &mut Self {
        self.profile_store = Some(profile_store);

        self
    }

    /// Defaults to an empty [MemoryFollowStore].
    pub fn follow_store(&mut self, follow_store: Arc<dyn FollowStore>) -> &mut Self {
        self.follow_store = Some(follow_store);

        self
    }

    /// Create a MarketNode with these settings and start its transport thread.
    pub fn build(&self) -> Result<MarketNode, std::io::Error> {
        let keys: Arc<dyn KeyStore> = match (&self.key_store, &self.signing_key) {
            (Some(key_store), _) => key_store.clone(),
            (None, Some(signing_key)) => Arc::new(Ed25519KeyStore::new(signing_key.clone())),
            (None, None) => Arc::new(Ed25519KeyStore::random()),
        };
        let id = keys.id();

        let router: Arc<dyn Router> = match &self.router {
            Some(router) => router.clone(),
            None => Arc::new(SharedRoutingTable::new(id)),
        };
        let content: Arc<dyn ContentStore> = match &self.content_store {
            Some(store) => store.clone(),
            None => Arc::new(MemoryContentStore::new()),
        };
        let profiles: Arc<dyn ProfileStore> = match &self.profile_store {
            Some(store) => store.clone(),
            None => Arc::new(MemoryProfileStore::new()),
        };
        let follows: Arc<dyn FollowStore> = match &self.follow_store {
            Some(store) => store.clone(),
            None => Arc::new(MemoryFollowStore::new()),
        };

        let server = MarketServer::new(
            keys.clone(),
            router.clone(),
            content,
            profiles,
            follows.clone(),
        );

        let transport =
            UdpTransport::new(&self.config, id, keys.public_key(), Arc::new(server))?;

        let caller = OutboundCaller::new(
            Arc::new(transport.clone()),
            RoutingLivenessTracker::new(router.clone()),
        );

        Ok(MarketNode {
            keys,
            router,
            follows,
            transport,
            caller,
        })
    }
}
