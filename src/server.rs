//! Inbound side of the market protocol: dispatching requests to handlers.

mod handlers;
mod signer;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use crate::common::{Command, Id, Node, Router, RpcResult};
use crate::store::{ContentStore, FollowStore, KeyStore, ProfileStore};

pub(crate) use handlers::HandlerError;
pub use signer::ResponseSigner;

/// Market server that can handle incoming rpc requests.
pub trait Server: Debug + Send + Sync {
    /// The commands this server answers, advertised to peers.
    fn handled_commands(&self) -> &[Command];

    /// Handle an incoming request from `sender`.
    ///
    /// Must not fail: every fault is reported as one of the [RpcResult]
    /// failure variants.
    ///
    /// This function runs on the transport thread, thus it needs to be
    /// fast and lightweight.
    fn handle_request(&self, sender: &Node, command: Command, args: &[Bytes]) -> RpcResult;
}

#[derive(Debug, Clone)]
/// Default implementation of [Server], answering every [Command] from the
/// injected stores.
pub struct MarketServer {
    id: Id,
    signer: ResponseSigner,
    router: Arc<dyn Router>,
    content: Arc<dyn ContentStore>,
    profiles: Arc<dyn ProfileStore>,
    follows: Arc<dyn FollowStore>,
}

impl MarketServer {
    pub fn new(
        keys: Arc<dyn KeyStore>,
        router: Arc<dyn Router>,
        content: Arc<dyn ContentStore>,
        profiles: Arc<dyn ProfileStore>,
        follows: Arc<dyn FollowStore>,
    ) -> Self {
        Self {
            id: keys.id(),
            signer: ResponseSigner::new(keys),
            router,
            content,
            profiles,
            follows,
        }
    }

    /// Id of the local node, the `following` side of inbound follows.
    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn signer(&self) -> &ResponseSigner {
        &self.signer
    }

    fn dispatch(
        &self,
        sender: &Node,
        command: Command,
        args: &[Bytes],
    ) -> Result<RpcResult, HandlerError> {
        match command {
            Command::GetContract | Command::GetImage => self.get_blob(args),
            Command::GetProfile => self.get_profile(),
            Command::GetUserMetadata => self.get_user_metadata(),
            Command::GetListings => self.get_listings(),
            Command::GetContractMetadata => self.get_contract_metadata(args),
            Command::Follow => self.follow(sender, args),
            Command::Unfollow => self.unfollow(sender, args),
            Command::GetFollowers => self.get_followers(),
            Command::GetFollowing => self.get_following(),
        }
    }
}

impl Server for MarketServer {
    fn handled_commands(&self) -> &[Command] {
        &Command::ALL
    }

    fn handle_request(&self, sender: &Node, command: Command, args: &[Bytes]) -> RpcResult {
        debug!(?command, sender = ?sender.id(), from = ?sender.address(), "Handling request");

        self.router.add_contact(sender.clone());

        match self.dispatch(sender, command, args) {
            Ok(result) => result,
            Err(handler_error) => {
                let from = sender.address();
                let sender = sender.id();

                match &handler_error {
                    HandlerError::NotFound | HandlerError::InvalidArgument(_) => {
                        debug!(?command, ?sender, ?from, %handler_error, "Request not answered")
                    }
                    HandlerError::AuthFailed(_) => {
                        warn!(?command, ?sender, ?from, %handler_error, "Rejected request")
                    }
                    HandlerError::Store(_) | HandlerError::Serialization(_) => {
                        error!(?command, ?sender, %handler_error, "Failed to handle request")
                    }
                }

                RpcResult::failure(command.family())
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::net::SocketAddr;

    use crate::common::{
        encode_follow_signable, FollowAction, Listing, Listings, Profile, SharedRoutingTable,
    };
    use crate::store::{
        Ed25519KeyStore, MemoryContentStore, MemoryFollowStore, MemoryProfileStore,
        StoreError,
    };

    use super::*;

    pub(crate) struct Fixture {
        pub server: MarketServer,
        pub keys: Arc<Ed25519KeyStore>,
        pub router: SharedRoutingTable,
        pub content: Arc<MemoryContentStore>,
        pub profiles: Arc<MemoryProfileStore>,
        pub follows: Arc<MemoryFollowStore>,
    }

    pub(crate) fn fixture() -> Fixture {
        let keys = Arc::new(Ed25519KeyStore::random());
        let router = SharedRoutingTable::new(keys.id());
        let content = Arc::new(MemoryContentStore::new());
        let profiles = Arc::new(MemoryProfileStore::new());
        let follows = Arc::new(MemoryFollowStore::new());

        let server = MarketServer::new(
            keys.clone(),
            Arc::new(router.clone()),
            content.clone(),
            profiles.clone(),
            follows.clone(),
        );

        Fixture {
            server,
            keys,
            router,
            content,
            profiles,
            follows,
        }
    }

    /// A remote peer with its own keys, bound to its id.
    pub(crate) fn peer(port: u16) -> (Ed25519KeyStore, Node) {
        let keys = Ed25519KeyStore::random();
        let node = Node::from_public_key(
            keys.public_key(),
            SocketAddr::from(([127, 0, 0, 1], port)),
        );

        (keys, node)
    }

    #[derive(Debug)]
    struct BrokenProfiles;

    impl ProfileStore for BrokenProfiles {
        fn get_profile(&self) -> Result<Profile, StoreError> {
            Err(std::io::Error::other("disk on fire").into())
        }
    }

    #[test]
    fn advertises_every_command() {
        let Fixture { server, .. } = fixture();

        assert_eq!(server.handled_commands(), &Command::ALL[..]);
        assert_eq!(server.handled_commands().len(), 10);
    }

    #[test]
    fn registers_sender_for_every_command() {
        let fixture = fixture();

        for (i, command) in Command::ALL.iter().enumerate() {
            let (_, sender) = peer(7000 + i as u16);

            let result = fixture.server.handle_request(&sender, *command, &[]);

            assert_eq!(result, RpcResult::failure(command.family()), "{command}");
            assert!(fixture.router.contains(sender.id()), "{command}");
        }
    }

    #[test]
    fn content() {
        let fixture = fixture();
        let (_, sender) = peer(7000);

        let hash = fixture.content.put_blob(&b"a contract"[..]);

        assert_eq!(
            fixture.server.handle_request(
                &sender,
                Command::GetContract,
                &[Bytes::copy_from_slice(hash.as_bytes())]
            ),
            RpcResult::Ok(Bytes::from("a contract"))
        );
        assert_eq!(
            fixture.server.handle_request(
                &sender,
                Command::GetImage,
                &[Bytes::copy_from_slice(Id::random().as_bytes())]
            ),
            RpcResult::NotFound
        );
        assert_eq!(
            fixture
                .server
                .handle_request(&sender, Command::GetImage, &[Bytes::from("short")]),
            RpcResult::NotFound
        );
    }

    #[test]
    fn signed_profile() {
        let fixture = fixture();
        let (_, sender) = peer(7000);

        let profile = Profile {
            name: "Alice".to_string(),
            handle: "@alice".to_string(),
            country_code: "CH".to_string(),
            ..Default::default()
        };
        fixture.profiles.set_profile(profile.clone());

        let result = fixture
            .server
            .handle_request(&sender, Command::GetProfile, &[]);

        assert!(result.verify(&fixture.keys.public_key()));
        assert_eq!(
            Profile::from_bytes(result.payload().unwrap()).unwrap(),
            profile
        );
    }

    #[test]
    fn store_fault_is_not_found() {
        let fixture = fixture();
        let server = MarketServer {
            profiles: Arc::new(BrokenProfiles),
            ..fixture.server
        };
        let (_, sender) = peer(7000);

        assert_eq!(
            server.handle_request(&sender, Command::GetProfile, &[]),
            RpcResult::NotFound
        );
        assert_eq!(
            server.handle_request(&sender, Command::GetUserMetadata, &[]),
            RpcResult::NotFound
        );
    }

    #[test]
    fn contract_metadata_dispatch() {
        let fixture = fixture();
        let (_, sender) = peer(7000);

        let hash = Id::hash(b"contract");
        fixture
            .content
            .set_listings(&Listings {
                listing: vec![Listing::new(hash, "Bike", 30000, "USD")],
            })
            .unwrap();
        fixture.profiles.set_profile(Profile {
            country_code: "NZ".to_string(),
            ..Default::default()
        });

        let result = fixture.server.handle_request(
            &sender,
            Command::GetContractMetadata,
            &[Bytes::copy_from_slice(hash.as_bytes())],
        );

        assert!(result.verify(&fixture.keys.public_key()));
        let listing = Listing::from_bytes(result.payload().unwrap()).unwrap();
        assert_eq!(listing.country_code, "NZ");
    }

    #[test]
    fn follow_dispatch() {
        let fixture = fixture();
        let (keys, sender) = peer(7000);

        let signature = keys.sign(&encode_follow_signable(
            FollowAction::Follow,
            sender.id(),
            fixture.server.id(),
        ));

        assert_eq!(
            fixture.server.handle_request(
                &sender,
                Command::Follow,
                &[Bytes::copy_from_slice(&signature)]
            ),
            RpcResult::success()
        );
        assert_eq!(fixture.follows.followers().unwrap().len(), 1);
    }

    #[test]
    fn spoofed_sender_does_not_move_contact() {
        let fixture = fixture();
        let (_, bob) = peer(7001);

        fixture
            .server
            .handle_request(&bob, Command::GetProfile, &[]);

        // Same id, but a key that is not bound to it, from elsewhere.
        let spoofed = Node::new(*bob.id(), SocketAddr::from(([10, 0, 0, 9], 6666)), [9; 32]);
        fixture
            .server
            .handle_request(&spoofed, Command::GetProfile, &[]);

        let stored = fixture.router.snapshot().get(bob.id()).unwrap().clone();
        assert_eq!(stored.address(), bob.address());
        assert_eq!(stored.public_key(), bob.public_key());
    }
}
