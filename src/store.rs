//! Node-local published state and signing keys, as consumed by the protocol handlers.
//!
//! Each concern is a trait so the node can be backed by any storage, with
//! reference implementations in this module.

mod directory;
mod keys;
mod memory;

use std::fmt::Debug;

use bytes::Bytes;

use crate::common::{FollowRecord, Id, Profile, SIGNATURE_SIZE};

pub use directory::DirectoryContentStore;
pub use keys::Ed25519KeyStore;
pub use memory::{MemoryContentStore, MemoryFollowStore, MemoryProfileStore};

#[derive(thiserror::Error, Debug)]
/// Errors reading or writing node-local state.
pub enum StoreError {
    /// Nothing is stored under the requested key.
    #[error("Not found")]
    NotFound,

    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    /// Stored bytes could not be decoded.
    #[error("Corrupted record: {0}")]
    Corrupted(#[from] serde_bencode::Error),

    /// Stored blob does not hash to the key it is stored under.
    #[error("Corrupted blob: content does not match {0}")]
    HashMismatch(Id),
}

/// Content addressed blobs (contracts, images) and the serialized listings.
pub trait ContentStore: Debug + Send + Sync {
    /// Returns the whole blob stored under `hash`.
    fn get_blob(&self, hash: &Id) -> Result<Bytes, StoreError>;

    /// Returns the bencoded [crate::Listings] this node publishes.
    fn get_listings(&self) -> Result<Bytes, StoreError>;
}

/// The profile of this node's owner.
pub trait ProfileStore: Debug + Send + Sync {
    fn get_profile(&self) -> Result<Profile, StoreError>;
}

/// Follow relationships of this node, in both directions.
///
/// Writes to a single key must be atomic.
pub trait FollowStore: Debug + Send + Sync {
    /// Insert or overwrite the record keyed by `record.follower`.
    fn set_follower(&self, record: FollowRecord) -> Result<(), StoreError>;

    /// Delete the record of `follower`, returning `true` if it existed.
    fn delete_follower(&self, follower: &Id) -> Result<bool, StoreError>;

    /// Every node following this node.
    fn followers(&self) -> Result<Vec<FollowRecord>, StoreError>;

    /// Insert or overwrite the record keyed by `record.following`.
    fn set_following(&self, record: FollowRecord) -> Result<(), StoreError>;

    /// Delete the record of `following`, returning `true` if it existed.
    fn delete_following(&self, following: &Id) -> Result<bool, StoreError>;

    /// Every node this node follows.
    fn following(&self) -> Result<Vec<FollowRecord>, StoreError>;
}

/// Signing identity of this node.
pub trait KeyStore: Debug + Send + Sync {
    /// The ed25519 public key this node advertises.
    fn public_key(&self) -> [u8; 32];

    /// Detached signature over `message`.
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE];

    /// Verify a detached `signature` over `message` made by `public_key`.
    fn verify(&self, public_key: &[u8; 32], message: &[u8], signature: &[u8]) -> bool;

    /// The node id bound to [Self::public_key].
    fn id(&self) -> Id {
        Id::from_public_key(&self.public_key())
    }
}
