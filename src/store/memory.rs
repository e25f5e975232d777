//! In-memory stores.

use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError, RwLock};

use bytes::Bytes;
use lru::LruCache;

use crate::common::{FollowRecord, Id, Listings, Profile};

use super::{ContentStore, FollowStore, ProfileStore, StoreError};

/// Maximum number of blobs kept by a [MemoryContentStore] before evicting
/// the least recently used.
pub const MAX_VALUES: usize = 1000;

#[derive(Debug)]
/// [ContentStore] keeping blobs in a bounded LRU cache.
pub struct MemoryContentStore {
    blobs: Mutex<LruCache<Id, Bytes>>,
    listings: RwLock<Option<Bytes>>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_VALUES)
    }

    /// Create a store holding at most `capacity` blobs (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);

        Self {
            blobs: Mutex::new(LruCache::new(capacity)),
            listings: RwLock::new(None),
        }
    }

    /// Store a blob under its SHA1 hash and return that hash.
    pub fn put_blob(&self, blob: impl Into<Bytes>) -> Id {
        let blob: Bytes = blob.into();
        let hash = Id::hash(&blob);

        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(hash, blob);

        hash
    }

    /// Replace the published listings.
    pub fn set_listings(&self, listings: &Listings) -> Result<(), StoreError> {
        let bytes = Bytes::from(listings.to_bytes()?);

        *self.listings.write().unwrap_or_else(PoisonError::into_inner) = Some(bytes);

        Ok(())
    }
}

impl Default for MemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore for MemoryContentStore {
    fn get_blob(&self, hash: &Id) -> Result<Bytes, StoreError> {
        self.blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(hash)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn get_listings(&self) -> Result<Bytes, StoreError> {
        self.listings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Default)]
/// [ProfileStore] holding a single profile.
pub struct MemoryProfileStore {
    profile: RwLock<Option<Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_profile(&self, profile: Profile) {
        *self.profile.write().unwrap_or_else(PoisonError::into_inner) = Some(profile);
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get_profile(&self) -> Result<Profile, StoreError> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(StoreError::NotFound)
    }
}

#[derive(Debug, Default)]
/// [FollowStore] keeping both directions in ordered maps.
pub struct MemoryFollowStore {
    followers: RwLock<BTreeMap<Id, FollowRecord>>,
    following: RwLock<BTreeMap<Id, FollowRecord>>,
}

impl MemoryFollowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FollowStore for MemoryFollowStore {
    fn set_follower(&self, record: FollowRecord) -> Result<(), StoreError> {
        self.followers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.follower, record);

        Ok(())
    }

    fn delete_follower(&self, follower: &Id) -> Result<bool, StoreError> {
        Ok(self
            .followers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(follower)
            .is_some())
    }

    fn followers(&self) -> Result<Vec<FollowRecord>, StoreError> {
        Ok(self
            .followers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }

    fn set_following(&self, record: FollowRecord) -> Result<(), StoreError> {
        self.following
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.following, record);

        Ok(())
    }

    fn delete_following(&self, following: &Id) -> Result<bool, StoreError> {
        Ok(self
            .following
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(following)
            .is_some())
    }

    fn following(&self) -> Result<Vec<FollowRecord>, StoreError> {
        Ok(self
            .following
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
