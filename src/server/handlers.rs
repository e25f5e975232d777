//! Handlers of each [crate::Command] answered by [MarketServer].

use bytes::Bytes;
use tracing::{debug, trace};

use crate::common::{
    encode_follow_records, encode_follow_signable, FollowAction, FollowRecord, Id, Listings,
    Node, RpcResult, UserMetadata, SIGNATURE_SIZE,
};
use crate::store::StoreError;

use super::MarketServer;

#[derive(thiserror::Error, Debug)]
/// Why a handler could not produce a successful [RpcResult].
///
/// Never sent to the requester, collapsed into the failure of the command's family.
pub(crate) enum HandlerError {
    #[error("Not found")]
    NotFound,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Authentication failed: {0}")]
    AuthFailed(&'static str),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_bencode::Error),
}

impl From<StoreError> for HandlerError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::NotFound => HandlerError::NotFound,
            error => HandlerError::Store(error),
        }
    }
}

type HandlerResult = Result<RpcResult, HandlerError>;

fn hash_argument(args: &[Bytes]) -> Result<Id, HandlerError> {
    let [hash, ..] = args else {
        return Err(HandlerError::InvalidArgument("missing hash"));
    };

    Id::from_bytes(hash).map_err(|_| HandlerError::InvalidArgument("hash is not 20 bytes"))
}

fn signature_argument(args: &[Bytes]) -> Result<&[u8], HandlerError> {
    match args {
        [signature, ..] if signature.len() == SIGNATURE_SIZE => Ok(&signature[..]),
        [_, ..] => Err(HandlerError::AuthFailed("signature is not 64 bytes")),
        [] => Err(HandlerError::AuthFailed("missing signature")),
    }
}

impl MarketServer {
    /// `get_contract` and `get_image`: the whole blob stored under a hash.
    pub(super) fn get_blob(&self, args: &[Bytes]) -> HandlerResult {
        let hash = hash_argument(args)?;
        trace!(?hash, "Looking up blob");

        let blob = self.content.get_blob(&hash)?;
        debug!(?hash, size = blob.len(), "Serving blob");

        Ok(RpcResult::Ok(blob))
    }

    pub(super) fn get_profile(&self) -> HandlerResult {
        let profile = self.profiles.get_profile()?;
        trace!(handle = %profile.handle, "Serving profile");

        Ok(self.signer.sign(profile.to_bytes()?))
    }

    pub(super) fn get_user_metadata(&self) -> HandlerResult {
        let profile = self.profiles.get_profile()?;
        let metadata = UserMetadata::from(&profile);
        trace!(handle = %metadata.handle, "Serving user metadata");

        Ok(self.signer.sign(metadata.to_bytes()?))
    }

    pub(super) fn get_listings(&self) -> HandlerResult {
        let listings = self.content.get_listings()?;
        trace!(size = listings.len(), "Serving listings");

        Ok(self.signer.sign(listings))
    }

    /// The listing of a single contract, shipping from the profile's current country.
    pub(super) fn get_contract_metadata(&self, args: &[Bytes]) -> HandlerResult {
        let contract_hash = hash_argument(args)?;
        trace!(?contract_hash, "Looking up contract metadata");

        let listings = Listings::from_bytes(&self.content.get_listings()?)?;
        let mut listing = listings
            .find(&contract_hash)
            .cloned()
            .ok_or(HandlerError::NotFound)?;

        let profile = self.profiles.get_profile()?;
        if listing.country_code != profile.country_code {
            trace!(
                ?contract_hash,
                stored = %listing.country_code,
                current = %profile.country_code,
                "Replacing listing country code"
            );
        }
        listing.country_code = profile.country_code;

        Ok(self.signer.sign(listing.to_bytes()?))
    }

    pub(super) fn follow(&self, sender: &Node, args: &[Bytes]) -> HandlerResult {
        trace!(from = ?sender.id(), "Follow request");
        let signature = self.verify_relationship(FollowAction::Follow, sender, args)?;

        let record = FollowRecord {
            follower: *sender.id(),
            following: self.id,
            signature,
        };
        self.follows.set_follower(record)?;

        debug!(follower = ?sender.id(), "New follower");

        Ok(RpcResult::success())
    }

    pub(super) fn unfollow(&self, sender: &Node, args: &[Bytes]) -> HandlerResult {
        trace!(from = ?sender.id(), "Unfollow request");
        self.verify_relationship(FollowAction::Unfollow, sender, args)?;

        if !self.follows.delete_follower(sender.id())? {
            return Err(HandlerError::AuthFailed("not a follower"));
        }

        debug!(follower = ?sender.id(), "Follower left");

        Ok(RpcResult::success())
    }

    pub(super) fn get_followers(&self) -> HandlerResult {
        let followers = self.follows.followers()?;
        trace!(count = followers.len(), "Serving followers");

        follow_records(followers)
    }

    pub(super) fn get_following(&self) -> HandlerResult {
        let following = self.follows.following()?;
        trace!(count = following.len(), "Serving following");

        follow_records(following)
    }

    /// Check that `sender` signed `action` toward this node with its own bound key.
    fn verify_relationship(
        &self,
        action: FollowAction,
        sender: &Node,
        args: &[Bytes],
    ) -> Result<[u8; SIGNATURE_SIZE], HandlerError> {
        let signature = signature_argument(args)?;

        if !sender.has_bound_key() {
            return Err(HandlerError::AuthFailed("key is not bound to the sender id"));
        }

        let signable = encode_follow_signable(action, sender.id(), &self.id);

        if !self
            .signer
            .keys()
            .verify(sender.public_key(), &signable, signature)
        {
            return Err(HandlerError::AuthFailed("invalid signature"));
        }

        signature
            .try_into()
            .map_err(|_| HandlerError::AuthFailed("signature is not 64 bytes"))
    }
}

fn follow_records(records: Vec<FollowRecord>) -> HandlerResult {
    if records.is_empty() {
        return Err(HandlerError::NotFound);
    }

    Ok(RpcResult::Ok(encode_follow_records(&records)?.into()))
}
