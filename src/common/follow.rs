//! Signed follow relationships between two node ids.

use serde::{Deserialize, Serialize};

use crate::common::{Id, SIGNATURE_SIZE};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// A signed assertion that `follower` follows `following`.
pub struct FollowRecord {
    pub follower: Id,
    pub following: Id,
    /// Signature by the follower over [encode_follow_signable] with [FollowAction::Follow].
    #[serde(with = "serde_bytes")]
    pub signature: [u8; SIGNATURE_SIZE],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// The action a follow signature authorizes.
pub enum FollowAction {
    Follow,
    Unfollow,
}

impl FollowAction {
    fn as_str(&self) -> &'static str {
        match self {
            FollowAction::Follow => "follow",
            FollowAction::Unfollow => "unfollow",
        }
    }
}

/// Canonical bytes signed by `follower` to (un)follow `following`.
pub fn encode_follow_signable(action: FollowAction, follower: &Id, following: &Id) -> Box<[u8]> {
    let action = action.as_str();
    let mut signable = vec![];

    signable.extend(format!("6:action{}:{}", action.len(), action).into_bytes());
    signable.extend(format!("8:follower{}:", follower.as_bytes().len()).into_bytes());
    signable.extend(follower.as_bytes());
    signable.extend(format!("9:following{}:", following.as_bytes().len()).into_bytes());
    signable.extend(following.as_bytes());

    signable.into()
}

/// Encode a list of records as the payload of `get_followers` and `get_following`.
pub fn encode_follow_records(records: &[FollowRecord]) -> Result<Vec<u8>, serde_bencode::Error> {
    serde_bencode::to_bytes(&records)
}

/// Decode the payload of `get_followers` and `get_following`.
pub fn decode_follow_records(bytes: &[u8]) -> Result<Vec<FollowRecord>, serde_bencode::Error> {
    serde_bencode::from_bytes(bytes)
}
