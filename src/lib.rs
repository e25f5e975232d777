#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;
mod error;
mod market;

pub mod rpc;
pub mod server;
pub mod store;

pub use crate::common::{
    decode_follow_records, encode_follow_records, encode_follow_signable, messages, Command,
    CommandFamily, FollowAction, FollowRecord, Id, Listing, Listings, Node, Profile, Router,
    RoutingTable, RpcResult, SharedRoutingTable, UserMetadata, ID_SIZE, MAX_BUCKET_SIZE_K,
    SIGNATURE_SIZE,
};
pub use error::{Error, Result};
pub use market::{MarketNode, MarketNodeBuilder};

pub use bytes::Bytes;
pub use ed25519_dalek::SigningKey;
