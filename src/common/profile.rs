//! Published state of a market node: profile, user metadata and listings.

use serde::{Deserialize, Serialize};

use crate::common::Id;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// The full profile a node publishes about its owner.
pub struct Profile {
    pub name: String,
    pub handle: String,
    #[serde(default)]
    pub about: String,
    #[serde(default)]
    pub short_description: String,
    #[serde(default, with = "int_bool")]
    pub nsfw: bool,
    #[serde(default, with = "int_bool")]
    pub vendor: bool,
    #[serde(default, with = "int_bool")]
    pub moderator: bool,
    /// ISO 3166 alpha-2 code of the country the owner ships from.
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_hash: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_hash: Option<Id>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// The subset of a [Profile] needed to display its owner next to their content.
pub struct UserMetadata {
    pub name: String,
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_hash: Option<Id>,
    #[serde(default, with = "int_bool")]
    pub nsfw: bool,
}

impl From<&Profile> for UserMetadata {
    fn from(profile: &Profile) -> Self {
        UserMetadata {
            name: profile.name.clone(),
            handle: profile.handle.clone(),
            avatar_hash: profile.avatar_hash,
            nsfw: profile.nsfw,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
/// Summary of a single contract offered by a node.
pub struct Listing {
    /// Hash of the full contract, retrievable with `get_contract`.
    pub contract_hash: Id,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_hash: Option<Id>,
    #[serde(default)]
    pub category: String,
    /// Price in minor units of [Self::currency_code].
    pub price: u64,
    pub currency_code: String,
    #[serde(default, with = "int_bool")]
    pub nsfw: bool,
    /// Country the listing ships from, overwritten with the profile's
    /// current country when served as contract metadata.
    #[serde(default)]
    pub country_code: String,
}

impl Listing {
    pub fn new(contract_hash: Id, title: &str, price: u64, currency_code: &str) -> Self {
        Listing {
            contract_hash,
            title: title.to_string(),
            thumbnail_hash: None,
            category: String::new(),
            price,
            currency_code: currency_code.to_string(),
            nsfw: false,
            country_code: String::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Every listing a node offers.
pub struct Listings {
    #[serde(default)]
    pub listing: Vec<Listing>,
}

impl Listings {
    /// Returns the listing of the contract with this hash.
    pub fn find(&self, contract_hash: &Id) -> Option<&Listing> {
        self.listing
            .iter()
            .find(|listing| &listing.contract_hash == contract_hash)
    }
}

macro_rules! bencoded {
    ($($ty:ty),*) => {
        $(
            impl $ty {
                pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
                    serde_bencode::to_bytes(self)
                }

                pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_bencode::Error> {
                    serde_bencode::from_bytes(bytes)
                }
            }
        )*
    };
}

bencoded!(Profile, UserMetadata, Listing, Listings);

/// Bencode has no booleans, encode them as `0` and `1`.
pub(crate) mod int_bool {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(i64::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Ok(i64::deserialize(deserializer)? != 0)
    }
}
