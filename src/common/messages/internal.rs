use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketMessage {
    #[serde(rename = "t", with = "serde_bytes")]
    pub transaction_id: Vec<u8>,

    #[serde(flatten)]
    pub variant: MarketMessageVariant,
}

impl MarketMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<MarketMessage, serde_bencode::Error> {
        let obj = serde_bencode::from_bytes(bytes)?;
        Ok(obj)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_bencode::Error> {
        serde_bencode::to_bytes(self)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "y")]
pub enum MarketMessageVariant {
    #[serde(rename = "q")]
    Request {
        #[serde(rename = "q")]
        method: String,

        #[serde(rename = "a")]
        arguments: MarketRequestArguments,
    },

    #[serde(rename = "r")]
    Response {
        #[serde(rename = "r")]
        frames: Vec<ByteBuf>,
    },

    #[serde(rename = "e")]
    Error {
        #[serde(rename = "e")]
        error_info: (i32, String),
    },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MarketRequestArguments {
    /// Requester's node id
    #[serde(with = "serde_bytes")]
    pub id: Vec<u8>,

    /// Requester's ed25519 public key
    #[serde(with = "serde_bytes")]
    pub k: Vec<u8>,

    #[serde(default)]
    pub args: Vec<ByteBuf>,
}
