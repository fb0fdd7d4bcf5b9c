use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::null_to_default;

pub type ChainId = u32;

/// A chain as served by the registry `/chains` endpoint.
///
/// Statistics and links are kept verbatim in `stats` so that a snapshot
/// round-trips every field the registry sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chain {
    pub id: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub prefix: i64,
    #[serde(rename = "chainID")]
    pub chain_id: ChainId,
    #[serde(default, deserialize_with = "null_to_default")]
    pub chain_name: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub relay_chain: String,
    #[serde(default, deserialize_with = "null_to_default")]
    pub icon_url: String,
    #[serde(flatten)]
    pub stats: Map<String, Value>,
}

impl Chain {
    pub fn is_relay(&self) -> bool {
        self.id == self.relay_chain
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayChainMetadata {
    #[serde(rename = "chainID")]
    pub chain_id: ChainId,
    pub name: String,
    pub show_color: String,
    #[serde(rename = "paraChainIDs")]
    pub para_chain_ids: Vec<ChainId>,
}
