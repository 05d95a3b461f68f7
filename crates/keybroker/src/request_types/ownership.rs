//! Wire types for the filesystem-ownership collaborator.
//!
//! The broker treats the ownership service as a black box: it forwards
//! meta-transactions for minting and burning filesystem tokens and reads
//! back ownership records and chain configuration. Field names follow the
//! collaborator's JSON conventions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MetaTxForwardRequest {
    pub from: String,
    pub to: String,
    /// Decimal string; the collaborator parses it as a big integer.
    pub value: String,
    pub gas: String,
    pub nonce: String,
    pub deadline: u64,
    pub data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MintFilesystemRequest {
    #[serde(rename = "metaTxRequest")]
    pub meta_tx_request: MetaTxForwardRequest,
    #[serde(rename = "metaTxSignature")]
    pub meta_tx_signature: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MintFilesystemResponse {
    pub token_id: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BurnFilesystemRequest {
    #[serde(rename = "metaTxRequest")]
    pub meta_tx_request: MetaTxForwardRequest,
    #[serde(rename = "metaTxSignature")]
    pub meta_tx_signature: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FilesystemRecord {
    pub owner: String,
    #[serde(rename = "tokenId")]
    pub token_id: String,
    #[serde(rename = "tokenUri")]
    pub token_uri: String,
    pub meta: Value,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AccountMetaResponse {
    #[serde(rename = "chainConfig")]
    pub chain_config: Value,
    pub contracts: Value,
    pub nonce: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WellKnownConfig {
    #[serde(rename = "chainConfig")]
    pub chain_config: Value,
}
