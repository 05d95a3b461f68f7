use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetResourceRequest {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub tag: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SetResourceResponse {
    /// Present only when the write routed to a collaborator that answers
    /// with a payload (e.g. a mint returning the token id).
    pub data: Option<Vec<u8>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GetResourceRequest {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub tag: String,
    /// Type-specific disambiguation payload, e.g. a PEM CSR for server
    /// certificate bundles. Empty for most resource types.
    #[serde(default)]
    pub extra_request: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GetResourceResponse {
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DeleteResourceRequest {
    pub address: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub tag: String,
    /// Collaborator payload (e.g. the burn meta-transaction); unused for
    /// plain storage deletions.
    #[serde(default)]
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifySeedsRequest {
    pub seeds: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifySeedsResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyCommandsRequest {
    pub commands: String,
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerifyCommandsResponse {
    pub valid: bool,
}
