use serde::{Deserialize, Serialize};

/// Current wire version of the verification-policy document.
pub const POLICY_FORMAT_VERSION: u32 = 1;

/// Signature scheme named in verification policies.
pub const POLICY_ALGORITHM: &str = "ecdsa-secp256k1-sha256";

/// The JSON artifact served for `certificate-bundle` resources.
///
/// `key` is the PEM private key for client bundles and empty for server
/// bundles, where the private key never leaves the CSR's author.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CertificateBundle {
    pub cert: String,
    pub key: String,
    pub ca: String,
}

/// The JSON artifact served for `identity-verification-policy` resources:
/// a deterministic document binding the derived public key to one image
/// reference.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct VerificationPolicy {
    pub version: u32,
    pub image: String,
    pub key_index: u32,
    pub algorithm: String,
    pub public_key_pem: String,
}
