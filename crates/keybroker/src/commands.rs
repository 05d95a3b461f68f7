//! Signed command bundles.
//!
//! A command bundle authorizes a list of management commands for one
//! address: the list is signed with a recoverable secp256k1 ECDSA signature
//! over the SHA-256 digest of the canonical JSON command array, and the
//! bundle is valid for an address exactly when the recovered public key
//! binds to it.

use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::address::{Address, ADDRESS_BYTES};
use crate::errors::Error;

/// Compact signature plus one trailing recovery-id byte.
const SIGNATURE_BYTES: usize = 65;

#[derive(Serialize, Deserialize)]
struct RawCommandBundle {
    commands: Vec<String>,
    signature: String,
}

/// A parsed command bundle; validity against an address is checked
/// separately with [`CommandBundle::verify`].
#[derive(Debug, Clone)]
pub struct CommandBundle {
    commands: Vec<String>,
    signature: RecoverableSignature,
}

/// The address a public key binds to: the first 20 bytes of the SHA-256
/// digest of the uncompressed key.
pub fn key_address(key: &PublicKey) -> Address {
    let digest = Sha256::digest(key.serialize_uncompressed());
    let mut bytes = [0u8; ADDRESS_BYTES];
    bytes.copy_from_slice(&digest[..ADDRESS_BYTES]);
    Address::from_bytes(bytes)
}

impl CommandBundle {
    /// Parse a serialized bundle. Structural failures are
    /// `MalformedCommands`; signature mismatches are not (those surface as
    /// a `false` verification result).
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let raw: RawCommandBundle =
            serde_json::from_slice(raw).map_err(|e| Error::MalformedCommands(e.to_string()))?;
        let mut sig_bytes = [0u8; SIGNATURE_BYTES];
        hex::decode_to_slice(&raw.signature, &mut sig_bytes).map_err(|_| {
            Error::MalformedCommands(format!(
                "signature must be {} hex characters",
                SIGNATURE_BYTES * 2
            ))
        })?;
        let recovery_id = RecoveryId::try_from(i32::from(sig_bytes[SIGNATURE_BYTES - 1]))
            .map_err(|_| Error::MalformedCommands("recovery id out of range".to_string()))?;
        let signature =
            RecoverableSignature::from_compact(&sig_bytes[..SIGNATURE_BYTES - 1], recovery_id)
                .map_err(|e| Error::MalformedCommands(e.to_string()))?;
        Ok(Self {
            commands: raw.commands,
            signature,
        })
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    fn digest(commands: &[String]) -> Message {
        let canonical = serde_json::to_vec(commands).expect("command list serializes");
        let hash: [u8; 32] = Sha256::digest(&canonical).into();
        Message::from_digest(hash)
    }

    /// Whether the bundle was signed by a key binding to `address`.
    pub fn verify(&self, address: &Address) -> bool {
        let secp = Secp256k1::new();
        match secp.recover_ecdsa(&Self::digest(&self.commands), &self.signature) {
            Ok(key) => key_address(&key) == *address,
            Err(_) => false,
        }
    }

    /// Sign a command list. Used by provisioning tooling and tests.
    pub fn sign(commands: Vec<String>, key: &SecretKey) -> Self {
        let secp = Secp256k1::new();
        let signature = secp.sign_ecdsa_recoverable(&Self::digest(&commands), key);
        Self {
            commands,
            signature,
        }
    }

    /// Serialize to the canonical JSON wire form.
    pub fn to_json(&self) -> Vec<u8> {
        let (recovery_id, compact) = self.signature.serialize_compact();
        let mut sig_bytes = [0u8; SIGNATURE_BYTES];
        sig_bytes[..SIGNATURE_BYTES - 1].copy_from_slice(&compact);
        sig_bytes[SIGNATURE_BYTES - 1] = i32::from(recovery_id) as u8;
        let raw = RawCommandBundle {
            commands: self.commands.clone(),
            signature: hex::encode(sig_bytes),
        };
        serde_json::to_vec(&raw).expect("command bundle serializes")
    }
}
