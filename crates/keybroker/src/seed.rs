//! Seed bundles.
//!
//! A seed bundle is the caller-supplied secret material from which every
//! per-address key is derived. It is owned transiently: the engine
//! reconstructs it from the stored blob on every call and drops it after
//! use, and the sub-seeds are wiped from memory on drop.
//!
//! Validation is enforced in the type system: derivation functions accept
//! only [`ValidatedSeeds`], which can be obtained solely by checking the
//! bundle's address binding.

use hkdf::Hkdf;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::address::{Address, ADDRESS_BYTES};
use crate::errors::Error;

pub const SUB_SEED_BYTES: usize = 32;

/// Salt for the HKDF run that binds a bundle to its address.
const BINDING_SALT: &[u8] = b"cfs-keybroker-seed-binding-v1";
const BINDING_INFO: &[u8] = b"address-binding";

/// A named 32-byte component of a seed bundle, dedicated to one key family.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SubSeed([u8; SUB_SEED_BYTES]);

impl SubSeed {
    pub fn new(data: [u8; SUB_SEED_BYTES]) -> Self {
        Self(data)
    }

    fn from_hex(field: &str, value: &str) -> Result<Self, Error> {
        let mut data = [0u8; SUB_SEED_BYTES];
        hex::decode_to_slice(value, &mut data).map_err(|_| {
            Error::MalformedSeed(format!(
                "field {field:?} must be {} hex characters",
                SUB_SEED_BYTES * 2
            ))
        })?;
        Ok(Self(data))
    }
}

impl AsRef<[u8]> for SubSeed {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for SubSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print seed material
        f.write_str("SubSeed(..)")
    }
}

/// Serialized form of a bundle: exactly these fields, hex-encoded.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawBundle {
    ec: String,
    identity: String,
    ca: String,
    filesystem: String,
    attestation: String,
}

/// A parsed but not yet validated seed bundle.
#[derive(Debug, Clone)]
pub struct SeedBundle {
    ec: SubSeed,
    identity: SubSeed,
    ca: SubSeed,
    filesystem: SubSeed,
    attestation: SubSeed,
}

impl SeedBundle {
    /// Parse a serialized bundle. Structural failures (bad JSON, unknown or
    /// missing fields, bad hex, wrong length) are `MalformedSeed`.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        let raw: RawBundle =
            serde_json::from_slice(raw).map_err(|e| Error::MalformedSeed(e.to_string()))?;
        Ok(Self {
            ec: SubSeed::from_hex("ec", &raw.ec)?,
            identity: SubSeed::from_hex("identity", &raw.identity)?,
            ca: SubSeed::from_hex("ca", &raw.ca)?,
            filesystem: SubSeed::from_hex("filesystem", &raw.filesystem)?,
            attestation: SubSeed::from_hex("attestation", &raw.attestation)?,
        })
    }

    /// The address this bundle binds to, derived from all five sub-seeds.
    pub fn bound_address(&self) -> Address {
        let mut ikm = Vec::with_capacity(5 * SUB_SEED_BYTES);
        for seed in [
            &self.ec,
            &self.identity,
            &self.ca,
            &self.filesystem,
            &self.attestation,
        ] {
            ikm.extend_from_slice(seed.as_ref());
        }
        let hk = Hkdf::<Sha256>::new(Some(BINDING_SALT), &ikm);
        let mut binding = [0u8; ADDRESS_BYTES];
        hk.expand(BINDING_INFO, &mut binding)
            .expect("20 is a valid output length for Sha256");
        ikm.zeroize();
        Address::from_bytes(binding)
    }

    /// Whether the bundle's integrity check holds for `address`.
    pub fn binds_to(&self, address: &Address) -> bool {
        self.bound_address() == *address
    }

    /// Consume the bundle, yielding seeds usable for derivation, or
    /// `SeedInvalid` when the binding check fails. Callers must treat the
    /// failure as "seed rejected": no sub-seed is accessible afterwards.
    pub fn into_validated(self, address: Address) -> Result<ValidatedSeeds, Error> {
        if !self.binds_to(&address) {
            return Err(Error::SeedInvalid);
        }
        Ok(ValidatedSeeds {
            bundle: self,
            address,
        })
    }

    /// Generate a fresh random bundle together with the address it binds to.
    /// Used by provisioning tooling and tests; the broker itself never
    /// creates seed material.
    pub fn generate() -> (Self, Address) {
        let mut rng = rand::rng();
        let mut seed = || {
            let mut data = [0u8; SUB_SEED_BYTES];
            rng.fill_bytes(&mut data);
            SubSeed::new(data)
        };
        let bundle = Self {
            ec: seed(),
            identity: seed(),
            ca: seed(),
            filesystem: seed(),
            attestation: seed(),
        };
        let address = bundle.bound_address();
        (bundle, address)
    }

    /// Serialize to the canonical JSON wire form.
    pub fn to_json(&self) -> Vec<u8> {
        let raw = RawBundle {
            ec: hex::encode(self.ec.as_ref()),
            identity: hex::encode(self.identity.as_ref()),
            ca: hex::encode(self.ca.as_ref()),
            filesystem: hex::encode(self.filesystem.as_ref()),
            attestation: hex::encode(self.attestation.as_ref()),
        };
        serde_json::to_vec(&raw).expect("seed bundle serializes")
    }
}

/// A seed bundle whose address binding has been checked.
#[derive(Debug)]
pub struct ValidatedSeeds {
    bundle: SeedBundle,
    address: Address,
}

impl ValidatedSeeds {
    pub const fn address(&self) -> &Address {
        &self.address
    }

    pub const fn ec(&self) -> &SubSeed {
        &self.bundle.ec
    }

    pub const fn identity(&self) -> &SubSeed {
        &self.bundle.identity
    }

    pub const fn ca(&self) -> &SubSeed {
        &self.bundle.ca
    }

    pub const fn filesystem(&self) -> &SubSeed {
        &self.bundle.filesystem
    }

    pub const fn attestation(&self) -> &SubSeed {
        &self.bundle.attestation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_bundle_round_trips() {
        let (bundle, address) = SeedBundle::generate();
        let parsed = SeedBundle::parse(&bundle.to_json()).unwrap();
        assert!(parsed.binds_to(&address));
    }

    #[test]
    fn rejects_structural_garbage() {
        assert!(matches!(
            SeedBundle::parse(b"not json"),
            Err(Error::MalformedSeed(_))
        ));
        assert!(matches!(
            SeedBundle::parse(b"{\"ec\":\"abcd\"}"),
            Err(Error::MalformedSeed(_))
        ));
    }

    #[test]
    fn rejects_unknown_fields() {
        let (bundle, _) = SeedBundle::generate();
        let mut value: serde_json::Value = serde_json::from_slice(&bundle.to_json()).unwrap();
        value["extra"] = serde_json::json!("00");
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            SeedBundle::parse(&raw),
            Err(Error::MalformedSeed(_))
        ));
    }

    #[test]
    fn rejects_short_sub_seed() {
        let (bundle, _) = SeedBundle::generate();
        let mut value: serde_json::Value = serde_json::from_slice(&bundle.to_json()).unwrap();
        value["ec"] = serde_json::json!("abcd");
        let raw = serde_json::to_vec(&value).unwrap();
        assert!(matches!(
            SeedBundle::parse(&raw),
            Err(Error::MalformedSeed(_))
        ));
    }

    #[test]
    fn validation_refuses_foreign_address() {
        let (bundle, _) = SeedBundle::generate();
        let (_, other_address) = SeedBundle::generate();
        assert!(!bundle.binds_to(&other_address));
        assert!(matches!(
            bundle.into_validated(other_address),
            Err(Error::SeedInvalid)
        ));
    }

    #[test]
    fn validation_accepts_bound_address() {
        let (bundle, address) = SeedBundle::generate();
        let seeds = bundle.into_validated(address).unwrap();
        assert_eq!(*seeds.address(), address);
    }
}
