//! Per-type derivation functions.
//!
//! Each function is a pure mapping from `(sub-seed, tag)` to artifact
//! bytes: identical inputs always yield byte-identical output. Certificate
//! bundles are the one exception and live in [`crate::ca`], because they
//! need the persisted certificate authority.

use keybroker::crypto::{expand_sub_seed, secp256k1_keypair_from_bytes, secp256k1_public_key_pem};
use keybroker::request_types::{VerificationPolicy, POLICY_ALGORITHM, POLICY_FORMAT_VERSION};
use keybroker::{Error, ResourceKind, ValidatedSeeds};

/// Intended usage of a derived key; the label feeds HKDF domain separation.
#[derive(Debug, Clone, Copy)]
pub(crate) enum DerivePurpose {
    EcSigning,
    IdentityPrivate,
    IdentityWrapping,
    StorageRoot,
    AttestationSigning,
    CertificateAuthority,
    ClientLeaf,
}

impl DerivePurpose {
    pub(crate) const fn label(self) -> &'static str {
        match self {
            Self::EcSigning => "ec-signing",
            Self::IdentityPrivate => "identity-private",
            Self::IdentityWrapping => "identity-wrapping",
            Self::StorageRoot => "storage-root",
            Self::AttestationSigning => "attestation-signing",
            Self::CertificateAuthority => "certificate-authority",
            Self::ClientLeaf => "client-leaf",
        }
    }
}

/// Parse a numeric tag as a u32 key index.
pub fn parse_index(tag: &str) -> Result<u32, Error> {
    tag.parse::<u32>()
        .map_err(|_| Error::InvalidTag(format!("expected a u32 key index, got {tag:?}")))
}

/// Parse a policy tag of the form `<index>:<imageReference>`, splitting on
/// the first separator so image references may themselves contain colons.
pub fn parse_policy_tag(tag: &str) -> Result<(u32, &str), Error> {
    let (index, image) = tag.split_once(':').ok_or_else(|| {
        Error::InvalidTag(format!("expected <index>:<imageReference>, got {tag:?}"))
    })?;
    Ok((parse_index(index)?, image))
}

/// Dispatch a derivable type to its derivation function.
pub fn derive(kind: ResourceKind, seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    match kind {
        ResourceKind::EcSigningKey => ec_signing_key(seeds, tag),
        ResourceKind::EcPublicKey => ec_public_key(seeds, tag),
        ResourceKind::IdentityPrivateKey => identity_private_key(seeds, tag),
        ResourceKind::IdentityVerificationPolicy => identity_verification_policy(seeds, tag),
        ResourceKind::IdentityWrappingKey => identity_wrapping_key(seeds, tag),
        ResourceKind::FilesystemStorageRootKey => filesystem_storage_root_key(seeds, tag),
        ResourceKind::AttestationSigningKey => attestation_signing_key(seeds, tag),
        // issued through the certificate authority, not derivable here
        ResourceKind::CertificateBundle => Err(Error::UnsupportedType(kind.to_string())),
    }
}

/// Raw secp256k1 private scalar for the indexed signing key.
pub fn ec_signing_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let index = parse_index(tag)?;
    let bytes = expand_sub_seed(seeds.ec(), DerivePurpose::EcSigning.label(), index);
    let (sk, _) = secp256k1_keypair_from_bytes(&bytes)?;
    Ok(sk.secret_bytes().to_vec())
}

/// PEM public half of the indexed signing key.
pub fn ec_public_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let index = parse_index(tag)?;
    let bytes = expand_sub_seed(seeds.ec(), DerivePurpose::EcSigning.label(), index);
    let (_, pk) = secp256k1_keypair_from_bytes(&bytes)?;
    secp256k1_public_key_pem(&pk)
}

pub fn identity_private_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let index = parse_index(tag)?;
    Ok(expand_sub_seed(seeds.identity(), DerivePurpose::IdentityPrivate.label(), index).to_vec())
}

pub fn identity_wrapping_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let index = parse_index(tag)?;
    Ok(expand_sub_seed(seeds.identity(), DerivePurpose::IdentityWrapping.label(), index).to_vec())
}

pub fn filesystem_storage_root_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let token_id = parse_index(tag)?;
    Ok(expand_sub_seed(seeds.filesystem(), DerivePurpose::StorageRoot.label(), token_id).to_vec())
}

pub fn attestation_signing_key(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let index = parse_index(tag)?;
    Ok(
        expand_sub_seed(seeds.attestation(), DerivePurpose::AttestationSigning.label(), index)
            .to_vec(),
    )
}

/// JSON policy document binding the indexed identity public key to one
/// image reference. The document is deterministic: no timestamps, no
/// randomness, stable field order.
pub fn identity_verification_policy(seeds: &ValidatedSeeds, tag: &str) -> Result<Vec<u8>, Error> {
    let (index, image) = parse_policy_tag(tag)?;
    let bytes = expand_sub_seed(seeds.identity(), DerivePurpose::IdentityPrivate.label(), index);
    let (_, pk) = secp256k1_keypair_from_bytes(&bytes)?;
    let pem = secp256k1_public_key_pem(&pk)?;
    let policy = VerificationPolicy {
        version: POLICY_FORMAT_VERSION,
        image: image.to_string(),
        key_index: index,
        algorithm: POLICY_ALGORITHM.to_string(),
        public_key_pem: String::from_utf8(pem)
            .map_err(|e| Error::Crypto(format!("public key PEM is not UTF-8: {e}")))?,
    };
    Ok(serde_json::to_vec(&policy).expect("policy document serializes"))
}
