//! Cryptographic helpers shared by the derivation functions and the
//! certificate authority.
//!
//! All key material flows through one HKDF-SHA256 expansion scheme: a fixed
//! domain salt, the sub-seed as input keying material, and a purpose label
//! plus big-endian index as the info string. Identical inputs always yield
//! identical output; there is no hidden randomness anywhere in this module.

use hkdf::Hkdf;
use openssl::bn::{BigNum, BigNumContext};
use openssl::ec::{EcGroup, EcKey, EcPoint};
use openssl::nid::Nid;
use openssl::pkey::{PKey, Private};
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use sha2::Sha256;

use crate::errors::Error;
use crate::seed::SubSeed;

/// Domain salt for all purpose-key expansions.
const DERIVE_SALT: &[u8] = b"cfs-keybroker-derive-salt-v1";

/// Expand a sub-seed into 32 bytes of purpose-specific key material.
pub fn expand_sub_seed(seed: &SubSeed, label: &str, index: u32) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(DERIVE_SALT), seed.as_ref());
    let mut info = label.as_bytes().to_vec();
    info.extend_from_slice(&index.to_be_bytes());
    let mut okm = [0u8; 32];
    hk.expand(&info, &mut okm)
        .expect("32 is a valid output length for Sha256");
    okm
}

/// Interpret 32 expanded bytes as a secp256k1 keypair.
///
/// The expansion is rejected by the curve only for the all-zero scalar or a
/// value at or above the group order; both surface as `Crypto` rather than
/// being silently reduced.
pub fn secp256k1_keypair_from_bytes(bytes: &[u8; 32]) -> Result<(SecretKey, PublicKey), Error> {
    let sk = SecretKey::from_slice(bytes)?;
    let pk = PublicKey::from_secret_key(&Secp256k1::new(), &sk);
    Ok((sk, pk))
}

/// Encode a secp256k1 public key as a SubjectPublicKeyInfo PEM block.
pub fn secp256k1_public_key_pem(key: &PublicKey) -> Result<Vec<u8>, Error> {
    let group = EcGroup::from_curve_name(Nid::SECP256K1)?;
    let mut ctx = BigNumContext::new()?;
    let point = EcPoint::from_bytes(&group, &key.serialize_uncompressed(), &mut ctx)?;
    let ec = EcKey::from_public_key(&group, &point)?;
    let pkey = PKey::from_ec_key(ec)?;
    Ok(pkey.public_key_to_pem()?)
}

/// Build a P-256 private key from 32 expanded bytes, reducing the scalar
/// modulo the group order.
pub fn p256_private_key_from_bytes(bytes: &[u8; 32]) -> Result<PKey<Private>, Error> {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1)?;
    let mut ctx = BigNumContext::new()?;
    let mut order = BigNum::new()?;
    group.order(&mut order, &mut ctx)?;

    let raw = BigNum::from_slice(bytes)?;
    let mut scalar = BigNum::new()?;
    scalar.checked_rem(&raw, &order, &mut ctx)?;
    if scalar.num_bits() == 0 {
        return Err(Error::Crypto("derived scalar reduced to zero".to_string()));
    }

    let mut point = EcPoint::new(&group)?;
    point.mul_generator(&group, &scalar, &ctx)?;
    let ec = EcKey::from_private_components(&group, &scalar, &point)?;
    ec.check_key()?;
    Ok(PKey::from_ec_key(ec)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::SubSeed;

    fn sample_seed() -> SubSeed {
        SubSeed::new([7u8; 32])
    }

    #[test]
    fn expansion_is_deterministic() {
        let a = expand_sub_seed(&sample_seed(), "ec-signing", 3);
        let b = expand_sub_seed(&sample_seed(), "ec-signing", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn expansion_separates_labels_and_indices() {
        let base = expand_sub_seed(&sample_seed(), "ec-signing", 0);
        assert_ne!(base, expand_sub_seed(&sample_seed(), "ec-signing", 1));
        assert_ne!(base, expand_sub_seed(&sample_seed(), "identity-private", 0));
    }

    #[test]
    fn secp256k1_pem_has_spki_header() {
        let bytes = expand_sub_seed(&sample_seed(), "ec-signing", 0);
        let (_, pk) = secp256k1_keypair_from_bytes(&bytes).unwrap();
        let pem = secp256k1_public_key_pem(&pk).unwrap();
        assert!(pem.starts_with(b"-----BEGIN PUBLIC KEY-----"));
    }

    #[test]
    fn p256_key_is_reproducible() {
        let bytes = expand_sub_seed(&sample_seed(), "certificate-authority", 0);
        let a = p256_private_key_from_bytes(&bytes).unwrap();
        let b = p256_private_key_from_bytes(&bytes).unwrap();
        assert_eq!(
            a.private_key_to_pem_pkcs8().unwrap(),
            b.private_key_to_pem_pkcs8().unwrap()
        );
    }

    #[test]
    fn zero_expansion_is_rejected() {
        assert!(matches!(
            secp256k1_keypair_from_bytes(&[0u8; 32]),
            Err(Error::Crypto(_))
        ));
    }
}
