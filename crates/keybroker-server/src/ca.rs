//! Per-address certificate authority.
//!
//! The CA private key is a pure function of the CA sub-seed and is cheaply
//! recomputed on every call. The CA certificate is not: certificate
//! generation embeds a random serial and wall-clock validity dates, so the
//! certificate is created once, persisted through the storage backend, and
//! reused forever after. Creation uses the backend's atomic
//! create-if-absent, so concurrent first-time callers converge on a single
//! persisted certificate: losers discard their candidate and serve the
//! winner's.
//!
//! Leaf certificates are deliberately NOT cached; every bundle request
//! issues a fresh leaf with a fresh serial, while the embedded keys stay
//! deterministic.

use keybroker::crypto::{expand_sub_seed, p256_private_key_from_bytes};
use keybroker::kind::{CA_TAG, CA_TYPE};
use keybroker::request_types::CertificateBundle;
use keybroker::{Address, Error, ValidatedSeeds};

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKey, PKeyRef, Private};
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Name, X509NameRef, X509Req, X509};
use std::fmt;
use tracing::debug;

use crate::derivation::DerivePurpose;
use crate::storage::StorageBackend;

const X509_VERSION_3: i32 = 2; // X509 version 3 is represented by 2
const SERIAL_BITS: i32 = 128;
const CA_VALIDITY_DAYS: u32 = 3650;
const LEAF_VALIDITY_DAYS: u32 = 365;

/// A usable CA for one address: the recomputed private key plus the
/// persisted certificate.
pub struct CertificateAuthority {
    cert_pem: Vec<u8>,
    key: PKey<Private>,
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("cert_pem", &self.cert_pem.len())
            .finish_non_exhaustive()
    }
}

/// The deterministic CA private key for this seed bundle.
pub(crate) fn ca_private_key(seeds: &ValidatedSeeds) -> Result<PKey<Private>, Error> {
    let bytes = expand_sub_seed(seeds.ca(), DerivePurpose::CertificateAuthority.label(), 0);
    p256_private_key_from_bytes(&bytes)
}

fn random_serial() -> Result<openssl::asn1::Asn1Integer, Error> {
    let mut serial = BigNum::new()?;
    serial.rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)?;
    Ok(serial.to_asn1_integer()?)
}

fn name_with_cn(cn: &str) -> Result<X509Name, Error> {
    let mut builder = X509Name::builder()?;
    builder.append_entry_by_nid(Nid::COMMONNAME, cn)?;
    builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, "confidential-filesystem")?;
    Ok(builder.build())
}

fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().as_utf8().ok())
        .map(|s| s.to_string())
}

fn build_ca_cert(address: &Address, key: &PKey<Private>) -> Result<X509, Error> {
    let mut builder = X509::builder()?;
    builder.set_version(X509_VERSION_3)?;
    let serial = random_serial()?;
    builder.set_serial_number(&serial)?;

    let name = name_with_cn(&address.to_string())?;
    builder.set_subject_name(&name)?;
    builder.set_issuer_name(&name)?;

    let not_before = Asn1Time::days_from_now(0)?;
    builder.set_not_before(&not_before)?;
    let not_after = Asn1Time::days_from_now(CA_VALIDITY_DAYS)?;
    builder.set_not_after(&not_after)?;
    builder.set_pubkey(key)?;

    builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
    builder.append_extension(
        KeyUsage::new()
            .critical()
            .key_cert_sign()
            .crl_sign()
            .digital_signature()
            .build()?,
    )?;

    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build())
}

/// Load the persisted CA for `address`, creating and persisting the
/// certificate on first use.
pub async fn get_or_create(
    backend: &dyn StorageBackend,
    address: &Address,
    seeds: &ValidatedSeeds,
) -> Result<CertificateAuthority, Error> {
    let key = ca_private_key(seeds)?;
    let addr = address.to_string();

    match backend.get(&addr, CA_TYPE, CA_TAG).await {
        Ok(cert_pem) => return Ok(CertificateAuthority { cert_pem, key }),
        Err(Error::NotFound) => {}
        Err(e) => return Err(e),
    }

    debug!(target: "keybroker::ca", address = %addr, "creating certificate authority");
    let cert_pem = build_ca_cert(address, &key)?.to_pem()?;
    let written = backend
        .set_if_absent(&addr, CA_TYPE, CA_TAG, &cert_pem)
        .await
        .map_err(|e| Error::CaWriteError(e.to_string()))?;
    if written {
        return Ok(CertificateAuthority { cert_pem, key });
    }

    // lost the creation race; the winner's certificate is authoritative
    let cert_pem = match backend.get(&addr, CA_TYPE, CA_TAG).await {
        Ok(pem) => pem,
        Err(e) => return Err(Error::CaWriteError(e.to_string())),
    };
    Ok(CertificateAuthority { cert_pem, key })
}

impl CertificateAuthority {
    pub fn cert_pem(&self) -> &[u8] {
        &self.cert_pem
    }

    fn cert_pem_string(&self) -> String {
        String::from_utf8(self.cert_pem.clone()).expect("PEM is ASCII")
    }

    /// Issue the client-side bundle: a deterministic leaf key derived from
    /// the CA sub-seed plus a freshly issued certificate.
    pub fn issue_client_bundle(
        &self,
        address: &Address,
        seeds: &ValidatedSeeds,
    ) -> Result<CertificateBundle, Error> {
        let bytes = expand_sub_seed(seeds.ca(), DerivePurpose::ClientLeaf.label(), 0);
        let leaf_key = p256_private_key_from_bytes(&bytes)?;

        let cn = format!("client.{address}");
        let subject = name_with_cn(&cn)?;
        let cert = self.issue_leaf(&subject, &leaf_key, false, Some(&cn))?;

        Ok(CertificateBundle {
            cert: String::from_utf8(cert.to_pem()?).expect("PEM is ASCII"),
            key: String::from_utf8(leaf_key.private_key_to_pem_pkcs8()?).expect("PEM is ASCII"),
            ca: self.cert_pem_string(),
        })
    }

    /// Issue the server-side bundle from a caller-supplied CSR.
    ///
    /// The CSR is not a free-form signing request: only its public key and
    /// subject are honored. The engine controls validity, key usage and the
    /// SAN (rebuilt from the subject CN); requested extensions are ignored.
    pub fn issue_server_bundle(&self, csr_pem: &str) -> Result<CertificateBundle, Error> {
        let req = X509Req::from_pem(csr_pem.as_bytes())
            .map_err(|e| Error::InvalidCsr(e.to_string()))?;
        let req_key = req
            .public_key()
            .map_err(|e| Error::InvalidCsr(e.to_string()))?;
        if !req.verify(&req_key).map_err(|e| Error::InvalidCsr(e.to_string()))? {
            return Err(Error::InvalidCsr(
                "CSR signature does not match its public key".to_string(),
            ));
        }

        let san = common_name(req.subject_name());
        let cert = self.issue_leaf(req.subject_name(), &req_key, true, san.as_deref())?;

        Ok(CertificateBundle {
            cert: String::from_utf8(cert.to_pem()?).expect("PEM is ASCII"),
            key: String::new(),
            ca: self.cert_pem_string(),
        })
    }

    fn issue_leaf<T: HasPublic>(
        &self,
        subject: &X509NameRef,
        pubkey: &PKeyRef<T>,
        server: bool,
        san_dns: Option<&str>,
    ) -> Result<X509, Error> {
        let ca_cert = X509::from_pem(&self.cert_pem)?;

        let mut builder = X509::builder()?;
        builder.set_version(X509_VERSION_3)?;
        let serial = random_serial()?;
        builder.set_serial_number(&serial)?;
        builder.set_subject_name(subject)?;
        builder.set_issuer_name(ca_cert.subject_name())?;
        let not_before = Asn1Time::days_from_now(0)?;
        builder.set_not_before(&not_before)?;
        let not_after = Asn1Time::days_from_now(LEAF_VALIDITY_DAYS)?;
        builder.set_not_after(&not_after)?;
        builder.set_pubkey(pubkey)?;

        builder.append_extension(BasicConstraints::new().critical().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        let mut eku = ExtendedKeyUsage::new();
        if server {
            eku.server_auth();
        } else {
            eku.client_auth();
        }
        builder.append_extension(eku.build()?)?;

        if let Some(dns) = san_dns {
            let san = SubjectAlternativeName::new()
                .dns(dns)
                .build(&builder.x509v3_context(Some(&ca_cert), None))?;
            builder.append_extension(san)?;
        }

        builder.sign(&self.key, MessageDigest::sha256())?;
        Ok(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::FileBackend;
    use keybroker::SeedBundle;
    use openssl::ec::{EcGroup, EcKey};

    fn seeds() -> (ValidatedSeeds, Address) {
        let (bundle, address) = SeedBundle::generate();
        (bundle.into_validated(address).unwrap(), address)
    }

    fn backend() -> (tempfile::TempDir, FileBackend) {
        let dir = tempfile::tempdir().expect("create temp dir failed");
        let backend = FileBackend::new(dir.path()).unwrap();
        (dir, backend)
    }

    fn test_csr(cn: &str) -> String {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
        let mut builder = X509Req::builder().unwrap();
        builder.set_pubkey(&key).unwrap();
        builder.set_subject_name(&name_with_cn(cn).unwrap()).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();
        String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn certificate_is_created_once_and_reused() {
        let (_dir, backend) = backend();
        let (seeds, address) = seeds();

        let first = get_or_create(&backend, &address, &seeds).await.unwrap();
        let second = get_or_create(&backend, &address, &seeds).await.unwrap();
        // a rebuilt certificate would carry a fresh random serial, so
        // byte-equality proves the persisted one was reused
        assert_eq!(first.cert_pem(), second.cert_pem());
    }

    #[tokio::test]
    async fn private_key_is_deterministic() {
        let (seeds, _) = seeds();
        let a = ca_private_key(&seeds).unwrap();
        let b = ca_private_key(&seeds).unwrap();
        assert_eq!(
            a.private_key_to_pem_pkcs8().unwrap(),
            b.private_key_to_pem_pkcs8().unwrap()
        );
    }

    #[tokio::test]
    async fn deleting_the_cached_certificate_forces_regeneration() {
        let (_dir, backend) = backend();
        let (seeds, address) = seeds();

        let first = get_or_create(&backend, &address, &seeds).await.unwrap();
        backend
            .delete(&address.to_string(), CA_TYPE, CA_TAG)
            .await
            .unwrap();
        let second = get_or_create(&backend, &address, &seeds).await.unwrap();
        assert_ne!(first.cert_pem(), second.cert_pem());
    }

    #[tokio::test]
    async fn client_bundle_has_stable_key_and_fresh_cert() {
        let (_dir, backend) = backend();
        let (seeds, address) = seeds();
        let ca = get_or_create(&backend, &address, &seeds).await.unwrap();

        let a = ca.issue_client_bundle(&address, &seeds).unwrap();
        let b = ca.issue_client_bundle(&address, &seeds).unwrap();
        assert_eq!(a.key, b.key);
        assert_ne!(a.cert, b.cert); // fresh serial per issuance
        assert_eq!(a.ca, b.ca);

        let cert = X509::from_pem(a.cert.as_bytes()).unwrap();
        assert!(cert.verify(&ca.key).unwrap());
    }

    #[tokio::test]
    async fn server_bundle_binds_csr_subject() {
        let (_dir, backend) = backend();
        let (seeds, address) = seeds();
        let ca = get_or_create(&backend, &address, &seeds).await.unwrap();

        let bundle = ca.issue_server_bundle(&test_csr("fs.example.test")).unwrap();
        assert!(bundle.key.is_empty());

        let cert = X509::from_pem(bundle.cert.as_bytes()).unwrap();
        assert_eq!(
            common_name(cert.subject_name()).as_deref(),
            Some("fs.example.test")
        );
        assert!(cert.verify(&ca.key).unwrap());
    }

    #[tokio::test]
    async fn garbage_csr_is_rejected() {
        let (_dir, backend) = backend();
        let (seeds, address) = seeds();
        let ca = get_or_create(&backend, &address, &seeds).await.unwrap();

        assert!(matches!(
            ca.issue_server_bundle("not a csr"),
            Err(Error::InvalidCsr(_))
        ));
    }
}
