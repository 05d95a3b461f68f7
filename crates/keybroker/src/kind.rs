//! The closed enumeration of derivable resource types and the reserved
//! storage slots that never appear in it.

use strum_macros::{Display, EnumIter, EnumString};

/// Storage type segment of the per-address seed blob. Reserved: provisioned
/// through `Set`, never served through the generic `Get` dispatch.
pub const SEED_TYPE: &str = "seeds";
/// Storage tag segment of the per-address seed blob.
pub const SEED_TAG: &str = "bundle";

/// Storage type segment of the cached per-address CA certificate.
pub const CA_TYPE: &str = "ca";
/// Storage tag segment of the cached per-address CA certificate.
pub const CA_TAG: &str = "cert.pem";

/// Certificate-bundle tag for the client side of a filesystem mount.
pub const TAG_CLIENT: &str = "client";
/// Certificate-bundle tag for the server side; requires a CSR.
pub const TAG_SERVER: &str = "server";

/// A derivable resource type.
///
/// The wire name is the kebab-case form of the variant (`ec-signing-key`,
/// `certificate-bundle`, ...). Every variant is derived on demand from seed
/// material: none of them can be written or deleted through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum ResourceKind {
    EcSigningKey,
    EcPublicKey,
    IdentityPrivateKey,
    IdentityVerificationPolicy,
    IdentityWrappingKey,
    FilesystemStorageRootKey,
    AttestationSigningKey,
    CertificateBundle,
}
