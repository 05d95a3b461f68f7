//! The resource engine.
//!
//! Routes every `(address, type, tag)` request to one of three paths:
//! the ownership collaborator (for the `ownership` namespace), raw blob
//! storage (for addresses that do not match the seed-address syntax), or
//! seed loading plus derivation (for seed-bearing addresses). Collaborators
//! are injected at construction; the engine holds no long-lived secrets and
//! rebuilds seed bundles from storage on every call.

use keybroker::kind::{CA_TAG, CA_TYPE, SEED_TAG, SEED_TYPE, TAG_CLIENT, TAG_SERVER};
use keybroker::request_types::{BurnFilesystemRequest, MintFilesystemRequest};
use keybroker::{Address, CommandBundle, Error, ResourceKind, SeedBundle, ValidatedSeeds};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::ca;
use crate::derivation;
use crate::ownership::OwnershipService;
use crate::storage::StorageBackend;

/// Ceiling on any single engine call, matching the collaborator contract
/// the original storage service imposed.
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(15);

const OWNERSHIP_ADDR: &str = "ownership";
const OWNERSHIP_FILESYSTEMS: &str = "filesystems";
const OWNERSHIP_ACCOUNTS_METATX: &str = "accounts_metatx";
const OWNERSHIP_CONFIGURE: &str = "configure";
const OWNERSHIP_WELL_KNOWN: &str = ".well-known";

pub struct ResourceEngine {
    backend: Arc<dyn StorageBackend>,
    ownership: Arc<dyn OwnershipService>,
    op_timeout: Duration,
}

impl fmt::Debug for ResourceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceEngine")
            .field("op_timeout", &self.op_timeout)
            .finish_non_exhaustive()
    }
}

impl ResourceEngine {
    pub fn new(backend: Arc<dyn StorageBackend>, ownership: Arc<dyn OwnershipService>) -> Self {
        Self {
            backend,
            ownership,
            op_timeout: DEFAULT_OP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        match timeout(self.op_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Store a resource.
    ///
    /// Derived types are never settable; the two legal writes under a
    /// seed-bearing address are the reserved seed slot (validated against
    /// the address before persisting) and nothing else. Non-address
    /// namespaces write through to raw storage. Returns a payload only for
    /// collaborator routes (the mint response).
    pub async fn set(
        &self,
        addr: &str,
        typ: &str,
        tag: &str,
        data: &[u8],
    ) -> Result<Option<Vec<u8>>, Error> {
        debug!(target: "keybroker::engine", addr, typ, tag, "set");

        if addr == OWNERSHIP_ADDR && typ == OWNERSHIP_FILESYSTEMS {
            let req: MintFilesystemRequest = serde_json::from_slice(data)
                .map_err(|e| Error::InvalidRequest(format!("mint request: {e}")))?;
            let resp = self.bounded(self.ownership.mint(req)).await?;
            return Ok(Some(
                serde_json::to_vec(&resp).expect("mint response serializes"),
            ));
        }

        if let Some(address) = Address::parse(addr) {
            if typ.parse::<ResourceKind>().is_ok() {
                return Err(Error::Immutable(typ.to_string()));
            }
            if typ == SEED_TYPE && tag == SEED_TAG {
                let bundle = SeedBundle::parse(data)?;
                if !bundle.binds_to(&address) {
                    return Err(Error::SeedInvalid);
                }
                let addr = address.to_string();
                self.bounded(self.backend.set(&addr, typ, tag, data)).await?;
                return Ok(None);
            }
            return Err(Error::UnsupportedType(typ.to_string()));
        }

        self.bounded(self.backend.set(addr, typ, tag, data)).await?;
        Ok(None)
    }

    /// Fetch a resource: collaborator lookups, raw blobs, or on-demand
    /// derivation depending on the address.
    pub async fn get(
        &self,
        addr: &str,
        typ: &str,
        tag: &str,
        extra_request: &str,
    ) -> Result<Vec<u8>, Error> {
        debug!(target: "keybroker::engine", addr, typ, tag, "get");

        if addr == OWNERSHIP_ADDR {
            match typ {
                OWNERSHIP_FILESYSTEMS => {
                    let record = self.bounded(self.ownership.filesystem(tag)).await?;
                    return Ok(serde_json::to_vec(&record).expect("record serializes"));
                }
                OWNERSHIP_ACCOUNTS_METATX => {
                    let meta = self.bounded(self.ownership.account_meta(tag)).await?;
                    return Ok(serde_json::to_vec(&meta).expect("meta serializes"));
                }
                OWNERSHIP_CONFIGURE if tag == OWNERSHIP_WELL_KNOWN => {
                    let cfg = self.bounded(self.ownership.well_known_config()).await?;
                    return Ok(serde_json::to_vec(&cfg).expect("config serializes"));
                }
                // unmatched ownership tuples fall through to raw storage
                _ => {}
            }
        }

        let Some(address) = Address::parse(addr) else {
            return self.bounded(self.backend.get(addr, typ, tag)).await;
        };

        let kind: ResourceKind = typ
            .parse()
            .map_err(|_| Error::UnsupportedType(typ.to_string()))?;
        let seeds = self.load_seeds(&address).await?;

        match kind {
            ResourceKind::CertificateBundle => {
                self.bounded(self.certificate_bundle(&address, &seeds, tag, extra_request))
                    .await
            }
            _ => derivation::derive(kind, &seeds, tag),
        }
    }

    /// Remove a resource. Raw blobs delete normally; under a seed-bearing
    /// address only the CA cache entry and the seed slot are deletable
    /// (administrative resets), derived types are immutable.
    pub async fn delete(&self, addr: &str, typ: &str, tag: &str, data: &[u8]) -> Result<(), Error> {
        debug!(target: "keybroker::engine", addr, typ, tag, "delete");

        if addr == OWNERSHIP_ADDR && typ == OWNERSHIP_FILESYSTEMS {
            let req: BurnFilesystemRequest = serde_json::from_slice(data)
                .map_err(|e| Error::InvalidRequest(format!("burn request: {e}")))?;
            return self.bounded(self.ownership.burn(req)).await;
        }

        if let Some(address) = Address::parse(addr) {
            let addr = address.to_string();
            if (typ == CA_TYPE && tag == CA_TAG) || (typ == SEED_TYPE && tag == SEED_TAG) {
                return self.bounded(self.backend.delete(&addr, typ, tag)).await;
            }
            if typ.parse::<ResourceKind>().is_ok() {
                return Err(Error::Immutable(typ.to_string()));
            }
            return Err(Error::UnsupportedType(typ.to_string()));
        }

        self.bounded(self.backend.delete(addr, typ, tag)).await
    }

    /// Check that a seed blob parses and binds to `addr`. A structural
    /// failure is an error; a binding mismatch is a `false` answer.
    pub fn verify_seeds(&self, seeds: &str, addr: &str) -> Result<bool, Error> {
        let bundle = SeedBundle::parse(seeds.as_bytes())?;
        let Some(address) = Address::parse(addr) else {
            return Ok(false);
        };
        Ok(bundle.binds_to(&address))
    }

    /// Check that a command bundle was signed by a key binding to `addr`.
    pub fn verify_commands(&self, commands: &str, addr: &str) -> Result<bool, Error> {
        let bundle = CommandBundle::parse(commands.as_bytes())?;
        let Some(address) = Address::parse(addr) else {
            return Ok(false);
        };
        Ok(bundle.verify(&address))
    }

    async fn load_seeds(&self, address: &Address) -> Result<ValidatedSeeds, Error> {
        let addr = address.to_string();
        let raw = match self.bounded(self.backend.get(&addr, SEED_TYPE, SEED_TAG)).await {
            Ok(raw) => raw,
            Err(Error::NotFound) => return Err(Error::SeedNotFound),
            Err(e) => return Err(e),
        };
        SeedBundle::parse(&raw)?.into_validated(*address)
    }

    async fn certificate_bundle(
        &self,
        address: &Address,
        seeds: &ValidatedSeeds,
        tag: &str,
        extra_request: &str,
    ) -> Result<Vec<u8>, Error> {
        let ca = ca::get_or_create(self.backend.as_ref(), address, seeds).await?;
        let bundle = match tag {
            TAG_CLIENT => ca.issue_client_bundle(address, seeds)?,
            TAG_SERVER => {
                if extra_request.is_empty() {
                    return Err(Error::InvalidCsr(
                        "server bundles require a CSR as the extra request".to_string(),
                    ));
                }
                ca.issue_server_bundle(extra_request)?
            }
            other => {
                return Err(Error::InvalidTag(format!(
                    "certificate tag must be {TAG_CLIENT:?} or {TAG_SERVER:?}, got {other:?}"
                )))
            }
        };
        Ok(serde_json::to_vec(&bundle).expect("certificate bundle serializes"))
    }
}
