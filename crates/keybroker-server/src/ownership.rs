//! Seam to the blockchain-backed filesystem-ownership service.
//!
//! The engine routes requests addressed to the `ownership` namespace here
//! and otherwise knows nothing about chains, tokens or meta-transactions.
//! A concrete implementation submits the forwarded meta-transactions to the
//! ownership contracts; this crate ships only the trait and a stub for
//! deployments without an ownership collaborator.

use async_trait::async_trait;
use keybroker::request_types::{
    AccountMetaResponse, BurnFilesystemRequest, FilesystemRecord, MintFilesystemRequest,
    MintFilesystemResponse, WellKnownConfig,
};
use keybroker::Error;

#[async_trait]
pub trait OwnershipService: Send + Sync {
    /// Mint a filesystem token from a signed meta-transaction.
    async fn mint(&self, req: MintFilesystemRequest) -> Result<MintFilesystemResponse, Error>;

    /// Burn a filesystem token. One-shot: callers must not blindly retry.
    async fn burn(&self, req: BurnFilesystemRequest) -> Result<(), Error>;

    /// Look up the ownership record of a named filesystem.
    async fn filesystem(&self, name: &str) -> Result<FilesystemRecord, Error>;

    /// Chain configuration, contract addresses and current nonce for an
    /// account, as needed to construct a meta-transaction.
    async fn account_meta(&self, address: &str) -> Result<AccountMetaResponse, Error>;

    /// The well-known chain configuration document.
    async fn well_known_config(&self) -> Result<WellKnownConfig, Error>;
}

/// Stub used when no ownership collaborator is wired in; every operation
/// reports the collaborator as unavailable.
#[derive(Debug, Default)]
pub struct UnconfiguredOwnership;

impl UnconfiguredOwnership {
    fn unavailable<T>() -> Result<T, Error> {
        Err(Error::BackendUnavailable(
            "ownership service not configured".to_string(),
        ))
    }
}

#[async_trait]
impl OwnershipService for UnconfiguredOwnership {
    async fn mint(&self, _req: MintFilesystemRequest) -> Result<MintFilesystemResponse, Error> {
        Self::unavailable()
    }

    async fn burn(&self, _req: BurnFilesystemRequest) -> Result<(), Error> {
        Self::unavailable()
    }

    async fn filesystem(&self, _name: &str) -> Result<FilesystemRecord, Error> {
        Self::unavailable()
    }

    async fn account_meta(&self, _address: &str) -> Result<AccountMetaResponse, Error> {
        Self::unavailable()
    }

    async fn well_known_config(&self) -> Result<WellKnownConfig, Error> {
        Self::unavailable()
    }
}
