//! RPC server wiring.
//!
//! [`ResourceServer`] owns a [`ResourceEngine`] and exposes it over the
//! JSON-RPC surface defined in `keybroker::rpc`; construction goes through
//! [`ResourceServerBuilder`], which selects the storage backend and the
//! ownership collaborator.

use crate::engine::ResourceEngine;
use crate::ownership::{OwnershipService, UnconfiguredOwnership};
use crate::storage::{FileBackend, RemoteBackend, StorageBackend};

use anyhow::{anyhow, Result};
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::ServerHandle;
use jsonrpsee::Methods;
use keybroker::errors::rpc_error;
use keybroker::request_types::{
    DeleteResourceRequest, GetResourceRequest, GetResourceResponse, SetResourceRequest,
    SetResourceResponse, VerifyCommandsRequest, VerifyCommandsResponse, VerifySeedsRequest,
    VerifySeedsResponse,
};
use keybroker::rpc::{BuildableServer, ResourceApiServer};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

pub const DEFAULT_ENDPOINT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
pub const DEFAULT_ENDPOINT_PORT: u16 = 8893;
pub const DEFAULT_REPO_DIR: &str = "/opt/keybroker/repository";

/// The main server struct, with everything needed to run.
/// Can be constructed with the [`ResourceServerBuilder`] and started with
/// the inherited [`BuildableServer::start`] method.
#[derive(Debug)]
pub struct ResourceServer {
    addr: SocketAddr,
    engine: Arc<ResourceEngine>,
}

/// A builder that lets us configure the server
pub struct ResourceServerBuilder {
    addr: SocketAddr,
    repo_dir: PathBuf,
    remote_url: Option<String>,
    ownership: Option<Arc<dyn OwnershipService>>,
    op_timeout: Option<Duration>,
}

impl std::fmt::Debug for ResourceServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceServerBuilder")
            .field("addr", &self.addr)
            .field("repo_dir", &self.repo_dir)
            .field("remote_url", &self.remote_url)
            .finish_non_exhaustive()
    }
}

impl Default for ResourceServerBuilder {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(DEFAULT_ENDPOINT_IP, DEFAULT_ENDPOINT_PORT),
            repo_dir: PathBuf::from(DEFAULT_REPO_DIR),
            remote_url: None,
            ownership: None,
            op_timeout: None,
        }
    }
}

impl ResourceServerBuilder {
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.addr = SocketAddr::new(ip, self.addr.port());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.addr = SocketAddr::new(self.addr.ip(), port);
        self
    }

    /// Root directory of the filesystem backend. Ignored when a remote
    /// storage service is configured.
    pub fn with_repo_dir(mut self, repo_dir: impl Into<PathBuf>) -> Self {
        self.repo_dir = repo_dir.into();
        self
    }

    /// Use the remote key/value backend at `url` instead of the filesystem.
    pub fn with_remote_storage(mut self, url: impl Into<String>) -> Self {
        self.remote_url = Some(url.into());
        self
    }

    pub fn with_ownership(mut self, ownership: Arc<dyn OwnershipService>) -> Self {
        self.ownership = Some(ownership);
        self
    }

    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = Some(op_timeout);
        self
    }

    /// Build the final `ResourceServer` object.
    pub fn build(self) -> Result<ResourceServer> {
        let backend: Arc<dyn StorageBackend> = match &self.remote_url {
            Some(url) => Arc::new(RemoteBackend::new(url.clone())),
            None => Arc::new(
                FileBackend::new(&self.repo_dir)
                    .map_err(|e| anyhow!("storage root {}: {e}", self.repo_dir.display()))?,
            ),
        };
        let ownership = self
            .ownership
            .unwrap_or_else(|| Arc::new(UnconfiguredOwnership));

        let mut engine = ResourceEngine::new(backend, ownership);
        if let Some(op_timeout) = self.op_timeout {
            engine = engine.with_timeout(op_timeout);
        }

        Ok(ResourceServer {
            addr: self.addr,
            engine: Arc::new(engine),
        })
    }
}

impl ResourceServer {
    /// Create a new builder with default address and storage root
    pub fn builder() -> ResourceServerBuilder {
        ResourceServerBuilder::default()
    }
}

impl BuildableServer for ResourceServer {
    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn methods(self) -> Methods {
        self.into_rpc().into()
    }

    async fn start(self) -> Result<ServerHandle> {
        BuildableServer::start_rpc_server(self).await
    }
}

#[async_trait]
impl ResourceApiServer for ResourceServer {
    async fn health_check(&self) -> RpcResult<String> {
        Ok("OK".into())
    }

    async fn set_resource(&self, req: SetResourceRequest) -> RpcResult<SetResourceResponse> {
        debug!(target: "rpc::keybroker", "Serving setResource");
        let data = self
            .engine
            .set(&req.address, &req.resource_type, &req.tag, &req.data)
            .await
            .map_err(rpc_error)?;
        Ok(SetResourceResponse { data })
    }

    async fn get_resource(&self, req: GetResourceRequest) -> RpcResult<GetResourceResponse> {
        debug!(target: "rpc::keybroker", "Serving getResource");
        let data = self
            .engine
            .get(
                &req.address,
                &req.resource_type,
                &req.tag,
                &req.extra_request,
            )
            .await
            .map_err(rpc_error)?;
        Ok(GetResourceResponse { data })
    }

    async fn delete_resource(&self, req: DeleteResourceRequest) -> RpcResult<()> {
        debug!(target: "rpc::keybroker", "Serving deleteResource");
        self.engine
            .delete(&req.address, &req.resource_type, &req.tag, &req.data)
            .await
            .map_err(rpc_error)
    }

    async fn verify_seeds(&self, req: VerifySeedsRequest) -> RpcResult<VerifySeedsResponse> {
        debug!(target: "rpc::keybroker", "Serving verifySeeds");
        let valid = self
            .engine
            .verify_seeds(&req.seeds, &req.address)
            .map_err(rpc_error)?;
        Ok(VerifySeedsResponse { valid })
    }

    async fn verify_commands(
        &self,
        req: VerifyCommandsRequest,
    ) -> RpcResult<VerifyCommandsResponse> {
        debug!(target: "rpc::keybroker", "Serving verifyCommands");
        let valid = self
            .engine
            .verify_commands(&req.commands, &req.address)
            .map_err(rpc_error)?;
        Ok(VerifyCommandsResponse { valid })
    }
}

pub fn init_tracing() {
    // Read log level from RUST_LOG
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize the subscriber
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Key broker tracing initialized");
}
