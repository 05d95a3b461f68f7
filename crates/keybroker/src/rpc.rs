//! JSON-RPC trait for server and client

use anyhow::Result;
use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{ServerBuilder, ServerHandle};
use jsonrpsee::Methods;
use std::net::SocketAddr;
use tracing::info;

use crate::request_types::{
    DeleteResourceRequest, GetResourceRequest, GetResourceResponse, SetResourceRequest,
    SetResourceResponse, VerifyCommandsRequest, VerifyCommandsResponse, VerifySeedsRequest,
    VerifySeedsResponse,
};

pub trait BuildableServer {
    fn addr(&self) -> SocketAddr;
    fn methods(self) -> Methods;
    async fn start(self) -> Result<ServerHandle>;
    async fn start_rpc_server(self) -> Result<ServerHandle>
    where
        Self: Sized,
    {
        let addr = self.addr();
        let rpc_server = ServerBuilder::new().build(addr).await?;
        let server_handle = rpc_server.start(self.methods());
        info!(target: "rpc::keybroker", "Server started at {}", addr);
        Ok(server_handle)
    }
}

#[rpc(client, server)]
pub trait ResourceApi {
    /// Health check endpoint that returns "OK" if service is running
    #[method(name = "healthCheck")]
    async fn health_check(&self) -> RpcResult<String>;

    /// Store a raw resource, provision a seed bundle, or mint a filesystem
    #[method(name = "setResource")]
    async fn set_resource(&self, req: SetResourceRequest) -> RpcResult<SetResourceResponse>;

    /// Fetch a raw resource or derive an artifact from seed material
    #[method(name = "getResource")]
    async fn get_resource(&self, req: GetResourceRequest) -> RpcResult<GetResourceResponse>;

    /// Remove a raw resource, an administrative cache entry, or burn a filesystem
    #[method(name = "deleteResource")]
    async fn delete_resource(&self, req: DeleteResourceRequest) -> RpcResult<()>;

    /// Check that a seed blob parses and binds to the given address
    #[method(name = "verifySeeds")]
    async fn verify_seeds(&self, req: VerifySeedsRequest) -> RpcResult<VerifySeedsResponse>;

    /// Check that a command bundle was signed for the given address
    #[method(name = "verifyCommands")]
    async fn verify_commands(
        &self,
        req: VerifyCommandsRequest,
    ) -> RpcResult<VerifyCommandsResponse>;
}
