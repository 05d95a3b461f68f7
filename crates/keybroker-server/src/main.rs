use clap::Parser;
use keybroker::rpc::BuildableServer;
use keybroker_server::server::{
    init_tracing, ResourceServer, DEFAULT_ENDPOINT_IP, DEFAULT_ENDPOINT_PORT, DEFAULT_REPO_DIR,
};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Command line arguments for the key broker server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The ip to bind the server to
    #[arg(long, default_value_t = DEFAULT_ENDPOINT_IP)]
    ip: IpAddr,

    /// The port to bind the server to
    #[arg(long, default_value_t = DEFAULT_ENDPOINT_PORT)]
    port: u16,

    /// Root directory of the filesystem storage backend
    #[arg(long, default_value = DEFAULT_REPO_DIR)]
    repo_dir: PathBuf,

    /// Base URL of a remote storage service; replaces the filesystem backend
    #[arg(long)]
    remote_storage: Option<String>,

    /// Ceiling in seconds on any single storage or collaborator call
    #[arg(long, default_value_t = 15)]
    op_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let args = Args::parse();
    info!("Key broker starting on {}:{}", args.ip, args.port);

    let mut builder = ResourceServer::builder()
        .with_ip(args.ip)
        .with_port(args.port)
        .with_repo_dir(args.repo_dir)
        .with_op_timeout(Duration::from_secs(args.op_timeout_secs));
    if let Some(url) = args.remote_storage {
        builder = builder.with_remote_storage(url);
    }

    let server = builder.build().unwrap();
    let handle = server.start().await.unwrap();

    handle.stopped().await;
}
