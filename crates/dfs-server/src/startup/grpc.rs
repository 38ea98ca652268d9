//! gRPC server startup for the three DFS roles
//!
//! Each role binds its listener up front, so the port is accepting
//! connections before the start function returns, and serves until the
//! shared [`ShutdownSignal`] fires.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tracing::{error, info, warn};

use dfs_api::extent::extent_service_client::ExtentServiceClient;
use dfs_api::extent::extent_service_server::ExtentServiceServer;
use dfs_api::frontend::dfs_service_server::DfsServiceServer;
use dfs_api::grpc_uri;
use dfs_api::lock::lock_service_server::LockServiceServer;
use dfs_common::{OwnerId, ShutdownSignal, local_ip};
use dfs_extent::{ExtentGrpcService, ExtentStore};
use dfs_lock::{GrpcCallbackNotifier, LockAuthority, LockGrpcService};
use dfs_lock_cache::{CallbackEndpoint, GrpcLockServer, LockCache};

use crate::service::FrontendService;

/// Bind `address:port`; port 0 picks an ephemeral port
pub async fn bind(address: &str, port: u16) -> anyhow::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", address, port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    Ok(listener)
}

/// A gRPC server running in the background
pub struct RunningServer {
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    task: JoinHandle<()>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.shutdown
    }

    /// Wait for the shutdown signal, then give in-flight requests up to
    /// `grace` to finish before the server is torn down
    pub async fn wait(self, grace: Duration) {
        self.shutdown.wait().await;
        let abort: AbortHandle = self.task.abort_handle();

        match tokio::time::timeout(grace, self.task).await {
            Ok(_) => info!(addr = %self.local_addr, "Server stopped"),
            Err(_) => {
                warn!(
                    addr = %self.local_addr,
                    "Requests still running after {:?}, aborting server",
                    grace
                );
                abort.abort();
            }
        }
    }
}

fn spawn_server<F>(
    name: &'static str,
    local_addr: SocketAddr,
    shutdown: ShutdownSignal,
    serve: F,
) -> RunningServer
where
    F: Future<Output = Result<(), tonic::transport::Error>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        if let Err(e) = serve.await {
            error!("{} gRPC server error: {}", name, e);
        }
    });

    info!("{} gRPC server listening on {}", name, local_addr);

    RunningServer {
        local_addr,
        shutdown,
        task,
    }
}

/// Serve the lock authority on `listener`
pub fn start_lock_authority(
    listener: TcpListener,
    shutdown: ShutdownSignal,
    callback_connect_timeout: Duration,
) -> anyhow::Result<RunningServer> {
    let local_addr = listener.local_addr()?;
    let notifier = Arc::new(GrpcCallbackNotifier::new(callback_connect_timeout));
    let authority = Arc::new(LockAuthority::start(notifier));
    let service = LockGrpcService::new(authority.clone(), shutdown.clone());

    let signal = shutdown.clone();
    let serve = async move {
        let result = Server::builder()
            .add_service(LockServiceServer::new(service))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                signal.wait().await
            })
            .await;
        authority.stop();
        result
    };

    Ok(spawn_server("Lock authority", local_addr, shutdown, serve))
}

/// Serve the extent store rooted at `root` on `listener`
pub async fn start_extent(
    listener: TcpListener,
    shutdown: ShutdownSignal,
    root: &Path,
) -> anyhow::Result<RunningServer> {
    let local_addr = listener.local_addr()?;
    let store = ExtentStore::open(root).await?;
    info!("Extent root: {}", store.root().display());
    let service = ExtentGrpcService::new(store, shutdown.clone());

    let signal = shutdown.clone();
    let serve = Server::builder()
        .add_service(ExtentServiceServer::new(service))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            signal.wait().await
        });

    Ok(spawn_server("Extent", local_addr, shutdown, serve))
}

/// Addresses and identity used by the front-end
#[derive(Debug, Clone)]
pub struct FrontendOptions {
    pub extent_addr: String,
    pub lock_addr: String,
    /// Host the lock authority uses to reach this process; defaults to the
    /// machine's reachable IPv4
    pub advertise_host: Option<String>,
}

/// Serve the front-end coordinator and the lock callback endpoint on `listener`
pub fn start_frontend(
    listener: TcpListener,
    shutdown: ShutdownSignal,
    options: FrontendOptions,
) -> anyhow::Result<RunningServer> {
    let local_addr = listener.local_addr()?;
    let host = options.advertise_host.unwrap_or_else(local_ip);
    let owner_id = OwnerId::new(host, local_addr.port());

    let extent_channel = Channel::from_shared(grpc_uri(&options.extent_addr))
        .map_err(|e| anyhow::anyhow!("Invalid extent address {}: {}", options.extent_addr, e))?
        .connect_lazy();
    let lock_server = Arc::new(GrpcLockServer::connect_lazy(&options.lock_addr)?);

    info!(
        owner = %owner_id,
        extent = %options.extent_addr,
        lock = %options.lock_addr,
        "Front-end lock cache starting"
    );
    let cache = Arc::new(LockCache::start(owner_id, lock_server));

    let service = FrontendService::new(
        ExtentServiceClient::new(extent_channel),
        cache.clone(),
        shutdown.clone(),
    );
    let endpoint = CallbackEndpoint::new(cache.clone());

    let signal = shutdown.clone();
    let serve = async move {
        let result = Server::builder()
            .add_service(DfsServiceServer::new(service))
            .add_service(endpoint.into_server())
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
                signal.wait().await
            })
            .await;
        cache.stop();
        result
    };

    Ok(spawn_server("Front-end", local_addr, shutdown, serve))
}
