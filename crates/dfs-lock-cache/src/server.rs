//! Seam between the cache and the lock authority

use async_trait::async_trait;
use tonic::transport::Channel;
use tracing::info;

use dfs_api::grpc_uri;
use dfs_api::lock::lock_service_client::LockServiceClient;
use dfs_api::lock::{AcquireRequest, ReleaseRequest};

use crate::error::{ClientError, Result};

/// The two authority RPCs the cache depends on
#[async_trait]
pub trait LockServer: Send + Sync {
    /// Returns whether the authority granted the lock
    async fn acquire(&self, lock_id: &str, owner_id: &str, sequence: i64) -> Result<bool>;

    async fn release(&self, lock_id: &str, owner_id: &str) -> Result<()>;
}

/// Lock authority reached over a long-lived, lazily connected gRPC channel
#[derive(Clone)]
pub struct GrpcLockServer {
    client: LockServiceClient<Channel>,
}

impl GrpcLockServer {
    /// Prepare a client for the authority at `addr` (`host:port` or a URI)
    ///
    /// The channel connects on first use and reconnects after transport
    /// failures, so an authority that is not up yet is not an error here.
    pub fn connect_lazy(addr: &str) -> Result<Self> {
        let uri = grpc_uri(addr);
        let channel = Channel::from_shared(uri.clone())
            .map_err(|e| ClientError::Other(anyhow::anyhow!("Invalid gRPC address: {}", e)))?
            .connect_lazy();

        info!("Lock authority client prepared for {}", uri);

        Ok(Self {
            client: LockServiceClient::new(channel),
        })
    }
}

#[async_trait]
impl LockServer for GrpcLockServer {
    async fn acquire(&self, lock_id: &str, owner_id: &str, sequence: i64) -> Result<bool> {
        let response = self
            .client
            .clone()
            .acquire(AcquireRequest {
                lock_id: lock_id.to_string(),
                owner_id: owner_id.to_string(),
                sequence,
            })
            .await?;
        Ok(response.into_inner().success)
    }

    async fn release(&self, lock_id: &str, owner_id: &str) -> Result<()> {
        self.client
            .clone()
            .release(ReleaseRequest {
                lock_id: lock_id.to_string(),
                owner_id: owner_id.to_string(),
            })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_lazy_accepts_plain_address() {
        assert!(GrpcLockServer::connect_lazy("127.0.0.1:7100").is_ok());
        assert!(GrpcLockServer::connect_lazy("http://lock-authority:7100").is_ok());
    }

    #[tokio::test]
    async fn test_connect_lazy_rejects_garbage() {
        let err = GrpcLockServer::connect_lazy("not a uri").err().unwrap();
        assert!(matches!(err, ClientError::Other(_)));
    }
}
