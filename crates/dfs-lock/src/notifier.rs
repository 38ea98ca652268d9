//! Callback delivery to lock caches

use std::time::Duration;

use async_trait::async_trait;
use tonic::transport::Endpoint;
use tracing::debug;

use dfs_api::cache::lock_cache_service_client::LockCacheServiceClient;
use dfs_api::cache::{RetryRequest, RevokeRequest};
use dfs_common::{DfsError, OwnerId};

use crate::error::CallbackError;

/// Delivers revoke and retry notifications to the owner's callback endpoint
#[async_trait]
pub trait CallbackNotifier: Send + Sync {
    /// Ask the holder to give `lock_id` back
    async fn revoke(&self, owner: &OwnerId, lock_id: &str) -> Result<(), CallbackError>;

    /// Tell a waiter that `lock_id` may now be available
    async fn retry(&self, owner: &OwnerId, lock_id: &str, sequence: i64)
    -> Result<(), CallbackError>;
}

/// Notifier that opens a short-lived gRPC connection per callback
#[derive(Debug, Clone)]
pub struct GrpcCallbackNotifier {
    connect_timeout: Duration,
}

impl GrpcCallbackNotifier {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    async fn connect(
        &self,
        owner: &OwnerId,
    ) -> Result<LockCacheServiceClient<tonic::transport::Channel>, CallbackError> {
        let uri = owner.callback_uri();
        let channel = Endpoint::from_shared(uri.clone())
            .map_err(|e| DfsError::NetworkError(format!("invalid callback uri {}: {}", uri, e)))?
            .connect_timeout(self.connect_timeout)
            .connect()
            .await?;
        Ok(LockCacheServiceClient::new(channel))
    }
}

#[async_trait]
impl CallbackNotifier for GrpcCallbackNotifier {
    async fn revoke(&self, owner: &OwnerId, lock_id: &str) -> Result<(), CallbackError> {
        let mut client = self.connect(owner).await?;
        client
            .revoke(RevokeRequest {
                lock_id: lock_id.to_string(),
            })
            .await?;
        debug!(owner = %owner, lock_id = %lock_id, "Revoke callback sent");
        Ok(())
    }

    async fn retry(
        &self,
        owner: &OwnerId,
        lock_id: &str,
        sequence: i64,
    ) -> Result<(), CallbackError> {
        let mut client = self.connect(owner).await?;
        client
            .retry(RetryRequest {
                lock_id: lock_id.to_string(),
                sequence,
            })
            .await?;
        debug!(owner = %owner, lock_id = %lock_id, sequence, "Retry callback sent");
        Ok(())
    }
}
