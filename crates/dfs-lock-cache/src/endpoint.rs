// Callback endpoint gRPC handler
// Forwards Revoke/Retry from the lock authority into the local LockCache

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::debug;

use dfs_api::cache::lock_cache_service_server::{LockCacheService, LockCacheServiceServer};
use dfs_api::cache::{RetryRequest, RetryResponse, RevokeRequest, RevokeResponse};

use crate::cache::LockCache;

/// Handler for the callbacks the authority sends to this owner
///
/// Both calls are acknowledged unconditionally; the state change they cause
/// is local and never waits on the network.
#[derive(Clone)]
pub struct CallbackEndpoint {
    cache: Arc<LockCache>,
}

impl CallbackEndpoint {
    pub fn new(cache: Arc<LockCache>) -> Self {
        Self { cache }
    }

    pub fn into_server(self) -> LockCacheServiceServer<Self> {
        LockCacheServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl LockCacheService for CallbackEndpoint {
    async fn revoke(
        &self,
        request: Request<RevokeRequest>,
    ) -> Result<Response<RevokeResponse>, Status> {
        let req = request.into_inner();
        debug!(lock_id = %req.lock_id, "Revoke callback");
        self.cache.on_revoke(&req.lock_id);
        Ok(Response::new(RevokeResponse {}))
    }

    async fn retry(&self, request: Request<RetryRequest>) -> Result<Response<RetryResponse>, Status> {
        let req = request.into_inner();
        debug!(lock_id = %req.lock_id, sequence = req.sequence, "Retry callback");
        self.cache.on_retry(&req.lock_id, req.sequence);
        Ok(Response::new(RetryResponse {}))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use dfs_common::OwnerId;

    use super::*;
    use crate::cache::CacheState;
    use crate::error::Result;
    use crate::server::LockServer;

    struct GrantAll;

    #[async_trait]
    impl LockServer for GrantAll {
        async fn acquire(&self, _lock_id: &str, _owner_id: &str, _sequence: i64) -> Result<bool> {
            Ok(true)
        }

        async fn release(&self, _lock_id: &str, _owner_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_revoke_forwarded_to_cache() {
        let cache = Arc::new(LockCache::start(
            OwnerId::new("127.0.0.1", 7301),
            Arc::new(GrantAll),
        ));
        let endpoint = CallbackEndpoint::new(cache.clone());

        let guard = cache.lock("docs/").await;
        endpoint
            .revoke(Request::new(RevokeRequest {
                lock_id: "docs/".to_string(),
            }))
            .await
            .unwrap();
        assert!(cache.is_revoked("docs/"));
        assert_eq!(cache.state("docs/"), Some(CacheState::Locked));
        drop(guard);
    }

    #[tokio::test]
    async fn test_retry_for_unknown_lock_is_acknowledged() {
        let cache = Arc::new(LockCache::start(
            OwnerId::new("127.0.0.1", 7301),
            Arc::new(GrantAll),
        ));
        let endpoint = CallbackEndpoint::new(cache.clone());

        endpoint
            .retry(Request::new(RetryRequest {
                lock_id: "unknown".to_string(),
                sequence: 3,
            }))
            .await
            .unwrap();
        assert_eq!(cache.state("unknown"), None);
    }
}
