// Lock authority gRPC handler
// Adapts LockService RPCs onto the in-memory LockAuthority

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{debug, info};

use dfs_api::lock::lock_service_server::LockService;
use dfs_api::lock::{
    AcquireRequest, AcquireResponse, ReleaseRequest, ReleaseResponse, StopRequest, StopResponse,
};
use dfs_common::ShutdownSignal;

use crate::authority::LockAuthority;

#[derive(Clone)]
pub struct LockGrpcService {
    authority: Arc<LockAuthority>,
    shutdown: ShutdownSignal,
}

impl LockGrpcService {
    pub fn new(authority: Arc<LockAuthority>, shutdown: ShutdownSignal) -> Self {
        Self {
            authority,
            shutdown,
        }
    }

    pub fn authority(&self) -> &Arc<LockAuthority> {
        &self.authority
    }
}

fn require(field: &str, value: &str) -> Result<(), Status> {
    if value.is_empty() {
        return Err(Status::invalid_argument(format!("{} is required", field)));
    }
    Ok(())
}

#[tonic::async_trait]
impl LockService for LockGrpcService {
    async fn acquire(
        &self,
        request: Request<AcquireRequest>,
    ) -> Result<Response<AcquireResponse>, Status> {
        let req = request.into_inner();
        require("lock_id", &req.lock_id)?;
        require("owner_id", &req.owner_id)?;

        let success = self
            .authority
            .acquire(&req.lock_id, &req.owner_id, req.sequence);
        debug!(
            lock_id = %req.lock_id,
            owner = %req.owner_id,
            sequence = req.sequence,
            success,
            "Acquire handled"
        );

        Ok(Response::new(AcquireResponse { success }))
    }

    async fn release(
        &self,
        request: Request<ReleaseRequest>,
    ) -> Result<Response<ReleaseResponse>, Status> {
        let req = request.into_inner();
        // Release always acknowledges; an empty id can never name the holder
        if req.lock_id.is_empty() || req.owner_id.is_empty() {
            debug!(
                lock_id = %req.lock_id,
                owner = %req.owner_id,
                "Release with empty id ignored"
            );
            return Ok(Response::new(ReleaseResponse {}));
        }

        self.authority.release(&req.lock_id, &req.owner_id);
        debug!(lock_id = %req.lock_id, owner = %req.owner_id, "Release handled");

        Ok(Response::new(ReleaseResponse {}))
    }

    async fn stop(&self, _request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        info!("Stop requested for lock authority");
        self.authority.stop();
        self.shutdown.shutdown();
        Ok(Response::new(StopResponse {}))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use dfs_common::OwnerId;

    use super::*;
    use crate::error::CallbackError;
    use crate::notifier::CallbackNotifier;

    struct NoopNotifier;

    #[async_trait]
    impl CallbackNotifier for NoopNotifier {
        async fn revoke(&self, _owner: &OwnerId, _lock_id: &str) -> Result<(), CallbackError> {
            Ok(())
        }

        async fn retry(
            &self,
            _owner: &OwnerId,
            _lock_id: &str,
            _sequence: i64,
        ) -> Result<(), CallbackError> {
            Ok(())
        }
    }

    fn service() -> LockGrpcService {
        let authority = Arc::new(LockAuthority::start(Arc::new(NoopNotifier)));
        LockGrpcService::new(authority, ShutdownSignal::new())
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let svc = service();
        let owner = OwnerId::new("127.0.0.1", 7001).to_string();

        let resp = svc
            .acquire(Request::new(AcquireRequest {
                lock_id: "L".to_string(),
                owner_id: owner.clone(),
                sequence: 1,
            }))
            .await
            .unwrap();
        assert!(resp.into_inner().success);
        assert_eq!(svc.authority().holder("L"), Some(owner.clone()));

        svc.release(Request::new(ReleaseRequest {
            lock_id: "L".to_string(),
            owner_id: owner,
        }))
        .await
        .unwrap();
        assert_eq!(svc.authority().holder("L"), None);
    }

    #[tokio::test]
    async fn test_acquire_rejects_empty_fields() {
        let svc = service();

        let status = svc
            .acquire(Request::new(AcquireRequest {
                lock_id: String::new(),
                owner_id: "127.0.0.1:7001:abcdefgh".to_string(),
                sequence: 1,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_release_with_empty_ids_is_acknowledged() {
        let svc = service();
        let owner = OwnerId::new("127.0.0.1", 7001).to_string();
        assert!(svc.authority().acquire("L", &owner, 1));

        svc.release(Request::new(ReleaseRequest {
            lock_id: "L".to_string(),
            owner_id: String::new(),
        }))
        .await
        .unwrap();
        svc.release(Request::new(ReleaseRequest {
            lock_id: String::new(),
            owner_id: owner.clone(),
        }))
        .await
        .unwrap();

        assert_eq!(svc.authority().holder("L"), Some(owner));
    }

    #[tokio::test]
    async fn test_stop_triggers_shutdown() {
        let svc = service();
        svc.stop(Request::new(StopRequest {})).await.unwrap();
        assert!(svc.shutdown.is_shutdown());
    }
}
