// Extent service gRPC handler
// Exposes ExtentStore Get/Put plus Stop

use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use dfs_api::extent::extent_service_server::ExtentService;
use dfs_api::extent::{GetRequest, GetResponse, PutRequest, PutResponse, StopRequest, StopResponse};
use dfs_common::ShutdownSignal;

use crate::error::ExtentError;
use crate::store::ExtentStore;

#[derive(Clone)]
pub struct ExtentGrpcService {
    store: ExtentStore,
    shutdown: ShutdownSignal,
}

impl ExtentGrpcService {
    pub fn new(store: ExtentStore, shutdown: ShutdownSignal) -> Self {
        Self { store, shutdown }
    }
}

#[tonic::async_trait]
impl ExtentService for ExtentGrpcService {
    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let req = request.into_inner();

        let file_data = match self.store.get(&req.file_name).await {
            Ok(data) => data,
            Err(ExtentError::EmptyName) => {
                return Err(Status::invalid_argument(ExtentError::EmptyName.to_string()));
            }
            Err(e) => {
                warn!(name = %req.file_name, error = %e, "Extent get failed");
                None
            }
        };
        debug!(name = %req.file_name, found = file_data.is_some(), "Extent get");

        Ok(Response::new(GetResponse { file_data }))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();

        let success = match self
            .store
            .put(&req.file_name, req.file_data.as_deref())
            .await
        {
            Ok(success) => success,
            Err(ExtentError::EmptyName) => {
                return Err(Status::invalid_argument(ExtentError::EmptyName.to_string()));
            }
            Err(e) => {
                warn!(name = %req.file_name, error = %e, "Extent put failed");
                false
            }
        };
        debug!(
            name = %req.file_name,
            delete = req.file_data.is_none(),
            success,
            "Extent put"
        );

        Ok(Response::new(PutResponse { success }))
    }

    async fn stop(&self, _request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        info!("Stop requested for extent service");
        self.shutdown.shutdown();
        Ok(Response::new(StopResponse {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn service() -> (tempfile::TempDir, ExtentGrpcService) {
        let dir = tempfile::tempdir().unwrap();
        let store = ExtentStore::open(dir.path()).await.unwrap();
        (dir, ExtentGrpcService::new(store, ShutdownSignal::new()))
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let (_dir, svc) = service().await;

        let resp = svc
            .put(Request::new(PutRequest {
                file_name: "/a.txt".to_string(),
                file_data: Some(b"abc".to_vec()),
            }))
            .await
            .unwrap();
        assert!(resp.into_inner().success);

        let resp = svc
            .get(Request::new(GetRequest {
                file_name: "/a.txt".to_string(),
            }))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().file_data, Some(b"abc".to_vec()));
    }

    #[tokio::test]
    async fn test_empty_name_is_invalid_argument() {
        let (_dir, svc) = service().await;

        let status = svc
            .get(Request::new(GetRequest {
                file_name: String::new(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);

        let status = svc
            .put(Request::new(PutRequest {
                file_name: String::new(),
                file_data: None,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_io_failure_reported_as_unsuccessful() {
        let (_dir, svc) = service().await;

        svc.put(Request::new(PutRequest {
            file_name: "/plain".to_string(),
            file_data: Some(b"x".to_vec()),
        }))
        .await
        .unwrap();

        // A directory cannot be created where a file already sits
        let resp = svc
            .put(Request::new(PutRequest {
                file_name: "/plain/".to_string(),
                file_data: Some(vec![1]),
            }))
            .await
            .unwrap();
        assert!(!resp.into_inner().success);
    }

    #[tokio::test]
    async fn test_stop_triggers_shutdown() {
        let (_dir, svc) = service().await;
        svc.stop(Request::new(StopRequest {})).await.unwrap();
        assert!(svc.shutdown.is_shutdown());
    }
}
