// Front-end coordinator gRPC handler
// Brackets every extent call with the lock named after the file or directory

use std::sync::Arc;

use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use dfs_api::extent;
use dfs_api::extent::extent_service_client::ExtentServiceClient;
use dfs_api::frontend::dfs_service_server::DfsService;
use dfs_api::frontend::{
    DeleteRequest, DeleteResponse, DirRequest, DirResponse, GetRequest, GetResponse,
    MkdirRequest, MkdirResponse, PutRequest, PutResponse, RmdirRequest, RmdirResponse,
    StopRequest, StopResponse,
};
use dfs_common::{ShutdownSignal, is_directory_name};
use dfs_lock_cache::LockCache;

/// Payload written to create a directory; its content is ignored by the extent store
const MKDIR_MARKER: [u8; 1] = [1];

#[derive(Clone)]
pub struct FrontendService {
    extent: ExtentServiceClient<Channel>,
    cache: Arc<LockCache>,
    shutdown: ShutdownSignal,
}

impl FrontendService {
    pub fn new(
        extent: ExtentServiceClient<Channel>,
        cache: Arc<LockCache>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            extent,
            cache,
            shutdown,
        }
    }

    async fn extent_get(&self, name: &str) -> Option<Vec<u8>> {
        let request = extent::GetRequest {
            file_name: name.to_string(),
        };
        match self.extent.clone().get(request).await {
            Ok(response) => response.into_inner().file_data,
            Err(status) => {
                warn!(name = %name, error = %status, "Extent get failed");
                None
            }
        }
    }

    async fn extent_put(&self, name: &str, file_data: Option<Vec<u8>>) -> bool {
        let request = extent::PutRequest {
            file_name: name.to_string(),
            file_data,
        };
        match self.extent.clone().put(request).await {
            Ok(response) => response.into_inner().success,
            Err(status) => {
                warn!(name = %name, error = %status, "Extent put failed");
                false
            }
        }
    }
}

fn parse_dir_listing(data: &[u8]) -> Vec<String> {
    let text = String::from_utf8_lossy(data);
    if text.is_empty() {
        return Vec::new();
    }
    text.split('\n').map(str::to_string).collect()
}

#[tonic::async_trait]
impl DfsService for FrontendService {
    async fn dir(&self, request: Request<DirRequest>) -> Result<Response<DirResponse>, Status> {
        let name = request.into_inner().directory_name;
        if !is_directory_name(&name) {
            return Ok(Response::new(DirResponse::default()));
        }

        let _guard = self.cache.lock(&name).await;
        let response = match self.extent_get(&name).await {
            Some(data) => DirResponse {
                success: true,
                dir_list: parse_dir_listing(&data),
            },
            None => DirResponse::default(),
        };
        debug!(name = %name, entries = response.dir_list.len(), "Dir");

        Ok(Response::new(response))
    }

    async fn mkdir(
        &self,
        request: Request<MkdirRequest>,
    ) -> Result<Response<MkdirResponse>, Status> {
        let name = request.into_inner().directory_name;
        if !is_directory_name(&name) {
            return Ok(Response::new(MkdirResponse { success: false }));
        }

        let _guard = self.cache.lock(&name).await;
        let success = self.extent_put(&name, Some(MKDIR_MARKER.to_vec())).await;
        debug!(name = %name, success, "Mkdir");

        Ok(Response::new(MkdirResponse { success }))
    }

    async fn rmdir(
        &self,
        request: Request<RmdirRequest>,
    ) -> Result<Response<RmdirResponse>, Status> {
        let name = request.into_inner().directory_name;
        if !is_directory_name(&name) {
            return Ok(Response::new(RmdirResponse { success: false }));
        }

        let _guard = self.cache.lock(&name).await;
        let success = self.extent_put(&name, None).await;
        debug!(name = %name, success, "Rmdir");

        Ok(Response::new(RmdirResponse { success }))
    }

    async fn get(&self, request: Request<GetRequest>) -> Result<Response<GetResponse>, Status> {
        let name = request.into_inner().file_name;
        if is_directory_name(&name) {
            return Ok(Response::new(GetResponse::default()));
        }

        let _guard = self.cache.lock(&name).await;
        let file_data = self.extent_get(&name).await;
        debug!(name = %name, found = file_data.is_some(), "Get");

        Ok(Response::new(GetResponse { file_data }))
    }

    async fn put(&self, request: Request<PutRequest>) -> Result<Response<PutResponse>, Status> {
        let req = request.into_inner();
        let Some(data) = req.file_data else {
            return Ok(Response::new(PutResponse { success: false }));
        };
        if is_directory_name(&req.file_name) {
            return Ok(Response::new(PutResponse { success: false }));
        }

        let _guard = self.cache.lock(&req.file_name).await;
        let success = self.extent_put(&req.file_name, Some(data)).await;
        debug!(name = %req.file_name, success, "Put");

        Ok(Response::new(PutResponse { success }))
    }

    async fn delete(
        &self,
        request: Request<DeleteRequest>,
    ) -> Result<Response<DeleteResponse>, Status> {
        let name = request.into_inner().file_name;
        if is_directory_name(&name) {
            return Ok(Response::new(DeleteResponse { success: false }));
        }

        let _guard = self.cache.lock(&name).await;
        let success = self.extent_put(&name, None).await;
        debug!(name = %name, success, "Delete");

        Ok(Response::new(DeleteResponse { success }))
    }

    async fn stop(&self, _request: Request<StopRequest>) -> Result<Response<StopResponse>, Status> {
        info!("Stop requested for front-end");
        self.shutdown.shutdown();
        Ok(Response::new(StopResponse {}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dir_listing() {
        assert!(parse_dir_listing(b"").is_empty());
        assert_eq!(parse_dir_listing(b"a.txt"), vec!["a.txt"]);
        assert_eq!(parse_dir_listing(b"a.txt\nsub/"), vec!["a.txt", "sub/"]);
    }
}
