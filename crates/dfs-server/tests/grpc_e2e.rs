//! End-to-end tests over real gRPC
//!
//! Starts a lock authority, an extent service and two front-ends on
//! ephemeral loopback ports, then drives them through `DfsService` clients.

use std::time::Duration;

use tokio::time::timeout;
use tonic::transport::Channel;

use dfs_api::frontend::dfs_service_client::DfsServiceClient;
use dfs_api::frontend::{
    DeleteRequest, DirRequest, GetRequest, MkdirRequest, PutRequest, RmdirRequest, StopRequest,
};
use dfs_common::ShutdownSignal;
use dfs_server::startup::{self, FrontendOptions, RunningServer};

const STEP: Duration = Duration::from_secs(10);

struct TestCluster {
    _root: tempfile::TempDir,
    lock: RunningServer,
    extent: RunningServer,
    frontends: Vec<RunningServer>,
}

impl TestCluster {
    async fn start(frontends: usize) -> Self {
        let root = tempfile::tempdir().unwrap();

        let lock = startup::start_lock_authority(
            startup::bind("127.0.0.1", 0).await.unwrap(),
            ShutdownSignal::new(),
            Duration::from_millis(500),
        )
        .unwrap();

        let extent = startup::start_extent(
            startup::bind("127.0.0.1", 0).await.unwrap(),
            ShutdownSignal::new(),
            root.path(),
        )
        .await
        .unwrap();

        let mut servers = Vec::new();
        for _ in 0..frontends {
            let options = FrontendOptions {
                extent_addr: extent.local_addr().to_string(),
                lock_addr: lock.local_addr().to_string(),
                advertise_host: Some("127.0.0.1".to_string()),
            };
            servers.push(
                startup::start_frontend(
                    startup::bind("127.0.0.1", 0).await.unwrap(),
                    ShutdownSignal::new(),
                    options,
                )
                .unwrap(),
            );
        }

        Self {
            _root: root,
            lock,
            extent,
            frontends: servers,
        }
    }

    async fn client(&self, index: usize) -> DfsServiceClient<Channel> {
        let uri = format!("http://{}", self.frontends[index].local_addr());
        DfsServiceClient::connect(uri).await.unwrap()
    }

    fn shutdown(&self) {
        for frontend in &self.frontends {
            frontend.shutdown_signal().shutdown();
        }
        self.extent.shutdown_signal().shutdown();
        self.lock.shutdown_signal().shutdown();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_lifecycle_across_frontends() {
    let cluster = TestCluster::start(2).await;
    let mut first = cluster.client(0).await;
    let mut second = cluster.client(1).await;

    let mkdir = timeout(
        STEP,
        first.mkdir(MkdirRequest {
            directory_name: "/docs/".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(mkdir.into_inner().success);

    let put = timeout(
        STEP,
        first.put(PutRequest {
            file_name: "/docs/a.txt".to_string(),
            file_data: Some(b"hello".to_vec()),
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(put.into_inner().success);

    // The second front-end has to take the lock away from the first
    let get = timeout(
        STEP,
        second.get(GetRequest {
            file_name: "/docs/a.txt".to_string(),
        }),
    )
    .await
    .expect("lock never moved to the second front-end")
    .unwrap();
    assert_eq!(get.into_inner().file_data, Some(b"hello".to_vec()));

    let dir = timeout(
        STEP,
        second.dir(DirRequest {
            directory_name: "/docs/".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .into_inner();
    assert!(dir.success);
    assert_eq!(dir.dir_list, vec!["a.txt".to_string()]);

    // Not empty yet
    let rmdir = timeout(
        STEP,
        first.rmdir(RmdirRequest {
            directory_name: "/docs/".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(!rmdir.into_inner().success);

    let delete = timeout(
        STEP,
        first.delete(DeleteRequest {
            file_name: "/docs/a.txt".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(delete.into_inner().success);

    let rmdir = timeout(
        STEP,
        second.rmdir(RmdirRequest {
            directory_name: "/docs/".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap();
    assert!(rmdir.into_inner().success);

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_invalid_names_rejected_without_locking() {
    let cluster = TestCluster::start(1).await;
    let mut client = cluster.client(0).await;

    let put = client
        .put(PutRequest {
            file_name: "/dir/".to_string(),
            file_data: Some(b"x".to_vec()),
        })
        .await
        .unwrap();
    assert!(!put.into_inner().success);

    let put = client
        .put(PutRequest {
            file_name: "/file".to_string(),
            file_data: None,
        })
        .await
        .unwrap();
    assert!(!put.into_inner().success);

    let mkdir = client
        .mkdir(MkdirRequest {
            directory_name: "/not-a-dir".to_string(),
        })
        .await
        .unwrap();
    assert!(!mkdir.into_inner().success);

    let get = client
        .get(GetRequest {
            file_name: "/some/dir/".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(get.into_inner().file_data, None);

    let dir = client
        .dir(DirRequest {
            directory_name: "/missing/".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert!(!dir.success);
    assert!(dir.dir_list.is_empty());

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_writers_on_one_file() {
    let cluster = TestCluster::start(2).await;

    let mut requests = Vec::new();
    for i in 0..8 {
        let mut client = cluster.client(i % 2).await;
        requests.push(async move {
            client
                .put(PutRequest {
                    file_name: "/shared.txt".to_string(),
                    file_data: Some(format!("writer-{}", i).into_bytes()),
                })
                .await
                .map(|r| r.into_inner().success)
        });
    }

    let results = timeout(Duration::from_secs(30), futures::future::join_all(requests))
        .await
        .expect("writers deadlocked");
    assert!(results.into_iter().all(|r| r.unwrap()));

    let mut client = cluster.client(0).await;
    let data = timeout(
        STEP,
        client.get(GetRequest {
            file_name: "/shared.txt".to_string(),
        }),
    )
    .await
    .unwrap()
    .unwrap()
    .into_inner()
    .file_data
    .unwrap();
    assert!(String::from_utf8(data).unwrap().starts_with("writer-"));

    cluster.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_rpc_shuts_frontend_down() {
    let mut cluster = TestCluster::start(1).await;
    let mut client = cluster.client(0).await;

    client.stop(StopRequest {}).await.unwrap();

    let frontend = cluster.frontends.remove(0);
    timeout(STEP, frontend.wait(Duration::from_secs(2)))
        .await
        .expect("front-end did not stop");

    cluster.shutdown();
}
