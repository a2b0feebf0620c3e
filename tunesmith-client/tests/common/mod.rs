//! In-process stand-in for the upstream generation API

#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tunesmith_client::api::HttpTransport;
use tunesmith_client::AuthStore;
use tunesmith_common::MemoryKeyValueStore;

pub const TEST_API_KEY: &str = "test-key";

/// Mock upstream bound to an ephemeral local port
pub struct MockUpstream {
    pub addr: std::net::SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl MockUpstream {
    pub async fn start(app: Router) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .expect("mock upstream failed");
        });

        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub fn url(&self, prefix: &str) -> String {
        format!("http://{}{}", self.addr, prefix)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Credential holder that is already logged in
pub fn logged_in_auth() -> AuthStore {
    let auth = AuthStore::new(Arc::new(MemoryKeyValueStore::new()));
    assert!(auth.login(TEST_API_KEY).unwrap());
    auth
}

pub fn transport(base_url: String, auth: AuthStore) -> HttpTransport {
    HttpTransport::new(base_url, Duration::from_secs(5), auth).unwrap()
}

/// Address nothing listens on
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
