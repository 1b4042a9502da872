//! Shared test harness: an in-process confkv HTTP server.
//!
//! Each [`TestServer`] binds `127.0.0.1:0`, serves [`confkv::server::router`]
//! over its own in-memory SQLite store, and shuts down when dropped.

#![allow(dead_code)]

use confkv::server;
use confkv::store::{ConfigService, RemoteRepository};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::task::JoinHandle;

/// A running server bound to an ephemeral port.
pub struct TestServer {
    addr: SocketAddr,
    service: ConfigService,
    client: reqwest::Client,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Starts a server over a fresh in-memory store.
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(ConfigService::memory()?).await
    }

    /// Starts a server over `service`.
    pub async fn start_with(service: ConfigService) -> anyhow::Result<Self> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = server::router(service.clone());
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Ok(Self {
            addr,
            service,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()?,
            handle,
        })
    }

    /// Base URL, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// The store behind the server, for seeding and inspection.
    pub fn service(&self) -> &ConfigService {
        &self.service
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// A service that reaches this server through the remote backend.
    pub fn remote_service(&self) -> ConfigService {
        let repo = RemoteRepository::new(&self.base_url(), Duration::from_secs(10))
            .expect("valid test server URL");
        ConfigService::custom(repo)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.delete(self.url(path)).send().await
    }

    pub async fn put_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.put(self.url(path)).json(body).send().await
    }

    pub async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).json(body).send().await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
