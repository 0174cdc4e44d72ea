//! HTTP front end for the prediction service.
//!
//! Each accepted connection runs in its own task and carries one request.
//! Inference is synchronous and short, so it runs inline on the task. At most
//! `max_connections` tasks exist at once; further clients wait in the listen
//! backlog until a slot frees up.

pub mod http;
mod routes;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::adapters::JsonArtifactStore;
use crate::application::{InferencePipeline, PredictionService};
use crate::config::ServiceConfig;

pub use http::{Request, RequestError, Response};
pub use routes::route;

/// Time allowed for a client to send a complete request.
pub const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on concurrently served connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Load the configured artifact, then bind.
///
/// The socket is only opened once a usable model is in memory, so a failed
/// load leaves the address free.
///
/// # Errors
/// Returns `HeartguardError::Artifact` if the artifact is missing or invalid,
/// and `HeartguardError::Io` if the address cannot be bound.
pub async fn start(config: &ServiceConfig) -> crate::Result<Server> {
    let pipeline = InferencePipeline::load(&JsonArtifactStore::new(), &config.artifact_path)?;
    tracing::info!(
        artifact = %config.artifact_path.display(),
        "Model artifact loaded"
    );

    let service = PredictionService::new(pipeline).with_probability(config.include_probability);
    let server = Server::bind(&config.bind_addr, service, config.max_body_bytes)
        .await?
        .with_max_connections(config.max_connections);
    Ok(server)
}

/// Bound listener plus the shared service.
pub struct Server {
    listener: TcpListener,
    service: PredictionService,
    max_body_bytes: usize,
    connections: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket.
    ///
    /// # Errors
    /// Returns error if the address is invalid or already in use.
    pub async fn bind(
        addr: &str,
        service: PredictionService,
        max_body_bytes: usize,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            service,
            max_body_bytes,
            connections: Arc::new(Semaphore::new(DEFAULT_MAX_CONNECTIONS)),
        })
    }

    /// Cap the number of connections served at once (minimum 1).
    #[must_use]
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.connections = Arc::new(Semaphore::new(max.clamp(1, Semaphore::MAX_PERMITS)));
        self
    }

    /// # Errors
    /// Returns error if the socket address cannot be read.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    /// Returns error if the local address cannot be read.
    pub async fn run(self) -> std::io::Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Serve until `shutdown` resolves. In-flight connections finish on
    /// their own tasks.
    ///
    /// # Errors
    /// Returns error if the local address cannot be read.
    pub async fn run_until<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()>,
    {
        tracing::info!(addr = %self.local_addr()?, "Prediction server listening");
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Shutdown requested, no longer accepting connections");
                    return Ok(());
                }
                accepted = self.accept_within_limit() => match accepted {
                    Ok((permit, stream, peer)) => {
                        let service = self.service.clone();
                        let limit = self.max_body_bytes;
                        tokio::spawn(async move {
                            handle_connection(stream, peer, &service, limit).await;
                            drop(permit);
                        });
                    }
                    Err(e) => tracing::warn!(error = %e, "Failed to accept connection"),
                },
            }
        }
    }

    /// Wait for a free connection slot, then accept. The permit is released
    /// when the returned guard drops.
    async fn accept_within_limit(
        &self,
    ) -> std::io::Result<(OwnedSemaphorePermit, TcpStream, SocketAddr)> {
        let permit = Arc::clone(&self.connections)
            .acquire_owned()
            .await
            .map_err(|_| std::io::Error::other("connection limiter closed"))?;
        let (stream, peer) = self.listener.accept().await?;
        Ok((permit, stream, peer))
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    service: &PredictionService,
    max_body_bytes: usize,
) {
    let response = match tokio::time::timeout(
        READ_TIMEOUT,
        http::read_request(&mut stream, max_body_bytes),
    )
    .await
    {
        Err(_) => Response::detail(408, "Request Timeout"),
        Ok(Ok(None)) => return,
        Ok(Ok(Some(request))) => {
            tracing::debug!(%peer, method = %request.method, path = %request.path, "Request");
            routes::route(service, &request)
        }
        Ok(Err(e)) => match e.status() {
            Some(status) => {
                tracing::debug!(%peer, error = %e, "Rejected request");
                Response::detail(status, &e.to_string())
            }
            None => {
                tracing::debug!(%peer, error = %e, "Connection dropped");
                return;
            }
        },
    };

    if let Err(e) = stream.write_all(&response.to_bytes()).await {
        tracing::debug!(%peer, error = %e, "Failed to write response");
        return;
    }
    let _ = stream.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FittedPipelineParameters, PatientRecord};
    use crate::ports::{ArtifactError, ArtifactStore};
    use crate::HeartguardError;
    use tokio::io::AsyncReadExt;

    async fn start() -> (SocketAddr, PredictionService, tokio::sync::oneshot::Sender<()>) {
        let service = PredictionService::new(InferencePipeline::new(Arc::new(
            FittedPipelineParameters::fixture(),
        )));
        let server = Server::bind("127.0.0.1:0", service.clone(), 64 * 1024)
            .await
            .expect("Should bind");
        let addr = server.local_addr().expect("Should have address");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));
        (addr, service, tx)
    }

    async fn send(addr: SocketAddr, raw: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.expect("Should connect");
        stream.write_all(raw).await.expect("Should write");
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.expect("Should read");
        String::from_utf8(out).expect("Should be UTF-8")
    }

    fn post_predict(body: &str) -> Vec<u8> {
        format!(
            "POST /predict HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn test_end_to_end_predict_and_metrics() {
        let (addr, _service, _shutdown) = start().await;
        let body = PatientRecord::reference_json().to_string();

        let response = send(addr, &post_predict(&body)).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.ends_with("{\"heart_disease_prediction\":1}"), "{response}");

        let metrics = send(addr, b"GET /metrics HTTP/1.1\r\n\r\n").await;
        assert!(metrics.ends_with("{\"total_prediction_requests\":1}"), "{metrics}");
    }

    #[tokio::test]
    async fn test_concurrent_requests_counted_exactly() {
        let (addr, service, _shutdown) = start().await;
        let body = PatientRecord::reference_json().to_string();
        let request = post_predict(&body);

        let mut handles = Vec::new();
        for _ in 0..32 {
            let request = request.clone();
            handles.push(tokio::spawn(async move { send(addr, &request).await }));
        }
        for handle in handles {
            let response = handle.await.expect("Should join");
            assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        }

        assert_eq!(service.metrics().total_prediction_requests, 32);
    }

    #[tokio::test]
    async fn test_status_mapping_over_the_wire() {
        let (addr, _service, _shutdown) = start().await;

        let bad_json = send(addr, &post_predict("{oops")).await;
        assert!(bad_json.starts_with("HTTP/1.1 400"), "{bad_json}");

        let invalid = send(addr, &post_predict("{\"age\": 63}")).await;
        assert!(invalid.starts_with("HTTP/1.1 422"), "{invalid}");
        assert!(invalid.contains("\"loc\":[\"body\",\"trestbps\"]"), "{invalid}");

        let too_large = send(
            addr,
            b"POST /predict HTTP/1.1\r\nContent-Length: 1000000\r\n\r\n",
        )
        .await;
        assert!(too_large.starts_with("HTTP/1.1 413"), "{too_large}");

        let missing = send(addr, b"GET /docs HTTP/1.1\r\n\r\n").await;
        assert!(missing.starts_with("HTTP/1.1 404"), "{missing}");
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let service = PredictionService::new(InferencePipeline::new(Arc::new(
            FittedPipelineParameters::fixture(),
        )));
        let server = Server::bind("127.0.0.1:0", service, 1024)
            .await
            .expect("Should bind");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        tx.send(()).expect("Should signal");
        handle
            .await
            .expect("Should join")
            .expect("Should stop cleanly");
    }

    #[tokio::test]
    async fn test_missing_artifact_never_binds() {
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("Should reserve a port");
        let dir = tempfile::tempdir().expect("Should create tempdir");
        let config = ServiceConfig {
            bind_addr: addr.to_string(),
            artifact_path: dir.path().join("absent.json"),
            ..ServiceConfig::default()
        };

        let result = super::start(&config).await;
        assert!(
            matches!(result, Err(HeartguardError::Artifact(ArtifactError::NotFound(_)))),
            "load failure should surface before binding"
        );
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_start_serves_saved_artifact() {
        let dir = tempfile::tempdir().expect("Should create tempdir");
        let artifact = dir.path().join("model.json");
        JsonArtifactStore::new()
            .save(&FittedPipelineParameters::fixture(), &artifact)
            .expect("Should save artifact");
        let config = ServiceConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            artifact_path: artifact,
            include_probability: true,
            ..ServiceConfig::default()
        };

        let server = super::start(&config).await.expect("Should start");
        let addr = server.local_addr().expect("Should have address");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        let body = PatientRecord::reference_json().to_string();
        let response = send(addr, &post_predict(&body)).await;
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert!(response.contains("\"probability\":"), "{response}");
        let _ = tx.send(());
    }

    #[tokio::test]
    async fn test_connection_limit_holds_back_extra_clients() {
        let service = PredictionService::new(InferencePipeline::new(Arc::new(
            FittedPipelineParameters::fixture(),
        )));
        let server = Server::bind("127.0.0.1:0", service.clone(), 1024)
            .await
            .expect("Should bind")
            .with_max_connections(1);
        let addr = server.local_addr().expect("Should have address");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        // Occupies the only slot until it disconnects.
        let idle = TcpStream::connect(addr).await.expect("Should connect");

        let mut waiting = TcpStream::connect(addr).await.expect("Should connect");
        let body = PatientRecord::reference_json().to_string();
        waiting
            .write_all(&post_predict(&body))
            .await
            .expect("Should write");
        let mut out = Vec::new();
        let early =
            tokio::time::timeout(Duration::from_millis(200), waiting.read_to_end(&mut out)).await;
        assert!(early.is_err(), "second client was served while the slot was taken");
        assert_eq!(service.metrics().total_prediction_requests, 0);

        drop(idle);
        tokio::time::timeout(Duration::from_secs(5), waiting.read_to_end(&mut out))
            .await
            .expect("Should be served once the slot frees")
            .expect("Should read");
        let response = String::from_utf8(out).expect("Should be UTF-8");
        assert!(response.starts_with("HTTP/1.1 200 OK"), "{response}");
        assert_eq!(service.metrics().total_prediction_requests, 1);
        let _ = tx.send(());
    }
}
