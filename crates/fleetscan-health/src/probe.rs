//! Probe transport: ask an endpoint who it is and how far along it is.
//!
//! [`ProbeClient`] is the seam between the diagnoser and the network. The
//! diagnoser owns the time budget; clients only perform the exchange.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use serde::Deserialize;
use tracing::debug;

use fleetscan_core::{EndpointUrl, ProbeInfo, WorkerId};

use crate::error::ProbeError;

/// Boxed future returned by [`ProbeClient::probe`].
pub type ProbeFuture<'a> = Pin<Box<dyn Future<Output = Result<ProbeInfo, ProbeError>> + Send + 'a>>;

/// Retrieves an endpoint's self-reported identity and height.
///
/// Implementations must not apply their own retry policy. Dropping the
/// returned future abandons the exchange.
pub trait ProbeClient: Send + Sync {
    fn probe<'a>(&'a self, endpoint: &'a EndpointUrl) -> ProbeFuture<'a>;
}

/// JSON body served at the info path.
#[derive(Debug, Deserialize)]
struct InfoResponse {
    identity: String,
    height: u64,
}

/// HTTP/1 probe client: `GET <endpoint><info_path>` returning
/// `{"identity": "<hex>", "height": <u64>}`.
#[derive(Debug, Clone)]
pub struct HttpProbeClient {
    info_path: String,
}

impl HttpProbeClient {
    pub fn new(info_path: impl Into<String>) -> Self {
        let mut info_path = info_path.into();
        if !info_path.starts_with('/') {
            info_path.insert(0, '/');
        }
        Self { info_path }
    }

    pub fn info_path(&self) -> &str {
        &self.info_path
    }

    async fn fetch(&self, endpoint: &EndpointUrl) -> Result<ProbeInfo, ProbeError> {
        let invalid = |reason: &str| ProbeError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let base: http::Uri = endpoint
            .as_str()
            .parse()
            .map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        match base.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(invalid(&format!("unsupported scheme {other}"))),
            None => return Err(invalid("missing scheme")),
        }
        // Userinfo never leaves this function: both the socket address and
        // the host header are rebuilt from host and port alone.
        let authority = base.authority().ok_or_else(|| invalid("missing host"))?;
        let host = authority.host();
        let port = authority.port_u16();
        let address = format!("{host}:{}", port.unwrap_or(80));
        let host_header = match port {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let path = format!("{}{}", base.path().trim_end_matches('/'), self.info_path);

        let stream = tokio::net::TcpStream::connect(&address)
            .await
            .map_err(ProbeError::Connect)?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(ProbeError::Handshake)?;

        // Drive the connection in the background. It ends once `sender` is
        // dropped, including when the diagnoser abandons this future.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "probe connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&path)
            .header("host", host_header)
            .header("user-agent", concat!("fleetscan/", env!("CARGO_PKG_VERSION")))
            .header("accept", "application/json")
            .body(Empty::<Bytes>::new())
            .map_err(ProbeError::BuildRequest)?;

        let resp = sender.send_request(req).await.map_err(ProbeError::Request)?;
        if !resp.status().is_success() {
            return Err(ProbeError::Status(resp.status()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(ProbeError::Body)?
            .to_bytes();
        let info: InfoResponse = serde_json::from_slice(&body).map_err(ProbeError::Decode)?;
        let identity = WorkerId::parse_hex(&info.identity).map_err(ProbeError::InvalidIdentity)?;

        debug!(%endpoint, %identity, height = info.height, "probe answered");
        Ok(ProbeInfo {
            identity,
            height: info.height,
        })
    }
}

impl Default for HttpProbeClient {
    fn default() -> Self {
        Self::new(fleetscan_core::config::DEFAULT_INFO_PATH)
    }
}

impl ProbeClient for HttpProbeClient {
    fn probe<'a>(&'a self, endpoint: &'a EndpointUrl) -> ProbeFuture<'a> {
        Box::pin(self.fetch(endpoint))
    }
}
