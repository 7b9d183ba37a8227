//! HTTP/1.1 engine connector.
//!
//! Wire protocol, relative to the configured engine address:
//!
//! | Call | Request | Reply |
//! |---|---|---|
//! | deploy | `POST /deployments`, zip body, `x-package-name` header | `{"process_id": ".."}` |
//! | undeploy | `POST /undeployments`, zip body, `x-package-name` header | any 2xx |
//! | endpoints | `GET /processes/{id}/endpoints` | `{"<partner role>": "<uri>", ..}` |
//!
//! Every request carries HTTP basic authentication.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST};
use http::{Method, Request, StatusCode, Uri};
use http_body_util::{BodyExt, Full};
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};
use crate::{EngineConnector, EngineCredentials, EnginePackage};

const PACKAGE_NAME_HEADER: &str = "x-package-name";

/// Engine connector speaking plain HTTP.
///
/// Opens one connection per call; only `http://` addresses are supported.
#[derive(Debug, Clone)]
#[must_use]
pub struct HttpEngineConnector {
    timeout: Duration,
}

impl Default for HttpEngineConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct DeployReply {
    #[serde(default)]
    process_id: Option<String>,
}

/// Where a request goes: TCP address, `Host` header, and path prefix.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    connect: String,
    host: String,
    base_path: String,
}

impl Target {
    fn parse(address: &str) -> EngineResult<Self> {
        let uri: Uri = address
            .parse()
            .map_err(|_| EngineError::InvalidAddress(address.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(EngineError::InvalidAddress(address.to_string()));
        }
        let host = uri
            .host()
            .ok_or_else(|| EngineError::InvalidAddress(address.to_string()))?;
        let port = uri.port_u16().unwrap_or(80);
        Ok(Self {
            connect: format!("{host}:{port}"),
            host: uri
                .authority()
                .map_or_else(|| host.to_string(), |authority| authority.to_string()),
            base_path: uri.path().trim_end_matches('/').to_string(),
        })
    }

    fn path(&self, suffix: &str) -> String {
        format!("{}{suffix}", self.base_path)
    }
}

fn basic_auth(credentials: &EngineCredentials) -> String {
    let token = STANDARD.encode(format!("{}:{}", credentials.login, credentials.password));
    format!("Basic {token}")
}

impl HttpEngineConnector {
    /// Connector with a 30 second timeout per call.
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(30),
        }
    }

    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn request(
        &self,
        target: &Target,
        method: Method,
        path: &str,
        credentials: &EngineCredentials,
        package: Option<&EnginePackage>,
    ) -> EngineResult<Request<Full<Bytes>>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(target.path(path))
            .header(HOST, &target.host)
            .header(AUTHORIZATION, basic_auth(credentials));
        let body = match package {
            Some(package) => {
                builder = builder
                    .header(CONTENT_TYPE, "application/zip")
                    .header(PACKAGE_NAME_HEADER, &package.name);
                package.bytes.clone()
            }
            None => Bytes::new(),
        };
        builder
            .body(Full::new(body))
            .map_err(|e| EngineError::Request(e.to_string()))
    }

    /// Send one request and collect the reply, failing on non-2xx.
    async fn send(&self, target: &Target, request: Request<Full<Bytes>>) -> EngineResult<Bytes> {
        let uri = request.uri().clone();
        let exchange = async {
            let stream = TcpStream::connect(&target.connect)
                .await
                .map_err(|e| EngineError::Connect {
                    address: target.connect.clone(),
                    reason: e.to_string(),
                })?;
            let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
                .await
                .map_err(|e| EngineError::Connect {
                    address: target.connect.clone(),
                    reason: e.to_string(),
                })?;

            tokio::spawn(async move {
                if let Err(e) = conn.await {
                    warn!(error = %e, "engine connection error");
                }
            });

            let response = sender
                .send_request(request)
                .await
                .map_err(|e| EngineError::Request(e.to_string()))?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| EngineError::Request(e.to_string()))?
                .to_bytes();
            Ok::<(StatusCode, Bytes), EngineError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| EngineError::Timeout(self.timeout))??;

        debug!(%uri, %status, bytes = body.len(), "engine replied");
        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl EngineConnector for HttpEngineConnector {
    async fn deploy(
        &self,
        package: &EnginePackage,
        credentials: &EngineCredentials,
    ) -> EngineResult<String> {
        let target = Target::parse(&credentials.address)?;
        let request = self.request(&target, Method::POST, "/deployments", credentials, Some(package))?;
        let body = self.send(&target, request).await?;

        let reply: DeployReply =
            serde_json::from_slice(&body).map_err(|e| EngineError::Decode(e.to_string()))?;
        let process_id = reply
            .process_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or(EngineError::EmptyProcessId)?;

        info!(package = %package.name, %process_id, "package deployed to engine");
        Ok(process_id)
    }

    async fn undeploy(
        &self,
        package: &EnginePackage,
        credentials: &EngineCredentials,
    ) -> EngineResult<()> {
        let target = Target::parse(&credentials.address)?;
        let request = self.request(&target, Method::POST, "/undeployments", credentials, Some(package))?;
        self.send(&target, request).await?;

        info!(package = %package.name, "package undeployed from engine");
        Ok(())
    }

    async fn endpoints_for_process(
        &self,
        process_id: &str,
        credentials: &EngineCredentials,
    ) -> EngineResult<HashMap<String, String>> {
        let target = Target::parse(&credentials.address)?;
        let path = format!("/processes/{}/endpoints", urlencoding::encode(process_id));
        let request = self.request(&target, Method::GET, &path, credentials, None)?;
        let body = self.send(&target, request).await?;

        serde_json::from_slice(&body).map_err(|e| EngineError::Decode(e.to_string()))
    }
}
