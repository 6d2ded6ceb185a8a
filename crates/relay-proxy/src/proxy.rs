//! Per-request forwarding to the local backend.

use std::error::Error as StdError;

use bytes::Bytes;
use http::header::HeaderName;
use http::uri::{Authority, Uri};
use http::{Request, Response, StatusCode};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use crate::error::{ProxyError, ProxyResult};

/// Response body handed back to the inbound connection.
pub type ProxyBody = UnsyncBoxBody<Bytes, hyper::Error>;

/// Forwards requests to a single fixed backend.
///
/// Cheap to clone; clones share the backend connection pool.
#[derive(Clone, Debug)]
pub struct ReverseProxy {
    backend: Authority,
    probe_header: HeaderName,
    client: Client<HttpConnector, Incoming>,
}

impl ReverseProxy {
    /// `backend` is a `host:port` authority such as `localhost:3000`.
    pub fn new(backend: &str, probe_header: &str) -> ProxyResult<Self> {
        let backend = backend
            .parse::<Authority>()
            .map_err(|_| ProxyError::InvalidBackend(backend.to_string()))?;
        let probe_header = HeaderName::from_bytes(probe_header.as_bytes())
            .map_err(|_| ProxyError::InvalidProbeHeader(probe_header.to_string()))?;
        let client = Client::builder(TokioExecutor::new()).build_http();

        Ok(Self {
            backend,
            probe_header,
            client,
        })
    }

    pub fn backend(&self) -> &Authority {
        &self.backend
    }

    /// Handle one inbound request.
    ///
    /// Never fails: backend errors are rendered as a 500 response.
    pub async fn handle(&self, req: Request<Incoming>) -> Response<ProxyBody> {
        if self.is_readiness_probe(&req) {
            debug!("readiness probe answered locally");
            return text_response(StatusCode::OK, "ok");
        }

        let method = req.method().clone();
        let (mut parts, body) = req.into_parts();
        let path = parts.uri.path_and_query().map_or("/", |pq| pq.as_str());

        parts.uri = match Uri::builder()
            .scheme("http")
            .authority(self.backend.clone())
            .path_and_query(path)
            .build()
        {
            Ok(uri) => uri,
            Err(e) => {
                warn!(error = %e, "could not build backend uri");
                return text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Proxy error: {e}"));
            }
        };
        let uri = parts.uri.clone();

        match self.client.request(Request::from_parts(parts, body)).await {
            Ok(resp) => {
                debug!(%method, %uri, status = %resp.status(), "proxied request");
                resp.map(|body| body.boxed_unsync())
            }
            Err(e) => {
                let message = error_chain(&e);
                warn!(%method, %uri, error = %message, "backend request failed");
                text_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("Proxy error: {message}"),
                )
            }
        }
    }
}

impl ReverseProxy {
    /// The probe header counts only when it carries a non-empty value.
    fn is_readiness_probe<B>(&self, req: &Request<B>) -> bool {
        req.headers()
            .get(&self.probe_header)
            .is_some_and(|value| !value.is_empty())
    }
}

fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ProxyBody> {
    let body: ProxyBody = Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync();
    let mut resp = Response::new(body);
    *resp.status_mut() = status;
    resp
}

/// Render an error with all of its causes, outermost first.
fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
