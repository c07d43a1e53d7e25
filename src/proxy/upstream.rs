//! Forwarding to the messaging app

use super::RequestHandler;
use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::utils::is_hop_by_hop_header;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{HeaderName, HOST};
use hyper::http::uri::PathAndQuery;
use hyper::{Body, Client, HeaderMap, Request, Response, Uri};
use std::time::Duration;
use tracing::debug;

/// Forwards admitted requests to the upstream app over plain HTTP
pub struct UpstreamHandler {
    client: Client<HttpConnector>,
    base: Uri,
    timeout: Duration,
}

impl UpstreamHandler {
    pub fn new(base: Uri, timeout: Duration) -> Result<Self> {
        if base.scheme_str() != Some("http") || base.authority().is_none() {
            return Err(Error::Config(format!(
                "upstream url must be an absolute http:// URL, got {}",
                base
            )));
        }

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .build(HttpConnector::new());

        Ok(Self {
            client,
            base,
            timeout,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self> {
        let base: Uri = config.url.parse()?;
        Self::new(base, Duration::from_secs(config.timeout_secs))
    }

    /// Map an inbound URI onto the upstream base, keeping path and query
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri> {
        let prefix = self.base.path().trim_end_matches('/');
        let path_and_query = inbound
            .path_and_query()
            .map(PathAndQuery::as_str)
            .unwrap_or("/");

        let mut parts = self.base.clone().into_parts();
        parts.path_and_query = Some(format!("{}{}", prefix, path_and_query).parse()?);

        Uri::from_parts(parts).map_err(|e| Error::Upstream(format!("invalid upstream uri: {}", e)))
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let hop_by_hop: Vec<HeaderName> = headers
        .keys()
        .filter(|name| is_hop_by_hop_header(name.as_str()))
        .cloned()
        .collect();
    for name in hop_by_hop {
        headers.remove(name);
    }
}

#[async_trait]
impl RequestHandler for UpstreamHandler {
    async fn handle(&self, req: Request<Body>) -> Result<Response<Body>> {
        let (mut parts, body) = req.into_parts();
        parts.uri = self.upstream_uri(&parts.uri)?;
        strip_hop_by_hop(&mut parts.headers);
        // Let the client derive Host from the upstream URI
        parts.headers.remove(HOST);

        debug!("Forwarding {} {} upstream", parts.method, parts.uri);
        let forwarded = Request::from_parts(parts, body);

        let mut response = tokio::time::timeout(self.timeout, self.client.request(forwarded)).await??;
        strip_hop_by_hop(response.headers_mut());
        Ok(response)
    }

    fn name(&self) -> &'static str {
        "upstream"
    }
}
