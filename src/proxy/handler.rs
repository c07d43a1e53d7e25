use crate::error::Result;
use crate::utils::build_text_response;
use async_trait::async_trait;
use hyper::{Body, Request, Response, StatusCode};

/// Terminal stage reached once every gate has passed
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, req: Request<Body>) -> Result<Response<Body>>;

    fn name(&self) -> &'static str;
}

/// Answers every admitted request with the same status and body
#[derive(Debug, Clone)]
pub struct StaticHandler {
    status: StatusCode,
    body: String,
}

impl StaticHandler {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

impl Default for StaticHandler {
    fn default() -> Self {
        Self::new(StatusCode::OK, "OK")
    }
}

#[async_trait]
impl RequestHandler for StaticHandler {
    async fn handle(&self, _req: Request<Body>) -> Result<Response<Body>> {
        Ok(build_text_response(self.status, &self.body))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
