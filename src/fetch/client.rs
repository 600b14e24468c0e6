use async_trait::async_trait;
use reqwest::{Request, Response};

/// Seam between request construction and transport, so auth wrappers can
/// decorate any client.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
