use async_trait::async_trait;
use reqwest::{Request, Response};

/// Executes upstream requests. Implemented by [`super::BasicClient`].
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
