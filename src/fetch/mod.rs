//! HTTP plumbing shared by the object listing, footfall download and live
//! crowding clients.

mod basic;
pub mod auth;

pub use basic::BasicClient;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Request, Response};

/// Sends one prepared request. Decorators such as [`auth::UrlParam`] adjust
/// the request and hand it on to the client they wrap.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}

/// Issues a GET and returns the body, failing on transport errors and non-2xx
/// statuses.
pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Vec<u8>> {
    let req = Request::new(
        reqwest::Method::GET,
        url.parse().with_context(|| format!("invalid URL '{url}'"))?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?.to_vec())
}

/// Like [`fetch_bytes`], decoding the body as UTF-8 text.
pub async fn fetch_text<C: HttpClient>(client: &C, url: &str) -> Result<String> {
    let bytes = fetch_bytes(client, url).await?;
    String::from_utf8(bytes).with_context(|| format!("response from '{url}' is not UTF-8"))
}
