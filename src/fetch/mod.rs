mod basic;
mod client;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;

use anyhow::Result;
use reqwest::header::{ACCEPT, HeaderValue};

/// Content negotiation used for metric queries: CSV preferred, JSON error
/// bodies still accepted.
pub const ACCEPT_CSV: &str = "text/csv, application/json; q=0.1";

/// Issues a GET and returns the body as text.
///
/// # Errors
///
/// Fails on transport errors and on any non-success status.
pub async fn fetch_text<C: HttpClient + ?Sized>(client: &C, url: &str, accept: &str) -> Result<String> {
    let mut req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    req.headers_mut().insert(ACCEPT, HeaderValue::from_str(accept)?);

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.text().await?)
}
