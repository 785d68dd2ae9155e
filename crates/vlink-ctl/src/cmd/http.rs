//! Shared HTTP request helpers for CLI commands.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

pub fn base_url(port: u16) -> String {
    format!("http://127.0.0.1:{}/api", port)
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to vlinkd at {}, is it running?", url))?;
    check(resp)
        .await?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn get_raw(url: &str) -> Result<reqwest::Response> {
    let resp = reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to vlinkd at {}, is it running?", url))?;
    check(resp).await
}

pub async fn post_json_body<T, R>(url: &str, body: &T, bearer: Option<&str>) -> Result<R>
where
    T: Serialize,
    R: for<'de> Deserialize<'de>,
{
    let mut req = reqwest::Client::new().post(url).json(body);
    if let Some(token) = bearer {
        req = req.bearer_auth(token);
    }
    let resp = req
        .send()
        .await
        .with_context(|| format!("failed to connect to vlinkd at {}, is it running?", url))?;
    check(resp)
        .await?
        .json::<R>()
        .await
        .context("failed to parse response")
}

/// Turn a non-success status into an error carrying the response text.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    bail!("daemon returned {}: {}", status, body.trim())
}
