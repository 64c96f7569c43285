//! reqwest-backed [`Fetch`] implementation.
//!
//! Pages are read whole (they are listings and metadata documents); archives are
//! streamed chunk by chunk straight into the destination file.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};

use crate::contract::{Fetch, FetchedPage, RemoteTarget};
use crate::error::TransportError;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose every request is bounded by `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn request(&self, target: &RemoteTarget) -> reqwest::RequestBuilder {
        let request = self.client.get(&target.url);
        match &target.bearer {
            Some(token) => request.header(AUTHORIZATION, format!("Bearer {token}")),
            None => request,
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch_page(&self, target: &RemoteTarget) -> Result<FetchedPage, TransportError> {
        debug!(url = %target.url, authenticated = target.bearer.is_some(), "[FETCH] GET page");
        let response = self.request(target).send().await.map_err(|e| {
            error!(error = ?e, url = %target.url, "[FETCH][ERROR] Request failed");
            TransportError::Http(e)
        })?;

        // Final URL after redirects.
        let url = response.url().to_string();
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.text().await?;
        debug!(url = %url, status, content_type = ?content_type, bytes = body.len(), "[FETCH] Page received");

        Ok(FetchedPage {
            url,
            status,
            content_type,
            body,
        })
    }

    async fn download_to(&self, target: &RemoteTarget, dest: &Path) -> Result<u64, TransportError> {
        let response = self.request(target).send().await?;
        let status = response.status();
        if !status.is_success() {
            error!(url = %target.url, status = %status, "[FETCH][ERROR] Download returned error status");
            return Err(TransportError::Status {
                url: target.url.clone(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut bytes_written: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes_written += chunk.len() as u64;
        }
        file.flush().await?;

        info!(url = %target.url, dest = %dest.display(), bytes_written, "[FETCH] Download complete");
        Ok(bytes_written)
    }
}
