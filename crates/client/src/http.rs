//! [`RemoteStore`] over the store's HTTP API.
//!
//! Endpoints live under `{base_url}/files/chunked`; bodies are JSON except
//! chunk uploads, which send the raw bytes as `application/octet-stream`.

use std::time::Duration;

use bytes::Bytes;
use chunkup_protocol::{
    ChunkUploadResponse, ChunkedUploadStatus, CompleteResponse, InitiateRequest,
    InitiateResponse,
};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;

use crate::error::StoreError;
use crate::store::{RemoteStore, StoreFuture};

/// HTTP client for the chunked upload endpoints.
pub struct HttpStore {
    http: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    /// Creates a store rooted at `base_url` (e.g. `https://host/api/v1`).
    ///
    /// `token`, when set, is sent as a bearer token on every request.
    pub fn new(base_url: &str, token: Option<&str>, timeout: Duration) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| StoreError::Rejected("invalid auth token".into()))?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/files/chunked{path}", self.base_url)
    }
}

/// Turns a non-2xx response into [`StoreError::Api`].
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(StoreError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn read_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, StoreError> {
    let resp = check(request.send().await?).await?;
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl RemoteStore for HttpStore {
    fn initiate(&self, request: &InitiateRequest) -> StoreFuture<'_, InitiateResponse> {
        let builder = self.http.post(self.url("/initiate")).json(request);
        Box::pin(read_json(builder))
    }

    fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_number: u32,
        data: Bytes,
    ) -> StoreFuture<'_, ChunkUploadResponse> {
        let builder = self
            .http
            .post(self.url(&format!("/{upload_id}/chunks/{chunk_number}")))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data);
        Box::pin(read_json(builder))
    }

    fn complete(&self, upload_id: &str) -> StoreFuture<'_, CompleteResponse> {
        let builder = self.http.post(self.url(&format!("/{upload_id}/complete")));
        Box::pin(read_json(builder))
    }

    fn cancel(&self, upload_id: &str) -> StoreFuture<'_, ()> {
        let builder = self.http.delete(self.url(&format!("/{upload_id}")));
        Box::pin(async move {
            check(builder.send().await?).await?;
            Ok(())
        })
    }

    fn status(&self, upload_id: &str) -> StoreFuture<'_, ChunkedUploadStatus> {
        let builder = self.http.get(self.url(&format!("/{upload_id}/status")));
        Box::pin(read_json(builder))
    }
}
