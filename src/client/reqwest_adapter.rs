//! Default HTTP transport backed by `reqwest`.
//!
//! Streams response bodies so download progress can be forwarded, aborts
//! cooperatively when the visit's cancel token fires, and optionally
//! retries idempotent GETs per [`RetryConfig`]; navigation mutations are
//! never replayed.

use crate::client::adapter::{AdapterRequest, AdapterResponse, HttpAdapter, RequestBody, SendContext};
use crate::client::retry::{parse_retry_after, RetryConfig, RetryDecision, RetryState};
use crate::error::{GlideError, Result};
use crate::types::{FormValue, Method, Progress, TransferDirection};
use async_trait::async_trait;
use bytes::BytesMut;
use futures::StreamExt;
use std::collections::BTreeMap;

/// `reqwest`-backed [`HttpAdapter`].
#[derive(Clone, Default)]
pub struct ReqwestAdapter {
    client: reqwest::Client,
    retry: Option<RetryConfig>,
}

impl ReqwestAdapter {
    /// Adapter over a default client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter wrapping an existing client (shared pools, proxies, TLS).
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        ReqwestAdapter {
            client,
            retry: None,
        }
    }

    /// Enable retries for idempotent GET requests.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    fn method_of(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    async fn send_once(
        &self,
        request: &AdapterRequest,
        ctx: &SendContext,
    ) -> Result<AdapterResponse> {
        let mut builder = self
            .client
            .request(Self::method_of(request.method), &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = ctx.timeout {
            builder = builder.timeout(timeout);
        }

        match &request.body {
            RequestBody::Empty => {}
            RequestBody::Json(value) => {
                builder = builder.json(value);
            }
            RequestBody::Multipart(fields) => {
                let mut form = reqwest::multipart::Form::new();
                for field in fields {
                    match &field.value {
                        FormValue::Text(text) => {
                            form = form.text(field.name.clone(), text.clone());
                        }
                        FormValue::File(file) => {
                            let part = reqwest::multipart::Part::bytes(file.bytes.to_vec())
                                .file_name(file.filename.clone())
                                .mime_str(&file.content_type)
                                .map_err(|e| GlideError::Config(e.to_string()))?;
                            form = form.part(field.name.clone(), part);
                        }
                    }
                }
                builder = builder.multipart(form);
            }
        }

        let response = tokio::select! {
            result = builder.send() => result.map_err(|e| {
                if e.is_timeout() {
                    GlideError::Timeout
                } else {
                    GlideError::Http(e.to_string())
                }
            })?,
            _ = ctx.cancel.cancelled() => return Err(GlideError::Aborted),
        };

        let status = response.status().as_u16();
        let final_url = Some(response.url().to_string());

        let mut headers = BTreeMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_ascii_lowercase(), v.to_string());
            }
        }

        let total = response.content_length();
        let mut stream = response.bytes_stream();
        let mut body = BytesMut::new();
        loop {
            let chunk = tokio::select! {
                chunk = stream.next() => chunk,
                _ = ctx.cancel.cancelled() => return Err(GlideError::Aborted),
            };
            match chunk {
                Some(Ok(bytes)) => {
                    body.extend_from_slice(&bytes);
                    ctx.report(Progress {
                        loaded: body.len() as u64,
                        total,
                        direction: TransferDirection::Download,
                    });
                }
                Some(Err(e)) => return Err(GlideError::Http(e.to_string())),
                None => break,
            }
        }

        Ok(AdapterResponse {
            status,
            headers,
            body: body.freeze(),
            final_url,
        })
    }
}

#[async_trait]
impl HttpAdapter for ReqwestAdapter {
    async fn send(&self, request: AdapterRequest, ctx: &SendContext) -> Result<AdapterResponse> {
        let retry_config = match (&self.retry, request.method) {
            (Some(config), Method::Get) => config.clone(),
            _ => RetryConfig::no_retry(),
        };
        let mut retry_state = RetryState::new(retry_config);

        loop {
            match self.send_once(&request, ctx).await {
                Ok(response) => {
                    if (400..600).contains(&response.status) {
                        let retry_after = response
                            .headers
                            .get("retry-after")
                            .and_then(|v| parse_retry_after(v));
                        match retry_state.should_retry_status(response.status, retry_after) {
                            RetryDecision::Retry(delay) => {
                                tracing::warn!(
                                    status = response.status,
                                    attempt = retry_state.attempts,
                                    ?delay,
                                    "retrying request"
                                );
                                tokio::time::sleep(delay).await;
                                continue;
                            }
                            RetryDecision::DontRetry => return Ok(response),
                        }
                    }
                    retry_state.reset();
                    return Ok(response);
                }
                Err(e) => {
                    let is_abort = e.is_abort();
                    match retry_state.should_retry_error(is_abort) {
                        RetryDecision::Retry(delay) => {
                            tracing::warn!(
                                attempt = retry_state.attempts,
                                ?delay,
                                error = %e,
                                "retrying request after transport failure"
                            );
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                        RetryDecision::DontRetry => return Err(e),
                    }
                }
            }
        }
    }
}
