use std::pin::Pin;
use std::time::Duration;

use bytes::Bytes;
use futures_util::stream::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::HttpCfg;
use crate::error::{CoreResult, RelayError};

/// A boxed stream of raw upstream body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = CoreResult<Bytes>> + Send>>;

/// Thin wrapper around reqwest::Client with defaults and helpers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    user_agent: String,
}

impl HttpClient {
    /// Streaming responses can run for minutes, so no total request timeout is
    /// set here; sessions bound each read with their own idle guard.
    pub fn from_cfg(cfg: &HttpCfg) -> CoreResult<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_millis(cfg.connect_timeout_ms));
        if let Some(n) = cfg.pool_max_idle_per_host {
            builder = builder.pool_max_idle_per_host(n);
        }
        let inner = builder
            .build()
            .map_err(|e| RelayError::Other(anyhow::anyhow!("http client build failed: {e}")))?;
        Ok(Self {
            inner,
            user_agent: "pantrychat/0.1".to_string(),
        })
    }

    pub fn new_default() -> CoreResult<Self> {
        Self::from_cfg(&HttpCfg::default())
    }

    /// POST JSON and hand back the response body as it arrives, chunk by chunk.
    /// Dropping the returned stream releases the connection.
    pub async fn post_stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> CoreResult<ByteStream> {
        let resp = self
            .inner
            .post(url)
            .json(body)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/x-ndjson")
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &body));
        }

        let chunks = resp.bytes_stream().map(|item| {
            item.map_err(|e| {
                tracing::warn!(error = %e, "upstream body read failed");
                RelayError::StreamInterrupted
            })
        });
        Ok(Box::pin(chunks))
    }

    pub async fn get_json<R: DeserializeOwned>(&self, url: &str) -> CoreResult<R> {
        let resp = self
            .inner
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamUnavailable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(map_http_error(status, &text));
        }

        resp.json::<R>().await.map_err(|e| RelayError::UpstreamStatus {
            code: status.as_u16().to_string(),
            message: format!("json decode error: {e}"),
        })
    }
}

fn map_http_error(status: StatusCode, body: &str) -> RelayError {
    if status.is_server_error() {
        RelayError::UpstreamUnavailable {
            reason: format!("status {}", status.as_u16()),
        }
    } else {
        RelayError::UpstreamStatus {
            code: status.as_u16().to_string(),
            message: truncate(body, 300),
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        let mut t = s[..cut].to_string();
        t.push_str("...");
        t
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, POST};
    use httpmock::MockServer;
    use serde_json::json;

    async fn collect(mut s: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = s.next().await {
            out.extend_from_slice(&chunk.expect("chunk"));
        }
        out
    }

    #[tokio::test]
    async fn post_stream_yields_body() {
        let server = MockServer::start();
        let m = server.mock(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .json_body(json!({"model": "llama2", "prompt": "hi", "stream": true}));
            then.status(200)
                .header("content-type", "application/x-ndjson")
                .body("{\"response\":\"a\"}\n{\"done\":true}\n");
        });

        let client = HttpClient::new_default().unwrap();
        let s = client
            .post_stream(
                &format!("{}/api/generate", server.base_url()),
                &json!({"model": "llama2", "prompt": "hi", "stream": true}),
            )
            .await
            .unwrap();
        assert_eq!(collect(s).await, b"{\"response\":\"a\"}\n{\"done\":true}\n");
        m.assert();
    }

    #[tokio::test]
    async fn post_stream_404_maps_to_status_error() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(404)
                .json_body(json!({"error": "model 'nope' not found"}));
        });
        let client = HttpClient::new_default().unwrap();
        let err = client
            .post_stream(&format!("{}/api/generate", server.base_url()), &json!({}))
            .await
            .err()
            .expect("should fail");
        match err {
            RelayError::UpstreamStatus { code, message } => {
                assert_eq!(code, "404");
                assert!(message.contains("not found"));
            }
            other => panic!("expected UpstreamStatus, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn post_stream_503_maps_to_unavailable() {
        let server = MockServer::start();
        let _m = server.mock(|when, then| {
            when.method(POST).path("/api/generate");
            then.status(503).body("loading model");
        });
        let client = HttpClient::new_default().unwrap();
        let err = client
            .post_stream(&format!("{}/api/generate", server.base_url()), &json!({}))
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, RelayError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn network_error_maps_to_unavailable() {
        // port 9 (discard) is typically closed
        let client = HttpClient::new_default().unwrap();
        let err = client
            .post_stream("http://127.0.0.1:9/api/generate", &json!({}))
            .await
            .err()
            .expect("should fail");
        assert!(matches!(err, RelayError::UpstreamUnavailable { .. }));
    }

    #[tokio::test]
    async fn get_json_success_and_bad_json() {
        let server = MockServer::start();
        let _ok = server.mock(|when, then| {
            when.method(GET).path("/api/tags");
            then.status(200).json_body(json!({"models": []}));
        });
        let _bad = server.mock(|when, then| {
            when.method(GET).path("/api/broken");
            then.status(200).body("not-json");
        });
        let client = HttpClient::new_default().unwrap();

        let v: serde_json::Value = client
            .get_json(&format!("{}/api/tags", server.base_url()))
            .await
            .unwrap();
        assert_eq!(v, json!({"models": []}));

        let err = client
            .get_json::<serde_json::Value>(&format!("{}/api/broken", server.base_url()))
            .await
            .unwrap_err();
        match err {
            RelayError::UpstreamStatus { code, message } => {
                assert_eq!(code, "200");
                assert!(message.starts_with("json decode error"));
            }
            other => panic!("expected UpstreamStatus, got: {:?}", other),
        }
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(200);
        let t = truncate(&s, 301);
        assert!(t.ends_with("..."));
        assert_eq!(t.len(), 300 + 3);
        assert_eq!(truncate("short", 300), "short");
    }
}
