use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;
use uuid::Uuid;

use super::http::send_with_retry;
use super::types::{BackendError, GenerateRequest, GenerateResponse, ModelInfo};
use super::Backend;
use crate::config::{BackendConfig, RetryPolicy};

/// Default CLI version (from Cargo.toml)
const DEFAULT_VERSION: &str = env!("CARGO_PKG_VERSION");

fn build_user_agent() -> String {
    std::env::var("CODEDIGEST_USER_AGENT")
        .unwrap_or_else(|_| format!("codedigest/{}", DEFAULT_VERSION))
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// HTTP client for an SGLang runtime endpoint.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Clone)]
pub struct SglangClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    user_agent: String,
    session_id: String,
}

impl SglangClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(config.timeout);
        // A runtime on this machine is never behind the system proxy.
        if is_loopback(&config.base_url) {
            builder = builder.no_proxy();
        }
        let client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            retry: config.retry,
            user_agent: build_user_agent(),
            session_id: Uuid::new_v4().to_string(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn build_url(&self, endpoint: &str) -> Result<Url, BackendError> {
        Ok(self.base_url.join(endpoint)?)
    }

    async fn read_json<R: DeserializeOwned>(
        response: reqwest::Response,
        endpoint: &str,
    ) -> Result<R, BackendError> {
        let status = response.status();
        debug!("=== Backend Response ===");
        debug!("Endpoint: {} Status: {}", endpoint, status);

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            let err = BackendError::from_status(status, error_text);
            error!("{} failed: {}", endpoint, err);
            return Err(err);
        }

        let body = response.text().await.map_err(BackendError::Body)?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Ask the runtime which model it serves. Used as a startup probe.
    pub async fn model_info(&self) -> Result<ModelInfo, BackendError> {
        let url = self.build_url("get_model_info")?;
        let request_id = Uuid::new_v4().to_string();

        let response = send_with_retry(&self.retry, url.as_str(), || {
            self.client
                .get(url.clone())
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id)
        })
        .await?;

        Self::read_json(response, "get_model_info").await
    }
}

impl Backend for SglangClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, BackendError> {
        let url = self.build_url("generate")?;
        let request_id = Uuid::new_v4().to_string();

        debug!("=== Backend Request ===");
        debug!("URL: {}", url);
        debug!(
            "Prompt: {} chars, max_new_tokens: {}, stop: {:?}, regex: {:?}",
            request.text.len(),
            request.sampling_params.max_new_tokens,
            request.sampling_params.stop,
            request.sampling_params.regex
        );

        let response = send_with_retry(&self.retry, url.as_str(), || {
            self.client
                .post(url.clone())
                .header("Content-Type", "application/json")
                .header("User-Agent", &self.user_agent)
                .header("x-request-id", &request_id)
                .header("x-request-session-id", &self.session_id)
                .json(request)
        })
        .await?;

        let response: GenerateResponse = Self::read_json(response, "generate").await?;
        if let Some(meta) = &response.meta_info {
            debug!("meta_info: {}", meta);
        }
        Ok(response.text)
    }
}

impl std::fmt::Debug for SglangClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SglangClient")
            .field("base_url", &self.base_url.as_str())
            .field("retry", &self.retry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamplingParams;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_build_user_agent() {
        let ua = build_user_agent();
        assert!(ua.starts_with("codedigest/") || std::env::var("CODEDIGEST_USER_AGENT").is_ok());
    }

    #[test]
    fn test_build_url() {
        let config = BackendConfig::for_local_port(30000).unwrap();
        let client = SglangClient::new(&config).unwrap();
        assert_eq!(
            client.build_url("generate").unwrap().as_str(),
            "http://localhost:30000/generate"
        );

        let config = BackendConfig::resolve(Some("http://gpu:8000/sglang/"), 0).unwrap();
        let client = SglangClient::new(&config).unwrap();
        assert_eq!(
            client.build_url("get_model_info").unwrap().as_str(),
            "http://gpu:8000/sglang/get_model_info"
        );
    }

    /// Accept one connection, capture the request, answer with `status` and `body`.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&request) {
                    break;
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&request).into_owned()
        });

        (port, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        request.len() >= header_end + 4 + content_length
    }

    fn loopback_config(port: u16) -> BackendConfig {
        BackendConfig::resolve(Some(&format!("http://127.0.0.1:{}", port)), 0).unwrap()
    }

    #[test]
    fn test_is_loopback() {
        assert!(is_loopback(&Url::parse("http://localhost:30000").unwrap()));
        assert!(is_loopback(&Url::parse("http://127.0.0.1:1").unwrap()));
        assert!(is_loopback(&Url::parse("http://[::1]:1").unwrap()));
        assert!(!is_loopback(&Url::parse("http://gpu-box:8000").unwrap()));
    }

    fn sample_request() -> GenerateRequest {
        GenerateRequest {
            text: "<|im_start|>user\nhi<|im_end|>\n".to_string(),
            sampling_params: SamplingParams {
                max_new_tokens: 16,
                temperature: 0.0,
                stop: vec!["\n".to_string()],
                regex: None,
            },
        }
    }

    #[tokio::test]
    async fn test_generate_round_trip() {
        let (port, server) =
            serve_once("200 OK", r#"{"text": " hello", "meta_info": {"id": "x"}}"#).await;
        let config = loopback_config(port).with_retry(RetryPolicy::none());
        let client = SglangClient::new(&config).unwrap();

        let output = client.generate(&sample_request()).await.unwrap();
        assert_eq!(output, " hello");

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /generate "));
        assert!(raw.to_ascii_lowercase().contains("x-request-id:"));
        let body = &raw[raw.find("\r\n\r\n").unwrap() + 4..];
        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent["sampling_params"]["max_new_tokens"], 16);
        assert_eq!(sent["sampling_params"]["stop"][0], "\n");
        assert!(sent["sampling_params"].get("regex").is_none());
    }

    #[tokio::test]
    async fn test_generate_surfaces_status_error() {
        let (port, server) = serve_once("400 Bad Request", "bad sampling params").await;
        let config = loopback_config(port).with_retry(RetryPolicy::none());
        let client = SglangClient::new(&config).unwrap();

        let err = client.generate(&sample_request()).await.unwrap_err();
        match err {
            BackendError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad sampling params");
            }
            other => panic!("unexpected error: {other}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_model_info_probe() {
        let (port, server) =
            serve_once("200 OK", r#"{"model_path": "Qwen/Qwen2-7B-Instruct", "is_generation": true}"#)
                .await;
        let config = loopback_config(port);
        let client = SglangClient::new(&config).unwrap();

        let info = client.model_info().await.unwrap();
        assert_eq!(info.model_path.as_deref(), Some("Qwen/Qwen2-7B-Instruct"));
        assert!(server.await.unwrap().starts_with("GET /get_model_info "));
    }

    #[test]
    fn test_debug_shows_endpoint() {
        let config = BackendConfig::for_local_port(1234).unwrap();
        let client = SglangClient::new(&config).unwrap();
        let debug_str = format!("{:?}", client);
        assert!(debug_str.contains("localhost:1234"));
    }
}
