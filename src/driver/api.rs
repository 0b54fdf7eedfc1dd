//! HTTP driver for the eCareHealth REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;

use super::traits::{ActionRequest, ApiRequest, PlatformDriver, RawOutcome};
use crate::utils::RunConfig;

pub struct ApiDriver {
    client: reqwest::Client,
    base_url: String,
    tenant: String,
}

impl ApiDriver {
    pub fn new(config: &RunConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeouts.request_ms))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tenant: config.tenant.clone(),
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Headers sent with every request. Step headers override these.
    pub fn common_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Accept", "application/json, text/plain, */*".to_string()),
            ("Content-Type", "application/json".to_string()),
            ("X-TENANT-ID", self.tenant.clone()),
        ]
    }

    async fn send(&self, request: &ApiRequest) -> Result<RawOutcome> {
        let url = self.url_for(&request.path);
        let method = request
            .method
            .parse::<reqwest::Method>()
            .map_err(|_| anyhow::anyhow!("Invalid HTTP method: {}", request.method))?;

        let mut req = self.client.request(method, &url);
        for (name, value) in self.common_headers() {
            if !request.headers.keys().any(|k| k.eq_ignore_ascii_case(name)) {
                req = req.header(name, value);
            }
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        debug!("{} {}", request.method, url);
        let res = req
            .send()
            .await
            .with_context(|| format!("{} {} failed", request.method, url))?;
        let status = res.status();
        let text = res
            .text()
            .await
            .with_context(|| format!("{} {}: failed to read body", request.method, url))?;

        if !status.is_success() {
            warn!("{} {} returned {}", request.method, request.path, status);
        }

        Ok(RawOutcome::http(status.as_u16(), parse_body(&text)))
    }
}

/// JSON body, the raw text for non-JSON replies, or null when empty.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[async_trait]
impl PlatformDriver for ApiDriver {
    fn platform_name(&self) -> &str {
        "api"
    }

    async fn perform(&self, request: &ActionRequest) -> Result<RawOutcome> {
        match request {
            ActionRequest::Api(req) => self.send(req).await,
            ActionRequest::Ui(seq) => {
                anyhow::bail!("API driver cannot run UI sequence '{}'", seq.label)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::traits::UiSequence;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Accept one connection, reply with `response` verbatim and hand back
    /// the raw request.
    async fn serve_once(response: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let (name, value) = l.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + length || n == 0 {
                        break;
                    }
                } else if n == 0 {
                    break;
                }
            }
            sock.write_all(response.as_bytes()).await.unwrap();
            sock.shutdown().await.ok();
            String::from_utf8_lossy(&raw).to_string()
        });
        (base, handle)
    }

    fn local_driver(base_url: String) -> ApiDriver {
        let config = RunConfig {
            base_url,
            tenant: "stage_tenant".to_string(),
            ..RunConfig::default()
        };
        ApiDriver::new(&config).unwrap()
    }

    fn driver() -> ApiDriver {
        let config = RunConfig {
            base_url: "https://stage-api.example.com/".to_string(),
            tenant: "stage_tenant".to_string(),
            ..RunConfig::default()
        };
        ApiDriver::new(&config).unwrap()
    }

    #[test]
    fn test_url_joining() {
        let d = driver();
        assert_eq!(
            d.url_for("/api/master/login"),
            "https://stage-api.example.com/api/master/login"
        );
        assert_eq!(
            d.url_for("api/master/provider?page=0&size=20"),
            "https://stage-api.example.com/api/master/provider?page=0&size=20"
        );
        assert_eq!(d.url_for("http://other/x"), "http://other/x");
    }

    #[test]
    fn test_common_headers_carry_tenant() {
        let headers = driver().common_headers();
        assert!(headers.contains(&("X-TENANT-ID", "stage_tenant".to_string())));
        assert!(headers.contains(&("Content-Type", "application/json".to_string())));
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(parse_body("oops"), json!("oops"));
    }

    #[tokio::test]
    async fn test_rejects_ui_sequences() {
        let req = ActionRequest::Ui(UiSequence {
            label: "Login".to_string(),
            commands: vec![],
        });
        assert!(driver().perform(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_sends_json_body_with_tenant() {
        let (base, server) = serve_once(
            "HTTP/1.1 201 Created\r\nContent-Type: application/json\r\nContent-Length: 16\r\nConnection: close\r\n\r\n{\"message\":\"ok\"}",
        )
        .await;
        let req = ActionRequest::Api(
            ApiRequest::new("POST", "/api/master/provider").json(json!({"firstName": "Steven"})),
        );

        let raw = local_driver(base).perform(&req).await.unwrap();
        let sent = server.await.unwrap().to_lowercase();

        assert_eq!(raw.status_code, Some(201));
        assert_eq!(raw.str_field("message"), Some("ok"));
        assert!(sent.starts_with("post /api/master/provider "));
        assert!(sent.contains("x-tenant-id: stage_tenant"));
        assert!(sent.contains("content-type: application/json"));
        assert!(sent.contains(r#"{"firstname":"steven"}"#));
    }

    #[tokio::test]
    async fn test_truncated_body_is_an_action_error() {
        // Promises 100 bytes, sends 6, then closes
        let (base, server) = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 100\r\n\r\n{\"mess",
        )
        .await;
        let req = ActionRequest::Api(ApiRequest::new("GET", "/api/master/patient"));

        let err = local_driver(base).perform(&req).await.unwrap_err();
        server.await.unwrap();

        assert!(format!("{:#}", err).contains("failed to read body"), "{:#}", err);
    }
}
