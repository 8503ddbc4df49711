//! Sends raw request text with reqwest

use crate::config::HttpConfig;
use crate::error::CliError;
use async_trait::async_trait;
use fuzzy_engine::{RawResponse, RequestSender, TransportError};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{Method, Version};
use std::time::Duration;
use tracing::debug;

/// Request line and headers parsed out of a raw head
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    pub version: Option<Version>,
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

/// Parse `METHOD TARGET [VERSION]` followed by `Name: value` lines.
///
/// A target that is only a path is joined with the `Host` header. `Host`
/// and `Content-Length` are left to the client.
pub fn parse_raw_request(head: &str, default_scheme: &str) -> Result<RawRequest, TransportError> {
    let mut lines = head.lines().map(|line| line.trim_end_matches('\r'));

    let request_line = lines
        .next()
        .filter(|line| !line.trim().is_empty())
        .ok_or_else(|| TransportError::Request("empty request line".to_string()))?;

    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), version, None) => (method, target, version),
        _ => {
            return Err(TransportError::Request(format!(
                "invalid request line: {}",
                request_line
            )))
        }
    };

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| TransportError::Request(format!("invalid method: {}", method)))?;

    let version = match version {
        None => None,
        Some("HTTP/1.0") => Some(Version::HTTP_10),
        Some("HTTP/1.1") => Some(Version::HTTP_11),
        Some(other) if other.starts_with("HTTP/") => None,
        Some(other) => {
            return Err(TransportError::Request(format!(
                "invalid HTTP version: {}",
                other
            )))
        }
    };

    let mut host = None;
    let mut headers = Vec::new();
    for line in lines.take_while(|line| !line.is_empty()) {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| TransportError::Request(format!("invalid header line: {}", line)))?;
        let (name, value) = (name.trim(), value.trim());

        if name.eq_ignore_ascii_case("host") {
            host = Some(value.to_string());
            continue;
        }
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }

        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::Request(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::Request(format!("invalid value for header {}", name)))?;
        headers.push((name, value));
    }

    let url = if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        let host = host.ok_or_else(|| {
            TransportError::Request(format!("relative target {} without a Host header", target))
        })?;
        format!("{}://{}{}", default_scheme, host, target)
    };

    Ok(RawRequest {
        method,
        url,
        version,
        headers,
    })
}

/// Renders `HTTP/x.y STATUS REASON` followed by the response headers
fn render_head(response: &reqwest::Response) -> String {
    let mut head = format!("{:?} {}", response.version(), response.status());
    for (name, value) in response.headers() {
        head.push('\n');
        head.push_str(name.as_str());
        head.push_str(": ");
        head.push_str(&String::from_utf8_lossy(value.as_bytes()));
    }
    head
}

/// [`RequestSender`] backed by a shared reqwest client
pub struct ReqwestSender {
    client: reqwest::Client,
    default_scheme: String,
}

impl ReqwestSender {
    pub fn new(config: &HttpConfig) -> Result<Self, CliError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| CliError::Http(e.to_string()))?;

        Ok(Self {
            client,
            default_scheme: config.default_scheme.clone(),
        })
    }
}

#[async_trait]
impl RequestSender for ReqwestSender {
    async fn send(&self, head: &str, body: &str) -> Result<RawResponse, TransportError> {
        let request = parse_raw_request(head, &self.default_scheme)?;
        debug!("Sending {} {}", request.method, request.url);

        let mut builder = self.client.request(request.method, &request.url);
        if let Some(version) = request.version {
            builder = builder.version(version);
        }
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if !body.is_empty() {
            builder = builder.body(body.to_string());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_connect() {
                TransportError::MustStop(format!("cannot connect to {}: {}", request.url, e))
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let head = render_head(&response);
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Request(format!("failed to read body: {}", e)))?;

        Ok(RawResponse { status, head, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_parse_relative_target() {
        let request = parse_raw_request(
            "GET /search?q=1 HTTP/1.1\r\nHost: example.com\r\nX-Token: abc\r\nContent-Length: 3\r\n",
            "http",
        )
        .unwrap();

        assert_eq!(request.method, Method::GET);
        assert_eq!(request.url, "http://example.com/search?q=1");
        assert_eq!(request.version, Some(Version::HTTP_11));
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers[0].0, "x-token");
        assert_eq!(request.headers[0].1, "abc");
    }

    #[test]
    fn test_parse_absolute_target_without_version() {
        let request = parse_raw_request("POST https://example.org/login", "http").unwrap();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.url, "https://example.org/login");
        assert_eq!(request.version, None);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_parse_uses_default_scheme() {
        let request = parse_raw_request("GET / HTTP/1.0\nHost: a.test:8443", "https").unwrap();
        assert_eq!(request.url, "https://a.test:8443/");
        assert_eq!(request.version, Some(Version::HTTP_10));
    }

    #[test]
    fn test_parse_errors() {
        let request_error = |head: &str| {
            matches!(
                parse_raw_request(head, "http"),
                Err(TransportError::Request(_))
            )
        };

        assert!(request_error(""));
        assert!(request_error("GET"));
        assert!(request_error("GET / HTTP/1.1 extra"));
        assert!(request_error("GET / FTP/1.0\nHost: a"));
        assert!(request_error("GET / HTTP/1.1"));
        assert!(request_error("GET / HTTP/1.1\nHost: a\nbroken header"));
        assert!(request_error("G(T / HTTP/1.1\nHost: a"));
    }

    #[test]
    fn test_headers_stop_at_blank_line() {
        let request =
            parse_raw_request("GET / HTTP/1.1\nHost: a\n\nnot: a header", "http").unwrap();
        assert!(request.headers.is_empty());
    }

    #[tokio::test]
    async fn test_send_to_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut buffer = [0u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let read = socket.read(&mut buffer).await.unwrap();
                if read == 0 {
                    break;
                }
                received.extend_from_slice(&buffer[..read]);
            }
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 4\r\nX-Seen: yes\r\n\r\nnope")
                .await
                .unwrap();
            String::from_utf8_lossy(&received).to_string()
        });

        let sender = ReqwestSender::new(&HttpConfig::default()).unwrap();
        let head = format!("GET /search?id=7 HTTP/1.1\r\nHost: {}\r\nX-Fuzz: 1", address);
        let response = sender.send(&head, "").await.unwrap();

        assert_eq!(response.status, 404);
        assert!(response.head.starts_with("HTTP/1.1 404 Not Found"));
        assert!(response.head.contains("x-seen: yes"));
        assert_eq!(response.body, "nope");

        let received = server.await.unwrap();
        assert!(received.starts_with("GET /search?id=7 HTTP/1.1\r\n"));
        assert!(received.to_lowercase().contains("x-fuzz: 1"));
    }

    #[tokio::test]
    async fn test_connection_refused_must_stop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        drop(listener);

        let sender = ReqwestSender::new(&HttpConfig::default()).unwrap();
        let error = sender
            .send(&format!("GET http://{}/ HTTP/1.1", address), "")
            .await
            .unwrap_err();

        assert!(matches!(error, TransportError::MustStop(_)));
    }
}
