use std::error::Error as StdError;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::time::Duration;

use reqwest::blocking::Client;
use thiserror::Error;

/// Failure to complete an HTTP exchange at all (no status received).
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Error connecting to {host} (getaddrinfo)")]
    HostUnreachable { host: String, detail: String },

    #[error("Error connecting to {host} (connection refused)")]
    ConnectionRefused { host: String },

    #[error("Request to {host} timed out after {}ms", .after.as_millis())]
    Timeout { host: String, after: Duration },

    #[error("Request to {host} failed: {detail}")]
    Other { host: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One HTTP call: method, URL, headers, body, timeout and optional proxy.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub timeout: Duration,
    pub proxy: Option<String>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>, timeout: Duration) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout,
            proxy: None,
        }
    }

    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Get, url, timeout)
    }

    pub fn post(url: impl Into<String>, timeout: Duration) -> Self {
        Self::new(HttpMethod::Post, url, timeout)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        self.header("Authorization", format!("Bearer {token}"))
    }

    pub fn json_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self.header("content-type", "application/json")
    }

    pub fn proxy(mut self, proxy: Option<&str>) -> Self {
        self.proxy = proxy.map(str::to_string);
        self
    }

    /// Host part of the URL, used to label transport failures.
    pub fn host(&self) -> String {
        host_of(&self.url)
    }
}

/// Status plus a body that can be read in one go or line by line.
pub struct HttpResponse {
    pub status: u16,
    host: String,
    body: Box<dyn BufRead + Send>,
}

impl HttpResponse {
    pub fn new(status: u16, host: impl Into<String>, body: Box<dyn BufRead + Send>) -> Self {
        HttpResponse {
            status,
            host: host.into(),
            body,
        }
    }

    pub fn from_text(status: u16, body: impl Into<String>) -> Self {
        let bytes = body.into().into_bytes();
        Self::new(status, "", Box::new(Cursor::new(bytes)))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(mut self) -> Result<String, TransportError> {
        let mut out = String::new();
        self.body
            .read_to_string(&mut out)
            .map_err(|e| TransportError::Other {
                host: self.host.clone(),
                detail: format!("failed to read response body: {e}"),
            })?;
        Ok(out)
    }

    pub fn into_reader(self) -> Box<dyn BufRead + Send> {
        self.body
    }
}

/// Executes a single HTTP call. Adapters only ever talk to backends through this.
pub trait HttpInvoker: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Blocking reqwest implementation; a client is built per call so timeout and
/// proxy can vary between requests.
#[derive(Debug, Default, Clone)]
pub struct ReqwestInvoker;

impl ReqwestInvoker {
    pub fn new() -> Self {
        ReqwestInvoker
    }

    fn client_for(&self, request: &HttpRequest) -> Result<Client, TransportError> {
        let mut builder = Client::builder().timeout(request.timeout);

        if let Some(proxy) = &request.proxy {
            let proxy = reqwest::Proxy::all(proxy).map_err(|e| TransportError::Other {
                host: request.host(),
                detail: format!("invalid proxy {proxy}: {e}"),
            })?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(|e| TransportError::Other {
            host: request.host(),
            detail: format!("failed to build HTTP client: {e}"),
        })
    }
}

impl HttpInvoker for ReqwestInvoker {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = self.client_for(request)?;

        let mut req = match request.method {
            HttpMethod::Get => client.get(&request.url),
            HttpMethod::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            req = req.body(body.clone());
        }

        log::debug!("{:?} {}", request.method, request.url);

        let resp = req
            .send()
            .map_err(|e| classify_reqwest(&request.host(), request.timeout, &e))?;
        let status = resp.status().as_u16();

        log::debug!("HTTP {status} from {}", request.url);

        Ok(HttpResponse::new(
            status,
            request.host(),
            Box::new(BufReader::new(resp)),
        ))
    }
}

/// Sort a reqwest failure into DNS / refused / timeout / other by walking its cause chain.
fn classify_reqwest(host: &str, timeout: Duration, err: &reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::Timeout {
            host: host.to_string(),
            after: timeout,
        };
    }

    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return TransportError::ConnectionRefused {
                        host: host.to_string(),
                    };
                }
                std::io::ErrorKind::TimedOut => {
                    return TransportError::Timeout {
                        host: host.to_string(),
                        after: timeout,
                    };
                }
                _ => {}
            }
        }

        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return TransportError::HostUnreachable {
                host: host.to_string(),
                detail: text,
            };
        }
        source = cause.source();
    }

    TransportError::Other {
        host: host.to_string(),
        detail: err.to_string(),
    }
}

/// `https://api.example.com:8080/v1/x` -> `api.example.com`
pub fn host_of(url: &str) -> String {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let authority = authority.rsplit_once('@').map(|(_, a)| a).unwrap_or(authority);

    if authority.starts_with('[') {
        return authority
            .split_once(']')
            .map(|(h, _)| format!("{h}]"))
            .unwrap_or_else(|| authority.to_string());
    }

    authority
        .split_once(':')
        .map(|(h, _)| h)
        .unwrap_or(authority)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://api.mistral.ai/v1/models"), "api.mistral.ai");
        assert_eq!(host_of("http://localhost:11434"), "localhost");
        assert_eq!(host_of("http://user:pw@proxy.local:3128/x"), "proxy.local");
        assert_eq!(host_of("http://[::1]:8080/"), "[::1]");
        assert_eq!(host_of("codestral.mistral.ai"), "codestral.mistral.ai");
    }

    #[test]
    fn test_request_builder_sets_json_headers() {
        let req = HttpRequest::post("https://x.test/v1", Duration::from_secs(1))
            .bearer("k")
            .json_body("{}".into());

        assert_eq!(req.method, HttpMethod::Post);
        assert!(req.headers.contains(&("Authorization".into(), "Bearer k".into())));
        assert!(req.headers.contains(&("content-type".into(), "application/json".into())));
        assert_eq!(req.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_response_text_and_status() {
        let resp = HttpResponse::from_text(503, "down");
        assert!(!resp.is_success());
        assert_eq!(resp.text().unwrap(), "down");
    }
}
