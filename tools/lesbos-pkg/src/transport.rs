///
/// # Package Transport
///
/// Fetches raw package resources. `HttpTransport` talks HTTP(S) with hyper
/// over rustls on a private current-thread tokio runtime, so callers stay fully
/// synchronous. `MemoryTransport` serves resources from an in-memory map and is
/// used to exercise the installer without a network.
///
/// There is no retry policy: any connection failure, non-success status,
/// oversized body or timeout is returned as a transport error and aborts the
/// package fetch that issued it.
///

use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Bytes;
use hyper::header::{ACCEPT, LOCATION, USER_AGENT};
use hyper::{Request, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};
use tokio::runtime::Runtime;
use tracing::{debug, trace};

use crate::errors::PackageError;
use crate::locator::join_address;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on any single response body.
pub const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

const CLIENT_AGENT: &str = concat!("lesbos/", env!("CARGO_PKG_VERSION"));

pub trait Transport {
    fn get(&self, url: &str) -> Result<Vec<u8>, PackageError>;

    fn fetch(&self, base: &str, relative: &str) -> Result<Vec<u8>, PackageError> {
        self.get(&join_address(&[base, relative]))
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &str) -> Result<Vec<u8>, PackageError> {
        (**self).get(url)
    }
}

pub struct HttpTransport {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    runtime: Runtime,
    timeout: Duration,
    body_limit: usize,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("timeout", &self.timeout)
            .field("body_limit", &self.body_limit)
            .finish()
    }
}

impl HttpTransport {
    pub fn new() -> Result<Self, PackageError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, PackageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config()?)
            .https_or_http()
            .enable_http1()
            .build();
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Ok(Self {
            client,
            runtime,
            timeout,
            body_limit: MAX_RESPONSE_BYTES,
        })
    }

    /// Lowers the response body cap below `MAX_RESPONSE_BYTES`.
    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit.min(MAX_RESPONSE_BYTES);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn body_limit(&self) -> usize {
        self.body_limit
    }

    async fn get_following_redirects(&self, url: &str) -> Result<Vec<u8>, PackageError> {
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let uri: Uri = current
                .parse()
                .map_err(|e: hyper::http::uri::InvalidUri| {
                    transport_error(&current, format!("invalid URL: {}", e))
                })?;

            let request = Request::builder()
                .method("GET")
                .uri(uri.clone())
                .header(USER_AGENT, CLIENT_AGENT)
                .header(ACCEPT, "*/*")
                .body(Full::new(Bytes::new()))
                .map_err(|e| transport_error(&current, e.to_string()))?;

            trace!(url = %current, "GET");
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| transport_error(&current, error_chain(&e)))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|value| value.to_str().ok())
                    .ok_or_else(|| {
                        transport_error(&current, format!("HTTP {} without a Location header", status))
                    })?;
                let next = redirect_target(&uri, location);
                check_redirect(&uri, &next)?;
                debug!(from = %current, to = %next, "following redirect");
                current = next;
                continue;
            }

            if !status.is_success() {
                return Err(transport_error(&current, format!("HTTP {}", status)));
            }

            let body = Limited::new(response.into_body(), self.body_limit)
                .collect()
                .await
                .map_err(|e| transport_error(&current, e.to_string()))?
                .to_bytes();
            return Ok(body.to_vec());
        }

        Err(transport_error(url, format!("more than {} redirects", MAX_REDIRECTS)))
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, PackageError> {
        let timeout_ms = self.timeout.as_millis() as u64;
        self.runtime.block_on(async {
            tokio::time::timeout(self.timeout, self.get_following_redirects(url))
                .await
                .unwrap_or_else(|_| {
                    Err(PackageError::Timeout {
                        url: url.to_string(),
                        timeout_ms,
                    })
                })
        })
    }
}

fn tls_config() -> Result<ClientConfig, PackageError> {
    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = ClientConfig::builder_with_provider(rustls::crypto::ring::default_provider().into())
        .with_safe_default_protocol_versions()
        .map_err(std::io::Error::other)?
        .with_root_certificates(root_store)
        .with_no_client_auth();
    Ok(config)
}

/// Resolves a `Location` header against the URI that produced it, following
/// RFC 3986 reference resolution. Fragments are dropped.
fn redirect_target(base: &Uri, location: &str) -> String {
    let location = location.split('#').next().unwrap_or_default();
    if has_scheme(location) {
        return location.to_string();
    }

    let scheme = base.scheme_str().unwrap_or("http");
    if let Some(rest) = location.strip_prefix("//") {
        return format!("{}://{}", scheme, rest);
    }

    let authority = base.authority().map(|a| a.as_str()).unwrap_or_default();
    let (path, query) = match location.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (location, None),
    };

    let (merged, query) = if path.is_empty() {
        (base.path().to_string(), query.or(base.query()))
    } else if path.starts_with('/') {
        (path.to_string(), query)
    } else {
        let dir = base.path().rsplit_once('/').map(|(dir, _)| dir).unwrap_or_default();
        (format!("{}/{}", dir, path), query)
    };

    let mut target = format!("{}://{}{}", scheme, authority, remove_dot_segments(&merged));
    if let Some(query) = query {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn has_scheme(reference: &str) -> bool {
    let Some((scheme, _)) = reference.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn remove_dot_segments(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let last = segments.len().saturating_sub(1);
    let mut out: Vec<&str> = Vec::with_capacity(segments.len());

    for (i, segment) in segments.into_iter().enumerate() {
        match segment {
            "." => {}
            ".." => {
                if out.len() > 1 {
                    out.pop();
                }
            }
            other => {
                out.push(other);
                continue;
            }
        }
        if i == last {
            out.push("");
        }
    }

    let joined = out.join("/");
    if joined.starts_with('/') {
        joined
    } else {
        format!("/{}", joined)
    }
}

/// Package content is not checksummed, so an https fetch never continues
/// over plain http.
fn check_redirect(from: &Uri, to: &str) -> Result<(), PackageError> {
    let downgrade = from.scheme_str() == Some("https")
        && to
            .split_once(':')
            .is_some_and(|(scheme, _)| !scheme.eq_ignore_ascii_case("https"));
    if downgrade {
        return Err(transport_error(
            &from.to_string(),
            format!("refusing redirect from https to {}", to),
        ));
    }
    Ok(())
}

fn transport_error(url: &str, reason: String) -> PackageError {
    PackageError::Transport {
        url: url.to_string(),
        reason,
    }
}

fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Serves resources from memory, keyed by full URL.
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    resources: HashMap<String, Vec<u8>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.resources.insert(url.into(), body.into());
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn get(&self, url: &str) -> Result<Vec<u8>, PackageError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.resources
            .get(url)
            .cloned()
            .ok_or_else(|| transport_error(url, "HTTP 404 Not Found".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn serve(responses: Vec<&'static str>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                loop {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    if request.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_transport_creation() {
        let transport = HttpTransport::new().unwrap();
        assert_eq!(transport.timeout(), DEFAULT_TIMEOUT);

        let transport = HttpTransport::with_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_fetch_success() {
        let base = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nhello",
        ]);
        let transport = HttpTransport::new().unwrap();

        let body = transport.fetch(&format!("{}/", base), "/package.toml").unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_fetch_not_found_is_transport_error() {
        let base = serve(vec![
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        ]);
        let transport = HttpTransport::new().unwrap();

        match transport.fetch(&base, "package.toml") {
            Err(PackageError::Transport { url, reason }) => {
                assert!(url.ends_with("/package.toml"));
                assert!(reason.contains("404"));
            }
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_follows_redirect() {
        let base = serve(vec![
            "HTTP/1.1 302 Found\r\nLocation: /moved/package.toml\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            "HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
        ]);
        let transport = HttpTransport::new().unwrap();

        let body = transport.fetch(&base, "package.toml").unwrap();
        assert_eq!(body, b"ok");
    }

    #[test]
    fn test_connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HttpTransport::new().unwrap();
        let result = transport.fetch(&format!("http://{}", addr), "package.toml");
        assert!(result.unwrap_err().is_transport());
    }

    #[test]
    fn test_slow_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let transport = HttpTransport::with_timeout(Duration::from_millis(200)).unwrap();
        match transport.fetch(&format!("http://{}", addr), "package.zip") {
            Err(PackageError::Timeout { timeout_ms, .. }) => assert_eq!(timeout_ms, 200),
            other => panic!("Expected Timeout, got {:?}", other),
        }
    }

    #[test]
    fn test_too_many_redirects() {
        let hop = "HTTP/1.1 302 Found\r\nLocation: /next/package.toml\r\nContent-Length: 0\r\nConnection: close\r\n\r\n";
        let base = serve(vec![hop; MAX_REDIRECTS + 1]);
        let transport = HttpTransport::new().unwrap();

        match transport.fetch(&base, "package.toml") {
            Err(PackageError::Transport { reason, .. }) => {
                assert_eq!(reason, "more than 5 redirects")
            }
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_over_limit_is_transport_error() {
        let base = serve(vec![
            "HTTP/1.1 200 OK\r\nContent-Length: 32\r\nConnection: close\r\n\r\n0123456789abcdef0123456789abcdef",
        ]);
        let transport = HttpTransport::new().unwrap().with_body_limit(16);
        assert_eq!(transport.body_limit(), 16);

        match transport.fetch(&base, "package.zip") {
            Err(PackageError::Transport { url, .. }) => assert!(url.ends_with("/package.zip")),
            other => panic!("Expected Transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_body_limit_never_exceeds_default() {
        let transport = HttpTransport::new().unwrap().with_body_limit(usize::MAX);
        assert_eq!(transport.body_limit(), MAX_RESPONSE_BYTES);
    }

    #[test]
    fn test_https_downgrade_refused() {
        let from: Uri = "https://host.example/db/package.zip".parse().unwrap();
        assert!(check_redirect(&from, "https://cdn.example/package.zip").is_ok());

        match check_redirect(&from, "http://cdn.example/package.zip") {
            Err(PackageError::Transport { reason, .. }) => assert!(reason.contains("refusing redirect")),
            other => panic!("Expected Transport error, got {:?}", other),
        }

        let plain: Uri = "http://host.example/db/package.zip".parse().unwrap();
        assert!(check_redirect(&plain, "https://cdn.example/package.zip").is_ok());
        assert!(check_redirect(&plain, "http://cdn.example/package.zip").is_ok());
    }

    #[test]
    fn test_redirect_target_resolution() {
        let base: Uri = "https://host.example/db/raw/foo/package.toml".parse().unwrap();
        assert_eq!(
            redirect_target(&base, "https://cdn.example/x"),
            "https://cdn.example/x"
        );
        assert_eq!(
            redirect_target(&base, "/other/package.toml"),
            "https://host.example/other/package.toml"
        );
        assert_eq!(
            redirect_target(&base, "bar/package.toml"),
            "https://host.example/db/raw/foo/bar/package.toml"
        );
        assert_eq!(
            redirect_target(&base, "//cdn.example/x/package.toml"),
            "https://cdn.example/x/package.toml"
        );
        assert_eq!(
            redirect_target(&base, "../../mirror/package.toml"),
            "https://host.example/db/mirror/package.toml"
        );
        assert_eq!(
            redirect_target(&base, "./package.toml?token=abc#top"),
            "https://host.example/db/raw/foo/package.toml?token=abc"
        );
        assert_eq!(
            redirect_target(&base, "/a/./b/../c"),
            "https://host.example/a/c"
        );
        assert_eq!(
            redirect_target(&base, "../../../../../up.toml"),
            "https://host.example/up.toml"
        );
    }

    #[test]
    fn test_memory_transport() {
        let mut transport = MemoryTransport::new();
        transport.insert("http://x/foo/1.0.0/package.toml", "name = \"foo\"");

        let body = transport.fetch("http://x/foo/1.0.0/", "package.toml").unwrap();
        assert_eq!(body, b"name = \"foo\"");

        let missing = transport.fetch("http://x/foo/1.0.0", "package.zip");
        assert!(missing.unwrap_err().is_transport());

        assert_eq!(
            transport.requests(),
            vec![
                "http://x/foo/1.0.0/package.toml".to_string(),
                "http://x/foo/1.0.0/package.zip".to_string(),
            ]
        );
    }
}
