use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::Result;

/// A boxed stream type for HTTP response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Response body as delivered to storage. Transport errors are already
/// mapped into [`crate::Error`].
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// An outbound GET as the engine builds it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url:     String,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url:     url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Last value set for `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A response whose headers have arrived and whose body is still streaming.
pub struct Response {
    pub status:      u16,
    pub status_text: String,
    headers:         Vec<(String, String)>,
    body:            BodyStream,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            status_text: canonical_reason(status).to_string(),
            headers: Vec::new(),
            body: Box::pin(futures_util::stream::empty()),
        }
    }

    pub fn status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Single-chunk body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        self.body = Box::pin(futures_util::stream::once(async move { Ok(body) }));
        self
    }

    pub fn with_stream(mut self, body: BodyStream) -> Self {
        self.body = body;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> { find_header(&self.headers, name) }

    pub fn into_body(self) -> BodyStream { self.body }

    /// Reads up to `limit` bytes of the body as lossy UTF-8.
    ///
    /// Used for diagnostics only, so a failing body yields whatever arrived.
    pub async fn text(self, limit: usize) -> String {
        let mut body = self.body;
        let mut buf = Vec::new();

        while buf.len() < limit {
            match body.next().await {
                Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "failed to read response body");
                    break;
                }
                None => break,
            }
        }

        buf.truncate(limit);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn canonical_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "",
    }
}

/// Asynchronous HTTP client abstraction.
///
/// This is the only way the engine talks to the network. Implementations
/// own redirect following, timeouts, cookies and any middleware, and map
/// their transport failures to [`crate::Error::Network`]. A non-2xx status
/// is not an error at this layer; the engine decides what each status means.
///
/// # Implementations
///
/// - [`ReqwestClient`]: Production implementation using `reqwest`
/// - Scripted implementations for testing
pub trait HttpClient: Send + Sync {
    /// Sends `request` and resolves once the response headers have arrived.
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<C: HttpClient> HttpClient for Arc<C> {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}

impl<C: HttpClient> HttpClient for &C {
    fn send(&self, request: Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).send(request)
    }
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::time::Duration;

    use reqwest::{Client, Proxy, Url};

    use super::*;
    use crate::error::Error;

    fn network(e: reqwest::Error) -> Error { Error::Network(e.to_string()) }

    /// Settings for building a [`ReqwestClient`].
    #[derive(Clone, Debug, Default)]
    pub struct ClientSetting {
        pub timeout:         Option<Duration>,
        pub connect_timeout: Option<Duration>,
        pub user_agent:      Option<String>,
        pub proxies:         Vec<Url>,
        /// Sent with every request, before any per-request headers.
        pub headers:         Vec<(String, String)>,
    }

    impl ClientSetting {
        pub fn timeout(mut self, timeout: Duration) -> Self {
            self.timeout = Some(timeout);
            self
        }

        pub fn connect_timeout(mut self, timeout: Duration) -> Self {
            self.connect_timeout = Some(timeout);
            self
        }

        pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
            self.user_agent = Some(user_agent.into());
            self
        }

        pub fn proxy(mut self, proxy: Url) -> Self {
            self.proxies.push(proxy);
            self
        }

        pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
            self.headers.push((name.into(), value.into()));
            self
        }

        pub fn build(self) -> Result<ReqwestClient> {
            let mut cb = Client::builder();

            let (secure, insecure): (Vec<Url>, Vec<Url>) =
                self.proxies.into_iter().partition(|u| u.scheme() == "https");
            for u in secure {
                cb = cb.proxy(Proxy::https(u).map_err(network)?);
            }
            for u in insecure {
                cb = cb.proxy(Proxy::http(u).map_err(network)?);
            }

            if let Some(timeout) = self.timeout {
                cb = cb.timeout(timeout);
            }
            if let Some(timeout) = self.connect_timeout {
                cb = cb.connect_timeout(timeout);
            }
            if let Some(user_agent) = self.user_agent {
                cb = cb.user_agent(user_agent);
            }

            Ok(ReqwestClient {
                client:  cb.build().map_err(network)?,
                headers: Arc::from(self.headers),
            })
        }
    }

    /// Production HTTP client implementation using reqwest.
    #[derive(Clone, Debug)]
    pub struct ReqwestClient {
        client:  Client,
        headers: Arc<[(String, String)]>,
    }

    impl ReqwestClient {
        /// Create a new ReqwestClient with default configuration.
        pub fn new() -> Result<Self> { ClientSetting::default().build() }

        pub fn from_client(client: Client) -> Self {
            Self {
                client,
                headers: Arc::from(Vec::new()),
            }
        }
    }

    impl HttpClient for ReqwestClient {
        async fn send(&self, request: Request) -> Result<Response> {
            let mut builder = self.client.get(&request.url);
            for (name, value) in self.headers.iter().chain(request.headers.iter()) {
                builder = builder.header(name.as_str(), value.as_str());
            }

            let response = builder.send().await.map_err(network)?;
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.as_str().to_string(), value.to_string()))
                })
                .collect();
            let body = response.bytes_stream().map(|chunk| chunk.map_err(network));

            Ok(Response::new(status.as_u16())
                .status_text(status.canonical_reason().unwrap_or_default())
                .with_headers(headers)
                .with_stream(Box::pin(body)))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{ClientSetting, ReqwestClient};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_headers() {
        let request = Request::get("http://example.com/file")
            .header("Range", "bytes=0-")
            .header("range", "bytes=10-");

        assert_eq!(request.url, "http://example.com/file");
        assert_eq!(request.header_value("RANGE"), Some("bytes=10-"));
        assert_eq!(request.header_value("If-Range"), None);
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = Response::new(200).with_header("content-length", "5");

        assert_eq!(response.header("Content-Length"), Some("5"));
        assert_eq!(response.status_text, "OK");
    }

    #[tokio::test]
    async fn test_response_text_is_capped() {
        let response = Response::new(404).with_body("not found here");
        assert_eq!(response.text(9).await, "not found");
    }

    #[tokio::test]
    async fn test_response_text_stops_on_error() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"partial")),
            Err(crate::Error::Network("reset".into())),
        ];
        let response = Response::new(500).with_stream(Box::pin(futures_util::stream::iter(chunks)));

        assert_eq!(response.text(1024).await, "partial");
    }
}
