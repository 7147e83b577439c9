//! HTTP transport over `reqwest`.
//!
//! Feature-gated behind `#[cfg(feature = "http")]`.

use std::future::Future;
use std::time::Duration;

use crate::request::{Method, Request, Response};
use crate::transport::Transport;

/// A [`Transport`] that performs each attempt with a `reqwest::Client`.
///
/// Connection failures, timeouts and body read errors surface as
/// `reqwest::Error` and are therefore retried by the executor.
///
/// # Example
///
/// ```rust,no_run
/// use persevere::http::HttpTransport;
/// use persevere::{Request, RetryingExecutor};
/// use std::time::Duration;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new().with_timeout(Duration::from_secs(30));
/// let executor = RetryingExecutor::new(transport);
///
/// let response = executor.execute(&Request::get("https://example.com")).await?;
/// println!("{}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    /// Create a transport with a default client and no per-attempt timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Bound every attempt by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build(&self, request: &Request) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), &request.target);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder
    }
}

impl Transport for HttpTransport {
    type Error = reqwest::Error;

    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, Self::Error>> + Send {
        let builder = self.build(request);
        async move {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response.bytes().await?.to_vec();

            Ok(Response {
                status,
                headers,
                body,
            })
        }
    }
}

/// Copy every header, decoding non-ASCII values lossily.
fn collect_headers(headers: &reqwest::header::HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect()
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}
