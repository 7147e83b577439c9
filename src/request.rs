//! Request and response descriptions passed across the transport boundary.
//!
//! The executor treats both as opaque: it never inspects a [`Request`], and it
//! only hands a [`Response`] to a [`Classifier`](crate::Classifier) before
//! returning it to the caller unmodified.

use std::fmt;

/// HTTP-style request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `HEAD`
    Head,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// The method name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Description of a single logical request.
///
/// A request is reused unchanged for every attempt, so transports receive it by
/// reference.
///
/// # Examples
///
/// ```rust
/// use persevere::{Method, Request};
///
/// let request = Request::post("https://example.com/v1/items")
///     .header("Content-Type", "application/json")
///     .body(br#"{"name":"lamp"}"#.to_vec());
///
/// assert_eq!(request.method, Method::Post);
/// assert_eq!(request.header_value("content-type"), Some("application/json"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Request {
    /// Request method.
    pub method: Method,
    /// Target URL or address; interpreted by the transport.
    pub target: String,
    /// Header name/value pairs, in insertion order.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
}

impl Request {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for `Request::new(Method::Get, target)`.
    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::Get, target)
    }

    /// Shorthand for `Request::new(Method::Post, target)`.
    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::Post, target)
    }

    /// Append a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the body.
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` as the JSON body and set the matching content type.
    #[cfg(feature = "imagen")]
    pub fn json<T: serde::Serialize + ?Sized>(self, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(self.header("Content-Type", "application/json").body(body))
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// The result of a completed transport call.
///
/// A response exists whenever the transport reached the peer, whatever the
/// status; transport-level failures are reported through the transport's own
/// error type instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// Status code reported by the peer.
    pub status: u16,
    /// Header name/value pairs.
    pub headers: Vec<(String, String)>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl Response {
    /// Create a response with the given status and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Replace the body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First value of the named header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_builders() {
        let request = Request::get("http://localhost/health")
            .header("Accept", "text/plain")
            .header("X-Trace", "abc");

        assert_eq!(request.method, Method::Get);
        assert_eq!(request.target, "http://localhost/health");
        assert_eq!(request.headers.len(), 2);
        assert_eq!(request.header_value("x-trace"), Some("abc"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_response_success_range() {
        assert!(Response::new(200).is_success());
        assert!(Response::new(204).is_success());
        assert!(!Response::new(199).is_success());
        assert!(!Response::new(301).is_success());
        assert!(!Response::new(429).is_success());
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = Response::new(429).with_header("Retry-After", "2");
        assert_eq!(response.header("retry-after"), Some("2"));
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn test_response_text_is_lossy() {
        let response = Response::new(200).with_body(vec![b'o', b'k', 0xff]);
        assert_eq!(response.text(), "ok\u{fffd}");
    }

    #[test]
    fn test_method_display() {
        assert_eq!(Method::Patch.to_string(), "PATCH");
        assert_eq!(Method::default(), Method::Get);
    }

    #[cfg(feature = "imagen")]
    #[test]
    fn test_json_body_sets_content_type() {
        let request = Request::post("http://localhost/items")
            .json(&serde_json::json!({ "name": "lamp" }))
            .unwrap();

        assert_eq!(request.header_value("Content-Type"), Some("application/json"));
        assert_eq!(request.body.as_deref(), Some(br#"{"name":"lamp"}"#.as_slice()));
    }
}
