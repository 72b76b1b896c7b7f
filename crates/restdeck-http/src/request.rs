//! Per-request values.
//!
//! A request moves through two shapes. [`IncomingRequest`] wraps what the
//! listener delivered: a [`RequestHead`] (method, derived URL, headers) and the
//! unread body stream. Once the dispatcher has resolved the resource and
//! decoded the body it builds a [`RequestContext`], which is immutable: the
//! path parameters and the resource are fixed at construction and nothing can
//! replace them afterwards.

use std::sync::Arc;

use http::{HeaderMap, Method, Uri};
use restdeck_core::Scheme;

use crate::parser::{ParsedBody, content_length};
use crate::pattern::PathParams;
use crate::resource::{Resource, normalize_method};

/// URL parts derived once from the request target and the `Host` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUrl {
    scheme: Scheme,
    authority: String,
    host: String,
    port: u16,
    path: String,
    query: Option<String>,
    fragment: Option<String>,
}

impl RequestUrl {
    /// Derive the URL from a raw request target such as `/a/b?x=1#top`.
    ///
    /// An absolute-form target (`http://host/path`) supplies its own
    /// authority; otherwise `host_header` is used.
    #[must_use]
    pub fn parse(target: &str, host_header: Option<&str>, scheme: Scheme) -> Self {
        let (rest, fragment) = split_off(target, '#');
        let (path, query) = split_off(rest, '?');

        let (target_authority, path) = match path
            .strip_prefix("http://")
            .or_else(|| path.strip_prefix("https://"))
        {
            Some(after_scheme) => match after_scheme.find('/') {
                Some(slash) => (Some(&after_scheme[..slash]), &after_scheme[slash..]),
                None => (Some(after_scheme), "/"),
            },
            None => (None, path),
        };

        let authority = target_authority.or(host_header).unwrap_or_default().trim();
        let (host, port) = split_host_port(authority, scheme.default_port());

        Self {
            scheme,
            authority: authority.to_owned(),
            host: host.to_owned(),
            port,
            path: if path.is_empty() { "/" } else { path }.to_owned(),
            query,
            fragment,
        }
    }

    /// Derive the URL from a parsed [`Uri`].
    #[must_use]
    pub fn from_uri(uri: &Uri, host_header: Option<&str>, scheme: Scheme) -> Self {
        let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
        let authority = uri.authority().map(http::uri::Authority::as_str);
        Self::parse(target, authority.or(host_header), scheme)
    }

    /// The scheme this listener serves.
    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// `host[:port]` as received.
    #[must_use]
    pub fn authority(&self) -> &str {
        &self.authority
    }

    /// Host name without the port.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, or the scheme's default.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The path, never empty.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The raw query string without `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// The fragment without `#`.
    #[must_use]
    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// First decoded query value for `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }
}

/// Method, URL, and headers of a request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    method: Method,
    url: RequestUrl,
    headers: HeaderMap,
}

impl RequestHead {
    /// Build a head; the method is uppercased.
    #[must_use]
    pub fn new(method: &Method, url: RequestUrl, headers: HeaderMap) -> Self {
        Self {
            method: normalize_method(method),
            url,
            headers,
        }
    }

    /// The uppercased method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The derived URL.
    #[must_use]
    pub fn url(&self) -> &RequestUrl {
        &self.url
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// All request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// A header value as text. Names are case-insensitive.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The declared `Content-Type`.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// The declared body length; `None` when there is no body.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        content_length(&self.headers)
    }

    /// Whether any `Accept` header contains any of `candidates`.
    ///
    /// This is a plain substring test; quality values are not considered.
    #[must_use]
    pub fn accepts(&self, candidates: &[&str]) -> bool {
        self.headers
            .get_all(http::header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .any(|accept| candidates.iter().any(|c| accept.contains(c)))
    }

    /// Value of the cookie named exactly `name`.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .find_map(|pair| {
                let (key, value) = pair.trim().split_once('=').unwrap_or((pair.trim(), ""));
                (key.trim() == name).then(|| value.trim())
            })
    }

    /// First decoded query value for `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url.query_param(name)
    }

    pub(crate) fn into_context(
        self,
        body: ParsedBody,
        params: PathParams,
        resource: Arc<Resource>,
    ) -> RequestContext {
        RequestContext {
            head: self,
            body,
            params,
            resource,
        }
    }
}

/// A request as delivered by the listener, body unread.
#[derive(Debug)]
pub struct IncomingRequest<B> {
    head: RequestHead,
    body: B,
}

impl<B> IncomingRequest<B> {
    /// Wrap a raw request, deriving its URL parts.
    #[must_use]
    pub fn new(req: http::Request<B>, scheme: Scheme) -> Self {
        let (parts, body) = req.into_parts();
        let host = parts
            .headers
            .get(http::header::HOST)
            .and_then(|v| v.to_str().ok());
        let url = RequestUrl::from_uri(&parts.uri, host, scheme);
        Self {
            head: RequestHead::new(&parts.method, url, parts.headers),
            body,
        }
    }

    /// The request head.
    #[must_use]
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// Split into head and unread body.
    pub fn into_parts(self) -> (RequestHead, B) {
        (self.head, self.body)
    }
}

/// The immutable per-request value handed to a handler.
#[derive(Debug)]
pub struct RequestContext {
    head: RequestHead,
    body: ParsedBody,
    params: PathParams,
    resource: Arc<Resource>,
}

impl RequestContext {
    /// The uppercased method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.head.method()
    }

    /// The derived URL.
    #[must_use]
    pub fn url(&self) -> &RequestUrl {
        self.head.url()
    }

    /// The request path.
    #[must_use]
    pub fn path(&self) -> &str {
        self.head.path()
    }

    /// All request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.head.headers()
    }

    /// A header value as text.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// The request head.
    #[must_use]
    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    /// The decoded body.
    #[must_use]
    pub fn body(&self) -> &ParsedBody {
        &self.body
    }

    /// Take ownership of the decoded body.
    #[must_use]
    pub fn into_body(self) -> ParsedBody {
        self.body
    }

    /// A path parameter by name.
    #[must_use]
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// All path parameters.
    #[must_use]
    pub fn path_params(&self) -> &PathParams {
        &self.params
    }

    /// First decoded query value for `name`.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.head.query_param(name)
    }

    /// See [`RequestHead::accepts`].
    #[must_use]
    pub fn accepts(&self, candidates: &[&str]) -> bool {
        self.head.accepts(candidates)
    }

    /// See [`RequestHead::cookie`].
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.head.cookie(name)
    }

    /// The resource serving this request.
    #[must_use]
    pub fn resource(&self) -> &Arc<Resource> {
        &self.resource
    }
}

fn split_off(value: &str, separator: char) -> (&str, Option<String>) {
    match value.split_once(separator) {
        Some((head, tail)) => (head, Some(tail.to_owned())),
        None => (value, None),
    }
}

fn split_host_port(authority: &str, default_port: u16) -> (&str, u16) {
    if authority.starts_with('[') {
        // IPv6 literal: `[::1]` or `[::1]:8080`.
        return match authority.find(']') {
            Some(end) => {
                let port = authority[end + 1..]
                    .strip_prefix(':')
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(default_port);
                (&authority[..=end], port)
            }
            None => (authority, default_port),
        };
    }
    match authority.rsplit_once(':') {
        Some((host, port)) => match port.parse() {
            Ok(port) => (host, port),
            Err(_) => (authority, default_port),
        },
        None => (authority, default_port),
    }
}
