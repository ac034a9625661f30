//! Single-host upstream target.
//!
//! # Responsibilities
//! - Hold the scheme, authority, base path and base query of the target
//! - Rewrite inbound request URIs onto the target
//!
//! # Design Decisions
//! - Exactly one slash joins the base path and the request path
//! - Base query comes first; request query is appended with `&`

use axum::http::uri::{Authority, InvalidUri, Scheme};
use axum::http::{HeaderValue, Uri};
use url::Url;

/// Error building an [`UpstreamTarget`].
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("invalid target URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("target URL {0:?} has no host")]
    MissingHost(String),

    #[error("invalid target URI component: {0}")]
    Uri(#[from] InvalidUri),

    #[error("target authority is not a valid Host header: {0}")]
    Host(#[from] axum::http::header::InvalidHeaderValue),

    #[error("cannot set up TLS towards the target: {0}")]
    Tls(#[from] rustls::Error),
}

/// Where every proxied request goes.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    scheme: Scheme,
    authority: Authority,
    host: HeaderValue,
    path: String,
    query: Option<String>,
}

impl UpstreamTarget {
    pub fn parse(target: &str) -> Result<Self, TargetError> {
        Self::from_url(&Url::parse(target)?)
    }

    pub fn from_url(url: &Url) -> Result<Self, TargetError> {
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| TargetError::MissingHost(url.to_string()))?;

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority: Authority = authority.parse()?;

        Ok(Self {
            scheme: url.scheme().parse()?,
            host: HeaderValue::from_str(authority.as_str())?,
            authority,
            path: url.path().to_string(),
            query: url.query().map(str::to_owned),
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value sent as the `Host` header upstream.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host
    }

    /// Map an inbound URI onto the target.
    pub fn rewrite_uri(&self, uri: &Uri) -> Result<Uri, axum::http::Error> {
        let path = join_paths(&self.path, uri.path());

        let query = match (self.query.as_deref().unwrap_or(""), uri.query().unwrap_or("")) {
            ("", request) => request.to_string(),
            (base, "") => base.to_string(),
            (base, request) => format!("{base}&{request}"),
        };

        let path_and_query = if query.is_empty() {
            path
        } else {
            format!("{path}?{query}")
        };

        Uri::builder()
            .scheme(self.scheme.clone())
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{base}{}", &path[1..]),
        (false, false) => format!("{base}/{path}"),
        _ => format!("{base}{path}"),
    }
}
