//! Forwarding context extraction
//!
//! Captures the scheme/host facts of a request so output references stay correct behind a
//! reverse proxy. Validation of the raw values happens in the resolver.

use axum::http::{header, HeaderMap, Uri};
use transmute_core::ForwardingContext;

const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn forwarding_context(headers: &HeaderMap, uri: &Uri) -> ForwardingContext {
    ForwardingContext {
        scheme: uri.scheme_str().map(str::to_string),
        forwarded_proto: header_value(headers, X_FORWARDED_PROTO),
        forwarded_host: header_value(headers, X_FORWARDED_HOST),
        host: header_value(headers, header::HOST.as_str())
            .or_else(|| uri.authority().map(|a| a.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_proxy_headers_are_captured() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("10.0.0.5:4000"));
        headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("https"));
        headers.insert(X_FORWARDED_HOST, HeaderValue::from_static("media.example.com"));

        let ctx = forwarding_context(&headers, &Uri::from_static("/api/image-resize"));
        assert_eq!(ctx.effective_scheme(), "https");
        assert_eq!(ctx.effective_host(), "media.example.com");
        assert!(ctx.scheme.is_none());
    }

    #[test]
    fn test_absolute_uri_supplies_scheme_and_authority() {
        let ctx = forwarding_context(
            &HeaderMap::new(),
            &Uri::from_static("https://files.example.com/api/pdf-merge"),
        );
        assert_eq!(ctx.effective_scheme(), "https");
        assert_eq!(ctx.effective_host(), "files.example.com");
    }
}
