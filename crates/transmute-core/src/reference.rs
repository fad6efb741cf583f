//! Reference resolution
//!
//! Turns an output artifact into an absolute URL a client can fetch, taking reverse-proxy
//! forwarding headers into account. Only the artifact name ever reaches the URL.

use crate::error::AppError;
use crate::models::{Artifact, Namespace};

/// Public path under which the output namespace is served
pub const PUBLIC_FILES_PREFIX: &str = "/files";

/// Address-relevant facts captured from the originating request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingContext {
    /// Scheme the request arrived with at this process
    pub scheme: Option<String>,
    /// Raw `X-Forwarded-Proto` value
    pub forwarded_proto: Option<String>,
    /// Raw `X-Forwarded-Host` value
    pub forwarded_host: Option<String>,
    /// `Host` header, or the URI authority
    pub host: Option<String>,
}

impl ForwardingContext {
    /// Forwarded protocol wins over the request's own scheme. Proxies may append values,
    /// so only the first comma-separated token is considered.
    pub fn effective_scheme(&self) -> &str {
        let forwarded = self
            .forwarded_proto
            .as_deref()
            .and_then(first_token)
            .and_then(normalize_scheme);
        let own = self.scheme.as_deref().and_then(normalize_scheme);
        forwarded.or(own).unwrap_or("http")
    }

    pub fn effective_host(&self) -> &str {
        self.forwarded_host
            .as_deref()
            .and_then(first_token)
            .filter(|h| is_valid_host(h))
            .or_else(|| self.host.as_deref().map(str::trim).filter(|h| is_valid_host(h)))
            .unwrap_or("localhost")
    }
}

fn first_token(value: &str) -> Option<&str> {
    value.split(',').next().map(str::trim).filter(|s| !s.is_empty())
}

fn normalize_scheme(value: &str) -> Option<&'static str> {
    if value.eq_ignore_ascii_case("https") {
        Some("https")
    } else if value.eq_ignore_ascii_case("http") {
        Some("http")
    } else {
        None
    }
}

fn is_valid_host(host: &str) -> bool {
    !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']'))
}

#[derive(Debug, Clone, Default)]
pub struct ReferenceResolver {
    base_url: Option<String>,
}

impl ReferenceResolver {
    /// `base_url` (e.g. `https://cdn.example.com`) replaces scheme and host when set.
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            base_url: base_url.map(|b| b.trim_end_matches('/').to_string()),
        }
    }

    pub fn resolve(&self, context: &ForwardingContext, artifact: &Artifact) -> Result<String, AppError> {
        if artifact.namespace != Namespace::Output {
            return Err(AppError::Internal(format!(
                "Refusing to publish non-output artifact '{}'",
                artifact.name
            )));
        }

        let origin = match &self.base_url {
            Some(base) => base.clone(),
            None => format!(
                "{}://{}",
                context.effective_scheme(),
                context.effective_host()
            ),
        };

        Ok(format!("{}{}/{}", origin, PUBLIC_FILES_PREFIX, artifact.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn output(name: &str) -> Artifact {
        Artifact::new(
            name.to_string(),
            Namespace::Output,
            PathBuf::from(format!("/srv/transmute/data/output/{}", name)),
        )
    }

    #[test]
    fn test_forwarded_proto_preferred_over_own_scheme() {
        let ctx = ForwardingContext {
            scheme: Some("http".to_string()),
            forwarded_proto: Some("https, http".to_string()),
            host: Some("files.example.com".to_string()),
            ..Default::default()
        };
        let url = ReferenceResolver::default()
            .resolve(&ctx, &output("1-1-a.png"))
            .unwrap();
        assert_eq!(url, "https://files.example.com/files/1-1-a.png");
    }

    #[test]
    fn test_unknown_forwarded_proto_ignored() {
        let ctx = ForwardingContext {
            scheme: Some("http".to_string()),
            forwarded_proto: Some("gopher".to_string()),
            host: Some("localhost:4000".to_string()),
            ..Default::default()
        };
        assert_eq!(ctx.effective_scheme(), "http");
        assert_eq!(ctx.effective_host(), "localhost:4000");
    }

    #[test]
    fn test_forwarded_host_preferred_and_validated() {
        let ctx = ForwardingContext {
            forwarded_host: Some("edge.example.com".to_string()),
            host: Some("10.0.0.5:4000".to_string()),
            ..Default::default()
        };
        assert_eq!(ctx.effective_host(), "edge.example.com");

        let ctx = ForwardingContext {
            forwarded_host: Some("evil.com/phish?".to_string()),
            host: Some("10.0.0.5:4000".to_string()),
            ..Default::default()
        };
        assert_eq!(ctx.effective_host(), "10.0.0.5:4000");
    }

    #[test]
    fn test_base_url_override_and_no_path_leak() {
        let resolver = ReferenceResolver::new(Some("https://cdn.example.com/".to_string()));
        let url = resolver
            .resolve(&ForwardingContext::default(), &output("9-2-report.pdf"))
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/files/9-2-report.pdf");
        assert!(!url.contains("/srv/transmute"));
    }

    #[test]
    fn test_intake_artifacts_are_never_published() {
        let intake = Artifact::new(
            "1-1-a.png".to_string(),
            Namespace::Intake,
            PathBuf::from("/tmp/intake/1-1-a.png"),
        );
        assert!(ReferenceResolver::default()
            .resolve(&ForwardingContext::default(), &intake)
            .is_err());
    }
}
