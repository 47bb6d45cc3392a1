//! RDAP (Registration Data Access Protocol) client.
//!
//! RDAP is the HTTP/JSON successor of WHOIS. Base URLs come from the bootstrap
//! table; the domain object lives at `<base>/domain/<name>`.

use crate::error::DomainLookupError;
use crate::protocols::registry::RdapBootstrap;
use crate::types::{LookupConfig, RawResponse, Source, MAX_RDAP_REDIRECTS};
use reqwest::{header, redirect, StatusCode};
use std::time::Duration;
use tracing::{debug, instrument};

/// Media types accepted from RDAP servers.
const RDAP_ACCEPT: &str = "application/rdap+json, application/json;q=0.9";

/// What an RDAP server said about a domain.
#[derive(Debug, Clone)]
pub enum RdapReply {
    /// The server returned a domain object
    Found {
        raw: RawResponse,
        json: serde_json::Value,
    },
    /// HTTP 404: the registry has no such domain
    NotFound { raw: RawResponse },
}

impl RdapReply {
    pub fn raw(&self) -> &RawResponse {
        match self {
            Self::Found { raw, .. } | Self::NotFound { raw } => raw,
        }
    }

    pub fn into_raw(self) -> RawResponse {
        match self {
            Self::Found { raw, .. } | Self::NotFound { raw } => raw,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }
}

/// RDAP client.
///
/// Holds one HTTP client for its lifetime, so connections are reused across
/// lookups.
#[derive(Debug, Clone)]
pub struct RdapClient {
    http_client: reqwest::Client,
    /// Budget for one lookup, redirects and base-URL fallbacks included
    timeout: Duration,
}

impl RdapClient {
    /// Create a new RDAP client with default settings.
    pub fn new() -> Result<Self, DomainLookupError> {
        Self::with_config(&LookupConfig::default())
    }

    /// Create an RDAP client from lookup configuration.
    pub fn with_config(config: &LookupConfig) -> Result<Self, DomainLookupError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.rdap_timeout)
            .redirect(redirect::Policy::custom(|attempt| {
                // previous() starts with the original request URL
                if attempt.previous().len() > MAX_RDAP_REDIRECTS {
                    attempt.error("too many redirects")
                } else {
                    attempt.follow()
                }
            }))
            .user_agent(concat!("domain-lookup/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DomainLookupError::network_with_source(
                    "Failed to create RDAP HTTP client",
                    e.to_string(),
                )
            })?;

        Ok(Self {
            http_client,
            timeout: config.rdap_timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Look up `domain` at the RDAP servers listed for `extension`.
    ///
    /// # Errors
    ///
    /// - `NoRdapServer` if the extension has no bootstrap entry
    /// - `InvalidDomain` if a server rejects the name (HTTP 400)
    /// - `NetworkError` for transport failures, too many redirects and other
    ///   non-2xx statuses, once every base URL has been tried
    /// - `Timeout` if the lookup exceeds the configured budget
    /// - `MalformedResponse` if a 2xx body is not an RDAP domain object
    #[instrument(skip(self, bootstrap), level = "debug")]
    pub async fn lookup(
        &self,
        domain: &str,
        extension: &str,
        bootstrap: &RdapBootstrap,
    ) -> Result<RdapReply, DomainLookupError> {
        let bases = bootstrap
            .base_urls(extension)
            .filter(|bases| !bases.is_empty())
            .ok_or_else(|| DomainLookupError::no_rdap_server(extension))?;

        self.query_bases(domain, bases).await
    }

    /// Query base URLs in order until one gives a definite answer.
    ///
    /// Transport failures and server errors move on to the next base URL;
    /// any other outcome is final.
    pub async fn query_bases(
        &self,
        domain: &str,
        bases: &[String],
    ) -> Result<RdapReply, DomainLookupError> {
        let attempt = async {
            let mut last_error = None;

            for base in bases {
                match self.request(domain, base).await {
                    Ok(reply) => return Ok(reply),
                    Err(e) if e.is_retryable() => {
                        debug!(base = %base, error = %e, "RDAP base failed, trying next");
                        last_error = Some(e);
                    }
                    Err(e) => return Err(e),
                }
            }

            Err(last_error
                .unwrap_or_else(|| DomainLookupError::network("No RDAP base URL to query")))
        };

        tokio::time::timeout(self.timeout, attempt)
            .await
            .map_err(|_| DomainLookupError::timeout(format!("RDAP lookup of {}", domain), self.timeout))?
    }

    async fn request(&self, domain: &str, base: &str) -> Result<RdapReply, DomainLookupError> {
        let url = domain_url(base, domain);
        debug!(url = %url, "RDAP request");

        let mut response = self.send(&url).await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            debug!(url = %url, "rate limited, retrying once");
            tokio::time::sleep(Duration::from_millis(500)).await;
            response = self.send(&url).await?;
        }

        let status = response.status();
        let server = response.url().to_string();
        let body = response.text().await.map_err(|e| self.map_error(e, &url))?;

        let raw = RawResponse {
            source: Source::Rdap,
            server,
            status_code: Some(status.as_u16()),
            body,
        };

        match status {
            s if s.is_success() => {
                let json = parse_domain_object(&raw.body)?;
                Ok(RdapReply::Found { raw, json })
            }
            StatusCode::NOT_FOUND => Ok(RdapReply::NotFound { raw }),
            StatusCode::BAD_REQUEST => Err(DomainLookupError::invalid_domain(
                domain,
                format!("RDAP server {} rejected the name", base),
            )),
            code => Err(DomainLookupError::network(format!(
                "RDAP server {} returned HTTP {}",
                base, code
            ))),
        }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, DomainLookupError> {
        self.http_client
            .get(url)
            .header(header::ACCEPT, RDAP_ACCEPT)
            .send()
            .await
            .map_err(|e| self.map_error(e, url))
    }

    fn map_error(&self, err: reqwest::Error, url: &str) -> DomainLookupError {
        if err.is_timeout() {
            DomainLookupError::timeout(format!("RDAP request to {}", url), self.timeout)
        } else if err.is_redirect() {
            DomainLookupError::network_with_source(
                format!("More than {} redirects from {}", MAX_RDAP_REDIRECTS, url),
                err.to_string(),
            )
        } else {
            DomainLookupError::from(err)
        }
    }
}

/// `<base>/domain/<name>`, tolerant of a trailing slash on the base.
pub fn domain_url(base: &str, domain: &str) -> String {
    format!("{}/domain/{}", base.trim_end_matches('/'), domain)
}

/// Parse a 2xx body and check it is an RDAP domain object.
fn parse_domain_object(body: &str) -> Result<serde_json::Value, DomainLookupError> {
    let json: serde_json::Value = serde_json::from_str(body).map_err(|e| {
        DomainLookupError::MalformedResponse {
            message: format!("RDAP body is not JSON: {}", e),
            content: Some(body.chars().take(200).collect()),
        }
    })?;

    match json.get("objectClassName").and_then(|c| c.as_str()) {
        Some(class) if class.eq_ignore_ascii_case("domain") => Ok(json),
        Some(class) => Err(DomainLookupError::malformed(format!(
            "Expected an RDAP domain object, got '{}'",
            class
        ))),
        None => Err(DomainLookupError::malformed(
            "RDAP body has no objectClassName",
        )),
    }
}
