//! WHOIS protocol client.
//!
//! WHOIS is a line protocol on TCP port 43: the client sends one query line
//! and the server writes free-form text until it closes the connection. Thin
//! registries answer with a pointer to the registrar's server, which this
//! client follows at most once.

use crate::error::DomainLookupError;
use crate::protocols::registry::{WhoisDirectory, WhoisServer};
use crate::types::{LookupConfig, RawResponse, Source};
use lazy_static::lazy_static;
use regex::Regex;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, instrument, warn};

lazy_static! {
    /// Fields that point at a more authoritative server.
    static ref REFERRAL_LINE: Regex = Regex::new(
        r"(?im)^[ \t]*(?:registrar[ \t]+whois[ \t]+server|whois[ \t]+server|referralserver|refer)[ \t]*:[ \t]*(\S+)"
    )
    .expect("static regex");
}

/// WHOIS client speaking the protocol directly over TCP.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    /// Budget for a whole exchange, referral hop included
    timeout: Duration,
    /// Port used when the server entry does not name one
    default_port: u16,
    /// Bytes read before the reply is cut off
    max_response_bytes: usize,
    follow_referrals: bool,
}

impl WhoisClient {
    /// Create a new WHOIS client with default settings.
    pub fn new() -> Self {
        Self::with_config(&LookupConfig::default())
    }

    /// Create a WHOIS client from lookup configuration.
    pub fn with_config(config: &LookupConfig) -> Self {
        Self {
            timeout: config.whois_timeout,
            default_port: config.whois_port,
            max_response_bytes: config.max_whois_response_bytes,
            follow_referrals: config.follow_referrals,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Query the authoritative server for `domain`.
    ///
    /// The server is taken from `directory` by `extension`. If the reply names
    /// a different server, that server is asked once more and its reply is
    /// returned instead; a failed follow-up keeps the first reply.
    ///
    /// # Errors
    ///
    /// - `NoWhoisServer` if the extension has no directory entry
    /// - `NetworkError` on DNS, connect or socket failures
    /// - `Timeout` if the exchange exceeds the configured budget
    #[instrument(skip(self, directory), level = "debug")]
    pub async fn lookup(
        &self,
        domain: &str,
        extension: &str,
        directory: &WhoisDirectory,
    ) -> Result<RawResponse, DomainLookupError> {
        let server = directory
            .get(extension)
            .ok_or_else(|| DomainLookupError::no_whois_server(extension))?;

        self.query_server(domain, server, self.follow_referrals)
            .await
    }

    /// Query a specific server, optionally following one referral.
    pub async fn query_server(
        &self,
        domain: &str,
        server: &WhoisServer,
        follow_referrals: bool,
    ) -> Result<RawResponse, DomainLookupError> {
        let port = server.port_or(self.default_port);
        let body = self
            .timed_exchange(&server.host, port, &server.query_for(domain))
            .await?;

        if follow_referrals {
            if let Some(referral) = find_referral(&body) {
                let referral_port = referral.port_or(self.default_port);
                let same_server =
                    referral.host.eq_ignore_ascii_case(&server.host) && referral_port == port;

                if !same_server {
                    debug!(from = %server.host, to = %referral.host, "following WHOIS referral");
                    match self.timed_exchange(&referral.host, referral_port, domain).await {
                        Ok(referred) if !referred.trim().is_empty() => {
                            return Ok(whois_response(&referral.host, referred));
                        }
                        Ok(_) => {
                            warn!(server = %referral.host, "referral server sent an empty reply, keeping first reply");
                        }
                        Err(e) => {
                            warn!(server = %referral.host, error = %e, "referral query failed, keeping first reply");
                        }
                    }
                }
            }
        }

        Ok(whois_response(&server.host, body))
    }

    /// One exchange bounded by the client timeout.
    async fn timed_exchange(&self, host: &str, port: u16, query: &str) -> Result<String, DomainLookupError> {
        tokio::time::timeout(self.timeout, self.exchange(host, port, query))
            .await
            .map_err(|_| DomainLookupError::timeout(format!("WHOIS query to {}", host), self.timeout))?
    }

    /// One request/response exchange.
    async fn exchange(&self, host: &str, port: u16, query: &str) -> Result<String, DomainLookupError> {
        let mut stream = TcpStream::connect((host, port)).await.map_err(|e| {
            DomainLookupError::network_with_source(
                format!("Failed to connect to WHOIS server {}:{}", host, port),
                e.to_string(),
            )
        })?;

        stream
            .write_all(format!("{}\r\n", query).as_bytes())
            .await
            .map_err(|e| {
                DomainLookupError::network_with_source(
                    format!("Failed to send WHOIS query to {}", host),
                    e.to_string(),
                )
            })?;

        let mut buf = Vec::new();
        (&mut stream)
            .take(self.max_response_bytes as u64)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| {
                DomainLookupError::network_with_source(
                    format!("Failed to read WHOIS reply from {}", host),
                    e.to_string(),
                )
            })?;

        if buf.len() >= self.max_response_bytes {
            debug!(host, limit = self.max_response_bytes, "WHOIS reply truncated");
        }

        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

fn whois_response(server: &str, body: String) -> RawResponse {
    RawResponse {
        source: Source::Whois,
        server: server.to_string(),
        status_code: None,
        body,
    }
}

/// Find a referral to another WHOIS server in a reply.
///
/// Accepts bare hosts, `host:port`, and `whois://` / `rwhois://` URLs. Web
/// URLs are not WHOIS servers and are ignored.
pub fn find_referral(body: &str) -> Option<WhoisServer> {
    REFERRAL_LINE
        .captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .find_map(|value| referral_server(value.as_str()))
}

fn referral_server(value: &str) -> Option<WhoisServer> {
    let value = value.trim().trim_end_matches('/');
    let lower = value.to_lowercase();

    let host = if let Some(rest) = lower.strip_prefix("whois://") {
        rest
    } else if let Some(rest) = lower.strip_prefix("rwhois://") {
        rest
    } else if lower.contains("://") {
        return None;
    } else {
        lower.as_str()
    };

    let host = host.split('/').next().unwrap_or_default();
    let plausible = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':' | '_'));
    if host.is_empty() || !plausible {
        return None;
    }
    Some(WhoisServer::new(host))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncBufReadExt;
    use tokio::net::TcpListener;

    /// Serve one canned reply per connection and report the query lines seen.
    async fn fake_server(reply: String) -> (u16, tokio::sync::mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (read, mut write) = stream.into_split();
                let mut line = String::new();
                let mut reader = tokio::io::BufReader::new(read);
                reader.read_line(&mut line).await.unwrap();
                let _ = tx.send(line);
                write.write_all(reply.as_bytes()).await.unwrap();
            }
        });

        (port, rx)
    }

    fn local(port: u16) -> WhoisServer {
        WhoisServer::new(&format!("127.0.0.1:{}", port))
    }

    #[test]
    fn test_find_referral_forms() {
        let body = "Domain Name: EXAMPLE.COM\n   Registrar WHOIS Server: whois.registrar.example\n";
        assert_eq!(find_referral(body).unwrap().host, "whois.registrar.example");

        let body = "ReferralServer: rwhois://rwhois.example.net:4321\n";
        let server = find_referral(body).unwrap();
        assert_eq!(server.host, "rwhois.example.net");
        assert_eq!(server.port, Some(4321));

        let body = "refer:        whois://whois.nic.example/\n";
        assert_eq!(find_referral(body).unwrap().host, "whois.nic.example");

        let body = "Registrar WHOIS Server: https://whois.example.com/lookup\nWhois Server: whois.other.example\n";
        assert_eq!(find_referral(body).unwrap().host, "whois.other.example");

        assert!(find_referral("Registrar WHOIS Server:\nDomain: x\n").is_none());
        assert!(find_referral("No match for \"EXAMPLE.COM\".\n").is_none());
    }

    #[tokio::test]
    async fn test_query_sends_template_and_reads_reply() {
        let (port, mut queries) = fake_server("Domain Name: EXAMPLE.DE\nStatus: connect\n".to_string()).await;
        let client = WhoisClient::new();
        let server = local(port).with_query("-T dn,ace {domain}");

        let response = client.query_server("example.de", &server, true).await.unwrap();
        assert_eq!(response.source, Source::Whois);
        assert_eq!(response.server, "127.0.0.1");
        assert!(response.body.contains("Status: connect"));
        assert_eq!(queries.recv().await.unwrap(), "-T dn,ace example.de\r\n");
    }

    #[tokio::test]
    async fn test_referral_followed_once() {
        let (registrar_port, mut registrar_queries) =
            fake_server("Domain Name: example.com\nRegistrar: Example Registrar\n".to_string()).await;
        let registry_reply = format!(
            "Domain Name: EXAMPLE.COM\nRegistrar WHOIS Server: whois://localhost:{}\n",
            registrar_port
        );
        let (registry_port, _) = fake_server(registry_reply).await;

        let client = WhoisClient::new();
        let response = client
            .query_server("example.com", &local(registry_port), true)
            .await
            .unwrap();

        assert_eq!(response.server, "localhost");
        assert!(response.body.contains("Example Registrar"));
        assert_eq!(registrar_queries.recv().await.unwrap(), "example.com\r\n");
    }

    #[tokio::test]
    async fn test_failed_referral_keeps_first_reply() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_port = closed.local_addr().unwrap().port();
        drop(closed);

        let registry_reply = format!(
            "Domain Name: EXAMPLE.COM\nCreation Date: 1995-08-14T04:00:00Z\nWhois Server: 127.0.0.1:{}\n",
            dead_port
        );
        let (port, _) = fake_server(registry_reply).await;

        let response = WhoisClient::new()
            .query_server("example.com", &local(port), true)
            .await
            .unwrap();
        assert!(response.body.contains("Creation Date"));
    }

    #[tokio::test]
    async fn test_silent_referral_keeps_first_reply() {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let silent_port = silent.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = silent.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let registry_reply = format!(
            "Domain Name: EXAMPLE.COM\nRegistrar: Example Registrar\nRegistrar WHOIS Server: 127.0.0.1:{}\n",
            silent_port
        );
        let (port, _) = fake_server(registry_reply).await;

        let config = LookupConfig::default().with_whois_timeout(Duration::from_millis(500));
        let response = WhoisClient::with_config(&config)
            .query_server("example.com", &local(port), true)
            .await
            .unwrap();
        assert_eq!(response.server, "127.0.0.1");
        assert!(response.body.contains("Registrar: Example Registrar"));
    }

    #[tokio::test]
    async fn test_self_referral_not_followed() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let reply = format!("Whois Server: 127.0.0.1:{}\nDomain Name: X\n", port);

        let handle = tokio::spawn(async move {
            let mut connections = 0;
            while let Ok(Ok((mut stream, _))) =
                tokio::time::timeout(Duration::from_millis(500), listener.accept()).await
            {
                connections += 1;
                let mut buf = [0u8; 256];
                let _ = stream.read(&mut buf).await;
                stream.write_all(reply.as_bytes()).await.unwrap();
            }
            connections
        });

        WhoisClient::new()
            .query_server("x.test", &local(port), true)
            .await
            .unwrap();
        assert_eq!(handle.await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_response_capped() {
        let (port, _) = fake_server("x".repeat(4096)).await;
        let config = LookupConfig {
            max_whois_response_bytes: 1000,
            ..LookupConfig::default()
        };
        let response = WhoisClient::with_config(&config)
            .query_server("example.com", &local(port), false)
            .await
            .unwrap();
        assert_eq!(response.body.len(), 1000);
    }

    #[tokio::test]
    async fn test_unmapped_extension() {
        let result = WhoisClient::new()
            .lookup("example.zz", "zz", &WhoisDirectory::new())
            .await;
        assert!(matches!(
            result,
            Err(DomainLookupError::NoWhoisServer { .. })
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let config = LookupConfig::default().with_whois_timeout(Duration::from_millis(200));
        let result = WhoisClient::with_config(&config)
            .query_server("example.com", &local(port), true)
            .await;
        assert!(matches!(result, Err(DomainLookupError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = closed.local_addr().unwrap().port();
        drop(closed);

        let result = WhoisClient::new()
            .query_server("example.com", &local(port), true)
            .await;
        assert!(matches!(result, Err(DomainLookupError::NetworkError { .. })));
    }
}
