//! Lookup orchestration.
//!
//! This module provides [`DomainLookup`], which takes a raw domain string
//! through suffix resolution, concurrent WHOIS/RDAP queries, parsing, merging
//! and normalisation, and returns one canonical record.

use crate::error::{DomainLookupError, ErrorKind};
use crate::normalize::normalize_record;
use crate::parser::{parse_rdap, parse_whois, ParsedRecord};
use crate::protocols::rdap::{RdapClient, RdapReply};
use crate::protocols::registry::{
    Registry, RegistrySnapshot, WhoisServer, IANA_EXTENSION, IANA_RDAP_BASE, IANA_WHOIS_HOST,
};
use crate::protocols::whois::WhoisClient;
use crate::suffix::{normalize_domain, ResolvedDomain};
use crate::types::{
    DomainRecord, LookupConfig, LookupResult, RawResponse, Source, SourceFailure, Sources,
};
use crate::utils::clean_domain_input;
use chrono::{DateTime, Utc};
use futures::future::OptionFuture;
use futures::stream::{self, Stream, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Where a lookup stands. `Failed` is reachable from every other state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupState {
    Start,
    SuffixResolved,
    Querying,
    Parsed,
    Done,
    Failed(ErrorKind),
}

/// Main entry point: resolves domains to their registration records.
///
/// A `DomainLookup` is cheap to share; the startup tables live in an
/// [`Arc<Registry>`] and each lookup works on its own snapshot of them.
///
/// # Example
///
/// ```rust,no_run
/// use domain_lookup_lib::{DomainLookup, Sources};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let lookup = DomainLookup::new()?;
///     let result = lookup.lookup("example.com", Sources::all()).await?;
///     println!("{}: {}", result.record.domain, result.record.classification);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct DomainLookup {
    config: LookupConfig,
    registry: Arc<Registry>,
    whois_client: WhoisClient,
    rdap_client: RdapClient,
}

/// What is actually sent to the registries.
#[derive(Debug, Clone)]
struct Target {
    resolved: ResolvedDomain,
    /// The input is itself a public suffix and goes to the IANA root
    iana: bool,
}

impl DomainLookup {
    /// Create a lookup with default configuration and the built-in tables.
    pub fn new() -> Result<Self, DomainLookupError> {
        Self::with_config(LookupConfig::default())
    }

    /// Create a lookup with custom configuration and the built-in tables.
    pub fn with_config(config: LookupConfig) -> Result<Self, DomainLookupError> {
        Self::with_registry(config, Arc::new(Registry::builtin()))
    }

    /// Create a lookup over a caller-provided registry.
    ///
    /// The registry can be shared with other lookups and refreshed while they
    /// run.
    pub fn with_registry(
        config: LookupConfig,
        registry: Arc<Registry>,
    ) -> Result<Self, DomainLookupError> {
        let rdap_client = RdapClient::with_config(&config)?;
        let whois_client = WhoisClient::with_config(&config);

        Ok(Self {
            config,
            registry,
            whois_client,
            rdap_client,
        })
    }

    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Look up one domain.
    ///
    /// Every requested source is queried concurrently. One source failing does
    /// not abort the other; its error is kept in `diagnostics`. The call only
    /// fails when the input is invalid or when every requested source failed
    /// for a reason other than an unmapped extension.
    ///
    /// An empty source selection queries the sources from the configuration.
    ///
    /// # Errors
    ///
    /// - `InvalidDomain` for malformed input or input with no public suffix
    /// - otherwise the most specific error among the failed sources, WHOIS
    ///   first on a tie
    pub async fn lookup(
        &self,
        domain: &str,
        sources: Sources,
    ) -> Result<LookupResult, DomainLookupError> {
        let mut state = StateTrace::new(domain);
        let snapshot = self.registry.snapshot();

        let target = match self.resolve_target(domain, &snapshot) {
            Ok(target) => target,
            Err(e) => return Err(state.fail(e)),
        };
        state.advance(LookupState::SuffixResolved);

        let sources = if sources.whois || sources.rdap {
            sources
        } else {
            self.config.sources
        };

        state.advance(LookupState::Querying);
        let whois = OptionFuture::from(
            sources
                .whois
                .then(|| self.query_whois(&target, &snapshot)),
        );
        let rdap = OptionFuture::from(
            sources
                .rdap
                .then(|| self.query_rdap(&target, &snapshot)),
        );
        let (whois, rdap) = tokio::join!(whois, rdap);

        let mut diagnostics = Vec::new();
        let mut raw_whois = None;
        let mut raw_rdap = None;
        let mut parsed_whois = None;
        let mut parsed_rdap = None;

        match whois {
            Some(Ok(raw)) => {
                parsed_whois = Some(parse_whois(&raw.body));
                raw_whois = Some(raw);
            }
            Some(Err(error)) => diagnostics.push(SourceFailure {
                source: Source::Whois,
                error,
            }),
            None => {}
        }

        match rdap {
            Some(Ok(reply)) => {
                parsed_rdap = Some(match &reply {
                    RdapReply::Found { json, .. } => parse_rdap(json),
                    RdapReply::NotFound { .. } => ParsedRecord::not_found(),
                });
                raw_rdap = Some(reply.into_raw());
            }
            Some(Err(error)) => diagnostics.push(SourceFailure {
                source: Source::Rdap,
                error,
            }),
            None => {}
        }

        let parsed = match (parsed_whois, parsed_rdap) {
            (Some(whois), Some(rdap)) => whois.merge(rdap),
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => {
                if diagnostics.is_empty()
                    || !diagnostics.iter().all(|f| f.error.is_unmapped_extension())
                {
                    return Err(state.fail(preferred_error(diagnostics)));
                }
                debug!(
                    domain = %target.resolved.domain,
                    extension = %target.resolved.extension,
                    "no server mapped for extension"
                );
                ParsedRecord::default()
            }
        };

        for failure in &diagnostics {
            if !failure.error.is_unmapped_extension() {
                warn!(
                    domain = %target.resolved.domain,
                    source = %failure.source,
                    error = %failure.error,
                    "source failed, continuing with remaining data"
                );
            }
        }
        state.advance(LookupState::Parsed);

        let record = build_record(&target.resolved, parsed, Utc::now());
        state.advance(LookupState::Done);

        Ok(LookupResult {
            record,
            raw_whois,
            raw_rdap,
            diagnostics,
        })
    }

    /// Look up one domain unless `signal` resolves first.
    ///
    /// When the signal wins, both in-flight queries are dropped and
    /// `Cancelled` is returned; no partial record is produced.
    pub async fn lookup_until<S>(
        &self,
        domain: &str,
        sources: Sources,
        signal: S,
    ) -> Result<LookupResult, DomainLookupError>
    where
        S: Future<Output = ()>,
    {
        tokio::select! {
            result = self.lookup(domain, sources) => result,
            _ = signal => {
                debug!(domain, "lookup cancelled");
                Err(DomainLookupError::Cancelled)
            }
        }
    }

    /// Look up several domains, at most `concurrency` at a time.
    ///
    /// Results are yielded in input order, each paired with the input string.
    pub fn lookup_stream<'a>(
        &'a self,
        domains: &'a [String],
        sources: Sources,
        concurrency: usize,
    ) -> impl Stream<Item = (String, Result<LookupResult, DomainLookupError>)> + 'a {
        stream::iter(domains)
            .map(move |domain| async move {
                let result = self.lookup(domain, sources).await;
                (domain.clone(), result)
            })
            .buffered(concurrency.max(1))
    }

    /// Clean the input and decide what to query.
    fn resolve_target(
        &self,
        input: &str,
        snapshot: &RegistrySnapshot,
    ) -> Result<Target, DomainLookupError> {
        let cleaned = clean_domain_input(input, self.config.default_extension.as_deref());

        if snapshot.suffixes.is_public_suffix(&cleaned) {
            let domain = normalize_domain(&cleaned)?;
            debug!(domain = %domain, "input is a public suffix, querying IANA");
            return Ok(Target {
                resolved: ResolvedDomain {
                    registrable_domain: domain.clone(),
                    domain,
                    extension: IANA_EXTENSION.to_string(),
                },
                iana: true,
            });
        }

        Ok(Target {
            resolved: snapshot.suffixes.resolve(&cleaned)?,
            iana: false,
        })
    }

    async fn query_whois(
        &self,
        target: &Target,
        snapshot: &RegistrySnapshot,
    ) -> Result<RawResponse, DomainLookupError> {
        let resolved = &target.resolved;
        if target.iana {
            let root = WhoisServer::new(IANA_WHOIS_HOST);
            return self
                .whois_client
                .query_server(&resolved.registrable_domain, &root, false)
                .await;
        }

        self.whois_client
            .lookup(&resolved.registrable_domain, &resolved.extension, &snapshot.whois)
            .await
    }

    async fn query_rdap(
        &self,
        target: &Target,
        snapshot: &RegistrySnapshot,
    ) -> Result<RdapReply, DomainLookupError> {
        let resolved = &target.resolved;
        if target.iana {
            return self
                .rdap_client
                .query_bases(&resolved.registrable_domain, &[IANA_RDAP_BASE.to_string()])
                .await;
        }

        self.rdap_client
            .lookup(&resolved.registrable_domain, &resolved.extension, &snapshot.rdap)
            .await
    }
}

/// Assemble the canonical record for a resolved domain from parsed data.
///
/// Deterministic for a fixed `now`: the same input always yields the same
/// record.
pub fn build_record(
    resolved: &ResolvedDomain,
    parsed: ParsedRecord,
    now: DateTime<Utc>,
) -> DomainRecord {
    let mut record = DomainRecord {
        domain: resolved.domain.clone(),
        extension: resolved.extension.clone(),
        registrable_domain: resolved.registrable_domain.clone(),
        registry_domain: parsed.domain.clone(),
        classification: parsed.classification(),
        registrar: parsed.registrar,
        creation_date: parsed.creation_date,
        updated_date: parsed.updated_date,
        expiration_date: parsed.expiration_date,
        available_date: parsed.available_date,
        status: parsed.status,
        name_servers: parsed.name_servers,
        derived: Default::default(),
    };
    normalize_record(&mut record, now);
    record
}

/// Pick the error to surface when every source failed.
///
/// Highest specificity wins; failures are ordered WHOIS first, so the first
/// maximum also settles ties.
fn preferred_error(failures: Vec<SourceFailure>) -> DomainLookupError {
    let best = failures
        .iter()
        .map(|f| f.error.specificity())
        .max()
        .unwrap_or_default();

    failures
        .into_iter()
        .find(|f| f.error.specificity() == best)
        .map(|f| f.error)
        .unwrap_or_else(|| DomainLookupError::internal("no source was queried"))
}

/// Debug trace of the state machine for one lookup.
struct StateTrace<'a> {
    domain: &'a str,
    state: LookupState,
}

impl<'a> StateTrace<'a> {
    fn new(domain: &'a str) -> Self {
        debug!(domain, state = ?LookupState::Start, "lookup started");
        Self {
            domain,
            state: LookupState::Start,
        }
    }

    fn advance(&mut self, next: LookupState) {
        debug!(domain = self.domain, from = ?self.state, to = ?next, "lookup state");
        self.state = next;
    }

    fn fail(&mut self, error: DomainLookupError) -> DomainLookupError {
        self.advance(LookupState::Failed(error.kind()));
        error
    }
}
