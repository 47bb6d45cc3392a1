//! Domain Lookup CLI Application
//!
//! A command-line interface for looking up domain registration status and
//! metadata via WHOIS and RDAP. Every lookup decision is made by
//! domain-lookup-lib; this crate only handles arguments, configuration
//! precedence and output.

mod ui;

use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use domain_lookup_lib::{
    build_lookup_config, effective_data_config, load_env_config, parse_domain_list,
    parse_timeout_string, ConfigManager, DataConfig, DomainLookup, DomainLookupError, EnvConfig,
    FileConfig, LookupConfig, LookupResult, Sources, IANA_BOOTSTRAP_URL,
};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{json, Value};
use std::process;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Lookups run at once when neither flag nor config says otherwise.
const DEFAULT_CONCURRENCY: usize = 10;

/// CLI arguments for domain-lookup
#[derive(Parser, Debug)]
#[command(name = "domain-lookup")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Look up domain registration status and metadata via WHOIS and RDAP")]
#[command(
    long_about = "Look up domain registration status and metadata via WHOIS and RDAP.\n\nBoth protocols are queried concurrently and merged into one record with registrar, dates, EPP status and name servers."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Domain names or URLs to look up
    #[arg(value_name = "DOMAINS", help_heading = "Domain Selection")]
    pub domains: Vec<String>,

    /// Input file with domains (one per line)
    #[arg(
        short = 'f',
        long = "file",
        value_name = "FILE",
        help_heading = "Domain Selection"
    )]
    pub file: Option<String>,

    /// Extension appended to names without a dot (e.g. "com")
    #[arg(
        long = "default-extension",
        value_name = "EXT",
        help_heading = "Domain Selection"
    )]
    pub default_extension: Option<String>,

    /// Query WHOIS (combine with --rdap for both; default is both)
    #[arg(long = "whois", help_heading = "Protocol")]
    pub whois: bool,

    /// Query RDAP (combine with --whois for both; default is both)
    #[arg(long = "rdap", help_heading = "Protocol")]
    pub rdap: bool,

    /// Timeout per protocol, e.g. "5s", "500ms", "2m"
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Protocol")]
    pub timeout: Option<String>,

    /// Do not follow WHOIS referrals to registrar servers
    #[arg(long = "no-referral", help_heading = "Protocol")]
    pub no_referral: bool,

    /// Refresh the RDAP bootstrap table from IANA before looking up
    #[arg(long = "bootstrap", help_heading = "Protocol")]
    pub bootstrap: bool,

    /// Output results as JSON envelopes ({code, msg, data})
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Include the raw WHOIS and RDAP payloads
    #[arg(long = "raw", help_heading = "Output Format")]
    pub raw: bool,

    /// Max concurrent lookups (default: 10, max: 100)
    #[arg(
        short = 'c',
        long = "concurrency",
        value_name = "N",
        help_heading = "Performance"
    )]
    pub concurrency: Option<usize>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Public suffix list file replacing the built-in rules
    #[arg(long = "suffix-list", value_name = "FILE", help_heading = "Configuration")]
    pub suffix_list: Option<String>,

    /// WHOIS directory JSON file replacing the built-in servers
    #[arg(long = "whois-servers", value_name = "FILE", help_heading = "Configuration")]
    pub whois_servers: Option<String>,

    /// RDAP bootstrap file (IANA dns.json format)
    #[arg(long = "rdap-bootstrap", value_name = "FILE", help_heading = "Configuration")]
    pub rdap_bootstrap: Option<String>,

    /// Trace-level logging of the lookup pipeline
    #[arg(short = 'd', long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Settings resolved from defaults, config files, environment and flags.
#[derive(Debug, Clone)]
struct Settings {
    config: LookupConfig,
    data: DataConfig,
    concurrency: usize,
}

/// Response wrapper used for JSON output.
#[derive(Debug, Serialize)]
struct Envelope {
    /// 0 on success, 1 on error
    code: u8,
    msg: String,
    data: Option<Value>,
}

impl Envelope {
    fn success(data: Value) -> Self {
        Self {
            code: 0,
            msg: "Query successful".to_string(),
            data: Some(data),
        }
    }

    fn error<M: Into<String>>(msg: M) -> Self {
        Self {
            code: 1,
            msg: msg.into(),
            data: None,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let json = args.json;

    if let Err(e) = validate_args(&args) {
        report_fatal(json, &e);
        process::exit(1);
    }

    init_tracing(&args);

    match run(args).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            report_fatal(json, &e.to_string());
            process::exit(1);
        }
    }
}

fn report_fatal(json: bool, message: &str) {
    if json {
        match serde_json::to_string_pretty(&Envelope::error(message)) {
            Ok(text) => println!("{}", text),
            Err(_) => eprintln!("Error: {}", message),
        }
    } else {
        eprintln!("Error: {}", message);
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing(args: &Args) {
    let filter = if args.debug {
        EnvFilter::new("domain_lookup_lib=trace,domain_lookup=debug")
    } else if args.verbose {
        EnvFilter::new("domain_lookup_lib=debug,domain_lookup=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    if args.domains.is_empty() && args.file.is_none() {
        return Err("You must specify domain names or a file with --file".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 100 {
            return Err("Concurrency must be between 1 and 100".to_string());
        }
    }

    if let Some(timeout) = &args.timeout {
        if parse_timeout_string(timeout).is_none() {
            return Err(format!(
                "Invalid timeout '{}'. Use format like '5s', '30s', '2m'",
                timeout
            ));
        }
    }

    Ok(())
}

/// Main lookup logic. Returns the process exit code.
async fn run(args: Args) -> Result<i32, Box<dyn std::error::Error>> {
    let settings = build_settings(&args)?;
    let domains = collect_domains(&args)?;

    let registry = Arc::new(settings.data.load_registry()?);
    if args.bootstrap {
        match registry
            .refresh_rdap_bootstrap(IANA_BOOTSTRAP_URL, settings.config.rdap_timeout)
            .await
        {
            Ok(entries) => debug!(entries, "using IANA bootstrap"),
            Err(e) => warn!(error = %e, "bootstrap refresh failed, using loaded table"),
        }
    }

    let lookup = DomainLookup::with_registry(settings.config.clone(), registry)?;
    debug!(
        domains = domains.len(),
        concurrency = settings.concurrency,
        "starting lookups"
    );

    let spinner = if !args.json && domains.len() > 1 {
        ui::Spinner::start(format!("Looking up {} domains...", domains.len()))
    } else {
        None
    };

    let start_time = std::time::Instant::now();
    let lookups = lookup
        .lookup_stream(&domains, settings.config.sources, settings.concurrency)
        .collect::<Vec<_>>();

    let outcome = tokio::select! {
        results = lookups => Some(results),
        _ = interrupted() => None,
    };

    if let Some(s) = spinner {
        s.stop().await;
    }
    let results = outcome.ok_or(DomainLookupError::Cancelled)?;
    let duration = start_time.elapsed();

    if args.json {
        display_json_results(&results, args.raw)?;
    } else {
        display_text_results(&results, &args);
        if results.len() > 1 {
            println!();
            ui::print_summary(&results, duration);
        }
    }

    let failed = results.iter().any(|(_, result)| result.is_err());
    Ok(if failed { 1 } else { 0 })
}

/// Resolves on Ctrl-C. Never resolves when the handler cannot be installed.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        futures::future::pending::<()>().await;
    }
}

/// Build settings with config file integration.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments
/// 2. Environment variables (DL_*)
/// 3. Config files (local > home > XDG), or the one named by --config / DL_CONFIG
/// 4. Built-in defaults
fn build_settings(args: &Args) -> Result<Settings, Box<dyn std::error::Error>> {
    let env_config = load_env_config();
    let file_config = load_file_config(args, &env_config)?;

    let config = build_lookup_config(&file_config, &env_config)?;
    let config = apply_cli_args_to_config(config, args)?;

    let data = cli_data_config(args).or(effective_data_config(&file_config, &env_config));

    let concurrency = args
        .concurrency
        .or_else(|| file_config.lookup.as_ref().and_then(|l| l.concurrency))
        .unwrap_or(DEFAULT_CONCURRENCY);

    Ok(Settings {
        config,
        data,
        concurrency,
    })
}

fn load_file_config(args: &Args, env_config: &EnvConfig) -> Result<FileConfig, DomainLookupError> {
    let config_manager = ConfigManager::new();

    if let Some(path) = &args.config {
        debug!(path = %path, "using config file from --config");
        return config_manager.load_file(path);
    }

    if let Some(path) = &env_config.config {
        debug!(path = %path, "using config file from DL_CONFIG");
        return config_manager.load_file(path);
    }

    match config_manager.discover_and_load() {
        Ok(file_config) => Ok(file_config),
        Err(e) => {
            warn!(error = %e, "ignoring unreadable config file");
            Ok(FileConfig::default())
        }
    }
}

/// Apply CLI arguments to config (highest precedence).
///
/// Flags only override when given, so config and environment values survive
/// otherwise.
fn apply_cli_args_to_config(mut config: LookupConfig, args: &Args) -> Result<LookupConfig, String> {
    if args.whois || args.rdap {
        config = config.with_sources(Sources {
            whois: args.whois,
            rdap: args.rdap,
        });
    }

    if let Some(timeout) = &args.timeout {
        let timeout = parse_timeout_string(timeout)
            .ok_or_else(|| format!("Invalid timeout '{}'", timeout))?;
        config = config.with_timeout(timeout);
    }

    if let Some(extension) = &args.default_extension {
        config = config.with_default_extension(extension.as_str());
    }

    if args.no_referral {
        config = config.with_referrals(false);
    }

    Ok(config)
}

fn cli_data_config(args: &Args) -> DataConfig {
    DataConfig {
        suffix_list: args.suffix_list.clone(),
        whois_servers: args.whois_servers.clone(),
        rdap_bootstrap: args.rdap_bootstrap.clone(),
    }
}

/// Domains from the command line followed by those from --file.
fn collect_domains(args: &Args) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let mut domains = args.domains.clone();

    if let Some(path) = &args.file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read domain file '{}': {}", path, e))?;
        domains.extend(parse_domain_list(&content));
    }

    if domains.is_empty() {
        return Err("No domains to look up".into());
    }

    Ok(domains)
}

fn display_json_results(
    results: &[(String, Result<LookupResult, DomainLookupError>)],
    raw: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let envelopes = results
        .iter()
        .map(|(_, result)| envelope_for(result, raw))
        .collect::<Result<Vec<_>, _>>()?;

    let text = match envelopes.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(&envelopes)?,
    };
    println!("{}", text);
    Ok(())
}

fn envelope_for(
    result: &Result<LookupResult, DomainLookupError>,
    raw: bool,
) -> Result<Envelope, serde_json::Error> {
    match result {
        Ok(result) => Ok(Envelope::success(lookup_data(result, raw)?)),
        Err(e) => Ok(Envelope::error(e.to_string())),
    }
}

/// The record as JSON, with raw payloads and demoted failures attached.
fn lookup_data(result: &LookupResult, raw: bool) -> Result<Value, serde_json::Error> {
    let mut data = serde_json::to_value(&result.record)?;

    if let Value::Object(map) = &mut data {
        if raw {
            map.insert("rawWhois".to_string(), serde_json::to_value(&result.raw_whois)?);
            map.insert("rawRdap".to_string(), serde_json::to_value(&result.raw_rdap)?);
        }
        if !result.diagnostics.is_empty() {
            let diagnostics = result
                .diagnostics
                .iter()
                .map(|failure| json!({ "source": failure.source, "error": failure.error.to_string() }))
                .collect();
            map.insert("diagnostics".to_string(), Value::Array(diagnostics));
        }
    }

    Ok(data)
}

fn display_text_results(results: &[(String, Result<LookupResult, DomainLookupError>)], args: &Args) {
    for (i, (input, result)) in results.iter().enumerate() {
        if i > 0 {
            println!();
        }
        match result {
            Ok(result) => {
                ui::print_record(result, args.verbose || args.debug);
                if args.raw {
                    for raw in [&result.raw_whois, &result.raw_rdap].into_iter().flatten() {
                        ui::print_raw(raw);
                    }
                }
            }
            Err(e) => ui::print_failure(input, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_lookup_lib::{
        Classification, DomainRecord, RawResponse, Source, SourceFailure,
    };
    use std::time::Duration;

    fn create_test_args(extra: &[&str]) -> Args {
        let mut argv = vec!["domain-lookup"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn sample_result() -> LookupResult {
        LookupResult {
            record: DomainRecord {
                domain: "example.com".to_string(),
                extension: "com".to_string(),
                registrable_domain: "example.com".to_string(),
                classification: Classification::Registered,
                ..Default::default()
            },
            raw_whois: Some(RawResponse {
                source: Source::Whois,
                server: "whois.verisign-grs.com".to_string(),
                status_code: None,
                body: "Domain Name: EXAMPLE.COM\r\n".to_string(),
            }),
            raw_rdap: None,
            diagnostics: vec![SourceFailure {
                source: Source::Rdap,
                error: DomainLookupError::network("HTTP 503"),
            }],
        }
    }

    #[test]
    fn test_validate_args_requires_input() {
        let args = create_test_args(&[]);
        assert!(validate_args(&args).is_err());

        let args = create_test_args(&["-f", "domains.txt"]);
        assert!(validate_args(&args).is_ok());
    }

    #[test]
    fn test_validate_args_concurrency_and_timeout() {
        assert!(validate_args(&create_test_args(&["example.com", "-c", "0"])).is_err());
        assert!(validate_args(&create_test_args(&["example.com", "-c", "101"])).is_err());
        assert!(validate_args(&create_test_args(&["example.com", "--timeout", "soon"])).is_err());
        assert!(validate_args(&create_test_args(&["example.com", "--timeout", "3s"])).is_ok());
    }

    #[test]
    fn test_source_flags_only_override_when_given() {
        let config = LookupConfig::default().with_sources(Sources::only(Source::Rdap));

        let args = create_test_args(&["example.com"]);
        let applied = apply_cli_args_to_config(config.clone(), &args).unwrap();
        assert_eq!(applied.sources, Sources::only(Source::Rdap));

        let args = create_test_args(&["example.com", "--whois"]);
        let applied = apply_cli_args_to_config(config.clone(), &args).unwrap();
        assert_eq!(applied.sources, Sources::only(Source::Whois));

        let args = create_test_args(&["example.com", "--whois", "--rdap"]);
        let applied = apply_cli_args_to_config(config, &args).unwrap();
        assert_eq!(applied.sources, Sources::all());
    }

    #[test]
    fn test_cli_args_applied() {
        let args = create_test_args(&[
            "example",
            "--timeout",
            "2s",
            "--default-extension",
            "net",
            "--no-referral",
        ]);
        let config = apply_cli_args_to_config(LookupConfig::default(), &args).unwrap();
        assert_eq!(config.whois_timeout, Duration::from_secs(2));
        assert_eq!(config.rdap_timeout, Duration::from_secs(2));
        assert_eq!(config.default_extension.as_deref(), Some("net"));
        assert!(!config.follow_referrals);
    }

    #[test]
    fn test_cli_data_paths_win() {
        let args = create_test_args(&["example.com", "--whois-servers", "cli.json"]);
        let data = cli_data_config(&args).or(DataConfig {
            whois_servers: Some("env.json".to_string()),
            suffix_list: Some("env.dat".to_string()),
            rdap_bootstrap: None,
        });
        assert_eq!(data.whois_servers.as_deref(), Some("cli.json"));
        assert_eq!(data.suffix_list.as_deref(), Some("env.dat"));
    }

    #[test]
    fn test_envelope_success_shape() {
        let envelope = envelope_for(&Ok(sample_result()), true).unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["code"], 0);
        assert_eq!(value["data"]["domain"], "example.com");
        assert_eq!(value["data"]["classification"], "registered");
        assert_eq!(value["data"]["rawWhois"]["server"], "whois.verisign-grs.com");
        assert!(value["data"]["rawRdap"].is_null());
        assert_eq!(value["data"]["diagnostics"][0]["source"], "rdap");
    }

    #[test]
    fn test_envelope_without_raw() {
        let envelope = envelope_for(&Ok(sample_result()), false).unwrap();
        let value = serde_json::to_value(&envelope).unwrap();
        assert!(value["data"].get("rawWhois").is_none());
    }

    #[test]
    fn test_envelope_error_shape() {
        let error = DomainLookupError::invalid_domain("bad..", "domain name cannot be empty");
        let envelope = envelope_for(&Err(error), false).unwrap();
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["code"], 1);
        assert!(value["data"].is_null());
        assert!(value["msg"].as_str().unwrap().contains("not a valid domain"));
    }
}
