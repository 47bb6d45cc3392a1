//! Text-mode display logic for the domain-lookup CLI.
//!
//! This module handles human-readable output: the record block for each
//! domain, raw payload dumps, failures, the spinner and the closing summary.
//! Uses only the `console` crate.

use console::{pad_str, style, Alignment, Term};
use domain_lookup_lib::{
    Classification, DateField, DomainLookupError, DomainRecord, LookupResult, RawResponse,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner that writes to stderr so stdout stays clean.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner with the given message. Returns `None` when stderr is
    /// not a terminal.
    pub fn start(message: String) -> Option<Self> {
        let term = Term::stderr();
        if !term.is_term() {
            return None;
        }

        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let _ = term.clear_line();
                let _ = term.write_str(&format!("{} {}", style(frame).cyan(), message));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Some(Self {
            running,
            handle: Some(handle),
        })
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Record ───────────────────────────────────────────────────────────────────

const LABEL_WIDTH: usize = 14;

/// Print one lookup result as a labelled block.
///
/// Demoted source failures are listed when `verbose` is set; unmapped
/// extensions are always mentioned because they explain an `UNKNOWN`.
pub fn print_record(result: &LookupResult, verbose: bool) {
    let record = &result.record;

    println!(
        "{}  {}",
        style(&record.domain).bold(),
        classification_label(record.classification),
    );

    if record.registrable_domain != record.domain {
        print_field("Registrable", style(&record.registrable_domain).to_string());
    }

    if let Some(name) = &record.registrar.name {
        let registrar = match &record.registrar.url {
            Some(url) => format!("{} {}", name, style(format!("({})", url)).dim()),
            None => name.clone(),
        };
        print_field("Registrar", registrar);
    } else if let Some(url) = &record.registrar.url {
        print_field("Registrar", url.clone());
    }

    let age = record.derived.age_seconds.map(|s| format!("{} ago", format_span(s)));
    let remaining = record.derived.remaining_seconds.map(format_remaining);
    print_date("Created", &record.creation_date, age);
    print_date("Updated", &record.updated_date, None);
    print_date("Expires", &record.expiration_date, remaining);
    print_date("Available", &record.available_date, None);

    if !record.status.is_empty() {
        let status = record
            .status
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        print_field("Status", status);
    }

    if !record.name_servers.is_empty() {
        print_field("Name servers", record.name_servers.join(", "));
    }

    let tags = derived_tags(record);
    if !tags.is_empty() {
        print_field("Tags", style(tags.join(", ")).yellow().to_string());
    }

    for failure in &result.diagnostics {
        if verbose || failure.error.is_unmapped_extension() {
            println!(
                "  {} {}",
                style(format!("{} failed:", failure.source)).dim(),
                style(&failure.error).dim(),
            );
        }
    }
}

/// Print a raw payload under a header naming its server.
pub fn print_raw(raw: &RawResponse) {
    let status = raw
        .status_code
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default();
    println!();
    println!(
        "{}",
        style(format!("── {} {}{} ", raw.source, raw.server, status)).dim()
    );
    println!("{}", raw.body.trim_end());
}

/// Print a lookup that failed outright.
pub fn print_failure(input: &str, error: &DomainLookupError) {
    println!(
        "{}  {}  {}",
        style(input).bold(),
        style("ERROR").red().bold(),
        style(error).dim(),
    );
}

fn print_field(label: &str, value: String) {
    let label = pad_str(label, LABEL_WIDTH, Alignment::Left, None);
    println!("  {}{}", style(label).cyan(), value);
}

fn print_date(label: &str, date: &Option<DateField>, note: Option<String>) {
    if let Some(date) = date {
        let value = match note {
            Some(note) => format!("{}  {}", date.display, style(format!("({})", note)).dim()),
            None => date.display.clone(),
        };
        print_field(label, value);
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(
    results: &[(String, Result<LookupResult, DomainLookupError>)],
    duration: Duration,
) {
    let mut registered = 0;
    let mut available = 0;
    let mut other = 0;
    let mut failed = 0;

    for (_, result) in results {
        match result {
            Ok(r) if r.record.is_registered() => registered += 1,
            Ok(r) if r.record.is_available() => available += 1,
            Ok(_) => other += 1,
            Err(_) => failed += 1,
        }
    }

    let total = results.len();
    println!(
        "{}",
        style("────────────────────────────────────────────────────").dim()
    );
    println!(
        "{} domain{} in {:.1}s  {}  {}  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        if total == 1 { "" } else { "s" },
        duration.as_secs_f64(),
        style("|").dim(),
        style(format!("{} registered", registered)).red(),
        style("|").dim(),
        style(format!("{} available", available)).green(),
        style("|").dim(),
        style(format!("{} reserved/unknown", other)).yellow(),
        style("|").dim(),
        style(format!("{} failed", failed)).dim(),
    );
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn classification_label(classification: Classification) -> String {
    match classification {
        Classification::Registered => style("REGISTERED").red().bold().to_string(),
        Classification::Available => style("AVAILABLE").green().bold().to_string(),
        Classification::Reserved => style("RESERVED").magenta().bold().to_string(),
        Classification::Unknown => style("UNKNOWN").yellow().to_string(),
    }
}

/// Human-readable tags derived from status and dates.
pub fn derived_tags(record: &DomainRecord) -> Vec<&'static str> {
    let derived = &record.derived;
    [
        (derived.new, "new"),
        (derived.expiring_soon, "expiring soon"),
        (derived.expired, "expired"),
        (derived.grace_period, "grace period"),
        (derived.redemption_period, "redemption period"),
        (derived.pending_delete, "pending delete"),
    ]
    .into_iter()
    .filter_map(|(set, tag)| set.then_some(tag))
    .collect()
}

fn format_remaining(seconds: i64) -> String {
    if seconds < 0 {
        format!("expired {} ago", format_span(-seconds))
    } else {
        format!("in {}", format_span(seconds))
    }
}

/// Coarse span such as `29y 291d`, `5d 3h` or `12m`.
pub fn format_span(seconds: i64) -> String {
    const MINUTE: i64 = 60;
    const HOUR: i64 = 60 * MINUTE;
    const DAY: i64 = 24 * HOUR;
    const YEAR: i64 = 365 * DAY;

    let seconds = seconds.abs();
    if seconds >= YEAR {
        format!("{}y {}d", seconds / YEAR, (seconds % YEAR) / DAY)
    } else if seconds >= DAY {
        format!("{}d {}h", seconds / DAY, (seconds % DAY) / HOUR)
    } else if seconds >= HOUR {
        format!("{}h {}m", seconds / HOUR, (seconds % HOUR) / MINUTE)
    } else {
        format!("{}m", seconds / MINUTE)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
