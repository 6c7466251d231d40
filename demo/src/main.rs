//! Antibiotic Steward — Demo CLI
//!
//! Drives the full engine against the on-disk guidelines corpus.
//!
//! Usage:
//!   cargo run -p demo -- validate-kb
//!   cargo run -p demo -- recommend --case cases/pyelonephritis.json
//!   cargo run -p demo -- report submit --file report.json
//!   cargo run -p demo -- report list --status new --limit 20
//!   cargo run -p demo -- report update-status ERR-20260802-1a2b3c4d verified
//!   cargo run -p demo -- audit-summary --date 2026-08-02

use std::path::PathBuf;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use steward_contracts::case::PatientCase;
use steward_contracts::config::EngineConfig;
use steward_contracts::error::{StewardError, StewardResult};
use steward_contracts::report::{ErrorReportSubmission, ErrorSeverity, ErrorStatus, ErrorType};
use steward_engine::{audit, RecommendationEngine};
use steward_kb::KnowledgeBase;
use steward_reports::{ErrorReportStore, ReportFilter};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Deterministic empiric-antibiotic decision support over a versioned JSON
/// knowledge base.
#[derive(Parser)]
#[command(
    name = "steward",
    about = "Antibiotic steward demo CLI",
    long_about = "Runs the antibiotic steward recommendation engine from the command line.\n\
                  The engine classifies the case, applies allergy / pregnancy / renal /\n\
                  route safety filters over the knowledge base, and emits a dosed,\n\
                  auditable recommendation — or a structured refusal."
)]
struct Cli {
    /// Engine configuration TOML. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Guidelines directory, when no config file is given.
    #[arg(long, global = true, default_value = "guidelines")]
    kb_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate the knowledge base, printing the loaded versions.
    ValidateKb,
    /// Produce a recommendation for a patient case JSON file.
    Recommend {
        /// Path to the case file.
        #[arg(long)]
        case: PathBuf,
    },
    /// Error-report intake and review.
    Report {
        #[command(subcommand)]
        action: ReportCommand,
    },
    /// Per-day audit counters.
    AuditSummary {
        /// Day to summarize (YYYY-MM-DD); today when omitted.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Submit a report from a JSON file.
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
    /// List reports, optionally filtered.
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        severity: Option<String>,
        #[arg(long)]
        error_type: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Move a report to a new status.
    UpdateStatus { error_id: String, status: String },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Structured logging; RUST_LOG=debug for verbose pipeline tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error [{}]: {}", e.code(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> StewardResult<()> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::for_kb(&cli.kb_path),
    };

    match cli.command {
        Command::ValidateKb => validate_kb(&config),
        Command::Recommend { case } => recommend(&config, &case),
        Command::Report { action } => report(&config, action),
        Command::AuditSummary { date } => audit_summary(&config, date),
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn validate_kb(config: &EngineConfig) -> StewardResult<()> {
    let kb = KnowledgeBase::load(&config.kb_path)?;
    println!("knowledge base OK (index {})", kb.index_version());
    for (name, version) in kb.modifier_versions() {
        println!("  modifier {:<24} {}", name, version);
    }
    let infections: Vec<&str> = kb.infection_ids().collect();
    println!("  {} infections: {}", infections.len(), infections.join(", "));
    Ok(())
}

fn recommend(config: &EngineConfig, case_path: &PathBuf) -> StewardResult<()> {
    let contents = std::fs::read_to_string(case_path).map_err(|e| StewardError::BadCase {
        reason: format!("cannot read case file '{}': {}", case_path.display(), e),
    })?;
    let case: PatientCase = serde_json::from_str(&contents).map_err(|e| StewardError::BadCase {
        reason: format!("invalid case JSON: {}", e),
    })?;

    let engine = RecommendationEngine::from_config(config.clone())?;
    let response = engine.recommend(&case);
    println!(
        "{}",
        serde_json::to_string_pretty(&response).expect("response serializes")
    );
    Ok(())
}

fn report(config: &EngineConfig, action: ReportCommand) -> StewardResult<()> {
    let store = ErrorReportStore::new(&config.error_reports_path)?;
    match action {
        ReportCommand::Submit { file } => {
            let contents = std::fs::read_to_string(&file).map_err(|e| StewardError::ReportIo {
                reason: format!("cannot read '{}': {}", file.display(), e),
            })?;
            let submission: ErrorReportSubmission =
                serde_json::from_str(&contents).map_err(|e| StewardError::ReportIo {
                    reason: format!("invalid submission JSON: {}", e),
                })?;
            let report = store.submit(submission)?;
            println!("submitted {} (severity {:?})", report.error_id, report.severity);
        }
        ReportCommand::List { status, severity, error_type, date, limit } => {
            let filter = ReportFilter {
                status: status.as_deref().map(parse_enum::<ErrorStatus>).transpose()?,
                severity: severity.as_deref().map(parse_enum::<ErrorSeverity>).transpose()?,
                error_type: error_type.as_deref().map(parse_enum::<ErrorType>).transpose()?,
                date,
                limit,
            };
            for report in store.list(&filter)? {
                println!(
                    "{}  {:<14} {:?} {:?}  {}",
                    report.error_id,
                    report.status.to_string(),
                    report.severity,
                    report.error_type,
                    report.description
                );
            }
        }
        ReportCommand::UpdateStatus { error_id, status } => {
            let status = parse_enum::<ErrorStatus>(&status)?;
            let report = store.update_status(&error_id, status)?;
            println!("{} -> {}", report.error_id, report.status);
        }
    }
    Ok(())
}

fn audit_summary(config: &EngineConfig, date: Option<NaiveDate>) -> StewardResult<()> {
    let date = date.unwrap_or_else(|| Utc::now().date_naive());
    let summary = audit::day_summary(&config.audit_path, date)?;
    println!("audit summary for {}", summary.date);
    println!("  requests: {}", summary.total_requests);
    println!("  success:  {}", summary.success_count);
    println!("  errors:   {}", summary.error_count);
    println!("  avg ms:   {:.1}", summary.avg_duration_ms);
    for (category, count) in &summary.categories {
        println!("  {:<20} {}", category, count);
    }
    Ok(())
}

/// Parse a snake-case CLI value into a serde-tagged enum.
fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> StewardResult<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|_| {
        StewardError::Config {
            reason: format!("unrecognized value '{}'", value),
        }
    })
}
